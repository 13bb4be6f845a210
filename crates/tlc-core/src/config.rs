//! Declarative list configuration.
//!
//! A TOML document describes the list settings and its entries by semantic
//! fields. Blob paths are resolved against a caller-supplied root directory.
//!
//! Resolution order: environment variables → config file → defaults.
//!
//! ```toml
//! max_size = 0x1000
//! execution_state = "aarch32"
//!
//! [[entries]]
//! tag_id = 0x102
//! ep_info = { h = { type = 1, version = 2, attr = 8 }, pc = 67239936, spsr = 467, lr_svc = 0, args = [67112968, 67112960, 0, 0] }
//! ```

use std::path::{Path, PathBuf};

use bytes::Bytes;
use serde::{Deserialize, Serialize};

use crate::list::{TransferList, TransferListOptions};
use crate::payload::{EntryPayload, EntryPointInfo, EntryPointParams, ExecutionState};
use crate::wire::{tag, Endianness, TlError, DEFAULT_ALIGNMENT, DEFAULT_MAX_SIZE};

/// Top-level list description.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ListConfig {
    /// Capacity of the list in bytes.
    pub max_size: u32,
    /// "aarch64" or "aarch32"; selects the entry-point-info layout.
    pub execution_state: String,
    pub has_checksum: bool,
    pub alignment: u8,
    pub endianness: Endianness,
    pub entries: Vec<EntryConfig>,
}

/// One entry. `tag_id` selects which of the optional keys are required.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EntryConfig {
    pub tag_id: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fdt: Option<PathBuf>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hob_block: Option<PathBuf>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hob_list: Option<PathBuf>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub acpi_tables: Option<PathBuf>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub event_log: Option<PathBuf>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub flags: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub crb_base_address: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub crb_size: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pp_addr: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub spmc_man: Option<PathBuf>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ep_info: Option<EpInfoConfig>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub addr: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub size: Option<u64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EpInfoConfig {
    pub h: EpHeaderConfig,
    pub pc: u64,
    pub spsr: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lr_svc: Option<u32>,
    #[serde(default)]
    pub args: Vec<u64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EpHeaderConfig {
    #[serde(rename = "type")]
    pub ep_type: u8,
    pub version: u8,
    pub attr: u32,
}

// ── Defaults ──────────────────────────────────────────────────────────────────

impl Default for ListConfig {
    fn default() -> Self {
        Self {
            max_size: DEFAULT_MAX_SIZE,
            execution_state: ExecutionState::Aarch64.to_string(),
            has_checksum: true,
            alignment: DEFAULT_ALIGNMENT,
            endianness: Endianness::Little,
            entries: Vec::new(),
        }
    }
}

// ── Errors ────────────────────────────────────────────────────────────────────

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read {0}: {1}")]
    ReadFailed(PathBuf, std::io::Error),
    #[error("failed to parse {0}: {1}")]
    ParseFailed(PathBuf, toml::de::Error),
    #[error("failed to read blob {0}: {1}")]
    BlobFailed(PathBuf, std::io::Error),
    #[error("entry {index} (tag {tag:#x}): {source}")]
    Entry {
        index: usize,
        tag: u32,
        #[source]
        source: TlError,
    },
    #[error(transparent)]
    List(#[from] TlError),
}

// ── Loading ───────────────────────────────────────────────────────────────────

impl ListConfig {
    /// Load config: env vars → file → defaults.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)
            .map_err(|e| ConfigError::ReadFailed(path.to_path_buf(), e))?;
        let mut config: ListConfig =
            toml::from_str(&text).map_err(|e| ConfigError::ParseFailed(path.to_path_buf(), e))?;
        config.apply_overrides(|key| std::env::var(key).ok());
        Ok(config)
    }

    /// Apply TLC_* overrides from `lookup`. Unparseable values are ignored.
    pub fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(v) = lookup("TLC_MAX_SIZE") {
            if let Some(n) = parse_int(&v).and_then(|n| u32::try_from(n).ok()) {
                self.max_size = n;
            }
        }
        if let Some(v) = lookup("TLC_EXECUTION_STATE") {
            self.execution_state = v;
        }
        if let Some(v) = lookup("TLC_HAS_CHECKSUM") {
            self.has_checksum = v == "true" || v == "1";
        }
    }

    /// Build the described list. Blob paths are resolved against `root`.
    pub fn build(&self, root: &Path) -> Result<TransferList, ConfigError> {
        let state: ExecutionState = self.execution_state.parse()?;
        tracing::info!(execution_state = %state, entries = self.entries.len(), "building transfer list");

        let mut tl = TransferList::with_options(TransferListOptions {
            max_size: self.max_size,
            checksum: self.has_checksum,
            alignment: self.alignment,
            endianness: self.endianness,
            ..TransferListOptions::default()
        })?;

        for (index, entry) in self.entries.iter().enumerate() {
            let payload = entry.to_payload(root, state).map_err(|e| match e {
                ConfigError::List(source) => ConfigError::Entry {
                    index,
                    tag: entry.tag_id,
                    source,
                },
                other => other,
            })?;
            tl.add_payload(&payload).map_err(|source| ConfigError::Entry {
                index,
                tag: entry.tag_id,
                source,
            })?;
        }
        Ok(tl)
    }
}

impl EntryConfig {
    /// Dispatch on `tag_id` to the typed payload it describes.
    pub fn to_payload(
        &self,
        root: &Path,
        state: ExecutionState,
    ) -> Result<EntryPayload, ConfigError> {
        let payload = match self.tag_id {
            tag::EMPTY => EntryPayload::Empty,
            tag::FDT => EntryPayload::Fdt(read_blob(root, required(&self.fdt, "fdt")?)?),
            tag::HOB_BLOCK => {
                EntryPayload::HobBlock(read_blob(root, required(&self.hob_block, "hob_block")?)?)
            }
            tag::HOB_LIST => {
                EntryPayload::HobList(read_blob(root, required(&self.hob_list, "hob_list")?)?)
            }
            tag::ACPI_TABLES => EntryPayload::AcpiTables(read_blob(
                root,
                required(&self.acpi_tables, "acpi_tables")?,
            )?),
            tag::EVENT_LOG => EntryPayload::EventLog {
                flags: *required(&self.flags, "flags")?,
                log: read_blob(root, required(&self.event_log, "event_log")?)?,
            },
            tag::TPM_CRB_BASE => EntryPayload::TpmCrbBase {
                address: *required(&self.crb_base_address, "crb_base_address")?,
                size: *required(&self.crb_size, "crb_size")?,
            },
            tag::OPTEE => EntryPayload::OpTee {
                pp_addr: *required(&self.pp_addr, "pp_addr")?,
            },
            tag::SPMC_MANIFEST => {
                EntryPayload::SpmcManifest(read_blob(root, required(&self.spmc_man, "spmc_man")?)?)
            }
            tag::EP_INFO => {
                let ep = required(&self.ep_info, "ep_info")?;
                let params = EntryPointParams {
                    ep_type: ep.h.ep_type,
                    version: ep.h.version,
                    attr: ep.h.attr,
                    pc: ep.pc,
                    spsr: ep.spsr,
                    lr_svc: ep.lr_svc,
                    args: ep.args.clone(),
                };
                EntryPayload::EntryPoint(EntryPointInfo::build(state, &params)?)
            }
            tag::MEMORY_LAYOUT => EntryPayload::MemoryLayout {
                addr: *required(&self.addr, "addr")?,
                size: *required(&self.size, "size")?,
            },
            other => return Err(TlError::InvalidTag(other).into()),
        };
        Ok(payload)
    }
}

fn required<'a, T>(field: &'a Option<T>, name: &str) -> Result<&'a T, ConfigError> {
    field
        .as_ref()
        .ok_or_else(|| TlError::InvalidArguments(format!("missing key `{name}`")).into())
}

fn read_blob(root: &Path, rel: &Path) -> Result<Bytes, ConfigError> {
    let path = root.join(rel);
    std::fs::read(&path)
        .map(Bytes::from)
        .map_err(|e| ConfigError::BlobFailed(path, e))
}

/// Parse a decimal or `0x`-prefixed hexadecimal integer.
pub fn parse_int(s: &str) -> Option<u64> {
    let s = s.trim();
    match s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")) {
        Some(hex) => u64::from_str_radix(hex, 16).ok(),
        None => s.parse().ok(),
    }
}
