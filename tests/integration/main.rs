//! Transfer List integration tests.
//!
//! These exercise the public `tlc-core` API end to end: building lists
//! through the typed constructors, serializing them, and reading them back
//! from memory and from files.
//!
//!   cargo test --test integration

use std::path::PathBuf;

use anyhow::{Context, Result};
use tlc_core::wire::byte_sum;
use tlc_core::{EntryPointParams, ExecutionState, TransferList, TransferListOptions};

mod config;
mod files;
mod roundtrip;
mod scenarios;

// ── Harness ───────────────────────────────────────────────────────────────────

/// A scratch directory removed when dropped.
pub struct Scratch {
    pub dir: PathBuf,
}

impl Scratch {
    pub fn new(name: &str) -> Result<Self> {
        let dir = std::env::temp_dir().join(format!("tlc-it-{}-{}", name, std::process::id()));
        let _ = std::fs::remove_dir_all(&dir);
        std::fs::create_dir_all(&dir)
            .with_context(|| format!("failed to create {}", dir.display()))?;
        Ok(Self { dir })
    }
}

impl Drop for Scratch {
    fn drop(&mut self) {
        let _ = std::fs::remove_dir_all(&self.dir);
    }
}

/// A list with one entry of every standardized kind.
pub fn populated_list(opts: TransferListOptions) -> Result<TransferList> {
    let mut tl = TransferList::with_options(opts)?;
    tl.add_empty_entry()?;
    tl.add_fdt_entry(vec![0xd0u8; 100])?;
    tl.add_hob_block_entry(vec![0x11u8; 21])?;
    tl.add_hob_list_entry(vec![0x22u8; 7])?;
    tl.add_acpi_tables_entry(vec![0x33u8; 64])?;
    tl.add_event_log_entry(1, vec![0x44u8; 9])?;
    tl.add_tpm_crb_base_entry(0xfed4_0000, 0x4000)?;
    tl.add_optee_entry(100)?;
    tl.add_spmc_manifest_entry(vec![0x55u8; 33])?;
    tl.add_entry_point_info_entry(
        ExecutionState::Aarch64,
        &EntryPointParams {
            ep_type: 1,
            version: 2,
            attr: 8,
            pc: 67239936,
            spsr: 965,
            lr_svc: None,
            args: vec![67112976, 67112960],
        },
    )?;
    tl.add_memory_layout_entry(0x10, 0x33000)?;
    Ok(tl)
}

/// Byte sum of the list's wire image.
pub fn image_sum(tl: &TransferList) -> Result<u8> {
    Ok(byte_sum(&tl.serialize()?))
}

/// (id, data) pairs in order.
pub fn id_data(tl: &TransferList) -> Vec<(u32, Vec<u8>)> {
    tl.entries()
        .iter()
        .map(|te| (te.id, te.data.to_vec()))
        .collect()
}
