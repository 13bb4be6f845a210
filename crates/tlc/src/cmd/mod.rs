//! CLI command modules and the argument helpers they share.

pub mod add;
pub mod create;
pub mod info;
pub mod remove;
pub mod unpack;

use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use tlc_core::config::parse_int;
use tlc_core::{TlError, TransferList};

/// Cursor over a subcommand's arguments.
pub struct Args<'a> {
    args: &'a [String],
    pos: usize,
}

impl<'a> Args<'a> {
    pub fn new(args: &'a [String]) -> Self {
        Self { args, pos: 0 }
    }

    pub fn next_arg(&mut self) -> Option<&'a str> {
        let arg = self.args.get(self.pos)?;
        self.pos += 1;
        Some(arg.as_str())
    }

    /// The value following `flag`.
    pub fn value(&mut self, flag: &str) -> Result<&'a str> {
        self.next_arg()
            .with_context(|| format!("{flag} requires a value"))
    }

    /// The value following `flag`, as a decimal or 0x-prefixed integer.
    pub fn number(&mut self, flag: &str) -> Result<u64> {
        let v = self.value(flag)?;
        parse_int(v).with_context(|| format!("{flag} must be a number, got {v:?}"))
    }
}

/// Parse a tag id given on the command line.
pub fn parse_tag(s: &str) -> Result<u32> {
    parse_int(s)
        .and_then(|n| u32::try_from(n).ok())
        .with_context(|| format!("invalid tag id {s:?}"))
}

/// Blob entries requested with `--fdt` / `--entry`, in command-line order.
#[derive(Default)]
pub struct BlobEntries {
    pub entries: Vec<(u32, PathBuf)>,
}

impl BlobEntries {
    /// Consume `--fdt PATH` or `--entry TAG PATH` if `flag` is one of them.
    pub fn accept(&mut self, flag: &str, args: &mut Args<'_>) -> Result<bool> {
        match flag {
            "--fdt" => {
                let path = args.value("--fdt")?;
                self.entries.push((tlc_core::tag::FDT, PathBuf::from(path)));
                Ok(true)
            }
            "--entry" => {
                let tag = parse_tag(args.value("--entry")?)?;
                let path = args.value("--entry")?;
                self.entries.push((tag, PathBuf::from(path)));
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    pub fn apply(&self, tl: &mut TransferList) -> Result<()> {
        for (tag, path) in &self.entries {
            tl.add_entry_from_file(*tag, path)
                .map_err(capacity_hint)
                .with_context(|| format!("failed to add {} as tag {tag:#x}", path.display()))?;
        }
        Ok(())
    }
}

/// Attach the usual remedy to a capacity failure.
pub fn capacity_hint(err: TlError) -> anyhow::Error {
    match err {
        TlError::CapacityExceeded { .. } => anyhow::Error::new(err)
            .context("transfer list max size exceeded, consider increasing it with --size"),
        other => other.into(),
    }
}

pub fn load(path: &Path) -> Result<TransferList> {
    TransferList::from_file(path)
        .with_context(|| format!("failed to load transfer list from {}", path.display()))
}

pub fn save(tl: &TransferList, path: &Path) -> Result<()> {
    tl.write_to_file(path)
        .with_context(|| format!("failed to write transfer list to {}", path.display()))?;
    tracing::info!(path = %path.display(), entries = tl.entries().len(), size = tl.size(), "transfer list written");
    Ok(())
}

/// Exactly one positional argument: the list file.
pub fn single_file(positional: Vec<&str>, command: &str) -> Result<PathBuf> {
    match positional.as_slice() {
        [file] => Ok(PathBuf::from(file)),
        [] => bail!("{command}: missing transfer list file"),
        more => bail!("{command}: unexpected arguments {more:?}"),
    }
}
