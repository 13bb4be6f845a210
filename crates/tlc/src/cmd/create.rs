//! `tlc create` — build a new transfer list.

use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use tlc_core::config::ListConfig;
use tlc_core::wire::{DEFAULT_ALIGNMENT, DEFAULT_MAX_SIZE, TL_FLAG_CHECKSUM};
use tlc_core::{TransferList, TransferListOptions};

use super::{capacity_hint, save, single_file, Args, BlobEntries};

pub fn run(args: &[String]) -> Result<()> {
    let mut args = Args::new(args);
    let mut size: Option<u64> = None;
    let mut flags = TL_FLAG_CHECKSUM as u64;
    let mut alignment = DEFAULT_ALIGNMENT as u64;
    let mut config_path: Option<PathBuf> = None;
    let mut root: Option<PathBuf> = None;
    let mut blobs = BlobEntries::default();
    let mut positional = Vec::new();

    while let Some(arg) = args.next_arg() {
        match arg {
            "--size" | "-s" => size = Some(args.number(arg)?),
            "--flags" => flags = args.number(arg)?,
            "--align" => alignment = args.number(arg)?,
            "--from-config" => config_path = Some(PathBuf::from(args.value(arg)?)),
            "--root" => root = Some(PathBuf::from(args.value(arg)?)),
            flag if blobs.accept(flag, &mut args)? => {}
            flag if flag.starts_with('-') => bail!("create: unknown option {flag}"),
            file => positional.push(file),
        }
    }
    let out = single_file(positional, "create")?;

    let mut tl = match config_path {
        Some(path) => {
            let mut config = ListConfig::load(&path)?;
            if let Some(size) = size {
                config.max_size = u32::try_from(size).context("--size does not fit in 32 bits")?;
            }
            let root = match root {
                Some(root) => root,
                None => std::env::current_dir().context("failed to resolve working directory")?,
            };
            config
                .build(&root)
                .with_context(|| format!("failed to build list from {}", path.display()))?
        }
        None => {
            let max_size = u32::try_from(size.unwrap_or(DEFAULT_MAX_SIZE as u64))
                .context("--size does not fit in 32 bits")?;
            let alignment = u8::try_from(alignment).context("--align is out of range")?;
            let flags = u32::try_from(flags).context("--flags does not fit in 32 bits")?;
            TransferList::with_options(TransferListOptions {
                max_size,
                checksum: flags & TL_FLAG_CHECKSUM != 0,
                flags,
                alignment,
                ..TransferListOptions::default()
            })
            .map_err(capacity_hint)?
        }
    };

    blobs.apply(&mut tl)?;
    save(&tl, &out)
}
