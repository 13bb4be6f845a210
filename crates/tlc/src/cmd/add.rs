//! `tlc add` — append entries to a list, creating it if it does not exist.

use anyhow::{bail, Result};
use tlc_core::wire::DEFAULT_MAX_SIZE;
use tlc_core::TransferList;

use super::{load, save, single_file, Args, BlobEntries};

pub fn run(args: &[String]) -> Result<()> {
    let mut args = Args::new(args);
    let mut blobs = BlobEntries::default();
    let mut positional = Vec::new();

    while let Some(arg) = args.next_arg() {
        match arg {
            flag if blobs.accept(flag, &mut args)? => {}
            flag if flag.starts_with('-') => bail!("add: unknown option {flag}"),
            file => positional.push(file),
        }
    }
    let file = single_file(positional, "add")?;

    let mut tl = if file.exists() {
        load(&file)?
    } else {
        tracing::info!(path = %file.display(), "creating new transfer list");
        TransferList::new(DEFAULT_MAX_SIZE, true)?
    };

    blobs.apply(&mut tl)?;
    save(&tl, &file)
}
