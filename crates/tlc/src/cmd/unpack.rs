//! `tlc unpack` — write each entry's payload to `te_<tag>.bin`.

use std::path::PathBuf;

use anyhow::{bail, Context, Result};

use super::{load, single_file, Args};

pub fn run(args: &[String]) -> Result<()> {
    let mut args = Args::new(args);
    let mut dir = PathBuf::from(".");
    let mut positional = Vec::new();

    while let Some(arg) = args.next_arg() {
        match arg {
            "-C" | "--directory" => dir = PathBuf::from(args.value(arg)?),
            flag if flag.starts_with('-') => bail!("unpack: unknown option {flag}"),
            file => positional.push(file),
        }
    }
    let file = single_file(positional, "unpack")?;
    let tl = load(&file)?;

    std::fs::create_dir_all(&dir)
        .with_context(|| format!("failed to create {}", dir.display()))?;
    for te in tl.entries() {
        // later entries with the same tag overwrite earlier ones
        let path = dir.join(format!("te_{}.bin", te.id));
        std::fs::write(&path, &te.data)
            .with_context(|| format!("failed to write {}", path.display()))?;
        tracing::debug!(path = %path.display(), bytes = te.data.len(), "unpacked entry");
    }
    Ok(())
}
