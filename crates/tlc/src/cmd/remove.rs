//! `tlc remove` — drop every entry with the given tags.

use anyhow::{bail, Result};

use super::{load, parse_tag, save, single_file, Args};

pub fn run(args: &[String]) -> Result<()> {
    let mut args = Args::new(args);
    let mut tags = Vec::new();
    let mut positional = Vec::new();

    while let Some(arg) = args.next_arg() {
        match arg {
            "--tags" | "-t" => {
                for t in args.value(arg)?.split(',').filter(|t| !t.is_empty()) {
                    tags.push(parse_tag(t)?);
                }
            }
            flag if flag.starts_with('-') => bail!("remove: unknown option {flag}"),
            file => positional.push(file),
        }
    }
    let file = single_file(positional, "remove")?;
    if tags.is_empty() {
        bail!("remove: --tags is required");
    }

    let mut tl = load(&file)?;
    for tag in tags {
        let removed = tl.remove_tag(tag)?;
        if removed == 0 {
            tracing::warn!(tag = %format!("{tag:#x}"), "no entries with this tag");
        }
    }
    save(&tl, &file)
}
