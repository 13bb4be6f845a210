//! `tlc info` — print the header and entries of a list.

use anyhow::{bail, Result};
use serde::Serialize;
use tlc_core::wire::ListHeader;
use tlc_core::{tag, TlOps, TransferEntry, TransferList};

use super::{load, single_file, Args};

/// Payload bytes shown per entry in text mode.
const PREVIEW_BYTES: usize = 16;

#[derive(Serialize)]
struct InfoJson<'a> {
    header: &'a ListHeader,
    ops: TlOps,
    checksum_valid: bool,
    entries: Vec<EntryJson<'a>>,
}

#[derive(Serialize)]
struct EntryJson<'a> {
    #[serde(flatten)]
    entry: &'a TransferEntry,
    name: &'static str,
    decoded: Option<String>,
}

pub fn run(args: &[String]) -> Result<()> {
    let mut args = Args::new(args);
    let mut show_header = false;
    let mut show_entries = false;
    let mut fdt_offset = false;
    let mut json = false;
    let mut positional = Vec::new();

    while let Some(arg) = args.next_arg() {
        match arg {
            "--header" => show_header = true,
            "--entries" => show_entries = true,
            "--fdt-offset" => fdt_offset = true,
            "--json" => json = true,
            flag if flag.starts_with('-') => bail!("info: unknown option {flag}"),
            file => positional.push(file),
        }
    }
    let file = single_file(positional, "info")?;
    let tl = load(&file)?;

    if fdt_offset {
        println!("{}", tl.get_entry_data_offset(tag::FDT)?);
        return Ok(());
    }

    if json {
        let info = InfoJson {
            header: tl.header(),
            ops: tl.check_header(),
            checksum_valid: tl.verify_checksum(),
            entries: tl
                .entries()
                .iter()
                .map(|te| EntryJson {
                    entry: te,
                    name: tag::name(te.id),
                    decoded: decoded(&tl, te),
                })
                .collect(),
        };
        println!("{}", serde_json::to_string_pretty(&info)?);
        return Ok(());
    }

    if !show_header && !show_entries {
        show_header = true;
        show_entries = true;
    }

    if show_header {
        print_header(&tl);
    }
    if show_header && show_entries && !tl.entries().is_empty() {
        println!();
    }
    if show_entries {
        print_entries(&tl);
    }
    Ok(())
}

fn print_header(tl: &TransferList) {
    let h = tl.header();
    println!("{:<12} {:#x}", "signature", h.signature);
    println!("{:<12} {:#x}", "checksum", h.checksum);
    println!("{:<12} {:#x}", "version", h.version);
    println!("{:<12} {:#x}", "hdr_size", h.hdr_size);
    println!("{:<12} {:#x}", "alignment", h.alignment);
    println!("{:<12} {:#x}", "size", h.size);
    println!("{:<12} {:#x}", "total_size", h.total_size);
    println!("{:<12} {:#x}", "flags", h.flags);
    println!("{:<12} {:?}", "ops", tl.check_header());
}

fn print_entries(tl: &TransferList) {
    let blocks: Vec<String> = tl
        .entries()
        .iter()
        .map(|te| {
            let preview = &te.data[..te.data.len().min(PREVIEW_BYTES)];
            let mut lines = vec![
                format!("{:<12} {:#x} ({})", "id", te.id, tag::name(te.id)),
                format!("{:<12} {:#x}", "hdr_size", te.hdr_size),
                format!("{:<12} {:#x}", "data_size", te.data_size),
                format!("{:<12} {:#x}", "offset", te.offset),
                format!(
                    "{:<12} {}{}",
                    "data",
                    hex::encode(preview),
                    if te.data.len() > PREVIEW_BYTES { "…" } else { "" }
                ),
            ];
            if let Some(decoded) = decoded(tl, te) {
                lines.push(format!("{:<12} {}", "decoded", decoded));
            }
            lines.join("\n")
        })
        .collect();
    println!("{}", blocks.join("\n----\n"));
}

/// Semantic rendering of a standardized entry, `None` for unknown tags or
/// payloads that do not match their layout.
fn decoded(tl: &TransferList, te: &TransferEntry) -> Option<String> {
    if !tag::is_standard(te.id) {
        return None;
    }
    match tl.decode_entry(te) {
        Ok(payload) => Some(payload.to_string()),
        Err(e) => {
            tracing::warn!(tag = %format!("{:#x}", te.id), error = %e, "entry does not match its layout");
            None
        }
    }
}
