//! tlc — create, inspect and edit Transfer Lists.

use anyhow::Result;

mod cmd;

fn print_usage() {
    println!("Usage: tlc <command> [options] <file>");
    println!();
    println!("Commands:");
    println!("  create   Create a new transfer list");
    println!("  add      Append entries to a transfer list");
    println!("  remove   Remove every entry with the given tags");
    println!("  info     Show the header and entries of a transfer list");
    println!("  unpack   Write each entry's payload to te_<tag>.bin");
    println!();
    println!("Options:");
    println!("  create  [--size N] [--flags N] [--align N] [--from-config PATH] [--root DIR]");
    println!("          [--fdt PATH] [--entry TAG PATH]... <out>");
    println!("  add     [--fdt PATH] [--entry TAG PATH]... <file>");
    println!("  remove  --tags T[,T...] <file>");
    println!("  info    [--header] [--entries] [--fdt-offset] [--json] <file>");
    println!("  unpack  [-C DIR] <file>");
    println!();
    println!("Numbers accept decimal or 0x-prefixed hex. Set RUST_LOG=debug for tracing.");
}

// ── Entry point ───────────────────────────────────────────────────────────────

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let args: Vec<String> = std::env::args().skip(1).collect();
    let Some((command, rest)) = args.split_first() else {
        print_usage();
        std::process::exit(1);
    };

    match command.as_str() {
        "create" => cmd::create::run(rest),
        "add" => cmd::add::run(rest),
        "remove" => cmd::remove::run(rest),
        "info" => cmd::info::run(rest),
        "unpack" => cmd::unpack::run(rest),
        "help" | "--help" | "-h" => {
            print_usage();
            Ok(())
        }
        other => {
            eprintln!("Unknown command: {}", other);
            eprintln!();
            print_usage();
            std::process::exit(1);
        }
    }
}
