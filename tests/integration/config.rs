use crate::*;

use tlc_core::config::{ConfigError, ListConfig};
use tlc_core::{tag, EntryPayload, TlError};

const CONFIG: &str = r#"
max_size = 0x1000
has_checksum = true
execution_state = "aarch32"

[[entries]]
tag_id = 1
fdt = "blobs/fdt.dtb"

[[entries]]
tag_id = 0x102
ep_info = { h = { type = 1, version = 2, attr = 8 }, pc = 67239936, spsr = 467, lr_svc = 0, args = [67112968, 67112960, 0, 0] }

[[entries]]
tag_id = 0x104
addr = 0x10
size = 0x33000
"#;

#[test]
fn config_file_builds_list() -> Result<()> {
    let scratch = Scratch::new("config")?;
    std::fs::create_dir_all(scratch.dir.join("blobs"))?;
    std::fs::write(scratch.dir.join("blobs/fdt.dtb"), vec![0xd0u8; 48])?;
    let path = scratch.dir.join("tl.toml");
    std::fs::write(&path, CONFIG)?;

    let mut config = ListConfig::load(&path)?;
    config.apply_overrides(|_| None);
    let tl = config.build(&scratch.dir)?;

    let ids: Vec<u32> = tl.entries().iter().map(|te| te.id).collect();
    assert_eq!(ids, vec![tag::FDT, tag::EP_INFO, tag::MEMORY_LAYOUT]);
    assert_eq!(tl.entries()[0].data_size, 48);
    assert_eq!(tl.entries()[1].data_size, 36);
    assert_eq!(
        tl.decode_entry(&tl.entries()[2])?,
        EntryPayload::MemoryLayout {
            addr: 0x10,
            size: 0x33000
        }
    );
    assert!(tl.verify_checksum());
    Ok(())
}

#[test]
fn missing_blob_names_the_path() -> Result<()> {
    let scratch = Scratch::new("config-blob")?;
    let config = toml_config(
        "blob",
        "[[entries]]\ntag_id = 1\nfdt = \"absent.dtb\"\n",
    )?;

    match config.build(&scratch.dir) {
        Err(ConfigError::BlobFailed(path, _)) => assert!(path.ends_with("absent.dtb")),
        other => panic!("expected BlobFailed, got {other:?}"),
    }
    Ok(())
}

#[test]
fn overflowing_entry_reports_its_index() -> Result<()> {
    let scratch = Scratch::new("config-capacity")?;
    let config = toml_config(
        "capacity",
        "max_size = 0x30\n\n[[entries]]\ntag_id = 0x100\npp_addr = 1\n\n[[entries]]\ntag_id = 0x100\npp_addr = 2\n",
    )?;

    match config.build(&scratch.dir) {
        Err(ConfigError::Entry {
            index: 1,
            tag: 0x100,
            source: TlError::CapacityExceeded { .. },
        }) => {}
        other => panic!("expected capacity failure on entry 1, got {other:?}"),
    }
    Ok(())
}

fn toml_config(name: &str, text: &str) -> Result<ListConfig> {
    let scratch = Scratch::new(&format!("config-text-{name}"))?;
    let path = scratch.dir.join("tl.toml");
    std::fs::write(&path, text)?;
    Ok(ListConfig::load(&path)?)
}
