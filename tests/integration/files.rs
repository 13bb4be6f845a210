use crate::*;

use std::io::{Cursor, Seek, SeekFrom, Write};

use tlc_core::{tag, TlError};

#[test]
fn write_then_read_file() -> Result<()> {
    let scratch = Scratch::new("file")?;
    let path = scratch.dir.join("tl.bin");

    let tl = populated_list(TransferListOptions::default())?;
    tl.write_to_file(&path)?;

    let loaded = TransferList::from_file(&path)?;
    assert_eq!(loaded, tl);
    assert_eq!(std::fs::read(&path)?, tl.serialize()?);
    Ok(())
}

#[test]
fn read_from_stream_at_offset() -> Result<()> {
    let tl = populated_list(TransferListOptions::default())?;

    let mut stream = Cursor::new(Vec::new());
    stream.write_all(&[0xffu8; 0x40])?;
    tl.write_to(&mut stream)?;
    stream.seek(SeekFrom::Start(0x40))?;

    let loaded = TransferList::read_from(&mut stream)?;
    assert_eq!(id_data(&loaded), id_data(&tl));
    assert_eq!(
        loaded.get_entry_data_offset(tag::FDT)?,
        tl.get_entry_data_offset(tag::FDT)?
    );
    Ok(())
}

#[test]
fn blob_from_file_is_verbatim() -> Result<()> {
    let scratch = Scratch::new("blob")?;
    let blob = scratch.dir.join("manifest.dtb");
    std::fs::write(&blob, b"\xd0\x0d\xfe\xedmanifest")?;

    let mut tl = TransferList::new(0x1000, true)?;
    tl.add_entry_from_file(tag::SPMC_MANIFEST, &blob)?;
    assert_eq!(tl.entries()[0].data.as_ref(), b"\xd0\x0d\xfe\xedmanifest");

    let missing = tl.add_entry_from_file(tag::FDT, scratch.dir.join("nope.dtb"));
    assert!(matches!(missing, Err(TlError::Io(_))));
    assert_eq!(tl.entries().len(), 1);
    Ok(())
}

#[test]
fn missing_file_is_io_error() {
    let result = TransferList::from_file("/nonexistent/tl.bin");
    assert!(matches!(result, Err(TlError::Io(_))));
}
