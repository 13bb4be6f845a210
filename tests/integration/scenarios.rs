use crate::*;

use tlc_core::{tag, EntryPayload, TlError};

#[test]
fn fdt_of_one_hundred_bytes() -> Result<()> {
    let mut tl = TransferList::new(0x1000, true)?;
    tl.add_transfer_entry(1, vec![0u8; 100])?;

    assert_eq!(tl.entries().len(), 1);
    assert_eq!(tl.entries()[0].id, 1);
    assert_eq!(tl.entries()[0].data_size, 100);
    assert_eq!(tl.size(), 0x84);
    Ok(())
}

#[test]
fn memory_layout_payload_bytes() -> Result<()> {
    let mut tl = TransferList::new(0x1000, true)?;
    let te = tl.add_memory_layout_entry(0x10, 0x33000)?;

    let mut expected = 0x10u64.to_le_bytes().to_vec();
    expected.extend_from_slice(&0x33000u64.to_le_bytes());
    assert_eq!(te.data.as_ref(), expected.as_slice());
    Ok(())
}

#[test]
fn optee_pointer() -> Result<()> {
    let mut tl = TransferList::new(0x1000, true)?;
    let te = tl.add_optee_entry(100)?.clone();

    assert_eq!(te.data_size, 8);
    assert_eq!(tl.decode_entry(&te)?, EntryPayload::OpTee { pp_addr: 100 });
    Ok(())
}

#[test]
fn capacity_is_exact() -> Result<()> {
    let n = 100u32;
    let mut tl = TransferList::new(0x18 + 8 + n, true)?;

    let err = tl.add_transfer_entry(1, vec![0u8; n as usize + 1]).unwrap_err();
    assert!(matches!(err, TlError::CapacityExceeded { .. }));
    assert!(tl.entries().is_empty());
    assert_eq!(tl.size(), 0x18);

    tl.add_transfer_entry(1, vec![0u8; n as usize])?;
    assert_eq!(tl.size(), tl.total_size());
    Ok(())
}

#[test]
fn remove_tag_leaves_no_residue() -> Result<()> {
    let mut tl = populated_list(TransferListOptions::default())?;
    tl.add_optee_entry(200)?;

    assert_eq!(tl.remove_tag(tag::OPTEE)?, 2);
    assert!(tl.entries().iter().all(|te| te.id != tag::OPTEE));
    let used: usize = tl.entries().iter().map(|te| te.size()).sum();
    assert_eq!(tl.size() as usize, 0x18 + used);

    let loaded = TransferList::deserialize(&tl.serialize()?)?;
    assert_eq!(id_data(&loaded), id_data(&tl));
    Ok(())
}

#[test]
fn aarch32_entry_point_needs_lr_svc() -> Result<()> {
    let mut tl = TransferList::new(0x1000, true)?;
    let params = EntryPointParams {
        ep_type: 1,
        version: 2,
        attr: 8,
        pc: 67239936,
        spsr: 467,
        lr_svc: None,
        args: vec![67112968, 67112960, 0, 0],
    };
    let err = tl
        .add_entry_point_info_entry(ExecutionState::Aarch32, &params)
        .unwrap_err();
    assert!(matches!(err, TlError::InvalidArguments(_)));
    assert!(tl.entries().is_empty());

    let te = tl.add_entry_point_info_entry(
        ExecutionState::Aarch32,
        &EntryPointParams {
            lr_svc: Some(0),
            ..params
        },
    )?;
    assert_eq!(te.data_size, 36);
    Ok(())
}

#[test]
fn unknown_tag_payload_is_shared_not_copied() -> Result<()> {
    let blob = bytes::Bytes::from_static(b"vendor blob");
    let mut tl = TransferList::new(0x1000, false)?;
    let te = tl.add_transfer_entry(0xff_0001, blob.clone())?;

    assert_eq!(te.data, blob);
    assert_eq!(te.data.as_ptr(), blob.as_ptr());
    assert_eq!(tag::name(0xff_0001), "unknown");

    let err = tl.add_transfer_entry(0x100_0000, blob).unwrap_err();
    assert!(matches!(err, TlError::InvalidTag(0x100_0000)));
    Ok(())
}
