use crate::*;

use tlc_core::Endianness;

#[test]
fn populated_list_round_trips_in_memory() -> Result<()> {
    let tl = populated_list(TransferListOptions::default())?;
    let image = tl.serialize()?;
    let loaded = TransferList::deserialize(&image)?;

    assert_eq!(loaded.header(), tl.header());
    assert_eq!(id_data(&loaded), id_data(&tl));
    assert_eq!(loaded.serialize()?, image);
    Ok(())
}

#[test]
fn round_trip_across_alignments_and_orders() -> Result<()> {
    for endianness in [Endianness::Little, Endianness::Big] {
        for alignment in [0u8, 2, 3, 4, 5] {
            let tl = populated_list(TransferListOptions {
                alignment,
                endianness,
                ..TransferListOptions::default()
            })?;
            let loaded = TransferList::deserialize(&tl.serialize()?)?;
            assert_eq!(loaded, tl, "alignment {alignment}, {endianness:?}");

            let granule = 1usize << alignment;
            for te in loaded.entries() {
                assert_eq!(te.offset % granule, 0);
            }
        }
    }
    Ok(())
}

#[test]
fn typed_payloads_decode_after_load() -> Result<()> {
    let tl = populated_list(TransferListOptions::default())?;
    let loaded = TransferList::deserialize(&tl.serialize()?)?;

    for (orig, back) in tl.entries().iter().zip(loaded.entries()) {
        assert_eq!(tl.decode_entry(orig)?, loaded.decode_entry(back)?);
    }
    Ok(())
}

#[test]
fn checksum_survives_every_step() -> Result<()> {
    let mut tl = TransferList::new(0x1000, true)?;
    assert_eq!(image_sum(&tl)?, 0);
    for len in [0usize, 1, 7, 8, 9, 255] {
        tl.add_transfer_entry(0x8000 + len as u32, vec![0xa5u8; len])?;
        assert_eq!(image_sum(&tl)?, 0, "after adding {len} bytes");
    }
    tl.remove_tag(0x8007)?;
    assert_eq!(image_sum(&tl)?, 0);

    let loaded = TransferList::deserialize(&tl.serialize()?)?;
    assert!(loaded.verify_checksum());
    Ok(())
}
