//! Transfer entries and the codec for their 8-byte sub-header.

use bytes::Bytes;
use serde::Serialize;
use zerocopy::{AsBytes, FromBytes};

use crate::wire::{byte_sum, Endianness, RawEntryHeader, TlError, TE_HDR_SIZE};

/// One tagged, length-prefixed payload inside a list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TransferEntry {
    /// 24-bit tag identifying the payload kind.
    pub id: u32,
    pub hdr_size: u8,
    pub data_size: u32,
    #[serde(skip)]
    pub data: Bytes,
    /// Absolute position of the sub-header in the serialized list.
    pub offset: usize,
}

/// Fields read back from a sub-header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EntryHeader {
    pub id: u32,
    pub hdr_size: u8,
    pub data_size: u32,
}

impl TransferEntry {
    /// Build an entry around `data`. The caller guarantees `id` fits 24 bits
    /// and `data` fits a u32 length.
    pub(crate) fn new(id: u32, data: Bytes, offset: usize) -> Self {
        Self {
            id,
            hdr_size: TE_HDR_SIZE,
            data_size: data.len() as u32,
            data,
            offset,
        }
    }

    /// Sub-header plus payload, padding excluded.
    pub fn size(&self) -> usize {
        self.hdr_size as usize + self.data_size as usize
    }

    /// Absolute position of the first payload byte.
    pub fn data_offset(&self) -> usize {
        self.offset + self.hdr_size as usize
    }

    /// Pack the sub-header in the given byte order.
    pub fn header_bytes(&self, order: Endianness) -> [u8; 8] {
        let raw = RawEntryHeader {
            tag_id: order.u24_bytes(self.id),
            hdr_size: self.hdr_size,
            data_size: order.u32_bytes(self.data_size),
        };
        let mut out = [0u8; 8];
        out.copy_from_slice(raw.as_bytes());
        out
    }

    /// Unpack a sub-header. Needs at least 8 bytes.
    pub fn parse_header(bytes: &[u8], order: Endianness) -> Result<EntryHeader, TlError> {
        let raw = RawEntryHeader::read_from_prefix(bytes).ok_or_else(|| {
            TlError::Malformed(format!(
                "entry sub-header needs {} bytes, got {}",
                TE_HDR_SIZE,
                bytes.len()
            ))
        })?;
        Ok(EntryHeader {
            id: order.read_u24(raw.tag_id),
            hdr_size: raw.hdr_size,
            data_size: order.read_u32(raw.data_size),
        })
    }

    /// Sum of the sub-header and payload bytes mod 256.
    ///
    /// Independent of byte order: both orders write the same bytes permuted.
    pub fn sum_of_bytes(&self) -> u8 {
        byte_sum(&self.header_bytes(Endianness::Little)).wrapping_add(byte_sum(&self.data))
    }
}
