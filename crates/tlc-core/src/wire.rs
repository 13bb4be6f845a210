//! Transfer List wire format — header, entry sub-header and their codecs.
//!
//! Producers and consumers in different boot stages agree on nothing but
//! these bytes, so layouts here never change without a version bump.
//!
//! Raw structs hold multi-byte fields as byte arrays; the host byte order
//! never leaks in. Conversion goes through [`Endianness`].

use serde::{Deserialize, Serialize};
use static_assertions::assert_eq_size;
use zerocopy::{AsBytes, FromBytes, FromZeroes};

// ── Constants ─────────────────────────────────────────────────────────────────

/// Magic value in the first four bytes of every Transfer List.
pub const TL_SIGNATURE: u32 = 0x4A0F_B10B;

/// Header version this crate produces and fully understands.
pub const TL_VERSION: u8 = 1;

/// Length of the fixed list header in bytes.
pub const TL_HDR_SIZE: u8 = 0x18;

/// Length of every entry sub-header in bytes.
pub const TE_HDR_SIZE: u8 = 8;

/// Default alignment exponent: entries start on 8-byte boundaries.
pub const DEFAULT_ALIGNMENT: u8 = 3;

/// Largest alignment exponent accepted when building a list (32 KiB).
pub const MAX_ALIGNMENT: u8 = 15;

/// Default capacity used by the tooling when none is given.
pub const DEFAULT_MAX_SIZE: u32 = 0x1000;

/// Flag bit 0: the checksum field is maintained.
pub const TL_FLAG_CHECKSUM: u32 = 0b1;

/// Tag ids are 24 bits wide on the wire.
pub const MAX_TAG_ID: u32 = 0x00FF_FFFF;

/// Standardized tag ids.
pub mod tag {
    pub const EMPTY: u32 = 0;
    pub const FDT: u32 = 1;
    pub const HOB_BLOCK: u32 = 2;
    pub const HOB_LIST: u32 = 3;
    pub const ACPI_TABLES: u32 = 4;
    pub const EVENT_LOG: u32 = 5;
    pub const TPM_CRB_BASE: u32 = 6;
    pub const OPTEE: u32 = 0x100;
    pub const SPMC_MANIFEST: u32 = 0x101;
    pub const EP_INFO: u32 = 0x102;
    pub const MEMORY_LAYOUT: u32 = 0x104;

    /// Human-readable name for a tag id, "unknown" for non-standard tags.
    pub fn name(id: u32) -> &'static str {
        match id {
            EMPTY => "empty",
            FDT => "fdt",
            HOB_BLOCK => "hob_block",
            HOB_LIST => "hob_list",
            ACPI_TABLES => "acpi_tables",
            EVENT_LOG => "event_log",
            TPM_CRB_BASE => "tpm_crb_base",
            OPTEE => "optee",
            SPMC_MANIFEST => "spmc_manifest",
            EP_INFO => "ep_info",
            MEMORY_LAYOUT => "memory_layout",
            _ => "unknown",
        }
    }

    /// Whether `id` is one of the standardized tags above.
    pub fn is_standard(id: u32) -> bool {
        name(id) != "unknown"
    }
}

// ── Byte order ────────────────────────────────────────────────────────────────

/// Byte order of every multi-byte field in a list.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Endianness {
    #[default]
    Little,
    Big,
}

impl Endianness {
    pub fn u32_bytes(self, value: u32) -> [u8; 4] {
        match self {
            Endianness::Little => value.to_le_bytes(),
            Endianness::Big => value.to_be_bytes(),
        }
    }

    pub fn read_u32(self, bytes: [u8; 4]) -> u32 {
        match self {
            Endianness::Little => u32::from_le_bytes(bytes),
            Endianness::Big => u32::from_be_bytes(bytes),
        }
    }

    /// Low 24 bits of `value` as a 3-byte field. The top byte is dropped.
    pub fn u24_bytes(self, value: u32) -> [u8; 3] {
        match self {
            Endianness::Little => {
                let b = value.to_le_bytes();
                [b[0], b[1], b[2]]
            }
            Endianness::Big => {
                let b = value.to_be_bytes();
                [b[1], b[2], b[3]]
            }
        }
    }

    /// Widen a 3-byte field with a zero high byte. Never sign-extends.
    pub fn read_u24(self, bytes: [u8; 3]) -> u32 {
        match self {
            Endianness::Little => u32::from_le_bytes([bytes[0], bytes[1], bytes[2], 0]),
            Endianness::Big => u32::from_be_bytes([0, bytes[0], bytes[1], bytes[2]]),
        }
    }

    /// Byte order whose reading of `signature` yields [`TL_SIGNATURE`].
    pub fn detect(signature: [u8; 4]) -> Option<Self> {
        if u32::from_le_bytes(signature) == TL_SIGNATURE {
            Some(Endianness::Little)
        } else if u32::from_be_bytes(signature) == TL_SIGNATURE {
            Some(Endianness::Big)
        } else {
            None
        }
    }
}

// ── Raw wire structs ──────────────────────────────────────────────────────────

/// The fixed list header exactly as it sits at offset 0 of a list.
///
/// Wire size: 24 bytes.
#[derive(Debug, Clone, AsBytes, FromBytes, FromZeroes)]
#[repr(C, packed)]
pub struct RawListHeader {
    pub signature: [u8; 4],
    /// Chosen so that every byte of the used region sums to 0 mod 256.
    pub checksum: u8,
    pub version: u8,
    pub hdr_size: u8,
    /// Entry alignment as a power-of-two exponent.
    pub alignment: u8,
    /// Bytes in use, header included, entry padding excluded.
    pub size: [u8; 4],
    /// Capacity ceiling.
    pub total_size: [u8; 4],
    pub flags: [u8; 4],
    /// Must be zero.
    pub reserved: [u8; 4],
}

// Any change here breaks every list already written.
assert_eq_size!(RawListHeader, [u8; 24]);

/// The sub-header that precedes every entry payload.
///
/// Wire size: 8 bytes.
#[derive(Debug, Clone, AsBytes, FromBytes, FromZeroes)]
#[repr(C, packed)]
pub struct RawEntryHeader {
    /// 24-bit tag id.
    pub tag_id: [u8; 3],
    pub hdr_size: u8,
    /// Payload length, padding excluded.
    pub data_size: [u8; 4],
}

assert_eq_size!(RawEntryHeader, [u8; 8]);

// ── Decoded header ────────────────────────────────────────────────────────────

/// Header fields of a list, decoded into host integers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ListHeader {
    pub signature: u32,
    pub checksum: u8,
    pub version: u8,
    pub hdr_size: u8,
    pub alignment: u8,
    pub size: u32,
    pub total_size: u32,
    pub flags: u32,
    /// Written as zero by this crate, carried as read otherwise.
    pub reserved: u32,
}

impl ListHeader {
    pub fn to_raw(&self, order: Endianness) -> RawListHeader {
        RawListHeader {
            signature: order.u32_bytes(self.signature),
            checksum: self.checksum,
            version: self.version,
            hdr_size: self.hdr_size,
            alignment: self.alignment,
            size: order.u32_bytes(self.size),
            total_size: order.u32_bytes(self.total_size),
            flags: order.u32_bytes(self.flags),
            reserved: order.u32_bytes(self.reserved),
        }
    }

    pub fn from_raw(raw: &RawListHeader, order: Endianness) -> Self {
        ListHeader {
            signature: order.read_u32(raw.signature),
            checksum: raw.checksum,
            version: raw.version,
            hdr_size: raw.hdr_size,
            alignment: raw.alignment,
            size: order.read_u32(raw.size),
            total_size: order.read_u32(raw.total_size),
            flags: order.read_u32(raw.flags),
            reserved: order.read_u32(raw.reserved),
        }
    }

    /// Byte sum of the header's wire image, folded field by field in wire order.
    pub fn sum_of_bytes(&self, order: Endianness) -> u8 {
        let mut sum = byte_sum(&order.u32_bytes(self.signature));
        sum = sum.wrapping_add(self.checksum);
        sum = sum.wrapping_add(self.version);
        sum = sum.wrapping_add(self.hdr_size);
        sum = sum.wrapping_add(self.alignment);
        sum = sum.wrapping_add(byte_sum(&order.u32_bytes(self.size)));
        sum = sum.wrapping_add(byte_sum(&order.u32_bytes(self.total_size)));
        sum = sum.wrapping_add(byte_sum(&order.u32_bytes(self.flags)));
        sum = sum.wrapping_add(byte_sum(&order.u32_bytes(self.reserved)));
        sum
    }

    pub fn checksum_enabled(&self) -> bool {
        self.flags & TL_FLAG_CHECKSUM != 0
    }
}

/// Sum of `bytes` mod 256.
pub fn byte_sum(bytes: &[u8]) -> u8 {
    bytes.iter().fold(0u8, |acc, b| acc.wrapping_add(*b))
}

/// Round `n` up to the next multiple of `2^exponent`.
pub fn align_up(n: usize, exponent: u8) -> usize {
    let granule = 1usize << exponent;
    (n + granule - 1) & !(granule - 1)
}

// ── Errors ────────────────────────────────────────────────────────────────────

/// Errors raised while building, reading or writing a Transfer List.
#[derive(Debug, thiserror::Error)]
pub enum TlError {
    #[error("transfer list needs {needed} bytes but capacity is {capacity}")]
    CapacityExceeded { needed: u64, capacity: u64 },

    #[error("tag 0x{0:x} not found in transfer list")]
    NotFound(u32),

    #[error("invalid tag id 0x{0:x}")]
    InvalidTag(u32),

    #[error("invalid execution state {0:?}, expected \"aarch64\" or \"aarch32\"")]
    InvalidExecutionState(String),

    #[error("invalid arguments: {0}")]
    InvalidArguments(String),

    #[error("malformed transfer list: {0}")]
    Malformed(String),

    #[error("transfer list version {0} is read-only")]
    ReadOnly(u8),

    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),
}

// ── Tests ─────────────────────────────────────────────────────────────────────
