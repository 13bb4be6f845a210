//! Typed entry payloads — one variant per standardized tag.
//!
//! Every standardized tag has exactly one binary layout. Blob-carrying tags
//! (device tree, HOBs, ACPI tables, SPMC manifest) are stored verbatim; the
//! rest are small fixed structs encoded field by field in the list's byte
//! order. Encoding never fails: anything that could be invalid is rejected
//! when the variant is built.

use std::fmt;
use std::str::FromStr;

use bytes::{Buf, BufMut, Bytes, BytesMut};

use crate::wire::{tag, Endianness, TlError};

/// Logical size recorded in an aarch64 entry-point-info header.
pub const EP_INFO_AARCH64_SIZE: u16 = 88;

/// Logical size recorded in an aarch32 entry-point-info header.
pub const EP_INFO_AARCH32_SIZE: u16 = 36;

/// Argument slots of an aarch64 entry-point-info.
pub const EP_INFO_AARCH64_ARGS: usize = 8;

/// Argument slots of an aarch32 entry-point-info.
pub const EP_INFO_AARCH32_ARGS: usize = 4;

// ── Execution state ───────────────────────────────────────────────────────────

/// Execution state of the image an entry-point-info describes.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ExecutionState {
    #[default]
    Aarch64,
    Aarch32,
}

impl FromStr for ExecutionState {
    type Err = TlError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "aarch64" => Ok(ExecutionState::Aarch64),
            "aarch32" => Ok(ExecutionState::Aarch32),
            other => Err(TlError::InvalidExecutionState(other.to_string())),
        }
    }
}

impl fmt::Display for ExecutionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExecutionState::Aarch64 => f.write_str("aarch64"),
            ExecutionState::Aarch32 => f.write_str("aarch32"),
        }
    }
}

// ── Entry point info ──────────────────────────────────────────────────────────

/// Execution-state-independent description of an entry point, as supplied
/// by a caller before it is narrowed to one of the two layouts.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EntryPointParams {
    pub ep_type: u8,
    pub version: u8,
    pub attr: u32,
    pub pc: u64,
    pub spsr: u32,
    /// Required for aarch32, ignored for aarch64.
    pub lr_svc: Option<u32>,
    /// Zero-filled up to the number of slots of the chosen layout.
    pub args: Vec<u64>,
}

/// aarch64 entry point. Wire size: 88 bytes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EpInfo64 {
    pub ep_type: u8,
    pub version: u8,
    pub attr: u32,
    pub pc: u64,
    pub spsr: u32,
    pub args: [u64; EP_INFO_AARCH64_ARGS],
}

/// aarch32 entry point. Wire size: 36 bytes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EpInfo32 {
    pub ep_type: u8,
    pub version: u8,
    pub attr: u32,
    pub pc: u32,
    pub spsr: u32,
    pub lr_svc: u32,
    pub args: [u32; EP_INFO_AARCH32_ARGS],
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EntryPointInfo {
    Aarch64(EpInfo64),
    Aarch32(EpInfo32),
}

impl EntryPointInfo {
    /// Narrow `params` to the layout of `state`.
    pub fn build(state: ExecutionState, params: &EntryPointParams) -> Result<Self, TlError> {
        match state {
            ExecutionState::Aarch64 => {
                if params.args.len() > EP_INFO_AARCH64_ARGS {
                    return Err(TlError::InvalidArguments(format!(
                        "aarch64 entry point takes at most {} args, got {}",
                        EP_INFO_AARCH64_ARGS,
                        params.args.len()
                    )));
                }
                let mut args = [0u64; EP_INFO_AARCH64_ARGS];
                args[..params.args.len()].copy_from_slice(&params.args);
                Ok(EntryPointInfo::Aarch64(EpInfo64 {
                    ep_type: params.ep_type,
                    version: params.version,
                    attr: params.attr,
                    pc: params.pc,
                    spsr: params.spsr,
                    args,
                }))
            }
            ExecutionState::Aarch32 => {
                let lr_svc = params.lr_svc.ok_or_else(|| {
                    TlError::InvalidArguments("aarch32 entry point requires lr_svc".into())
                })?;
                if params.args.len() > EP_INFO_AARCH32_ARGS {
                    return Err(TlError::InvalidArguments(format!(
                        "aarch32 entry point takes at most {} args, got {}",
                        EP_INFO_AARCH32_ARGS,
                        params.args.len()
                    )));
                }
                let pc = narrow_u32("pc", params.pc)?;
                let mut args = [0u32; EP_INFO_AARCH32_ARGS];
                for (slot, arg) in args.iter_mut().zip(&params.args) {
                    *slot = narrow_u32("arg", *arg)?;
                }
                Ok(EntryPointInfo::Aarch32(EpInfo32 {
                    ep_type: params.ep_type,
                    version: params.version,
                    attr: params.attr,
                    pc,
                    spsr: params.spsr,
                    lr_svc,
                    args,
                }))
            }
        }
    }

    pub fn execution_state(&self) -> ExecutionState {
        match self {
            EntryPointInfo::Aarch64(_) => ExecutionState::Aarch64,
            EntryPointInfo::Aarch32(_) => ExecutionState::Aarch32,
        }
    }

    fn encode(&self, w: &mut PayloadWriter) {
        match self {
            EntryPointInfo::Aarch64(ep) => {
                w.u8(ep.ep_type);
                w.u8(ep.version);
                w.u16(EP_INFO_AARCH64_SIZE);
                w.u32(ep.attr);
                w.u64(ep.pc);
                w.u32(ep.spsr);
                w.zeros(4);
                for arg in ep.args {
                    w.u64(arg);
                }
            }
            EntryPointInfo::Aarch32(ep) => {
                w.u8(ep.ep_type);
                w.u8(ep.version);
                w.u16(EP_INFO_AARCH32_SIZE);
                w.u32(ep.attr);
                w.u32(ep.pc);
                w.u32(ep.spsr);
                w.u32(ep.lr_svc);
                for arg in ep.args {
                    w.u32(arg);
                }
            }
        }
    }

    /// The layout is chosen by payload length: 88 bytes is aarch64, 36 is aarch32.
    fn decode(r: &mut PayloadReader<'_>) -> Result<Self, TlError> {
        match r.remaining() {
            88 => {
                let ep_type = r.u8()?;
                let version = r.u8()?;
                let _size = r.u16()?;
                let attr = r.u32()?;
                let pc = r.u64()?;
                let spsr = r.u32()?;
                r.skip(4)?;
                let mut args = [0u64; EP_INFO_AARCH64_ARGS];
                for arg in args.iter_mut() {
                    *arg = r.u64()?;
                }
                Ok(EntryPointInfo::Aarch64(EpInfo64 {
                    ep_type,
                    version,
                    attr,
                    pc,
                    spsr,
                    args,
                }))
            }
            36 => {
                let ep_type = r.u8()?;
                let version = r.u8()?;
                let _size = r.u16()?;
                let attr = r.u32()?;
                let pc = r.u32()?;
                let spsr = r.u32()?;
                let lr_svc = r.u32()?;
                let mut args = [0u32; EP_INFO_AARCH32_ARGS];
                for arg in args.iter_mut() {
                    *arg = r.u32()?;
                }
                Ok(EntryPointInfo::Aarch32(EpInfo32 {
                    ep_type,
                    version,
                    attr,
                    pc,
                    spsr,
                    lr_svc,
                    args,
                }))
            }
            other => Err(TlError::Malformed(format!(
                "entry point info must be 88 or 36 bytes, got {other}"
            ))),
        }
    }
}

fn narrow_u32(field: &str, value: u64) -> Result<u32, TlError> {
    u32::try_from(value).map_err(|_| {
        TlError::InvalidArguments(format!(
            "aarch32 {field} 0x{value:x} does not fit in 32 bits"
        ))
    })
}

// ── Payloads ──────────────────────────────────────────────────────────────────

/// Semantic content of an entry with a standardized tag.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EntryPayload {
    /// Placeholder entry.
    Empty,
    /// Flattened device tree blob.
    Fdt(Bytes),
    HobBlock(Bytes),
    HobList(Bytes),
    /// Concatenated ACPI tables.
    AcpiTables(Bytes),
    EventLog { flags: u32, log: Bytes },
    TpmCrbBase { address: u64, size: u32 },
    /// OP-TEE pageable part address.
    OpTee { pp_addr: u64 },
    SpmcManifest(Bytes),
    EntryPoint(EntryPointInfo),
    MemoryLayout { addr: u64, size: u64 },
}

impl EntryPayload {
    pub fn tag(&self) -> u32 {
        match self {
            EntryPayload::Empty => tag::EMPTY,
            EntryPayload::Fdt(_) => tag::FDT,
            EntryPayload::HobBlock(_) => tag::HOB_BLOCK,
            EntryPayload::HobList(_) => tag::HOB_LIST,
            EntryPayload::AcpiTables(_) => tag::ACPI_TABLES,
            EntryPayload::EventLog { .. } => tag::EVENT_LOG,
            EntryPayload::TpmCrbBase { .. } => tag::TPM_CRB_BASE,
            EntryPayload::OpTee { .. } => tag::OPTEE,
            EntryPayload::SpmcManifest(_) => tag::SPMC_MANIFEST,
            EntryPayload::EntryPoint(_) => tag::EP_INFO,
            EntryPayload::MemoryLayout { .. } => tag::MEMORY_LAYOUT,
        }
    }

    /// Payload bytes in the given byte order.
    pub fn encode(&self, order: Endianness) -> Bytes {
        match self {
            EntryPayload::Fdt(blob)
            | EntryPayload::HobBlock(blob)
            | EntryPayload::HobList(blob)
            | EntryPayload::AcpiTables(blob)
            | EntryPayload::SpmcManifest(blob) => blob.clone(),
            EntryPayload::Empty => {
                let mut w = PayloadWriter::new(order, 4);
                w.zeros(4);
                w.finish()
            }
            EntryPayload::EventLog { flags, log } => {
                let mut w = PayloadWriter::new(order, 4 + log.len());
                w.u32(*flags);
                w.raw(log);
                w.finish()
            }
            EntryPayload::TpmCrbBase { address, size } => {
                let mut w = PayloadWriter::new(order, 12);
                w.u64(*address);
                w.u32(*size);
                w.finish()
            }
            EntryPayload::OpTee { pp_addr } => {
                let mut w = PayloadWriter::new(order, 8);
                w.u64(*pp_addr);
                w.finish()
            }
            EntryPayload::EntryPoint(ep) => {
                let mut w = PayloadWriter::new(order, EP_INFO_AARCH64_SIZE as usize);
                ep.encode(&mut w);
                w.finish()
            }
            EntryPayload::MemoryLayout { addr, size } => {
                let mut w = PayloadWriter::new(order, 16);
                w.u64(*addr);
                w.u64(*size);
                w.finish()
            }
        }
    }

    /// Interpret raw entry data by tag. Unknown tags are `InvalidTag`, data
    /// too short for a fixed layout is `Malformed`.
    pub fn decode(tag_id: u32, data: &Bytes, order: Endianness) -> Result<Self, TlError> {
        let mut r = PayloadReader::new(data, order);
        let payload = match tag_id {
            tag::EMPTY => EntryPayload::Empty,
            tag::FDT => EntryPayload::Fdt(data.clone()),
            tag::HOB_BLOCK => EntryPayload::HobBlock(data.clone()),
            tag::HOB_LIST => EntryPayload::HobList(data.clone()),
            tag::ACPI_TABLES => EntryPayload::AcpiTables(data.clone()),
            tag::SPMC_MANIFEST => EntryPayload::SpmcManifest(data.clone()),
            tag::EVENT_LOG => {
                let flags = r.u32()?;
                EntryPayload::EventLog {
                    flags,
                    log: data.slice(4..),
                }
            }
            tag::TPM_CRB_BASE => EntryPayload::TpmCrbBase {
                address: r.u64()?,
                size: r.u32()?,
            },
            tag::OPTEE => EntryPayload::OpTee { pp_addr: r.u64()? },
            tag::EP_INFO => EntryPayload::EntryPoint(EntryPointInfo::decode(&mut r)?),
            tag::MEMORY_LAYOUT => EntryPayload::MemoryLayout {
                addr: r.u64()?,
                size: r.u64()?,
            },
            other => return Err(TlError::InvalidTag(other)),
        };
        Ok(payload)
    }
}

impl fmt::Display for EntryPayload {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EntryPayload::Empty => write!(f, "empty"),
            EntryPayload::Fdt(b) => write!(f, "fdt ({} bytes)", b.len()),
            EntryPayload::HobBlock(b) => write!(f, "hob block ({} bytes)", b.len()),
            EntryPayload::HobList(b) => write!(f, "hob list ({} bytes)", b.len()),
            EntryPayload::AcpiTables(b) => write!(f, "acpi tables ({} bytes)", b.len()),
            EntryPayload::SpmcManifest(b) => write!(f, "spmc manifest ({} bytes)", b.len()),
            EntryPayload::EventLog { flags, log } => {
                write!(f, "event log flags={flags:#x} ({} bytes)", log.len())
            }
            EntryPayload::TpmCrbBase { address, size } => {
                write!(f, "tpm crb base={address:#x} size={size:#x}")
            }
            EntryPayload::OpTee { pp_addr } => write!(f, "optee pp_addr={pp_addr:#x}"),
            EntryPayload::MemoryLayout { addr, size } => {
                write!(f, "memory layout addr={addr:#x} size={size:#x}")
            }
            EntryPayload::EntryPoint(EntryPointInfo::Aarch64(ep)) => write!(
                f,
                "aarch64 entry point pc={:#x} spsr={:#x} attr={:#x} args={:x?}",
                ep.pc, ep.spsr, ep.attr, ep.args
            ),
            EntryPayload::EntryPoint(EntryPointInfo::Aarch32(ep)) => write!(
                f,
                "aarch32 entry point pc={:#x} spsr={:#x} lr_svc={:#x} attr={:#x} args={:x?}",
                ep.pc, ep.spsr, ep.lr_svc, ep.attr, ep.args
            ),
        }
    }
}

// ── Field codec ───────────────────────────────────────────────────────────────

struct PayloadWriter {
    buf: BytesMut,
    order: Endianness,
}

impl PayloadWriter {
    fn new(order: Endianness, capacity: usize) -> Self {
        Self {
            buf: BytesMut::with_capacity(capacity),
            order,
        }
    }

    fn u8(&mut self, v: u8) {
        self.buf.put_u8(v);
    }

    fn u16(&mut self, v: u16) {
        match self.order {
            Endianness::Little => self.buf.put_u16_le(v),
            Endianness::Big => self.buf.put_u16(v),
        }
    }

    fn u32(&mut self, v: u32) {
        match self.order {
            Endianness::Little => self.buf.put_u32_le(v),
            Endianness::Big => self.buf.put_u32(v),
        }
    }

    fn u64(&mut self, v: u64) {
        match self.order {
            Endianness::Little => self.buf.put_u64_le(v),
            Endianness::Big => self.buf.put_u64(v),
        }
    }

    fn zeros(&mut self, n: usize) {
        self.buf.put_bytes(0, n);
    }

    fn raw(&mut self, bytes: &[u8]) {
        self.buf.put_slice(bytes);
    }

    fn finish(self) -> Bytes {
        self.buf.freeze()
    }
}

struct PayloadReader<'a> {
    buf: &'a [u8],
    order: Endianness,
}

impl<'a> PayloadReader<'a> {
    fn new(buf: &'a [u8], order: Endianness) -> Self {
        Self { buf, order }
    }

    fn remaining(&self) -> usize {
        self.buf.remaining()
    }

    fn need(&self, n: usize) -> Result<(), TlError> {
        if self.buf.remaining() < n {
            return Err(TlError::Malformed(format!(
                "payload truncated: need {n} more bytes, have {}",
                self.buf.remaining()
            )));
        }
        Ok(())
    }

    fn skip(&mut self, n: usize) -> Result<(), TlError> {
        self.need(n)?;
        self.buf.advance(n);
        Ok(())
    }

    fn u8(&mut self) -> Result<u8, TlError> {
        self.need(1)?;
        Ok(self.buf.get_u8())
    }

    fn u16(&mut self) -> Result<u16, TlError> {
        self.need(2)?;
        Ok(match self.order {
            Endianness::Little => self.buf.get_u16_le(),
            Endianness::Big => self.buf.get_u16(),
        })
    }

    fn u32(&mut self) -> Result<u32, TlError> {
        self.need(4)?;
        Ok(match self.order {
            Endianness::Little => self.buf.get_u32_le(),
            Endianness::Big => self.buf.get_u32(),
        })
    }

    fn u64(&mut self) -> Result<u64, TlError> {
        self.need(8)?;
        Ok(match self.order {
            Endianness::Little => self.buf.get_u64_le(),
            Endianness::Big => self.buf.get_u64(),
        })
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    fn ep_params() -> EntryPointParams {
        EntryPointParams {
            ep_type: 0x01,
            version: 0x02,
            attr: 8,
            pc: 67239936,
            spsr: 965,
            lr_svc: None,
            args: vec![67112976, 67112960, 0, 0, 0, 0, 0, 0],
        }
    }

    #[test]
    fn memory_layout_is_two_le_u64() {
        let payload = EntryPayload::MemoryLayout {
            addr: 0x10,
            size: 0x33000,
        };
        let mut expected = Vec::new();
        expected.extend_from_slice(&0x10u64.to_le_bytes());
        expected.extend_from_slice(&0x33000u64.to_le_bytes());
        assert_eq!(payload.encode(Endianness::Little).as_ref(), expected.as_slice());
        assert_eq!(payload.tag(), tag::MEMORY_LAYOUT);
    }

    #[test]
    fn optee_decodes_back() {
        let payload = EntryPayload::OpTee { pp_addr: 100 };
        let data = payload.encode(Endianness::Little);
        assert_eq!(data.len(), 8);
        let decoded = EntryPayload::decode(tag::OPTEE, &data, Endianness::Little).unwrap();
        assert_eq!(decoded, EntryPayload::OpTee { pp_addr: 100 });
    }

    #[test]
    fn empty_is_four_zero_bytes() {
        assert_eq!(
            EntryPayload::Empty.encode(Endianness::Little).as_ref(),
            &[0u8; 4]
        );
    }

    #[test]
    fn event_log_prefixes_flags() {
        let payload = EntryPayload::EventLog {
            flags: 0x1,
            log: Bytes::from_static(b"log"),
        };
        assert_eq!(
            payload.encode(Endianness::Big).as_ref(),
            &[0, 0, 0, 1, b'l', b'o', b'g']
        );
        let decoded = EntryPayload::decode(
            tag::EVENT_LOG,
            &payload.encode(Endianness::Little),
            Endianness::Little,
        )
        .unwrap();
        assert_eq!(decoded, payload);
    }

    #[test]
    fn tpm_crb_base_is_twelve_bytes() {
        let payload = EntryPayload::TpmCrbBase {
            address: 0xfed4_0000,
            size: 0x1000,
        };
        let data = payload.encode(Endianness::Little);
        assert_eq!(data.len(), 12);
        assert_eq!(&data[8..], &0x1000u32.to_le_bytes());
    }

    #[test]
    fn blobs_are_verbatim() {
        let blob = Bytes::from_static(&[0xd0, 0x0d, 0xfe, 0xed]);
        for payload in [
            EntryPayload::Fdt(blob.clone()),
            EntryPayload::HobBlock(blob.clone()),
            EntryPayload::HobList(blob.clone()),
            EntryPayload::AcpiTables(blob.clone()),
            EntryPayload::SpmcManifest(blob.clone()),
        ] {
            assert_eq!(payload.encode(Endianness::Big), blob);
        }
    }

    #[test]
    fn aarch64_entry_point_layout() {
        let ep = EntryPointInfo::build(ExecutionState::Aarch64, &ep_params()).unwrap();
        let data = EntryPayload::EntryPoint(ep).encode(Endianness::Little);
        assert_eq!(data.len(), 88);
        assert_eq!(data[0], 0x01);
        assert_eq!(data[1], 0x02);
        assert_eq!(&data[2..4], &88u16.to_le_bytes());
        assert_eq!(&data[4..8], &8u32.to_le_bytes());
        assert_eq!(&data[8..16], &67239936u64.to_le_bytes());
        assert_eq!(&data[16..20], &965u32.to_le_bytes());
        assert_eq!(&data[20..24], &[0u8; 4]);
        assert_eq!(&data[24..32], &67112976u64.to_le_bytes());
    }

    #[test]
    fn aarch32_entry_point_layout() {
        let params = EntryPointParams {
            spsr: 467,
            lr_svc: Some(0),
            args: vec![67112968, 67112960, 0, 0],
            ..ep_params()
        };
        let ep = EntryPointInfo::build(ExecutionState::Aarch32, &params).unwrap();
        assert_eq!(ep.execution_state(), ExecutionState::Aarch32);
        let data = EntryPayload::EntryPoint(ep.clone()).encode(Endianness::Little);
        assert_eq!(data.len(), 36);
        assert_eq!(&data[2..4], &36u16.to_le_bytes());
        assert_eq!(&data[8..12], &67239936u32.to_le_bytes());
        assert_eq!(&data[12..16], &467u32.to_le_bytes());
        assert_eq!(&data[16..20], &0u32.to_le_bytes());
        assert_eq!(&data[20..24], &67112968u32.to_le_bytes());

        let decoded = EntryPayload::decode(tag::EP_INFO, &data, Endianness::Little).unwrap();
        assert_eq!(decoded, EntryPayload::EntryPoint(ep));
    }

    #[test]
    fn aarch32_requires_lr_svc() {
        let params = EntryPointParams {
            args: vec![1, 2],
            ..ep_params()
        };
        let err = EntryPointInfo::build(ExecutionState::Aarch32, &params).unwrap_err();
        assert!(matches!(err, TlError::InvalidArguments(_)));
    }

    #[test]
    fn aarch32_rejects_wide_pc() {
        let params = EntryPointParams {
            pc: 0x1_0000_0000,
            lr_svc: Some(0),
            args: vec![],
            ..ep_params()
        };
        let err = EntryPointInfo::build(ExecutionState::Aarch32, &params).unwrap_err();
        assert!(matches!(err, TlError::InvalidArguments(_)));
    }

    #[test]
    fn too_many_args_rejected_short_lists_zero_filled() {
        let mut params = ep_params();
        params.args = vec![0; 9];
        assert!(EntryPointInfo::build(ExecutionState::Aarch64, &params).is_err());

        params.args = vec![7];
        match EntryPointInfo::build(ExecutionState::Aarch64, &params).unwrap() {
            EntryPointInfo::Aarch64(ep) => assert_eq!(ep.args, [7, 0, 0, 0, 0, 0, 0, 0]),
            other => panic!("expected aarch64, got {other:?}"),
        }
    }

    #[test]
    fn execution_state_parsing() {
        assert_eq!(
            "aarch32".parse::<ExecutionState>().unwrap(),
            ExecutionState::Aarch32
        );
        let err = "riscv64".parse::<ExecutionState>().unwrap_err();
        assert!(matches!(err, TlError::InvalidExecutionState(ref s) if s == "riscv64"));
    }

    #[test]
    fn decode_rejects_unknown_tag_and_short_data() {
        let data = Bytes::from_static(&[0u8; 4]);
        assert!(matches!(
            EntryPayload::decode(0x42, &data, Endianness::Little),
            Err(TlError::InvalidTag(0x42))
        ));
        assert!(matches!(
            EntryPayload::decode(tag::MEMORY_LAYOUT, &data, Endianness::Little),
            Err(TlError::Malformed(_))
        ));
    }
}
