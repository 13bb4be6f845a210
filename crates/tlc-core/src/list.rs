//! The Transfer List: a fixed header followed by aligned, tagged entries.
//!
//! A list is built in memory and serialized on demand. Every successful
//! mutation leaves it in a consistent state:
//!   - `size == hdr_size + Σ entry.size()` (entry padding is not counted),
//!   - `size <= total_size`,
//!   - the byte sum of the serialized image is 0 mod 256.
//!
//! The checksum is recomputed in full after every mutation. Lists are a few
//! KiB at most, so the linear cost is not worth an incremental scheme.

use std::io::{Read, Seek, SeekFrom, Write};
use std::path::Path;

use bytes::Bytes;
use serde::Serialize;
use zerocopy::{AsBytes, FromBytes};

use crate::entry::TransferEntry;
use crate::payload::{EntryPayload, EntryPointInfo, EntryPointParams, ExecutionState};
use crate::wire::{
    align_up, Endianness, ListHeader, RawListHeader, TlError, DEFAULT_ALIGNMENT,
    DEFAULT_MAX_SIZE, MAX_ALIGNMENT, MAX_TAG_ID, TE_HDR_SIZE, TL_FLAG_CHECKSUM, TL_HDR_SIZE,
    TL_SIGNATURE, TL_VERSION,
};

/// Construction parameters for a new list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransferListOptions {
    /// Capacity ceiling in bytes, header included.
    pub max_size: u32,
    /// Set flag bit 0 (checksum maintained).
    pub checksum: bool,
    /// Remaining header flag bits, stored as given. Bit 0 follows `checksum`.
    pub flags: u32,
    /// Entry alignment exponent.
    pub alignment: u8,
    pub endianness: Endianness,
}

impl Default for TransferListOptions {
    fn default() -> Self {
        Self {
            max_size: DEFAULT_MAX_SIZE,
            checksum: true,
            flags: 0,
            alignment: DEFAULT_ALIGNMENT,
            endianness: Endianness::Little,
        }
    }
}

/// Operations a list header permits, by the firmware handoff rules.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TlOps {
    /// Header is invalid; the list must not be used.
    None,
    /// Current version: read and write.
    All,
    /// Newer version: entries may be read but not modified.
    ReadOnly,
    /// Older version: only operations the caller knows to be compatible.
    Custom,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransferList {
    header: ListHeader,
    endianness: Endianness,
    entries: Vec<TransferEntry>,
}

impl TransferList {
    /// Empty list with default alignment and little-endian fields.
    pub fn new(max_size: u32, checksum: bool) -> Result<Self, TlError> {
        Self::with_options(TransferListOptions {
            max_size,
            checksum,
            ..TransferListOptions::default()
        })
    }

    pub fn with_options(opts: TransferListOptions) -> Result<Self, TlError> {
        if opts.max_size < TL_HDR_SIZE as u32 {
            return Err(TlError::CapacityExceeded {
                needed: TL_HDR_SIZE as u64,
                capacity: opts.max_size as u64,
            });
        }
        if opts.alignment > MAX_ALIGNMENT {
            return Err(TlError::InvalidArguments(format!(
                "alignment exponent {} exceeds {}",
                opts.alignment, MAX_ALIGNMENT
            )));
        }

        let mut tl = Self {
            header: ListHeader {
                signature: TL_SIGNATURE,
                checksum: 0,
                version: TL_VERSION,
                hdr_size: TL_HDR_SIZE,
                alignment: opts.alignment,
                size: TL_HDR_SIZE as u32,
                total_size: opts.max_size,
                flags: if opts.checksum {
                    opts.flags | TL_FLAG_CHECKSUM
                } else {
                    opts.flags & !TL_FLAG_CHECKSUM
                },
                reserved: 0,
            },
            endianness: opts.endianness,
            entries: Vec::new(),
        };
        tl.update_checksum();
        Ok(tl)
    }

    // ── Accessors ─────────────────────────────────────────────────────────────

    pub fn header(&self) -> &ListHeader {
        &self.header
    }

    pub fn signature(&self) -> u32 {
        self.header.signature
    }

    pub fn checksum(&self) -> u8 {
        self.header.checksum
    }

    pub fn version(&self) -> u8 {
        self.header.version
    }

    pub fn hdr_size(&self) -> u8 {
        self.header.hdr_size
    }

    pub fn alignment(&self) -> u8 {
        self.header.alignment
    }

    pub fn size(&self) -> u32 {
        self.header.size
    }

    pub fn total_size(&self) -> u32 {
        self.header.total_size
    }

    pub fn flags(&self) -> u32 {
        self.header.flags
    }

    pub fn endianness(&self) -> Endianness {
        self.endianness
    }

    pub fn entries(&self) -> &[TransferEntry] {
        &self.entries
    }

    /// First entry with `tag_id`, in insertion order.
    pub fn find(&self, tag_id: u32) -> Option<&TransferEntry> {
        self.entries.iter().find(|te| te.id == tag_id)
    }

    /// Absolute offset of the payload of the first entry with `tag_id`.
    pub fn get_entry_data_offset(&self, tag_id: u32) -> Result<usize, TlError> {
        self.find(tag_id)
            .map(TransferEntry::data_offset)
            .ok_or(TlError::NotFound(tag_id))
    }

    /// Interpret an entry's data through its standardized layout.
    pub fn decode_entry(&self, te: &TransferEntry) -> Result<EntryPayload, TlError> {
        EntryPayload::decode(te.id, &te.data, self.endianness)
    }

    // ── Mutation ──────────────────────────────────────────────────────────────

    /// Append an entry. On failure the list is left untouched.
    pub fn add_transfer_entry(
        &mut self,
        tag_id: u32,
        data: impl Into<Bytes>,
    ) -> Result<&TransferEntry, TlError> {
        self.ensure_writable()?;
        if tag_id > MAX_TAG_ID {
            return Err(TlError::InvalidTag(tag_id));
        }

        let data = data.into();
        let needed = self.header.size as u64 + TE_HDR_SIZE as u64 + data.len() as u64;
        if needed > self.header.total_size as u64 {
            return Err(TlError::CapacityExceeded {
                needed,
                capacity: self.header.total_size as u64,
            });
        }

        let te = TransferEntry::new(tag_id, data, self.next_offset());
        self.header.size += te.size() as u32;
        tracing::debug!(
            tag = %format!("{tag_id:#x}"),
            data_size = te.data_size,
            offset = te.offset,
            size = self.header.size,
            "added transfer entry"
        );
        self.entries.push(te);
        self.update_checksum();

        let last = self.entries.len() - 1;
        Ok(&self.entries[last])
    }

    /// Append an entry built from a typed payload.
    pub fn add_payload(&mut self, payload: &EntryPayload) -> Result<&TransferEntry, TlError> {
        let data = payload.encode(self.endianness);
        self.add_transfer_entry(payload.tag(), data)
    }

    /// Append an entry whose payload is the verbatim contents of `path`.
    pub fn add_entry_from_file(
        &mut self,
        tag_id: u32,
        path: impl AsRef<Path>,
    ) -> Result<&TransferEntry, TlError> {
        let data = std::fs::read(path.as_ref())?;
        self.add_transfer_entry(tag_id, data)
    }

    pub fn add_empty_entry(&mut self) -> Result<&TransferEntry, TlError> {
        self.add_payload(&EntryPayload::Empty)
    }

    pub fn add_fdt_entry(&mut self, fdt: impl Into<Bytes>) -> Result<&TransferEntry, TlError> {
        self.add_payload(&EntryPayload::Fdt(fdt.into()))
    }

    pub fn add_hob_block_entry(
        &mut self,
        hob_block: impl Into<Bytes>,
    ) -> Result<&TransferEntry, TlError> {
        self.add_payload(&EntryPayload::HobBlock(hob_block.into()))
    }

    pub fn add_hob_list_entry(
        &mut self,
        hob_list: impl Into<Bytes>,
    ) -> Result<&TransferEntry, TlError> {
        self.add_payload(&EntryPayload::HobList(hob_list.into()))
    }

    pub fn add_acpi_tables_entry(
        &mut self,
        tables: impl Into<Bytes>,
    ) -> Result<&TransferEntry, TlError> {
        self.add_payload(&EntryPayload::AcpiTables(tables.into()))
    }

    pub fn add_event_log_entry(
        &mut self,
        flags: u32,
        log: impl Into<Bytes>,
    ) -> Result<&TransferEntry, TlError> {
        self.add_payload(&EntryPayload::EventLog {
            flags,
            log: log.into(),
        })
    }

    pub fn add_tpm_crb_base_entry(
        &mut self,
        address: u64,
        size: u32,
    ) -> Result<&TransferEntry, TlError> {
        self.add_payload(&EntryPayload::TpmCrbBase { address, size })
    }

    pub fn add_optee_entry(&mut self, pp_addr: u64) -> Result<&TransferEntry, TlError> {
        self.add_payload(&EntryPayload::OpTee { pp_addr })
    }

    pub fn add_spmc_manifest_entry(
        &mut self,
        manifest: impl Into<Bytes>,
    ) -> Result<&TransferEntry, TlError> {
        self.add_payload(&EntryPayload::SpmcManifest(manifest.into()))
    }

    pub fn add_entry_point_info_entry(
        &mut self,
        state: ExecutionState,
        params: &EntryPointParams,
    ) -> Result<&TransferEntry, TlError> {
        let ep = EntryPointInfo::build(state, params)?;
        self.add_payload(&EntryPayload::EntryPoint(ep))
    }

    pub fn add_memory_layout_entry(
        &mut self,
        addr: u64,
        size: u64,
    ) -> Result<&TransferEntry, TlError> {
        self.add_payload(&EntryPayload::MemoryLayout { addr, size })
    }

    /// Remove every entry with `tag_id`. Returns how many were removed.
    pub fn remove_tag(&mut self, tag_id: u32) -> Result<usize, TlError> {
        self.ensure_writable()?;

        let before = self.entries.len();
        self.entries.retain(|te| te.id != tag_id);
        let removed = before - self.entries.len();

        // surviving entries move up to close the gaps
        let mut offset = align_up(self.header.hdr_size as usize, self.header.alignment);
        for te in &mut self.entries {
            te.offset = offset;
            offset = align_up(offset + te.size(), self.header.alignment);
        }

        self.header.size = self.header.hdr_size as u32
            + self.entries.iter().map(|te| te.size() as u32).sum::<u32>();
        self.update_checksum();

        tracing::debug!(
            tag = %format!("{tag_id:#x}"),
            removed,
            size = self.header.size,
            "removed transfer entries"
        );
        Ok(removed)
    }

    fn ensure_writable(&self) -> Result<(), TlError> {
        if self.header.version > TL_VERSION {
            return Err(TlError::ReadOnly(self.header.version));
        }
        Ok(())
    }

    /// Serialized position of the next appended entry's sub-header.
    fn next_offset(&self) -> usize {
        match self.entries.last() {
            Some(te) => align_up(te.offset + te.size(), self.header.alignment),
            None => align_up(self.header.hdr_size as usize, self.header.alignment),
        }
    }

    // ── Checksum ──────────────────────────────────────────────────────────────

    /// Byte sum of header and entries mod 256. Padding is zero and adds nothing.
    fn sum_of_bytes(&self) -> u8 {
        self.entries
            .iter()
            .fold(self.header.sum_of_bytes(self.endianness), |acc, te| {
                acc.wrapping_add(te.sum_of_bytes())
            })
    }

    fn update_checksum(&mut self) {
        self.header.checksum = 0;
        self.header.checksum = self.sum_of_bytes().wrapping_neg();
    }

    /// True when the serialized image sums to 0 mod 256.
    pub fn verify_checksum(&self) -> bool {
        self.sum_of_bytes() == 0
    }

    /// Classify the header.
    pub fn check_header(&self) -> TlOps {
        let h = &self.header;
        if h.signature != TL_SIGNATURE
            || h.total_size == 0
            || h.size > h.total_size
            || h.hdr_size != TL_HDR_SIZE
            || (h.checksum_enabled() && !self.verify_checksum())
            || h.version == 0
        {
            return TlOps::None;
        }
        match h.version.cmp(&TL_VERSION) {
            std::cmp::Ordering::Equal => TlOps::All,
            std::cmp::Ordering::Greater => TlOps::ReadOnly,
            std::cmp::Ordering::Less => TlOps::Custom,
        }
    }

    // ── Serialization ─────────────────────────────────────────────────────────

    /// The list's wire image: header, then each entry followed by zero
    /// padding up to the next alignment boundary.
    pub fn serialize(&self) -> Result<Vec<u8>, TlError> {
        let alignment = self.header.alignment;
        let total_size = self.header.total_size as usize;

        let mut out = Vec::with_capacity(self.header.size as usize);
        out.extend_from_slice(self.header.to_raw(self.endianness).as_bytes());
        out.resize(align_up(out.len(), alignment), 0);

        for te in &self.entries {
            let te_base = out.len();
            debug_assert_eq!(te_base, te.offset);
            if te_base + te.size() > total_size {
                return Err(TlError::CapacityExceeded {
                    needed: (te_base + te.size()) as u64,
                    capacity: total_size as u64,
                });
            }
            out.extend_from_slice(&te.header_bytes(self.endianness));
            out.extend_from_slice(&te.data);
            out.resize(align_up(te_base + te.size(), alignment), 0);
        }
        Ok(out)
    }

    pub fn write_to<W: Write>(&self, mut writer: W) -> Result<(), TlError> {
        writer.write_all(&self.serialize()?)?;
        writer.flush()?;
        Ok(())
    }

    pub fn write_to_file(&self, path: impl AsRef<Path>) -> Result<(), TlError> {
        let path = path.as_ref();
        std::fs::write(path, self.serialize()?)?;
        tracing::debug!(
            path = %path.display(),
            entries = self.entries.len(),
            size = self.header.size,
            "wrote transfer list"
        );
        Ok(())
    }

    /// Parse a list from its wire image.
    pub fn deserialize(bytes: &[u8]) -> Result<Self, TlError> {
        Self::read_from(std::io::Cursor::new(bytes))
    }

    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, TlError> {
        let file = std::fs::File::open(path.as_ref())?;
        Self::read_from(std::io::BufReader::new(file))
    }

    /// Read a list starting at the reader's current position. Entry offsets
    /// are recorded relative to that position.
    ///
    /// The header is validated: bad signature, header size, version 0,
    /// `size > total_size` and (when the checksum flag is set) a checksum
    /// mismatch are all `Malformed`. The stored checksum is kept as read.
    pub fn read_from<R: Read + Seek>(mut reader: R) -> Result<Self, TlError> {
        let base = reader.stream_position()?;

        let mut raw_bytes = [0u8; TL_HDR_SIZE as usize];
        read_exact_or_malformed(&mut reader, &mut raw_bytes, "list header")?;
        let raw = RawListHeader::read_from(&raw_bytes[..])
            .ok_or_else(|| TlError::Malformed("list header".into()))?;

        let endianness = Endianness::detect(raw.signature).ok_or_else(|| {
            TlError::Malformed(format!("bad signature {:02x?}", raw.signature))
        })?;
        let header = ListHeader::from_raw(&raw, endianness);
        validate_header(&header)?;
        if header.reserved != 0 {
            tracing::warn!(
                reserved = %format!("{:#x}", header.reserved),
                "reserved header word is non-zero"
            );
        }

        let alignment = header.alignment;
        let mut entries = Vec::new();
        let mut used = header.hdr_size as u64;
        let mut cursor = align_up(header.hdr_size as usize, alignment);

        while used < header.size as u64 {
            reader.seek(SeekFrom::Start(base + cursor as u64))?;

            let mut sub = [0u8; TE_HDR_SIZE as usize];
            read_exact_or_malformed(&mut reader, &mut sub, "entry sub-header")?;
            let eh = TransferEntry::parse_header(&sub, endianness)?;
            if eh.hdr_size != TE_HDR_SIZE {
                return Err(TlError::Malformed(format!(
                    "entry at {cursor:#x} has sub-header size {}",
                    eh.hdr_size
                )));
            }

            used += TE_HDR_SIZE as u64 + eh.data_size as u64;
            if used > header.size as u64 {
                return Err(TlError::Malformed(format!(
                    "entry at {cursor:#x} runs past the used size {:#x}",
                    header.size
                )));
            }

            // bounded by what the stream actually holds, not by data_size
            let mut data = Vec::new();
            (&mut reader)
                .take(eh.data_size as u64)
                .read_to_end(&mut data)?;
            if data.len() != eh.data_size as usize {
                return Err(TlError::Malformed(format!(
                    "truncated entry payload at {cursor:#x}: {} of {} bytes",
                    data.len(),
                    eh.data_size
                )));
            }

            let te = TransferEntry::new(eh.id, Bytes::from(data), cursor);
            cursor = align_up(cursor + te.size(), alignment);
            entries.push(te);
        }

        let tl = Self {
            header,
            endianness,
            entries,
        };

        if tl.header.checksum_enabled() && !tl.verify_checksum() {
            return Err(TlError::Malformed(format!(
                "checksum {:#04x} does not verify",
                tl.header.checksum
            )));
        }
        if tl.check_header() == TlOps::ReadOnly {
            tracing::warn!(version = tl.header.version, "transfer list is read-only");
        }

        tracing::debug!(
            entries = tl.entries.len(),
            size = tl.header.size,
            ?endianness,
            "loaded transfer list"
        );
        Ok(tl)
    }
}

fn validate_header(h: &ListHeader) -> Result<(), TlError> {
    if h.hdr_size != TL_HDR_SIZE {
        return Err(TlError::Malformed(format!(
            "header size {:#x}, expected {:#x}",
            h.hdr_size, TL_HDR_SIZE
        )));
    }
    if h.version == 0 {
        return Err(TlError::Malformed("version 0 is invalid".into()));
    }
    if h.total_size == 0 {
        return Err(TlError::Malformed("total size is zero".into()));
    }
    if h.size > h.total_size || h.size < h.hdr_size as u32 {
        return Err(TlError::Malformed(format!(
            "used size {:#x} outside [{:#x}, {:#x}]",
            h.size, h.hdr_size, h.total_size
        )));
    }
    if h.alignment > MAX_ALIGNMENT {
        return Err(TlError::Malformed(format!(
            "alignment exponent {} exceeds {}",
            h.alignment, MAX_ALIGNMENT
        )));
    }
    Ok(())
}

fn read_exact_or_malformed<R: Read>(
    reader: &mut R,
    buf: &mut [u8],
    what: &str,
) -> Result<(), TlError> {
    reader.read_exact(buf).map_err(|e| match e.kind() {
        std::io::ErrorKind::UnexpectedEof => TlError::Malformed(format!("truncated {what}")),
        _ => TlError::Io(e),
    })
}

// ── Tests ─────────────────────────────────────────────────────────────────────
