// SPDX-License-Identifier: MIT

use zerocopy::{FromBytes, Immutable, IntoBytes, KnownLayout};

use crate::{
    checksum,
    constant::*,
    types::{ExFatAttributes, StreamFlags},
    upcase::UpcaseTable,
    utils::time::ExFatTimestamp,
};

/// File directory entry: the primary entry of a file or directory entry set.
#[derive(IntoBytes, FromBytes, KnownLayout, Immutable, Copy, Clone, Debug)]
#[repr(C, packed)]
pub struct ExFatFileEntry {
    pub entry_type: u8,
    pub secondary_count: u8,
    pub set_checksum: u16,
    pub file_attributes: u16,
    pub reserved1: u16,
    pub create_timestamp: u32,
    pub modify_timestamp: u32,
    pub access_timestamp: u32,
    pub create_10ms_increment: u8,
    pub modify_10ms_increment: u8,
    pub create_utc_offset: u8,
    pub modify_utc_offset: u8,
    pub access_utc_offset: u8,
    pub reserved2: [u8; 7],
}

impl ExFatFileEntry {
    pub fn new(
        attributes: ExFatAttributes,
        secondary_count: u8,
        created: ExFatTimestamp,
        modified: ExFatTimestamp,
        accessed: ExFatTimestamp,
    ) -> Self {
        Self {
            entry_type: EXFAT_ENTRY_FILE,
            secondary_count,
            set_checksum: 0,
            file_attributes: attributes.bits(),
            reserved1: 0,
            create_timestamp: created.raw,
            modify_timestamp: modified.raw,
            access_timestamp: accessed.raw,
            create_10ms_increment: created.increment_10ms,
            modify_10ms_increment: modified.increment_10ms,
            create_utc_offset: created.utc_offset,
            modify_utc_offset: modified.utc_offset,
            access_utc_offset: accessed.utc_offset,
            reserved2: [0u8; 7],
        }
    }

    pub fn attributes(&self) -> ExFatAttributes {
        ExFatAttributes::from_bits_truncate(self.file_attributes)
    }

    pub fn created(&self) -> ExFatTimestamp {
        ExFatTimestamp::new(
            self.create_timestamp,
            self.create_10ms_increment,
            self.create_utc_offset,
        )
    }

    pub fn modified(&self) -> ExFatTimestamp {
        ExFatTimestamp::new(
            self.modify_timestamp,
            self.modify_10ms_increment,
            self.modify_utc_offset,
        )
    }

    /// Access times carry no 10 ms field.
    pub fn accessed(&self) -> ExFatTimestamp {
        ExFatTimestamp::new(self.access_timestamp, 0, self.access_utc_offset)
    }

    #[inline(always)]
    pub fn to_raw_buffer(&self, buf: &mut Vec<u8>) {
        buf.extend_from_slice(self.as_bytes());
    }
}

#[derive(IntoBytes, FromBytes, KnownLayout, Immutable, Copy, Clone, Debug)]
#[repr(C, packed)]
pub struct ExFatStreamEntry {
    pub entry_type: u8,
    pub general_secondary_flags: u8,
    pub reserved1: u8,
    pub name_length: u8,
    pub name_hash: u16,
    pub reserved2: u16,
    pub valid_data_length: u64,
    pub reserved3: u32,
    pub first_cluster: u32,
    pub data_length: u64,
}

impl ExFatStreamEntry {
    pub fn new(
        flags: StreamFlags,
        first_cluster: u32,
        data_length: u64,
        name_length: u8,
        name_hash: u16,
    ) -> Self {
        Self {
            entry_type: EXFAT_ENTRY_STREAM,
            general_secondary_flags: flags.bits(),
            reserved1: 0,
            name_length,
            name_hash,
            reserved2: 0,
            valid_data_length: data_length,
            reserved3: 0,
            first_cluster,
            data_length,
        }
    }

    pub fn flags(&self) -> StreamFlags {
        StreamFlags::from_bits_truncate(self.general_secondary_flags)
    }

    #[inline(always)]
    pub fn to_raw_buffer(&self, buf: &mut Vec<u8>) {
        buf.extend_from_slice(self.as_bytes());
    }
}

#[derive(IntoBytes, FromBytes, KnownLayout, Immutable, Copy, Clone, Debug)]
#[repr(C, packed)]
pub struct ExFatNameEntry {
    pub entry_type: u8,
    pub general_secondary_flags: u8,
    pub name_chars: [u16; EXFAT_NAME_ENTRY_CHARS],
}

impl ExFatNameEntry {
    pub fn new(name_chars: [u16; EXFAT_NAME_ENTRY_CHARS]) -> Self {
        Self {
            entry_type: EXFAT_ENTRY_NAME,
            general_secondary_flags: 0,
            name_chars,
        }
    }

    /// Splits a UTF-16 name into 15-character name entries.
    pub fn split(name: &[u16]) -> Vec<Self> {
        name.chunks(EXFAT_NAME_ENTRY_CHARS)
            .map(|chunk| {
                let mut chars = [0u16; EXFAT_NAME_ENTRY_CHARS];
                chars[..chunk.len()].copy_from_slice(chunk);
                Self::new(chars)
            })
            .collect()
    }

    #[inline(always)]
    pub fn to_raw_buffer(&self, buf: &mut Vec<u8>) {
        buf.extend_from_slice(self.as_bytes());
    }
}

#[derive(IntoBytes, FromBytes, KnownLayout, Immutable, Copy, Clone, Debug)]
#[repr(C, packed)]
pub struct ExFatBitmapEntry {
    pub entry_type: u8,
    pub bitmap_flags: u8,
    pub reserved: [u8; 18],
    pub first_cluster: u32,
    pub data_length: u64,
}

impl ExFatBitmapEntry {
    pub fn new(first_cluster: u32, data_length: u64) -> Self {
        Self {
            entry_type: EXFAT_ENTRY_BITMAP,
            bitmap_flags: 0,
            reserved: [0u8; 18],
            first_cluster,
            data_length,
        }
    }

    #[inline(always)]
    pub fn to_raw_buffer(&self, buf: &mut Vec<u8>) {
        buf.extend_from_slice(self.as_bytes());
    }
}

#[derive(IntoBytes, FromBytes, KnownLayout, Immutable, Copy, Clone, Debug)]
#[repr(C, packed)]
pub struct ExFatUpcaseEntry {
    pub entry_type: u8,
    pub reserved1: [u8; 3],
    pub table_checksum: u32,
    pub reserved2: [u8; 12],
    pub first_cluster: u32,
    pub data_length: u64,
}

impl ExFatUpcaseEntry {
    pub fn new(first_cluster: u32, table_len: u64, table_checksum: u32) -> Self {
        Self {
            entry_type: EXFAT_ENTRY_UPCASE,
            reserved1: [0u8; 3],
            table_checksum,
            reserved2: [0u8; 12],
            first_cluster,
            data_length: table_len,
        }
    }

    #[inline(always)]
    pub fn to_raw_buffer(&self, buf: &mut Vec<u8>) {
        buf.extend_from_slice(self.as_bytes());
    }
}

#[derive(IntoBytes, FromBytes, KnownLayout, Immutable, Copy, Clone, Debug)]
#[repr(C, packed)]
pub struct ExFatVolumeLabelEntry {
    pub entry_type: u8,
    pub character_count: u8,
    pub volume_label: [u16; EXFAT_LABEL_MAX_CHARS],
    pub reserved: u64,
}

impl ExFatVolumeLabelEntry {
    /// Builds a label entry; characters past the eleventh are dropped.
    pub fn new(label: &[u16]) -> Self {
        let count = label.len().min(EXFAT_LABEL_MAX_CHARS);
        let mut volume_label = [0u16; EXFAT_LABEL_MAX_CHARS];
        volume_label[..count].copy_from_slice(&label[..count]);

        Self {
            entry_type: EXFAT_ENTRY_LABEL,
            character_count: count as u8,
            volume_label,
            reserved: 0,
        }
    }

    #[inline(always)]
    pub fn to_raw_buffer(&self, buf: &mut Vec<u8>) {
        buf.extend_from_slice(self.as_bytes());
    }
}

#[derive(IntoBytes, FromBytes, KnownLayout, Immutable, Copy, Clone, Debug)]
#[repr(C, packed)]
pub struct ExFatGuidEntry {
    pub entry_type: u8,
    pub secondary_count: u8,
    pub set_checksum: u16,
    pub general_primary_flags: u16,
    pub guid: [u8; 16],
    pub reserved: [u8; 10],
}

/// Any 32-byte record, kept verbatim.
#[derive(IntoBytes, FromBytes, KnownLayout, Immutable, Copy, Clone, Debug)]
#[repr(C, packed)]
pub struct ExFatGenericEntry {
    pub entry_type: u8,
    pub data: [u8; 31],
}

/// A complete file entry set: file entry, stream extension and name entries.
#[derive(Debug, Clone)]
pub struct ExFatEntrySet {
    pub file: ExFatFileEntry,
    pub stream: ExFatStreamEntry,
    pub names: Vec<ExFatNameEntry>,
}

impl ExFatEntrySet {
    /// Builds a checksummed entry set for `name`.
    ///
    /// Names longer than 255 UTF-16 units are truncated.
    pub fn new(
        name: &str,
        attributes: ExFatAttributes,
        flags: StreamFlags,
        first_cluster: u32,
        data_length: u64,
        stamp: ExFatTimestamp,
        upcase: &UpcaseTable,
    ) -> Self {
        let mut utf16: Vec<u16> = name.encode_utf16().collect();
        utf16.truncate(EXFAT_MAX_NAME_UTF16_CHARS);

        let names = ExFatNameEntry::split(&utf16);
        let file = ExFatFileEntry::new(attributes, 1 + names.len() as u8, stamp, stamp, stamp);
        let stream = ExFatStreamEntry::new(
            flags,
            first_cluster,
            data_length,
            utf16.len() as u8,
            upcase.name_hash(&utf16),
        );

        let mut set = Self {
            file,
            stream,
            names,
        };
        set.refresh_checksum();
        set
    }

    #[inline]
    pub fn continuations(&self) -> u8 {
        self.file.secondary_count
    }

    pub fn refresh_checksum(&mut self) {
        let mut buf = Vec::with_capacity((2 + self.names.len()) * EXFAT_DIR_ENTRY_SIZE);
        self.to_raw_buffer(&mut buf);
        self.file.set_checksum = checksum::entry_set_checksum(&buf);
    }

    #[inline(always)]
    pub fn to_raw_buffer(&self, buf: &mut Vec<u8>) {
        self.file.to_raw_buffer(buf);
        self.stream.to_raw_buffer(buf);
        for name in &self.names {
            name.to_raw_buffer(buf);
        }
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        let mut buf = Vec::with_capacity((2 + self.names.len()) * EXFAT_DIR_ENTRY_SIZE);
        self.to_raw_buffer(&mut buf);
        buf
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use core::mem::size_of;

    #[test]
    fn test_entry_sizes() {
        assert_eq!(size_of::<ExFatFileEntry>(), 32);
        assert_eq!(size_of::<ExFatStreamEntry>(), 32);
        assert_eq!(size_of::<ExFatNameEntry>(), 32);
        assert_eq!(size_of::<ExFatBitmapEntry>(), 32);
        assert_eq!(size_of::<ExFatUpcaseEntry>(), 32);
        assert_eq!(size_of::<ExFatVolumeLabelEntry>(), 32);
        assert_eq!(size_of::<ExFatGuidEntry>(), 32);
        assert_eq!(size_of::<ExFatGenericEntry>(), 32);
    }

    #[test]
    fn test_stream_field_offsets() {
        let stream = ExFatStreamEntry::new(StreamFlags::NO_FAT_CHAIN, 0x1234, 0x10_0000, 5, 0xBEEF);
        let raw = stream.as_bytes();
        assert_eq!(raw[0], EXFAT_ENTRY_STREAM);
        assert_eq!(raw[1], 0x02);
        assert_eq!(raw[3], 5);
        assert_eq!(&raw[4..6], &0xBEEFu16.to_le_bytes());
        assert_eq!(&raw[20..24], &0x1234u32.to_le_bytes());
        assert_eq!(&raw[24..32], &0x10_0000u64.to_le_bytes());
    }

    #[test]
    fn test_entry_set_shape_and_checksum() {
        let upcase = UpcaseTable::generate();
        let name = "a-rather-long-file-name.bin";
        let set = ExFatEntrySet::new(
            name,
            ExFatAttributes::ARCHIVE,
            StreamFlags::ALLOCATION_POSSIBLE,
            20,
            4096,
            ExFatTimestamp::default(),
            &upcase,
        );
        // 27 characters need two name entries
        assert_eq!(set.names.len(), 2);
        assert_eq!(set.continuations(), 3);

        let bytes = set.to_bytes();
        assert_eq!(bytes.len(), 4 * 32);
        let stored = u16::from_le_bytes([bytes[2], bytes[3]]);
        assert_eq!(stored, checksum::entry_set_checksum(&bytes));
    }

    #[test]
    fn test_label_truncates() {
        let long: Vec<u16> = "ABCDEFGHIJKLMN".encode_utf16().collect();
        let label = ExFatVolumeLabelEntry::new(&long);
        assert_eq!(label.character_count, 11);
    }
}
