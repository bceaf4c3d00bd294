// SPDX-License-Identifier: MIT

//! Reads and validates file entry sets named by the recovery log.
//!
//! Nothing here touches the FAT, the bitmap or the tree: a set is either
//! fully decoded or rejected with an error carrying its offset.

use log::{trace, warn};
use rexio::prelude::*;
use time::OffsetDateTime;

use crate::{
    checksum,
    constant::*,
    errors::*,
    geometry::VolumeGeometry,
    types::*,
    upcase::UpcaseTable,
    utils::time::ExFatTimestamp,
};

/// Primary, stream extension and first name entry.
const PREFIX_LEN: usize = 3 * EXFAT_DIR_ENTRY_SIZE;

/// A validated file entry set.
#[derive(Debug, Clone)]
pub struct DecodedEntrySet {
    /// Partition-relative offset of the primary entry.
    pub offset: u64,
    pub continuations: u8,
    pub checksum: u16,
    pub attributes: ExFatAttributes,
    pub created: ExFatTimestamp,
    pub modified: ExFatTimestamp,
    pub accessed: ExFatTimestamp,
    pub stream_flags: StreamFlags,
    pub first_cluster: u32,
    pub data_length: u64,
    pub valid_data_length: u64,
    pub name: Vec<u16>,
    /// Hash as stored in the stream extension.
    pub name_hash: u16,
    pub name_hash_ok: bool,
    /// The `continuations + 1` entries as read.
    pub raw: Vec<u8>,
}

impl DecodedEntrySet {
    #[inline]
    pub fn is_dir(&self) -> bool {
        self.attributes.is_dir()
    }

    pub fn name_lossy(&self) -> String {
        String::from_utf16_lossy(&self.name)
    }

    /// Clusters covered by the declared data length.
    #[inline]
    pub fn clusters_needed(&self, cluster_size: u64) -> u64 {
        self.data_length.div_ceil(cluster_size)
    }

    pub fn created_at(&self) -> Option<OffsetDateTime> {
        self.created.to_datetime()
    }

    pub fn modified_at(&self) -> Option<OffsetDateTime> {
        self.modified.to_datetime()
    }

    pub fn accessed_at(&self) -> Option<OffsetDateTime> {
        self.accessed.to_datetime()
    }

    /// Size of the set on disk.
    #[inline]
    pub fn byte_len(&self) -> usize {
        (self.continuations as usize + 1) * EXFAT_DIR_ENTRY_SIZE
    }
}

#[inline]
fn check_continuations(offset: u64, continuations: u8) -> EntrySetResult {
    crate::ensure!(
        (EXFAT_MIN_CONTINUATIONS..=EXFAT_MAX_CONTINUATIONS).contains(&continuations),
        EntrySetError::MalformedEntrySet {
            offset,
            continuations
        }
    );
    Ok(())
}

/// Reads the raw entry set whose primary entry sits at `offset`.
///
/// Only the continuation count and the heap bounds are checked here.
pub fn read_entry_set<IO: RexIO + ?Sized>(
    io: &mut IO,
    geometry: &VolumeGeometry,
    offset: u64,
) -> EntrySetResult<Vec<u8>> {
    crate::ensure!(
        offset.is_multiple_of(EXFAT_DIR_ENTRY_SIZE as u64)
            && geometry.heap_contains(offset, PREFIX_LEN as u64),
        EntrySetError::OutOfRange { offset }
    );

    let mut raw = vec![0u8; PREFIX_LEN];
    io.read_at(offset, &mut raw)?;

    let continuations = raw[1];
    check_continuations(offset, continuations)?;

    let total = (continuations as usize + 1) * EXFAT_DIR_ENTRY_SIZE;
    crate::ensure!(
        geometry.heap_contains(offset, total as u64),
        EntrySetError::OutOfRange { offset }
    );
    if total > PREFIX_LEN {
        raw.resize(total, 0);
        io.read_at(offset + PREFIX_LEN as u64, &mut raw[PREFIX_LEN..])?;
    }
    Ok(raw)
}

fn unexpected(offset: u64, index: usize, entry: &DirEntry) -> EntrySetError {
    EntrySetError::UnexpectedEntryType {
        offset,
        index: index as u8,
        found: entry.entry_type(),
    }
}

/// Validates and decodes a raw entry set read from `offset`.
pub fn decode_entry_set(
    raw: &[u8],
    offset: u64,
    upcase: &UpcaseTable,
) -> EntrySetResult<DecodedEntrySet> {
    crate::ensure!(raw.len() >= PREFIX_LEN, EntrySetError::Other("short entry set"));
    let continuations = raw[1];
    check_continuations(offset, continuations)?;
    crate::ensure!(
        raw.len() == (continuations as usize + 1) * EXFAT_DIR_ENTRY_SIZE,
        EntrySetError::MalformedEntrySet {
            offset,
            continuations
        }
    );

    let stored = u16::from_le_bytes([raw[2], raw[3]]);
    let computed = checksum::entry_set_checksum(raw);
    crate::ensure!(
        stored == computed,
        EntrySetError::ChecksumMismatch {
            offset,
            stored,
            computed
        }
    );

    let entries = DirEntry::decode_all(raw);
    let DirEntry::File(file) = entries[0] else {
        return Err(unexpected(offset, 0, &entries[0]));
    };
    let DirEntry::Stream(stream) = entries[1] else {
        return Err(unexpected(offset, 1, &entries[1]));
    };

    let name_length = stream.name_length as usize;
    let name_entries = name_length.div_ceil(EXFAT_NAME_ENTRY_CHARS);
    crate::ensure!(
        name_length > 0 && 2 + name_entries <= entries.len(),
        EntrySetError::InvalidName { offset }
    );

    let mut name = Vec::with_capacity(name_entries * EXFAT_NAME_ENTRY_CHARS);
    for (index, entry) in entries.iter().enumerate().skip(2) {
        match entry {
            DirEntry::Name(n) if index < 2 + name_entries => {
                let chars = n.name_chars;
                name.extend_from_slice(&chars);
            }
            e if index >= 2 + name_entries && e.is_secondary() => {}
            e => return Err(unexpected(offset, index, e)),
        }
    }
    name.truncate(name_length);

    let name_hash = stream.name_hash;
    let name_hash_ok = upcase.name_hash(&name) == name_hash;
    if !name_hash_ok {
        warn!(
            "name hash mismatch at {offset:#x} for \"{}\"",
            String::from_utf16_lossy(&name)
        );
    }
    trace!("decoded entry set at {offset:#x} ({continuations} continuations)");

    Ok(DecodedEntrySet {
        offset,
        continuations,
        checksum: stored,
        attributes: file.attributes(),
        created: file.created(),
        modified: file.modified(),
        accessed: file.accessed(),
        stream_flags: stream.flags(),
        first_cluster: stream.first_cluster,
        data_length: stream.data_length,
        valid_data_length: stream.valid_data_length,
        name,
        name_hash,
        name_hash_ok,
        raw: raw.to_vec(),
    })
}

/// Reads then decodes the entry set at `offset`.
pub fn reconstruct_entry_set<IO: RexIO + ?Sized>(
    io: &mut IO,
    geometry: &VolumeGeometry,
    offset: u64,
    upcase: &UpcaseTable,
) -> EntrySetResult<DecodedEntrySet> {
    let raw = read_entry_set(io, geometry, offset)?;
    decode_entry_set(&raw, offset, upcase)
}
