// SPDX-License-Identifier: MIT

use crate::{checksum, constant::*, types::ExFatUpcaseEntry};

/// Full 65536-entry case-folding table.
///
/// Identity everywhere except ASCII `a`-`z`, which fold to `A`-`Z`.
#[derive(Clone)]
pub struct UpcaseTable {
    table: Vec<u16>,
}

impl core::fmt::Debug for UpcaseTable {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("UpcaseTable")
            .field("entries", &self.table.len())
            .field("checksum", &format_args!("{:#010x}", self.checksum()))
            .finish()
    }
}

impl UpcaseTable {
    pub fn generate() -> Self {
        let mut table: Vec<u16> = (0..EXFAT_UPCASE_ENTRIES).map(|c| c as u16).collect();
        for c in b'a'..=b'z' {
            table[c as usize] = (c ^ 0x20) as u16;
        }
        Self { table }
    }

    #[inline(always)]
    pub fn map(&self, unit: u16) -> u16 {
        self.table[unit as usize]
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.table.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.table.is_empty()
    }

    #[inline]
    pub fn byte_len(&self) -> u64 {
        (self.table.len() * 2) as u64
    }

    /// Little-endian table content as stored on disk.
    pub fn to_bytes(&self) -> Vec<u8> {
        self.table.iter().flat_map(|c| c.to_le_bytes()).collect()
    }

    pub fn checksum(&self) -> u32 {
        checksum::upcase_checksum(&self.to_bytes())
    }

    /// Stream-entry name hash of `name`, folded through this table.
    pub fn name_hash(&self, name: &[u16]) -> u16 {
        checksum::name_hash(name.iter().map(|&c| self.map(c)))
    }

    /// Directory entry describing this table once it lives at `first_cluster`.
    pub fn entry(&self, first_cluster: u32) -> ExFatUpcaseEntry {
        ExFatUpcaseEntry::new(first_cluster, self.byte_len(), self.checksum())
    }
}
