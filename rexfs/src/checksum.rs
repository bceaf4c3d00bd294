// SPDX-License-Identifier: MIT

//! Rolling checksums used by exFAT.
//!
//! All three share the recurrence `acc = ror(acc, 1) + byte`; they differ in
//! word width and in which bytes are left out.

use core::mem::offset_of;

use crate::types::ExFatBootSector;

/// Word abstraction for the "rotate-right then add byte" checksum.
pub trait RollingWord: Copy + Default {
    fn ror1(self) -> Self;
    fn add_byte(self, b: u8) -> Self;
}

impl RollingWord for u16 {
    #[inline(always)]
    fn ror1(self) -> Self {
        self.rotate_right(1)
    }
    #[inline(always)]
    fn add_byte(self, b: u8) -> Self {
        self.wrapping_add(b as u16)
    }
}

impl RollingWord for u32 {
    #[inline(always)]
    fn ror1(self) -> Self {
        self.rotate_right(1)
    }
    #[inline(always)]
    fn add_byte(self, b: u8) -> Self {
        self.wrapping_add(b as u32)
    }
}

/// Core accumulator. `escape(i)` returning true skips byte `i`.
#[inline(always)]
pub fn accumulate_with_escape<T, F>(sum: &mut T, data: &[u8], mut escape: F)
where
    T: RollingWord,
    F: FnMut(usize) -> bool,
{
    for (i, &b) in data.iter().enumerate() {
        if escape(i) {
            continue;
        }
        *sum = sum.ror1().add_byte(b);
    }
}

#[inline(always)]
pub fn accumulate<T: RollingWord>(sum: &mut T, data: &[u8]) {
    accumulate_with_escape(sum, data, |_| false);
}

#[inline(always)]
pub fn checksum<T: RollingWord>(data: &[u8]) -> T {
    let mut sum = T::default();
    accumulate(&mut sum, data);
    sum
}

const VOLUME_FLAGS_OFFSET: usize = offset_of!(ExFatBootSector, volume_flags);
const PERCENT_IN_USE_OFFSET: usize = offset_of!(ExFatBootSector, percent_in_use);

/// Super-block bytes left out of the boot checksum (volume flags, percent in use).
pub const BOOT_CHECKSUM_EXCLUDED: [usize; 3] = [
    VOLUME_FLAGS_OFFSET,
    VOLUME_FLAGS_OFFSET + 1,
    PERCENT_IN_USE_OFFSET,
];

/// Boot-region checksum over `region`, which starts at the super block.
///
/// Callers pass the sectors preceding the checksum sector.
pub fn boot_checksum(region: &[u8]) -> u32 {
    let mut sum = 0u32;
    accumulate_with_escape(&mut sum, region, |i| BOOT_CHECKSUM_EXCLUDED.contains(&i));
    sum
}

/// Entry-set checksum over `continuations + 1` raw 32-byte entries.
///
/// Bytes 2 and 3 of the primary entry hold the stored checksum and are skipped.
pub fn entry_set_checksum(entries: &[u8]) -> u16 {
    let mut sum = 0u16;
    accumulate_with_escape(&mut sum, entries, |i| i == 2 || i == 3);
    sum
}

/// Checksum over the full upcase table content.
#[inline]
pub fn upcase_checksum(table: &[u8]) -> u32 {
    checksum::<u32>(table)
}

/// Name hash over upcased UTF-16 code units, low byte first.
pub fn name_hash(upcased: impl IntoIterator<Item = u16>) -> u16 {
    let mut sum = 0u16;
    for unit in upcased {
        accumulate(&mut sum, &unit.to_le_bytes());
    }
    sum
}
