// SPDX-License-Identifier: MIT

//! Bit-level helpers over byte slices.
//!
//! Bit `n` lives in byte `n / 8` at position `n % 8` (LSB first), which is
//! the ordering of the exFAT allocation bitmap.

pub trait BitmapOps {
    /// Out-of-range bits are ignored.
    fn set_bit(&mut self, bit: usize, value: bool);

    /// Out-of-range bits read as clear.
    fn get_bit(&self, bit: usize) -> bool;

    /// Sets every bit in `[start, end)`, clamped to the slice.
    fn set_range(&mut self, start: usize, end: usize);

    /// Clears every bit at or after `bit_len`.
    fn clear_tail(&mut self, bit_len: usize);

    fn count_ones(&self) -> usize;

    fn find_first_zero(&self, start: usize) -> Option<usize>;
}

impl BitmapOps for [u8] {
    #[inline]
    fn set_bit(&mut self, bit: usize, value: bool) {
        let mask = 1u8 << (bit & 7);
        if let Some(byte) = self.get_mut(bit >> 3) {
            if value {
                *byte |= mask;
            } else {
                *byte &= !mask;
            }
        }
    }

    #[inline]
    fn get_bit(&self, bit: usize) -> bool {
        self.get(bit >> 3).is_some_and(|b| b & (1 << (bit & 7)) != 0)
    }

    fn set_range(&mut self, start: usize, end: usize) {
        let end = end.min(self.len() * 8);
        let mut bit = start;
        while bit < end {
            // whole bytes in the middle of the range
            if bit & 7 == 0 && bit + 8 <= end {
                self[bit >> 3] = 0xFF;
                bit += 8;
            } else {
                self.set_bit(bit, true);
                bit += 1;
            }
        }
    }

    fn clear_tail(&mut self, bit_len: usize) {
        let full = bit_len >> 3;
        if full >= self.len() {
            return;
        }
        let keep = bit_len & 7;
        self[full] &= ((1u16 << keep) - 1) as u8;
        for byte in &mut self[full + 1..] {
            *byte = 0;
        }
    }

    fn count_ones(&self) -> usize {
        self.iter().map(|b| b.count_ones() as usize).sum()
    }

    fn find_first_zero(&self, start: usize) -> Option<usize> {
        let first = start >> 3;
        self.iter()
            .enumerate()
            .skip(first)
            .find_map(|(idx, &byte)| {
                // mask off bits below `start` in the first byte
                let masked = if idx == first {
                    byte | ((1u16 << (start & 7)) - 1) as u8
                } else {
                    byte
                };
                (masked != 0xFF).then(|| idx * 8 + masked.trailing_ones() as usize)
            })
    }
}
