// SPDX-License-Identifier: MIT

use crate::{RexIO, RexIOError, RexIOResult};

/// In-memory implementation of `RexIO`.
///
/// Useful for tests and for staging a volume image in RAM.
#[derive(Debug)]
pub struct MemRexIO<'a> {
    buffer: &'a mut [u8],
    partition_offset: u64,
}

impl<'a> MemRexIO<'a> {
    #[inline]
    pub fn new(buffer: &'a mut [u8]) -> Self {
        Self {
            buffer,
            partition_offset: 0,
        }
    }

    #[inline]
    pub fn new_with_offset(buffer: &'a mut [u8], partition_offset: u64) -> Self {
        Self {
            buffer,
            partition_offset,
        }
    }

    #[inline]
    fn range(&self, offset: u64, len: usize) -> RexIOResult<core::ops::Range<usize>> {
        let start = self
            .partition_offset
            .checked_add(offset)
            .ok_or(RexIOError::OutOfBounds)?;
        let end = start
            .checked_add(len as u64)
            .ok_or(RexIOError::OutOfBounds)?;
        if end > self.buffer.len() as u64 {
            return Err(RexIOError::OutOfBounds);
        }
        Ok(start as usize..end as usize)
    }
}

impl<'a> RexIO for MemRexIO<'a> {
    #[inline(always)]
    fn write_at(&mut self, offset: u64, data: &[u8]) -> RexIOResult {
        let range = self.range(offset, data.len())?;
        self.buffer[range].copy_from_slice(data);
        Ok(())
    }

    #[inline(always)]
    fn read_at(&mut self, offset: u64, buf: &mut [u8]) -> RexIOResult {
        let range = self.range(offset, buf.len())?;
        buf.copy_from_slice(&self.buffer[range]);
        Ok(())
    }

    #[inline]
    fn flush(&mut self) -> RexIOResult {
        Ok(())
    }

    #[inline]
    fn set_offset(&mut self, partition_offset: u64) -> u64 {
        self.partition_offset = partition_offset;
        partition_offset
    }

    #[inline]
    fn partition_offset(&self) -> u64 {
        self.partition_offset
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::prelude::*;

    #[test]
    fn test_rw() {
        let mut buf = [0u8; 256];
        let mut io = MemRexIO::new(&mut buf);
        io.write_at(10, &[1, 2, 3, 4]).unwrap();

        let mut output = [0u8; 4];
        io.read_at(10, &mut output).unwrap();
        assert_eq!(output, [1, 2, 3, 4]);
    }

    #[test]
    fn test_out_of_bounds() {
        let mut buf = [0u8; 64];
        let mut io = MemRexIO::new_with_offset(&mut buf, 32);

        assert!(io.write_at(0, &[0u8; 32]).is_ok());
        assert_eq!(io.write_at(1, &[0u8; 32]), Err(RexIOError::OutOfBounds));
        assert_eq!(io.read_at(u64::MAX, &mut [0u8; 1]), Err(RexIOError::OutOfBounds));
    }

    #[test]
    fn test_best_effort_rw_unaligned() {
        let mut buf = [0u8; 64];
        let mut io = MemRexIO::new(&mut buf);

        let input = [0xAB; 17];
        let mut output = [0u8; 17];

        io.write_block_best_effort(5, &input, 8).unwrap();
        io.read_block_best_effort(5, &mut output, 8).unwrap();

        assert_eq!(input, output);
    }

    #[test]
    fn test_primitive_rw() {
        let mut buf = [0u8; 32];
        let mut io = MemRexIO::new(&mut buf);

        io.write_u16_at(0, 0xAA55).unwrap();
        io.write_u64_at(8, 0x0123_4567_89AB_CDEF).unwrap();

        assert_eq!(io.read_u16_at(0).unwrap(), 0xAA55);
        assert_eq!(io.read_u64_at(8).unwrap(), 0x0123_4567_89AB_CDEF);
        drop(io);
        assert_eq!(&buf[..2], &[0x55, 0xAA]);
    }

    #[test]
    fn test_struct_rw() {
        let mut buf = [0u8; 16];
        let mut io = MemRexIO::new(&mut buf);

        io.write_struct(4, &0x1122_3344u32).unwrap();
        let back: u32 = io.read_struct(4).unwrap();
        assert_eq!(back, 0x1122_3344);
    }

    #[test]
    fn test_chunked_rw() {
        let mut buf = vec![0u8; 10_000];
        let mut io = MemRexIO::new(&mut buf);

        let input: Vec<u8> = (0..9_000u32).map(|i| (i % 251) as u8).collect();
        io.write_in_chunks(100, &input, 777).unwrap();

        let mut output = vec![0u8; input.len()];
        io.read_in_chunks(100, &mut output, 1000).unwrap();
        assert_eq!(input, output);
    }
}
