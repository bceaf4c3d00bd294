// SPDX-License-Identifier: MIT

use std::io::{Read, Seek, SeekFrom, Write};

use crate::{RexIO, RexIOResult};

/// `RexIO` over anything that is `Read + Write + Seek` (files, block devices).
#[derive(Debug)]
pub struct StdRexIO<'a, T: Read + Write + Seek> {
    io: &'a mut T,
    partition_offset: u64,
}

impl<'a, T: Read + Write + Seek> StdRexIO<'a, T> {
    #[inline]
    pub fn new(io: &'a mut T) -> Self {
        Self {
            io,
            partition_offset: 0,
        }
    }

    #[inline]
    pub fn new_with_offset(io: &'a mut T, partition_offset: u64) -> Self {
        Self {
            io,
            partition_offset,
        }
    }
}

impl<'a, T: Read + Write + Seek> RexIO for StdRexIO<'a, T> {
    fn write_at(&mut self, offset: u64, data: &[u8]) -> RexIOResult {
        let abs_offset = self.partition_offset + offset;
        self.io.seek(SeekFrom::Start(abs_offset))?;
        self.io.write_all(data)?;
        Ok(())
    }

    fn read_at(&mut self, offset: u64, buf: &mut [u8]) -> RexIOResult {
        let abs_offset = self.partition_offset + offset;
        self.io.seek(SeekFrom::Start(abs_offset))?;
        self.io.read_exact(buf)?;
        Ok(())
    }

    fn flush(&mut self) -> RexIOResult {
        self.io.flush()?;
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
    use tempfile::tempfile;

    #[test]
    fn test_rw() {
        let mut file = tempfile().unwrap();
        let mut io = StdRexIO::new(&mut file);
        io.write_at(10, &[1, 2, 3, 4]).unwrap();

        let mut output = [0u8; 4];
        io.read_at(10, &mut output).unwrap();
        assert_eq!(output, [1, 2, 3, 4]);
    }

    #[test]
    fn test_partition_offset_applies() {
        let mut file = tempfile().unwrap();
        {
            let mut io = StdRexIO::new_with_offset(&mut file, 1024);
            io.write_u32_at(4, 0xDEAD_BEEF).unwrap();
        }
        let mut io = StdRexIO::new(&mut file);
        assert_eq!(io.read_u32_at(1028).unwrap(), 0xDEAD_BEEF);
    }

    #[test]
    fn test_short_read_is_eof() {
        let mut file = tempfile().unwrap();
        let mut io = StdRexIO::new(&mut file);
        io.write_at(0, &[0u8; 16]).unwrap();

        let mut buf = [0u8; 32];
        assert_eq!(io.read_at(0, &mut buf), Err(RexIOError::UnexpectedEof));
    }

    #[test]
    fn test_write_aligned_rejects_partial_sector() {
        let mut file = tempfile().unwrap();
        let mut io = StdRexIO::new(&mut file);

        assert!(io.write_aligned(512, &[0u8; 512], 512).is_ok());
        assert!(matches!(
            io.write_aligned(100, &[0u8; 512], 512),
            Err(RexIOError::Misaligned { offset: 100, .. })
        ));
        assert!(matches!(
            io.write_aligned(0, &[0u8; 100], 512),
            Err(RexIOError::Misaligned { len: 100, .. })
        ));
    }

    #[test]
    fn test_zero_fill() {
        let mut file = tempfile().unwrap();
        let mut io = StdRexIO::new(&mut file);

        io.write_at(42, &[0xFF; 8]).unwrap();
        io.zero_fill(42, 8).unwrap();

        let mut buf = [0xAA; 8];
        io.read_at(42, &mut buf).unwrap();

        assert_eq!(buf, [0u8; 8]);
    }
}
