// SPDX-License-Identifier: MIT

// Core modules
pub mod errors;
mod macros;

// Backend modules
#[cfg(feature = "mem")]
mod mem;

#[cfg(feature = "std")]
mod std;

// Prelude re-exports (central entrypoint)
pub mod prelude {
    pub use super::RexIO;
    pub use super::RexIOExt;
    pub use super::RexIOStructExt;
    pub use super::errors::*;

    #[cfg(feature = "mem")]
    pub use super::mem::MemRexIO;

    #[cfg(feature = "std")]
    pub use super::std::StdRexIO;
}

use errors::*;

/// Size of the internal scratch buffer used by streaming/chunked operations.
pub const BLOCK_BUF_SIZE: usize = 4096;

/// Chunk size used when large metadata regions are written in pieces.
pub const WRITE_CHUNK_SIZE: usize = 1024 * 1024;

/// Block IO abstraction trait.
///
/// Offsets are relative to the partition start; backends add their
/// partition offset before touching the underlying device.
pub trait RexIO {
    /// Writes `data` at `offset`.
    fn write_at(&mut self, offset: u64, data: &[u8]) -> RexIOResult;

    /// Reads `buf.len()` bytes into `buf` from `offset`.
    fn read_at(&mut self, offset: u64, buf: &mut [u8]) -> RexIOResult;

    /// Flushes any buffered data (may be a no-op).
    fn flush(&mut self) -> RexIOResult;

    fn set_offset(&mut self, partition_offset: u64) -> u64;
    fn partition_offset(&self) -> u64;
}

/// Extension helpers for RexIO.
///
/// - chunked reads/writes
/// - block best-effort reads/writes
/// - sector-aligned writes
/// - zero fill, primitive reads/writes
pub trait RexIOExt: RexIO {
    /// Reads `buf.len()` bytes from `offset` in chunks of `chunk_size` or less.
    #[inline(always)]
    fn read_in_chunks(&mut self, offset: u64, buf: &mut [u8], chunk_size: usize) -> RexIOResult {
        let mut off = offset;
        for chunk in buf.chunks_mut(chunk_size.max(1)) {
            self.read_at(off, chunk)?;
            off += chunk.len() as u64;
        }
        Ok(())
    }

    /// Writes `buf.len()` bytes at `offset` in chunks of `chunk_size` or less.
    #[inline(always)]
    fn write_in_chunks(&mut self, offset: u64, buf: &[u8], chunk_size: usize) -> RexIOResult {
        let mut off = offset;
        for chunk in buf.chunks(chunk_size.max(1)) {
            self.write_at(off, chunk)?;
            off += chunk.len() as u64;
        }
        Ok(())
    }

    /// Reads a block or range of blocks of `block_size` starting at `offset`.
    ///
    /// Aligned requests go through a single read, anything else falls back
    /// to chunked reads.
    #[inline(always)]
    fn read_block_best_effort(
        &mut self,
        offset: u64,
        buf: &mut [u8],
        block_size: usize,
    ) -> RexIOResult {
        if offset.is_multiple_of(block_size as u64) && buf.len().is_multiple_of(block_size) {
            self.read_at(offset, buf)
        } else {
            self.read_in_chunks(offset, buf, BLOCK_BUF_SIZE)
        }
    }

    /// Writes a block or range of blocks of `block_size` starting at `offset`.
    #[inline(always)]
    fn write_block_best_effort(
        &mut self,
        offset: u64,
        buf: &[u8],
        block_size: usize,
    ) -> RexIOResult {
        if offset.is_multiple_of(block_size as u64) && buf.len().is_multiple_of(block_size) {
            self.write_at(offset, buf)
        } else {
            self.write_in_chunks(offset, buf, BLOCK_BUF_SIZE)
        }
    }

    /// Writes `buf` at `offset`, rejecting anything not aligned to `align`.
    ///
    /// Both the offset and the length must be multiples of `align`.
    #[inline]
    fn write_aligned(&mut self, offset: u64, buf: &[u8], align: usize) -> RexIOResult {
        if align == 0
            || !offset.is_multiple_of(align as u64)
            || !buf.len().is_multiple_of(align)
        {
            return Err(RexIOError::Misaligned {
                offset,
                len: buf.len(),
                align,
            });
        }
        self.write_in_chunks(offset, buf, WRITE_CHUNK_SIZE)
    }

    /// Fills a region with zeroes.
    #[inline(always)]
    fn zero_fill(&mut self, offset: u64, len: usize) -> RexIOResult {
        const ZERO_BUF: [u8; BLOCK_BUF_SIZE] = [0u8; BLOCK_BUF_SIZE];
        let mut remaining = len;
        let mut off = offset;
        while remaining > 0 {
            let chunk = remaining.min(ZERO_BUF.len());
            self.write_at(off, &ZERO_BUF[..chunk])?;
            off += chunk as u64;
            remaining -= chunk;
        }
        Ok(())
    }

    // read/write helpers for primitive types (u16, u32, u64)
    rexio_impl_primitive_rw!(u16, u32, u64);
}

impl<T: RexIO + ?Sized> RexIOExt for T {}

/// Extension trait for reading and writing structs using zerocopy.
pub trait RexIOStructExt: RexIO {
    /// Reads a struct of type `T` from the given offset.
    fn read_struct<T: zerocopy::FromBytes + zerocopy::KnownLayout + zerocopy::Immutable>(
        &mut self,
        offset: u64,
    ) -> RexIOResult<T> {
        let size = core::mem::size_of::<T>();
        if size > BLOCK_BUF_SIZE {
            return Err(RexIOError::Invalid("read_struct: type too large"));
        }
        let mut buf = [0u8; BLOCK_BUF_SIZE];
        self.read_at(offset, &mut buf[..size])?;
        T::read_from_bytes(&buf[..size]).map_err(|_| RexIOError::Other("read_struct failed"))
    }

    /// Writes a struct of type `T` at the given offset.
    fn write_struct<T: zerocopy::IntoBytes + zerocopy::Immutable>(
        &mut self,
        offset: u64,
        val: &T,
    ) -> RexIOResult {
        self.write_at(offset, val.as_bytes())
    }
}

impl<T: RexIO + ?Sized> RexIOStructExt for T {}
