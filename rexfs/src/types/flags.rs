// SPDX-License-Identifier: MIT

bitflags::bitflags! {
    /// File attributes of a file directory entry.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct ExFatAttributes: u16 {
        const READ_ONLY = 0x0001;
        const HIDDEN    = 0x0002;
        const SYSTEM    = 0x0004;
        const DIRECTORY = 0x0010;
        const ARCHIVE   = 0x0020;
    }
}

bitflags::bitflags! {
    /// General secondary flags of a stream extension entry.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct StreamFlags: u8 {
        const ALLOCATION_POSSIBLE = 0x01;
        /// Clusters are contiguous and the FAT chain is not maintained.
        const NO_FAT_CHAIN        = 0x02;
    }
}

bitflags::bitflags! {
    /// Volume flags of the boot sector (bytes 106-107).
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct VolumeFlags: u16 {
        const ACTIVE_FAT    = 0x0001;
        const VOLUME_DIRTY  = 0x0002;
        const MEDIA_FAILURE = 0x0004;
        const CLEAR_TO_ZERO = 0x0008;
    }
}

bitflags::bitflags! {
    /// Reconstruction state of an arena node.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct NodeFlags: u8 {
        const LINKED             = 0x01;
        /// Declared clusters overlapped an existing allocation.
        const CROSS_LINKED       = 0x02;
        const NAME_HASH_MISMATCH = 0x04;
        /// Parent came from the log record, not from cluster ownership.
        const EXPLICIT_PARENT    = 0x08;
        const ADOPTED            = 0x10;
    }
}

impl ExFatAttributes {
    #[inline]
    pub fn is_dir(self) -> bool {
        self.contains(ExFatAttributes::DIRECTORY)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unknown_attribute_bits_are_dropped() {
        let attr = ExFatAttributes::from_bits_truncate(0x8031);
        assert!(attr.is_dir());
        assert!(attr.contains(ExFatAttributes::ARCHIVE | ExFatAttributes::READ_ONLY));
        assert_eq!(attr.bits(), 0x0031);
    }

    #[test]
    fn test_stream_flags() {
        let flags = StreamFlags::from_bits_truncate(0x03);
        assert!(flags.contains(StreamFlags::NO_FAT_CHAIN));
        assert!(flags.contains(StreamFlags::ALLOCATION_POSSIBLE));
    }
}
