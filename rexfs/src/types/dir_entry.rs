// SPDX-License-Identifier: MIT

use zerocopy::IntoBytes;

use crate::{constant::*, types::*};

/// A raw 32-byte directory record decoded by its type byte.
#[derive(Debug, Clone, Copy)]
pub enum DirEntry {
    EndOfDirectory,
    File(ExFatFileEntry),
    Stream(ExFatStreamEntry),
    Name(ExFatNameEntry),
    Bitmap(ExFatBitmapEntry),
    Upcase(ExFatUpcaseEntry),
    Label(ExFatVolumeLabelEntry),
    Guid(ExFatGuidEntry),
    /// In-use bit cleared.
    Deleted(ExFatGenericEntry),
    Unknown(ExFatGenericEntry),
}

impl DirEntry {
    pub fn decode(raw: &[u8; EXFAT_DIR_ENTRY_SIZE]) -> Self {
        match raw[0] {
            EXFAT_EOD => DirEntry::EndOfDirectory,
            EXFAT_ENTRY_FILE => DirEntry::File(zerocopy::transmute!(*raw)),
            EXFAT_ENTRY_STREAM => DirEntry::Stream(zerocopy::transmute!(*raw)),
            EXFAT_ENTRY_NAME => DirEntry::Name(zerocopy::transmute!(*raw)),
            EXFAT_ENTRY_BITMAP => DirEntry::Bitmap(zerocopy::transmute!(*raw)),
            EXFAT_ENTRY_UPCASE => DirEntry::Upcase(zerocopy::transmute!(*raw)),
            EXFAT_ENTRY_LABEL => DirEntry::Label(zerocopy::transmute!(*raw)),
            EXFAT_ENTRY_GUID => DirEntry::Guid(zerocopy::transmute!(*raw)),
            t if t & EXFAT_ENTRY_IN_USE == 0 => DirEntry::Deleted(zerocopy::transmute!(*raw)),
            _ => DirEntry::Unknown(zerocopy::transmute!(*raw)),
        }
    }

    /// Decodes every complete record in `raw`; a trailing partial record is ignored.
    pub fn decode_all(raw: &[u8]) -> Vec<DirEntry> {
        raw.chunks_exact(EXFAT_DIR_ENTRY_SIZE)
            .filter_map(|chunk| <&[u8; EXFAT_DIR_ENTRY_SIZE]>::try_from(chunk).ok())
            .map(DirEntry::decode)
            .collect()
    }

    pub fn entry_type(&self) -> u8 {
        self.as_bytes()[0]
    }

    /// Secondary entries (stream, name, vendor) have bit 6 set.
    pub fn is_secondary(&self) -> bool {
        let t = self.entry_type();
        t & EXFAT_ENTRY_IN_USE != 0 && t & EXFAT_ENTRY_SECONDARY != 0
    }

    pub fn as_bytes(&self) -> &[u8] {
        match self {
            DirEntry::EndOfDirectory => &[0u8; EXFAT_DIR_ENTRY_SIZE],
            DirEntry::File(e) => e.as_bytes(),
            DirEntry::Stream(e) => e.as_bytes(),
            DirEntry::Name(e) => e.as_bytes(),
            DirEntry::Bitmap(e) => e.as_bytes(),
            DirEntry::Upcase(e) => e.as_bytes(),
            DirEntry::Label(e) => e.as_bytes(),
            DirEntry::Guid(e) => e.as_bytes(),
            DirEntry::Deleted(e) | DirEntry::Unknown(e) => e.as_bytes(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_by_discriminant() {
        let mut raw = [0u8; 32];
        raw[0] = EXFAT_ENTRY_STREAM;
        raw[3] = 7;
        match DirEntry::decode(&raw) {
            DirEntry::Stream(s) => assert_eq!(s.name_length, 7),
            other => panic!("unexpected {other:?}"),
        }

        raw[0] = 0x05;
        assert!(matches!(DirEntry::decode(&raw), DirEntry::Deleted(_)));

        raw[0] = 0xE1;
        let entry = DirEntry::decode(&raw);
        assert!(matches!(entry, DirEntry::Unknown(_)));
        assert!(entry.is_secondary());

        assert!(matches!(
            DirEntry::decode(&[0u8; 32]),
            DirEntry::EndOfDirectory
        ));
    }

    #[test]
    fn test_decode_all_round_trips_bytes() {
        let label = ExFatVolumeLabelEntry::new(&"Elements".encode_utf16().collect::<Vec<_>>());
        let bitmap = ExFatBitmapEntry::new(2, 1000);
        let mut raw = Vec::new();
        label.to_raw_buffer(&mut raw);
        bitmap.to_raw_buffer(&mut raw);
        raw.extend_from_slice(&[0u8; 40]);

        let entries = DirEntry::decode_all(&raw);
        assert_eq!(entries.len(), 3);
        assert_eq!(entries[0].entry_type(), EXFAT_ENTRY_LABEL);
        assert_eq!(entries[0].as_bytes(), label.as_bytes());
        assert!(matches!(entries[1], DirEntry::Bitmap(b) if { b.first_cluster } == 2));
        assert!(matches!(entries[2], DirEntry::EndOfDirectory));
    }
}
