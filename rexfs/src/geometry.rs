// SPDX-License-Identifier: MIT

use crate::{constant::*, errors::*};

/// Physical description of the volume being rebuilt.
///
/// Sector-valued fields are relative to the start of the partition, except
/// `partition_start_sector`, which locates the partition on the device.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VolumeGeometry {
    pub sectors_per_cluster: u32,
    /// Number of FAT entries, including the two reserved ones.
    pub fat_entries: u32,
    pub partition_start_sector: u64,
    pub volume_sectors: u64,
    pub fat_offset_sectors: u32,
    pub cluster_heap_offset_sectors: u32,
    pub volume_serial: u32,
    pub volume_label: String,
}

impl Default for VolumeGeometry {
    fn default() -> Self {
        Self {
            sectors_per_cluster: EXFAT_SECTORS_PER_CLUSTER,
            fat_entries: EXFAT_FAT_ENTRIES,
            partition_start_sector: EXFAT_PARTITION_START_SECTOR,
            volume_sectors: EXFAT_VOLUME_SECTORS,
            fat_offset_sectors: EXFAT_FAT_OFFSET_SECTORS,
            cluster_heap_offset_sectors: EXFAT_CLUSTER_HEAP_OFFSET_SECTORS,
            volume_serial: EXFAT_VOLUME_SERIAL,
            volume_label: EXFAT_VOLUME_LABEL.to_string(),
        }
    }
}

impl VolumeGeometry {
    #[inline(always)]
    pub fn bytes_per_sector(&self) -> u32 {
        EXFAT_SECTOR_SIZE
    }

    #[inline(always)]
    pub fn cluster_size(&self) -> u64 {
        self.sectors_per_cluster as u64 * EXFAT_SECTOR_SIZE as u64
    }

    /// Clusters in the heap (the bitmap's bit count).
    #[inline(always)]
    pub fn heap_clusters(&self) -> u32 {
        self.fat_entries.saturating_sub(EXFAT_FIRST_CLUSTER)
    }

    #[inline]
    pub fn fat_length_sectors(&self) -> u32 {
        (self.fat_entries as u64 * EXFAT_FAT_ENTRY_SIZE as u64).div_ceil(EXFAT_SECTOR_SIZE as u64)
            as u32
    }

    #[inline]
    pub fn fat_offset(&self) -> u64 {
        self.fat_offset_sectors as u64 * EXFAT_SECTOR_SIZE as u64
    }

    #[inline]
    pub fn cluster_heap_offset(&self) -> u64 {
        self.cluster_heap_offset_sectors as u64 * EXFAT_SECTOR_SIZE as u64
    }

    #[inline]
    pub fn cluster_heap_end(&self) -> u64 {
        self.cluster_heap_offset() + self.heap_clusters() as u64 * self.cluster_size()
    }

    /// Byte offset of the partition on the device.
    #[inline]
    pub fn partition_offset(&self) -> u64 {
        self.partition_start_sector * EXFAT_SECTOR_SIZE as u64
    }

    /// Byte offset of `cluster` relative to the partition start.
    #[inline]
    pub fn cluster_offset(&self, cluster: u32) -> u64 {
        self.cluster_heap_offset()
            + cluster.saturating_sub(EXFAT_FIRST_CLUSTER) as u64 * self.cluster_size()
    }

    /// Cluster holding the partition-relative byte `offset`, if inside the heap.
    pub fn cluster_of(&self, offset: u64) -> Option<u32> {
        if offset < self.cluster_heap_offset() || offset >= self.cluster_heap_end() {
            return None;
        }
        let index = (offset - self.cluster_heap_offset()) / self.cluster_size();
        Some(index as u32 + EXFAT_FIRST_CLUSTER)
    }

    #[inline]
    pub fn heap_contains(&self, offset: u64, len: u64) -> bool {
        offset >= self.cluster_heap_offset()
            && offset
                .checked_add(len)
                .is_some_and(|end| end <= self.cluster_heap_end())
    }

    #[inline]
    pub fn clusters_for(&self, bytes: u64) -> u64 {
        bytes.div_ceil(self.cluster_size())
    }

    #[inline]
    pub fn bitmap_bytes(&self) -> u64 {
        (self.heap_clusters() as u64).div_ceil(8)
    }

    #[inline]
    pub fn sector_shift(&self) -> u8 {
        EXFAT_SECTOR_SIZE.trailing_zeros() as u8
    }

    #[inline]
    pub fn cluster_shift(&self) -> u8 {
        self.sectors_per_cluster.trailing_zeros() as u8
    }

    pub fn label_utf16(&self) -> Vec<u16> {
        self.volume_label.encode_utf16().collect()
    }

    pub fn validate(&self) -> GeometryResult {
        crate::ensure!(
            self.sectors_per_cluster.is_power_of_two(),
            GeometryError::Invalid("sectors per cluster must be a power of two")
        );
        // 32 MiB cluster ceiling
        crate::ensure!(
            self.cluster_shift() + self.sector_shift() <= 25,
            GeometryError::Invalid("cluster size exceeds 32 MiB")
        );
        crate::ensure!(
            self.fat_entries > EXFAT_FIRST_CLUSTER,
            GeometryError::Invalid("FAT must hold at least one data cluster")
        );
        crate::ensure!(
            self.fat_entries <= FAT_MAX_CLUSTER + 1,
            GeometryError::Invalid("FAT entry count exceeds the cluster index range")
        );
        crate::ensure!(
            self.fat_offset_sectors >= EXFAT_MIN_FAT_OFFSET_SECTORS,
            GeometryError::Invalid("FAT overlaps the boot regions")
        );
        crate::ensure!(
            self.fat_offset_sectors as u64 + self.fat_length_sectors() as u64
                <= self.cluster_heap_offset_sectors as u64,
            GeometryError::Invalid("FAT overlaps the cluster heap")
        );
        let heap_sectors = self.heap_clusters() as u64 * self.sectors_per_cluster as u64;
        crate::ensure!(
            self.cluster_heap_offset_sectors as u64 + heap_sectors <= self.volume_sectors,
            GeometryError::Invalid("cluster heap extends past the end of the volume")
        );
        crate::ensure!(
            self.label_utf16().len() <= EXFAT_LABEL_MAX_CHARS,
            GeometryError::Invalid("volume label longer than 11 characters")
        );
        Ok(())
    }
}

/// Eight 4 KiB-cluster volume of 62 heap clusters, laid out from sector 0.
#[cfg(test)]
pub(crate) fn small_test_geometry() -> VolumeGeometry {
    VolumeGeometry {
        sectors_per_cluster: 8,
        fat_entries: 64,
        partition_start_sector: 0,
        volume_sectors: 32 + 62 * 8,
        fat_offset_sectors: 24,
        cluster_heap_offset_sectors: 32,
        ..Default::default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reference_volume_is_valid() {
        let geo = VolumeGeometry::default();
        geo.validate().unwrap();
        assert_eq!(geo.cluster_size(), 256 * 1024);
        assert_eq!(geo.heap_clusters(), 0xE8DB77);
        assert_eq!(geo.bitmap_bytes(), 1_907_567);
        assert_eq!(geo.cluster_shift(), 9);
    }

    #[test]
    fn test_cluster_offset_roundtrip() {
        let geo = VolumeGeometry::default();
        let off = geo.cluster_offset(10) + 96;
        assert_eq!(geo.cluster_of(off), Some(10));
        assert_eq!(geo.cluster_of(geo.cluster_heap_offset() - 1), None);
        assert_eq!(geo.cluster_of(geo.cluster_heap_end()), None);
    }

    #[test]
    fn test_rejects_fat_overlapping_heap() {
        let geo = VolumeGeometry {
            cluster_heap_offset_sectors: EXFAT_FAT_OFFSET_SECTORS + 10,
            ..Default::default()
        };
        assert_eq!(
            geo.validate(),
            Err(GeometryError::Invalid("FAT overlaps the cluster heap"))
        );
    }

    #[test]
    fn test_small_geometry_is_valid() {
        let geo = small_test_geometry();
        geo.validate().unwrap();
        assert_eq!(geo.cluster_heap_end(), 528 * 512);
        assert_eq!(geo.fat_length_sectors(), 1);
    }

    #[test]
    fn test_rejects_long_label() {
        let geo = VolumeGeometry {
            volume_label: "A label far too long".into(),
            ..Default::default()
        };
        assert!(geo.validate().is_err());
    }
}
