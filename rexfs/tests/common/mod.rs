// SPDX-License-Identifier: MIT

#![allow(dead_code)]

use rexfs::{constant::*, prelude::*};

/// 4 KiB clusters, 62 heap clusters. Bitmap lands on cluster 2, the upcase
/// table on 3..=34 and the first root cluster on 35.
pub fn small_geometry() -> VolumeGeometry {
    VolumeGeometry {
        sectors_per_cluster: 8,
        fat_entries: 64,
        partition_start_sector: 0,
        volume_sectors: 32 + 62 * 8,
        fat_offset_sectors: 24,
        cluster_heap_offset_sectors: 32,
        volume_label: "RESCUE".into(),
        ..Default::default()
    }
}

pub fn blank_image(geo: &VolumeGeometry) -> Vec<u8> {
    vec![0u8; geo.cluster_heap_end() as usize]
}

pub fn file_set(name: &str, first_cluster: u32, data_length: u64) -> Vec<u8> {
    ExFatEntrySet::new(
        name,
        ExFatAttributes::ARCHIVE,
        StreamFlags::ALLOCATION_POSSIBLE | StreamFlags::NO_FAT_CHAIN,
        first_cluster,
        data_length,
        ExFatTimestamp::default(),
        &UpcaseTable::generate(),
    )
    .to_bytes()
}

pub fn dir_set(name: &str, first_cluster: u32, data_length: u64) -> Vec<u8> {
    ExFatEntrySet::new(
        name,
        ExFatAttributes::DIRECTORY,
        StreamFlags::ALLOCATION_POSSIBLE | StreamFlags::NO_FAT_CHAIN,
        first_cluster,
        data_length,
        ExFatTimestamp::default(),
        &UpcaseTable::generate(),
    )
    .to_bytes()
}

/// Appends a vendor secondary entry and fixes up the count and checksum.
pub fn with_vendor_entry(mut raw: Vec<u8>) -> Vec<u8> {
    let mut vendor = [0u8; EXFAT_DIR_ENTRY_SIZE];
    vendor[0] = 0xE0;
    vendor[1..17].copy_from_slice(b"vendor-guid-0001");
    raw.extend_from_slice(&vendor);
    raw[1] += 1;
    reseal(&mut raw);
    raw
}

/// Recomputes the set checksum after an edit.
pub fn reseal(raw: &mut [u8]) {
    let sum = rexfs::checksum::entry_set_checksum(raw);
    raw[2..4].copy_from_slice(&sum.to_le_bytes());
}

pub fn place(image: &mut [u8], offset: u64, bytes: &[u8]) {
    let start = offset as usize;
    image[start..start + bytes.len()].copy_from_slice(bytes);
}

/// Every heap cluster the FAT marks allocated is set in the bitmap, and
/// the other way around.
pub fn assert_bitmap_matches_fat(fat: &FatTable, bitmap: &BitmapBuilder) {
    for cluster in EXFAT_FIRST_CLUSTER..fat.len() {
        assert_eq!(
            bitmap.is_set(cluster),
            !fat.is_free(cluster),
            "cluster {cluster} disagrees"
        );
    }
}

pub fn read_bytes<IO: RexIO + ?Sized>(io: &mut IO, offset: u64, len: usize) -> Vec<u8> {
    let mut buf = vec![0u8; len];
    io.read_at(offset, &mut buf).unwrap();
    buf
}
