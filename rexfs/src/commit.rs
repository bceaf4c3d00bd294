// SPDX-License-Identifier: MIT

//! Writes a finished [`Reconstruction`] to the device.
//!
//! Order: boot region (main, then backup), FAT, bitmap clusters, upcase
//! clusters, root directory clusters. Every write is sector-aligned. The
//! boot region is read back at the end and its checksum sector verified.

use log::{debug, info};
use rexio::prelude::*;

use crate::{
    arena::ROOT,
    checksum,
    constant::*,
    driver::Reconstruction,
    errors::*,
    fat::ClusterChain,
    geometry::VolumeGeometry,
    types::{ExFatBitmapEntry, ExFatBootSector, ExFatVolumeLabelEntry},
};

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommitReport {
    pub boot_checksum: u32,
    pub bytes_written: u64,
    /// Entry sets copied into the root directory.
    pub root_entry_sets: u32,
    pub root_clusters: u32,
}

const SECTOR: usize = EXFAT_SECTOR_SIZE as usize;

/// Writes `data` across the clusters of `chain`, zero-padding the last one.
fn write_chain<IO: RexIO + ?Sized>(
    io: &mut IO,
    geometry: &VolumeGeometry,
    chain: &ClusterChain,
    data: &[u8],
) -> CommitResult<u64> {
    let cluster_size = geometry.cluster_size() as usize;
    crate::ensure!(
        data.len() <= chain.len() * cluster_size,
        CommitError::Invalid("structure larger than its cluster chain")
    );

    let mut buf = vec![0u8; cluster_size];
    for (i, cluster) in chain.iter().enumerate() {
        let start = (i * cluster_size).min(data.len());
        let end = ((i + 1) * cluster_size).min(data.len());
        buf.fill(0);
        buf[..end - start].copy_from_slice(&data[start..end]);
        io.write_aligned(geometry.cluster_offset(cluster), &buf, SECTOR)?;
    }
    Ok((chain.len() * cluster_size) as u64)
}

/// Root directory content: label, bitmap and upcase entries, then the entry
/// set of every top-level node as found on disk.
fn build_root_dir<IO: RexIO + ?Sized>(
    io: &mut IO,
    rec: &Reconstruction,
) -> CommitResult<(Vec<u8>, u32)> {
    let mut buf = Vec::with_capacity(rec.root_dir_bytes() as usize);
    ExFatVolumeLabelEntry::new(&rec.geometry.label_utf16()).to_raw_buffer(&mut buf);
    ExFatBitmapEntry::new(rec.layout.bitmap.first(), rec.bitmap.byte_len()).to_raw_buffer(&mut buf);
    rec.upcase
        .entry(rec.layout.upcase.first())
        .to_raw_buffer(&mut buf);

    let mut sets = 0u32;
    for child in rec.arena.children(ROOT) {
        let node = *rec.arena.node(child).map_err(|_| CommitError::Invalid("broken root list"))?;
        let len = (node.continuations as usize + 1) * EXFAT_DIR_ENTRY_SIZE;
        let mut raw = vec![0u8; len];
        io.read_at(node.entry_offset, &mut raw)?;

        // the set must still be the one replayed
        let stored = u16::from_le_bytes([raw[2], raw[3]]);
        crate::ensure!(
            raw[0] == EXFAT_ENTRY_FILE
                && raw[1] == node.continuations
                && checksum::entry_set_checksum(&raw) == stored,
            CommitError::SourceChanged {
                offset: node.entry_offset
            }
        );
        buf.extend_from_slice(&raw);
        sets += 1;
    }
    // end-of-directory marker
    buf.extend_from_slice(&[EXFAT_EOD; EXFAT_DIR_ENTRY_SIZE]);
    Ok((buf, sets))
}

/// Re-reads the main and backup boot regions and checks their checksum sectors.
fn verify_boot_region<IO: RexIO + ?Sized>(io: &mut IO, expected: u32) -> CommitResult {
    let region_len = EXFAT_BOOT_REGION_SECTORS as usize * SECTOR;
    let mut main = vec![0u8; region_len];
    io.read_at(EXFAT_VBR_SECTOR * SECTOR as u64, &mut main)?;

    let computed = checksum::boot_checksum(&main[..EXFAT_VBR_CHECKSUM_SECTOR_INDEX * SECTOR]);
    crate::ensure!(
        computed == expected,
        CommitError::ChecksumVerify {
            expected,
            found: computed
        }
    );

    let slots = EXFAT_VBR_CHECKSUM_SECTOR_INDEX as u64 * SECTOR as u64;
    for i in 0..EXFAT_CHECKSUM_SLOTS as u64 {
        let found = io.read_u32_at(slots + i * 4)?;
        crate::ensure!(found == expected, CommitError::ChecksumVerify { expected, found });
    }

    let boot: ExFatBootSector = io.read_struct(EXFAT_VBR_SECTOR * SECTOR as u64)?;
    crate::ensure!(
        boot.is_exfat(),
        CommitError::Invalid("boot sector read-back is not exFAT")
    );

    let mut backup = vec![0u8; region_len];
    io.read_at(EXFAT_VBR_BACKUP_SECTOR * SECTOR as u64, &mut backup)?;
    crate::ensure!(
        backup == main,
        CommitError::Invalid("backup boot region differs from the main region")
    );
    Ok(())
}

/// Persists `rec` and verifies the boot region.
pub fn commit<IO: RexIO + ?Sized>(io: &mut IO, rec: &Reconstruction) -> CommitResult<CommitReport> {
    let geometry = &rec.geometry;
    let mut written = 0u64;

    // fails before anything is written if a source entry set changed
    let (root, sets) = build_root_dir(io, rec)?;

    let boot = rec.boot.to_bytes();
    io.write_aligned(EXFAT_VBR_SECTOR * SECTOR as u64, &boot, SECTOR)?;
    io.write_aligned(EXFAT_VBR_BACKUP_SECTOR * SECTOR as u64, &boot, SECTOR)?;
    written += 2 * boot.len() as u64;
    debug!("boot regions written, checksum {:#010x}", rec.boot.checksum());

    let fat = rec.fat.to_bytes();
    crate::ensure!(
        fat.len() as u64 == geometry.fat_length_sectors() as u64 * SECTOR as u64,
        CommitError::Invalid("FAT size does not match the geometry")
    );
    io.write_aligned(geometry.fat_offset(), &fat, SECTOR)?;
    written += fat.len() as u64;
    info!(
        "FAT written: {} entries at sector {}",
        rec.fat.len(),
        geometry.fat_offset_sectors
    );

    written += write_chain(io, geometry, &rec.layout.bitmap, &rec.bitmap.render())?;
    written += write_chain(io, geometry, &rec.layout.upcase, &rec.upcase.to_bytes())?;

    written += write_chain(io, geometry, &rec.layout.root, &root)?;
    info!(
        "root directory written: {sets} entry sets in {} clusters",
        rec.layout.root.len()
    );

    io.flush()?;
    verify_boot_region(io, rec.boot.checksum())?;
    info!("boot region verified");

    Ok(CommitReport {
        boot_checksum: rec.boot.checksum(),
        bytes_written: written,
        root_entry_sets: sets,
        root_clusters: rec.layout.root.len() as u32,
    })
}
