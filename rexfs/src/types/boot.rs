// SPDX-License-Identifier: MIT

use zerocopy::{FromBytes, Immutable, IntoBytes, KnownLayout};

use crate::{checksum, constant::*, geometry::VolumeGeometry, types::VolumeFlags};

#[derive(IntoBytes, FromBytes, KnownLayout, Immutable, Copy, Clone, Debug)]
#[repr(C, packed)]
pub struct ExFatBootSector {
    pub jump_boot: [u8; 3],
    pub fs_name: [u8; 8],
    pub must_be_zero: [u8; 53],
    pub partition_offset: u64,
    pub volume_length: u64,
    pub fat_offset: u32,
    pub fat_length: u32,
    pub cluster_heap_offset: u32,
    pub cluster_count: u32,
    pub root_dir_cluster: u32,
    pub volume_serial: u32,
    pub fs_revision: u16,
    pub volume_flags: u16,
    pub bytes_per_sector_shift: u8,
    pub sectors_per_cluster_shift: u8,
    pub number_of_fats: u8,
    pub drive_select: u8,
    pub percent_in_use: u8,
    pub reserved: [u8; 7],
    pub boot_code: [u8; EXFAT_BOOT_CODE_SIZE],
    pub signature: [u8; 2],
}

impl ExFatBootSector {
    pub fn new_from_geometry(geo: &VolumeGeometry, root_dir_cluster: u32, percent_in_use: u8) -> Self {
        Self {
            jump_boot: EXFAT_JUMP_BOOT,
            fs_name: *EXFAT_FS_NAME,
            must_be_zero: [0u8; 53],
            partition_offset: geo.partition_start_sector,
            volume_length: geo.volume_sectors,
            fat_offset: geo.fat_offset_sectors,
            fat_length: geo.fat_length_sectors(),
            cluster_heap_offset: geo.cluster_heap_offset_sectors,
            cluster_count: geo.heap_clusters(),
            root_dir_cluster,
            volume_serial: geo.volume_serial,
            fs_revision: EXFAT_FS_REVISION,
            volume_flags: VolumeFlags::empty().bits(),
            bytes_per_sector_shift: geo.sector_shift(),
            sectors_per_cluster_shift: geo.cluster_shift(),
            number_of_fats: EXFAT_NUM_FATS,
            drive_select: EXFAT_DRIVE_SELECT,
            percent_in_use,
            reserved: [0u8; 7],
            boot_code: [0u8; EXFAT_BOOT_CODE_SIZE],
            signature: EXFAT_SIGNATURE,
        }
    }

    pub fn is_exfat(&self) -> bool {
        self.fs_name == *EXFAT_FS_NAME && self.signature == EXFAT_SIGNATURE
    }

    pub fn flags(&self) -> VolumeFlags {
        VolumeFlags::from_bits_truncate(self.volume_flags)
    }

    #[inline(always)]
    pub fn to_raw_buffer(&self, buf: &mut Vec<u8>) {
        buf.extend_from_slice(self.as_bytes());
    }
}

#[derive(IntoBytes, FromBytes, KnownLayout, Immutable, Copy, Clone, Debug)]
#[repr(C, packed)]
pub struct ExFatExBootSector {
    pub boot_code: [u8; 510],
    pub signature: [u8; 2],
}

impl ExFatExBootSector {
    pub fn new() -> Self {
        Self {
            boot_code: [0; 510],
            signature: EXFAT_SIGNATURE,
        }
    }

    #[inline(always)]
    pub fn to_raw_buffer(&self, buf: &mut Vec<u8>) {
        buf.extend_from_slice(self.as_bytes());
    }
}

impl Default for ExFatExBootSector {
    fn default() -> Self {
        Self::new()
    }
}

/// OEM parameter sector: ten 48-byte parameter records, unused here.
#[derive(IntoBytes, FromBytes, KnownLayout, Immutable, Copy, Clone, Debug)]
#[repr(C, packed)]
pub struct ExFatOemParameters {
    pub parameters: [[u8; 48]; 10],
    pub reserved: [u8; 32],
}

impl ExFatOemParameters {
    pub fn empty() -> Self {
        Self {
            parameters: [[0u8; 48]; 10],
            reserved: [0u8; 32],
        }
    }
}

#[derive(IntoBytes, FromBytes, KnownLayout, Immutable, Copy, Clone, Debug)]
#[repr(C, packed)]
pub struct ExFatChecksumSector {
    pub checksum: [u32; EXFAT_CHECKSUM_SLOTS],
}

impl ExFatChecksumSector {
    pub fn new(value: u32) -> Self {
        Self {
            checksum: [value; EXFAT_CHECKSUM_SLOTS],
        }
    }
}

/// The 12-sector boot region, written once at sector 0 and again at sector 12.
#[derive(Clone, Debug)]
pub struct BootRegion {
    pub boot: ExFatBootSector,
    pub extended: [ExFatExBootSector; EXFAT_VBR_EXTENDED_SECTORS],
    pub oem: ExFatOemParameters,
    checksum: u32,
}

impl BootRegion {
    pub fn build(geo: &VolumeGeometry, root_dir_cluster: u32, percent_in_use: u8) -> Self {
        let mut region = Self {
            boot: ExFatBootSector::new_from_geometry(geo, root_dir_cluster, percent_in_use),
            extended: [ExFatExBootSector::new(); EXFAT_VBR_EXTENDED_SECTORS],
            oem: ExFatOemParameters::empty(),
            checksum: 0,
        };
        region.refresh_checksum();
        region
    }

    #[inline]
    pub fn checksum(&self) -> u32 {
        self.checksum
    }

    /// Recomputes the checksum sector; required after any field mutation.
    pub fn refresh_checksum(&mut self) {
        let bytes = self.checksummed_sectors();
        self.checksum = checksum::boot_checksum(&bytes);
    }

    /// Sectors 0 to 10: super block, extended boot, OEM, reserved.
    fn checksummed_sectors(&self) -> Vec<u8> {
        let sector = EXFAT_SECTOR_SIZE as usize;
        let mut buf = Vec::with_capacity(EXFAT_VBR_CHECKSUM_SECTOR_INDEX * sector);
        self.boot.to_raw_buffer(&mut buf);
        for ext in &self.extended {
            ext.to_raw_buffer(&mut buf);
        }
        buf.extend_from_slice(self.oem.as_bytes());
        buf.resize(EXFAT_VBR_CHECKSUM_SECTOR_INDEX * sector, 0);
        buf
    }

    /// Full 12-sector image, checksum sector included.
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut buf = self.checksummed_sectors();
        buf.extend_from_slice(ExFatChecksumSector::new(self.checksum).as_bytes());
        buf
    }
}
