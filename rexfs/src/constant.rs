// SPDX-License-Identifier: MIT

// Reference volume

pub const EXFAT_SECTOR_SIZE: u32 = 512;
pub const EXFAT_SECTORS_PER_CLUSTER: u32 = 512;
pub const EXFAT_FAT_ENTRIES: u32 = 0x00E8_DB79;
pub const EXFAT_PARTITION_START_SECTOR: u64 = 0x64028;
pub const EXFAT_VOLUME_SECTORS: u64 = 0x1_D1B9_77B7;
pub const EXFAT_FAT_OFFSET_SECTORS: u32 = 0x8000;
pub const EXFAT_CLUSTER_HEAP_OFFSET_SECTORS: u32 = 0x283D8;
pub const EXFAT_VOLUME_SERIAL: u32 = 0xDEAD_BEEF;
pub const EXFAT_VOLUME_LABEL: &str = "Elements";

// Boot region

pub const EXFAT_BOOT_REGION_SECTORS: u64 = 12;
pub const EXFAT_VBR_SECTOR: u64 = 0;
pub const EXFAT_VBR_BACKUP_SECTOR: u64 = 12;
pub const EXFAT_VBR_EXTENDED_SECTORS: usize = 8;
pub const EXFAT_VBR_OEM_SECTOR_INDEX: usize = 9;
pub const EXFAT_VBR_RESERVED_SECTOR_INDEX: usize = 10;
pub const EXFAT_VBR_CHECKSUM_SECTOR_INDEX: usize = 11;
pub const EXFAT_CHECKSUM_SLOTS: usize = 128;
pub const EXFAT_BOOT_CODE_SIZE: usize = 390;
pub const EXFAT_JUMP_BOOT: [u8; 3] = [0xEB, 0x76, 0x90];
pub const EXFAT_FS_NAME: &[u8; 8] = b"EXFAT   ";
pub const EXFAT_SIGNATURE: [u8; 2] = [0x55, 0xAA];
pub const EXFAT_FS_REVISION: u16 = 0x0100;
pub const EXFAT_NUM_FATS: u8 = 1;
pub const EXFAT_DRIVE_SELECT: u8 = 0x80;
/// First sector usable by the FAT: both boot regions come before it.
pub const EXFAT_MIN_FAT_OFFSET_SECTORS: u32 = 24;

// FAT

pub const EXFAT_FIRST_CLUSTER: u32 = 2;
pub const EXFAT_BITMAP_CLUSTER: u32 = 2;
pub const EXFAT_FAT_ENTRY_SIZE: usize = 4;
pub const FAT_FREE: u32 = 0x0000_0000;
pub const FAT_BAD: u32 = 0xFFFF_FFF7;
pub const FAT_MEDIA: u32 = 0xFFFF_FFF8;
pub const FAT_END: u32 = 0xFFFF_FFFF;
/// Highest cluster index a successor link may name.
pub const FAT_MAX_CLUSTER: u32 = 0xFFFF_FFF6;

// Directory entries

pub const EXFAT_DIR_ENTRY_SIZE: usize = 32;
pub const EXFAT_ENTRY_IN_USE: u8 = 0x80;
pub const EXFAT_ENTRY_SECONDARY: u8 = 0x40;
pub const EXFAT_EOD: u8 = 0x00;
pub const EXFAT_ENTRY_BITMAP: u8 = 0x81;
pub const EXFAT_ENTRY_UPCASE: u8 = 0x82;
pub const EXFAT_ENTRY_LABEL: u8 = 0x83;
pub const EXFAT_ENTRY_FILE: u8 = 0x85;
pub const EXFAT_ENTRY_GUID: u8 = 0xA0;
pub const EXFAT_ENTRY_STREAM: u8 = 0xC0;
pub const EXFAT_ENTRY_NAME: u8 = 0xC1;

pub const EXFAT_MIN_CONTINUATIONS: u8 = 2;
pub const EXFAT_MAX_CONTINUATIONS: u8 = 18;
pub const EXFAT_NAME_ENTRY_CHARS: usize = 15;
pub const EXFAT_MAX_NAME_UTF16_CHARS: usize = 255;
pub const EXFAT_LABEL_MAX_CHARS: usize = 11;

// Upcase table

pub const EXFAT_UPCASE_ENTRIES: usize = 0x10000;
pub const EXFAT_UPCASE_BYTES: usize = EXFAT_UPCASE_ENTRIES * 2;

// Arena

pub const ARENA_DEFAULT_CAPACITY: u32 = 1 << 22;
pub const ARENA_CHILD_SLOTS: usize = 8;
pub const ARENA_SNAPSHOT_MAGIC: &[u8; 8] = b"REXARENA";
pub const ARENA_SNAPSHOT_VERSION: u32 = 1;
