// SPDX-License-Identifier: MIT

use std::{fs, path::Path, process::Command};

use rexfs::prelude::*;

const PROFILE: &str = r#"
[geometry]
sectors_per_cluster = 8
fat_entries = 64
partition_start_sector = 0
volume_sectors = 528
fat_offset_sectors = 24
cluster_heap_offset_sectors = 32
volume_label = "RESCUE"

[replay]
arena_capacity = 16
"#;

fn rex() -> Command {
    let mut cmd = Command::new(env!("CARGO_BIN_EXE_rex"));
    cmd.env_remove("RUST_LOG");
    cmd
}

/// Same volume as `PROFILE`.
fn small_geometry() -> VolumeGeometry {
    VolumeGeometry {
        sectors_per_cluster: 8,
        fat_entries: 64,
        partition_start_sector: 0,
        volume_sectors: 528,
        fat_offset_sectors: 24,
        cluster_heap_offset_sectors: 32,
        volume_label: "RESCUE".into(),
        ..Default::default()
    }
}

/// Writes an image holding one file entry set, its log and the profile.
fn fixture(dir: &Path) -> (VolumeGeometry, u64) {
    let geo = small_geometry();
    let offset = geo.cluster_offset(36);

    let mut image = vec![0u8; geo.cluster_heap_end() as usize];
    let set = ExFatEntrySet::new(
        "notes.txt",
        ExFatAttributes::ARCHIVE,
        StreamFlags::ALLOCATION_POSSIBLE | StreamFlags::NO_FAT_CHAIN,
        40,
        6000,
        ExFatTimestamp::default(),
        &UpcaseTable::generate(),
    )
    .to_bytes();
    image[offset as usize..offset as usize + set.len()].copy_from_slice(&set);

    fs::write(dir.join("volume.img"), &image).unwrap();
    fs::write(dir.join("entries.log"), format!("# scan\n{offset:#x}\n")).unwrap();
    fs::write(dir.join("volume.toml"), PROFILE).unwrap();
    (geo, offset)
}

#[test]
fn test_version_exits_zero() {
    let out = rex().arg("-V").output().unwrap();
    assert!(out.status.success());
    let stdout = String::from_utf8_lossy(&out.stdout);
    assert!(stdout.starts_with("rex "));
    assert!(stdout.contains("Copyright"));
}

#[test]
fn test_malformed_invocation_prints_usage() {
    let out = rex().output().unwrap();
    assert_eq!(out.status.code(), Some(1));
    assert!(String::from_utf8_lossy(&out.stderr).contains("Usage"));

    let out = rex().args(["a", "b", "c"]).output().unwrap();
    assert_eq!(out.status.code(), Some(1));
}

#[cfg(unix)]
#[test]
fn test_missing_device_exits_with_os_code() {
    let dir = tempfile::tempdir().unwrap();
    fixture(dir.path());
    let out = rex()
        .arg(dir.path().join("no-such-device"))
        .arg(dir.path().join("entries.log"))
        .output()
        .unwrap();
    // ENOENT
    assert_eq!(out.status.code(), Some(2));
    assert!(String::from_utf8_lossy(&out.stderr).contains("cannot open device"));
}

#[test]
fn test_dry_run_leaves_device_untouched() {
    let dir = tempfile::tempdir().unwrap();
    fixture(dir.path());
    let before = fs::read(dir.path().join("volume.img")).unwrap();
    let tree = dir.path().join("tree.bin");

    let out = rex()
        .arg("--dry-run")
        .arg("-c")
        .arg(dir.path().join("volume.toml"))
        .arg("--tree-out")
        .arg(&tree)
        .arg(dir.path().join("volume.img"))
        .arg(dir.path().join("entries.log"))
        .output()
        .unwrap();
    assert!(out.status.success(), "{}", String::from_utf8_lossy(&out.stderr));
    assert!(String::from_utf8_lossy(&out.stdout).contains("Dry run"));
    assert_eq!(fs::read(dir.path().join("volume.img")).unwrap(), before);

    let mut file = fs::File::open(&tree).unwrap();
    let arena = TreeArena::read_snapshot(&mut StdRexIO::new(&mut file), 0).unwrap();
    assert_eq!(arena.len(), 2);
    assert_eq!(arena.path_of(1), "/notes.txt");
}

#[test]
fn test_commit_writes_boot_region() {
    let dir = tempfile::tempdir().unwrap();
    let (geo, _) = fixture(dir.path());

    let out = rex()
        .arg("-q")
        .arg("--config")
        .arg(dir.path().join("volume.toml"))
        .arg(dir.path().join("volume.img"))
        .arg(dir.path().join("entries.log"))
        .output()
        .unwrap();
    assert!(out.status.success(), "{}", String::from_utf8_lossy(&out.stderr));
    assert!(String::from_utf8_lossy(&out.stdout).contains("Committed"));

    let image = fs::read(dir.path().join("volume.img")).unwrap();
    assert_eq!(&image[3..11], b"EXFAT   ");
    assert_eq!(&image[510..512], &[0x55, 0xAA]);
    assert_eq!(image[..512], image[12 * 512..13 * 512]);

    let fat_at = geo.fat_offset() as usize;
    let fat = FatTable::from_bytes(&image[fat_at..fat_at + 512], geo.fat_entries).unwrap();
    assert_eq!(fat.chain(40).unwrap().as_slice(), &[40, 41]);
}
