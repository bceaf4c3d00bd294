// SPDX-License-Identifier: MIT

//! Optional TOML profile describing the damaged volume.
//!
//! ```toml
//! [geometry]
//! sectors_per_cluster = 512
//! fat_entries = 0xE8DB79
//! partition_start_sector = 0x64028
//! volume_label = "Elements"
//!
//! [replay]
//! arena_capacity = 1000000
//! conservative_bitmap = true
//! ```
//!
//! Every field is optional; missing ones keep the built-in reference volume.

use std::{fs, path::Path};

use anyhow::Context;
use rexfs::prelude::VolumeGeometry;
use serde::Deserialize;

#[derive(Debug, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct GeometryProfile {
    pub sectors_per_cluster: Option<u32>,
    pub fat_entries: Option<u32>,
    pub partition_start_sector: Option<u64>,
    pub volume_sectors: Option<u64>,
    pub fat_offset_sectors: Option<u32>,
    pub cluster_heap_offset_sectors: Option<u32>,
    pub volume_serial: Option<u32>,
    pub volume_label: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ReplayProfile {
    pub arena_capacity: Option<u32>,
    pub conservative_bitmap: Option<bool>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Profile {
    pub geometry: GeometryProfile,
    pub replay: ReplayProfile,
}

impl Profile {
    pub fn from_file(path: &Path) -> anyhow::Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("cannot read profile {}", path.display()))?;
        Self::parse(&content).with_context(|| format!("invalid profile {}", path.display()))
    }

    pub fn parse(content: &str) -> anyhow::Result<Self> {
        Ok(toml::from_str(content)?)
    }

    /// Reference volume with this profile's overrides applied.
    pub fn geometry(&self) -> VolumeGeometry {
        let g = &self.geometry;
        let base = VolumeGeometry::default();
        VolumeGeometry {
            sectors_per_cluster: g.sectors_per_cluster.unwrap_or(base.sectors_per_cluster),
            fat_entries: g.fat_entries.unwrap_or(base.fat_entries),
            partition_start_sector: g
                .partition_start_sector
                .unwrap_or(base.partition_start_sector),
            volume_sectors: g.volume_sectors.unwrap_or(base.volume_sectors),
            fat_offset_sectors: g.fat_offset_sectors.unwrap_or(base.fat_offset_sectors),
            cluster_heap_offset_sectors: g
                .cluster_heap_offset_sectors
                .unwrap_or(base.cluster_heap_offset_sectors),
            volume_serial: g.volume_serial.unwrap_or(base.volume_serial),
            volume_label: g.volume_label.clone().unwrap_or(base.volume_label),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_profile_is_reference_volume() {
        let profile = Profile::parse("").unwrap();
        assert_eq!(profile.geometry(), VolumeGeometry::default());
        assert!(profile.replay.arena_capacity.is_none());
    }

    #[test]
    fn test_partial_override() {
        let profile = Profile::parse(
            r#"
            [geometry]
            sectors_per_cluster = 8
            fat_entries = 0x40
            volume_label = "RESCUE"

            [replay]
            conservative_bitmap = false
            "#,
        )
        .unwrap();
        let geo = profile.geometry();
        assert_eq!(geo.sectors_per_cluster, 8);
        assert_eq!(geo.fat_entries, 64);
        assert_eq!(geo.volume_label, "RESCUE");
        assert_eq!(geo.volume_serial, VolumeGeometry::default().volume_serial);
        assert_eq!(profile.replay.conservative_bitmap, Some(false));
    }

    #[test]
    fn test_rejects_unknown_keys() {
        assert!(Profile::parse("[geometry]\nbytes_per_sector = 4096\n").is_err());
    }
}
