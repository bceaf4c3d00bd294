// SPDX-License-Identifier: MIT

//! In-memory File Allocation Table.
//!
//! One `u32` per cluster. Clusters are only ever claimed, never released,
//! so every allocatable cluster below `free_hint` is known to be in use and
//! the free-cluster search can resume from there.

use crate::{allocator::*, constant::*, errors::*};

/// Clusters of one chain, in link order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClusterChain {
    clusters: Vec<u32>,
}

impl ClusterChain {
    #[inline]
    pub fn first(&self) -> u32 {
        self.clusters.first().copied().unwrap_or(0)
    }

    #[inline]
    pub fn last(&self) -> u32 {
        self.clusters.last().copied().unwrap_or(0)
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.clusters.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.clusters.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = u32> + '_ {
        self.clusters.iter().copied()
    }

    pub fn as_slice(&self) -> &[u32] {
        &self.clusters
    }

    pub fn is_contiguous(&self) -> bool {
        self.clusters.windows(2).all(|w| w[1] == w[0] + 1)
    }
}

impl From<Vec<u32>> for ClusterChain {
    fn from(clusters: Vec<u32>) -> Self {
        Self { clusters }
    }
}

impl ClusterHandle for ClusterChain {}

#[derive(Debug, Clone)]
pub struct FatTable {
    entries: Vec<u32>,
    free_hint: u32,
    used: u32,
}

impl FatTable {
    /// Fresh table: media descriptor, end marker, and cluster 2 anchored as
    /// a one-cluster chain for the allocation bitmap.
    pub fn initialize(entry_count: u32) -> FatResult<Self> {
        crate::ensure!(entry_count > EXFAT_FIRST_CLUSTER, FatError::InvalidLength);
        crate::ensure!(entry_count <= FAT_MAX_CLUSTER + 1, FatError::InvalidLength);

        let mut entries = vec![FAT_FREE; entry_count as usize];
        entries[0] = FAT_MEDIA;
        entries[1] = FAT_END;
        entries[EXFAT_BITMAP_CLUSTER as usize] = FAT_END;

        Ok(Self {
            entries,
            free_hint: EXFAT_BITMAP_CLUSTER + 1,
            used: 1,
        })
    }

    /// Loads a serialized table holding `entry_count` entries.
    pub fn from_bytes(bytes: &[u8], entry_count: u32) -> FatResult<Self> {
        let needed = entry_count as usize * EXFAT_FAT_ENTRY_SIZE;
        crate::ensure!(entry_count > EXFAT_FIRST_CLUSTER, FatError::InvalidLength);
        crate::ensure!(bytes.len() >= needed, FatError::InvalidLength);

        let entries: Vec<u32> = bytes[..needed]
            .chunks_exact(EXFAT_FAT_ENTRY_SIZE)
            .map(|c| u32::from_le_bytes([c[0], c[1], c[2], c[3]]))
            .collect();
        let used = entries[EXFAT_FIRST_CLUSTER as usize..]
            .iter()
            .filter(|&&e| e != FAT_FREE)
            .count() as u32;

        Ok(Self {
            entries,
            free_hint: EXFAT_FIRST_CLUSTER,
            used,
        })
    }

    /// Entry count, reserved entries included.
    #[inline]
    pub fn len(&self) -> u32 {
        self.entries.len() as u32
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    #[inline]
    pub fn heap_clusters(&self) -> u32 {
        self.len() - EXFAT_FIRST_CLUSTER
    }

    #[inline]
    pub fn entry(&self, cluster: u32) -> Option<u32> {
        self.entries.get(cluster as usize).copied()
    }

    #[inline]
    pub fn is_allocatable(&self, cluster: u32) -> bool {
        cluster >= EXFAT_FIRST_CLUSTER && cluster < self.len()
    }

    #[inline]
    pub fn is_free(&self, cluster: u32) -> bool {
        self.is_allocatable(cluster) && self.entries[cluster as usize] == FAT_FREE
    }

    #[inline]
    pub fn used_clusters(&self) -> u32 {
        self.used
    }

    /// Lowest free allocatable cluster.
    pub fn find_next_free_cluster(&self) -> FatResult<u32> {
        (self.free_hint..self.len())
            .find(|&c| self.entries[c as usize] == FAT_FREE)
            .ok_or(FatError::NoFreeCluster)
    }

    fn claim(&mut self, cluster: u32, prev: Option<u32>) {
        self.entries[cluster as usize] = FAT_END;
        if let Some(p) = prev {
            self.entries[p as usize] = cluster;
        }
        self.used += 1;
        if cluster == self.free_hint {
            self.free_hint += 1;
        }
    }

    /// Appends `additional` free clusters after `tail`, which must end a chain.
    fn grow_from(
        &mut self,
        tail: Option<u32>,
        additional: u32,
        clusters: &mut Vec<u32>,
    ) -> FatResult {
        let mut prev = tail;
        for claimed in 0..additional {
            let Ok(cluster) = self.find_next_free_cluster() else {
                crate::bail!(FatError::AllocationExhausted {
                    requested: additional,
                    claimed,
                });
            };
            self.claim(cluster, prev);
            clusters.push(cluster);
            prev = Some(cluster);
        }
        Ok(())
    }

    /// Walks the chain from `start` to `END`.
    pub fn chain(&self, start: u32) -> FatResult<ClusterChain> {
        crate::ensure!(self.is_allocatable(start), FatError::InvalidCluster(start));

        let mut clusters = vec![start];
        let mut current = start;
        loop {
            match self.entries[current as usize] {
                FAT_END => break,
                FAT_FREE | FAT_BAD => return Err(FatError::BrokenChain(current)),
                next if !self.is_allocatable(next) => return Err(FatError::InvalidCluster(next)),
                next => {
                    crate::ensure!(
                        clusters.len() < self.heap_clusters() as usize,
                        FatError::LoopDetected(next)
                    );
                    clusters.push(next);
                    current = next;
                }
            }
        }
        Ok(ClusterChain::from(clusters))
    }

    /// Appends `additional` free clusters to the chain starting at `start`.
    ///
    /// Returns the whole chain. On exhaustion the clusters already appended
    /// stay linked.
    pub fn extend_chain(&mut self, start: u32, additional: u32) -> FatResult<ClusterChain> {
        let mut clusters = self.chain(start)?.clusters;
        let tail = clusters.last().copied();
        self.grow_from(tail, additional, &mut clusters)?;
        Ok(ClusterChain::from(clusters))
    }

    /// True if `start..start + count` is entirely free and allocatable.
    pub fn run_is_free(&self, start: u32, count: u32) -> bool {
        let end = start as u64 + count as u64;
        end <= self.len() as u64 && (start..end as u32).all(|c| self.is_free(c))
    }

    /// Claims the contiguous run `start..start + count` as one chain.
    ///
    /// Nothing is modified unless the whole run is free.
    pub fn claim_run(&mut self, start: u32, count: u32) -> FatResult<ClusterChain> {
        crate::ensure!(count > 0, FatError::InvalidLength);
        let end = start as u64 + count as u64;
        for c in start as u64..end {
            let c32 = c.min(u32::MAX as u64) as u32;
            crate::ensure!(
                c <= u32::MAX as u64 && self.is_allocatable(c32),
                FatError::InvalidCluster(c32)
            );
            crate::ensure!(self.is_free(c32), FatError::ClusterInUse(c32));
        }

        let mut prev = None;
        for c in start..start + count {
            self.claim(c, prev);
            prev = Some(c);
        }
        Ok(ClusterChain::from((start..start + count).collect::<Vec<_>>()))
    }

    /// Little-endian image, zero-padded to a whole sector.
    pub fn to_bytes(&self) -> Vec<u8> {
        let len = (self.entries.len() * EXFAT_FAT_ENTRY_SIZE)
            .next_multiple_of(EXFAT_SECTOR_SIZE as usize);
        let mut buf = Vec::with_capacity(len);
        for e in &self.entries {
            buf.extend_from_slice(&e.to_le_bytes());
        }
        buf.resize(len, 0);
        buf
    }
}

impl ClusterAllocator<ClusterChain> for FatTable {
    /// Claims `count` free clusters, lowest first, and links them.
    ///
    /// On exhaustion the clusters claimed so far remain allocated and linked.
    fn allocate_chain(&mut self, count: u32) -> FatResult<ClusterChain> {
        crate::ensure!(count > 0, FatError::InvalidLength);
        let mut clusters = Vec::with_capacity(count as usize);
        self.grow_from(None, count, &mut clusters)?;
        Ok(ClusterChain::from(clusters))
    }

    fn used_units(&self) -> u32 {
        self.used
    }

    fn remaining_units(&self) -> u32 {
        self.heap_clusters() - self.used
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_initialize_reserved_entries() {
        let fat = FatTable::initialize(16).unwrap();
        assert_eq!(fat.entry(0), Some(FAT_MEDIA));
        assert_eq!(fat.entry(1), Some(FAT_END));
        assert_eq!(fat.entry(2), Some(FAT_END));
        assert!((3..16).all(|c| fat.entry(c) == Some(FAT_FREE)));
        assert_eq!(fat.used_units(), 1);
        assert_eq!(fat.remaining_units(), 13);
        assert_eq!(fat.find_next_free_cluster(), Ok(3));

        assert_eq!(FatTable::initialize(2).unwrap_err(), FatError::InvalidLength);
    }

    #[test]
    fn test_allocate_chain_links_to_end() {
        let mut fat = FatTable::initialize(32).unwrap();
        let chain = fat.allocate_chain(4).unwrap();
        assert_eq!(chain.as_slice(), &[3, 4, 5, 6]);
        assert_eq!(fat.entry(3), Some(4));
        assert_eq!(fat.entry(6), Some(FAT_END));
        assert_eq!(fat.chain(3).unwrap(), chain);
        assert_eq!(fat.allocate_chain(0).unwrap_err(), FatError::InvalidLength);
    }

    #[test]
    fn test_allocation_skips_claimed_runs() {
        let mut fat = FatTable::initialize(32).unwrap();
        fat.claim_run(4, 3).unwrap();
        let chain = fat.allocate_chain(3).unwrap();
        assert_eq!(chain.as_slice(), &[3, 7, 8]);
        assert!(!chain.is_contiguous());
        assert_eq!(fat.chain(3).unwrap().len(), 3);
    }

    #[test]
    fn test_exhaustion_keeps_partial_chain() {
        let mut fat = FatTable::initialize(8).unwrap();
        let err = fat.allocate_chain(10).unwrap_err();
        assert_eq!(
            err,
            FatError::AllocationExhausted {
                requested: 10,
                claimed: 5
            }
        );
        assert_eq!(fat.chain(3).unwrap().as_slice(), &[3, 4, 5, 6, 7]);
        assert_eq!(fat.find_next_free_cluster(), Err(FatError::NoFreeCluster));
        assert_eq!(fat.remaining_units(), 0);
    }

    #[test]
    fn test_claim_run_is_all_or_nothing() {
        let mut fat = FatTable::initialize(16).unwrap();
        fat.claim_run(8, 2).unwrap();
        assert_eq!(fat.claim_run(6, 4).unwrap_err(), FatError::ClusterInUse(8));
        assert!(fat.is_free(6) && fat.is_free(7));
        assert_eq!(fat.claim_run(14, 4).unwrap_err(), FatError::InvalidCluster(16));
        assert!(fat.is_free(14));
        assert_eq!(fat.claim_run(1, 1).unwrap_err(), FatError::InvalidCluster(1));
    }

    #[test]
    fn test_extend_chain_appends_at_tail() {
        let mut fat = FatTable::initialize(32).unwrap();
        fat.claim_run(10, 2).unwrap();
        let chain = fat.extend_chain(10, 2).unwrap();
        assert_eq!(chain.as_slice(), &[10, 11, 3, 4]);
        assert_eq!(fat.entry(11), Some(3));
        assert_eq!(fat.entry(4), Some(FAT_END));
    }

    #[test]
    fn test_chain_walk_errors() {
        let mut bytes = FatTable::initialize(8).unwrap().to_bytes();
        // 3 -> 4 -> 3 loop, 5 -> free 6
        bytes[12..16].copy_from_slice(&4u32.to_le_bytes());
        bytes[16..20].copy_from_slice(&3u32.to_le_bytes());
        bytes[20..24].copy_from_slice(&6u32.to_le_bytes());
        let fat = FatTable::from_bytes(&bytes, 8).unwrap();

        assert!(matches!(fat.chain(3), Err(FatError::LoopDetected(_))));
        assert_eq!(fat.chain(5), Err(FatError::BrokenChain(6)));
        assert_eq!(fat.chain(0), Err(FatError::InvalidCluster(0)));
    }

    #[test]
    fn test_serialization_is_sector_padded() {
        let mut fat = FatTable::initialize(200).unwrap();
        fat.allocate_chain(2).unwrap();
        let bytes = fat.to_bytes();
        assert_eq!(bytes.len(), 1024);
        assert_eq!(&bytes[0..4], &[0xF8, 0xFF, 0xFF, 0xFF]);
        assert_eq!(&bytes[12..16], &4u32.to_le_bytes());
        assert!(bytes[800..].iter().all(|&b| b == 0));

        let back = FatTable::from_bytes(&bytes, 200).unwrap();
        assert_eq!(back.used_clusters(), 3);
        assert_eq!(back.chain(3).unwrap().as_slice(), &[3, 4]);
    }
}
