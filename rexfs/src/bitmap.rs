// SPDX-License-Identifier: MIT

//! Cluster heap allocation bitmap.
//!
//! Tracks one bit per heap cluster in lockstep with the FAT. What reaches the
//! disk depends on the mode: a conservative bitmap marks every cluster as
//! allocated so that regions not described by the recovery log are never
//! handed out as free space.

use crate::{
    allocator::ClusterAllocator,
    constant::*,
    errors::*,
    fat::{ClusterChain, FatTable},
    utils::bitmap::BitmapOps,
};

#[derive(Debug, Clone)]
pub struct BitmapBuilder {
    bits: Vec<u8>,
    clusters: u32,
    conservative: bool,
}

impl BitmapBuilder {
    /// Empty bitmap for `heap_clusters` clusters, conservative rendering.
    pub fn initialize(heap_clusters: u32) -> Self {
        Self {
            bits: vec![0u8; heap_clusters.div_ceil(8) as usize],
            clusters: heap_clusters,
            conservative: true,
        }
    }

    pub fn from_fat(fat: &FatTable) -> Self {
        let mut bitmap = Self::initialize(fat.heap_clusters());
        bitmap.sync_from(fat);
        bitmap
    }

    pub fn with_conservative(mut self, conservative: bool) -> Self {
        self.conservative = conservative;
        self
    }

    #[inline]
    pub fn is_conservative(&self) -> bool {
        self.conservative
    }

    #[inline]
    pub fn clusters(&self) -> u32 {
        self.clusters
    }

    #[inline]
    fn bit_of(&self, cluster: u32) -> Option<usize> {
        cluster
            .checked_sub(EXFAT_FIRST_CLUSTER)
            .filter(|&b| b < self.clusters)
            .map(|b| b as usize)
    }

    /// Tracked allocation state of `cluster`; reserved clusters read as clear.
    pub fn is_set(&self, cluster: u32) -> bool {
        self.bit_of(cluster).is_some_and(|b| self.bits.get_bit(b))
    }

    pub fn set(&mut self, cluster: u32) {
        if let Some(b) = self.bit_of(cluster) {
            self.bits.set_bit(b, true);
        }
    }

    pub fn mark_chain(&mut self, chain: &ClusterChain) {
        for c in chain.iter() {
            self.set(c);
        }
    }

    /// Rebuilds the tracked bits from the FAT.
    pub fn sync_from(&mut self, fat: &FatTable) {
        self.bits.fill(0);
        for c in EXFAT_FIRST_CLUSTER..fat.len() {
            if !fat.is_free(c) {
                self.set(c);
            }
        }
    }

    fn track(&mut self, fat: &FatTable, result: FatResult<ClusterChain>) -> FatResult<ClusterChain> {
        match result {
            Ok(chain) => {
                self.mark_chain(&chain);
                Ok(chain)
            }
            Err(e) => {
                // partial allocations stay in the FAT
                self.sync_from(fat);
                Err(e)
            }
        }
    }

    /// Allocates a chain large enough for `size_in_bytes`.
    pub fn reserve_for_structure(
        &mut self,
        fat: &mut FatTable,
        size_in_bytes: u64,
        cluster_size: u64,
    ) -> FatResult<ClusterChain> {
        crate::ensure!(cluster_size > 0 && size_in_bytes > 0, FatError::InvalidLength);
        let needed = size_in_bytes.div_ceil(cluster_size);
        crate::ensure!(needed <= u32::MAX as u64, FatError::InvalidLength);

        let result = fat.allocate_chain(needed as u32);
        self.track(fat, result)
    }

    /// Reserves the bitmap's own chain, which always starts at cluster 2.
    pub fn reserve_bitmap(&mut self, fat: &mut FatTable, cluster_size: u64) -> FatResult<ClusterChain> {
        crate::ensure!(cluster_size > 0, FatError::InvalidLength);
        let needed = self.byte_len().div_ceil(cluster_size).max(1);
        crate::ensure!(needed <= u32::MAX as u64, FatError::InvalidLength);

        let anchor = fat.chain(EXFAT_BITMAP_CLUSTER)?;
        crate::ensure!(anchor.len() == 1, FatError::ClusterInUse(EXFAT_BITMAP_CLUSTER));

        let result = fat.extend_chain(EXFAT_BITMAP_CLUSTER, needed as u32 - 1);
        self.track(fat, result)
    }

    pub fn claim_run(&mut self, fat: &mut FatTable, start: u32, count: u32) -> FatResult<ClusterChain> {
        let result = fat.claim_run(start, count);
        self.track(fat, result)
    }

    pub fn extend_chain(
        &mut self,
        fat: &mut FatTable,
        start: u32,
        additional: u32,
    ) -> FatResult<ClusterChain> {
        let result = fat.extend_chain(start, additional);
        self.track(fat, result)
    }

    /// On-disk size in bytes.
    #[inline]
    pub fn byte_len(&self) -> u64 {
        self.bits.len() as u64
    }

    /// On-disk image. Bits past the last cluster are always zero.
    pub fn render(&self) -> Vec<u8> {
        let mut out = if self.conservative {
            vec![0xFFu8; self.bits.len()]
        } else {
            self.bits.clone()
        };
        out.clear_tail(self.clusters as usize);
        out
    }

    /// Tracked clusters in use.
    pub fn used_clusters(&self) -> u32 {
        self.bits.count_ones() as u32
    }

    pub fn percent_in_use(&self) -> u8 {
        if self.conservative || self.clusters == 0 {
            return 100;
        }
        (self.used_clusters() as u64 * 100 / self.clusters as u64) as u8
    }
}
