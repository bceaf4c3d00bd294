// SPDX-License-Identifier: MIT

//! Reconstruction driver.
//!
//! `Init -> BuildingAllocators -> ReplayingLog -> Done`, with `Failed`
//! reachable from every state. The FAT, the bitmap and the tree arena are
//! owned here for the whole run and only handed out by [`finish`], so an
//! aborted run can never be committed.
//!
//! [`finish`]: ReconstructionDriver::finish

use std::{collections::HashMap, io::BufRead};

use log::{debug, error, info, warn};
use rexio::prelude::*;

use crate::{
    arena::{ROOT, TreeArena, TreeNode},
    bitmap::BitmapBuilder,
    constant::*,
    entry_set::{DecodedEntrySet, reconstruct_entry_set},
    errors::*,
    fat::{ClusterChain, FatTable},
    geometry::VolumeGeometry,
    recovery_log::{LogRecord, RecoveryLog},
    types::{BootRegion, NodeFlags},
    upcase::UpcaseTable,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DriverState {
    Init,
    BuildingAllocators,
    ReplayingLog,
    Done,
    Failed(RexError),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    Malformed,
    ChecksumMismatch,
    UnexpectedEntryType,
    OutOfRange,
    InvalidName,
    Unparseable,
}

impl SkipReason {
    fn of(err: &EntrySetError) -> Self {
        match err {
            EntrySetError::MalformedEntrySet { .. } => SkipReason::Malformed,
            EntrySetError::ChecksumMismatch { .. } => SkipReason::ChecksumMismatch,
            EntrySetError::UnexpectedEntryType { .. } => SkipReason::UnexpectedEntryType,
            EntrySetError::OutOfRange { .. } => SkipReason::OutOfRange,
            _ => SkipReason::InvalidName,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordOutcome {
    /// A new node was created at this index.
    Applied(u32),
    /// The offset was already known; the existing node may have grown.
    Duplicate(u32),
    Skipped(SkipReason),
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReplayStats {
    pub lines: u64,
    pub records: u64,
    pub applied: u64,
    pub duplicates: u64,
    pub extended: u64,
    pub skipped_malformed: u64,
    pub skipped_checksum: u64,
    pub skipped_entry_type: u64,
    pub skipped_out_of_range: u64,
    pub skipped_name: u64,
    pub skipped_unparseable: u64,
    pub cross_links: u64,
    pub adopted: u64,
    pub name_hash_mismatches: u64,
}

impl ReplayStats {
    pub fn skipped(&self) -> u64 {
        self.skipped_malformed
            + self.skipped_checksum
            + self.skipped_entry_type
            + self.skipped_out_of_range
            + self.skipped_name
            + self.skipped_unparseable
    }

    fn count_skip(&mut self, reason: SkipReason) {
        let counter = match reason {
            SkipReason::Malformed => &mut self.skipped_malformed,
            SkipReason::ChecksumMismatch => &mut self.skipped_checksum,
            SkipReason::UnexpectedEntryType => &mut self.skipped_entry_type,
            SkipReason::OutOfRange => &mut self.skipped_out_of_range,
            SkipReason::InvalidName => &mut self.skipped_name,
            SkipReason::Unparseable => &mut self.skipped_unparseable,
        };
        *counter += 1;
    }
}

/// Chains of the system structures written by commit.
#[derive(Debug, Clone)]
pub struct SystemLayout {
    pub bitmap: ClusterChain,
    pub upcase: ClusterChain,
    pub root: ClusterChain,
}

/// Completed, consistent metadata ready to be committed.
#[derive(Debug)]
pub struct Reconstruction {
    pub geometry: VolumeGeometry,
    pub fat: FatTable,
    pub bitmap: BitmapBuilder,
    pub upcase: UpcaseTable,
    pub arena: TreeArena,
    pub layout: SystemLayout,
    pub boot: BootRegion,
    pub stats: ReplayStats,
}

impl Reconstruction {
    /// Bytes needed in the root directory: label, bitmap and upcase entries,
    /// every top-level entry set, and the end-of-directory marker.
    pub fn root_dir_bytes(&self) -> u64 {
        root_dir_bytes(&self.arena)
    }
}

fn root_dir_bytes(arena: &TreeArena) -> u64 {
    let sets: u64 = arena
        .children(ROOT)
        .filter_map(|c| arena.node(c).ok())
        .map(|n| (n.continuations as u64 + 1) * EXFAT_DIR_ENTRY_SIZE as u64)
        .sum();
    4 * EXFAT_DIR_ENTRY_SIZE as u64 + sets
}

struct Workspace {
    fat: FatTable,
    bitmap: BitmapBuilder,
    arena: TreeArena,
    layout: SystemLayout,
    /// Heap cluster -> directory node that claimed it.
    dir_by_cluster: HashMap<u32, u32>,
    /// Parent entry offset -> nodes that named it before it was seen.
    pending_children: HashMap<u64, Vec<u32>>,
}

pub struct ReconstructionDriver<'a, IO: RexIO + ?Sized> {
    io: &'a mut IO,
    geometry: VolumeGeometry,
    upcase: UpcaseTable,
    arena_capacity: u32,
    conservative_bitmap: bool,
    state: DriverState,
    work: Option<Workspace>,
    stats: ReplayStats,
}

impl<'a, IO: RexIO + ?Sized> ReconstructionDriver<'a, IO> {
    pub fn new(io: &'a mut IO, geometry: VolumeGeometry) -> RexResult<Self> {
        geometry.validate()?;
        Ok(Self {
            io,
            geometry,
            upcase: UpcaseTable::generate(),
            arena_capacity: ARENA_DEFAULT_CAPACITY,
            conservative_bitmap: true,
            state: DriverState::Init,
            work: None,
            stats: ReplayStats::default(),
        })
    }

    pub fn with_arena_capacity(mut self, capacity: u32) -> Self {
        self.arena_capacity = capacity;
        self
    }

    /// Renders only the clusters known to be in use instead of the whole heap.
    pub fn with_conservative_bitmap(mut self, conservative: bool) -> Self {
        self.conservative_bitmap = conservative;
        self
    }

    #[inline]
    pub fn state(&self) -> DriverState {
        self.state
    }

    #[inline]
    pub fn stats(&self) -> &ReplayStats {
        &self.stats
    }

    #[inline]
    pub fn geometry(&self) -> &VolumeGeometry {
        &self.geometry
    }

    pub fn arena(&self) -> Option<&TreeArena> {
        self.work.as_ref().map(|w| &w.arena)
    }

    pub fn fat(&self) -> Option<&FatTable> {
        self.work.as_ref().map(|w| &w.fat)
    }

    pub fn bitmap(&self) -> Option<&BitmapBuilder> {
        self.work.as_ref().map(|w| &w.bitmap)
    }

    fn fail(&mut self, err: RexError) -> RexError {
        if let Some(work) = self.work.as_mut() {
            work.bitmap.sync_from(&work.fat);
        }
        error!("reconstruction failed: {err}");
        self.state = DriverState::Failed(err);
        err
    }

    fn expect_state(&self, expected: DriverState) -> RexResult {
        crate::ensure!(
            self.state == expected,
            RexError::InvalidState("operation not allowed in the current driver state")
        );
        Ok(())
    }

    /// Builds the FAT and bitmap, then reserves the bitmap, the upcase table
    /// and a first root directory cluster.
    pub fn build_allocators(&mut self) -> RexResult {
        self.expect_state(DriverState::Init)?;
        self.state = DriverState::BuildingAllocators;

        match self.allocate_system() {
            Ok(work) => {
                info!(
                    "allocators ready: bitmap at cluster {} ({} clusters), upcase at {} ({} clusters), root at {}",
                    work.layout.bitmap.first(),
                    work.layout.bitmap.len(),
                    work.layout.upcase.first(),
                    work.layout.upcase.len(),
                    work.layout.root.first(),
                );
                self.work = Some(work);
                self.state = DriverState::ReplayingLog;
                Ok(())
            }
            Err(e) => Err(self.fail(e)),
        }
    }

    fn allocate_system(&self) -> RexResult<Workspace> {
        let cluster_size = self.geometry.cluster_size();
        let mut fat = FatTable::initialize(self.geometry.fat_entries)?;
        let mut bitmap = BitmapBuilder::from_fat(&fat).with_conservative(self.conservative_bitmap);

        let bitmap_chain = bitmap.reserve_bitmap(&mut fat, cluster_size)?;
        let upcase_chain =
            bitmap.reserve_for_structure(&mut fat, self.upcase.byte_len(), cluster_size)?;
        let root_chain = bitmap.reserve_for_structure(&mut fat, cluster_size, cluster_size)?;
        debug!(
            "FAT: {} entries, {} clusters used",
            fat.len(),
            fat.used_clusters()
        );

        Ok(Workspace {
            fat,
            bitmap,
            arena: TreeArena::new(self.arena_capacity)?,
            layout: SystemLayout {
                bitmap: bitmap_chain,
                upcase: upcase_chain,
                root: root_chain,
            },
            dir_by_cluster: HashMap::new(),
            pending_children: HashMap::new(),
        })
    }

    /// Applies one log record. Recoverable problems come back as
    /// `RecordOutcome::Skipped`; anything else fails the run.
    pub fn replay_record(&mut self, record: &LogRecord) -> RexResult<RecordOutcome> {
        self.expect_state(DriverState::ReplayingLog)?;
        self.stats.records += 1;
        self.stats.lines = self.stats.lines.max(record.line);

        let decoded = reconstruct_entry_set(
            &mut *self.io,
            &self.geometry,
            record.entry_offset,
            &self.upcase,
        );
        let set = match decoded {
            Ok(set) => set,
            Err(e) if e.is_recoverable() => {
                warn!("line {}: skipping record: {e}", record.line);
                let reason = SkipReason::of(&e);
                self.stats.count_skip(reason);
                return Ok(RecordOutcome::Skipped(reason));
            }
            Err(e) => return Err(self.fail(e.into())),
        };

        let result = self.apply(record, set);
        result.map_err(|e| self.fail(e))
    }

    fn apply(&mut self, record: &LogRecord, set: DecodedEntrySet) -> RexResult<RecordOutcome> {
        let cluster_size = self.geometry.cluster_size();
        let Some(work) = self.work.as_mut() else {
            crate::bail!(RexError::InvalidState("allocators not built"));
        };

        if let Some(index) = work.arena.find_by_offset(set.offset) {
            self.stats.duplicates += 1;
            if extend_duplicate(work, index, &set, cluster_size)? {
                self.stats.extended += 1;
            }
            debug!("line {}: duplicate entry at {:#x}", record.line, set.offset);
            return Ok(RecordOutcome::Duplicate(index));
        }

        // validate everything before touching the FAT or the arena
        crate::ensure!(
            work.arena.len() < work.arena.capacity(),
            ArenaError::Full {
                capacity: work.arena.capacity()
            }
        );
        let (parent, explicit) = resolve_parent(work, &self.geometry, record, &set);
        let needed = set.clusters_needed(cluster_size);
        let claim = needed > 0
            && set.first_cluster >= EXFAT_FIRST_CLUSTER
            && needed <= u32::MAX as u64
            && work.fat.run_is_free(set.first_cluster, needed as u32);

        let mut node = TreeNode::from_entry_set(&set);
        if explicit {
            node.set_flags(NodeFlags::EXPLICIT_PARENT);
        }
        let index = work.arena.allocate_node(node, &set.name)?;

        if claim {
            let chain = work
                .bitmap
                .claim_run(&mut work.fat, set.first_cluster, needed as u32)?;
            work.arena.node_mut(index)?.claimed_clusters = chain.len() as u32;
            if set.is_dir() {
                for c in chain.iter() {
                    work.dir_by_cluster.insert(c, index);
                }
            }
        } else if needed > 0 {
            self.stats.cross_links += 1;
            work.arena.node_mut(index)?.set_flags(NodeFlags::CROSS_LINKED);
            warn!(
                "line {}: \"{}\" at {:#x} overlaps allocated clusters {}..{}, kept without a claim",
                record.line,
                set.name_lossy(),
                set.offset,
                set.first_cluster,
                set.first_cluster as u64 + needed,
            );
        }
        if !set.name_hash_ok {
            self.stats.name_hash_mismatches += 1;
        }

        work.arena.link_into(parent, index)?;

        if set.is_dir() {
            for child in work.pending_children.remove(&set.offset).unwrap_or_default() {
                match work.arena.relink(child, index) {
                    Ok(()) => {
                        let n = work.arena.node_mut(child)?;
                        n.set_flags(NodeFlags::EXPLICIT_PARENT);
                    }
                    Err(e) => debug!("node {child} stays in place: {e}"),
                }
            }
        }

        self.stats.applied += 1;
        debug!(
            "line {}: {} -> node {index} under {parent}",
            record.line,
            set.name_lossy()
        );
        Ok(RecordOutcome::Applied(index))
    }

    /// Replays every record of `log`. `progress` runs after each record and
    /// cancels the run by returning `false`.
    pub fn replay<R, F>(&mut self, mut log: RecoveryLog<R>, mut progress: F) -> RexResult
    where
        R: BufRead,
        F: FnMut(&ReplayStats) -> bool,
    {
        self.expect_state(DriverState::ReplayingLog)?;

        for item in log.by_ref() {
            match item {
                Ok(record) => {
                    self.replay_record(&record)?;
                }
                Err(LogError::Unparseable { line }) => {
                    warn!("line {line}: unparseable record, skipped");
                    self.stats.lines = self.stats.lines.max(line);
                    self.stats.count_skip(SkipReason::Unparseable);
                }
                Err(e) => return Err(self.fail(e.into())),
            }
            if !progress(&self.stats) {
                return Err(self.fail(RexError::Cancelled));
            }
        }
        self.stats.lines = log.lines_read();
        Ok(())
    }

    /// Adopts orphans, sizes the root directory and builds the boot region.
    pub fn finish(&mut self) -> RexResult<Reconstruction> {
        self.expect_state(DriverState::ReplayingLog)?;
        let Some(mut work) = self.work.take() else {
            return Err(self.fail(RexError::InvalidState("allocators not built")));
        };

        let result = self.finalize(&mut work);
        match result {
            Ok(boot) => {
                self.state = DriverState::Done;
                info!(
                    "reconstruction done: {} nodes, {} clusters in use, boot checksum {:#010x}",
                    work.arena.len() - 1,
                    work.fat.used_clusters(),
                    boot.checksum()
                );
                Ok(Reconstruction {
                    geometry: self.geometry.clone(),
                    fat: work.fat,
                    bitmap: work.bitmap,
                    upcase: self.upcase.clone(),
                    arena: work.arena,
                    layout: work.layout,
                    boot,
                    stats: self.stats.clone(),
                })
            }
            Err(e) => {
                self.work = Some(work);
                Err(self.fail(e))
            }
        }
    }

    fn finalize(&mut self, work: &mut Workspace) -> RexResult<BootRegion> {
        self.stats.adopted += adopt_orphans(work, &self.geometry);

        let cluster_size = self.geometry.cluster_size();
        let needed = root_dir_bytes(&work.arena).div_ceil(cluster_size);
        let have = work.layout.root.len() as u64;
        if needed > have {
            crate::ensure!(
                needed <= u32::MAX as u64,
                FatError::InvalidLength
            );
            work.layout.root = work.bitmap.extend_chain(
                &mut work.fat,
                work.layout.root.first(),
                (needed - have) as u32,
            )?;
            info!("root directory grown to {needed} clusters");
        }

        work.arena.check_links()?;
        Ok(BootRegion::build(
            &self.geometry,
            work.layout.root.first(),
            work.bitmap.percent_in_use(),
        ))
    }

    /// Full pipeline: allocators, replay, finish.
    pub fn run<R: BufRead>(&mut self, log: RecoveryLog<R>) -> RexResult<Reconstruction> {
        self.build_allocators()?;
        self.replay(log, |_| true)?;
        self.finish()
    }
}

/// Parent for a new node, and whether it came from the record itself.
fn resolve_parent(
    work: &mut Workspace,
    geometry: &VolumeGeometry,
    record: &LogRecord,
    set: &DecodedEntrySet,
) -> (u32, bool) {
    if let Some(parent_offset) = record.parent_offset {
        match work.arena.find_by_offset(parent_offset) {
            Some(p) if work.arena.node(p).is_ok_and(|n| n.is_dir()) => return (p, true),
            Some(_) => warn!(
                "line {}: parent at {parent_offset:#x} is not a directory",
                record.line
            ),
            None => {
                // linked by ownership for now, moved once the parent shows up
                let next = work.arena.len();
                work.pending_children
                    .entry(parent_offset)
                    .or_default()
                    .push(next);
            }
        }
    }

    let owner = geometry
        .cluster_of(set.offset)
        .and_then(|c| work.dir_by_cluster.get(&c).copied());
    (owner.unwrap_or(ROOT), false)
}

/// Grows a duplicate's chain when the new record declares more data.
fn extend_duplicate(
    work: &mut Workspace,
    index: u32,
    set: &DecodedEntrySet,
    cluster_size: u64,
) -> RexResult<bool> {
    let node = *work.arena.node(index)?;
    let needed = set.clusters_needed(cluster_size);
    if node.claimed_clusters == 0 || needed <= node.claimed_clusters as u64 {
        return Ok(false);
    }
    crate::ensure!(needed <= u32::MAX as u64, FatError::InvalidLength);

    let additional = (needed - node.claimed_clusters as u64) as u32;
    let chain = match work
        .bitmap
        .extend_chain(&mut work.fat, node.first_cluster, additional)
    {
        Ok(chain) => chain,
        Err(e @ FatError::AllocationExhausted { .. }) => return Err(e.into()),
        Err(e) => {
            warn!("cannot extend chain at cluster {}: {e}", node.first_cluster);
            return Ok(false);
        }
    };

    if node.is_dir() {
        for c in chain.iter() {
            work.dir_by_cluster.insert(c, index);
        }
    }
    let n = work.arena.node_mut(index)?;
    n.claimed_clusters = chain.len() as u32;
    n.data_length = set.data_length;
    n.valid_data_length = set.valid_data_length;
    Ok(true)
}

/// Moves root-level nodes into the directory whose clusters hold their entry.
fn adopt_orphans(work: &mut Workspace, geometry: &VolumeGeometry) -> u64 {
    let orphans: Vec<u32> = work.arena.children(ROOT).collect();
    let mut adopted = 0;
    for child in orphans {
        let Ok(node) = work.arena.node(child).copied() else {
            continue;
        };
        if node.flags().contains(NodeFlags::EXPLICIT_PARENT) {
            continue;
        }
        let Some(&dir) = geometry
            .cluster_of(node.entry_offset)
            .and_then(|c| work.dir_by_cluster.get(&c))
        else {
            continue;
        };
        if dir == child {
            continue;
        }
        match work.arena.relink(child, dir) {
            Ok(()) => {
                if let Ok(n) = work.arena.node_mut(child) {
                    n.set_flags(NodeFlags::ADOPTED);
                }
                adopted += 1;
            }
            Err(e) => debug!("orphan {child} not adopted: {e}"),
        }
    }
    if adopted > 0 {
        info!("adopted {adopted} orphaned entries");
    }
    adopted
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        geometry::small_test_geometry,
        types::{ExFatAttributes, ExFatEntrySet, StreamFlags},
        utils::time::ExFatTimestamp,
    };

    fn place(
        image: &mut [u8],
        geo: &VolumeGeometry,
        offset: u64,
        name: &str,
        dir: bool,
        first_cluster: u32,
        len: u64,
    ) {
        let attrs = if dir {
            ExFatAttributes::DIRECTORY
        } else {
            ExFatAttributes::ARCHIVE
        };
        let set = ExFatEntrySet::new(
            name,
            attrs,
            StreamFlags::ALLOCATION_POSSIBLE | StreamFlags::NO_FAT_CHAIN,
            first_cluster,
            len,
            ExFatTimestamp::default(),
            &UpcaseTable::generate(),
        );
        let bytes = set.to_bytes();
        let at = (geo.partition_offset() + offset) as usize;
        image[at..at + bytes.len()].copy_from_slice(&bytes);
    }

    fn record(line: u64, entry_offset: u64, parent_offset: Option<u64>) -> LogRecord {
        LogRecord {
            line,
            entry_offset,
            parent_offset,
        }
    }

    #[test]
    fn test_state_machine() {
        let geo = small_test_geometry();
        let mut image = vec![0u8; geo.cluster_heap_end() as usize];
        let mut io = MemRexIO::new(&mut image);
        let mut driver = ReconstructionDriver::new(&mut io, geo).unwrap();

        assert_eq!(driver.state(), DriverState::Init);
        assert!(driver.finish().is_err());
        assert_eq!(driver.state(), DriverState::Init);

        driver.build_allocators().unwrap();
        assert_eq!(driver.state(), DriverState::ReplayingLog);
        let layout = &driver.work.as_ref().unwrap().layout;
        // 62-cluster bitmap fits one cluster; upcase needs 32 of 4 KiB
        assert_eq!(layout.bitmap.as_slice(), &[2]);
        assert_eq!(layout.upcase.first(), 3);
        assert_eq!(layout.upcase.len(), 32);
        assert_eq!(layout.root.as_slice(), &[35]);

        let rec = driver.finish().unwrap();
        assert_eq!(driver.state(), DriverState::Done);
        assert!(rec.arena.is_empty());
        assert!(driver.build_allocators().is_err());
    }

    #[test]
    fn test_exhaustion_fails_the_run() {
        let geo = VolumeGeometry {
            fat_entries: 20,
            volume_sectors: 32 + 18 * 8,
            ..small_test_geometry()
        };
        let mut image = vec![0u8; geo.cluster_heap_end() as usize];
        let mut io = MemRexIO::new(&mut image);
        let mut driver = ReconstructionDriver::new(&mut io, geo).unwrap();
        let err = driver.build_allocators().unwrap_err();
        assert!(matches!(
            err,
            RexError::Fat(FatError::AllocationExhausted { .. })
        ));
        assert_eq!(driver.state(), DriverState::Failed(err));
    }

    #[test]
    fn test_directory_ownership_and_cross_links() {
        let geo = small_test_geometry();
        let mut image = vec![0u8; geo.cluster_heap_end() as usize];
        let docs = geo.cluster_offset(36);
        let readme = geo.cluster_offset(40);
        let clash = geo.cluster_offset(40) + 96;
        place(&mut image, &geo, docs, "docs", true, 40, 4096);
        place(&mut image, &geo, readme, "readme.txt", false, 44, 9000);
        place(&mut image, &geo, clash, "clash.bin", false, 45, 4096);

        let mut io = MemRexIO::new(&mut image);
        let mut driver = ReconstructionDriver::new(&mut io, geo).unwrap();
        driver.build_allocators().unwrap();

        assert_eq!(
            driver.replay_record(&record(1, docs, None)).unwrap(),
            RecordOutcome::Applied(1)
        );
        assert_eq!(
            driver.replay_record(&record(2, readme, None)).unwrap(),
            RecordOutcome::Applied(2)
        );
        assert_eq!(
            driver.replay_record(&record(3, clash, None)).unwrap(),
            RecordOutcome::Applied(3)
        );
        assert_eq!(
            driver.replay_record(&record(4, docs, None)).unwrap(),
            RecordOutcome::Duplicate(1)
        );

        let arena = driver.arena().unwrap();
        assert_eq!(arena.node(2).unwrap().parent, 1);
        assert_eq!(arena.node(2).unwrap().claimed_clusters, 3);
        assert!(arena.node(3).unwrap().flags().contains(NodeFlags::CROSS_LINKED));
        assert_eq!(arena.node(3).unwrap().claimed_clusters, 0);
        assert_eq!(driver.stats().cross_links, 1);
        assert_eq!(driver.stats().duplicates, 1);

        let fat = driver.fat().unwrap();
        let bitmap = driver.bitmap().unwrap();
        for c in EXFAT_FIRST_CLUSTER..fat.len() {
            assert_eq!(bitmap.is_set(c), !fat.is_free(c));
        }
    }

    #[test]
    fn test_explicit_parent_seen_later_and_orphan_adoption() {
        let geo = small_test_geometry();
        let mut image = vec![0u8; geo.cluster_heap_end() as usize];
        let photos = geo.cluster_offset(36);
        let pic = geo.cluster_offset(50);
        let stray = geo.cluster_offset(40) + 32;
        place(&mut image, &geo, photos, "Photos", true, 40, 8192);
        place(&mut image, &geo, pic, "pic.jpg", false, 52, 100);
        place(&mut image, &geo, stray, "stray.txt", false, 0, 0);

        let mut io = MemRexIO::new(&mut image);
        let mut driver = ReconstructionDriver::new(&mut io, geo).unwrap();
        driver.build_allocators().unwrap();

        // child first, with its parent named explicitly
        driver.replay_record(&record(1, pic, Some(photos))).unwrap();
        // entry lives in Photos' clusters, but Photos is not known yet
        driver.replay_record(&record(2, stray, None)).unwrap();
        assert_eq!(driver.arena().unwrap().node(2).unwrap().parent, ROOT);
        driver.replay_record(&record(3, photos, None)).unwrap();

        let arena = driver.arena().unwrap();
        assert_eq!(arena.node(1).unwrap().parent, 3);
        assert!(arena.node(1).unwrap().flags().contains(NodeFlags::EXPLICIT_PARENT));

        let rec = driver.finish().unwrap();
        assert_eq!(rec.arena.node(2).unwrap().parent, 3);
        assert!(rec.arena.node(2).unwrap().flags().contains(NodeFlags::ADOPTED));
        assert_eq!(rec.stats.adopted, 1);
        assert_eq!(rec.arena.children(ROOT).collect::<Vec<_>>(), vec![3]);
        assert_eq!(rec.arena.path_of(1), "/Photos/pic.jpg");
        rec.arena.check_links().unwrap();
    }

    #[test]
    fn test_cancellation() {
        let geo = small_test_geometry();
        let mut image = vec![0u8; geo.cluster_heap_end() as usize];
        let mut io = MemRexIO::new(&mut image);
        let mut driver = ReconstructionDriver::new(&mut io, geo).unwrap();
        driver.build_allocators().unwrap();

        let log = RecoveryLog::new(&b"0x1\n0x2\n0x3\n"[..]);
        let mut seen = 0;
        let err = driver
            .replay(log, |_| {
                seen += 1;
                seen < 2
            })
            .unwrap_err();
        assert_eq!(err, RexError::Cancelled);
        assert_eq!(driver.state(), DriverState::Failed(RexError::Cancelled));
        assert_eq!(driver.stats().skipped_out_of_range, 2);
        assert!(driver.finish().is_err());
    }
}
