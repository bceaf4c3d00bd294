// SPDX-License-Identifier: MIT

//! Directory tree stored as a flat, index-addressed arena.
//!
//! Nodes refer to each other by `u32` index only. Index 0 is both the root
//! directory and the "no node" value in link fields, since the root is never
//! anyone's child or sibling. Slots are handed out monotonically and never
//! reused.

use std::collections::HashMap;

use rexio::{WRITE_CHUNK_SIZE, prelude::*};
use zerocopy::{FromBytes, FromZeros, Immutable, IntoBytes, KnownLayout};

use crate::{
    constant::*,
    entry_set::DecodedEntrySet,
    errors::*,
    types::{ExFatAttributes, NodeFlags, StreamFlags},
    utils::time::ExFatTimestamp,
};

pub const SENTINEL: u32 = 0;
pub const ROOT: u32 = 0;

/// One reconstructed file or directory. Fixed size, no padding.
#[derive(IntoBytes, FromBytes, KnownLayout, Immutable, Copy, Clone, Debug, PartialEq, Eq)]
#[repr(C)]
pub struct TreeNode {
    /// Partition-relative offset of the primary entry (0 for the root).
    pub entry_offset: u64,
    pub data_length: u64,
    pub valid_data_length: u64,
    pub first_cluster: u32,
    /// Clusters claimed in the FAT for this node, 0 if none.
    pub claimed_clusters: u32,
    pub parent: u32,
    pub next: u32,
    pub prev: u32,
    pub first_child: u32,
    pub last_child: u32,
    pub child_count: u32,
    /// First children in insertion order, `SENTINEL` when unused.
    pub child_slots: [u32; ARENA_CHILD_SLOTS],
    /// Start of the name in the arena name pool.
    pub name_offset: u32,
    pub created: u32,
    pub modified: u32,
    pub accessed: u32,
    pub attributes: u16,
    pub name_hash: u16,
    pub name_length: u8,
    pub continuations: u8,
    pub stream_flags: u8,
    pub flags: u8,
    pub created_10ms: u8,
    pub modified_10ms: u8,
    pub created_utc: u8,
    pub modified_utc: u8,
    pub accessed_utc: u8,
    pub reserved: [u8; 3],
}

impl TreeNode {
    pub fn new(entry_offset: u64, attributes: ExFatAttributes) -> Self {
        Self {
            entry_offset,
            attributes: attributes.bits(),
            ..Self::new_zeroed()
        }
    }

    /// Root directory node.
    pub fn root() -> Self {
        Self::new(0, ExFatAttributes::DIRECTORY)
    }

    pub fn from_entry_set(set: &DecodedEntrySet) -> Self {
        let mut flags = NodeFlags::empty();
        if !set.name_hash_ok {
            flags |= NodeFlags::NAME_HASH_MISMATCH;
        }
        Self {
            data_length: set.data_length,
            valid_data_length: set.valid_data_length,
            first_cluster: set.first_cluster,
            created: set.created.raw,
            modified: set.modified.raw,
            accessed: set.accessed.raw,
            name_hash: set.name_hash,
            continuations: set.continuations,
            stream_flags: set.stream_flags.bits(),
            flags: flags.bits(),
            created_10ms: set.created.increment_10ms,
            modified_10ms: set.modified.increment_10ms,
            created_utc: set.created.utc_offset,
            modified_utc: set.modified.utc_offset,
            accessed_utc: set.accessed.utc_offset,
            ..Self::new(set.offset, set.attributes)
        }
    }

    #[inline]
    pub fn attributes(&self) -> ExFatAttributes {
        ExFatAttributes::from_bits_truncate(self.attributes)
    }

    #[inline]
    pub fn is_dir(&self) -> bool {
        self.attributes().is_dir()
    }

    #[inline]
    pub fn flags(&self) -> NodeFlags {
        NodeFlags::from_bits_truncate(self.flags)
    }

    #[inline]
    pub fn set_flags(&mut self, flags: NodeFlags) {
        self.flags |= flags.bits();
    }

    #[inline]
    pub fn clear_flags(&mut self, flags: NodeFlags) {
        self.flags &= !flags.bits();
    }

    #[inline]
    pub fn stream_flags(&self) -> StreamFlags {
        StreamFlags::from_bits_truncate(self.stream_flags)
    }

    pub fn created(&self) -> ExFatTimestamp {
        ExFatTimestamp::new(self.created, self.created_10ms, self.created_utc)
    }

    pub fn modified(&self) -> ExFatTimestamp {
        ExFatTimestamp::new(self.modified, self.modified_10ms, self.modified_utc)
    }

    pub fn accessed(&self) -> ExFatTimestamp {
        ExFatTimestamp::new(self.accessed, 0, self.accessed_utc)
    }

    /// Whether `cluster` is one of the clusters claimed for this node.
    ///
    /// Claims are always contiguous runs from `first_cluster`.
    #[inline]
    pub fn owns_cluster(&self, cluster: u32) -> bool {
        self.claimed_clusters > 0
            && cluster >= self.first_cluster
            && cluster - self.first_cluster < self.claimed_clusters
    }
}

#[derive(IntoBytes, FromBytes, KnownLayout, Immutable, Copy, Clone, Debug)]
#[repr(C, packed)]
struct SnapshotHeader {
    magic: [u8; 8],
    version: u32,
    node_size: u32,
    node_count: u32,
    name_units: u32,
    capacity: u32,
    reserved: [u8; 4],
}

/// Initial slot reservation; the vector grows up to `capacity` on demand.
const INITIAL_RESERVE: u32 = 4096;

#[derive(Debug, Clone)]
pub struct TreeArena {
    nodes: Vec<TreeNode>,
    names: Vec<u16>,
    capacity: u32,
    by_offset: HashMap<u64, u32>,
}

impl TreeArena {
    /// Arena holding at most `capacity` nodes, the root included.
    pub fn new(capacity: u32) -> ArenaResult<Self> {
        crate::ensure!(capacity >= 1, ArenaError::Full { capacity });
        let mut nodes = Vec::with_capacity(capacity.min(INITIAL_RESERVE) as usize);
        nodes.push(TreeNode::root());
        Ok(Self {
            nodes,
            names: Vec::new(),
            capacity,
            by_offset: HashMap::new(),
        })
    }

    /// Node count, the root included.
    #[inline]
    pub fn len(&self) -> u32 {
        self.nodes.len() as u32
    }

    /// True when only the root exists.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.nodes.len() == 1
    }

    #[inline]
    pub fn capacity(&self) -> u32 {
        self.capacity
    }

    pub fn node(&self, index: u32) -> ArenaResult<&TreeNode> {
        self.nodes
            .get(index as usize)
            .ok_or(ArenaError::InvalidIndex(index))
    }

    pub fn node_mut(&mut self, index: u32) -> ArenaResult<&mut TreeNode> {
        self.nodes
            .get_mut(index as usize)
            .ok_or(ArenaError::InvalidIndex(index))
    }

    pub fn name(&self, index: u32) -> ArenaResult<&[u16]> {
        let node = self.node(index)?;
        let start = node.name_offset as usize;
        self.names
            .get(start..start + node.name_length as usize)
            .ok_or(ArenaError::CorruptLinks(index))
    }

    pub fn name_lossy(&self, index: u32) -> String {
        self.name(index)
            .map(String::from_utf16_lossy)
            .unwrap_or_default()
    }

    pub fn find_by_offset(&self, entry_offset: u64) -> Option<u32> {
        self.by_offset.get(&entry_offset).copied()
    }

    pub fn iter(&self) -> impl Iterator<Item = (u32, &TreeNode)> + '_ {
        self.nodes.iter().enumerate().map(|(i, n)| (i as u32, n))
    }

    /// Stores `node` and its name in the next free slot.
    pub fn allocate_node(&mut self, mut node: TreeNode, name: &[u16]) -> ArenaResult<u32> {
        crate::ensure!(
            self.len() < self.capacity,
            ArenaError::Full {
                capacity: self.capacity
            }
        );
        let name = &name[..name.len().min(EXFAT_MAX_NAME_UTF16_CHARS)];
        let index = self.len();

        node.name_offset = self.names.len() as u32;
        node.name_length = name.len() as u8;
        node.parent = SENTINEL;
        node.next = SENTINEL;
        node.prev = SENTINEL;
        node.first_child = SENTINEL;
        node.last_child = SENTINEL;
        node.child_count = 0;
        node.child_slots = [SENTINEL; ARENA_CHILD_SLOTS];
        node.clear_flags(NodeFlags::LINKED);

        self.names.extend_from_slice(name);
        if node.entry_offset != 0 {
            self.by_offset.insert(node.entry_offset, index);
        }
        self.nodes.push(node);
        Ok(index)
    }

    fn check_parent(&self, parent: u32) -> ArenaResult {
        crate::ensure!(
            self.node(parent)?.is_dir(),
            ArenaError::NotADirectory(parent)
        );
        Ok(())
    }

    /// Appends `node` as the last child of `parent`.
    pub fn link_into(&mut self, parent: u32, node: u32) -> ArenaResult {
        self.check_parent(parent)?;
        crate::ensure!(node != ROOT, ArenaError::InvalidIndex(node));
        crate::ensure!(
            !self.node(node)?.flags().contains(NodeFlags::LINKED),
            ArenaError::AlreadyLinked(node)
        );

        let (p, n) = (parent as usize, node as usize);
        let last = self.nodes[p].last_child;
        if last == SENTINEL {
            self.nodes[p].first_child = node;
        } else {
            self.nodes[last as usize].next = node;
            self.nodes[n].prev = last;
        }
        self.nodes[p].last_child = node;
        self.nodes[p].child_count += 1;

        let count = self.nodes[p].child_count as usize;
        if count <= ARENA_CHILD_SLOTS {
            self.nodes[p].child_slots[count - 1] = node;
        }

        self.nodes[n].parent = parent;
        self.nodes[n].set_flags(NodeFlags::LINKED);
        Ok(())
    }

    /// Detaches `node` from its parent's child list.
    pub fn unlink(&mut self, node: u32) -> ArenaResult {
        let target = *self.node(node)?;
        crate::ensure!(
            target.flags().contains(NodeFlags::LINKED),
            ArenaError::Other("node is not linked")
        );
        let (parent, prev, next) = (target.parent, target.prev, target.next);

        if prev == SENTINEL {
            self.nodes[parent as usize].first_child = next;
        } else {
            self.nodes[prev as usize].next = next;
        }
        if next == SENTINEL {
            self.nodes[parent as usize].last_child = prev;
        } else {
            self.nodes[next as usize].prev = prev;
        }
        self.nodes[parent as usize].child_count -= 1;

        let n = &mut self.nodes[node as usize];
        n.parent = SENTINEL;
        n.prev = SENTINEL;
        n.next = SENTINEL;
        n.clear_flags(NodeFlags::LINKED);

        self.rebuild_slots(parent);
        Ok(())
    }

    /// Moves `node` under `new_parent`, refusing moves that would create a cycle.
    pub fn relink(&mut self, node: u32, new_parent: u32) -> ArenaResult {
        self.check_parent(new_parent)?;
        crate::ensure!(node != ROOT, ArenaError::InvalidIndex(node));

        let mut cursor = new_parent;
        let mut steps = 0u32;
        while cursor != ROOT {
            crate::ensure!(cursor != node, ArenaError::CycleDetected(node));
            cursor = self.node(cursor)?.parent;
            steps += 1;
            crate::ensure!(steps <= self.len(), ArenaError::CorruptLinks(new_parent));
        }

        if self.node(node)?.flags().contains(NodeFlags::LINKED) {
            self.unlink(node)?;
        }
        self.link_into(new_parent, node)
    }

    fn rebuild_slots(&mut self, parent: u32) {
        let mut slots = [SENTINEL; ARENA_CHILD_SLOTS];
        for (slot, child) in slots.iter_mut().zip(self.children(parent)) {
            *slot = child;
        }
        self.nodes[parent as usize].child_slots = slots;
    }

    pub fn children(&self, parent: u32) -> Children<'_> {
        let next = self
            .nodes
            .get(parent as usize)
            .map_or(SENTINEL, |n| n.first_child);
        Children {
            arena: self,
            next,
            remaining: self.len(),
        }
    }

    /// Slash-separated path from the root.
    pub fn path_of(&self, index: u32) -> String {
        let mut parts = Vec::new();
        let mut cursor = index;
        while cursor != ROOT && parts.len() <= self.nodes.len() {
            parts.push(self.name_lossy(cursor));
            cursor = self.nodes.get(cursor as usize).map_or(ROOT, |n| n.parent);
        }
        parts.reverse();
        format!("/{}", parts.join("/"))
    }

    /// Verifies parent, sibling, count and slot consistency for every directory.
    pub fn check_links(&self) -> ArenaResult {
        for (index, node) in self.iter() {
            if index != ROOT && node.flags().contains(NodeFlags::LINKED) {
                let parent = self.node(node.parent)?;
                crate::ensure!(parent.is_dir(), ArenaError::CorruptLinks(index));
            }
            if node.first_child == SENTINEL {
                crate::ensure!(
                    node.child_count == 0 && node.last_child == SENTINEL,
                    ArenaError::CorruptLinks(index)
                );
                continue;
            }

            let mut prev = SENTINEL;
            let mut count = 0u32;
            let mut cursor = node.first_child;
            while cursor != SENTINEL {
                let child = self.node(cursor)?;
                crate::ensure!(
                    child.parent == index && child.prev == prev && count < self.len(),
                    ArenaError::CorruptLinks(index)
                );
                if (count as usize) < ARENA_CHILD_SLOTS {
                    crate::ensure!(
                        node.child_slots[count as usize] == cursor,
                        ArenaError::CorruptLinks(index)
                    );
                }
                prev = cursor;
                cursor = child.next;
                count += 1;
            }
            crate::ensure!(
                count == node.child_count && prev == node.last_child,
                ArenaError::CorruptLinks(index)
            );
        }
        Ok(())
    }

    /// Serializes the arena at `offset`; returns the bytes written.
    pub fn write_snapshot<IO: RexIO + ?Sized>(&self, io: &mut IO, offset: u64) -> ArenaResult<u64> {
        let header = SnapshotHeader {
            magic: *ARENA_SNAPSHOT_MAGIC,
            version: ARENA_SNAPSHOT_VERSION,
            node_size: size_of::<TreeNode>() as u32,
            node_count: self.len(),
            name_units: self.names.len() as u32,
            capacity: self.capacity,
            reserved: [0u8; 4],
        };

        let mut buf = Vec::with_capacity(
            size_of::<SnapshotHeader>()
                + self.nodes.len() * size_of::<TreeNode>()
                + self.names.len() * 2,
        );
        buf.extend_from_slice(header.as_bytes());
        buf.extend_from_slice(self.nodes.as_bytes());
        for unit in &self.names {
            buf.extend_from_slice(&unit.to_le_bytes());
        }

        io.write_in_chunks(offset, &buf, WRITE_CHUNK_SIZE)?;
        Ok(buf.len() as u64)
    }

    pub fn read_snapshot<IO: RexIO + ?Sized>(io: &mut IO, offset: u64) -> ArenaResult<Self> {
        let header: SnapshotHeader = io.read_struct(offset)?;
        let (magic, version, node_size) = (header.magic, header.version, header.node_size);
        let (node_count, name_units, capacity) =
            (header.node_count, header.name_units, header.capacity);
        crate::ensure!(
            &magic == ARENA_SNAPSHOT_MAGIC,
            ArenaError::BadSnapshot("bad snapshot magic")
        );
        crate::ensure!(
            version == ARENA_SNAPSHOT_VERSION,
            ArenaError::BadSnapshot("unsupported snapshot version")
        );
        crate::ensure!(
            node_size as usize == size_of::<TreeNode>(),
            ArenaError::BadSnapshot("node size mismatch")
        );
        crate::ensure!(
            node_count >= 1 && node_count <= capacity,
            ArenaError::BadSnapshot("node count out of range")
        );

        let mut off = offset + size_of::<SnapshotHeader>() as u64;
        let mut raw = vec![0u8; node_count as usize * size_of::<TreeNode>()];
        io.read_in_chunks(off, &mut raw, WRITE_CHUNK_SIZE)?;
        off += raw.len() as u64;

        let nodes = raw
            .chunks_exact(size_of::<TreeNode>())
            .map(TreeNode::read_from_bytes)
            .collect::<Result<Vec<_>, _>>()
            .map_err(|_| ArenaError::BadSnapshot("unreadable node"))?;

        let mut raw_names = vec![0u8; name_units as usize * 2];
        io.read_in_chunks(off, &mut raw_names, WRITE_CHUNK_SIZE)?;
        let names: Vec<u16> = raw_names
            .chunks_exact(2)
            .map(|c| u16::from_le_bytes([c[0], c[1]]))
            .collect();

        let mut by_offset = HashMap::with_capacity(nodes.len());
        for (i, node) in nodes.iter().enumerate().skip(1) {
            crate::ensure!(
                node.name_offset as usize + node.name_length as usize <= names.len(),
                ArenaError::BadSnapshot("name outside the name pool")
            );
            by_offset.insert(node.entry_offset, i as u32);
        }

        let arena = Self {
            nodes,
            names,
            capacity,
            by_offset,
        };
        arena.check_links()?;
        Ok(arena)
    }
}

/// Children of one directory, in insertion order.
pub struct Children<'a> {
    arena: &'a TreeArena,
    next: u32,
    remaining: u32,
}

impl Iterator for Children<'_> {
    type Item = u32;

    fn next(&mut self) -> Option<u32> {
        if self.next == SENTINEL || self.remaining == 0 {
            return None;
        }
        let current = self.next;
        self.remaining -= 1;
        self.next = self
            .arena
            .nodes
            .get(current as usize)
            .map_or(SENTINEL, |n| n.next);
        Some(current)
    }
}
