// SPDX-License-Identifier: MIT

pub use crate::errors::{FatError, FatResult};

/// Marker for whatever an allocator hands back (a cluster chain here).
pub trait ClusterHandle {}

/// Allocation of heap clusters as linked chains.
pub trait ClusterAllocator<Handle: ClusterHandle + Sized + Clone> {
    /// Allocate `count` clusters linked in order.
    fn allocate_chain(&mut self, count: u32) -> FatResult<Handle>;

    fn allocate_unit(&mut self) -> FatResult<Handle> {
        self.allocate_chain(1)
    }

    /// Allocatable clusters currently in use.
    fn used_units(&self) -> u32;

    fn remaining_units(&self) -> u32;
}
