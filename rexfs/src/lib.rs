// SPDX-License-Identifier: MIT

// Core modules
pub mod checksum;
pub mod constant;
pub mod errors;
pub mod geometry;
mod macros;
pub mod types;
pub mod utils;

// On-disk structures
pub mod bitmap;
pub mod fat;
pub mod upcase;

// Allocation seam
pub mod allocator;

// Reconstruction pipeline
pub mod arena;
pub mod commit;
pub mod driver;
pub mod entry_set;
pub mod recovery_log;

/// Everything a front end needs to run and commit a reconstruction.
pub mod prelude {
    pub use crate::allocator::{ClusterAllocator, ClusterHandle};
    pub use crate::arena::{ROOT, SENTINEL, TreeArena, TreeNode};
    pub use crate::bitmap::BitmapBuilder;
    pub use crate::commit::{CommitReport, commit};
    pub use crate::driver::{
        DriverState, Reconstruction, ReconstructionDriver, RecordOutcome, ReplayStats,
        SkipReason, SystemLayout,
    };
    pub use crate::entry_set::{DecodedEntrySet, decode_entry_set, read_entry_set, reconstruct_entry_set};
    pub use crate::errors::*;
    pub use crate::fat::{ClusterChain, FatTable};
    pub use crate::geometry::VolumeGeometry;
    pub use crate::recovery_log::{LogRecord, RecoveryLog, parse_line};
    pub use crate::types::*;
    pub use crate::upcase::UpcaseTable;
    pub use crate::utils::time::ExFatTimestamp;

    pub use rexio::prelude::{MemRexIO, RexIO, RexIOExt, RexIOStructExt, StdRexIO};
}
