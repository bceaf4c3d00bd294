// SPDX-License-Identifier: MIT

use core::fmt;

pub use rexio::errors::*;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GeometryError {
    Invalid(&'static str),
    Other(&'static str),
}

impl GeometryError {
    pub fn msg(&self) -> &'static str {
        match self {
            GeometryError::Invalid(msg) => msg,
            GeometryError::Other(msg) => msg,
        }
    }

    fn details(&self, _f: &mut fmt::Formatter<'_>) -> fmt::Result {
        Ok(())
    }

    pub fn source(&self) -> Option<RexError> {
        None
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FatError {
    /// The free-cluster search found nothing.
    NoFreeCluster,
    /// A chain allocation ran out of clusters after claiming `claimed` of them.
    AllocationExhausted { requested: u32, claimed: u32 },
    InvalidLength,
    InvalidCluster(u32),
    ClusterInUse(u32),
    LoopDetected(u32),
    BrokenChain(u32),
    Other(&'static str),
}

impl FatError {
    pub fn msg(&self) -> &'static str {
        match self {
            FatError::NoFreeCluster => "No free cluster",
            FatError::AllocationExhausted { .. } => "Cluster allocation exhausted",
            FatError::InvalidLength => "Invalid chain length",
            FatError::InvalidCluster(_) => "Invalid cluster index",
            FatError::ClusterInUse(_) => "Cluster already in use",
            FatError::LoopDetected(_) => "Loop detected in FAT chain",
            FatError::BrokenChain(_) => "Broken FAT chain",
            FatError::Other(msg) => msg,
        }
    }

    fn details(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FatError::AllocationExhausted { requested, claimed } => {
                write!(f, " (requested: {requested}, claimed: {claimed})")
            }
            FatError::InvalidCluster(c)
            | FatError::ClusterInUse(c)
            | FatError::LoopDetected(c)
            | FatError::BrokenChain(c) => write!(f, " (cluster: {c})"),
            _ => Ok(()),
        }
    }

    pub fn source(&self) -> Option<RexError> {
        None
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntrySetError {
    IO(RexIOError),
    OutOfRange {
        offset: u64,
    },
    MalformedEntrySet {
        offset: u64,
        continuations: u8,
    },
    ChecksumMismatch {
        offset: u64,
        stored: u16,
        computed: u16,
    },
    UnexpectedEntryType {
        offset: u64,
        index: u8,
        found: u8,
    },
    InvalidName {
        offset: u64,
    },
    Other(&'static str),
}

impl EntrySetError {
    pub fn msg(&self) -> &'static str {
        match self {
            EntrySetError::IO(_) => "IO error",
            EntrySetError::OutOfRange { .. } => "Entry offset outside the cluster heap",
            EntrySetError::MalformedEntrySet { .. } => "Malformed entry set",
            EntrySetError::ChecksumMismatch { .. } => "Entry set checksum mismatch",
            EntrySetError::UnexpectedEntryType { .. } => "Unexpected entry type",
            EntrySetError::InvalidName { .. } => "Invalid name length",
            EntrySetError::Other(msg) => msg,
        }
    }

    fn details(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EntrySetError::OutOfRange { offset } | EntrySetError::InvalidName { offset } => {
                write!(f, " (offset: {offset:#x})")
            }
            EntrySetError::MalformedEntrySet {
                offset,
                continuations,
            } => write!(f, " (offset: {offset:#x}, continuations: {continuations})"),
            EntrySetError::ChecksumMismatch {
                offset,
                stored,
                computed,
            } => write!(
                f,
                " (offset: {offset:#x}, stored: {stored:#06x}, computed: {computed:#06x})"
            ),
            EntrySetError::UnexpectedEntryType {
                offset,
                index,
                found,
            } => write!(f, " (offset: {offset:#x}, entry: {index}, type: {found:#04x})"),
            _ => Ok(()),
        }
    }

    pub fn source(&self) -> Option<RexError> {
        match self {
            EntrySetError::IO(e) => Some(RexError::IO(*e)),
            _ => None,
        }
    }

    /// Whether replay may skip the record and carry on.
    pub fn is_recoverable(&self) -> bool {
        !matches!(self, EntrySetError::IO(_) | EntrySetError::Other(_))
    }

    pub fn offset(&self) -> Option<u64> {
        match self {
            EntrySetError::OutOfRange { offset }
            | EntrySetError::InvalidName { offset }
            | EntrySetError::MalformedEntrySet { offset, .. }
            | EntrySetError::ChecksumMismatch { offset, .. }
            | EntrySetError::UnexpectedEntryType { offset, .. } => Some(*offset),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArenaError {
    IO(RexIOError),
    Full { capacity: u32 },
    InvalidIndex(u32),
    NotADirectory(u32),
    AlreadyLinked(u32),
    CycleDetected(u32),
    CorruptLinks(u32),
    BadSnapshot(&'static str),
    Other(&'static str),
}

impl ArenaError {
    pub fn msg(&self) -> &'static str {
        match self {
            ArenaError::IO(_) => "IO error",
            ArenaError::Full { .. } => "Arena is full",
            ArenaError::InvalidIndex(_) => "Invalid node index",
            ArenaError::NotADirectory(_) => "Parent node is not a directory",
            ArenaError::AlreadyLinked(_) => "Node is already linked",
            ArenaError::CycleDetected(_) => "Link would create a cycle",
            ArenaError::CorruptLinks(_) => "Corrupt sibling links",
            ArenaError::BadSnapshot(msg) => msg,
            ArenaError::Other(msg) => msg,
        }
    }

    fn details(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ArenaError::Full { capacity } => write!(f, " (capacity: {capacity})"),
            ArenaError::InvalidIndex(i)
            | ArenaError::NotADirectory(i)
            | ArenaError::AlreadyLinked(i)
            | ArenaError::CycleDetected(i)
            | ArenaError::CorruptLinks(i) => write!(f, " (node: {i})"),
            _ => Ok(()),
        }
    }

    pub fn source(&self) -> Option<RexError> {
        match self {
            ArenaError::IO(e) => Some(RexError::IO(*e)),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogError {
    IO(RexIOError),
    Unparseable { line: u64 },
    Other(&'static str),
}

impl LogError {
    pub fn msg(&self) -> &'static str {
        match self {
            LogError::IO(_) => "IO error",
            LogError::Unparseable { .. } => "Unparseable log record",
            LogError::Other(msg) => msg,
        }
    }

    fn details(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LogError::Unparseable { line } => write!(f, " (line: {line})"),
            _ => Ok(()),
        }
    }

    pub fn source(&self) -> Option<RexError> {
        match self {
            LogError::IO(e) => Some(RexError::IO(*e)),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommitError {
    IO(RexIOError),
    Fat(FatError),
    ChecksumVerify { expected: u32, found: u32 },
    SourceChanged { offset: u64 },
    Invalid(&'static str),
    Other(&'static str),
}

impl CommitError {
    pub fn msg(&self) -> &'static str {
        match self {
            CommitError::IO(_) => "IO error",
            CommitError::Fat(_) => "FAT error",
            CommitError::ChecksumVerify { .. } => "Boot checksum read-back mismatch",
            CommitError::SourceChanged { .. } => "Entry set changed on disk since replay",
            CommitError::Invalid(msg) => msg,
            CommitError::Other(msg) => msg,
        }
    }

    fn details(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CommitError::ChecksumVerify { expected, found } => {
                write!(f, " (expected: {expected:#010x}, found: {found:#010x})")
            }
            CommitError::SourceChanged { offset } => write!(f, " (offset: {offset:#x})"),
            _ => Ok(()),
        }
    }

    pub fn source(&self) -> Option<RexError> {
        match self {
            CommitError::IO(e) => Some(RexError::IO(*e)),
            CommitError::Fat(e) => Some(RexError::Fat(*e)),
            _ => None,
        }
    }
}

/// Top-level error
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RexError {
    IO(RexIOError),
    Geometry(GeometryError),
    Fat(FatError),
    EntrySet(EntrySetError),
    Arena(ArenaError),
    Log(LogError),
    Commit(CommitError),
    InvalidState(&'static str),
    Cancelled,
    Other(&'static str),
}

impl RexError {
    pub fn msg(&self) -> &'static str {
        match self {
            RexError::IO(e) => e.msg(),
            RexError::Geometry(e) => e.msg(),
            RexError::Fat(e) => e.msg(),
            RexError::EntrySet(e) => e.msg(),
            RexError::Arena(e) => e.msg(),
            RexError::Log(e) => e.msg(),
            RexError::Commit(e) => e.msg(),
            RexError::InvalidState(msg) => msg,
            RexError::Cancelled => "Reconstruction cancelled",
            RexError::Other(msg) => msg,
        }
    }

    fn details(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RexError::IO(e) => match e {
                RexIOError::Os(code) => write!(f, " (errno {code})"),
                _ => Ok(()),
            },
            RexError::Geometry(e) => e.details(f),
            RexError::Fat(e) => e.details(f),
            RexError::EntrySet(e) => e.details(f),
            RexError::Arena(e) => e.details(f),
            RexError::Log(e) => e.details(f),
            RexError::Commit(e) => e.details(f),
            _ => Ok(()),
        }
    }

    pub fn source(&self) -> Option<RexError> {
        match self {
            RexError::EntrySet(e) => e.source(),
            RexError::Arena(e) => e.source(),
            RexError::Log(e) => e.source(),
            RexError::Commit(e) => e.source(),
            _ => None,
        }
    }

    /// Raw OS error code at the bottom of the cause chain, if any.
    pub fn os_code(&self) -> Option<i32> {
        if let RexError::IO(e) = self {
            return e.os_code();
        }
        self.source().and_then(|e| e.os_code())
    }
}

impl std::error::Error for RexError {}

// === type *Result ===

pub type RexResult<T = ()> = Result<T, RexError>;
pub type GeometryResult<T = ()> = Result<T, GeometryError>;
pub type FatResult<T = ()> = Result<T, FatError>;
pub type EntrySetResult<T = ()> = Result<T, EntrySetError>;
pub type ArenaResult<T = ()> = Result<T, ArenaError>;
pub type LogResult<T = ()> = Result<T, LogError>;
pub type CommitResult<T = ()> = Result<T, CommitError>;

crate::__impl_chained_display!(
    GeometryError,
    FatError,
    EntrySetError,
    ArenaError,
    LogError,
    CommitError,
    RexError,
);

crate::rex_error_wiring! {
    top => RexError {
        RexIOError    : IO,
        GeometryError : Geometry,
        FatError      : Fat,
        EntrySetError : EntrySet,
        ArenaError    : Arena,
        LogError      : Log,
        CommitError   : Commit,
    },
    str_into => [
        GeometryError,
        FatError,
        EntrySetError,
        ArenaError,
        LogError,
        CommitError,
    ],
    sub => {
        RexIOError => [ EntrySetError::IO, ArenaError::IO, LogError::IO, CommitError::IO ],
        FatError   => [ CommitError::Fat ],
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_chain_display() {
        let low = RexIOError::Os(5);
        let top = RexError::EntrySet(EntrySetError::IO(low));

        let text = top.to_string();
        assert!(text.starts_with("IO error"));
        assert!(text.contains("caused by: OS error"));
    }

    #[test]
    fn test_details_carry_context() {
        let err: RexError = EntrySetError::MalformedEntrySet {
            offset: 0x2000,
            continuations: 19,
        }
        .into();
        let text = err.to_string();
        assert!(text.contains("0x2000"));
        assert!(text.contains("continuations: 19"));
    }

    #[test]
    fn test_os_code_walks_chain() {
        let err: RexError = ArenaError::IO(RexIOError::Os(28)).into();
        assert_eq!(err.os_code(), Some(28));
        assert_eq!(RexError::Cancelled.os_code(), None);
    }

    #[test]
    fn test_recoverable_classification() {
        assert!(EntrySetError::OutOfRange { offset: 1 }.is_recoverable());
        assert!(
            EntrySetError::ChecksumMismatch {
                offset: 0,
                stored: 1,
                computed: 2
            }
            .is_recoverable()
        );
        assert!(!EntrySetError::IO(RexIOError::UnexpectedEof).is_recoverable());
    }
}
