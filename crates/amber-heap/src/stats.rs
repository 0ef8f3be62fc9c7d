//! Heap bookkeeping and recovery reports.
//!
//! The heap exposes its health as plain structs rather than a logging
//! facade: callers inspect them, tests assert on them.

/// Allocation bookkeeping for a pool, computed on demand by
/// [`Pool::stats`](crate::Pool::stats).
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct HeapStats {
    /// Total pool size in bytes, header and log included.
    pub pool_size: u64,
    /// Size of the heap region in bytes.
    pub heap_bytes: u64,
    /// Bytes consumed by the bump frontier (block headers included).
    pub bump_used: u64,
    /// Bytes remaining ahead of the bump frontier.
    pub bump_remaining: u64,
    /// Number of blocks currently on the free list.
    pub free_blocks: u64,
    /// Total payload bytes currently on the free list.
    pub free_bytes: u64,
}

/// What reopen-time recovery did, reported by
/// [`Pool::recovery_report`](crate::Pool::recovery_report).
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct RecoveryReport {
    /// Whether an uncommitted transaction was found and rolled back.
    pub rolled_back: bool,
    /// Undo entries replayed during rollback.
    pub entries_replayed: u64,
}
