//! Error types for the Amber workspace.
//!
//! Two enums, organized by subsystem: [`HeapError`] for the persistent
//! heap (pool lifecycle, allocator, transaction log) and
//! [`CollectionError`] for the collections built on top of it.

use std::fmt;
use std::io;
use std::path::PathBuf;

/// Errors from the persistent heap: pool lifecycle, allocation, and the
/// transaction log.
#[derive(Debug)]
pub enum HeapError {
    /// An I/O error occurred while creating, mapping, or flushing the pool.
    Io(io::Error),
    /// `Pool::create` was asked to format a path that already exists.
    AlreadyExists {
        /// The offending pool path.
        path: PathBuf,
    },
    /// `Pool::open` was asked to open a path with no backing file.
    NotFound {
        /// The missing pool path.
        path: PathBuf,
    },
    /// The pool header failed validation (bad magic, bad version, or
    /// geometry inconsistent with the file).
    Corrupt {
        /// Human-readable description of what failed validation.
        detail: String,
    },
    /// The pool exists but was formatted with a different layout tag.
    LayoutMismatch {
        /// Layout tag the caller expected.
        expected: String,
        /// Layout tag found in the pool header.
        found: String,
    },
    /// The allocator cannot satisfy a request — the heap region is
    /// exhausted.
    OutOfMemory {
        /// Number of bytes requested.
        requested: usize,
        /// Bytes remaining in the bump region.
        available: usize,
    },
    /// The undo-log region cannot hold another entry for the active
    /// transaction.
    LogOverflow {
        /// Size of the entry that did not fit, in bytes.
        requested: usize,
        /// Total capacity of the log region, in bytes.
        capacity: usize,
    },
    /// A fault-injection crash point fired. The pool is poisoned; the
    /// simulated crash is observed by reopening the pool file.
    CrashPoint {
        /// Number of tracked writes that completed before the fault.
        after_writes: u64,
    },
    /// The pool was used after a crash point fired. Drop the pool and
    /// reopen it to recover.
    Poisoned,
}

impl fmt::Display for HeapError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Io(e) => write!(f, "I/O error: {e}"),
            Self::AlreadyExists { path } => {
                write!(f, "pool already exists: {}", path.display())
            }
            Self::NotFound { path } => {
                write!(f, "pool not found: {}", path.display())
            }
            Self::Corrupt { detail } => write!(f, "pool corrupt: {detail}"),
            Self::LayoutMismatch { expected, found } => {
                write!(f, "layout mismatch: expected '{expected}', found '{found}'")
            }
            Self::OutOfMemory {
                requested,
                available,
            } => {
                write!(
                    f,
                    "heap exhausted: requested {requested} bytes, {available} bytes available"
                )
            }
            Self::LogOverflow {
                requested,
                capacity,
            } => {
                write!(
                    f,
                    "undo log full: entry of {requested} bytes exceeds log capacity {capacity}"
                )
            }
            Self::CrashPoint { after_writes } => {
                write!(f, "injected crash after {after_writes} tracked writes")
            }
            Self::Poisoned => write!(f, "pool poisoned by a simulated crash; reopen to recover"),
        }
    }
}

impl std::error::Error for HeapError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Io(e) => Some(e),
            _ => None,
        }
    }
}

impl From<io::Error> for HeapError {
    fn from(e: io::Error) -> Self {
        Self::Io(e)
    }
}

/// Errors from collection operations.
///
/// Argument-validation variants are raised before any transaction begins;
/// a [`CollectionError::Heap`] raised inside an active transaction has
/// already triggered rollback by the time the caller sees it.
#[derive(Debug)]
pub enum CollectionError {
    /// A positional argument was outside the collection's range.
    IndexOutOfRange {
        /// The offending index.
        index: usize,
        /// The collection's length at the time of the call.
        length: usize,
    },
    /// A pop or remove was attempted on an empty collection.
    EmptyCollection,
    /// A hash-table lookup or removal missed.
    KeyNotFound,
    /// An argument failed validation (e.g. prime-selection bounds).
    InvalidArgument {
        /// Human-readable description of the violation.
        detail: String,
    },
    /// The underlying heap operation failed.
    Heap(HeapError),
}

impl fmt::Display for CollectionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::IndexOutOfRange { index, length } => {
                write!(f, "index {index} out of range for length {length}")
            }
            Self::EmptyCollection => write!(f, "operation on empty collection"),
            Self::KeyNotFound => write!(f, "key not found"),
            Self::InvalidArgument { detail } => write!(f, "invalid argument: {detail}"),
            Self::Heap(e) => write!(f, "heap error: {e}"),
        }
    }
}

impl std::error::Error for CollectionError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Heap(e) => Some(e),
            _ => None,
        }
    }
}

impl From<HeapError> for CollectionError {
    fn from(e: HeapError) -> Self {
        Self::Heap(e)
    }
}
