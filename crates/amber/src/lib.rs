//! Amber: crash-consistent persistent collections.
//!
//! This is the top-level facade crate that re-exports the public API
//! from the Amber sub-crates. For most users, adding `amber` as a
//! single dependency is sufficient.
//!
//! # Quick start
//!
//! ```rust
//! use amber::prelude::*;
//!
//! let dir = tempfile::TempDir::new().unwrap();
//! let config = PoolConfig::new(dir.path().join("pool"), "QUICKSTART")
//!     .with_size(1 << 20)
//!     .with_log_size(64 * 1024);
//!
//! // First access formats the file; later accesses open it.
//! let (mut pool, created) = Pool::open_or_create(&config).unwrap();
//! assert!(created);
//!
//! // The root holds one handle per top-level collection.
//! let root = pool.run(|tx| Root::init(tx)).unwrap();
//! root.list.push_back(&mut pool, 1).unwrap();
//! root.list.push_back(&mut pool, 2).unwrap();
//!
//! // Reopen: recovery runs, then handles are re-derived from the root.
//! drop(pool);
//! let (pool, created) = Pool::open_or_create(&config).unwrap();
//! assert!(!created);
//! let root = Root::load(&pool).unwrap();
//! assert_eq!(root.list.iter(&pool).collect::<Vec<_>>(), vec![1, 2]);
//! ```
//!
//! # Modules
//!
//! | Module | Sub-crate | Contents |
//! |--------|-----------|----------|
//! | [`heap`] | `amber-heap` | Pool lifecycle, transactions, persistent pointers |
//! | [`collections`] | `amber-collections` | List, vector, string, hash table, root |
//! | [`types`] | `amber-core` | Error enums, the `Persist` codec, FNV-1a |

#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]
#![forbid(unsafe_code)]

/// Error enums, the `Persist` value codec, and deterministic hashing
/// (`amber-core`).
pub use amber_core as types;

/// The persistent heap: pool lifecycle, undo-log transactions, and
/// typed persistent pointers (`amber-heap`).
pub use amber_heap as heap;

/// The four collections and the root object (`amber-collections`).
pub use amber_collections as collections;

/// Common imports for typical Amber usage.
///
/// ```rust
/// use amber::prelude::*;
/// ```
pub mod prelude {
    pub use amber_collections::{PList, PStr, PTable, PVec, Pair, Root};
    pub use amber_core::{CollectionError, HeapError, Persist};
    pub use amber_heap::{PPtr, Pool, PoolConfig, RootSlot, Tx};
}
