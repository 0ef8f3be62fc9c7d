//! Crash-consistent transactional persistent heap.
//!
//! A [`Pool`] owns a fixed-size memory-mapped region backed by a file.
//! Durable references into the region are base-relative offsets
//! ([`PPtr`]) — never virtual addresses — so they remain valid across
//! process restarts. Every mutation goes through a transaction
//! ([`Pool::run`]): an undo-log entry holding the old bytes is made
//! durable before each word is overwritten, and a commit marker is the
//! last durable write, so a crash at any point leaves either the old or
//! the new state, never a torn one. [`Pool::open`] rolls back any
//! uncommitted transaction before returning.
//!
//! # Pool file layout
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │ header page  magic, format version, layout tag, geometry,    │
//! │              root layout version, root slots                 │
//! ├──────────────────────────────────────────────────────────────┤
//! │ undo log     state word, entry count,                        │
//! │              entries: (target offset, len, old bytes)        │
//! ├──────────────────────────────────────────────────────────────┤
//! │ heap         free-list head, bump frontier, blocks           │
//! └──────────────────────────────────────────────────────────────┘
//! ```
//!
//! This is the only crate in the workspace containing `unsafe` code:
//! the single memory-map construction call in `pool.rs`.

#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]

mod alloc;
pub mod config;
mod layout;
pub mod pool;
pub mod pptr;
pub mod stats;
mod wal;

pub use config::PoolConfig;
pub use layout::RootSlot;
pub use pool::{Pool, Tx};
pub use pptr::PPtr;
pub use stats::{HeapStats, RecoveryReport};
