//! Crash-consistent persistent collections.
//!
//! Four collections — [`PList`], [`PVec`], [`PStr`], [`PTable`] —
//! whose storage lives entirely in an [`amber_heap::Pool`]. A handle
//! is a typed persistent pointer to the collection's header block and
//! nothing more: it caches no runtime state, so after a pool is
//! reopened, handles re-derived from the [`Root`] are immediately
//! valid.
//!
//! Every mutating operation runs inside one transaction: either it
//! commits in full or the pool is left exactly as it was, even across
//! a crash mid-operation. Mutators take `&mut Pool` and open their own
//! transaction; the `*_in` forms take an active
//! [`Tx`](amber_heap::Tx) instead so composite operations (hash-table
//! buckets, bulk teardown) flatten into a single transaction.
//!
//! Read-only operations take `&Pool` and no transaction.

#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]
#![forbid(unsafe_code)]

pub mod list;
pub mod prime;
pub mod root;
pub mod string;
pub mod table;
pub mod vector;

pub use list::{ListIter, PList};
pub use prime::{prime_below, MAX_PRIME};
pub use root::Root;
pub use string::PStr;
pub use table::{PTable, Pair, TableIter};
pub use vector::{PVec, VecIter};
