//! The root object: the pool's single durable entry point.
//!
//! The root is a fixed, versioned set of named slots (see
//! [`RootSlot`]), each holding a persistent pointer to one top-level
//! collection. [`Root::init`] creates all four collections and fills
//! the slots in one transaction; [`Root::load`] re-derives typed
//! handles after a reopen — with handles being plain offsets, that is
//! the entire rebind step.

use amber_core::HeapError;
use amber_heap::{Pool, RootSlot, Tx};

use crate::list::PList;
use crate::string::PStr;
use crate::table::PTable;
use crate::vector::PVec;

/// Typed handles to the four top-level collections.
#[derive(Clone, Copy, Debug)]
pub struct Root {
    /// The top-level linked list.
    pub list: PList<i64>,
    /// The top-level dynamic array.
    pub vector: PVec<f64>,
    /// The top-level dynamic string.
    pub text: PStr,
    /// The top-level hash table.
    pub table: PTable<i64, i64>,
}

impl Root {
    /// Create all four collections and point the root slots at them,
    /// inside the active transaction.
    pub fn init(tx: &mut Tx<'_>) -> Result<Self, HeapError> {
        let list = PList::create(tx)?;
        let vector = PVec::create(tx)?;
        let text = PStr::create(tx)?;
        let table = PTable::create(tx)?;
        tx.set_root_ptr(RootSlot::List, list.ptr())?;
        tx.set_root_ptr(RootSlot::Vector, vector.ptr())?;
        tx.set_root_ptr(RootSlot::Text, text.ptr())?;
        tx.set_root_ptr(RootSlot::Table, table.ptr())?;
        Ok(Self {
            list,
            vector,
            text,
            table,
        })
    }

    /// Re-derive the typed handles from the root slots, or `None` if
    /// the pool was never initialized with [`Root::init`].
    pub fn load(pool: &Pool) -> Option<Self> {
        if !Self::is_initialized(pool) {
            return None;
        }
        Some(Self {
            list: PList::from_ptr(pool.root_ptr(RootSlot::List)),
            vector: PVec::from_ptr(pool.root_ptr(RootSlot::Vector)),
            text: PStr::from_ptr(pool.root_ptr(RootSlot::Text)),
            table: PTable::from_ptr(pool.root_ptr(RootSlot::Table)),
        })
    }

    /// Whether the root slots have been filled. All four are set
    /// together by [`Root::init`], so checking one suffices.
    pub fn is_initialized(pool: &Pool) -> bool {
        !pool.root_ptr::<u64>(RootSlot::List).is_null()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use amber_test_utils::TestPool;

    #[test]
    fn uninitialized_pool_has_no_root() {
        let t = TestPool::create();
        assert!(!Root::is_initialized(t.pool()));
        assert!(Root::load(t.pool()).is_none());
    }

    #[test]
    fn init_fills_all_slots_in_one_transaction() {
        let mut t = TestPool::create();
        let root = t.pool_mut().run(|tx| Root::init(tx)).unwrap();
        assert!(Root::is_initialized(t.pool()));
        assert!(root.list.is_empty(t.pool()));
        assert!(root.vector.is_empty(t.pool()));
        assert!(root.text.is_empty(t.pool()));
        assert!(root.table.is_empty(t.pool()));
    }

    #[test]
    fn load_after_reopen_rebinds_handles() {
        let mut t = TestPool::create();
        let root = t.pool_mut().run(|tx| Root::init(tx)).unwrap();
        root.list.push_back(t.pool_mut(), 5).unwrap();
        root.text.assign_str(t.pool_mut(), "kept").unwrap();

        t.reopen();
        let root = Root::load(t.pool()).expect("root survives reopen");
        assert_eq!(root.list.iter(t.pool()).collect::<Vec<_>>(), vec![5]);
        assert_eq!(root.text.as_string(t.pool()), "kept");
    }
}
