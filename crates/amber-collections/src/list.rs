//! Singly-linked persistent list.
//!
//! Nodes are heap blocks of `{value, next}`; the header tracks `head`,
//! `tail`, and `len`, giving O(1) pushes at both ends and an O(n)
//! `pop_back` (there are no back pointers). Each node is owned by its
//! predecessor's `next` slot — or by `head` for the first node — and
//! `tail` is a non-owning shortcut.
//!
//! Invariant: `len == 0 ⇔ head == tail == null`, and walking `len`
//! `next` links from `head` reaches `tail` and then null.

use std::fmt;

use amber_core::{CollectionError, HeapError, Persist};
use amber_heap::{PPtr, Pool, Tx};

/// Durable header of a [`PList`].
pub struct ListHeader<T> {
    pub(crate) head: PPtr<ListNode<T>>,
    pub(crate) tail: PPtr<ListNode<T>>,
    pub(crate) len: u64,
}

impl<T> ListHeader<T> {
    fn empty() -> Self {
        Self {
            head: PPtr::null(),
            tail: PPtr::null(),
            len: 0,
        }
    }
}

impl<T: Persist> Persist for ListHeader<T> {
    const SIZE: usize = 24;

    fn store(&self, buf: &mut [u8]) {
        self.head.store(&mut buf[0..8]);
        self.tail.store(&mut buf[8..16]);
        self.len.store(&mut buf[16..24]);
    }

    fn load(buf: &[u8]) -> Self {
        Self {
            head: PPtr::load(&buf[0..8]),
            tail: PPtr::load(&buf[8..16]),
            len: u64::load(&buf[16..24]),
        }
    }
}

/// One durable list node: the value followed by the next pointer.
pub struct ListNode<T> {
    pub(crate) value: T,
    pub(crate) next: PPtr<ListNode<T>>,
}

impl<T: Persist> Persist for ListNode<T> {
    const SIZE: usize = T::SIZE + 8;

    fn store(&self, buf: &mut [u8]) {
        self.value.store(&mut buf[..T::SIZE]);
        self.next.store(&mut buf[T::SIZE..T::SIZE + 8]);
    }

    fn load(buf: &[u8]) -> Self {
        Self {
            value: T::load(&buf[..T::SIZE]),
            next: PPtr::load(&buf[T::SIZE..T::SIZE + 8]),
        }
    }
}

/// Handle to a persistent singly-linked list of `T`.
///
/// The handle is just the header's persistent pointer — it stores no
/// runtime state and stays valid across pool reopens.
pub struct PList<T> {
    hdr: PPtr<ListHeader<T>>,
}

impl<T> Clone for PList<T> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<T> Copy for PList<T> {}

impl<T> PartialEq for PList<T> {
    fn eq(&self, other: &Self) -> bool {
        self.hdr == other.hdr
    }
}

impl<T> Eq for PList<T> {}

impl<T> fmt::Debug for PList<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "PList({:?})", self.hdr)
    }
}

impl<T: Persist> PList<T> {
    /// Allocate an empty list inside the active transaction.
    pub fn create(tx: &mut Tx<'_>) -> Result<Self, HeapError> {
        Ok(Self {
            hdr: tx.alloc_value(&ListHeader::empty())?,
        })
    }

    /// Wrap an existing header pointer (e.g. one read from the root).
    pub fn from_ptr(hdr: PPtr<ListHeader<T>>) -> Self {
        Self { hdr }
    }

    /// The header's persistent pointer, for storing in a root slot.
    pub fn ptr(&self) -> PPtr<ListHeader<T>> {
        self.hdr
    }

    /// Address of a node's `next` slot.
    pub(crate) fn next_ptr(node: PPtr<ListNode<T>>) -> PPtr<PPtr<ListNode<T>>> {
        PPtr::from_offset(node.offset() + T::SIZE as u64)
    }

    // ── Read-only operations ────────────────────────────────────

    /// Number of values in the list.
    pub fn len(&self, pool: &Pool) -> usize {
        pool.load(self.hdr).len as usize
    }

    /// Whether the list is empty.
    pub fn is_empty(&self, pool: &Pool) -> bool {
        self.len(pool) == 0
    }

    /// Value at position `idx`. O(idx); no transaction required.
    pub fn get(&self, pool: &Pool, idx: usize) -> Result<T, CollectionError> {
        let hdr = pool.load(self.hdr);
        if idx as u64 >= hdr.len {
            return Err(CollectionError::IndexOutOfRange {
                index: idx,
                length: hdr.len as usize,
            });
        }
        let mut cur = hdr.head;
        for _ in 0..idx {
            cur = pool.load(cur).next;
        }
        Ok(pool.load(cur).value)
    }

    /// Iterate the values front to back.
    pub fn iter<'a>(&self, pool: &'a Pool) -> ListIter<'a, T> {
        let hdr = pool.load(self.hdr);
        ListIter {
            pool,
            next: hdr.head,
            remaining: hdr.len,
        }
    }

    // ── Mutating operations ─────────────────────────────────────

    /// Append a value. O(1).
    pub fn push_back(&self, pool: &mut Pool, value: T) -> Result<(), CollectionError> {
        pool.run(|tx| self.push_back_in(tx, value))
    }

    /// [`push_back`](Self::push_back) inside an active transaction.
    pub fn push_back_in(&self, tx: &mut Tx<'_>, value: T) -> Result<(), CollectionError> {
        let mut hdr = tx.load(self.hdr);
        let node = tx.alloc_value(&ListNode {
            value,
            next: PPtr::null(),
        })?;
        if hdr.len == 0 {
            hdr.head = node;
        } else {
            tx.store(Self::next_ptr(hdr.tail), &node)?;
        }
        hdr.tail = node;
        hdr.len += 1;
        tx.store(self.hdr, &hdr)?;
        Ok(())
    }

    /// Prepend a value. O(1).
    pub fn push_front(&self, pool: &mut Pool, value: T) -> Result<(), CollectionError> {
        pool.run(|tx| self.push_front_in(tx, value))
    }

    /// [`push_front`](Self::push_front) inside an active transaction.
    pub fn push_front_in(&self, tx: &mut Tx<'_>, value: T) -> Result<(), CollectionError> {
        let mut hdr = tx.load(self.hdr);
        let node = tx.alloc_value(&ListNode {
            value,
            next: hdr.head,
        })?;
        hdr.head = node;
        if hdr.len == 0 {
            hdr.tail = node;
        }
        hdr.len += 1;
        tx.store(self.hdr, &hdr)?;
        Ok(())
    }

    /// Remove and return the last value. O(n) — the predecessor of
    /// `tail` is found by walking from `head`.
    pub fn pop_back(&self, pool: &mut Pool) -> Result<T, CollectionError> {
        if self.is_empty(pool) {
            return Err(CollectionError::EmptyCollection);
        }
        pool.run(|tx| self.pop_back_in(tx))
    }

    /// [`pop_back`](Self::pop_back) inside an active transaction.
    pub fn pop_back_in(&self, tx: &mut Tx<'_>) -> Result<T, CollectionError> {
        let mut hdr = tx.load(self.hdr);
        if hdr.len == 0 {
            return Err(CollectionError::EmptyCollection);
        }
        let value = tx.load(hdr.tail).value;
        if hdr.len == 1 {
            tx.free(hdr.tail)?;
            hdr.head = PPtr::null();
            hdr.tail = PPtr::null();
        } else {
            let mut cur = hdr.head;
            while tx.load(cur).next != hdr.tail {
                cur = tx.load(cur).next;
            }
            tx.store(Self::next_ptr(cur), &PPtr::null())?;
            tx.free(hdr.tail)?;
            hdr.tail = cur;
        }
        hdr.len -= 1;
        tx.store(self.hdr, &hdr)?;
        Ok(value)
    }

    /// Remove and return the first value. O(1).
    pub fn pop_front(&self, pool: &mut Pool) -> Result<T, CollectionError> {
        if self.is_empty(pool) {
            return Err(CollectionError::EmptyCollection);
        }
        pool.run(|tx| self.pop_front_in(tx))
    }

    /// [`pop_front`](Self::pop_front) inside an active transaction.
    pub fn pop_front_in(&self, tx: &mut Tx<'_>) -> Result<T, CollectionError> {
        let mut hdr = tx.load(self.hdr);
        if hdr.len == 0 {
            return Err(CollectionError::EmptyCollection);
        }
        let node = tx.load(hdr.head);
        tx.free(hdr.head)?;
        hdr.head = node.next;
        hdr.len -= 1;
        if hdr.len == 0 {
            hdr.tail = PPtr::null();
        }
        tx.store(self.hdr, &hdr)?;
        Ok(node.value)
    }

    /// Splice a value in before position `idx` (`idx == len` appends).
    /// O(idx).
    pub fn insert(&self, pool: &mut Pool, value: T, idx: usize) -> Result<(), CollectionError> {
        let len = self.len(pool);
        if idx > len {
            return Err(CollectionError::IndexOutOfRange {
                index: idx,
                length: len,
            });
        }
        pool.run(|tx| self.insert_in(tx, value, idx))
    }

    /// [`insert`](Self::insert) inside an active transaction.
    pub fn insert_in(
        &self,
        tx: &mut Tx<'_>,
        value: T,
        idx: usize,
    ) -> Result<(), CollectionError> {
        let mut hdr = tx.load(self.hdr);
        if idx as u64 > hdr.len {
            return Err(CollectionError::IndexOutOfRange {
                index: idx,
                length: hdr.len as usize,
            });
        }
        if idx == 0 {
            return self.push_front_in(tx, value);
        }
        if idx as u64 == hdr.len {
            return self.push_back_in(tx, value);
        }
        let mut prev = hdr.head;
        for _ in 0..idx - 1 {
            prev = tx.load(prev).next;
        }
        let next = tx.load(prev).next;
        let node = tx.alloc_value(&ListNode { value, next })?;
        tx.store(Self::next_ptr(prev), &node)?;
        hdr.len += 1;
        tx.store(self.hdr, &hdr)?;
        Ok(())
    }

    /// Unlink and return the value at position `idx`. O(idx).
    pub fn remove(&self, pool: &mut Pool, idx: usize) -> Result<T, CollectionError> {
        let len = self.len(pool);
        if idx >= len {
            return Err(CollectionError::IndexOutOfRange {
                index: idx,
                length: len,
            });
        }
        pool.run(|tx| self.remove_in(tx, idx))
    }

    /// [`remove`](Self::remove) inside an active transaction.
    pub fn remove_in(&self, tx: &mut Tx<'_>, idx: usize) -> Result<T, CollectionError> {
        let mut hdr = tx.load(self.hdr);
        if idx as u64 >= hdr.len {
            return Err(CollectionError::IndexOutOfRange {
                index: idx,
                length: hdr.len as usize,
            });
        }
        if idx == 0 {
            return self.pop_front_in(tx);
        }
        if idx as u64 == hdr.len - 1 {
            return self.pop_back_in(tx);
        }
        let mut prev = hdr.head;
        for _ in 0..idx - 1 {
            prev = tx.load(prev).next;
        }
        let target = tx.load(prev).next;
        let node = tx.load(target);
        tx.store(Self::next_ptr(prev), &node.next)?;
        tx.free(target)?;
        hdr.len -= 1;
        tx.store(self.hdr, &hdr)?;
        Ok(node.value)
    }

    /// Free every node and reset to empty, as a single transaction.
    pub fn clear(&self, pool: &mut Pool) -> Result<(), CollectionError> {
        pool.run(|tx| self.clear_in(tx))
    }

    /// [`clear`](Self::clear) inside an active transaction.
    pub fn clear_in(&self, tx: &mut Tx<'_>) -> Result<(), CollectionError> {
        let hdr = tx.load(self.hdr);
        let mut cur = hdr.head;
        while !cur.is_null() {
            let next = tx.load(cur).next;
            tx.free(cur)?;
            cur = next;
        }
        tx.store(self.hdr, &ListHeader::empty())?;
        Ok(())
    }

    /// Free every node and the header block itself; the handle is
    /// consumed and must not be used again.
    pub fn destroy_in(self, tx: &mut Tx<'_>) -> Result<(), CollectionError> {
        self.clear_in(tx)?;
        tx.free(self.hdr)?;
        Ok(())
    }
}

/// Forward value iterator over a [`PList`].
pub struct ListIter<'a, T> {
    pool: &'a Pool,
    next: PPtr<ListNode<T>>,
    remaining: u64,
}

impl<T: Persist> Iterator for ListIter<'_, T> {
    type Item = T;

    fn next(&mut self) -> Option<T> {
        if self.remaining == 0 {
            return None;
        }
        let node = self.pool.load(self.next);
        self.next = node.next;
        self.remaining -= 1;
        Some(node.value)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (self.remaining as usize, Some(self.remaining as usize))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use amber_test_utils::TestPool;

    fn fixture() -> (TestPool, PList<i64>) {
        let mut t = TestPool::create();
        let list = t.pool_mut().run(|tx| PList::<i64>::create(tx)).unwrap();
        (t, list)
    }

    fn contents(list: &PList<i64>, pool: &Pool) -> Vec<i64> {
        list.iter(pool).collect()
    }

    #[test]
    fn node_layout_follows_value_size() {
        assert_eq!(<ListNode<i64> as Persist>::SIZE, 16);
        assert_eq!(<ListNode<u8> as Persist>::SIZE, 9);
        assert_eq!(<ListHeader<i64> as Persist>::SIZE, 24);
    }

    #[test]
    fn push_back_appends_in_order() {
        let (mut t, list) = fixture();
        for v in [0, 1, 2] {
            list.push_back(t.pool_mut(), v).unwrap();
        }
        assert_eq!(contents(&list, t.pool()), vec![0, 1, 2]);
        assert_eq!(list.len(t.pool()), 3);
    }

    #[test]
    fn push_front_prepends() {
        let (mut t, list) = fixture();
        list.push_back(t.pool_mut(), 1).unwrap();
        list.push_front(t.pool_mut(), 0).unwrap();
        assert_eq!(contents(&list, t.pool()), vec![0, 1]);
    }

    #[test]
    fn pop_back_returns_last_and_fixes_tail() {
        let (mut t, list) = fixture();
        for v in [0, 1, 2] {
            list.push_back(t.pool_mut(), v).unwrap();
        }
        assert_eq!(list.pop_back(t.pool_mut()).unwrap(), 2);
        assert_eq!(contents(&list, t.pool()), vec![0, 1]);
        // The tail must have been rewired: another append lands after 1.
        list.push_back(t.pool_mut(), 9).unwrap();
        assert_eq!(contents(&list, t.pool()), vec![0, 1, 9]);
    }

    #[test]
    fn pop_front_returns_first() {
        let (mut t, list) = fixture();
        for v in [5, 6] {
            list.push_back(t.pool_mut(), v).unwrap();
        }
        assert_eq!(list.pop_front(t.pool_mut()).unwrap(), 5);
        assert_eq!(contents(&list, t.pool()), vec![6]);
    }

    #[test]
    fn pops_on_empty_fail() {
        let (mut t, list) = fixture();
        assert!(matches!(
            list.pop_back(t.pool_mut()),
            Err(CollectionError::EmptyCollection)
        ));
        assert!(matches!(
            list.pop_front(t.pool_mut()),
            Err(CollectionError::EmptyCollection)
        ));
    }

    #[test]
    fn pop_to_empty_nulls_both_ends() {
        let (mut t, list) = fixture();
        list.push_back(t.pool_mut(), 1).unwrap();
        list.pop_back(t.pool_mut()).unwrap();
        assert!(list.is_empty(t.pool()));
        // Both ends null again: pushes from either end still work.
        list.push_front(t.pool_mut(), 2).unwrap();
        assert_eq!(contents(&list, t.pool()), vec![2]);
    }

    #[test]
    fn insert_at_every_position() {
        let (mut t, list) = fixture();
        list.insert(t.pool_mut(), 1, 0).unwrap(); // [1]
        list.insert(t.pool_mut(), 3, 1).unwrap(); // [1, 3]
        list.insert(t.pool_mut(), 0, 0).unwrap(); // [0, 1, 3]
        list.insert(t.pool_mut(), 2, 2).unwrap(); // [0, 1, 2, 3]
        assert_eq!(contents(&list, t.pool()), vec![0, 1, 2, 3]);
    }

    #[test]
    fn insert_past_len_fails_without_mutating() {
        let (mut t, list) = fixture();
        list.push_back(t.pool_mut(), 1).unwrap();
        assert!(matches!(
            list.insert(t.pool_mut(), 9, 2),
            Err(CollectionError::IndexOutOfRange { index: 2, length: 1 })
        ));
        assert_eq!(contents(&list, t.pool()), vec![1]);
    }

    #[test]
    fn remove_unlinks_and_returns() {
        let (mut t, list) = fixture();
        for v in [0, 1, 7, 2] {
            list.push_back(t.pool_mut(), v).unwrap();
        }
        assert_eq!(list.remove(t.pool_mut(), 2).unwrap(), 7);
        assert_eq!(contents(&list, t.pool()), vec![0, 1, 2]);
        assert!(matches!(
            list.remove(t.pool_mut(), 3),
            Err(CollectionError::IndexOutOfRange { .. })
        ));
    }

    #[test]
    fn remove_last_index_fixes_tail() {
        let (mut t, list) = fixture();
        for v in [0, 1, 2] {
            list.push_back(t.pool_mut(), v).unwrap();
        }
        assert_eq!(list.remove(t.pool_mut(), 2).unwrap(), 2);
        list.push_back(t.pool_mut(), 5).unwrap();
        assert_eq!(contents(&list, t.pool()), vec![0, 1, 5]);
    }

    #[test]
    fn get_reads_without_mutation() {
        let (mut t, list) = fixture();
        for v in [10, 20, 30] {
            list.push_back(t.pool_mut(), v).unwrap();
        }
        assert_eq!(list.get(t.pool(), 0).unwrap(), 10);
        assert_eq!(list.get(t.pool(), 2).unwrap(), 30);
        assert!(matches!(
            list.get(t.pool(), 3),
            Err(CollectionError::IndexOutOfRange { .. })
        ));
    }

    #[test]
    fn clear_frees_all_nodes() {
        let (mut t, list) = fixture();
        for v in 0..8 {
            list.push_back(t.pool_mut(), v).unwrap();
        }
        let used_before = t.pool().stats().free_blocks;
        list.clear(t.pool_mut()).unwrap();
        assert!(list.is_empty(t.pool()));
        assert_eq!(t.pool().stats().free_blocks, used_before + 8);
    }

    #[test]
    fn length_matches_reachable_nodes() {
        let (mut t, list) = fixture();
        for v in 0..5 {
            list.push_back(t.pool_mut(), v).unwrap();
        }
        list.remove(t.pool_mut(), 1).unwrap();
        list.pop_front(t.pool_mut()).unwrap();
        let walked = list.iter(t.pool()).count();
        assert_eq!(walked, list.len(t.pool()));
    }
}
