//! Persistent dynamic array.
//!
//! A contiguous buffer block plus a `{buf, len, cap}` header. Growth
//! is minimal — appending at capacity reallocates to `cap + 1` — which
//! trades more frequent reallocation for simplicity; the crash
//! contract does not depend on the growth policy. During a
//! reallocation the old buffer is freed only after the new buffer is
//! fully populated, so a crash mid-resize rolls back to the old buffer
//! intact.
//!
//! Invariant: `0 ≤ len ≤ cap` and `buf == null ⇔ cap == 0`.

use std::fmt;

use amber_core::{CollectionError, HeapError, Persist};
use amber_heap::{PPtr, Pool, Tx};

/// Durable header of a [`PVec`].
pub struct VecHeader<T> {
    pub(crate) buf: PPtr<T>,
    pub(crate) len: u64,
    pub(crate) cap: u64,
}

impl<T> VecHeader<T> {
    fn empty() -> Self {
        Self {
            buf: PPtr::null(),
            len: 0,
            cap: 0,
        }
    }
}

impl<T: Persist> Persist for VecHeader<T> {
    const SIZE: usize = 24;

    fn store(&self, buf: &mut [u8]) {
        self.buf.store(&mut buf[0..8]);
        self.len.store(&mut buf[8..16]);
        self.cap.store(&mut buf[16..24]);
    }

    fn load(buf: &[u8]) -> Self {
        Self {
            buf: PPtr::load(&buf[0..8]),
            len: u64::load(&buf[8..16]),
            cap: u64::load(&buf[16..24]),
        }
    }
}

/// Handle to a persistent dynamic array of `T`.
pub struct PVec<T> {
    hdr: PPtr<VecHeader<T>>,
}

impl<T> Clone for PVec<T> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<T> Copy for PVec<T> {}

impl<T> PartialEq for PVec<T> {
    fn eq(&self, other: &Self) -> bool {
        self.hdr == other.hdr
    }
}

impl<T> Eq for PVec<T> {}

impl<T> fmt::Debug for PVec<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "PVec({:?})", self.hdr)
    }
}

impl<T: Persist> PVec<T> {
    /// Allocate an empty vector (no buffer) inside the active
    /// transaction.
    pub fn create(tx: &mut Tx<'_>) -> Result<Self, HeapError> {
        Ok(Self {
            hdr: tx.alloc_value(&VecHeader::empty())?,
        })
    }

    /// Allocate an empty vector with room for `capacity` values.
    pub fn create_with_capacity(tx: &mut Tx<'_>, capacity: usize) -> Result<Self, HeapError> {
        let buf: PPtr<T> = if capacity == 0 {
            PPtr::null()
        } else {
            tx.alloc_bytes(capacity * T::SIZE)?.cast()
        };
        Ok(Self {
            hdr: tx.alloc_value(&VecHeader {
                buf,
                len: 0,
                cap: capacity as u64,
            })?,
        })
    }

    /// Wrap an existing header pointer (e.g. one read from the root).
    pub fn from_ptr(hdr: PPtr<VecHeader<T>>) -> Self {
        Self { hdr }
    }

    /// The header's persistent pointer, for storing in a root slot.
    pub fn ptr(&self) -> PPtr<VecHeader<T>> {
        self.hdr
    }

    fn elem_ptr(buf: PPtr<T>, idx: usize) -> PPtr<T> {
        PPtr::from_offset(buf.offset() + (idx * T::SIZE) as u64)
    }

    // ── Read-only operations ────────────────────────────────────

    /// Number of values.
    pub fn len(&self, pool: &Pool) -> usize {
        pool.load(self.hdr).len as usize
    }

    /// Whether the vector is empty.
    pub fn is_empty(&self, pool: &Pool) -> bool {
        self.len(pool) == 0
    }

    /// Buffer capacity in values.
    pub fn capacity(&self, pool: &Pool) -> usize {
        pool.load(self.hdr).cap as usize
    }

    /// Value at position `idx`. O(1); no transaction required.
    pub fn get(&self, pool: &Pool, idx: usize) -> Result<T, CollectionError> {
        let hdr = pool.load(self.hdr);
        if idx as u64 >= hdr.len {
            return Err(CollectionError::IndexOutOfRange {
                index: idx,
                length: hdr.len as usize,
            });
        }
        Ok(pool.load(Self::elem_ptr(hdr.buf, idx)))
    }

    /// Iterate the values in index order.
    pub fn iter<'a>(&self, pool: &'a Pool) -> VecIter<'a, T> {
        let hdr = pool.load(self.hdr);
        VecIter {
            pool,
            buf: hdr.buf,
            idx: 0,
            len: hdr.len as usize,
        }
    }

    // ── Mutating operations ─────────────────────────────────────

    /// Append a value, growing the buffer by one slot if at capacity.
    pub fn push_back(&self, pool: &mut Pool, value: T) -> Result<(), CollectionError> {
        pool.run(|tx| self.push_back_in(tx, value))
    }

    /// [`push_back`](Self::push_back) inside an active transaction.
    pub fn push_back_in(&self, tx: &mut Tx<'_>, value: T) -> Result<(), CollectionError> {
        let mut hdr = tx.load(self.hdr);
        if hdr.len == hdr.cap {
            let new_cap = hdr.cap + 1;
            Self::resize_raw(tx, &mut hdr, new_cap)?;
        }
        tx.store(Self::elem_ptr(hdr.buf, hdr.len as usize), &value)?;
        hdr.len += 1;
        tx.store(self.hdr, &hdr)?;
        Ok(())
    }

    /// Remove and return the last value. O(1); capacity is unchanged.
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
        hdr.len -= 1;
        let value = tx.load(Self::elem_ptr(hdr.buf, hdr.len as usize));
        tx.store(self.hdr, &hdr)?;
        Ok(value)
    }

    /// Shift values at and after `idx` one slot later and write
    /// `value` at `idx` (`idx == len` appends). O(n).
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
        if hdr.len == hdr.cap {
            let new_cap = hdr.cap + 1;
            Self::resize_raw(tx, &mut hdr, new_cap)?;
        }
        let mut i = hdr.len as usize;
        while i > idx {
            let shifted: T = tx.load(Self::elem_ptr(hdr.buf, i - 1));
            tx.store(Self::elem_ptr(hdr.buf, i), &shifted)?;
            i -= 1;
        }
        tx.store(Self::elem_ptr(hdr.buf, idx), &value)?;
        hdr.len += 1;
        tx.store(self.hdr, &hdr)?;
        Ok(())
    }

    /// Shift values after `idx` one slot earlier and return the value
    /// removed. O(n); capacity is unchanged.
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
        let value = tx.load(Self::elem_ptr(hdr.buf, idx));
        for i in idx..hdr.len as usize - 1 {
            let shifted: T = tx.load(Self::elem_ptr(hdr.buf, i + 1));
            tx.store(Self::elem_ptr(hdr.buf, i), &shifted)?;
        }
        hdr.len -= 1;
        tx.store(self.hdr, &hdr)?;
        Ok(value)
    }

    /// Reallocate the buffer to exactly `new_capacity` slots, copying
    /// the first `min(len, new_capacity)` values. Shrinking below the
    /// current length silently truncates — that is the documented
    /// contract, not an error.
    pub fn resize(&self, pool: &mut Pool, new_capacity: usize) -> Result<(), CollectionError> {
        pool.run(|tx| self.resize_in(tx, new_capacity))
    }

    /// [`resize`](Self::resize) inside an active transaction.
    pub fn resize_in(&self, tx: &mut Tx<'_>, new_capacity: usize) -> Result<(), CollectionError> {
        let mut hdr = tx.load(self.hdr);
        Self::resize_raw(tx, &mut hdr, new_capacity as u64)?;
        tx.store(self.hdr, &hdr)?;
        Ok(())
    }

    /// Drop unused capacity: `resize(len)`.
    pub fn shrink(&self, pool: &mut Pool) -> Result<(), CollectionError> {
        let len = self.len(pool);
        self.resize(pool, len)
    }

    /// Free the buffer and reset to empty, as a single transaction.
    pub fn clear(&self, pool: &mut Pool) -> Result<(), CollectionError> {
        pool.run(|tx| self.clear_in(tx))
    }

    /// [`clear`](Self::clear) inside an active transaction.
    pub fn clear_in(&self, tx: &mut Tx<'_>) -> Result<(), CollectionError> {
        let hdr = tx.load(self.hdr);
        if !hdr.buf.is_null() {
            tx.free(hdr.buf)?;
        }
        tx.store(self.hdr, &VecHeader::empty())?;
        Ok(())
    }

    /// Free the buffer and the header block itself; the handle is
    /// consumed and must not be used again.
    pub fn destroy_in(self, tx: &mut Tx<'_>) -> Result<(), CollectionError> {
        self.clear_in(tx)?;
        tx.free(self.hdr)?;
        Ok(())
    }

    /// Reallocate into `hdr` without storing it; callers persist the
    /// header afterwards. The new buffer is fully populated before the
    /// old one is freed.
    fn resize_raw(
        tx: &mut Tx<'_>,
        hdr: &mut VecHeader<T>,
        new_cap: u64,
    ) -> Result<(), HeapError> {
        let new_buf: PPtr<T> = if new_cap == 0 {
            PPtr::null()
        } else {
            tx.alloc_bytes(new_cap as usize * T::SIZE)?.cast()
        };
        let keep = hdr.len.min(new_cap) as usize;
        if keep > 0 {
            let bytes = tx.load_bytes(hdr.buf.offset(), keep * T::SIZE).to_vec();
            tx.write_bytes(new_buf.offset(), &bytes)?;
        }
        if !hdr.buf.is_null() {
            tx.free(hdr.buf)?;
        }
        hdr.buf = new_buf;
        hdr.cap = new_cap;
        if hdr.len > new_cap {
            hdr.len = new_cap;
        }
        Ok(())
    }
}

/// Index-order value iterator over a [`PVec`].
pub struct VecIter<'a, T> {
    pool: &'a Pool,
    buf: PPtr<T>,
    idx: usize,
    len: usize,
}

impl<T: Persist> Iterator for VecIter<'_, T> {
    type Item = T;

    fn next(&mut self) -> Option<T> {
        if self.idx >= self.len {
            return None;
        }
        let value = self.pool.load(PVec::<T>::elem_ptr(self.buf, self.idx));
        self.idx += 1;
        Some(value)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let rest = self.len - self.idx;
        (rest, Some(rest))
    }
}
