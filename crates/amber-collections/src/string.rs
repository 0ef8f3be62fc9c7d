//! Persistent dynamic string.
//!
//! A byte specialization of the vector pattern with a reserved
//! terminator slot: after any mutation the capacity is exactly
//! `len + 1` and the buffer holds `0u8` at index `len`. There is no
//! spare growth headroom — every append reallocates to fit.
//!
//! Invariant: `cap == 0 ∨ cap == len + 1`.

use std::fmt;

use amber_core::{CollectionError, HeapError, Persist};
use amber_heap::{PPtr, Pool, Tx};

/// Durable header of a [`PStr`].
pub struct StrHeader {
    pub(crate) buf: PPtr<u8>,
    pub(crate) len: u64,
    pub(crate) cap: u64,
}

impl StrHeader {
    fn empty() -> Self {
        Self {
            buf: PPtr::null(),
            len: 0,
            cap: 0,
        }
    }
}

impl Persist for StrHeader {
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

/// Handle to a persistent byte string.
#[derive(Clone, Copy, PartialEq, Eq)]
pub struct PStr {
    hdr: PPtr<StrHeader>,
}

impl fmt::Debug for PStr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "PStr({:?})", self.hdr)
    }
}

impl PStr {
    /// Allocate an empty string (no buffer) inside the active
    /// transaction.
    pub fn create(tx: &mut Tx<'_>) -> Result<Self, HeapError> {
        Ok(Self {
            hdr: tx.alloc_value(&StrHeader::empty())?,
        })
    }

    /// Allocate a string holding `content` (terminator included).
    pub fn create_from(tx: &mut Tx<'_>, content: &str) -> Result<Self, HeapError> {
        let mut hdr = StrHeader::empty();
        Self::replace_raw(tx, &mut hdr, content.as_bytes())?;
        Ok(Self {
            hdr: tx.alloc_value(&hdr)?,
        })
    }

    /// Wrap an existing header pointer (e.g. one read from the root).
    pub fn from_ptr(hdr: PPtr<StrHeader>) -> Self {
        Self { hdr }
    }

    /// The header's persistent pointer, for storing in a root slot.
    pub fn ptr(&self) -> PPtr<StrHeader> {
        self.hdr
    }

    // ── Read-only operations ────────────────────────────────────

    /// Number of content bytes (terminator excluded).
    pub fn len(&self, pool: &Pool) -> usize {
        pool.load(self.hdr).len as usize
    }

    /// Whether the string holds no content bytes.
    pub fn is_empty(&self, pool: &Pool) -> bool {
        self.len(pool) == 0
    }

    /// Allocated capacity (terminator slot included).
    pub fn capacity(&self, pool: &Pool) -> usize {
        pool.load(self.hdr).cap as usize
    }

    /// Content byte at position `idx`.
    pub fn byte_at(&self, pool: &Pool, idx: usize) -> Result<u8, CollectionError> {
        let hdr = pool.load(self.hdr);
        if idx as u64 >= hdr.len {
            return Err(CollectionError::IndexOutOfRange {
                index: idx,
                length: hdr.len as usize,
            });
        }
        Ok(pool.load_bytes(hdr.buf.offset() + idx as u64, 1)[0])
    }

    /// Copy the content out as an owned `String`.
    pub fn as_string(&self, pool: &Pool) -> String {
        let hdr = pool.load(self.hdr);
        if hdr.len == 0 {
            return String::new();
        }
        let bytes = pool.load_bytes(hdr.buf.offset(), hdr.len as usize);
        String::from_utf8_lossy(bytes).into_owned()
    }

    // ── Mutating operations ─────────────────────────────────────

    /// Concatenate another persistent string onto this one, as one
    /// transaction.
    pub fn append(&self, pool: &mut Pool, other: &PStr) -> Result<(), CollectionError> {
        pool.run(|tx| self.append_in(tx, other))
    }

    /// [`append`](Self::append) inside an active transaction.
    pub fn append_in(&self, tx: &mut Tx<'_>, other: &PStr) -> Result<(), CollectionError> {
        let combined = {
            let mine = self.content_bytes(tx);
            let mut joined = mine;
            joined.extend_from_slice(&other.content_bytes(tx));
            joined
        };
        self.replace_in(tx, &combined)
    }

    /// Concatenate a borrowed string slice onto this one.
    pub fn append_str(&self, pool: &mut Pool, suffix: &str) -> Result<(), CollectionError> {
        pool.run(|tx| self.append_str_in(tx, suffix))
    }

    /// [`append_str`](Self::append_str) inside an active transaction.
    pub fn append_str_in(&self, tx: &mut Tx<'_>, suffix: &str) -> Result<(), CollectionError> {
        let mut combined = self.content_bytes(tx);
        combined.extend_from_slice(suffix.as_bytes());
        self.replace_in(tx, &combined)
    }

    /// Replace the contents wholesale with `content`, as one
    /// transaction.
    pub fn assign_str(&self, pool: &mut Pool, content: &str) -> Result<(), CollectionError> {
        pool.run(|tx| self.replace_in(tx, content.as_bytes()))
    }

    /// Replace the contents wholesale with another persistent
    /// string's, as one transaction.
    pub fn assign(&self, pool: &mut Pool, other: &PStr) -> Result<(), CollectionError> {
        pool.run(|tx| {
            let content = other.content_bytes(tx);
            self.replace_in(tx, &content)
        })
    }

    /// Free the buffer and the header block itself; the handle is
    /// consumed and must not be used again.
    pub fn destroy_in(self, tx: &mut Tx<'_>) -> Result<(), CollectionError> {
        let hdr = tx.load(self.hdr);
        if !hdr.buf.is_null() {
            tx.free(hdr.buf)?;
        }
        tx.free(self.hdr)?;
        Ok(())
    }

    fn content_bytes(&self, tx: &Tx<'_>) -> Vec<u8> {
        let hdr = tx.load(self.hdr);
        if hdr.len == 0 {
            Vec::new()
        } else {
            tx.load_bytes(hdr.buf.offset(), hdr.len as usize).to_vec()
        }
    }

    fn replace_in(&self, tx: &mut Tx<'_>, content: &[u8]) -> Result<(), CollectionError> {
        let mut hdr = tx.load(self.hdr);
        Self::replace_raw(tx, &mut hdr, content)?;
        tx.store(self.hdr, &hdr)?;
        Ok(())
    }

    /// Swap in a freshly allocated `len + 1` buffer holding `content`
    /// plus the terminator, freeing the old buffer afterwards.
    fn replace_raw(
        tx: &mut Tx<'_>,
        hdr: &mut StrHeader,
        content: &[u8],
    ) -> Result<(), HeapError> {
        let new_cap = content.len() as u64 + 1;
        let new_buf = tx.alloc_bytes(new_cap as usize)?;
        if !content.is_empty() {
            tx.write_bytes(new_buf.offset(), content)?;
        }
        tx.write_bytes(new_buf.offset() + content.len() as u64, &[0u8])?;
        if !hdr.buf.is_null() {
            tx.free(hdr.buf)?;
        }
        hdr.buf = new_buf;
        hdr.len = content.len() as u64;
        hdr.cap = new_cap;
        Ok(())
    }
}
