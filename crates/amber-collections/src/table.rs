//! Persistent hash table with separate chaining.
//!
//! The bucket store is one heap block holding `bucket_count` inline
//! list headers; bucket `i` is manipulated as a [`PList`] of
//! key/value [`Pair`]s whose header happens to live inside that block.
//! Bucket selection hashes the key's durable encoding with FNV-1a —
//! deterministic across restarts — modulo the bucket count, which is
//! always a prime from the schedule in [`crate::prime`].
//!
//! Growth: when an insert would push the load factor past 1, the
//! table rehashes into `prime_below(2 × bucket_count)` buckets as part
//! of the same transaction, relinking the existing nodes rather than
//! reallocating them — a crash mid-rehash rolls the whole insert back,
//! so no pair is ever lost or duplicated.

use std::fmt;

use smallvec::{smallvec, SmallVec};

use amber_core::hash::fnv1a;
use amber_core::{CollectionError, HeapError, Persist};
use amber_heap::{PPtr, Pool, Tx};

use crate::list::{ListHeader, ListNode, PList};
use crate::prime;

/// A key/value pair as stored in a bucket chain.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Pair<K, V> {
    /// The key.
    pub key: K,
    /// The value.
    pub val: V,
}

impl<K: Persist, V: Persist> Persist for Pair<K, V> {
    const SIZE: usize = K::SIZE + V::SIZE;

    fn store(&self, buf: &mut [u8]) {
        self.key.store(&mut buf[..K::SIZE]);
        self.val.store(&mut buf[K::SIZE..K::SIZE + V::SIZE]);
    }

    fn load(buf: &[u8]) -> Self {
        Self {
            key: K::load(&buf[..K::SIZE]),
            val: V::load(&buf[K::SIZE..K::SIZE + V::SIZE]),
        }
    }
}

/// Durable header of a [`PTable`].
pub struct TableHeader<K, V> {
    pub(crate) buckets: PPtr<ListHeader<Pair<K, V>>>,
    pub(crate) bucket_count: u64,
    pub(crate) len: u64,
}

impl<K: Persist, V: Persist> Persist for TableHeader<K, V> {
    const SIZE: usize = 24;

    fn store(&self, buf: &mut [u8]) {
        self.buckets.store(&mut buf[0..8]);
        self.bucket_count.store(&mut buf[8..16]);
        self.len.store(&mut buf[16..24]);
    }

    fn load(buf: &[u8]) -> Self {
        Self {
            buckets: PPtr::load(&buf[0..8]),
            bucket_count: u64::load(&buf[8..16]),
            len: u64::load(&buf[16..24]),
        }
    }
}

/// Handle to a persistent hash table from `K` to `V`.
pub struct PTable<K, V> {
    hdr: PPtr<TableHeader<K, V>>,
}

impl<K, V> Clone for PTable<K, V> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<K, V> Copy for PTable<K, V> {}

impl<K, V> PartialEq for PTable<K, V> {
    fn eq(&self, other: &Self) -> bool {
        self.hdr == other.hdr
    }
}

impl<K, V> Eq for PTable<K, V> {}

impl<K, V> fmt::Debug for PTable<K, V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "PTable({:?})", self.hdr)
    }
}

impl<K, V> PTable<K, V>
where
    K: Persist + PartialEq,
    V: Persist,
{
    /// Bucket count every fresh table starts with.
    pub const DEFAULT_BUCKETS: u64 = 11;

    /// Allocate an empty table with the default bucket count inside
    /// the active transaction.
    pub fn create(tx: &mut Tx<'_>) -> Result<Self, HeapError> {
        let buckets = Self::alloc_buckets(tx, Self::DEFAULT_BUCKETS)?;
        Ok(Self {
            hdr: tx.alloc_value(&TableHeader {
                buckets,
                bucket_count: Self::DEFAULT_BUCKETS,
                len: 0,
            })?,
        })
    }

    /// Wrap an existing header pointer (e.g. one read from the root).
    pub fn from_ptr(hdr: PPtr<TableHeader<K, V>>) -> Self {
        Self { hdr }
    }

    /// The header's persistent pointer, for storing in a root slot.
    pub fn ptr(&self) -> PPtr<TableHeader<K, V>> {
        self.hdr
    }

    /// A zeroed block of `count` inline list headers — every bucket
    /// starts as an empty chain.
    fn alloc_buckets(
        tx: &mut Tx<'_>,
        count: u64,
    ) -> Result<PPtr<ListHeader<Pair<K, V>>>, HeapError> {
        let size = count as usize * <ListHeader<Pair<K, V>> as Persist>::SIZE;
        Ok(tx.alloc_zeroed(size)?.cast())
    }

    fn bucket_ptr(
        buckets: PPtr<ListHeader<Pair<K, V>>>,
        idx: u64,
    ) -> PPtr<ListHeader<Pair<K, V>>> {
        let stride = <ListHeader<Pair<K, V>> as Persist>::SIZE as u64;
        PPtr::from_offset(buckets.offset() + idx * stride)
    }

    /// Bucket index for a key: FNV-1a over its durable encoding,
    /// modulo the bucket count. Stable across process restarts.
    fn hash_index(key: &K, bucket_count: u64) -> u64 {
        let mut encoded: SmallVec<[u8; 32]> = smallvec![0u8; K::SIZE];
        key.store(&mut encoded);
        fnv1a(&encoded) % bucket_count
    }

    // ── Read-only operations ────────────────────────────────────

    /// Number of stored pairs.
    pub fn len(&self, pool: &Pool) -> usize {
        pool.load(self.hdr).len as usize
    }

    /// Whether the table holds no pairs.
    pub fn is_empty(&self, pool: &Pool) -> bool {
        self.len(pool) == 0
    }

    /// Current bucket count — always a prime from the schedule.
    pub fn bucket_count(&self, pool: &Pool) -> usize {
        pool.load(self.hdr).bucket_count as usize
    }

    /// Look up the value stored for `key`.
    pub fn get(&self, pool: &Pool, key: &K) -> Result<V, CollectionError> {
        let hdr = pool.load(self.hdr);
        let bucket = Self::bucket_ptr(hdr.buckets, Self::hash_index(key, hdr.bucket_count));
        let chain = PList::from_ptr(bucket);
        for pair in chain.iter(pool) {
            if pair.key == *key {
                return Ok(pair.val);
            }
        }
        Err(CollectionError::KeyNotFound)
    }

    /// Whether `key` is present.
    pub fn contains_key(&self, pool: &Pool, key: &K) -> bool {
        self.get(pool, key).is_ok()
    }

    /// Iterate all stored pairs, bucket by bucket.
    pub fn iter<'a>(&self, pool: &'a Pool) -> TableIter<'a, K, V> {
        let hdr = pool.load(self.hdr);
        TableIter {
            pool,
            buckets: hdr.buckets,
            bucket_count: hdr.bucket_count,
            next_bucket: 0,
            cursor: PPtr::null(),
        }
    }

    // ── Mutating operations ─────────────────────────────────────

    /// Insert `key → val`, replacing any existing value for the key.
    /// May rehash; the whole operation is one transaction.
    pub fn put(&self, pool: &mut Pool, key: K, val: V) -> Result<(), CollectionError> {
        pool.run(|tx| self.put_in(tx, key, val))
    }

    /// [`put`](Self::put) inside an active transaction.
    pub fn put_in(&self, tx: &mut Tx<'_>, key: K, val: V) -> Result<(), CollectionError> {
        let mut hdr = tx.load(self.hdr);

        // Replace in place when the key is already chained.
        let bucket = Self::bucket_ptr(hdr.buckets, Self::hash_index(&key, hdr.bucket_count));
        let mut cur = tx.load(bucket).head;
        while !cur.is_null() {
            let node = tx.load(cur);
            if node.value.key == key {
                tx.store(cur.cast::<Pair<K, V>>(), &Pair { key, val })?;
                return Ok(());
            }
            cur = node.next;
        }

        // New key: grow first if this insert would pass load factor 1.
        if hdr.len + 1 > hdr.bucket_count {
            self.rehash_in(tx, &mut hdr)?;
        }
        let bucket = Self::bucket_ptr(hdr.buckets, Self::hash_index(&key, hdr.bucket_count));
        PList::from_ptr(bucket).push_back_in(tx, Pair { key, val })?;
        hdr.len += 1;
        tx.store(self.hdr, &hdr)?;
        Ok(())
    }

    /// Remove `key` and return its value. Fails with `KeyNotFound`
    /// before any transaction begins when the key is absent.
    pub fn remove(&self, pool: &mut Pool, key: &K) -> Result<V, CollectionError> {
        if !self.contains_key(pool, key) {
            return Err(CollectionError::KeyNotFound);
        }
        pool.run(|tx| self.remove_in(tx, key))
    }

    /// [`remove`](Self::remove) inside an active transaction.
    pub fn remove_in(&self, tx: &mut Tx<'_>, key: &K) -> Result<V, CollectionError> {
        let mut hdr = tx.load(self.hdr);
        let bucket = Self::bucket_ptr(hdr.buckets, Self::hash_index(key, hdr.bucket_count));
        let mut bhdr = tx.load(bucket);

        let mut prev: PPtr<ListNode<Pair<K, V>>> = PPtr::null();
        let mut cur = bhdr.head;
        while !cur.is_null() {
            let node = tx.load(cur);
            if node.value.key == *key {
                if prev.is_null() {
                    bhdr.head = node.next;
                } else {
                    tx.store(PList::<Pair<K, V>>::next_ptr(prev), &node.next)?;
                }
                if bhdr.tail == cur {
                    bhdr.tail = prev;
                }
                bhdr.len -= 1;
                tx.store(bucket, &bhdr)?;
                tx.free(cur)?;
                hdr.len -= 1;
                tx.store(self.hdr, &hdr)?;
                return Ok(node.value.val);
            }
            prev = cur;
            cur = node.next;
        }
        Err(CollectionError::KeyNotFound)
    }

    /// Free every chain node, the bucket block, and the header block;
    /// the handle is consumed and must not be used again.
    pub fn destroy_in(self, tx: &mut Tx<'_>) -> Result<(), CollectionError> {
        let hdr = tx.load(self.hdr);
        for i in 0..hdr.bucket_count {
            let bucket = PList::from_ptr(Self::bucket_ptr(hdr.buckets, i));
            bucket.clear_in(tx)?;
        }
        tx.free(hdr.buckets)?;
        tx.free(self.hdr)?;
        Ok(())
    }

    /// Re-bucket every stored pair into `prime_below(2 × count)`
    /// buckets, relinking the existing nodes. A no-op once the
    /// schedule has topped out at [`prime::MAX_PRIME`].
    fn rehash_in(
        &self,
        tx: &mut Tx<'_>,
        hdr: &mut TableHeader<K, V>,
    ) -> Result<(), CollectionError> {
        let next_count = prime::next_table_size(hdr.bucket_count)?;
        if next_count <= hdr.bucket_count {
            return Ok(());
        }
        let new_buckets = Self::alloc_buckets(tx, next_count)?;

        for i in 0..hdr.bucket_count {
            let mut cur = tx.load(Self::bucket_ptr(hdr.buckets, i)).head;
            while !cur.is_null() {
                let node = tx.load(cur);
                let target = Self::bucket_ptr(
                    new_buckets,
                    Self::hash_index(&node.value.key, next_count),
                );
                let mut thdr = tx.load(target);
                tx.store(PList::<Pair<K, V>>::next_ptr(cur), &PPtr::null())?;
                if thdr.len == 0 {
                    thdr.head = cur;
                } else {
                    tx.store(PList::<Pair<K, V>>::next_ptr(thdr.tail), &cur)?;
                }
                thdr.tail = cur;
                thdr.len += 1;
                tx.store(target, &thdr)?;
                cur = node.next;
            }
        }

        tx.free(hdr.buckets)?;
        hdr.buckets = new_buckets;
        hdr.bucket_count = next_count;
        Ok(())
    }
}

/// Pair iterator over a [`PTable`], bucket by bucket.
pub struct TableIter<'a, K, V> {
    pool: &'a Pool,
    buckets: PPtr<ListHeader<Pair<K, V>>>,
    bucket_count: u64,
    next_bucket: u64,
    cursor: PPtr<ListNode<Pair<K, V>>>,
}

impl<K: Persist + PartialEq, V: Persist> Iterator for TableIter<'_, K, V> {
    type Item = (K, V);

    fn next(&mut self) -> Option<(K, V)> {
        loop {
            if !self.cursor.is_null() {
                let node = self.pool.load(self.cursor);
                self.cursor = node.next;
                return Some((node.value.key, node.value.val));
            }
            if self.next_bucket >= self.bucket_count {
                return None;
            }
            let bucket = PTable::<K, V>::bucket_ptr(self.buckets, self.next_bucket);
            self.cursor = self.pool.load(bucket).head;
            self.next_bucket += 1;
        }
    }
}
