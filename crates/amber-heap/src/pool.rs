//! Pool lifecycle, typed access, and the transaction scope.
//!
//! [`Pool::create`] formats a fresh file; [`Pool::open`] validates the
//! header and performs crash recovery before returning. All mutation
//! happens inside [`Pool::run`], which hands the closure a [`Tx`] and
//! commits on `Ok` or rolls back on `Err` — direct unguarded writes to
//! the mapped region are unrepresentable in this API.

use std::fs::OpenOptions;
use std::io;
use std::path::{Path, PathBuf};

use memmap2::{MmapMut, MmapOptions};
use smallvec::{smallvec, SmallVec};

use amber_core::{HeapError, Persist};

use crate::alloc;
use crate::config::PoolConfig;
use crate::layout::{
    self, read_u32_at, read_u64_at, write_u32_at, write_u64_at, Geometry, RootSlot, BLOCK_HEADER,
    FORMAT_VERSION, HEADER_PAGE, HEAP_META_SIZE, LAYOUT_TAG_LEN, MAGIC, OFF_HEAP_OFFSET,
    OFF_HEAP_SIZE, OFF_LAYOUT_TAG, OFF_LOG_OFFSET, OFF_LOG_SIZE, OFF_MAGIC, OFF_POOL_SIZE,
    OFF_ROOT_VERSION, OFF_VERSION, ROOT_LAYOUT_VERSION,
};
use crate::pptr::PPtr;
use crate::stats::{HeapStats, RecoveryReport};
use crate::wal::{self, Wal};

/// A persistent heap backed by a memory-mapped file.
///
/// Exactly one logical actor mutates a pool at a time; `&mut Pool`
/// exclusivity is the in-process enforcement of the single-writer
/// model. Read-only accessors take `&Pool` and no transaction.
#[derive(Debug)]
pub struct Pool {
    map: MmapMut,
    geo: Geometry,
    path: PathBuf,
    wal: Wal,
    recovery: RecoveryReport,
}

impl Pool {
    /// Format a fresh pool file and map it.
    ///
    /// Fails with [`HeapError::AlreadyExists`] if the backing file
    /// exists, whatever its contents.
    pub fn create(config: &PoolConfig) -> Result<Self, HeapError> {
        config.validate()?;
        let file = match OpenOptions::new()
            .read(true)
            .write(true)
            .create_new(true)
            .open(&config.path)
        {
            Ok(f) => f,
            Err(e) if e.kind() == io::ErrorKind::AlreadyExists => {
                return Err(HeapError::AlreadyExists {
                    path: config.path.clone(),
                })
            }
            Err(e) => return Err(HeapError::Io(e)),
        };
        file.set_len(config.size)?;
        // Safety: the file was created exclusively above and the map is
        // owned by this Pool for its whole lifetime; the single-writer
        // model means no other mapping of it exists.
        let mut map = unsafe { MmapOptions::new().map_mut(&file)? };

        let geo = Geometry::for_new_pool(config.size, config.log_size);
        let tag = layout::encode_layout_tag(&config.layout)?;
        map[OFF_MAGIC..OFF_MAGIC + 8].copy_from_slice(&MAGIC);
        write_u32_at(&mut map, OFF_VERSION, FORMAT_VERSION);
        map[OFF_LAYOUT_TAG..OFF_LAYOUT_TAG + LAYOUT_TAG_LEN].copy_from_slice(&tag);
        write_u64_at(&mut map, OFF_POOL_SIZE, geo.pool_size);
        write_u64_at(&mut map, OFF_LOG_OFFSET, geo.log_offset);
        write_u64_at(&mut map, OFF_LOG_SIZE, geo.log_size);
        write_u64_at(&mut map, OFF_HEAP_OFFSET, geo.heap_offset);
        write_u64_at(&mut map, OFF_HEAP_SIZE, geo.heap_size);
        write_u32_at(&mut map, OFF_ROOT_VERSION, ROOT_LAYOUT_VERSION);
        // Root slots, log state, and the free-list head are the fresh
        // file's zeros; only the bump frontier needs a value.
        write_u64_at(&mut map, geo.brk_offset() as usize, geo.heap_start());
        map.flush()?;

        Ok(Self {
            map,
            geo,
            path: config.path.clone(),
            wal: Wal::new(&geo),
            recovery: RecoveryReport::default(),
        })
    }

    /// Map an existing pool file, validating its header and rolling
    /// back any transaction left uncommitted by a crash.
    pub fn open(config: &PoolConfig) -> Result<Self, HeapError> {
        if !config.path.exists() {
            return Err(HeapError::NotFound {
                path: config.path.clone(),
            });
        }
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .open(&config.path)?;
        let file_len = file.metadata()?.len();
        if file_len < HEADER_PAGE {
            return Err(HeapError::Corrupt {
                detail: format!("file is {file_len} bytes, smaller than the header page"),
            });
        }
        // Safety: same ownership argument as in `create`; the opened
        // file backs exactly this one mapping in this process.
        let mut map = unsafe { MmapOptions::new().map_mut(&file)? };

        if map[OFF_MAGIC..OFF_MAGIC + 8] != MAGIC {
            return Err(HeapError::Corrupt {
                detail: "bad magic bytes".into(),
            });
        }
        let version = read_u32_at(&map, OFF_VERSION);
        if version != FORMAT_VERSION {
            return Err(HeapError::Corrupt {
                detail: format!("unsupported format version {version}"),
            });
        }
        let found = layout::decode_layout_tag(&map[OFF_LAYOUT_TAG..OFF_LAYOUT_TAG + LAYOUT_TAG_LEN]);
        if found != config.layout {
            return Err(HeapError::LayoutMismatch {
                expected: config.layout.clone(),
                found,
            });
        }
        let root_version = read_u32_at(&map, OFF_ROOT_VERSION);
        if root_version != ROOT_LAYOUT_VERSION {
            return Err(HeapError::Corrupt {
                detail: format!("unsupported root layout version {root_version}"),
            });
        }

        let geo = Geometry {
            pool_size: read_u64_at(&map, OFF_POOL_SIZE),
            log_offset: read_u64_at(&map, OFF_LOG_OFFSET),
            log_size: read_u64_at(&map, OFF_LOG_SIZE),
            heap_offset: read_u64_at(&map, OFF_HEAP_OFFSET),
            heap_size: read_u64_at(&map, OFF_HEAP_SIZE),
        };
        // Checked arithmetic throughout: these fields are untrusted.
        let log_end = geo.log_offset.checked_add(geo.log_size);
        let heap_end = geo.heap_offset.checked_add(geo.heap_size);
        let meta_end = geo.heap_offset.checked_add(HEAP_META_SIZE);
        let consistent = geo.pool_size == file_len
            && geo.log_offset == HEADER_PAGE
            && log_end == Some(geo.heap_offset)
            && heap_end == Some(geo.pool_size)
            && meta_end.is_some_and(|end| end < geo.pool_size);
        if !consistent {
            return Err(HeapError::Corrupt {
                detail: "header geometry inconsistent with file".into(),
            });
        }

        // Recovery runs before anything reads through the root.
        let recovery = wal::recover(&mut map, &geo)?;

        let brk = read_u64_at(&map, geo.brk_offset() as usize);
        if brk < geo.heap_start() || brk > geo.pool_size {
            return Err(HeapError::Corrupt {
                detail: format!("bump frontier {brk} outside heap region"),
            });
        }

        Ok(Self {
            map,
            geo,
            path: config.path.clone(),
            wal: Wal::new(&geo),
            recovery,
        })
    }

    /// Open the pool at `config.path`, formatting it first if the file
    /// does not exist. Returns whether it was freshly created.
    pub fn open_or_create(config: &PoolConfig) -> Result<(Self, bool), HeapError> {
        if config.path.exists() {
            Ok((Self::open(config)?, false))
        } else {
            Ok((Self::create(config)?, true))
        }
    }

    /// Path of the backing file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Total pool size in bytes.
    pub fn size(&self) -> u64 {
        self.geo.pool_size
    }

    /// The layout tag this pool was formatted with.
    pub fn layout(&self) -> String {
        layout::decode_layout_tag(&self.map[OFF_LAYOUT_TAG..OFF_LAYOUT_TAG + LAYOUT_TAG_LEN])
    }

    /// What recovery did when this pool was opened.
    pub fn recovery_report(&self) -> RecoveryReport {
        self.recovery
    }

    /// Read the persistent pointer stored in a root slot.
    pub fn root_ptr<T>(&self, slot: RootSlot) -> PPtr<T> {
        PPtr::from_offset(read_u64_at(&self.map, slot.offset() as usize))
    }

    /// Load a typed value from the heap.
    ///
    /// # Panics
    ///
    /// Panics if `ptr` is null or `ptr..ptr + T::SIZE` falls outside
    /// the pool — both indicate a broken structural invariant.
    pub fn load<T: Persist>(&self, ptr: PPtr<T>) -> T {
        assert!(!ptr.is_null(), "null persistent pointer dereference");
        let off = ptr.offset() as usize;
        T::load(&self.map[off..off + T::SIZE])
    }

    /// Borrow raw bytes from the heap.
    ///
    /// # Panics
    ///
    /// Panics if the range falls outside the pool.
    pub fn load_bytes(&self, offset: u64, len: usize) -> &[u8] {
        &self.map[offset as usize..offset as usize + len]
    }

    pub(crate) fn read_word(&self, offset: u64) -> u64 {
        read_u64_at(&self.map, offset as usize)
    }

    /// Walk the allocator bookkeeping.
    pub fn stats(&self) -> HeapStats {
        let brk = self.read_word(self.geo.brk_offset());
        let mut free_blocks = 0;
        let mut free_bytes = 0;
        let mut cur = self.read_word(self.geo.free_head_offset());
        while cur != 0 {
            free_blocks += 1;
            free_bytes += self.read_word(cur - BLOCK_HEADER);
            cur = self.read_word(cur);
        }
        HeapStats {
            pool_size: self.geo.pool_size,
            heap_bytes: self.geo.heap_size,
            bump_used: brk - self.geo.heap_start(),
            bump_remaining: self.geo.pool_size - brk,
            free_blocks,
            free_bytes,
        }
    }

    /// Arm the crash point: the `limit`-th subsequent tracked write
    /// fails with [`HeapError::CrashPoint`] and poisons the pool, so a
    /// test can simulate a torn mutation and exercise reopen-time
    /// recovery. `None` disarms.
    pub fn fail_after_tracked_writes(&mut self, limit: Option<u64>) {
        self.wal.set_fail_after(limit);
    }

    /// Whether a crash point has fired. A poisoned pool refuses all
    /// further transactions; drop it and reopen the file to recover.
    pub fn is_poisoned(&self) -> bool {
        self.wal.is_poisoned()
    }

    /// Run `f` inside a transaction: commit on `Ok`, roll back on
    /// `Err`, then propagate `f`'s result.
    ///
    /// Rollback restores every tracked write, so a failed operation
    /// leaves durable state exactly as it was. After a simulated crash
    /// ([`HeapError::CrashPoint`]) rollback is suppressed — the torn
    /// state stays on disk for reopen-time recovery, as a real crash
    /// would leave it.
    pub fn run<T, E>(&mut self, f: impl FnOnce(&mut Tx<'_>) -> Result<T, E>) -> Result<T, E>
    where
        E: From<HeapError>,
    {
        self.wal.begin(&mut self.map, &self.geo).map_err(E::from)?;
        let result = {
            let mut tx = Tx { pool: self };
            f(&mut tx)
        };
        match result {
            Ok(value) => {
                self.wal.commit(&mut self.map, &self.geo).map_err(E::from)?;
                Ok(value)
            }
            Err(e) => {
                if !self.wal.is_poisoned() {
                    self.wal.abort(&mut self.map, &self.geo).map_err(E::from)?;
                }
                Err(e)
            }
        }
    }
}

/// An active transaction.
///
/// Handed to the closure of [`Pool::run`]; every write performed
/// through it is undo-logged first. Composite operations flatten into
/// one transaction by passing the same `Tx` down.
pub struct Tx<'p> {
    pool: &'p mut Pool,
}

impl Tx<'_> {
    pub(crate) fn geometry(&self) -> Geometry {
        self.pool.geo
    }

    pub(crate) fn read_word(&self, offset: u64) -> u64 {
        self.pool.read_word(offset)
    }

    pub(crate) fn write_word(&mut self, offset: u64, value: u64) -> Result<(), HeapError> {
        self.write_bytes(offset, &value.to_le_bytes())
    }

    pub(crate) fn note_fresh(&mut self, offset: u64, len: u64) {
        self.pool.wal.note_fresh(offset, len);
    }

    /// Perform one tracked write of raw bytes.
    pub fn write_bytes(&mut self, offset: u64, bytes: &[u8]) -> Result<(), HeapError> {
        let pool = &mut *self.pool;
        pool.wal.track_write(&mut pool.map, &pool.geo, offset, bytes)
    }

    /// Load a typed value; sees this transaction's uncommitted writes.
    ///
    /// # Panics
    ///
    /// As [`Pool::load`].
    pub fn load<T: Persist>(&self, ptr: PPtr<T>) -> T {
        self.pool.load(ptr)
    }

    /// Borrow raw bytes; sees this transaction's uncommitted writes.
    ///
    /// # Panics
    ///
    /// As [`Pool::load_bytes`].
    pub fn load_bytes(&self, offset: u64, len: usize) -> &[u8] {
        self.pool.load_bytes(offset, len)
    }

    /// Store a typed value through the undo log.
    ///
    /// # Panics
    ///
    /// Panics if `ptr` is null.
    pub fn store<T: Persist>(&mut self, ptr: PPtr<T>, value: &T) -> Result<(), HeapError> {
        assert!(!ptr.is_null(), "store through null persistent pointer");
        let mut buf: SmallVec<[u8; 32]> = smallvec![0u8; T::SIZE];
        value.store(&mut buf);
        self.write_bytes(ptr.offset(), &buf)
    }

    /// Allocate `len` bytes; contents unspecified.
    pub fn alloc_bytes(&mut self, len: usize) -> Result<PPtr<u8>, HeapError> {
        alloc::alloc(self, len).map(PPtr::from_offset)
    }

    /// Allocate `len` zeroed bytes.
    pub fn alloc_zeroed(&mut self, len: usize) -> Result<PPtr<u8>, HeapError> {
        let payload = alloc::alloc(self, len)?;
        self.write_bytes(payload, &vec![0u8; len])?;
        Ok(PPtr::from_offset(payload))
    }

    /// Allocate a block sized for `T` and store `value` into it.
    pub fn alloc_value<T: Persist>(&mut self, value: &T) -> Result<PPtr<T>, HeapError> {
        let ptr = PPtr::from_offset(alloc::alloc(self, T::SIZE)?);
        self.store(ptr, value)?;
        Ok(ptr)
    }

    /// Return a block to the allocator.
    ///
    /// # Panics
    ///
    /// Panics if `ptr` is null.
    pub fn free<T>(&mut self, ptr: PPtr<T>) -> Result<(), HeapError> {
        assert!(!ptr.is_null(), "freeing null persistent pointer");
        alloc::release(self, ptr.offset())
    }

    /// Read the persistent pointer stored in a root slot.
    pub fn root_ptr<T>(&self, slot: RootSlot) -> PPtr<T> {
        self.pool.root_ptr(slot)
    }

    /// Point a root slot at a new top-level object.
    pub fn set_root_ptr<T>(&mut self, slot: RootSlot, ptr: PPtr<T>) -> Result<(), HeapError> {
        self.write_bytes(slot.offset(), &ptr.offset().to_le_bytes())
    }
}
