//! Undo-log write-ahead transactions.
//!
//! Every tracked write appends an undo entry — the target offset and
//! the bytes it is about to overwrite — to the durable log region, and
//! only then mutates the data. Flush ordering is the contract:
//!
//! 1. entry bytes, then the entry-count word (an entry is never counted
//!    before it is fully durable);
//! 2. at commit, every mutated data range, then the `Committed` state
//!    word (the commit marker is the last durable write);
//! 3. the log is retired (state `Idle`, count 0) after the marker.
//!
//! On reopen, a log still in `Active` state is replayed in reverse to
//! restore the pre-transaction bytes; a log in `Committed` state is
//! simply retired. Either way no torn transaction is ever observable.
//!
//! Writes into blocks bump-allocated by the same transaction skip the
//! undo entry: rolling back the allocator's frontier word already
//! unreaches those bytes.

use indexmap::IndexSet;
use memmap2::MmapMut;
use smallvec::SmallVec;

use amber_core::HeapError;

use crate::layout::{
    read_u32_at, read_u64_at, write_u32_at, write_u64_at, Geometry, LOG_COUNT, LOG_ENTRIES,
    LOG_ENTRY_HEADER, LOG_STATE, LOG_STATE_ACTIVE, LOG_STATE_COMMITTED, LOG_STATE_IDLE,
};
use crate::stats::RecoveryReport;

/// In-memory bookkeeping for the active transaction.
///
/// The durable half of the transaction lives in the pool's log region;
/// this struct tracks the write cursor, the per-transaction dedup set,
/// and the fault-injection state.
#[derive(Debug)]
pub(crate) struct Wal {
    active: bool,
    poisoned: bool,
    /// Absolute offset where the next undo entry will be written.
    cursor: u64,
    count: u64,
    /// `(offset, len)` pairs already undo-logged this transaction.
    /// Only the first old value per word matters for rollback.
    seen: IndexSet<(u64, u32)>,
    /// Payload ranges bump-allocated this transaction; writes inside
    /// them need no undo entry.
    fresh: Vec<(u64, u64)>,
    /// Data ranges mutated this transaction, flushed before the commit
    /// marker.
    touched: Vec<(u64, u32)>,
    writes_done: u64,
    fail_after: Option<u64>,
}

impl Wal {
    pub(crate) fn new(geo: &Geometry) -> Self {
        Self {
            active: false,
            poisoned: false,
            cursor: geo.log_offset + LOG_ENTRIES,
            count: 0,
            seen: IndexSet::new(),
            fresh: Vec::new(),
            touched: Vec::new(),
            writes_done: 0,
            fail_after: None,
        }
    }

    pub(crate) fn is_poisoned(&self) -> bool {
        self.poisoned
    }

    /// Arm (or disarm) the crash point: the `limit`-th subsequent
    /// tracked write fails and poisons the pool.
    pub(crate) fn set_fail_after(&mut self, limit: Option<u64>) {
        self.fail_after = limit;
        self.writes_done = 0;
    }

    /// Move `Idle → Active`: durably mark the log live and reset the
    /// per-transaction state.
    pub(crate) fn begin(&mut self, map: &mut MmapMut, geo: &Geometry) -> Result<(), HeapError> {
        if self.poisoned {
            return Err(HeapError::Poisoned);
        }
        debug_assert!(!self.active, "transaction already active");
        write_u64_at(map, (geo.log_offset + LOG_STATE) as usize, LOG_STATE_ACTIVE);
        write_u64_at(map, (geo.log_offset + LOG_COUNT) as usize, 0);
        map.flush_range(geo.log_offset as usize, LOG_ENTRIES as usize)?;
        self.active = true;
        self.cursor = geo.log_offset + LOG_ENTRIES;
        self.count = 0;
        self.seen.clear();
        self.fresh.clear();
        self.touched.clear();
        Ok(())
    }

    /// Record a payload range that needs no undo logging because the
    /// same transaction bump-allocated it.
    pub(crate) fn note_fresh(&mut self, offset: u64, len: u64) {
        self.fresh.push((offset, len));
    }

    fn is_fresh(&self, offset: u64, len: u64) -> bool {
        self.fresh
            .iter()
            .any(|&(start, flen)| offset >= start && offset + len <= start + flen)
    }

    /// Undo-log (if needed) and perform one tracked write.
    ///
    /// # Panics
    ///
    /// Panics if the target range is outside the root-slot and heap
    /// regions — that is a caller bug, not a recoverable state.
    pub(crate) fn track_write(
        &mut self,
        map: &mut MmapMut,
        geo: &Geometry,
        offset: u64,
        bytes: &[u8],
    ) -> Result<(), HeapError> {
        if self.poisoned {
            return Err(HeapError::Poisoned);
        }
        debug_assert!(self.active, "tracked write outside a transaction");
        let len = bytes.len() as u32;
        assert!(
            geo.is_write_target(offset, bytes.len() as u64),
            "tracked write outside root/heap regions: offset {offset}, len {len}"
        );

        if let Some(limit) = self.fail_after {
            if self.writes_done >= limit {
                self.poisoned = true;
                return Err(HeapError::CrashPoint {
                    after_writes: self.writes_done,
                });
            }
        }

        if !self.is_fresh(offset, bytes.len() as u64) && !self.seen.contains(&(offset, len)) {
            let need = LOG_ENTRY_HEADER + bytes.len() as u64;
            if self.cursor + need > geo.log_end() {
                return Err(HeapError::LogOverflow {
                    requested: need as usize,
                    capacity: (geo.log_size - LOG_ENTRIES) as usize,
                });
            }
            // Buffer the old bytes: source and entry live in the same map.
            let old: SmallVec<[u8; 64]> =
                SmallVec::from_slice(&map[offset as usize..offset as usize + bytes.len()]);
            let entry = self.cursor as usize;
            write_u64_at(map, entry, offset);
            write_u32_at(map, entry + 8, len);
            map[entry + LOG_ENTRY_HEADER as usize..entry + need as usize].copy_from_slice(&old);
            map.flush_range(entry, need as usize)?;
            // Count the entry only once it is fully durable.
            write_u64_at(map, (geo.log_offset + LOG_COUNT) as usize, self.count + 1);
            map.flush_range((geo.log_offset + LOG_COUNT) as usize, 8)?;
            self.cursor += need;
            self.count += 1;
            self.seen.insert((offset, len));
        }

        self.writes_done += 1;
        self.touched.push((offset, len));
        map[offset as usize..offset as usize + bytes.len()].copy_from_slice(bytes);
        Ok(())
    }

    /// Move `Active → Committed`, then retire the log.
    pub(crate) fn commit(&mut self, map: &mut MmapMut, geo: &Geometry) -> Result<(), HeapError> {
        debug_assert!(self.active, "commit outside a transaction");
        // Data first: the commit marker must be the last durable write.
        let flush_failure = self
            .touched
            .iter()
            .find_map(|&(off, len)| map.flush_range(off as usize, len as usize).err());
        if let Some(e) = flush_failure {
            self.abort(map, geo)?;
            return Err(HeapError::Io(e));
        }
        write_u64_at(
            map,
            (geo.log_offset + LOG_STATE) as usize,
            LOG_STATE_COMMITTED,
        );
        if let Err(e) = map.flush_range((geo.log_offset + LOG_STATE) as usize, 8) {
            // Marker durability unknown; restoring the old bytes and
            // retiring the log is consistent either way.
            self.abort(map, geo)?;
            return Err(HeapError::Io(e));
        }
        // The transaction is durable. Retiring the log may still fail
        // on I/O; reopen handles a lingering Committed state.
        let retire = self.retire(map, geo);
        self.reset(geo);
        retire
    }

    /// Move `Active → Aborted`: replay the undo log in reverse,
    /// restoring every overwritten range, then retire the log.
    pub(crate) fn abort(&mut self, map: &mut MmapMut, geo: &Geometry) -> Result<(), HeapError> {
        debug_assert!(self.active, "abort outside a transaction");
        replay_undo(map, geo)?;
        let retire = self.retire(map, geo);
        self.reset(geo);
        retire
    }

    /// Durably reset the log to `Idle` with no entries.
    fn retire(&self, map: &mut MmapMut, geo: &Geometry) -> Result<(), HeapError> {
        write_u64_at(map, (geo.log_offset + LOG_STATE) as usize, LOG_STATE_IDLE);
        write_u64_at(map, (geo.log_offset + LOG_COUNT) as usize, 0);
        map.flush_range(geo.log_offset as usize, LOG_ENTRIES as usize)?;
        Ok(())
    }

    fn reset(&mut self, geo: &Geometry) {
        self.active = false;
        self.cursor = geo.log_offset + LOG_ENTRIES;
        self.count = 0;
        self.seen.clear();
        self.fresh.clear();
        self.touched.clear();
    }
}

/// Replay the durable undo log in reverse, restoring pre-transaction
/// bytes. Returns the number of entries applied.
///
/// Shared between in-process `abort` and reopen-time recovery; trusts
/// only the entry-count word and validates every entry against the
/// pool geometry.
pub(crate) fn replay_undo(map: &mut MmapMut, geo: &Geometry) -> Result<u64, HeapError> {
    // The count word is untrusted until every entry checks out.
    let count = read_u64_at(map, (geo.log_offset + LOG_COUNT) as usize);
    let mut entries: Vec<(u64, u32, u64)> = Vec::new();
    let mut cursor = geo.log_offset + LOG_ENTRIES;

    for i in 0..count {
        if cursor + LOG_ENTRY_HEADER > geo.log_end() {
            return Err(HeapError::Corrupt {
                detail: format!("undo entry {i} header outside log region"),
            });
        }
        let target = read_u64_at(map, cursor as usize);
        let len = read_u32_at(map, (cursor + 8) as usize);
        let data = cursor + LOG_ENTRY_HEADER;
        if data + len as u64 > geo.log_end() {
            return Err(HeapError::Corrupt {
                detail: format!("undo entry {i} data outside log region"),
            });
        }
        if !geo.is_write_target(target, len as u64) {
            return Err(HeapError::Corrupt {
                detail: format!("undo entry {i} targets invalid offset {target}"),
            });
        }
        entries.push((target, len, data));
        cursor = data + len as u64;
    }

    for &(target, len, data) in entries.iter().rev() {
        let old: SmallVec<[u8; 64]> =
            SmallVec::from_slice(&map[data as usize..(data + len as u64) as usize]);
        map[target as usize..target as usize + len as usize].copy_from_slice(&old);
        map.flush_range(target as usize, len as usize)?;
    }

    Ok(count)
}

/// Reopen-time recovery: roll back an `Active` log, retire a
/// `Committed` one, leave an `Idle` one alone.
pub(crate) fn recover(map: &mut MmapMut, geo: &Geometry) -> Result<RecoveryReport, HeapError> {
    let state = read_u64_at(map, (geo.log_offset + LOG_STATE) as usize);
    match state {
        LOG_STATE_IDLE => Ok(RecoveryReport::default()),
        LOG_STATE_ACTIVE => {
            let replayed = replay_undo(map, geo)?;
            write_u64_at(map, (geo.log_offset + LOG_STATE) as usize, LOG_STATE_IDLE);
            write_u64_at(map, (geo.log_offset + LOG_COUNT) as usize, 0);
            map.flush_range(geo.log_offset as usize, LOG_ENTRIES as usize)?;
            Ok(RecoveryReport {
                rolled_back: true,
                entries_replayed: replayed,
            })
        }
        LOG_STATE_COMMITTED => {
            write_u64_at(map, (geo.log_offset + LOG_STATE) as usize, LOG_STATE_IDLE);
            write_u64_at(map, (geo.log_offset + LOG_COUNT) as usize, 0);
            map.flush_range(geo.log_offset as usize, LOG_ENTRIES as usize)?;
            Ok(RecoveryReport::default())
        }
        other => Err(HeapError::Corrupt {
            detail: format!("invalid undo-log state word {other}"),
        }),
    }
}
