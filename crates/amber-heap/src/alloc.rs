//! Free-list block allocator over the heap region.
//!
//! Blocks carry an 8-byte header holding their payload size. A freed
//! block stores the next-free offset in its first payload word and is
//! pushed LIFO onto the free list. Allocation is first-fit with tail
//! splitting; blocks that no free-list entry can satisfy come from the
//! bump frontier. Free blocks are not coalesced.
//!
//! Every metadata word (free-list head, bump frontier, block headers,
//! next-free links) is written through the active transaction, so a
//! crashed allocation or free rolls back with the rest of the
//! transaction's effects.

use amber_core::HeapError;

use crate::layout::{BLOCK_HEADER, MIN_PAYLOAD};
use crate::pool::Tx;

/// All payloads are 8-byte aligned.
const ALIGN: u64 = 8;

fn round_up(n: u64) -> u64 {
    (n + ALIGN - 1) & !(ALIGN - 1)
}

/// Allocate a block with at least `size` payload bytes; returns the
/// payload offset. Payload contents are unspecified.
pub(crate) fn alloc(tx: &mut Tx<'_>, size: usize) -> Result<u64, HeapError> {
    let want = round_up((size as u64).max(MIN_PAYLOAD));
    let free_head = tx.geometry().free_head_offset();

    // First fit over the free list.
    let mut prev: u64 = 0;
    let mut cur = tx.read_word(free_head);
    while cur != 0 {
        let cap = tx.read_word(cur - BLOCK_HEADER);
        if cap >= want {
            let next = tx.read_word(cur);
            if prev == 0 {
                tx.write_word(free_head, next)?;
            } else {
                tx.write_word(prev, next)?;
            }
            // Split off the tail when it can hold a block of its own.
            if cap >= want + BLOCK_HEADER + MIN_PAYLOAD {
                tx.write_word(cur - BLOCK_HEADER, want)?;
                tx.write_word(cur + want, cap - want - BLOCK_HEADER)?;
                release(tx, cur + want + BLOCK_HEADER)?;
            }
            return Ok(cur);
        }
        prev = cur;
        cur = tx.read_word(cur);
    }

    // Nothing recyclable: advance the bump frontier.
    let brk_word = tx.geometry().brk_offset();
    let brk = tx.read_word(brk_word);
    let need = BLOCK_HEADER + want;
    let end = tx.geometry().pool_size;
    if brk + need > end {
        return Err(HeapError::OutOfMemory {
            requested: size,
            available: end.saturating_sub(brk).saturating_sub(BLOCK_HEADER) as usize,
        });
    }
    tx.write_word(brk, want)?;
    tx.write_word(brk_word, brk + need)?;
    let payload = brk + BLOCK_HEADER;
    // Rolling back the frontier word unreaches this payload, so writes
    // into it need no undo entries.
    tx.note_fresh(payload, want);
    Ok(payload)
}

/// Return a block (by payload offset) to the free list.
pub(crate) fn release(tx: &mut Tx<'_>, payload: u64) -> Result<(), HeapError> {
    debug_assert!(payload >= tx.geometry().heap_start());
    debug_assert_eq!(payload % ALIGN, 0, "misaligned payload offset {payload}");
    let free_head = tx.geometry().free_head_offset();
    let head = tx.read_word(free_head);
    tx.write_word(payload, head)?;
    tx.write_word(free_head, payload)?;
    Ok(())
}
