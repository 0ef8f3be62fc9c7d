//! On-disk layout constants and the header codec.
//!
//! All integers are little-endian. The header occupies the first page;
//! the undo log and the heap follow at the offsets recorded in the
//! header. The layout is intentionally simple — no compression, no
//! self-describing schema.

use amber_core::HeapError;

/// Magic bytes at offset 0 of every pool file.
pub(crate) const MAGIC: [u8; 8] = *b"AMBRPOOL";

/// On-disk format version this build reads and writes.
pub(crate) const FORMAT_VERSION: u32 = 1;

/// Version of the root-slot schema. Changing the set of root slots
/// requires bumping this and writing a migration.
pub(crate) const ROOT_LAYOUT_VERSION: u32 = 1;

// ── Header field offsets ────────────────────────────────────────

pub(crate) const OFF_MAGIC: usize = 0;
pub(crate) const OFF_VERSION: usize = 8;
pub(crate) const OFF_LAYOUT_TAG: usize = 16;
/// Fixed width of the NUL-padded layout tag field.
pub(crate) const LAYOUT_TAG_LEN: usize = 32;
pub(crate) const OFF_POOL_SIZE: usize = 48;
pub(crate) const OFF_LOG_OFFSET: usize = 56;
pub(crate) const OFF_LOG_SIZE: usize = 64;
pub(crate) const OFF_HEAP_OFFSET: usize = 72;
pub(crate) const OFF_HEAP_SIZE: usize = 80;
pub(crate) const OFF_ROOT_VERSION: usize = 88;

/// First root slot; slots are consecutive u64 words.
pub(crate) const ROOT_SLOTS_OFFSET: u64 = 96;
/// Number of root slots in layout version 1.
pub(crate) const ROOT_SLOT_COUNT: u64 = 4;
/// End of the root-slot region (exclusive).
pub(crate) const ROOT_REGION_END: u64 = ROOT_SLOTS_OFFSET + ROOT_SLOT_COUNT * 8;

/// The undo log always starts after the header page.
pub(crate) const HEADER_PAGE: u64 = 4096;

// ── Undo log layout (offsets relative to the log region) ────────

/// No transaction in flight; the entry area is dead.
pub(crate) const LOG_STATE_IDLE: u64 = 0;
/// A transaction is recording entries; on reopen it must be rolled back.
pub(crate) const LOG_STATE_ACTIVE: u64 = 1;
/// The commit marker: all data writes are durable; entries are dead.
pub(crate) const LOG_STATE_COMMITTED: u64 = 2;

/// Byte offset of the state word within the log region.
pub(crate) const LOG_STATE: u64 = 0;
/// Byte offset of the entry-count word within the log region.
pub(crate) const LOG_COUNT: u64 = 8;
/// Byte offset of the first entry within the log region.
pub(crate) const LOG_ENTRIES: u64 = 16;
/// Per-entry header: target offset (u64) + old-bytes length (u32).
pub(crate) const LOG_ENTRY_HEADER: u64 = 12;

// ── Heap layout ─────────────────────────────────────────────────

/// Allocator metadata at the start of the heap region:
/// free-list head (u64) then bump frontier (u64).
pub(crate) const HEAP_META_SIZE: u64 = 16;
/// Every block is preceded by its payload size (u64).
pub(crate) const BLOCK_HEADER: u64 = 8;
/// Smallest payload the allocator hands out; free blocks need one word
/// for their next-free link.
pub(crate) const MIN_PAYLOAD: u64 = 8;

/// The named root slots of layout version 1.
///
/// Each slot holds a persistent pointer to one top-level collection.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RootSlot {
    /// The top-level linked list.
    List = 0,
    /// The top-level dynamic array.
    Vector = 1,
    /// The top-level dynamic string.
    Text = 2,
    /// The top-level hash table.
    Table = 3,
}

impl RootSlot {
    /// Absolute byte offset of this slot's u64 word.
    pub(crate) fn offset(self) -> u64 {
        ROOT_SLOTS_OFFSET + (self as u64) * 8
    }
}

/// Parsed pool geometry, validated against the file on open.
#[derive(Clone, Copy, Debug)]
pub(crate) struct Geometry {
    pub(crate) pool_size: u64,
    pub(crate) log_offset: u64,
    pub(crate) log_size: u64,
    pub(crate) heap_offset: u64,
    pub(crate) heap_size: u64,
}

impl Geometry {
    /// Compute the geometry a fresh pool of `pool_size` bytes will use.
    pub(crate) fn for_new_pool(pool_size: u64, log_size: u64) -> Self {
        let heap_offset = HEADER_PAGE + log_size;
        Self {
            pool_size,
            log_offset: HEADER_PAGE,
            log_size,
            heap_offset,
            heap_size: pool_size - heap_offset,
        }
    }

    /// End of the log region (exclusive).
    pub(crate) fn log_end(&self) -> u64 {
        self.log_offset + self.log_size
    }

    /// Absolute offset of the free-list head word.
    pub(crate) fn free_head_offset(&self) -> u64 {
        self.heap_offset
    }

    /// Absolute offset of the bump-frontier word.
    pub(crate) fn brk_offset(&self) -> u64 {
        self.heap_offset + 8
    }

    /// First offset the allocator may hand out.
    pub(crate) fn heap_start(&self) -> u64 {
        self.heap_offset + HEAP_META_SIZE
    }

    /// Whether `[offset, offset + len)` is a legal target for a tracked
    /// write: entirely inside the root-slot region or the heap region.
    pub(crate) fn is_write_target(&self, offset: u64, len: u64) -> bool {
        let end = match offset.checked_add(len) {
            Some(e) => e,
            None => return false,
        };
        (offset >= ROOT_SLOTS_OFFSET && end <= ROOT_REGION_END)
            || (offset >= self.heap_offset && end <= self.pool_size)
    }
}

// ── Word codec ──────────────────────────────────────────────────

pub(crate) fn read_u32_at(buf: &[u8], off: usize) -> u32 {
    u32::from_le_bytes(buf[off..off + 4].try_into().unwrap())
}

pub(crate) fn read_u64_at(buf: &[u8], off: usize) -> u64 {
    u64::from_le_bytes(buf[off..off + 8].try_into().unwrap())
}

pub(crate) fn write_u32_at(buf: &mut [u8], off: usize, v: u32) {
    buf[off..off + 4].copy_from_slice(&v.to_le_bytes());
}

pub(crate) fn write_u64_at(buf: &mut [u8], off: usize, v: u64) {
    buf[off..off + 8].copy_from_slice(&v.to_le_bytes());
}

/// Encode a layout tag into its fixed NUL-padded header field.
///
/// Fails with [`HeapError::Corrupt`] only at create time if the tag is
/// too long; open-time validation compares decoded tags instead.
pub(crate) fn encode_layout_tag(tag: &str) -> Result<[u8; LAYOUT_TAG_LEN], HeapError> {
    let bytes = tag.as_bytes();
    if bytes.is_empty() || bytes.len() > LAYOUT_TAG_LEN {
        return Err(HeapError::Corrupt {
            detail: format!(
                "layout tag must be 1..={LAYOUT_TAG_LEN} bytes, got {}",
                bytes.len()
            ),
        });
    }
    let mut field = [0u8; LAYOUT_TAG_LEN];
    field[..bytes.len()].copy_from_slice(bytes);
    Ok(field)
}

/// Decode the layout tag from its header field, trimming NUL padding.
pub(crate) fn decode_layout_tag(field: &[u8]) -> String {
    let end = field.iter().position(|&b| b == 0).unwrap_or(field.len());
    String::from_utf8_lossy(&field[..end]).into_owned()
}
