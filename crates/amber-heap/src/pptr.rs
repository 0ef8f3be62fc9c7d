//! Typed persistent pointers.
//!
//! A [`PPtr`] is a base-relative byte offset into the pool's mapped
//! region, tagged at compile time with its pointee type. Offsets are
//! stable across process restarts even though the mapping's virtual
//! base address differs; no virtual address is ever stored durably.
//! Offset 0 (the pool header's magic bytes) is the null sentinel.

use std::fmt;
use std::marker::PhantomData;

use amber_core::Persist;

/// A typed offset into a pool's mapped region.
///
/// The type parameter is a compile-time tag only and costs nothing on
/// disk — a `PPtr` stores as a plain u64 offset. A non-null `PPtr`
/// always refers to the payload of a block previously returned by the
/// allocator and not yet freed.
pub struct PPtr<T> {
    off: u64,
    _pd: PhantomData<fn() -> T>,
}

impl<T> PPtr<T> {
    /// The null sentinel.
    pub const fn null() -> Self {
        Self {
            off: 0,
            _pd: PhantomData,
        }
    }

    /// Wrap a raw offset.
    pub const fn from_offset(off: u64) -> Self {
        Self {
            off,
            _pd: PhantomData,
        }
    }

    /// The raw byte offset.
    pub fn offset(self) -> u64 {
        self.off
    }

    /// Whether this is the null sentinel.
    pub fn is_null(self) -> bool {
        self.off == 0
    }

    /// Reinterpret the pointee type, keeping the offset.
    pub fn cast<U>(self) -> PPtr<U> {
        PPtr::from_offset(self.off)
    }
}

// Manual impls: the pointee type parameter must not constrain the
// pointer's own semantics.

impl<T> Clone for PPtr<T> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<T> Copy for PPtr<T> {}

impl<T> PartialEq for PPtr<T> {
    fn eq(&self, other: &Self) -> bool {
        self.off == other.off
    }
}

impl<T> Eq for PPtr<T> {}

impl<T> Default for PPtr<T> {
    fn default() -> Self {
        Self::null()
    }
}

impl<T> fmt::Debug for PPtr<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_null() {
            write!(f, "PPtr(null)")
        } else {
            write!(f, "PPtr({:#x})", self.off)
        }
    }
}

impl<T> Persist for PPtr<T> {
    const SIZE: usize = 8;

    fn store(&self, buf: &mut [u8]) {
        self.off.store(buf);
    }

    fn load(buf: &[u8]) -> Self {
        Self::from_offset(u64::load(buf))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn null_is_offset_zero() {
        let p: PPtr<u64> = PPtr::null();
        assert!(p.is_null());
        assert_eq!(p.offset(), 0);
        assert_eq!(p, PPtr::default());
    }

    #[test]
    fn cast_preserves_offset() {
        let p: PPtr<u64> = PPtr::from_offset(4096);
        let q: PPtr<u8> = p.cast();
        assert_eq!(q.offset(), 4096);
    }

    #[test]
    fn persist_round_trip() {
        let p: PPtr<i32> = PPtr::from_offset(0xABCD);
        let mut buf = [0u8; 8];
        p.store(&mut buf);
        assert_eq!(PPtr::<i32>::load(&buf), p);
    }

    #[test]
    fn debug_marks_null() {
        let p: PPtr<u8> = PPtr::null();
        assert_eq!(format!("{p:?}"), "PPtr(null)");
        let q: PPtr<u8> = PPtr::from_offset(0x1000);
        assert_eq!(format!("{q:?}"), "PPtr(0x1000)");
    }
}
