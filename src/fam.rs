//! Filepath: src/fam.rs
//!
//! The atomic-primitive trust boundary.
//!
//! Every access to memory that another thread or process may be writing —
//! child pointer slots and value cells — goes through the five operations
//! in this module. Direct loads and stores of that memory are forbidden
//! everywhere else in the crate.
//!
//! With the `pmem` feature the [`persist`] and [`invalidate`] barriers emit
//! real cache-line flushes so that stores reach the persistence domain
//! before a pointer swing publishes them, and so that loads observe writes
//! made by other nodes on the fabric. Without the feature, persist is a
//! no-op and invalidate collapses to the ordinary atomic load that follows
//! it; the algorithm is identical in both modes.

use std::sync::atomic::{AtomicU64, Ordering};

use portable_atomic::AtomicU128;

/// 8-byte compare-and-store. Returns the value actually observed in the
/// slot: equal to `expected` iff the store took effect.
#[inline]
pub fn cas64(slot: &AtomicU64, expected: u64, new: u64) -> u64 {
    match slot.compare_exchange(expected, new, Ordering::AcqRel, Ordering::Acquire) {
        Ok(observed) | Err(observed) => observed,
    }
}

/// Atomic 8-byte read of a child pointer slot.
#[inline]
pub fn load64(slot: &AtomicU64) -> u64 {
    slot.load(Ordering::Acquire)
}

/// 16-byte compare-and-store on a value cell. Returns the 128-bit word
/// actually observed: equal to `expected` iff the store took effect.
///
/// This must be a genuine 16-byte atomic — both halves of the cell move
/// together. Splitting it into two 8-byte operations would break the
/// linearization of value updates.
#[inline]
pub fn cas128(cell: &AtomicU128, expected: u128, new: u128) -> u128 {
    match cell.compare_exchange(expected, new, Ordering::AcqRel, Ordering::Acquire) {
        Ok(observed) | Err(observed) => observed,
    }
}

/// Atomic 16-byte read of a value cell.
#[inline]
pub fn load128(cell: &AtomicU128) -> u128 {
    cell.load(Ordering::Acquire)
}

/// Flush the cache lines covering `[addr, addr + len)` to the persistence
/// domain and fence. Called on a fully staged node before the CAS that
/// makes it reachable.
#[cfg(all(feature = "pmem", target_arch = "x86_64"))]
#[inline]
pub fn persist(addr: *const u8, len: usize) {
    flush_lines(addr, len);
}

/// Evict the cache lines covering `[addr, addr + len)` so that subsequent
/// loads observe writes made from other cache domains.
#[cfg(all(feature = "pmem", target_arch = "x86_64"))]
#[inline]
pub fn invalidate(addr: *const u8, len: usize) {
    flush_lines(addr, len);
}

#[cfg(all(feature = "pmem", target_arch = "x86_64"))]
fn flush_lines(addr: *const u8, len: usize) {
    use std::arch::x86_64::{_mm_clflush, _mm_sfence};

    const LINE: usize = 64;

    let start = addr as usize & !(LINE - 1);
    let end = addr as usize + len;
    let mut line = start;
    while line < end {
        // SAFETY: clflush requires only that the address be mapped; callers
        // pass ranges inside live node records.
        unsafe { _mm_clflush(line as *const u8) };
        line += LINE;
    }
    // SAFETY: sfence has no memory-safety preconditions.
    unsafe { _mm_sfence() };
}

/// Flush barrier; compiled out in volatile mode.
#[cfg(not(all(feature = "pmem", target_arch = "x86_64")))]
#[inline]
pub fn persist(_addr: *const u8, _len: usize) {}

/// Eviction barrier; compiled out in volatile mode, where cache coherence
/// already makes the following atomic load sufficient.
#[cfg(not(all(feature = "pmem", target_arch = "x86_64")))]
#[inline]
pub fn invalidate(_addr: *const u8, _len: usize) {}

// ============================================================================
//  Tests
// ============================================================================
