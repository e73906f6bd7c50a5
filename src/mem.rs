//! Filepath: src/mem.rs
//!
//! External-collaborator interfaces: address translation and node storage.
//!
//! The tree itself never owns the memory its nodes live in. A
//! [`MemoryManager`] turns a [`Gptr`] into a process-local address and a
//! [`Heap`] hands out and reclaims node-sized blocks inside the shared
//! region. Production deployments supply fabric-attached implementations;
//! [`ProcessMemory`] and [`ProcessHeap`] provide the volatile in-process
//! pair used by tests, benches and single-node deployments.

use std::alloc::{alloc_zeroed, dealloc, Layout};
use std::collections::HashMap;

use parking_lot::Mutex;

use crate::gptr::Gptr;

// ============================================================================
//  Traits
// ============================================================================

/// Translates global pointers to process-local addresses.
///
/// # Safety
///
/// Implementations must guarantee that for every `Gptr` handed out by the
/// cooperating [`Heap`] and not yet freed, `to_local` returns a pointer to
/// the same, correctly-aligned block on every call, and that the mapping
/// stays valid for the lifetime of the manager. The tree dereferences the
/// returned pointers.
pub unsafe trait MemoryManager: Send + Sync {
    /// Translate `gptr` to a local address. `gptr` is non-null.
    fn to_local(&self, gptr: Gptr) -> *mut u8;
}

/// Allocates and frees node records inside the shared region.
///
/// Implementations must be thread-safe; allocation failure is reported as
/// [`Gptr::NULL`] and is retried by the caller.
pub trait Heap: Send + Sync {
    /// Allocate `size` bytes, 16-byte aligned. Returns [`Gptr::NULL`] when
    /// the region is exhausted.
    fn alloc(&self, size: usize) -> Gptr;

    /// Free a block previously returned by [`alloc`](Heap::alloc).
    fn free(&self, gptr: Gptr);
}

// Shared handles delegate, so one heap can back several trees.

unsafe impl<M: MemoryManager> MemoryManager for std::sync::Arc<M> {
    #[inline]
    fn to_local(&self, gptr: Gptr) -> *mut u8 {
        (**self).to_local(gptr)
    }
}

impl<H: Heap> Heap for std::sync::Arc<H> {
    #[inline]
    fn alloc(&self, size: usize) -> Gptr {
        (**self).alloc(size)
    }

    #[inline]
    fn free(&self, gptr: Gptr) {
        (**self).free(gptr)
    }
}

// ============================================================================
//  In-process implementations
// ============================================================================

/// Identity translation: the global address *is* the local address.
///
/// Pairs with [`ProcessHeap`] for volatile single-process use.
#[derive(Clone, Copy, Debug, Default)]
pub struct ProcessMemory;

// SAFETY: ProcessHeap hands out stable `std::alloc` blocks and identity
// translation returns them unchanged, so the contract holds as long as the
// backing heap is alive — which the owning tree guarantees.
unsafe impl MemoryManager for ProcessMemory {
    #[inline]
    fn to_local(&self, gptr: Gptr) -> *mut u8 {
        gptr.raw() as *mut u8
    }
}

/// Volatile in-process node storage.
///
/// Blocks come from the global allocator, zeroed and 16-byte aligned, and
/// are tracked so that anything not explicitly freed is released when the
/// heap drops. The tracking table is the only lock in the crate and is
/// never touched on a lookup path.
#[derive(Default)]
pub struct ProcessHeap {
    live: Mutex<HashMap<u64, Layout>>,
}

impl ProcessHeap {
    /// Create an empty heap.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of live allocations.
    #[must_use]
    pub fn live_blocks(&self) -> usize {
        self.live.lock().len()
    }
}

impl Heap for ProcessHeap {
    fn alloc(&self, size: usize) -> Gptr {
        let Ok(layout) = Layout::from_size_align(size, 16) else {
            return Gptr::NULL;
        };

        // SAFETY: layout has non-zero size for every caller in this crate;
        // a zero-size request would have failed the layout check above
        // only for pathological alignments, so guard anyway.
        if layout.size() == 0 {
            return Gptr::NULL;
        }
        let ptr = unsafe { alloc_zeroed(layout) };
        if ptr.is_null() {
            return Gptr::NULL;
        }

        let gptr = Gptr::new(ptr as u64);
        self.live.lock().insert(gptr.raw(), layout);
        gptr
    }

    fn free(&self, gptr: Gptr) {
        let layout = self.live.lock().remove(&gptr.raw());
        if let Some(layout) = layout {
            // SAFETY: the block was allocated by us with exactly this layout
            // and removed from the table, so it cannot be freed twice.
            unsafe { dealloc(gptr.raw() as *mut u8, layout) };
        }
    }
}

impl Drop for ProcessHeap {
    fn drop(&mut self) {
        for (raw, layout) in self.live.get_mut().drain() {
            // SAFETY: same provenance as in `free`.
            unsafe { dealloc(raw as *mut u8, layout) };
        }
    }
}

// ============================================================================
//  Tests
// ============================================================================
