//! Filepath: src/tree/cached.rs
//!
//! Cache-consistent operation variants.
//!
//! External DRAM caches want to skip the tree walk: the key-addressed
//! variants here behave like their plain counterparts but additionally
//! return the [`Gptr`] of the node whose value cell they touched. Because
//! nodes are never moved or freed, that pointer can be stored and used
//! later with the node-addressed variants, which go straight to the value
//! cell. Every write advances the cell's tag, so a cache holder compares
//! tags to detect that the value was rewritten (or deleted and
//! re-inserted) behind its back.

use crate::fam;
use crate::gptr::{Gptr, TagGptr};
use crate::mem::{Heap, MemoryManager};
use crate::tree::{swap_cell, RadixTree};

impl<M: MemoryManager, H: Heap> RadixTree<M, H> {
    // ========================================================================
    //  Key-addressed
    // ========================================================================

    /// Insert or update `key`, always replacing the value.
    ///
    /// Returns `(node, installed, previous)`; `node` is the leaf (or
    /// intermediate) owning the key and is stable for the life of the
    /// tree, so callers may cache it for [`put_at`](Self::put_at) /
    /// [`get_at`](Self::get_at) / [`destroy_at`](Self::destroy_at).
    ///
    /// # Panics
    ///
    /// Panics if `key` is empty or longer than
    /// [`MAX_KEY_LEN`](crate::node::MAX_KEY_LEN), or on heap exhaustion.
    pub fn put_cached(&self, key: &[u8], value: Gptr) -> (Gptr, TagGptr, TagGptr) {
        self.upsert(key, value, true)
    }

    /// Look up `key`, also returning the owning node.
    ///
    /// `None` when no node owns the key. When a node exists its `TagGptr`
    /// may still be an invalid tombstone — the node pointer is cacheable
    /// either way.
    ///
    /// # Panics
    ///
    /// Panics if `key` is empty or longer than
    /// [`MAX_KEY_LEN`](crate::node::MAX_KEY_LEN).
    #[must_use]
    pub fn get_cached(&self, key: &[u8]) -> Option<(Gptr, TagGptr)> {
        super::assert_key(key);

        let (found, _) = self.locate(key);
        let q = found?;
        let value = TagGptr::from_bits(fam::load128(self.node(q).value_cell()));
        Some((q, value))
    }

    /// Delete `key`, also returning the owning node.
    ///
    /// Returns `(node, installed, previous)` where `installed` is the
    /// tombstone now in the cell. `None` when no node owns the key.
    ///
    /// # Panics
    ///
    /// Panics if `key` is empty or longer than
    /// [`MAX_KEY_LEN`](crate::node::MAX_KEY_LEN).
    pub fn destroy_cached(&self, key: &[u8]) -> Option<(Gptr, TagGptr, TagGptr)> {
        super::assert_key(key);

        let (found, _) = self.locate(key);
        let q = found?;
        let (installed, previous) = swap_cell(self.node(q).value_cell(), Gptr::NULL);
        Some((q, installed, previous))
    }

    // ========================================================================
    //  Node-addressed
    // ========================================================================

    /// Replace the value cell of the node at `node`, skipping the walk.
    ///
    /// Returns `(installed, previous)`.
    ///
    /// # Safety
    ///
    /// `node` must be a node of this tree, previously returned by one of
    /// the key-addressed operations on a tree sharing this root. Nodes are
    /// never freed or moved, so any such pointer stays live; anything else
    /// is undefined behavior.
    pub unsafe fn put_at(&self, node: Gptr, value: Gptr) -> (TagGptr, TagGptr) {
        assert!(node.is_valid(), "null node pointer");

        let n = self.node(node);
        let (cell_ptr, cell_len) = cell_region(n.value_cell());
        fam::invalidate(cell_ptr, cell_len);
        swap_cell(n.value_cell(), value)
    }

    /// Read the value cell of the node at `node`, skipping the walk.
    ///
    /// # Safety
    ///
    /// Same contract as [`put_at`](Self::put_at).
    #[must_use]
    pub unsafe fn get_at(&self, node: Gptr) -> TagGptr {
        assert!(node.is_valid(), "null node pointer");

        let n = self.node(node);
        let (cell_ptr, cell_len) = cell_region(n.value_cell());
        fam::invalidate(cell_ptr, cell_len);
        TagGptr::from_bits(fam::load128(n.value_cell()))
    }

    /// Tombstone the value cell of the node at `node`, skipping the walk.
    ///
    /// Returns `(installed, previous)`.
    ///
    /// # Safety
    ///
    /// Same contract as [`put_at`](Self::put_at).
    pub unsafe fn destroy_at(&self, node: Gptr) -> (TagGptr, TagGptr) {
        assert!(node.is_valid(), "null node pointer");

        let n = self.node(node);
        let (cell_ptr, cell_len) = cell_region(n.value_cell());
        fam::invalidate(cell_ptr, cell_len);
        swap_cell(n.value_cell(), Gptr::NULL)
    }
}

#[inline]
fn cell_region(cell: &portable_atomic::AtomicU128) -> (*const u8, usize) {
    (
        std::ptr::from_ref(cell).cast(),
        std::mem::size_of::<portable_atomic::AtomicU128>(),
    )
}

// ============================================================================
//  Tests
// ============================================================================
