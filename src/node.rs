//! Filepath: src/node.rs
//!
//! The fixed-size tree node record.
//!
//! Every node stores the *full* key of which it owns a prefix, the length
//! of that prefix, a 256-way child pointer array indexed by the byte that
//! follows the prefix, and one tagged value cell. The record layout is
//! `#[repr(C)]` and compile-time asserted because the same bytes are
//! interpreted by every process attached to the region.
//!
//! A node goes through two phases:
//!
//! 1. **Staging** — freshly allocated, reachable only by the thread that
//!    allocated it. Mutated through `&mut self` accessors, then persisted.
//! 2. **Published** — a CAS made it reachable. From now on the key bytes
//!    and prefix length are immutable; only the child slots and the value
//!    cell change, and only through the atomics in [`fam`](crate::fam).

use std::mem::{align_of, offset_of, size_of};
use std::sync::atomic::AtomicU64;

use portable_atomic::AtomicU128;

use crate::gptr::{Gptr, TagGptr};

/// Maximum key length in bytes. Keys are 1..=`MAX_KEY_LEN` bytes long.
pub const MAX_KEY_LEN: usize = 40;

/// Child fanout: one slot per possible next byte.
pub const FANOUT: usize = 256;

/// Size of one node record in the shared region.
pub const NODE_SIZE: usize = size_of::<Node>();

/// One radix-tree node.
///
/// `key[0..prefix_size]` is the key this node stands for; `child[b]` leads
/// to the subtree of keys extending that prefix with byte `b`; `value` is
/// valid iff a user value is bound to exactly `key[0..prefix_size]`.
#[repr(C, align(16))]
pub struct Node {
    key: [u8; MAX_KEY_LEN],
    prefix_size: u64,
    children: [AtomicU64; FANOUT],
    value: AtomicU128,
}

// The layout is shared between processes: size, alignment and field offsets
// must never drift.
const _: () = assert!(size_of::<Node>() == 2112);
const _: () = assert!(align_of::<Node>() == 16);
const _: () = assert!(offset_of!(Node, prefix_size) == MAX_KEY_LEN);
const _: () = assert!(offset_of!(Node, children) == MAX_KEY_LEN + 8);
const _: () = assert!(offset_of!(Node, value) == MAX_KEY_LEN + 8 + FANOUT * 8);
const _: () = assert!(offset_of!(Node, value) % 16 == 0);

impl Node {
    // ========================================================================
    //  Published reads
    // ========================================================================

    /// Length of the key prefix this node owns.
    ///
    /// Immutable once the node is published.
    #[inline]
    #[must_use]
    #[allow(clippy::cast_possible_truncation)]
    pub fn prefix_size(&self) -> usize {
        self.prefix_size as usize
    }

    /// The key bytes this node owns: `key[0..prefix_size]`.
    #[inline]
    #[must_use]
    pub fn prefix(&self) -> &[u8] {
        &self.key[..self.prefix_size()]
    }

    /// One byte of the stored key buffer. `i` may exceed `prefix_size` while
    /// a writer compares its own longer key against this node.
    #[inline]
    #[must_use]
    pub fn key_byte(&self, i: usize) -> u8 {
        self.key[i]
    }

    /// The child slot for keys whose next byte is `b`.
    #[inline]
    #[must_use]
    pub fn child(&self, b: u8) -> &AtomicU64 {
        &self.children[b as usize]
    }

    /// The tagged value cell.
    #[inline]
    #[must_use]
    pub fn value_cell(&self) -> &AtomicU128 {
        &self.value
    }

    /// The region of this node that remote writers mutate after publication:
    /// the child array plus the value cell. This is what a reader must
    /// invalidate before loading.
    #[inline]
    #[must_use]
    pub fn mutable_tail(&self) -> (*const u8, usize) {
        let start: *const u8 = std::ptr::from_ref(&self.children).cast();
        (start, size_of::<[AtomicU64; FANOUT]>() + size_of::<AtomicU128>())
    }

    /// The whole record, for persist after staging and for the diagnostic
    /// walks that refresh everything at once.
    #[inline]
    #[must_use]
    pub fn as_bytes(&self) -> (*const u8, usize) {
        (std::ptr::from_ref(self).cast(), NODE_SIZE)
    }

    // ========================================================================
    //  Staging writes (node not yet published)
    // ========================================================================

    /// Copy `key` into the key buffer. The prefix length is set separately
    /// because a split node keeps the full key and finalizes its prefix
    /// length only right before each pointer-swing attempt.
    #[inline]
    pub fn set_key(&mut self, key: &[u8]) {
        self.key[..key.len()].copy_from_slice(key);
    }

    /// Set the owned prefix length.
    #[inline]
    pub fn set_prefix_size(&mut self, len: usize) {
        self.prefix_size = len as u64;
    }

    /// Null out every child slot.
    #[inline]
    pub fn clear_children(&mut self) {
        for slot in &mut self.children {
            *slot.get_mut() = 0;
        }
    }

    /// Point one child slot at `target`.
    #[inline]
    pub fn set_child(&mut self, b: u8, target: Gptr) {
        *self.children[b as usize].get_mut() = target.raw();
    }

    /// Store the value cell.
    #[inline]
    pub fn set_value(&mut self, value: TagGptr) {
        *self.value.get_mut() = value.to_bits();
    }
}

// ============================================================================
//  Tests
// ============================================================================
