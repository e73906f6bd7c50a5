//! Filepath: src/tree.rs
//!
//! The concurrent radix tree.
//!
//! [`RadixTree`] maps byte keys of 1..=[`MAX_KEY_LEN`] bytes to 64-bit
//! opaque value handles held in tagged value cells. All mutation is
//! lock-free: writers race with 8-byte CAS on child pointer slots and
//! 16-byte CAS on value cells, and losers replay from the point of
//! divergence. Readers never wait.
//!
//! # Mutation patterns
//!
//! * **Grow** — the walk for a new key ends on a null child slot; a fully
//!   staged and persisted leaf is CAS'd into that slot.
//! * **Split** — the walk reaches a node whose owned prefix diverges from
//!   the key; a staged intermediate adopts the current node as a child
//!   (plus a new leaf when the key extends past the divergence) and is
//!   CAS'd over it in the parent slot.
//! * **Value swap** — updates and deletes are a single 128-bit CAS on the
//!   value cell, advancing the tag by one. Deletion leaves a tombstone;
//!   nodes are never unlinked, so a `Gptr` to a node stays usable forever.
//!
//! # Crash consistency
//!
//! A staged node is persisted *before* the pointer swing that makes it
//! reachable, so after a crash every reachable node is fully formed.
//! Blocks lost to a losing CAS are freed by the losing thread on its way
//! out; blocks lost to a crash are the heap's to recover.

use std::sync::atomic::AtomicU64;
use std::sync::Arc;

use portable_atomic::AtomicU128;

use crate::fam;
use crate::gptr::{Gptr, TagGptr};
use crate::mem::{Heap, MemoryManager};
use crate::metrics::TreeMetrics;
use crate::node::{Node, MAX_KEY_LEN, NODE_SIZE};
use crate::trace::trace_log;

mod cached;
mod diag;
pub mod scan;

pub use diag::{LevelStats, TreeStats};

/// How many times an exhausted allocation is retried before giving up.
const ALLOC_RETRY_CNT: usize = 10;

// ============================================================================
//  Speculative allocations
// ============================================================================

/// Owns the blocks a writer stages before its pointer swing.
///
/// Each `put` owns at most one speculative leaf and one speculative
/// intermediate. Ownership of a block transfers to the tree on the CAS
/// that publishes it (`commit_*`); anything still owned when the guard
/// drops goes back to the heap. Every exit path therefore leaves each
/// block exactly one of freed or linked.
struct Speculative<'h, H: Heap> {
    heap: &'h H,
    leaf: Option<Gptr>,
    intermediate: Option<Gptr>,
}

impl<'h, H: Heap> Speculative<'h, H> {
    fn new(heap: &'h H) -> Self {
        Self {
            heap,
            leaf: None,
            intermediate: None,
        }
    }

    /// The leaf is now reachable; the tree owns it.
    fn commit_leaf(&mut self) {
        self.leaf = None;
    }

    /// The intermediate is now reachable; the tree owns it.
    fn commit_intermediate(&mut self) {
        self.intermediate = None;
    }

    /// Return both blocks to the heap now instead of at drop. Used before
    /// entering a value-CAS loop that may spin under contention.
    fn release_unused(&mut self) {
        if let Some(gptr) = self.leaf.take() {
            self.heap.free(gptr);
        }
        if let Some(gptr) = self.intermediate.take() {
            self.heap.free(gptr);
        }
    }
}

impl<H: Heap> Drop for Speculative<'_, H> {
    fn drop(&mut self) {
        self.release_unused();
    }
}

// ============================================================================
//  Value-cell swaps
// ============================================================================

/// Install `value` in a cell, advancing the tag, retrying until the CAS
/// lands. Returns `(installed, previous)`.
fn swap_cell(cell: &AtomicU128, value: Gptr) -> (TagGptr, TagGptr) {
    let mut seen = TagGptr::from_bits(fam::load128(cell));
    loop {
        let next = seen.successor(value);
        let observed = TagGptr::from_bits(fam::cas128(cell, seen.to_bits(), next.to_bits()));
        if observed == seen {
            return (next, seen);
        }
        seen = observed;
    }
}

// ============================================================================
//  RadixTree
// ============================================================================

/// A lock-free radix tree over shared (optionally persistent) memory.
///
/// The tree is a handle: all state lives behind the root [`Gptr`], so any
/// number of handles in any number of processes can operate on the same
/// tree as long as they attach compatible [`MemoryManager`] and [`Heap`]
/// implementations.
///
/// # Example
///
/// ```rust
/// use famradix::{Gptr, ProcessHeap, ProcessMemory, RadixTree};
///
/// let tree = RadixTree::new(ProcessMemory, ProcessHeap::new(), None, Gptr::NULL);
///
/// let prev = tree.put(b"car", Gptr::new(0x100), false);
/// assert!(!prev.is_valid());
///
/// let found = tree.get(b"car");
/// assert_eq!(found.gptr(), Gptr::new(0x100));
/// assert_eq!(found.tag(), 0);
/// ```
pub struct RadixTree<M, H> {
    mmgr: M,
    heap: H,
    metrics: Option<Arc<dyn TreeMetrics>>,
    root: Gptr,
}

impl<M: MemoryManager, H: Heap> RadixTree<M, H> {
    /// Attach to an existing tree, or create one.
    ///
    /// With `root == Gptr::NULL` a fresh root (empty prefix, no children,
    /// invalid value) is allocated and persisted; otherwise `root` is
    /// adopted as-is. The root lives for the lifetime of the tree — only
    /// its children and value cell are ever mutated.
    ///
    /// # Panics
    ///
    /// Panics if the heap cannot supply the root node.
    pub fn new(mmgr: M, heap: H, metrics: Option<Arc<dyn TreeMetrics>>, root: Gptr) -> Self {
        let mut tree = Self {
            mmgr,
            heap,
            metrics,
            root,
        };

        if tree.root.is_null() {
            let root = tree.alloc_node();
            // SAFETY: fresh allocation, not yet reachable by anyone.
            let node = unsafe { &mut *tree.node_ptr(root) };
            node.set_prefix_size(0);
            node.clear_children();
            node.set_value(TagGptr::invalid());

            let (bytes, len) = node.as_bytes();
            fam::persist(bytes, len);
            tree.root = root;
        }

        tree
    }

    /// The root pointer: the entire persistent handle of this tree.
    #[inline]
    #[must_use]
    pub fn get_root(&self) -> Gptr {
        self.root
    }

    // ========================================================================
    //  Node access
    // ========================================================================

    #[inline]
    pub(crate) fn node_ptr(&self, gptr: Gptr) -> *mut Node {
        debug_assert!(gptr.is_valid());
        self.mmgr.to_local(gptr).cast()
    }

    #[inline]
    pub(crate) fn node(&self, gptr: Gptr) -> &Node {
        // SAFETY: `gptr` designates a node of this tree (nodes are never
        // freed once published) and the MemoryManager contract keeps the
        // mapping valid and stable while `self` is alive.
        unsafe { &*self.node_ptr(gptr) }
    }

    fn alloc_node(&self) -> Gptr {
        let mut gptr = Gptr::NULL;
        let mut budget = ALLOC_RETRY_CNT;
        while gptr.is_null() && budget > 0 {
            gptr = self.heap.alloc(NODE_SIZE);
            budget -= 1;
        }
        assert!(
            gptr.is_valid(),
            "node allocation failed after {ALLOC_RETRY_CNT} attempts"
        );
        gptr
    }

    // ========================================================================
    //  Lookup
    // ========================================================================

    /// Walk from the root to the node owning exactly `key`.
    ///
    /// Returns the node (if any) and the number of pointer traversals the
    /// walk performed.
    pub(crate) fn locate(&self, key: &[u8]) -> (Option<Gptr>, u64) {
        let mut q = self.root;
        let mut traversals: u64 = 0;

        while q.is_valid() {
            let n = self.node(q);
            let shared = key.len().min(n.prefix_size());
            if key[..shared] != n.prefix()[..shared] {
                return (None, traversals);
            }

            let (tail, tail_len) = n.mutable_tail();
            fam::invalidate(tail, tail_len);

            if n.prefix_size() >= key.len() {
                // Equal: this node owns the key. Longer: the node's key
                // strictly extends ours, and any owner of `key` would have
                // been an ancestor — absent either way.
                if n.prefix_size() == key.len() {
                    return (Some(q), traversals);
                }
                return (None, traversals);
            }

            q = Gptr::new(fam::load64(n.child(key[n.prefix_size()])));
            traversals += 1;
        }

        (None, traversals)
    }

    /// Look up `key`.
    ///
    /// Returns the current `TagGptr` of its value cell — invalid when the
    /// key is absent or tombstoned. Records the traversal count with the
    /// metrics sink when the key's node exists.
    ///
    /// # Panics
    ///
    /// Panics if `key` is empty or longer than [`MAX_KEY_LEN`].
    #[must_use]
    pub fn get(&self, key: &[u8]) -> TagGptr {
        assert_key(key);

        let (found, traversals) = self.locate(key);
        match found {
            Some(q) => {
                let value = TagGptr::from_bits(fam::load128(self.node(q).value_cell()));
                if let Some(metrics) = &self.metrics {
                    metrics.record_pointer_traversals(traversals);
                }
                value
            }
            None => TagGptr::invalid(),
        }
    }

    // ========================================================================
    //  Insert / update
    // ========================================================================

    /// Insert or update `key`.
    ///
    /// With `update` set, the value cell is unconditionally replaced with
    /// `value` (tag advanced by one) and the previous `TagGptr` returned.
    /// Without it, an existing live value is returned untouched; only an
    /// absent or tombstoned key is claimed.
    ///
    /// The returned `TagGptr` is invalid when the key had never been set.
    ///
    /// # Panics
    ///
    /// Panics if `key` is empty or longer than [`MAX_KEY_LEN`], or if the
    /// heap is exhausted beyond the retry budget.
    pub fn put(&self, key: &[u8], value: Gptr, update: bool) -> TagGptr {
        self.upsert(key, value, update).2
    }

    /// The shared insert/update walk behind [`put`](Self::put) and the
    /// cache-consistent variants.
    ///
    /// Returns `(node, installed, previous)`: the node whose value cell
    /// holds the key, the `TagGptr` now in the cell, and the one it
    /// replaced. When an existing live value is kept (`update == false`),
    /// `installed == previous`.
    pub(crate) fn upsert(&self, key: &[u8], value: Gptr, update: bool) -> (Gptr, TagGptr, TagGptr) {
        assert_key(key);

        let mut spec = Speculative::new(&self.heap);
        let mut slot: Option<&AtomicU64> = None;
        let mut q = self.root;
        let mut split_at: usize = 0;
        let mut existing: u8 = 0;
        // Child slots of the staged intermediate written by a previous
        // failed attempt; cleared before re-linking so a later swing cannot
        // publish a stale link.
        let mut staged: Option<(u8, Option<u8>)> = None;

        'retry: loop {
            // Descend to the point of divergence.
            while q.is_valid() {
                let n = self.node(q);
                let shared = key.len().min(n.prefix_size());
                let diverge = (0..shared)
                    .find(|&i| key[i] != n.key_byte(i))
                    .unwrap_or(shared);

                let (tail, tail_len) = n.mutable_tail();
                fam::invalidate(tail, tail_len);

                if diverge < n.prefix_size() {
                    split_at = diverge;
                    existing = n.key_byte(diverge);
                    break;
                }

                if key.len() == diverge {
                    // This node owns exactly `key`.
                    spec.release_unused();

                    let cell = n.value_cell();
                    let mut seen = TagGptr::from_bits(fam::load128(cell));

                    if update {
                        loop {
                            let next = seen.successor(value);
                            let observed = TagGptr::from_bits(fam::cas128(
                                cell,
                                seen.to_bits(),
                                next.to_bits(),
                            ));
                            if observed == seen {
                                return (q, next, seen);
                            }
                            seen = observed;
                        }
                    }

                    if seen.is_valid() {
                        return (q, seen, seen);
                    }

                    // Tombstone: claim it once. Losing the race means the
                    // cell may now be live and owned by another writer, so
                    // replay the whole walk.
                    let next = seen.successor(value);
                    let observed =
                        TagGptr::from_bits(fam::cas128(cell, seen.to_bits(), next.to_bits()));
                    if observed == seen {
                        return (q, next, seen);
                    }
                    slot = None;
                    q = self.root;
                    continue 'retry;
                }

                let s = n.child(key[diverge]);
                q = Gptr::new(fam::load64(s));
                slot = Some(s);
            }

            let Some(parent_slot) = slot else {
                unreachable!("the root owns the empty prefix and never diverges")
            };

            // Grow: the walk ended on a null child slot.
            if q.is_null() {
                let leaf = self.stage_leaf(&mut spec, key, value);
                let seen = Gptr::new(fam::cas64(parent_slot, 0, leaf.raw()));
                if seen.is_null() {
                    trace_log!(node = %leaf, "leaf installed");
                    spec.commit_leaf();
                    return (leaf, TagGptr::new(value, 0), TagGptr::invalid());
                }
                q = seen;
                continue 'retry;
            }

            // Split: `key` and the subtree at `q` share only `key[..split_at]`.
            let inter = self.stage_intermediate(&mut spec, key);
            // SAFETY: the intermediate stays unreachable until the CAS below
            // publishes it, so this thread has exclusive access.
            let inter_node = unsafe { &mut *self.node_ptr(inter) };

            if let Some((kept, grown)) = staged.take() {
                inter_node.set_child(kept, Gptr::NULL);
                if let Some(grown) = grown {
                    inter_node.set_child(grown, Gptr::NULL);
                }
            }

            let carrier = if split_at == key.len() {
                // The intermediate itself owns the key; no extra leaf.
                inter_node.set_value(TagGptr::new(value, 0));
                inter_node.set_prefix_size(split_at);
                inter_node.set_child(existing, q);
                staged = Some((existing, None));
                inter
            } else {
                let leaf = self.stage_leaf(&mut spec, key, value);
                inter_node.set_value(TagGptr::invalid());
                inter_node.set_prefix_size(split_at);
                inter_node.set_child(key[split_at], leaf);
                inter_node.set_child(existing, q);
                staged = Some((existing, Some(key[split_at])));
                leaf
            };

            let (bytes, len) = inter_node.as_bytes();
            fam::persist(bytes, len);

            let seen = Gptr::new(fam::cas64(parent_slot, q.raw(), inter.raw()));
            if seen == q {
                trace_log!(node = %inter, "split installed");
                spec.commit_intermediate();
                if carrier != inter {
                    spec.commit_leaf();
                }
                return (carrier, TagGptr::new(value, 0), TagGptr::invalid());
            }
            q = seen;
        }
    }

    /// Stage (or reuse) the speculative leaf: full key, value at tag 0,
    /// persisted and ready to link.
    fn stage_leaf(&self, spec: &mut Speculative<'_, H>, key: &[u8], value: Gptr) -> Gptr {
        if let Some(leaf) = spec.leaf {
            return leaf;
        }

        let leaf = self.alloc_node();
        // SAFETY: fresh allocation, unreachable from the tree.
        let node = unsafe { &mut *self.node_ptr(leaf) };
        node.set_key(key);
        node.set_prefix_size(key.len());
        node.clear_children();
        node.set_value(TagGptr::new(value, 0));

        let (bytes, len) = node.as_bytes();
        fam::persist(bytes, len);

        spec.leaf = Some(leaf);
        leaf
    }

    /// Stage (or reuse) the speculative intermediate. The full key is
    /// copied up front because the divergence point can move between
    /// failed swing attempts; prefix length, links and value cell are
    /// finalized per attempt.
    fn stage_intermediate(&self, spec: &mut Speculative<'_, H>, key: &[u8]) -> Gptr {
        if let Some(inter) = spec.intermediate {
            return inter;
        }

        let inter = self.alloc_node();
        // SAFETY: fresh allocation, unreachable from the tree.
        let node = unsafe { &mut *self.node_ptr(inter) };
        node.set_key(key);
        node.clear_children();

        spec.intermediate = Some(inter);
        inter
    }

    // ========================================================================
    //  Delete
    // ========================================================================

    /// Delete `key`: replace its value cell with a tombstone (null address,
    /// tag advanced by one) and return the previous `TagGptr`.
    ///
    /// The node is kept — the key remains a traversal path for future
    /// re-insertions, and cache holders can still revalidate by tag.
    /// Returns an invalid `TagGptr` when no node owns the key.
    ///
    /// # Panics
    ///
    /// Panics if `key` is empty or longer than [`MAX_KEY_LEN`].
    pub fn destroy(&self, key: &[u8]) -> TagGptr {
        assert_key(key);

        let (found, _) = self.locate(key);
        match found {
            Some(q) => swap_cell(self.node(q).value_cell(), Gptr::NULL).1,
            None => TagGptr::invalid(),
        }
    }
}

#[inline]
fn assert_key(key: &[u8]) {
    assert!(
        !key.is_empty() && key.len() <= MAX_KEY_LEN,
        "key length must be 1..={MAX_KEY_LEN} bytes, got {}",
        key.len()
    );
}

// ============================================================================
//  Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mem::{ProcessHeap, ProcessMemory};
    use crate::metrics::TraversalHistogram;
    use std::collections::BTreeMap;

    pub(crate) fn test_tree() -> RadixTree<ProcessMemory, ProcessHeap> {
        RadixTree::new(ProcessMemory, ProcessHeap::new(), None, Gptr::NULL)
    }

    /// A distinct, non-null value handle per index.
    pub(crate) fn handle(i: u64) -> Gptr {
        Gptr::new(0x1_0000 + i)
    }

    // ========================================================================
    //  Construction
    // ========================================================================

    #[test]
    fn fresh_tree_has_a_root() {
        let tree = test_tree();
        assert!(tree.get_root().is_valid());
    }

    #[test]
    fn adopting_a_root_shares_the_tree() {
        let heap = std::sync::Arc::new(ProcessHeap::new());

        let first = RadixTree::new(ProcessMemory, std::sync::Arc::clone(&heap), None, Gptr::NULL);
        first.put(b"shared", handle(1), false);

        let second = RadixTree::new(ProcessMemory, heap, None, first.get_root());
        assert_eq!(second.get_root(), first.get_root());
        assert_eq!(second.get(b"shared").gptr(), handle(1));

        second.put(b"more", handle(2), false);
        assert_eq!(first.get(b"more").gptr(), handle(2));
    }

    // ========================================================================
    //  Get
    // ========================================================================

    #[test]
    fn get_on_empty_tree_is_invalid() {
        let tree = test_tree();
        assert!(!tree.get(b"k").is_valid());
        assert!(!tree.get(b"missing").is_valid());
    }

    #[test]
    fn get_records_traversal_histogram() {
        let hist = Arc::new(TraversalHistogram::new());
        let tree = RadixTree::new(
            ProcessMemory,
            ProcessHeap::new(),
            Some(hist.clone()),
            Gptr::NULL,
        );

        tree.put(b"abc", handle(1), false);
        let _ = tree.get(b"abc");

        assert_eq!(hist.total(), 1);
    }

    #[test]
    #[should_panic(expected = "key length")]
    fn get_rejects_empty_key() {
        let tree = test_tree();
        let _ = tree.get(b"");
    }

    #[test]
    #[should_panic(expected = "key length")]
    fn get_rejects_oversized_key() {
        let tree = test_tree();
        let _ = tree.get(&[b'x'; MAX_KEY_LEN + 1]);
    }

    // ========================================================================
    //  Put
    // ========================================================================

    #[test]
    fn put_then_get_round_trip() {
        let tree = test_tree();

        let prev = tree.put(b"hello", handle(7), false);
        assert!(!prev.is_valid());

        let found = tree.get(b"hello");
        assert_eq!(found.gptr(), handle(7));
        assert_eq!(found.tag(), 0);
    }

    #[test]
    fn put_without_update_keeps_existing_value() {
        let tree = test_tree();

        tree.put(b"k", handle(1), false);
        let prev = tree.put(b"k", handle(2), false);

        assert_eq!(prev.gptr(), handle(1));
        assert_eq!(tree.get(b"k").gptr(), handle(1));
        assert_eq!(tree.get(b"k").tag(), 0);
    }

    #[test]
    fn put_with_update_replaces_and_bumps_tag() {
        let tree = test_tree();

        tree.put(b"k", handle(1), false);
        let prev = tree.put(b"k", handle(2), true);

        assert_eq!(prev.gptr(), handle(1));
        assert_eq!(prev.tag(), 0);

        let found = tree.get(b"k");
        assert_eq!(found.gptr(), handle(2));
        assert_eq!(found.tag(), 1);
    }

    #[test]
    fn repeated_updates_count_tags_from_zero() {
        let tree = test_tree();

        tree.put(b"key", handle(0), true);
        tree.put(b"key", handle(1), true);
        tree.put(b"key", handle(2), true);

        assert_eq!(tree.get(b"key").tag(), 2);
        assert_eq!(tree.get(b"key").gptr(), handle(2));
    }

    #[test]
    fn sibling_keys_split_a_leaf() {
        let tree = test_tree();

        tree.put(b"cat", handle(1), false);
        tree.put(b"car", handle(2), false);

        assert_eq!(tree.get(b"car").gptr(), handle(2));
        assert_eq!(tree.get(b"cat").gptr(), handle(1));
        assert!(!tree.get(b"ca").is_valid());
        assert!(!tree.get(b"c").is_valid());
    }

    #[test]
    fn prefix_key_lands_on_the_intermediate() {
        let tree = test_tree();

        tree.put(b"abcd", handle(1), false);
        tree.put(b"abef", handle(2), false);
        tree.put(b"ab", handle(3), false);

        assert_eq!(tree.get(b"abcd").gptr(), handle(1));
        assert_eq!(tree.get(b"abef").gptr(), handle(2));
        assert_eq!(tree.get(b"ab").gptr(), handle(3));
    }

    #[test]
    fn extending_key_grows_below_existing_leaf() {
        let tree = test_tree();

        tree.put(b"ab", handle(1), false);
        tree.put(b"abcd", handle(2), false);

        assert_eq!(tree.get(b"ab").gptr(), handle(1));
        assert_eq!(tree.get(b"ab").tag(), 0);
        assert_eq!(tree.get(b"abcd").gptr(), handle(2));
    }

    #[test]
    fn key_length_boundaries() {
        let tree = test_tree();

        let short = [0x7fu8; 1];
        let long = [b'z'; MAX_KEY_LEN];

        tree.put(&short, handle(1), false);
        tree.put(&long, handle(2), false);

        assert_eq!(tree.get(&short).gptr(), handle(1));
        assert_eq!(tree.get(&long).gptr(), handle(2));
    }

    #[test]
    fn binary_keys_with_null_bytes() {
        let tree = test_tree();

        let keys: [&[u8]; 4] = [&[0x00], &[0x00, 0x00], &[0x00, 0xFF], &[0xFF, 0x00, 0x01]];
        for (i, key) in keys.iter().enumerate() {
            tree.put(key, handle(i as u64), false);
        }
        for (i, key) in keys.iter().enumerate() {
            assert_eq!(tree.get(key).gptr(), handle(i as u64), "key {key:?}");
        }
    }

    #[test]
    fn speculative_blocks_are_returned_on_plain_update() {
        let heap = std::sync::Arc::new(ProcessHeap::new());
        let tree = RadixTree::new(ProcessMemory, std::sync::Arc::clone(&heap), None, Gptr::NULL);

        tree.put(b"k", handle(1), false);
        let after_insert = heap.live_blocks();

        // Updates allocate nothing and leak nothing.
        tree.put(b"k", handle(2), true);
        tree.put(b"k", handle(3), true);
        assert_eq!(heap.live_blocks(), after_insert);
    }

    // ========================================================================
    //  Destroy
    // ========================================================================

    #[test]
    fn destroy_leaves_a_tombstone() {
        let tree = test_tree();

        tree.put(b"k", handle(1), false);
        let prev = tree.destroy(b"k");

        assert_eq!(prev.gptr(), handle(1));
        assert_eq!(prev.tag(), 0);

        let after = tree.get(b"k");
        assert!(!after.is_valid());
        assert_eq!(after.tag(), 1);
    }

    #[test]
    fn destroy_missing_key_is_invalid() {
        let tree = test_tree();
        assert!(!tree.destroy(b"ghost").is_valid());

        tree.put(b"real", handle(1), false);
        assert!(!tree.destroy(b"ghost").is_valid());
        assert_eq!(tree.get(b"real").gptr(), handle(1));
    }

    #[test]
    fn tombstone_reinsert_advances_the_tag() {
        let tree = test_tree();

        tree.put(b"k", handle(1), false); // tag 0
        tree.destroy(b"k"); // tag 1

        let reclaimed = tree.put(b"k", handle(2), false);
        assert!(!reclaimed.is_valid());
        assert_eq!(reclaimed.tag(), 1);

        let found = tree.get(b"k");
        assert_eq!(found.gptr(), handle(2));
        assert_eq!(found.tag(), 2);
    }

    #[test]
    fn destroy_twice_keeps_bumping() {
        let tree = test_tree();

        tree.put(b"k", handle(1), false); // tag 0
        tree.destroy(b"k"); // tag 1

        let prev = tree.destroy(b"k"); // tag 2, previous was the tombstone
        assert!(!prev.is_valid());
        assert_eq!(prev.tag(), 1);
        assert_eq!(tree.get(b"k").tag(), 2);
    }

    #[test]
    fn full_lifecycle_tag_sequence() {
        let tree = test_tree();

        tree.put(b"k", handle(1), false); // tag 0
        tree.put(b"k", handle(2), true); // tag 1
        tree.destroy(b"k"); // tag 2

        let end = tree.get(b"k");
        assert!(!end.is_valid());
        assert_eq!(end.tag(), 2);
    }

    // ========================================================================
    //  Differential
    // ========================================================================

    #[test]
    fn differential_against_btreemap() {
        let tree = test_tree();
        let mut oracle: BTreeMap<Vec<u8>, u64> = BTreeMap::new();

        let keys: [&[u8]; 10] = [
            b"a", b"ab", b"abc", b"abd", b"b", b"ba", b"cat", b"car", b"card", b"care",
        ];

        for (i, key) in keys.iter().enumerate() {
            let i = i as u64;
            tree.put(key, handle(i), true);
            oracle.insert(key.to_vec(), i);
        }

        // Overwrite a few.
        for (i, key) in keys.iter().enumerate().step_by(3) {
            let i = i as u64 + 100;
            tree.put(key, handle(i), true);
            oracle.insert(key.to_vec(), i);
        }

        // Delete a few others.
        for key in keys.iter().skip(1).step_by(3) {
            tree.destroy(key);
            oracle.remove(&key.to_vec());
        }

        for key in &keys {
            let got = tree.get(key);
            match oracle.get(&key.to_vec()) {
                Some(&i) => assert_eq!(got.gptr(), handle(i), "key {key:?}"),
                None => assert!(!got.is_valid(), "key {key:?}"),
            }
        }
    }
}
