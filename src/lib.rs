//! # famradix
//!
//! A concurrent, persistent, byte-oriented radix tree for shared
//! fabric-attached / non-volatile memory.
//!
//! The tree maps byte keys of 1..=[`MAX_KEY_LEN`] bytes to 64-bit opaque
//! value handles. Any number of threads — across processes attached to
//! the same region — mutate it without locks, coordinating only through
//! 64-bit CAS on child pointers and 128-bit CAS on tagged value cells,
//! plus explicit cache-line persist/invalidate barriers for crash
//! consistency.
//!
//! ## Design
//!
//! - 256-way fanout with per-node prefix storage: traversals are few
//!   (about one per key byte consumed) at the cost of ~2 KiB per node.
//! - Every value cell carries a monotonic 64-bit tag, advanced by one on
//!   each successful write — updates linearize per key, and external DRAM
//!   caches detect replacement even across a delete/reinsert cycle.
//! - Nodes are persisted before the pointer swing that publishes them and
//!   are never moved or freed afterwards; deletion only tombstones the
//!   value cell, so a cached node pointer stays usable forever.
//! - Readers never wait; writers resolve contention by unbounded CAS
//!   retry (lock-free, not wait-free).
//!
//! ## Example
//!
//! ```rust
//! use famradix::{Gptr, ProcessHeap, ProcessMemory, RadixTree, RangeScan, ScanBound};
//!
//! let tree = RadixTree::new(ProcessMemory, ProcessHeap::new(), None, Gptr::NULL);
//!
//! tree.put(b"cat", Gptr::new(0x100), false);
//! tree.put(b"car", Gptr::new(0x200), false);
//!
//! let mut iter = RangeScan::new();
//! let mut keys = Vec::new();
//! let mut next = tree.scan(
//!     &mut iter,
//!     ScanBound::inclusive(b"c"),
//!     ScanBound::inclusive(b"cz"),
//! );
//! while let Some(entry) = next {
//!     keys.push(entry.key);
//!     next = tree.get_next(&mut iter);
//! }
//! assert_eq!(keys, vec![b"car".to_vec(), b"cat".to_vec()]);
//! ```
//!
//! ## Features
//!
//! - `pmem` — persist/invalidate become real cache-line flushes for
//!   persistent-memory targets; the algorithm is unchanged.
//! - `tracing` — internal trace points forward to the `tracing` crate.

#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod fam;
pub mod gptr;
pub mod mem;
pub mod metrics;
pub mod node;
mod trace;
pub mod tree;

pub use gptr::{Gptr, TagGptr};
pub use mem::{Heap, MemoryManager, ProcessHeap, ProcessMemory};
pub use metrics::{TraversalHistogram, TreeMetrics};
pub use node::{FANOUT, MAX_KEY_LEN, NODE_SIZE};
pub use tree::scan::{RangeScan, ScanBound, ScanEntry, OPEN_BOUNDARY_KEY};
pub use tree::{LevelStats, RadixTree, TreeStats};
