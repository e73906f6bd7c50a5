//! Filepath: src/tree/diag.rs
//!
//! Read-only diagnostic walks.
//!
//! Neither walk serializes against mutators: they observe whatever
//! interleaving of committed CAS operations happens to be visible, which
//! is exactly the consistency every reader gets. Both are recursive; the
//! recursion depth is bounded by the key length, not the node count.

use std::fmt;

use crate::fam;
use crate::gptr::{Gptr, TagGptr};
use crate::mem::{Heap, MemoryManager};
use crate::node::{FANOUT, NODE_SIZE};
use crate::tree::RadixTree;

/// Node and value counts for one tree level.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct LevelStats {
    /// Nodes at this depth.
    pub nodes: u64,
    /// Nodes at this depth with a live value.
    pub values: u64,
}

/// Structural statistics from a full walk.
#[derive(Clone, Debug, Default)]
pub struct TreeStats {
    /// Deepest level that holds a node (the root is level 0).
    pub depth: usize,
    /// Total node count, root included.
    pub nodes: u64,
    /// Total live value count.
    pub values: u64,
    /// Per-level breakdown, indexed by depth.
    pub levels: Vec<LevelStats>,
    /// Size of one node record in bytes.
    pub node_size: usize,
}

impl fmt::Display for TreeStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Depth {}", self.depth)?;
        writeln!(f, "Values {}", self.values)?;
        writeln!(f, "Nodes {}", self.nodes)?;
        writeln!(f, "Node size {}", self.node_size)?;
        for (level, stats) in self.levels.iter().enumerate() {
            writeln!(f, "Level {level}")?;
            writeln!(f, "\tNodes {}", stats.nodes)?;
            writeln!(f, "\tValues {}", stats.values)?;
        }
        Ok(())
    }
}

impl<M: MemoryManager, H: Heap> RadixTree<M, H> {
    /// Invoke `f` once per live value: key bytes and the value's address.
    ///
    /// Visits keys in lexicographic order. Tombstoned and never-set nodes
    /// are walked through but not reported.
    pub fn list<F: FnMut(&[u8], Gptr)>(&self, mut f: F) {
        self.list_from(self.get_root(), &mut f);
    }

    fn list_from<F: FnMut(&[u8], Gptr)>(&self, gptr: Gptr, f: &mut F) {
        if gptr.is_null() {
            return;
        }

        let n = self.node(gptr);
        let (bytes, len) = n.as_bytes();
        fam::invalidate(bytes, len);

        let value = TagGptr::from_bits(fam::load128(n.value_cell()));
        if value.is_valid() {
            f(n.prefix(), value.gptr());
        }

        for b in 0..FANOUT {
            #[allow(clippy::cast_possible_truncation)]
            let child = Gptr::new(fam::load64(n.child(b as u8)));
            self.list_from(child, f);
        }
    }

    /// Walk the whole tree and accumulate structural statistics.
    #[must_use]
    pub fn structure(&self) -> TreeStats {
        let mut stats = TreeStats {
            node_size: NODE_SIZE,
            ..TreeStats::default()
        };
        self.structure_from(self.get_root(), 0, &mut stats);
        stats
    }

    fn structure_from(&self, gptr: Gptr, level: usize, stats: &mut TreeStats) {
        if gptr.is_null() {
            return;
        }

        let n = self.node(gptr);
        let (bytes, len) = n.as_bytes();
        fam::invalidate(bytes, len);

        if stats.levels.len() <= level {
            stats.levels.resize(level + 1, LevelStats::default());
        }
        stats.levels[level].nodes += 1;
        stats.nodes += 1;
        stats.depth = stats.depth.max(level);

        let value = TagGptr::from_bits(fam::load128(n.value_cell()));
        if value.is_valid() {
            stats.levels[level].values += 1;
            stats.values += 1;
        }

        for b in 0..FANOUT {
            #[allow(clippy::cast_possible_truncation)]
            let child = Gptr::new(fam::load64(n.child(b as u8)));
            self.structure_from(child, level + 1, stats);
        }
    }
}

// ============================================================================
//  Tests
// ============================================================================
