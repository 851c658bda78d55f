//! Trie statistics.

use core::fmt;
use core::mem::size_of;

use crate::trie::node::{LargeNode, MediumNode, OverflowNode, SmallNode};
use crate::trie::types::Trie;

/// A snapshot of trie statistics.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TrieStats {
    /// Number of live ngrams.
    pub live_ngrams: usize,
    /// Small node slots in use, including abandoned ones.
    pub small_nodes: usize,
    /// Medium node slots in use, including abandoned ones.
    pub medium_nodes: usize,
    /// Large node slots in use, including the root.
    pub large_nodes: usize,
    /// Overflow nodes.
    pub overflow_nodes: usize,
    /// Keys stored in overflow maps.
    pub overflow_keys: usize,
    /// Small nodes promoted to medium.
    pub promotions_to_medium: u64,
    /// Medium nodes promoted to large.
    pub promotions_to_large: u64,
    /// Suffixes split by an insert.
    pub suffix_splits: u64,
    /// Nodes created from compressed suffix bytes.
    pub materialized_nodes: u64,
    /// Bytes held by the suffix arena.
    pub suffix_bytes: usize,
    /// Blocks allocated across all node arenas.
    pub arena_blocks: usize,
}

impl Trie {
    /// Returns trie statistics.
    pub fn stats(&self) -> TrieStats {
        let mut overflow_keys = 0;
        for slot in 0..self.overflow.len() {
            overflow_keys += self.overflow.get(slot).len();
        }

        TrieStats {
            live_ngrams: self.live,
            small_nodes: self.small.len(),
            medium_nodes: self.medium.len(),
            large_nodes: self.large.len(),
            overflow_nodes: self.overflow.len(),
            overflow_keys,
            promotions_to_medium: self.counters.promotions_to_medium,
            promotions_to_large: self.counters.promotions_to_large,
            suffix_splits: self.counters.splits,
            materialized_nodes: self.counters.materialized,
            suffix_bytes: self.suffixes.len(),
            arena_blocks: self.small.num_blocks()
                + self.medium.num_blocks()
                + self.large.num_blocks()
                + self.overflow.num_blocks(),
        }
    }
}

impl TrieStats {
    /// Total node slots across all arenas.
    pub fn total_nodes(&self) -> usize {
        self.small_nodes + self.medium_nodes + self.large_nodes + self.overflow_nodes
    }

    /// Returns approximate memory usage in bytes, excluding overflow map keys.
    pub fn memory_usage_bytes(&self) -> usize {
        self.small_nodes * size_of::<SmallNode>()
            + self.medium_nodes * size_of::<MediumNode>()
            + self.large_nodes * size_of::<LargeNode>()
            + self.overflow_nodes * size_of::<OverflowNode>()
            + self.suffix_bytes
    }

    /// Adds another trie's statistics into this one.
    pub fn merge(&mut self, other: &TrieStats) {
        self.live_ngrams += other.live_ngrams;
        self.small_nodes += other.small_nodes;
        self.medium_nodes += other.medium_nodes;
        self.large_nodes += other.large_nodes;
        self.overflow_nodes += other.overflow_nodes;
        self.overflow_keys += other.overflow_keys;
        self.promotions_to_medium += other.promotions_to_medium;
        self.promotions_to_large += other.promotions_to_large;
        self.suffix_splits += other.suffix_splits;
        self.materialized_nodes += other.materialized_nodes;
        self.suffix_bytes += other.suffix_bytes;
        self.arena_blocks += other.arena_blocks;
    }
}

impl fmt::Display for TrieStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} ngrams, {} nodes ({} small, {} medium, {} large, {} overflow)",
            self.live_ngrams,
            self.total_nodes(),
            self.small_nodes,
            self.medium_nodes,
            self.large_nodes,
            self.overflow_nodes,
        )?;
        write!(
            f,
            ", {} promotions, {} splits, {} suffix bytes, ~{} KiB",
            self.promotions_to_medium + self.promotions_to_large,
            self.suffix_splits,
            self.suffix_bytes,
            self.memory_usage_bytes() / 1024,
        )
    }
}
