//! Whole-index statistics summed over shards.

use crate::index::types::NgramIndex;
use crate::trie::TrieStats;

/// A snapshot of index statistics.
#[derive(Debug, Clone, Copy)]
pub struct IndexStats {
    /// Number of shards.
    pub num_shards: usize,
    /// Statistics summed over every shard.
    pub totals: TrieStats,
    /// Live ngrams in the fullest shard.
    pub largest_shard: usize,
}

impl NgramIndex {
    /// Returns index statistics.
    pub fn stats(&self) -> IndexStats {
        let mut totals = TrieStats::default();
        let mut largest_shard = 0;
        for shard in &self.shards {
            let stats = shard.stats();
            largest_shard = largest_shard.max(stats.live_ngrams);
            totals.merge(&stats);
        }
        IndexStats {
            num_shards: self.shards.len(),
            totals,
            largest_shard,
        }
    }
}

impl IndexStats {
    /// Returns approximate memory usage in bytes.
    pub fn memory_usage_bytes(&self) -> usize {
        self.totals.memory_usage_bytes()
    }
}

impl core::fmt::Display for IndexStats {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "{}", self.totals)?;
        if self.num_shards > 1 {
            write!(
                f,
                " across {} shards (largest {})",
                self.num_shards, self.largest_shard
            )?;
        }
        Ok(())
    }
}
