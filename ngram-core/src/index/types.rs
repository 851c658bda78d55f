//! Index types.

use ngram_types::TrieConfig;

use crate::trie::Trie;

/// Phrase index: one trie, or several when the vocabulary is sharded.
///
/// With `N` shards, an ngram lives in shard `first_byte % N`; the empty
/// ngram lives in shard 0.
pub struct NgramIndex {
    pub(crate) shards: Vec<Trie>,
    pub(crate) config: TrieConfig,
}

impl Default for NgramIndex {
    fn default() -> Self {
        Self::new()
    }
}

impl NgramIndex {
    /// Creates an empty, unsharded index with default configuration.
    pub fn new() -> Self {
        Self::with_shards(TrieConfig::default(), 1)
    }

    /// Creates an empty index split into `shards` tries (at least one).
    pub fn with_shards(config: TrieConfig, shards: usize) -> Self {
        let shards = shards.clamp(1, u16::MAX as usize + 1);
        Self {
            shards: (0..shards).map(|_| Trie::with_config(config)).collect(),
            config,
        }
    }

    /// Returns the number of live ngrams.
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.shards.iter().map(Trie::len).sum()
    }

    /// Returns `true` if no ngram is live.
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.shards.iter().all(Trie::is_empty)
    }

    /// Number of shards.
    #[inline(always)]
    pub fn num_shards(&self) -> usize {
        self.shards.len()
    }

    /// Returns shard `i`.
    #[inline(always)]
    pub fn shard(&self, i: usize) -> &Trie {
        &self.shards[i]
    }

    /// Returns the configuration every shard was built with.
    #[inline(always)]
    pub fn config(&self) -> &TrieConfig {
        &self.config
    }

    /// Shard that owns `ngram`.
    #[inline(always)]
    pub fn shard_of(&self, ngram: &[u8]) -> usize {
        ngram
            .first()
            .map_or(0, |&b| b as usize % self.shards.len())
    }
}
