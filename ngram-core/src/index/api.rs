//! Public API for adding, removing and matching ngrams.

use ngram_types::{IndexError, NgramMatch, NodeRef};
use smallvec::SmallVec;

use crate::index::types::NgramIndex;

impl NgramIndex {
    /// Adds `ngram` to the index. Adding a live ngram again is a no-op.
    ///
    /// # Errors
    ///
    /// Returns an [`IndexError`] if the owning shard runs out of address
    /// space.
    #[inline]
    pub fn add(&mut self, ngram: &[u8]) -> Result<NodeRef, IndexError> {
        let shard = self.shard_of(ngram);
        self.shards[shard].insert(ngram)
    }

    /// Removes `ngram` from the index. Returns `true` if it was live.
    #[inline]
    pub fn delete(&mut self, ngram: &[u8]) -> bool {
        let shard = self.shard_of(ngram);
        self.shards[shard].remove(ngram)
    }

    /// Returns `true` if `ngram` is live.
    #[inline]
    pub fn contains(&self, ngram: &[u8]) -> bool {
        self.shards[self.shard_of(ngram)].contains(ngram)
    }

    /// Returns every live ngram starting at `doc[start]` and ending at a word
    /// boundary, shortest first.
    pub fn find_ngrams<'d>(&self, doc: &'d [u8], start: usize) -> Vec<&'d [u8]> {
        let mut found: SmallVec<[NgramMatch; 8]> = SmallVec::new();
        for shard in 0..self.shards.len() {
            self.scan_shard(shard, doc, start, |m| found.push(m));
        }
        found.sort_unstable();
        found.iter().map(|m| m.slice(doc)).collect()
    }

    /// Calls `emit` for every live ngram of `shard` that starts at
    /// `doc[start]` and ends at a word boundary.
    #[inline]
    pub fn scan_shard<F: FnMut(NgramMatch)>(
        &self,
        shard: usize,
        doc: &[u8],
        start: usize,
        mut emit: F,
    ) {
        self.shards[shard].scan_prefixes(&doc[start..], |m| {
            emit(NgramMatch {
                start,
                end: start + m.len,
                shard: shard as u16,
                node: m.node,
            })
        });
    }
}
