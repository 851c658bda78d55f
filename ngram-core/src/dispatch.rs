//! Parallel query dispatch.
//!
//! A [`Dispatcher`] owns a bounded rayon pool and evaluates a segment of
//! queries (consecutive `Q` commands with no mutation in between) with one of
//! four [`Strategy`] values:
//!
//! | Strategy     | Unit of work                            | Index   |
//! |--------------|-----------------------------------------|---------|
//! | `Sequential` | whole segment on the caller             | any     |
//! | `Queries`    | one query per task                      | any     |
//! | `Positions`  | word starts with `first byte % N == w`  | any     |
//! | `Shards`     | one index shard per task                | sharded |
//!
//! Every strategy funnels its matches through
//! [`render_matches`](crate::query::render_matches), so all of them produce
//! the bytes the sequential evaluator produces.

use ngram_types::{NgramMatch, Strategy};
use rayon::prelude::*;
use rayon::{ThreadPool, ThreadPoolBuildError, ThreadPoolBuilder};
use tracing::debug;

use crate::index::NgramIndex;
use crate::query::{collect_matches, evaluate, render_matches};

/// Dispatcher configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DispatchConfig {
    /// How work is split.
    pub strategy: Strategy,
    /// Worker threads in the pool (at least one).
    pub threads: usize,
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self {
            strategy: Strategy::default(),
            threads: std::thread::available_parallelism().map_or(1, |n| n.get()),
        }
    }
}

impl DispatchConfig {
    /// Single-threaded configuration.
    pub const fn sequential() -> Self {
        Self {
            strategy: Strategy::Sequential,
            threads: 1,
        }
    }

    /// Number of index shards this configuration expects.
    pub fn shards(&self) -> usize {
        match self.strategy {
            Strategy::Shards => self.threads.max(1),
            _ => 1,
        }
    }
}

/// Evaluates query segments against an [`NgramIndex`].
pub struct Dispatcher {
    pool: ThreadPool,
    config: DispatchConfig,
}

impl Dispatcher {
    /// Builds the worker pool.
    ///
    /// # Errors
    ///
    /// Returns the pool builder's error if worker threads cannot be spawned.
    pub fn new(config: DispatchConfig) -> Result<Self, ThreadPoolBuildError> {
        let config = DispatchConfig {
            threads: config.threads.max(1),
            ..config
        };
        let pool = ThreadPoolBuilder::new()
            .num_threads(config.threads)
            .thread_name(|i| format!("ngrams-worker-{i}"))
            .build()?;
        Ok(Self { pool, config })
    }

    /// Returns the configuration in effect.
    #[inline(always)]
    pub fn config(&self) -> &DispatchConfig {
        &self.config
    }

    /// Evaluates every document of `segment` and returns one output line per
    /// document, in segment order.
    pub fn evaluate_segment<D>(&self, index: &NgramIndex, segment: &[D]) -> Vec<Vec<u8>>
    where
        D: AsRef<[u8]> + Sync,
    {
        debug!(
            queries = segment.len(),
            strategy = %self.config.strategy,
            "dispatching segment"
        );

        match self.config.strategy {
            Strategy::Sequential => segment
                .iter()
                .map(|doc| evaluate(index, doc.as_ref()))
                .collect(),
            Strategy::Queries => self.pool.install(|| {
                segment
                    .par_iter()
                    .map(|doc| evaluate(index, doc.as_ref()))
                    .collect()
            }),
            Strategy::Positions => segment
                .iter()
                .map(|doc| self.by_positions(index, doc.as_ref()))
                .collect(),
            Strategy::Shards => segment
                .iter()
                .map(|doc| self.by_shards(index, doc.as_ref()))
                .collect(),
        }
    }

    /// Worker `w` of `N` scans the word starts whose first byte is `w` mod `N`.
    fn by_positions(&self, index: &NgramIndex, doc: &[u8]) -> Vec<u8> {
        let workers = self.config.threads;
        let shards = 0..index.num_shards();
        let mut matches: Vec<NgramMatch> = self.pool.install(|| {
            (0..workers)
                .into_par_iter()
                .flat_map_iter(|w| {
                    let mut found = Vec::new();
                    collect_matches(
                        index,
                        doc,
                        shards.clone(),
                        |start| doc[start] as usize % workers == w,
                        &mut found,
                    );
                    found
                })
                .collect()
        });

        let mut out = Vec::with_capacity(64);
        render_matches(doc, &mut matches, &mut out);
        out
    }

    /// Worker `s` scans the whole document against shard `s` only.
    fn by_shards(&self, index: &NgramIndex, doc: &[u8]) -> Vec<u8> {
        let mut matches: Vec<NgramMatch> = self.pool.install(|| {
            (0..index.num_shards())
                .into_par_iter()
                .flat_map_iter(|s| {
                    let mut found = Vec::new();
                    collect_matches(index, doc, s..s + 1, |_| true, &mut found);
                    found
                })
                .collect()
        });

        let mut out = Vec::with_capacity(64);
        render_matches(doc, &mut matches, &mut out);
        out
    }
}
