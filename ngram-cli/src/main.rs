//! `ngrams` - streaming phrase matcher over stdin/stdout.
//!
//! Reads the initial vocabulary, answers `R`, then applies `A`/`D`/`Q`/`F`
//! commands until end of input. Diagnostics go to stderr; stdout carries
//! only protocol answers.

use std::io::{self, BufWriter};

use clap::{Parser, ValueEnum};
use ngram_core::{DispatchConfig, Dispatcher, NgramIndex, Session};
use ngram_types::{Strategy, TrieConfig};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Work-splitting strategy for query segments.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum StrategyArg {
    /// Evaluate everything on the reading thread.
    Sequential,
    /// Evaluate the queries of a segment in parallel.
    Queries,
    /// Split the word starts of each document across workers.
    Positions,
    /// Split the vocabulary into one trie per worker.
    Shards,
}

impl From<StrategyArg> for Strategy {
    fn from(arg: StrategyArg) -> Self {
        match arg {
            StrategyArg::Sequential => Strategy::Sequential,
            StrategyArg::Queries => Strategy::Queries,
            StrategyArg::Positions => Strategy::Positions,
            StrategyArg::Shards => Strategy::Shards,
        }
    }
}

/// Streaming ngram matcher
#[derive(Parser, Debug)]
#[command(name = "ngrams")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Worker threads (defaults to available parallelism)
    #[arg(short, long, env = "NGRAMS_THREADS")]
    threads: Option<usize>,

    /// How query work is split across workers
    #[arg(short, long, value_enum, default_value = "queries", env = "NGRAMS_STRATEGY")]
    strategy: StrategyArg,

    /// Depth from which new subtrees are stored as overflow nodes
    #[arg(long, env = "NGRAMS_OVERFLOW_DEPTH")]
    overflow_depth: Option<usize>,

    /// Node slots per arena block
    #[arg(long, default_value_t = TrieConfig::default().block_size, env = "NGRAMS_BLOCK_SIZE")]
    block_size: usize,
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "info".into()),
        ))
        .with(tracing_subscriber::fmt::layer().with_writer(io::stderr))
        .init();

    let args = Args::parse();

    let dispatch = DispatchConfig {
        strategy: args.strategy.into(),
        threads: args
            .threads
            .unwrap_or_else(|| DispatchConfig::default().threads),
    };
    let trie = TrieConfig {
        overflow_depth: args.overflow_depth,
        block_size: args.block_size,
    };

    let dispatcher = Dispatcher::new(dispatch)?;
    let mut index = NgramIndex::with_shards(trie, dispatcher.config().shards());

    tracing::info!(
        strategy = %dispatcher.config().strategy,
        threads = dispatcher.config().threads,
        shards = index.num_shards(),
        overflow_depth = ?index.config().overflow_depth,
        block_size = index.config().block_size,
        "starting"
    );

    let stdin = io::stdin().lock();
    let stdout = BufWriter::new(io::stdout().lock());
    let summary = match Session::new(&mut index, &dispatcher, stdout).run(stdin) {
        Ok(summary) => summary,
        Err(e) => {
            tracing::error!(error = %e, "session aborted");
            return Err(e.into());
        }
    };

    tracing::info!(
        loaded = summary.loaded,
        added = summary.added,
        deleted = summary.deleted,
        queries = summary.queries,
        batches = summary.batches,
        "session complete"
    );
    let stats = index.stats();
    tracing::info!(
        memory_kib = stats.memory_usage_bytes() / 1024,
        "index: {}",
        stats
    );

    Ok(())
}
