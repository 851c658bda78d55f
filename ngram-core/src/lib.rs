//! In-memory phrase index for streaming ngram queries.
//!
//! A vocabulary of ngrams (byte strings, words separated by single spaces)
//! lives in a compressed adaptive trie. Documents are scanned once per word
//! start, and every stored ngram that occurs on word boundaries is reported.
//!
//! ```
//! use ngram_core::{query, NgramIndex};
//!
//! let mut index = NgramIndex::new();
//! index.add(b"new york").unwrap();
//! index.add(b"new york city").unwrap();
//!
//! let line = query::evaluate(&index, b"new york city hall");
//! assert_eq!(line, b"new york|new york city");
//! ```
//!
//! Layers, bottom up:
//!
//! - [`arena`]: append-only storage for nodes and suffix bytes
//! - [`trie`]: insert, delete, exact lookup and prefix scan
//! - [`index`]: one trie or several shards behind one API
//! - [`query`]: word-start scan, deduplication and output formatting
//! - [`dispatch`]: parallel evaluation of query segments
//! - [`session`]: the line protocol

pub mod arena;
pub mod dispatch;
pub mod index;
pub mod query;
pub mod session;
pub mod trie;

pub use dispatch::{DispatchConfig, Dispatcher};
pub use index::{IndexStats, NgramIndex};
pub use session::{Command, Session, SessionError, SessionSummary};
pub use trie::{Trie, TrieStats};

#[cfg(test)]
mod proptests;
