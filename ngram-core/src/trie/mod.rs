//! Byte-wise ngram trie.
//!
//! Adaptive radix trie over raw bytes with three ideas layered on top:
//!
//! - **Adaptive nodes**: children live in a [`SmallNode`](node::SmallNode),
//!   [`MediumNode`](node::MediumNode) or [`LargeNode`](node::LargeNode)
//!   depending on fan-out, promoted one way as nodes fill up
//! - **Suffix compression**: an unbranched tail is stored once as a span in
//!   the suffix arena instead of a chain of single-child nodes, and split
//!   lazily when a later insert diverges inside it
//! - **Overflow nodes**: past an optional depth, new subtrees collapse into an
//!   ordered map from remaining bytes to terminal nodes
//!
//! Deletion only clears the `valid` flag; nodes are never freed.
//!
//! Threading:
//! - Mutations take `&mut self`. Lookups and [`Trie::scan_prefixes`] take
//!   `&self`, and [`Trie`] is `Sync`, so any number of scans can share it
//!   between mutations.

mod insert;
pub mod node;
mod search;
mod stats;
mod types;

pub use stats::TrieStats;
pub use types::Trie;
