//! Ngram index over one or more tries.
//!
//! Adds, deletes and lookups route to the shard that owns the ngram's first
//! byte. Matching at a document position scans every shard, so a sharded
//! index answers exactly like an unsharded one.
//!
//! Threading:
//! - [`NgramIndex`] is `Sync`. Queries borrow it shared; mutations need
//!   `&mut`, so no query can observe a half-applied mutation.

mod api;
mod stats;
mod types;

pub use stats::IndexStats;
pub use types::NgramIndex;
