//! Query Evaluation
//!
//! Turns one query document into one output line: every live ngram that
//! occurs in the document on word boundaries, each listed once, joined by
//! `|`, or `-1` if there is none.
//!
//! ## How It Works
//!
//! 1. Scan the document once for spaces (`memchr`) and visit every word
//!    start: a non-space byte at offset 0 or right after a space.
//! 2. At each word start, scan the index for ngrams that are prefixes of
//!    the rest of the document ending at a word boundary.
//! 3. Sort matches by `(start, end)` and keep the first occurrence of each
//!    trie node, so an ngram seen at several offsets is reported once, at its
//!    leftmost occurrence.
//!
//! ```text
//! doc:     "new york city hall"
//! starts:   0   4    9    14
//! matches: (0,8) "new york"  (0,13) "new york city"
//! output:  new york|new york city
//! ```
//!
//! Step 2 is what the dispatcher spreads over threads. Step 3 runs on the
//! collected matches, so every strategy renders the same bytes.

use memchr::memchr_iter;
use ngram_types::{NgramMatch, NodeRef, WORD_SEPARATOR};
use rustc_hash::FxHashSet;

use crate::index::NgramIndex;

/// Output line for a query without matches.
pub const NO_MATCH: &[u8] = b"-1";

/// Byte between ngrams in an output line.
pub const MATCH_SEPARATOR: u8 = b'|';

/// Calls `emit` with the offset of every word start in `doc`.
#[inline]
pub fn for_each_word_start<F: FnMut(usize)>(doc: &[u8], mut emit: F) {
    if doc.first().is_some_and(|&b| b != WORD_SEPARATOR) {
        emit(0);
    }
    for space in memchr_iter(WORD_SEPARATOR, doc) {
        let next = space + 1;
        if next < doc.len() && doc[next] != WORD_SEPARATOR {
            emit(next);
        }
    }
}

/// Appends the matches of `shards` at every word start accepted by `keep`.
pub fn collect_matches<K>(
    index: &NgramIndex,
    doc: &[u8],
    shards: core::ops::Range<usize>,
    keep: K,
    out: &mut Vec<NgramMatch>,
) where
    K: Fn(usize) -> bool,
{
    for_each_word_start(doc, |start| {
        if !keep(start) {
            return;
        }
        for shard in shards.clone() {
            index.scan_shard(shard, doc, start, |m| out.push(m));
        }
    });
}

/// Orders `matches`, drops repeated ngrams and writes the output line
/// (without newline) to `out`.
pub fn render_matches(doc: &[u8], matches: &mut [NgramMatch], out: &mut Vec<u8>) {
    matches.sort_unstable();

    let mut seen: FxHashSet<(u16, NodeRef)> = FxHashSet::default();
    let mut first = true;
    for m in matches.iter() {
        if !seen.insert(m.identity()) {
            continue;
        }
        if !first {
            out.push(MATCH_SEPARATOR);
        }
        out.extend_from_slice(m.slice(doc));
        first = false;
    }

    if first {
        out.extend_from_slice(NO_MATCH);
    }
}

/// Evaluates one query on the calling thread.
pub fn evaluate(index: &NgramIndex, doc: &[u8]) -> Vec<u8> {
    let mut matches = Vec::new();
    collect_matches(index, doc, 0..index.num_shards(), |_| true, &mut matches);
    let mut out = Vec::with_capacity(64);
    render_matches(doc, &mut matches, &mut out);
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn starts(doc: &str) -> Vec<usize> {
        let mut out = Vec::new();
        for_each_word_start(doc.as_bytes(), |p| out.push(p));
        out
    }

    fn run(ngrams: &[&str], doc: &str) -> String {
        let mut index = NgramIndex::new();
        for g in ngrams {
            index.add(g.as_bytes()).expect("should add");
        }
        String::from_utf8(evaluate(&index, doc.as_bytes())).unwrap()
    }

    #[test]
    fn word_starts() {
        assert_eq!(starts("new york city"), vec![0, 4, 9]);
        assert_eq!(starts(" a  b "), vec![1, 4]);
        assert!(starts("").is_empty());
        assert!(starts("   ").is_empty());
        assert_eq!(starts("x"), vec![0]);
    }

    #[test]
    fn prefix_completeness() {
        assert_eq!(
            run(&["new york", "new york city"], "new york city hall"),
            "new york|new york city"
        );
    }

    #[test]
    fn empty_result() {
        assert_eq!(run(&["new york"], "nothing here"), "-1");
        assert_eq!(run(&[], ""), "-1");
        assert_eq!(run(&["a"], ""), "-1");
    }

    #[test]
    fn word_boundaries() {
        assert_eq!(run(&["cat"], "category runs"), "-1");
        assert_eq!(run(&["cat"], "the cat runs"), "cat");
        assert_eq!(run(&["at"], "cat"), "-1");
    }

    #[test]
    fn containment() {
        assert_eq!(run(&["big apple"], "big apple"), "big apple");
        assert_eq!(run(&["big apple"], "big apple pie"), "big apple");
    }

    #[test]
    fn repeated_ngram_listed_once() {
        assert_eq!(run(&["a", "b"], "b a b a"), "b|a");
    }

    #[test]
    fn matches_ordered_by_position_then_length() {
        assert_eq!(
            run(&["york", "new", "new york", "city"], "new york city"),
            "new|new york|york|city"
        );
    }

    #[test]
    fn overlapping_ngrams() {
        assert_eq!(run(&["a b", "b c"], "a b c"), "a b|b c");
    }

    #[test]
    fn multiple_spaces_inside_document() {
        // Ngrams are matched byte for byte, so "a  b" does not contain "a b".
        assert_eq!(run(&["a b", "b"], "a  b"), "b");
    }

    #[test]
    fn render_without_matches() {
        let mut out = Vec::new();
        render_matches(b"doc", &mut [], &mut out);
        assert_eq!(out, NO_MATCH);
    }
}
