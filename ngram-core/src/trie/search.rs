//! Exact lookup, deletion and prefix scanning.

use memchr::memchr_iter;
use ngram_types::{NodeKind, NodeRef, PrefixMatch, WORD_SEPARATOR};

use crate::trie::types::{Trie, ROOT};

/// Returns `true` if position `i` of `subject` ends a word.
#[inline(always)]
fn is_boundary(subject: &[u8], i: usize) -> bool {
    i == subject.len() || subject[i] == WORD_SEPARATOR
}

impl Trie {
    /// Returns the node that represents `ngram`, live or not.
    pub fn search_exact(&self, ngram: &[u8]) -> Option<NodeRef> {
        let mut node = ROOT;
        let mut i = 0;
        loop {
            let span = self.suffix_span(node);
            if !span.is_empty() {
                return (self.suffixes.get(span) == &ngram[i..]).then_some(node);
            }
            if node.kind() == NodeKind::Overflow {
                let rest = &ngram[i..];
                if rest.is_empty() {
                    return Some(node);
                }
                return self.overflow_node(node).get(rest);
            }
            if i == ngram.len() {
                return Some(node);
            }
            node = self.child(node, ngram[i])?;
            i += 1;
        }
    }

    /// Returns `true` if `ngram` is live.
    #[inline]
    pub fn contains(&self, ngram: &[u8]) -> bool {
        self.search_exact(ngram)
            .is_some_and(|node| self.header(node).valid)
    }

    /// Marks `ngram` as no longer live.
    ///
    /// Absent ngrams are ignored. Returns `true` if a live ngram was removed.
    pub fn remove(&mut self, ngram: &[u8]) -> bool {
        let Some(node) = self.search_exact(ngram) else {
            return false;
        };
        let header = self.header_mut(node);
        if !header.valid {
            return false;
        }
        header.valid = false;
        self.live -= 1;
        true
    }

    /// Returns every live ngram that is a word-aligned prefix of
    /// `doc[start..]`, ordered by increasing length.
    pub fn find_all_prefix_matches(&self, doc: &[u8], start: usize) -> Vec<PrefixMatch> {
        let mut out = Vec::new();
        self.scan_prefixes(&doc[start..], |m| out.push(m));
        out
    }

    /// Calls `emit` for every live ngram that is a prefix of `subject` ending
    /// at a word boundary, shortest first. The empty ngram is never reported.
    pub fn scan_prefixes<F: FnMut(PrefixMatch)>(&self, subject: &[u8], mut emit: F) {
        let mut node = ROOT;
        let mut i = 0;
        loop {
            let header = *self.header(node);

            if !header.suffix.is_empty() {
                let suffix = self.suffixes.get(header.suffix);
                let end = i + suffix.len();
                if header.valid
                    && subject[i..].starts_with(suffix)
                    && is_boundary(subject, end)
                {
                    emit(PrefixMatch { len: end, node });
                }
                return;
            }

            if node.kind() == NodeKind::Overflow {
                self.scan_overflow(node, subject, i, &mut emit);
                return;
            }

            if i > 0 && header.valid && is_boundary(subject, i) {
                emit(PrefixMatch { len: i, node });
            }
            if i == subject.len() {
                return;
            }
            match self.child(node, subject[i]) {
                Some(child) => {
                    node = child;
                    i += 1;
                }
                None => return,
            }
        }
    }

    /// Reports matches below an overflow node reached after `i` bytes.
    fn scan_overflow<F: FnMut(PrefixMatch)>(
        &self,
        node: NodeRef,
        subject: &[u8],
        i: usize,
        emit: &mut F,
    ) {
        if i > 0 && self.header(node).valid && is_boundary(subject, i) {
            emit(PrefixMatch { len: i, node });
        }

        let overflow = self.overflow_node(node);
        if overflow.is_empty() {
            return;
        }

        let rest = &subject[i..];
        let ends = memchr_iter(WORD_SEPARATOR, rest).chain(std::iter::once(rest.len()));
        for end in ends.filter(|&end| end > 0) {
            let probe = &rest[..end];
            let Some((key, terminal)) = overflow.first_with_prefix(probe) else {
                // No stored key extends this probe, so no longer one can match.
                return;
            };
            if key.len() == probe.len() && self.header(terminal).valid {
                emit(PrefixMatch {
                    len: i + end,
                    node: terminal,
                });
            }
        }
    }
}
