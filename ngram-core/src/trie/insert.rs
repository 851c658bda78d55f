//! Insertion and suffix splitting.

use ngram_types::{IndexError, NodeKind, NodeRef};

use crate::trie::node::NodeHeader;
use crate::trie::types::{Trie, ROOT};

/// Length of the longest common prefix of `a` and `b`.
#[inline]
pub(crate) fn common_prefix_len(a: &[u8], b: &[u8]) -> usize {
    a.iter().zip(b).take_while(|(x, y)| x == y).count()
}

impl Trie {
    /// Inserts `ngram` and returns the node that represents it.
    ///
    /// Idempotent: inserting a live ngram again changes nothing. The empty
    /// ngram marks the root valid.
    ///
    /// # Errors
    ///
    /// Returns an [`IndexError`] if an arena runs out of address space.
    pub fn insert(&mut self, ngram: &[u8]) -> Result<NodeRef, IndexError> {
        let mut node = ROOT;
        let mut via: Option<(NodeRef, u8)> = None;
        let mut i = 0;

        loop {
            if !self.suffix_span(node).is_empty() {
                let lcp = common_prefix_len(&ngram[i..], self.suffix(node));
                if lcp == self.suffix_span(node).len() && i + lcp == ngram.len() {
                    return Ok(self.mark_valid(node));
                }
                (node, via) = self.expand_suffix(node, via, lcp)?;
                i += lcp;
                continue;
            }

            if node.kind() == NodeKind::Overflow {
                return self.insert_below_overflow(node, &ngram[i..]);
            }

            if i == ngram.len() {
                return Ok(self.mark_valid(node));
            }

            let byte = ngram[i];
            match self.child(node, byte) {
                Some(child) => {
                    via = Some((node, byte));
                    node = child;
                    i += 1;
                }
                None => {
                    let (child, terminal) = self.new_branch(i + 1, &ngram[i + 1..])?;
                    self.attach(node, via, byte, child)?;
                    self.live += 1;
                    return Ok(terminal);
                }
            }
        }
    }

    /// Creates the subtree for an ngram that leaves the trie at `depth`.
    ///
    /// Returns the node to attach and the node that represents the ngram.
    fn new_branch(&mut self, depth: usize, rest: &[u8]) -> Result<(NodeRef, NodeRef), IndexError> {
        if !self.overflows_at(depth) {
            let leaf = self.alloc_leaf(rest)?;
            return Ok((leaf, leaf));
        }

        let node = self.alloc(NodeKind::Overflow)?;
        if rest.is_empty() {
            self.header_mut(node).valid = true;
            return Ok((node, node));
        }
        let terminal = self.alloc_small(NodeHeader {
            valid: true,
            ..NodeHeader::default()
        })?;
        self.overflow
            .get_mut(node.slot())
            .entries
            .insert(rest.into(), terminal);
        Ok((node, terminal))
    }

    fn insert_below_overflow(&mut self, node: NodeRef, rest: &[u8]) -> Result<NodeRef, IndexError> {
        if rest.is_empty() {
            return Ok(self.mark_valid(node));
        }
        if let Some(terminal) = self.overflow_node(node).get(rest) {
            return Ok(self.mark_valid(terminal));
        }

        let terminal = self.alloc_small(NodeHeader {
            valid: true,
            ..NodeHeader::default()
        })?;
        self.overflow
            .get_mut(node.slot())
            .entries
            .insert(rest.into(), terminal);
        self.live += 1;
        Ok(terminal)
    }

    /// Turns the first `k` bytes of `node`'s suffix into plain nodes.
    ///
    /// The old suffix remainder moves to a new child of the last
    /// materialized node, keeping its validity. Returns that last node, which
    /// holds no suffix, and the edge that reaches it.
    fn expand_suffix(
        &mut self,
        node: NodeRef,
        via: Option<(NodeRef, u8)>,
        k: usize,
    ) -> Result<(NodeRef, Option<(NodeRef, u8)>), IndexError> {
        let header = *self.header(node);
        debug_assert!(k <= header.suffix.len());
        *self.header_mut(node) = NodeHeader::default();
        self.counters.splits += 1;

        let mut cur = node;
        let mut cur_via = via;
        for j in 0..k {
            let byte = self.suffixes.get(header.suffix)[j];
            let next = self.alloc_small(NodeHeader::default())?;
            cur = self.attach(cur, cur_via, byte, next)?;
            cur_via = Some((cur, byte));
            cur = next;
            self.counters.materialized += 1;
        }

        let rest = header.suffix.skip(k);
        if rest.is_empty() {
            self.header_mut(cur).valid = header.valid;
        } else {
            let byte = self.suffixes.get(rest)[0];
            let tail = self.alloc_small(NodeHeader {
                valid: header.valid,
                suffix: rest.skip(1),
            })?;
            cur = self.attach(cur, cur_via, byte, tail)?;
        }
        Ok((cur, cur_via))
    }
}
