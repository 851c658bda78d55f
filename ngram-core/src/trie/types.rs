//! Trie storage and node dispatch.

use ngram_types::{IndexError, NodeKind, NodeRef, TrieConfig};

use crate::arena::{NodeArena, SuffixArena, SuffixSpan};
use crate::trie::node::{
    EdgeTable, LargeNode, MediumNode, NodeHeader, OverflowNode, SmallNode,
};

/// Handle of the root: the first slot of the large arena.
pub(crate) const ROOT: NodeRef = match NodeRef::new(NodeKind::Large, 0) {
    Some(root) => root,
    None => panic!("root slot out of range"),
};

/// Structural event counters, reported through [`TrieStats`](super::TrieStats).
#[derive(Clone, Copy, Debug, Default)]
pub(crate) struct Counters {
    pub promotions_to_medium: u64,
    pub promotions_to_large: u64,
    pub materialized: u64,
    pub splits: u64,
}

/// Byte-wise trie over ngrams with adaptive nodes and suffix compression.
///
/// Mutations take `&mut self`; lookups and scans take `&self` and may run
/// from many threads at once.
pub struct Trie {
    pub(crate) small: NodeArena<SmallNode>,
    pub(crate) medium: NodeArena<MediumNode>,
    pub(crate) large: NodeArena<LargeNode>,
    pub(crate) overflow: NodeArena<OverflowNode>,
    pub(crate) suffixes: SuffixArena,
    pub(crate) config: TrieConfig,
    /// Number of valid nodes.
    pub(crate) live: usize,
    pub(crate) counters: Counters,
}

impl Default for Trie {
    fn default() -> Self {
        Self::new()
    }
}

impl Trie {
    /// Creates an empty trie with default configuration.
    pub fn new() -> Self {
        Self::with_config(TrieConfig::default())
    }

    /// Creates an empty trie.
    pub fn with_config(config: TrieConfig) -> Self {
        let mut large = NodeArena::with_block_size(config.block_size);
        let root = large.alloc(1);
        debug_assert_eq!(root, Some(ROOT.slot()));

        Self {
            small: NodeArena::with_block_size(config.block_size),
            medium: NodeArena::with_block_size(config.block_size),
            large,
            overflow: NodeArena::with_block_size(config.block_size),
            suffixes: SuffixArena::new(),
            config,
            live: 0,
            counters: Counters::default(),
        }
    }

    /// Returns the number of live ngrams.
    #[inline(always)]
    #[must_use]
    pub fn len(&self) -> usize {
        self.live
    }

    /// Returns `true` if no ngram is live.
    #[inline(always)]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.live == 0
    }

    /// Returns the configuration the trie was built with.
    #[inline(always)]
    pub fn config(&self) -> &TrieConfig {
        &self.config
    }

    /// Handle of the root node.
    #[inline(always)]
    pub fn root(&self) -> NodeRef {
        ROOT
    }

    #[inline(always)]
    pub(crate) fn header(&self, node: NodeRef) -> &NodeHeader {
        let slot = node.slot();
        match node.kind() {
            NodeKind::Small => self.small.get(slot).header(),
            NodeKind::Medium => self.medium.get(slot).header(),
            NodeKind::Large => self.large.get(slot).header(),
            NodeKind::Overflow => &self.overflow.get(slot).header,
        }
    }

    #[inline(always)]
    pub(crate) fn header_mut(&mut self, node: NodeRef) -> &mut NodeHeader {
        let slot = node.slot();
        match node.kind() {
            NodeKind::Small => self.small.get_mut(slot).header_mut(),
            NodeKind::Medium => self.medium.get_mut(slot).header_mut(),
            NodeKind::Large => self.large.get_mut(slot).header_mut(),
            NodeKind::Overflow => &mut self.overflow.get_mut(slot).header,
        }
    }

    /// Returns the child of `node` reached by `byte`.
    #[inline(always)]
    pub(crate) fn child(&self, node: NodeRef, byte: u8) -> Option<NodeRef> {
        let slot = node.slot();
        match node.kind() {
            NodeKind::Small => self.small.get(slot).find(byte),
            NodeKind::Medium => self.medium.get(slot).find(byte),
            NodeKind::Large => self.large.get(slot).find(byte),
            NodeKind::Overflow => None,
        }
    }

    /// Number of byte edges out of `node`.
    #[cfg(test)]
    pub(crate) fn num_edges(&self, node: NodeRef) -> usize {
        let slot = node.slot();
        match node.kind() {
            NodeKind::Small => self.small.get(slot).num_edges(),
            NodeKind::Medium => self.medium.get(slot).num_edges(),
            NodeKind::Large => self.large.get(slot).num_edges(),
            NodeKind::Overflow => 0,
        }
    }

    /// Calls `f` for every byte edge out of `node`.
    #[cfg(test)]
    pub(crate) fn for_each_edge<F: FnMut(u8, NodeRef)>(&self, node: NodeRef, f: F) {
        let slot = node.slot();
        match node.kind() {
            NodeKind::Small => self.small.get(slot).for_each_edge(f),
            NodeKind::Medium => self.medium.get(slot).for_each_edge(f),
            NodeKind::Large => self.large.get(slot).for_each_edge(f),
            NodeKind::Overflow => {}
        }
    }

    /// Bytes of the compressed suffix held by `node`.
    #[inline(always)]
    pub(crate) fn suffix(&self, node: NodeRef) -> &[u8] {
        self.suffixes.get(self.header(node).suffix)
    }

    /// Points `byte` of `node` at `child` if the node has room.
    #[inline]
    pub(crate) fn try_set_edge(&mut self, node: NodeRef, byte: u8, child: NodeRef) -> bool {
        let slot = node.slot();
        match node.kind() {
            NodeKind::Small => self.small.get_mut(slot).set(byte, child),
            NodeKind::Medium => self.medium.get_mut(slot).set(byte, child),
            NodeKind::Large => self.large.get_mut(slot).set(byte, child),
            NodeKind::Overflow => false,
        }
    }

    /// Allocates a fresh node of `kind`.
    pub(crate) fn alloc(&mut self, kind: NodeKind) -> Result<NodeRef, IndexError> {
        let limit = NodeRef::MAX_SLOT as usize + 1;
        let slot = match kind {
            NodeKind::Small => self.small.alloc(limit),
            NodeKind::Medium => self.medium.alloc(limit),
            NodeKind::Large => self.large.alloc(limit),
            NodeKind::Overflow => self.overflow.alloc(limit),
        };
        slot.and_then(|slot| NodeRef::new(kind, slot as u32))
            .ok_or(IndexError::ArenaExhausted {
                kind,
                max: NodeRef::MAX_SLOT,
            })
    }

    /// Allocates a small node carrying `header`.
    pub(crate) fn alloc_small(&mut self, header: NodeHeader) -> Result<NodeRef, IndexError> {
        let node = self.alloc(NodeKind::Small)?;
        *self.small.get_mut(node.slot()) = SmallNode::with_header(header);
        Ok(node)
    }

    /// Allocates a valid leaf compressing `rest`.
    pub(crate) fn alloc_leaf(&mut self, rest: &[u8]) -> Result<NodeRef, IndexError> {
        let suffix = self.suffixes.push(rest)?;
        self.alloc_small(NodeHeader {
            valid: true,
            suffix,
        })
    }

    /// Copies `node` into the next larger representation.
    ///
    /// The old slot is abandoned; the caller repoints the parent edge.
    pub(crate) fn promote(&mut self, node: NodeRef) -> Result<NodeRef, IndexError> {
        match node.kind() {
            NodeKind::Small => {
                let medium = MediumNode::from(self.small.get(node.slot()));
                let promoted = self.alloc(NodeKind::Medium)?;
                *self.medium.get_mut(promoted.slot()) = medium;
                self.counters.promotions_to_medium += 1;
                Ok(promoted)
            }
            NodeKind::Medium => {
                let large = LargeNode::from(self.medium.get(node.slot()));
                let promoted = self.alloc(NodeKind::Large)?;
                *self.large.get_mut(promoted.slot()) = large;
                self.counters.promotions_to_large += 1;
                Ok(promoted)
            }
            kind => Err(IndexError::NodeFull { kind }),
        }
    }

    /// Adds the edge `byte -> child` to `node`, promoting it when full.
    ///
    /// `via` is the parent edge that reaches `node` (`None` for the root).
    /// Returns the handle `node` lives at afterwards.
    pub(crate) fn attach(
        &mut self,
        node: NodeRef,
        via: Option<(NodeRef, u8)>,
        byte: u8,
        child: NodeRef,
    ) -> Result<NodeRef, IndexError> {
        if self.try_set_edge(node, byte, child) {
            return Ok(node);
        }

        let promoted = self.promote(node)?;
        match via {
            // Replacing an existing edge never needs room.
            Some((parent, parent_byte)) => {
                if !self.try_set_edge(parent, parent_byte, promoted) {
                    return Err(IndexError::NodeFull {
                        kind: parent.kind(),
                    });
                }
            }
            // The root is large and never fills up.
            None => return Err(IndexError::NodeFull { kind: node.kind() }),
        }

        if self.try_set_edge(promoted, byte, child) {
            Ok(promoted)
        } else {
            Err(IndexError::NodeFull {
                kind: promoted.kind(),
            })
        }
    }

    /// Returns the overflow node behind `node`.
    #[inline(always)]
    pub(crate) fn overflow_node(&self, node: NodeRef) -> &OverflowNode {
        debug_assert_eq!(node.kind(), NodeKind::Overflow);
        self.overflow.get(node.slot())
    }

    /// Returns `true` if a child created at `depth` must be an overflow node.
    #[inline(always)]
    pub(crate) fn overflows_at(&self, depth: usize) -> bool {
        self.config.overflow_depth.is_some_and(|d| depth >= d)
    }

    /// Marks `node` valid, counting it if it was not.
    #[inline]
    pub(crate) fn mark_valid(&mut self, node: NodeRef) -> NodeRef {
        let header = self.header_mut(node);
        if !header.valid {
            header.valid = true;
            self.live += 1;
        }
        node
    }

    pub(crate) fn suffix_span(&self, node: NodeRef) -> SuffixSpan {
        self.header(node).suffix
    }
}
