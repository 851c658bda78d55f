//! Core types shared by the ngram index crates.
//!
//! This crate holds the plain data types that cross crate boundaries:
//!
//! - **Handles**: [`NodeRef`] and [`NodeKind`] identify trie nodes without
//!   exposing arena internals
//! - **Results**: [`PrefixMatch`] and [`NgramMatch`] carry match offsets
//! - **Configuration**: [`TrieConfig`] and [`Strategy`]
//! - **Errors**: [`IndexError`] and [`ProtocolError`]

#![warn(missing_docs)]

use core::fmt;
use core::num::NonZeroU32;

use thiserror::Error;

/// The byte that separates words in ngrams and documents.
pub const WORD_SEPARATOR: u8 = b' ';

/// Edge representation of a trie node.
///
/// The discriminants double as the tag stored in the upper bits of a
/// [`NodeRef`], so they start at 1 to keep every handle non-zero.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[repr(u8)]
pub enum NodeKind {
    /// Unsorted array of up to 4 edges.
    Small = 1,
    /// Array of up to 16 edges, scanned 16-wide.
    Medium = 2,
    /// Dense 256-entry table.
    Large = 3,
    /// Ordered map from remaining bytes to terminal nodes.
    Overflow = 4,
}

impl NodeKind {
    /// All kinds, in promotion order followed by `Overflow`.
    pub const ALL: [NodeKind; 4] = [
        NodeKind::Small,
        NodeKind::Medium,
        NodeKind::Large,
        NodeKind::Overflow,
    ];

    #[inline(always)]
    const fn from_tag(tag: u32) -> Option<Self> {
        match tag {
            1 => Some(NodeKind::Small),
            2 => Some(NodeKind::Medium),
            3 => Some(NodeKind::Large),
            4 => Some(NodeKind::Overflow),
            _ => None,
        }
    }

    /// Short lowercase name, used in statistics output.
    pub const fn name(self) -> &'static str {
        match self {
            NodeKind::Small => "small",
            NodeKind::Medium => "medium",
            NodeKind::Large => "large",
            NodeKind::Overflow => "overflow",
        }
    }
}

impl fmt::Display for NodeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Handle to a trie node: a kind tag plus a slot index in that kind's arena.
///
/// Packed into 32 bits as `(tag << 29) | slot`. A handle names a slot, not a
/// key, and the key a slot represents can change under insertion:
///
/// - promoting a node copies it into a new slot of the next arena and leaves
///   the old slot behind;
/// - splitting a compressed suffix keeps the slot for the shorter key and
///   moves the longer key to a new tail node.
///
/// Handles are only compared within one state of the index.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[repr(transparent)]
pub struct NodeRef(NonZeroU32);

impl NodeRef {
    const SLOT_BITS: u32 = 29;

    /// Largest slot index a handle can address.
    pub const MAX_SLOT: u32 = (1 << Self::SLOT_BITS) - 1;

    /// Creates a handle, or `None` if `slot` exceeds [`NodeRef::MAX_SLOT`].
    #[inline(always)]
    pub const fn new(kind: NodeKind, slot: u32) -> Option<Self> {
        if slot > Self::MAX_SLOT {
            return None;
        }
        match NonZeroU32::new(((kind as u32) << Self::SLOT_BITS) | slot) {
            Some(raw) => Some(Self(raw)),
            None => None,
        }
    }

    /// Returns the node kind encoded in the tag.
    #[inline(always)]
    pub const fn kind(self) -> NodeKind {
        match NodeKind::from_tag(self.0.get() >> Self::SLOT_BITS) {
            Some(kind) => kind,
            // `new` is the only constructor and always writes a valid tag.
            None => unreachable!(),
        }
    }

    /// Returns the slot index within the kind's arena.
    #[inline(always)]
    pub const fn slot(self) -> usize {
        (self.0.get() & Self::MAX_SLOT) as usize
    }

    /// Returns the packed representation.
    #[inline(always)]
    pub const fn as_u32(self) -> u32 {
        self.0.get()
    }
}

impl fmt::Debug for NodeRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}#{}", self.kind(), self.slot())
    }
}

/// A stored ngram found as a prefix of a scanned subject.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PrefixMatch {
    /// Number of subject bytes the ngram spans.
    pub len: usize,
    /// Node the ngram terminates at.
    pub node: NodeRef,
}

/// A stored ngram found inside a document.
///
/// Ordered by `(start, end)`, then by `(shard, node)`, which is the order
/// the sequential evaluator produces and the order every parallel merge
/// restores.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct NgramMatch {
    /// Byte offset of the first ngram byte in the document.
    pub start: usize,
    /// Byte offset one past the last ngram byte.
    pub end: usize,
    /// Index shard that holds the ngram (0 when the index is not sharded).
    pub shard: u16,
    /// Node the ngram terminates at.
    pub node: NodeRef,
}

impl NgramMatch {
    /// Identity used for deduplication across start offsets.
    #[inline(always)]
    pub const fn identity(&self) -> (u16, NodeRef) {
        (self.shard, self.node)
    }

    /// Returns the matched bytes of `doc`.
    #[inline(always)]
    pub fn slice<'d>(&self, doc: &'d [u8]) -> &'d [u8] {
        &doc[self.start..self.end]
    }
}

/// Trie tuning options.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TrieConfig {
    /// Depth at or below which new nodes are created as overflow nodes.
    /// `None` disables overflow nodes.
    pub overflow_depth: Option<usize>,
    /// Number of node slots per arena block.
    pub block_size: usize,
}

impl Default for TrieConfig {
    fn default() -> Self {
        Self {
            overflow_depth: None,
            block_size: 4096,
        }
    }
}

impl TrieConfig {
    /// Configuration with overflow nodes enabled from `depth` on.
    pub const fn with_overflow(depth: usize) -> Self {
        Self {
            overflow_depth: Some(depth),
            block_size: 4096,
        }
    }
}

/// How query work is spread over worker threads.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Strategy {
    /// Everything on the calling thread.
    Sequential,
    /// Whole queries of a segment run in parallel.
    #[default]
    Queries,
    /// Word starts of one document are split across workers by first byte.
    Positions,
    /// The vocabulary is split across independent tries by first byte.
    Shards,
}

impl fmt::Display for Strategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Strategy::Sequential => "sequential",
            Strategy::Queries => "queries",
            Strategy::Positions => "positions",
            Strategy::Shards => "shards",
        };
        f.write_str(name)
    }
}

/// Unrecoverable structural faults raised by index mutations.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum IndexError {
    /// A node arena ran out of addressable slots.
    #[error("{kind} node arena exhausted ({max} slots)")]
    ArenaExhausted {
        /// Arena that overflowed.
        kind: NodeKind,
        /// Slot limit of the handle encoding.
        max: u32,
    },
    /// The suffix arena grew past its 32-bit offset range.
    #[error("suffix arena exhausted: cannot store {requested} more bytes after {used}")]
    SuffixArenaExhausted {
        /// Bytes already stored.
        used: usize,
        /// Bytes the failed call tried to append.
        requested: usize,
    },
    /// A node with no larger representation was asked to take another edge.
    #[error("{kind} node cannot take another edge")]
    NodeFull {
        /// Kind of the node that refused the edge.
        kind: NodeKind,
    },
}

/// Malformed command lines. Always fatal.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ProtocolError {
    /// The line starts with a byte that is not `A`, `D`, `Q` or `F`.
    #[error("line {line}: unknown opcode {opcode:?} in {content:?}")]
    UnknownOpcode {
        /// 1-based line number.
        line: usize,
        /// The offending leading byte, as a char.
        opcode: char,
        /// Lossy rendering of the whole line.
        content: String,
    },
    /// The opcode is followed by something other than a space.
    #[error("line {line}: expected a space after opcode in {content:?}")]
    MissingSeparator {
        /// 1-based line number.
        line: usize,
        /// Lossy rendering of the whole line.
        content: String,
    },
    /// The line is empty.
    #[error("line {line}: empty command")]
    EmptyLine {
        /// 1-based line number.
        line: usize,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn node_ref_packs_kind_and_slot() {
        for kind in NodeKind::ALL {
            let r = NodeRef::new(kind, 12345).expect("slot in range");
            assert_eq!(r.kind(), kind);
            assert_eq!(r.slot(), 12345);
        }
    }

    #[test]
    fn node_ref_slot_zero_is_valid() {
        let r = NodeRef::new(NodeKind::Small, 0).expect("slot in range");
        assert_eq!(r.slot(), 0);
        assert_eq!(r.kind(), NodeKind::Small);
    }

    #[test]
    fn node_ref_rejects_large_slots() {
        assert!(NodeRef::new(NodeKind::Large, NodeRef::MAX_SLOT).is_some());
        assert!(NodeRef::new(NodeKind::Large, NodeRef::MAX_SLOT + 1).is_none());
    }

    #[test]
    fn node_ref_is_four_bytes_with_niche() {
        assert_eq!(size_of::<NodeRef>(), 4);
        assert_eq!(size_of::<Option<NodeRef>>(), 4);
    }

    #[test]
    fn node_refs_differ_across_kinds() {
        let a = NodeRef::new(NodeKind::Small, 7).unwrap();
        let b = NodeRef::new(NodeKind::Medium, 7).unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn ngram_match_ordering() {
        let n1 = NodeRef::new(NodeKind::Small, 9).unwrap();
        let n2 = NodeRef::new(NodeKind::Small, 1).unwrap();
        let short = NgramMatch { start: 0, end: 3, shard: 0, node: n1 };
        let long = NgramMatch { start: 0, end: 8, shard: 0, node: n2 };
        let later = NgramMatch { start: 4, end: 6, shard: 0, node: n2 };

        // End offset wins over node identity at the same start.
        assert!(short < long);
        assert!(long < later);
    }

    #[test]
    fn ngram_match_slice() {
        let doc = b"new york city";
        let m = NgramMatch {
            start: 4,
            end: 8,
            shard: 0,
            node: NodeRef::new(NodeKind::Small, 0).unwrap(),
        };
        assert_eq!(m.slice(doc), b"york");
    }

    #[test]
    fn errors_render() {
        let e = ProtocolError::UnknownOpcode {
            line: 3,
            opcode: 'X',
            content: "X foo".into(),
        };
        assert!(e.to_string().contains("line 3"));

        let e = IndexError::ArenaExhausted {
            kind: NodeKind::Small,
            max: NodeRef::MAX_SLOT,
        };
        assert!(e.to_string().starts_with("small node arena"));
    }

    #[test]
    fn default_strategy_is_query_parallel() {
        assert_eq!(Strategy::default(), Strategy::Queries);
        assert_eq!(Strategy::Shards.to_string(), "shards");
    }
}
