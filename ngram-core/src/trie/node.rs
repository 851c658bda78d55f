//! Trie node representations with adaptive fan-out.
//!
//! Most nodes in a phrase trie have one or two children, so nodes start
//! small and are promoted as they fill up:
//!
//! - [`SmallNode`]: up to 4 children, unsorted, linear scan
//! - [`MediumNode`]: up to 16 children, one 16-wide SIMD compare per lookup
//! - [`LargeNode`]: 256 direct-indexed slots (also used for the root)
//! - [`OverflowNode`]: ordered map from the remaining bytes of an ngram to
//!   its terminal node, for deep high fan-out subtrees
//!
//! Promotion copies the header and every edge into the next representation
//! and never goes back.

use std::collections::BTreeMap;

#[cfg(target_arch = "x86_64")]
use std::arch::x86_64::*;

use ngram_types::NodeRef;

use crate::arena::SuffixSpan;

/// Maximum children of a [`SmallNode`].
pub const SMALL_FANOUT: usize = 4;

/// Maximum children of a [`MediumNode`].
pub const MEDIUM_FANOUT: usize = 16;

/// Maximum children of a [`LargeNode`].
pub const LARGE_FANOUT: usize = 256;

/// State shared by every node kind.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct NodeHeader {
    /// The key this node represents is a live ngram.
    pub valid: bool,
    /// Remaining bytes of the single key below this node, if compressed.
    pub suffix: SuffixSpan,
}

/// Byte-keyed child table.
pub trait EdgeTable {
    /// Maximum number of edges.
    const CAPACITY: usize;

    /// Returns the child reached by `byte`.
    fn find(&self, byte: u8) -> Option<NodeRef>;

    /// Points `byte` at `child`, replacing an existing edge.
    ///
    /// Returns `false` without changes if `byte` is new and the table is full.
    fn set(&mut self, byte: u8, child: NodeRef) -> bool;

    /// Number of edges.
    fn num_edges(&self) -> usize;

    /// Calls `f` for every edge.
    fn for_each_edge<F: FnMut(u8, NodeRef)>(&self, f: F);

    /// Node state.
    fn header(&self) -> &NodeHeader;

    /// Node state, mutably.
    fn header_mut(&mut self) -> &mut NodeHeader;
}

/// Node with up to [`SMALL_FANOUT`] unsorted edges.
#[derive(Clone, Copy, Debug, Default)]
pub struct SmallNode {
    header: NodeHeader,
    len: u8,
    keys: [u8; SMALL_FANOUT],
    children: [Option<NodeRef>; SMALL_FANOUT],
}

impl SmallNode {
    /// Creates a node with the given state and no edges.
    pub fn with_header(header: NodeHeader) -> Self {
        Self {
            header,
            ..Self::default()
        }
    }

    #[inline(always)]
    fn find_slot(&self, byte: u8) -> Option<usize> {
        self.keys[..self.len as usize].iter().position(|&k| k == byte)
    }
}

impl EdgeTable for SmallNode {
    const CAPACITY: usize = SMALL_FANOUT;

    #[inline(always)]
    fn find(&self, byte: u8) -> Option<NodeRef> {
        self.find_slot(byte).and_then(|i| self.children[i])
    }

    fn set(&mut self, byte: u8, child: NodeRef) -> bool {
        if let Some(i) = self.find_slot(byte) {
            self.children[i] = Some(child);
            return true;
        }
        let n = self.len as usize;
        if n == Self::CAPACITY {
            return false;
        }
        self.keys[n] = byte;
        self.children[n] = Some(child);
        self.len += 1;
        true
    }

    #[inline(always)]
    fn num_edges(&self) -> usize {
        self.len as usize
    }

    fn for_each_edge<F: FnMut(u8, NodeRef)>(&self, mut f: F) {
        for i in 0..self.len as usize {
            if let Some(child) = self.children[i] {
                f(self.keys[i], child);
            }
        }
    }

    #[inline(always)]
    fn header(&self) -> &NodeHeader {
        &self.header
    }

    #[inline(always)]
    fn header_mut(&mut self) -> &mut NodeHeader {
        &mut self.header
    }
}

/// Node with up to [`MEDIUM_FANOUT`] unsorted edges.
#[derive(Clone, Copy, Debug, Default)]
pub struct MediumNode {
    header: NodeHeader,
    len: u8,
    keys: [u8; MEDIUM_FANOUT],
    children: [Option<NodeRef>; MEDIUM_FANOUT],
}

impl MediumNode {
    /// Compares all 16 keys against `byte` at once.
    #[inline(always)]
    fn find_slot(&self, byte: u8) -> Option<usize> {
        #[cfg(target_arch = "x86_64")]
        {
            // SAFETY: SSE2 is part of the x86_64 baseline, and `keys` is
            // exactly 16 bytes, so the unaligned load stays in bounds.
            let hits = unsafe {
                let keys = _mm_loadu_si128(self.keys.as_ptr() as *const __m128i);
                let needle = _mm_set1_epi8(byte as i8);
                _mm_movemask_epi8(_mm_cmpeq_epi8(keys, needle)) as u32
            };
            // Unused key slots are zero and may match a zero byte.
            let live = (1u32 << self.len) - 1;
            let hits = hits & live;
            if hits == 0 {
                None
            } else {
                Some(hits.trailing_zeros() as usize)
            }
        }

        #[cfg(not(target_arch = "x86_64"))]
        {
            self.keys[..self.len as usize].iter().position(|&k| k == byte)
        }
    }
}

impl From<&SmallNode> for MediumNode {
    fn from(small: &SmallNode) -> Self {
        let mut medium = MediumNode {
            header: small.header,
            ..MediumNode::default()
        };
        let n = small.len as usize;
        medium.keys[..n].copy_from_slice(&small.keys[..n]);
        medium.children[..n].copy_from_slice(&small.children[..n]);
        medium.len = small.len;
        medium
    }
}

impl EdgeTable for MediumNode {
    const CAPACITY: usize = MEDIUM_FANOUT;

    #[inline(always)]
    fn find(&self, byte: u8) -> Option<NodeRef> {
        self.find_slot(byte).and_then(|i| self.children[i])
    }

    fn set(&mut self, byte: u8, child: NodeRef) -> bool {
        if let Some(i) = self.find_slot(byte) {
            self.children[i] = Some(child);
            return true;
        }
        let n = self.len as usize;
        if n == Self::CAPACITY {
            return false;
        }
        self.keys[n] = byte;
        self.children[n] = Some(child);
        self.len += 1;
        true
    }

    #[inline(always)]
    fn num_edges(&self) -> usize {
        self.len as usize
    }

    fn for_each_edge<F: FnMut(u8, NodeRef)>(&self, mut f: F) {
        for i in 0..self.len as usize {
            if let Some(child) = self.children[i] {
                f(self.keys[i], child);
            }
        }
    }

    #[inline(always)]
    fn header(&self) -> &NodeHeader {
        &self.header
    }

    #[inline(always)]
    fn header_mut(&mut self) -> &mut NodeHeader {
        &mut self.header
    }
}

/// Node with a dense 256-slot child table.
#[derive(Clone, Copy, Debug)]
pub struct LargeNode {
    header: NodeHeader,
    len: u16,
    children: [Option<NodeRef>; LARGE_FANOUT],
}

impl Default for LargeNode {
    fn default() -> Self {
        Self {
            header: NodeHeader::default(),
            len: 0,
            children: [None; LARGE_FANOUT],
        }
    }
}

impl From<&MediumNode> for LargeNode {
    fn from(medium: &MediumNode) -> Self {
        let mut large = LargeNode {
            header: medium.header,
            ..LargeNode::default()
        };
        medium.for_each_edge(|byte, child| {
            large.children[byte as usize] = Some(child);
        });
        large.len = medium.len as u16;
        large
    }
}

impl EdgeTable for LargeNode {
    const CAPACITY: usize = LARGE_FANOUT;

    #[inline(always)]
    fn find(&self, byte: u8) -> Option<NodeRef> {
        self.children[byte as usize]
    }

    fn set(&mut self, byte: u8, child: NodeRef) -> bool {
        let slot = &mut self.children[byte as usize];
        if slot.is_none() {
            self.len += 1;
        }
        *slot = Some(child);
        true
    }

    #[inline(always)]
    fn num_edges(&self) -> usize {
        self.len as usize
    }

    fn for_each_edge<F: FnMut(u8, NodeRef)>(&self, mut f: F) {
        for (byte, child) in self.children.iter().enumerate() {
            if let Some(child) = child {
                f(byte as u8, *child);
            }
        }
    }

    #[inline(always)]
    fn header(&self) -> &NodeHeader {
        &self.header
    }

    #[inline(always)]
    fn header_mut(&mut self) -> &mut NodeHeader {
        &mut self.header
    }
}

/// Node mapping whole remaining byte strings to terminal nodes.
///
/// Has no byte edges; every key below it is looked up in one map probe.
#[derive(Clone, Debug, Default)]
pub struct OverflowNode {
    pub(crate) header: NodeHeader,
    pub(crate) entries: BTreeMap<Box<[u8]>, NodeRef>,
}

impl OverflowNode {
    /// Returns the terminal node for `rest`.
    #[inline]
    pub fn get(&self, rest: &[u8]) -> Option<NodeRef> {
        self.entries.get(rest).copied()
    }

    /// Returns the smallest stored key `>= probe`, if it starts with `probe`.
    #[inline]
    pub fn first_with_prefix(&self, probe: &[u8]) -> Option<(&[u8], NodeRef)> {
        use std::ops::Bound;

        self.entries
            .range::<[u8], _>((Bound::Included(probe), Bound::Unbounded))
            .next()
            .filter(|(key, _)| key.starts_with(probe))
            .map(|(key, &node)| (&key[..], node))
    }

    /// Number of stored keys.
    #[inline(always)]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns true if no key is stored.
    #[inline(always)]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
