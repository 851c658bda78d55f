//! Arena Allocators for Trie Storage
//!
//! Two append-only allocators back the trie. Neither frees individual
//! allocations; everything lives as long as the trie.
//!
//! ## Suffix Bytes
//!
//! Compressed suffixes are stored in a single contiguous byte buffer and
//! referenced by (offset, length) spans:
//!
//! ```text
//! Buffer: [lpha][ork city][et]...[free space]
//!          ^     ^         ^
//! Spans:  (0,4) (4,8)     (12,2) ...
//! ```
//!
//! Splitting a suffix never copies: the remaining tail is the same bytes
//! addressed by a narrower span.
//!
//! ## Node Slots
//!
//! Each node kind has its own [`NodeArena`], a list of fixed-size blocks.
//! Allocation hands out the next `Default` slot of the last block and
//! returns its index. Blocks are never reallocated once created, and callers
//! only ever hold indices, so handles stay valid as the arena grows.
//!
//! ## Performance
//!
//! - Allocation: O(1), amortised block creation
//! - Retrieval: O(1), shift + mask for nodes, slice for suffixes
//! - Memory overhead: 8 bytes per suffix span (u32 offset + u32 len)

use ngram_types::IndexError;

/// Reference to a run of bytes in a [`SuffixArena`]. 8 bytes.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct SuffixSpan {
    offset: u32,
    len: u32,
}

impl SuffixSpan {
    /// The empty span (no suffix).
    pub const EMPTY: SuffixSpan = SuffixSpan { offset: 0, len: 0 };

    /// Returns the byte length.
    #[inline(always)]
    pub const fn len(self) -> usize {
        self.len as usize
    }

    /// Returns true if the span addresses no bytes.
    #[inline(always)]
    pub const fn is_empty(self) -> bool {
        self.len == 0
    }

    /// Returns the span with its first `n` bytes dropped.
    #[inline(always)]
    pub fn skip(self, n: usize) -> SuffixSpan {
        debug_assert!(n <= self.len());
        let n = n.min(self.len()) as u32;
        SuffixSpan {
            offset: self.offset + n,
            len: self.len - n,
        }
    }
}

/// Bump allocator for suffix bytes.
pub struct SuffixArena {
    buffer: Vec<u8>,
}

impl Default for SuffixArena {
    fn default() -> Self {
        Self::new()
    }
}

impl SuffixArena {
    /// Creates a new empty arena.
    pub fn new() -> Self {
        Self {
            buffer: Vec::with_capacity(64 * 1024), // 64KB initial
        }
    }

    /// Number of bytes stored.
    #[inline(always)]
    pub fn len(&self) -> usize {
        self.buffer.len()
    }

    /// Returns true if no bytes are stored.
    #[inline(always)]
    pub fn is_empty(&self) -> bool {
        self.buffer.is_empty()
    }

    /// Copies `bytes` into the arena.
    ///
    /// # Errors
    ///
    /// Returns `IndexError::SuffixArenaExhausted` if the arena would grow past
    /// the 32-bit offset range.
    #[inline]
    pub fn push(&mut self, bytes: &[u8]) -> Result<SuffixSpan, IndexError> {
        if bytes.is_empty() {
            return Ok(SuffixSpan::EMPTY);
        }

        let offset = self.buffer.len();
        if offset + bytes.len() > u32::MAX as usize {
            return Err(IndexError::SuffixArenaExhausted {
                used: offset,
                requested: bytes.len(),
            });
        }

        // 1.5x growth keeps large vocabularies from doubling past what they need
        if offset + bytes.len() > self.buffer.capacity() {
            let new_cap = (self.buffer.capacity() * 3 / 2)
                .max(offset + bytes.len())
                .max(4096);
            self.buffer.reserve_exact(new_cap - self.buffer.len());
        }
        self.buffer.extend_from_slice(bytes);

        Ok(SuffixSpan {
            offset: offset as u32,
            len: bytes.len() as u32,
        })
    }

    /// Returns the bytes addressed by `span`.
    #[inline(always)]
    pub fn get(&self, span: SuffixSpan) -> &[u8] {
        let start = span.offset as usize;
        &self.buffer[start..start + span.len()]
    }
}

/// Block allocator for one node kind.
pub struct NodeArena<T> {
    blocks: Vec<Vec<T>>,
    shift: u32,
    mask: usize,
    len: usize,
}

impl<T: Default> NodeArena<T> {
    /// Creates an arena whose blocks hold `block_size` slots, rounded up to a
    /// power of two.
    pub fn with_block_size(block_size: usize) -> Self {
        let block_size = block_size.max(1).next_power_of_two();
        Self {
            blocks: Vec::new(),
            shift: block_size.trailing_zeros(),
            mask: block_size - 1,
            len: 0,
        }
    }

    /// Number of slots handed out.
    #[inline(always)]
    pub fn len(&self) -> usize {
        self.len
    }

    /// Returns true if no slot was handed out.
    #[inline(always)]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Number of blocks allocated.
    #[inline(always)]
    pub fn num_blocks(&self) -> usize {
        self.blocks.len()
    }

    /// Slots per block.
    #[inline(always)]
    pub fn block_size(&self) -> usize {
        self.mask + 1
    }

    /// Hands out a fresh `Default` slot and returns its index, or `None` once
    /// `limit` slots are in use.
    #[inline]
    pub fn alloc(&mut self, limit: usize) -> Option<usize> {
        if self.len >= limit {
            return None;
        }
        let needs_block = self
            .blocks
            .last()
            .is_none_or(|block| block.len() == block.capacity());
        if needs_block {
            self.blocks.push(Vec::with_capacity(self.block_size()));
        }

        let slot = self.len;
        // A block is created above whenever the last one is full.
        let block = self.blocks.last_mut()?;
        block.push(T::default());
        self.len += 1;
        Some(slot)
    }

    /// Returns the node at `slot`.
    #[inline(always)]
    pub fn get(&self, slot: usize) -> &T {
        &self.blocks[slot >> self.shift][slot & self.mask]
    }

    /// Returns the node at `slot` mutably.
    #[inline(always)]
    pub fn get_mut(&mut self, slot: usize) -> &mut T {
        &mut self.blocks[slot >> self.shift][slot & self.mask]
    }
}
