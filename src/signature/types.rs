use crate::checksum::{strong_hash, Adler32Rolling, StrongHash};
use serde::{Deserialize, Serialize};

/// Checksums of one block of old data
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlockHash {
    /// Position of the block in the old data, starting at 0
    pub index: u32,
    /// Weak rolling checksum (Adler-32)
    pub weak: u32,
    /// Strong hash (BLAKE3, truncated to 128 bits)
    pub strong: StrongHash,
    /// Block length; shorter than the block size only for the final block
    pub length: u32,
}

impl BlockHash {
    /// Hash a block of data
    pub fn new(index: u32, data: &[u8]) -> Self {
        Self {
            index,
            weak: Adler32Rolling::checksum(data),
            strong: strong_hash(data),
            length: data.len() as u32,
        }
    }

    /// Verify if data matches this block
    pub fn matches(&self, data: &[u8]) -> bool {
        if data.len() != self.length as usize {
            return false;
        }
        if Adler32Rolling::checksum(data) != self.weak {
            return false;
        }
        strong_hash(data) == self.strong
    }
}

/// Ordered block checksums of the old data
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Signature {
    /// Block size used for every block but the last
    pub block_size: u32,
    /// Sum of all block lengths
    pub total_length: u64,
    /// Block hashes in index order
    pub blocks: Vec<BlockHash>,
}

impl Signature {
    /// An empty signature
    pub fn new(block_size: u32) -> Self {
        Self {
            block_size,
            total_length: 0,
            blocks: Vec::new(),
        }
    }

    /// Check if the signature is empty (no blocks)
    pub fn is_empty(&self) -> bool {
        self.blocks.is_empty()
    }

    /// Get number of blocks
    pub fn block_count(&self) -> usize {
        self.blocks.len()
    }

    /// Block size as a `usize`
    pub fn block_len(&self) -> usize {
        self.block_size as usize
    }

    /// The final block, which may be shorter than the block size
    pub fn last_block(&self) -> Option<&BlockHash> {
        self.blocks.last()
    }

    /// Append the next block
    ///
    /// The caller guarantees `block.index == self.block_count()`.
    pub fn push(&mut self, block: BlockHash) {
        debug_assert_eq!(block.index as usize, self.blocks.len());
        self.total_length += block.length as u64;
        self.blocks.push(block);
    }
}
