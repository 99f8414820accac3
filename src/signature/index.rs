//! Weak checksum lookup table
//!
//! Several blocks may share a weak checksum, so every weak value maps to a
//! list of candidates and the strong hash decides.

use crate::checksum::strong_hash;
use crate::signature::types::{BlockHash, Signature};
use std::collections::HashMap;

/// Lookup structure for fast block matching
///
/// Read-only once built; share it behind an `Arc` to run several delta
/// computations against the same signature.
#[derive(Debug, Clone)]
pub struct BlockIndex {
    signature: Signature,
    weak_lookup: HashMap<u32, Vec<u32>>,
}

impl BlockIndex {
    /// Index every block of `signature`
    pub fn new(signature: Signature) -> Self {
        let mut weak_lookup: HashMap<u32, Vec<u32>> = HashMap::new();

        for block in &signature.blocks {
            weak_lookup.entry(block.weak).or_default().push(block.index);
        }

        Self {
            signature,
            weak_lookup,
        }
    }

    /// The indexed signature
    pub fn signature(&self) -> &Signature {
        &self.signature
    }

    /// Block size of the indexed signature
    pub fn block_size(&self) -> usize {
        self.signature.block_len()
    }

    /// Check if there is nothing to match against
    pub fn is_empty(&self) -> bool {
        self.signature.is_empty()
    }

    /// Indices of blocks with the given weak checksum, in ascending order
    pub fn candidates(&self, weak: u32) -> &[u32] {
        self.weak_lookup
            .get(&weak)
            .map(Vec::as_slice)
            .unwrap_or_default()
    }

    /// Get a block by index
    pub fn get_block(&self, index: u32) -> Option<&BlockHash> {
        self.signature.blocks.get(index as usize)
    }

    /// First block whose weak checksum, length and strong hash all match
    /// `window`
    ///
    /// The strong hash is only computed when at least one weak candidate
    /// exists. A weak hit whose strong hash differs is not a match.
    pub fn find_match(&self, weak: u32, window: &[u8]) -> Option<&BlockHash> {
        let candidates = self.candidates(weak);
        if candidates.is_empty() {
            return None;
        }

        let strong = strong_hash(window);
        candidates
            .iter()
            .filter_map(|&index| self.get_block(index))
            .find(|block| block.length as usize == window.len() && block.strong == strong)
    }
}

impl From<Signature> for BlockIndex {
    fn from(signature: Signature) -> Self {
        Self::new(signature)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::checksum::Adler32Rolling;
    use crate::signature::SignatureBuilder;

    #[test]
    fn test_repetitive_blocks_share_candidates() {
        let data = b"AAAA".repeat(100);
        let sig = SignatureBuilder::new().block_size(4).build_from_bytes(&data).unwrap();
        let index = BlockIndex::new(sig.clone());

        let candidates = index.candidates(sig.blocks[0].weak);
        assert_eq!(candidates.len(), sig.block_count());
        assert!(candidates.windows(2).all(|w| w[0] < w[1]));

        // First candidate wins
        let found = index.find_match(sig.blocks[0].weak, b"AAAA").unwrap();
        assert_eq!(found.index, 0);
    }

    #[test]
    fn test_weak_collision_is_not_a_match() {
        let old = b"\x01\x00\x00\x01";
        let sig = SignatureBuilder::new().block_size(4).build_from_bytes(old).unwrap();
        let index = BlockIndex::new(sig);

        let colliding = b"\x00\x01\x01\x00";
        let weak = Adler32Rolling::checksum(colliding);
        assert_eq!(index.candidates(weak).len(), 1);
        assert!(index.find_match(weak, colliding).is_none());
        assert!(index.find_match(weak, old).is_some());
    }

    #[test]
    fn test_collision_resolves_to_matching_candidate() {
        // Both blocks share a weak checksum; only the second matches
        let old = b"\x01\x00\x00\x01\x00\x01\x01\x00";
        let sig = SignatureBuilder::new().block_size(4).build_from_bytes(old).unwrap();
        let index = BlockIndex::new(sig);

        let window = b"\x00\x01\x01\x00";
        let weak = Adler32Rolling::checksum(window);
        assert_eq!(index.candidates(weak), &[0, 1]);
        assert_eq!(index.find_match(weak, window).unwrap().index, 1);
    }

    #[test]
    fn test_unknown_weak_has_no_candidates() {
        let index = BlockIndex::new(Signature::new(16));
        assert!(index.is_empty());
        assert!(index.candidates(42).is_empty());
        assert!(index.find_match(42, b"anything").is_none());
    }

    #[test]
    fn test_short_final_block_is_indexed() {
        let sig = SignatureBuilder::new().block_size(4).build_from_bytes(b"wxyzab").unwrap();
        let index = BlockIndex::new(sig);

        let weak = Adler32Rolling::checksum(b"ab");
        assert_eq!(index.find_match(weak, b"ab").unwrap().index, 1);
        assert_eq!(index.get_block(1).unwrap().length, 2);
    }
}
