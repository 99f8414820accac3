//! Signature generation
//!
//! Builds block signatures either eagerly into a [`Signature`] or lazily as
//! an iterator of [`BlockHash`] records, so a caller can serialize while
//! reading and keep memory bounded by a single block.

use crate::config::EngineConfig;
use crate::metrics::recorder::record_signature_built;
use crate::signature::error::{SignatureError, SignatureResult};
use crate::signature::layout::{derive_block_size, MIN_BLOCK_SIZE};
use crate::signature::types::{BlockHash, Signature};
use std::io::{ErrorKind, Read};

/// Builder for block signatures
#[derive(Debug, Clone)]
pub struct SignatureBuilder {
    block_size: usize,
}

impl SignatureBuilder {
    /// Create a builder with the minimum block size
    pub fn new() -> Self {
        Self {
            block_size: MIN_BLOCK_SIZE,
        }
    }

    /// Create a builder whose block size is derived from the input length
    pub fn for_length(total_length: u64) -> Self {
        Self {
            block_size: derive_block_size(total_length),
        }
    }

    /// Create a builder from an engine config and the expected input length
    pub fn from_config(config: &EngineConfig, total_length: u64) -> Self {
        Self {
            block_size: config.block_size_for(total_length),
        }
    }

    /// Set the block size
    pub fn block_size(mut self, size: usize) -> Self {
        self.block_size = size;
        self
    }

    /// Get the configured block size
    pub fn get_block_size(&self) -> usize {
        self.block_size
    }

    /// Lazily hash blocks read from `reader`
    pub fn iter<R: Read>(&self, reader: R) -> SignatureResult<SignatureIter<R>> {
        if self.block_size == 0 || u32::try_from(self.block_size).is_err() {
            return Err(SignatureError::InvalidBlockSize(self.block_size));
        }
        Ok(SignatureIter {
            reader,
            buffer: vec![0u8; self.block_size],
            block_size: self.block_size as u32,
            next_index: 0,
            total_length: 0,
            done: false,
        })
    }

    /// Build a complete signature from a reader
    pub fn build<R: Read>(&self, reader: R) -> SignatureResult<Signature> {
        let mut iter = self.iter(reader)?;
        let mut signature = Signature::new(iter.block_size());
        for block in iter.by_ref() {
            signature.push(block?);
        }

        tracing::debug!(
            blocks = signature.block_count(),
            bytes = signature.total_length,
            block_size = signature.block_size,
            "signature built"
        );
        record_signature_built(signature.block_count(), signature.total_length);

        Ok(signature)
    }

    /// Build a signature from a byte slice
    pub fn build_from_bytes(&self, data: &[u8]) -> SignatureResult<Signature> {
        self.build(data)
    }
}

impl Default for SignatureBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Lazy sequence of block hashes over a reader
///
/// Yields one [`BlockHash`] per block, in index order. After the first error
/// the iterator is exhausted.
pub struct SignatureIter<R> {
    reader: R,
    buffer: Vec<u8>,
    block_size: u32,
    next_index: u32,
    total_length: u64,
    done: bool,
}

impl<R: Read> SignatureIter<R> {
    /// Block size used for every block but the last
    pub fn block_size(&self) -> u32 {
        self.block_size
    }

    /// Bytes hashed so far
    pub fn total_length(&self) -> u64 {
        self.total_length
    }

    /// Blocks produced so far
    pub fn block_count(&self) -> u32 {
        self.next_index
    }

    fn next_block(&mut self) -> SignatureResult<Option<BlockHash>> {
        let filled = read_full(&mut self.reader, &mut self.buffer)
            .map_err(SignatureError::SourceRead)?;
        if filled == 0 {
            return Ok(None);
        }

        let block = BlockHash::new(self.next_index, &self.buffer[..filled]);
        self.next_index = self
            .next_index
            .checked_add(1)
            .ok_or(SignatureError::InvalidBlockSize(self.block_size as usize))?;
        self.total_length += filled as u64;

        // A short read only happens at end of stream
        if filled < self.buffer.len() {
            self.done = true;
        }
        Ok(Some(block))
    }
}

impl<R: Read> Iterator for SignatureIter<R> {
    type Item = SignatureResult<BlockHash>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        match self.next_block() {
            Ok(Some(block)) => Some(Ok(block)),
            Ok(None) => {
                self.done = true;
                None
            }
            Err(e) => {
                self.done = true;
                Some(Err(e))
            }
        }
    }
}

/// Read until `buf` is full or the reader reaches end of stream
pub(crate) fn read_full<R: Read>(reader: &mut R, buf: &mut [u8]) -> std::io::Result<usize> {
    let mut filled = 0;
    while filled < buf.len() {
        match reader.read(&mut buf[filled..]) {
            Ok(0) => break,
            Ok(n) => filled += n,
            Err(e) if e.kind() == ErrorKind::Interrupted => continue,
            Err(e) => return Err(e),
        }
    }
    Ok(filled)
}
