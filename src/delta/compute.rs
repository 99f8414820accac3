//! Delta computation
//!
//! Slides a block-sized window over the new data, rolling the weak checksum
//! one byte at a time and asking the [`BlockIndex`] for candidates. Bytes
//! that fall out of the window without a match are gathered into a pending
//! literal, flushed when a copy is found, when it reaches the literal cap or
//! when the input ends.

use crate::checksum::{Adler32Rolling, STREAM_DIGEST_LEN};
use crate::config::{EngineConfig, DEFAULT_MAX_LITERAL_SIZE, DEFAULT_READ_BUFFER_SIZE};
use crate::delta::error::{DeltaError, DeltaResult};
use crate::delta::types::{DeltaStats, Operation};
use crate::metrics::recorder::record_delta_computed;
use crate::signature::{BlockIndex, Signature, SignatureBuilder};
use std::io::{ErrorKind, Read};
use std::sync::Arc;

/// Computes deltas against one signature
#[derive(Debug, Clone)]
pub struct DeltaComputer {
    index: Arc<BlockIndex>,
    read_buffer_size: usize,
    max_literal_size: usize,
}

impl DeltaComputer {
    /// Create a computer for the old data described by `signature`
    pub fn new(signature: Signature) -> Self {
        Self::from_index(Arc::new(BlockIndex::new(signature)))
    }

    /// Create a computer from a shared, prebuilt index
    pub fn from_index(index: Arc<BlockIndex>) -> Self {
        Self {
            index,
            read_buffer_size: DEFAULT_READ_BUFFER_SIZE,
            max_literal_size: DEFAULT_MAX_LITERAL_SIZE,
        }
    }

    /// Apply the tunables of an engine config
    pub fn with_config(mut self, config: &EngineConfig) -> Self {
        self.read_buffer_size = config.read_buffer_size.max(1);
        self.max_literal_size = config.max_literal_size.max(1);
        self
    }

    /// Set how many bytes are requested from the reader per refill
    pub fn read_buffer_size(mut self, size: usize) -> Self {
        self.read_buffer_size = size.max(1);
        self
    }

    /// Cap the length of a single literal run
    ///
    /// Caps below the block size are raised to it.
    pub fn max_literal_size(mut self, size: usize) -> Self {
        self.max_literal_size = size.max(1);
        self
    }

    /// The index deltas are computed against
    pub fn index(&self) -> &Arc<BlockIndex> {
        &self.index
    }

    /// Lazily compute operations for the new data in `reader`
    pub fn iter<R: Read>(&self, reader: R) -> DeltaResult<DeltaIter<R>> {
        let block_size = self.index.block_size();
        if block_size == 0 {
            return Err(DeltaError::InvalidBlockSize(block_size));
        }
        Ok(DeltaIter {
            reader,
            index: Arc::clone(&self.index),
            block_size,
            read_size: self.read_buffer_size,
            max_literal: self.max_literal_size.max(block_size),
            buf: Vec::new(),
            pos: 0,
            eof: false,
            rolling: None,
            pending: Vec::new(),
            queued: None,
            hasher: blake3::Hasher::new(),
            stats: DeltaStats::default(),
            done: false,
        })
    }

    /// Compute all operations into a vector
    pub fn compute<R: Read>(&self, reader: R) -> DeltaResult<Vec<Operation>> {
        self.iter(reader)?.collect()
    }

    /// Compute operations and hand each to `emit` as soon as it is known
    pub fn compute_with<R, F>(&self, reader: R, mut emit: F) -> DeltaResult<DeltaStats>
    where
        R: Read,
        F: FnMut(Operation) -> DeltaResult<()>,
    {
        let mut iter = self.iter(reader)?;
        for op in iter.by_ref() {
            emit(op?)?;
        }
        Ok(iter.stats())
    }
}

/// Compute the delta from `old` to `new` in memory
pub fn diff(old: &[u8], new: &[u8], block_size: usize) -> DeltaResult<Vec<Operation>> {
    let signature = SignatureBuilder::new()
        .block_size(block_size)
        .build_from_bytes(old)
        .map_err(|_| DeltaError::InvalidBlockSize(block_size))?;
    DeltaComputer::new(signature).compute(new)
}

/// Lazy sequence of delta operations over a reader
///
/// Memory is bounded by the read buffer plus the literal cap: a run of
/// unmatched bytes is emitted as soon as it reaches the cap, so the first
/// operation never waits for the whole input.
pub struct DeltaIter<R> {
    reader: R,
    index: Arc<BlockIndex>,
    block_size: usize,
    read_size: usize,
    max_literal: usize,
    /// New data not yet consumed; the window starts at `pos`
    buf: Vec<u8>,
    pos: usize,
    eof: bool,
    /// Checksum of `buf[pos..pos + block_size]` when that window is full
    rolling: Option<Adler32Rolling>,
    pending: Vec<u8>,
    /// Copy waiting behind a literal that had to be flushed first
    queued: Option<Operation>,
    hasher: blake3::Hasher,
    stats: DeltaStats,
    done: bool,
}

impl<R: Read> DeltaIter<R> {
    /// Statistics for the operations produced so far
    pub fn stats(&self) -> DeltaStats {
        self.stats
    }

    /// Whether every operation has been produced
    pub fn is_done(&self) -> bool {
        self.done && self.queued.is_none()
    }

    /// BLAKE3 digest of all new data read so far
    ///
    /// Once the iterator is exhausted this is the digest of the whole new
    /// data, i.e. of the stream the operations rebuild.
    pub fn digest(&self) -> [u8; STREAM_DIGEST_LEN] {
        *self.hasher.finalize().as_bytes()
    }

    fn available(&self) -> usize {
        self.buf.len() - self.pos
    }

    /// Read until at least `needed` bytes are buffered past `pos`, or EOF
    fn fill(&mut self, needed: usize) -> DeltaResult<()> {
        while self.available() < needed && !self.eof {
            if self.pos > 0 {
                self.buf.drain(..self.pos);
                self.pos = 0;
            }

            let start = self.buf.len();
            self.buf.resize(start + self.read_size, 0);
            let read = loop {
                match self.reader.read(&mut self.buf[start..]) {
                    Ok(n) => break n,
                    Err(e) if e.kind() == ErrorKind::Interrupted => continue,
                    Err(e) => {
                        self.buf.truncate(start);
                        return Err(DeltaError::SourceRead(e));
                    }
                }
            };
            self.buf.truncate(start + read);

            if read == 0 {
                self.eof = true;
            } else {
                self.hasher.update(&self.buf[start..]);
            }
        }
        Ok(())
    }

    fn window_checksum(&mut self) -> u32 {
        let window = &self.buf[self.pos..self.pos + self.block_size];
        self.rolling
            .get_or_insert_with(|| Adler32Rolling::from_block(window))
            .digest()
    }

    fn flush_literal(&mut self) -> Option<Operation> {
        if self.pending.is_empty() {
            return None;
        }
        let data = std::mem::take(&mut self.pending);
        self.stats.record_literal(data.len() as u64);
        Some(Operation::Literal { data })
    }

    fn emit_copy(&mut self, block_index: u32, length: usize) -> Operation {
        self.pos += length;
        self.rolling = None;
        self.stats.record_copy(length as u64);

        let copy = Operation::Copy { block_index };
        match self.flush_literal() {
            Some(literal) => {
                self.queued = Some(copy);
                literal
            }
            None => copy,
        }
    }

    fn next_op(&mut self) -> DeltaResult<Option<Operation>> {
        if let Some(op) = self.queued.take() {
            return Ok(Some(op));
        }
        if self.done {
            return Ok(None);
        }

        let block_size = self.block_size;
        loop {
            self.fill(block_size)?;

            if self.available() >= block_size {
                let weak = self.window_checksum();
                let window = &self.buf[self.pos..self.pos + block_size];
                if let Some(block) = self.index.find_match(weak, window) {
                    let index = block.index;
                    return Ok(Some(self.emit_copy(index, block_size)));
                }

                // No match: the leading byte becomes literal and the window
                // slides by one
                self.fill(block_size + 1)?;
                let out = self.buf[self.pos];
                self.pending.push(out);
                if self.available() > block_size {
                    let incoming = self.buf[self.pos + block_size];
                    if let Some(rolling) = self.rolling.as_mut() {
                        rolling.roll_byte(out, incoming);
                    }
                } else {
                    self.rolling = None;
                }
                self.pos += 1;
                if self.pending.len() >= self.max_literal {
                    return Ok(self.flush_literal());
                }
                continue;
            }

            // Less than a block left and the reader is exhausted
            let remaining = self.available();
            if remaining > 0 {
                let tail = &self.buf[self.pos..];
                let tail_match = self
                    .index
                    .signature()
                    .last_block()
                    .filter(|last| last.matches(tail))
                    .map(|last| last.index);

                if let Some(index) = tail_match {
                    let op = self.emit_copy(index, remaining);
                    self.finish_scan();
                    return Ok(Some(op));
                }

                // Top the run up to the cap; the rest goes out on the next call
                let take = remaining.min(self.max_literal - self.pending.len());
                self.pending.extend_from_slice(&tail[..take]);
                self.pos += take;
                if take < remaining {
                    return Ok(self.flush_literal());
                }
            }

            let last = self.flush_literal();
            self.finish_scan();
            return Ok(last);
        }
    }

    fn finish_scan(&mut self) {
        self.done = true;
        tracing::trace!(
            copied = self.stats.copied_bytes,
            literal = self.stats.literal_bytes,
            operations = self.stats.operation_count(),
            "delta scan complete"
        );
        record_delta_computed(&self.stats);
    }
}

impl<R: Read> Iterator for DeltaIter<R> {
    type Item = DeltaResult<Operation>;

    fn next(&mut self) -> Option<Self::Item> {
        match self.next_op() {
            Ok(op) => op.map(Ok),
            Err(e) => {
                self.done = true;
                self.queued = None;
                Some(Err(e))
            }
        }
    }
}
