//! Decoders
//!
//! Resumable parsers: input is appended with `feed`, complete records are
//! taken with `next_record`, and trailing bytes of an incomplete record stay
//! buffered until the next feed. `Ok(None)` means "need more bytes"; the end
//! record is reported as a record of its own.

use crate::checksum::{StrongHash, STREAM_DIGEST_LEN, STRONG_HASH_LEN};
use crate::delta::Operation;
use crate::signature::{BlockHash, Signature};
use crate::wire::error::{WireError, WireResult};
use crate::wire::format::*;
use bytes::{Buf, BytesMut};

/// Carry-over buffer shared by both decoders
#[derive(Debug, Default)]
struct RecordBuffer {
    buf: BytesMut,
    /// Stream offset of `buf[0]`
    offset: u64,
}

impl RecordBuffer {
    fn feed(&mut self, chunk: &[u8]) {
        self.buf.extend_from_slice(chunk);
    }

    fn peek_tag(&self) -> Option<u8> {
        self.buf.first().copied()
    }

    fn has(&self, len: usize) -> bool {
        self.buf.len() >= len
    }

    /// Split off the first `len` bytes, skipping the tag
    fn take(&mut self, len: usize) -> BytesMut {
        let mut record = self.buf.split_to(len);
        self.offset += len as u64;
        record.advance(1);
        record
    }

    fn end_of_stream(&self) -> WireError {
        WireError::UnexpectedEndOfStream {
            offset: self.offset,
            buffered: self.buf.len(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    Header,
    Body,
    Done,
    Failed,
}

fn check_phase(phase: Phase, offset: u64, record: &'static str) -> WireResult<()> {
    if phase == Phase::Failed {
        return Err(WireError::malformed(
            offset,
            record,
            "decoder stopped after an earlier error",
        ));
    }
    Ok(())
}

/// One decoded signature record
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SignatureRecord {
    Header { block_size: u32 },
    Block(BlockHash),
    End { block_count: u32, total_length: u64 },
}

/// Incremental signature decoder
#[derive(Debug)]
pub struct SignatureDecoder {
    input: RecordBuffer,
    phase: Phase,
    block_size: u32,
    block_count: u32,
    total_length: u64,
    seen_short_block: bool,
}

impl SignatureDecoder {
    pub fn new() -> Self {
        Self {
            input: RecordBuffer::default(),
            phase: Phase::Header,
            block_size: 0,
            block_count: 0,
            total_length: 0,
            seen_short_block: false,
        }
    }

    /// Append received bytes
    pub fn feed(&mut self, chunk: &[u8]) {
        self.input.feed(chunk);
    }

    /// Block size from the header, once decoded
    pub fn block_size(&self) -> Option<u32> {
        (self.phase != Phase::Header).then_some(self.block_size)
    }

    /// Whether the end record has been decoded
    pub fn is_done(&self) -> bool {
        self.phase == Phase::Done
    }

    /// Bytes consumed so far
    pub fn offset(&self) -> u64 {
        self.input.offset
    }

    /// Decode the next complete record, if one is buffered
    pub fn next_record(&mut self) -> WireResult<Option<SignatureRecord>> {
        let result = self.decode_one();
        if result.is_err() {
            self.phase = Phase::Failed;
        }
        result
    }

    /// Check that the stream ended cleanly: end record seen, nothing left over
    pub fn finish(&self) -> WireResult<()> {
        if self.phase == Phase::Done && self.input.buf.is_empty() {
            Ok(())
        } else {
            Err(self.input.end_of_stream())
        }
    }

    fn decode_one(&mut self) -> WireResult<Option<SignatureRecord>> {
        let offset = self.input.offset;
        check_phase(self.phase, offset, "signature")?;
        let Some(tag) = self.input.peek_tag() else {
            return Ok(None);
        };

        match (self.phase, tag) {
            (Phase::Header, TAG_SIGNATURE_HEADER) => {
                if !self.input.has(SIGNATURE_HEADER_LEN) {
                    return Ok(None);
                }
                let mut record = self.input.take(SIGNATURE_HEADER_LEN);
                let version = record.get_u8();
                let strong_len = record.get_u8();
                let block_size = record.get_u32_le();

                if version != WIRE_VERSION {
                    return Err(WireError::malformed(
                        offset,
                        "signature header",
                        format!("unsupported version {version}"),
                    ));
                }
                if strong_len as usize != STRONG_HASH_LEN {
                    return Err(WireError::malformed(
                        offset,
                        "signature header",
                        format!("unsupported strong hash length {strong_len}"),
                    ));
                }
                if block_size == 0 {
                    return Err(WireError::malformed(
                        offset,
                        "signature header",
                        "block size is zero",
                    ));
                }

                self.block_size = block_size;
                self.phase = Phase::Body;
                Ok(Some(SignatureRecord::Header { block_size }))
            }
            (Phase::Body, TAG_BLOCK) => {
                if !self.input.has(BLOCK_RECORD_LEN) {
                    return Ok(None);
                }
                let mut record = self.input.take(BLOCK_RECORD_LEN);
                let index = record.get_u32_le();
                let weak = record.get_u32_le();
                let length = record.get_u32_le();
                let mut strong: StrongHash = [0u8; STRONG_HASH_LEN];
                record.copy_to_slice(&mut strong);

                if index != self.block_count {
                    return Err(WireError::malformed(
                        offset,
                        "block",
                        format!("expected index {}, got {index}", self.block_count),
                    ));
                }
                if length == 0 || length > self.block_size {
                    return Err(WireError::malformed(
                        offset,
                        "block",
                        format!("length {length} outside 1..={}", self.block_size),
                    ));
                }
                if self.seen_short_block {
                    return Err(WireError::malformed(
                        offset,
                        "block",
                        "block follows a short final block",
                    ));
                }

                self.seen_short_block = length < self.block_size;
                self.block_count += 1;
                self.total_length += length as u64;
                Ok(Some(SignatureRecord::Block(BlockHash {
                    index,
                    weak,
                    strong,
                    length,
                })))
            }
            (Phase::Body, TAG_SIGNATURE_END) => {
                if !self.input.has(SIGNATURE_END_LEN) {
                    return Ok(None);
                }
                let mut record = self.input.take(SIGNATURE_END_LEN);
                let block_count = record.get_u32_le();
                let total_length = record.get_u64_le();

                if block_count != self.block_count || total_length != self.total_length {
                    return Err(WireError::malformed(
                        offset,
                        "signature end",
                        format!(
                            "trailer says {block_count} blocks / {total_length} bytes, received {} / {}",
                            self.block_count, self.total_length
                        ),
                    ));
                }

                self.phase = Phase::Done;
                Ok(Some(SignatureRecord::End {
                    block_count,
                    total_length,
                }))
            }
            (Phase::Done, _) => Err(WireError::malformed(
                offset,
                "signature",
                "trailing bytes after end record",
            )),
            (Phase::Header, other) => Err(WireError::malformed(
                offset,
                "signature header",
                format!("expected header tag, got {other:#04x}"),
            )),
            (_, other) => Err(WireError::malformed(
                offset,
                "signature",
                format!("unknown tag {other:#04x}"),
            )),
        }
    }
}

impl Default for SignatureDecoder {
    fn default() -> Self {
        Self::new()
    }
}

/// Decode a complete signature held in memory
pub fn decode_signature(bytes: &[u8]) -> WireResult<Signature> {
    let mut decoder = SignatureDecoder::new();
    decoder.feed(bytes);

    let mut signature = None;
    while let Some(record) = decoder.next_record()? {
        match record {
            SignatureRecord::Header { block_size } => signature = Some(Signature::new(block_size)),
            SignatureRecord::Block(block) => {
                if let Some(sig) = signature.as_mut() {
                    sig.push(block);
                }
            }
            SignatureRecord::End { .. } => break,
        }
    }
    decoder.finish()?;
    signature.ok_or_else(|| WireError::UnexpectedEndOfStream {
        offset: 0,
        buffered: bytes.len(),
    })
}

/// One decoded delta record
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeltaRecord {
    Header { block_size: u32 },
    Op(Operation),
    End { digest: [u8; STREAM_DIGEST_LEN] },
}

/// Incremental delta decoder
#[derive(Debug)]
pub struct DeltaDecoder {
    input: RecordBuffer,
    phase: Phase,
    block_size: u32,
}

impl DeltaDecoder {
    pub fn new() -> Self {
        Self {
            input: RecordBuffer::default(),
            phase: Phase::Header,
            block_size: 0,
        }
    }

    /// Append received bytes
    pub fn feed(&mut self, chunk: &[u8]) {
        self.input.feed(chunk);
    }

    /// Block size from the header, once decoded
    pub fn block_size(&self) -> Option<u32> {
        (self.phase != Phase::Header).then_some(self.block_size)
    }

    /// Whether the end record has been decoded
    pub fn is_done(&self) -> bool {
        self.phase == Phase::Done
    }

    /// Bytes consumed so far
    pub fn offset(&self) -> u64 {
        self.input.offset
    }

    /// Bytes buffered that do not yet form a complete record
    pub fn buffered(&self) -> usize {
        self.input.buf.len()
    }

    /// Decode the next complete record, if one is buffered
    pub fn next_record(&mut self) -> WireResult<Option<DeltaRecord>> {
        let result = self.decode_one();
        if result.is_err() {
            self.phase = Phase::Failed;
        }
        result
    }

    /// Check that the stream ended cleanly: end record seen, nothing left over
    pub fn finish(&self) -> WireResult<()> {
        if self.phase == Phase::Done && self.input.buf.is_empty() {
            Ok(())
        } else {
            Err(self.input.end_of_stream())
        }
    }

    fn decode_one(&mut self) -> WireResult<Option<DeltaRecord>> {
        let offset = self.input.offset;
        check_phase(self.phase, offset, "delta")?;
        let Some(tag) = self.input.peek_tag() else {
            return Ok(None);
        };

        match (self.phase, tag) {
            (Phase::Header, TAG_DELTA_HEADER) => {
                if !self.input.has(DELTA_HEADER_LEN) {
                    return Ok(None);
                }
                let mut record = self.input.take(DELTA_HEADER_LEN);
                let version = record.get_u8();
                let block_size = record.get_u32_le();

                if version != WIRE_VERSION {
                    return Err(WireError::malformed(
                        offset,
                        "delta header",
                        format!("unsupported version {version}"),
                    ));
                }
                if block_size == 0 {
                    return Err(WireError::malformed(
                        offset,
                        "delta header",
                        "block size is zero",
                    ));
                }

                self.block_size = block_size;
                self.phase = Phase::Body;
                Ok(Some(DeltaRecord::Header { block_size }))
            }
            (Phase::Body, TAG_COPY) => {
                if !self.input.has(COPY_RECORD_LEN) {
                    return Ok(None);
                }
                let mut record = self.input.take(COPY_RECORD_LEN);
                let block_index = record.get_u32_le();
                Ok(Some(DeltaRecord::Op(Operation::Copy { block_index })))
            }
            (Phase::Body, TAG_LITERAL) => {
                if !self.input.has(LITERAL_PREFIX_LEN) {
                    return Ok(None);
                }
                let mut prefix = &self.input.buf[1..LITERAL_PREFIX_LEN];
                let length = prefix.get_u32_le() as usize;
                // The payload is not reserved up front; the buffer only grows
                // with bytes actually received.
                if !self.input.has(LITERAL_PREFIX_LEN + length) {
                    return Ok(None);
                }
                let mut record = self.input.take(LITERAL_PREFIX_LEN + length);
                record.advance(4);
                Ok(Some(DeltaRecord::Op(Operation::Literal {
                    data: record.to_vec(),
                })))
            }
            (Phase::Body, TAG_DELTA_END) => {
                if !self.input.has(DELTA_END_LEN) {
                    return Ok(None);
                }
                let mut record = self.input.take(DELTA_END_LEN);
                let mut digest = [0u8; STREAM_DIGEST_LEN];
                record.copy_to_slice(&mut digest);

                self.phase = Phase::Done;
                Ok(Some(DeltaRecord::End { digest }))
            }
            (Phase::Done, _) => Err(WireError::malformed(
                offset,
                "delta",
                "trailing bytes after end record",
            )),
            (Phase::Header, other) => Err(WireError::malformed(
                offset,
                "delta header",
                format!("expected header tag, got {other:#04x}"),
            )),
            (_, other) => Err(WireError::malformed(
                offset,
                "delta",
                format!("unknown tag {other:#04x}"),
            )),
        }
    }
}

impl Default for DeltaDecoder {
    fn default() -> Self {
        Self::new()
    }
}
