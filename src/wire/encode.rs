//! Encoders
//!
//! Producers keep a queue of encoded bytes and only pull the next block or
//! operation from their source once the queue has been drained, so output
//! can be taken in buffers of any size. Records may straddle calls.

use crate::checksum::{STREAM_DIGEST_LEN, STRONG_HASH_LEN};
use crate::delta::{DeltaIter, DeltaStats, Operation};
use crate::signature::{BlockHash, Signature, SignatureIter, SignatureResult};
use crate::wire::error::WireResult;
use crate::wire::format::*;
use bytes::{Buf, BufMut, BytesMut};
use std::io::{self, Read};

pub(crate) fn put_signature_header(out: &mut BytesMut, block_size: u32) {
    out.put_u8(TAG_SIGNATURE_HEADER);
    out.put_u8(WIRE_VERSION);
    out.put_u8(STRONG_HASH_LEN as u8);
    out.put_u32_le(block_size);
}

pub(crate) fn put_block(out: &mut BytesMut, block: &BlockHash) {
    out.put_u8(TAG_BLOCK);
    out.put_u32_le(block.index);
    out.put_u32_le(block.weak);
    out.put_u32_le(block.length);
    out.put_slice(&block.strong);
}

pub(crate) fn put_signature_end(out: &mut BytesMut, block_count: u32, total_length: u64) {
    out.put_u8(TAG_SIGNATURE_END);
    out.put_u32_le(block_count);
    out.put_u64_le(total_length);
}

pub(crate) fn put_delta_header(out: &mut BytesMut, block_size: u32) {
    out.put_u8(TAG_DELTA_HEADER);
    out.put_u8(WIRE_VERSION);
    out.put_u32_le(block_size);
}

pub(crate) fn put_operation(out: &mut BytesMut, op: &Operation) {
    match op {
        Operation::Copy { block_index } => {
            out.put_u8(TAG_COPY);
            out.put_u32_le(*block_index);
        }
        Operation::Literal { data } if data.is_empty() => {
            out.put_u8(TAG_LITERAL);
            out.put_u32_le(0);
        }
        Operation::Literal { data } => {
            for piece in data.chunks(MAX_LITERAL_RECORD) {
                out.reserve(LITERAL_PREFIX_LEN + piece.len());
                out.put_u8(TAG_LITERAL);
                out.put_u32_le(piece.len() as u32);
                out.put_slice(piece);
            }
        }
    }
}

pub(crate) fn put_delta_end(out: &mut BytesMut, digest: &[u8; STREAM_DIGEST_LEN]) {
    out.put_u8(TAG_DELTA_END);
    out.put_slice(digest);
}

/// Copy as much of `out` as fits into `buf`, pulling more via `produce`
/// whenever `out` runs dry. `produce` returns `false` once exhausted.
fn drain_into<F>(out: &mut BytesMut, buf: &mut [u8], mut produce: F) -> WireResult<Fill>
where
    F: FnMut(&mut BytesMut) -> WireResult<bool>,
{
    if buf.is_empty() {
        return Ok(Fill::Filled(0));
    }

    let mut written = 0;
    while written < buf.len() {
        if out.is_empty() && !produce(out)? {
            break;
        }
        let n = out.len().min(buf.len() - written);
        buf[written..written + n].copy_from_slice(&out[..n]);
        out.advance(n);
        written += n;
    }

    if written == 0 {
        Ok(Fill::End)
    } else {
        Ok(Fill::Filled(written))
    }
}

fn to_io_error(err: crate::wire::WireError) -> io::Error {
    io::Error::new(io::ErrorKind::Other, err)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    Header,
    Body,
    Done,
}

/// Lazily serializes a signature as its blocks are produced
pub struct SignatureEncoder<I> {
    blocks: I,
    block_size: u32,
    phase: Phase,
    out: BytesMut,
    block_count: u32,
    total_length: u64,
}

impl<I> SignatureEncoder<I>
where
    I: Iterator<Item = SignatureResult<BlockHash>>,
{
    /// Encode blocks pulled from `blocks`, all sized `block_size` but the last
    pub fn new(block_size: u32, blocks: I) -> Self {
        Self {
            blocks,
            block_size,
            phase: Phase::Header,
            out: BytesMut::new(),
            block_count: 0,
            total_length: 0,
        }
    }

    /// Fill `buf` with the next encoded bytes
    ///
    /// Returns [`Fill::End`] once the end record has been handed out. An
    /// empty `buf` yields `Fill::Filled(0)`.
    pub fn fill(&mut self, buf: &mut [u8]) -> WireResult<Fill> {
        let Self {
            blocks,
            block_size,
            phase,
            out,
            block_count,
            total_length,
        } = self;

        drain_into(out, buf, |out| match *phase {
            Phase::Header => {
                put_signature_header(out, *block_size);
                *phase = Phase::Body;
                Ok(true)
            }
            Phase::Body => match blocks.next() {
                Some(Ok(block)) => {
                    put_block(out, &block);
                    *block_count += 1;
                    *total_length += block.length as u64;
                    Ok(true)
                }
                Some(Err(e)) => {
                    *phase = Phase::Done;
                    Err(e.into())
                }
                None => {
                    put_signature_end(out, *block_count, *total_length);
                    *phase = Phase::Done;
                    Ok(true)
                }
            },
            Phase::Done => Ok(false),
        })
    }

    pub fn block_size(&self) -> u32 {
        self.block_size
    }

    /// Blocks encoded so far
    pub fn block_count(&self) -> u32 {
        self.block_count
    }

    /// Old-data bytes covered by the blocks encoded so far
    pub fn total_length(&self) -> u64 {
        self.total_length
    }
}

impl<R: Read> SignatureEncoder<SignatureIter<R>> {
    /// Encode a lazily built signature
    pub fn from_blocks(blocks: SignatureIter<R>) -> Self {
        Self::new(blocks.block_size(), blocks)
    }
}

impl<I> Read for SignatureEncoder<I>
where
    I: Iterator<Item = SignatureResult<BlockHash>>,
{
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.fill(buf).map(Fill::written).map_err(to_io_error)
    }
}

/// Lazily serializes the delta computed by a [`DeltaIter`]
pub struct DeltaEncoder<R> {
    ops: DeltaIter<R>,
    block_size: u32,
    phase: Phase,
    out: BytesMut,
}

impl<R: Read> DeltaEncoder<R> {
    /// Encode the operations of `ops` against blocks of `block_size`
    pub fn new(block_size: u32, ops: DeltaIter<R>) -> Self {
        Self {
            ops,
            block_size,
            phase: Phase::Header,
            out: BytesMut::new(),
        }
    }

    /// Fill `buf` with the next encoded bytes
    ///
    /// Returns [`Fill::End`] once the end record has been handed out.
    pub fn fill(&mut self, buf: &mut [u8]) -> WireResult<Fill> {
        let Self {
            ops,
            block_size,
            phase,
            out,
        } = self;

        drain_into(out, buf, |out| match *phase {
            Phase::Header => {
                put_delta_header(out, *block_size);
                *phase = Phase::Body;
                Ok(true)
            }
            Phase::Body => match ops.next() {
                Some(Ok(op)) => {
                    put_operation(out, &op);
                    Ok(true)
                }
                Some(Err(e)) => {
                    *phase = Phase::Done;
                    Err(e.into())
                }
                None => {
                    put_delta_end(out, &ops.digest());
                    *phase = Phase::Done;
                    Ok(true)
                }
            },
            Phase::Done => Ok(false),
        })
    }

    pub fn block_size(&self) -> u32 {
        self.block_size
    }

    /// Statistics of the operations encoded so far
    pub fn stats(&self) -> DeltaStats {
        self.ops.stats()
    }
}

impl<R: Read> Read for DeltaEncoder<R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.fill(buf).map(Fill::written).map_err(to_io_error)
    }
}

/// Serialize a complete signature
pub fn encode_signature(signature: &Signature) -> Vec<u8> {
    let mut out = BytesMut::with_capacity(
        SIGNATURE_HEADER_LEN + signature.block_count() * BLOCK_RECORD_LEN + SIGNATURE_END_LEN,
    );
    put_signature_header(&mut out, signature.block_size);
    for block in &signature.blocks {
        put_block(&mut out, block);
    }
    put_signature_end(
        &mut out,
        signature.block_count() as u32,
        signature.total_length,
    );
    out.to_vec()
}

/// Serialize a complete operation sequence with its end digest
pub fn encode_operations(
    block_size: u32,
    ops: &[Operation],
    digest: &[u8; STREAM_DIGEST_LEN],
) -> Vec<u8> {
    let mut out = BytesMut::new();
    put_delta_header(&mut out, block_size);
    for op in ops {
        put_operation(&mut out, op);
    }
    put_delta_end(&mut out, digest);
    out.to_vec()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::delta::DeltaComputer;
    use crate::signature::SignatureBuilder;

    fn drain<F: FnMut(&mut [u8]) -> WireResult<Fill>>(mut fill: F, chunk: usize) -> Vec<u8> {
        let mut encoded = Vec::new();
        let mut buf = vec![0u8; chunk];
        loop {
            match fill(&mut buf).unwrap() {
                Fill::Filled(n) => encoded.extend_from_slice(&buf[..n]),
                Fill::End => break,
            }
        }
        encoded
    }

    #[test]
    fn test_signature_layout() {
        let sig = SignatureBuilder::new()
            .block_size(4)
            .build_from_bytes(b"abcdef")
            .unwrap();
        let encoded = encode_signature(&sig);

        assert_eq!(
            encoded.len(),
            SIGNATURE_HEADER_LEN + 2 * BLOCK_RECORD_LEN + SIGNATURE_END_LEN
        );
        assert_eq!(&encoded[..SIGNATURE_HEADER_LEN], &[b'S', 1, 16, 4, 0, 0, 0]);
        assert_eq!(encoded[SIGNATURE_HEADER_LEN], TAG_BLOCK);

        let end = &encoded[encoded.len() - SIGNATURE_END_LEN..];
        assert_eq!(end, &[b'E', 2, 0, 0, 0, 6, 0, 0, 0, 0, 0, 0, 0]);
    }

    #[test]
    fn test_lazy_signature_matches_eager_at_any_chunk_size() {
        let data = b"streaming signature encoder ".repeat(20);
        let builder = SignatureBuilder::new().block_size(16);
        let expected = encode_signature(&builder.build_from_bytes(&data).unwrap());

        for chunk in [1, 3, 29, 64, 4096] {
            let mut encoder = SignatureEncoder::from_blocks(builder.iter(&data[..]).unwrap());
            let encoded = drain(|buf| encoder.fill(buf), chunk);
            assert_eq!(encoded, expected, "chunk size {chunk}");
            assert_eq!(encoder.total_length(), data.len() as u64);
        }
    }

    #[test]
    fn test_end_is_sticky() {
        let mut encoder = SignatureEncoder::from_blocks(
            SignatureBuilder::new().block_size(4).iter(&b""[..]).unwrap(),
        );
        let mut buf = [0u8; 64];
        let first = encoder.fill(&mut buf).unwrap();
        assert_eq!(first, Fill::Filled(SIGNATURE_HEADER_LEN + SIGNATURE_END_LEN));
        assert_eq!(encoder.fill(&mut buf).unwrap(), Fill::End);
        assert_eq!(encoder.fill(&mut buf).unwrap(), Fill::End);
        assert_eq!(encoder.fill(&mut []).unwrap(), Fill::Filled(0));
    }

    #[test]
    fn test_delta_encoder_matches_encode_operations() {
        let old = b"0123456789abcdef".repeat(8);
        let mut new = old.clone();
        new[20] = b'#';

        let sig = SignatureBuilder::new().block_size(16).build_from_bytes(&old).unwrap();
        let computer = DeltaComputer::new(sig);
        let ops = computer.compute(&new[..]).unwrap();
        let expected = encode_operations(16, &ops, blake3::hash(&new).as_bytes());

        let mut encoder = DeltaEncoder::new(16, computer.iter(&new[..]).unwrap());
        let encoded = drain(|buf| encoder.fill(buf), 7);
        assert_eq!(encoded, expected);
        assert_eq!(encoder.stats().literal_bytes, 16);
    }

    #[test]
    fn test_literal_record_layout() {
        let mut out = BytesMut::new();
        put_operation(&mut out, &Operation::Literal { data: b"xyz".to_vec() });
        put_operation(&mut out, &Operation::Copy { block_index: 258 });
        assert_eq!(&out[..], &[b'L', 3, 0, 0, 0, b'x', b'y', b'z', b'C', 2, 1, 0, 0]);
    }

    #[test]
    fn test_encoder_as_reader() {
        let data = vec![9u8; 100];
        let mut encoder = SignatureEncoder::from_blocks(
            SignatureBuilder::new().block_size(10).iter(&data[..]).unwrap(),
        );
        let mut encoded = Vec::new();
        encoder.read_to_end(&mut encoded).unwrap();

        let sig = SignatureBuilder::new().block_size(10).build_from_bytes(&data).unwrap();
        assert_eq!(encoded, encode_signature(&sig));
    }
}
