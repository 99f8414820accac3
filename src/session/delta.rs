//! Delta sessions
//!
//! The producer scans new data against a signature and serves the encoded
//! delta a buffer at a time; the consumer decodes that stream back into
//! operations.

use crate::checksum::STREAM_DIGEST_LEN;
use crate::config::EngineConfig;
use crate::delta::{DeltaComputer, DeltaStats, Operation};
use crate::session::error::{SessionError, SessionResult};
use crate::session::lifecycle::Lifecycle;
use crate::session::types::SessionState;
use crate::signature::{BlockIndex, Signature};
use crate::wire::{DeltaDecoder, DeltaEncoder, DeltaRecord, Fill, WireError, WireResult};
use std::collections::VecDeque;
use std::io::Read;
use std::sync::Arc;
use uuid::Uuid;

/// Pull-based delta producer
pub struct DeltaProducer<R> {
    lifecycle: Lifecycle,
    computer: DeltaComputer,
    encoder: Option<DeltaEncoder<R>>,
}

impl<R: Read> DeltaProducer<R> {
    pub fn new(signature: Signature, config: &EngineConfig) -> Self {
        Self::from_index(Arc::new(BlockIndex::new(signature)), config)
    }

    /// Producer sharing a prebuilt index with other computations
    pub fn from_index(index: Arc<BlockIndex>, config: &EngineConfig) -> Self {
        Self {
            lifecycle: Lifecycle::new("delta_producer"),
            computer: DeltaComputer::from_index(index).with_config(config),
            encoder: None,
        }
    }

    pub fn id(&self) -> Uuid {
        self.lifecycle.id()
    }

    pub fn state(&self) -> &SessionState {
        self.lifecycle.state()
    }

    /// Bind the new data
    pub fn start(&mut self, reader: R) -> SessionResult<()> {
        self.lifecycle.start()?;
        match self.computer.iter(reader) {
            Ok(ops) => {
                let block_size = self.computer.index().block_size() as u32;
                tracing::debug!(session = %self.lifecycle.id(), block_size, "scanning new data");
                self.encoder = Some(DeltaEncoder::new(block_size, ops));
                Ok(())
            }
            Err(e) => Err(self.lifecycle.fail(e)),
        }
    }

    /// Write the next bytes of the encoded delta into `buf`
    ///
    /// Returns [`Fill::End`] once everything has been produced, and keeps
    /// returning it afterwards.
    pub fn fill(&mut self, buf: &mut [u8]) -> SessionResult<Fill> {
        if self.lifecycle.state().is_finished() {
            return Ok(Fill::End);
        }
        self.lifecycle.ensure_active("fill")?;
        let Some(encoder) = self.encoder.as_mut() else {
            return Err(self.lifecycle.fail(WireError::UnexpectedEndOfStream {
                offset: 0,
                buffered: 0,
            }));
        };

        match encoder.fill(buf) {
            Ok(Fill::End) => {
                let stats = encoder.stats();
                tracing::debug!(
                    session = %self.lifecycle.id(),
                    copied = stats.copied_bytes,
                    literal = stats.literal_bytes,
                    "delta produced"
                );
                self.lifecycle.finish();
                Ok(Fill::End)
            }
            Ok(filled) => Ok(filled),
            Err(e) => Err(self.lifecycle.fail(e)),
        }
    }

    /// Statistics of the operations produced so far
    pub fn stats(&self) -> DeltaStats {
        self.encoder
            .as_ref()
            .map(DeltaEncoder::stats)
            .unwrap_or_default()
    }
}

/// Delta decoder that also checks the header against an expected block size
#[derive(Debug)]
pub(crate) struct DeltaStream {
    decoder: DeltaDecoder,
    expected_block_size: Option<u32>,
}

impl DeltaStream {
    pub(crate) fn new(expected_block_size: Option<u32>) -> Self {
        Self {
            decoder: DeltaDecoder::new(),
            expected_block_size,
        }
    }

    pub(crate) fn feed(&mut self, chunk: &[u8]) {
        self.decoder.feed(chunk);
    }

    pub(crate) fn next_record(&mut self) -> WireResult<Option<DeltaRecord>> {
        let offset = self.decoder.offset();
        let record = self.decoder.next_record()?;
        if let (Some(DeltaRecord::Header { block_size }), Some(expected)) =
            (&record, self.expected_block_size)
        {
            if *block_size != expected {
                return Err(WireError::malformed(
                    offset,
                    "delta header",
                    format!("block size {block_size} does not match expected {expected}"),
                ));
            }
        }
        Ok(record)
    }

    pub(crate) fn finish(&self) -> WireResult<()> {
        self.decoder.finish()
    }

    pub(crate) fn block_size(&self) -> Option<u32> {
        self.decoder.block_size()
    }
}

/// Push-based delta consumer
pub struct DeltaConsumer {
    lifecycle: Lifecycle,
    stream: DeltaStream,
    queue: VecDeque<Operation>,
    digest: Option<[u8; STREAM_DIGEST_LEN]>,
}

impl DeltaConsumer {
    pub fn new() -> Self {
        Self::with_expected_block_size(None)
    }

    /// Consumer that rejects a delta header with a different block size
    pub fn with_expected_block_size(block_size: Option<u32>) -> Self {
        Self {
            lifecycle: Lifecycle::new("delta_consumer"),
            stream: DeltaStream::new(block_size),
            queue: VecDeque::new(),
            digest: None,
        }
    }

    pub fn id(&self) -> Uuid {
        self.lifecycle.id()
    }

    pub fn state(&self) -> &SessionState {
        self.lifecycle.state()
    }

    /// Block size from the delta header, once received
    pub fn block_size(&self) -> Option<u32> {
        self.stream.block_size()
    }

    pub fn start(&mut self) -> SessionResult<()> {
        self.lifecycle.start()
    }

    /// Accept the next chunk of the encoded delta, queueing complete operations
    pub fn update(&mut self, chunk: &[u8]) -> SessionResult<()> {
        self.lifecycle.ensure_active("update")?;
        self.stream.feed(chunk);

        loop {
            match self.stream.next_record() {
                Ok(Some(DeltaRecord::Header { .. })) => {}
                Ok(Some(DeltaRecord::Op(op))) => self.queue.push_back(op),
                Ok(Some(DeltaRecord::End { digest })) => self.digest = Some(digest),
                Ok(None) => return Ok(()),
                Err(e) => return Err(self.lifecycle.fail(e)),
            }
        }
    }

    /// Take the next decoded operation
    pub fn next_operation(&mut self) -> Option<Operation> {
        self.queue.pop_front()
    }

    /// Check the stream is complete and return the digest from its trailer
    ///
    /// Operations still queued remain available through
    /// [`next_operation`](Self::next_operation).
    pub fn finish(&mut self) -> SessionResult<[u8; STREAM_DIGEST_LEN]> {
        self.lifecycle.ensure_active("finish")?;
        let digest = match (self.stream.finish(), self.digest) {
            (Ok(()), Some(digest)) => digest,
            (Err(e), _) => return Err(self.lifecycle.fail(e)),
            (Ok(()), None) => {
                return Err(self.lifecycle.fail(SessionError::Wire(
                    WireError::UnexpectedEndOfStream {
                        offset: 0,
                        buffered: 0,
                    },
                )))
            }
        };
        self.lifecycle.finish();
        Ok(digest)
    }
}

impl Default for DeltaConsumer {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::delta::apply_to_vec;
    use crate::signature::SignatureBuilder;

    fn signature_of(data: &[u8], block_size: usize) -> Signature {
        SignatureBuilder::new()
            .block_size(block_size)
            .build_from_bytes(data)
            .unwrap()
    }

    fn produce(signature: Signature, new: &[u8], chunk: usize) -> (Vec<u8>, DeltaStats) {
        let mut producer = DeltaProducer::new(signature, &EngineConfig::default());
        producer.start(new).unwrap();
        let mut out = Vec::new();
        let mut buf = vec![0u8; chunk];
        while let Fill::Filled(n) = producer.fill(&mut buf).unwrap() {
            out.extend_from_slice(&buf[..n]);
        }
        assert!(producer.state().is_finished());
        (out, producer.stats())
    }

    #[test]
    fn test_producer_consumer_roundtrip() {
        let old = b"The quick brown fox jumps over the lazy dog. ".repeat(8);
        let mut new = old.clone();
        let tail = new.split_off(100);
        new.extend_from_slice(b"INSERTED");
        new.extend_from_slice(&tail);

        let (encoded, stats) = produce(signature_of(&old, 16), &new, 5);
        assert_eq!(stats.target_size(), new.len() as u64);
        assert!(stats.copied_bytes > 0);

        let mut consumer = DeltaConsumer::with_expected_block_size(Some(16));
        consumer.start().unwrap();
        let mut ops = Vec::new();
        for piece in encoded.chunks(7) {
            consumer.update(piece).unwrap();
            while let Some(op) = consumer.next_operation() {
                ops.push(op);
            }
        }
        let digest = consumer.finish().unwrap();

        assert_eq!(consumer.block_size(), Some(16));
        assert_eq!(digest, *blake3::hash(&new).as_bytes());
        assert_eq!(apply_to_vec(&old, 16, &ops).unwrap(), new);
    }

    #[test]
    fn test_block_size_mismatch_is_malformed() {
        let old = vec![1u8; 64];
        let (encoded, _) = produce(signature_of(&old, 16), &old, 64);

        let mut consumer = DeltaConsumer::with_expected_block_size(Some(32));
        consumer.start().unwrap();
        let err = consumer.update(&encoded).unwrap_err();
        assert!(matches!(
            err,
            SessionError::Wire(WireError::MalformedRecord { offset: 0, .. })
        ));
        assert!(consumer.state().is_failed());
    }

    #[test]
    fn test_producer_stats_before_start() {
        let producer: DeltaProducer<&[u8]> =
            DeltaProducer::new(Signature::new(16), &EngineConfig::default());
        assert_eq!(producer.stats(), DeltaStats::default());
    }

    #[test]
    fn test_producer_start_twice() {
        let mut producer = DeltaProducer::new(Signature::new(16), &EngineConfig::default());
        producer.start(&b"abc"[..]).unwrap();
        let err = producer.start(&b"abc"[..]).unwrap_err();
        assert!(err.is_usage_error());
        assert!(producer.state().is_active());
    }

    #[test]
    fn test_consumer_missing_trailer() {
        let old = vec![9u8; 40];
        let (encoded, _) = produce(signature_of(&old, 16), &old, 64);

        let mut consumer = DeltaConsumer::new();
        consumer.start().unwrap();
        consumer.update(&encoded[..encoded.len() - 33]).unwrap();
        let err = consumer.finish().unwrap_err();
        assert!(matches!(
            err,
            SessionError::Wire(WireError::UnexpectedEndOfStream { buffered: 0, .. })
        ));
    }
}
