//! Signature sessions
//!
//! The producer hashes old data and serves the encoded signature a buffer at
//! a time; the consumer accepts that stream in arbitrary chunks and rebuilds
//! an equal [`Signature`].

use crate::config::EngineConfig;
use crate::session::error::{SessionError, SessionResult};
use crate::session::lifecycle::Lifecycle;
use crate::session::types::SessionState;
use crate::signature::layout::block_count;
use crate::signature::{Signature, SignatureBuilder, SignatureIter};
use crate::wire::{Fill, SignatureDecoder, SignatureEncoder, SignatureRecord, WireError};
use std::io::Read;
use uuid::Uuid;

/// Pull-based signature producer
pub struct SignatureProducer<R> {
    lifecycle: Lifecycle,
    config: EngineConfig,
    encoder: Option<SignatureEncoder<SignatureIter<R>>>,
}

impl<R: Read> SignatureProducer<R> {
    pub fn new(config: EngineConfig) -> Self {
        Self {
            lifecycle: Lifecycle::new("signature_producer"),
            config,
            encoder: None,
        }
    }

    pub fn id(&self) -> Uuid {
        self.lifecycle.id()
    }

    pub fn state(&self) -> &SessionState {
        self.lifecycle.state()
    }

    /// Block size in use, once started
    pub fn block_size(&self) -> Option<u32> {
        self.encoder.as_ref().map(SignatureEncoder::block_size)
    }

    /// Bind the old data
    ///
    /// `total_length_hint` picks the block size when the config leaves it
    /// open; pass 0 when the length is unknown.
    pub fn start(&mut self, reader: R, total_length_hint: u64) -> SessionResult<()> {
        self.lifecycle.start()?;

        let builder = SignatureBuilder::from_config(&self.config, total_length_hint);
        let prepared = self
            .config
            .validate()
            .map_err(SessionError::from)
            .and_then(|()| builder.iter(reader).map_err(SessionError::from));

        match prepared {
            Ok(blocks) => {
                tracing::debug!(
                    session = %self.id(),
                    block_size = builder.get_block_size(),
                    expected_blocks = block_count(total_length_hint, builder.get_block_size()),
                    "hashing old data"
                );
                self.encoder = Some(SignatureEncoder::from_blocks(blocks));
                Ok(())
            }
            Err(e) => Err(self.lifecycle.fail(e)),
        }
    }

    /// Write the next bytes of the encoded signature into `buf`
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
                tracing::debug!(
                    session = %self.lifecycle.id(),
                    blocks = encoder.block_count(),
                    bytes = encoder.total_length(),
                    "signature produced"
                );
                self.lifecycle.finish();
                Ok(Fill::End)
            }
            Ok(filled) => Ok(filled),
            Err(e) => Err(self.lifecycle.fail(e)),
        }
    }
}

/// Push-based signature consumer
pub struct SignatureConsumer {
    lifecycle: Lifecycle,
    decoder: SignatureDecoder,
    signature: Option<Signature>,
}

impl SignatureConsumer {
    pub fn new() -> Self {
        Self {
            lifecycle: Lifecycle::new("signature_consumer"),
            decoder: SignatureDecoder::new(),
            signature: None,
        }
    }

    pub fn id(&self) -> Uuid {
        self.lifecycle.id()
    }

    pub fn state(&self) -> &SessionState {
        self.lifecycle.state()
    }

    pub fn start(&mut self) -> SessionResult<()> {
        self.lifecycle.start()
    }

    /// Accept the next chunk of the encoded signature
    pub fn update(&mut self, chunk: &[u8]) -> SessionResult<()> {
        self.lifecycle.ensure_active("update")?;
        self.decoder.feed(chunk);

        loop {
            match self.decoder.next_record() {
                Ok(Some(SignatureRecord::Header { block_size })) => {
                    self.signature = Some(Signature::new(block_size));
                }
                Ok(Some(SignatureRecord::Block(block))) => {
                    if let Some(signature) = self.signature.as_mut() {
                        signature.push(block);
                    }
                }
                Ok(Some(SignatureRecord::End { .. })) | Ok(None) => return Ok(()),
                Err(e) => return Err(self.lifecycle.fail(e)),
            }
        }
    }

    /// Check the stream is complete and take the signature
    pub fn finish(&mut self) -> SessionResult<Signature> {
        self.lifecycle.ensure_active("finish")?;
        if let Err(e) = self.decoder.finish() {
            return Err(self.lifecycle.fail(e));
        }
        let Some(signature) = self.signature.take() else {
            return Err(self.lifecycle.fail(WireError::UnexpectedEndOfStream {
                offset: self.decoder.offset(),
                buffered: 0,
            }));
        };

        tracing::debug!(
            session = %self.lifecycle.id(),
            blocks = signature.block_count(),
            block_size = signature.block_size,
            "signature received"
        );
        self.lifecycle.finish();
        Ok(signature)
    }
}

impl Default for SignatureConsumer {
    fn default() -> Self {
        Self::new()
    }
}
