//! Patch session
//!
//! Decodes an encoded delta as it arrives and applies each complete
//! operation to the old data immediately, so neither the delta nor the
//! rebuilt data is ever held in full.

use crate::config::EngineConfig;
use crate::delta::{DeltaStats, Patcher};
use crate::session::delta::DeltaStream;
use crate::session::error::{SessionError, SessionResult};
use crate::session::lifecycle::Lifecycle;
use crate::session::types::SessionState;
use crate::wire::{DeltaRecord, WireError};
use std::io::{Read, Seek, Write};
use uuid::Uuid;

/// Old data and sink, before and after the delta header fixes the block size
enum Target<R, W> {
    Waiting { old: R, sink: W },
    Patching(Patcher<R, W>),
}

/// Push-based delta application
pub struct PatchSession<R, W> {
    lifecycle: Lifecycle,
    stream: DeltaStream,
    verify_checksum: bool,
    target: Option<Target<R, W>>,
    expected_digest: Option<[u8; 32]>,
}

impl<R: Read + Seek, W: Write> PatchSession<R, W> {
    /// Session configured from `config`
    ///
    /// A fixed `block_size` in the config becomes the block size the delta
    /// header must carry.
    pub fn new(config: &EngineConfig) -> Self {
        let expected = config.block_size.and_then(|size| u32::try_from(size).ok());
        Self {
            lifecycle: Lifecycle::new("patch"),
            stream: DeltaStream::new(expected),
            verify_checksum: config.verify_checksum,
            target: None,
            expected_digest: None,
        }
    }

    /// Require the delta header to carry `block_size`
    pub fn expect_block_size(mut self, block_size: u32) -> Self {
        self.stream = DeltaStream::new(Some(block_size));
        self
    }

    pub fn id(&self) -> Uuid {
        self.lifecycle.id()
    }

    pub fn state(&self) -> &SessionState {
        self.lifecycle.state()
    }

    /// Bind the old data and the output sink
    pub fn start(&mut self, old: R, sink: W) -> SessionResult<()> {
        self.lifecycle.start()?;
        self.target = Some(Target::Waiting { old, sink });
        Ok(())
    }

    /// Accept the next chunk of the encoded delta and apply every complete
    /// operation in it
    pub fn update(&mut self, chunk: &[u8]) -> SessionResult<()> {
        self.lifecycle.ensure_active("update")?;
        self.stream.feed(chunk);

        loop {
            match self.apply_next() {
                Ok(true) => {}
                Ok(false) => return Ok(()),
                Err(e) => return Err(self.lifecycle.fail(e)),
            }
        }
    }

    /// Decode and apply one record; `false` when more input is needed
    fn apply_next(&mut self) -> SessionResult<bool> {
        let Some(record) = self.stream.next_record()? else {
            return Ok(false);
        };

        match record {
            DeltaRecord::Header { block_size } => {
                if let Some(Target::Waiting { old, sink }) = self.target.take() {
                    let patcher = Patcher::new(old, sink, block_size as usize)?;
                    self.target = Some(Target::Patching(patcher));
                }
            }
            DeltaRecord::Op(op) => {
                if let Some(Target::Patching(patcher)) = self.target.as_mut() {
                    patcher.apply(&op)?;
                }
            }
            DeltaRecord::End { digest } => self.expected_digest = Some(digest),
        }
        Ok(true)
    }

    /// Statistics of the operations applied so far
    pub fn stats(&self) -> DeltaStats {
        match &self.target {
            Some(Target::Patching(patcher)) => patcher.stats(),
            _ => DeltaStats::default(),
        }
    }

    /// Check the delta is complete, verify the rebuilt data and hand back
    /// the sink
    pub fn finish(&mut self) -> SessionResult<W> {
        self.lifecycle.ensure_active("finish")?;
        match self.complete() {
            Ok(sink) => {
                self.lifecycle.finish();
                Ok(sink)
            }
            Err(e) => Err(self.lifecycle.fail(e)),
        }
    }

    fn complete(&mut self) -> SessionResult<W> {
        self.stream.finish()?;
        let (Some(Target::Patching(patcher)), Some(expected)) =
            (self.target.take(), self.expected_digest)
        else {
            return Err(WireError::UnexpectedEndOfStream {
                offset: 0,
                buffered: 0,
            }
            .into());
        };

        let actual = patcher.digest();
        if self.verify_checksum && actual != expected {
            tracing::warn!(
                session = %self.lifecycle.id(),
                bytes = patcher.bytes_written(),
                "rebuilt data failed checksum verification"
            );
            return Err(SessionError::ChecksumMismatch { expected, actual });
        }

        let stats = patcher.stats();
        let sink = patcher.into_sink()?;
        tracing::debug!(
            session = %self.lifecycle.id(),
            copied = stats.copied_bytes,
            literal = stats.literal_bytes,
            "patch applied"
        );
        Ok(sink)
    }
}
