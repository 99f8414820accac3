//! Delta application
//!
//! Replays operations against a seekable reader over the old data, writing
//! the rebuilt stream to a sink in operation order.

use crate::checksum::STREAM_DIGEST_LEN;
use crate::delta::error::{DeltaError, DeltaResult};
use crate::delta::types::{DeltaStats, Operation};
use crate::metrics::recorder::record_patch_applied;
use std::io::{Cursor, Read, Seek, SeekFrom, Write};

/// Applies operations one at a time
///
/// Output already written is never rolled back on failure; the caller owns
/// the sink.
pub struct Patcher<R, W> {
    old: R,
    sink: W,
    block_size: u64,
    old_length: u64,
    /// Grows to the longest block copied so far
    buffer: Vec<u8>,
    hasher: blake3::Hasher,
    stats: DeltaStats,
}

impl<R: Read + Seek, W: Write> Patcher<R, W> {
    /// Bind a patcher to old data and an output sink
    ///
    /// Seeks to the end of `old` to learn its length so the final short
    /// block can be copied exactly.
    pub fn new(mut old: R, sink: W, block_size: usize) -> DeltaResult<Self> {
        if block_size == 0 {
            return Err(DeltaError::InvalidBlockSize(block_size));
        }
        let old_length = old.seek(SeekFrom::End(0)).map_err(DeltaError::SourceRead)?;

        Ok(Self {
            old,
            sink,
            block_size: block_size as u64,
            old_length,
            buffer: Vec::new(),
            hasher: blake3::Hasher::new(),
            stats: DeltaStats::default(),
        })
    }

    /// Length of the old data in bytes
    pub fn old_length(&self) -> u64 {
        self.old_length
    }

    /// Apply the next operation
    pub fn apply(&mut self, op: &Operation) -> DeltaResult<()> {
        match op {
            Operation::Copy { block_index } => {
                let offset = *block_index as u64 * self.block_size;
                if offset >= self.old_length {
                    return Err(DeltaError::BlockOutOfRange {
                        index: *block_index,
                        offset,
                        old_length: self.old_length,
                    });
                }
                let length = self.block_size.min(self.old_length - offset) as usize;
                if self.buffer.len() < length {
                    self.buffer.resize(length, 0);
                }

                self.old
                    .seek(SeekFrom::Start(offset))
                    .map_err(DeltaError::SourceRead)?;
                let block = &mut self.buffer[..length];
                self.old.read_exact(block).map_err(DeltaError::SourceRead)?;

                self.sink.write_all(block).map_err(DeltaError::SinkWrite)?;
                self.hasher.update(block);
                self.stats.record_copy(length as u64);
            }
            Operation::Literal { data } => {
                self.sink.write_all(data).map_err(DeltaError::SinkWrite)?;
                self.hasher.update(data);
                self.stats.record_literal(data.len() as u64);
            }
        }
        Ok(())
    }

    /// Bytes written so far
    pub fn bytes_written(&self) -> u64 {
        self.stats.target_size()
    }

    /// Statistics of the operations applied so far
    pub fn stats(&self) -> DeltaStats {
        self.stats
    }

    /// BLAKE3 digest of everything written so far
    pub fn digest(&self) -> [u8; STREAM_DIGEST_LEN] {
        *self.hasher.finalize().as_bytes()
    }

    /// Flush the sink
    pub fn flush(&mut self) -> DeltaResult<()> {
        self.sink.flush().map_err(DeltaError::SinkWrite)
    }

    /// Flush and hand back the sink
    pub fn into_sink(mut self) -> DeltaResult<W> {
        self.flush()?;
        record_patch_applied(&self.stats);
        Ok(self.sink)
    }
}

/// Apply a sequence of operations from `old` into `sink`
pub fn apply_delta<R, W, I>(old: R, sink: W, block_size: usize, ops: I) -> DeltaResult<DeltaStats>
where
    R: Read + Seek,
    W: Write,
    I: IntoIterator,
    I::Item: std::borrow::Borrow<Operation>,
{
    use std::borrow::Borrow;

    let mut patcher = Patcher::new(old, sink, block_size)?;
    for op in ops {
        patcher.apply(op.borrow())?;
    }
    let stats = patcher.stats();
    patcher.into_sink()?;
    Ok(stats)
}

/// Apply operations to in-memory old data
pub fn apply_to_vec(old: &[u8], block_size: usize, ops: &[Operation]) -> DeltaResult<Vec<u8>> {
    let mut output = Vec::with_capacity(old.len());
    apply_delta(Cursor::new(old), &mut output, block_size, ops)?;
    Ok(output)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::ErrorKind;

    #[test]
    fn test_copy_and_literal() {
        let old = b"0123456789abcdef";
        let ops = vec![
            Operation::Copy { block_index: 2 },
            Operation::Literal { data: b"--".to_vec() },
            Operation::Copy { block_index: 0 },
        ];
        let out = apply_to_vec(old, 4, &ops).unwrap();
        assert_eq!(out, b"89ab--0123");
    }

    #[test]
    fn test_final_short_block_is_copied_exactly() {
        let old = b"0123456789";
        let ops = vec![Operation::Copy { block_index: 2 }];
        assert_eq!(apply_to_vec(old, 4, &ops).unwrap(), b"89");
    }

    #[test]
    fn test_block_out_of_range() {
        let old = b"01234567";
        let ops = vec![Operation::Copy { block_index: 2 }];
        let err = apply_to_vec(old, 4, &ops).unwrap_err();
        assert!(matches!(
            err,
            DeltaError::BlockOutOfRange {
                index: 2,
                offset: 8,
                old_length: 8
            }
        ));
    }

    #[test]
    fn test_sink_failure_surfaces() {
        struct FullDisk;
        impl Write for FullDisk {
            fn write(&mut self, _buf: &[u8]) -> std::io::Result<usize> {
                Err(std::io::Error::new(ErrorKind::Other, "no space left"))
            }
            fn flush(&mut self) -> std::io::Result<()> {
                Ok(())
            }
        }

        let mut patcher = Patcher::new(Cursor::new(b"abcd"), FullDisk, 4).unwrap();
        let err = patcher
            .apply(&Operation::Literal { data: b"x".to_vec() })
            .unwrap_err();
        assert!(matches!(err, DeltaError::SinkWrite(_)));
    }

    #[test]
    fn test_digest_and_stats_track_output() {
        let old = b"abcdefgh";
        let mut output = Vec::new();
        let mut patcher = Patcher::new(Cursor::new(old), &mut output, 4).unwrap();
        patcher.apply(&Operation::Copy { block_index: 1 }).unwrap();
        patcher
            .apply(&Operation::Literal { data: b"XY".to_vec() })
            .unwrap();

        assert_eq!(patcher.bytes_written(), 6);
        assert_eq!(patcher.old_length(), 8);
        assert_eq!(patcher.digest(), *blake3::hash(b"efghXY").as_bytes());
        patcher.into_sink().unwrap();
        assert_eq!(output, b"efghXY");
    }

    #[test]
    fn test_huge_block_size_buffers_only_old_data() {
        let old = b"short old data";
        let mut output = Vec::new();
        let mut patcher = Patcher::new(Cursor::new(old), &mut output, u32::MAX as usize).unwrap();
        assert_eq!(patcher.buffer.capacity(), 0);

        patcher.apply(&Operation::Copy { block_index: 0 }).unwrap();
        assert!(patcher.buffer.len() <= old.len());
        patcher.into_sink().unwrap();
        assert_eq!(output, old);
    }

    #[test]
    fn test_zero_block_size_rejected() {
        let result = Patcher::new(Cursor::new(b""), Vec::new(), 0);
        assert!(matches!(result, Err(DeltaError::InvalidBlockSize(0))));
    }
}
