use crate::delta::DeltaError;
use crate::signature::SignatureError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum WireError {
    #[error("Malformed {record} record at byte {offset}: {reason}")]
    MalformedRecord {
        offset: u64,
        record: &'static str,
        reason: String,
    },

    #[error("Unexpected end of stream at byte {offset} ({buffered} bytes of an incomplete record buffered)")]
    UnexpectedEndOfStream { offset: u64, buffered: usize },

    #[error("Signature source failed: {0}")]
    Signature(#[from] SignatureError),

    #[error("Delta source failed: {0}")]
    Delta(#[from] DeltaError),
}

impl WireError {
    pub(crate) fn malformed(offset: u64, record: &'static str, reason: impl Into<String>) -> Self {
        WireError::MalformedRecord {
            offset,
            record,
            reason: reason.into(),
        }
    }
}

pub type WireResult<T> = Result<T, WireError>;
