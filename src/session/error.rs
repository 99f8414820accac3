use crate::config::ConfigError;
use crate::delta::DeltaError;
use crate::session::types::SessionState;
use crate::signature::SignatureError;
use crate::wire::WireError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum SessionError {
    #[error("Cannot {operation} while session is {state}")]
    InvalidState {
        operation: &'static str,
        state: SessionState,
    },

    #[error("Checksum mismatch: rebuilt data does not match the delta trailer")]
    ChecksumMismatch {
        expected: [u8; 32],
        actual: [u8; 32],
    },

    #[error("Config error: {0}")]
    Config(#[from] ConfigError),

    #[error("Signature error: {0}")]
    Signature(#[from] SignatureError),

    #[error("Delta error: {0}")]
    Delta(#[from] DeltaError),

    #[error("Wire error: {0}")]
    Wire(#[from] WireError),
}

impl SessionError {
    /// Whether the caller misused the session, as opposed to bad data or I/O
    pub fn is_usage_error(&self) -> bool {
        matches!(self, SessionError::InvalidState { .. })
    }

    /// Metric label for this error
    pub fn kind(&self) -> &'static str {
        match self {
            SessionError::InvalidState { .. } => "invalid_state",
            SessionError::ChecksumMismatch { .. } => "checksum_mismatch",
            SessionError::Config(_) => "config",
            SessionError::Signature(_) => "signature",
            SessionError::Delta(DeltaError::BlockOutOfRange { .. }) => "block_out_of_range",
            SessionError::Delta(_) => "io",
            SessionError::Wire(WireError::MalformedRecord { .. }) => "malformed_record",
            SessionError::Wire(WireError::UnexpectedEndOfStream { .. }) => "unexpected_end",
            SessionError::Wire(_) => "source",
        }
    }
}

pub type SessionResult<T> = Result<T, SessionError>;
