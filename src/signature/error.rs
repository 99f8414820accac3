use thiserror::Error;

#[derive(Error, Debug)]
pub enum SignatureError {
    #[error("Failed to read source data: {0}")]
    SourceRead(#[source] std::io::Error),

    #[error("Invalid block size: {0}")]
    InvalidBlockSize(usize),
}

pub type SignatureResult<T> = Result<T, SignatureError>;
