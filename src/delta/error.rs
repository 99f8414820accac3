use thiserror::Error;

#[derive(Error, Debug)]
pub enum DeltaError {
    #[error("Failed to read source data: {0}")]
    SourceRead(#[source] std::io::Error),

    #[error("Failed to write output: {0}")]
    SinkWrite(#[source] std::io::Error),

    #[error("Block {index} at offset {offset} is outside old data of {old_length} bytes")]
    BlockOutOfRange {
        index: u32,
        offset: u64,
        old_length: u64,
    },

    #[error("Invalid block size: {0}")]
    InvalidBlockSize(usize),
}

pub type DeltaResult<T> = Result<T, DeltaError>;
