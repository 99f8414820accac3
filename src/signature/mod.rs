//! Block signatures of old data
//!
//! Splits a byte stream into fixed-size blocks and records a weak and a
//! strong checksum for each, plus the index used to look blocks up by their
//! weak checksum during delta computation.

pub mod builder;
pub mod error;
pub mod index;
pub mod layout;
pub mod types;

pub use builder::{SignatureBuilder, SignatureIter};
pub use error::{SignatureError, SignatureResult};
pub use index::BlockIndex;
pub use layout::{derive_block_size, MAX_BLOCK_SIZE, MIN_BLOCK_SIZE};
pub use types::{BlockHash, Signature};
