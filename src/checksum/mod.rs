//! Block checksums
//!
//! A weak Adler-32 style rolling checksum for cheap candidate lookup and a
//! truncated BLAKE3 digest for confirming candidates.

pub mod rolling;
pub mod strong;

pub use rolling::Adler32Rolling;
pub use strong::{strong_hash, StrongHash, STREAM_DIGEST_LEN, STRONG_HASH_LEN};
