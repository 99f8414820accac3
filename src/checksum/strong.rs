//! Strong block digests
//!
//! BLAKE3 truncated to 128 bits confirms weak checksum candidates. The full
//! 256-bit digest is used for whole-stream verification.

/// Length of the per-block strong digest in bytes
pub const STRONG_HASH_LEN: usize = 16;

/// Length of the whole-stream digest carried in the delta trailer
pub const STREAM_DIGEST_LEN: usize = 32;

/// Truncated BLAKE3 digest of a single block
pub type StrongHash = [u8; STRONG_HASH_LEN];

/// Compute the strong digest of a block
pub fn strong_hash(data: &[u8]) -> StrongHash {
    let full = blake3::hash(data);
    let mut strong = [0u8; STRONG_HASH_LEN];
    strong.copy_from_slice(&full.as_bytes()[..STRONG_HASH_LEN]);
    strong
}
