//! Block size heuristic
//!
//! The block size trades signature overhead against match granularity. It
//! grows with the square root of the input length so both the number of
//! blocks and the size of each block scale as `sqrt(len)`.

/// Smallest derived block size
pub const MIN_BLOCK_SIZE: usize = 512;

/// Largest derived block size (128KB)
pub const MAX_BLOCK_SIZE: usize = 128 * 1024;

/// Derive a block size for `total_length` bytes with the default clamps
pub fn derive_block_size(total_length: u64) -> usize {
    derive_block_size_clamped(total_length, MIN_BLOCK_SIZE, MAX_BLOCK_SIZE)
}

/// `isqrt(total_length)` rounded down to a multiple of 8, clamped to
/// `[min, max]`
pub fn derive_block_size_clamped(total_length: u64, min: usize, max: usize) -> usize {
    let root = isqrt(total_length);
    let rounded = root & !7;
    let size = usize::try_from(rounded).unwrap_or(usize::MAX);
    size.clamp(min, max.max(min))
}

/// Number of blocks a signature over `total_length` bytes will contain
pub fn block_count(total_length: u64, block_size: usize) -> u64 {
    total_length.div_ceil(block_size as u64)
}

fn isqrt(n: u64) -> u64 {
    if n < 2 {
        return n;
    }
    // Newton iteration from a power-of-two upper bound
    let bits = 64 - n.leading_zeros();
    let mut x = 1u64 << bits.div_ceil(2);
    let mut y = (x + n / x) / 2;
    while y < x {
        x = y;
        y = (x + n / x) / 2;
    }
    x
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_isqrt() {
        for n in [0u64, 1, 2, 3, 4, 15, 16, 17, 1_000_000, u64::MAX] {
            let r = isqrt(n);
            assert!(r.checked_mul(r).map_or(false, |sq| sq <= n), "n = {n}");
            assert!((r + 1).checked_mul(r + 1).map_or(true, |sq| sq > n), "n = {n}");
        }
    }

    #[test]
    fn test_small_inputs_use_minimum() {
        assert_eq!(derive_block_size(0), MIN_BLOCK_SIZE);
        assert_eq!(derive_block_size(1000), MIN_BLOCK_SIZE);
        assert_eq!(derive_block_size(512 * 512), MIN_BLOCK_SIZE);
    }

    #[test]
    fn test_medium_inputs_use_sqrt_scaling() {
        // sqrt(1MB) = 1024
        assert_eq!(derive_block_size(1 << 20), 1024);
        // sqrt(100MB) = 10240
        assert_eq!(derive_block_size(100 << 20), 10240);
    }

    #[test]
    fn test_block_size_is_multiple_of_8() {
        for len in [300_000u64, 1_234_567, 98_765_432, 5_000_000_000] {
            assert_eq!(derive_block_size(len) % 8, 0, "len = {len}");
        }
    }

    #[test]
    fn test_large_inputs_capped() {
        assert_eq!(derive_block_size(1 << 40), MAX_BLOCK_SIZE);
        assert_eq!(derive_block_size(u64::MAX), MAX_BLOCK_SIZE);
    }

    #[test]
    fn test_block_count() {
        assert_eq!(block_count(0, 16), 0);
        assert_eq!(block_count(16, 16), 1);
        assert_eq!(block_count(17, 16), 2);
        assert_eq!(block_count(256, 16), 16);
    }
}
