//! Rolling checksum for block matching
//!
//! Adler-32 style checksum that can slide over a byte stream one byte at a
//! time, similar to rsync's rolling checksum.

/// Largest prime below 2^16.
const MOD_ADLER: u32 = 65521;

/// Adler-32 style rolling checksum
///
/// The algorithm maintains two sums:
/// - `a`: sum of all bytes in the window + 1
/// - `b`: sum of the `a` values after each byte
///
/// Both are computed modulo 65521. The digest is `(b << 16) | a`.
///
/// Sliding the window from `[x1, .., xn]` to `[x2, .., xn, new]`:
/// - `a_new = a_old - x1 + new`
/// - `b_new = b_old - n*x1 + a_new - 1`
#[derive(Debug, Clone)]
pub struct Adler32Rolling {
    a: u32,
    b: u32,
    window: usize,
}

impl Adler32Rolling {
    /// Create an empty checksum for a window of `window` bytes
    pub fn with_window(window: usize) -> Self {
        Self { a: 1, b: 0, window }
    }

    /// Create a checksum initialised over `data`; the window is `data.len()`
    pub fn from_block(data: &[u8]) -> Self {
        let mut rolling = Self::with_window(data.len());
        rolling.update_block(data);
        rolling
    }

    /// Window length used by [`roll_byte`](Self::roll_byte)
    pub fn window(&self) -> usize {
        self.window
    }

    /// Recompute from scratch over a full window of data
    pub fn update_block(&mut self, data: &[u8]) {
        self.a = 1;
        self.b = 0;
        self.window = data.len();
        for &byte in data {
            self.a = (self.a + byte as u32) % MOD_ADLER;
            self.b = (self.b + self.a) % MOD_ADLER;
        }
    }

    /// Roll the window forward by one byte
    pub fn roll_byte(&mut self, old_byte: u8, new_byte: u8) {
        let old = old_byte as u32;
        let new = new_byte as u32;
        let n = (self.window as u64 % MOD_ADLER as u64) as u32;

        self.a = (self.a + MOD_ADLER - old + new) % MOD_ADLER;

        // n < MOD_ADLER and old <= 255, so the product fits in u32
        let subtract = (n * old + 1) % MOD_ADLER;
        self.b = (self.b + MOD_ADLER + self.a - subtract) % MOD_ADLER;
    }

    /// Current checksum value
    pub fn digest(&self) -> u32 {
        (self.b << 16) | self.a
    }

    /// Compute the checksum of `data` without keeping rolling state
    pub fn checksum(data: &[u8]) -> u32 {
        Self::from_block(data).digest()
    }
}

impl Default for Adler32Rolling {
    fn default() -> Self {
        Self::with_window(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::{Rng, SeedableRng};

    #[test]
    fn test_adler32_matches_reference() {
        // Standard Adler-32 of "Wikipedia"
        assert_eq!(Adler32Rolling::checksum(b"Wikipedia"), 0x11E6_0398);
        assert_eq!(Adler32Rolling::checksum(b""), 1);
    }

    #[test]
    fn test_adler32_rolling() {
        let data = b"ABCDEFGHIJ";
        let block_size = 4;

        let expected: Vec<u32> = data
            .windows(block_size)
            .map(Adler32Rolling::checksum)
            .collect();

        let mut rolling = Adler32Rolling::from_block(&data[..block_size]);
        assert_eq!(rolling.digest(), expected[0], "Initial block mismatch");

        for i in 1..expected.len() {
            rolling.roll_byte(data[i - 1], data[i + block_size - 1]);
            assert_eq!(
                rolling.digest(),
                expected[i],
                "Mismatch at position {}: got {}, expected {}",
                i,
                rolling.digest(),
                expected[i]
            );
        }
    }

    #[test]
    fn test_rolling_equals_scratch_on_random_data() {
        let mut rng = rand::rngs::StdRng::seed_from_u64(0x5eed);
        let data: Vec<u8> = (0..4096).map(|_| rng.gen()).collect();

        for block_size in [1, 2, 13, 16, 64, 700, 1024] {
            let mut rolling = Adler32Rolling::from_block(&data[..block_size]);
            for i in 0..=data.len() - block_size {
                if i > 0 {
                    rolling.roll_byte(data[i - 1], data[i + block_size - 1]);
                }
                assert_eq!(
                    rolling.digest(),
                    Adler32Rolling::checksum(&data[i..i + block_size]),
                    "Block size {}, position {}",
                    block_size,
                    i
                );
            }
        }
    }

    #[test]
    fn test_rolling_saturated_bytes() {
        // All 0xFF stresses the modular subtraction
        let data = vec![0xFFu8; 100_000];
        let block_size = 70_000;
        let mut rolling = Adler32Rolling::from_block(&data[..block_size]);
        for i in 1..=data.len() - block_size {
            rolling.roll_byte(data[i - 1], data[i + block_size - 1]);
        }
        assert_eq!(
            rolling.digest(),
            Adler32Rolling::checksum(&data[data.len() - block_size..])
        );
    }
}
