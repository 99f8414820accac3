//! Record layout
//!
//! Signature stream:
//!
//! | tag | record | payload |
//! |-----|--------|---------|
//! | `S` | header | version u8, strong hash length u8, block size u32 |
//! | `B` | block  | index u32, weak u32, length u32, strong hash |
//! | `E` | end    | block count u32, total length u64 |
//!
//! Delta stream:
//!
//! | tag | record  | payload |
//! |-----|---------|---------|
//! | `D` | header  | version u8, block size u32 |
//! | `C` | copy    | block index u32 |
//! | `L` | literal | length u32, bytes |
//! | `H` | end     | BLAKE3 digest of the rebuilt stream |

use crate::checksum::{STREAM_DIGEST_LEN, STRONG_HASH_LEN};

/// Format version written in both headers
pub const WIRE_VERSION: u8 = 1;

pub const TAG_SIGNATURE_HEADER: u8 = b'S';
pub const TAG_BLOCK: u8 = b'B';
pub const TAG_SIGNATURE_END: u8 = b'E';

pub const TAG_DELTA_HEADER: u8 = b'D';
pub const TAG_COPY: u8 = b'C';
pub const TAG_LITERAL: u8 = b'L';
pub const TAG_DELTA_END: u8 = b'H';

pub const SIGNATURE_HEADER_LEN: usize = 1 + 1 + 1 + 4;
pub const BLOCK_RECORD_LEN: usize = 1 + 4 + 4 + 4 + STRONG_HASH_LEN;
pub const SIGNATURE_END_LEN: usize = 1 + 4 + 8;

pub const DELTA_HEADER_LEN: usize = 1 + 1 + 4;
pub const COPY_RECORD_LEN: usize = 1 + 4;
pub const LITERAL_PREFIX_LEN: usize = 1 + 4;
pub const DELTA_END_LEN: usize = 1 + STREAM_DIGEST_LEN;

/// Largest literal payload a single record can carry
pub const MAX_LITERAL_RECORD: usize = u32::MAX as usize;

/// Result of asking a producer for more bytes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Fill {
    /// This many bytes were written to the front of the buffer
    Filled(usize),
    /// The stream is complete; nothing was written
    End,
}

impl Fill {
    /// Bytes written, zero for [`Fill::End`]
    pub fn written(self) -> usize {
        match self {
            Fill::Filled(n) => n,
            Fill::End => 0,
        }
    }

    pub fn is_end(self) -> bool {
        matches!(self, Fill::End)
    }
}
