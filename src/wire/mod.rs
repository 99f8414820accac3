//! Wire format for signatures and deltas
//!
//! Both streams are a sequence of tagged records with little-endian
//! integers: a header, the body records, and a terminal end record.
//! Encoders are pull-based producers that fill caller buffers; decoders are
//! resumable parsers that accept input in chunks of any size.

pub mod decode;
pub mod encode;
pub mod error;
pub mod format;

pub use decode::{decode_signature, DeltaDecoder, DeltaRecord, SignatureDecoder, SignatureRecord};
pub use encode::{encode_operations, encode_signature, DeltaEncoder, SignatureEncoder};
pub use error::{WireError, WireResult};
pub use format::{Fill, WIRE_VERSION};
