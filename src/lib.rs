//! deltastream
//!
//! Block-based binary delta synchronization: describe old data by a
//! signature of per-block checksums, compute the operations that turn the
//! old data into new data from that signature alone, and replay them
//! against the old data. Signatures and deltas have a streaming wire form
//! driven through [`session`] wrappers.

pub mod checksum;
pub mod config;
pub mod delta;
pub mod metrics;
pub mod session;
pub mod signature;
pub mod wire;

pub use config::{ConfigError, EngineConfig};
pub use delta::{apply_delta, diff, DeltaComputer, DeltaError, DeltaStats, Operation, Patcher};
pub use session::{
    DeltaConsumer, DeltaProducer, PatchSession, SessionError, SessionState, SignatureConsumer,
    SignatureProducer,
};
pub use signature::{BlockHash, BlockIndex, Signature, SignatureBuilder, SignatureError};
pub use wire::{Fill, WireError};
