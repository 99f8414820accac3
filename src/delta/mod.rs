//! Delta computation and application
//!
//! Computes the operations that turn old data into new data given only the
//! old data's signature, and replays those operations against the old data.

pub mod apply;
pub mod compute;
pub mod error;
pub mod types;

pub use apply::{apply_delta, apply_to_vec, Patcher};
pub use compute::{diff, DeltaComputer, DeltaIter};
pub use error::{DeltaError, DeltaResult};
pub use types::{DeltaStats, Operation};
