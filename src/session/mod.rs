//! Streaming sessions
//!
//! Stateful wrappers that move signatures and deltas through fixed-size
//! buffers: producers fill caller buffers on demand, consumers accept
//! arbitrarily split input. Each session owns its state and has its own id
//! for logs.

pub mod delta;
pub mod error;
mod lifecycle;
pub mod patch;
pub mod signature;
pub mod types;

pub use delta::{DeltaConsumer, DeltaProducer};
pub use error::{SessionError, SessionResult};
pub use patch::PatchSession;
pub use signature::{SignatureConsumer, SignatureProducer};
pub use types::SessionState;
