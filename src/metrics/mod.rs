//! Metrics and observability module
//!
//! Records engine activity through the `metrics` facade. Installing a
//! recorder/exporter is left to the embedding application.
//!
//! Key metrics:
//! - Signatures built (blocks, bytes)
//! - Deltas computed (copied vs literal bytes)
//! - Patches applied (bytes written)
//! - Session failures by kind

pub mod recorder;

pub use recorder::{
    init_metrics, record_delta_computed, record_patch_applied, record_session_failed,
    record_signature_built,
};
