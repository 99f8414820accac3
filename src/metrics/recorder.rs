//! Metrics recorder for sync engine operations

use crate::delta::DeltaStats;
use metrics::{counter, describe_counter, describe_histogram, histogram};
use std::sync::atomic::{AtomicBool, Ordering};

static METRICS_INITIALIZED: AtomicBool = AtomicBool::new(false);

/// Initialize metric descriptions (call once at startup)
pub fn init_metrics() {
    if METRICS_INITIALIZED.swap(true, Ordering::SeqCst) {
        return; // Already initialized
    }

    // Signature side
    describe_counter!(
        "deltastream_signatures_built_total",
        "Total number of signatures built"
    );
    describe_counter!(
        "deltastream_signature_blocks_total",
        "Total number of blocks hashed into signatures"
    );
    describe_counter!(
        "deltastream_signature_bytes_total",
        "Total bytes of old data hashed"
    );

    // Delta side
    describe_counter!(
        "deltastream_deltas_computed_total",
        "Total number of deltas computed"
    );
    describe_counter!(
        "deltastream_copied_bytes_total",
        "Bytes matched against old data"
    );
    describe_counter!(
        "deltastream_literal_bytes_total",
        "Bytes that had to be sent verbatim"
    );

    // Patch side
    describe_counter!(
        "deltastream_patches_applied_total",
        "Total number of patches applied"
    );
    describe_counter!(
        "deltastream_patched_bytes_total",
        "Total bytes written by patches"
    );
    describe_counter!(
        "deltastream_session_failures_total",
        "Sessions aborted by an error"
    );

    describe_histogram!(
        "deltastream_delta_copy_ratio",
        "Share of the new data copied from old data, 0 to 1"
    );
}

/// Record a completed signature
pub fn record_signature_built(blocks: usize, bytes: u64) {
    counter!("deltastream_signatures_built_total").increment(1);
    counter!("deltastream_signature_blocks_total").increment(blocks as u64);
    counter!("deltastream_signature_bytes_total").increment(bytes);
}

/// Record a completed delta computation
pub fn record_delta_computed(stats: &DeltaStats) {
    counter!("deltastream_deltas_computed_total").increment(1);
    counter!("deltastream_copied_bytes_total").increment(stats.copied_bytes);
    counter!("deltastream_literal_bytes_total").increment(stats.literal_bytes);
    histogram!("deltastream_delta_copy_ratio").record(stats.copy_ratio() / 100.0);
}

/// Record a completed patch
pub fn record_patch_applied(stats: &DeltaStats) {
    counter!("deltastream_patches_applied_total").increment(1);
    counter!("deltastream_patched_bytes_total").increment(stats.target_size());
}

/// Record a session aborted by an error
pub fn record_session_failed(session: &'static str, kind: &'static str) {
    counter!("deltastream_session_failures_total", "session" => session, "kind" => kind)
        .increment(1);
}
