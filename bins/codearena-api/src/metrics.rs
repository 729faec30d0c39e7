use lazy_static::lazy_static;
use prometheus::{
    register_histogram, register_int_counter_vec, Encoder, Histogram, IntCounterVec, TextEncoder,
};
use std::time::Duration;

lazy_static! {
    /// Submissions by final outcome: verdict label or error kind.
    pub static ref SUBMISSIONS_TOTAL: IntCounterVec = register_int_counter_vec!(
        "codearena_submissions_total",
        "Submissions processed, by outcome",
        &["outcome"]
    )
    .unwrap();

    pub static ref SUBMISSION_DURATION: Histogram = register_histogram!(
        "codearena_submission_duration_seconds",
        "Wall time of one submission run, judge polling included",
        vec![0.5, 1.0, 2.0, 3.0, 5.0, 8.0, 12.0, 16.0, 30.0]
    )
    .unwrap();
}

pub fn record_submission(outcome: &str, elapsed: Duration) {
    SUBMISSIONS_TOTAL.with_label_values(&[outcome]).inc();
    SUBMISSION_DURATION.observe(elapsed.as_secs_f64());
}

/// Prometheus text exposition of the default registry.
pub fn render() -> String {
    let encoder = TextEncoder::new();
    let mut buffer = Vec::new();
    if let Err(e) = encoder.encode(&prometheus::gather(), &mut buffer) {
        tracing::error!(error = %e, "Failed to encode metrics");
    }
    String::from_utf8(buffer).unwrap_or_default()
}
