//! Prometheus metrics for core components.
//!
//! This module provides metrics for:
//! - Lookups (attempts, retries, latency, throttle waits, cache hits)
//! - Resolutions (outcome per strategy)
//! - Batches (duration, records processed)

use once_cell::sync::Lazy;
use prometheus::{Histogram, HistogramOpts, HistogramVec, IntCounter, IntCounterVec, Opts};

// =============================================================================
// Lookup Metrics
// =============================================================================

/// Lookup attempts by query kind and result.
pub static LOOKUP_ATTEMPTS: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new(
            "subjectify_lookup_attempts_total",
            "Total requests sent to the classification service",
        ),
        &["query", "result"], // "success", "transient_error", "fatal_error"
    )
    .unwrap()
});

/// Retries scheduled after transient failures.
pub static LOOKUP_RETRIES: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new(
            "subjectify_lookup_retries_total",
            "Total retries after transient lookup failures",
        ),
        &["query"],
    )
    .unwrap()
});

/// Duration of individual service requests.
pub static LOOKUP_DURATION: Lazy<HistogramVec> = Lazy::new(|| {
    HistogramVec::new(
        HistogramOpts::new(
            "subjectify_lookup_duration_seconds",
            "Duration of classification service requests",
        )
        .buckets(vec![0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0, 30.0]),
        &["query"],
    )
    .unwrap()
});

/// Time spent waiting for the rate limiter.
pub static THROTTLE_WAIT: Lazy<Histogram> = Lazy::new(|| {
    Histogram::with_opts(
        HistogramOpts::new(
            "subjectify_throttle_wait_seconds",
            "Time spent waiting for a request permit",
        )
        .buckets(vec![0.0, 0.1, 0.25, 0.5, 1.0, 2.0, 5.0, 10.0]),
    )
    .unwrap()
});

/// Lookups answered from the in-run response cache.
pub static CACHE_HITS: Lazy<IntCounter> = Lazy::new(|| {
    IntCounter::new(
        "subjectify_lookup_cache_hits_total",
        "Lookups answered from the in-run response cache",
    )
    .unwrap()
});

// =============================================================================
// Resolution Metrics
// =============================================================================

/// Final record outcomes by state and strategy.
pub static RESOLUTIONS: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new("subjectify_resolutions_total", "Final record outcomes"),
        &["state", "strategy"], // strategy is "none" when no lookup decided
    )
    .unwrap()
});

/// Candidates returned per lookup.
pub static CANDIDATES_FOUND: Lazy<HistogramVec> = Lazy::new(|| {
    HistogramVec::new(
        HistogramOpts::new(
            "subjectify_candidates_found",
            "Number of candidates returned per lookup",
        )
        .buckets(vec![0.0, 1.0, 2.0, 3.0, 5.0, 10.0, 25.0]),
        &["query"],
    )
    .unwrap()
});

// =============================================================================
// Batch Metrics
// =============================================================================

/// Batch duration in seconds.
pub static BATCH_DURATION: Lazy<HistogramVec> = Lazy::new(|| {
    HistogramVec::new(
        HistogramOpts::new("subjectify_batch_duration_seconds", "Duration of batch runs")
            .buckets(vec![1.0, 10.0, 60.0, 300.0, 900.0, 3600.0, 14400.0]),
        &["result"], // "completed", "cancelled"
    )
    .unwrap()
});

/// Records carried over from a resume journal.
pub static RECORDS_RESUMED: Lazy<IntCounter> = Lazy::new(|| {
    IntCounter::new(
        "subjectify_records_resumed_total",
        "Records whose outcome was carried over from a resume journal",
    )
    .unwrap()
});

// =============================================================================
// Helper functions
// =============================================================================

/// Get all core metrics for registration in a registry.
pub fn all_metrics() -> Vec<Box<dyn prometheus::core::Collector>> {
    vec![
        // Lookups
        Box::new(LOOKUP_ATTEMPTS.clone()),
        Box::new(LOOKUP_RETRIES.clone()),
        Box::new(LOOKUP_DURATION.clone()),
        Box::new(THROTTLE_WAIT.clone()),
        Box::new(CACHE_HITS.clone()),
        // Resolutions
        Box::new(RESOLUTIONS.clone()),
        Box::new(CANDIDATES_FOUND.clone()),
        // Batches
        Box::new(BATCH_DURATION.clone()),
        Box::new(RECORDS_RESUMED.clone()),
    ]
}
