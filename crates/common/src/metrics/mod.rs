//! Metrics and observability utilities
//!
//! Provides Prometheus metrics with latency histograms
//! and standardized naming conventions.

use metrics::{counter, describe_counter, describe_gauge, describe_histogram, gauge, histogram, Unit};
use std::time::Instant;

/// Metrics prefix for all DocGuard metrics
pub const METRICS_PREFIX: &str = "docguard";

/// Histogram buckets for request and retrieval latency (in seconds)
pub const LATENCY_BUCKETS: &[f64] = &[
    0.001,  // 1ms
    0.005,  // 5ms
    0.010,  // 10ms
    0.025,  // 25ms
    0.050,  // 50ms
    0.100,  // 100ms
    0.250,  // 250ms
    0.500,  // 500ms
    1.000,  // 1s
    2.500,  // 2.5s
    5.000,  // 5s
    10.00,  // 10s
];

/// Buckets for LLM synthesis latency (bounded by the 90s timeout)
pub const SYNTHESIS_BUCKETS: &[f64] = &[
    0.250,  // 250ms
    0.500,  // 500ms
    1.000,  // 1s
    2.500,  // 2.5s
    5.000,  // 5s
    10.00,  // 10s
    20.00,  // 20s
    45.00,  // 45s
    90.00,  // 90s
];

/// Register all metric descriptions
pub fn register_metrics() {
    // Request metrics
    describe_counter!(
        format!("{}_requests_total", METRICS_PREFIX),
        Unit::Count,
        "Total number of HTTP requests"
    );

    describe_histogram!(
        format!("{}_request_duration_seconds", METRICS_PREFIX),
        Unit::Seconds,
        "HTTP request latency in seconds"
    );

    // Decision metrics
    describe_counter!(
        format!("{}_queries_total", METRICS_PREFIX),
        Unit::Count,
        "Total user queries by final decision"
    );

    describe_counter!(
        format!("{}_topic_blocks_total", METRICS_PREFIX),
        Unit::Count,
        "Queries blocked by the topic guard"
    );

    // Retrieval metrics
    describe_histogram!(
        format!("{}_retrieval_duration_seconds", METRICS_PREFIX),
        Unit::Seconds,
        "Retrieval latency in seconds"
    );

    describe_gauge!(
        format!("{}_retrieval_passages_count", METRICS_PREFIX),
        Unit::Count,
        "Passages returned by the last retrieval"
    );

    describe_counter!(
        format!("{}_retrieval_errors_total", METRICS_PREFIX),
        Unit::Count,
        "Total retrieval failures"
    );

    // Synthesis metrics
    describe_histogram!(
        format!("{}_synthesis_duration_seconds", METRICS_PREFIX),
        Unit::Seconds,
        "LLM synthesis latency in seconds"
    );

    describe_counter!(
        format!("{}_synthesis_errors_total", METRICS_PREFIX),
        Unit::Count,
        "Total synthesis failures, including timeouts"
    );

    // Ingestion metrics
    describe_counter!(
        format!("{}_documents_ingested_total", METRICS_PREFIX),
        Unit::Count,
        "Total documents ingested"
    );

    describe_counter!(
        format!("{}_chunks_created_total", METRICS_PREFIX),
        Unit::Count,
        "Total chunks created"
    );

    describe_histogram!(
        format!("{}_ingestion_duration_seconds", METRICS_PREFIX),
        Unit::Seconds,
        "Document ingestion latency in seconds"
    );

    // Embedding metrics
    describe_counter!(
        format!("{}_embedding_requests_total", METRICS_PREFIX),
        Unit::Count,
        "Total embedding API requests"
    );

    describe_histogram!(
        format!("{}_embedding_duration_seconds", METRICS_PREFIX),
        Unit::Seconds,
        "Embedding generation latency in seconds"
    );

    // Audit metrics
    describe_counter!(
        format!("{}_audit_write_failures_total", METRICS_PREFIX),
        Unit::Count,
        "Audit events that could not be written"
    );

    tracing::info!("Metrics registered");
}

/// Helper to record request metrics
pub struct RequestMetrics {
    start: Instant,
    endpoint: String,
    method: String,
}

impl RequestMetrics {
    /// Start tracking a request
    pub fn start(method: &str, endpoint: &str) -> Self {
        Self {
            start: Instant::now(),
            endpoint: endpoint.to_string(),
            method: method.to_string(),
        }
    }

    /// Record request completion
    pub fn finish(self, status: u16) {
        let duration = self.start.elapsed().as_secs_f64();

        counter!(
            format!("{}_requests_total", METRICS_PREFIX),
            "method" => self.method.clone(),
            "endpoint" => self.endpoint.clone(),
            "status" => status.to_string()
        )
        .increment(1);

        histogram!(
            format!("{}_request_duration_seconds", METRICS_PREFIX),
            "method" => self.method,
            "endpoint" => self.endpoint
        )
        .record(duration);
    }
}

/// Record the final decision for a query (refusal type or "none")
pub fn record_query_decision(refusal_type: &str) {
    counter!(
        format!("{}_queries_total", METRICS_PREFIX),
        "refusal_type" => refusal_type.to_string()
    )
    .increment(1);
}

/// Record a topic guard block
pub fn record_topic_block(reason: &str) {
    counter!(
        format!("{}_topic_blocks_total", METRICS_PREFIX),
        "reason" => reason.to_string()
    )
    .increment(1);
}

/// Helper to record retrieval metrics
pub fn record_retrieval(duration_secs: f64, passage_count: usize, success: bool) {
    if success {
        histogram!(format!("{}_retrieval_duration_seconds", METRICS_PREFIX)).record(duration_secs);
        gauge!(format!("{}_retrieval_passages_count", METRICS_PREFIX)).set(passage_count as f64);
    } else {
        counter!(format!("{}_retrieval_errors_total", METRICS_PREFIX)).increment(1);
    }
}

/// Helper to record synthesis metrics
pub fn record_synthesis(duration_secs: f64, model: &str, success: bool) {
    if success {
        histogram!(
            format!("{}_synthesis_duration_seconds", METRICS_PREFIX),
            "model" => model.to_string()
        )
        .record(duration_secs);
    } else {
        counter!(
            format!("{}_synthesis_errors_total", METRICS_PREFIX),
            "model" => model.to_string()
        )
        .increment(1);
    }
}

/// Helper to record embedding metrics
pub fn record_embedding(duration_secs: f64, model: &str, batch_size: usize, success: bool) {
    let status = if success { "success" } else { "error" };

    counter!(
        format!("{}_embedding_requests_total", METRICS_PREFIX),
        "model" => model.to_string(),
        "status" => status.to_string()
    )
    .increment(1);

    if success {
        histogram!(
            format!("{}_embedding_duration_seconds", METRICS_PREFIX),
            "model" => model.to_string()
        )
        .record(duration_secs);
    }

    tracing::trace!(model, batch_size, status, "Embedding request recorded");
}

/// Helper to record ingestion metrics
pub fn record_ingestion(duration_secs: f64, documents: usize, chunks_created: usize) {
    counter!(format!("{}_documents_ingested_total", METRICS_PREFIX)).increment(documents as u64);

    counter!(format!("{}_chunks_created_total", METRICS_PREFIX)).increment(chunks_created as u64);

    histogram!(format!("{}_ingestion_duration_seconds", METRICS_PREFIX)).record(duration_secs);
}

/// Record an audit event that could not be persisted
pub fn record_audit_failure(event_type: &str) {
    counter!(
        format!("{}_audit_write_failures_total", METRICS_PREFIX),
        "type" => event_type.to_string()
    )
    .increment(1);
}
