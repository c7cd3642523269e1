use std::time::Duration;

use actix_web::{http::header, HttpResponse};
use once_cell::sync::Lazy;
use prometheus::{
    Encoder, HistogramOpts, HistogramVec, IntCounter, IntCounterVec, Opts, TextEncoder,
};

fn register<C: prometheus::core::Collector + Clone + 'static>(collector: C, name: &str) -> C {
    prometheus::default_registry()
        .register(Box::new(collector.clone()))
        .unwrap_or_else(|e| panic!("failed to register {name}: {e}"));
    collector
}

static HTTP_REQUESTS_TOTAL: Lazy<IntCounterVec> = Lazy::new(|| {
    let counter = IntCounterVec::new(
        Opts::new(
            "conversation_service_http_requests_total",
            "Total HTTP requests handled by conversation-service",
        ),
        &["method", "path", "status"],
    )
    .expect("failed to create conversation_service_http_requests_total");
    register(counter, "conversation_service_http_requests_total")
});

static HTTP_REQUEST_DURATION_SECONDS: Lazy<HistogramVec> = Lazy::new(|| {
    let histogram = HistogramVec::new(
        HistogramOpts::new(
            "conversation_service_http_request_duration_seconds",
            "HTTP request latencies for conversation-service",
        )
        .buckets(vec![
            0.001, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 10.0, 30.0,
        ]),
        &["method", "path", "status"],
    )
    .expect("failed to create conversation_service_http_request_duration_seconds");
    register(histogram, "conversation_service_http_request_duration_seconds")
});

static MESSAGES_SENT_TOTAL: Lazy<IntCounterVec> = Lazy::new(|| {
    let counter = IntCounterVec::new(
        Opts::new("conversation_messages_sent_total", "Messages stored, by type"),
        &["type"],
    )
    .expect("failed to create conversation_messages_sent_total");
    register(counter, "conversation_messages_sent_total")
});

static QUOTA_DECISIONS_TOTAL: Lazy<IntCounterVec> = Lazy::new(|| {
    let counter = IntCounterVec::new(
        Opts::new(
            "conversation_quota_decisions_total",
            "Quota checks by feature and outcome",
        ),
        &["feature", "outcome"],
    )
    .expect("failed to create conversation_quota_decisions_total");
    register(counter, "conversation_quota_decisions_total")
});

static EVENTS_APPENDED_TOTAL: Lazy<IntCounterVec> = Lazy::new(|| {
    let counter = IntCounterVec::new(
        Opts::new(
            "conversation_events_appended_total",
            "Conversation events appended, by type",
        ),
        &["type"],
    )
    .expect("failed to create conversation_events_appended_total");
    register(counter, "conversation_events_appended_total")
});

static EVENT_APPEND_FAILURES_TOTAL: Lazy<IntCounterVec> = Lazy::new(|| {
    let counter = IntCounterVec::new(
        Opts::new(
            "conversation_event_append_failures_total",
            "Event appends that failed after the primary write succeeded",
        ),
        &["type"],
    )
    .expect("failed to create conversation_event_append_failures_total");
    register(counter, "conversation_event_append_failures_total")
});

static RECEIPT_FAILURES_TOTAL: Lazy<IntCounterVec> = Lazy::new(|| {
    let counter = IntCounterVec::new(
        Opts::new(
            "conversation_receipt_failures_total",
            "Receipt writes that were dropped or failed",
        ),
        &["reason"],
    )
    .expect("failed to create conversation_receipt_failures_total");
    register(counter, "conversation_receipt_failures_total")
});

static MATCHES_CREATED_TOTAL: Lazy<IntCounter> = Lazy::new(|| {
    let counter = IntCounter::new(
        "conversation_matches_created_total",
        "Match records created",
    )
    .expect("failed to create conversation_matches_created_total");
    register(counter, "conversation_matches_created_total")
});

static MATCH_INCONSISTENCIES_TOTAL: Lazy<IntCounter> = Lazy::new(|| {
    let counter = IntCounter::new(
        "conversation_match_inconsistencies_total",
        "Accepted interests whose match creation failed",
    )
    .expect("failed to create conversation_match_inconsistencies_total");
    register(counter, "conversation_match_inconsistencies_total")
});

pub fn observe_http(method: &str, path: &str, status: u16, elapsed: Duration) {
    let status = status.to_string();
    HTTP_REQUESTS_TOTAL
        .with_label_values(&[method, path, &status])
        .inc();
    HTTP_REQUEST_DURATION_SECONDS
        .with_label_values(&[method, path, &status])
        .observe(elapsed.as_secs_f64());
}

pub fn record_message_sent(message_type: &str) {
    MESSAGES_SENT_TOTAL.with_label_values(&[message_type]).inc();
}

pub fn record_quota_decision(feature: &str, allowed: bool) {
    let outcome = if allowed { "granted" } else { "denied" };
    QUOTA_DECISIONS_TOTAL
        .with_label_values(&[feature, outcome])
        .inc();
}

pub fn record_event_appended(event_type: &str) {
    EVENTS_APPENDED_TOTAL.with_label_values(&[event_type]).inc();
}

pub fn record_event_append_failure(event_type: &str) {
    EVENT_APPEND_FAILURES_TOTAL
        .with_label_values(&[event_type])
        .inc();
}

pub fn record_receipt_failure(reason: &str) {
    RECEIPT_FAILURES_TOTAL.with_label_values(&[reason]).inc();
}

pub fn record_match_created() {
    MATCHES_CREATED_TOTAL.inc();
}

pub fn record_match_inconsistency() {
    MATCH_INCONSISTENCIES_TOTAL.inc();
}

/// GET /metrics
pub async fn metrics_handler() -> HttpResponse {
    let encoder = TextEncoder::new();
    let metric_families = prometheus::gather();

    let mut buffer = Vec::new();
    if let Err(err) = encoder.encode(&metric_families, &mut buffer) {
        return HttpResponse::InternalServerError().body(err.to_string());
    }

    HttpResponse::Ok()
        .insert_header((header::CONTENT_TYPE, encoder.format_type()))
        .body(buffer)
}
