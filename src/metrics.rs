//! Prometheus metrics registry and instruments, scoped to federation
//! concerns only (the HTTP/DB/storage/cache metrics the teacher's
//! `metrics.rs` carried belong to app layers this crate doesn't have).

use lazy_static::lazy_static;
use prometheus::{HistogramOpts, IntCounterVec, IntGauge, Opts, Registry};

lazy_static! {
    /// Global Prometheus registry
    pub static ref REGISTRY: Registry = Registry::new();

    pub static ref ACTIVITIES_RECEIVED_TOTAL: IntCounterVec = IntCounterVec::new(
        Opts::new(
            "apub_federator_activities_received_total",
            "Total number of ActivityPub activities received via the inbox"
        ),
        &["activity_type"]
    ).expect("metric can be created");

    pub static ref ACTIVITIES_SENT_TOTAL: IntCounterVec = IntCounterVec::new(
        Opts::new(
            "apub_federator_activities_sent_total",
            "Total number of ActivityPub activities posted to the outbox"
        ),
        &["activity_type"]
    ).expect("metric can be created");

    pub static ref FEDERATION_REQUESTS_TOTAL: IntCounterVec = IntCounterVec::new(
        Opts::new(
            "apub_federator_federation_requests_total",
            "Total number of inbound/outbound federation requests by outcome"
        ),
        &["direction", "status"]
    ).expect("metric can be created");

    pub static ref FEDERATION_REQUEST_DURATION_SECONDS: prometheus::HistogramVec = prometheus::HistogramVec::new(
        HistogramOpts::new(
            "apub_federator_federation_request_duration_seconds",
            "Federation request duration in seconds"
        ).buckets(vec![0.01, 0.05, 0.1, 0.5, 1.0, 2.5, 5.0, 10.0, 30.0]),
        &["direction"]
    ).expect("metric can be created");

    pub static ref DELIVERY_QUEUE_DEPTH: IntGauge = IntGauge::new(
        "apub_federator_delivery_queue_depth",
        "Current number of delivery tasks waiting in the pool's queue"
    ).expect("metric can be created");

    pub static ref DELIVERY_IN_FLIGHT: IntGauge = IntGauge::new(
        "apub_federator_delivery_in_flight",
        "Current number of delivery tasks being attempted by workers"
    ).expect("metric can be created");

    pub static ref DELIVERY_ATTEMPTS_TOTAL: IntCounterVec = IntCounterVec::new(
        Opts::new(
            "apub_federator_delivery_attempts_total",
            "Total delivery attempts by outcome"
        ),
        &["outcome"]
    ).expect("metric can be created");

    pub static ref ERRORS_TOTAL: IntCounterVec = IntCounterVec::new(
        Opts::new("apub_federator_errors_total", "Total number of engine errors"),
        &["error_kind"]
    ).expect("metric can be created");
}

/// Initialize metrics registry.
pub fn init_metrics() {
    REGISTRY
        .register(Box::new(ACTIVITIES_RECEIVED_TOTAL.clone()))
        .expect("ACTIVITIES_RECEIVED_TOTAL can be registered");
    REGISTRY
        .register(Box::new(ACTIVITIES_SENT_TOTAL.clone()))
        .expect("ACTIVITIES_SENT_TOTAL can be registered");
    REGISTRY
        .register(Box::new(FEDERATION_REQUESTS_TOTAL.clone()))
        .expect("FEDERATION_REQUESTS_TOTAL can be registered");
    REGISTRY
        .register(Box::new(FEDERATION_REQUEST_DURATION_SECONDS.clone()))
        .expect("FEDERATION_REQUEST_DURATION_SECONDS can be registered");
    REGISTRY
        .register(Box::new(DELIVERY_QUEUE_DEPTH.clone()))
        .expect("DELIVERY_QUEUE_DEPTH can be registered");
    REGISTRY
        .register(Box::new(DELIVERY_IN_FLIGHT.clone()))
        .expect("DELIVERY_IN_FLIGHT can be registered");
    REGISTRY
        .register(Box::new(DELIVERY_ATTEMPTS_TOTAL.clone()))
        .expect("DELIVERY_ATTEMPTS_TOTAL can be registered");
    REGISTRY
        .register(Box::new(ERRORS_TOTAL.clone()))
        .expect("ERRORS_TOTAL can be registered");

    tracing::info!("Metrics registry initialized");
}
