//! Prometheus metrics for character-service.

use prometheus::{Encoder, HistogramOpts, HistogramVec, IntCounterVec, Opts, Registry, TextEncoder};
use std::sync::OnceLock;

// Global registry
pub static REGISTRY: OnceLock<Registry> = OnceLock::new();

pub static GENERATION_REQUESTS_TOTAL: OnceLock<IntCounterVec> = OnceLock::new();
pub static IMAGES_STORED_TOTAL: OnceLock<IntCounterVec> = OnceLock::new();
pub static PROVIDER_LATENCY_SECONDS: OnceLock<HistogramVec> = OnceLock::new();
pub static PROVIDER_ERRORS_TOTAL: OnceLock<IntCounterVec> = OnceLock::new();

/// Initialize all metrics. Concurrent and repeated calls build the registry
/// once; every caller returns after the counters are in place.
pub fn init_metrics() {
    REGISTRY.get_or_init(build_registry);
}

fn build_registry() -> Registry {
    let registry = Registry::new();

    let requests = IntCounterVec::new(
        Opts::new(
            "character_generation_requests_total",
            "Generation requests by operation and outcome",
        ),
        &["operation", "outcome"],
    )
    .expect("Failed to create character_generation_requests_total metric");

    let images_stored = IntCounterVec::new(
        Opts::new("character_images_stored_total", "Images written to disk"),
        &["kind"],
    )
    .expect("Failed to create character_images_stored_total metric");

    let provider_latency = HistogramVec::new(
        HistogramOpts::new(
            "character_provider_latency_seconds",
            "Image provider API latency in seconds",
        )
        .buckets(vec![0.5, 1.0, 2.0, 5.0, 10.0, 20.0, 30.0, 60.0, 120.0]),
        &["provider", "operation"],
    )
    .expect("Failed to create character_provider_latency_seconds metric");

    let provider_errors = IntCounterVec::new(
        Opts::new(
            "character_provider_errors_total",
            "Image provider errors by kind",
        ),
        &["provider", "error_type"],
    )
    .expect("Failed to create character_provider_errors_total metric");

    registry
        .register(Box::new(requests.clone()))
        .expect("Failed to register character_generation_requests_total");
    registry
        .register(Box::new(images_stored.clone()))
        .expect("Failed to register character_images_stored_total");
    registry
        .register(Box::new(provider_latency.clone()))
        .expect("Failed to register character_provider_latency_seconds");
    registry
        .register(Box::new(provider_errors.clone()))
        .expect("Failed to register character_provider_errors_total");

    // Only reached once, so these sets cannot fail.
    let _ = GENERATION_REQUESTS_TOTAL.set(requests);
    let _ = IMAGES_STORED_TOTAL.set(images_stored);
    let _ = PROVIDER_LATENCY_SECONDS.set(provider_latency);
    let _ = PROVIDER_ERRORS_TOTAL.set(provider_errors);

    tracing::info!("Prometheus metrics initialized");
    registry
}

/// Get metrics in Prometheus text format.
pub fn get_metrics() -> String {
    let mut buffer = Vec::new();
    let encoder = TextEncoder::new();

    let registry = match REGISTRY.get() {
        Some(r) => r,
        None => {
            tracing::error!("Metrics registry not initialized");
            return "# Metrics registry not initialized\n".to_string();
        }
    };

    let metric_families = registry.gather();

    if let Err(e) = encoder.encode(&metric_families, &mut buffer) {
        tracing::error!(error = %e, "Failed to encode metrics");
        return format!("# Failed to encode metrics: {}\n", e);
    }

    match String::from_utf8(buffer) {
        Ok(s) => s,
        Err(e) => {
            tracing::error!(error = %e, "Failed to convert metrics to UTF-8");
            format!("# Failed to convert metrics to UTF-8: {}\n", e)
        }
    }
}

/// Record the outcome of a generation request.
pub fn record_request(operation: &str, outcome: &str) {
    if let Some(counter) = GENERATION_REQUESTS_TOTAL.get() {
        counter.with_label_values(&[operation, outcome]).inc();
    }
}

/// Record an image written to disk.
pub fn record_image_stored(kind: &str) {
    if let Some(counter) = IMAGES_STORED_TOTAL.get() {
        counter.with_label_values(&[kind]).inc();
    }
}

/// Record provider latency.
pub fn record_provider_latency(provider: &str, operation: &str, duration_secs: f64) {
    if let Some(histogram) = PROVIDER_LATENCY_SECONDS.get() {
        histogram
            .with_label_values(&[provider, operation])
            .observe(duration_secs);
    }
}

/// Record a provider error.
pub fn record_provider_error(provider: &str, error_type: &str) {
    if let Some(counter) = PROVIDER_ERRORS_TOTAL.get() {
        counter.with_label_values(&[provider, error_type]).inc();
    }
}
