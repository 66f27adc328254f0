use lazy_static::lazy_static;
use prometheus::{CounterVec, HistogramOpts, HistogramVec, Opts, Registry};
use std::sync::Once;
use std::time::{Duration, Instant};

lazy_static! {
    /// Global Prometheus registry
    pub static ref REGISTRY: Registry = Registry::new();

    /// Engine commands by action and outcome (ok, rejected, transport, malformed)
    pub static ref ENGINE_COMMANDS_TOTAL: CounterVec = CounterVec::new(
        Opts::new("engine_commands_total", "Commands sent to the execution engine"),
        &["action", "outcome"]
    ).expect("Failed to create engine commands counter");

    /// Round-trip time of engine commands
    pub static ref ENGINE_COMMAND_DURATION: HistogramVec = HistogramVec::new(
        HistogramOpts::new("engine_command_duration_seconds", "Engine command round-trip time")
            .buckets(vec![0.001, 0.005, 0.01, 0.05, 0.1, 0.5, 1.0, 5.0, 30.0]),
        &["action"]
    ).expect("Failed to create engine command duration histogram");

    /// Report exports by format
    pub static ref EXPORTS_TOTAL: CounterVec = CounterVec::new(
        Opts::new("report_exports_total", "Simulation reports exported"),
        &["format"]
    ).expect("Failed to create exports counter");

    /// Counter for API requests by endpoint and method
    pub static ref API_REQUESTS_TOTAL: CounterVec = CounterVec::new(
        Opts::new("api_requests_total", "Total number of API requests"),
        &["method", "endpoint", "status"]
    ).expect("Failed to create API requests counter");

    /// Histogram for API request duration
    pub static ref API_REQUEST_DURATION: HistogramVec = HistogramVec::new(
        HistogramOpts::new("api_request_duration_seconds", "API request duration")
            .buckets(vec![0.001, 0.005, 0.01, 0.05, 0.1, 0.5, 1.0, 5.0]),
        &["method", "endpoint"]
    ).expect("Failed to create API request duration histogram");
}

static INIT: Once = Once::new();

/// Register all console metrics with the global registry. Safe to call more than once.
pub fn init_metrics() {
    INIT.call_once(|| {
        let collectors: Vec<Box<dyn prometheus::core::Collector>> = vec![
            Box::new(ENGINE_COMMANDS_TOTAL.clone()),
            Box::new(ENGINE_COMMAND_DURATION.clone()),
            Box::new(EXPORTS_TOTAL.clone()),
            Box::new(API_REQUESTS_TOTAL.clone()),
            Box::new(API_REQUEST_DURATION.clone()),
        ];
        for collector in collectors {
            if let Err(err) = REGISTRY.register(collector) {
                tracing::warn!(error = %err, "failed to register metric");
            }
        }
    });
}

/// Record one engine round trip
pub fn record_command(action: &str, outcome: &str, duration: Duration) {
    ENGINE_COMMANDS_TOTAL
        .with_label_values(&[action, outcome])
        .inc();

    ENGINE_COMMAND_DURATION
        .with_label_values(&[action])
        .observe(duration.as_secs_f64());
}

pub fn record_export(format: &str) {
    EXPORTS_TOTAL.with_label_values(&[format]).inc();
}

/// Record an API request
pub fn record_api_request(method: &str, endpoint: &str, status: u16, duration: Duration) {
    API_REQUESTS_TOTAL
        .with_label_values(&[method, endpoint, &status.to_string()])
        .inc();

    API_REQUEST_DURATION
        .with_label_values(&[method, endpoint])
        .observe(duration.as_secs_f64());
}

/// Helper struct for timing operations
#[derive(Debug, Clone, Copy)]
pub struct Timer {
    start: Instant,
}

impl Timer {
    pub fn new() -> Self {
        Self {
            start: Instant::now(),
        }
    }

    pub fn elapsed(&self) -> Duration {
        self.start.elapsed()
    }
}

impl Default for Timer {
    fn default() -> Self {
        Self::new()
    }
}
