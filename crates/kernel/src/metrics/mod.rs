//! Prometheus metrics collection.
//!
//! Provides application metrics in Prometheus format.

use prometheus_client::encoding::{EncodeLabelSet, text::encode};
use prometheus_client::metrics::counter::Counter;
use prometheus_client::metrics::family::Family;
use prometheus_client::metrics::gauge::Gauge;
use prometheus_client::metrics::histogram::{Histogram, exponential_buckets};
use prometheus_client::registry::Registry;

/// HTTP request labels.
#[derive(Clone, Debug, Hash, PartialEq, Eq, EncodeLabelSet)]
pub struct HttpLabels {
    pub method: String,
    pub path: String,
    pub status: u16,
}

/// Tree operation labels.
#[derive(Clone, Debug, Hash, PartialEq, Eq, EncodeLabelSet)]
pub struct TreeOperationLabels {
    pub operation: String,
    /// `ok` or the error kind.
    pub outcome: String,
}

/// Application metrics.
pub struct Metrics {
    registry: Registry,

    /// HTTP request counter by method/path/status.
    pub http_requests: Family<HttpLabels, Counter>,

    /// HTTP request duration histogram.
    pub http_duration_seconds: Family<HttpLabels, Histogram>,

    /// Tree operations by operation/outcome.
    pub tree_operations: Family<TreeOperationLabels, Counter>,

    /// Items published by the scheduler.
    pub scheduled_published: Counter,

    /// Items expired by the scheduler.
    pub scheduled_expired: Counter,

    /// Requests currently being served.
    pub active_requests: Gauge,
}

impl Metrics {
    /// Create a new metrics registry.
    pub fn new() -> Self {
        let mut registry = Registry::default();

        let http_requests = Family::<HttpLabels, Counter>::default();
        registry.register(
            "http_requests",
            "Total HTTP requests",
            http_requests.clone(),
        );

        let http_duration_seconds = Family::<HttpLabels, Histogram>::new_with_constructor(|| {
            Histogram::new(exponential_buckets(0.001, 2.0, 12))
        });
        registry.register(
            "http_request_duration_seconds",
            "HTTP request duration in seconds",
            http_duration_seconds.clone(),
        );

        let tree_operations = Family::<TreeOperationLabels, Counter>::default();
        registry.register(
            "tree_operations",
            "Tree management operations by outcome",
            tree_operations.clone(),
        );

        let scheduled_published = Counter::default();
        registry.register(
            "scheduled_published",
            "Items published by the scheduler",
            scheduled_published.clone(),
        );

        let scheduled_expired = Counter::default();
        registry.register(
            "scheduled_expired",
            "Items expired by the scheduler",
            scheduled_expired.clone(),
        );

        let active_requests = Gauge::default();
        registry.register(
            "http_active_requests",
            "Requests currently being served",
            active_requests.clone(),
        );

        Self {
            registry,
            http_requests,
            http_duration_seconds,
            tree_operations,
            scheduled_published,
            scheduled_expired,
            active_requests,
        }
    }

    /// Record an HTTP request.
    pub fn record_request(&self, method: &str, path: &str, status: u16, duration_secs: f64) {
        let labels = HttpLabels {
            method: method.to_string(),
            path: normalize_path(path),
            status,
        };

        self.http_requests.get_or_create(&labels).inc();
        self.http_duration_seconds
            .get_or_create(&labels)
            .observe(duration_secs);
    }

    /// Record the outcome of a tree operation.
    pub fn record_tree_operation(&self, operation: &str, outcome: &str) {
        self.tree_operations
            .get_or_create(&TreeOperationLabels {
                operation: operation.to_string(),
                outcome: outcome.to_string(),
            })
            .inc();
    }

    /// Record one scheduler pass.
    pub fn record_scheduler_run(&self, published: u64, expired: u64) {
        self.scheduled_published.inc_by(published);
        self.scheduled_expired.inc_by(expired);
    }

    pub fn request_start(&self) {
        self.active_requests.inc();
    }

    pub fn request_end(&self) {
        self.active_requests.dec();
    }

    /// Encode metrics in Prometheus text format.
    pub fn encode(&self) -> Result<String, std::fmt::Error> {
        let mut buffer = String::new();
        encode(&mut buffer, &self.registry)?;
        Ok(buffer)
    }
}

impl Default for Metrics {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for Metrics {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Metrics").finish()
    }
}

/// Normalize a path for metrics labels.
///
/// Replaces numeric segments with a placeholder to limit cardinality.
fn normalize_path(path: &str) -> String {
    path.split('/')
        .map(|s| {
            if !s.is_empty() && s.chars().all(|c| c.is_ascii_digit()) {
                "{id}"
            } else {
                s
            }
        })
        .collect::<Vec<_>>()
        .join("/")
}
