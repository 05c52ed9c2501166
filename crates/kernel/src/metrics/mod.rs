//! Prometheus metrics collection.
//!
//! Provides listing metrics in Prometheus format.

use prometheus_client::encoding::{EncodeLabelSet, text::encode};
use prometheus_client::metrics::counter::Counter;
use prometheus_client::metrics::family::Family;
use prometheus_client::metrics::histogram::{Histogram, exponential_buckets};
use prometheus_client::registry::Registry;

/// Labels identifying the listed entity.
#[derive(Clone, Debug, Hash, PartialEq, Eq, EncodeLabelSet)]
pub struct EntityLabels {
    pub entity: String,
}

/// Labels identifying one statement of a listing.
#[derive(Clone, Debug, Hash, PartialEq, Eq, EncodeLabelSet)]
pub struct StatementLabels {
    pub entity: String,
    pub statement: String,
}

/// Labels for failed listings.
#[derive(Clone, Debug, Hash, PartialEq, Eq, EncodeLabelSet)]
pub struct ErrorLabels {
    pub entity: String,
    pub kind: String,
}

/// Listing metrics.
pub struct Metrics {
    registry: Registry,

    /// Listing requests by entity.
    pub listing_requests: Family<EntityLabels, Counter>,

    /// Failed listings by entity and error kind.
    pub listing_errors: Family<ErrorLabels, Counter>,

    /// Statement duration histogram by entity and statement.
    pub statement_duration_seconds: Family<StatementLabels, Histogram>,
}

impl Metrics {
    /// Create a new metrics registry.
    pub fn new() -> Self {
        let mut registry = Registry::default();

        let listing_requests = Family::<EntityLabels, Counter>::default();
        registry.register(
            "listing_requests",
            "Total listing requests",
            listing_requests.clone(),
        );

        let listing_errors = Family::<ErrorLabels, Counter>::default();
        registry.register(
            "listing_errors",
            "Failed listing requests",
            listing_errors.clone(),
        );

        let statement_duration_seconds =
            Family::<StatementLabels, Histogram>::new_with_constructor(|| {
                Histogram::new(exponential_buckets(0.0001, 2.0, 14))
            });
        registry.register(
            "listing_statement_duration_seconds",
            "Listing statement duration in seconds",
            statement_duration_seconds.clone(),
        );

        Self {
            registry,
            listing_requests,
            listing_errors,
            statement_duration_seconds,
        }
    }

    /// Record a listing request.
    pub fn record_request(&self, entity: &str) {
        self.listing_requests
            .get_or_create(&EntityLabels {
                entity: entity.to_string(),
            })
            .inc();
    }

    /// Record a failed listing.
    pub fn record_error(&self, entity: &str, kind: &str) {
        self.listing_errors
            .get_or_create(&ErrorLabels {
                entity: entity.to_string(),
                kind: kind.to_string(),
            })
            .inc();
    }

    /// Record a statement execution.
    pub fn record_statement(&self, entity: &str, statement: &str, duration_secs: f64) {
        let labels = StatementLabels {
            entity: entity.to_string(),
            statement: statement.to_string(),
        };

        self.statement_duration_seconds
            .get_or_create(&labels)
            .observe(duration_secs);
    }

    /// Encode metrics in Prometheus text format.
    ///
    /// # Panics
    ///
    /// Panics if Prometheus metric encoding to a `String` buffer fails.
    /// The `fmt::Write` impl for `String` is infallible, and all metric
    /// labels use derived `EncodeLabelSet` impls that do not produce
    /// `fmt::Error`.
    pub fn encode(&self) -> String {
        let mut buffer = String::new();
        // Prometheus encoding to String buffer is infallible
        #[allow(clippy::expect_used)]
        encode(&mut buffer, &self.registry).expect("encoding metrics");
        buffer
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
