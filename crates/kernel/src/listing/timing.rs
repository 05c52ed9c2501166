//! Statement timing recorder.

use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use tracing::debug;

use super::executor::Statement;
use crate::metrics::Metrics;

/// Wall-clock duration of one executed statement.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatementTiming {
    pub statement: &'static str,
    pub elapsed: Duration,
}

/// Collects statement durations for one listing, in completion order.
///
/// Purely observational: the wrapped future's output is returned untouched.
#[derive(Debug, Default)]
pub struct TimingRecorder {
    timings: Mutex<Vec<StatementTiming>>,
    metrics: Option<Arc<Metrics>>,
}

impl TimingRecorder {
    pub fn new(metrics: Option<Arc<Metrics>>) -> Self {
        Self {
            timings: Mutex::new(Vec::new()),
            metrics,
        }
    }

    /// Run `future`, recording how long it took whether it succeeded or not.
    pub async fn time<T, E, F>(&self, statement: &Statement, future: F) -> Result<T, E>
    where
        F: Future<Output = Result<T, E>>,
    {
        let start = Instant::now();
        let result = future.await;
        let elapsed = start.elapsed();

        debug!(
            entity = statement.entity,
            statement = statement.name,
            elapsed_ms = elapsed.as_secs_f64() * 1000.0,
            ok = result.is_ok(),
            "listing statement finished"
        );

        if let Some(metrics) = &self.metrics {
            metrics.record_statement(statement.entity, statement.name, elapsed.as_secs_f64());
        }

        self.timings.lock().push(StatementTiming {
            statement: statement.name,
            elapsed,
        });

        result
    }

    pub fn into_timings(self) -> Vec<StatementTiming> {
        self.timings.into_inner()
    }
}
