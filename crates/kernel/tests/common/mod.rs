#![allow(clippy::unwrap_used, clippy::expect_used)]
//! Common test utilities for listing integration tests.
//!
//! [`MockExecutor`] stands in for PostgreSQL: it records every statement it
//! is asked to run and answers with canned page rows and a canned count.
//! Everything above the executor is the real kernel code.

#![allow(dead_code)]

use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::Value;

use agora_kernel::listing::{Statement, StatementExecutor};

/// Canned statement executor.
#[derive(Debug, Default)]
pub struct MockExecutor {
    rows: Vec<Value>,
    count: i64,
    fail_page: bool,
    fail_total: bool,
    executed: Mutex<Vec<Statement>>,
}

impl MockExecutor {
    pub fn new(rows: Vec<Value>, count: i64) -> Self {
        Self {
            rows,
            count,
            ..Self::default()
        }
    }

    /// Make the page statement fail.
    pub fn failing_page(mut self) -> Self {
        self.fail_page = true;
        self
    }

    /// Make the total statement fail.
    pub fn failing_total(mut self) -> Self {
        self.fail_total = true;
        self
    }

    /// Statements executed so far, in call order.
    pub fn executed(&self) -> Vec<Statement> {
        self.executed.lock().clone()
    }

    /// SQL of the executed statement named `name`.
    pub fn sql_of(&self, name: &str) -> String {
        self.executed
            .lock()
            .iter()
            .find(|s| s.name == name)
            .map(|s| s.sql.clone())
            .expect("statement was not executed")
    }
}

#[async_trait]
impl StatementExecutor for MockExecutor {
    async fn fetch_rows(&self, statement: &Statement) -> Result<Vec<Value>, sqlx::Error> {
        self.executed.lock().push(statement.clone());
        if self.fail_page {
            return Err(sqlx::Error::Protocol("page statement rejected".into()));
        }
        Ok(self.rows.clone())
    }

    async fn fetch_count(&self, statement: &Statement) -> Result<i64, sqlx::Error> {
        self.executed.lock().push(statement.clone());
        if self.fail_total {
            return Err(sqlx::Error::Protocol("total statement rejected".into()));
        }
        Ok(self.count)
    }
}
