//! Statement execution interface.
//!
//! Listings build SQL with sea-query and hand it here as a [`Statement`]:
//! the SQL text with `$n` placeholders plus its ordered bind values.

use async_trait::async_trait;
use sea_query::{PostgresQueryBuilder, SelectStatement, Value, Values};
use sqlx::postgres::{PgArguments, PgPool};
use sqlx::Arguments;

/// A built statement ready for execution.
#[derive(Debug, Clone)]
pub struct Statement {
    /// Entity the statement lists.
    pub entity: &'static str,
    /// `page` or `total`.
    pub name: &'static str,
    pub sql: String,
    pub values: Values,
}

impl Statement {
    pub fn build(entity: &'static str, name: &'static str, select: &SelectStatement) -> Self {
        let (sql, values) = select.build(PostgresQueryBuilder);
        Self {
            entity,
            name,
            sql,
            values,
        }
    }
}

/// Executes listing statements.
#[async_trait]
pub trait StatementExecutor: Send + Sync {
    /// Run a row statement; each row comes back as one JSON object keyed by
    /// column alias.
    async fn fetch_rows(&self, statement: &Statement) -> Result<Vec<serde_json::Value>, sqlx::Error>;

    /// Run a statement returning a single integer.
    async fn fetch_count(&self, statement: &Statement) -> Result<i64, sqlx::Error>;
}

#[async_trait]
impl StatementExecutor for PgPool {
    async fn fetch_rows(&self, statement: &Statement) -> Result<Vec<serde_json::Value>, sqlx::Error> {
        // Wrap in row_to_json so the alias of every column survives as a key.
        let sql = format!("SELECT row_to_json(t) FROM ({}) t", statement.sql);
        let args = bind_values(&statement.values)?;
        sqlx::query_scalar_with::<_, serde_json::Value, _>(&sql, args)
            .fetch_all(self)
            .await
    }

    async fn fetch_count(&self, statement: &Statement) -> Result<i64, sqlx::Error> {
        let args = bind_values(&statement.values)?;
        sqlx::query_scalar_with::<_, i64, _>(&statement.sql, args)
            .fetch_one(self)
            .await
    }
}

/// Convert sea-query values to positional Postgres arguments.
pub(crate) fn bind_values(values: &Values) -> Result<PgArguments, sqlx::Error> {
    let mut args = PgArguments::default();

    for value in &values.0 {
        let added = match value {
            Value::Bool(v) => args.add(*v),
            Value::Int(v) => args.add(*v),
            Value::BigInt(v) => args.add(*v),
            Value::Unsigned(v) => args.add(v.map(i64::from)),
            Value::BigUnsigned(v) => {
                let v = v
                    .map(i64::try_from)
                    .transpose()
                    .map_err(|e| sqlx::Error::Encode(Box::new(e)))?;
                args.add(v)
            }
            Value::Float(v) => args.add(*v),
            Value::Double(v) => args.add(*v),
            Value::String(v) => args.add(v.as_deref().cloned()),
            other => {
                return Err(sqlx::Error::Encode(
                    format!("unsupported bind value: {other:?}").into(),
                ));
            }
        };
        added.map_err(sqlx::Error::Encode)?;
    }

    Ok(args)
}
