//! Order compiler.
//!
//! Caller sort entries keep their precedence. The entity's default dimension
//! is appended descending when absent, and the search rank is always the
//! last key when search is active.

use sea_query::{Expr, SimpleExpr};
use serde_json::Value;

use super::schema::{ColumnDef, EntitySchema};
use super::types::SortDirection;
use crate::error::{ListingError, ListingResult};

/// Alias the search rank is projected under.
pub const RANK_ALIAS: &str = "rank";

/// What a sort key orders by.
#[derive(Debug, Clone, Copy)]
pub enum SortTarget {
    Column(&'static ColumnDef),
    Rank,
}

/// One ORDER BY key.
#[derive(Debug, Clone, Copy)]
pub struct SortKey {
    pub target: SortTarget,
    pub direction: SortDirection,
}

impl SortKey {
    pub fn column(column: &'static ColumnDef, direction: SortDirection) -> Self {
        Self {
            target: SortTarget::Column(column),
            direction,
        }
    }

    /// Projected alias of the key.
    pub fn field(&self) -> &'static str {
        match self.target {
            SortTarget::Column(column) => column.field,
            SortTarget::Rank => RANK_ALIAS,
        }
    }

    /// Expression inside the grouped statement.
    pub fn grouped_expr(&self, rank: Option<&SimpleExpr>) -> SimpleExpr {
        match (self.target, rank) {
            (SortTarget::Column(column), _) => Expr::cust(column.sql()),
            (SortTarget::Rank, Some(rank)) => rank.clone(),
            (SortTarget::Rank, None) => Expr::cust("0"),
        }
    }

    /// Expression against the projected alias of a wrapping query.
    pub fn projected_expr(&self, relation: &str) -> SimpleExpr {
        Expr::cust(format!("{relation}.\"{}\"", self.field()))
    }
}

/// Validate caller sort entries against an entity's column table.
///
/// `null` directions mean "not sorted by this field" and are skipped.
pub fn parse_sorts(
    schema: &EntitySchema,
    requested: &[(String, Value)],
) -> ListingResult<Vec<SortKey>> {
    let mut keys: Vec<SortKey> = Vec::with_capacity(requested.len());

    for (field, raw) in requested {
        let direction = match raw {
            Value::Null => continue,
            Value::String(s) => SortDirection::parse(s).ok_or_else(|| {
                ListingError::sort(field, format!("direction must be ASC or DESC, got '{s}'"))
            })?,
            other => {
                return Err(ListingError::sort(
                    field,
                    format!("direction must be ASC or DESC, got {other}"),
                ));
            }
        };

        let column = schema
            .column(field)
            .ok_or_else(|| ListingError::sort(field, "unknown field"))?;
        if !column.sortable {
            return Err(ListingError::sort(field, "field is not sortable"));
        }
        if keys.iter().any(|k| k.field() == column.field) {
            return Err(ListingError::sort(field, "field sorted more than once"));
        }

        keys.push(SortKey::column(column, direction));
    }

    Ok(keys)
}

/// Complete the caller's keys with the default dimension and rank.
pub fn compile(
    mut keys: Vec<SortKey>,
    default: &'static ColumnDef,
    search_active: bool,
) -> Vec<SortKey> {
    if !keys.iter().any(|k| k.field() == default.field) {
        keys.push(SortKey::column(default, SortDirection::Desc));
    }
    if search_active {
        keys.push(SortKey {
            target: SortTarget::Rank,
            direction: SortDirection::Desc,
        });
    }
    keys
}
