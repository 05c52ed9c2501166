//! Predicate compiler.
//!
//! Turns typed filter descriptors into parameterized SQL boolean fragments.
//! Column expressions always come from an entity's static column table;
//! caller values are only ever bound as parameters.

use chrono::NaiveDate;
use sea_query::{Expr, SimpleExpr};
use serde_json::Value;

use super::schema::FilterKind;
use super::types::{Comparator, FilterValue};
use crate::error::{ListingError, ListingResult};

/// Day-level date filter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DateFilter {
    /// Exactly this day.
    On(NaiveDate),
    /// Inclusive range; at least one bound is present.
    Range {
        from: Option<NaiveDate>,
        to: Option<NaiveDate>,
    },
}

/// A validated filter, ready to render against a column expression.
#[derive(Debug, Clone, PartialEq)]
pub enum FilterSpec {
    Id(i64),
    Ids(Vec<i64>),
    Text(String),
    Numeric { op: Comparator, value: i64 },
    Date(DateFilter),
    /// Full-text match of a search vector against `to_tsquery(config, query)`.
    TsMatch { config: String, query: String },
}

impl FilterSpec {
    /// Narrow a raw request value to the shape a column accepts.
    ///
    /// Returns `Ok(None)` for `null`, which means "filter absent".
    pub fn parse(field: &str, kind: FilterKind, raw: &Value) -> ListingResult<Option<Self>> {
        if raw.is_null() {
            return Ok(None);
        }
        let value: FilterValue = serde_json::from_value(raw.clone())
            .map_err(|e| ListingError::filter(field, format!("unsupported value {raw}: {e}")))?;

        let spec = match kind {
            FilterKind::Id => {
                let id = value
                    .as_i64()
                    .ok_or_else(|| ListingError::filter(field, "expected an integer id"))?;
                FilterSpec::Id(id)
            }
            FilterKind::Ids => {
                let ids = value
                    .as_i64_list()
                    .ok_or_else(|| ListingError::filter(field, "expected a list of integer ids"))?;
                if ids.is_empty() {
                    return Err(ListingError::filter(field, "id list must not be empty"));
                }
                FilterSpec::Ids(ids)
            }
            FilterKind::Text => {
                let text = value
                    .as_str()
                    .ok_or_else(|| ListingError::filter(field, "expected a string"))?;
                FilterSpec::Text(text.to_string())
            }
            FilterKind::Numeric => match value {
                FilterValue::Comparison(cmp) => {
                    let operand = cmp
                        .value
                        .as_i64()
                        .ok_or_else(|| ListingError::filter(field, "expected an integer operand"))?;
                    FilterSpec::Numeric {
                        op: cmp.op,
                        value: operand,
                    }
                }
                other => {
                    let operand = other
                        .as_i64()
                        .ok_or_else(|| ListingError::filter(field, "expected an integer"))?;
                    FilterSpec::Numeric {
                        op: Comparator::Eq,
                        value: operand,
                    }
                }
            },
            FilterKind::Date => match value {
                FilterValue::String(day) => FilterSpec::Date(DateFilter::On(parse_day(field, &day)?)),
                FilterValue::Range(range) => {
                    let from = range.from.as_deref().map(|d| parse_day(field, d)).transpose()?;
                    let to = range.to.as_deref().map(|d| parse_day(field, d)).transpose()?;
                    if from.is_none() && to.is_none() {
                        return Err(ListingError::filter(field, "date range needs a bound"));
                    }
                    FilterSpec::Date(DateFilter::Range { from, to })
                }
                _ => {
                    return Err(ListingError::filter(
                        field,
                        "expected a YYYY-MM-DD day or {from, to}",
                    ));
                }
            },
        };
        Ok(Some(spec))
    }

    /// Render as a boolean expression over `column`.
    pub fn render(&self, column: &str) -> SimpleExpr {
        match self {
            FilterSpec::Id(id) => Expr::cust_with_values(format!("{column} = $1"), [*id]),
            FilterSpec::Ids(ids) => {
                let placeholders: Vec<String> = (1..=ids.len()).map(|n| format!("${n}")).collect();
                Expr::cust_with_values(
                    format!("{column} IN ({})", placeholders.join(", ")),
                    ids.iter().copied(),
                )
            }
            FilterSpec::Text(text) => Expr::cust_with_values(
                format!("{column} ILIKE $1"),
                [format!("%{}%", escape_like_wildcards(text))],
            ),
            FilterSpec::Numeric { op, value } => {
                Expr::cust_with_values(format!("{column} {} $1", op.as_sql()), [*value])
            }
            FilterSpec::Date(DateFilter::On(day)) => {
                Expr::cust_with_values(format!("({column})::date = $1::date"), [day_param(day)])
            }
            FilterSpec::Date(DateFilter::Range { from, to }) => match (from, to) {
                (Some(from), Some(to)) => Expr::cust_with_values(
                    format!("({column})::date BETWEEN $1::date AND $2::date"),
                    [day_param(from), day_param(to)],
                ),
                (Some(from), None) => Expr::cust_with_values(
                    format!("({column})::date >= $1::date"),
                    [day_param(from)],
                ),
                (None, Some(to)) => {
                    Expr::cust_with_values(format!("({column})::date <= $1::date"), [day_param(to)])
                }
                (None, None) => Expr::cust("TRUE"),
            },
            FilterSpec::TsMatch { config, query } => Expr::cust_with_values(
                format!("{column} @@ to_tsquery($1::regconfig, $2)"),
                [config.clone(), query.clone()],
            ),
        }
    }
}

fn parse_day(field: &str, day: &str) -> ListingResult<NaiveDate> {
    NaiveDate::parse_from_str(day.trim(), "%Y-%m-%d")
        .map_err(|_| ListingError::filter(field, format!("'{day}' is not a YYYY-MM-DD day")))
}

fn day_param(day: &NaiveDate) -> String {
    day.format("%Y-%m-%d").to_string()
}

/// A filter bound to the SQL expression it applies to.
#[derive(Debug, Clone, PartialEq)]
pub struct FilterDescriptor {
    pub column: String,
    pub filter: FilterSpec,
}

impl FilterDescriptor {
    pub fn new(column: impl Into<String>, filter: FilterSpec) -> Self {
        Self {
            column: column.into(),
            filter,
        }
    }
}

/// Where a compiled fragment will be placed.
#[derive(Debug, Clone)]
pub enum ClauseMode {
    /// WHERE or HAVING body.
    Standalone,
    /// Body of a join ON clause; the join equality leads the fragment.
    Join(String),
}

/// Compile descriptors into one AND-ed fragment.
///
/// An empty list yields `TRUE` in standalone mode and the bare join equality
/// in join mode, so the result can always be inlined.
pub fn compile(descriptors: &[FilterDescriptor], mode: ClauseMode) -> SimpleExpr {
    let predicates = descriptors.iter().map(|d| d.filter.render(&d.column));

    let leading = match mode {
        ClauseMode::Standalone => None,
        ClauseMode::Join(on) => Some(Expr::cust(on)),
    };

    leading
        .into_iter()
        .chain(predicates)
        .reduce(SimpleExpr::and)
        .unwrap_or_else(|| Expr::cust("TRUE"))
}

/// Escape LIKE/ILIKE wildcard characters in user-provided values.
fn escape_like_wildcards(value: &str) -> String {
    value
        .replace('\\', "\\\\")
        .replace('%', "\\%")
        .replace('_', "\\_")
}

/// Free-text search prepared for `to_tsquery`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchQuery {
    /// Text-search configuration name.
    pub config: String,
    /// Sanitized terms joined with `&`.
    pub query: String,
}

impl SearchQuery {
    /// Sanitize caller text: keep only alphanumerics, AND the remaining terms.
    ///
    /// Returns `None` when no terms remain, which disables search.
    pub fn parse(text: &str, config: &str) -> Option<Self> {
        let sanitized: String = text
            .chars()
            .map(|c| if c.is_alphanumeric() { c } else { ' ' })
            .collect();
        let terms: Vec<&str> = sanitized.split_whitespace().collect();
        if terms.is_empty() {
            return None;
        }
        Some(Self {
            config: config.to_string(),
            query: terms.join(" & "),
        })
    }

    /// Match predicate against a search vector column.
    pub fn descriptor(&self, vector: &str) -> FilterDescriptor {
        FilterDescriptor::new(
            vector,
            FilterSpec::TsMatch {
                config: self.config.clone(),
                query: self.query.clone(),
            },
        )
    }

    /// Relevance of a row, higher is better.
    pub fn rank(&self, vector: &str) -> SimpleExpr {
        Expr::cust_with_values(
            format!("ts_rank({vector}, to_tsquery($1::regconfig, $2))"),
            [self.config.clone(), self.query.clone()],
        )
    }
}
