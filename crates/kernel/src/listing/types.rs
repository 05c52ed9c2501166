//! Listing request and response types.
//!
//! Provides the raw request shape consumed from the request layer:
//! - ListQuery: limit/offset, filters, sorts, search text
//! - FilterValue: untyped filter values, narrowed per column later
//! - SortDirection / Comparator: the closed vocabularies of a request
//! - ListOutput: the page handed back to the response layer

use std::collections::BTreeMap;
use std::fmt;

use serde::de::{self, Deserializer, MapAccess, Visitor};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Listing request as received from the caller.
///
/// Every part is kept close to its raw form so that malformed values surface
/// as listing errors naming the offending field instead of a generic decode
/// failure.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ListQuery {
    /// Page size; integers or integer strings.
    #[serde(default)]
    pub limit: Option<Value>,

    /// Rows to skip; integers or integer strings.
    #[serde(default)]
    pub offset: Option<Value>,

    /// Field name -> filter value. `null` means the filter is absent.
    #[serde(default)]
    pub filters: Option<BTreeMap<String, Value>>,

    /// Field name -> direction, in caller precedence order.
    #[serde(default)]
    pub sorts: RequestedSorts,

    /// Free-text search, or `false`/`null` for none.
    #[serde(default)]
    pub search: Option<Value>,
}

impl ListQuery {
    /// Create an empty request (defaults everywhere).
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the page size.
    pub fn limit(mut self, limit: u64) -> Self {
        self.limit = Some(Value::from(limit));
        self
    }

    /// Set the offset.
    pub fn offset(mut self, offset: u64) -> Self {
        self.offset = Some(Value::from(offset));
        self
    }

    /// Add a filter.
    pub fn filter(mut self, field: &str, value: impl Into<Value>) -> Self {
        self.filters
            .get_or_insert_with(BTreeMap::new)
            .insert(field.to_string(), value.into());
        self
    }

    /// Append a sort key; earlier keys take precedence.
    pub fn sort(mut self, field: &str, direction: SortDirection) -> Self {
        self.sorts
            .0
            .push((field.to_string(), Value::from(direction.as_str())));
        self
    }

    /// Set the search text.
    pub fn search(mut self, text: &str) -> Self {
        self.search = Some(Value::from(text));
        self
    }
}

/// Sort request entries in the order the caller wrote them.
///
/// Deserializes from a JSON object (or `null`). Entry order is taken from the
/// input document, so precedence survives even though JSON objects are
/// nominally unordered.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RequestedSorts(pub Vec<(String, Value)>);

impl<'de> Deserialize<'de> for RequestedSorts {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct SortsVisitor;

        impl<'de> Visitor<'de> for SortsVisitor {
            type Value = RequestedSorts;

            fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str("a map of field name to sort direction")
            }

            fn visit_unit<E: de::Error>(self) -> Result<Self::Value, E> {
                Ok(RequestedSorts::default())
            }

            fn visit_none<E: de::Error>(self) -> Result<Self::Value, E> {
                Ok(RequestedSorts::default())
            }

            fn visit_map<A: MapAccess<'de>>(self, mut map: A) -> Result<Self::Value, A::Error> {
                let mut entries = Vec::new();
                while let Some((field, direction)) = map.next_entry::<String, Value>()? {
                    entries.push((field, direction));
                }
                Ok(RequestedSorts(entries))
            }
        }

        deserializer.deserialize_any(SortsVisitor)
    }
}

/// Filter value types.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(untagged)]
pub enum FilterValue {
    /// Integer value.
    Integer(i64),
    /// String value.
    String(String),
    /// List of values (for set membership).
    List(Vec<FilterValue>),
    /// Comparator plus operand (numeric filters).
    Comparison(Comparison),
    /// Inclusive day range (date filters).
    Range(DateRange),
}

impl FilterValue {
    /// Convert to integer if possible.
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            FilterValue::Integer(i) => Some(*i),
            FilterValue::String(s) => s.trim().parse().ok(),
            _ => None,
        }
    }

    /// Extract a list of integers; a scalar counts as a one-element list.
    ///
    /// Returns `None` if any element is not an integer.
    pub fn as_i64_list(&self) -> Option<Vec<i64>> {
        match self {
            FilterValue::List(items) => items.iter().map(FilterValue::as_i64).collect(),
            other => other.as_i64().map(|v| vec![v]),
        }
    }

    /// Borrow the string value.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            FilterValue::String(s) => Some(s),
            _ => None,
        }
    }
}

/// Numeric comparison: `{"op": ">=", "value": 5}`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct Comparison {
    /// Operator; equality when omitted.
    #[serde(default)]
    pub op: Comparator,

    /// Operand.
    pub value: Box<FilterValue>,
}

/// Day range: `{"from": "2024-01-01", "to": "2024-01-31"}`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct DateRange {
    /// First day included.
    #[serde(default)]
    pub from: Option<String>,

    /// Last day included.
    #[serde(default)]
    pub to: Option<String>,
}

/// Comparison operators for numeric filters.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, Default, PartialEq, Eq)]
pub enum Comparator {
    #[default]
    #[serde(rename = "=", alias = "eq")]
    Eq,
    #[serde(rename = ">", alias = "gt")]
    Gt,
    #[serde(rename = ">=", alias = "gte")]
    Gte,
    #[serde(rename = "<", alias = "lt")]
    Lt,
    #[serde(rename = "<=", alias = "lte")]
    Lte,
}

impl Comparator {
    /// SQL spelling of the operator.
    pub fn as_sql(self) -> &'static str {
        match self {
            Comparator::Eq => "=",
            Comparator::Gt => ">",
            Comparator::Gte => ">=",
            Comparator::Lt => "<",
            Comparator::Lte => "<=",
        }
    }
}

/// Sort direction.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, Default, PartialEq, Eq)]
#[serde(rename_all = "UPPERCASE")]
pub enum SortDirection {
    #[default]
    Asc,
    Desc,
}

impl SortDirection {
    /// Parse `ASC`/`DESC` in any case.
    pub fn parse(value: &str) -> Option<Self> {
        if value.eq_ignore_ascii_case("asc") {
            Some(SortDirection::Asc)
        } else if value.eq_ignore_ascii_case("desc") {
            Some(SortDirection::Desc)
        } else {
            None
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            SortDirection::Asc => "ASC",
            SortDirection::Desc => "DESC",
        }
    }
}

impl From<SortDirection> for sea_query::Order {
    fn from(direction: SortDirection) -> Self {
        match direction {
            SortDirection::Asc => sea_query::Order::Asc,
            SortDirection::Desc => sea_query::Order::Desc,
        }
    }
}

/// One page of a listing plus the total before paging.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct ListOutput<E> {
    /// Denormalized entities in requested order.
    pub data: Vec<E>,

    /// Distinct root entities matching all filters.
    pub total: u64,
}
