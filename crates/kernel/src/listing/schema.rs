//! Static entity declarations: join graph, column table, aggregate table.
//!
//! Each listed entity declares, once, which tables participate in its
//! statements, how every caller-visible field maps to a SQL expression, and
//! which clause a filter on that field belongs to. Statement assembly reads
//! these declarations; nothing about the join graph is decided at call sites.

use sea_query::{Alias, Expr, Query, SelectStatement};

/// SQL join types used by entity join graphs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JoinKind {
    /// Required association; rows without a match are dropped.
    Inner,
    /// Optional association; rows without a match are kept with NULLs.
    Left,
}

impl From<JoinKind> for sea_query::JoinType {
    fn from(kind: JoinKind) -> Self {
        match kind {
            JoinKind::Inner => sea_query::JoinType::InnerJoin,
            JoinKind::Left => sea_query::JoinType::LeftJoin,
        }
    }
}

/// One edge of an entity's join graph.
#[derive(Debug)]
pub struct JoinEdge {
    /// Table to join.
    pub table: &'static str,
    /// Alias the table is joined as.
    pub alias: &'static str,
    /// Join type.
    pub kind: JoinKind,
    /// ON equality, written against aliases.
    pub on: &'static str,
}

/// Fan-out-safe aggregate expressions.
#[derive(Debug)]
pub enum Aggregate {
    /// `COUNT(DISTINCT column)` over a joined association.
    CountDistinct(&'static str),
    /// Per-root value computed in a derived table joined once per root id:
    /// `LEFT JOIN (SELECT fk, <value> AS total FROM table GROUP BY fk) alias`.
    Rollup {
        alias: &'static str,
        table: &'static str,
        foreign_key: &'static str,
        value: &'static str,
    },
}

/// Column of a rollup derived table holding the per-root value.
const ROLLUP_VALUE: &str = "total";

impl Aggregate {
    /// SQL expression valid in the grouped statement's SELECT/HAVING/ORDER BY.
    pub fn expr(&self) -> String {
        match self {
            Aggregate::CountDistinct(column) => format!("COUNT(DISTINCT {column})"),
            Aggregate::Rollup { alias, .. } => {
                format!("COALESCE(MAX({alias}.{ROLLUP_VALUE}), 0)")
            }
        }
    }
}

/// How a filter value must be shaped for a column.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FilterKind {
    /// Single integer id.
    Id,
    /// Set of integer ids.
    Ids,
    /// Case-insensitive substring.
    Text,
    /// Comparator plus integer.
    Numeric,
    /// Day or day range.
    Date,
}

/// Where a column's value lives in the statement.
#[derive(Debug)]
pub enum ColumnSource {
    /// Row-level expression; filters go to WHERE.
    Row(&'static str),
    /// Aggregate; filters go to HAVING.
    Aggregate(Aggregate),
    /// Expression on a joined table; filters go to that join's ON clause.
    Join {
        join: &'static str,
        expr: &'static str,
    },
}

/// Clause a filter on a column is compiled into.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Where,
    Having,
    Join(&'static str),
}

/// One caller-visible field of an entity.
#[derive(Debug)]
pub struct ColumnDef {
    /// Logical field name; also the projected alias.
    pub field: &'static str,
    pub source: ColumnSource,
    /// Accepted filter shape, if the field is filterable.
    pub filter: Option<FilterKind>,
    pub sortable: bool,
    /// Whether the grouped statement selects this column.
    pub projected: bool,
}

impl ColumnDef {
    /// Fully-qualified SQL expression for this column.
    pub fn sql(&self) -> String {
        match &self.source {
            ColumnSource::Row(expr) | ColumnSource::Join { expr, .. } => (*expr).to_string(),
            ColumnSource::Aggregate(aggregate) => aggregate.expr(),
        }
    }

    pub fn stage(&self) -> Stage {
        match &self.source {
            ColumnSource::Row(_) => Stage::Where,
            ColumnSource::Aggregate(_) => Stage::Having,
            ColumnSource::Join { join, .. } => Stage::Join(join),
        }
    }
}

/// Complete declaration of a listed entity.
#[derive(Debug)]
pub struct EntitySchema {
    /// Entity name used in logs, metrics and statement names.
    pub entity: &'static str,
    /// Root table (also its alias).
    pub table: &'static str,
    /// Root primary key expression.
    pub primary_key: &'static str,
    /// Joins of the grouped statement, in order.
    pub joins: &'static [JoinEdge],
    /// Caller-visible fields, in declaration order.
    pub columns: &'static [ColumnDef],
    /// GROUP BY expressions; every projected row column depends on these.
    pub group_by: &'static [&'static str],
    /// Precomputed `tsvector` column searched by free text.
    pub search_vector: &'static str,
    /// Field appended descending when the caller does not sort by it.
    pub default_sort: &'static str,
    /// Fan-out associations re-joined to the paginated page.
    pub nested_joins: &'static [JoinEdge],
    /// `(expression, alias)` pairs selected from the nested joins.
    pub nested_columns: &'static [(&'static str, &'static str)],
    /// Tie-break order of nested rows within one root entity.
    pub nested_order: &'static [&'static str],
}

impl EntitySchema {
    /// Look up a column by field name.
    pub fn column(&self, field: &str) -> Option<&'static ColumnDef> {
        self.columns.iter().find(|c| c.field == field)
    }

    /// Position of a column in declaration order.
    pub fn position(&self, field: &str) -> Option<usize> {
        self.columns.iter().position(|c| c.field == field)
    }

    /// Look up a join edge by alias.
    pub fn join(&self, alias: &str) -> Option<&'static JoinEdge> {
        self.joins.iter().find(|j| j.alias == alias)
    }

    /// Rollup aggregates, each of which adds one derived-table join.
    pub fn rollups(&self) -> impl Iterator<Item = &'static Aggregate> {
        self.columns.iter().filter_map(|c| match &c.source {
            ColumnSource::Aggregate(agg @ Aggregate::Rollup { .. }) => Some(agg),
            _ => None,
        })
    }

    /// `(field, sql)` pairs for every column, in declaration order.
    pub fn cols(&self) -> Vec<(&'static str, String)> {
        self.columns.iter().map(|c| (c.field, c.sql())).collect()
    }
}

/// Derived table and ON condition for a rollup aggregate.
pub(crate) fn rollup_join(
    aggregate: &Aggregate,
    primary_key: &str,
) -> Option<(SelectStatement, &'static str, String)> {
    let Aggregate::Rollup {
        alias,
        table,
        foreign_key,
        value,
    } = aggregate
    else {
        return None;
    };

    let mut subquery = Query::select();
    subquery
        .column(Alias::new(*foreign_key))
        .expr_as(Expr::cust(*value), Alias::new(ROLLUP_VALUE))
        .from(Alias::new(*table))
        .add_group_by([Expr::col(Alias::new(*foreign_key)).into()]);

    Some((subquery, alias, format!("{alias}.{foreign_key} = {primary_key}")))
}

#[cfg(test)]
// Tests are allowed to use unwrap/expect freely.
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::listing::articles::ARTICLES;
    use crate::listing::tags::TAGS;
    use sea_query::PostgresQueryBuilder;

    #[test]
    fn aggregate_expressions() {
        assert_eq!(
            Aggregate::CountDistinct("answers.id").expr(),
            "COUNT(DISTINCT answers.id)"
        );
        let rollup = Aggregate::Rollup {
            alias: "vote_totals",
            table: "votes",
            foreign_key: "article_id",
            value: "SUM(value)",
        };
        assert_eq!(rollup.expr(), "COALESCE(MAX(vote_totals.total), 0)");
    }

    #[test]
    fn rollup_derived_table() {
        let rollup = Aggregate::Rollup {
            alias: "vote_totals",
            table: "votes",
            foreign_key: "article_id",
            value: "SUM(value)",
        };
        let (subquery, alias, on) = rollup_join(&rollup, "articles.id").unwrap();
        let sql = subquery.to_string(PostgresQueryBuilder);
        assert_eq!(alias, "vote_totals");
        assert_eq!(on, "vote_totals.article_id = articles.id");
        assert!(sql.contains("SUM(value) AS \"total\""), "{sql}");
        assert!(sql.contains("FROM \"votes\""), "{sql}");
        assert!(sql.contains("GROUP BY \"article_id\""), "{sql}");

        assert!(rollup_join(&Aggregate::CountDistinct("x.id"), "articles.id").is_none());
    }

    #[test]
    fn aggregate_columns_filter_in_having() {
        for schema in [&ARTICLES, &TAGS] {
            for column in schema.columns {
                let is_aggregate = matches!(column.source, ColumnSource::Aggregate(_));
                assert_eq!(
                    column.stage() == Stage::Having,
                    is_aggregate,
                    "{}.{}",
                    schema.entity,
                    column.field
                );
            }
        }
    }

    #[test]
    fn sortable_columns_are_projected() {
        for schema in [&ARTICLES, &TAGS] {
            for column in schema.columns.iter().filter(|c| c.sortable) {
                assert!(column.projected, "{}.{}", schema.entity, column.field);
            }
            let default = schema.column(schema.default_sort).unwrap();
            assert!(default.sortable);
        }
    }

    #[test]
    fn join_columns_reference_declared_joins() {
        for schema in [&ARTICLES, &TAGS] {
            for column in schema.columns {
                if let Stage::Join(alias) = column.stage() {
                    assert!(schema.join(alias).is_some(), "{}", column.field);
                }
            }
        }
    }

    #[test]
    fn field_names_unique() {
        for schema in [&ARTICLES, &TAGS] {
            let mut fields: Vec<&str> = schema.columns.iter().map(|c| c.field).collect();
            fields.sort_unstable();
            let before = fields.len();
            fields.dedup();
            assert_eq!(before, fields.len(), "{}", schema.entity);
        }
    }

    #[test]
    fn cols_map_exposes_expressions() {
        let cols = ARTICLES.cols();
        let votes = cols.iter().find(|(f, _)| *f == "votes").unwrap();
        assert_eq!(votes.1, "COALESCE(MAX(vote_totals.total), 0)");
        let answers = cols.iter().find(|(f, _)| *f == "answers").unwrap();
        assert_eq!(answers.1, "COUNT(DISTINCT answers.id)");
    }
}
