//! Paginated list contract.
//!
//! A [`PaginatedList`] is built per request from a raw [`ListQuery`]. It
//! normalizes pagination, validates filters and sorts against the entity's
//! column table, and exposes the compiled clauses. `set_data` runs the page
//! and total statements and stores denormalized entities.

use std::sync::Arc;

use sea_query::SimpleExpr;
use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::{debug, warn};

use super::denormalize::{FanOutRow, decode_rows, denormalize};
use super::executor::{Statement, StatementExecutor};
use super::order::{self, SortKey};
use super::predicate::{ClauseMode, FilterDescriptor, FilterSpec, SearchQuery, compile};
use super::schema::{ColumnDef, EntitySchema, JoinEdge, Stage};
use super::statement::{self, Clauses};
use super::timing::{StatementTiming, TimingRecorder};
use super::types::{ListOutput, ListQuery};
use crate::config::ListingConfig;
use crate::error::{ListingError, ListingResult};
use crate::metrics::Metrics;

/// An entity that can be listed.
pub trait ListingQuery {
    /// One row of the page statement.
    type Row: FanOutRow<Entity = Self::Entity> + DeserializeOwned;

    /// The denormalized entity handed to callers.
    type Entity;

    fn schema() -> &'static EntitySchema;

    /// Logical field name -> SQL expression.
    fn cols() -> Vec<(&'static str, String)> {
        Self::schema().cols()
    }
}

/// One listing request for entity `Q`.
pub struct PaginatedList<Q: ListingQuery> {
    limit: u64,
    offset: u64,
    search: Option<SearchQuery>,
    filters: Vec<(&'static ColumnDef, FilterSpec)>,
    order: Vec<SortKey>,
    data: Vec<Q::Entity>,
    total: Option<u64>,
    timings: Vec<StatementTiming>,
    metrics: Option<Arc<Metrics>>,
}

impl<Q: ListingQuery> PaginatedList<Q> {
    /// Validate a request and compile its clauses.
    pub fn new(query: &ListQuery, config: &ListingConfig) -> ListingResult<Self> {
        let schema = Q::schema();

        let limit = normalize_limit(query.limit.as_ref(), config);
        let offset = integer(query.offset.as_ref()).unwrap_or(0);
        let search = parse_search(query.search.as_ref(), &config.search_config)?;

        let mut filters: Vec<(&'static ColumnDef, FilterSpec)> = Vec::new();
        for (field, raw) in query.filters.iter().flatten() {
            let column = schema
                .column(field)
                .ok_or_else(|| ListingError::filter(field, "unknown field"))?;
            let kind = column
                .filter
                .ok_or_else(|| ListingError::filter(field, "field is not filterable"))?;
            if let Some(spec) = FilterSpec::parse(field, kind, raw)? {
                // A column is filtered at most once per clause.
                if let Some((other, _)) = filters
                    .iter()
                    .find(|(other, _)| other.sql() == column.sql())
                {
                    return Err(ListingError::filter(
                        field,
                        format!("filters the same column as `{}`", other.field),
                    ));
                }
                filters.push((column, spec));
            }
        }

        let default = schema.column(schema.default_sort).ok_or_else(|| {
            ListingError::sort(schema.default_sort, "default sort field is not declared")
        })?;
        let requested = order::parse_sorts(schema, &query.sorts.0)?;
        let order = order::compile(requested, default, search.is_some());

        Ok(Self {
            limit,
            offset,
            search,
            filters,
            order,
            data: Vec::new(),
            total: None,
            timings: Vec::new(),
            metrics: None,
        })
    }

    /// Report requests, errors and statement durations to `metrics`.
    pub fn with_metrics(mut self, metrics: Arc<Metrics>) -> Self {
        self.metrics = Some(metrics);
        self
    }

    pub fn limit(&self) -> u64 {
        self.limit
    }

    pub fn offset(&self) -> u64 {
        self.offset
    }

    pub fn search(&self) -> Option<&SearchQuery> {
        self.search.as_ref()
    }

    pub fn cols(&self) -> Vec<(&'static str, String)> {
        Q::cols()
    }

    fn descriptors(&self, stage: Stage) -> Vec<FilterDescriptor> {
        self.filters
            .iter()
            .filter(|(column, _)| column.stage() == stage)
            .map(|(column, spec)| FilterDescriptor::new(column.sql(), spec.clone()))
            .collect()
    }

    /// Row-level predicates, including the search match.
    pub fn where_clause(&self) -> SimpleExpr {
        let mut descriptors = self.descriptors(Stage::Where);
        if let Some(search) = &self.search {
            descriptors.push(search.descriptor(Q::schema().search_vector));
        }
        compile(&descriptors, ClauseMode::Standalone)
    }

    /// Aggregate predicates.
    pub fn having_clause(&self) -> SimpleExpr {
        compile(&self.descriptors(Stage::Having), ClauseMode::Standalone)
    }

    /// ON clause of a join, with any filters declared against it.
    pub fn join_clause(&self, edge: &JoinEdge) -> SimpleExpr {
        compile(
            &self.descriptors(Stage::Join(edge.alias)),
            ClauseMode::Join(edge.on.to_string()),
        )
    }

    /// Compiled ORDER BY keys.
    pub fn order(&self) -> &[SortKey] {
        &self.order
    }

    fn clauses(&self) -> Clauses {
        let schema = Q::schema();
        Clauses {
            where_clause: self.where_clause(),
            having_clause: self.having_clause(),
            join_on: schema.joins.iter().map(|edge| self.join_clause(edge)).collect(),
            rank: self
                .search
                .as_ref()
                .map(|search| search.rank(schema.search_vector)),
        }
    }

    pub fn page_statement(&self) -> Statement {
        let schema = Q::schema();
        let select = statement::page(schema, &self.clauses(), &self.order, self.limit, self.offset);
        Statement::build(schema.entity, "page", &select)
    }

    pub fn total_statement(&self) -> Statement {
        let schema = Q::schema();
        let select = statement::total(schema, &self.clauses());
        Statement::build(schema.entity, "total", &select)
    }

    /// Execute both statements and load `data` and `total`.
    ///
    /// May be called again; each call re-executes and overwrites the
    /// previous result.
    pub async fn set_data<E>(&mut self, executor: &E) -> ListingResult<()>
    where
        E: StatementExecutor + ?Sized,
    {
        let entity = Q::schema().entity;
        let page = self.page_statement();
        let total = self.total_statement();

        if let Some(metrics) = &self.metrics {
            metrics.record_request(entity);
        }

        let recorder = TimingRecorder::new(self.metrics.clone());
        let fetched = tokio::try_join!(
            recorder.time(&page, executor.fetch_rows(&page)),
            recorder.time(&total, executor.fetch_count(&total)),
        );
        self.timings = recorder.into_timings();

        let loaded = fetched
            .map_err(ListingError::from)
            .and_then(|(rows, count)| {
                let rows = decode_rows::<Q::Row>(rows)?;
                Ok((denormalize(rows)?, count))
            });

        match loaded {
            Ok((data, count)) => {
                debug!(
                    entity,
                    entities = data.len(),
                    total = count,
                    limit = self.limit,
                    offset = self.offset,
                    "listing loaded"
                );
                self.data = data;
                self.total = Some(u64::try_from(count).unwrap_or_default());
                Ok(())
            }
            Err(err) => {
                warn!(entity, error = %err, "listing failed");
                if let Some(metrics) = &self.metrics {
                    metrics.record_error(entity, err.kind());
                }
                self.data.clear();
                self.total = None;
                Err(err)
            }
        }
    }

    /// Denormalized entities of the page; empty before `set_data`.
    pub fn data(&self) -> &[Q::Entity] {
        &self.data
    }

    /// Matching root entities; `None` before `set_data`.
    pub fn total(&self) -> Option<u64> {
        self.total
    }

    /// Statement durations of the last `set_data`, in completion order.
    pub fn timings(&self) -> &[StatementTiming] {
        &self.timings
    }

    pub fn into_output(self) -> ListOutput<Q::Entity> {
        ListOutput {
            data: self.data,
            total: self.total.unwrap_or_default(),
        }
    }
}

/// Non-negative integer from a number or an integer string, bindable as a
/// Postgres `BIGINT`.
fn integer(raw: Option<&Value>) -> Option<u64> {
    let n = match raw? {
        Value::Number(n) => n.as_u64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }?;
    i64::try_from(n).is_ok().then_some(n)
}

fn normalize_limit(raw: Option<&Value>, config: &ListingConfig) -> u64 {
    match integer(raw).filter(|&n| n > 0) {
        None => config.default_limit,
        Some(requested) if requested > config.max_limit => {
            warn!(
                requested,
                capped = config.max_limit,
                "limit exceeds maximum, capping"
            );
            config.max_limit
        }
        Some(limit) => limit,
    }
}

fn parse_search(raw: Option<&Value>, config: &str) -> ListingResult<Option<SearchQuery>> {
    match raw {
        None | Some(Value::Null) | Some(Value::Bool(false)) => Ok(None),
        Some(Value::String(text)) => Ok(SearchQuery::parse(text, config)),
        Some(other) => Err(ListingError::filter(
            "search",
            format!("expected a string or false, got {other}"),
        )),
    }
}

#[cfg(test)]
// Tests are allowed to use unwrap/expect freely.
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::listing::articles::{ARTICLES, Articles};
    use crate::listing::tags::{TAGS, Tags};
    use crate::listing::types::SortDirection;
    use sea_query::{Alias, Expr, PostgresQueryBuilder, Query};
    use serde_json::json;

    fn where_sql(expr: SimpleExpr) -> String {
        Query::select()
            .expr(Expr::cust("1"))
            .from(Alias::new("t"))
            .and_where(expr)
            .to_string(PostgresQueryBuilder)
    }

    fn config() -> ListingConfig {
        ListingConfig::default()
    }

    fn articles(query: ListQuery) -> PaginatedList<Articles> {
        PaginatedList::new(&query, &config()).unwrap()
    }

    #[test]
    fn pagination_defaults() {
        let list = articles(ListQuery::new());
        assert_eq!(list.limit(), 10);
        assert_eq!(list.offset(), 0);
        assert!(list.search().is_none());
        assert_eq!(list.total(), None);
        assert!(list.data().is_empty());
    }

    #[test]
    fn pagination_normalization() {
        let cases = [
            (json!("5"), json!("2"), 5, 2),
            (json!("abc"), json!(-3), 10, 0),
            (json!(0), json!(1.5), 10, 0),
            (json!(-1), json!(null), 10, 0),
            (json!(1000), json!(40), 100, 40),
            (json!(5), json!(u64::MAX), 5, 0),
            (json!("18446744073709551615"), json!(i64::MAX), 10, i64::MAX as u64),
        ];
        for (limit, offset, expected_limit, expected_offset) in cases {
            let query = ListQuery {
                limit: Some(limit.clone()),
                offset: Some(offset.clone()),
                ..ListQuery::default()
            };
            let list = articles(query);
            assert_eq!(list.limit(), expected_limit, "limit {limit}");
            assert_eq!(list.offset(), expected_offset, "offset {offset}");
        }
    }

    #[test]
    fn no_filters_yield_tautologies() {
        let list = articles(ListQuery::new());
        assert!(where_sql(list.where_clause()).ends_with("WHERE TRUE"));
        assert!(where_sql(list.having_clause()).ends_with("WHERE TRUE"));
    }

    #[test]
    fn aggregate_filters_go_to_having() {
        let list = articles(
            ListQuery::new()
                .filter("votes", json!({"op": ">=", "value": 5}))
                .filter("hubs", json!([3])),
        );
        let where_clause = where_sql(list.where_clause());
        let having = where_sql(list.having_clause());

        assert!(where_clause.contains("hubs.id IN (3)"), "{where_clause}");
        assert!(!where_clause.contains("vote_totals"), "{where_clause}");
        assert!(
            having.contains("COALESCE(MAX(vote_totals.total), 0) >= 5"),
            "{having}"
        );
        assert!(!having.contains("hubs.id"), "{having}");
    }

    #[test]
    fn join_filters_go_to_on_clause() {
        let query = ListQuery::new().filter("articleCreatedAt", json!({"from": "2024-01-01"}));
        let list: PaginatedList<Tags> = PaginatedList::new(&query, &config()).unwrap();

        let articles_edge = TAGS.join("articles").unwrap();
        let on = where_sql(list.join_clause(articles_edge));
        assert!(on.contains("articles.id = article_tags.article_id"), "{on}");
        assert!(on.contains("(articles.created_at)::date >= '2024-01-01'::date"), "{on}");

        assert!(where_sql(list.where_clause()).ends_with("WHERE TRUE"));
        let link = where_sql(list.join_clause(TAGS.join("article_tags").unwrap()));
        assert!(link.ends_with("WHERE article_tags.tag_id = tags.id"), "{link}");
    }

    #[test]
    fn search_adds_match_and_rank() {
        let list = articles(ListQuery::new().search("foo"));
        assert!(list.search().is_some());
        let where_clause = where_sql(list.where_clause());
        assert!(
            where_clause.contains("articles.search_vector @@ to_tsquery('english'::regconfig, 'foo')"),
            "{where_clause}"
        );
        assert_eq!(list.order().last().unwrap().field(), "rank");
    }

    #[test]
    fn blank_or_false_search_is_inactive() {
        for search in [json!(false), json!(null), json!("  "), json!("!!")] {
            let query = ListQuery {
                search: Some(search),
                ..ListQuery::default()
            };
            let list = articles(query);
            assert!(list.search().is_none());
            assert_eq!(list.order().len(), 1);
        }
    }

    #[test]
    fn invalid_search_rejected() {
        let query = ListQuery {
            search: Some(json!(42)),
            ..ListQuery::default()
        };
        let err = PaginatedList::<Articles>::new(&query, &config()).err().unwrap();
        assert!(matches!(err, ListingError::InvalidFilterSpec { ref field, .. } if field == "search"));
    }

    #[test]
    fn unknown_or_unfilterable_fields_rejected() {
        for field in ["body", "abstract"] {
            let query = ListQuery::new().filter(field, json!("x"));
            let err = PaginatedList::<Articles>::new(&query, &config()).err().unwrap();
            assert!(err.is_client_error(), "{field}");
        }
    }

    #[test]
    fn null_filter_is_absent() {
        let list = articles(ListQuery::new().filter("hubs", Value::Null));
        assert!(where_sql(list.where_clause()).ends_with("WHERE TRUE"));
    }

    #[test]
    fn one_column_filtered_twice_rejected() {
        let query = ListQuery::new()
            .filter("id", json!(4))
            .filter("ids", json!([4, 5]));
        let err = PaginatedList::<Tags>::new(&query, &config()).err().unwrap();
        assert!(matches!(err, ListingError::InvalidFilterSpec { .. }), "{err}");
        assert!(err.is_client_error());

        // A null entry is absent, so it does not collide.
        let query = ListQuery::new()
            .filter("id", Value::Null)
            .filter("ids", json!([4, 5]));
        let list = PaginatedList::<Tags>::new(&query, &config()).unwrap();
        let where_clause = where_sql(list.where_clause());
        assert!(where_clause.contains("tags.id IN (4, 5)"), "{where_clause}");
    }

    #[test]
    fn sort_errors_surface() {
        let query = ListQuery::new().sort("abstract", SortDirection::Asc);
        let err = PaginatedList::<Articles>::new(&query, &config()).err().unwrap();
        assert!(matches!(err, ListingError::InvalidSortSpec { .. }));
    }

    #[test]
    fn statements_bind_caller_values() {
        let list = articles(
            ListQuery::new()
                .limit(2)
                .filter("title", json!("'; DROP TABLE articles; --")),
        );
        let page = list.page_statement();
        assert_eq!(page.name, "page");
        assert!(!page.sql.contains("DROP TABLE"), "{}", page.sql);
        assert!(page.sql.contains("articles.title ILIKE $1"), "{}", page.sql);

        let total = list.total_statement();
        assert_eq!(total.name, "total");
        assert!(!total.sql.contains("LIMIT"), "{}", total.sql);
        assert_eq!(total.values.0.len(), 1);
    }

    #[test]
    fn cols_expose_column_expressions() {
        let list = articles(ListQuery::new());
        let cols = list.cols();
        assert_eq!(cols.len(), ARTICLES.columns.len());
        assert!(cols.contains(&("createdAt", "articles.created_at".to_string())));
    }
}
