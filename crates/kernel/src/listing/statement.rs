//! Page and total statement assembly.
//!
//! Both statements share one grouped core: the root table, its declared
//! joins, rollup derived tables, WHERE, GROUP BY and HAVING. The page
//! statement orders and paginates that core over root entities and, when the
//! entity has nested associations, re-joins them to the paginated page. The
//! total statement counts the groups.

use sea_query::{Alias, Asterisk, Expr, Query, SelectStatement, SimpleExpr};

use super::order::{RANK_ALIAS, SortKey};
use super::schema::{EntitySchema, rollup_join};

/// Alias of the paginated core inside the nested page statement.
const PAGE_ALIAS: &str = "page";

/// Compiled clauses of one listing request.
#[derive(Debug, Clone)]
pub struct Clauses {
    pub where_clause: SimpleExpr,
    pub having_clause: SimpleExpr,
    /// ON condition for each of `schema.joins`, in the same order.
    pub join_on: Vec<SimpleExpr>,
    /// Rank expression when search is active.
    pub rank: Option<SimpleExpr>,
}

/// Root table, joins, WHERE, GROUP BY and HAVING, with nothing projected.
fn grouped_core(schema: &EntitySchema, clauses: &Clauses) -> SelectStatement {
    let mut select = Query::select();
    select.from(Alias::new(schema.table));

    for (edge, on) in schema.joins.iter().zip(&clauses.join_on) {
        select.join_as(
            edge.kind.into(),
            Alias::new(edge.table),
            Alias::new(edge.alias),
            on.clone(),
        );
    }

    for aggregate in schema.rollups() {
        if let Some((derived, alias, on)) = rollup_join(aggregate, schema.primary_key) {
            select.join_subquery(
                sea_query::JoinType::LeftJoin,
                derived,
                Alias::new(alias),
                Expr::cust(on),
            );
        }
    }

    select
        .and_where(clauses.where_clause.clone())
        .add_group_by(schema.group_by.iter().map(|expr| Expr::cust(*expr)))
        .and_having(clauses.having_clause.clone());

    select
}

/// Paginated grouped statement projecting every column plus the rank.
fn paginated_core(
    schema: &EntitySchema,
    clauses: &Clauses,
    order: &[SortKey],
    limit: u64,
    offset: u64,
) -> SelectStatement {
    let mut select = grouped_core(schema, clauses);

    for column in schema.columns.iter().filter(|c| c.projected) {
        select.expr_as(Expr::cust(column.sql()), Alias::new(column.field));
    }
    if let Some(rank) = &clauses.rank {
        select.expr_as(rank.clone(), Alias::new(RANK_ALIAS));
    }

    for key in order {
        select.order_by_expr(key.grouped_expr(clauses.rank.as_ref()), key.direction.into());
    }
    select.limit(limit).offset(offset);

    select
}

/// Page statement: one row per (root entity, nested association) pair.
pub fn page(
    schema: &EntitySchema,
    clauses: &Clauses,
    order: &[SortKey],
    limit: u64,
    offset: u64,
) -> SelectStatement {
    let core = paginated_core(schema, clauses, order, limit, offset);
    if schema.nested_joins.is_empty() {
        return core;
    }

    let mut select = Query::select();
    select
        .expr(Expr::cust(format!("{PAGE_ALIAS}.*")))
        .from_subquery(core, Alias::new(PAGE_ALIAS));

    for (expr, alias) in schema.nested_columns {
        select.expr_as(Expr::cust(*expr), Alias::new(*alias));
    }
    for edge in schema.nested_joins {
        select.join_as(
            edge.kind.into(),
            Alias::new(edge.table),
            Alias::new(edge.alias),
            Expr::cust(edge.on),
        );
    }

    for key in order {
        select.order_by_expr(key.projected_expr(PAGE_ALIAS), key.direction.into());
    }
    select.order_by_expr(
        Expr::cust(format!("{PAGE_ALIAS}.\"id\"")),
        sea_query::Order::Asc,
    );
    for expr in schema.nested_order {
        select.order_by_expr(Expr::cust(*expr), sea_query::Order::Asc);
    }

    select
}

/// Total statement: number of root entities surviving WHERE and HAVING.
pub fn total(schema: &EntitySchema, clauses: &Clauses) -> SelectStatement {
    let mut matched = grouped_core(schema, clauses);
    matched.expr_as(Expr::cust(schema.primary_key), Alias::new("id"));

    let mut select = Query::select();
    select
        .expr(Expr::col(Asterisk).count())
        .from_subquery(matched, Alias::new("matched"));
    select
}
