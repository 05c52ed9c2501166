#![allow(clippy::unwrap_used, clippy::expect_used)]
//! Listing tests against a live PostgreSQL.
//!
//! Runs only when `AGORA_TEST_DATABASE_URL` points at a disposable database;
//! the fixture schema drops and recreates its tables.

use agora_kernel::config::{Config, ListingConfig};
use agora_kernel::db;
use agora_kernel::listing::{Article, Articles, ListQuery, PaginatedList, Tag, Tags};
use serde_json::json;
use sqlx::PgPool;

async fn fixture_pool() -> Option<PgPool> {
    let Ok(database_url) = std::env::var("AGORA_TEST_DATABASE_URL") else {
        eprintln!("AGORA_TEST_DATABASE_URL not set, skipping");
        return None;
    };

    let config = Config {
        database_url,
        database_max_connections: 4,
        statement_timeout_ms: 5000,
        listing: ListingConfig::default(),
    };
    let pool = db::create_pool(&config).await.unwrap();
    assert!(db::check_health(&pool).await);

    sqlx::raw_sql(include_str!("fixtures/schema.sql"))
        .execute(&pool)
        .await
        .unwrap();
    Some(pool)
}

async fn list_articles(pool: &PgPool, query: ListQuery) -> (Vec<Article>, u64) {
    let mut list = PaginatedList::<Articles>::new(&query, &ListingConfig::default()).unwrap();
    list.set_data(pool).await.unwrap();
    let output = list.into_output();
    (output.data, output.total)
}

async fn list_tags(pool: &PgPool, query: ListQuery) -> (Vec<Tag>, u64) {
    let mut list = PaginatedList::<Tags>::new(&query, &ListingConfig::default()).unwrap();
    list.set_data(pool).await.unwrap();
    let output = list.into_output();
    (output.data, output.total)
}

fn article_ids(articles: &[Article]) -> Vec<i64> {
    articles.iter().map(|a| a.id).collect()
}

#[tokio::test]
async fn listings_against_postgres() {
    let Some(pool) = fixture_pool().await else {
        return;
    };

    // Default order is newest first; aggregates survive the hub x tag fan-out.
    let (articles, total) = list_articles(&pool, ListQuery::new()).await;
    assert_eq!(article_ids(&articles), vec![2, 1, 3]);
    assert_eq!(total, 3);
    let first = &articles[1];
    assert_eq!(first.answers, 2);
    assert_eq!(first.votes, 3);
    assert_eq!(first.hubs.iter().map(|h| h.id).collect::<Vec<_>>(), vec![3, 5]);
    assert_eq!(first.author.login, "alice");
    assert_eq!(articles[2].votes, 0);
    assert_eq!(articles[2].answers, 0);
    assert_eq!(articles[2].tags.len(), 2);

    // Pagination applies to articles, not to fan-out rows.
    let (page, total) = list_articles(&pool, ListQuery::new().limit(1).offset(1)).await;
    assert_eq!(article_ids(&page), vec![1]);
    assert_eq!(page[0].hubs.len(), 2);
    assert_eq!(total, 3);

    // A hub filter restricts membership but returns every hub.
    let (filtered, total) =
        list_articles(&pool, ListQuery::new().filter("hubs", json!([3]))).await;
    assert_eq!(article_ids(&filtered), vec![2, 1]);
    assert_eq!(filtered[1].hubs.len(), 2);
    assert_eq!(total, 2);

    // Aggregate filters exclude from both data and total.
    let (voted, total) = list_articles(
        &pool,
        ListQuery::new().filter("votes", json!({"op": ">=", "value": 5})),
    )
    .await;
    assert_eq!(article_ids(&voted), vec![2]);
    assert_eq!(total, 1);

    // Search matches and ranks.
    let (found, total) = list_articles(&pool, ListQuery::new().search("foo")).await;
    assert_eq!(article_ids(&found), vec![2, 1]);
    assert!(found.iter().all(|a| a.rank.is_some()));
    assert_eq!(total, 2);

    // Text filters bind their value; quotes are harmless.
    let (none, total) =
        list_articles(&pool, ListQuery::new().filter("title", json!("'; DROP TABLE articles; --")))
            .await;
    assert!(none.is_empty());
    assert_eq!(total, 0);

    // Unused tags are listed with a zero count, last under the default order.
    let (tags, total) = list_tags(&pool, ListQuery::new()).await;
    assert_eq!(total, 3);
    let last = tags.last().unwrap();
    assert_eq!(last.name, "orphan");
    assert_eq!(last.articles, 0);

    // Article-level filters narrow the count without dropping the tag.
    let (recent, total) = list_tags(
        &pool,
        ListQuery::new()
            .filter("articleCreatedAt", json!({"from": "2024-01-15"}))
            .sort("name", agora_kernel::listing::SortDirection::Asc),
    )
    .await;
    assert_eq!(total, 3);
    let counts: Vec<(&str, i64)> = recent.iter().map(|t| (t.name.as_str(), t.articles)).collect();
    assert_eq!(counts, vec![("async", 0), ("orphan", 0), ("sql", 1)]);

    // With equal createdAt values, rank alone decides the order.
    sqlx::query("UPDATE articles SET created_at = '2024-01-20T12:00:00Z' WHERE id IN (1, 2)")
        .execute(&pool)
        .await
        .unwrap();
    let (tied, total) = list_articles(&pool, ListQuery::new().search("foo")).await;
    assert_eq!(total, 2);
    assert_eq!(article_ids(&tied), vec![2, 1]);
    assert_eq!(tied[0].created_at, tied[1].created_at);
    assert!(tied[0].rank.unwrap() > tied[1].rank.unwrap());
}
