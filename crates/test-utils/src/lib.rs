//! Agora test utilities.
//!
//! Helpers for listing tests: builders for the JSON rows a page statement
//! returns, and assertion utilities for generated SQL.

use serde_json::{Value, json};

/// Create a test article with one author and no associations.
pub fn test_article(id: i64, title: &str) -> TestArticle {
    TestArticle {
        id,
        title: title.to_string(),
        summary: None,
        created_at: "2024-01-01T00:00:00+00:00".to_string(),
        author: (1, "author".to_string()),
        hubs: Vec::new(),
        tags: Vec::new(),
        answers: 0,
        votes: 0,
        rank: None,
        repeat: 1,
    }
}

/// An article fixture that renders to page statement rows.
#[derive(Debug, Clone)]
pub struct TestArticle {
    pub id: i64,
    pub title: String,
    pub summary: Option<String>,
    pub created_at: String,
    pub author: (i64, String),
    pub hubs: Vec<(i64, String)>,
    pub tags: Vec<(i64, String)>,
    pub answers: i64,
    pub votes: i64,
    pub rank: Option<f32>,
    repeat: usize,
}

impl TestArticle {
    /// Set the creation timestamp (RFC 3339).
    pub fn created_at(mut self, created_at: &str) -> Self {
        self.created_at = created_at.to_string();
        self
    }

    /// Set the abstract.
    pub fn with_summary(mut self, summary: &str) -> Self {
        self.summary = Some(summary.to_string());
        self
    }

    /// Set the author.
    pub fn with_author(mut self, id: i64, login: &str) -> Self {
        self.author = (id, login.to_string());
        self
    }

    /// Add a hub named `hub-<id>`.
    pub fn with_hub(mut self, id: i64) -> Self {
        self.hubs.push((id, format!("hub-{id}")));
        self
    }

    /// Add a tag named `tag-<id>`.
    pub fn with_tag(mut self, id: i64) -> Self {
        self.tags.push((id, format!("tag-{id}")));
        self
    }

    /// Set the aggregate values.
    pub fn with_counts(mut self, answers: i64, votes: i64) -> Self {
        self.answers = answers;
        self.votes = votes;
        self
    }

    /// Set the search rank.
    pub fn with_rank(mut self, rank: f32) -> Self {
        self.rank = Some(rank);
        self
    }

    /// Emit every (hub, tag) row `times` times, as an extra join would.
    pub fn repeated(mut self, times: usize) -> Self {
        self.repeat = times.max(1);
        self
    }

    /// Rows of the page statement: one per (hub, tag) pair.
    ///
    /// Missing associations produce a single row with null ids.
    pub fn rows(&self) -> Vec<Value> {
        let none = vec![None];
        let hubs: Vec<Option<&(i64, String)>> = if self.hubs.is_empty() {
            none.clone()
        } else {
            self.hubs.iter().map(Some).collect()
        };
        let tags: Vec<Option<&(i64, String)>> = if self.tags.is_empty() {
            none
        } else {
            self.tags.iter().map(Some).collect()
        };

        let mut rows = Vec::new();
        for hub in &hubs {
            for tag in &tags {
                let mut row = json!({
                    "id": self.id,
                    "title": self.title,
                    "abstract": self.summary,
                    "createdAt": self.created_at,
                    "author.id": self.author.0,
                    "author.login": self.author.1,
                    "hubs.id": hub.map(|h| h.0),
                    "hubs.name": hub.map(|h| h.1.clone()),
                    "tags.id": tag.map(|t| t.0),
                    "tags.name": tag.map(|t| t.1.clone()),
                    "answers": self.answers,
                    "votes": self.votes,
                });
                if let (Some(rank), Some(obj)) = (self.rank, row.as_object_mut()) {
                    obj.insert("rank".to_string(), json!(rank));
                }
                for _ in 0..self.repeat {
                    rows.push(row.clone());
                }
            }
        }
        rows
    }
}

/// Rows for several articles in page order.
pub fn article_rows(articles: &[TestArticle]) -> Vec<Value> {
    articles.iter().flat_map(TestArticle::rows).collect()
}

/// Create a test tag with no articles.
pub fn test_tag(id: i64, name: &str) -> TestTag {
    TestTag {
        id,
        name: name.to_string(),
        created_at: "2024-01-01T00:00:00+00:00".to_string(),
        articles: 0,
        rank: None,
    }
}

/// A tag fixture that renders to a page statement row.
#[derive(Debug, Clone)]
pub struct TestTag {
    pub id: i64,
    pub name: String,
    pub created_at: String,
    pub articles: i64,
    pub rank: Option<f32>,
}

impl TestTag {
    /// Set the number of labelled articles.
    pub fn with_articles(mut self, articles: i64) -> Self {
        self.articles = articles;
        self
    }

    /// Set the creation timestamp (RFC 3339).
    pub fn created_at(mut self, created_at: &str) -> Self {
        self.created_at = created_at.to_string();
        self
    }

    pub fn row(&self) -> Value {
        json!({
            "id": self.id,
            "name": self.name,
            "createdAt": self.created_at,
            "articles": self.articles,
            "rank": self.rank,
        })
    }
}

/// Assertion helpers for generated SQL.
pub mod assert {
    /// Assert that a string contains a substring.
    pub fn contains(haystack: &str, needle: &str) {
        assert!(
            haystack.contains(needle),
            "Expected string to contain '{needle}'\nActual: {haystack}"
        );
    }

    /// Assert that a string does not contain a substring.
    pub fn not_contains(haystack: &str, needle: &str) {
        assert!(
            !haystack.contains(needle),
            "Expected string to NOT contain '{needle}'\nActual: {haystack}"
        );
    }

    /// Assert that `first` occurs before `second`.
    pub fn appears_before(haystack: &str, first: &str, second: &str) {
        match (haystack.find(first), haystack.find(second)) {
            (Some(a), Some(b)) => assert!(
                a < b,
                "Expected '{first}' before '{second}'\nActual: {haystack}"
            ),
            _ => panic!("Expected both '{first}' and '{second}'\nActual: {haystack}"),
        }
    }
}
