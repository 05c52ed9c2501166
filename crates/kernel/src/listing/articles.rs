//! Article listings.
//!
//! Articles join their author, hubs and tags (all required) and carry two
//! aggregates: the number of answers and the sum of votes. Answers are
//! counted distinctly over a left join; votes are summed once per article in
//! a derived table so the hub x tag fan-out cannot multiply them.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::denormalize::{FanOutRow, NamedRef, push_unique};
use super::paginated::ListingQuery;
use super::schema::{
    Aggregate, ColumnDef, ColumnSource, EntitySchema, FilterKind, JoinEdge, JoinKind,
};
use crate::error::{ListingError, ListingResult};

pub static ARTICLES: EntitySchema = EntitySchema {
    entity: "articles",
    table: "articles",
    primary_key: "articles.id",
    joins: &[
        JoinEdge {
            table: "users",
            alias: "author",
            kind: JoinKind::Inner,
            on: "author.id = articles.author_id",
        },
        JoinEdge {
            table: "article_hubs",
            alias: "article_hubs",
            kind: JoinKind::Inner,
            on: "article_hubs.article_id = articles.id",
        },
        JoinEdge {
            table: "hubs",
            alias: "hubs",
            kind: JoinKind::Inner,
            on: "hubs.id = article_hubs.hub_id",
        },
        JoinEdge {
            table: "article_tags",
            alias: "article_tags",
            kind: JoinKind::Inner,
            on: "article_tags.article_id = articles.id",
        },
        JoinEdge {
            table: "tags",
            alias: "tags",
            kind: JoinKind::Inner,
            on: "tags.id = article_tags.tag_id",
        },
        JoinEdge {
            table: "answers",
            alias: "answers",
            kind: JoinKind::Left,
            on: "answers.article_id = articles.id",
        },
    ],
    columns: &[
        ColumnDef {
            field: "id",
            source: ColumnSource::Row("articles.id"),
            filter: Some(FilterKind::Id),
            sortable: false,
            projected: true,
        },
        ColumnDef {
            field: "title",
            source: ColumnSource::Row("articles.title"),
            filter: Some(FilterKind::Text),
            sortable: true,
            projected: true,
        },
        ColumnDef {
            field: "abstract",
            source: ColumnSource::Row("articles.abstract"),
            filter: None,
            sortable: false,
            projected: true,
        },
        ColumnDef {
            field: "createdAt",
            source: ColumnSource::Row("articles.created_at"),
            filter: Some(FilterKind::Date),
            sortable: true,
            projected: true,
        },
        ColumnDef {
            field: "author",
            source: ColumnSource::Row("articles.author_id"),
            filter: Some(FilterKind::Id),
            sortable: false,
            projected: false,
        },
        ColumnDef {
            field: "author.id",
            source: ColumnSource::Row("author.id"),
            filter: None,
            sortable: false,
            projected: true,
        },
        ColumnDef {
            field: "author.login",
            source: ColumnSource::Row("author.login"),
            filter: None,
            sortable: false,
            projected: true,
        },
        ColumnDef {
            field: "hubs",
            source: ColumnSource::Row("hubs.id"),
            filter: Some(FilterKind::Ids),
            sortable: false,
            projected: false,
        },
        ColumnDef {
            field: "tags",
            source: ColumnSource::Row("tags.id"),
            filter: Some(FilterKind::Ids),
            sortable: false,
            projected: false,
        },
        ColumnDef {
            field: "answers",
            source: ColumnSource::Aggregate(Aggregate::CountDistinct("answers.id")),
            filter: Some(FilterKind::Numeric),
            sortable: true,
            projected: true,
        },
        ColumnDef {
            field: "votes",
            source: ColumnSource::Aggregate(Aggregate::Rollup {
                alias: "vote_totals",
                table: "votes",
                foreign_key: "article_id",
                value: "SUM(value)",
            }),
            filter: Some(FilterKind::Numeric),
            sortable: true,
            projected: true,
        },
    ],
    group_by: &["articles.id", "author.id"],
    search_vector: "articles.search_vector",
    default_sort: "createdAt",
    nested_joins: &[
        JoinEdge {
            table: "article_hubs",
            alias: "article_hubs",
            kind: JoinKind::Inner,
            on: "article_hubs.article_id = page.\"id\"",
        },
        JoinEdge {
            table: "hubs",
            alias: "hubs",
            kind: JoinKind::Inner,
            on: "hubs.id = article_hubs.hub_id",
        },
        JoinEdge {
            table: "article_tags",
            alias: "article_tags",
            kind: JoinKind::Inner,
            on: "article_tags.article_id = page.\"id\"",
        },
        JoinEdge {
            table: "tags",
            alias: "tags",
            kind: JoinKind::Inner,
            on: "tags.id = article_tags.tag_id",
        },
    ],
    nested_columns: &[
        ("hubs.id", "hubs.id"),
        ("hubs.name", "hubs.name"),
        ("tags.id", "tags.id"),
        ("tags.name", "tags.name"),
    ],
    nested_order: &["hubs.id", "tags.id"],
};

/// Article listing.
#[derive(Debug, Clone, Copy, Default)]
pub struct Articles;

impl ListingQuery for Articles {
    type Row = ArticleRow;
    type Entity = Article;

    fn schema() -> &'static EntitySchema {
        &ARTICLES
    }
}

/// One fan-out row of the article page statement.
#[derive(Debug, Clone, Deserialize)]
pub struct ArticleRow {
    pub id: i64,
    pub title: String,
    #[serde(rename = "abstract")]
    pub summary: Option<String>,
    #[serde(rename = "createdAt")]
    pub created_at: DateTime<Utc>,
    #[serde(rename = "author.id")]
    pub author_id: Option<i64>,
    #[serde(rename = "author.login")]
    pub author_login: Option<String>,
    #[serde(rename = "hubs.id")]
    pub hub_id: Option<i64>,
    #[serde(rename = "hubs.name")]
    pub hub_name: Option<String>,
    #[serde(rename = "tags.id")]
    pub tag_id: Option<i64>,
    #[serde(rename = "tags.name")]
    pub tag_name: Option<String>,
    pub answers: i64,
    pub votes: i64,
    pub rank: Option<f32>,
}

/// Article author.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Author {
    pub id: i64,
    pub login: String,
}

/// Denormalized article.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Article {
    pub id: i64,
    pub title: String,
    #[serde(rename = "abstract")]
    pub summary: Option<String>,
    pub created_at: DateTime<Utc>,
    pub author: Author,
    pub hubs: Vec<NamedRef>,
    pub tags: Vec<NamedRef>,
    pub answers: i64,
    pub votes: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rank: Option<f32>,
}

impl FanOutRow for ArticleRow {
    type Entity = Article;
    const ENTITY: &'static str = "article";

    fn root_id(&self) -> i64 {
        self.id
    }

    fn into_entity(mut self) -> ListingResult<Article> {
        let author = match (self.author_id, self.author_login.take()) {
            (Some(id), Some(login)) => Author { id, login },
            _ => {
                return Err(ListingError::inconsistent(
                    Self::ENTITY,
                    format!("article {} has no author", self.id),
                ));
            }
        };

        let mut article = Article {
            id: self.id,
            title: std::mem::take(&mut self.title),
            summary: self.summary.take(),
            created_at: self.created_at,
            author,
            hubs: Vec::new(),
            tags: Vec::new(),
            answers: self.answers,
            votes: self.votes,
            rank: self.rank,
        };
        self.merge_into(&mut article)?;
        Ok(article)
    }

    fn merge_into(self, article: &mut Article) -> ListingResult<()> {
        push_unique(
            &mut article.hubs,
            Self::ENTITY,
            "hub",
            self.hub_id,
            self.hub_name,
        )?;
        push_unique(
            &mut article.tags,
            Self::ENTITY,
            "tag",
            self.tag_id,
            self.tag_name,
        )
    }
}

#[cfg(test)]
// Tests are allowed to use unwrap/expect freely.
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::listing::denormalize::{decode_rows, denormalize};
    use serde_json::json;

    fn raw(id: i64, hub: i64, tag: i64) -> serde_json::Value {
        json!({
            "id": id,
            "title": format!("Article {id}"),
            "abstract": null,
            "createdAt": "2024-05-01T10:00:00+00:00",
            "author.id": 1,
            "author.login": "alice",
            "hubs.id": hub,
            "hubs.name": format!("hub-{hub}"),
            "tags.id": tag,
            "tags.name": format!("tag-{tag}"),
            "answers": 2,
            "votes": 7
        })
    }

    #[test]
    fn hub_by_tag_fan_out_is_deduplicated() {
        let rows = vec![raw(1, 3, 10), raw(1, 3, 11), raw(1, 5, 10), raw(1, 5, 11)];
        let rows: Vec<ArticleRow> = decode_rows(rows).unwrap();
        let articles = denormalize(rows).unwrap();

        assert_eq!(articles.len(), 1);
        let article = &articles[0];
        let hubs: Vec<i64> = article.hubs.iter().map(|h| h.id).collect();
        let tags: Vec<i64> = article.tags.iter().map(|t| t.id).collect();
        assert_eq!(hubs, vec![3, 5]);
        assert_eq!(tags, vec![10, 11]);
        assert_eq!(article.answers, 2);
        assert_eq!(article.votes, 7);
        assert_eq!(article.author.login, "alice");
    }

    #[test]
    fn missing_author_is_inconsistent() {
        let mut value = raw(1, 3, 10);
        value["author.id"] = json!(null);
        let rows: Vec<ArticleRow> = decode_rows(vec![value]).unwrap();
        let err = denormalize(rows).unwrap_err();
        assert!(matches!(
            err,
            ListingError::DenormalizationInconsistency { entity: "article", .. }
        ));
    }

    #[test]
    fn serializes_with_public_field_names() {
        let rows: Vec<ArticleRow> = decode_rows(vec![raw(4, 3, 10)]).unwrap();
        let article = denormalize(rows).unwrap().remove(0);
        let json = serde_json::to_value(&article).unwrap();
        assert_eq!(json["createdAt"], json!("2024-05-01T10:00:00Z"));
        assert!(json.get("abstract").is_some());
        assert!(json.get("rank").is_none());
        assert_eq!(json["hubs"], json!([{"id": 3, "name": "hub-3"}]));
    }

    #[test]
    fn schema_places_aggregates_in_having() {
        use crate::listing::schema::Stage;
        assert_eq!(ARTICLES.column("votes").unwrap().stage(), Stage::Having);
        assert_eq!(ARTICLES.column("answers").unwrap().stage(), Stage::Having);
        assert_eq!(ARTICLES.column("hubs").unwrap().stage(), Stage::Where);
        assert_eq!(ARTICLES.rollups().count(), 1);
    }
}
