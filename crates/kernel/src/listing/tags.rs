//! Tag listings.
//!
//! Tags carry one aggregate, the number of distinct articles they label.
//! Articles are left-joined so unused tags are listed with a zero count, and
//! article-level filters sit in the join's ON clause so they narrow the count
//! without dropping the tag.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::denormalize::FanOutRow;
use super::paginated::ListingQuery;
use super::schema::{
    Aggregate, ColumnDef, ColumnSource, EntitySchema, FilterKind, JoinEdge, JoinKind,
};
use crate::error::ListingResult;

pub static TAGS: EntitySchema = EntitySchema {
    entity: "tags",
    table: "tags",
    primary_key: "tags.id",
    joins: &[
        JoinEdge {
            table: "article_tags",
            alias: "article_tags",
            kind: JoinKind::Left,
            on: "article_tags.tag_id = tags.id",
        },
        JoinEdge {
            table: "articles",
            alias: "articles",
            kind: JoinKind::Left,
            on: "articles.id = article_tags.article_id",
        },
    ],
    columns: &[
        ColumnDef {
            field: "id",
            source: ColumnSource::Row("tags.id"),
            filter: Some(FilterKind::Id),
            sortable: false,
            projected: true,
        },
        ColumnDef {
            field: "ids",
            source: ColumnSource::Row("tags.id"),
            filter: Some(FilterKind::Ids),
            sortable: false,
            projected: false,
        },
        ColumnDef {
            field: "name",
            source: ColumnSource::Row("tags.name"),
            filter: Some(FilterKind::Text),
            sortable: true,
            projected: true,
        },
        ColumnDef {
            field: "createdAt",
            source: ColumnSource::Row("tags.created_at"),
            filter: Some(FilterKind::Date),
            sortable: true,
            projected: true,
        },
        ColumnDef {
            field: "articleCreatedAt",
            source: ColumnSource::Join {
                join: "articles",
                expr: "articles.created_at",
            },
            filter: Some(FilterKind::Date),
            sortable: false,
            projected: false,
        },
        ColumnDef {
            field: "articles",
            source: ColumnSource::Aggregate(Aggregate::CountDistinct("articles.id")),
            filter: Some(FilterKind::Numeric),
            sortable: true,
            projected: true,
        },
    ],
    group_by: &["tags.id"],
    search_vector: "tags.search_vector",
    default_sort: "articles",
    nested_joins: &[],
    nested_columns: &[],
    nested_order: &[],
};

/// Tag listing.
#[derive(Debug, Clone, Copy, Default)]
pub struct Tags;

impl ListingQuery for Tags {
    type Row = TagRow;
    type Entity = Tag;

    fn schema() -> &'static EntitySchema {
        &TAGS
    }
}

/// One row of the tag page statement.
#[derive(Debug, Clone, Deserialize)]
pub struct TagRow {
    pub id: i64,
    pub name: String,
    #[serde(rename = "createdAt")]
    pub created_at: DateTime<Utc>,
    pub articles: i64,
    pub rank: Option<f32>,
}

/// Denormalized tag.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Tag {
    pub id: i64,
    pub name: String,
    pub created_at: DateTime<Utc>,
    pub articles: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rank: Option<f32>,
}

impl FanOutRow for TagRow {
    type Entity = Tag;
    const ENTITY: &'static str = "tag";

    fn root_id(&self) -> i64 {
        self.id
    }

    fn into_entity(self) -> ListingResult<Tag> {
        Ok(Tag {
            id: self.id,
            name: self.name,
            created_at: self.created_at,
            articles: self.articles,
            rank: self.rank,
        })
    }

    // Tags have no nested collections; a repeated id adds nothing.
    fn merge_into(self, _tag: &mut Tag) -> ListingResult<()> {
        Ok(())
    }
}

#[cfg(test)]
// Tests are allowed to use unwrap/expect freely.
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::listing::denormalize::{decode_rows, denormalize};
    use crate::listing::schema::Stage;
    use serde_json::json;

    #[test]
    fn unused_tag_keeps_zero_count() {
        let rows: Vec<TagRow> = decode_rows(vec![json!({
            "id": 4,
            "name": "orphan",
            "createdAt": "2024-01-01T00:00:00+00:00",
            "articles": 0
        })])
        .unwrap();
        let tags = denormalize(rows).unwrap();
        assert_eq!(tags.len(), 1);
        assert_eq!(tags[0].articles, 0);
        assert_eq!(tags[0].rank, None);
    }

    #[test]
    fn article_date_filter_goes_to_join() {
        assert_eq!(
            TAGS.column("articleCreatedAt").unwrap().stage(),
            Stage::Join("articles")
        );
        assert_eq!(TAGS.column("articles").unwrap().stage(), Stage::Having);
        assert!(TAGS.nested_joins.is_empty());
    }
}
