//! Result denormalizer.
//!
//! The page statement returns one row per (root, nested association) pair.
//! `denormalize` folds those rows back into one entity per root id, keeping
//! the first-seen order of root ids and deduplicating nested collections.

use std::collections::HashMap;

use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::error::{ListingError, ListingResult};

/// A flattened row that belongs to one root entity.
pub trait FanOutRow: Sized {
    type Entity;

    /// Entity name for error reporting.
    const ENTITY: &'static str;

    fn root_id(&self) -> i64;

    /// Build the entity from the first row seen for its root id.
    fn into_entity(self) -> ListingResult<Self::Entity>;

    /// Fold a later row for the same root id into the entity.
    ///
    /// Aggregates are already final per root id, so only nested collections
    /// change here.
    fn merge_into(self, entity: &mut Self::Entity) -> ListingResult<()>;
}

/// Fold fan-out rows into entities in first-seen order.
pub fn denormalize<R: FanOutRow>(rows: Vec<R>) -> ListingResult<Vec<R::Entity>> {
    let mut index: HashMap<i64, usize> = HashMap::new();
    let mut entities: Vec<R::Entity> = Vec::new();

    for row in rows {
        let id = row.root_id();
        match index.get(&id).and_then(|&pos| entities.get_mut(pos)) {
            Some(entity) => row.merge_into(entity)?,
            None => {
                index.insert(id, entities.len());
                entities.push(row.into_entity()?);
            }
        }
    }

    Ok(entities)
}

/// Decode raw JSON rows into typed fan-out rows.
pub fn decode_rows<R: FanOutRow + DeserializeOwned>(raw: Vec<Value>) -> ListingResult<Vec<R>> {
    raw.into_iter()
        .map(|value| {
            serde_json::from_value(value)
                .map_err(|e| ListingError::inconsistent(R::ENTITY, format!("undecodable row: {e}")))
        })
        .collect()
}

/// Member of a nested collection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NamedRef {
    pub id: i64,
    pub name: String,
}

/// Append `(id, name)` to a collection unless the id is already present.
///
/// A null id means the row carries no member for this association.
pub(crate) fn push_unique(
    collection: &mut Vec<NamedRef>,
    entity: &'static str,
    association: &str,
    id: Option<i64>,
    name: Option<String>,
) -> ListingResult<()> {
    let Some(id) = id else {
        return Ok(());
    };
    if collection.iter().any(|member| member.id == id) {
        return Ok(());
    }
    let name = name.ok_or_else(|| {
        ListingError::inconsistent(entity, format!("{association} {id} has no name"))
    })?;
    collection.push(NamedRef { id, name });
    Ok(())
}
