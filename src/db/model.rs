//! Rows returned by repositories.
//!
//! Keep these structs focused on the data returned by queries. Sync logic
//! lives in the engine.

use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::Value;

use crate::model::{RelationKind, Service};

/// A synced item as stored locally.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LocalRecord {
    pub id: i64,
    pub service: Service,
    pub remote_id: String,
    pub owner: String,
    pub owner_key: String,
    pub title: String,
    pub body: String,
    pub url: String,
    pub occurred_at: Option<DateTime<Utc>>,
    pub tag_list: String,
    pub attributes: Value,
    pub synced_at: DateTime<Utc>,
}

impl LocalRecord {
    /// A string attribute, or `""` when absent.
    pub fn attribute(&self, name: &str) -> &str {
        self.attributes
            .get(name)
            .and_then(Value::as_str)
            .unwrap_or_default()
    }
}

/// A favorites list, collection or tag.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Relation {
    pub id: i64,
    pub service: Service,
    pub kind: RelationKind,
    pub owner: String,
    pub name: String,
    pub title: String,
    pub description: String,
    pub created_at: DateTime<Utc>,
    pub synced_at: DateTime<Utc>,
}
