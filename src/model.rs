use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::ops::AddAssign;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum Service {
    Flickr,
    Twitter,
}

impl Service {
    pub fn as_str(&self) -> &'static str {
        match self {
            Service::Flickr => "flickr",
            Service::Twitter => "twitter",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "flickr" => Some(Service::Flickr),
            "twitter" => Some(Service::Twitter),
            _ => None,
        }
    }
}

impl fmt::Display for Service {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum RelationKind {
    Favorites,
    Collection,
    Tag,
}

impl RelationKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            RelationKind::Favorites => "favorites",
            RelationKind::Collection => "collection",
            RelationKind::Tag => "tag",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "favorites" => Some(RelationKind::Favorites),
            "collection" => Some(RelationKind::Collection),
            "tag" => Some(RelationKind::Tag),
            _ => None,
        }
    }
}

/// Insertable shape produced by a source's field mapping.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NewRecord {
    pub service: Service,
    pub remote_id: String,
    /// Human-readable owner handle.
    pub owner: String,
    /// Stable remote identity of the owner (NSID, user id).
    pub owner_key: String,
    pub title: String,
    pub body: String,
    pub url: String,
    pub occurred_at: Option<DateTime<Utc>>,
    pub tags: Vec<String>,
    /// Service-specific fields, serialised from a typed struct.
    pub attributes: Value,
}

impl NewRecord {
    /// Space separated, the way tag lists are stored.
    pub fn tag_list(&self) -> String {
        self.tags.join(" ")
    }
}

/// Natural key of a relation. See [`RelationKey::favorites`] and friends for
/// how each kind fills `owner` and `name`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct RelationKey {
    pub service: Service,
    pub kind: RelationKind,
    pub owner: String,
    pub name: String,
}

impl RelationKey {
    pub fn favorites(service: Service, owner: &str) -> Self {
        Self {
            service,
            kind: RelationKind::Favorites,
            owner: owner.to_string(),
            name: String::new(),
        }
    }

    pub fn collection(service: Service, owner: &str, collection_id: &str) -> Self {
        Self {
            service,
            kind: RelationKind::Collection,
            owner: owner.to_string(),
            name: collection_id.to_string(),
        }
    }

    /// Tags are shared by every owner of a service.
    pub fn tag(service: Service, tag: &str) -> Self {
        Self {
            service,
            kind: RelationKind::Tag,
            owner: String::new(),
            name: tag.to_string(),
        }
    }
}

/// Values written only when a relation is first created.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RelationDefaults {
    pub title: String,
    pub description: String,
}

/// What the upsert step did with one item.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum UpsertOutcome {
    Created,
    /// A row with the same key already existed and was left as is.
    Unchanged,
    /// The prior row was deleted and a fresh one inserted.
    Replaced,
}

/// Counters for one sync invocation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct SyncReport {
    pub pages: u32,
    pub items_seen: u32,
    pub created: u32,
    pub unchanged: u32,
    pub replaced: u32,
    pub skipped: u32,
    pub linked: u32,
}

impl SyncReport {
    pub fn record(&mut self, outcome: UpsertOutcome) {
        match outcome {
            UpsertOutcome::Created => self.created += 1,
            UpsertOutcome::Unchanged => self.unchanged += 1,
            UpsertOutcome::Replaced => self.replaced += 1,
        }
    }
}

impl AddAssign for SyncReport {
    fn add_assign(&mut self, other: Self) {
        self.pages += other.pages;
        self.items_seen += other.items_seen;
        self.created += other.created;
        self.unchanged += other.unchanged;
        self.replaced += other.replaced;
        self.skipped += other.skipped;
        self.linked += other.linked;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn enums_round_trip_through_text() {
        for s in [Service::Flickr, Service::Twitter] {
            assert_eq!(Service::parse(s.as_str()), Some(s));
        }
        for k in [RelationKind::Favorites, RelationKind::Collection, RelationKind::Tag] {
            assert_eq!(RelationKind::parse(k.as_str()), Some(k));
        }
        assert_eq!(Service::parse("delicious"), None);
    }

    #[test]
    fn report_accumulates() {
        let mut total = SyncReport::default();
        let mut one = SyncReport::default();
        one.pages = 2;
        one.record(UpsertOutcome::Created);
        one.record(UpsertOutcome::Unchanged);
        total += one;
        total += one;
        assert_eq!(total.pages, 4);
        assert_eq!(total.created, 2);
        assert_eq!(total.unchanged, 2);
        assert_eq!(total.replaced, 0);
    }

    #[test]
    fn relation_keys_fill_owner_and_name() {
        let fav = RelationKey::favorites(Service::Flickr, "alice");
        assert_eq!((fav.owner.as_str(), fav.name.as_str()), ("alice", ""));
        let tag = RelationKey::tag(Service::Flickr, "sunset");
        assert_eq!((tag.owner.as_str(), tag.name.as_str()), ("", "sunset"));
    }
}
