//! The capability interface every remote service implements.
//!
//! A source knows how to resolve a handle, list items page by page, fetch one
//! item's detail and map that detail onto a [`NewRecord`]. The sync engine
//! drives the loop; sources never touch the store.

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::error::Result;
use crate::model::{NewRecord, Service};

/// A handle resolved to the service's stable identity.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OwnerKey {
    pub handle: String,
    pub key: String,
}

/// Which listing endpoint to page through.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Listing {
    /// Everything an owner published.
    Owner(OwnerKey),
    /// Items an owner published since a point in time.
    OwnerSince(OwnerKey, DateTime<Utc>),
    /// Items an owner marked as favorite.
    Favorites(OwnerKey),
    /// Members of a collection (photo set, list).
    Collection(String),
}

/// Position inside a listing. Counted listings use `number`, token listings
/// use `token`; both are carried so the engine can drive either.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageCursor {
    pub number: u32,
    pub token: Option<String>,
}

impl PageCursor {
    pub fn first() -> Self {
        Self {
            number: 1,
            token: None,
        }
    }

    pub fn next(&self, token: Option<String>) -> Self {
        Self {
            number: self.number + 1,
            token,
        }
    }
}

/// One page of a listing.
#[derive(Debug, Clone, PartialEq)]
pub struct Page<T> {
    pub items: Vec<T>,
    /// Total item count as reported by the remote, when it reports one.
    pub total: Option<u64>,
    /// Continuation token for token-paginated listings.
    pub next_token: Option<String>,
}

/// Metadata of a remote collection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CollectionInfo {
    pub id: String,
    /// Handle of the collection's owner.
    pub owner: String,
    pub title: String,
    pub description: String,
}

/// Number of pages needed for `total` items, rounded up.
pub fn page_count(total: u64, per_page: u32) -> u32 {
    if per_page == 0 {
        return 0;
    }
    total.div_ceil(u64::from(per_page)).min(u64::from(u32::MAX)) as u32
}

#[async_trait]
pub trait Source: Send + Sync {
    /// What a listing yields per item.
    type Summary: Send + Sync;
    /// Full payload of one item, input to [`Source::map`].
    type Detail: Send + Sync;

    fn service(&self) -> Service;

    /// Largest page the remote accepts.
    fn max_page_size(&self) -> u32;

    fn summary_id<'a>(&self, summary: &'a Self::Summary) -> &'a str;

    async fn resolve_owner(&self, handle: &str) -> Result<OwnerKey>;

    async fn list_page(
        &self,
        listing: &Listing,
        cursor: &PageCursor,
        per_page: u32,
    ) -> Result<Page<Self::Summary>>;

    async fn fetch_detail(&self, summary: &Self::Summary) -> Result<Self::Detail>;

    async fn fetch_detail_by_id(&self, remote_id: &str) -> Result<Self::Detail>;

    /// Pure and total: missing fields become documented defaults.
    fn map(&self, detail: &Self::Detail) -> NewRecord;

    async fn collection(&self, collection_id: &str) -> Result<CollectionInfo>;

    async fn list_collections(&self, owner: &OwnerKey) -> Result<Vec<String>>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn page_count_rounds_up() {
        assert_eq!(page_count(0, 500), 0);
        assert_eq!(page_count(1, 500), 1);
        assert_eq!(page_count(500, 500), 1);
        assert_eq!(page_count(537, 500), 2);
        assert_eq!(page_count(1001, 500), 3);
        assert_eq!(page_count(10, 0), 0);
    }

    #[test]
    fn cursor_advances() {
        let c = PageCursor::first();
        let n = c.next(Some("abc".into()));
        assert_eq!(n.number, 2);
        assert_eq!(n.token.as_deref(), Some("abc"));
    }
}
