//! The sync loop shared by every service.
//!
//! Each operation resolves its subject, pages through a listing in order and,
//! per item, fetches the detail, maps it and reconciles it with the store by
//! `(service, remote_id)`. Work is strictly sequential: one request in flight.

use chrono::Utc;
use tracing::{debug, info, instrument, warn};

use crate::db::{self, LocalRecord, Pool, Relation};
use crate::error::{Result, SyncError};
use crate::model::{NewRecord, RelationDefaults, RelationKey, SyncReport, UpsertOutcome};
use crate::retry::{with_retry, RetryPolicy};
use crate::source::{page_count, Listing, OwnerKey, Page, PageCursor, Source};

/// Drives one [`Source`] against the local store.
///
/// The store enforces only key uniqueness, so callers must serialise syncs
/// of the same identity. Listings are not snapshots: items uploaded while a
/// time-windowed listing is paged can shift later pages, and the engine does
/// not correct for that drift.
pub struct SyncEngine<S> {
    pool: Pool,
    source: S,
    page_size: u32,
    retry: RetryPolicy,
}

/// Result of storing one mapped item.
struct Stored {
    id: i64,
    outcome: UpsertOutcome,
    linked: u32,
}

fn require(value: &str, what: &str) -> Result<()> {
    if value.trim().is_empty() {
        return Err(SyncError::InvalidInput(format!("{what} must not be empty")));
    }
    Ok(())
}

impl<S: Source> SyncEngine<S> {
    pub fn new(pool: Pool, source: S) -> Self {
        let page_size = source.max_page_size();
        Self {
            pool,
            source,
            page_size,
            retry: RetryPolicy::default(),
        }
    }

    /// Requested page size; capped by what the source accepts.
    pub fn with_page_size(mut self, page_size: u32) -> Self {
        self.page_size = page_size;
        self
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn source(&self) -> &S {
        &self.source
    }

    fn per_page(&self) -> u32 {
        self.page_size.clamp(1, self.source.max_page_size().max(1))
    }

    /// Fetch one item by remote id and store it.
    ///
    /// Without `refresh` an item already stored is returned untouched and no
    /// remote call is made. With `refresh` the item is fetched and mapped
    /// first, then the stored row is replaced; the replacement gets a new
    /// local id and loses its membership edges apart from its tags.
    #[instrument(skip(self), fields(service = %self.source.service()))]
    pub async fn sync_one(&self, remote_id: &str, refresh: bool) -> Result<(LocalRecord, UpsertOutcome)> {
        require(remote_id, "remote id")?;
        let service = self.source.service();
        if !refresh {
            if let Some(existing) = db::find_record(&self.pool, service, remote_id).await? {
                debug!(remote_id, "already synced");
                return Ok((existing, UpsertOutcome::Unchanged));
            }
        }

        let detail = with_retry(&self.retry, "fetch_detail", || {
            self.source.fetch_detail_by_id(remote_id)
        })
        .await?;
        let stored = self.store(self.source.map(&detail), refresh).await?;
        let record = db::find_record_by_id(&self.pool, stored.id)
            .await?
            .ok_or_else(|| SyncError::not_found(format!("{service} {remote_id} vanished after store")))?;
        info!(remote_id, outcome = ?stored.outcome, "synced item");
        Ok((record, stored.outcome))
    }

    #[instrument(skip(self), fields(service = %self.source.service()))]
    pub async fn sync_all_for_owner(&self, handle: &str) -> Result<SyncReport> {
        let owner = self.resolve(handle).await?;
        let report = self.sync_listing(&Listing::Owner(owner), None).await?;
        info!(handle, ?report, "owner sync finished");
        Ok(report)
    }

    /// Items the owner published in the last `since_days` days.
    #[instrument(skip(self), fields(service = %self.source.service()))]
    pub async fn sync_recent_for_owner(&self, handle: &str, since_days: u32) -> Result<SyncReport> {
        if since_days == 0 {
            return Err(SyncError::InvalidInput("since_days must be at least 1".into()));
        }
        let owner = self.resolve(handle).await?;
        let since = Utc::now() - chrono::Duration::days(i64::from(since_days));
        let report = self
            .sync_listing(&Listing::OwnerSince(owner, since), None)
            .await?;
        info!(handle, since_days, ?report, "recent sync finished");
        Ok(report)
    }

    #[instrument(skip(self), fields(service = %self.source.service()))]
    pub async fn sync_favorites(&self, handle: &str) -> Result<SyncReport> {
        let owner = self.resolve(handle).await?;
        let key = RelationKey::favorites(self.source.service(), &owner.handle);
        let defaults = RelationDefaults {
            title: format!("{} favorites", owner.handle),
            description: String::new(),
        };
        let relation = db::get_or_create_relation(&self.pool, &key, &defaults).await?;
        let report = self
            .sync_listing(&Listing::Favorites(owner), Some(&relation))
            .await?;
        db::touch_relation(&self.pool, relation.id).await?;
        info!(handle, relation_id = relation.id, ?report, "favorites sync finished");
        Ok(report)
    }

    #[instrument(skip(self), fields(service = %self.source.service()))]
    pub async fn sync_collection(&self, collection_id: &str) -> Result<SyncReport> {
        require(collection_id, "collection id")?;
        let info = with_retry(&self.retry, "collection", || {
            self.source.collection(collection_id)
        })
        .await?;
        let key = RelationKey::collection(self.source.service(), &info.owner, &info.id);
        let defaults = RelationDefaults {
            title: info.title.clone(),
            description: info.description.clone(),
        };
        let relation = db::get_or_create_relation(&self.pool, &key, &defaults).await?;
        let report = self
            .sync_listing(&Listing::Collection(info.id.clone()), Some(&relation))
            .await?;
        db::touch_relation(&self.pool, relation.id).await?;
        info!(collection_id, relation_id = relation.id, ?report, "collection sync finished");
        Ok(report)
    }

    /// Every collection the owner has, one after another.
    #[instrument(skip(self), fields(service = %self.source.service()))]
    pub async fn sync_all_collections_for_owner(&self, handle: &str) -> Result<SyncReport> {
        let owner = self.resolve(handle).await?;
        let ids = with_retry(&self.retry, "list_collections", || {
            self.source.list_collections(&owner)
        })
        .await?;
        info!(handle, collections = ids.len(), "syncing collections");
        let mut report = SyncReport::default();
        for id in &ids {
            report += self.sync_collection(id).await?;
        }
        info!(handle, ?report, "all collections synced");
        Ok(report)
    }

    async fn resolve(&self, handle: &str) -> Result<OwnerKey> {
        require(handle, "handle")?;
        let owner = with_retry(&self.retry, "resolve_owner", || {
            self.source.resolve_owner(handle)
        })
        .await?;
        debug!(handle, key = %owner.key, "resolved owner");
        Ok(owner)
    }

    /// Page through `listing`, storing every item and linking it into
    /// `relation` when given.
    ///
    /// Counted listings stop once the page number reaches the page count
    /// derived from the latest reported total; token listings stop when the
    /// token runs out. Either kind stops at the first empty page.
    async fn sync_listing(&self, listing: &Listing, relation: Option<&Relation>) -> Result<SyncReport> {
        let per_page = self.per_page();
        let mut report = SyncReport::default();
        let mut cursor = PageCursor::first();
        loop {
            let Page {
                items,
                total,
                next_token,
            } = with_retry(&self.retry, "list_page", || {
                self.source.list_page(listing, &cursor, per_page)
            })
            .await?;
            report.pages += 1;
            debug!(page = cursor.number, items = items.len(), ?total, "fetched page");
            if items.is_empty() {
                break;
            }

            for summary in &items {
                report.items_seen += 1;
                self.sync_item(summary, relation, &mut report).await?;
            }

            cursor = match (next_token, total) {
                (Some(token), _) => cursor.next(Some(token)),
                (None, Some(total)) if cursor.number < page_count(total, per_page) => cursor.next(None),
                _ => break,
            };
        }
        Ok(report)
    }

    async fn sync_item(
        &self,
        summary: &S::Summary,
        relation: Option<&Relation>,
        report: &mut SyncReport,
    ) -> Result<()> {
        let remote_id = self.source.summary_id(summary);
        let record_id = match db::find_record(&self.pool, self.source.service(), remote_id).await? {
            Some(existing) => {
                report.record(UpsertOutcome::Unchanged);
                existing.id
            }
            None => {
                let fetched = with_retry(&self.retry, "fetch_detail", || {
                    self.source.fetch_detail(summary)
                })
                .await;
                let detail = match fetched {
                    Ok(detail) => detail,
                    Err(err) if err.is_not_found() => {
                        warn!(remote_id, error = %err, "item disappeared; skipping");
                        report.skipped += 1;
                        return Ok(());
                    }
                    Err(err) => return Err(err),
                };
                let stored = self.store(self.source.map(&detail), false).await?;
                report.record(stored.outcome);
                report.linked += stored.linked;
                stored.id
            }
        };
        debug!(remote_id, record_id, "item stored");

        if let Some(relation) = relation {
            if db::link(&self.pool, relation.id, record_id).await? {
                report.linked += 1;
            }
        }
        Ok(())
    }

    /// Write a mapped item and link its tags. A key conflict on plain insert
    /// means the item is already stored, which counts as `Unchanged`.
    async fn store(&self, record: NewRecord, refresh: bool) -> Result<Stored> {
        let (id, outcome) = if refresh {
            db::replace_record(&self.pool, &record).await?
        } else {
            match db::insert_record(&self.pool, &record).await? {
                Some(id) => (id, UpsertOutcome::Created),
                None => {
                    let existing = db::find_record(&self.pool, record.service, &record.remote_id)
                        .await?
                        .ok_or_else(|| {
                            SyncError::not_found(format!(
                                "{} {} vanished after conflict",
                                record.service, record.remote_id
                            ))
                        })?;
                    (existing.id, UpsertOutcome::Unchanged)
                }
            }
        };

        let mut linked = 0;
        if outcome != UpsertOutcome::Unchanged {
            for tag in &record.tags {
                let key = RelationKey::tag(record.service, tag);
                let relation = db::get_or_create_relation(
                    &self.pool,
                    &key,
                    &RelationDefaults {
                        title: tag.clone(),
                        description: String::new(),
                    },
                )
                .await?;
                if db::link(&self.pool, relation.id, id).await? {
                    linked += 1;
                }
            }
        }
        Ok(Stored { id, outcome, linked })
    }
}
