use super::model::{LocalRecord, Relation};
use crate::error::Result;
use crate::model::{NewRecord, RelationDefaults, RelationKey, RelationKind, Service, UpsertOutcome};
use chrono::{DateTime, Utc};
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, Transaction};
use sqlx::{Sqlite, SqlitePool};
use tracing::{debug, instrument};

pub type Pool = SqlitePool;

const RECORD_COLUMNS: &str = "id, service, remote_id, owner, owner_key, title, body, url, \
                              occurred_at, tag_list, attributes, synced_at";

const RELATION_COLUMNS: &str =
    "id, service, kind, owner, name, title, description, created_at, synced_at";

pub async fn init_pool(database_url: &str) -> Result<Pool> {
    let normalized = prepare_sqlite_url(database_url);
    let pool = SqlitePool::connect(&normalized).await?;
    // Enable WAL and stricter durability.
    sqlx::query("PRAGMA journal_mode=WAL;")
        .execute(&pool)
        .await?;
    sqlx::query("PRAGMA synchronous=FULL;")
        .execute(&pool)
        .await?;
    Ok(pool)
}

/// If using a file-backed SQLite URL, expand a leading `~/`, ensure the parent
/// directory exists and ask SQLite to create the file. Leaves in-memory URLs
/// untouched. Returns possibly-updated URL.
fn prepare_sqlite_url(url: &str) -> String {
    if !url.starts_with("sqlite:") {
        return url.to_string();
    }

    // sqlite::memory: or sqlite::memory:?cache=shared
    if url.starts_with("sqlite::memory") {
        return url.to_string();
    }

    let rest = &url["sqlite:".len()..];
    let path_with_query = rest.strip_prefix("//").unwrap_or(rest);

    let (path_part, query_part) = match path_with_query.split_once('?') {
        Some((p, q)) => (p, Some(q)),
        None => (path_with_query, None),
    };

    if path_part.is_empty() {
        return url.to_string();
    }

    let expanded_path = match (path_part.strip_prefix("~/"), std::env::var("HOME")) {
        (Some(rest), Ok(home)) => format!("{}/{}", home.trim_end_matches('/'), rest),
        _ => path_part.to_string(),
    };

    if let Some(parent) = std::path::Path::new(&expanded_path).parent() {
        if !parent.as_os_str().is_empty() {
            let _ = std::fs::create_dir_all(parent);
        }
    }

    let mut rebuilt = String::from("sqlite://");
    rebuilt.push_str(&expanded_path);
    match query_part {
        Some(q) if q.contains("mode=") => {
            rebuilt.push('?');
            rebuilt.push_str(q);
        }
        Some(q) => {
            rebuilt.push('?');
            rebuilt.push_str(q);
            rebuilt.push_str("&mode=rwc");
        }
        None => rebuilt.push_str("?mode=rwc"),
    }
    rebuilt
}

pub async fn run_migrations(pool: &Pool) -> Result<()> {
    sqlx::migrate!("./migrations").run(pool).await?;
    Ok(())
}

fn decode_error(message: String) -> sqlx::Error {
    sqlx::Error::Decode(message.into())
}

fn record_from_row(row: &SqliteRow) -> std::result::Result<LocalRecord, sqlx::Error> {
    let service: String = row.try_get("service")?;
    let service = Service::parse(&service)
        .ok_or_else(|| decode_error(format!("unknown service {service}")))?;
    let attributes: String = row.try_get("attributes")?;
    let attributes = serde_json::from_str(&attributes)
        .map_err(|err| sqlx::Error::Decode(Box::new(err)))?;
    Ok(LocalRecord {
        id: row.try_get("id")?,
        service,
        remote_id: row.try_get("remote_id")?,
        owner: row.try_get("owner")?,
        owner_key: row.try_get("owner_key")?,
        title: row.try_get("title")?,
        body: row.try_get("body")?,
        url: row.try_get("url")?,
        occurred_at: row.try_get::<Option<DateTime<Utc>>, _>("occurred_at")?,
        tag_list: row.try_get("tag_list")?,
        attributes,
        synced_at: row.try_get("synced_at")?,
    })
}

fn relation_from_row(row: &SqliteRow) -> std::result::Result<Relation, sqlx::Error> {
    let service: String = row.try_get("service")?;
    let service = Service::parse(&service)
        .ok_or_else(|| decode_error(format!("unknown service {service}")))?;
    let kind: String = row.try_get("kind")?;
    let kind = RelationKind::parse(&kind)
        .ok_or_else(|| decode_error(format!("unknown relation kind {kind}")))?;
    Ok(Relation {
        id: row.try_get("id")?,
        service,
        kind,
        owner: row.try_get("owner")?,
        name: row.try_get("name")?,
        title: row.try_get("title")?,
        description: row.try_get("description")?,
        created_at: row.try_get("created_at")?,
        synced_at: row.try_get("synced_at")?,
    })
}

#[instrument(skip_all)]
pub async fn find_record(
    pool: &Pool,
    service: Service,
    remote_id: &str,
) -> Result<Option<LocalRecord>> {
    let sql = format!("SELECT {RECORD_COLUMNS} FROM records WHERE service = ? AND remote_id = ?");
    let row = sqlx::query(&sql)
        .bind(service.as_str())
        .bind(remote_id)
        .fetch_optional(pool)
        .await?;
    Ok(row.as_ref().map(record_from_row).transpose()?)
}

#[instrument(skip_all)]
pub async fn find_record_by_id(pool: &Pool, id: i64) -> Result<Option<LocalRecord>> {
    let sql = format!("SELECT {RECORD_COLUMNS} FROM records WHERE id = ?");
    let row = sqlx::query(&sql).bind(id).fetch_optional(pool).await?;
    Ok(row.as_ref().map(record_from_row).transpose()?)
}

/// Insert a record unless one with the same `(service, remote_id)` exists.
/// Returns the new row id, or `None` when the key was already taken.
#[instrument(skip_all)]
pub async fn insert_record(pool: &Pool, record: &NewRecord) -> Result<Option<i64>> {
    let mut tx = pool.begin().await?;
    let id = insert_record_tx(&mut tx, record).await?;
    tx.commit().await?;
    Ok(id)
}

async fn insert_record_tx(
    tx: &mut Transaction<'_, Sqlite>,
    record: &NewRecord,
) -> Result<Option<i64>> {
    let id = sqlx::query_scalar::<_, i64>(
        "INSERT INTO records (service, remote_id, owner, owner_key, title, body, url, occurred_at, tag_list, attributes, synced_at) \
         VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?) \
         ON CONFLICT (service, remote_id) DO NOTHING RETURNING id",
    )
    .bind(record.service.as_str())
    .bind(&record.remote_id)
    .bind(&record.owner)
    .bind(&record.owner_key)
    .bind(&record.title)
    .bind(&record.body)
    .bind(&record.url)
    .bind(record.occurred_at)
    .bind(record.tag_list())
    .bind(record.attributes.to_string())
    .bind(Utc::now())
    .fetch_optional(&mut **tx)
    .await?;
    Ok(id)
}

/// Delete the row for `(service, remote_id)` and insert `record` in its
/// place. Both statements share one transaction. The fresh row gets a new id,
/// so membership edges of the old row are gone afterwards.
#[instrument(skip_all)]
pub async fn replace_record(pool: &Pool, record: &NewRecord) -> Result<(i64, UpsertOutcome)> {
    let mut tx = pool.begin().await?;
    let deleted = sqlx::query("DELETE FROM records WHERE service = ? AND remote_id = ?")
        .bind(record.service.as_str())
        .bind(&record.remote_id)
        .execute(&mut *tx)
        .await?
        .rows_affected();
    let id = insert_record_tx(&mut tx, record)
        .await?
        .ok_or_else(|| decode_error(format!("record {} reappeared during replace", record.remote_id)))?;
    tx.commit().await?;
    let outcome = if deleted > 0 {
        UpsertOutcome::Replaced
    } else {
        UpsertOutcome::Created
    };
    Ok((id, outcome))
}

#[instrument(skip_all)]
pub async fn delete_record(pool: &Pool, service: Service, remote_id: &str) -> Result<bool> {
    let res = sqlx::query("DELETE FROM records WHERE service = ? AND remote_id = ?")
        .bind(service.as_str())
        .bind(remote_id)
        .execute(pool)
        .await?;
    Ok(res.rows_affected() > 0)
}

#[instrument(skip_all)]
pub async fn find_relation(pool: &Pool, key: &RelationKey) -> Result<Option<Relation>> {
    let sql = format!(
        "SELECT {RELATION_COLUMNS} FROM relations WHERE service = ? AND kind = ? AND owner = ? AND name = ?"
    );
    let row = sqlx::query(&sql)
        .bind(key.service.as_str())
        .bind(key.kind.as_str())
        .bind(&key.owner)
        .bind(&key.name)
        .fetch_optional(pool)
        .await?;
    Ok(row.as_ref().map(relation_from_row).transpose()?)
}

/// Fetch the relation for `key`, creating it with `defaults` on first use.
/// Existing relations keep their title and description.
#[instrument(skip_all)]
pub async fn get_or_create_relation(
    pool: &Pool,
    key: &RelationKey,
    defaults: &RelationDefaults,
) -> Result<Relation> {
    let now = Utc::now();
    let created = sqlx::query(
        "INSERT INTO relations (service, kind, owner, name, title, description, created_at, synced_at) \
         VALUES (?, ?, ?, ?, ?, ?, ?, ?) \
         ON CONFLICT (service, kind, owner, name) DO NOTHING",
    )
    .bind(key.service.as_str())
    .bind(key.kind.as_str())
    .bind(&key.owner)
    .bind(&key.name)
    .bind(&defaults.title)
    .bind(&defaults.description)
    .bind(now)
    .bind(now)
    .execute(pool)
    .await?
    .rows_affected()
        > 0;
    if created {
        debug!(kind = key.kind.as_str(), owner = %key.owner, name = %key.name, "created relation");
    }
    let relation = find_relation(pool, key)
        .await?
        .ok_or_else(|| decode_error(format!("relation {key:?} vanished after insert")))?;
    Ok(relation)
}

#[instrument(skip_all)]
pub async fn touch_relation(pool: &Pool, relation_id: i64) -> Result<()> {
    sqlx::query("UPDATE relations SET synced_at = ? WHERE id = ?")
        .bind(Utc::now())
        .bind(relation_id)
        .execute(pool)
        .await?;
    Ok(())
}

#[instrument(skip_all)]
pub async fn delete_relation(pool: &Pool, relation_id: i64) -> Result<bool> {
    let res = sqlx::query("DELETE FROM relations WHERE id = ?")
        .bind(relation_id)
        .execute(pool)
        .await?;
    Ok(res.rows_affected() > 0)
}

/// Add a membership edge. Returns `false` when the edge already existed.
#[instrument(skip_all)]
pub async fn link(pool: &Pool, relation_id: i64, record_id: i64) -> Result<bool> {
    let res = sqlx::query(
        "INSERT INTO relation_members (relation_id, record_id, added_at) VALUES (?, ?, ?) \
         ON CONFLICT (relation_id, record_id) DO NOTHING",
    )
    .bind(relation_id)
    .bind(record_id)
    .bind(Utc::now())
    .execute(pool)
    .await?;
    Ok(res.rows_affected() > 0)
}

/// Members of a relation, newest first.
#[instrument(skip_all)]
pub async fn relation_members(pool: &Pool, relation_id: i64) -> Result<Vec<LocalRecord>> {
    let sql = format!(
        "SELECT {} FROM records r JOIN relation_members m ON m.record_id = r.id \
         WHERE m.relation_id = ? ORDER BY r.occurred_at DESC, r.id ASC",
        RECORD_COLUMNS
            .split(", ")
            .map(|c| format!("r.{}", c.trim()))
            .collect::<Vec<_>>()
            .join(", ")
    );
    let rows = sqlx::query(&sql).bind(relation_id).fetch_all(pool).await?;
    let records = rows
        .iter()
        .map(record_from_row)
        .collect::<std::result::Result<Vec<_>, _>>()?;
    Ok(records)
}

#[instrument(skip_all)]
pub async fn count_members(pool: &Pool, relation_id: i64) -> Result<i64> {
    let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM relation_members WHERE relation_id = ?")
        .bind(relation_id)
        .fetch_one(pool)
        .await?;
    Ok(count)
}

#[instrument(skip_all)]
pub async fn count_records(pool: &Pool, service: Service) -> Result<i64> {
    let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM records WHERE service = ?")
        .bind(service.as_str())
        .fetch_one(pool)
        .await?;
    Ok(count)
}

#[instrument(skip_all)]
pub async fn count_relations(pool: &Pool, service: Service, kind: RelationKind) -> Result<i64> {
    let count: i64 =
        sqlx::query_scalar("SELECT COUNT(*) FROM relations WHERE service = ? AND kind = ?")
            .bind(service.as_str())
            .bind(kind.as_str())
            .fetch_one(pool)
            .await?;
    Ok(count)
}

/// Records of a service, newest first.
#[instrument(skip_all)]
pub async fn list_records(pool: &Pool, service: Service, limit: i64) -> Result<Vec<LocalRecord>> {
    let sql = format!(
        "SELECT {RECORD_COLUMNS} FROM records WHERE service = ? ORDER BY occurred_at DESC, id ASC LIMIT ?"
    );
    let rows = sqlx::query(&sql)
        .bind(service.as_str())
        .bind(limit)
        .fetch_all(pool)
        .await?;
    let records = rows
        .iter()
        .map(record_from_row)
        .collect::<std::result::Result<Vec<_>, _>>()?;
    Ok(records)
}

#[instrument(skip_all)]
pub async fn list_relations(pool: &Pool, service: Service) -> Result<Vec<Relation>> {
    let sql = format!(
        "SELECT {RELATION_COLUMNS} FROM relations WHERE service = ? ORDER BY kind, owner, name"
    );
    let rows = sqlx::query(&sql)
        .bind(service.as_str())
        .fetch_all(pool)
        .await?;
    let relations = rows
        .iter()
        .map(relation_from_row)
        .collect::<std::result::Result<Vec<_>, _>>()?;
    Ok(relations)
}
