//! SQLite record store.
//!
//! All access goes through one `Arc<Mutex<Connection>>`. Writes run in
//! `BEGIN IMMEDIATE` transactions inside [`retry_blocking`], so lock contention
//! with the external index process is retried with bounded backoff and then
//! surfaced as `StorageBusy`. The database runs in WAL mode with a busy
//! timeout; both are set on every open.

use crate::migration::run_migrations;
use crate::retry::retry_blocking;
use chrono::{DateTime, SecondsFormat, Utc};
use hippo_types::config::{RetryPolicy, StorageConfig};
use hippo_types::error::{HippoError, HippoResult};
use hippo_types::record::{merge_tags, MemoryRecord, RecordId, RecordStatus};
use rusqlite::{Connection, ErrorCode, OptionalExtension, Transaction, TransactionBehavior};
use serde::Serialize;
use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tracing::{debug, info};

pub(crate) const RECORD_COLUMNS: &str = "id, content, tags, category, status, decay_exempt, metadata, created_at, updated_at, last_accessed_at, access_count";

/// The persistent record store.
#[derive(Clone)]
pub struct MemoryStore {
    conn: Arc<Mutex<Connection>>,
    retry: RetryPolicy,
    path: Option<PathBuf>,
}

/// Counts reported by [`MemoryStore::stats`].
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct StoreStats {
    pub total: usize,
    pub by_status: BTreeMap<String, usize>,
    pub by_category: BTreeMap<String, usize>,
    pub edges: usize,
    pub edges_by_kind: BTreeMap<String, usize>,
    pub visited_pairs: usize,
    pub cursors: BTreeMap<String, String>,
    pub db_size_bytes: Option<u64>,
}

impl StoreStats {
    pub fn active(&self) -> usize {
        self.by_status
            .get(RecordStatus::Active.as_str())
            .copied()
            .unwrap_or(0)
    }
}

impl MemoryStore {
    /// Open (or create) the database at `path`.
    pub fn open(path: &Path, config: &StorageConfig) -> HippoResult<Self> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        let conn = Connection::open(path).map_err(sqlite_err)?;
        conn.busy_timeout(Duration::from_millis(config.busy_timeout_ms))
            .map_err(sqlite_err)?;
        let mode: String = conn
            .pragma_update_and_check(None, "journal_mode", "WAL", |row| row.get(0))
            .map_err(sqlite_err)?;
        if !mode.eq_ignore_ascii_case("wal") {
            return Err(HippoError::Storage(format!(
                "could not enable write-ahead journal (journal_mode = {mode})"
            )));
        }
        conn.pragma_update(None, "synchronous", "NORMAL")
            .map_err(sqlite_err)?;
        run_migrations(&conn).map_err(sqlite_err)?;
        info!(path = %path.display(), "memory store opened");
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
            retry: config.retry.clone(),
            path: Some(path.to_path_buf()),
        })
    }

    /// An in-memory store with the full schema. Used by tests and dry tooling.
    pub fn open_in_memory() -> HippoResult<Self> {
        let conn = Connection::open_in_memory().map_err(sqlite_err)?;
        run_migrations(&conn).map_err(sqlite_err)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
            retry: RetryPolicy::default(),
            path: None,
        })
    }

    /// Database file path, if file-backed.
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// Run a read against the connection.
    pub(crate) fn read<T, F>(&self, mut f: F) -> HippoResult<T>
    where
        F: FnMut(&Connection) -> HippoResult<T>,
    {
        retry_blocking(&self.retry, || {
            let conn = self
                .conn
                .lock()
                .map_err(|e| HippoError::Internal(e.to_string()))?;
            f(&*conn)
        })
    }

    /// Run `f` inside one IMMEDIATE transaction, retried on lock contention.
    /// Either everything `f` did commits, or nothing does.
    pub(crate) fn write<T, F>(&self, mut f: F) -> HippoResult<T>
    where
        F: FnMut(&Transaction<'_>) -> HippoResult<T>,
    {
        retry_blocking(&self.retry, || {
            let mut conn = self
                .conn
                .lock()
                .map_err(|e| HippoError::Internal(e.to_string()))?;
            let tx = conn
                .transaction_with_behavior(TransactionBehavior::Immediate)
                .map_err(sqlite_err)?;
            let out = f(&tx)?;
            tx.commit().map_err(sqlite_err)?;
            Ok(out)
        })
    }

    /// All records, oldest first. Inactive records only when asked.
    pub fn get_all(&self, include_inactive: bool) -> HippoResult<Vec<MemoryRecord>> {
        let sql = if include_inactive {
            format!("SELECT {RECORD_COLUMNS} FROM records ORDER BY created_at, id")
        } else {
            format!(
                "SELECT {RECORD_COLUMNS} FROM records WHERE status = 'active' ORDER BY created_at, id"
            )
        };
        self.read(|conn| query_records(conn, &sql, []))
    }

    /// One record by id, any status.
    pub fn get_by_id(&self, id: &RecordId) -> HippoResult<Option<MemoryRecord>> {
        self.read(|conn| fetch_record(conn, id))
    }

    /// Active records carrying `tag`, compared case-insensitively.
    pub fn search_by_tag(&self, tag: &str) -> HippoResult<Vec<MemoryRecord>> {
        let sql = format!(
            "SELECT {RECORD_COLUMNS} FROM records
             WHERE status = 'active'
               AND EXISTS (SELECT 1 FROM json_each(records.tags) WHERE lower(json_each.value) = lower(?1))
             ORDER BY created_at, id"
        );
        let tag = tag.trim().to_string();
        self.read(|conn| query_records(conn, &sql, [tag.as_str()]))
    }

    /// The `limit` newest active records in `category`, newest first.
    pub fn recent_by_category(&self, category: &str, limit: usize) -> HippoResult<Vec<MemoryRecord>> {
        let sql = format!(
            "SELECT {RECORD_COLUMNS} FROM records
             WHERE status = 'active' AND category = ?1
             ORDER BY created_at DESC, id DESC
             LIMIT ?2"
        );
        self.read(|conn| {
            query_records(
                conn,
                &sql,
                rusqlite::params![category, limit.min(i64::MAX as usize) as i64],
            )
        })
    }

    /// Persist a record. Idempotent on normalized content: storing the same
    /// content again returns the existing id and changes nothing.
    pub fn store(&self, record: &MemoryRecord) -> HippoResult<RecordId> {
        let (id, inserted) = self.write(|tx| insert_record(tx, record))?;
        if inserted {
            debug!(id = %id.short(), category = %record.category, "record stored");
        } else {
            debug!(id = %id.short(), "record already present");
        }
        Ok(id)
    }

    /// Replace a record's tags (deduplicated case-insensitively).
    pub fn update_tags(&self, id: &RecordId, tags: &[String]) -> HippoResult<Vec<String>> {
        let now = Utc::now();
        self.write(|tx| write_tags(tx, id, tags, now))
    }

    /// Change a record's lifecycle status. Retired records stay retired.
    pub fn set_status(&self, id: &RecordId, status: RecordStatus) -> HippoResult<()> {
        let now = Utc::now();
        self.write(|tx| set_status_in(tx, id, status, now))
    }

    /// Explicit access tracking for retrieval callers: bumps `access_count`
    /// and `last_accessed_at`. Scoring never calls this.
    pub fn record_access(&self, ids: &[RecordId], now: DateTime<Utc>) -> HippoResult<usize> {
        if ids.is_empty() {
            return Ok(0);
        }
        let now = fmt_ts(now);
        self.write(|tx| {
            let mut stmt = tx
                .prepare_cached(
                    "UPDATE records SET access_count = access_count + 1, last_accessed_at = ?1 WHERE id = ?2",
                )
                .map_err(sqlite_err)?;
            let mut touched = 0;
            for id in ids {
                touched += stmt
                    .execute(rusqlite::params![now, id.as_str()])
                    .map_err(sqlite_err)?;
            }
            Ok(touched)
        })
    }

    /// Counts by status and category, lineage, visited pairs and cursors.
    pub fn stats(&self) -> HippoResult<StoreStats> {
        let mut stats = self.read(|conn| {
            let mut stats = StoreStats::default();
            stats.by_status = group_count(conn, "SELECT status, COUNT(*) FROM records GROUP BY status")?;
            stats.by_category = group_count(
                conn,
                "SELECT category, COUNT(*) FROM records WHERE status = 'active' GROUP BY category",
            )?;
            stats.edges_by_kind =
                group_count(conn, "SELECT kind, COUNT(*) FROM lineage_edges GROUP BY kind")?;
            stats.total = stats.by_status.values().sum();
            stats.edges = stats.edges_by_kind.values().sum();
            stats.visited_pairs = conn
                .query_row("SELECT COUNT(*) FROM visited_pairs", [], |row| row.get::<_, i64>(0))
                .map_err(sqlite_err)? as usize;
            let mut stmt = conn
                .prepare("SELECT name, value FROM cursors ORDER BY name")
                .map_err(sqlite_err)?;
            let rows = stmt
                .query_map([], |row| Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?)))
                .map_err(sqlite_err)?;
            for row in rows {
                let (name, value) = row.map_err(sqlite_err)?;
                stats.cursors.insert(name, value);
            }
            Ok(stats)
        })?;
        stats.db_size_bytes = self
            .path
            .as_ref()
            .and_then(|p| std::fs::metadata(p).ok())
            .map(|m| m.len());
        Ok(stats)
    }
}

/// Insert a record unless its id already exists. Returns the id and whether a
/// row was written.
pub(crate) fn insert_record(
    tx: &Connection,
    record: &MemoryRecord,
) -> HippoResult<(RecordId, bool)> {
    let id = RecordId::for_content(&record.content);
    let tags = merge_tags(&[], &record.tags);
    let tags_json = serde_json::to_string(&tags)?;
    let metadata_json = serde_json::to_string(&record.metadata)?;
    let inserted = tx
        .execute(
            "INSERT OR IGNORE INTO records
                (id, content, tags, category, status, decay_exempt, metadata, created_at, updated_at, last_accessed_at, access_count)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)",
            rusqlite::params![
                id.as_str(),
                record.content,
                tags_json,
                record.category,
                record.status.as_str(),
                record.decay_exempt,
                metadata_json,
                fmt_ts(record.created_at),
                fmt_ts(record.updated_at),
                fmt_ts(record.last_accessed_at),
                record.access_count as i64,
            ],
        )
        .map_err(sqlite_err)?;
    Ok((id, inserted > 0))
}

pub(crate) fn write_tags(
    tx: &Connection,
    id: &RecordId,
    tags: &[String],
    now: DateTime<Utc>,
) -> HippoResult<Vec<String>> {
    let tags = merge_tags(&[], tags);
    let tags_json = serde_json::to_string(&tags)?;
    let changed = tx
        .execute(
            "UPDATE records SET tags = ?1, updated_at = ?2 WHERE id = ?3",
            rusqlite::params![tags_json, fmt_ts(now), id.as_str()],
        )
        .map_err(sqlite_err)?;
    if changed == 0 {
        return Err(HippoError::NotFound(id.to_string()));
    }
    Ok(tags)
}

pub(crate) fn set_status_in(
    tx: &Connection,
    id: &RecordId,
    status: RecordStatus,
    now: DateTime<Utc>,
) -> HippoResult<()> {
    let current: Option<String> = tx
        .query_row(
            "SELECT status FROM records WHERE id = ?1",
            [id.as_str()],
            |row| row.get(0),
        )
        .optional()
        .map_err(sqlite_err)?;
    let current = match current {
        Some(s) => parse_status(&s)?,
        None => return Err(HippoError::NotFound(id.to_string())),
    };
    if current == status {
        return Ok(());
    }
    if !current.is_active() {
        return Err(HippoError::InvalidTransition {
            id: id.to_string(),
            from: current.to_string(),
            to: status.to_string(),
        });
    }
    tx.execute(
        "UPDATE records SET status = ?1, updated_at = ?2 WHERE id = ?3",
        rusqlite::params![status.as_str(), fmt_ts(now), id.as_str()],
    )
    .map_err(sqlite_err)?;
    debug!(id = %id.short(), from = %current, to = %status, "record status changed");
    Ok(())
}

pub(crate) fn fetch_record(conn: &Connection, id: &RecordId) -> HippoResult<Option<MemoryRecord>> {
    let sql = format!("SELECT {RECORD_COLUMNS} FROM records WHERE id = ?1");
    Ok(query_records(conn, &sql, [id.as_str()])?.into_iter().next())
}

pub(crate) fn query_records<P: rusqlite::Params>(
    conn: &Connection,
    sql: &str,
    params: P,
) -> HippoResult<Vec<MemoryRecord>> {
    let mut stmt = conn.prepare_cached(sql).map_err(sqlite_err)?;
    let rows = stmt
        .query_map(params, |row| {
            Ok(RawRecord {
                id: row.get(0)?,
                content: row.get(1)?,
                tags: row.get(2)?,
                category: row.get(3)?,
                status: row.get(4)?,
                decay_exempt: row.get(5)?,
                metadata: row.get(6)?,
                created_at: row.get(7)?,
                updated_at: row.get(8)?,
                last_accessed_at: row.get(9)?,
                access_count: row.get(10)?,
            })
        })
        .map_err(sqlite_err)?;
    let mut records = Vec::new();
    for row in rows {
        records.push(row.map_err(sqlite_err)?.into_record()?);
    }
    Ok(records)
}

fn group_count(conn: &Connection, sql: &str) -> HippoResult<BTreeMap<String, usize>> {
    let mut stmt = conn.prepare(sql).map_err(sqlite_err)?;
    let rows = stmt
        .query_map([], |row| Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1)?)))
        .map_err(sqlite_err)?;
    let mut out = BTreeMap::new();
    for row in rows {
        let (key, count) = row.map_err(sqlite_err)?;
        out.insert(key, count.max(0) as usize);
    }
    Ok(out)
}

/// A row as stored, before invariant checks.
struct RawRecord {
    id: String,
    content: String,
    tags: String,
    category: String,
    status: String,
    decay_exempt: bool,
    metadata: String,
    created_at: String,
    updated_at: String,
    last_accessed_at: String,
    access_count: i64,
}

impl RawRecord {
    fn into_record(self) -> HippoResult<MemoryRecord> {
        let corrupt = |what: &str, detail: String| {
            HippoError::StorageCorrupt(format!("record {}: {what}: {detail}", self.id))
        };
        let tags: Vec<String> =
            serde_json::from_str(&self.tags).map_err(|e| corrupt("tags", e.to_string()))?;
        let metadata: HashMap<String, serde_json::Value> = serde_json::from_str(&self.metadata)
            .map_err(|e| corrupt("metadata", e.to_string()))?;
        if self.access_count < 0 {
            return Err(corrupt("access_count", self.access_count.to_string()));
        }
        Ok(MemoryRecord {
            status: parse_status(&self.status)?,
            created_at: parse_ts(&self.created_at)?,
            updated_at: parse_ts(&self.updated_at)?,
            last_accessed_at: parse_ts(&self.last_accessed_at)?,
            access_count: self.access_count as u64,
            decay_exempt: self.decay_exempt,
            tags,
            metadata,
            category: self.category,
            content: self.content,
            id: RecordId(self.id),
        })
    }
}

fn parse_status(s: &str) -> HippoResult<RecordStatus> {
    s.parse::<RecordStatus>().map_err(HippoError::StorageCorrupt)
}

/// Timestamp text format used in every table.
pub(crate) fn fmt_ts(dt: DateTime<Utc>) -> String {
    dt.to_rfc3339_opts(SecondsFormat::Micros, true)
}

pub(crate) fn parse_ts(s: &str) -> HippoResult<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| HippoError::StorageCorrupt(format!("bad timestamp '{s}': {e}")))
}

/// Classify a SQLite error: lock contention is retryable, file damage is fatal.
pub(crate) fn sqlite_err(e: rusqlite::Error) -> HippoError {
    match &e {
        rusqlite::Error::SqliteFailure(err, _) => match err.code {
            ErrorCode::DatabaseBusy | ErrorCode::DatabaseLocked => HippoError::StorageBusy {
                attempts: 1,
                reason: e.to_string(),
            },
            ErrorCode::DatabaseCorrupt | ErrorCode::NotADatabase => {
                HippoError::StorageCorrupt(e.to_string())
            }
            _ => HippoError::Storage(e.to_string()),
        },
        _ => HippoError::Storage(e.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration as ChronoDuration;
    use hippo_types::record::SESSION_SUMMARY;

    fn setup() -> MemoryStore {
        MemoryStore::open_in_memory().unwrap()
    }

    #[test]
    fn test_store_is_idempotent_on_normalized_content() {
        let store = setup();
        let now = Utc::now();
        let a = MemoryRecord::new("Switched the database to Postgres", "note", now);
        let b = MemoryRecord::new("  switched THE database\tto postgres", "note", now);
        let id_a = store.store(&a).unwrap();
        let id_b = store.store(&b).unwrap();
        assert_eq!(id_a, id_b);
        assert_eq!(store.get_all(false).unwrap().len(), 1);
        // The first content wins.
        let rec = store.get_by_id(&id_a).unwrap().unwrap();
        assert_eq!(rec.content, "Switched the database to Postgres");
    }

    #[test]
    fn test_get_by_id_missing() {
        let store = setup();
        assert!(store
            .get_by_id(&RecordId::for_content("nothing"))
            .unwrap()
            .is_none());
    }

    #[test]
    fn test_inactive_excluded_from_listing_and_search() {
        let store = setup();
        let now = Utc::now();
        let keep = store
            .store(&MemoryRecord::new("keep me", "note", now).with_tags(["Rust"]))
            .unwrap();
        let gone = store
            .store(&MemoryRecord::new("retire me", "note", now).with_tags(["rust"]))
            .unwrap();
        store.set_status(&gone, RecordStatus::Merged).unwrap();

        let active = store.get_all(false).unwrap();
        assert_eq!(active.len(), 1);
        assert_eq!(active[0].id, keep);
        assert_eq!(store.get_all(true).unwrap().len(), 2);

        let hits = store.search_by_tag("RUST").unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].id, keep);

        // Never physically removed.
        let retired = store.get_by_id(&gone).unwrap().unwrap();
        assert_eq!(retired.status, RecordStatus::Merged);
    }

    #[test]
    fn test_retired_records_stay_retired() {
        let store = setup();
        let id = store
            .store(&MemoryRecord::new("old fact", "note", Utc::now()))
            .unwrap();
        store.set_status(&id, RecordStatus::Superseded).unwrap();
        // Same status again is a no-op.
        store.set_status(&id, RecordStatus::Superseded).unwrap();
        let err = store.set_status(&id, RecordStatus::Active).unwrap_err();
        assert!(matches!(err, HippoError::InvalidTransition { .. }));
        let err = store.set_status(&id, RecordStatus::Merged).unwrap_err();
        assert!(matches!(err, HippoError::InvalidTransition { .. }));
    }

    #[test]
    fn test_set_status_missing_record() {
        let store = setup();
        let err = store
            .set_status(&RecordId::for_content("ghost"), RecordStatus::Merged)
            .unwrap_err();
        assert!(matches!(err, HippoError::NotFound(_)));
    }

    #[test]
    fn test_update_tags_dedups() {
        let store = setup();
        let id = store
            .store(&MemoryRecord::new("tag me", "note", Utc::now()))
            .unwrap();
        let tags = store
            .update_tags(
                &id,
                &["Alice".to_string(), "alice".to_string(), "Project X".to_string()],
            )
            .unwrap();
        assert_eq!(tags, vec!["Alice", "Project-X"]);
        let rec = store.get_by_id(&id).unwrap().unwrap();
        assert_eq!(rec.tags, tags);
        assert!(store
            .update_tags(&RecordId::for_content("ghost"), &tags)
            .is_err());
    }

    #[test]
    fn test_record_access_is_explicit() {
        let store = setup();
        let created = Utc::now() - ChronoDuration::days(3);
        let id = store
            .store(&MemoryRecord::new("accessed", "note", created))
            .unwrap();
        let now = Utc::now();
        assert_eq!(store.record_access(&[id.clone()], now).unwrap(), 1);
        store.record_access(&[id.clone()], now).unwrap();
        let rec = store.get_by_id(&id).unwrap().unwrap();
        assert_eq!(rec.access_count, 2);
        assert_eq!(fmt_ts(rec.last_accessed_at), fmt_ts(now));
        assert_eq!(fmt_ts(rec.created_at), fmt_ts(created));
    }

    #[test]
    fn test_recent_by_category() {
        let store = setup();
        let base = Utc::now() - ChronoDuration::days(10);
        for day in 0..4 {
            let rec = MemoryRecord::new(
                format!("summary for day {day}"),
                SESSION_SUMMARY,
                base + ChronoDuration::days(day),
            );
            store.store(&rec).unwrap();
        }
        store
            .store(&MemoryRecord::new("unrelated note", "note", Utc::now()))
            .unwrap();
        let recent = store.recent_by_category(SESSION_SUMMARY, 2).unwrap();
        assert_eq!(recent.len(), 2);
        assert_eq!(recent[0].content, "summary for day 3");
        assert_eq!(recent[1].content, "summary for day 2");
    }

    #[test]
    fn test_stats() {
        let store = setup();
        let now = Utc::now();
        store.store(&MemoryRecord::new("a", "note", now)).unwrap();
        let b = store
            .store(&MemoryRecord::new("b", SESSION_SUMMARY, now))
            .unwrap();
        store.set_status(&b, RecordStatus::Merged).unwrap();
        let stats = store.stats().unwrap();
        assert_eq!(stats.total, 2);
        assert_eq!(stats.active(), 1);
        assert_eq!(stats.by_status.get("merged"), Some(&1));
        assert_eq!(stats.by_category.get("note"), Some(&1));
        assert!(stats.by_category.get(SESSION_SUMMARY).is_none());
        assert_eq!(stats.edges, 0);
        assert!(stats.db_size_bytes.is_none());
    }

    #[test]
    fn test_corrupt_status_is_fatal() {
        let store = setup();
        let id = store
            .store(&MemoryRecord::new("will corrupt", "note", Utc::now()))
            .unwrap();
        store
            .write(|tx| {
                tx.execute(
                    "UPDATE records SET status = 'exploded' WHERE id = ?1",
                    [id.as_str()],
                )
                .map_err(sqlite_err)
            })
            .unwrap();
        let err = store.get_all(true).unwrap_err();
        assert!(matches!(err, HippoError::StorageCorrupt(_)));
        assert!(err.is_fatal());
    }

    #[test]
    fn test_file_store_uses_wal_and_reopens() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("memory.db");
        let config = StorageConfig::default();
        let id = {
            let store = MemoryStore::open(&path, &config).unwrap();
            store
                .store(&MemoryRecord::new("persisted fact", "note", Utc::now()))
                .unwrap()
        };
        let store = MemoryStore::open(&path, &config).unwrap();
        assert!(store.get_by_id(&id).unwrap().is_some());
        let mode: String = store
            .read(|conn| {
                conn.pragma_query_value(None, "journal_mode", |row| row.get(0))
                    .map_err(sqlite_err)
            })
            .unwrap();
        assert_eq!(mode.to_lowercase(), "wal");
        assert!(store.stats().unwrap().db_size_bytes.unwrap() > 0);
    }

    #[test]
    fn test_lock_contention_surfaces_storage_busy() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("memory.db");
        let config = StorageConfig {
            busy_timeout_ms: 10,
            retry: RetryPolicy {
                max_attempts: 3,
                min_delay_ms: 1,
                max_delay_ms: 5,
                jitter: 0.0,
            },
        };
        let store = MemoryStore::open(&path, &config).unwrap();

        // A second connection, standing in for the index process, holds the write lock.
        let other = Connection::open(&path).unwrap();
        other.execute_batch("BEGIN IMMEDIATE;").unwrap();

        let err = store
            .store(&MemoryRecord::new("blocked write", "note", Utc::now()))
            .unwrap_err();
        match err {
            HippoError::StorageBusy { attempts, .. } => assert_eq!(attempts, 3),
            other => panic!("expected StorageBusy, got {other:?}"),
        }

        other.execute_batch("ROLLBACK;").unwrap();
        store
            .store(&MemoryRecord::new("blocked write", "note", Utc::now()))
            .unwrap();
    }
}
