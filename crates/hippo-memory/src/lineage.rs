//! Lineage edges, the compaction visited-set, and atomic compaction changes.

use crate::store::{
    fmt_ts, insert_record, parse_ts, set_status_in, sqlite_err, write_tags, MemoryStore,
};
use chrono::{DateTime, Utc};
use hippo_types::error::{HippoError, HippoResult};
use hippo_types::lineage::{EdgeKind, LineageEdge};
use hippo_types::record::{MemoryRecord, RecordId, RecordStatus};
use rusqlite::{Connection, OptionalExtension};
use std::collections::HashMap;
use tracing::debug;

/// A pair the compactor already judged, keyed by `pair_key`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VisitedPair {
    pub pair_key: String,
    /// Hash of both sides' normalized content at judgement time. A pair whose
    /// content changed since is judged again.
    pub content_version: String,
    /// Relationship label recorded for the pair.
    pub verdict: String,
    pub visited_at: DateTime<Utc>,
}

/// Everything one compaction decision writes. Applied in a single transaction.
#[derive(Debug, Clone, Default)]
pub struct StoreChange {
    pub new_records: Vec<MemoryRecord>,
    pub status_changes: Vec<(RecordId, RecordStatus)>,
    /// Full replacement tag lists, e.g. a duplicate's survivor absorbing the
    /// retired record's tags.
    pub tag_updates: Vec<(RecordId, Vec<String>)>,
    pub edges: Vec<(RecordId, RecordId, EdgeKind)>,
    pub visited: Vec<VisitedPair>,
}

impl StoreChange {
    pub fn is_empty(&self) -> bool {
        self.new_records.is_empty()
            && self.status_changes.is_empty()
            && self.tag_updates.is_empty()
            && self.edges.is_empty()
            && self.visited.is_empty()
    }
}

impl MemoryStore {
    /// Append a lineage edge. Both ends must exist. Re-adding an existing edge
    /// is a no-op; edges are never updated or removed.
    pub fn create_edge(&self, from_id: &RecordId, to_id: &RecordId, kind: EdgeKind) -> HippoResult<bool> {
        let now = Utc::now();
        self.write(|tx| insert_edge(tx, from_id, to_id, kind, now))
    }

    /// Edges touching `id` in either direction, oldest first.
    pub fn edges_for(&self, id: &RecordId) -> HippoResult<Vec<LineageEdge>> {
        self.read(|conn| {
            query_edges(
                conn,
                "SELECT from_id, to_id, kind, created_at FROM lineage_edges
                 WHERE from_id = ?1 OR to_id = ?1
                 ORDER BY created_at, from_id, to_id",
                [id.as_str()],
            )
        })
    }

    /// The whole lineage graph, oldest first.
    pub fn all_edges(&self) -> HippoResult<Vec<LineageEdge>> {
        self.read(|conn| {
            query_edges(
                conn,
                "SELECT from_id, to_id, kind, created_at FROM lineage_edges
                 ORDER BY created_at, from_id, to_id",
                [],
            )
        })
    }

    /// The visited-set, keyed by pair key.
    pub fn visited_pairs(&self) -> HippoResult<HashMap<String, VisitedPair>> {
        self.read(|conn| {
            let mut stmt = conn
                .prepare("SELECT pair_key, content_version, verdict, visited_at FROM visited_pairs")
                .map_err(sqlite_err)?;
            let rows = stmt
                .query_map([], |row| {
                    Ok((
                        row.get::<_, String>(0)?,
                        row.get::<_, String>(1)?,
                        row.get::<_, String>(2)?,
                        row.get::<_, String>(3)?,
                    ))
                })
                .map_err(sqlite_err)?;
            let mut out = HashMap::new();
            for row in rows {
                let (pair_key, content_version, verdict, visited_at) = row.map_err(sqlite_err)?;
                out.insert(
                    pair_key.clone(),
                    VisitedPair {
                        pair_key,
                        content_version,
                        verdict,
                        visited_at: parse_ts(&visited_at)?,
                    },
                );
            }
            Ok(out)
        })
    }

    /// Apply one compaction decision atomically: new records, status changes,
    /// lineage edges and visited markers commit together or not at all.
    pub fn apply_change(&self, change: &StoreChange, now: DateTime<Utc>) -> HippoResult<()> {
        if change.is_empty() {
            return Ok(());
        }
        self.write(|tx| {
            for record in &change.new_records {
                insert_record(tx, record)?;
            }
            for (id, status) in &change.status_changes {
                set_status_in(tx, id, *status, now)?;
            }
            for (id, tags) in &change.tag_updates {
                write_tags(tx, id, tags, now)?;
            }
            for (from, to, kind) in &change.edges {
                insert_edge(tx, from, to, *kind, now)?;
            }
            for pair in &change.visited {
                upsert_visited(tx, pair)?;
            }
            Ok(())
        })?;
        debug!(
            new_records = change.new_records.len(),
            status_changes = change.status_changes.len(),
            edges = change.edges.len(),
            "compaction change applied"
        );
        Ok(())
    }
}

fn insert_edge(
    tx: &Connection,
    from_id: &RecordId,
    to_id: &RecordId,
    kind: EdgeKind,
    now: DateTime<Utc>,
) -> HippoResult<bool> {
    if from_id == to_id {
        return Err(HippoError::Internal(format!(
            "refusing self-edge on {}",
            from_id.short()
        )));
    }
    for id in [from_id, to_id] {
        let exists: Option<i64> = tx
            .query_row("SELECT 1 FROM records WHERE id = ?1", [id.as_str()], |row| row.get(0))
            .optional()
            .map_err(sqlite_err)?;
        if exists.is_none() {
            return Err(HippoError::NotFound(id.to_string()));
        }
    }
    let inserted = tx
        .execute(
            "INSERT OR IGNORE INTO lineage_edges (from_id, to_id, kind, created_at) VALUES (?1, ?2, ?3, ?4)",
            rusqlite::params![from_id.as_str(), to_id.as_str(), kind.as_str(), fmt_ts(now)],
        )
        .map_err(sqlite_err)?;
    Ok(inserted > 0)
}

fn upsert_visited(tx: &Connection, pair: &VisitedPair) -> HippoResult<()> {
    tx.execute(
        "INSERT INTO visited_pairs (pair_key, content_version, verdict, visited_at) VALUES (?1, ?2, ?3, ?4)
         ON CONFLICT(pair_key) DO UPDATE SET content_version = ?2, verdict = ?3, visited_at = ?4",
        rusqlite::params![
            pair.pair_key,
            pair.content_version,
            pair.verdict,
            fmt_ts(pair.visited_at)
        ],
    )
    .map_err(sqlite_err)?;
    Ok(())
}

fn query_edges<P: rusqlite::Params>(conn: &Connection, sql: &str, params: P) -> HippoResult<Vec<LineageEdge>> {
    let mut stmt = conn.prepare_cached(sql).map_err(sqlite_err)?;
    let rows = stmt
        .query_map(params, |row| {
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, String>(2)?,
                row.get::<_, String>(3)?,
            ))
        })
        .map_err(sqlite_err)?;
    let mut edges = Vec::new();
    for row in rows {
        let (from_id, to_id, kind, created_at) = row.map_err(sqlite_err)?;
        let kind: EdgeKind = kind.parse().map_err(HippoError::StorageCorrupt)?;
        edges.push(LineageEdge::new(
            RecordId(from_id),
            RecordId(to_id),
            kind,
            parse_ts(&created_at)?,
        ));
    }
    Ok(edges)
}
