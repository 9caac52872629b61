//! Named progress cursors.
//!
//! The consolidator keeps its session position here and the compactor keeps
//! the timestamp of its last run plus the pairs it left unfinished. Positions only move forward.

use crate::store::{fmt_ts, insert_record, sqlite_err, MemoryStore};
use chrono::Utc;
use hippo_types::error::{HippoError, HippoResult};
use hippo_types::record::{MemoryRecord, RecordId};
use rusqlite::{Connection, OptionalExtension};

impl MemoryStore {
    /// Raw cursor value, if set.
    pub fn get_cursor(&self, name: &str) -> HippoResult<Option<String>> {
        self.read(|conn| read_cursor(conn, name))
    }

    /// Set a raw cursor value.
    pub fn set_cursor(&self, name: &str, value: &str) -> HippoResult<()> {
        self.write(|tx| write_cursor(tx, name, value))
    }

    /// Set several raw cursors in one transaction.
    pub fn set_cursors(&self, values: &[(&str, &str)]) -> HippoResult<()> {
        self.write(|tx| {
            for (name, value) in values {
                write_cursor(tx, name, value)?;
            }
            Ok(())
        })
    }

    /// Numeric cursor, zero when unset.
    pub fn get_position(&self, name: &str) -> HippoResult<u64> {
        match self.get_cursor(name)? {
            Some(value) => parse_position(name, &value),
            None => Ok(0),
        }
    }

    /// Store `records` and move the numeric cursor `name` to `position` in one
    /// transaction. Refuses to move the cursor backwards.
    pub fn store_with_cursor(
        &self,
        records: &[MemoryRecord],
        name: &str,
        position: u64,
    ) -> HippoResult<Vec<RecordId>> {
        self.write(|tx| {
            let current = match read_cursor(tx, name)? {
                Some(value) => parse_position(name, &value)?,
                None => 0,
            };
            if position < current {
                return Err(HippoError::Internal(format!(
                    "cursor '{name}' would move backwards ({current} -> {position})"
                )));
            }
            let mut ids = Vec::with_capacity(records.len());
            for record in records {
                ids.push(insert_record(tx, record)?.0);
            }
            write_cursor(tx, name, &position.to_string())?;
            Ok(ids)
        })
    }
}

fn read_cursor(conn: &Connection, name: &str) -> HippoResult<Option<String>> {
    conn.query_row("SELECT value FROM cursors WHERE name = ?1", [name], |row| row.get(0))
        .optional()
        .map_err(sqlite_err)
}

fn write_cursor(conn: &Connection, name: &str, value: &str) -> HippoResult<()> {
    conn.execute(
        "INSERT INTO cursors (name, value, updated_at) VALUES (?1, ?2, ?3)
         ON CONFLICT(name) DO UPDATE SET value = ?2, updated_at = ?3",
        rusqlite::params![name, value, fmt_ts(Utc::now())],
    )
    .map_err(sqlite_err)?;
    Ok(())
}

fn parse_position(name: &str, value: &str) -> HippoResult<u64> {
    value
        .parse::<u64>()
        .map_err(|_| HippoError::StorageCorrupt(format!("cursor '{name}' is not a position: {value}")))
}
