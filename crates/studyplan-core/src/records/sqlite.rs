//! SQLite-based notification record storage.
//!
//! Records live in `~/.config/studyplan/studyplan.db`, scoped by observer id
//! so several observers can share one file. Fired thresholds are stored one
//! row each and only ever inserted, which keeps them monotonic even if a
//! stale record is saved.

use std::collections::BTreeSet;
use std::path::Path;

use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension};

use super::{NotificationRecord, RecordStore};
use crate::error::{CoreError, DatabaseError};
use crate::storage::data_dir;

/// SQLite store for one observer's notification records.
pub struct SqliteRecordStore {
    conn: Connection,
    observer_id: String,
}

impl SqliteRecordStore {
    /// Open the store at `<data_dir>/studyplan.db`.
    ///
    /// # Errors
    /// Returns an error if the data directory is unavailable or the database
    /// cannot be opened or migrated.
    pub fn open(observer_id: &str) -> Result<Self, CoreError> {
        let path = data_dir()?.join("studyplan.db");
        Ok(Self::open_at(path, observer_id)?)
    }

    /// Open the store at an explicit path.
    ///
    /// # Errors
    /// Returns an error if the database cannot be opened or migrated.
    pub fn open_at(path: impl AsRef<Path>, observer_id: &str) -> Result<Self, DatabaseError> {
        let path = path.as_ref();
        let conn = Connection::open(path).map_err(|source| DatabaseError::OpenFailed {
            path: path.to_path_buf(),
            source,
        })?;
        let store = Self {
            conn,
            observer_id: observer_id.to_string(),
        };
        store.migrate()?;
        Ok(store)
    }

    /// Open an in-memory database.
    ///
    /// # Errors
    /// Returns an error if the schema cannot be created.
    pub fn open_memory(observer_id: &str) -> Result<Self, DatabaseError> {
        let conn = Connection::open_in_memory()?;
        let store = Self {
            conn,
            observer_id: observer_id.to_string(),
        };
        store.migrate()?;
        Ok(store)
    }

    pub fn observer_id(&self) -> &str {
        &self.observer_id
    }

    fn migrate(&self) -> Result<(), rusqlite::Error> {
        self.conn.execute_batch(
            "PRAGMA synchronous = FULL;

            CREATE TABLE IF NOT EXISTS notification_records (
                observer_id   TEXT NOT NULL,
                plan_id       TEXT NOT NULL,
                subject       TEXT NOT NULL,
                exam_deadline TEXT NOT NULL,
                PRIMARY KEY (observer_id, plan_id)
            );

            CREATE TABLE IF NOT EXISTS fired_thresholds (
                observer_id  TEXT NOT NULL,
                plan_id      TEXT NOT NULL,
                threshold_id TEXT NOT NULL,
                PRIMARY KEY (observer_id, plan_id, threshold_id)
            );",
        )?;
        Ok(())
    }

    /// All records of this observer, ordered by deadline.
    ///
    /// # Errors
    /// Returns an error if the query fails or a row cannot be decoded.
    pub fn list_records(&self) -> Result<Vec<NotificationRecord>, DatabaseError> {
        let mut stmt = self.conn.prepare(
            "SELECT plan_id FROM notification_records
             WHERE observer_id = ?1
             ORDER BY exam_deadline, plan_id",
        )?;
        let ids = stmt
            .query_map(params![self.observer_id], |row| row.get::<_, String>(0))?
            .collect::<Result<Vec<_>, _>>()?;

        let mut records = Vec::with_capacity(ids.len());
        for id in ids {
            if let Some(record) = self.load(&id)? {
                records.push(record);
            }
        }
        Ok(records)
    }

    /// Delete every record of this observer. Returns how many were removed.
    ///
    /// # Errors
    /// Returns an error if the transaction fails.
    pub fn clear(&mut self) -> Result<usize, DatabaseError> {
        let tx = self.conn.transaction()?;
        tx.execute(
            "DELETE FROM fired_thresholds WHERE observer_id = ?1",
            params![self.observer_id],
        )?;
        let removed = tx.execute(
            "DELETE FROM notification_records WHERE observer_id = ?1",
            params![self.observer_id],
        )?;
        tx.commit()?;
        Ok(removed)
    }

    fn load_fired(&self, plan_id: &str) -> Result<BTreeSet<String>, rusqlite::Error> {
        let mut stmt = self.conn.prepare(
            "SELECT threshold_id FROM fired_thresholds
             WHERE observer_id = ?1 AND plan_id = ?2",
        )?;
        let fired = stmt
            .query_map(params![self.observer_id, plan_id], |row| row.get::<_, String>(0))?
            .collect::<Result<BTreeSet<_>, _>>()?;
        Ok(fired)
    }
}

impl RecordStore for SqliteRecordStore {
    fn load(&self, plan_id: &str) -> Result<Option<NotificationRecord>, DatabaseError> {
        let row = self
            .conn
            .query_row(
                "SELECT subject, exam_deadline FROM notification_records
                 WHERE observer_id = ?1 AND plan_id = ?2",
                params![self.observer_id, plan_id],
                |row| Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?)),
            )
            .optional()?;

        let Some((subject, deadline)) = row else {
            return Ok(None);
        };

        let exam_deadline = DateTime::parse_from_rfc3339(&deadline)
            .map_err(|e| DatabaseError::CorruptRecord {
                plan_id: plan_id.to_string(),
                message: format!("bad exam_deadline '{deadline}': {e}"),
            })?
            .with_timezone(&Utc);
        let fired = self.load_fired(plan_id)?;

        Ok(Some(NotificationRecord::from_parts(
            plan_id.to_string(),
            subject,
            exam_deadline,
            fired,
        )))
    }

    fn save(&mut self, record: &NotificationRecord) -> Result<(), DatabaseError> {
        let tx = self.conn.transaction()?;
        tx.execute(
            "INSERT INTO notification_records (observer_id, plan_id, subject, exam_deadline)
             VALUES (?1, ?2, ?3, ?4)
             ON CONFLICT (observer_id, plan_id) DO UPDATE
             SET subject = excluded.subject, exam_deadline = excluded.exam_deadline",
            params![
                self.observer_id,
                record.plan_id,
                record.subject,
                record.exam_deadline.to_rfc3339(),
            ],
        )?;
        {
            let mut stmt = tx.prepare(
                "INSERT OR IGNORE INTO fired_thresholds (observer_id, plan_id, threshold_id)
                 VALUES (?1, ?2, ?3)",
            )?;
            for threshold_id in record.fired() {
                stmt.execute(params![self.observer_id, record.plan_id, threshold_id])?;
            }
        }
        tx.commit()?;
        Ok(())
    }

    fn delete(&mut self, plan_id: &str) -> Result<bool, DatabaseError> {
        let tx = self.conn.transaction()?;
        tx.execute(
            "DELETE FROM fired_thresholds WHERE observer_id = ?1 AND plan_id = ?2",
            params![self.observer_id, plan_id],
        )?;
        let removed = tx.execute(
            "DELETE FROM notification_records WHERE observer_id = ?1 AND plan_id = ?2",
            params![self.observer_id, plan_id],
        )?;
        tx.commit()?;
        Ok(removed > 0)
    }

    fn list_known_plan_ids(&self) -> Result<BTreeSet<String>, DatabaseError> {
        let mut stmt = self
            .conn
            .prepare("SELECT plan_id FROM notification_records WHERE observer_id = ?1")?;
        let ids = stmt
            .query_map(params![self.observer_id], |row| row.get::<_, String>(0))?
            .collect::<Result<BTreeSet<_>, _>>()?;
        Ok(ids)
    }
}
