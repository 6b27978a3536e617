//! SQLite-backed job tracker implementation.

use std::path::Path;
use std::sync::Mutex;

use chrono::{DateTime, Utc};
use rusqlite::{params, Connection};

use super::{JobRecord, JobTracker, TrackerError};

/// SQLite-backed job tracker.
pub struct SqliteJobTracker {
    conn: Mutex<Connection>,
}

impl SqliteJobTracker {
    /// Create a new SQLite job tracker, creating the database file and tables if needed.
    pub fn new(path: &Path) -> Result<Self, TrackerError> {
        let conn = Connection::open(path).map_err(|e| TrackerError::Database(e.to_string()))?;
        Self::initialize_schema(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Create an in-memory SQLite job tracker (useful for testing).
    pub fn in_memory() -> Result<Self, TrackerError> {
        let conn =
            Connection::open_in_memory().map_err(|e| TrackerError::Database(e.to_string()))?;
        Self::initialize_schema(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn initialize_schema(conn: &Connection) -> Result<(), TrackerError> {
        conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS job_records (
                id TEXT PRIMARY KEY,
                journal_id TEXT NOT NULL,
                created_by TEXT NOT NULL,
                submission_file_id TEXT NOT NULL,
                external_job_id TEXT,
                status_label TEXT NOT NULL,
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL
            );

            CREATE INDEX IF NOT EXISTS idx_job_records_journal ON job_records(journal_id);
            CREATE INDEX IF NOT EXISTS idx_job_records_file ON job_records(submission_file_id);
            "#,
        )
        .map_err(|e| TrackerError::Database(e.to_string()))?;

        Ok(())
    }

    fn row_to_record(row: &rusqlite::Row) -> rusqlite::Result<JobRecord> {
        let id: String = row.get(0)?;
        let journal_id: String = row.get(1)?;
        let created_by: String = row.get(2)?;
        let submission_file_id: String = row.get(3)?;
        let external_job_id: Option<String> = row.get(4)?;
        let status_label: String = row.get(5)?;
        let created_at_str: String = row.get(6)?;
        let updated_at_str: String = row.get(7)?;

        // Parse timestamps - use now if parsing fails (shouldn't happen with valid data)
        let created_at = DateTime::parse_from_rfc3339(&created_at_str)
            .map(|dt| dt.with_timezone(&Utc))
            .unwrap_or_else(|_| Utc::now());

        let updated_at = DateTime::parse_from_rfc3339(&updated_at_str)
            .map(|dt| dt.with_timezone(&Utc))
            .unwrap_or_else(|_| Utc::now());

        Ok(JobRecord {
            id,
            journal_id,
            created_by,
            submission_file_id,
            external_job_id,
            status_label,
            created_at,
            updated_at,
        })
    }

    fn get(&self, id: &str) -> Result<Option<JobRecord>, TrackerError> {
        let conn = self.conn.lock().unwrap();

        let result = conn.query_row(
            "SELECT id, journal_id, created_by, submission_file_id, external_job_id, status_label, created_at, updated_at FROM job_records WHERE id = ?",
            params![id],
            Self::row_to_record,
        );

        match result {
            Ok(record) => Ok(Some(record)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(TrackerError::Database(e.to_string())),
        }
    }
}

impl JobTracker for SqliteJobTracker {
    fn register(
        &self,
        journal_id: &str,
        created_by: &str,
        submission_file_id: &str,
    ) -> Result<JobRecord, TrackerError> {
        let conn = self.conn.lock().unwrap();

        let id = uuid::Uuid::new_v4().to_string();
        let now = Utc::now();

        conn.execute(
            "INSERT INTO job_records (id, journal_id, created_by, submission_file_id, external_job_id, status_label, created_at, updated_at) VALUES (?, ?, ?, ?, NULL, ?, ?, ?)",
            params![
                id,
                journal_id,
                created_by,
                submission_file_id,
                "registered",
                now.to_rfc3339(),
                now.to_rfc3339(),
            ],
        )
        .map_err(|e| TrackerError::Database(e.to_string()))?;

        Ok(JobRecord {
            id,
            journal_id: journal_id.to_string(),
            created_by: created_by.to_string(),
            submission_file_id: submission_file_id.to_string(),
            external_job_id: None,
            status_label: "registered".to_string(),
            created_at: now,
            updated_at: now,
        })
    }

    fn bind_external_job(&self, id: &str, external_job_id: &str) -> Result<(), TrackerError> {
        let record = self
            .get(id)?
            .ok_or_else(|| TrackerError::NotFound(id.to_string()))?;

        if let Some(existing) = record.external_job_id {
            if existing == external_job_id {
                // Same binding, nothing to do.
                return Ok(());
            }
            return Err(TrackerError::AlreadyBound {
                id: id.to_string(),
                existing,
            });
        }

        let conn = self.conn.lock().unwrap();
        conn.execute(
            "UPDATE job_records SET external_job_id = ?, updated_at = ? WHERE id = ?",
            params![external_job_id, Utc::now().to_rfc3339(), id],
        )
        .map_err(|e| TrackerError::Database(e.to_string()))?;

        Ok(())
    }

    fn update_status(&self, id: &str, label: &str) -> Result<(), TrackerError> {
        let conn = self.conn.lock().unwrap();

        let updated = conn
            .execute(
                "UPDATE job_records SET status_label = ?, updated_at = ? WHERE id = ?",
                params![label, Utc::now().to_rfc3339(), id],
            )
            .map_err(|e| TrackerError::Database(e.to_string()))?;

        if updated == 0 {
            return Err(TrackerError::NotFound(id.to_string()));
        }
        Ok(())
    }

    fn lookup(&self, id: &str) -> Result<JobRecord, TrackerError> {
        self.get(id)?
            .ok_or_else(|| TrackerError::NotFound(id.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tracker() -> SqliteJobTracker {
        SqliteJobTracker::in_memory().unwrap()
    }

    #[test]
    fn test_register_and_lookup() {
        let tracker = tracker();
        let record = tracker.register("journal-1", "editor", "file-42").unwrap();

        assert_eq!(record.journal_id, "journal-1");
        assert_eq!(record.created_by, "editor");
        assert_eq!(record.submission_file_id, "file-42");
        assert!(record.external_job_id.is_none());
        assert_eq!(record.status_label, "registered");

        let loaded = tracker.lookup(&record.id).unwrap();
        assert_eq!(loaded.id, record.id);
        assert_eq!(loaded.submission_file_id, "file-42");
    }

    #[test]
    fn test_lookup_unknown_id() {
        let tracker = tracker();
        let result = tracker.lookup("nope");
        assert!(matches!(result, Err(TrackerError::NotFound(_))));
    }

    #[test]
    fn test_bind_external_job_once() {
        let tracker = tracker();
        let record = tracker.register("journal-1", "editor", "file-42").unwrap();

        tracker.bind_external_job(&record.id, "ots-9").unwrap();
        let loaded = tracker.lookup(&record.id).unwrap();
        assert_eq!(loaded.external_job_id, Some("ots-9".to_string()));
    }

    #[test]
    fn test_rebind_same_id_is_noop() {
        let tracker = tracker();
        let record = tracker.register("journal-1", "editor", "file-42").unwrap();

        tracker.bind_external_job(&record.id, "ots-9").unwrap();
        tracker.bind_external_job(&record.id, "ots-9").unwrap();

        let loaded = tracker.lookup(&record.id).unwrap();
        assert_eq!(loaded.external_job_id, Some("ots-9".to_string()));
    }

    #[test]
    fn test_rebind_different_id_fails() {
        let tracker = tracker();
        let record = tracker.register("journal-1", "editor", "file-42").unwrap();

        tracker.bind_external_job(&record.id, "ots-9").unwrap();
        let result = tracker.bind_external_job(&record.id, "ots-10");

        assert!(matches!(result, Err(TrackerError::AlreadyBound { .. })));
        // Original binding untouched.
        let loaded = tracker.lookup(&record.id).unwrap();
        assert_eq!(loaded.external_job_id, Some("ots-9".to_string()));
    }

    #[test]
    fn test_bind_unknown_record_fails() {
        let tracker = tracker();
        let result = tracker.bind_external_job("nope", "ots-9");
        assert!(matches!(result, Err(TrackerError::NotFound(_))));
    }

    #[test]
    fn test_update_status() {
        let tracker = tracker();
        let record = tracker.register("journal-1", "editor", "file-42").unwrap();

        tracker.update_status(&record.id, "processing").unwrap();
        tracker.update_status(&record.id, "completed").unwrap();

        let loaded = tracker.lookup(&record.id).unwrap();
        assert_eq!(loaded.status_label, "completed");
    }

    #[test]
    fn test_update_status_unknown_record() {
        let tracker = tracker();
        let result = tracker.update_status("nope", "processing");
        assert!(matches!(result, Err(TrackerError::NotFound(_))));
    }

    #[test]
    fn test_records_survive_reopen() {
        let tmp = tempfile::TempDir::new().unwrap();
        let db_path = tmp.path().join("tracker.db");

        let id = {
            let tracker = SqliteJobTracker::new(&db_path).unwrap();
            let record = tracker.register("journal-1", "editor", "file-42").unwrap();
            tracker.bind_external_job(&record.id, "ots-9").unwrap();
            record.id
        };

        let tracker = SqliteJobTracker::new(&db_path).unwrap();
        let loaded = tracker.lookup(&id).unwrap();
        assert_eq!(loaded.external_job_id, Some("ots-9".to_string()));
    }
}
