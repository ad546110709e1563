//! SQLite-backed case store.
//!
//! One connection behind a mutex; single-row reads and writes only, so the
//! database's own per-statement semantics are all the serialization needed.
//! Concurrent appends to one user's case list are last-write-wins.

use std::path::{Path, PathBuf};

use parking_lot::Mutex;
use rusqlite::{params, Connection, OptionalExtension};
use tracing::info;

use crate::schema::SCHEMA_SQL;
use crate::types::User;
use legalseg_core::{CaseRecord, Error, PredictionRecord, Result};

/// Persistence collaborator: users, their case lists, and flat prediction
/// records.
pub struct CaseStore {
    conn: Mutex<Connection>,
    db_path: PathBuf,
}

impl CaseStore {
    /// Open or create the store.
    ///
    /// `db_dir` is the directory (e.g., `data/casedb/`); the file will be
    /// `db_dir/legalseg.db`.
    pub fn open(db_dir: impl AsRef<Path>) -> Result<Self> {
        let db_dir = db_dir.as_ref();
        std::fs::create_dir_all(db_dir).map_err(|e| Error::Storage(e.to_string()))?;
        let db_path = db_dir.join("legalseg.db");

        let conn = Connection::open(&db_path).map_err(|e| Error::Database(e.to_string()))?;
        conn.execute_batch(
            "PRAGMA journal_mode = WAL;
             PRAGMA foreign_keys = ON;
             PRAGMA synchronous = NORMAL;",
        )
        .map_err(|e| Error::Database(e.to_string()))?;
        conn.execute_batch(SCHEMA_SQL)
            .map_err(|e| Error::Database(format!("Schema init failed: {}", e)))?;

        let store = Self {
            conn: Mutex::new(conn),
            db_path,
        };

        let user_count = store.count_users()?;
        let case_count = store.count_cases()?;
        info!(
            "CaseStore initialized: {} users, {} cases, path={}",
            user_count,
            case_count,
            store.db_path.display()
        );

        Ok(store)
    }

    // ---------------------------------------------------------------
    // Users
    // ---------------------------------------------------------------

    /// Provision a user. Returns the new record.
    pub fn create_user(&self, email: &str, name: &str) -> Result<User> {
        let user = User {
            id: uuid::Uuid::new_v4().to_string(),
            email: email.to_string(),
            name: name.to_string(),
            created_at: chrono::Utc::now().to_rfc3339(),
        };

        let conn = self.conn.lock();
        conn.prepare_cached(
            "INSERT INTO users (id, email, name, created_at) VALUES (?1, ?2, ?3, ?4)",
        )
        .map_err(|e| Error::Database(e.to_string()))?
        .execute(params![user.id, user.email, user.name, user.created_at])
        .map_err(|e| Error::Database(e.to_string()))?;

        Ok(user)
    }

    /// Look a user up by id or email.
    pub fn find_user_by_identity(&self, identity: &str) -> Result<Option<User>> {
        let conn = self.conn.lock();
        let row = conn
            .prepare_cached("SELECT * FROM users WHERE id = ?1 OR email = ?1")
            .map_err(|e| Error::Database(e.to_string()))?
            .query_row(params![identity], |row| Ok(Self::row_to_user(row)))
            .optional()
            .map_err(|e| Error::Database(e.to_string()))?;
        Ok(row)
    }

    pub fn count_users(&self) -> Result<i64> {
        self.count("SELECT COUNT(*) FROM users")
    }

    // ---------------------------------------------------------------
    // Cases
    // ---------------------------------------------------------------

    /// Append a case to a user's case list.
    pub fn append_case(&self, user_id: &str, case: &CaseRecord) -> Result<()> {
        let results_json =
            serde_json::to_string(&case.results).map_err(|e| Error::Storage(e.to_string()))?;

        let conn = self.conn.lock();
        conn.prepare_cached(
            "INSERT INTO cases (id, user_id, title, stored_filename, date, \
             sentence_count, status, results_json, created_at) \
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
        )
        .map_err(|e| Error::Database(e.to_string()))?
        .execute(params![
            case.id,
            user_id,
            case.title,
            case.stored_filename,
            case.date,
            case.sentence_count as i64,
            case.status,
            results_json,
            chrono::Utc::now().to_rfc3339(),
        ])
        .map_err(|e| Error::Database(e.to_string()))?;
        Ok(())
    }

    /// A user's case list, oldest first.
    pub fn cases_for_user(&self, user_id: &str) -> Result<Vec<CaseRecord>> {
        let conn = self.conn.lock();
        let mut stmt = conn
            .prepare_cached("SELECT * FROM cases WHERE user_id = ?1 ORDER BY created_at")
            .map_err(|e| Error::Database(e.to_string()))?;
        let rows = stmt
            .query_map(params![user_id], |row| Ok(Self::row_to_case(row)))
            .map_err(|e| Error::Database(e.to_string()))?;
        Ok(rows.filter_map(|r| r.ok()).flatten().collect())
    }

    pub fn count_cases(&self) -> Result<i64> {
        self.count("SELECT COUNT(*) FROM cases")
    }

    // ---------------------------------------------------------------
    // Predictions
    // ---------------------------------------------------------------

    /// Write the flat prediction record for one analysis.
    pub fn create_prediction(&self, user_id: &str, prediction: &PredictionRecord) -> Result<()> {
        let sentences_json =
            serde_json::to_string(&prediction.sentences).map_err(|e| Error::Storage(e.to_string()))?;

        let conn = self.conn.lock();
        conn.prepare_cached(
            "INSERT INTO predictions (id, user_id, source, sentence_count, \
             avg_confidence, sentences_json, created_at) \
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
        )
        .map_err(|e| Error::Database(e.to_string()))?
        .execute(params![
            prediction.id,
            user_id,
            prediction.source,
            prediction.sentence_count as i64,
            prediction.avg_confidence,
            sentences_json,
            prediction.created_at,
        ])
        .map_err(|e| Error::Database(e.to_string()))?;
        Ok(())
    }

    pub fn count_predictions(&self) -> Result<i64> {
        self.count("SELECT COUNT(*) FROM predictions")
    }

    // ---------------------------------------------------------------
    // Row Mapping Helpers
    // ---------------------------------------------------------------

    fn count(&self, sql: &str) -> Result<i64> {
        let conn = self.conn.lock();
        conn.query_row(sql, [], |row| row.get(0))
            .map_err(|e| Error::Database(e.to_string()))
    }

    fn row_to_user(row: &rusqlite::Row<'_>) -> User {
        User {
            id: row.get("id").unwrap_or_default(),
            email: row.get("email").unwrap_or_default(),
            name: row.get("name").unwrap_or_default(),
            created_at: row.get("created_at").unwrap_or_default(),
        }
    }

    fn row_to_case(row: &rusqlite::Row<'_>) -> Option<CaseRecord> {
        let results_json: String = row.get("results_json").ok()?;
        let results = serde_json::from_str(&results_json).ok()?;
        Some(CaseRecord {
            id: row.get("id").ok()?,
            title: row.get("title").ok()?,
            stored_filename: row.get("stored_filename").ok().flatten(),
            date: row.get("date").ok()?,
            sentence_count: row.get::<_, i64>("sentence_count").ok()? as usize,
            status: row.get("status").ok()?,
            results,
        })
    }
}
