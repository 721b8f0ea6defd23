//! On-device persistence for the clinic dataset.
//!
//! Each collection lives under its own key as one JSON document, so a
//! write to one collection never touches another.

mod kv;
mod schema;
mod sync_state;

pub use schema::*;
pub use sync_state::*;

use rusqlite::Connection;
use std::path::Path;
use thiserror::Error;

/// Storage key for the patient collection.
pub const PATIENTS_KEY: &str = "clinic_patients";
/// Storage key for the appointment collection.
pub const APPOINTMENTS_KEY: &str = "clinic_appointments";
/// Storage key for the message templates.
pub const TEMPLATES_KEY: &str = "clinic_templates";
/// Storage key for the clinic settings.
pub const SETTINGS_KEY: &str = "clinic_settings";
/// Storage key for the recall dedup set.
pub const RECALL_NOTIFIED_KEY: &str = "clinic_recall_notified";
/// Storage key for the birthday dedup set.
pub const BIRTHDAY_NOTIFIED_KEY: &str = "clinic_birthday_notified";

/// Database errors.
#[derive(Error, Debug)]
pub enum DbError {
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),
}

pub type DbResult<T> = Result<T, DbError>;

/// Durable string-keyed storage.
pub trait KeyValueStore {
    fn get(&self, key: &str) -> DbResult<Option<String>>;
    fn set(&self, key: &str, value: &str) -> DbResult<()>;
    fn remove(&self, key: &str) -> DbResult<()>;
}

/// Database connection wrapper.
pub struct Database {
    conn: Connection,
}

impl Database {
    /// Open database at path, creating if needed.
    pub fn open<P: AsRef<Path>>(path: P) -> DbResult<Self> {
        let conn = Connection::open(path)?;
        let db = Self { conn };
        db.initialize()?;
        Ok(db)
    }

    /// Create in-memory database (for testing).
    pub fn open_in_memory() -> DbResult<Self> {
        let conn = Connection::open_in_memory()?;
        let db = Self { conn };
        db.initialize()?;
        Ok(db)
    }

    /// Initialize schema.
    fn initialize(&self) -> DbResult<()> {
        self.conn.execute_batch(SCHEMA)?;
        Ok(())
    }

    /// Get raw connection (for advanced queries).
    pub fn conn(&self) -> &Connection {
        &self.conn
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_open_in_memory() {
        let db = Database::open_in_memory();
        assert!(db.is_ok());
    }

    #[test]
    fn test_schema_initialized() {
        let db = Database::open_in_memory().unwrap();

        // Check that tables exist
        let tables: Vec<String> = db
            .conn()
            .prepare("SELECT name FROM sqlite_master WHERE type='table' ORDER BY name")
            .unwrap()
            .query_map([], |row| row.get(0))
            .unwrap()
            .filter_map(|r| r.ok())
            .collect();

        assert!(tables.contains(&"kv_store".to_string()));
        assert!(tables.contains(&"sync_state".to_string()));
    }

    #[test]
    fn test_file_backed_survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("clinic.db");

        {
            let db = Database::open(&path).unwrap();
            db.set_value(PATIENTS_KEY, "[]").unwrap();
        }

        let db = Database::open(&path).unwrap();
        assert_eq!(db.get_value(PATIENTS_KEY).unwrap(), Some("[]".into()));
    }
}
