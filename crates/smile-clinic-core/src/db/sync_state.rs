//! Sync bookkeeping rows.

use rusqlite::{params, OptionalExtension};

use super::{Database, DbResult};

pub const LAST_PUSHED_HASH: &str = "last_pushed_hash";
pub const LAST_PUSH_AT: &str = "last_push_at";
pub const LAST_PULL_AT: &str = "last_pull_at";

impl Database {
    /// Get sync state value.
    pub fn get_sync_state(&self, key: &str) -> DbResult<Option<String>> {
        self.conn
            .query_row(
                "SELECT value FROM sync_state WHERE key = ?",
                [key],
                |row| row.get(0),
            )
            .optional()
            .map_err(Into::into)
    }

    /// Set sync state value.
    pub fn set_sync_state(&self, key: &str, value: &str) -> DbResult<()> {
        self.conn.execute(
            "INSERT OR REPLACE INTO sync_state (key, value, updated_at) VALUES (?, ?, datetime('now'))",
            params![key, value],
        )?;
        Ok(())
    }

    /// Record a successful push of the snapshot with the given hash.
    pub fn record_push(&self, content_hash: &str) -> DbResult<()> {
        self.set_sync_state(LAST_PUSHED_HASH, content_hash)?;
        self.set_sync_state(LAST_PUSH_AT, &chrono::Utc::now().to_rfc3339())
    }

    /// Record a successful pull.
    pub fn record_pull(&self) -> DbResult<()> {
        self.set_sync_state(LAST_PULL_AT, &chrono::Utc::now().to_rfc3339())
    }

    /// Hash of the last pushed snapshot, if any push has succeeded.
    pub fn last_pushed_hash(&self) -> DbResult<Option<String>> {
        let value = self.get_sync_state(LAST_PUSHED_HASH)?;
        Ok(value.filter(|s| !s.is_empty()))
    }

    /// Whether the given snapshot hash differs from the last pushed one.
    pub fn has_unsynced_changes(&self, current_hash: &str) -> DbResult<bool> {
        Ok(match self.last_pushed_hash()? {
            None => true, // Never pushed
            Some(last) => last != current_hash,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn setup_db() -> Database {
        Database::open_in_memory().unwrap()
    }

    #[test]
    fn test_sync_state_defaults() {
        let db = setup_db();

        assert_eq!(db.get_sync_state(LAST_PUSH_AT).unwrap(), Some("".to_string()));
        assert_eq!(db.last_pushed_hash().unwrap(), None);
    }

    #[test]
    fn test_record_push() {
        let db = setup_db();

        assert!(db.has_unsynced_changes("abc").unwrap());

        db.record_push("abc").unwrap();
        assert_eq!(db.last_pushed_hash().unwrap(), Some("abc".into()));
        assert!(!db.has_unsynced_changes("abc").unwrap());
        assert!(db.has_unsynced_changes("def").unwrap());

        let pushed_at = db.get_sync_state(LAST_PUSH_AT).unwrap().unwrap();
        assert!(!pushed_at.is_empty());
    }
}
