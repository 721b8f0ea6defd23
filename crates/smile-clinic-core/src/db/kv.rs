//! Key-value operations backing the collection store.

use rusqlite::{params, OptionalExtension};

use super::{Database, DbResult, KeyValueStore};

impl Database {
    /// Get the raw value stored under `key`.
    pub fn get_value(&self, key: &str) -> DbResult<Option<String>> {
        self.conn
            .query_row("SELECT value FROM kv_store WHERE key = ?", [key], |row| {
                row.get(0)
            })
            .optional()
            .map_err(Into::into)
    }

    /// Insert or replace the value stored under `key`.
    pub fn set_value(&self, key: &str, value: &str) -> DbResult<()> {
        self.conn.execute(
            "INSERT OR REPLACE INTO kv_store (key, value, updated_at) VALUES (?, ?, datetime('now'))",
            params![key, value],
        )?;
        Ok(())
    }

    /// Delete the value stored under `key`.
    pub fn remove_value(&self, key: &str) -> DbResult<bool> {
        let rows_affected = self
            .conn
            .execute("DELETE FROM kv_store WHERE key = ?", [key])?;
        Ok(rows_affected > 0)
    }
}

impl KeyValueStore for Database {
    fn get(&self, key: &str) -> DbResult<Option<String>> {
        self.get_value(key)
    }

    fn set(&self, key: &str, value: &str) -> DbResult<()> {
        self.set_value(key, value)
    }

    fn remove(&self, key: &str) -> DbResult<()> {
        self.remove_value(key).map(|_| ())
    }
}
