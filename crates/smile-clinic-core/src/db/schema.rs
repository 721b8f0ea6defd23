//! SQLite schema definition.

/// Complete database schema for the on-device store.
pub const SCHEMA: &str = r#"
-- ============================================================================
-- Collections (one JSON document per key)
-- ============================================================================

CREATE TABLE IF NOT EXISTS kv_store (
    key TEXT PRIMARY KEY,
    value TEXT NOT NULL,                         -- JSON serialization of one collection
    updated_at TEXT NOT NULL DEFAULT (datetime('now'))
);

-- ============================================================================
-- Sync State
-- ============================================================================

CREATE TABLE IF NOT EXISTS sync_state (
    key TEXT PRIMARY KEY,
    value TEXT NOT NULL,
    updated_at TEXT NOT NULL DEFAULT (datetime('now'))
);

-- Track the last successful push
INSERT OR IGNORE INTO sync_state (key, value) VALUES ('last_pushed_hash', '');
INSERT OR IGNORE INTO sync_state (key, value) VALUES ('last_push_at', '');
INSERT OR IGNORE INTO sync_state (key, value) VALUES ('last_pull_at', '');
"#;
