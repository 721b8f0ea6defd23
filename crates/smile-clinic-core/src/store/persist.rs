//! JSON load/save helpers over a [`KeyValueStore`].
//!
//! Read failures degrade to "absent" and write failures are logged; neither
//! is ever surfaced to the operator.

use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::db::{DbError, KeyValueStore};

/// Load and decode the document under `key`.
///
/// Returns `None` when the key is missing, unreadable, or holds malformed JSON.
pub(crate) fn load_json<S, T>(storage: &S, key: &str) -> Option<T>
where
    S: KeyValueStore + ?Sized,
    T: DeserializeOwned,
{
    let raw = match storage.get(key) {
        Ok(Some(raw)) => raw,
        Ok(None) => return None,
        Err(e) => {
            tracing::warn!(key, error = %e, "Failed to read stored collection, using default");
            return None;
        }
    };

    match serde_json::from_str(&raw) {
        Ok(value) => Some(value),
        Err(e) => {
            tracing::warn!(key, error = %e, "Malformed stored collection, using default");
            None
        }
    }
}

/// Load the document under `key`, falling back to `T::default()`.
pub(crate) fn load_or_default<S, T>(storage: &S, key: &str) -> T
where
    S: KeyValueStore + ?Sized,
    T: DeserializeOwned + Default,
{
    load_json(storage, key).unwrap_or_default()
}

/// Encode and write `value` under `key`.
pub(crate) fn save_json<S, T>(storage: &S, key: &str, value: &T)
where
    S: KeyValueStore + ?Sized,
    T: Serialize + ?Sized,
{
    let result = serde_json::to_string(value)
        .map_err(DbError::from)
        .and_then(|json| storage.set(key, &json));

    if let Err(e) = result {
        tracing::error!(key, error = %e, "Failed to persist collection");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::Database;

    #[test]
    fn test_missing_key_defaults() {
        let db = Database::open_in_memory().unwrap();
        let value: Vec<String> = load_or_default(&db, "nothing");
        assert!(value.is_empty());
    }

    #[test]
    fn test_malformed_json_defaults() {
        let db = Database::open_in_memory().unwrap();
        db.set_value("broken", "{not json").unwrap();

        let value: Vec<String> = load_or_default(&db, "broken");
        assert!(value.is_empty());
    }

    #[test]
    fn test_save_then_load() {
        let db = Database::open_in_memory().unwrap();
        save_json(&db, "ids", &vec!["a".to_string(), "b".to_string()]);

        let value: Vec<String> = load_or_default(&db, "ids");
        assert_eq!(value, vec!["a".to_string(), "b".to_string()]);
    }
}
