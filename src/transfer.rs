use std::fs;
use std::path::Path;

use serde_json::Value;

use crate::error::{Error, Result};
use crate::store::{Session, SessionInput, Store, TodoItem, split_tags};

/// Import a JSON array of sessions. Each entry is validated and
/// defaulted rather than rejected: a missing title becomes "Untitled",
/// a non-array todos field becomes an empty checklist, tags are
/// accepted as either a string or an array, and a malformed timestamp
/// falls back to today inside the store. Every entry is persisted
/// through the normal upsert; the refreshed collection is returned.
pub fn import_sessions(path: &Path, store: &Store) -> Result<Vec<Session>> {
    let content = fs::read_to_string(path)?;
    let value: Value = serde_json::from_str(&content)
        .map_err(|e| Error::Parse(format!("invalid JSON in {}: {e}", path.display())))?;
    let Value::Array(entries) = value else {
        return Err(Error::Parse(format!(
            "expected a JSON array of sessions in {}",
            path.display()
        )));
    };

    for entry in &entries {
        store.save_session(&sanitize_entry(entry))?;
    }
    store.list_sessions()
}

/// Write the full collection as pretty-printed JSON.
pub fn export_sessions(path: &Path, store: &Store) -> Result<usize> {
    let sessions = store.list_sessions()?;
    let json = serde_json::to_string_pretty(&sessions)?;
    fs::write(path, json)?;
    Ok(sessions.len())
}

fn sanitize_entry(entry: &Value) -> SessionInput {
    let str_field = |key: &str| -> String {
        entry
            .get(key)
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string()
    };

    let title = str_field("title");
    let tags = match entry.get("tags") {
        Some(Value::String(s)) => split_tags(s),
        Some(Value::Array(items)) => items
            .iter()
            .filter_map(Value::as_str)
            .map(str::to_string)
            .collect(),
        _ => Vec::new(),
    };
    let todos: Vec<TodoItem> = match entry.get("todos") {
        Some(value @ Value::Array(_)) => {
            serde_json::from_value(value.clone()).unwrap_or_default()
        }
        _ => Vec::new(),
    };

    SessionInput {
        id: entry.get("id").and_then(Value::as_i64),
        title: if title.trim().is_empty() {
            "Untitled".to_string()
        } else {
            title
        },
        description: str_field("description"),
        notes: str_field("notes"),
        category: str_field("category"),
        tags,
        length: str_field("length"),
        todos,
        // The store normalizes malformed timestamps to today.
        timestamp: str_field("timestamp"),
    }
}
