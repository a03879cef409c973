use chrono::{Local, NaiveDate};
use rusqlite::{OptionalExtension, params};

use super::Store;
use super::models::{
    EndRule, EndSound, Session, SessionInput, Settings, TodoItem, join_tags, split_tags,
};
use crate::error::{Error, Result};

/// Keep a timestamp only when it carries a valid ISO date prefix;
/// anything else becomes today's local date.
fn normalize_timestamp(timestamp: &str) -> String {
    let valid = timestamp
        .get(..10)
        .is_some_and(|prefix| NaiveDate::parse_from_str(prefix, "%Y-%m-%d").is_ok());
    if valid {
        timestamp.to_string()
    } else {
        Local::now().format("%Y-%m-%d").to_string()
    }
}

/// Parse a stored todos blob, falling back to an empty checklist on any
/// malformed JSON. A bad blob must never fail the whole load.
fn parse_todos(raw: Option<String>) -> Vec<TodoItem> {
    let Some(raw) = raw else {
        return Vec::new();
    };
    match serde_json::from_str(&raw) {
        Ok(todos) => todos,
        Err(e) => {
            tracing::warn!("failed to parse stored todos, substituting empty list: {}", e);
            Vec::new()
        }
    }
}

fn row_to_session(row: &rusqlite::Row<'_>) -> rusqlite::Result<(Session, Option<String>)> {
    let tags: Option<String> = row.get(5)?;
    let todos_raw: Option<String> = row.get(7)?;
    let session = Session {
        id: row.get(0)?,
        title: row.get::<_, Option<String>>(1)?.unwrap_or_default(),
        description: row.get::<_, Option<String>>(2)?.unwrap_or_default(),
        notes: row.get::<_, Option<String>>(3)?.unwrap_or_default(),
        category: row.get::<_, Option<String>>(4)?.unwrap_or_default(),
        tags: split_tags(tags.as_deref().unwrap_or("")),
        length: row.get::<_, Option<String>>(6)?.unwrap_or_default(),
        todos: Vec::new(),
        timestamp: row.get::<_, Option<String>>(8)?.unwrap_or_default(),
    };
    Ok((session, todos_raw))
}

const SESSION_COLUMNS: &str =
    "id, title, description, notes, category, tags, length, todos, timestamp";

impl Store {
    /// Upsert one session. A positive `id` matching an existing row
    /// updates that row in place; otherwise a new row is inserted (a
    /// supplied positive id that doesn't collide is kept, so exports
    /// re-import under their original ids). Returns the row id.
    pub fn save_session(&self, input: &SessionInput) -> Result<i64> {
        let todos_json = serde_json::to_string(&input.todos)?;
        let tags = join_tags(&input.tags);
        let timestamp = normalize_timestamp(&input.timestamp);

        if let Some(id) = input.id.filter(|id| *id > 0) {
            let existing: Option<i64> = self
                .conn
                .query_row("SELECT id FROM sessions WHERE id = ?1", params![id], |row| {
                    row.get(0)
                })
                .optional()?;
            if existing.is_some() {
                self.conn.execute(
                    "UPDATE sessions SET
                        title = ?1, description = ?2, notes = ?3, category = ?4,
                        tags = ?5, length = ?6, todos = ?7, timestamp = ?8
                     WHERE id = ?9",
                    params![
                        input.title,
                        input.description,
                        input.notes,
                        input.category,
                        tags,
                        input.length,
                        todos_json,
                        timestamp,
                        id
                    ],
                )?;
                return Ok(id);
            }
        }

        let supplied_id = input.id.filter(|id| *id > 0);
        self.conn.execute(
            "INSERT INTO sessions (id, title, description, notes, category, tags, length, todos, timestamp)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
            params![
                supplied_id,
                input.title,
                input.description,
                input.notes,
                input.category,
                tags,
                input.length,
                todos_json,
                timestamp
            ],
        )?;
        Ok(supplied_id.unwrap_or_else(|| self.conn.last_insert_rowid()))
    }

    /// All sessions, todos materialized from their stored blobs.
    pub fn list_sessions(&self) -> Result<Vec<Session>> {
        let mut stmt = self
            .conn
            .prepare(&format!("SELECT {SESSION_COLUMNS} FROM sessions"))?;
        let sessions = stmt
            .query_map([], |row| {
                let (mut session, todos_raw) = row_to_session(row)?;
                session.todos = parse_todos(todos_raw);
                Ok(session)
            })?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(sessions)
    }

    /// Delete one session. Deleting an id that doesn't exist is not an error.
    pub fn delete_session(&self, id: i64) -> Result<()> {
        self.conn
            .execute("DELETE FROM sessions WHERE id = ?1", params![id])?;
        Ok(())
    }

    pub fn delete_all_sessions(&self) -> Result<()> {
        self.conn.execute("DELETE FROM sessions", [])?;
        Ok(())
    }

    pub fn load_settings(&self) -> Result<Settings> {
        let settings = self.conn.query_row(
            "SELECT notifications, session_end_sound, weekly_goal, default_category, default_end_rule
             FROM settings WHERE id = 1",
            [],
            |row| {
                let notifications: i64 = row.get(0)?;
                let sound: String = row.get(1)?;
                let rule: String = row.get(4)?;
                Ok(Settings {
                    notifications: notifications != 0,
                    session_end_sound: EndSound::from_str(&sound),
                    weekly_goal: row.get(2)?,
                    default_category: row.get(3)?,
                    default_end_rule: EndRule::from_str(&rule),
                })
            },
        )?;
        Ok(settings)
    }

    /// Replace the settings singleton wholesale. There is no partial patch.
    pub fn save_settings(&self, settings: &Settings) -> Result<()> {
        if settings.weekly_goal < 1 {
            return Err(Error::Validation(format!(
                "weekly goal must be a positive number of hours, got {}",
                settings.weekly_goal
            )));
        }
        let updated = self.conn.execute(
            "UPDATE settings SET
                notifications = ?1,
                session_end_sound = ?2,
                weekly_goal = ?3,
                default_category = ?4,
                default_end_rule = ?5
             WHERE id = 1",
            params![
                i64::from(settings.notifications),
                settings.session_end_sound.as_str(),
                settings.weekly_goal,
                settings.default_category,
                settings.default_end_rule.as_str()
            ],
        )?;
        if updated == 0 {
            return Err(Error::Validation(
                "settings row missing; the store was never initialized".to_string(),
            ));
        }
        Ok(())
    }
}
