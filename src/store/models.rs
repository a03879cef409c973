use serde::{Deserialize, Serialize};

/// The condition that terminates a running session.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EndRule {
    #[default]
    Manual,
    Timer,
    Todo,
}

impl EndRule {
    pub fn as_str(&self) -> &'static str {
        match self {
            EndRule::Manual => "manual",
            EndRule::Timer => "timer",
            EndRule::Todo => "todo",
        }
    }

    pub fn from_str(s: &str) -> Self {
        match s {
            "timer" => EndRule::Timer,
            "todo" => EndRule::Todo,
            _ => EndRule::Manual,
        }
    }
}

/// Sound played when a session ends automatically.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EndSound {
    #[default]
    Default,
    None,
}

impl EndSound {
    pub fn as_str(&self) -> &'static str {
        match self {
            EndSound::Default => "default",
            EndSound::None => "none",
        }
    }

    pub fn from_str(s: &str) -> Self {
        match s {
            "none" => EndSound::None,
            _ => EndSound::Default,
        }
    }
}

/// One checklist entry attached to a session.
///
/// `id` is only unique within a single checklist's lifetime; it is a
/// creation-time token, not a database key. `editing` is transient UI
/// state but round-trips through the serialized blob, matching how
/// stored sessions keep it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TodoItem {
    pub id: u64,
    pub text: String,
    pub completed: bool,
    #[serde(default)]
    pub editing: bool,
}

/// A completed block of tracked time, as persisted in the `sessions` table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
    pub id: i64,
    pub title: String,
    pub description: String,
    pub notes: String,
    pub category: String,
    /// Tags are an ordered list in memory; the store joins them with
    /// ", " on write and splits on commas on read.
    pub tags: Vec<String>,
    /// Elapsed time as HH:MM:SS, hours unbounded.
    pub length: String,
    pub todos: Vec<TodoItem>,
    /// ISO-date-prefixed completion timestamp, e.g. "2026-08-24" or a
    /// full RFC 3339 instant. Used for day grouping and chronological sort.
    pub timestamp: String,
}

/// Everything needed to create or update one session row. The store
/// assigns the id on insert; a positive matching id means update.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SessionInput {
    pub id: Option<i64>,
    pub title: String,
    pub description: String,
    pub notes: String,
    pub category: String,
    pub tags: Vec<String>,
    pub length: String,
    pub todos: Vec<TodoItem>,
    pub timestamp: String,
}

impl From<Session> for SessionInput {
    fn from(s: Session) -> Self {
        SessionInput {
            id: Some(s.id),
            title: s.title,
            description: s.description,
            notes: s.notes,
            category: s.category,
            tags: s.tags,
            length: s.length,
            todos: s.todos,
            timestamp: s.timestamp,
        }
    }
}

/// Singleton user settings (row id = 1 in the `settings` table).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Settings {
    pub notifications: bool,
    pub session_end_sound: EndSound,
    /// Weekly tracked-time target, in hours. Must be >= 1.
    pub weekly_goal: i64,
    pub default_category: String,
    pub default_end_rule: EndRule,
}

impl Default for Settings {
    fn default() -> Self {
        Settings {
            notifications: true,
            session_end_sound: EndSound::Default,
            weekly_goal: 20,
            default_category: String::new(),
            default_end_rule: EndRule::Manual,
        }
    }
}

/// Join tags for storage and display.
pub fn join_tags(tags: &[String]) -> String {
    tags.join(", ")
}

/// Split a stored tags string back into the in-memory list.
/// Empty segments are dropped, surrounding whitespace trimmed.
pub fn split_tags(s: &str) -> Vec<String> {
    s.split(',')
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .map(str::to_string)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn end_rule_round_trip() {
        for rule in [EndRule::Manual, EndRule::Timer, EndRule::Todo] {
            assert_eq!(EndRule::from_str(rule.as_str()), rule);
        }
    }

    #[test]
    fn end_rule_unknown_defaults_to_manual() {
        assert_eq!(EndRule::from_str("nonsense"), EndRule::Manual);
        assert_eq!(EndRule::from_str(""), EndRule::Manual);
    }

    #[test]
    fn end_sound_round_trip() {
        for sound in [EndSound::Default, EndSound::None] {
            assert_eq!(EndSound::from_str(sound.as_str()), sound);
        }
        assert_eq!(EndSound::from_str("chime"), EndSound::Default);
    }

    #[test]
    fn tags_split_and_join() {
        let tags = split_tags("rust, sqlite,  , cli");
        assert_eq!(tags, vec!["rust", "sqlite", "cli"]);
        assert_eq!(join_tags(&tags), "rust, sqlite, cli");
    }

    #[test]
    fn tags_empty_string_is_empty_list() {
        assert!(split_tags("").is_empty());
        assert!(split_tags(" , ,").is_empty());
    }

    #[test]
    fn todo_item_editing_defaults_false_on_deserialize() {
        let item: TodoItem =
            serde_json::from_str(r#"{"id":1,"text":"read","completed":true}"#).unwrap();
        assert!(!item.editing);
        assert!(item.completed);
    }
}
