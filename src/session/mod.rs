mod checklist;

pub use checklist::Checklist;

use std::fs;
use std::path::Path;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::store::{EndRule, SessionInput, Settings, Store};

/// Configured duration for the timer end rule. Construction clamps
/// instead of rejecting, mirroring how the entry fields behave: hours can
/// never go negative, minutes and seconds stay within 0..=59.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeLimit {
    pub hours: i64,
    pub minutes: i64,
    pub seconds: i64,
}

impl TimeLimit {
    pub fn new(hours: i64, minutes: i64, seconds: i64) -> Self {
        TimeLimit {
            hours: hours.max(0),
            minutes: minutes.clamp(0, 59),
            seconds: seconds.clamp(0, 59),
        }
    }

    pub fn total_seconds(&self) -> i64 {
        self.hours * 3600 + self.minutes * 60 + self.seconds
    }

    pub fn is_zero(&self) -> bool {
        self.total_seconds() == 0
    }
}

/// Which end condition fired.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EndTrigger {
    Manual,
    Timer,
    Todo,
}

/// Returned when an end condition fires so the caller can request the
/// notification and end-sound side effects.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EndSummary {
    pub trigger: EndTrigger,
    pub length: String,
}

/// Form fields of the in-progress session. Editable in every state;
/// they only become a record at confirm time.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Draft {
    pub title: String,
    pub description: String,
    pub notes: String,
    pub category: String,
    pub tags: Vec<String>,
    pub end_rule: EndRule,
    pub time_limit: TimeLimit,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
enum State {
    Idle,
    Running {
        started_at: DateTime<Utc>,
    },
    Ended {
        trigger: EndTrigger,
        length: String,
        ended_at: DateTime<Utc>,
    },
}

/// Last-moment edits merged into the draft at confirm time.
#[derive(Debug, Clone, Default)]
pub struct ConfirmEdits {
    pub title: Option<String>,
    pub description: Option<String>,
    pub notes: Option<String>,
    pub category: Option<String>,
    pub tags: Option<Vec<String>>,
}

/// Session lifecycle state machine: Idle → Running → Ended → (Committed | Discarded).
///
/// The engine never reads a clock itself; every transition that depends
/// on time takes `now` from the caller. The whole engine serializes to
/// JSON so an in-progress session survives process exits (see
/// [`load_draft`] / [`save_draft`]).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Engine {
    state: State,
    draft: Draft,
    checklist: Checklist,
}

impl Engine {
    /// Fresh idle engine, draft seeded from the user's defaults.
    pub fn new(settings: &Settings) -> Self {
        Engine {
            state: State::Idle,
            draft: Draft {
                category: settings.default_category.clone(),
                end_rule: settings.default_end_rule,
                ..Draft::default()
            },
            checklist: Checklist::new(),
        }
    }

    pub fn is_idle(&self) -> bool {
        self.state == State::Idle
    }

    pub fn is_running(&self) -> bool {
        matches!(self.state, State::Running { .. })
    }

    pub fn is_ended(&self) -> bool {
        matches!(self.state, State::Ended { .. })
    }

    pub fn draft(&self) -> &Draft {
        &self.draft
    }

    pub fn draft_mut(&mut self) -> &mut Draft {
        &mut self.draft
    }

    pub fn checklist(&self) -> &Checklist {
        &self.checklist
    }

    /// Idle → Running. A timer session with a zero duration is rejected
    /// before any state changes. Under the todo rule the end condition is
    /// evaluated as part of the start, so a checklist that is already
    /// non-empty and fully complete ends the session immediately.
    pub fn start(&mut self, now: DateTime<Utc>) -> Result<Option<EndSummary>> {
        if !self.is_idle() {
            return Err(Error::Validation(
                "a session is already in progress".to_string(),
            ));
        }
        if self.draft.end_rule == EndRule::Timer && self.draft.time_limit.is_zero() {
            return Err(Error::InvalidConfig(
                "timer end rule requires a non-zero duration".to_string(),
            ));
        }
        self.state = State::Running { started_at: now };
        Ok(self.maybe_todo_end(now))
    }

    /// Seconds since start, while running.
    pub fn elapsed(&self, now: DateTime<Utc>) -> Option<i64> {
        match self.state {
            State::Running { started_at } => Some((now - started_at).num_seconds().max(0)),
            _ => None,
        }
    }

    /// Seconds left on the timer, clamped at zero. Only meaningful for a
    /// running timer session.
    pub fn remaining(&self, now: DateTime<Utc>) -> Option<i64> {
        if self.draft.end_rule != EndRule::Timer {
            return None;
        }
        self.elapsed(now)
            .map(|elapsed| (self.draft.time_limit.total_seconds() - elapsed).max(0))
    }

    /// One-second-resolution timer check. Ends the session when elapsed
    /// time has reached the configured duration; the recorded length is
    /// the full configured duration even when the tick observes a late
    /// `now`. No-op outside Running or for other end rules.
    pub fn tick(&mut self, now: DateTime<Utc>) -> Option<EndSummary> {
        if self.draft.end_rule != EndRule::Timer {
            return None;
        }
        let elapsed = self.elapsed(now)?;
        if elapsed >= self.draft.time_limit.total_seconds() {
            let length = format_hms(self.draft.time_limit.total_seconds());
            return Some(self.end(EndTrigger::Timer, length, now));
        }
        None
    }

    /// Explicit user stop. Works under every end rule while running.
    pub fn stop(&mut self, now: DateTime<Utc>) -> Option<EndSummary> {
        let elapsed = self.elapsed(now)?;
        Some(self.end(EndTrigger::Manual, format_hms(elapsed), now))
    }

    /// Switch the end rule. While running under the todo rule this can
    /// itself fire the end (the checklist may already be fully complete);
    /// an end that already fired is never cancelled.
    pub fn set_end_rule(&mut self, rule: EndRule, now: DateTime<Utc>) -> Option<EndSummary> {
        self.draft.end_rule = rule;
        self.maybe_todo_end(now)
    }

    // Checklist operations. Mutations that can change completion state
    // re-check the todo end condition, so the end fires within the same
    // call that satisfied it.

    pub fn todo_add(&mut self) -> u64 {
        self.checklist.add()
    }

    pub fn todo_edit(&mut self, id: u64, text: &str) {
        self.checklist.edit(id, text);
    }

    pub fn todo_commit_edit(&mut self, id: u64) {
        self.checklist.commit_edit(id);
    }

    pub fn todo_toggle_edit(&mut self, id: u64) {
        self.checklist.toggle_edit(id);
    }

    pub fn todo_toggle_completed(&mut self, id: u64, now: DateTime<Utc>) -> Option<EndSummary> {
        if !self.checklist.toggle_completed(id) {
            return None;
        }
        self.maybe_todo_end(now)
    }

    pub fn todo_remove(&mut self, id: u64, now: DateTime<Utc>) -> Option<EndSummary> {
        self.checklist.remove(id);
        self.maybe_todo_end(now)
    }

    pub fn todo_reorder(&mut self, moved_id: u64, before_id: u64) {
        self.checklist.reorder(moved_id, before_id);
    }

    fn maybe_todo_end(&mut self, now: DateTime<Utc>) -> Option<EndSummary> {
        if !self.is_running()
            || self.draft.end_rule != EndRule::Todo
            || !self.checklist.all_complete()
        {
            return None;
        }
        let elapsed = self.elapsed(now)?;
        Some(self.end(EndTrigger::Todo, format_hms(elapsed), now))
    }

    fn end(&mut self, trigger: EndTrigger, length: String, now: DateTime<Utc>) -> EndSummary {
        self.state = State::Ended {
            trigger,
            length: length.clone(),
            ended_at: now,
        };
        EndSummary { trigger, length }
    }

    /// Ended → Committed: merge last-moment edits, normalize blank title
    /// and category, persist through the store, then re-arm to Idle.
    /// On a store failure the engine stays Ended so the user can retry.
    pub fn confirm(&mut self, edits: ConfirmEdits, store: &Store) -> Result<i64> {
        let State::Ended {
            ref length,
            ended_at,
            ..
        } = self.state
        else {
            return Err(Error::Validation(
                "no ended session awaiting confirmation".to_string(),
            ));
        };

        let title = edits.title.unwrap_or_else(|| self.draft.title.clone());
        let category = edits
            .category
            .unwrap_or_else(|| self.draft.category.clone());
        let input = SessionInput {
            id: None,
            title: if title.trim().is_empty() {
                "Unnamed Session".to_string()
            } else {
                title
            },
            description: edits
                .description
                .unwrap_or_else(|| self.draft.description.clone()),
            notes: edits.notes.unwrap_or_else(|| self.draft.notes.clone()),
            category: if category.trim().is_empty() {
                "Uncategorized".to_string()
            } else {
                category
            },
            tags: edits.tags.unwrap_or_else(|| self.draft.tags.clone()),
            length: length.clone(),
            todos: self.checklist.to_items(),
            timestamp: ended_at.to_rfc3339(),
        };

        let id = store.save_session(&input)?;
        self.rearm();
        Ok(id)
    }

    /// Drop the in-progress or ended session without persisting anything.
    pub fn discard(&mut self) {
        self.rearm();
    }

    fn rearm(&mut self) {
        self.state = State::Idle;
        self.draft.title.clear();
        self.draft.description.clear();
        self.draft.notes.clear();
        self.draft.category.clear();
        self.draft.tags.clear();
        self.checklist = Checklist::new();
    }
}

/// Format whole seconds as HH:MM:SS with unbounded hours.
pub fn format_hms(total_seconds: i64) -> String {
    let total = total_seconds.max(0);
    let hours = total / 3600;
    let minutes = (total % 3600) / 60;
    let seconds = total % 60;
    format!("{hours:02}:{minutes:02}:{seconds:02}")
}

// Recoverable draft side-store.
//
// The in-progress session is explicit serializable state, not ambient
// globals: the CLI writes it after every mutation and reloads it on the
// next invocation, so crash/restart behavior is a design decision.

/// Load a previously saved engine. A missing file means no session in
/// progress; an unreadable draft is discarded with a warning rather than
/// blocking the user.
pub fn load_draft(path: &Path) -> Option<Engine> {
    let content = fs::read_to_string(path).ok()?;
    match serde_json::from_str(&content) {
        Ok(engine) => Some(engine),
        Err(e) => {
            tracing::warn!("discarding unreadable session draft: {}", e);
            None
        }
    }
}

pub fn save_draft(path: &Path, engine: &Engine) -> Result<()> {
    let json = serde_json::to_string_pretty(engine)?;
    fs::write(path, json)?;
    Ok(())
}

pub fn clear_draft(path: &Path) -> Result<()> {
    if path.exists() {
        fs::remove_file(path)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn t(secs: i64) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 8, 20, 9, 0, 0).unwrap() + chrono::Duration::seconds(secs)
    }

    fn timer_engine(hours: i64, minutes: i64, seconds: i64) -> Engine {
        let mut engine = Engine::new(&Settings::default());
        engine.draft_mut().end_rule = EndRule::Timer;
        engine.draft_mut().time_limit = TimeLimit::new(hours, minutes, seconds);
        engine
    }

    #[test]
    fn time_limit_clamps_minutes_and_seconds() {
        let limit = TimeLimit::new(-3, 75, 200);
        assert_eq!(limit.hours, 0);
        assert_eq!(limit.minutes, 59);
        assert_eq!(limit.seconds, 59);

        let big = TimeLimit::new(100, 0, 0);
        assert_eq!(big.hours, 100);
        assert_eq!(big.total_seconds(), 360_000);
    }

    #[test]
    fn start_requires_non_zero_timer_duration() {
        let mut engine = timer_engine(0, 0, 0);
        let err = engine.start(t(0)).unwrap_err();
        assert!(matches!(err, Error::InvalidConfig(_)));
        assert!(engine.is_idle());
    }

    #[test]
    fn start_twice_is_rejected() {
        let mut engine = Engine::new(&Settings::default());
        engine.start(t(0)).unwrap();
        assert!(engine.start(t(1)).is_err());
        assert!(engine.is_running());
    }

    #[test]
    fn new_engine_picks_up_settings_defaults() {
        let settings = Settings {
            default_category: "Study".to_string(),
            default_end_rule: EndRule::Todo,
            ..Settings::default()
        };
        let engine = Engine::new(&settings);
        assert_eq!(engine.draft().category, "Study");
        assert_eq!(engine.draft().end_rule, EndRule::Todo);
    }

    #[test]
    fn manual_stop_records_wall_clock_length() {
        let mut engine = Engine::new(&Settings::default());
        engine.start(t(0)).unwrap();
        let summary = engine.stop(t(3723)).unwrap();
        assert_eq!(summary.trigger, EndTrigger::Manual);
        assert_eq!(summary.length, "01:02:03");
        assert!(engine.is_ended());
    }

    #[test]
    fn timer_end_uses_configured_duration_even_on_late_tick() {
        let mut engine = timer_engine(0, 25, 0);
        engine.start(t(0)).unwrap();
        assert!(engine.tick(t(1499)).is_none());
        // Tick arrives 7 seconds late; recorded length is still 25:00.
        let summary = engine.tick(t(1507)).unwrap();
        assert_eq!(summary.trigger, EndTrigger::Timer);
        assert_eq!(summary.length, "00:25:00");
    }

    #[test]
    fn remaining_counts_down_and_clamps_at_zero() {
        let mut engine = timer_engine(0, 0, 30);
        engine.start(t(0)).unwrap();
        assert_eq!(engine.remaining(t(10)), Some(20));
        assert_eq!(engine.remaining(t(90)), Some(0));
    }

    #[test]
    fn start_under_todo_rule_with_complete_checklist_ends_immediately() {
        let mut engine = Engine::new(&Settings::default());
        engine.draft_mut().end_rule = EndRule::Todo;
        let id = engine.todo_add();
        engine.todo_edit(id, "prep");
        engine.todo_commit_edit(id);
        // Completing while idle does not fire anything.
        assert!(engine.todo_toggle_completed(id, t(0)).is_none());
        assert!(engine.is_idle());

        let summary = engine.start(t(0)).unwrap().unwrap();
        assert_eq!(summary.trigger, EndTrigger::Todo);
        assert_eq!(summary.length, "00:00:00");
        assert!(engine.is_ended());
    }

    #[test]
    fn todo_end_fires_when_last_item_completes() {
        let mut engine = Engine::new(&Settings::default());
        engine.draft_mut().end_rule = EndRule::Todo;
        let first = engine.todo_add();
        let second = engine.todo_add();
        engine.todo_commit_edit(first);
        engine.todo_commit_edit(second);
        engine.start(t(0)).unwrap();

        assert!(engine.todo_toggle_completed(first, t(10)).is_none());
        let summary = engine.todo_toggle_completed(second, t(20)).unwrap();
        assert_eq!(summary.trigger, EndTrigger::Todo);
        assert_eq!(summary.length, "00:00:20");
        assert!(engine.is_ended());
    }

    #[test]
    fn toggling_back_does_not_unend_a_fired_session() {
        let mut engine = Engine::new(&Settings::default());
        engine.draft_mut().end_rule = EndRule::Todo;
        let id = engine.todo_add();
        engine.start(t(0)).unwrap();
        engine.todo_toggle_completed(id, t(5)).unwrap();
        assert!(engine.is_ended());

        // Un-completing after the end fired changes nothing.
        assert!(engine.todo_toggle_completed(id, t(6)).is_none());
        assert!(engine.is_ended());
    }

    #[test]
    fn empty_checklist_never_fires_todo_end() {
        let mut engine = Engine::new(&Settings::default());
        engine.draft_mut().end_rule = EndRule::Todo;
        engine.start(t(0)).unwrap();
        let id = engine.todo_add();
        assert!(engine.todo_remove(id, t(5)).is_none());
        assert!(engine.is_running());
    }

    #[test]
    fn switching_rule_to_todo_with_complete_list_ends_immediately() {
        let mut engine = Engine::new(&Settings::default());
        let id = engine.todo_add();
        engine.start(t(0)).unwrap();
        engine.todo_toggle_completed(id, t(3));
        assert!(engine.is_running());

        let summary = engine.set_end_rule(EndRule::Todo, t(8)).unwrap();
        assert_eq!(summary.trigger, EndTrigger::Todo);
    }

    #[test]
    fn tick_is_deaf_after_end() {
        let mut engine = timer_engine(0, 0, 10);
        engine.start(t(0)).unwrap();
        engine.tick(t(10)).unwrap();
        assert!(engine.tick(t(20)).is_none());
        assert!(engine.stop(t(20)).is_none());
    }

    #[test]
    fn confirm_defaults_blank_title_and_category() {
        let store = Store::open_in_memory().unwrap();
        let mut engine = Engine::new(&Settings::default());
        engine.start(t(0)).unwrap();
        engine.stop(t(60));

        let id = engine.confirm(ConfirmEdits::default(), &store).unwrap();
        let sessions = store.list_sessions().unwrap();
        assert_eq!(sessions[0].id, id);
        assert_eq!(sessions[0].title, "Unnamed Session");
        assert_eq!(sessions[0].category, "Uncategorized");
        assert_eq!(sessions[0].length, "00:01:00");
        assert!(engine.is_idle());
    }

    #[test]
    fn confirm_merges_last_moment_edits() {
        let store = Store::open_in_memory().unwrap();
        let mut engine = Engine::new(&Settings::default());
        engine.draft_mut().title = "Draft title".to_string();
        engine.start(t(0)).unwrap();
        engine.stop(t(30));

        let edits = ConfirmEdits {
            title: Some("Final title".to_string()),
            tags: Some(vec!["focus".to_string()]),
            ..ConfirmEdits::default()
        };
        engine.confirm(edits, &store).unwrap();
        let s = &store.list_sessions().unwrap()[0];
        assert_eq!(s.title, "Final title");
        assert_eq!(s.tags, vec!["focus"]);
    }

    #[test]
    fn confirm_persists_checklist_and_timestamp() {
        let store = Store::open_in_memory().unwrap();
        let mut engine = Engine::new(&Settings::default());
        let id = engine.todo_add();
        engine.todo_edit(id, "outline");
        engine.todo_commit_edit(id);
        engine.start(t(0)).unwrap();
        engine.stop(t(90));
        engine.confirm(ConfirmEdits::default(), &store).unwrap();

        let s = &store.list_sessions().unwrap()[0];
        assert_eq!(s.todos.len(), 1);
        assert_eq!(s.todos[0].text, "outline");
        assert!(s.timestamp.starts_with("2026-08-20"));
    }

    #[test]
    fn confirm_failure_leaves_engine_ended_for_retry() {
        let store = Store::open_in_memory().unwrap();
        store.conn.execute("DROP TABLE sessions", []).unwrap();

        let mut engine = Engine::new(&Settings::default());
        engine.start(t(0)).unwrap();
        engine.stop(t(10));

        assert!(engine.confirm(ConfirmEdits::default(), &store).is_err());
        assert!(engine.is_ended());

        store.migrate().unwrap();
        engine.confirm(ConfirmEdits::default(), &store).unwrap();
        assert!(engine.is_idle());
    }

    #[test]
    fn confirm_without_ended_session_is_rejected() {
        let store = Store::open_in_memory().unwrap();
        let mut engine = Engine::new(&Settings::default());
        assert!(engine.confirm(ConfirmEdits::default(), &store).is_err());
    }

    #[test]
    fn discard_aborts_a_running_session() {
        let mut engine = Engine::new(&Settings::default());
        engine.draft_mut().title = "throwaway".to_string();
        engine.todo_add();
        engine.start(t(0)).unwrap();
        engine.discard();
        assert!(engine.is_idle());
        assert_eq!(engine.draft().title, "");
        assert!(engine.checklist().is_empty());
    }

    #[test]
    fn format_hms_pads_and_handles_large_hours() {
        assert_eq!(format_hms(0), "00:00:00");
        assert_eq!(format_hms(59), "00:00:59");
        assert_eq!(format_hms(3600), "01:00:00");
        assert_eq!(format_hms(360_000), "100:00:00");
        assert_eq!(format_hms(-5), "00:00:00");
    }

    #[test]
    fn draft_round_trips_through_the_side_store() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("draft.json");

        let mut engine = timer_engine(1, 0, 0);
        engine.draft_mut().title = "resumable".to_string();
        engine.start(t(0)).unwrap();
        save_draft(&path, &engine).unwrap();

        let mut restored = load_draft(&path).unwrap();
        assert!(restored.is_running());
        assert_eq!(restored.draft().title, "resumable");
        assert_eq!(restored.remaining(t(600)), Some(3000));

        clear_draft(&path).unwrap();
        assert!(load_draft(&path).is_none());
    }

    #[test]
    fn corrupt_draft_is_discarded() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("draft.json");
        fs::write(&path, "{ not json").unwrap();
        assert!(load_draft(&path).is_none());
    }
}
