mod analytics;
mod config;
mod error;
mod history;
mod notify;
mod session;
mod store;
mod transfer;

use std::path::PathBuf;

use anyhow::{Context, Result, bail};
use chrono::Utc;
use clap::{Parser, Subcommand};

use crate::history::{HistoryView, SortDirection, SortKey};
use crate::notify::Notifier;
use crate::session::{ConfirmEdits, Engine, EndSummary, EndTrigger, TimeLimit};
use crate::store::{EndRule, EndSound, Settings, Store, split_tags};

#[derive(Parser)]
#[command(name = "stint", about = "Track timed sessions in a local journal")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Initialize the stint data directory
    Init,
    /// Start a new session
    Start {
        /// Session title
        #[arg(short, long, default_value = "")]
        title: String,
        /// Session description
        #[arg(short, long, default_value = "")]
        description: String,
        /// Free-form notes
        #[arg(short, long, default_value = "")]
        notes: String,
        /// Category (defaults to the configured default category)
        #[arg(short, long)]
        category: Option<String>,
        /// Comma-separated tags
        #[arg(long, default_value = "")]
        tags: String,
        /// End rule: manual, timer, or todo (defaults to the configured rule)
        #[arg(short, long)]
        rule: Option<String>,
        /// Timer duration hours (timer rule only)
        #[arg(long, default_value_t = 0)]
        hours: i64,
        /// Timer duration minutes (timer rule only)
        #[arg(long, default_value_t = 0)]
        minutes: i64,
        /// Timer duration seconds (timer rule only)
        #[arg(long, default_value_t = 0)]
        seconds: i64,
    },
    /// Show the in-progress session and drive timer/todo end checks
    Status,
    /// Stop the running session
    Stop,
    /// Change the end rule of the in-progress session
    Rule {
        /// New end rule: manual, timer, or todo
        rule: String,
    },
    /// Confirm and persist an ended session
    Confirm {
        /// Replace the title before saving
        #[arg(short, long)]
        title: Option<String>,
        /// Replace the description before saving
        #[arg(short, long)]
        description: Option<String>,
        /// Replace the notes before saving
        #[arg(short, long)]
        notes: Option<String>,
        /// Replace the category before saving
        #[arg(short, long)]
        category: Option<String>,
        /// Replace the tags before saving (comma-separated)
        #[arg(long)]
        tags: Option<String>,
    },
    /// Discard the in-progress or ended session without saving
    Discard,
    /// Manage the checklist of the in-progress session
    Todo {
        #[command(subcommand)]
        action: TodoAction,
    },
    /// List stored sessions with search and sort
    History {
        /// Case-insensitive search term matched against every column
        #[arg(short, long, default_value = "")]
        search: String,
        /// Sort key: id, date, length, title, category, tags
        #[arg(long, default_value = "date")]
        sort: String,
        /// Sort descending
        #[arg(long)]
        desc: bool,
    },
    /// Aggregate statistics over the journal
    Insights {
        /// Time range: week, month, or all
        #[arg(short, long, default_value = "week")]
        range: String,
    },
    /// Show or change settings
    Settings {
        #[command(subcommand)]
        action: SettingsAction,
    },
    /// Import sessions from a JSON file
    Import { path: PathBuf },
    /// Export all sessions to a JSON file
    Export { path: PathBuf },
    /// Delete one session by id
    Delete { id: i64 },
    /// Delete every stored session
    DeleteAll,
}

#[derive(Subcommand)]
enum TodoAction {
    /// Add a checklist item
    Add {
        /// Item text (committed immediately when given)
        text: Option<String>,
    },
    /// Toggle an item's completion state
    Done { id: u64 },
    /// Replace an item's text
    Edit { id: u64, text: String },
    /// Flip an item's editing mode without changing its text
    ToggleEdit { id: u64 },
    /// Remove an item
    Remove { id: u64 },
    /// Move an item immediately before another
    Reorder { id: u64, before: u64 },
    /// List checklist items
    List,
}

#[derive(Subcommand)]
enum SettingsAction {
    /// Print current settings
    Show,
    /// Update one or more settings fields
    Set {
        /// Enable or disable session-end notifications
        #[arg(long)]
        notifications: Option<bool>,
        /// Session end sound: default or none
        #[arg(long)]
        sound: Option<String>,
        /// Weekly tracked-time goal in hours
        #[arg(long)]
        weekly_goal: Option<i64>,
        /// Category pre-filled into new sessions
        #[arg(long)]
        default_category: Option<String>,
        /// End rule pre-selected for new sessions: manual, timer, todo
        #[arg(long)]
        default_end_rule: Option<String>,
    },
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Init => {
            open_store()?;
            println!("stint initialized at ~/.stint/");
            Ok(())
        }
        Commands::Start {
            title,
            description,
            notes,
            category,
            tags,
            rule,
            hours,
            minutes,
            seconds,
        } => {
            let store = open_store()?;
            let settings = store.load_settings()?;
            let mut engine = load_engine(&settings);
            if !engine.is_idle() {
                bail!("a session is already in progress; `stint status` to inspect it");
            }

            let draft = engine.draft_mut();
            draft.title = title;
            draft.description = description;
            draft.notes = notes;
            if let Some(category) = category {
                draft.category = category;
            }
            draft.tags = split_tags(&tags);
            if let Some(ref rule) = rule {
                draft.end_rule = EndRule::from_str(rule);
            }
            draft.time_limit = TimeLimit::new(hours, minutes, seconds);

            let ended = engine.start(Utc::now())?;
            persist_engine(&engine)?;
            if let Some(ref summary) = ended {
                end_side_effects(&settings, &engine, summary);
                println!(
                    "All items complete; session ended after {}; `stint confirm` to save",
                    summary.length
                );
                return Ok(());
            }
            match engine.draft().end_rule {
                EndRule::Timer => println!(
                    "Session started ({} remaining)",
                    session::format_hms(engine.draft().time_limit.total_seconds())
                ),
                rule => println!("Session started ({} end rule)", rule.as_str()),
            }
            Ok(())
        }
        Commands::Status => {
            let store = open_store()?;
            let settings = store.load_settings()?;
            let mut engine = load_engine(&settings);
            let now = Utc::now();

            // The timer is evaluated lazily: checking status is the tick.
            if let Some(summary) = engine.tick(now) {
                end_side_effects(&settings, &engine, &summary);
            }
            persist_engine(&engine)?;

            if engine.is_idle() {
                println!("No session in progress.");
                return Ok(());
            }
            print_status(&engine, now);
            Ok(())
        }
        Commands::Stop => {
            let store = open_store()?;
            let settings = store.load_settings()?;
            let mut engine = load_engine(&settings);
            let now = Utc::now();

            // A timer that already expired wins over the manual stop.
            let summary = engine.tick(now).or_else(|| engine.stop(now));
            let Some(summary) = summary else {
                bail!("no running session to stop");
            };
            end_side_effects(&settings, &engine, &summary);
            persist_engine(&engine)?;
            println!(
                "Session ended after {}; `stint confirm` to save or `stint discard` to drop it",
                summary.length
            );
            Ok(())
        }
        Commands::Rule { rule } => {
            let store = open_store()?;
            let settings = store.load_settings()?;
            let mut engine = load_engine(&settings);
            if engine.is_idle() {
                bail!("no session in progress");
            }
            let rule = EndRule::from_str(&rule);
            if rule == EndRule::Timer && engine.draft().time_limit.is_zero() {
                bail!("timer end rule requires a non-zero duration");
            }

            // Under the todo rule a fully complete checklist ends the
            // session as part of the switch.
            let summary = engine.set_end_rule(rule, Utc::now());
            if let Some(ref summary) = summary {
                end_side_effects(&settings, &engine, summary);
                println!(
                    "All items complete; session ended after {}; `stint confirm` to save",
                    summary.length
                );
            } else {
                println!("End rule set to {}", engine.draft().end_rule.as_str());
            }
            persist_engine(&engine)?;
            Ok(())
        }
        Commands::Confirm {
            title,
            description,
            notes,
            category,
            tags,
        } => {
            let store = open_store()?;
            let settings = store.load_settings()?;
            let mut engine = load_engine(&settings);
            let edits = ConfirmEdits {
                title,
                description,
                notes,
                category,
                tags: tags.as_deref().map(split_tags),
            };
            let id = engine.confirm(edits, &store)?;
            persist_engine(&engine)?;
            println!("Saved session #{id}");
            Ok(())
        }
        Commands::Discard => {
            let store = open_store()?;
            let settings = store.load_settings()?;
            let mut engine = load_engine(&settings);
            if engine.is_idle() {
                bail!("no session to discard");
            }
            engine.discard();
            persist_engine(&engine)?;
            println!("Session discarded");
            Ok(())
        }
        Commands::Todo { action } => {
            let store = open_store()?;
            let settings = store.load_settings()?;
            let mut engine = load_engine(&settings);
            let now = Utc::now();

            let fired = match action {
                TodoAction::Add { text } => {
                    let id = engine.todo_add();
                    if let Some(text) = text {
                        engine.todo_edit(id, &text);
                        engine.todo_commit_edit(id);
                    }
                    println!("Added item #{id}");
                    None
                }
                TodoAction::Done { id } => {
                    let summary = engine.todo_toggle_completed(id, now);
                    print_checklist(&engine);
                    summary
                }
                TodoAction::Edit { id, text } => {
                    engine.todo_edit(id, &text);
                    engine.todo_commit_edit(id);
                    None
                }
                TodoAction::ToggleEdit { id } => {
                    engine.todo_toggle_edit(id);
                    None
                }
                TodoAction::Remove { id } => {
                    let summary = engine.todo_remove(id, now);
                    print_checklist(&engine);
                    summary
                }
                TodoAction::Reorder { id, before } => {
                    engine.todo_reorder(id, before);
                    print_checklist(&engine);
                    None
                }
                TodoAction::List => {
                    print_checklist(&engine);
                    None
                }
            };

            if let Some(summary) = fired {
                end_side_effects(&settings, &engine, &summary);
                println!(
                    "All items complete; session ended after {}; `stint confirm` to save",
                    summary.length
                );
            }
            persist_engine(&engine)?;
            Ok(())
        }
        Commands::History { search, sort, desc } => {
            let store = open_store()?;
            let sessions = store.list_sessions()?;
            let mut view = HistoryView::new(SortKey::from_str(&sort), SortDirection::Asc);
            if desc {
                // Re-selecting the active key flips the direction.
                view.select(view.key);
            }
            tracing::debug!("history sorted by {} {:?}", view.key.as_str(), view.direction);

            let mut rows: Vec<_> = history::filter(&sessions, &search)
                .into_iter()
                .cloned()
                .collect();
            view.sort(&mut rows);

            if rows.is_empty() {
                println!("No sessions found");
                return Ok(());
            }
            for s in &rows {
                let date = s.timestamp.get(..10).unwrap_or(&s.timestamp);
                println!(
                    "  #{:<4} {}  {:>9}  {:<30} {}",
                    s.id, date, s.length, s.title, s.category
                );
            }
            Ok(())
        }
        Commands::Insights { range } => {
            let store = open_store()?;
            let settings = store.load_settings()?;
            let sessions = store.list_sessions()?;
            let range = analytics::TimeRange::from_str(&range);
            let stats =
                analytics::compute_stats(&sessions, range, settings.weekly_goal, Utc::now());

            println!("Insights ({}):", range.as_str());
            println!("  Total time:     {}", analytics::format_hm(stats.total_time));
            println!("  Sessions:       {}", stats.session_count);
            println!(
                "  Avg duration:   {}",
                analytics::format_hm(stats.avg_duration)
            );
            println!("  Active days:    {}", stats.active_days);
            println!(
                "  Top category:   {}",
                stats.top_category.as_deref().unwrap_or("None")
            );
            println!(
                "  Longest:        {}",
                analytics::format_hm(stats.longest_session)
            );
            println!(
                "  Shortest:       {}",
                analytics::format_hm(stats.shortest_session)
            );
            println!("  Streak:         {} days", stats.streak);
            println!("  Completion:     {:.1}%", stats.completion_rate);
            println!(
                "  Goal progress:  {:.1}% of {}h",
                stats.goal_progress, settings.weekly_goal
            );
            if let Some(trend) = stats.trend {
                let word = if trend >= 0.0 { "up" } else { "down" };
                println!(
                    "  Trend:          {:.1}% {} vs previous {}",
                    trend.abs(),
                    word,
                    range.as_str()
                );
            }
            if let Some(day) = stats.most_active_day {
                println!("  Most active:    {day}");
            }
            if !stats.top_categories.is_empty() {
                println!("  Top categories:");
                for (category, count) in &stats.top_categories {
                    println!("    {category}: {count} sessions");
                }
            }
            if !stats.category_distribution.is_empty() {
                println!("  All categories:");
                for (category, count) in &stats.category_distribution {
                    println!("    {category}: {count} sessions");
                }
            }
            println!("  Weekly activity:");
            let labels = ["Sun", "Mon", "Tue", "Wed", "Thu", "Fri", "Sat"];
            for (label, count) in labels.iter().zip(stats.weekly_activity) {
                println!("    {label}: {count}");
            }
            Ok(())
        }
        Commands::Settings { action } => {
            let store = open_store()?;
            match action {
                SettingsAction::Show => {
                    let s = store.load_settings()?;
                    println!("notifications:      {}", s.notifications);
                    println!("session_end_sound:  {}", s.session_end_sound.as_str());
                    println!("weekly_goal:        {}h", s.weekly_goal);
                    println!("default_category:   {}", s.default_category);
                    println!("default_end_rule:   {}", s.default_end_rule.as_str());
                }
                SettingsAction::Set {
                    notifications,
                    sound,
                    weekly_goal,
                    default_category,
                    default_end_rule,
                } => {
                    let mut settings = store.load_settings()?;
                    if let Some(notifications) = notifications {
                        settings.notifications = notifications;
                    }
                    if let Some(ref sound) = sound {
                        settings.session_end_sound = EndSound::from_str(sound);
                    }
                    if let Some(weekly_goal) = weekly_goal {
                        settings.weekly_goal = weekly_goal;
                    }
                    if let Some(default_category) = default_category {
                        settings.default_category = default_category;
                    }
                    if let Some(ref rule) = default_end_rule {
                        settings.default_end_rule = EndRule::from_str(rule);
                    }
                    store.save_settings(&settings)?;
                    println!("Settings saved");
                }
            }
            Ok(())
        }
        Commands::Import { path } => {
            let store = open_store()?;
            let sessions = transfer::import_sessions(&path, &store)
                .with_context(|| format!("failed to import {}", path.display()))?;
            println!("Imported; journal now holds {} sessions", sessions.len());
            Ok(())
        }
        Commands::Export { path } => {
            let store = open_store()?;
            let count = transfer::export_sessions(&path, &store)
                .with_context(|| format!("failed to export to {}", path.display()))?;
            println!("Exported {} sessions to {}", count, path.display());
            Ok(())
        }
        Commands::Delete { id } => {
            let store = open_store()?;
            store.delete_session(id)?;
            println!("Deleted session #{id}");
            Ok(())
        }
        Commands::DeleteAll => {
            let store = open_store()?;
            store.delete_all_sessions()?;
            println!("Deleted all sessions");
            Ok(())
        }
    }
}

fn open_store() -> Result<Store> {
    config::ensure_dirs()?;
    let store = Store::open()?;
    store.migrate()?;
    Ok(store)
}

/// Resume the persisted in-progress session, or start from a fresh idle
/// engine seeded with the user's defaults.
fn load_engine(settings: &Settings) -> Engine {
    config::draft_path()
        .ok()
        .and_then(|path| session::load_draft(&path))
        .unwrap_or_else(|| Engine::new(settings))
}

/// Keep the recoverable side-store in step with the engine: an idle
/// engine means no draft file.
fn persist_engine(engine: &Engine) -> Result<()> {
    let path = config::draft_path()?;
    if engine.is_idle() {
        session::clear_draft(&path)?;
    } else {
        session::save_draft(&path, engine)?;
    }
    Ok(())
}

/// Request the notification and end-sound side effects. Neither can
/// fail the transition; the notifier swallows spawn errors.
fn end_side_effects(settings: &Settings, engine: &Engine, summary: &EndSummary) {
    let notifier = match config::load() {
        Ok(cfg) => Notifier::new(cfg.notifications),
        Err(e) => {
            tracing::warn!("could not load config, using default notifier: {}", e);
            Notifier::new(config::NotificationConfig::default())
        }
    };
    notifier.session_ended(settings, &engine.draft().title);
    if summary.trigger == EndTrigger::Timer {
        notifier.play_end_sound(settings);
    }
}

fn print_status(engine: &Engine, now: chrono::DateTime<Utc>) {
    if engine.is_ended() {
        println!("Session ended, awaiting confirmation; `stint confirm` or `stint discard`");
        return;
    }
    let draft = engine.draft();
    let title = if draft.title.is_empty() {
        "Unnamed Session"
    } else {
        &draft.title
    };
    println!("Running: {title} ({} end rule)", draft.end_rule.as_str());
    if let Some(elapsed) = engine.elapsed(now) {
        println!("  Elapsed:   {}", session::format_hms(elapsed));
    }
    if let Some(remaining) = engine.remaining(now) {
        println!("  Remaining: {}", session::format_hms(remaining));
    }
    if !engine.checklist().is_empty() {
        print_checklist(engine);
    }
}

fn print_checklist(engine: &Engine) {
    if engine.checklist().is_empty() {
        println!("Checklist is empty");
        return;
    }
    for item in engine.checklist().items() {
        let mark = if item.completed { "x" } else { " " };
        let text = if item.text.is_empty() {
            "(empty)"
        } else {
            &item.text
        };
        println!("  [{mark}] #{} {}", item.id, text);
    }
}
