use chrono::{DateTime, Datelike, NaiveDate, TimeZone, Utc, Weekday};

use crate::store::Session;

/// Window of sessions the stats are computed over, measured back from
/// the `now` passed to [`compute_stats`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum TimeRange {
    #[default]
    Week,
    Month,
    All,
}

impl TimeRange {
    pub fn as_str(&self) -> &'static str {
        match self {
            TimeRange::Week => "week",
            TimeRange::Month => "month",
            TimeRange::All => "all",
        }
    }

    pub fn from_str(s: &str) -> Self {
        match s {
            "month" => TimeRange::Month,
            "all" => TimeRange::All,
            _ => TimeRange::Week,
        }
    }

    fn days(&self) -> Option<i64> {
        match self {
            TimeRange::Week => Some(7),
            TimeRange::Month => Some(30),
            TimeRange::All => None,
        }
    }
}

/// Aggregate statistics over a (possibly windowed) session collection.
/// All durations are in whole seconds.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Stats {
    pub total_time: i64,
    pub session_count: usize,
    pub avg_duration: i64,
    pub active_days: usize,
    pub top_category: Option<String>,
    /// Top three categories by session count, ties kept in
    /// first-encountered order.
    pub top_categories: Vec<(String, usize)>,
    pub longest_session: i64,
    pub shortest_session: i64,
    /// Longest run of consecutive calendar days with at least one session.
    pub streak: usize,
    /// Percentage of the weekly goal covered by `total_time`, capped at 100.
    pub goal_progress: f64,
    /// Sessions per session-per-active-day pace, as a percentage of two
    /// sessions a day.
    pub completion_rate: f64,
    /// Session counts per weekday, index 0 = Sunday.
    pub weekly_activity: [u32; 7],
    /// Full category → count map, insertion-ordered for charting.
    pub category_distribution: Vec<(String, usize)>,
    /// Weekday with the most sessions, if any.
    pub most_active_day: Option<Weekday>,
    /// Percent change of this window's total time against the preceding
    /// window of equal width. `None` for the all-time range or when the
    /// preceding window has no tracked time.
    pub trend: Option<f64>,
}

/// Parse an HH:MM:SS length into seconds. Each malformed segment counts
/// as zero, so "01:xx:30" still yields 3630.
pub fn parse_length(length: &str) -> i64 {
    let mut parts = length.split(':');
    let hours = next_segment(&mut parts);
    let minutes = next_segment(&mut parts);
    let seconds = next_segment(&mut parts);
    hours * 3600 + minutes * 60 + seconds
}

fn next_segment(parts: &mut std::str::Split<'_, char>) -> i64 {
    parts
        .next()
        .and_then(|p| p.trim().parse::<i64>().ok())
        .unwrap_or(0)
}

/// Best-effort timestamp parse: a full RFC 3339 instant, or midnight of
/// a bare ISO date prefix. Sessions with unusable timestamps fall out of
/// windowed ranges but still count toward all-time totals.
fn parse_timestamp(timestamp: &str) -> Option<DateTime<Utc>> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(timestamp) {
        return Some(dt.with_timezone(&Utc));
    }
    let date = NaiveDate::parse_from_str(timestamp.get(..10)?, "%Y-%m-%d").ok()?;
    Utc.from_local_datetime(&date.and_hms_opt(0, 0, 0)?).single()
}

fn session_date(session: &Session) -> Option<NaiveDate> {
    parse_timestamp(&session.timestamp).map(|dt| dt.date_naive())
}

fn in_window(session: &Session, now: DateTime<Utc>, newer_than: f64, up_to: f64) -> bool {
    let Some(ts) = parse_timestamp(&session.timestamp) else {
        return false;
    };
    let age_days = (now - ts).num_seconds() as f64 / 86_400.0;
    age_days > newer_than && age_days <= up_to
}

fn total_seconds<'a>(sessions: impl Iterator<Item = &'a Session>) -> i64 {
    sessions.map(|s| parse_length(&s.length)).sum()
}

/// Longest run of consecutive calendar days among the given dates.
fn longest_streak(mut dates: Vec<NaiveDate>) -> usize {
    dates.sort_unstable();
    dates.dedup();
    let mut best = 0usize;
    let mut run = 0usize;
    let mut prev: Option<NaiveDate> = None;
    for date in dates {
        run = match prev {
            Some(p) if (date - p).num_days() == 1 => run + 1,
            _ => 1,
        };
        best = best.max(run);
        prev = Some(date);
    }
    best
}

/// Pure aggregation over the session collection. Deterministic for a
/// given `now`; the only clock read happens at the call site.
pub fn compute_stats(
    sessions: &[Session],
    range: TimeRange,
    weekly_goal_hours: i64,
    now: DateTime<Utc>,
) -> Stats {
    let filtered: Vec<&Session> = match range.days() {
        Some(days) => sessions
            .iter()
            .filter(|s| in_window(s, now, f64::NEG_INFINITY, days as f64))
            .collect(),
        None => sessions.iter().collect(),
    };

    if filtered.is_empty() {
        return Stats::default();
    }

    let total_time = total_seconds(filtered.iter().copied());
    let session_count = filtered.len();
    let avg_duration = total_time / session_count as i64;

    let dates: Vec<NaiveDate> = filtered.iter().copied().filter_map(session_date).collect();
    let active_days = {
        let mut unique = dates.clone();
        unique.sort_unstable();
        unique.dedup();
        unique.len()
    };

    // Category frequencies in first-encountered order; ties stay stable.
    let mut category_distribution: Vec<(String, usize)> = Vec::new();
    for session in &filtered {
        match category_distribution
            .iter_mut()
            .find(|(cat, _)| *cat == session.category)
        {
            Some((_, count)) => *count += 1,
            None => category_distribution.push((session.category.clone(), 1)),
        }
    }
    let mut ranked = category_distribution.clone();
    ranked.sort_by(|a, b| b.1.cmp(&a.1));
    let top_category = ranked.first().map(|(cat, _)| cat.clone());
    let top_categories: Vec<(String, usize)> = ranked.into_iter().take(3).collect();

    let durations: Vec<i64> = filtered.iter().map(|s| parse_length(&s.length)).collect();
    let longest_session = durations.iter().copied().max().unwrap_or(0);
    let shortest_session = durations.iter().copied().min().unwrap_or(0);

    let streak = longest_streak(dates);

    let goal_progress = if weekly_goal_hours > 0 {
        (total_time as f64 / (weekly_goal_hours as f64 * 3600.0) * 100.0).min(100.0)
    } else {
        0.0
    };

    let completion_rate = if active_days > 0 {
        session_count as f64 / (active_days as f64 * 2.0) * 100.0
    } else {
        0.0
    };

    let mut weekly_activity = [0u32; 7];
    for session in &filtered {
        if let Some(ts) = parse_timestamp(&session.timestamp) {
            weekly_activity[ts.weekday().num_days_from_sunday() as usize] += 1;
        }
    }
    // Earliest weekday wins a tie, scanning Sunday first.
    let mut most_active_day = None;
    let mut most_active_count = 0u32;
    for (day, &count) in weekly_activity.iter().enumerate() {
        if count > most_active_count {
            most_active_count = count;
            most_active_day = Some(weekday_from_sunday_index(day));
        }
    }

    let trend = range.days().and_then(|days| {
        let previous_total = total_seconds(
            sessions
                .iter()
                .filter(|s| in_window(s, now, days as f64, (days * 2) as f64)),
        );
        if previous_total == 0 {
            return None;
        }
        Some((total_time - previous_total) as f64 / previous_total as f64 * 100.0)
    });

    Stats {
        total_time,
        session_count,
        avg_duration,
        active_days,
        top_category,
        top_categories,
        longest_session,
        shortest_session,
        streak,
        goal_progress,
        completion_rate,
        weekly_activity,
        category_distribution,
        most_active_day,
        trend,
    }
}

fn weekday_from_sunday_index(index: usize) -> Weekday {
    match index {
        1 => Weekday::Mon,
        2 => Weekday::Tue,
        3 => Weekday::Wed,
        4 => Weekday::Thu,
        5 => Weekday::Fri,
        6 => Weekday::Sat,
        _ => Weekday::Sun,
    }
}

/// "3h 25m" style summary used by the insights listing.
pub fn format_hm(total_seconds: i64) -> String {
    let total = total_seconds.max(0);
    format!("{}h {}m", total / 3600, (total % 3600) / 60)
}
