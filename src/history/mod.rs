use crate::analytics::parse_length;
use crate::store::{Session, join_tags};

/// Field a history listing can be sorted by. The set is closed on
/// purpose: a new session field only becomes searchable/sortable when it
/// is added here explicitly.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum SortKey {
    Id,
    #[default]
    Date,
    Length,
    Title,
    Category,
    Tags,
}

impl SortKey {
    pub fn as_str(&self) -> &'static str {
        match self {
            SortKey::Id => "id",
            SortKey::Date => "date",
            SortKey::Length => "length",
            SortKey::Title => "title",
            SortKey::Category => "category",
            SortKey::Tags => "tags",
        }
    }

    pub fn from_str(s: &str) -> Self {
        match s {
            "id" => SortKey::Id,
            "length" => SortKey::Length,
            "title" => SortKey::Title,
            "category" => SortKey::Category,
            "tags" => SortKey::Tags,
            _ => SortKey::Date,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum SortDirection {
    #[default]
    Asc,
    Desc,
}

/// Sort state for the history listing: a key plus a direction that
/// toggles when the same key is selected again.
#[derive(Debug, Clone, Copy, Default)]
pub struct HistoryView {
    pub key: SortKey,
    pub direction: SortDirection,
}

impl HistoryView {
    pub fn new(key: SortKey, direction: SortDirection) -> Self {
        HistoryView { key, direction }
    }

    /// Re-selecting the current key flips asc→desc→asc; a new key
    /// resets to ascending.
    pub fn select(&mut self, key: SortKey) {
        if self.key == key {
            self.direction = match self.direction {
                SortDirection::Asc => SortDirection::Desc,
                SortDirection::Desc => SortDirection::Asc,
            };
        } else {
            self.key = key;
            self.direction = SortDirection::Asc;
        }
    }

    /// Stable sort by the selected field. Id and length compare
    /// numerically (length via parsed seconds, so "100:00:00" outranks
    /// "20:00:00"); everything else compares as strings. The descending
    /// direction reverses the comparator, not the sorted slice, so equal
    /// keys keep their original relative order either way.
    pub fn sort(&self, sessions: &mut [Session]) {
        sessions.sort_by(|a, b| {
            let ord = match self.key {
                SortKey::Id => a.id.cmp(&b.id),
                SortKey::Length => parse_length(&a.length).cmp(&parse_length(&b.length)),
                SortKey::Date => a.timestamp.cmp(&b.timestamp),
                SortKey::Title => a.title.cmp(&b.title),
                SortKey::Category => a.category.cmp(&b.category),
                SortKey::Tags => join_tags(&a.tags).cmp(&join_tags(&b.tags)),
            };
            match self.direction {
                SortDirection::Asc => ord,
                SortDirection::Desc => ord.reverse(),
            }
        });
    }
}

/// Case-insensitive substring filter over the string form of every
/// listed field. An empty term passes everything.
pub fn filter<'a>(sessions: &'a [Session], term: &str) -> Vec<&'a Session> {
    let needle = term.trim().to_lowercase();
    if needle.is_empty() {
        return sessions.iter().collect();
    }
    sessions
        .iter()
        .filter(|s| {
            searchable_fields(s)
                .iter()
                .any(|field| field.to_lowercase().contains(&needle))
        })
        .collect()
}

fn searchable_fields(session: &Session) -> [String; 6] {
    [
        session.id.to_string(),
        session.timestamp.clone(),
        session.length.clone(),
        session.title.clone(),
        session.category.clone(),
        join_tags(&session.tags),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    fn session(id: i64, title: &str, category: &str, length: &str, timestamp: &str) -> Session {
        Session {
            id,
            title: title.to_string(),
            description: String::new(),
            notes: String::new(),
            category: category.to_string(),
            tags: vec!["focus".to_string()],
            length: length.to_string(),
            todos: Vec::new(),
            timestamp: timestamp.to_string(),
        }
    }

    fn fixtures() -> Vec<Session> {
        vec![
            session(1, "Deep Work", "Work", "01:00:00", "2024-01-02"),
            session(2, "Email", "Admin", "00:20:00", "2024-01-01"),
            session(3, "Marathon", "Exercise", "100:00:00", "2024-01-03"),
        ]
    }

    #[test]
    fn filter_matches_case_insensitive_substrings() {
        let sessions = fixtures();
        let hits = filter(&sessions, "deep");
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].title, "Deep Work");
    }

    #[test]
    fn filter_empty_term_passes_everything() {
        let sessions = fixtures();
        assert_eq!(filter(&sessions, "").len(), 3);
        assert_eq!(filter(&sessions, "   ").len(), 3);
    }

    #[test]
    fn filter_searches_every_listed_field() {
        let sessions = fixtures();
        assert_eq!(filter(&sessions, "admin").len(), 1); // category
        assert_eq!(filter(&sessions, "2024-01-03").len(), 1); // date
        assert_eq!(filter(&sessions, "00:20").len(), 1); // length
        assert_eq!(filter(&sessions, "focus").len(), 3); // tags
        assert_eq!(filter(&sessions, "2").len(), 3); // ids and dates both contain "2"
    }

    #[test]
    fn filter_no_match_returns_empty() {
        let sessions = fixtures();
        assert!(filter(&sessions, "zzz").is_empty());
    }

    #[test]
    fn sort_by_length_is_numeric_not_lexicographic() {
        let mut sessions = fixtures();
        HistoryView::new(SortKey::Length, SortDirection::Asc).sort(&mut sessions);
        let lengths: Vec<&str> = sessions.iter().map(|s| s.length.as_str()).collect();
        assert_eq!(lengths, vec!["00:20:00", "01:00:00", "100:00:00"]);
    }

    #[test]
    fn sort_descending_keeps_tie_order_stable() {
        let mut sessions = vec![
            session(1, "first", "Work", "01:00:00", "2024-01-01"),
            session(2, "second", "Work", "01:00:00", "2024-01-01"),
            session(3, "third", "Admin", "00:30:00", "2024-01-02"),
        ];
        HistoryView::new(SortKey::Category, SortDirection::Desc).sort(&mut sessions);
        let ids: Vec<i64> = sessions.iter().map(|s| s.id).collect();
        // "Work" outranks "Admin" descending; the two Work rows keep
        // their original relative order.
        assert_eq!(ids, vec![1, 2, 3]);
    }

    #[test]
    fn sort_descending_orders_high_to_low() {
        let mut sessions = fixtures();
        HistoryView::new(SortKey::Title, SortDirection::Desc).sort(&mut sessions);
        let titles: Vec<&str> = sessions.iter().map(|s| s.title.as_str()).collect();
        assert_eq!(titles, vec!["Marathon", "Email", "Deep Work"]);
    }

    #[test]
    fn select_toggles_direction_on_same_key() {
        let mut view = HistoryView::default();
        assert_eq!(view.key, SortKey::Date);
        assert_eq!(view.direction, SortDirection::Asc);

        view.select(SortKey::Date);
        assert_eq!(view.direction, SortDirection::Desc);
        view.select(SortKey::Date);
        assert_eq!(view.direction, SortDirection::Asc);
    }

    #[test]
    fn select_new_key_resets_to_ascending() {
        let mut view = HistoryView::default();
        view.select(SortKey::Date); // now desc
        view.select(SortKey::Title);
        assert_eq!(view.key, SortKey::Title);
        assert_eq!(view.direction, SortDirection::Asc);
    }

    #[test]
    fn filter_and_sort_commute() {
        let sessions = fixtures();
        let view = HistoryView::new(SortKey::Id, SortDirection::Desc);

        // sort then filter
        let mut sorted = sessions.clone();
        view.sort(&mut sorted);
        let a: Vec<i64> = filter(&sorted, "work").iter().map(|s| s.id).collect();

        // filter then sort
        let mut filtered: Vec<Session> =
            filter(&sessions, "work").into_iter().cloned().collect();
        view.sort(&mut filtered);
        let b: Vec<i64> = filtered.iter().map(|s| s.id).collect();

        assert_eq!(a, b);
    }
}
