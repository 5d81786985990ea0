use std::cmp::Ordering;

use serde::Deserialize;

use crate::Record;

/// High-water mark for one source: the newest id that was actually delivered.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Cursor {
    pub source: String,
    pub last_seen_id: String,
}

impl Cursor {
    pub fn new(source: impl Into<String>, last_seen_id: impl Into<String>) -> Self {
        Self {
            source: source.into(),
            last_seen_id: last_seen_id.into(),
        }
    }
}

/// How record ids are compared against a cursor.
///
/// `Lexicographic` compares raw strings, so `"100" <= "99"`. That is the
/// long-standing behavior and stays the default. `Numeric` treats two all-digit
/// ids as numbers (leading zeros ignored) and falls back to string comparison
/// for anything else.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IdOrdering {
    #[default]
    Lexicographic,
    Numeric,
}

impl IdOrdering {
    pub fn compare(self, a: &str, b: &str) -> Ordering {
        match self {
            IdOrdering::Lexicographic => a.cmp(b),
            IdOrdering::Numeric => {
                if is_all_digits(a) && is_all_digits(b) {
                    let a = a.trim_start_matches('0');
                    let b = b.trim_start_matches('0');
                    a.len().cmp(&b.len()).then_with(|| a.cmp(b))
                } else {
                    a.cmp(b)
                }
            }
        }
    }

    /// True when `id` is at or below the cursor and must not be delivered again.
    pub fn is_seen(self, id: &str, last_seen_id: &str) -> bool {
        self.compare(id, last_seen_id) != Ordering::Greater
    }
}

fn is_all_digits(s: &str) -> bool {
    !s.is_empty() && s.bytes().all(|b| b.is_ascii_digit())
}

/// Drops every record already covered by `last_seen_id`, keeping document order.
/// Without a cursor nothing is dropped.
pub fn filter_unseen(
    records: Vec<Record>,
    last_seen_id: Option<&str>,
    ordering: IdOrdering,
) -> Vec<Record> {
    match last_seen_id {
        None => records,
        Some(last_seen) => records
            .into_iter()
            .filter(|record| !ordering.is_seen(&record.id, last_seen))
            .collect(),
    }
}
