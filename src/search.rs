//! Free-text search over the filtered log.
//!
//! A query is read two ways at once: as a substring of the decimal event id
//! and as a run of hex byte pairs inside the payload. Either hit counts.

use crate::filter::FilterState;
use crate::types::LogEntry;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SearchQuery {
    term: String,
    byte_pattern: Option<String>,
}

impl SearchQuery {
    pub fn parse(text: &str) -> Self {
        let term = text.to_lowercase().trim().to_string();

        let compact: Vec<char> = term.chars().filter(|c| !c.is_whitespace()).collect();
        let byte_pattern = if compact.is_empty() {
            None
        } else {
            Some(
                compact
                    .chunks(2)
                    .map(|pair| pair.iter().collect::<String>())
                    .collect::<Vec<_>>()
                    .join(" "),
            )
        };

        Self { term, byte_pattern }
    }

    pub fn term(&self) -> &str {
        &self.term
    }

    /// Lower-case hex pairs to look for in payloads, e.g. `"ab 01"`.
    pub fn byte_pattern(&self) -> Option<&str> {
        self.byte_pattern.as_deref()
    }

    pub fn matches_event(&self, entry: &LogEntry) -> bool {
        !self.term.is_empty() && entry.event.to_string().contains(&self.term)
    }

    pub fn matches_payload(&self, entry: &LogEntry) -> bool {
        match &self.byte_pattern {
            Some(pattern) => entry.payload.to_lowercase().contains(pattern.as_str()),
            None => false,
        }
    }

    pub fn matches(&self, entry: &LogEntry) -> bool {
        self.matches_event(entry) || self.matches_payload(entry)
    }
}

/// Finds the next visible match walking from newest to oldest.
///
/// Without a selection the newest match wins. With a selection the walk
/// starts just before it, then wraps once to the newest entry and stops at
/// the selection itself.
pub fn find_match(
    entries: &[LogEntry],
    filter: &FilterState,
    query: &SearchQuery,
    selected: Option<u64>,
) -> Option<u64> {
    let start = selected
        .and_then(|index| entries.binary_search_by_key(&index, |entry| entry.index).ok());

    let order: Box<dyn Iterator<Item = usize>> = match start {
        None => Box::new((0..entries.len()).rev()),
        Some(position) => Box::new((0..position).rev().chain((position..entries.len()).rev())),
    };

    order
        .map(|position| &entries[position])
        .find(|entry| filter.visible(entry) && query.matches(entry))
        .map(|entry| entry.index)
}

#[derive(Debug, Clone, Default)]
pub struct SearchState {
    text: String,
    bytes_to_match: String,
    selected: Option<u64>,
}

impl SearchState {
    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn set_text(&mut self, text: &str) {
        self.text = text.to_string();
    }

    pub fn bytes_to_match(&self) -> &str {
        &self.bytes_to_match
    }

    pub fn selected(&self) -> Option<u64> {
        self.selected
    }

    pub fn select(&mut self, index: Option<u64>) {
        self.selected = index;
    }

    /// Runs the current query from the current selection and moves the
    /// selection to the result.
    pub fn submit(&mut self, entries: &[LogEntry], filter: &FilterState) -> Option<u64> {
        let query = SearchQuery::parse(&self.text);
        self.bytes_to_match = query.byte_pattern().unwrap_or_default().to_string();
        self.selected = find_match(entries, filter, &query, self.selected);
        self.selected
    }

    pub fn clear_selection(&mut self) {
        self.selected = None;
    }
}

/// A piece of a payload, highlighted when it matched the byte pattern.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Segment<'a> {
    pub text: &'a str,
    pub highlighted: bool,
}

/// Splits `payload` around every non-overlapping, case-insensitive
/// occurrence of `pattern`, left to right.
pub fn highlight_segments<'a>(payload: &'a str, pattern: &str) -> Vec<Segment<'a>> {
    let mut segments = Vec::new();
    let mut cursor = 0;

    if !pattern.is_empty() && payload.is_ascii() {
        let lowered = payload.to_ascii_lowercase();
        let pattern = pattern.to_ascii_lowercase();
        for (start, found) in lowered.match_indices(pattern.as_str()) {
            if start > cursor {
                segments.push(Segment {
                    text: &payload[cursor..start],
                    highlighted: false,
                });
            }
            segments.push(Segment {
                text: &payload[start..start + found.len()],
                highlighted: true,
            });
            cursor = start + found.len();
        }
    }

    if cursor < payload.len() || segments.is_empty() {
        segments.push(Segment {
            text: &payload[cursor..],
            highlighted: false,
        });
    }
    segments
}
