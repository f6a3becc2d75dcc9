use crate::decoder;
use crate::error::MonitorError;
use crate::filter::FilterState;
use crate::search::SearchState;
use crate::types::LogEntry;
use chrono::{DateTime, TimeZone, Utc};
use log::{debug, info};

/// The in-memory trace log for the current run, plus the filter, search
/// and scroll state the display needs.
///
/// Every mutation goes through `&mut self`, so a reset can never interleave
/// with an append.
#[derive(Debug, Default)]
pub struct TraceLog {
    entries: Vec<LogEntry>,
    next_index: u64,
    run_started_at: Option<u64>,
    running: bool,
    filter: FilterState,
    search: SearchState,
    scroll_position: u32,
}

impl TraceLog {
    pub fn new(running: bool) -> Self {
        Self {
            running,
            ..Self::default()
        }
    }

    pub fn entries(&self) -> &[LogEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn next_index(&self) -> u64 {
        self.next_index
    }

    pub fn get(&self, index: u64) -> Option<&LogEntry> {
        self.entries
            .binary_search_by_key(&index, |entry| entry.index)
            .ok()
            .map(|position| &self.entries[position])
    }

    pub fn run_started_at(&self) -> Option<DateTime<Utc>> {
        self.run_started_at
            .and_then(|millis| Utc.timestamp_millis_opt(millis as i64).single())
    }

    pub fn is_running(&self) -> bool {
        self.running
    }

    pub fn set_running(&mut self, running: bool) {
        if self.running != running {
            info!("Trace capture {}", if running { "running" } else { "paused" });
        }
        self.running = running;
    }

    /// Decodes one batch of raw records received at `now` (milliseconds)
    /// and appends the entries. Returns the number of entries added.
    ///
    /// The first batch that yields entries fixes the run's reference time
    /// and is stamped 0. Later batches are stamped relative to it and never
    /// earlier than the last entry, even if the wall clock steps back.
    pub fn append_batch(&mut self, raw: &[u8], now: u64) -> usize {
        let started = match self.run_started_at {
            Some(started) if !self.entries.is_empty() => started,
            _ => now,
        };
        let floor = self.entries.last().map_or(0, |entry| entry.time);
        let time = now.saturating_sub(started).max(floor);

        let decoded = decoder::decode_batch(raw, self.next_index, time);
        let added = decoded.len();
        if added == 0 {
            return 0;
        }
        self.run_started_at = Some(started);
        self.next_index += added as u64;
        self.entries.extend(decoded);
        added
    }

    /// Empties the log and starts a new run. The filter and query survive.
    pub fn clear(&mut self) {
        debug!("Clearing {} trace entries", self.entries.len());
        self.entries.clear();
        self.next_index = 0;
        self.run_started_at = None;
        self.search.clear_selection();
        self.scroll_position = 0;
    }

    pub fn filter(&self) -> &FilterState {
        &self.filter
    }

    pub fn filter_mut(&mut self) -> &mut FilterState {
        &mut self.filter
    }

    pub fn visible(&self) -> impl Iterator<Item = &LogEntry> + '_ {
        self.filter.apply(&self.entries)
    }

    pub fn search(&self) -> &SearchState {
        &self.search
    }

    pub fn set_query(&mut self, text: &str) {
        self.search.set_text(text);
    }

    /// Runs the current query; the new selection, if any, should be
    /// scrolled into view.
    pub fn submit_search(&mut self) -> Option<u64> {
        self.search.submit(&self.entries, &self.filter)
    }

    pub fn selected(&self) -> Option<u64> {
        self.search.selected()
    }

    pub fn selected_entry(&self) -> Option<&LogEntry> {
        self.selected().and_then(|index| self.get(index))
    }

    pub fn select(&mut self, index: u64) -> Result<u64, MonitorError> {
        if self.get(index).is_none() {
            return Err(MonitorError::NoSuchEntry(index));
        }
        self.search.select(Some(index));
        Ok(index)
    }

    pub fn scroll_position(&self) -> u32 {
        self.scroll_position
    }

    pub fn set_scroll_position(&mut self, position: u32) {
        self.scroll_position = position;
    }
}
