//! Text rendering of the trace log for the console.
//!
//! Both views draw the same filtered entries newest first and pad with
//! blank rows up to a minimum height. The table view lists each entry's
//! fields; the flow view places each entry's event id in its layer column.

use crate::filter::FilterState;
use crate::search::highlight_segments;
use crate::trace_log::TraceLog;
use crate::types::{Layer, Level, LogEntry};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::fmt::Write;

const FLOW_CELL_WIDTH: usize = 10;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub enum ViewMode {
    #[default]
    Flow,
    Table,
}

impl ViewMode {
    pub fn switched(self) -> Self {
        match self {
            ViewMode::Flow => ViewMode::Table,
            ViewMode::Table => ViewMode::Flow,
        }
    }
}

/// Everything a renderer needs, borrowed from the log.
#[derive(Debug, Clone, Serialize)]
pub struct DisplaySnapshot<'a> {
    pub entries: &'a [LogEntry],
    #[serde(skip)]
    pub filter: &'a FilterState,
    pub hidden_layers: Vec<Layer>,
    pub hidden_levels: Vec<Level>,
    pub selected: Option<u64>,
    pub bytes_to_match: &'a str,
    pub scroll_position: u32,
    pub mode: ViewMode,
    pub run_started_at: Option<DateTime<Utc>>,
}

impl<'a> DisplaySnapshot<'a> {
    pub fn capture(log: &'a TraceLog, mode: ViewMode) -> Self {
        let filter = log.filter();
        Self {
            entries: log.entries(),
            filter,
            hidden_layers: filter.layers.iter().filter(|(_, shown)| !shown).map(|(layer, _)| layer).collect(),
            hidden_levels: filter.levels.iter().filter(|(_, shown)| !shown).map(|(level, _)| level).collect(),
            selected: log.selected(),
            bytes_to_match: log.search().bytes_to_match(),
            scroll_position: log.scroll_position(),
            mode,
            run_started_at: log.run_started_at(),
        }
    }

    /// Visible entries, newest first, padded with `None` to `min_rows`.
    pub fn rows(&self, min_rows: usize) -> Vec<Option<&'a LogEntry>> {
        let filter = self.filter;
        let mut rows: Vec<Option<&'a LogEntry>> = self
            .entries
            .iter()
            .rev()
            .filter(|entry| filter.visible(entry))
            .map(Some)
            .collect();
        if rows.len() < min_rows {
            rows.resize(min_rows, None);
        }
        rows
    }

    pub fn selected_entry(&self) -> Option<&'a LogEntry> {
        let selected = self.selected?;
        self.entries
            .binary_search_by_key(&selected, |entry| entry.index)
            .ok()
            .map(|position| &self.entries[position])
    }

    pub fn render(&self, min_rows: usize) -> String {
        match self.mode {
            ViewMode::Table => self.render_table(min_rows),
            ViewMode::Flow => self.render_flow(min_rows),
        }
    }

    pub fn render_table(&self, min_rows: usize) -> String {
        let mut out = String::new();
        let _ = writeln!(out, "  {:>5}  {:<8}  {:<7}  {:>9}  Raw Data", "Event", "Layer", "Level", "Timestamp");

        for row in self.rows(min_rows) {
            match row {
                Some(entry) => {
                    let selected = Some(entry.index) == self.selected;
                    let payload = if selected {
                        self.highlighted_payload(entry)
                    } else {
                        entry.payload.clone()
                    };
                    let _ = writeln!(
                        out,
                        "{} {:>5}  {:<8}  {:<7}  {:>9}  {}",
                        if selected { '>' } else { ' ' },
                        entry.event,
                        entry.layer.name(),
                        entry.level.name(),
                        entry.seconds(),
                        payload
                    );
                }
                None => out.push('\n'),
            }
        }
        out
    }

    pub fn render_flow(&self, min_rows: usize) -> String {
        let mut out = String::new();
        out.push_str("  ");
        for layer in Layer::KNOWN {
            let _ = write!(out, "{:^width$}", layer.name(), width = FLOW_CELL_WIDTH);
        }
        out.push('\n');

        for row in self.rows(min_rows) {
            let marker = match row {
                Some(entry) if Some(entry.index) == self.selected => '>',
                _ => ' ',
            };
            let _ = write!(out, "{} ", marker);

            for layer in Layer::KNOWN {
                let cell = match row {
                    Some(entry) if entry.layer == layer => {
                        format!("{}:{}", entry.level.name().chars().next().unwrap_or(' '), entry.event)
                    }
                    _ if !self.filter.layers.is_shown(layer) => "-".to_string(),
                    _ => String::new(),
                };
                let _ = write!(out, "{:^width$}", cell, width = FLOW_CELL_WIDTH);
            }

            if let Some(entry) = row.filter(|entry| entry.layer == Layer::Unknown) {
                let _ = write!(out, " ?:{}", entry.event);
            }
            let trimmed = out.trim_end_matches(' ').len();
            out.truncate(trimmed);
            out.push('\n');
        }
        out
    }

    /// Field-by-field description of the selected entry.
    pub fn render_detail(&self) -> Option<String> {
        let entry = self.selected_entry()?;
        let mut out = String::new();
        let _ = writeln!(out, "Event\n{}\n", entry.event);
        let _ = writeln!(out, "Layer\n{}\n", entry.layer.full_name());
        let _ = writeln!(out, "Log Level\n{}\n", entry.level.name());
        let _ = writeln!(out, "Raw Data\n{}\n", self.highlighted_payload(entry));
        let _ = writeln!(out, "Estimated Timestamp\n{}", entry.seconds());
        Some(out)
    }

    /// Payload with byte-pattern matches wrapped in brackets.
    fn highlighted_payload(&self, entry: &LogEntry) -> String {
        highlight_segments(&entry.payload, self.bytes_to_match)
            .into_iter()
            .map(|segment| {
                if segment.highlighted {
                    format!("[{}]", segment.text)
                } else {
                    segment.text.to_string()
                }
            })
            .collect()
    }
}
