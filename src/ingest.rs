use crate::error::MonitorError;
use crate::trace_log::TraceLog;
use chrono::Utc;
use log::{debug, trace};
use serde::Deserialize;
use serde_json::Value;

/// Report type carrying trace records.
pub const TRACE_REPORT_TAG: u64 = 197;

/// What happened to one feed message.
#[derive(Debug)]
pub enum IngestOutcome {
    Appended(usize),
    Paused,
    Dropped(MonitorError),
}

/// Extracts the raw record bytes from a `report` message.
///
/// Expects `{"report": [197, [byte, ...], ...]}`. Elements after the
/// byte array are ignored.
pub fn parse_report(message: &str) -> Result<Vec<u8>, MonitorError> {
    let value: Value = serde_json::from_str(message)?;

    let report = value
        .get("report")
        .and_then(Value::as_array)
        .ok_or_else(|| MonitorError::MalformedReport("missing 'report' array".to_string()))?;

    let (tag, bytes) = match report.as_slice() {
        [tag, bytes, ..] => (tag, bytes),
        _ => {
            return Err(MonitorError::MalformedReport(format!(
                "expected tag and bytes, got {} element(s)",
                report.len()
            )))
        }
    };

    let tag = match tag {
        Value::Number(tag) => tag,
        other => return Err(MonitorError::MalformedReport(format!("tag is not a number: {}", other))),
    };
    if tag.as_f64() != Some(TRACE_REPORT_TAG as f64) {
        return Err(MonitorError::UnrecognizedTag(tag.to_string()));
    }

    Vec::<u8>::deserialize(bytes).map_err(|e| MonitorError::MalformedReport(e.to_string()))
}

/// Milliseconds since the Unix epoch.
pub fn wall_clock() -> u64 {
    Utc::now().timestamp_millis().max(0) as u64
}

/// Turns feed messages into log entries.
pub struct BatchIngestor<C = fn() -> u64> {
    clock: C,
}

impl BatchIngestor {
    pub fn new() -> Self {
        Self { clock: wall_clock }
    }
}

impl Default for BatchIngestor {
    fn default() -> Self {
        Self::new()
    }
}

impl<C> BatchIngestor<C>
where
    C: Fn() -> u64,
{
    pub fn with_clock(clock: C) -> Self {
        Self { clock }
    }

    /// Handles one feed message. Nothing is parsed while the log is paused,
    /// and rejected messages leave the log untouched.
    pub fn ingest(&self, log: &mut TraceLog, message: &str) -> IngestOutcome {
        if !log.is_running() {
            trace!("Capture paused, discarding report");
            return IngestOutcome::Paused;
        }

        let raw = match parse_report(message) {
            Ok(raw) => raw,
            Err(e) => {
                debug!("Dropping report: {}", e);
                return IngestOutcome::Dropped(e);
            }
        };

        let added = log.append_batch(&raw, (self.clock)());
        trace!("Appended {} trace entries ({} total)", added, log.len());
        IngestOutcome::Appended(added)
    }
}
