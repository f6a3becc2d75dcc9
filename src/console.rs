use crate::error::MonitorError;
use crate::types::{Layer, Level};
use log::warn;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::mpsc;

/// Operator commands read from the console.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Run,
    Pause,
    Toggle,
    /// Empty the log and start a new run
    Clear,
    Connect,
    Disconnect,
    /// Set the query and search from the current selection
    Search(String),
    Next,
    Select(u64),
    /// Scroll the selected entry back into view
    Locate,
    ToggleLayer(Layer),
    ToggleLevel(Level),
    Filters,
    /// Show every layer and level again
    ResetFilters,
    SwitchView,
    /// Remember a scroll offset for the current view
    Scroll(u32),
    Show,
    Detail,
    Status,
    Help,
    Quit,
}

pub const HELP: &str = "\
commands:
  run | pause | toggle        accept or discard incoming reports
  clear                       empty the log and restart numbering
  connect | disconnect        open or close the report feed
  search <text>               find event ids or payload bytes, newest first
  next                        repeat the last search
  select <index>              select an entry directly
  locate                      scroll the selection into view
  layer <name>                show/hide a layer
  level <name>                show/hide a log level
  filters | reset-filters     print or reset layer/level filters
  view                        switch between flow and table views
  scroll <offset>             remember a scroll offset
  show | detail | status      print the view, the selection or a summary
  quit";

impl Command {
    pub fn parse(line: &str) -> Result<Self, MonitorError> {
        let line = line.trim();
        let (word, rest) = match line.split_once(char::is_whitespace) {
            Some((word, rest)) => (word, rest.trim()),
            None => (line, ""),
        };

        let command = match word.to_ascii_lowercase().as_str() {
            "run" => Command::Run,
            "pause" => Command::Pause,
            "toggle" => Command::Toggle,
            "clear" | "reset" => Command::Clear,
            "connect" | "start" => Command::Connect,
            "disconnect" | "stop" => Command::Disconnect,
            "search" | "/" => Command::Search(rest.to_string()),
            "next" | "n" => Command::Next,
            "select" => Command::Select(parse_number(rest)?),
            "locate" => Command::Locate,
            "layer" => Command::ToggleLayer(
                Layer::from_name(rest).ok_or_else(|| unknown("layer", rest))?,
            ),
            "level" => Command::ToggleLevel(
                Level::from_name(rest).ok_or_else(|| unknown("level", rest))?,
            ),
            "filters" => Command::Filters,
            "reset-filters" => Command::ResetFilters,
            "view" => Command::SwitchView,
            "scroll" => Command::Scroll(parse_number(rest)?),
            "show" | "" => Command::Show,
            "detail" => Command::Detail,
            "status" => Command::Status,
            "help" | "?" => Command::Help,
            "quit" | "exit" => Command::Quit,
            other => return Err(MonitorError::UnknownCommand(other.to_string())),
        };
        Ok(command)
    }
}

fn parse_number<T: std::str::FromStr>(text: &str) -> Result<T, MonitorError> {
    text.parse()
        .map_err(|_| MonitorError::UnknownCommand(format!("expected a number, got '{}'", text)))
}

fn unknown(kind: &str, name: &str) -> MonitorError {
    MonitorError::UnknownCommand(format!("unknown {} '{}'", kind, name))
}

/// Reads commands from stdin until EOF or the receiver goes away.
/// Unparseable lines are reported and skipped.
pub async fn read_stdin(commands: mpsc::Sender<Command>) {
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    loop {
        let line = match lines.next_line().await {
            Ok(Some(line)) => line,
            Ok(None) => break,
            Err(e) => {
                warn!("Failed to read console input: {}", MonitorError::from(e));
                break;
            }
        };

        match Command::parse(&line) {
            Ok(command) => {
                if commands.send(command).await.is_err() {
                    return;
                }
            }
            Err(e) => warn!("{} (type 'help')", e),
        }
    }

    let _ = commands.send(Command::Quit).await;
}
