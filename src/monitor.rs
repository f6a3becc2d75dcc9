use crate::config::Config;
use crate::console::{Command, HELP};
use crate::feed::{FeedEvent, FeedTransport, StreamManager};
use crate::ingest::BatchIngestor;
use crate::trace_log::TraceLog;
use crate::view::{DisplaySnapshot, ViewMode};
use log::{info, warn};
use std::fmt::Write;
use tokio::sync::mpsc;

/// What the console should do after a command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reply {
    Nothing,
    Text(String),
    /// Bring this entry into view
    ScrollTo(u64),
    Quit,
}

/// Single-threaded owner of the trace log, the feed subscription and the
/// console view state.
pub struct Monitor<T, C = fn() -> u64> {
    log: TraceLog,
    ingestor: BatchIngestor<C>,
    stream: StreamManager<T>,
    path: String,
    mode: ViewMode,
    table_rows: usize,
}

impl<T: FeedTransport> Monitor<T> {
    pub fn new(config: &Config, transport: T) -> Self {
        Monitor::with_ingestor(config, transport, BatchIngestor::new())
    }
}

impl<T, C> Monitor<T, C>
where
    T: FeedTransport,
    C: Fn() -> u64,
{
    pub fn with_ingestor(config: &Config, transport: T, ingestor: BatchIngestor<C>) -> Self {
        Self {
            log: TraceLog::new(config.start_running),
            ingestor,
            stream: StreamManager::new(transport, config.report_path.clone()),
            path: config.report_path.clone(),
            mode: ViewMode::default(),
            table_rows: config.table_rows,
        }
    }

    pub fn log(&self) -> &TraceLog {
        &self.log
    }

    pub fn is_connected(&self) -> bool {
        self.stream.is_active()
    }

    pub fn mode(&self) -> ViewMode {
        self.mode
    }

    pub fn connect(&mut self) -> bool {
        self.stream.start()
    }

    pub fn disconnect(&mut self) -> bool {
        self.stream.stop()
    }

    /// Processes console commands and feed events in arrival order until
    /// a quit command or the console closes.
    pub async fn run(&mut self, mut commands: mpsc::Receiver<Command>) {
        loop {
            tokio::select! {
                command = commands.recv() => {
                    let Some(command) = command else { break };
                    match self.handle_command(command) {
                        Reply::Quit => break,
                        Reply::Nothing => {}
                        Reply::Text(text) => println!("{}", text),
                        Reply::ScrollTo(index) => println!("-> entry {}", index),
                    }
                }
                event = self.stream.next_event() => self.handle_feed_event(event),
            }
        }
        self.stream.stop();
        info!("Monitor stopped with {} entries", self.log.len());
    }

    pub fn handle_feed_event(&mut self, event: FeedEvent) {
        match event {
            FeedEvent::Report(message) => {
                self.ingestor.ingest(&mut self.log, &message);
            }
            FeedEvent::Error(error) => {
                warn!("Error - GET {}: {}", self.path, error);
            }
        }
    }

    pub fn handle_command(&mut self, command: Command) -> Reply {
        match command {
            Command::Run => self.set_running(true),
            Command::Pause => self.set_running(false),
            Command::Toggle => self.set_running(!self.log.is_running()),
            Command::Clear => {
                self.log.clear();
                Reply::Text("log cleared".to_string())
            }
            Command::Connect => Reply::Text(
                if self.connect() { "connected" } else { "already connected" }.to_string(),
            ),
            Command::Disconnect => Reply::Text(
                if self.disconnect() { "disconnected" } else { "not connected" }.to_string(),
            ),
            Command::Search(text) => {
                self.log.set_query(&text);
                self.search()
            }
            Command::Next => self.search(),
            Command::Select(index) => match self.log.select(index) {
                Ok(index) => Reply::ScrollTo(index),
                Err(e) => Reply::Text(e.to_string()),
            },
            Command::Locate => match self.log.selected() {
                Some(index) => Reply::ScrollTo(index),
                None => Reply::Text("nothing selected".to_string()),
            },
            Command::ToggleLayer(layer) => {
                let shown = self.log.filter_mut().toggle_layer(layer);
                Reply::Text(format!("layer {} {}", layer, if shown { "shown" } else { "hidden" }))
            }
            Command::ToggleLevel(level) => {
                let shown = self.log.filter_mut().toggle_level(level);
                Reply::Text(format!("level {} {}", level, if shown { "shown" } else { "hidden" }))
            }
            Command::Filters => Reply::Text(self.describe_filters()),
            Command::ResetFilters => {
                self.log.filter_mut().reset();
                Reply::Text(self.describe_filters())
            }
            Command::SwitchView => {
                self.mode = self.mode.switched();
                Reply::Text(format!(
                    "{:?} view, scroll position {}",
                    self.mode,
                    self.log.scroll_position()
                ))
            }
            Command::Scroll(position) => {
                self.log.set_scroll_position(position);
                Reply::Nothing
            }
            Command::Show => Reply::Text(self.snapshot().render(self.table_rows)),
            Command::Detail => Reply::Text(
                self.snapshot()
                    .render_detail()
                    .unwrap_or_else(|| "nothing selected".to_string()),
            ),
            Command::Status => Reply::Text(self.describe_status()),
            Command::Help => Reply::Text(HELP.to_string()),
            Command::Quit => Reply::Quit,
        }
    }

    pub fn snapshot(&self) -> DisplaySnapshot<'_> {
        DisplaySnapshot::capture(&self.log, self.mode)
    }

    fn set_running(&mut self, running: bool) -> Reply {
        self.log.set_running(running);
        Reply::Text(if running { "running" } else { "paused" }.to_string())
    }

    fn search(&mut self) -> Reply {
        match self.log.submit_search() {
            Some(index) => Reply::ScrollTo(index),
            None => Reply::Text(format!("no match for '{}'", self.log.search().text())),
        }
    }

    fn describe_filters(&self) -> String {
        let mut out = String::from("Layers:");
        for (layer, shown) in self.log.filter().layers.iter() {
            let _ = write!(out, " {}{}", if shown { '+' } else { '-' }, layer);
        }
        out.push_str("\nLog Levels:");
        for (level, shown) in self.log.filter().levels.iter() {
            let _ = write!(out, " {}{}", if shown { '+' } else { '-' }, level);
        }
        out
    }

    fn describe_status(&self) -> String {
        let visible = self.log.visible().count();
        let started = self
            .log
            .run_started_at()
            .map(|at| at.to_rfc3339())
            .unwrap_or_else(|| "-".to_string());
        format!(
            "{} | {} | {} entries ({} visible) | run started {} | {:?} view",
            if self.is_connected() { "connected" } else { "disconnected" },
            if self.log.is_running() { "running" } else { "paused" },
            self.log.len(),
            visible,
            started,
            self.mode
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::decoder::encode_header;
    use crate::feed::tests::MemoryTransport;
    use crate::types::{Layer, Level};
    use serde_json::json;
    use std::cell::Cell;
    use std::rc::Rc;
    use std::time::Duration;

    fn report(events: &[u16]) -> String {
        let mut bytes: Vec<u8> = Vec::new();
        for event in events {
            bytes.extend(encode_header(Level::Info, Layer::Control, *event));
            bytes.extend([0x5A, 0, 1, 2, 3, 4, 5, 6, 7, 8]);
        }
        json!({ "report": [197, bytes] }).to_string()
    }

    fn monitor(
        running: bool,
    ) -> (Monitor<MemoryTransport, impl Fn() -> u64>, MemoryTransport, Rc<Cell<u64>>) {
        let transport = MemoryTransport::default();
        let now = Rc::new(Cell::new(0u64));
        let clock = {
            let now = Rc::clone(&now);
            move || now.get()
        };
        let config = Config {
            start_running: running,
            ..Config::default()
        };
        let monitor = Monitor::with_ingestor(&config, transport.clone(), BatchIngestor::with_clock(clock));
        (monitor, transport, now)
    }

    #[test]
    fn connect_opens_one_subscription() {
        let (mut monitor, transport, _) = monitor(false);
        assert!(monitor.connect());
        assert_eq!(monitor.handle_command(Command::Connect), Reply::Text("already connected".into()));
        assert_eq!(transport.senders.borrow().len(), 1);
        assert!(monitor.is_connected());
    }

    #[test]
    fn paused_monitor_discards_reports() {
        let (mut monitor, _, _) = monitor(false);
        monitor.handle_feed_event(FeedEvent::Report(report(&[1, 2])));
        assert!(monitor.log().is_empty());

        monitor.handle_command(Command::Toggle);
        monitor.handle_feed_event(FeedEvent::Report(report(&[1, 2])));
        assert_eq!(monitor.log().len(), 2);
        assert_eq!(monitor.log().entries()[0].index, 0);
    }

    #[test]
    fn feed_errors_do_not_disconnect() {
        let (mut monitor, _, _) = monitor(true);
        monitor.connect();
        monitor.handle_feed_event(FeedEvent::Error("connection reset".into()));
        assert!(monitor.is_connected());
        assert!(monitor.log().is_empty());
    }

    #[test]
    fn clear_while_connected_restarts_run() {
        let (mut monitor, _, now) = monitor(true);
        monitor.connect();
        now.set(100);
        monitor.handle_feed_event(FeedEvent::Report(report(&[1, 2])));
        monitor.handle_command(Command::Select(1));
        now.set(400);
        monitor.handle_feed_event(FeedEvent::Report(report(&[3])));
        assert_eq!(monitor.log().entries()[2].time, 300);

        monitor.handle_command(Command::Clear);
        assert!(monitor.log().is_empty());
        assert_eq!(monitor.log().selected(), None);
        assert!(monitor.is_connected());

        now.set(5_000);
        monitor.handle_feed_event(FeedEvent::Report(report(&[4])));
        let entry = &monitor.log().entries()[0];
        assert_eq!((entry.index, entry.time), (0, 0));
    }

    #[test]
    fn search_and_select_request_scrolling() {
        let (mut monitor, _, _) = monitor(true);
        monitor.handle_feed_event(FeedEvent::Report(report(&[21, 7, 121])));

        assert_eq!(monitor.handle_command(Command::Search("21".into())), Reply::ScrollTo(2));
        assert_eq!(monitor.handle_command(Command::Next), Reply::ScrollTo(0));
        assert_eq!(monitor.handle_command(Command::Locate), Reply::ScrollTo(0));
        assert_eq!(monitor.handle_command(Command::Select(1)), Reply::ScrollTo(1));
        assert!(matches!(monitor.handle_command(Command::Select(9)), Reply::Text(_)));
        assert!(matches!(monitor.handle_command(Command::Search("999".into())), Reply::Text(_)));
        assert_eq!(monitor.log().selected(), None);
    }

    #[test]
    fn hidden_layers_are_skipped_by_search() {
        let (mut monitor, _, _) = monitor(true);
        monitor.handle_feed_event(FeedEvent::Report(report(&[5])));
        monitor.handle_command(Command::ToggleLayer(Layer::Control));
        assert!(matches!(monitor.handle_command(Command::Search("5".into())), Reply::Text(_)));
    }

    #[test]
    fn view_switch_keeps_scroll_position() {
        let (mut monitor, _, _) = monitor(true);
        monitor.handle_command(Command::Scroll(48));
        let reply = monitor.handle_command(Command::SwitchView);
        assert_eq!(reply, Reply::Text("Table view, scroll position 48".into()));
        assert_eq!(monitor.mode(), ViewMode::Table);
        assert_eq!(monitor.snapshot().scroll_position, 48);
    }

    #[tokio::test]
    async fn run_loop_ingests_until_quit() {
        let (mut monitor, transport, _) = monitor(true);
        monitor.connect();
        let feed = transport.latest();
        let (commands, command_rx) = mpsc::channel(8);

        let driver = async {
            feed.send(FeedEvent::Report(report(&[1, 2, 3]))).await.unwrap();
            tokio::time::sleep(Duration::from_millis(20)).await;
            commands.send(Command::Quit).await.unwrap();
        };
        tokio::join!(monitor.run(command_rx), driver);

        assert_eq!(monitor.log().len(), 3);
        assert!(!monitor.is_connected());
        assert!(feed.is_closed());
    }
}
