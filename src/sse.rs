use crate::error::MonitorError;
use crate::feed::{FeedEvent, FeedTransport, Subscription};
use futures::StreamExt;
use log::{debug, info, trace, warn};
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::sleep;

const INITIAL_BACKOFF: Duration = Duration::from_secs(1);
const MAX_BACKOFF: Duration = Duration::from_secs(60);
const BACKOFF_MULTIPLIER: u32 = 2;
const EVENT_CHANNEL_SIZE: usize = 256;

/// One dispatched server-sent event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SseEvent {
    pub event: String,
    pub data: String,
}

/// Incremental `text/event-stream` parser.
#[derive(Debug, Default)]
pub struct SseParser {
    buffer: Vec<u8>,
    event: String,
    data: String,
    retry: Option<Duration>,
}

impl SseParser {
    /// Feeds a chunk of the response body and returns the events it
    /// completed. Partial lines are kept for the next chunk.
    pub fn push(&mut self, chunk: &[u8]) -> Vec<SseEvent> {
        self.buffer.extend_from_slice(chunk);

        let mut events = Vec::new();
        while let Some(end) = self.buffer.iter().position(|b| *b == b'\n') {
            let mut line: Vec<u8> = self.buffer.drain(..=end).collect();
            line.pop();
            if line.last() == Some(&b'\r') {
                line.pop();
            }
            let line = String::from_utf8_lossy(&line);
            if let Some(event) = self.process_line(&line) {
                events.push(event);
            }
        }
        events
    }

    /// Reconnection delay last requested by the server.
    pub fn retry(&self) -> Option<Duration> {
        self.retry
    }

    fn process_line(&mut self, line: &str) -> Option<SseEvent> {
        if line.is_empty() {
            return self.dispatch();
        }
        if line.starts_with(':') {
            return None;
        }

        let (field, value) = match line.split_once(':') {
            Some((field, value)) => (field, value.strip_prefix(' ').unwrap_or(value)),
            None => (line, ""),
        };

        match field {
            "event" => self.event = value.to_string(),
            "data" => {
                self.data.push_str(value);
                self.data.push('\n');
            }
            "retry" => {
                if let Ok(millis) = value.parse::<u64>() {
                    self.retry = Some(Duration::from_millis(millis));
                }
            }
            _ => trace!("Ignoring SSE field: {}", field),
        }
        None
    }

    fn dispatch(&mut self) -> Option<SseEvent> {
        let event = std::mem::take(&mut self.event);
        if self.data.is_empty() {
            return None;
        }
        let mut data = std::mem::take(&mut self.data);
        data.pop();

        Some(SseEvent {
            event: if event.is_empty() { "message".to_string() } else { event },
            data,
        })
    }
}

/// Delay between reconnection attempts.
///
/// Doubles from [`INITIAL_BACKOFF`] up to [`MAX_BACKOFF`] until the server
/// sends a `retry:` field; from then on the server's delay is used as is.
#[derive(Debug)]
struct Backoff {
    delay: Duration,
    server_retry: Option<Duration>,
}

impl Backoff {
    fn new() -> Self {
        Self {
            delay: INITIAL_BACKOFF,
            server_retry: None,
        }
    }

    fn reset(&mut self) {
        self.delay = INITIAL_BACKOFF;
    }

    fn set_server_retry(&mut self, retry: Duration) {
        self.server_retry = Some(retry);
    }

    fn next_delay(&mut self) -> Duration {
        if let Some(retry) = self.server_retry {
            return retry;
        }
        let delay = self.delay;
        self.delay = std::cmp::min(delay * BACKOFF_MULTIPLIER, MAX_BACKOFF);
        delay
    }
}

/// Report feed over HTTP server-sent events.
#[derive(Clone)]
pub struct SseTransport {
    client: reqwest::Client,
    base_url: String,
}

impl SseTransport {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }
}

impl FeedTransport for SseTransport {
    fn subscribe(&self, path: &str) -> Subscription {
        let (tx, rx) = mpsc::channel(EVENT_CHANNEL_SIZE);
        let url = format!("{}{}", self.base_url, path);
        let task = tokio::spawn(run(self.client.clone(), url, tx));
        Subscription::new(rx, Some(task))
    }
}

/// Keeps the event stream open until the subscriber goes away,
/// reconnecting with backoff.
async fn run(client: reqwest::Client, url: String, events: mpsc::Sender<FeedEvent>) {
    let mut backoff = Backoff::new();

    loop {
        info!("Connecting to report feed: {}", url);

        match connect_and_read(&client, &url, &events, &mut backoff).await {
            Ok(_) => {
                info!("Report feed closed by server");
            }
            Err(e) => {
                debug!("Report feed connection failed: {}", e);
                if events.send(FeedEvent::Error(e.to_string())).await.is_err() {
                    return;
                }
            }
        }

        if events.is_closed() {
            debug!("Report feed subscriber gone, stopping transport");
            return;
        }

        let delay = backoff.next_delay();
        warn!("Reconnecting in {:?}", delay);
        sleep(delay).await;
    }
}

async fn connect_and_read(
    client: &reqwest::Client,
    url: &str,
    events: &mpsc::Sender<FeedEvent>,
    backoff: &mut Backoff,
) -> Result<(), MonitorError> {
    let response = client
        .get(url)
        .header(reqwest::header::ACCEPT, "text/event-stream")
        .send()
        .await?;

    if !response.status().is_success() {
        return Err(MonitorError::FeedError(format!(
            "GET {} returned {}",
            url,
            response.status()
        )));
    }

    info!("Connected to report feed: {}", url);
    backoff.reset();

    let mut parser = SseParser::default();
    let mut body = Box::pin(response.bytes_stream());

    while let Some(chunk) = body.next().await {
        let chunk = chunk?;
        for event in parser.push(&chunk) {
            let message = match event.event.as_str() {
                "report" => FeedEvent::Report(event.data),
                "error" => FeedEvent::Error(event.data),
                other => {
                    trace!("Ignoring '{}' event", other);
                    continue;
                }
            };
            if events.send(message).await.is_err() {
                return Ok(());
            }
        }
        if let Some(retry) = parser.retry() {
            backoff.set_server_retry(retry);
        }
    }

    Ok(())
}
