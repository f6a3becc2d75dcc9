use log::{info, warn};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

/// Messages delivered by the report feed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FeedEvent {
    Report(String),
    Error(String),
}

/// One open connection to the report feed.
pub struct Subscription {
    events: mpsc::Receiver<FeedEvent>,
    task: Option<JoinHandle<()>>,
    exhausted: bool,
}

impl Subscription {
    pub fn new(events: mpsc::Receiver<FeedEvent>, task: Option<JoinHandle<()>>) -> Self {
        Self {
            events,
            task,
            exhausted: false,
        }
    }

    /// Stops delivery first, then tears the transport down. Anything still
    /// queued is discarded.
    fn close(mut self) {
        self.events.close();
        while self.events.try_recv().is_ok() {}
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}

/// Something that can open a subscription to a feed path.
pub trait FeedTransport {
    fn subscribe(&self, path: &str) -> Subscription;
}

enum StreamState {
    Idle,
    Active(Subscription),
}

/// Owns at most one live subscription to the report feed.
pub struct StreamManager<T> {
    transport: T,
    path: String,
    state: StreamState,
}

impl<T: FeedTransport> StreamManager<T> {
    pub fn new(transport: T, path: impl Into<String>) -> Self {
        Self {
            transport,
            path: path.into(),
            state: StreamState::Idle,
        }
    }

    pub fn is_active(&self) -> bool {
        matches!(self.state, StreamState::Active(_))
    }

    /// Opens the subscription unless one is already open. Returns whether a
    /// new one was opened.
    pub fn start(&mut self) -> bool {
        if self.is_active() {
            return false;
        }
        info!("Subscribing to {}", self.path);
        self.state = StreamState::Active(self.transport.subscribe(&self.path));
        true
    }

    /// Closes the subscription if one is open. Once this returns no further
    /// event from it is delivered.
    pub fn stop(&mut self) -> bool {
        match std::mem::replace(&mut self.state, StreamState::Idle) {
            StreamState::Active(subscription) => {
                subscription.close();
                info!("Unsubscribed from {}", self.path);
                true
            }
            StreamState::Idle => false,
        }
    }

    /// Waits for the next feed event. Never resolves while idle or after
    /// the transport has gone away.
    pub async fn next_event(&mut self) -> FeedEvent {
        if let StreamState::Active(subscription) = &mut self.state {
            if !subscription.exhausted {
                if let Some(event) = subscription.events.recv().await {
                    return event;
                }
                subscription.exhausted = true;
                warn!("Feed transport for {} has stopped", self.path);
            }
        }
        std::future::pending().await
    }
}

impl<T> Drop for StreamManager<T> {
    fn drop(&mut self) {
        if let StreamState::Active(subscription) = std::mem::replace(&mut self.state, StreamState::Idle) {
            subscription.close();
        }
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use std::cell::RefCell;
    use std::rc::Rc;
    use std::time::Duration;
    use tokio::time::timeout;

    /// Hands out in-memory channels and keeps the sending side.
    #[derive(Clone, Default)]
    pub(crate) struct MemoryTransport {
        pub(crate) senders: Rc<RefCell<Vec<mpsc::Sender<FeedEvent>>>>,
    }

    impl MemoryTransport {
        pub(crate) fn latest(&self) -> mpsc::Sender<FeedEvent> {
            self.senders.borrow().last().cloned().expect("no subscription opened")
        }
    }

    impl FeedTransport for MemoryTransport {
        fn subscribe(&self, _path: &str) -> Subscription {
            let (tx, rx) = mpsc::channel(16);
            self.senders.borrow_mut().push(tx);
            Subscription::new(rx, None)
        }
    }

    #[tokio::test]
    async fn start_is_idempotent() {
        let transport = MemoryTransport::default();
        let mut stream = StreamManager::new(transport.clone(), "/webds/report");

        assert!(!stream.is_active());
        assert!(stream.start());
        assert!(!stream.start());
        assert!(stream.is_active());
        assert_eq!(transport.senders.borrow().len(), 1);
    }

    #[tokio::test]
    async fn delivers_events_in_order() {
        let transport = MemoryTransport::default();
        let mut stream = StreamManager::new(transport.clone(), "/webds/report");
        stream.start();

        let tx = transport.latest();
        tx.send(FeedEvent::Report("a".into())).await.unwrap();
        tx.send(FeedEvent::Error("lost".into())).await.unwrap();
        tx.send(FeedEvent::Report("b".into())).await.unwrap();

        assert_eq!(stream.next_event().await, FeedEvent::Report("a".into()));
        assert_eq!(stream.next_event().await, FeedEvent::Error("lost".into()));
        assert!(stream.is_active());
        assert_eq!(stream.next_event().await, FeedEvent::Report("b".into()));
    }

    #[tokio::test]
    async fn stop_discards_queued_events() {
        let transport = MemoryTransport::default();
        let mut stream = StreamManager::new(transport.clone(), "/webds/report");
        stream.start();

        let tx = transport.latest();
        tx.send(FeedEvent::Report("queued".into())).await.unwrap();

        assert!(stream.stop());
        assert!(!stream.stop());
        assert!(tx.is_closed());
        assert!(tx.send(FeedEvent::Report("late".into())).await.is_err());
        assert!(timeout(Duration::from_millis(20), stream.next_event()).await.is_err());
    }

    #[tokio::test]
    async fn restart_opens_a_fresh_subscription() {
        let transport = MemoryTransport::default();
        let mut stream = StreamManager::new(transport.clone(), "/webds/report");
        stream.start();
        stream.stop();
        assert!(stream.start());

        transport.latest().send(FeedEvent::Report("fresh".into())).await.unwrap();
        assert_eq!(stream.next_event().await, FeedEvent::Report("fresh".into()));
        assert_eq!(transport.senders.borrow().len(), 2);
    }

    #[tokio::test]
    async fn closed_transport_leaves_stream_active_but_silent() {
        let transport = MemoryTransport::default();
        let mut stream = StreamManager::new(transport.clone(), "/webds/report");
        stream.start();
        transport.senders.borrow_mut().clear();

        assert!(timeout(Duration::from_millis(20), stream.next_event()).await.is_err());
        assert!(stream.is_active());
    }
}
