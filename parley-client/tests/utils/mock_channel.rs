use async_trait::async_trait;
use parley_client::{ChannelConnector, ChannelError, ChannelEventSink, ChannelEvents, SignalChannel};
use parley_core::{Envelope, SignalKind, SignalMessage};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;
use tokio::sync::Mutex;

/// In-memory relay connection: records what the client sends and lets the
/// test push inbound envelopes.
#[derive(Clone)]
pub struct MockChannel {
    sent: Arc<Mutex<Vec<Envelope>>>,
    events: ChannelEventSink,
    closed: Arc<AtomicBool>,
    close_calls: Arc<AtomicUsize>,
}

impl MockChannel {
    pub fn new() -> (Self, ChannelEvents) {
        let (events, rx) = ChannelEventSink::new();
        let channel = Self {
            sent: Arc::new(Mutex::new(Vec::new())),
            events,
            closed: Arc::new(AtomicBool::new(false)),
            close_calls: Arc::new(AtomicUsize::new(0)),
        };
        (channel, rx)
    }

    /// Inbound envelope, as if the relay had sent it.
    pub fn deliver(&self, envelope: Envelope) {
        self.events.deliver(envelope);
    }

    /// Inbound raw frame.
    pub fn deliver_text(&self, text: &str) {
        self.events.deliver_text(text);
    }

    /// Simulates the relay dropping the connection.
    pub fn drop_connection(&self) {
        self.closed.store(true, Ordering::SeqCst);
        self.events.disconnect();
    }

    pub fn close_calls(&self) -> usize {
        self.close_calls.load(Ordering::SeqCst)
    }

    pub async fn sent(&self) -> Vec<Envelope> {
        self.sent.lock().await.clone()
    }

    pub async fn clear_sent(&self) {
        self.sent.lock().await.clear();
    }

    pub async fn sent_signals(&self) -> Vec<SignalMessage> {
        self.sent
            .lock()
            .await
            .iter()
            .filter_map(|e| match e {
                Envelope::Signal(msg) => Some(msg.clone()),
                _ => None,
            })
            .collect()
    }

    pub async fn sent_signals_of(&self, kind: SignalKind) -> Vec<SignalMessage> {
        self.sent_signals()
            .await
            .into_iter()
            .filter(|msg| msg.kind == kind)
            .collect()
    }
}

#[async_trait]
impl SignalChannel for MockChannel {
    async fn send(&self, envelope: &Envelope) -> Result<(), ChannelError> {
        if !self.is_open() {
            return Err(ChannelError::NotConnected);
        }
        tracing::debug!("[MockChannel] send {}", envelope.label());
        self.sent.lock().await.push(envelope.clone());
        Ok(())
    }

    async fn close(&self) {
        self.close_calls.fetch_add(1, Ordering::SeqCst);
        if !self.closed.swap(true, Ordering::SeqCst) {
            self.events.disconnect();
        }
    }

    fn is_open(&self) -> bool {
        !self.closed.load(Ordering::SeqCst) && !self.events.is_disconnected()
    }
}

/// Connector handing out `MockChannel`s, optionally slow or failing.
#[derive(Clone, Default)]
pub struct MockConnector {
    channels: Arc<Mutex<Vec<MockChannel>>>,
    fail: Arc<AtomicBool>,
    delay_ms: Arc<AtomicUsize>,
}

impl MockConnector {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fail_connect(&self, fail: bool) {
        self.fail.store(fail, Ordering::SeqCst);
    }

    pub fn set_delay_ms(&self, delay_ms: usize) {
        self.delay_ms.store(delay_ms, Ordering::SeqCst);
    }

    pub async fn connections(&self) -> usize {
        self.channels.lock().await.len()
    }

    pub async fn last_channel(&self) -> Option<MockChannel> {
        self.channels.lock().await.last().cloned()
    }
}

#[async_trait]
impl ChannelConnector for MockConnector {
    async fn connect(
        &self,
        url: &str,
    ) -> Result<(Arc<dyn SignalChannel>, ChannelEvents), ChannelError> {
        let delay = self.delay_ms.load(Ordering::SeqCst);
        if delay > 0 {
            tokio::time::sleep(Duration::from_millis(delay as u64)).await;
        }
        if self.fail.load(Ordering::SeqCst) {
            return Err(ChannelError::Connection {
                url: url.to_owned(),
                reason: "connection refused".to_owned(),
            });
        }

        let (channel, events) = MockChannel::new();
        self.channels.lock().await.push(channel.clone());
        Ok((Arc::new(channel), events))
    }
}
