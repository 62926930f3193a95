use crate::error::ChannelError;
use crate::signaling::signal_channel::{
    ChannelConnector, ChannelEventSink, ChannelEvents, SignalChannel,
};
use async_trait::async_trait;
use futures::stream::{SplitSink, SplitStream};
use futures::{SinkExt, StreamExt};
use parley_core::Envelope;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async};
use tracing::{debug, error, info, warn};

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Opens relay connections over WebSocket.
#[derive(Debug, Clone, Copy, Default)]
pub struct WsConnector;

#[async_trait]
impl ChannelConnector for WsConnector {
    async fn connect(
        &self,
        url: &str,
    ) -> Result<(Arc<dyn SignalChannel>, ChannelEvents), ChannelError> {
        let (channel, events) = WsChannel::connect(url).await?;
        Ok((Arc::new(channel), events))
    }
}

/// Relay connection: a writer task drains the outbound queue into the socket,
/// a reader task decodes frames into `ChannelEvent`s.
pub struct WsChannel {
    outbound: mpsc::UnboundedSender<Message>,
    events: ChannelEventSink,
    closed: Arc<AtomicBool>,
}

impl WsChannel {
    pub async fn connect(url: &str) -> Result<(Self, ChannelEvents), ChannelError> {
        info!("Connecting to relay at {}", url);
        let (ws_stream, _) = connect_async(url)
            .await
            .map_err(|e| ChannelError::Connection {
                url: url.to_owned(),
                reason: e.to_string(),
            })?;
        info!("Connected to relay at {}", url);

        let (write, read) = ws_stream.split();
        let (outbound, outbound_rx) = mpsc::unbounded_channel();
        let (events, event_rx) = ChannelEventSink::new();
        let closed = Arc::new(AtomicBool::new(false));

        tokio::spawn(Self::writer_task(write, outbound_rx, closed.clone()));
        tokio::spawn(Self::reader_task(read, events.clone(), closed.clone()));

        Ok((
            Self {
                outbound,
                events,
                closed,
            },
            event_rx,
        ))
    }

    async fn writer_task(
        mut write: SplitSink<WsStream, Message>,
        mut outbound: mpsc::UnboundedReceiver<Message>,
        closed: Arc<AtomicBool>,
    ) {
        while let Some(message) = outbound.recv().await {
            let is_close = matches!(message, Message::Close(_));
            if let Err(e) = write.send(message).await {
                error!("Failed to write to relay: {}", e);
                break;
            }
            if is_close {
                break;
            }
        }
        closed.store(true, Ordering::SeqCst);
        let _ = write.close().await;
        debug!("Relay writer task exiting");
    }

    async fn reader_task(
        mut read: SplitStream<WsStream>,
        events: ChannelEventSink,
        closed: Arc<AtomicBool>,
    ) {
        while let Some(frame) = read.next().await {
            match frame {
                Ok(Message::Text(text)) => events.deliver_text(&text),
                Ok(Message::Close(_)) => {
                    info!("Relay closed the connection");
                    break;
                }
                Ok(_) => {}
                Err(e) => {
                    warn!("Relay connection error: {}", e);
                    break;
                }
            }
        }
        closed.store(true, Ordering::SeqCst);
        events.disconnect();
        debug!("Relay reader task exiting");
    }
}

#[async_trait]
impl SignalChannel for WsChannel {
    async fn send(&self, envelope: &Envelope) -> Result<(), ChannelError> {
        if !self.is_open() {
            return Err(ChannelError::NotConnected);
        }
        let json = envelope.encode()?;
        debug!("Sending {} envelope", envelope.label());
        self.outbound
            .send(Message::Text(json.into()))
            .map_err(|_| ChannelError::NotConnected)
    }

    async fn close(&self) {
        if self.closed.swap(true, Ordering::SeqCst) {
            return;
        }
        info!("Closing signal channel");
        let _ = self.outbound.send(Message::Close(None));
        self.events.disconnect();
    }

    fn is_open(&self) -> bool {
        !self.closed.load(Ordering::SeqCst) && !self.events.is_disconnected()
    }
}
