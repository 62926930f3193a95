use crate::config::ClientConfig;
use crate::error::{ChannelError, JoinError};
use crate::lifecycle::client_command::ClientCommand;
use crate::lifecycle::event_loop::{ClientEventLoop, LoopExit};
use crate::media::{LocalMedia, MediaCapture, SyntheticMedia, TrackKind};
use crate::render::Renderer;
use crate::session::{PeerSessionRecord, SessionContext, SessionRegistry};
use crate::signaling::{ChannelConnector, SignalChannel, SignalRouter, WsConnector};
use crate::transport::{NegotiatorFactory, RtcNegotiatorFactory};
use parley_core::{Envelope, Identity};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use std::time::Duration;
use tokio::sync::{Mutex, mpsc, oneshot, watch};
use tokio::task::JoinHandle;
use tracing::{error, info, warn};

enum Phase {
    Idle,
    Joining { attempt: u64 },
    Joined(ActiveSession),
    Left,
}

/// Handles into a running event loop.
struct ActiveSession {
    display_name: String,
    channel: Arc<dyn SignalChannel>,
    commands: mpsc::UnboundedSender<ClientCommand>,
    identity: watch::Receiver<Option<Identity>>,
    task: JoinHandle<()>,
}

struct ControllerInner {
    config: ClientConfig,
    media: Arc<dyn MediaCapture>,
    connector: Arc<dyn ChannelConnector>,
    negotiators: Arc<dyn NegotiatorFactory>,
    renderer: Arc<dyn Renderer>,
    phase: Mutex<Phase>,
    attempts: AtomicU64,
    audio_enabled: AtomicBool,
    video_enabled: AtomicBool,
    left: watch::Sender<bool>,
}

/// Join/leave orchestration. Cheap to clone; every clone drives the same
/// client.
#[derive(Clone)]
pub struct LifecycleController {
    inner: Arc<ControllerInner>,
}

impl LifecycleController {
    pub fn new(
        config: ClientConfig,
        media: Arc<dyn MediaCapture>,
        connector: Arc<dyn ChannelConnector>,
        negotiators: Arc<dyn NegotiatorFactory>,
        renderer: Arc<dyn Renderer>,
    ) -> Self {
        let (left, _) = watch::channel(false);
        Self {
            inner: Arc::new(ControllerInner {
                config,
                media,
                connector,
                negotiators,
                renderer,
                phase: Mutex::new(Phase::Idle),
                attempts: AtomicU64::new(0),
                audio_enabled: AtomicBool::new(true),
                video_enabled: AtomicBool::new(true),
                left,
            }),
        }
    }

    /// WebSocket relay, `webrtc` peer connections and synthetic capture.
    pub fn standard(config: ClientConfig, renderer: Arc<dyn Renderer>) -> Self {
        let negotiators = Arc::new(RtcNegotiatorFactory::new(config.transport.clone()));
        Self::new(
            config,
            Arc::new(SyntheticMedia::new()),
            Arc::new(WsConnector),
            negotiators,
            renderer,
        )
    }

    pub fn config(&self) -> &ClientConfig {
        &self.inner.config
    }

    /// Capture media, connect to the relay and start the event loop. Presence
    /// is announced by the router once the relay's welcome arrives.
    pub async fn join(&self, display_name: &str) -> Result<(), JoinError> {
        let name = display_name.trim();
        if name.is_empty() {
            return Err(JoinError::EmptyName);
        }

        let attempt = {
            let mut phase = self.inner.phase.lock().await;
            if matches!(*phase, Phase::Joining { .. } | Phase::Joined(_)) {
                return Err(JoinError::AlreadyJoined);
            }
            let attempt = self.inner.attempts.fetch_add(1, Ordering::SeqCst) + 1;
            *phase = Phase::Joining { attempt };
            attempt
        };
        self.inner.left.send_replace(false);

        info!("Joining as {}", name);
        self.inner.renderer.hide_join_screen();

        let result = self.establish(name, attempt).await;
        match &result {
            Ok(()) => info!("Joined the room as {}", name),
            Err(JoinError::Cancelled) => info!("Join cancelled by leave"),
            Err(e) => {
                warn!("Join failed: {}", e);
                self.inner.renderer.show_join_screen();
            }
        }
        result
    }

    async fn establish(&self, name: &str, attempt: u64) -> Result<(), JoinError> {
        let inner = &self.inner;

        let media = match inner.media.acquire().await {
            Ok(media) => Arc::new(media),
            Err(e) => {
                if !self.reset_attempt(attempt).await {
                    return self.cancel_join(None).await;
                }
                return Err(e.into());
            }
        };
        self.apply_track_switches(&media);

        if !self.is_current(attempt).await {
            return self.cancel_join(None).await;
        }

        let (channel, channel_events) = match inner.connector.connect(&inner.config.relay_url).await
        {
            Ok(connected) => connected,
            Err(e) => {
                // A leave that got here first releases media in `cancel_join`.
                if !self.reset_attempt(attempt).await {
                    return self.cancel_join(None).await;
                }
                inner.media.release().await;
                return Err(e.into());
            }
        };

        let mut phase = inner.phase.lock().await;
        if !matches!(*phase, Phase::Joining { attempt: current } if current == attempt) {
            drop(phase);
            return self.cancel_join(Some(channel)).await;
        }

        let (session_tx, session_rx) = mpsc::unbounded_channel();
        let (command_tx, command_rx) = mpsc::unbounded_channel();
        let context = SessionContext::new(inner.negotiators.clone(), Some(media), session_tx);
        let router = SignalRouter::new(
            name,
            SessionRegistry::new(context),
            channel.clone(),
            inner.renderer.clone(),
        );
        let identity = router.watch_identity();
        let event_loop = ClientEventLoop::new(router, channel_events, session_rx, command_rx);

        let controller = Arc::downgrade(&self.inner);
        let task = tokio::spawn(async move {
            if event_loop.run().await == LoopExit::Disconnected {
                if let Some(controller) = Weak::upgrade(&controller) {
                    LifecycleController { inner: controller }.leave().await;
                }
            }
        });

        *phase = Phase::Joined(ActiveSession {
            display_name: name.to_owned(),
            channel,
            commands: command_tx,
            identity,
            task,
        });
        Ok(())
    }

    /// Announce departure, close the channel, close every session, release
    /// media. Safe to call repeatedly or while a join is in flight; returns
    /// whether this call did anything.
    pub async fn leave(&self) -> bool {
        let active = {
            let mut phase = self.inner.phase.lock().await;
            match std::mem::replace(&mut *phase, Phase::Left) {
                Phase::Joined(active) => active,
                Phase::Joining { attempt } => {
                    // The join notices and rolls itself back.
                    info!("Leave requested while join #{} is in flight", attempt);
                    return true;
                }
                other => {
                    *phase = other;
                    return false;
                }
            }
        };

        info!("Leaving the room");
        let (reply_tx, reply_rx) = oneshot::channel();
        let mut loop_finished = false;
        if active.commands.send(ClientCommand::Leave(reply_tx)).is_ok() {
            match tokio::time::timeout(self.inner.config.shutdown_timeout, reply_rx).await {
                Ok(Ok(closed)) => {
                    info!("Closed {} peer sessions", closed);
                    loop_finished = true;
                }
                Ok(Err(_)) => {}
                Err(_) => {
                    error!("Event loop did not finish leaving in time; aborting it");
                    active.task.abort();
                }
            }
        }
        if !loop_finished {
            active.channel.close().await;
        }

        self.finish_leave().await;
        true
    }

    pub async fn is_joined(&self) -> bool {
        matches!(*self.inner.phase.lock().await, Phase::Joined(_))
    }

    /// Sends a chat line as ourselves. Blank text is ignored.
    pub async fn send_chat(&self, text: &str) -> Result<(), ChannelError> {
        let text = text.trim();
        if text.is_empty() {
            return Ok(());
        }

        let (channel, name) = {
            let phase = self.inner.phase.lock().await;
            let Phase::Joined(active) = &*phase else {
                return Err(ChannelError::NotConnected);
            };
            (active.channel.clone(), active.display_name.clone())
        };
        channel.send(&Envelope::chat(text, name)).await
    }

    /// Snapshot of every peer session; empty when not joined.
    pub async fn sessions(&self) -> Vec<PeerSessionRecord> {
        let commands = {
            let phase = self.inner.phase.lock().await;
            match &*phase {
                Phase::Joined(active) => active.commands.clone(),
                _ => return Vec::new(),
            }
        };

        let (reply_tx, reply_rx) = oneshot::channel();
        if commands.send(ClientCommand::Snapshot(reply_tx)).is_err() {
            return Vec::new();
        }
        reply_rx.await.unwrap_or_default()
    }

    pub async fn identity(&self) -> Option<Identity> {
        let phase = self.inner.phase.lock().await;
        match &*phase {
            Phase::Joined(active) => active.identity.borrow().clone(),
            _ => None,
        }
    }

    /// Waits for the relay's welcome. `None` if not joined or on timeout.
    pub async fn wait_for_identity(&self, timeout: Duration) -> Option<Identity> {
        let mut identity = {
            let phase = self.inner.phase.lock().await;
            match &*phase {
                Phase::Joined(active) => active.identity.clone(),
                _ => return None,
            }
        };

        match tokio::time::timeout(timeout, identity.wait_for(Option::is_some)).await {
            Ok(Ok(bound)) => bound.clone(),
            _ => None,
        }
    }

    /// Resolves once a leave has finished tearing everything down.
    pub async fn wait_left(&self) {
        let mut left = self.inner.left.subscribe();
        let _ = left.wait_for(|done| *done).await;
    }

    pub fn set_track_enabled(&self, kind: TrackKind, enabled: bool) {
        self.track_switch(kind).store(enabled, Ordering::SeqCst);
        self.inner.media.set_track_enabled(kind, enabled);
    }

    pub fn is_track_enabled(&self, kind: TrackKind) -> bool {
        self.track_switch(kind).load(Ordering::SeqCst)
    }

    /// Returns the new microphone state.
    pub fn toggle_microphone(&self) -> bool {
        self.toggle(TrackKind::Audio)
    }

    /// Returns the new camera state.
    pub fn toggle_camera(&self) -> bool {
        self.toggle(TrackKind::Video)
    }

    fn toggle(&self, kind: TrackKind) -> bool {
        let enabled = !self.track_switch(kind).fetch_xor(true, Ordering::SeqCst);
        self.inner.media.set_track_enabled(kind, enabled);
        info!("{:?} {}", kind, if enabled { "on" } else { "off" });
        enabled
    }

    fn track_switch(&self, kind: TrackKind) -> &AtomicBool {
        match kind {
            TrackKind::Audio => &self.inner.audio_enabled,
            TrackKind::Video => &self.inner.video_enabled,
        }
    }

    fn apply_track_switches(&self, media: &LocalMedia) {
        for kind in [TrackKind::Audio, TrackKind::Video] {
            if media.has_track(kind) {
                self.inner
                    .media
                    .set_track_enabled(kind, self.is_track_enabled(kind));
            }
        }
    }

    async fn is_current(&self, attempt: u64) -> bool {
        matches!(
            *self.inner.phase.lock().await,
            Phase::Joining { attempt: current } if current == attempt
        )
    }

    /// Back to `Idle` after a failed join, unless a leave got there first.
    async fn reset_attempt(&self, attempt: u64) -> bool {
        let mut phase = self.inner.phase.lock().await;
        let current = matches!(*phase, Phase::Joining { attempt: current } if current == attempt);
        if current {
            *phase = Phase::Idle;
        }
        current
    }

    /// Undo a join overtaken by `leave()`; the leave already moved us to `Left`.
    async fn cancel_join(
        &self,
        channel: Option<Arc<dyn SignalChannel>>,
    ) -> Result<(), JoinError> {
        if let Some(channel) = channel {
            channel.close().await;
        }
        self.finish_leave().await;
        Err(JoinError::Cancelled)
    }

    async fn finish_leave(&self) {
        self.inner.media.release().await;
        self.inner.renderer.show_exit_screen();
        self.inner.left.send_replace(true);
        info!("Left the room");
    }
}
