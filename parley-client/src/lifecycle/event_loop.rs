use crate::lifecycle::client_command::ClientCommand;
use crate::session::SessionEvent;
use crate::signaling::{ChannelEvent, ChannelEvents, SignalRouter};
use tokio::sync::mpsc;
use tracing::{info, warn};

/// Why the event loop stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopExit {
    /// `ClientCommand::Leave` was processed.
    Left,

    /// The relay connection went away on its own.
    Disconnected,

    /// Every controller handle is gone.
    Abandoned,
}

/// Single consumer of the three event sources: relay envelopes, negotiator
/// events and controller commands. All session state changes happen here.
pub struct ClientEventLoop {
    router: SignalRouter,
    channel_events: ChannelEvents,
    session_events: mpsc::UnboundedReceiver<SessionEvent>,
    commands: mpsc::UnboundedReceiver<ClientCommand>,
}

impl ClientEventLoop {
    pub fn new(
        router: SignalRouter,
        channel_events: ChannelEvents,
        session_events: mpsc::UnboundedReceiver<SessionEvent>,
        commands: mpsc::UnboundedReceiver<ClientCommand>,
    ) -> Self {
        Self {
            router,
            channel_events,
            session_events,
            commands,
        }
    }

    pub async fn run(mut self) -> LoopExit {
        info!("Client event loop started");

        let exit = loop {
            tokio::select! {
                cmd = self.commands.recv() => {
                    match cmd {
                        Some(ClientCommand::Snapshot(reply)) => {
                            let _ = reply.send(self.router.registry().records());
                        }
                        Some(ClientCommand::Leave(reply)) => {
                            let closed = self.router.leave().await;
                            let _ = reply.send(closed);
                            break LoopExit::Left;
                        }
                        None => {
                            info!("Command channel closed. Leaving.");
                            self.router.leave().await;
                            break LoopExit::Abandoned;
                        }
                    }
                }

                evt = self.channel_events.recv() => {
                    match evt {
                        Some(event) => {
                            if !self.router.handle_channel_event(event).await {
                                break LoopExit::Disconnected;
                            }
                        }
                        None => {
                            warn!("Channel event stream ended without a disconnect");
                            self.router.handle_channel_event(ChannelEvent::Disconnected).await;
                            break LoopExit::Disconnected;
                        }
                    }
                }

                // The session context keeps a sender alive, so this never yields None.
                Some(evt) = self.session_events.recv() => {
                    self.router.handle_session_event(evt).await;
                }
            }
        };

        info!("Client event loop finished ({:?})", exit);
        exit
    }
}
