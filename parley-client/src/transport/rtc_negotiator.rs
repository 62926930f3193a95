use crate::error::NegotiationError;
use crate::media::{LocalMedia, TrackKind};
use crate::render::RemoteStream;
use crate::session::SessionEventSink;
use crate::transport::negotiator::{Negotiator, NegotiatorFactory};
use crate::transport::transport_config::TransportConfig;
use anyhow::{Context, Result};
use async_trait::async_trait;
use parley_core::{IceCandidate, PeerId, SdpKind, SessionDescription};
use std::sync::Arc;
use tracing::{debug, info};
use webrtc::api::APIBuilder;
use webrtc::api::interceptor_registry::register_default_interceptors;
use webrtc::api::media_engine::MediaEngine;
use webrtc::ice_transport::ice_candidate::{RTCIceCandidate, RTCIceCandidateInit};
use webrtc::ice_transport::ice_server::RTCIceServer;
use webrtc::interceptor::registry::Registry;
use webrtc::peer_connection::RTCPeerConnection;
use webrtc::peer_connection::configuration::RTCConfiguration;
use webrtc::peer_connection::peer_connection_state::RTCPeerConnectionState;
use webrtc::peer_connection::sdp::session_description::RTCSessionDescription;
use webrtc::rtp_transceiver::RTCRtpTransceiver;
use webrtc::rtp_transceiver::rtp_codec::RTPCodecType;
use webrtc::rtp_transceiver::rtp_receiver::RTCRtpReceiver;
use webrtc::track::track_local::TrackLocal;
use webrtc::track::track_remote::TrackRemote;

/// Builds one `RTCPeerConnection` per remote participant.
#[derive(Clone)]
pub struct RtcNegotiatorFactory {
    config: TransportConfig,
}

impl RtcNegotiatorFactory {
    pub fn new(config: TransportConfig) -> Self {
        Self { config }
    }
}

#[async_trait]
impl NegotiatorFactory for RtcNegotiatorFactory {
    async fn create(
        &self,
        peer_id: &PeerId,
        events: SessionEventSink,
    ) -> Result<Box<dyn Negotiator>, NegotiationError> {
        let negotiator = RtcNegotiator::new(peer_id.clone(), &self.config, events)
            .await
            .map_err(|e| NegotiationError::Backend(format!("{:#}", e)))?;
        Ok(Box::new(negotiator))
    }
}

pub struct RtcNegotiator {
    peer_id: PeerId,
    peer_connection: Arc<RTCPeerConnection>,
}

impl RtcNegotiator {
    pub async fn new(
        peer_id: PeerId,
        config: &TransportConfig,
        events: SessionEventSink,
    ) -> Result<Self> {
        let mut media_engine = MediaEngine::default();
        media_engine
            .register_default_codecs()
            .context("Failed to register default codecs")?;
        let registry = register_default_interceptors(Registry::new(), &mut media_engine)
            .context("Failed to register interceptors")?;

        let api = APIBuilder::new()
            .with_media_engine(media_engine)
            .with_interceptor_registry(registry)
            .build();

        let rtc_config = RTCConfiguration {
            ice_servers: config
                .ice_servers
                .iter()
                .map(|server| RTCIceServer {
                    urls: server.urls.clone(),
                    username: server.username.clone().unwrap_or_default(),
                    credential: server.credential.clone().unwrap_or_default(),
                    ..Default::default()
                })
                .collect(),
            ..Default::default()
        };

        let peer_connection = Arc::new(
            api.new_peer_connection(rtc_config)
                .await
                .context("Failed to create peer connection")?,
        );

        let state_events = events.clone();
        peer_connection.on_peer_connection_state_change(Box::new(
            move |state: RTCPeerConnectionState| {
                let events = state_events.clone();
                Box::pin(async move {
                    info!(
                        "Peer connection with {} changed state: {:?}",
                        events.peer_id(),
                        state
                    );
                    match state {
                        RTCPeerConnectionState::Connected => events.connected(),
                        RTCPeerConnectionState::Failed => {
                            events.failed("peer connection failed".to_owned())
                        }
                        _ => {}
                    }
                })
            },
        ));

        let ice_events = events.clone();
        peer_connection.on_ice_candidate(Box::new(move |candidate: Option<RTCIceCandidate>| {
            let events = ice_events.clone();
            Box::pin(async move {
                let Some(candidate) = candidate else { return };
                let Ok(init) = candidate.to_json() else {
                    return;
                };
                events.local_candidate(IceCandidate {
                    candidate: init.candidate,
                    sdp_mid: init.sdp_mid,
                    sdp_m_line_index: init.sdp_mline_index,
                    username_fragment: init.username_fragment,
                });
            })
        }));

        let track_events = events;
        peer_connection.on_track(Box::new(
            move |track: Arc<TrackRemote>,
                  _receiver: Arc<RTCRtpReceiver>,
                  _transceiver: Arc<RTCRtpTransceiver>| {
                let events = track_events.clone();
                Box::pin(async move {
                    let kind = match track.kind() {
                        RTPCodecType::Audio => TrackKind::Audio,
                        _ => TrackKind::Video,
                    };
                    debug!(
                        "Remote {:?} track '{}' from {}",
                        kind,
                        track.id(),
                        events.peer_id()
                    );
                    events.remote_track(RemoteStream {
                        stream_id: track.stream_id(),
                        track_id: track.id(),
                        kind,
                    });
                })
            },
        ));

        Ok(Self {
            peer_id,
            peer_connection,
        })
    }

    fn to_rtc_description(
        description: SessionDescription,
    ) -> Result<RTCSessionDescription, NegotiationError> {
        let parsed = match description.kind {
            SdpKind::Offer => RTCSessionDescription::offer(description.sdp),
            SdpKind::Answer => RTCSessionDescription::answer(description.sdp),
            SdpKind::Pranswer => RTCSessionDescription::pranswer(description.sdp),
            SdpKind::Rollback => {
                return Err(NegotiationError::malformed(
                    "session description",
                    "rollback is not negotiated over the relay",
                ));
            }
        };
        parsed.map_err(|e| NegotiationError::malformed("session description", e))
    }
}

#[async_trait]
impl Negotiator for RtcNegotiator {
    async fn attach_local_media(&self, media: &LocalMedia) -> Result<(), NegotiationError> {
        for local in media.tracks() {
            let track: Arc<dyn TrackLocal + Send + Sync> = local.track();
            let sender = self.peer_connection.add_track(track).await?;

            // RTCP has to be drained for the interceptors to work.
            tokio::spawn(async move {
                let mut buf = vec![0u8; 1500];
                while sender.read(&mut buf).await.is_ok() {}
            });
        }
        debug!(
            "Attached {} local tracks for {}",
            media.tracks().len(),
            self.peer_id
        );
        Ok(())
    }

    async fn create_offer(&self) -> Result<SessionDescription, NegotiationError> {
        let offer = self.peer_connection.create_offer(None).await?;
        self.peer_connection
            .set_local_description(offer.clone())
            .await?;
        Ok(SessionDescription::offer(offer.sdp))
    }

    async fn create_answer(&self) -> Result<SessionDescription, NegotiationError> {
        let answer = self.peer_connection.create_answer(None).await?;
        self.peer_connection
            .set_local_description(answer.clone())
            .await?;
        Ok(SessionDescription::answer(answer.sdp))
    }

    async fn set_remote_description(
        &self,
        description: SessionDescription,
    ) -> Result<(), NegotiationError> {
        let description = Self::to_rtc_description(description)?;
        self.peer_connection
            .set_remote_description(description)
            .await?;
        Ok(())
    }

    async fn add_ice_candidate(&self, candidate: IceCandidate) -> Result<(), NegotiationError> {
        // An empty candidate line marks the end of the remote's gathering.
        if candidate.candidate.trim().is_empty() {
            debug!("End of remote candidates from {}", self.peer_id);
            return Ok(());
        }
        let init = RTCIceCandidateInit {
            candidate: candidate.candidate,
            sdp_mid: candidate.sdp_mid,
            sdp_mline_index: candidate.sdp_m_line_index,
            username_fragment: candidate.username_fragment,
        };
        self.peer_connection.add_ice_candidate(init).await?;
        Ok(())
    }

    async fn close(&self) -> Result<(), NegotiationError> {
        self.peer_connection.close().await?;
        Ok(())
    }
}
