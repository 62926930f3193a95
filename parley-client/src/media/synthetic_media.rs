use crate::error::MediaError;
use crate::media::media_capture::{LocalMedia, LocalTrack, MediaCapture, TrackKind};
use async_trait::async_trait;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tracing::{debug, info};
use webrtc::api::media_engine::{MIME_TYPE_OPUS, MIME_TYPE_VP8};
use webrtc::rtp_transceiver::rtp_codec::RTCRtpCodecCapability;
use webrtc::track::track_local::track_local_static_sample::TrackLocalStaticSample;

const STREAM_ID: &str = "parley-local";

/// Device-less capture for headless clients: produces an Opus audio track and
/// a VP8 video track that peers can negotiate against, and remembers the
/// mute/camera switches.
pub struct SyntheticMedia {
    acquired: AtomicBool,
    audio_enabled: AtomicBool,
    video_enabled: AtomicBool,
}

impl SyntheticMedia {
    pub fn new() -> Self {
        Self {
            acquired: AtomicBool::new(false),
            audio_enabled: AtomicBool::new(true),
            video_enabled: AtomicBool::new(true),
        }
    }

    pub fn is_acquired(&self) -> bool {
        self.acquired.load(Ordering::SeqCst)
    }

    pub fn is_track_enabled(&self, kind: TrackKind) -> bool {
        match kind {
            TrackKind::Audio => self.audio_enabled.load(Ordering::SeqCst),
            TrackKind::Video => self.video_enabled.load(Ordering::SeqCst),
        }
    }

    fn build_tracks() -> Vec<LocalTrack> {
        let audio = TrackLocalStaticSample::new(
            RTCRtpCodecCapability {
                mime_type: MIME_TYPE_OPUS.to_owned(),
                clock_rate: 48000,
                channels: 2,
                ..Default::default()
            },
            "audio".to_owned(),
            STREAM_ID.to_owned(),
        );
        let video = TrackLocalStaticSample::new(
            RTCRtpCodecCapability {
                mime_type: MIME_TYPE_VP8.to_owned(),
                clock_rate: 90000,
                ..Default::default()
            },
            "video".to_owned(),
            STREAM_ID.to_owned(),
        );

        vec![
            LocalTrack::new(TrackKind::Audio, Arc::new(audio)),
            LocalTrack::new(TrackKind::Video, Arc::new(video)),
        ]
    }
}

impl Default for SyntheticMedia {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl MediaCapture for SyntheticMedia {
    async fn acquire(&self) -> Result<LocalMedia, MediaError> {
        self.acquired.store(true, Ordering::SeqCst);
        info!("Local media acquired (synthetic audio + video)");
        Ok(LocalMedia::new(STREAM_ID, Self::build_tracks()))
    }

    fn set_track_enabled(&self, kind: TrackKind, enabled: bool) {
        debug!("{:?} track enabled: {}", kind, enabled);
        match kind {
            TrackKind::Audio => self.audio_enabled.store(enabled, Ordering::SeqCst),
            TrackKind::Video => self.video_enabled.store(enabled, Ordering::SeqCst),
        }
    }

    async fn release(&self) {
        if self.acquired.swap(false, Ordering::SeqCst) {
            info!("Local media released");
        }
    }
}
