//! Receive-only WebRTC peer backed by webrtc-rs.

use std::sync::Arc;

use async_trait::async_trait;
use depthlink_core::{AccessUnit, AcquisitionError};
use depthlink_signaling::{PeerSession, SessionDescription};
use tokio::sync::{mpsc, watch};
use tracing::{debug, info, warn};
use webrtc::api::interceptor_registry::register_default_interceptors;
use webrtc::api::media_engine::MediaEngine;
use webrtc::api::APIBuilder;
use webrtc::ice_transport::ice_connection_state::RTCIceConnectionState;
use webrtc::ice_transport::ice_gatherer_state::RTCIceGathererState;
use webrtc::interceptor::registry::Registry;
use webrtc::peer_connection::configuration::RTCConfiguration;
use webrtc::peer_connection::sdp::session_description::RTCSessionDescription;
use webrtc::peer_connection::RTCPeerConnection;
use webrtc::rtp_transceiver::rtp_codec::RTPCodecType;
use webrtc::rtp_transceiver::rtp_receiver::RTCRtpReceiver;
use webrtc::rtp_transceiver::rtp_transceiver_direction::RTCRtpTransceiverDirection;
use webrtc::rtp_transceiver::{RTCRtpTransceiver, RTCRtpTransceiverInit};
use webrtc::track::track_remote::TrackRemote;

use crate::track::{read_video_track, AccessUnitSink, TrackStats};

/// Access units buffered between the RTP reader and the decoder.
pub const ACCESS_UNIT_QUEUE: usize = 64;

fn peer_err(context: &str, e: impl std::fmt::Display) -> AcquisitionError {
    AcquisitionError::Peer { reason: format!("{context}: {e}") }
}

// MARK: - WebRtcPeer

pub struct WebRtcPeer {
    pc: Arc<RTCPeerConnection>,
    gathering_done: watch::Receiver<bool>,
    ice_state: watch::Receiver<String>,
    stats: Arc<TrackStats>,
}

/// Receiving end of the video track.
pub struct VideoTrackReceiver {
    pub units: mpsc::Receiver<AccessUnit>,
    pub stats: Arc<TrackStats>,
}

impl WebRtcPeer {
    /// Build a peer with no ICE servers (local network only) and one
    /// receive-only video transceiver.
    pub async fn new() -> Result<(Self, VideoTrackReceiver), AcquisitionError> {
        let mut media_engine = MediaEngine::default();
        media_engine.register_default_codecs().map_err(|e| peer_err("register codecs", e))?;

        let registry = register_default_interceptors(Registry::new(), &mut media_engine)
            .map_err(|e| peer_err("register interceptors", e))?;

        let api = APIBuilder::new()
            .with_media_engine(media_engine)
            .with_interceptor_registry(registry)
            .build();

        let pc = api
            .new_peer_connection(RTCConfiguration::default())
            .await
            .map_err(|e| peer_err("create peer connection", e))?;
        let pc = Arc::new(pc);

        pc.add_transceiver_from_kind(
            RTPCodecType::Video,
            Some(RTCRtpTransceiverInit {
                direction: RTCRtpTransceiverDirection::Recvonly,
                send_encodings: vec![],
            }),
        )
        .await
        .map_err(|e| peer_err("add video transceiver", e))?;

        let (units_tx, units_rx) = mpsc::channel(ACCESS_UNIT_QUEUE);
        let stats = Arc::new(TrackStats::default());
        let sink = AccessUnitSink::new(units_tx, stats.clone());

        pc.on_track(Box::new(
            move |track: Arc<TrackRemote>, _receiver: Arc<RTCRtpReceiver>, _transceiver: Arc<RTCRtpTransceiver>| {
                let sink = sink.clone();
                Box::pin(async move {
                    let mime = track.codec().capability.mime_type.to_lowercase();
                    if track.kind() == RTPCodecType::Video && mime.contains("h264") {
                        tokio::spawn(read_video_track(track, sink));
                    } else {
                        warn!("Peer: ignoring track {} ({:?})", mime, track.kind());
                    }
                })
            },
        ));

        let (gathering_tx, gathering_done) = watch::channel(false);
        pc.on_ice_gathering_state_change(Box::new(move |state: RTCIceGathererState| {
            debug!("Peer: ICE gathering {}", state);
            if state == RTCIceGathererState::Complete {
                gathering_tx.send_replace(true);
            }
            Box::pin(async {})
        }));

        let (ice_tx, ice_state) = watch::channel(RTCIceConnectionState::New.to_string());
        pc.on_ice_connection_state_change(Box::new(move |state: RTCIceConnectionState| {
            info!("Peer: ICE connection {}", state);
            ice_tx.send_replace(state.to_string());
            Box::pin(async {})
        }));

        let peer = Self { pc, gathering_done, ice_state, stats: stats.clone() };
        Ok((peer, VideoTrackReceiver { units: units_rx, stats }))
    }

    /// Latest ICE connection state, for the status line.
    pub fn ice_state(&self) -> watch::Receiver<String> {
        self.ice_state.clone()
    }

    pub fn stats(&self) -> &Arc<TrackStats> {
        &self.stats
    }

    pub async fn close(&self) {
        if let Err(e) = self.pc.close().await {
            warn!("Peer: close failed: {}", e);
        }
    }
}

#[async_trait]
impl PeerSession for WebRtcPeer {
    async fn apply_offer(&self, offer: SessionDescription) -> Result<(), AcquisitionError> {
        let offer = RTCSessionDescription::offer(offer.sdp).map_err(|e| peer_err("parse offer", e))?;
        self.pc
            .set_remote_description(offer)
            .await
            .map_err(|e| peer_err("set remote description", e))
    }

    async fn create_answer(&self) -> Result<(), AcquisitionError> {
        let answer = self.pc.create_answer(None).await.map_err(|e| peer_err("create answer", e))?;
        self.pc
            .set_local_description(answer)
            .await
            .map_err(|e| peer_err("set local description", e))
    }

    async fn ice_gathering_complete(&self) {
        let mut done = self.gathering_done.clone();
        let sender_gone = done.wait_for(|complete| *complete).await.is_err();
        if sender_gone {
            // Sender dropped with the peer connection; gathering will never finish
            std::future::pending::<()>().await;
        }
    }

    async fn local_description(&self) -> Option<SessionDescription> {
        self.pc.local_description().await.map(|desc| SessionDescription::answer(desc.sdp))
    }
}
