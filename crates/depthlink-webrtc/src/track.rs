//! Remote video track → access-unit channel.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use depthlink_core::AccessUnit;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};
use webrtc::track::track_remote::TrackRemote;

use crate::depacketizer::H264Depacketizer;

/// Counters for the incoming video track.
#[derive(Debug, Default)]
pub struct TrackStats {
    pub packets: AtomicU64,
    pub bytes: AtomicU64,
    pub access_units: AtomicU64,
}

impl TrackStats {
    pub fn snapshot(&self) -> TrackStatsSnapshot {
        TrackStatsSnapshot {
            packets: self.packets.load(Ordering::Relaxed),
            bytes: self.bytes.load(Ordering::Relaxed),
            access_units: self.access_units.load(Ordering::Relaxed),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TrackStatsSnapshot {
    pub packets: u64,
    pub bytes: u64,
    pub access_units: u64,
}

/// Hands completed access units to the decoder side.
///
/// Every unit is delivered in order. When the channel is full the RTP reader
/// waits for the decoder instead of skipping a unit the next P-frame would
/// reference.
#[derive(Debug, Clone)]
pub struct AccessUnitSink {
    tx: mpsc::Sender<AccessUnit>,
    stats: Arc<TrackStats>,
}

impl AccessUnitSink {
    pub fn new(tx: mpsc::Sender<AccessUnit>, stats: Arc<TrackStats>) -> Self {
        Self { tx, stats }
    }

    /// Returns `false` once the receiving side has gone away.
    pub async fn send(&self, unit: AccessUnit) -> bool {
        let n = self.stats.access_units.fetch_add(1, Ordering::Relaxed) + 1;
        if n <= 3 || n % 300 == 0 {
            debug!(
                "Track: access unit #{} ({} bytes, ts={}, queue capacity {})",
                n,
                unit.data.len(),
                unit.timestamp,
                self.tx.capacity()
            );
        }
        self.tx.send(unit).await.is_ok()
    }

    pub fn stats(&self) -> &Arc<TrackStats> {
        &self.stats
    }
}

/// Read RTP from `track` until it ends, depacketizing into `sink`.
pub async fn read_video_track(track: Arc<TrackRemote>, sink: AccessUnitSink) {
    let mut depacketizer = H264Depacketizer::new();
    info!("Track: reading {} (ssrc={})", track.codec().capability.mime_type, track.ssrc());

    loop {
        let (packet, _) = match track.read_rtp().await {
            Ok(read) => read,
            Err(e) => {
                if is_end_of_track(&e.to_string()) {
                    info!("Track: ended ({})", e);
                } else {
                    warn!("Track: RTP read failed, stopping: {}", e);
                }
                break;
            }
        };

        let payload = packet.payload.as_ref();
        sink.stats.packets.fetch_add(1, Ordering::Relaxed);
        sink.stats.bytes.fetch_add(payload.len() as u64, Ordering::Relaxed);

        if let Some(unit) = depacketizer.push(payload, packet.header.timestamp, packet.header.marker) {
            if !sink.send(unit).await {
                info!("Track: decoder gone, stopping reader");
                break;
            }
        }
    }
}

fn is_end_of_track(message: &str) -> bool {
    let message = message.to_lowercase();
    ["eof", "closed", "must not be"].iter().any(|needle| message.contains(needle))
}
