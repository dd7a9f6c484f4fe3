// depthlink-webrtc: receive side of the LiDAR video stream
//
//   - WebRtcPeer: recvonly peer connection, implements PeerSession
//   - H264Depacketizer: RTP payloads → Annex-B access units
//   - read_video_track: per-track RTP loop feeding a bounded channel

pub mod depacketizer;
pub mod peer;
pub mod track;

pub use depacketizer::H264Depacketizer;
pub use peer::{VideoTrackReceiver, WebRtcPeer, ACCESS_UNIT_QUEUE};
pub use track::{read_video_track, AccessUnitSink, TrackStats, TrackStatsSnapshot};
