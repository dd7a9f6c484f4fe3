//! Stream acquisition: the offer/answer exchange against the relay.
//!
//! The peer connection itself sits behind [`PeerSession`] so the sequence can
//! run against a fake in tests and against `webrtc` in the viewer.

use std::time::Duration;

use async_trait::async_trait;
use depthlink_core::AcquisitionError;
use tracing::{info, warn};

use crate::client::{SessionDescription, SignalingClient};

// MARK: - PeerSession

/// Receive-only peer connection as seen by the acquisition sequence.
#[async_trait]
pub trait PeerSession: Send + Sync {
    /// Set the relay's offer as the remote description.
    async fn apply_offer(&self, offer: SessionDescription) -> Result<(), AcquisitionError>;

    /// Create an answer and install it as the local description.
    async fn create_answer(&self) -> Result<(), AcquisitionError>;

    /// Resolves once ICE candidate gathering has completed. May never resolve.
    async fn ice_gathering_complete(&self);

    /// Current local description, including whatever candidates have been
    /// gathered so far.
    async fn local_description(&self) -> Option<SessionDescription>;
}

// MARK: - Acquisition

/// Run the full acquisition sequence:
///
/// 1. `GET /metadata` (logged, not interpreted)
/// 2. `GET /getOffer`, set as remote description
/// 3. create the answer, set as local description
/// 4. wait for ICE gathering to complete or `ice_timeout`, whichever is first
/// 5. `POST /answer` with the local description as it stands
///
/// Media arrives through the peer's track callback; this returns once the
/// answer is accepted.
pub async fn acquire_stream<P: PeerSession + ?Sized>(
    client: &SignalingClient,
    peer: &P,
    ice_timeout: Duration,
) -> Result<(), AcquisitionError> {
    info!("Acquiring stream from {}", client.server());

    client.metadata().await?;
    let offer = client.offer().await?;
    peer.apply_offer(offer).await?;
    peer.create_answer().await?;

    wait_for_ice(peer, ice_timeout).await;

    let local = peer.local_description().await.ok_or(AcquisitionError::MissingLocalDescription)?;
    client.post_answer(&local.sdp).await?;

    info!("Stream negotiated with {}", client.server());
    Ok(())
}

/// Returns `true` if gathering completed before the deadline.
pub async fn wait_for_ice<P: PeerSession + ?Sized>(peer: &P, ice_timeout: Duration) -> bool {
    tokio::select! {
        _ = peer.ice_gathering_complete() => {
            info!("ICE gathering complete");
            true
        }
        _ = tokio::time::sleep(ice_timeout) => {
            warn!(
                "ICE gathering still running after {}ms, sending answer with candidates so far",
                ice_timeout.as_millis()
            );
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use depthlink_core::ServerAddress;
    use std::sync::{Arc, Mutex};
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    // ── Fake peer ─────────────────────────────────────────────────────────────

    #[derive(Default)]
    struct FakePeer {
        gathers: bool,
        remote: Mutex<Option<SessionDescription>>,
        answered: Mutex<bool>,
    }

    #[async_trait]
    impl PeerSession for FakePeer {
        async fn apply_offer(&self, offer: SessionDescription) -> Result<(), AcquisitionError> {
            *self.remote.lock().unwrap() = Some(offer);
            Ok(())
        }

        async fn create_answer(&self) -> Result<(), AcquisitionError> {
            *self.answered.lock().unwrap() = true;
            Ok(())
        }

        async fn ice_gathering_complete(&self) {
            if !self.gathers {
                std::future::pending::<()>().await;
            }
        }

        async fn local_description(&self) -> Option<SessionDescription> {
            self.answered.lock().unwrap().then(|| SessionDescription::answer("v=0 answer"))
        }
    }

    // ── Stub relay ────────────────────────────────────────────────────────────

    #[derive(Debug, Clone)]
    struct Recorded {
        request_line: String,
        body: String,
    }

    /// Serves `requests` HTTP/1.1 requests, answering each path from `routes`.
    async fn stub_relay(
        routes: Vec<(&'static str, u16, &'static str)>,
        requests: usize,
    ) -> (String, Arc<Mutex<Vec<Recorded>>>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let log = Arc::new(Mutex::new(Vec::new()));
        let log_task = log.clone();

        tokio::spawn(async move {
            for _ in 0..requests {
                let (mut sock, _) = listener.accept().await.unwrap();
                let mut raw = Vec::new();
                let mut chunk = [0u8; 4096];
                let (head_end, content_len) = loop {
                    let n = sock.read(&mut chunk).await.unwrap();
                    raw.extend_from_slice(&chunk[..n]);
                    if let Some(pos) = raw.windows(4).position(|w| w == b"\r\n\r\n") {
                        let head = String::from_utf8_lossy(&raw[..pos]).to_lowercase();
                        let len = head
                            .lines()
                            .find_map(|l| l.strip_prefix("content-length:"))
                            .map(|v| v.trim().parse::<usize>().unwrap())
                            .unwrap_or(0);
                        break (pos + 4, len);
                    }
                };
                while raw.len() < head_end + content_len {
                    let n = sock.read(&mut chunk).await.unwrap();
                    raw.extend_from_slice(&chunk[..n]);
                }
                let head = String::from_utf8_lossy(&raw[..head_end]).to_string();
                let request_line = head.lines().next().unwrap_or_default().to_string();
                let body = String::from_utf8_lossy(&raw[head_end..head_end + content_len]).to_string();

                let path = request_line.split_whitespace().nth(1).unwrap_or("/").to_string();
                let (status, payload) = routes
                    .iter()
                    .find(|(p, _, _)| *p == path)
                    .map(|(_, s, b)| (*s, *b))
                    .unwrap_or((404, ""));
                log_task.lock().unwrap().push(Recorded { request_line, body });

                let response = format!(
                    "HTTP/1.1 {} X\r\ncontent-type: application/json\r\ncontent-length: {}\r\nconnection: close\r\n\r\n{}",
                    status,
                    payload.len(),
                    payload
                );
                sock.write_all(response.as_bytes()).await.unwrap();
                sock.shutdown().await.ok();
            }
        });

        (format!("http://{}", addr), log)
    }

    fn happy_routes() -> Vec<(&'static str, u16, &'static str)> {
        vec![
            ("/metadata", 200, r#"{"device":"phone"}"#),
            ("/getOffer", 200, r#"{"type":"offer","sdp":"v=0 offer"}"#),
            ("/answer", 200, ""),
        ]
    }

    #[tokio::test]
    async fn full_sequence_posts_answer_under_data() {
        let (base, log) = stub_relay(happy_routes(), 3).await;
        let client = SignalingClient::new(ServerAddress::parse(&base).unwrap());
        let peer = FakePeer { gathers: true, ..Default::default() };

        acquire_stream(&client, &peer, Duration::from_secs(3)).await.unwrap();

        assert_eq!(peer.remote.lock().unwrap().as_ref().unwrap().sdp, "v=0 offer");
        let log = log.lock().unwrap();
        let lines: Vec<_> = log.iter().map(|r| r.request_line.as_str()).collect();
        assert!(lines[0].starts_with("GET /metadata"));
        assert!(lines[1].starts_with("GET /getOffer"));
        assert!(lines[2].starts_with("POST /answer"));

        let posted: serde_json::Value = serde_json::from_str(&log[2].body).unwrap();
        assert_eq!(posted, serde_json::json!({"type": "answer", "data": "v=0 answer"}));
    }

    #[tokio::test(start_paused = true)]
    async fn ice_timeout_bounds_the_wait() {
        let peer = FakePeer::default();
        let completed = wait_for_ice(&peer, Duration::from_millis(3000)).await;
        assert!(!completed);

        let peer = FakePeer { gathers: true, ..Default::default() };
        assert!(wait_for_ice(&peer, Duration::from_millis(3000)).await);
    }

    #[tokio::test]
    async fn stalled_gathering_still_sends_answer() {
        let (base, log) = stub_relay(happy_routes(), 3).await;
        let client = SignalingClient::new(ServerAddress::parse(&base).unwrap());
        let peer = FakePeer::default();

        acquire_stream(&client, &peer, Duration::from_millis(50)).await.unwrap();
        assert_eq!(log.lock().unwrap().len(), 3);
    }

    #[tokio::test]
    async fn offer_failure_stops_before_answer() {
        let routes = vec![("/metadata", 200, "{}"), ("/getOffer", 500, "")];
        let (base, log) = stub_relay(routes, 2).await;
        let client = SignalingClient::new(ServerAddress::parse(&base).unwrap());
        let peer = FakePeer { gathers: true, ..Default::default() };

        let err = acquire_stream(&client, &peer, Duration::from_secs(1)).await.unwrap_err();
        assert!(matches!(err, AcquisitionError::Status { status: 500, .. }));
        assert!(peer.remote.lock().unwrap().is_none());
        assert_eq!(log.lock().unwrap().len(), 2);
    }

    #[tokio::test]
    async fn unreachable_relay_is_an_http_error() {
        // Bind then drop to get a port nothing listens on
        let port = TcpListener::bind("127.0.0.1:0").await.unwrap().local_addr().unwrap().port();
        let client = SignalingClient::new(ServerAddress::parse(&format!("127.0.0.1:{port}")).unwrap());
        let err = client.metadata().await.unwrap_err();
        assert!(matches!(err, AcquisitionError::Http { .. }));
    }
}
