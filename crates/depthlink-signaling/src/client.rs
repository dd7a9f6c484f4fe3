//! HTTP client for the phone-side relay.
//!
//! ```text
//! GET  /metadata  → JSON (logged only)
//! GET  /getOffer  → {"type": "offer", "sdp": "..."}
//! POST /answer    ← {"type": "answer", "data": "<sdp>"}
//! ```

use bytes::Bytes;
use depthlink_core::{AcquisitionError, ServerAddress};
use http_body_util::{BodyExt, Full};
use hyper::{header, Method, Request};
use hyper_util::client::legacy::connect::HttpConnector;
use hyper_util::client::legacy::Client;
use hyper_util::rt::TokioExecutor;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

type HttpClient = Client<hyper_rustls::HttpsConnector<HttpConnector>, Full<Bytes>>;

// ── Wire types ────────────────────────────────────────────────────────────────

/// Session description as the relay serves it from `/getOffer`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionDescription {
    #[serde(rename = "type")]
    pub kind: String,
    pub sdp: String,
}

impl SessionDescription {
    pub fn offer(sdp: impl Into<String>) -> Self {
        Self { kind: "offer".into(), sdp: sdp.into() }
    }

    pub fn answer(sdp: impl Into<String>) -> Self {
        Self { kind: "answer".into(), sdp: sdp.into() }
    }
}

/// Body of `POST /answer`. The relay expects the SDP under `data`.
#[derive(Debug, Serialize)]
struct AnswerBody<'a> {
    #[serde(rename = "type")]
    kind: &'static str,
    data: &'a str,
}

// ── SignalingClient ───────────────────────────────────────────────────────────

pub struct SignalingClient {
    server: ServerAddress,
    http: HttpClient,
}

impl SignalingClient {
    pub fn new(server: ServerAddress) -> Self {
        // Install ring crypto provider (ignored if already installed)
        let _ = rustls::crypto::ring::default_provider().install_default();

        let https = hyper_rustls::HttpsConnectorBuilder::new()
            .with_webpki_roots()
            .https_or_http()
            .enable_http1()
            .build();
        let http = Client::builder(TokioExecutor::new()).build(https);
        Self { server, http }
    }

    pub fn server(&self) -> &ServerAddress {
        &self.server
    }

    /// `GET /metadata`. The payload is informational only.
    pub async fn metadata(&self) -> Result<serde_json::Value, AcquisitionError> {
        let endpoint = self.server.endpoint("/metadata");
        let body = self.send(Method::GET, &endpoint, None).await?;
        let meta: serde_json::Value = parse_json(&endpoint, &body)?;
        info!("metadata {}", meta);
        Ok(meta)
    }

    /// `GET /getOffer`.
    pub async fn offer(&self) -> Result<SessionDescription, AcquisitionError> {
        let endpoint = self.server.endpoint("/getOffer");
        let body = self.send(Method::GET, &endpoint, None).await?;
        let offer: SessionDescription = parse_json(&endpoint, &body)?;
        debug!("Offer received ({} bytes of SDP)", offer.sdp.len());
        Ok(offer)
    }

    /// `POST /answer` with the local SDP.
    pub async fn post_answer(&self, sdp: &str) -> Result<(), AcquisitionError> {
        let endpoint = self.server.endpoint("/answer");
        let body = serde_json::to_vec(&AnswerBody { kind: "answer", data: sdp }).map_err(|e| {
            AcquisitionError::Payload { endpoint: endpoint.clone(), reason: e.to_string() }
        })?;
        self.send(Method::POST, &endpoint, Some(Bytes::from(body))).await?;
        info!("Answer posted to {}", endpoint);
        Ok(())
    }

    async fn send(
        &self,
        method: Method,
        endpoint: &str,
        json_body: Option<Bytes>,
    ) -> Result<Bytes, AcquisitionError> {
        let http_err = |reason: String| AcquisitionError::Http { endpoint: endpoint.to_owned(), reason };

        let mut builder = Request::builder().method(method).uri(endpoint);
        if json_body.is_some() {
            builder = builder.header(header::CONTENT_TYPE, "application/json");
        }
        let request = builder
            .body(Full::new(json_body.unwrap_or_default()))
            .map_err(|e| http_err(e.to_string()))?;

        let response = self.http.request(request).await.map_err(|e| http_err(e.to_string()))?;
        let status = response.status();
        let body = response
            .into_body()
            .collect()
            .await
            .map_err(|e| http_err(e.to_string()))?
            .to_bytes();

        if !status.is_success() {
            return Err(AcquisitionError::Status { endpoint: endpoint.to_owned(), status: status.as_u16() });
        }
        Ok(body)
    }
}

fn parse_json<T: serde::de::DeserializeOwned>(endpoint: &str, body: &[u8]) -> Result<T, AcquisitionError> {
    serde_json::from_slice(body)
        .map_err(|e| AcquisitionError::Payload { endpoint: endpoint.to_owned(), reason: e.to_string() })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn answer_body_uses_data_field() {
        let json = serde_json::to_value(AnswerBody { kind: "answer", data: "v=0\r\n" }).unwrap();
        assert_eq!(json, serde_json::json!({"type": "answer", "data": "v=0\r\n"}));
    }

    #[test]
    fn offer_parses_from_relay_json() {
        let offer: SessionDescription = parse_json("x", br#"{"type":"offer","sdp":"v=0"}"#).unwrap();
        assert_eq!(offer, SessionDescription::offer("v=0"));

        let err = parse_json::<SessionDescription>("http://p/getOffer", b"{}").unwrap_err();
        assert!(matches!(err, AcquisitionError::Payload { .. }));
    }
}
