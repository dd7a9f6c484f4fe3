use thiserror::Error;

#[derive(Error, Debug)]
pub enum DepthLinkError {
    #[error("Configuration invalid: {reason}")]
    ConfigurationInvalid { reason: String },

    #[error("Stream acquisition failed: {0}")]
    Acquisition(#[from] AcquisitionError),

    #[error("Device error: {0}")]
    Device(#[from] DeviceError),

    #[error("Frame error: {0}")]
    Frame(#[from] FrameError),

    #[error("Decoder error: {0}")]
    Decoder(#[from] DecoderError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Failures while negotiating a stream with the signaling server.
///
/// All of these leave the session retryable: the caller goes back to idle and
/// re-enables the connect action.
#[derive(Error, Debug)]
pub enum AcquisitionError {
    #[error("Invalid server address: {address:?}")]
    InvalidAddress { address: String },

    #[error("Already connecting or streaming")]
    AlreadyActive,

    #[error("HTTP request to {endpoint} failed: {reason}")]
    Http { endpoint: String, reason: String },

    #[error("{endpoint} returned HTTP {status}")]
    Status { endpoint: String, status: u16 },

    #[error("Unexpected payload from {endpoint}: {reason}")]
    Payload { endpoint: String, reason: String },

    #[error("Peer connection error: {reason}")]
    Peer { reason: String },

    #[error("No local session description after ICE gathering")]
    MissingLocalDescription,
}

/// Capture device failures (microphone, camera). Reported, never fatal.
#[derive(Error, Debug)]
pub enum DeviceError {
    #[error("No {device} device available")]
    Unavailable { device: String },

    #[error("Unsupported {device} sample format: {format}")]
    UnsupportedFormat { device: String, format: String },

    #[error("Failed to open {device} stream: {reason}")]
    StreamFailed { device: String, reason: String },
}

#[derive(Error, Debug)]
pub enum DecoderError {
    #[error("No H.264 decoder element available")]
    NoDecoderAvailable,

    #[error("GStreamer pipeline error: {0}")]
    Pipeline(String),

    #[error("Failed to decode access unit: {reason}")]
    DecodeFailed { reason: String },

    #[error("Decoded caps unusable: {reason}")]
    Caps { reason: String },

    #[error(transparent)]
    Frame(#[from] FrameError),
}

#[derive(Error, Debug, PartialEq, Eq)]
pub enum FrameError {
    #[error("RGBA buffer holds {actual} bytes, {width}x{height} needs {expected}")]
    LengthMismatch {
        width: u32,
        height: u32,
        expected: usize,
        actual: usize,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn acquisition_error_messages_name_the_endpoint() {
        let err = AcquisitionError::Status { endpoint: "http://phone:8080/getOffer".into(), status: 503 };
        assert_eq!(err.to_string(), "http://phone:8080/getOffer returned HTTP 503");

        let top: DepthLinkError = err.into();
        assert!(top.to_string().starts_with("Stream acquisition failed:"));
    }
}
