use serde::{Deserialize, Serialize};

use crate::errors::{AcquisitionError, FrameError};

// MARK: - VideoFrame

/// One decoded RGBA video frame.
///
/// The left half of the frame carries depth encoded as hue; in dual-half mode
/// the right half carries the matching true-colour image.
#[derive(Debug, Clone, PartialEq)]
pub struct VideoFrame {
    width: u32,
    height: u32,
    rgba: Vec<u8>,
}

impl VideoFrame {
    pub const BYTES_PER_PIXEL: usize = 4;

    /// Wrap an RGBA buffer. The buffer length must be exactly `width * height * 4`.
    pub fn new(width: u32, height: u32, rgba: Vec<u8>) -> Result<Self, FrameError> {
        let expected = width as usize * height as usize * Self::BYTES_PER_PIXEL;
        if rgba.len() != expected {
            return Err(FrameError::LengthMismatch { width, height, expected, actual: rgba.len() });
        }
        Ok(Self { width, height, rgba })
    }

    /// A frame with no pixels. This is what a video element reports before
    /// the first decoded picture arrives.
    pub fn empty() -> Self {
        Self { width: 0, height: 0, rgba: Vec::new() }
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn is_degenerate(&self) -> bool {
        self.width == 0 || self.height == 0
    }

    pub fn as_rgba(&self) -> &[u8] {
        &self.rgba
    }

    /// RGB of the pixel at `(x, y)`. Alpha is ignored.
    #[inline]
    pub fn rgb(&self, x: u32, y: u32) -> [u8; 3] {
        let i = (y as usize * self.width as usize + x as usize) * Self::BYTES_PER_PIXEL;
        [self.rgba[i], self.rgba[i + 1], self.rgba[i + 2]]
    }
}

impl Default for VideoFrame {
    fn default() -> Self {
        Self::empty()
    }
}

// MARK: - AccessUnit

/// One encoded H.264 picture in Annex-B byte-stream form, as reassembled from
/// RTP.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccessUnit {
    pub data: bytes::Bytes,
    /// RTP timestamp (90 kHz clock).
    pub timestamp: u32,
}

// MARK: - FrameMode

/// How the frame's halves are interpreted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum FrameMode {
    /// Left half is depth-as-hue, right half is colour.
    #[default]
    DualHalf,
    /// Only depth is used; points get a fixed colour and invalid depth is dropped.
    DepthOnly,
}

// MARK: - AxisConvention

/// Mapping from camera-space `(X, Y, Z)` to scene axes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum AxisConvention {
    /// `(X, -Y, -Z)`: rows grow downward, the cloud faces the viewer.
    #[default]
    FacingViewer,
    /// `(Z, -Y, -X)`: the cloud rotated a quarter turn about the up axis.
    QuarterTurn,
}

impl AxisConvention {
    #[inline]
    pub fn apply(self, x: f32, y: f32, z: f32) -> [f32; 3] {
        match self {
            Self::FacingViewer => [x, -y, -z],
            Self::QuarterTurn => [z, -y, -x],
        }
    }
}

// MARK: - SessionState

/// Connect-to-render lifecycle of one viewer session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SessionState {
    #[default]
    Idle,
    Connecting,
    /// Terminal for the session.
    Streaming,
}

impl SessionState {
    pub fn is_active(&self) -> bool {
        matches!(self, Self::Connecting | Self::Streaming)
    }

    pub fn label(&self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Connecting => "connecting...",
            Self::Streaming => "streaming",
        }
    }
}

impl std::fmt::Display for SessionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

// MARK: - ServerAddress

/// Normalised signaling server base URL: scheme present, no trailing slash.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ServerAddress(String);

impl ServerAddress {
    pub fn parse(input: &str) -> Result<Self, AcquisitionError> {
        let trimmed = input.trim();
        if trimmed.is_empty() {
            return Err(AcquisitionError::InvalidAddress { address: input.to_owned() });
        }
        let mut server = if trimmed.starts_with("http") {
            trimmed.to_owned()
        } else {
            format!("http://{trimmed}")
        };
        let kept = server.trim_end_matches('/').len();
        server.truncate(kept);
        if server.ends_with("://") || server == "http:" || server == "https:" {
            return Err(AcquisitionError::InvalidAddress { address: input.to_owned() });
        }
        Ok(Self(server))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// `base + path`; `path` starts with `/`.
    pub fn endpoint(&self, path: &str) -> String {
        format!("{}{}", self.0, path)
    }
}

impl std::fmt::Display for ServerAddress {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}
