//! One viewer session: connection state, the status/error text shown to the
//! user, and the audio level acquired on the first connect.

use std::sync::Arc;

use depthlink_audio::{AudioLevel, Silence};
use depthlink_core::{AcquisitionError, DepthLinkError, DeviceError, SessionState};
use tracing::{info, warn};

pub struct Session {
    state: SessionState,
    status: String,
    error: Option<String>,
    fps: Option<String>,
    audio: Option<Arc<dyn AudioLevel>>,
}

impl Default for Session {
    fn default() -> Self {
        Self::new()
    }
}

impl Session {
    pub fn new() -> Self {
        Self {
            state: SessionState::Idle,
            status: SessionState::Idle.label().to_owned(),
            error: None,
            fps: None,
            audio: None,
        }
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn status(&self) -> &str {
        &self.status
    }

    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    pub fn fps(&self) -> Option<&str> {
        self.fps.as_deref()
    }

    // ── Transitions ──────────────────────────────────────────────────────────

    /// Idle → Connecting. Rejected while a connection is in flight or
    /// streaming.
    pub fn begin_connect(&mut self) -> Result<(), AcquisitionError> {
        if self.state.is_active() {
            return Err(AcquisitionError::AlreadyActive);
        }
        self.set_state(SessionState::Connecting);
        self.error = None;
        Ok(())
    }

    /// Connecting → Streaming.
    pub fn connect_succeeded(&mut self) {
        if self.state == SessionState::Connecting {
            self.set_state(SessionState::Streaming);
        }
    }

    /// Connecting → Idle with the failure surfaced; the connect action is
    /// available again.
    pub fn connect_failed(&mut self, err: &DepthLinkError) {
        self.error = Some(err.to_string());
        if self.state == SessionState::Connecting {
            self.set_state(SessionState::Idle);
        }
    }

    fn set_state(&mut self, state: SessionState) {
        info!("Session: {} → {}", self.state, state);
        self.state = state;
        self.status = state.label().to_owned();
    }

    // ── Status surface ───────────────────────────────────────────────────────

    /// Peer connection state change, shown as `state: <ice state>`.
    pub fn connection_state_changed(&mut self, ice_state: &str) {
        self.status = format!("state: {ice_state}");
    }

    pub fn set_fps(&mut self, label: String) {
        self.fps = Some(label);
    }

    // ── Audio ────────────────────────────────────────────────────────────────

    /// Audio level for this session, acquired with `open` the first time it
    /// is asked for. A device failure is reported and replaced by silence;
    /// it never blocks the stream.
    pub fn audio_level(
        &mut self,
        open: impl FnOnce() -> Result<Arc<dyn AudioLevel>, DeviceError>,
    ) -> Arc<dyn AudioLevel> {
        if let Some(level) = &self.audio {
            return Arc::clone(level);
        }
        let level = match open() {
            Ok(level) => level,
            Err(e) => {
                warn!("Audio unavailable, continuing without it: {}", e);
                self.error = Some(e.to_string());
                Arc::new(Silence)
            }
        };
        self.audio = Some(Arc::clone(&level));
        level
    }
}
