//! Latest-frame-wins hand-off between the video decoder and the render loop.
//!
//! The decoder publishes every frame it produces; the render loop reads
//! whatever is current when its tick runs. Frames that were overwritten before
//! a tick saw them are simply never rendered.

use std::sync::Arc;

use tokio::sync::watch;

use crate::types::VideoFrame;

/// Producer side, owned by whatever decodes the live video track.
#[derive(Debug, Clone)]
pub struct FrameSlot {
    tx: Arc<watch::Sender<Arc<VideoFrame>>>,
}

/// Consumer side, read once per render tick.
#[derive(Debug, Clone)]
pub struct FrameReader {
    rx: watch::Receiver<Arc<VideoFrame>>,
}

impl FrameSlot {
    /// New slot holding an empty (degenerate) frame.
    pub fn new() -> (Self, FrameReader) {
        let (tx, rx) = watch::channel(Arc::new(VideoFrame::empty()));
        (Self { tx: Arc::new(tx) }, FrameReader { rx })
    }

    /// Replace the current frame. Never blocks and never fails, even after
    /// every reader is gone.
    pub fn publish(&self, frame: VideoFrame) {
        self.tx.send_replace(Arc::new(frame));
    }

    pub fn reader(&self) -> FrameReader {
        FrameReader { rx: self.tx.subscribe() }
    }
}

impl FrameReader {
    /// The frame the video surface currently shows.
    pub fn current(&self) -> Arc<VideoFrame> {
        Arc::clone(&self.rx.borrow())
    }
}
