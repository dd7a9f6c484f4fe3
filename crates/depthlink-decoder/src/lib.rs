//! depthlink-decoder
//!
//! H.264 access units → RGBA [`VideoFrame`]s via GStreamer.
//!
//! # Pipeline
//! ```text
//! appsrc → h264parse → [decoder] → videoconvert → video/x-raw,format=RGBA → appsink
//! ```
//! Frame dimensions come from the negotiated caps, so a resolution change on
//! the sender side is picked up without rebuilding the pipeline.
//!
//! # Decoder priority
//! 1. `vaapih264dec`: VA-API
//! 2. `nvh264dec`: NVIDIA NVDEC
//! 3. `avdec_h264`: software libavcodec

use depthlink_core::{AccessUnit, DecoderError, FrameSlot, VideoFrame};
use gstreamer as gst;
use gstreamer::prelude::*;
use gstreamer_app::{AppSink, AppSrc};
use gstreamer_video::VideoInfo;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

/// Decoder candidates in priority order.
static DECODER_PRIORITY: &[(&str, &str)] = &[
    ("vaapih264dec", "VA-API H.264"),
    ("nvh264dec", "NVIDIA NVDEC H.264"),
    ("avdec_h264", "Software libavcodec"),
];

/// RTP video clock rate.
const RTP_CLOCK_HZ: u64 = 90_000;

// ── Selection ─────────────────────────────────────────────────────────────────

/// Returns the name of the highest-priority available H.264 decoder element.
pub fn select_best_decoder() -> Option<&'static str> {
    if gst::init().is_err() {
        return None;
    }
    for (element, label) in DECODER_PRIORITY {
        if gst::ElementFactory::find(element).is_some() {
            info!("Selected decoder: {} ({})", element, label);
            return Some(element);
        }
        warn!("Decoder '{}' not found, trying next", element);
    }
    None
}

// ── Helpers ───────────────────────────────────────────────────────────────────

/// RTP timestamp → presentation time, relative to the first unit seen.
fn rtp_to_pts(first: u32, timestamp: u32) -> gst::ClockTime {
    let ticks = timestamp.wrapping_sub(first) as u64;
    gst::ClockTime::from_nseconds(ticks * 1_000_000_000 / RTP_CLOCK_HZ)
}

/// Copy `height` rows of `width` RGBA pixels out of a strided plane.
fn pack_rows(plane: &[u8], width: u32, height: u32, stride: usize) -> Result<Vec<u8>, DecoderError> {
    let row = width as usize * VideoFrame::BYTES_PER_PIXEL;
    if height > 0 && (stride < row || plane.len() < stride * (height as usize - 1) + row) {
        return Err(DecoderError::Caps {
            reason: format!("plane of {} bytes too small for {}x{} stride {}", plane.len(), width, height, stride),
        });
    }
    if stride == row {
        return Ok(plane[..row * height as usize].to_vec());
    }
    let mut packed = Vec::with_capacity(row * height as usize);
    for y in 0..height as usize {
        packed.extend_from_slice(&plane[y * stride..y * stride + row]);
    }
    Ok(packed)
}

// ── GStreamerDecoder ──────────────────────────────────────────────────────────

/// Synchronous H.264 decoder backed by a GStreamer pipeline.
///
/// **Must be driven from a blocking thread**: `try_pull_sample` blocks.
pub struct GStreamerDecoder {
    pipeline: gst::Pipeline,
    appsrc: AppSrc,
    appsink: AppSink,
    element: &'static str,
    first_timestamp: Option<u32>,
    pull_timeout: gst::ClockTime,
    frames: u64,
}

impl GStreamerDecoder {
    /// Build and start the pipeline. Requires `gst::init()` to have been called.
    pub fn new(element: &'static str) -> Result<Self, DecoderError> {
        let pipeline_str = format!(
            "appsrc name=src format=time is-live=true \
             ! h264parse \
             ! {element} \
             ! videoconvert \
             ! video/x-raw,format=RGBA \
             ! appsink name=sink sync=false max-buffers=2 drop=true"
        );

        let pipeline = gst::parse::launch(&pipeline_str)
            .map_err(|e| DecoderError::Pipeline(e.to_string()))?
            .downcast::<gst::Pipeline>()
            .map_err(|_| DecoderError::Pipeline("Not a pipeline".into()))?;

        let appsrc = pipeline
            .by_name("src")
            .and_then(|element| element.downcast::<AppSrc>().ok())
            .ok_or_else(|| DecoderError::Pipeline("No appsrc".into()))?;

        let appsink = pipeline
            .by_name("sink")
            .and_then(|element| element.downcast::<AppSink>().ok())
            .ok_or_else(|| DecoderError::Pipeline("No appsink".into()))?;

        let src_caps = gst::Caps::builder("video/x-h264")
            .field("stream-format", "byte-stream")
            .field("alignment", "au")
            .build();
        appsrc.set_caps(Some(&src_caps));

        pipeline
            .set_state(gst::State::Playing)
            .map_err(|_| DecoderError::Pipeline("Failed to start pipeline".into()))?;

        info!("GStreamerDecoder({}) ready", element);
        Ok(Self {
            pipeline,
            appsrc,
            appsink,
            element,
            first_timestamp: None,
            pull_timeout: gst::ClockTime::from_mseconds(20),
            frames: 0,
        })
    }

    /// Push one access unit and return the newest decoded frame, if any.
    ///
    /// `None` is normal while the decoder is still waiting for a keyframe or
    /// buffering.
    pub fn decode(&mut self, unit: &AccessUnit) -> Result<Option<VideoFrame>, DecoderError> {
        let first = *self.first_timestamp.get_or_insert(unit.timestamp);

        let mut gst_buf = gst::Buffer::from_slice(unit.data.clone());
        if let Some(buf) = gst_buf.get_mut() {
            buf.set_pts(rtp_to_pts(first, unit.timestamp));
        }
        self.appsrc
            .push_buffer(gst_buf)
            .map_err(|e| DecoderError::DecodeFailed { reason: format!("appsrc push failed: {e:?}") })?;

        // Wait briefly for the first sample, then drain whatever else is ready
        let mut latest = None;
        let mut timeout = self.pull_timeout;
        while let Some(sample) = self.appsink.try_pull_sample(timeout) {
            latest = Some(sample);
            timeout = gst::ClockTime::ZERO;
        }
        let Some(sample) = latest else { return Ok(None) };

        let frame = sample_to_frame(&sample)?;
        self.frames += 1;
        if self.frames <= 3 || self.frames % 300 == 0 {
            debug!("GStreamerDecoder({}): frame #{} {}x{}", self.element, self.frames, frame.width(), frame.height());
        }
        Ok(Some(frame))
    }

    pub fn element_name(&self) -> &str {
        self.element
    }

    pub fn is_hardware_accelerated(&self) -> bool {
        self.element != "avdec_h264"
    }

    pub fn frames_decoded(&self) -> u64 {
        self.frames
    }
}

impl Drop for GStreamerDecoder {
    fn drop(&mut self) {
        let _ = self.pipeline.set_state(gst::State::Null);
    }
}

fn sample_to_frame(sample: &gst::Sample) -> Result<VideoFrame, DecoderError> {
    let caps = sample.caps().ok_or_else(|| DecoderError::Caps { reason: "sample without caps".into() })?;
    let info = VideoInfo::from_caps(caps).map_err(|e| DecoderError::Caps { reason: e.to_string() })?;
    let buffer = sample
        .buffer()
        .ok_or_else(|| DecoderError::DecodeFailed { reason: "no buffer in sample".into() })?;
    let map = buffer
        .map_readable()
        .map_err(|_| DecoderError::DecodeFailed { reason: "read map failed".into() })?;

    let stride = info.stride().first().copied().unwrap_or(0).max(0) as usize;
    let rgba = pack_rows(map.as_slice(), info.width(), info.height(), stride)?;
    Ok(VideoFrame::new(info.width(), info.height(), rgba)?)
}

// ── DecoderFactory ────────────────────────────────────────────────────────────

pub struct DecoderFactory;

impl DecoderFactory {
    /// Initialise GStreamer and the best available decoder.
    pub fn best_available() -> Result<GStreamerDecoder, DecoderError> {
        gst::init().map_err(|e| DecoderError::Pipeline(e.to_string()))?;
        let element = select_best_decoder().ok_or(DecoderError::NoDecoderAvailable)?;
        GStreamerDecoder::new(element)
    }
}

// ── Decode worker ─────────────────────────────────────────────────────────────

/// Drain `units` on a blocking thread, publishing every decoded frame into
/// `slot`. Ends when the sender side closes.
pub fn spawn_decode_worker(
    mut decoder: GStreamerDecoder,
    mut units: mpsc::Receiver<AccessUnit>,
    slot: FrameSlot,
) -> tokio::task::JoinHandle<()> {
    tokio::task::spawn_blocking(move || {
        let mut failures = 0u64;
        while let Some(unit) = units.blocking_recv() {
            match decoder.decode(&unit) {
                Ok(Some(frame)) => slot.publish(frame),
                Ok(None) => {}
                Err(e) => {
                    failures += 1;
                    if failures <= 3 || failures % 300 == 0 {
                        warn!("Decode failed (#{}): {}", failures, e);
                    }
                }
            }
        }
        info!("Decode worker stopped after {} frames", decoder.frames_decoded());
    })
}
