//! Frame Processor: one RGBA frame in, one point cloud out.
//!
//! # Frame layout
//! ```text
//! ┌──────────────┬──────────────┐
//! │ depth as hue │  true colour │   (dual-half)
//! │  x ∈ [0,half)│ x+half       │
//! └──────────────┴──────────────┘
//! ```
//! `z = hue(left) * depth_range`, back-projected through a pinhole with
//! `fx = half, fy = vh, cx = half/2, cy = vh/2`, then mapped to scene axes.

use depthlink_core::{AxisConvention, FrameMode, SampleParams, VideoFrame};
use tracing::{debug, info};

use crate::buffer::{sample_capacity, CommittedCloud, PointCloudBuffer};
use crate::color::hue;

/// Depth below this (metres) counts as "no reading" in depth-only mode.
pub const MIN_VALID_DEPTH: f32 = 0.01;

/// Colour of every point in depth-only mode; the renderer's tint applies on top.
pub const DEPTH_ONLY_COLOR: [f32; 3] = [1.0, 1.0, 1.0];

// ── Pinhole model ─────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PinholeIntrinsics {
    pub fx: f32,
    pub fy: f32,
    pub cx: f32,
    pub cy: f32,
}

impl PinholeIntrinsics {
    /// Intrinsics for the depth half of a `half × vh` image.
    pub fn for_depth_half(half: u32, vh: u32) -> Self {
        let half = half as f32;
        let vh = vh as f32;
        Self { fx: half, fy: vh, cx: half * 0.5, cy: vh * 0.5 }
    }

    /// Camera-space `(X, Y, Z)` of pixel `(x, y)` at depth `z`.
    #[inline]
    pub fn back_project(&self, x: u32, y: u32, z: f32) -> (f32, f32, f32) {
        let px = (x as f32 - self.cx) / self.fx * z;
        let py = (y as f32 - self.cy) / self.fy * z;
        (px, py, z)
    }
}

// ── Post-projection hook ──────────────────────────────────────────────────────

/// Cosmetic adjustment applied to a point after back-projection and axis
/// mapping. Not part of the reconstruction itself.
pub trait PointPerturbation {
    /// `buffer_index` is the flat float index the point is written at.
    fn perturb(&self, buffer_index: usize, position: &mut [f32; 3]);
}

/// Audio-reactive wiggle: `y += amplitude * 0.2 * sin(buffer_index)`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AudioWiggle {
    pub amplitude: f32,
}

impl AudioWiggle {
    pub const GAIN: f32 = 0.2;
}

impl PointPerturbation for AudioWiggle {
    #[inline]
    fn perturb(&self, buffer_index: usize, position: &mut [f32; 3]) {
        position[1] += self.amplitude * Self::GAIN * (buffer_index as f64).sin() as f32;
    }
}

// ── FrameProcessor ────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameOutcome {
    /// Zero-sized frame; the previously committed cloud is untouched.
    Skipped,
    Processed { points: usize },
}

/// Decodes frames into a reusable [`PointCloudBuffer`].
#[derive(Debug)]
pub struct FrameProcessor {
    mode: FrameMode,
    axes: AxisConvention,
    buffer: PointCloudBuffer,
    last_geometry: Option<(u32, u32, u32)>,
}

impl FrameProcessor {
    pub fn new(mode: FrameMode, axes: AxisConvention) -> Self {
        Self { mode, axes, buffer: PointCloudBuffer::new(), last_geometry: None }
    }

    pub fn mode(&self) -> FrameMode {
        self.mode
    }

    pub fn set_mode(&mut self, mode: FrameMode) {
        self.mode = mode;
    }

    pub fn axes(&self) -> AxisConvention {
        self.axes
    }

    /// Decode `frame` and commit the result.
    ///
    /// A frame with zero width or height is skipped and the previous cloud
    /// stays committed. Pixel contents are never validated: garbage in is
    /// garbage geometry out.
    pub fn process(
        &mut self,
        frame: &VideoFrame,
        params: SampleParams,
        perturbation: Option<&dyn PointPerturbation>,
    ) -> FrameOutcome {
        if frame.is_degenerate() {
            return FrameOutcome::Skipped;
        }

        let vw = frame.width();
        let vh = frame.height();
        let half = vw / 2;
        let step = params.step.max(1);
        let depth_range = params.depth_range;

        if self.last_geometry != Some((vw, vh, step)) {
            info!(
                "Frame geometry {}x{} (depth half {}x{}), step {} → up to {} points",
                vw, vh, half, vh, step, sample_capacity(half, vh, step)
            );
            self.last_geometry = Some((vw, vh, step));
        }

        let intrinsics = PinholeIntrinsics::for_depth_half(half, vh);
        self.buffer.begin(sample_capacity(half, vh, step));

        let step = step as usize;
        for y in (0..vh).step_by(step) {
            for x in (0..half).step_by(step) {
                let z = hue(frame.rgb(x, y)) * depth_range;

                let color = match self.mode {
                    FrameMode::DepthOnly => {
                        if z < MIN_VALID_DEPTH {
                            continue;
                        }
                        DEPTH_ONLY_COLOR
                    }
                    FrameMode::DualHalf => {
                        let [r, g, b] = frame.rgb(x + half, y);
                        [r as f32 / 255.0, g as f32 / 255.0, b as f32 / 255.0]
                    }
                };

                let (px, py, pz) = intrinsics.back_project(x, y, z);
                let mut position = self.axes.apply(px, py, pz);
                if let Some(hook) = perturbation {
                    hook.perturb(self.buffer.cursor(), &mut position);
                }
                self.buffer.push(position, color);
            }
        }

        let points = self.buffer.commit().len();
        debug!("Processed frame: {} points", points);
        FrameOutcome::Processed { points }
    }

    /// The last committed cloud.
    pub fn cloud(&self) -> CommittedCloud<'_> {
        self.buffer.committed()
    }

    pub fn frames_processed(&self) -> u64 {
        self.buffer.frames_committed()
    }
}
