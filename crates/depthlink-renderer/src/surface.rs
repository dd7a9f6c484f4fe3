use depthlink_core::SurfaceSize;
use depthlink_processor::CommittedCloud;
use thiserror::Error;

// MARK: - RenderSurface trait

/// Everything the render loop needs from a drawing backend.
///
/// Implementations:
/// - `SoftwareSurface`: CPU rasterizer into an RGBA framebuffer
///
/// Called only from the render tick, so no `Send`/`Sync` bound.
pub trait RenderSurface {
    /// Size the display wants right now (window/canvas client size).
    fn display_size(&self) -> SurfaceSize;

    /// Size of the buffer actually being drawn into.
    fn drawable_size(&self) -> SurfaceSize;

    /// Reallocate the drawable and fix the camera aspect.
    fn resize(&mut self, size: SurfaceSize) -> Result<(), RendererError>;

    /// Advance camera controls (damping, pending input) by one tick.
    fn update_camera(&mut self);

    /// Replace the drawn geometry with this frame's cloud.
    fn upload(&mut self, cloud: CommittedCloud<'_>, style: PointStyle);

    /// Change the material of the geometry already uploaded.
    fn restyle(&mut self, style: PointStyle);

    fn draw(&mut self) -> Result<(), RendererError>;

    /// `true` when the display size no longer matches the drawable.
    fn needs_resize(&self) -> bool {
        self.display_size() != self.drawable_size()
    }
}

// MARK: - PointStyle

/// Material parameters for the point sprites.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PointStyle {
    /// World-space size; attenuated with distance.
    pub size: f32,
    /// Multiplied into every vertex colour.
    pub tint: [f32; 3],
}

impl Default for PointStyle {
    fn default() -> Self {
        Self { size: 0.01, tint: [1.0; 3] }
    }
}

impl PointStyle {
    pub const SIZE_RANGE: (f32, f32) = (0.001, 0.05);

    pub fn new(size: f32, tint: [f32; 3]) -> Self {
        let size = if size.is_finite() { size.clamp(Self::SIZE_RANGE.0, Self::SIZE_RANGE.1) } else { 0.01 };
        Self { size, tint: tint.map(|c| if c.is_finite() { c.clamp(0.0, 1.0) } else { 1.0 }) }
    }
}

// MARK: - RendererError

#[derive(Error, Debug)]
pub enum RendererError {
    #[error("Invalid surface size {width}x{height}")]
    InvalidSize { width: u32, height: u32 },

    #[error("Failed to draw frame: {0}")]
    DrawFailed(String),

    #[error("Failed to write snapshot {path}: {reason}")]
    Snapshot { path: String, reason: String },
}
