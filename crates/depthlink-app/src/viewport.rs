//! Glue between the egui central panel and the render surface: pixel sizes,
//! pointer input and the framebuffer texture.

use depthlink_core::SurfaceSize;
use depthlink_renderer::{CameraRig, RenderSurface, SoftwareSurface};
use egui::{ColorImage, Vec2};

/// Physical pixel size of an area `points` logical points big. `None` while
/// the area is empty, e.g. a minimised window.
pub fn physical_size(points: Vec2, pixels_per_point: f32) -> Option<SurfaceSize> {
    let width = (points.x * pixels_per_point).round();
    let height = (points.y * pixels_per_point).round();
    if width < 1.0 || height < 1.0 {
        return None;
    }
    Some(SurfaceSize { width: width as u32, height: height as u32 })
}

/// Pointer input over the viewport for one frame.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct PointerInput {
    /// Primary-button drag, physical pixels.
    pub drag: Vec2,
    /// egui scroll delta; positive is wheel-up.
    pub scroll: f32,
}

impl PointerInput {
    /// Camera rigs take wheel deltas the browser way round: positive zooms out.
    pub fn wheel_delta(&self) -> f32 {
        -self.scroll
    }
}

pub fn apply_pointer(camera: &mut dyn CameraRig, input: PointerInput, viewport_height: u32) {
    if input.drag != Vec2::ZERO {
        camera.rotate(input.drag.x, input.drag.y, viewport_height);
    }
    if input.scroll != 0.0 {
        camera.zoom(input.wheel_delta());
    }
}

/// The last drawn frame as an egui image.
pub fn framebuffer_image(surface: &SoftwareSurface) -> ColorImage {
    let size = surface.drawable_size();
    ColorImage::from_rgba_unmultiplied([size.width as usize, size.height as usize], surface.framebuffer())
}
