//! CPU point rasterizer.
//!
//! Draws each point as a square sprite whose pixel size is attenuated with
//! view depth (`size * (height / 2) / w`), z-tested per pixel.

use std::path::Path;

use depthlink_core::SurfaceSize;
use depthlink_processor::CommittedCloud;
use glam::{Vec3, Vec4};
use tracing::{debug, info};

use crate::bounds::BoundingSphere;
use crate::camera::CameraRig;
use crate::surface::{PointStyle, RenderSurface, RendererError};

/// Scene background, `#0b0e14`.
pub const BACKGROUND: [u8; 4] = [0x0b, 0x0e, 0x14, 0xff];

/// Sprites closer than this to the eye would cover the whole screen.
const MAX_SPRITE_PX: f32 = 64.0;

pub struct SoftwareSurface {
    display: SurfaceSize,
    size: SurfaceSize,
    color: Vec<u8>,
    depth: Vec<f32>,
    camera: Box<dyn CameraRig>,
    positions: Vec<f32>,
    colors: Vec<f32>,
    style: PointStyle,
    bounds: BoundingSphere,
    frames_drawn: u64,
    last_drawn: usize,
}

impl SoftwareSurface {
    pub fn new(size: SurfaceSize, camera: Box<dyn CameraRig>) -> Result<Self, RendererError> {
        let mut surface = Self {
            display: size,
            size: SurfaceSize { width: 0, height: 0 },
            color: Vec::new(),
            depth: Vec::new(),
            camera,
            positions: Vec::new(),
            colors: Vec::new(),
            style: PointStyle::default(),
            bounds: BoundingSphere::EMPTY,
            frames_drawn: 0,
            last_drawn: 0,
        };
        surface.resize(size)?;
        Ok(surface)
    }

    /// What the window system reports; picked up by the next resize check.
    pub fn set_display_size(&mut self, size: SurfaceSize) {
        self.display = size;
    }

    pub fn camera_mut(&mut self) -> &mut dyn CameraRig {
        self.camera.as_mut()
    }

    pub fn bounds(&self) -> BoundingSphere {
        self.bounds
    }

    /// RGBA8, row-major, `drawable_size()` pixels.
    pub fn framebuffer(&self) -> &[u8] {
        &self.color
    }

    pub fn pixel(&self, x: u32, y: u32) -> [u8; 4] {
        let i = (y as usize * self.size.width as usize + x as usize) * 4;
        [self.color[i], self.color[i + 1], self.color[i + 2], self.color[i + 3]]
    }

    /// Points that landed on screen in the last draw.
    pub fn last_drawn(&self) -> usize {
        self.last_drawn
    }

    pub fn frames_drawn(&self) -> u64 {
        self.frames_drawn
    }

    pub fn save_png(&self, path: &Path) -> Result<(), RendererError> {
        let snapshot_err = |reason: String| RendererError::Snapshot { path: path.display().to_string(), reason };
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| snapshot_err(e.to_string()))?;
        }
        image::save_buffer_with_format(
            path,
            &self.color,
            self.size.width,
            self.size.height,
            image::ColorType::Rgba8,
            image::ImageFormat::Png,
        )
        .map_err(|e| snapshot_err(e.to_string()))?;
        info!("Snapshot written to {}", path.display());
        Ok(())
    }

    fn clear(&mut self) {
        for px in self.color.chunks_exact_mut(4) {
            px.copy_from_slice(&BACKGROUND);
        }
        self.depth.fill(f32::INFINITY);
    }
}

impl RenderSurface for SoftwareSurface {
    fn display_size(&self) -> SurfaceSize {
        self.display
    }

    fn drawable_size(&self) -> SurfaceSize {
        self.size
    }

    fn resize(&mut self, size: SurfaceSize) -> Result<(), RendererError> {
        if size.width == 0 || size.height == 0 {
            return Err(RendererError::InvalidSize { width: size.width, height: size.height });
        }
        let pixels = size.width as usize * size.height as usize;
        self.color.resize(pixels * 4, 0);
        self.depth.resize(pixels, f32::INFINITY);
        self.size = size;
        self.display = size;
        debug!("SoftwareSurface resized to {}x{}", size.width, size.height);
        Ok(())
    }

    fn update_camera(&mut self) {
        self.camera.update();
    }

    fn upload(&mut self, cloud: CommittedCloud<'_>, style: PointStyle) {
        self.positions.clear();
        self.positions.extend_from_slice(cloud.positions);
        self.colors.clear();
        self.colors.extend_from_slice(cloud.colors);
        self.style = style;
        self.bounds = BoundingSphere::from_positions(&self.positions);
    }

    fn restyle(&mut self, style: PointStyle) {
        self.style = style;
    }

    fn draw(&mut self) -> Result<(), RendererError> {
        self.clear();
        let (w, h) = (self.size.width as f32, self.size.height as f32);
        let view_proj = self.camera.view_projection(w / h);
        let scale = h * 0.5;
        let tint = Vec3::from_array(self.style.tint);

        let mut drawn = 0;
        for (p, c) in self.positions.chunks_exact(3).zip(self.colors.chunks_exact(3)) {
            let clip = view_proj * Vec4::new(p[0], p[1], p[2], 1.0);
            if clip.w <= 0.0 {
                continue;
            }
            let ndc = clip.truncate() / clip.w;
            if !(-1.0..=1.0).contains(&ndc.z) {
                continue;
            }

            let sx = (ndc.x * 0.5 + 0.5) * w;
            let sy = (0.5 - ndc.y * 0.5) * h;
            let sprite = (self.style.size * scale / clip.w).clamp(1.0, MAX_SPRITE_PX);
            let x0 = (sx - sprite * 0.5).round() as i64;
            let y0 = (sy - sprite * 0.5).round() as i64;
            let extent = sprite.round().max(1.0) as i64;

            let rgb = (Vec3::new(c[0], c[1], c[2]) * tint).clamp(Vec3::ZERO, Vec3::ONE) * 255.0;
            let texel = [rgb.x.round() as u8, rgb.y.round() as u8, rgb.z.round() as u8, 0xff];

            let mut covered = false;
            for y in y0.max(0)..(y0 + extent).min(self.size.height as i64) {
                for x in x0.max(0)..(x0 + extent).min(self.size.width as i64) {
                    let i = y as usize * self.size.width as usize + x as usize;
                    if ndc.z < self.depth[i] {
                        self.depth[i] = ndc.z;
                        self.color[i * 4..i * 4 + 4].copy_from_slice(&texel);
                    }
                    covered = true;
                }
            }
            drawn += covered as usize;
        }

        self.last_drawn = drawn;
        self.frames_drawn += 1;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::camera::OrbitCamera;

    fn surface(width: u32, height: u32) -> SoftwareSurface {
        SoftwareSurface::new(SurfaceSize { width, height }, Box::new(OrbitCamera::default())).unwrap()
    }

    fn lit_pixels(s: &SoftwareSurface) -> Vec<(u32, u32, [u8; 4])> {
        let size = s.drawable_size();
        let mut lit = Vec::new();
        for y in 0..size.height {
            for x in 0..size.width {
                let px = s.pixel(x, y);
                if px != BACKGROUND {
                    lit.push((x, y, px));
                }
            }
        }
        lit
    }

    #[test]
    fn empty_scene_is_background() {
        let mut s = surface(8, 6);
        s.draw().unwrap();
        assert!(lit_pixels(&s).is_empty());
        assert_eq!(s.last_drawn(), 0);
    }

    #[test]
    fn origin_point_lands_mid_screen_with_tint() {
        // Odd size puts the screen centre mid-pixel
        let mut s = surface(65, 49);
        let positions = [0.0, 0.0, 0.0];
        let colors = [1.0, 0.5, 1.0];
        s.upload(CommittedCloud { positions: &positions, colors: &colors }, PointStyle::new(0.01, [1.0, 1.0, 0.0]));
        s.draw().unwrap();

        let lit = lit_pixels(&s);
        assert_eq!(lit.len(), 1);
        let (x, y, px) = lit[0];
        assert_eq!((x, y), (32, 24));
        assert_eq!(px, [255, 128, 0, 255]);
    }

    #[test]
    fn nearer_point_wins_the_depth_test() {
        let mut s = surface(65, 49);
        // Same screen position; the green one is closer to the eye at z=1.5
        let positions = [0.0, 0.0, 0.5, 0.0, 0.0, 0.0];
        let colors = [0.0, 1.0, 0.0, 1.0, 0.0, 0.0];
        s.upload(CommittedCloud { positions: &positions, colors: &colors }, PointStyle::default());
        s.draw().unwrap();

        let lit = lit_pixels(&s);
        assert!(!lit.is_empty());
        assert!(lit.iter().all(|(_, _, px)| *px == [0, 255, 0, 255]));
    }

    #[test]
    fn points_behind_the_camera_are_culled() {
        let mut s = surface(32, 32);
        let positions = [0.0, 0.0, 3.0];
        s.upload(CommittedCloud { positions: &positions, colors: &[1.0; 3] }, PointStyle::default());
        s.draw().unwrap();
        assert_eq!(s.last_drawn(), 0);
    }

    #[test]
    fn upload_recomputes_bounds() {
        let mut s = surface(16, 16);
        let positions = [-1.0, 0.0, 0.0, 1.0, 0.0, 0.0];
        s.upload(CommittedCloud { positions: &positions, colors: &[0.0; 6] }, PointStyle::default());
        assert_eq!(s.bounds().radius, 1.0);
    }

    #[test]
    fn resize_tracks_display_and_rejects_zero() {
        let mut s = surface(16, 16);
        s.set_display_size(SurfaceSize { width: 32, height: 8 });
        assert!(s.needs_resize());
        s.resize(s.display_size()).unwrap();
        assert!(!s.needs_resize());
        assert_eq!(s.framebuffer().len(), 32 * 8 * 4);
        assert!(matches!(
            s.resize(SurfaceSize { width: 0, height: 8 }),
            Err(RendererError::InvalidSize { .. })
        ));
    }

    #[test]
    fn snapshot_round_trips_through_png() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("shots").join("frame-1.png");
        let mut s = surface(8, 4);
        s.draw().unwrap();
        s.save_png(&path).unwrap();

        let img = image::open(&path).unwrap().to_rgba8();
        assert_eq!(img.dimensions(), (8, 4));
        assert_eq!(img.get_pixel(0, 0).0, BACKGROUND);
    }
}
