use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};

use depthlink_audio::AudioLevel;
use depthlink_core::{FrameReader, SampleParams};
use depthlink_processor::{AudioWiggle, FrameOutcome, FrameProcessor, PointPerturbation};
use depthlink_renderer::{PointStyle, RenderSurface, RendererError};
use tracing::debug;

use crate::fps::FpsCounter;

/// What one tick did.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TickReport {
    /// Points in the cloud that was drawn.
    pub points: usize,
    /// The current frame had no pixels; the previous cloud was drawn again.
    pub skipped: bool,
    /// Set on the tick that closed an FPS window.
    pub fps: Option<f64>,
}

// MARK: - RenderLoop

/// Per-tick driver: resize, camera, decode the current frame, upload, draw,
/// FPS. Runs on the window thread; the decoder only reaches it through the
/// [`FrameReader`].
pub struct RenderLoop<S: RenderSurface> {
    processor: FrameProcessor,
    surface: S,
    frames: FrameReader,
    sample: SampleParams,
    style: PointStyle,
    audio: Option<Arc<dyn AudioLevel>>,
    fps: FpsCounter,
    ticks: u64,
}

impl<S: RenderSurface> RenderLoop<S> {
    pub fn new(
        processor: FrameProcessor,
        surface: S,
        frames: FrameReader,
        sample: SampleParams,
        style: PointStyle,
        start: Instant,
    ) -> Self {
        Self {
            processor,
            surface,
            frames,
            sample: sample.sanitized(),
            style,
            audio: None,
            fps: FpsCounter::new(start),
            ticks: 0,
        }
    }

    /// Perturb every point with the audio wiggle driven by `level`.
    pub fn set_audio(&mut self, level: Arc<dyn AudioLevel>) {
        self.audio = Some(level);
    }

    /// Takes effect on the next tick, on the cloud already on screen too.
    pub fn set_style(&mut self, style: PointStyle) {
        self.style = style;
        self.surface.restyle(style);
    }

    pub fn set_sample(&mut self, sample: SampleParams) {
        self.sample = sample.sanitized();
    }

    pub fn surface(&self) -> &S {
        &self.surface
    }

    pub fn surface_mut(&mut self) -> &mut S {
        &mut self.surface
    }

    pub fn processor(&self) -> &FrameProcessor {
        &self.processor
    }

    pub fn ticks(&self) -> u64 {
        self.ticks
    }

    pub fn tick(&mut self, now: Instant) -> Result<TickReport, RendererError> {
        if self.surface.needs_resize() {
            let size = self.surface.display_size();
            self.surface.resize(size)?;
            debug!("Render surface resized to {}x{}", size.width, size.height);
        }

        self.surface.update_camera();

        let frame = self.frames.current();
        let wiggle = self.audio.as_ref().map(|level| AudioWiggle { amplitude: level.amplitude() });
        let outcome = self.processor.process(
            &frame,
            self.sample,
            wiggle.as_ref().map(|w| w as &dyn PointPerturbation),
        );

        let skipped = match outcome {
            FrameOutcome::Processed { .. } => {
                self.surface.upload(self.processor.cloud(), self.style);
                false
            }
            FrameOutcome::Skipped => true,
        };

        self.surface.draw()?;
        self.ticks += 1;

        let fps = self.fps.frame(now);
        if let Some(fps) = fps {
            debug!("{:.1} FPS after {} ticks", fps, self.ticks);
        }

        Ok(TickReport { points: self.processor.cloud().len(), skipped, fps })
    }
}

// MARK: - Snapshots

/// Decides when the next `frame-<n>.png` is due.
#[derive(Debug, Clone)]
pub struct SnapshotSchedule {
    dir: PathBuf,
    every: Duration,
    next_due: Instant,
    taken: u64,
}

impl SnapshotSchedule {
    pub fn new(dir: PathBuf, every: Duration, start: Instant) -> Self {
        Self { dir, every, next_due: start + every, taken: 0 }
    }

    /// Path for the snapshot due at `now`, if one is.
    pub fn due(&mut self, now: Instant) -> Option<PathBuf> {
        if now < self.next_due {
            return None;
        }
        self.taken += 1;
        self.next_due = now + self.every;
        Some(self.dir.join(format!("frame-{}.png", self.taken)))
    }
}

#[cfg(test)]
mod tests {
    use depthlink_audio::SharedAmplitude;
    use depthlink_core::{AxisConvention, FrameMode, FrameSlot, SurfaceSize, VideoFrame};
    use depthlink_renderer::{OrbitCamera, SoftwareSurface};

    use super::*;

    const SIZE: SurfaceSize = SurfaceSize { width: 65, height: 49 };

    /// `width` x 1 frame: the depth half is pure red (hue 0, depth 0), the
    /// colour half is `rgb`.
    fn flat_frame(width: u32, rgb: [u8; 3]) -> VideoFrame {
        let half = width / 2;
        let mut rgba = Vec::new();
        for x in 0..width {
            let [r, g, b] = if x < half { [255, 0, 0] } else { rgb };
            rgba.extend_from_slice(&[r, g, b, 255]);
        }
        VideoFrame::new(width, 1, rgba).unwrap()
    }

    fn render_loop(frames: FrameReader, start: Instant) -> RenderLoop<SoftwareSurface> {
        let surface = SoftwareSurface::new(SIZE, Box::new(OrbitCamera::default())).unwrap();
        RenderLoop::new(
            FrameProcessor::new(FrameMode::DualHalf, AxisConvention::FacingViewer),
            surface,
            frames,
            SampleParams::new(1, 2.0),
            PointStyle::default(),
            start,
        )
    }

    #[test]
    fn draws_the_current_frame() {
        let start = Instant::now();
        let (slot, reader) = FrameSlot::new();
        let mut rl = render_loop(reader, start);

        slot.publish(flat_frame(2, [10, 20, 30]));
        let report = rl.tick(start).unwrap();

        assert_eq!(report, TickReport { points: 1, skipped: false, fps: None });
        assert_eq!(rl.surface().last_drawn(), 1);
        // Depth 0 puts the point at the origin, straight ahead of the camera
        assert_eq!(rl.surface().pixel(32, 24), [10, 20, 30, 255]);
    }

    #[test]
    fn empty_frame_keeps_the_previous_cloud() {
        let start = Instant::now();
        let (slot, reader) = FrameSlot::new();
        let mut rl = render_loop(reader, start);

        let report = rl.tick(start).unwrap();
        assert_eq!(report, TickReport { points: 0, skipped: true, fps: None });

        slot.publish(flat_frame(4, [200, 100, 50]));
        assert_eq!(rl.tick(start).unwrap().points, 2);

        slot.publish(VideoFrame::empty());
        let report = rl.tick(start).unwrap();
        assert!(report.skipped);
        assert_eq!(report.points, 2);
        assert_eq!(rl.surface().frames_drawn(), 3);
        assert_eq!(rl.ticks(), 3);
    }

    #[test]
    fn follows_display_resizes() {
        let start = Instant::now();
        let (_slot, reader) = FrameSlot::new();
        let mut rl = render_loop(reader, start);

        let bigger = SurfaceSize { width: 129, height: 97 };
        rl.surface_mut().set_display_size(bigger);
        rl.tick(start).unwrap();
        assert_eq!(rl.surface().drawable_size(), bigger);
        assert!(!rl.surface().needs_resize());
    }

    #[test]
    fn zero_display_size_fails_the_tick() {
        let start = Instant::now();
        let (_slot, reader) = FrameSlot::new();
        let mut rl = render_loop(reader, start);

        rl.surface_mut().set_display_size(SurfaceSize { width: 0, height: 10 });
        assert!(matches!(rl.tick(start), Err(RendererError::InvalidSize { .. })));
    }

    #[test]
    fn audio_level_wiggles_points() {
        let start = Instant::now();
        let (slot, reader) = FrameSlot::new();
        let level = SharedAmplitude::new();
        level.store(1.0);
        let mut rl = render_loop(reader, start);
        rl.set_audio(Arc::new(level.clone()));

        slot.publish(flat_frame(4, [255, 255, 255]));
        rl.tick(start).unwrap();
        let cloud = rl.processor().cloud();
        // Point 0 sits at buffer index 0 (sin 0 = 0), point 1 at index 3
        assert_eq!(cloud.position(0), [0.0, 0.0, 0.0]);
        let lifted = cloud.position(1)[1];
        assert!((lifted - AudioWiggle::GAIN * 3f64.sin() as f32).abs() < 1e-6, "y = {lifted}");

        level.store(0.0);
        rl.tick(start).unwrap();
        assert_eq!(rl.processor().cloud().position(1), [0.0, 0.0, 0.0]);
    }

    #[test]
    fn restyle_applies_without_a_new_frame() {
        let start = Instant::now();
        let (slot, reader) = FrameSlot::new();
        let mut rl = render_loop(reader, start);

        slot.publish(flat_frame(2, [200, 100, 50]));
        rl.tick(start).unwrap();
        assert_eq!(rl.surface().pixel(32, 24), [200, 100, 50, 255]);

        // Decoder stalls: the frame is redrawn with the new tint
        slot.publish(VideoFrame::empty());
        rl.set_style(PointStyle::new(0.01, [0.0, 1.0, 1.0]));
        assert!(rl.tick(start).unwrap().skipped);
        assert_eq!(rl.surface().pixel(32, 24), [0, 100, 50, 255]);
    }

    #[test]
    fn sample_change_is_sanitized() {
        let start = Instant::now();
        let (slot, reader) = FrameSlot::new();
        let mut rl = render_loop(reader, start);

        // 8x1 frame: 4 depth columns at step 1, 2 at step 2
        slot.publish(flat_frame(8, [255, 255, 255]));
        assert_eq!(rl.tick(start).unwrap().points, 4);
        rl.set_sample(SampleParams::new(2, -1.0));
        assert_eq!(rl.tick(start).unwrap().points, 2);
        rl.set_sample(SampleParams::new(0, 2.0));
        assert_eq!(rl.tick(start).unwrap().points, 1);
    }

    #[test]
    fn reports_fps_once_per_window() {
        let start = Instant::now();
        let (_slot, reader) = FrameSlot::new();
        let mut rl = render_loop(reader, start);

        let mut figures = Vec::new();
        for i in 1..=250 {
            if let Some(fps) = rl.tick(start + Duration::from_millis(10 * i)).unwrap().fps {
                figures.push(fps);
            }
        }
        assert_eq!(figures.len(), 2);
        assert!(figures.iter().all(|fps| (fps - 100.0).abs() < 1.0), "{figures:?}");
    }

    #[test]
    fn snapshots_are_numbered_and_spaced() {
        let start = Instant::now();
        let dir = PathBuf::from("shots");
        let mut schedule = SnapshotSchedule::new(dir.clone(), Duration::from_secs(5), start);

        assert_eq!(schedule.due(start), None);
        assert_eq!(schedule.due(start + Duration::from_secs(5)), Some(dir.join("frame-1.png")));
        assert_eq!(schedule.due(start + Duration::from_secs(6)), None);
        assert_eq!(schedule.due(start + Duration::from_secs(10)), Some(dir.join("frame-2.png")));
    }

    #[test]
    fn snapshot_of_a_tick_is_written() {
        let start = Instant::now();
        let tmp = tempfile::tempdir().unwrap();
        let (slot, reader) = FrameSlot::new();
        let mut rl = render_loop(reader, start);
        let mut schedule = SnapshotSchedule::new(tmp.path().to_path_buf(), Duration::ZERO, start);

        slot.publish(flat_frame(2, [10, 20, 30]));
        rl.tick(start).unwrap();
        let path = schedule.due(start).unwrap();
        rl.surface().save_png(&path).unwrap();
        assert!(tmp.path().join("frame-1.png").is_file());
    }
}
