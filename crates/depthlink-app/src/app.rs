use std::sync::Arc;
use std::time::{Duration, Instant};

use depthlink_audio::AudioLevel;
use depthlink_core::{
    AcquisitionError, DecoderError, DepthLinkError, DeviceError, FrameSlot, ServerAddress, SessionState, SketchPreset,
    ViewerConfig,
};
use depthlink_decoder::{spawn_decode_worker, DecoderFactory, GStreamerDecoder};
use depthlink_processor::FrameProcessor;
use depthlink_renderer::{CameraRig, OrbitCamera, RendererError, SoftwareSurface, TurntableCamera, BACKGROUND};
use depthlink_signaling::{acquire_stream, SignalingClient};
use depthlink_webrtc::{TrackStats, VideoTrackReceiver, WebRtcPeer};
use egui::{pos2, Color32, Frame, Margin, PointerButton, Rect, Sense, TextureHandle, TextureOptions, Vec2};
use tokio::runtime::Handle;
use tokio::sync::{oneshot, watch};
use tracing::{debug, error, info, warn};

use crate::controls::{show_panel, Controls, PanelActions, PanelView, BG_PANEL, PANEL_WIDTH};
use crate::fps::fps_label;
use crate::render_loop::{RenderLoop, SnapshotSchedule, TickReport};
use crate::session::Session;
use crate::viewport::{apply_pointer, framebuffer_image, physical_size, PointerInput};

/// Everything a successful connect hands back to the window thread.
struct Connection {
    peer: WebRtcPeer,
    track: VideoTrackReceiver,
    decoder: GStreamerDecoder,
}

/// Live stream state, dropped when the window closes.
struct Stream {
    peer: WebRtcPeer,
    ice_state: watch::Receiver<String>,
    stats: Arc<TrackStats>,
    _decode: tokio::task::JoinHandle<()>,
}

// ── ViewerApp ─────────────────────────────────────────────────────────────────

/// The viewer window.
///
/// # Flow
/// 1. Connect click: open the audio level (audio-reactive sketch, first
///    connect only), then acquire the stream and a decoder on the runtime
/// 2. Each `update` polls the pending connect; on failure the session goes
///    back to idle and the button is enabled again
/// 3. On success the decode worker feeds the [`FrameSlot`] the render loop
///    reads from
/// 4. While streaming, every `update` is one render tick: pointer input,
///    resize, draw, upload the framebuffer as a texture
pub struct ViewerApp {
    config: ViewerConfig,
    preset: SketchPreset,
    runtime: Handle,
    session: Session,
    controls: Controls,
    microphone: Microphone,
    slot: FrameSlot,
    render: RenderLoop<SoftwareSurface>,
    snapshots: Option<SnapshotSchedule>,
    texture: Option<TextureHandle>,
    pending: Option<oneshot::Receiver<Result<Connection, DepthLinkError>>>,
    stream: Option<Stream>,
    tick_failures: u64,
}

impl ViewerApp {
    pub fn new(ctx: &egui::Context, runtime: Handle, config: ViewerConfig) -> Result<Self, RendererError> {
        let mut visuals = egui::Visuals::dark();
        visuals.panel_fill = BG_PANEL;
        visuals.window_fill = BG_PANEL;
        ctx.set_visuals(visuals);

        let preset = config.sketch.preset();
        let camera: Box<dyn CameraRig> = if preset.orbit_controls {
            Box::new(OrbitCamera::default())
        } else {
            Box::new(TurntableCamera::default())
        };
        let surface = SoftwareSurface::new(config.surface, camera)?;
        let processor = FrameProcessor::new(config.mode, preset.axes);
        let controls = Controls::from_config(&config);

        let start = Instant::now();
        let (slot, frames) = FrameSlot::new();
        let render = RenderLoop::new(processor, surface, frames, controls.sample(), controls.style(), start);
        let snapshots = config.snapshot_dir.clone().map(|dir| {
            let every = Duration::from_secs(config.snapshot_every_secs.max(1));
            info!("Writing snapshots to {} every {}s", dir.display(), every.as_secs());
            SnapshotSchedule::new(dir, every, start)
        });

        Ok(Self {
            config,
            preset,
            runtime,
            session: Session::new(),
            controls,
            microphone: Microphone::default(),
            slot,
            render,
            snapshots,
            texture: None,
            pending: None,
            stream: None,
            tick_failures: 0,
        })
    }

    // ── Connect ──────────────────────────────────────────────────────────────

    fn connect(&mut self, ctx: &egui::Context) {
        if let Err(e) = self.session.begin_connect() {
            warn!("Connect ignored: {}", e);
            return;
        }

        if self.preset.audio_reactive {
            let level = self.session.audio_level(|| self.microphone.open());
            self.render.set_audio(level);
        }

        let mut config = self.config.clone();
        config.server_address = self.controls.server_address.trim().to_owned();
        info!("Connecting to {}", config.server_address);

        let (tx, rx) = oneshot::channel();
        let ctx = ctx.clone();
        self.runtime.spawn(async move {
            let result = connect(&config).await;
            if let Err(Ok(orphan)) = tx.send(result) {
                // Window closed mid-connect
                orphan.peer.close().await;
            }
            ctx.request_repaint();
        });
        self.pending = Some(rx);
    }

    fn poll_connect(&mut self) {
        let Some(pending) = self.pending.as_mut() else { return };
        let result = match pending.try_recv() {
            Ok(result) => result,
            Err(oneshot::error::TryRecvError::Empty) => return,
            Err(oneshot::error::TryRecvError::Closed) => Err(AcquisitionError::Peer {
                reason: "connect task ended without a result".into(),
            }
            .into()),
        };
        self.pending = None;

        match result {
            Ok(connection) => self.start_stream(connection),
            Err(e) => {
                error!("Connect failed: {}", e);
                self.session.connect_failed(&e);
            }
        }
    }

    fn start_stream(&mut self, connection: Connection) {
        let Connection { peer, track, decoder } = connection;
        info!(
            "Video decoder: {} (hardware: {})",
            decoder.element_name(),
            decoder.is_hardware_accelerated()
        );

        let decode = {
            let _runtime = self.runtime.enter();
            spawn_decode_worker(decoder, track.units, self.slot.clone())
        };
        self.stream = Some(Stream { ice_state: peer.ice_state(), peer, stats: track.stats, _decode: decode });
        self.session.connect_succeeded();
        info!(
            "Session {}: {} ({:?}) at {} fps",
            self.session.state(),
            self.config.sketch.name(),
            self.config.mode,
            self.config.frame_rate
        );
    }

    fn poll_ice_state(&mut self) {
        let Some(stream) = self.stream.as_mut() else { return };
        if stream.ice_state.has_changed().unwrap_or(false) {
            let state = stream.ice_state.borrow_and_update().clone();
            self.session.connection_state_changed(&state);
            info!("Status: {}", self.session.status());
        }
    }

    fn apply(&mut self, actions: PanelActions, ctx: &egui::Context) {
        if actions.style_changed {
            self.render.set_style(self.controls.style());
        }
        if actions.sample_changed {
            self.render.set_sample(self.controls.sample());
        }
        if actions.connect {
            self.connect(ctx);
        }
    }

    // ── Viewport ─────────────────────────────────────────────────────────────

    fn show_viewport(&mut self, ui: &mut egui::Ui) {
        let (rect, response) = ui.allocate_exact_size(ui.available_size(), Sense::click_and_drag());
        if self.session.state() != SessionState::Streaming {
            let [r, g, b, _] = BACKGROUND;
            ui.painter().rect_filled(rect, 0.0, Color32::from_rgb(r, g, b));
            return;
        }
        let pixels_per_point = ui.ctx().pixels_per_point();
        let Some(size) = physical_size(rect.size(), pixels_per_point) else { return };

        let input = PointerInput {
            drag: if response.dragged_by(PointerButton::Primary) {
                response.drag_delta() * pixels_per_point
            } else {
                Vec2::ZERO
            },
            scroll: if response.hovered() { ui.input(|i| i.raw_scroll_delta.y) } else { 0.0 },
        };
        let surface = self.render.surface_mut();
        surface.set_display_size(size);
        apply_pointer(surface.camera_mut(), input, size.height);

        let now = Instant::now();
        match self.render.tick(now) {
            Ok(report) => self.after_tick(report, now),
            Err(e) => {
                self.tick_failures += 1;
                if self.tick_failures <= 3 || self.tick_failures % 300 == 0 {
                    warn!("Render tick failed (#{}): {}", self.tick_failures, e);
                }
                return;
            }
        }

        let image = framebuffer_image(self.render.surface());
        if let Some(texture) = self.texture.as_mut() {
            texture.set(image, TextureOptions::NEAREST);
        } else {
            self.texture = Some(ui.ctx().load_texture("point-cloud", image, TextureOptions::NEAREST));
        }
        if let Some(texture) = &self.texture {
            let uv = Rect::from_min_max(pos2(0.0, 0.0), pos2(1.0, 1.0));
            ui.painter().image(texture.id(), rect, uv, Color32::WHITE);
        }
    }

    fn after_tick(&mut self, report: TickReport, now: Instant) {
        if let Some(fps) = report.fps {
            self.session.set_fps(fps_label(fps));
            if let Some(stream) = &self.stream {
                let s = stream.stats.snapshot();
                info!(
                    "{}  |  {} points  |  {}  |  rx {} packets, {} units, {} bytes",
                    self.session.fps().unwrap_or_default(),
                    report.points,
                    self.session.status(),
                    s.packets,
                    s.access_units,
                    s.bytes
                );
            }
        }
        if let Some(path) = self.snapshots.as_mut().and_then(|s| s.due(now)) {
            debug!("Snapshot due: {}", path.display());
            if let Err(e) = self.render.surface().save_png(&path) {
                warn!("{}", e);
            }
        }
    }
}

// ── eframe::App implementation ────────────────────────────────────────────────

impl eframe::App for ViewerApp {
    fn update(&mut self, ctx: &egui::Context, _frame: &mut eframe::Frame) {
        self.poll_connect();
        self.poll_ice_state();

        let view = PanelView {
            sketch: self.config.sketch.name(),
            status: self.session.status(),
            error: self.session.error(),
            fps: self.session.fps(),
            points: self.render.processor().cloud().len(),
            can_connect: !self.session.state().is_active(),
            sample_controls: self.preset.sample_controls,
        };
        let actions = egui::SidePanel::right("controls")
            .resizable(false)
            .exact_width(PANEL_WIDTH)
            .frame(Frame::none().fill(BG_PANEL).inner_margin(Margin::same(12.0)))
            .show(ctx, |ui| show_panel(ui, &mut self.controls, &view))
            .inner;
        self.apply(actions, ctx);

        egui::CentralPanel::default()
            .frame(Frame::none())
            .show(ctx, |ui| self.show_viewport(ui));

        ctx.request_repaint_after(self.config.frame_interval());
    }
}

impl Drop for ViewerApp {
    fn drop(&mut self) {
        let Some(stream) = self.stream.take() else { return };
        info!("Closing peer connection after {} ticks", self.render.ticks());
        let closed = self
            .runtime
            .block_on(async { tokio::time::timeout(Duration::from_secs(1), stream.peer.close()).await });
        if closed.is_err() {
            warn!("Peer close timed out");
        }
    }
}

// ── Connect ────────────────────────────────────────────────────────────────────

async fn connect(config: &ViewerConfig) -> Result<Connection, DepthLinkError> {
    let server = ServerAddress::parse(&config.server_address)?;

    // GStreamer init and element lookup block
    let decoder = tokio::task::spawn_blocking(DecoderFactory::best_available)
        .await
        .map_err(|e| DecoderError::Pipeline(format!("decoder setup task: {e}")))??;

    let client = SignalingClient::new(server);
    let (peer, track) = WebRtcPeer::new().await?;
    if let Err(e) = acquire_stream(&client, &peer, config.ice_timeout()).await {
        peer.close().await;
        return Err(e.into());
    }
    Ok(Connection { peer, track, decoder })
}

// ── Audio ──────────────────────────────────────────────────────────────────────

/// Keeps the capture stream alive for the whole session.
#[derive(Default)]
struct Microphone {
    #[cfg(feature = "microphone")]
    capture: Option<depthlink_audio::MicrophoneCapture>,
}

impl Microphone {
    #[cfg(feature = "microphone")]
    fn open(&mut self) -> Result<Arc<dyn AudioLevel>, DeviceError> {
        let capture = depthlink_audio::MicrophoneCapture::start(depthlink_audio::SharedAmplitude::new())?;
        let level: Arc<dyn AudioLevel> = Arc::new(capture.level().clone());
        self.capture = Some(capture);
        Ok(level)
    }

    #[cfg(not(feature = "microphone"))]
    fn open(&mut self) -> Result<Arc<dyn AudioLevel>, DeviceError> {
        Err(DeviceError::Unavailable { device: "microphone (built without the `microphone` feature)".into() })
    }
}

#[cfg(test)]
mod tests {
    use depthlink_core::{Sketch, VideoFrame};

    use super::*;

    fn app(runtime: &tokio::runtime::Runtime, config: ViewerConfig) -> ViewerApp {
        ViewerApp::new(&egui::Context::default(), runtime.handle().clone(), config).unwrap()
    }

    /// Poll until the pending connect resolves.
    fn settle(app: &mut ViewerApp) {
        for _ in 0..200 {
            app.poll_connect();
            if app.pending.is_none() {
                return;
            }
            std::thread::sleep(Duration::from_millis(10));
        }
        panic!("connect never resolved");
    }

    #[test]
    fn bad_address_returns_to_idle_with_error() {
        let runtime = tokio::runtime::Runtime::new().unwrap();
        let mut app = app(&runtime, ViewerConfig::default());
        let ctx = egui::Context::default();

        app.controls.server_address = "   ".into();
        app.connect(&ctx);
        assert_eq!(app.session.state(), SessionState::Connecting);
        assert!(app.pending.is_some());

        settle(&mut app);
        assert_eq!(app.session.state(), SessionState::Idle);
        assert_eq!(app.session.error(), Some("Stream acquisition failed: Invalid server address: \"\""));
        assert!(app.stream.is_none());
    }

    #[test]
    fn connect_is_ignored_while_connecting() {
        let runtime = tokio::runtime::Runtime::new().unwrap();
        let mut app = app(&runtime, ViewerConfig::default());
        let ctx = egui::Context::default();

        app.controls.server_address = String::new();
        app.connect(&ctx);
        let first = app.pending.take();
        app.connect(&ctx);
        assert!(app.pending.is_none(), "second connect spawned a task");
        assert_eq!(app.session.state(), SessionState::Connecting);

        app.pending = first;
        settle(&mut app);
        assert_eq!(app.session.state(), SessionState::Idle);
    }

    #[test]
    fn audio_sketch_opens_the_level_on_connect() {
        let runtime = tokio::runtime::Runtime::new().unwrap();
        let config = ViewerConfig { sketch: Sketch::LidarBasicSound, ..ViewerConfig::default() };
        let mut app = app(&runtime, config);
        let ctx = egui::Context::default();

        app.controls.server_address = String::new();
        app.connect(&ctx);
        settle(&mut app);
        // Already opened (or replaced by silence) by the connect click
        let _ = app.session.audio_level(|| panic!("audio opened twice"));
    }

    #[test]
    fn panel_changes_reach_the_render_loop() {
        let runtime = tokio::runtime::Runtime::new().unwrap();
        let mut app = app(&runtime, ViewerConfig::default());
        let ctx = egui::Context::default();

        app.controls.step = 16;
        app.controls.tint = [0.0, 0.0, 1.0];
        app.apply(PanelActions { style_changed: true, sample_changed: true, connect: false }, &ctx);
        assert_eq!(app.session.state(), SessionState::Idle);
        assert!(app.pending.is_none());

        app.slot.publish(VideoFrame::new(32, 1, vec![255; 32 * 4]).unwrap());
        let report = app.render.tick(Instant::now()).unwrap();
        // 16 depth columns at step 16
        assert_eq!(report.points, 1);
        assert_eq!(app.render.processor().cloud().color(0), [1.0, 1.0, 1.0]);
        // White point at the origin, tinted blue
        assert_eq!(app.render.surface().pixel(640, 360), [0, 0, 255, 255]);
    }
}
