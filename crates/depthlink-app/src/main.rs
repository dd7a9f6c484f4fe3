use std::time::Duration;

use anyhow::{anyhow, Context, Result};
use depthlink_core::ViewerConfig;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

mod app;
mod controls;
mod fps;
mod render_loop;
mod session;
mod viewport;

use app::ViewerApp;
use controls::PANEL_WIDTH;

fn main() -> Result<()> {
    // RUST_LOG=debug for per-frame detail, GST_DEBUG=3 for GStreamer
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_target(true)
        .with_thread_ids(false)
        .init();

    info!("DepthLink Viewer v{}", env!("CARGO_PKG_VERSION"));

    match run() {
        Ok(()) => {
            info!("DepthLink Viewer exited cleanly.");
            Ok(())
        }
        Err(e) => {
            error!("Fatal error: {:#}", e);
            Err(e)
        }
    }
}

fn run() -> Result<()> {
    let config = ViewerConfig::from_env()?;
    info!("Sketch: {}  |  server: {}", config.sketch.name(), config.server_address);

    // ── Runtime ───────────────────────────────────────────────────────────
    // Signaling, WebRTC and the decode worker live here, off the window thread
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .worker_threads(4)
        .thread_name("depthlink-net")
        .enable_all()
        .build()
        .context("build tokio runtime")?;

    // ── Window options ────────────────────────────────────────────────────
    let title = format!("DepthLink: {}", config.sketch.name());
    let window_options = eframe::NativeOptions {
        viewport: egui::ViewportBuilder::default()
            .with_title(title.clone())
            .with_inner_size([config.surface.width as f32 + PANEL_WIDTH, config.surface.height as f32])
            .with_min_inner_size([PANEL_WIDTH + 320.0, 360.0])
            .with_resizable(true),
        ..Default::default()
    };

    let handle = runtime.handle().clone();
    eframe::run_native(
        &title,
        window_options,
        Box::new(move |cc| Ok(Box::new(ViewerApp::new(&cc.egui_ctx, handle, config)?))),
    )
    .map_err(|e| anyhow!("window: {e}"))?;

    runtime.shutdown_timeout(Duration::from_secs(1));
    Ok(())
}
