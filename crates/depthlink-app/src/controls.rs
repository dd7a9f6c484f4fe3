use depthlink_core::{SampleParams, ViewerConfig};
use depthlink_renderer::PointStyle;
use egui::{Color32, FontFamily, FontId, Frame, Margin, RichText, Stroke, Vec2};

// ── Colours ───────────────────────────────────────────────────────────────────

pub const BG_PANEL: Color32 = Color32::from_rgb(28, 30, 36);
const BG_CARD: Color32 = Color32::from_rgb(36, 38, 46);
const ACCENT: Color32 = Color32::from_rgb(99, 144, 255);
const TEXT_DIM: Color32 = Color32::from_rgb(130, 135, 148);
const TEXT_NORM: Color32 = Color32::from_rgb(210, 215, 230);
const TEXT_ERROR: Color32 = Color32::from_rgb(220, 80, 70);

pub const PANEL_WIDTH: f32 = 260.0;

// ── Control values ────────────────────────────────────────────────────────────

/// Values behind the side-panel widgets.
#[derive(Debug, Clone, PartialEq)]
pub struct Controls {
    pub server_address: String,
    pub point_size: f32,
    pub tint: [f32; 3],
    pub step: u32,
    pub depth_range: f32,
}

impl Controls {
    pub fn from_config(config: &ViewerConfig) -> Self {
        let style = PointStyle::new(config.point_size, config.tint);
        let sample = config.sample.sanitized();
        Self {
            server_address: config.server_address.clone(),
            point_size: style.size,
            tint: style.tint,
            step: sample.step,
            depth_range: sample.depth_range,
        }
    }

    pub fn style(&self) -> PointStyle {
        PointStyle::new(self.point_size, self.tint)
    }

    pub fn sample(&self) -> SampleParams {
        SampleParams::new(self.step, self.depth_range).sanitized()
    }
}

/// What the user did in the panel this frame.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PanelActions {
    pub connect: bool,
    pub style_changed: bool,
    pub sample_changed: bool,
}

/// Read-only state the panel shows.
pub struct PanelView<'a> {
    pub sketch: &'a str,
    pub status: &'a str,
    pub error: Option<&'a str>,
    pub fps: Option<&'a str>,
    pub points: usize,
    /// Connect button and address field accept input.
    pub can_connect: bool,
    pub sample_controls: bool,
}

// ── Panel ─────────────────────────────────────────────────────────────────────

pub fn show_panel(ui: &mut egui::Ui, controls: &mut Controls, view: &PanelView<'_>) -> PanelActions {
    let mut actions = PanelActions::default();

    ui.horizontal(|ui| {
        ui.label(
            RichText::new("DepthLink")
                .font(FontId::new(22.0, FontFamily::Proportional))
                .strong()
                .color(Color32::WHITE),
        );
        ui.label(RichText::new(view.sketch).font(FontId::new(13.0, FontFamily::Proportional)).color(ACCENT));
    });
    ui.add_space(8.0);

    // ── Connection ────────────────────────────────────────────────────────
    card(ui, |ui| {
        ui.label(RichText::new("Server").color(TEXT_DIM));
        ui.add_enabled(
            view.can_connect,
            egui::TextEdit::singleline(&mut controls.server_address).hint_text("localhost"),
        );
        ui.add_space(4.0);
        let button = egui::Button::new(RichText::new("Connect").color(TEXT_NORM))
            .fill(BG_PANEL)
            .stroke(Stroke::new(1.0, ACCENT))
            .min_size(Vec2::new(ui.available_width(), 28.0));
        if ui.add_enabled(view.can_connect, button).clicked() {
            actions.connect = true;
        }
        ui.add_space(4.0);
        ui.label(RichText::new(view.status).color(TEXT_NORM));
        if let Some(error) = view.error {
            ui.label(RichText::new(error).color(TEXT_ERROR));
        }
    });
    ui.add_space(8.0);

    // ── Points ────────────────────────────────────────────────────────────
    card(ui, |ui| {
        let (min, max) = PointStyle::SIZE_RANGE;
        actions.style_changed |= ui
            .add(egui::Slider::new(&mut controls.point_size, min..=max).text("Point Size"))
            .changed();
        ui.horizontal(|ui| {
            actions.style_changed |= ui.color_edit_button_rgb(&mut controls.tint).changed();
            ui.label("Tint");
        });

        if view.sample_controls {
            let (min, max) = SampleParams::STEP_RANGE;
            actions.sample_changed |=
                ui.add(egui::Slider::new(&mut controls.step, min..=max).text("Step")).changed();
            actions.sample_changed |= ui
                .add(egui::Slider::new(&mut controls.depth_range, 1.0..=10.0).step_by(0.1).text("Depth [m]"))
                .changed();
        }
    });
    ui.add_space(8.0);

    // ── Stats ─────────────────────────────────────────────────────────────
    card(ui, |ui| {
        ui.horizontal(|ui| {
            ui.label(RichText::new(view.fps.unwrap_or("-- FPS")).strong().color(TEXT_NORM));
            ui.label(RichText::new(format!("{} points", view.points)).color(TEXT_DIM));
        });
    });

    actions
}

fn card(ui: &mut egui::Ui, add_contents: impl FnOnce(&mut egui::Ui)) {
    Frame::none()
        .fill(BG_CARD)
        .rounding(8.0)
        .inner_margin(Margin::same(10.0))
        .show(ui, |ui| {
            ui.set_width(ui.available_width());
            add_contents(ui);
        });
}
