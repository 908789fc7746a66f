//! Overlay GUI
//!
//! Declares the overlay every frame with egui: one black, chrome-less panel
//! covering the screen, the FPS readout in the top-right corner and the label
//! centered near the top. The result is tessellated into a [`GuiFrame`] that a
//! platform painter turns into GPU draw calls.

use egui::epaint::{textures::TexturesDelta, ClippedPrimitive, ImageData};
use egui::{Align2, Color32, FontId, Pos2, Rect};

use crate::context::ScreenSize;

/// Fixed colors and offsets of the two captions.
#[derive(Debug, Clone)]
pub struct OverlayStyle {
    pub background: Color32,
    pub fps_color: Color32,
    pub label_color: Color32,
    /// Gap between the FPS readout and the right screen edge
    pub fps_margin: f32,
    pub fps_top: f32,
    pub label_top: f32,
    pub font_size: f32,
}

impl Default for OverlayStyle {
    fn default() -> Self {
        Self {
            background: Color32::BLACK,
            fps_color: Color32::from_rgba_unmultiplied(150, 150, 150, 255),
            label_color: Color32::from_rgba_unmultiplied(100, 100, 100, 200),
            fps_margin: 20.0,
            fps_top: 15.0,
            label_top: 20.0,
            font_size: 13.0,
        }
    }
}

/// Where the captions landed in the last frame.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct OverlayLayout {
    pub fps: Rect,
    pub label: Rect,
}

impl Default for OverlayLayout {
    fn default() -> Self {
        Self {
            fps: Rect::NOTHING,
            label: Rect::NOTHING,
        }
    }
}

/// Finalized draw data for one frame.
pub struct GuiFrame {
    pub primitives: Vec<ClippedPrimitive>,
    pub textures_delta: TexturesDelta,
    pub pixels_per_point: f32,
    pub screen: ScreenSize,
    pub layout: OverlayLayout,
}

impl GuiFrame {
    pub fn vertex_count(&self) -> usize {
        self.primitives
            .iter()
            .filter_map(|p| match &p.primitive {
                egui::epaint::Primitive::Mesh(mesh) => Some(mesh.vertices.len()),
                egui::epaint::Primitive::Callback(_) => None,
            })
            .sum()
    }
}

/// Premultiplied RGBA8 bytes of an egui image, row-major.
pub fn image_rgba(image: &ImageData) -> Vec<u8> {
    match image {
        ImageData::Color(color) => color.pixels.iter().flat_map(|c| c.to_array()).collect(),
        ImageData::Font(font) => font.srgba_pixels(None).flat_map(|c| c.to_array()).collect(),
    }
}

pub struct OverlayUi {
    ctx: egui::Context,
    label: String,
    style: OverlayStyle,
}

impl OverlayUi {
    pub fn new(label: impl Into<String>, style: OverlayStyle) -> Self {
        let ctx = egui::Context::default();
        ctx.set_visuals(egui::Visuals::dark());
        Self {
            ctx,
            label: label.into(),
            style,
        }
    }

    /// Declare, lay out and tessellate one frame.
    pub fn build_frame(&mut self, fps_text: &str, screen: ScreenSize, frame_dt: f32) -> GuiFrame {
        let screen_rect = Rect::from_min_size(
            Pos2::ZERO,
            egui::vec2(screen.width_f32(), screen.height_f32()),
        );
        let raw_input = egui::RawInput {
            screen_rect: Some(screen_rect),
            predicted_dt: frame_dt,
            ..Default::default()
        };

        let style = &self.style;
        let label = self.label.as_str();
        let mut layout = OverlayLayout::default();

        let output = self.ctx.run(raw_input, |ctx| {
            egui::CentralPanel::default()
                .frame(egui::Frame::none().fill(style.background))
                .show(ctx, |ui| {
                    let painter = ui.painter();
                    let font = FontId::proportional(style.font_size);

                    layout.fps = painter.text(
                        Pos2::new(screen_rect.right() - style.fps_margin, style.fps_top),
                        Align2::RIGHT_TOP,
                        fps_text,
                        font.clone(),
                        style.fps_color,
                    );
                    layout.label = painter.text(
                        Pos2::new(screen_rect.center().x, style.label_top),
                        Align2::CENTER_TOP,
                        label,
                        font,
                        style.label_color,
                    );
                });
        });

        let primitives = self.ctx.tessellate(output.shapes, output.pixels_per_point);
        GuiFrame {
            primitives,
            textures_delta: output.textures_delta,
            pixels_per_point: output.pixels_per_point,
            screen,
            layout,
        }
    }
}
