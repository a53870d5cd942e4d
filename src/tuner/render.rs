//! Tuner rendering functions.
//!
//! Slider panel plus the preview image with the parameter overlay.

use eframe::egui::{self, Align2, Color32, FontId, RichText, TextureHandle, Vec2};

use super::state::{AdjustmentParameters, SLIDER_MAX};

/// Overlay text positions relative to the preview's top-left corner.
const OVERLAY_OFFSETS: [Vec2; 3] = [Vec2::new(10.0, 30.0), Vec2::new(10.0, 60.0), Vec2::new(10.0, 90.0)];

/// Render the three sliders. Change detection is left to `TunerSession::poll`.
pub fn render_controls(ui: &mut egui::Ui, params: &mut AdjustmentParameters) {
    ui.horizontal(|ui| {
        ui.add(egui::Slider::new(&mut params.brightness, 0..=SLIDER_MAX).text("Brightness"));
        ui.add(egui::Slider::new(&mut params.contrast, 0..=SLIDER_MAX).text("Contrast"));
        ui.add(egui::Slider::new(&mut params.threshold, 0..=255).text("Threshold"));
    });

    ui.label(RichText::new("Press Q or Esc to finish").weak());
}

/// Render the preview scaled to fit the available space, with the parameter
/// values drawn over its top-left corner.
pub fn render_preview(ui: &mut egui::Ui, texture: &TextureHandle, params: &AdjustmentParameters) {
    let [tex_w, tex_h] = texture.size();
    if tex_w == 0 || tex_h == 0 {
        return;
    }

    let available = ui.available_size();
    let scale = (available.x / tex_w as f32)
        .min(available.y / tex_h as f32)
        .min(1.0);
    let size = Vec2::new(tex_w as f32 * scale, tex_h as f32 * scale);

    let response = ui.image((texture.id(), size));
    let origin = response.rect.min;

    for (line, offset) in params.overlay_lines().iter().zip(OVERLAY_OFFSETS) {
        ui.painter().text(
            origin + offset,
            Align2::LEFT_BOTTOM,
            line,
            FontId::proportional(20.0),
            Color32::from_rgb(0, 255, 0),
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_controls_leave_values_without_input() {
        let ctx = egui::Context::default();
        let mut params = AdjustmentParameters {
            brightness: 70,
            contrast: 30,
            threshold: 180,
        };

        let _ = ctx.run(egui::RawInput::default(), |ctx| {
            egui::CentralPanel::default().show(ctx, |ui| render_controls(ui, &mut params));
        });

        assert_eq!((params.brightness, params.contrast, params.threshold), (70, 30, 180));
    }
}
