//! Interactive brightness/contrast/threshold tuner.
//!
//! Opens a window with three sliders and a live preview of the binarized
//! form. Each frame is one iteration of the polling loop: read the sliders,
//! re-render from the original if they moved, draw. Q, Escape or closing the
//! window ends the session and hands back the final values.

pub mod render;
pub mod state;

pub use state::{AdjustmentParameters, TunerSession, TunerState, render_preview};

use std::cell::Cell;
use std::rc::Rc;

use anyhow::anyhow;
use eframe::egui::{self, ColorImage, TextureHandle, TextureOptions, Vec2};
use image::RgbImage;
use tracing::info;

/// eframe application wrapping a `TunerSession`.
pub struct TunerApp {
    session: TunerSession,
    texture: Option<TextureHandle>,
    /// Receives the final parameters when the window closes.
    result: Rc<Cell<AdjustmentParameters>>,
}

impl TunerApp {
    fn new(original: RgbImage, result: Rc<Cell<AdjustmentParameters>>) -> Self {
        Self {
            session: TunerSession::new(original),
            texture: None,
            result,
        }
    }

    /// Upload the current frame, reusing the texture after the first time.
    fn upload_frame(&mut self, ctx: &egui::Context) {
        let frame = self.session.frame();
        let size = [frame.width() as usize, frame.height() as usize];
        let color_image = ColorImage::from_rgb(size, frame.as_raw());

        match &mut self.texture {
            Some(texture) => texture.set(color_image, TextureOptions::LINEAR),
            None => {
                self.texture = Some(ctx.load_texture("tuner_preview", color_image, TextureOptions::LINEAR));
            }
        }
    }

    fn quit_requested(ctx: &egui::Context) -> bool {
        ctx.input(|i| i.key_pressed(egui::Key::Q) || i.key_pressed(egui::Key::Escape))
    }
}

impl eframe::App for TunerApp {
    fn update(&mut self, ctx: &egui::Context, _frame: &mut eframe::Frame) {
        if Self::quit_requested(ctx) {
            ctx.send_viewport_cmd(egui::ViewportCommand::Close);
        }

        egui::TopBottomPanel::top("tuner_controls").show(ctx, |ui| {
            render::render_controls(ui, self.session.params_mut());
        });

        if self.session.poll() || self.texture.is_none() {
            self.upload_frame(ctx);
        }
        self.result.set(self.session.params());

        egui::CentralPanel::default().show(ctx, |ui| {
            if let Some(texture) = &self.texture {
                render::render_preview(ui, texture, &self.session.params());
            }
        });
    }
}

/// Run the tuner on `image`. Blocks until the window is closed and returns
/// the last slider values.
pub fn run_tuner(image: RgbImage) -> anyhow::Result<AdjustmentParameters> {
    let result = Rc::new(Cell::new(AdjustmentParameters::default()));
    let app_result = Rc::clone(&result);

    let (width, height) = image.dimensions();
    let options = eframe::NativeOptions {
        viewport: egui::ViewportBuilder::default()
            .with_inner_size(Vec2::new(width.clamp(400, 1280) as f32, height.clamp(300, 900) as f32 + 80.0))
            .with_min_inner_size(Vec2::new(400.0, 300.0))
            .with_title("Form Scanner Tuner"),
        ..Default::default()
    };

    info!(width, height, "Opening tuner");

    eframe::run_native(
        "Form Scanner Tuner",
        options,
        Box::new(move |_cc| Ok(Box::new(TunerApp::new(image, app_result)))),
    )
    .map_err(|e| anyhow!("Tuner window failed: {}", e))?;

    let params = result.get();
    info!(
        brightness = params.brightness,
        contrast = params.contrast,
        threshold = params.threshold,
        "Tuner closed"
    );
    Ok(params)
}
