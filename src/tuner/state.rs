//! Tuner state: slider values and the preview derived from them.
//!
//! The preview is always re-derived from the untouched original so repeated
//! adjustments never compound.

use image::{DynamicImage, RgbImage};

pub use crate::enhance::{AdjustmentParameters, NEUTRAL_SLIDER, SLIDER_MAX};
use crate::enhance::binarize;

/// Derives the preview for `params` from `original`.
///
/// Default parameters show the original untouched. Anything else is
/// adjusted, binarized, and expanded back to RGB for display.
pub fn render_preview(original: &RgbImage, params: &AdjustmentParameters) -> RgbImage {
    if *params == AdjustmentParameters::default() {
        return original.clone();
    }

    let adjusted = params.adjust(original);
    let binary = binarize(&adjusted, params.threshold);
    DynamicImage::ImageLuma8(binary).to_rgb8()
}

/// Where the polling loop is.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum TunerState {
    #[default]
    Idle,
    Rendering,
}

/// One tuning session over a single image.
pub struct TunerSession {
    original: RgbImage,
    params: AdjustmentParameters,
    rendered_for: Option<AdjustmentParameters>,
    frame: RgbImage,
    state: TunerState,
}

impl TunerSession {
    pub fn new(original: RgbImage) -> Self {
        let frame = original.clone();
        Self {
            original,
            params: AdjustmentParameters::default(),
            rendered_for: None,
            frame,
            state: TunerState::Idle,
        }
    }

    pub fn params(&self) -> AdjustmentParameters {
        self.params
    }

    pub fn params_mut(&mut self) -> &mut AdjustmentParameters {
        &mut self.params
    }

    pub fn state(&self) -> TunerState {
        self.state
    }

    pub fn original(&self) -> &RgbImage {
        &self.original
    }

    /// One loop iteration. Re-renders when the parameters changed since the
    /// last frame; returns whether a new frame was produced.
    pub fn poll(&mut self) -> bool {
        if self.rendered_for == Some(self.params) {
            return false;
        }

        self.state = TunerState::Rendering;
        self.frame = render_preview(&self.original, &self.params);
        self.rendered_for = Some(self.params);
        self.state = TunerState::Idle;
        true
    }

    /// Most recently rendered preview.
    pub fn frame(&self) -> &RgbImage {
        &self.frame
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgb;

    fn sample() -> RgbImage {
        RgbImage::from_fn(40, 20, |x, _| Rgb([(x * 6) as u8, 90, 200]))
    }

    #[test]
    fn test_default_preview_is_original() {
        let img = sample();
        assert_eq!(render_preview(&img, &AdjustmentParameters::default()), img);
    }

    #[test]
    fn test_adjusted_preview_is_binary() {
        let img = sample();
        let params = AdjustmentParameters {
            threshold: 100,
            ..Default::default()
        };

        let preview = render_preview(&img, &params);

        assert_eq!(preview.dimensions(), img.dimensions());
        assert!(preview.pixels().all(|p| *p == Rgb([0, 0, 0]) || *p == Rgb([255, 255, 255])));
    }

    #[test]
    fn test_poll_renders_only_on_change() {
        let mut session = TunerSession::new(sample());

        assert!(session.poll());
        assert!(!session.poll());
        assert_eq!(session.state(), TunerState::Idle);

        session.params_mut().threshold = 30;
        assert!(session.poll());
        assert!(!session.poll());
    }

    #[test]
    fn test_poll_derives_from_original() {
        let mut session = TunerSession::new(sample());

        session.params_mut().brightness = 100;
        session.poll();
        session.params_mut().brightness = 50;
        session.poll();

        // Back at defaults, the frame is the untouched original again
        assert_eq!(session.frame(), session.original());
    }
}
