//! Field region preparation for the recognizer.

use image::imageops::FilterType;
use image::{GrayImage, ImageBuffer, Pixel};

use crate::config::RelativeRect;
use crate::enhance::{AdjustmentParameters, binarize};
use crate::prepare::PixelRect;

/// Field crops are enlarged before recognition; small handwriting reads poorly at 1x.
pub const OCR_UPSCALE: u32 = 2;

/// Pixel rectangle of `region` on an image of `dims`, clipped to the image.
pub fn region_bounds(dims: (u32, u32), region: &RelativeRect) -> PixelRect {
    let (w, h) = dims;

    let x = ((region.x.max(0.0) * w as f32) as u32).min(w);
    let y = ((region.y.max(0.0) * h as f32) as u32).min(h);
    let width = ((region.width.max(0.0) * w as f32) as u32).min(w - x);
    let height = ((region.height.max(0.0) * h as f32) as u32).min(h - y);

    PixelRect { x, y, width, height }
}

/// Cuts `region` out of `img`. Parts of the rect past the image edge are dropped.
pub fn crop_region<P>(img: &ImageBuffer<P, Vec<u8>>, region: &RelativeRect) -> ImageBuffer<P, Vec<u8>>
where
    P: Pixel<Subpixel = u8> + 'static,
{
    let bounds = region_bounds(img.dimensions(), region);
    image::imageops::crop_imm(img, bounds.x, bounds.y, bounds.width, bounds.height).to_image()
}

/// Crops one field, applies the brightness/contrast adjustment, enlarges it
/// and binarizes it with the adjustment's threshold.
pub fn prepare_region<P>(
    img: &ImageBuffer<P, Vec<u8>>,
    region: &RelativeRect,
    params: &AdjustmentParameters,
) -> GrayImage
where
    P: Pixel<Subpixel = u8> + 'static,
{
    let cropped = crop_region(img, region);
    if cropped.width() == 0 || cropped.height() == 0 {
        return GrayImage::new(0, 0);
    }
    let cropped = params.adjust(&cropped);

    let enlarged = image::imageops::resize(
        &cropped,
        cropped.width() * OCR_UPSCALE,
        cropped.height() * OCR_UPSCALE,
        FilterType::CatmullRom,
    );
    binarize(&enlarged, params.threshold)
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Luma, Rgb, RgbImage};

    #[test]
    fn test_crop_region_maps_relative_coords() {
        let img = RgbImage::from_fn(200, 100, |x, y| Rgb([x as u8, y as u8, 0]));

        let cropped = crop_region(&img, &RelativeRect { x: 0.25, y: 0.1, width: 0.1, height: 0.5 });

        assert_eq!(cropped.dimensions(), (20, 50));
        assert_eq!(cropped.get_pixel(0, 0).0, [50, 10, 0]);
    }

    #[test]
    fn test_crop_region_past_edge() {
        let img = RgbImage::new(80, 60);
        let cropped = crop_region(&img, &RelativeRect { x: 0.75, y: 0.5, width: 0.5, height: 0.8 });
        assert_eq!(cropped.dimensions(), (20, 30));
    }

    #[test]
    fn test_crop_region_outside_image_is_empty() {
        let img = RgbImage::new(50, 50);
        let region = RelativeRect { x: 1.5, y: 0.0, width: 0.2, height: 0.2 };
        assert_eq!(crop_region(&img, &region).width(), 0);
    }

    #[test]
    fn test_prepare_region_enlarges_and_binarizes() {
        let img = RgbImage::from_fn(100, 100, |x, _| if x < 50 { Rgb([10, 10, 10]) } else { Rgb([240, 240, 240]) });
        let region = RelativeRect { x: 0.0, y: 0.0, width: 1.0, height: 0.2 };

        let prepared = prepare_region(&img, &region, &AdjustmentParameters::default());

        assert_eq!(prepared.dimensions(), (200, 40));
        assert_eq!(prepared.get_pixel(0, 0)[0], 0);
        assert_eq!(prepared.get_pixel(199, 0)[0], 255);
        assert!(prepared.pixels().all(|p| p[0] == 0 || p[0] == 255));
    }

    #[test]
    fn test_prepare_region_accepts_gray() {
        let img = GrayImage::from_pixel(40, 40, Luma([200]));
        let region = RelativeRect { x: 0.25, y: 0.25, width: 0.5, height: 0.5 };

        let prepared = prepare_region(&img, &region, &AdjustmentParameters::default());

        assert_eq!(prepared.dimensions(), (40, 40));
        assert!(prepared.pixels().all(|p| p[0] == 255));
    }

    #[test]
    fn test_prepare_region_applies_brightness() {
        let img = GrayImage::from_pixel(40, 40, Luma([150]));
        let region = RelativeRect { x: 0.0, y: 0.0, width: 1.0, height: 1.0 };

        let neutral = prepare_region(&img, &region, &AdjustmentParameters::default());
        assert!(neutral.pixels().all(|p| p[0] == 255));

        // Brightness 20 is an offset of -76, taking 150 below the threshold
        let darker = AdjustmentParameters { brightness: 20, ..Default::default() };
        let prepared = prepare_region(&img, &region, &darker);
        assert!(prepared.pixels().all(|p| p[0] == 0));
    }

    #[test]
    fn test_region_bounds() {
        let rect = RelativeRect { x: 0.5, y: 0.25, width: 0.75, height: 0.5 };
        assert_eq!(
            region_bounds((100, 80), &rect),
            PixelRect { x: 50, y: 20, width: 50, height: 40 }
        );
    }
}
