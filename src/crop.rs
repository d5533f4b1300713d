use crate::config::GrabConfig;
use image::{DynamicImage, GenericImageView};

/// Stacked footer bands are stripped at most this many times.
pub const MAX_BORDER_BANDS: u32 = 2;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BorderSpec {
    pub color: [u8; 3],
    pub band_height: u32,
    pub tolerance: u32,
}

impl BorderSpec {
    pub fn from_config(config: &GrabConfig) -> Self {
        Self {
            color: config.border_color,
            band_height: config.border_height,
            tolerance: config.border_tolerance,
        }
    }

    fn is_border_like(&self, pixel: [u8; 3]) -> bool {
        let diff: u32 = pixel
            .iter()
            .zip(self.color.iter())
            .map(|(a, b)| u32::from(a.abs_diff(*b)))
            .sum();
        diff <= self.tolerance
    }
}

/// Removes solid footer bands from the bottom of `image`.
pub fn crop_borders(image: DynamicImage, border: &BorderSpec) -> DynamicImage {
    crop_from_depth(image, border, 0)
}

fn crop_from_depth(image: DynamicImage, border: &BorderSpec, depth: u32) -> DynamicImage {
    if depth >= MAX_BORDER_BANDS || !has_bottom_border(&image, border) {
        return image;
    }
    let (width, height) = image.dimensions();
    let cropped = image.crop_imm(0, 0, width, height - border.band_height);
    crop_from_depth(cropped, border, depth + 1)
}

/// Samples left corner, middle and right corner of the last row; two of three must match.
fn has_bottom_border(image: &DynamicImage, border: &BorderSpec) -> bool {
    let (width, height) = image.dimensions();
    if width == 0 || border.band_height == 0 || height <= border.band_height {
        return false;
    }
    let y = height - 1;
    let matches = [0, width / 2, width - 1]
        .into_iter()
        .filter(|&x| {
            let p = image.get_pixel(x, y).0;
            border.is_border_like([p[0], p[1], p[2]])
        })
        .count();
    matches >= 2
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Rgb, RgbImage};

    const BORDER: Rgb<u8> = Rgb([246, 246, 246]);
    const CONTENT: Rgb<u8> = Rgb([30, 90, 140]);

    fn border() -> BorderSpec {
        BorderSpec::from_config(&GrabConfig::default())
    }

    /// `bands` border bands of 24 rows stacked at the bottom of a 100x200 image.
    fn image_with_bands(bands: u32) -> DynamicImage {
        let height = 200;
        let border_from = height - bands * 24;
        let img = RgbImage::from_fn(100, height, |_, y| {
            if y >= border_from {
                BORDER
            } else {
                CONTENT
            }
        });
        DynamicImage::ImageRgb8(img)
    }

    #[test]
    fn no_border_is_a_no_op() {
        let out = crop_borders(image_with_bands(0), &border());
        assert_eq!(out.dimensions(), (100, 200));
    }

    #[test]
    fn single_band_is_removed() {
        let out = crop_borders(image_with_bands(1), &border());
        assert_eq!(out.dimensions(), (100, 176));
    }

    #[test]
    fn never_removes_more_than_two_bands() {
        let out = crop_borders(image_with_bands(2), &border());
        assert_eq!(out.dimensions(), (100, 152));
        let out = crop_borders(image_with_bands(5), &border());
        assert_eq!(out.dimensions(), (100, 152));
    }

    #[test]
    fn one_matching_sample_is_not_enough() {
        let mut img = RgbImage::from_pixel(100, 200, CONTENT);
        img.put_pixel(0, 199, BORDER);
        let out = crop_borders(DynamicImage::ImageRgb8(img), &border());
        assert_eq!(out.dimensions(), (100, 200));
    }

    #[test]
    fn two_of_three_samples_within_tolerance_trigger_crop() {
        let mut img = RgbImage::from_pixel(100, 200, CONTENT);
        // 3 + 3 + 4 = 10, exactly the tolerance.
        img.put_pixel(0, 199, Rgb([243, 249, 242]));
        img.put_pixel(50, 199, BORDER);
        let out = crop_borders(DynamicImage::ImageRgb8(img), &border());
        assert_eq!(out.dimensions(), (100, 176));
    }

    #[test]
    fn just_outside_tolerance_is_kept() {
        let mut img = RgbImage::from_pixel(100, 200, CONTENT);
        img.put_pixel(0, 199, Rgb([242, 249, 242]));
        img.put_pixel(99, 199, Rgb([246, 246, 235]));
        let out = crop_borders(DynamicImage::ImageRgb8(img), &border());
        assert_eq!(out.dimensions(), (100, 200));
    }

    #[test]
    fn image_not_taller_than_band_is_untouched() {
        let img = DynamicImage::ImageRgb8(RgbImage::from_pixel(10, 24, BORDER));
        assert_eq!(crop_borders(img, &border()).dimensions(), (10, 24));
    }
}
