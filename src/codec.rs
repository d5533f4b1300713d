use crate::config::GrabConfig;
use crate::{GrabError, Result};
use image::{ColorType, DynamicImage, GenericImageView, ImageFormat};
use std::borrow::Cow;
use std::io::Cursor;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct JpegOptions {
    pub quality: u8,
    pub progressive: bool,
}

impl JpegOptions {
    pub fn from_config(config: &GrabConfig) -> Self {
        Self {
            quality: config.jpeg_quality,
            progressive: config.jpeg_progressive,
        }
    }
}

pub fn decode(bytes: &[u8]) -> Result<DynamicImage> {
    Ok(image::load_from_memory(bytes)?)
}

/// Pixel mode name of a decoded image, using the conventional short names
/// ("L", "LA", "RGB", "RGBA", ...) the filter config is written in.
pub fn pixel_mode(image: &DynamicImage) -> &'static str {
    match image.color() {
        ColorType::L8 => "L",
        ColorType::La8 => "LA",
        ColorType::Rgb8 => "RGB",
        ColorType::Rgba8 => "RGBA",
        ColorType::L16 => "I;16",
        ColorType::La16 => "LA;16",
        ColorType::Rgb16 => "RGB;16",
        ColorType::Rgba16 => "RGBA;16",
        ColorType::Rgb32F => "RGBF",
        ColorType::Rgba32F => "RGBAF",
        _ => "unknown",
    }
}

/// Encodes `image` in the format implied by `file_name`'s extension.
pub fn encode_for_file(image: &DynamicImage, file_name: &str, jpeg: &JpegOptions) -> Result<Vec<u8>> {
    match ImageFormat::from_path(file_name)? {
        ImageFormat::Jpeg => encode_jpeg(image, jpeg),
        other => {
            let mut out = Cursor::new(Vec::new());
            image.write_to(&mut out, other)?;
            Ok(out.into_inner())
        }
    }
}

/// JPEG has no alpha channel: anything other than 8-bit gray is flattened to RGB.
fn encode_jpeg(image: &DynamicImage, options: &JpegOptions) -> Result<Vec<u8>> {
    let (width, height) = image.dimensions();
    let too_large = || GrabError::JpegTooLarge { width, height };
    let w = u16::try_from(width).map_err(|_| too_large())?;
    let h = u16::try_from(height).map_err(|_| too_large())?;

    let (flat, color): (Cow<'_, DynamicImage>, jpeg_encoder::ColorType) = match image.color() {
        ColorType::L8 => (Cow::Borrowed(image), jpeg_encoder::ColorType::Luma),
        ColorType::Rgb8 => (Cow::Borrowed(image), jpeg_encoder::ColorType::Rgb),
        _ => (
            Cow::Owned(DynamicImage::ImageRgb8(image.to_rgb8())),
            jpeg_encoder::ColorType::Rgb,
        ),
    };

    let mut out = Vec::new();
    let mut encoder = jpeg_encoder::Encoder::new(&mut out, options.quality.clamp(1, 100));
    encoder.set_progressive(options.progressive);
    encoder.encode(flat.as_bytes(), w, h, color)?;
    Ok(out)
}
