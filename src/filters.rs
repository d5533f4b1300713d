use crate::codec;
use crate::config::GrabConfig;
use crate::extract::ItemRecord;
use image::{DynamicImage, GenericImageView};
use thiserror::Error;

/// Why an item was permanently skipped. Rejected identifiers are still recorded.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Rejection {
    #[error("description too short ({len} < {min})")]
    DescriptionTooShort { len: usize, min: usize },

    #[error("description contains excluded text {0:?}")]
    ExcludedDescription(String),

    #[error("image url has excluded extension {0:?}")]
    ExcludedExtension(String),

    #[error("page url contains excluded path {0:?}")]
    ExcludedPagePath(String),

    #[error("excluded tag {0:?}")]
    ExcludedTag(String),

    #[error("pixel format {0} is not accepted")]
    PixelFormat(String),

    #[error("image too small ({width}x{height}, need width+height >= {min_sum})")]
    TooSmall { width: u32, height: u32, min_sum: u32 },
}

pub fn check_page(config: &GrabConfig, record: &ItemRecord) -> Result<(), Rejection> {
    let len = record.description.chars().count();
    if len < config.description_min_length {
        return Err(Rejection::DescriptionTooShort {
            len,
            min: config.description_min_length,
        });
    }

    let description = record.description.to_lowercase();
    if let Some(hit) = config
        .exclude_description
        .iter()
        .find(|s| description.contains(&s.to_lowercase()))
    {
        return Err(Rejection::ExcludedDescription(hit.clone()));
    }

    let image_url = record.image_url.to_ascii_lowercase();
    if let Some(ext) = config
        .exclude_image_extensions
        .iter()
        .find(|ext| image_url.ends_with(&ext.to_ascii_lowercase()))
    {
        return Err(Rejection::ExcludedExtension(ext.clone()));
    }

    if let Some(path) = config
        .exclude_page_paths
        .iter()
        .find(|p| record.page_url.contains(p.as_str()))
    {
        return Err(Rejection::ExcludedPagePath(path.clone()));
    }

    if let Some(tag) = record
        .tags
        .iter()
        .find(|tag| config.exclude_tags.iter().any(|ex| ex == *tag))
    {
        return Err(Rejection::ExcludedTag(tag.clone()));
    }

    Ok(())
}

pub fn check_image(config: &GrabConfig, image: &DynamicImage) -> Result<(), Rejection> {
    let mode = codec::pixel_mode(image);
    if !config.accept_pixel_modes.iter().any(|m| m == mode) {
        return Err(Rejection::PixelFormat(mode.to_string()));
    }

    let (width, height) = image.dimensions();
    if width.saturating_add(height) < config.size_min_sum {
        return Err(Rejection::TooSmall {
            width,
            height,
            min_sum: config.size_min_sum,
        });
    }
    Ok(())
}
