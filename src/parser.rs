//! Site-markup glue: everything that knows what the gallery's HTML looks like.

use regex::Regex;
use scraper::{Html, Selector};
use std::collections::HashSet;

/// Raw, un-normalized captures from an item page's metadata block.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RawMetadata {
    pub description: Option<String>,
    pub tags: Option<String>,
}

pub trait PageParser: Sync {
    /// Hrefs of anchors that wrap an image, in document order, without duplicates.
    fn item_links(&self, body: &str) -> Vec<String>;

    /// `None` when the page has no metadata block at all.
    fn metadata(&self, body: &str) -> Option<RawMetadata>;

    fn image_source(&self, body: &str) -> Option<String>;
}

/// Parser for listing/item pages that carry `<meta name="description">` with
/// `Description: ... Tags: ...` content and a `div.image_frame` holding the picture.
pub struct GalleryPageParser {
    anchor: Selector,
    img: Selector,
    meta_description: Selector,
    frame_image: Selector,
    description_re: Regex,
    tags_re: Regex,
}

impl Default for GalleryPageParser {
    fn default() -> Self {
        Self::new()
    }
}

impl GalleryPageParser {
    pub fn new() -> Self {
        Self {
            anchor: Selector::parse("a[href]").expect("anchor selector"),
            img: Selector::parse("img").expect("img selector"),
            meta_description: Selector::parse(r#"meta[name="description"]"#)
                .expect("meta description selector"),
            frame_image: Selector::parse("div.image_frame img[src]").expect("frame selector"),
            description_re: Regex::new(r"(?s)Description:(.+?)(?:Tags:|$)")
                .expect("description regex"),
            tags_re: Regex::new(r"(?s)Tags:(.+)$").expect("tags regex"),
        }
    }

    fn split_meta_content(&self, content: &str) -> RawMetadata {
        let capture = |re: &Regex| {
            re.captures(content)
                .and_then(|c| c.get(1))
                .map(|m| m.as_str().to_string())
        };
        RawMetadata {
            description: capture(&self.description_re),
            tags: capture(&self.tags_re),
        }
    }
}

impl PageParser for GalleryPageParser {
    fn item_links(&self, body: &str) -> Vec<String> {
        let document = Html::parse_document(body);
        let mut seen = HashSet::new();
        let mut out = Vec::new();
        for a in document.select(&self.anchor) {
            let Some(href) = a.value().attr("href") else {
                continue;
            };
            let href = href.trim();
            if href.len() < 2 || !href.starts_with('/') || href.starts_with("//") {
                continue;
            }
            if a.select(&self.img).next().is_none() {
                continue;
            }
            if seen.insert(href.to_string()) {
                out.push(href.to_string());
            }
        }
        out
    }

    fn metadata(&self, body: &str) -> Option<RawMetadata> {
        let document = Html::parse_document(body);
        let meta = document.select(&self.meta_description).next()?;
        let content = meta.value().attr("content")?;
        Some(self.split_meta_content(content))
    }

    fn image_source(&self, body: &str) -> Option<String> {
        let document = Html::parse_document(body);
        document
            .select(&self.frame_image)
            .filter_map(|img| img.value().attr("src"))
            .map(str::trim)
            .find(|src| !src.is_empty())
            .map(str::to_string)
    }
}
