use crate::parser::PageParser;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::sync::OnceLock;
use url::Url;

/// Metadata of one item page; written verbatim as the descriptor next to the image.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ItemRecord {
    pub page_url: String,
    pub description: String,
    pub tags: Vec<String>,
    pub image_url: String,
}

fn pin_url_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"/(\d{4,})").expect("pin url regex"))
}

fn pin_number_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"#? ?\d{5,}").expect("pin number regex"))
}

/// Identifier of an item page: the first run of 4+ digits opening a path segment.
pub fn parse_pin(item_url: &str) -> Option<u64> {
    let path = Url::parse(item_url)
        .map(|u| u.path().to_string())
        .unwrap_or_else(|_| item_url.to_string());
    let caps = pin_url_re().captures(&path)?;
    caps[1].parse::<u64>().ok().filter(|pin| *pin > 0)
}

/// Strips pin numbers, periods and standalone "pin" words, then collapses whitespace.
pub fn normalize_text(raw: &str) -> String {
    let without_numbers = pin_number_re().replace_all(raw, " ");
    let without_periods = without_numbers.replace('.', " ");
    without_periods
        .split_whitespace()
        .filter(|word| !word.eq_ignore_ascii_case("pin"))
        .collect::<Vec<_>>()
        .join(" ")
}

pub fn split_tags(tags: &str) -> Vec<String> {
    tags.split(',')
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .map(str::to_string)
        .collect()
}

/// Builds an `ItemRecord` from an item page. Both the metadata block and the
/// image URL must be present; missing description/tags become empty.
pub fn extract(parser: &dyn PageParser, page_url: &str, body: &str) -> Option<ItemRecord> {
    let metadata = parser.metadata(body)?;
    let image_src = parser.image_source(body)?;

    let image_url = Url::parse(page_url)
        .and_then(|base| base.join(&image_src))
        .map(|u| u.to_string())
        .unwrap_or(image_src);

    let description = normalize_text(metadata.description.as_deref().unwrap_or(""));
    let tags = split_tags(&normalize_text(metadata.tags.as_deref().unwrap_or("")));

    Some(ItemRecord {
        page_url: page_url.to_string(),
        description,
        tags,
        image_url,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::{GalleryPageParser, RawMetadata};

    struct StubParser {
        metadata: Option<RawMetadata>,
        image: Option<String>,
    }

    impl PageParser for StubParser {
        fn item_links(&self, _body: &str) -> Vec<String> {
            Vec::new()
        }
        fn metadata(&self, _body: &str) -> Option<RawMetadata> {
            self.metadata.clone()
        }
        fn image_source(&self, _body: &str) -> Option<String> {
            self.image.clone()
        }
    }

    #[test]
    fn parse_pin_reads_first_long_digit_run() {
        assert_eq!(parse_pin("http://www.example.com/123456-sunset"), Some(123456));
        assert_eq!(parse_pin("http://www.example.com/gallery/9876/photo"), Some(9876));
        assert_eq!(parse_pin("http://www.example.com/123-sunset"), None);
        assert_eq!(parse_pin("http://www.example.com/about"), None);
        assert_eq!(parse_pin("http://1234.example.com/about"), None);
    }

    #[test]
    fn normalize_strips_pin_tokens_periods_and_spaces() {
        assert_eq!(
            normalize_text(" Pin #123456  Misty lake.  At dawn PIN "),
            "Misty lake At dawn"
        );
        assert_eq!(normalize_text("pinned  pins pin"), "pinned pins");
        assert_eq!(normalize_text("visit foo.com now"), "visit foo com now");
        assert_eq!(normalize_text("code 12 3456789 end"), "code 12 end");
        assert_eq!(normalize_text(""), "");
    }

    #[test]
    fn normalize_is_idempotent() {
        let samples = [
            "pin pin pin",
            "Pin. #12345.pin",
            "a.b.c 1234.56789 # 99999 pin-up",
            "  lots\tof \n whitespace  ",
            "PIN#123456pin",
            "12.345.678",
        ];
        for sample in samples {
            let once = normalize_text(sample);
            assert_eq!(normalize_text(&once), once, "sample={sample:?}");
        }
    }

    #[test]
    fn split_tags_trims_and_drops_empties() {
        assert_eq!(
            split_tags(" lake, fog ,, dawn "),
            vec!["lake".to_string(), "fog".to_string(), "dawn".to_string()]
        );
        assert!(split_tags("").is_empty());
    }

    #[test]
    fn extract_requires_image_url_even_with_metadata() {
        let parser = StubParser {
            metadata: Some(RawMetadata {
                description: Some("A long enough description".to_string()),
                tags: Some("a, b".to_string()),
            }),
            image: None,
        };
        assert!(extract(&parser, "http://www.example.com/123456", "").is_none());
    }

    #[test]
    fn extract_requires_metadata_block() {
        let parser = StubParser {
            metadata: None,
            image: Some("http://cdn.example.com/1-a.jpg".to_string()),
        };
        assert!(extract(&parser, "http://www.example.com/123456", "").is_none());
    }

    #[test]
    fn extract_defaults_missing_captures_to_empty() {
        let parser = StubParser {
            metadata: Some(RawMetadata::default()),
            image: Some("/i/1-a.jpg".to_string()),
        };
        let record = extract(&parser, "http://www.example.com/123456", "").expect("record");
        assert_eq!(record.description, "");
        assert!(record.tags.is_empty());
        assert_eq!(record.image_url, "http://www.example.com/i/1-a.jpg");
    }

    #[test]
    fn extract_from_gallery_markup() {
        let html = r#"<html><head>
          <meta name="description" content="Pin 123456 Description: Misty lake at dawn. Tags: lake, fog, pin 123456" />
        </head><body>
          <div class="image_frame"><img src="http://cdn.example.com/i/123456-misty-lake.jpg"></div>
        </body></html>"#;
        let record = extract(
            &GalleryPageParser::new(),
            "http://www.example.com/123456-misty",
            html,
        )
        .expect("record");
        assert_eq!(record.description, "Misty lake at dawn");
        assert_eq!(record.tags, vec!["lake".to_string(), "fog".to_string()]);
        assert_eq!(record.image_url, "http://cdn.example.com/i/123456-misty-lake.jpg");
    }
}
