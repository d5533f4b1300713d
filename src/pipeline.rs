//! Per-identifier processing: dedup check, page fetch, extraction, filtering,
//! image download, cropping, persistence and ledger recording.
//!
//! Only transient failures (`ItemOutcome::Failed`) count against a page's error
//! budget. Rejections are recorded in the ledger so they are never fetched
//! again; failures are not, so a later run retries them.

use crate::codec::{self, JpegOptions};
use crate::config::GrabConfig;
use crate::crop::{crop_borders, BorderSpec};
use crate::extract::{self, ItemRecord};
use crate::fetch::Fetcher;
use crate::filters::{self, Rejection};
use crate::ledger::PinLedger;
use crate::parser::PageParser;
use crate::paths::AppPaths;
use crate::{GrabError, Result};
use image::DynamicImage;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};
use url::Url;

#[derive(Debug)]
pub enum ItemOutcome {
    /// The item URL carries no identifier; nothing to do.
    NoIdentifier,
    AlreadyRecorded { pin: u64 },
    Rejected { pin: u64, reason: Rejection },
    Saved { pin: u64, image_path: PathBuf },
    Failed { pin: u64, error: GrabError },
}

impl ItemOutcome {
    pub fn is_failure(&self) -> bool {
        matches!(self, ItemOutcome::Failed { .. })
    }
}

enum Verdict {
    Saved(PathBuf),
    Rejected(Rejection),
}

pub struct ItemPipeline<'a> {
    config: &'a GrabConfig,
    paths: &'a AppPaths,
    ledger: &'a PinLedger,
    fetcher: &'a dyn Fetcher,
    parser: &'a dyn PageParser,
    border: BorderSpec,
    jpeg: JpegOptions,
}

impl<'a> ItemPipeline<'a> {
    pub fn new(
        config: &'a GrabConfig,
        paths: &'a AppPaths,
        ledger: &'a PinLedger,
        fetcher: &'a dyn Fetcher,
        parser: &'a dyn PageParser,
    ) -> Self {
        Self {
            config,
            paths,
            ledger,
            fetcher,
            parser,
            border: BorderSpec::from_config(config),
            jpeg: JpegOptions::from_config(config),
        }
    }

    pub fn process(&self, worker: usize, item_url: &str, headers: &[(String, String)]) -> ItemOutcome {
        let Some(pin) = extract::parse_pin(item_url) else {
            debug!(event = "item_without_identifier", worker, url = item_url);
            return ItemOutcome::NoIdentifier;
        };

        match self.ledger.exists(pin) {
            Ok(true) => {
                info!(event = "item_already_recorded", worker, pin, "already downloaded, skipping");
                return ItemOutcome::AlreadyRecorded { pin };
            }
            Ok(false) => {}
            Err(error) => return failed(worker, pin, error),
        }

        info!(event = "item_requested", worker, pin, url = item_url);
        let verdict = match self.run_stages(worker, pin, item_url, headers) {
            Ok(v) => v,
            Err(error) => return failed(worker, pin, error),
        };

        match self.record(worker, pin) {
            Ok(true) => {}
            Ok(false) => return ItemOutcome::AlreadyRecorded { pin },
            Err(error) => return failed(worker, pin, error),
        }

        match verdict {
            Verdict::Rejected(reason) => {
                info!(event = "item_rejected", worker, pin, reason = %reason, "quality filter rejected item");
                ItemOutcome::Rejected { pin, reason }
            }
            Verdict::Saved(image_path) => {
                info!(event = "item_saved", worker, pin, path = %image_path.display(), "saved image");
                ItemOutcome::Saved { pin, image_path }
            }
        }
    }

    fn run_stages(
        &self,
        worker: usize,
        pin: u64,
        item_url: &str,
        headers: &[(String, String)],
    ) -> Result<Verdict> {
        let body = self.fetcher.get(item_url, headers)?;
        let body = String::from_utf8_lossy(&body);
        let record = extract::extract(self.parser, item_url, &body)
            .ok_or(GrabError::ExtractionFailure)?;
        debug!(
            event = "item_extracted",
            worker,
            pin,
            description = %record.description,
            tags = ?record.tags,
            image_url = %record.image_url
        );

        if let Err(reason) = filters::check_page(self.config, &record) {
            return Ok(Verdict::Rejected(reason));
        }

        info!(event = "image_requested", worker, pin, url = %record.image_url);
        let bytes = self.fetcher.get_binary(&record.image_url, headers)?;
        let image = codec::decode(&bytes)?;
        if let Err(reason) = filters::check_image(self.config, &image) {
            return Ok(Verdict::Rejected(reason));
        }

        let image = crop_borders(image, &self.border);

        let file_name = file_name_from_url(&record.image_url)
            .ok_or_else(|| GrabError::EmptyFilename(record.image_url.clone()))?;
        let image_path = self.persist(pin, &file_name, &image, &record)?;
        Ok(Verdict::Saved(image_path))
    }

    /// Writes image and descriptor into the identifier's directory; on any
    /// failure the directory is removed so it never holds just one of them.
    fn persist(
        &self,
        pin: u64,
        file_name: &str,
        image: &DynamicImage,
        record: &ItemRecord,
    ) -> Result<PathBuf> {
        let dir = self.paths.item_dir(pin);
        std::fs::create_dir_all(&dir)?;

        let image_path = dir.join(file_name);
        let written = codec::encode_for_file(image, file_name, &self.jpeg)
            .and_then(|bytes| Ok(std::fs::write(&image_path, bytes)?));
        if let Err(error) = written {
            remove_item_dir(&dir);
            return Err(error);
        }

        let descriptor_path = dir.join(&self.config.descriptor_file_name);
        let written = serde_json::to_vec_pretty(record)
            .map_err(GrabError::from)
            .and_then(|json| Ok(std::fs::write(&descriptor_path, json)?));
        if let Err(error) = written {
            remove_item_dir(&dir);
            return Err(error);
        }

        Ok(image_path)
    }

    /// Returns false when another invocation recorded `pin` first.
    fn record(&self, worker: usize, pin: u64) -> Result<bool> {
        match self.ledger.add(pin) {
            Ok(()) => Ok(true),
            Err(GrabError::DuplicateIdentifier(_)) => {
                warn!(event = "ledger_duplicate", worker, pin, "identifier already recorded");
                Ok(false)
            }
            Err(error) => Err(error),
        }
    }
}

fn failed(worker: usize, pin: u64, error: GrabError) -> ItemOutcome {
    warn!(event = "item_failed", worker, pin, error = %error, "item failed, will retry on a later run");
    ItemOutcome::Failed { pin, error }
}

fn remove_item_dir(dir: &Path) {
    if let Err(error) = std::fs::remove_dir_all(dir) {
        warn!(event = "item_dir_cleanup_failed", dir = %dir.display(), error = %error);
    }
}

/// Last path segment of the image URL with its leading `<token>-` prefix removed.
pub fn file_name_from_url(image_url: &str) -> Option<String> {
    let parsed = Url::parse(image_url).ok()?;
    let segment = parsed
        .path_segments()
        .and_then(|mut segments| segments.next_back())
        .unwrap_or("");
    let name = match segment.split_once('-') {
        Some((_, rest)) => rest,
        None => segment,
    };
    if name.is_empty() || name == "." || name == ".." {
        return None;
    }
    Some(name.to_string())
}
