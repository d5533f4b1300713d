use crate::{GrabError, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const DEFAULT_USER_AGENT: &str =
    "Mozilla/5.0 (Windows NT 6.1; Win64; x64; rv:57.0) Gecko/20100101 Firefox/57.0";

/// Every tunable of a crawl run. `Default` carries the compiled-in values;
/// a JSON file may override any subset of them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GrabConfig {
    /// Appended to each seed; `{page}` is replaced with the page number.
    pub page_suffix: String,
    pub first_page: u32,
    pub last_page: u32,
    /// Prefix bare host names with `www.`.
    pub force_www: bool,

    pub storage_dir: PathBuf,
    /// Holds the ledger database and run logs.
    pub state_dir: PathBuf,
    pub descriptor_file_name: String,

    pub max_workers: usize,
    pub max_sequential_page_errors: usize,
    /// Zero disables the limit.
    pub download_limit: usize,
    pub page_delay_ms: u64,
    pub http_timeout_secs: u64,
    pub user_agent: String,
    pub ledger_commit_every: usize,

    pub description_min_length: usize,
    pub size_min_sum: u32,
    pub accept_pixel_modes: Vec<String>,
    pub exclude_description: Vec<String>,
    pub exclude_tags: Vec<String>,
    pub exclude_page_paths: Vec<String>,
    pub exclude_image_extensions: Vec<String>,

    pub border_color: [u8; 3],
    pub border_height: u32,
    pub border_tolerance: u32,
    pub jpeg_quality: u8,
    pub jpeg_progressive: bool,
}

impl Default for GrabConfig {
    fn default() -> Self {
        Self {
            page_suffix: "?page={page}".to_string(),
            first_page: 1,
            last_page: 149,
            force_www: true,
            storage_dir: PathBuf::from("upload"),
            state_dir: PathBuf::from(".pingrab"),
            descriptor_file_name: "info.dsc".to_string(),
            max_workers: 5,
            max_sequential_page_errors: 5,
            download_limit: 1500,
            page_delay_ms: 2_000,
            http_timeout_secs: 25,
            user_agent: DEFAULT_USER_AGENT.to_string(),
            ledger_commit_every: 100,
            description_min_length: 10,
            size_min_sum: 1100,
            accept_pixel_modes: vec!["RGB".to_string(), "RGBA".to_string()],
            // Periods are already turned into spaces by normalization, so " com" catches "foo.com".
            exclude_description: vec![
                "http".to_string(),
                "www".to_string(),
                " com".to_string(),
                "dot-com".to_string(),
            ],
            exclude_tags: Vec::new(),
            exclude_page_paths: vec!["/video/".to_string()],
            exclude_image_extensions: vec![".gif".to_string()],
            border_color: [246, 246, 246],
            border_height: 24,
            border_tolerance: 10,
            jpeg_quality: 90,
            jpeg_progressive: true,
        }
    }
}

impl GrabConfig {
    pub fn page_delay(&self) -> Duration {
        Duration::from_millis(self.page_delay_ms)
    }

    pub fn http_timeout(&self) -> Duration {
        Duration::from_secs(self.http_timeout_secs)
    }

    pub fn download_limit(&self) -> Option<usize> {
        (self.download_limit > 0).then_some(self.download_limit)
    }

    pub fn validate(&self) -> Result<()> {
        if self.first_page > self.last_page {
            return Err(GrabError::Config(format!(
                "first_page {} is after last_page {}",
                self.first_page, self.last_page
            )));
        }
        if !self.page_suffix.contains("{page}") {
            return Err(GrabError::Config(
                "page_suffix must contain a {page} placeholder".to_string(),
            ));
        }
        if self.max_workers == 0 {
            return Err(GrabError::Config("max_workers must be at least 1".to_string()));
        }
        if self.ledger_commit_every == 0 {
            return Err(GrabError::Config(
                "ledger_commit_every must be at least 1".to_string(),
            ));
        }
        if self.descriptor_file_name.trim().is_empty() {
            return Err(GrabError::Config("descriptor_file_name is empty".to_string()));
        }
        Ok(())
    }
}

pub fn load(path: &Path) -> Result<GrabConfig> {
    if !path.exists() {
        return Ok(GrabConfig::default());
    }
    let bytes = std::fs::read(path)?;
    let parsed: GrabConfig = serde_json::from_slice(&bytes).map_err(|e| {
        GrabError::Config(format!(
            "failed to parse config at {}: {e}",
            path.to_string_lossy()
        ))
    })?;
    parsed.validate()?;
    Ok(parsed)
}

pub fn save(path: &Path, config: &GrabConfig) -> Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let json = serde_json::to_string_pretty(config)?;
    std::fs::write(path, format!("{json}\n"))?;
    Ok(())
}
