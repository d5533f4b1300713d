use crate::Result;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Target {
    Url(String),
    List(PathBuf),
}

/// A URL-looking argument, or anything that is not an existing file, is a single seed.
pub fn resolve_target(arg: &str) -> Target {
    let arg = arg.trim();
    let lower = arg.to_ascii_lowercase();
    let looks_like_url =
        lower.starts_with("http://") || lower.starts_with("https://") || lower.starts_with("www.");
    if looks_like_url || !Path::new(arg).is_file() {
        Target::Url(arg.to_string())
    } else {
        Target::List(PathBuf::from(arg))
    }
}

/// One seed per line; `#` starts a comment, blank lines are ignored.
pub fn parse_seed_list(contents: &str) -> Vec<String> {
    contents
        .lines()
        .map(|line| line.split('#').next().unwrap_or("").trim())
        .filter(|line| !line.is_empty())
        .map(str::to_string)
        .collect()
}

pub fn load_seeds(target: &Target) -> Result<Vec<String>> {
    match target {
        Target::Url(url) => Ok(vec![url.clone()]),
        Target::List(path) => {
            let contents = std::fs::read_to_string(path)?;
            Ok(parse_seed_list(&contents))
        }
    }
}
