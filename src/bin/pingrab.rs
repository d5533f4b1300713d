use std::path::PathBuf;

use pingrab::config::{self, GrabConfig};
use pingrab::crawl::CrawlController;
use pingrab::fetch::HttpFetcher;
use pingrab::ledger::PinLedger;
use pingrab::parser::GalleryPageParser;
use pingrab::paths::AppPaths;
use pingrab::{logging, seeds};

fn main() -> Result<(), String> {
    let args: Vec<String> = std::env::args().collect();

    if args.iter().any(|a| a == "-h" || a == "--help") {
        print_help();
        return Ok(());
    }
    let target = match args.as_slice() {
        [_, target] => seeds::resolve_target(target),
        _ => return Err("expected exactly one argument: a seed url or a url-list file (try --help)".to_string()),
    };

    let config = load_config()?;
    let paths = AppPaths::from_config(&config);
    paths.ensure_dirs().map_err(|e| {
        format!(
            "cannot create storage dir {}: {e}",
            paths.storage_dir.to_string_lossy()
        )
    })?;

    let run_id = uuid::Uuid::new_v4().to_string();
    let log_path = logging::init(&paths, &run_id).map_err(|e| e.to_string())?;

    let seed_urls = seeds::load_seeds(&target).map_err(|e| e.to_string())?;
    if seed_urls.is_empty() {
        return Err("no seed urls to crawl".to_string());
    }

    let ledger = PinLedger::open(&paths.ledger_path(), config.ledger_commit_every)
        .map_err(|e| e.to_string())?;
    let fetcher = HttpFetcher::new(&config);
    let parser = GalleryPageParser::new();

    tracing::info!(
        event = "run_started",
        run_id = %run_id,
        seeds = seed_urls.len(),
        storage_dir = %paths.storage_dir.display(),
        log = %log_path.display()
    );

    let summary = {
        let controller = CrawlController::new(&config, &paths, &ledger, &fetcher, &parser);
        controller.crawl_all(&seed_urls)
    };

    ledger.close().map_err(|e| e.to_string())?;

    tracing::info!(
        event = "run_finished",
        run_id = %run_id,
        seeds_crawled = summary.seeds.len(),
        seeds_skipped = summary.skipped_seeds,
        seeds_invalid = summary.invalid_seeds,
        downloads = summary.downloads,
        "run finished"
    );
    Ok(())
}

fn load_config() -> Result<GrabConfig, String> {
    let Ok(raw) = std::env::var("PINGRAB_CONFIG") else {
        return Ok(GrabConfig::default());
    };
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Ok(GrabConfig::default());
    }
    config::load(&PathBuf::from(trimmed)).map_err(|e| e.to_string())
}

fn print_help() {
    println!(
        r#"pingrab

Crawls the listing pages of a gallery site and saves every qualifying image
with its description into <storage_dir>/<pin>/.

Usage:
  pingrab <seed-url>
  pingrab <url-list-file>

A url-list file holds one seed per line; text after '#' is ignored.

Environment:
  PINGRAB_CONFIG   JSON file overriding the built-in settings
  RUST_LOG         log filter (default: pingrab=info)
"#
    );
}
