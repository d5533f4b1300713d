pub mod codec;
pub mod config;
pub mod crawl;
pub mod crop;
pub mod db;
mod error;
pub mod extract;
pub mod fetch;
pub mod filters;
pub mod ledger;
pub mod logging;
pub mod parser;
pub mod paths;
pub mod pipeline;
pub mod seeds;

pub use error::{FetchError, GrabError, Result};
