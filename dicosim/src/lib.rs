//! Semantic definition search over cached Le Robert dictionary pages.
//!
//! The binary drives four stages around the [`lerobert`] crate: scraping
//! definition pages and media into a local cache, processing cached pages
//! (headword highlighting, example ids, link rewrites), computing example
//! embeddings through an external inference service, and serving the query
//! API that matches a selected span of text against semantically similar
//! example sentences.

pub mod colors;
pub mod config;
pub mod consts;
pub mod embedder;
mod error;
pub mod handlers;
pub mod http;
pub mod jobs;
pub mod pipeline;
pub mod scrape;
pub mod server;
pub mod store;
pub mod tagger;
pub mod tracing;

pub use config::Config;
pub use error::Error;
pub use handlers::{AppState, router};
