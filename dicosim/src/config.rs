use std::path::{Path, PathBuf};
use std::time::Duration;

use figment::Figment;
use figment::providers::{Env, Format, Toml};
use serde::{Deserialize, Serialize};

use crate::Error;

#[derive(Clone, Debug, Default, Deserialize, Serialize)]
pub struct Config {
    /// Asset cache layout
    #[serde(default)]
    pub assets: AssetsConfig,
    /// Scraper configuration
    #[serde(default)]
    pub scrape: ScrapeConfig,
    /// Word tagger configuration
    #[serde(default)]
    pub tagger: TaggerConfig,
    /// Embedding service configuration
    #[serde(default)]
    pub embedding: EmbeddingConfig,
    /// Web server configuration
    #[serde(default)]
    pub server: ServerConfig,
    /// Tracing configuration
    #[serde(default)]
    pub tracing: TracingConfig,
}

#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct AssetsConfig {
    /// Root of the static assets served by the web UI.
    #[serde(default = "default_assets_root")]
    pub root: PathBuf,
    /// Directory of raw downloaded pages.
    #[serde(default = "default_html_original")]
    pub html_original: PathBuf,
    /// Directory of processed pages.
    #[serde(default = "default_html_processed")]
    pub html_processed: PathBuf,
    /// Directory of pronunciation audio files.
    #[serde(default = "default_audio")]
    pub audio: PathBuf,
    /// Directory of image thumbnails.
    #[serde(default = "default_images")]
    pub images: PathBuf,
    /// Directory of per-model embedding stacks.
    #[serde(default = "default_embeddings")]
    pub embeddings: PathBuf,
    /// Path of the persisted word index.
    #[serde(default = "default_word_index")]
    pub word_index: PathBuf,
}

#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct ScrapeConfig {
    /// Number of downloads dispatched per batch.
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
    /// Refetch pages already present in the cache.
    #[serde(default)]
    pub rewrite: bool,
    /// Pause between batches, as a politeness delay.
    #[serde(default = "default_scrape_delay", with = "humantime_serde")]
    pub delay: Duration,
}

#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct TaggerConfig {
    /// The tagger command; it must read UTF-8 text on stdin and emit one
    /// `word<TAB>pos<TAB>lemma` line per token.
    #[serde(default = "default_tagger_command")]
    pub command: String,
    /// Extra arguments passed to the tagger command.
    #[serde(default)]
    pub args: Vec<String>,
}

#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct EmbeddingConfig {
    /// Base URL of the embedding inference service.
    #[serde(default = "default_embedding_endpoint")]
    pub endpoint: String,
    /// Model names, in the index order the query API exposes.
    #[serde(default = "default_models")]
    pub models: Vec<String>,
    /// Maximum content-token count for a contextual selection embedding.
    #[serde(default = "default_max_length")]
    pub max_length: usize,
    /// Number of documents embedded per batch.
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
}

#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct ServerConfig {
    /// The address to listen on.
    #[serde(default = "default_host")]
    pub host: String,
    /// The port to listen on.
    #[serde(default = "default_port")]
    pub port: u16,
}

#[derive(Clone, Debug, Default, Deserialize, Serialize)]
pub struct TracingConfig {
    /// Emit JSON log lines instead of the human-readable format.
    #[serde(default)]
    pub json: bool,
}

impl Config {
    /// Loads the configuration from a TOML file, with `DICOSIM_`-prefixed
    /// environment variables taking precedence (`DICOSIM_SERVER__PORT=8001`).
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] if the file or the environment overrides
    /// cannot be extracted.
    pub fn load(path: impl AsRef<Path>) -> Result<Config, Error> {
        Figment::new()
            .merge(Toml::file(path.as_ref()))
            .merge(Env::prefixed("DICOSIM_").split("__"))
            .extract()
            .map_err(|err| Error::Config(Box::new(err)))
    }
}

impl Default for AssetsConfig {
    fn default() -> Self {
        AssetsConfig {
            root: default_assets_root(),
            html_original: default_html_original(),
            html_processed: default_html_processed(),
            audio: default_audio(),
            images: default_images(),
            embeddings: default_embeddings(),
            word_index: default_word_index(),
        }
    }
}

impl Default for ScrapeConfig {
    fn default() -> Self {
        ScrapeConfig {
            batch_size: default_batch_size(),
            rewrite: false,
            delay: default_scrape_delay(),
        }
    }
}

impl Default for TaggerConfig {
    fn default() -> Self {
        TaggerConfig {
            command: default_tagger_command(),
            args: Vec::new(),
        }
    }
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        EmbeddingConfig {
            endpoint: default_embedding_endpoint(),
            models: default_models(),
            max_length: default_max_length(),
            batch_size: default_batch_size(),
        }
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        ServerConfig {
            host: default_host(),
            port: default_port(),
        }
    }
}

fn default_assets_root() -> PathBuf {
    PathBuf::from("./assets")
}

fn default_html_original() -> PathBuf {
    PathBuf::from("./assets/html/original")
}

fn default_html_processed() -> PathBuf {
    PathBuf::from("./assets/html/processed")
}

fn default_audio() -> PathBuf {
    PathBuf::from("./assets/audio")
}

fn default_images() -> PathBuf {
    PathBuf::from("./assets/images/thumbnails")
}

fn default_embeddings() -> PathBuf {
    PathBuf::from("./assets/embeddings")
}

fn default_word_index() -> PathBuf {
    PathBuf::from("./assets/word_map.json")
}

#[must_use]
const fn default_batch_size() -> usize {
    32
}

const fn default_scrape_delay() -> Duration {
    Duration::from_millis(500)
}

fn default_tagger_command() -> String {
    String::from("tree-tagger-french")
}

fn default_embedding_endpoint() -> String {
    String::from("http://127.0.0.1:8502")
}

fn default_models() -> Vec<String> {
    vec![
        String::from("sentence-transformers/paraphrase-multilingual-mpnet-base-v2"),
        String::from("sentence-transformers/paraphrase-multilingual-MiniLM-L12-v2"),
    ]
}

const fn default_max_length() -> usize {
    510
}

fn default_host() -> String {
    String::from("127.0.0.1")
}

const fn default_port() -> u16 {
    8000
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_cover_every_section() {
        let config = Config::default();

        assert_eq!(config.scrape.batch_size, 32);
        assert_eq!(config.embedding.max_length, 510);
        assert_eq!(config.embedding.models.len(), 2);
        assert_eq!(config.server.port, 8000);
        assert!(config.assets.word_index.ends_with("word_map.json"));
    }
}
