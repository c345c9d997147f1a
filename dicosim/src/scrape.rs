//! Scraping of definition pages and media into the local cache.

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use tracing::{debug, info, warn};

use lerobert::client::{ExplorePage, IMAGES_PREFIX, SOUNDS_PREFIX};
use lerobert::{Client, Document};

use crate::config::Config;
use crate::pipeline::run_batched;
use crate::{Error, http, store};

/// The first-character listing pages of "Explorer le dictionnaire".
const EXPLORE_FIRST_CHARS: &str = "0ABCDEFGHIJKLMNOPQRSTUVWXYZ";

/// What to scrape.
#[derive(Debug, Default)]
pub struct ScrapeOptions {
    /// File with one seed word path per line.
    pub seeds: Option<PathBuf>,
    /// Search terms whose autocomplete suggestions seed the crawl.
    pub search: Vec<String>,
    /// Crawl the explore listing for seeds.
    pub explore: bool,
    /// Seed from the definition links of already-cached pages.
    pub follow_links: bool,
    /// Also download audio and image media.
    pub media: bool,
}

/// Runs a scrape pass: collect seed word paths, download their definition
/// pages, and optionally the media they reference.
///
/// # Errors
///
/// Fails on filesystem errors, transport errors, or a failing batch worker.
pub async fn run(config: &Config, options: ScrapeOptions) -> Result<(), Error> {
    let client = Arc::new(Client::with_client(http::build_client()));

    let mut seeds: BTreeSet<String> = BTreeSet::new();
    if let Some(path) = &options.seeds {
        let content = std::fs::read_to_string(path).map_err(|source| Error::Io {
            path: path.clone(),
            source,
        })?;
        seeds.extend(
            content
                .lines()
                .map(str::trim)
                .filter(|line| !line.is_empty())
                .map(String::from),
        );
    }
    for term in &options.search {
        seeds.extend(client.autocomplete(term).await?);
    }
    if options.explore {
        seeds.extend(crawl_explore(&client, config).await?);
    }
    if options.follow_links {
        seeds.extend(linked_word_paths(config)?);
    }

    if seeds.is_empty() {
        warn!("no seed word paths; skipping page downloads");
    } else {
        download_pages(&client, config, seeds).await?;
    }

    if options.media {
        download_media(&client, config).await?;
    }

    Ok(())
}

/// Checks every cached page: it must contain definitions and be saved under
/// the word path of its own `og:url`. Offenders are logged, not deleted.
///
/// # Errors
///
/// Fails when the cache directory cannot be listed or a worker panics.
pub async fn validate(config: &Config) -> Result<(), Error> {
    let stems: Vec<String> = store::list_html_files(&config.assets.html_original)?
        .into_iter()
        .collect();
    let total = stems.len();
    let original = config.assets.html_original.clone();

    let worker = move |stem: String| {
        let original = original.clone();
        async move {
            tokio::task::spawn_blocking(move || -> Result<(String, bool), Error> {
                let html = store::read_html_file(&original, &stem)?;
                let document = Document::parse(&html);
                let has_definitions = !document.find_definition_blocks().is_empty();
                let correct_name = document.original_word_path().as_deref() == Some(stem.as_str());
                Ok((stem, has_definitions && correct_name))
            })
            .await
            .map_err(Error::Join)?
        }
    };
    let results = run_batched(
        stems,
        config.scrape.batch_size,
        std::time::Duration::ZERO,
        worker,
    )
    .await?;

    let mut invalid = 0usize;
    for (stem, valid) in results {
        if !valid {
            invalid += 1;
            warn!(%stem, "cached page is invalid");
        }
    }
    info!("validated {total} cached pages, {invalid} invalid");

    Ok(())
}

/// Collects every definition word path linked from the explore listing.
async fn crawl_explore(client: &Arc<Client>, config: &Config) -> Result<BTreeSet<String>, Error> {
    let first_pages: Vec<String> = EXPLORE_FIRST_CHARS.chars().map(String::from).collect();
    let worker = {
        let client = Arc::clone(client);
        move |page_id: String| fetch_explore(Arc::clone(&client), page_id)
    };
    let results = run_batched(
        first_pages,
        config.scrape.batch_size,
        config.scrape.delay,
        worker,
    )
    .await?;

    let mut word_paths = BTreeSet::new();
    let mut remaining = Vec::new();
    for (page_id, page) in results {
        word_paths.extend(page.word_paths);
        if let Some(last_page) = page.last_page {
            for number in 2..=last_page {
                remaining.push(format!("{page_id}/{number}"));
            }
        }
    }
    info!(
        "explore listing: {} continuation pages to crawl",
        remaining.len()
    );

    let worker = {
        let client = Arc::clone(client);
        move |page_id: String| fetch_explore(Arc::clone(&client), page_id)
    };
    let results = run_batched(
        remaining,
        config.scrape.batch_size,
        config.scrape.delay,
        worker,
    )
    .await?;
    for (_, page) in results {
        word_paths.extend(page.word_paths);
    }
    info!("explore listing: {} word paths found", word_paths.len());

    Ok(word_paths)
}

/// Collects the definition word paths linked from every cached page,
/// expanding the crawl frontier from what is already on disk.
fn linked_word_paths(config: &Config) -> Result<BTreeSet<String>, Error> {
    let mut word_paths = BTreeSet::new();
    for stem in store::list_html_files(&config.assets.html_original)? {
        let html = store::read_html_file(&config.assets.html_original, &stem)?;
        word_paths.extend(Document::parse(&html).definition_links());
    }
    info!("{} definition links found in cached pages", word_paths.len());

    Ok(word_paths)
}

async fn fetch_explore(
    client: Arc<Client>,
    page_id: String,
) -> Result<(String, ExplorePage), Error> {
    let page = client.explore_page(&page_id).await?;

    Ok((page_id, page))
}

async fn download_pages(
    client: &Arc<Client>,
    config: &Config,
    seeds: BTreeSet<String>,
) -> Result<(), Error> {
    let existing = if config.scrape.rewrite {
        BTreeSet::new()
    } else {
        store::list_html_files(&config.assets.html_original).unwrap_or_default()
    };
    let total = seeds.len();
    let pending: Vec<String> = seeds
        .into_iter()
        .filter(|word_path| !existing.contains(word_path))
        .collect();
    info!("downloading {} of {total} pages", pending.len());

    let directory = config.assets.html_original.clone();
    let worker = {
        let client = Arc::clone(client);
        move |word_path: String| {
            let client = Arc::clone(&client);
            let directory = directory.clone();
            async move {
                let outcome = client.fetch_definition(&word_path).await?;
                if let (true, Some(html), Some(resolved)) = (
                    outcome.def_exists,
                    outcome.html.as_deref(),
                    outcome.resolved_path.as_deref(),
                ) {
                    write_file(&directory, &format!("{resolved}.html"), html.as_bytes()).await?;
                } else {
                    debug!(
                        word_path = %outcome.word_path,
                        status = outcome.status_code,
                        "page has no definitions"
                    );
                }
                Ok((outcome.word_path, outcome.def_exists))
            }
        }
    };
    let outcomes = run_batched(
        pending,
        config.scrape.batch_size,
        config.scrape.delay,
        worker,
    )
    .await?;

    let found = outcomes.iter().filter(|(_, def_exists)| *def_exists).count();
    info!(
        "downloaded {found} definition pages, {} without definitions",
        outcomes.len() - found
    );

    Ok(())
}

/// Downloads the audio files and image thumbnails referenced by the cached
/// pages, skipping files already on disk.
async fn download_media(client: &Arc<Client>, config: &Config) -> Result<(), Error> {
    let stems: Vec<String> = store::list_html_files(&config.assets.html_original)?
        .into_iter()
        .collect();
    let original = config.assets.html_original.clone();
    let audio_dir = config.assets.audio.clone();
    let image_dir = config.assets.images.clone();

    let worker = {
        let client = Arc::clone(client);
        move |stem: String| {
            let client = Arc::clone(&client);
            let original = original.clone();
            let audio_dir = audio_dir.clone();
            let image_dir = image_dir.clone();
            async move {
                let html = store::read_html_file(&original, &stem)?;
                let document = Document::parse(&html);
                let mut downloaded = 0usize;
                for (tag, prefix, target) in [
                    ("source", SOUNDS_PREFIX, &audio_dir),
                    ("img", IMAGES_PREFIX, &image_dir),
                ] {
                    for src in document.media_sources(tag) {
                        let filename = src
                            .strip_prefix(prefix)
                            .map_or_else(|| src.replace('/', "_"), str::to_string);
                        let path = target.join(&filename);
                        if path.exists() {
                            continue;
                        }
                        let bytes = client.fetch_media(&src).await?;
                        write_file(target, &filename, &bytes).await?;
                        downloaded += 1;
                    }
                }
                Ok(downloaded)
            }
        }
    };
    let counts = run_batched(
        stems,
        config.scrape.batch_size,
        config.scrape.delay,
        worker,
    )
    .await?;
    info!("downloaded {} media files", counts.iter().sum::<usize>());

    Ok(())
}

async fn write_file(directory: &Path, filename: &str, bytes: &[u8]) -> Result<(), Error> {
    tokio::fs::create_dir_all(directory)
        .await
        .map_err(|source| Error::Io {
            path: directory.to_path_buf(),
            source,
        })?;
    let path = directory.join(filename);

    tokio::fs::write(&path, bytes)
        .await
        .map_err(|source| Error::Io { path, source })
}
