//! Batch processing of cached pages: headword highlighting, word-index
//! rebuilds, and example embeddings.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use tracing::info;

use lerobert::Document;
use lerobert::embed::embed_fragment;
use lerobert::index::{WordIndex, build_document_index, example_index};
use lerobert::process::{EXAMPLE_CLASS, process_document};

use crate::config::Config;
use crate::embedder::EmbeddingService;
use crate::pipeline::run_batched;
use crate::tagger::TreeTagger;
use crate::{Error, http, store};

/// Processes every cached page (tagging and wrapping the headwords inside
/// the examples, assigning example ids, rewriting links), then rebuilds the
/// word index over the processed output.
///
/// # Errors
///
/// Fails on filesystem errors, tagger failures, or a failing batch worker.
pub async fn process_all(config: &Config) -> Result<(), Error> {
    let stems: Vec<String> = store::list_html_files(&config.assets.html_original)?
        .into_iter()
        .collect();
    info!("processing {} cached pages", stems.len());

    let tagger = Arc::new(TreeTagger::new(&config.tagger));
    let original = config.assets.html_original.clone();
    let processed = config.assets.html_processed.clone();
    let worker = move |stem: String| {
        let tagger = Arc::clone(&tagger);
        let original = original.clone();
        let processed = processed.clone();
        async move {
            // Tagging shells out and parsing is CPU-bound, so the whole
            // unit runs on the blocking pool.
            tokio::task::spawn_blocking(move || -> Result<String, Error> {
                let html = store::read_html_file(&original, &stem)?;
                let mut document = Document::parse(&html);
                let page = process_document(&stem, &mut document, tagger.as_ref())?;
                store::write_html_file(&processed, &stem, &page)?;
                Ok(stem)
            })
            .await
            .map_err(Error::Join)?
        }
    };
    run_batched(stems, config.scrape.batch_size, Duration::ZERO, worker).await?;

    rebuild_word_index(config)
}

/// Rebuilds the word index from all processed pages and persists it.
///
/// # Errors
///
/// Fails on filesystem errors or malformed persisted example ids.
pub fn rebuild_word_index(config: &Config) -> Result<(), Error> {
    let stems = store::list_html_files(&config.assets.html_processed)?;
    let mut index = WordIndex::new();
    for stem in &stems {
        let html = store::read_html_file(&config.assets.html_processed, stem)?;
        let document = Document::parse(&html);
        index.merge(stem, build_document_index(&document)?);
    }
    store::save_word_index(&config.assets.word_index, &index)?;
    info!("word index rebuilt over {} documents", stems.len());

    Ok(())
}

/// Computes and persists the example embedding stack of every processed
/// page, for every configured model.
///
/// # Errors
///
/// Fails on filesystem or service errors, and on
/// [`Error::ExampleIndexMismatch`] when a persisted example id disagrees
/// with its positional index — that document's cache is corrupt.
pub async fn embed_all(config: &Config) -> Result<(), Error> {
    let stems: Vec<String> = store::list_html_files(&config.assets.html_processed)?
        .into_iter()
        .collect();
    let client = http::build_client();

    for model_name in &config.embedding.models {
        let service = Arc::new(
            EmbeddingService::connect(client.clone(), &config.embedding.endpoint, model_name)
                .await?,
        );
        info!(model = %model_name, "embedding {} documents", stems.len());

        let processed = config.assets.html_processed.clone();
        let embeddings_root = config.assets.embeddings.clone();
        let worker = move |stem: String| {
            embed_document(
                Arc::clone(&service),
                processed.clone(),
                embeddings_root.clone(),
                stem,
            )
        };
        run_batched(
            stems.clone(),
            config.embedding.batch_size,
            Duration::ZERO,
            worker,
        )
        .await?;
    }

    Ok(())
}

async fn embed_document(
    service: Arc<EmbeddingService>,
    processed: PathBuf,
    embeddings_root: PathBuf,
    stem: String,
) -> Result<String, Error> {
    let path = store::html_path(&processed, &stem);
    let html = tokio::fs::read_to_string(&path)
        .await
        .map_err(|source| Error::Io { path, source })?;
    let document = Document::parse(&html);

    let mut vectors = Vec::new();
    let mut expected = 0u32;
    for block in document.find_definition_blocks() {
        for example in block.elements_with_class(EXAMPLE_CLASS) {
            let found = example_index(example)?;
            if found != expected {
                return Err(Error::ExampleIndexMismatch {
                    document: stem.clone(),
                    expected,
                    found,
                });
            }
            vectors.push(embed_fragment(example, service.as_ref(), service.as_ref()).await?);
            expected += 1;
        }
    }

    // Pages without examples contribute no embedding file.
    if !vectors.is_empty() {
        store::save_embeddings(&embeddings_root, service.model(), &stem, &vectors)?;
    }

    Ok(stem)
}
