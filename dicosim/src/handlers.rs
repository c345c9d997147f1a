//! Axum handlers for the query API and the asset routes.

use std::collections::{BTreeSet, HashMap, HashSet};
use std::sync::Arc;

use axum::extract::{Path, State};
use axum::http::{HeaderValue, StatusCode, header};
use axum::response::{Html, IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::warn;

use lerobert::Document;
use lerobert::align::Tagger;
use lerobert::embed::{EmbeddingModel, TextTokenizer, cosine_similarity, embed_selection};
use lerobert::index::WordIndex;
use lerobert::process::{EXAMPLE_CLASS, WORD_CLASS};

use crate::colors::{colorbar_fragment, css_color_string};
use crate::config::AssetsConfig;
use crate::consts::NO_RESULTS_FRAGMENT;
use crate::store;

/// Immutable resources shared by all request handlers, loaded once at
/// startup.
#[derive(Clone)]
pub struct AppState {
    /// The persisted word index.
    pub word_index: Arc<WordIndex>,
    /// Stems of the processed pages available on disk.
    pub pages: Arc<BTreeSet<String>>,
    /// The configured models, in index order.
    pub models: Arc<Vec<ModelHandle>>,
    /// The word tagger.
    pub tagger: Arc<dyn Tagger + Send + Sync>,
    /// Asset cache layout.
    pub assets: Arc<AssetsConfig>,
    /// Token budget for contextual selection embeddings.
    pub max_length: usize,
}

/// One selectable embedding model.
pub struct ModelHandle {
    /// The model name shown in the UI.
    pub name: String,
    /// Tokenizer capability.
    pub tokenizer: Arc<dyn TextTokenizer>,
    /// Inference capability.
    pub model: Arc<dyn EmbeddingModel>,
}

/// The query request: a text, a selected span (character offsets), and the
/// model to score with.
#[derive(Debug, Deserialize)]
pub struct DefinitionsRequest {
    pub text: String,
    pub selection_start: usize,
    pub selection_end: usize,
    pub model_index: usize,
}

#[derive(Serialize)]
struct ErrorResponse {
    error: String,
}

/// Builds the application router.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/", get(frontend))
        .route("/healthz", get(healthz))
        .route("/models", get(models))
        .route("/colorbar", get(colorbar))
        .route("/definitions", post(definitions))
        .route("/{dirname}/{filename}", get(asset))
        .with_state(state)
}

async fn healthz() -> impl IntoResponse {
    "ok"
}

async fn frontend(State(state): State<AppState>) -> Result<Response, ApiError> {
    let path = state.assets.root.join("index.html");
    let content = tokio::fs::read_to_string(&path)
        .await
        .map_err(|_| ApiError::NotFound("index.html".to_string()))?;

    Ok(Html(content).into_response())
}

async fn models(State(state): State<AppState>) -> Html<String> {
    let mut out = String::new();
    for (index, model) in state.models.iter().enumerate() {
        out.push_str(&format!(
            "<option value=\"{index}\">{name}</option>",
            name = model.name
        ));
    }

    Html(out)
}

async fn colorbar() -> Html<String> {
    Html(colorbar_fragment())
}

/// Serves cached pages and static assets. Processed pages are restricted to
/// the listing loaded at startup.
async fn asset(
    State(state): State<AppState>,
    Path((dirname, filename)): Path<(String, String)>,
) -> Result<Response, ApiError> {
    if dirname.contains("..") || filename.contains("..") || filename.contains('/') {
        return Err(ApiError::NotFound(filename));
    }

    let path = match dirname.as_str() {
        "html" => {
            let stem = filename.strip_suffix(".html").unwrap_or(&filename);
            if !state.pages.contains(stem) {
                return Err(ApiError::NotFound(format!("{stem}.html")));
            }
            store::html_path(&state.assets.html_processed, stem)
        }
        "audio" => state.assets.audio.join(&filename),
        "image-thumbnails" => state.assets.images.join(&filename),
        _ => state.assets.root.join(&dirname).join(&filename),
    };

    let bytes = tokio::fs::read(&path)
        .await
        .map_err(|_| ApiError::NotFound(filename.clone()))?;

    Ok((
        [(
            header::CONTENT_TYPE,
            HeaderValue::from_static(content_type_for(&filename)),
        )],
        bytes,
    )
        .into_response())
}

/// Finds the definition blocks whose example sentences are semantically
/// closest to the selected span.
///
/// The selection is tagged to collect its surface words and lemma
/// alternatives; each one is looked up in the word index, and every matched
/// block is rendered with its highlighted words scored by cosine similarity
/// between the contextual selection embedding and the example's stored
/// vector. Documents without a stored embedding stack for the selected
/// model contribute nothing. Responses are HTTP 200 whether or not anything
/// matched.
async fn definitions(
    State(state): State<AppState>,
    Json(payload): Json<DefinitionsRequest>,
) -> Result<Response, ApiError> {
    if payload.selection_start > payload.selection_end {
        return Err(ApiError::bad_request(
            "selection_start must not exceed selection_end",
        ));
    }
    let Some(model) = state.models.get(payload.model_index) else {
        return Err(ApiError::bad_request("unknown model index"));
    };

    // Only the selected span is tagged; the surrounding text matters for
    // the embedding, not for the word lookup.
    let selected: String = payload
        .text
        .chars()
        .skip(payload.selection_start)
        .take(payload.selection_end - payload.selection_start)
        .collect();
    let tagger = Arc::clone(&state.tagger);
    let tags = tokio::task::spawn_blocking(move || tagger.tag(&selected))
        .await
        .map_err(ApiError::internal)?
        .map_err(ApiError::internal)?;

    let mut query_words = BTreeSet::new();
    for tag in &tags {
        query_words.insert(tag.word.to_lowercase());
        for alternative in tag.lemma.to_lowercase().split('|') {
            query_words.insert(alternative.to_string());
        }
    }

    let selection_embedding = embed_selection(
        &payload.text,
        payload.selection_start,
        payload.selection_end,
        model.tokenizer.as_ref(),
        model.model.as_ref(),
        state.max_length,
    )
    .await
    .map_err(ApiError::internal)?;

    let mut rendered = Vec::new();
    let mut seen: HashSet<(String, u32, u32, u32)> = HashSet::new();
    let mut documents: HashMap<String, Document> = HashMap::new();
    let mut embeddings: HashMap<String, Option<Vec<Vec<f32>>>> = HashMap::new();

    for word in &query_words {
        let Some(entry) = state.word_index.get(word) else {
            continue;
        };
        for (document_id, locations) in entry {
            if !state.pages.contains(document_id) {
                continue;
            }
            for &(definition_index, first_example, example_count) in locations {
                let location = (
                    document_id.clone(),
                    definition_index,
                    first_example,
                    example_count,
                );
                if !seen.insert(location) {
                    continue;
                }

                if !documents.contains_key(document_id) {
                    let path = store::html_path(&state.assets.html_processed, document_id);
                    let content = tokio::fs::read_to_string(&path)
                        .await
                        .map_err(ApiError::internal)?;
                    documents.insert(document_id.clone(), Document::parse(&content));
                    let stack =
                        store::load_embeddings(&state.assets.embeddings, &model.name, document_id)
                            .map_err(ApiError::internal)?;
                    embeddings.insert(document_id.clone(), stack);
                }
                let Some(vectors) = embeddings.get(document_id).and_then(Option::as_ref) else {
                    continue;
                };
                let Some(document) = documents.get_mut(document_id) else {
                    continue;
                };

                let block_paths = document.definition_block_paths();
                let Some(block_path) = block_paths.get(definition_index as usize) else {
                    continue;
                };
                let Some(block) = document.root.element_at_mut(block_path) else {
                    continue;
                };

                let example_paths = block.paths_with_class(EXAMPLE_CLASS);
                for offset in 0..example_count as usize {
                    let Some(example_path) = example_paths.get(offset) else {
                        break;
                    };
                    let Some(vector) = vectors.get(first_example as usize + offset) else {
                        continue;
                    };
                    let similarity = cosine_similarity(&selection_embedding, vector);
                    let tooltip = format!("{similarity:.3}");
                    let background = format!("background-color: {};", css_color_string(similarity));
                    if let Some(example) = block.element_at_mut(example_path) {
                        example.visit_elements_mut(&mut |el| {
                            if el.has_class(WORD_CLASS) {
                                el.set_attr("title", tooltip.clone());
                                el.set_attr("style", background.clone());
                            }
                        });
                    }
                }

                rendered.push(block.html());
            }
        }
    }

    if rendered.is_empty() {
        Ok(Html(NO_RESULTS_FRAGMENT.to_string()).into_response())
    } else {
        Ok(Html(rendered.join("\n")).into_response())
    }
}

fn content_type_for(filename: &str) -> &'static str {
    match filename.rsplit('.').next() {
        Some("html") => "text/html; charset=utf-8",
        Some("css") => "text/css; charset=utf-8",
        Some("js") => "text/javascript",
        Some("json") => "application/json",
        Some("mp3") => "audio/mpeg",
        Some("png") => "image/png",
        Some("jpg" | "jpeg") => "image/jpeg",
        Some("svg") => "image/svg+xml",
        _ => "application/octet-stream",
    }
}

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("{0}")]
    BadRequest(String),
    #[error("{0} not found")]
    NotFound(String),
    #[error("internal server error")]
    Internal,
}

impl ApiError {
    fn bad_request<T: Into<String>>(msg: T) -> Self {
        ApiError::BadRequest(msg.into())
    }

    fn internal<E: std::fmt::Display>(err: E) -> Self {
        warn!(%err, "definition query failed");
        ApiError::Internal
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match &self {
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::Internal => StatusCode::INTERNAL_SERVER_ERROR,
        };

        (
            status,
            Json(ErrorResponse {
                error: self.to_string(),
            }),
        )
            .into_response()
    }
}
