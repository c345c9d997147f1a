use std::collections::BTreeSet;
use std::sync::Arc;

use async_trait::async_trait;
use axum::body::{Body, to_bytes};
use axum::http::{Request, StatusCode, header};
use tower::util::ServiceExt;

use dicosim::config::AssetsConfig;
use dicosim::handlers::{AppState, ModelHandle};
use dicosim::{router, store};
use lerobert::align::{TagToken, Tagger};
use lerobert::embed::{EmbeddingModel, TextTokenizer};
use lerobert::index::WordIndex;

const MODEL_NAME: &str = "stub-model";

/// Splits on whitespace; every word is its own lemma.
struct StubTagger;

impl Tagger for StubTagger {
    fn tag(&self, text: &str) -> Result<Vec<TagToken>, lerobert::Error> {
        Ok(text
            .split_whitespace()
            .map(|word| TagToken {
                word: word.to_string(),
                pos: "UNK".to_string(),
                lemma: word.to_string(),
            })
            .collect())
    }
}

fn token_id(word: &str) -> i64 {
    word.bytes().map(i64::from).sum::<i64>() + 10
}

struct StubTokenizer;

#[async_trait]
impl TextTokenizer for StubTokenizer {
    async fn encode(&self, text: &str) -> Result<Vec<i64>, lerobert::Error> {
        Ok(text.split_whitespace().map(token_id).collect())
    }

    fn specials(&self) -> (i64, i64) {
        (1, 2)
    }
}

struct StubModel;

#[async_trait]
impl EmbeddingModel for StubModel {
    async fn embed_tokens(&self, ids: &[i64]) -> Result<Vec<Vec<f32>>, lerobert::Error> {
        Ok(ids.iter().map(|id| vec![*id as f32, 1.0]).collect())
    }
}

const PROCESSED_PAGE: &str = concat!(
    "<div class=\"b\"><h3>chat</h3>",
    "<span class=\"d_xpl\" id=\"chat_0\">Le <span class=\"word\">chat</span> dort.</span>",
    "</div>",
);

fn make_state(dir: &std::path::Path) -> AppState {
    let html_processed = dir.join("html/processed");
    let embeddings = dir.join("embeddings");
    store::write_html_file(&html_processed, "chat", PROCESSED_PAGE).expect("processed page");
    store::save_embeddings(
        &embeddings,
        MODEL_NAME,
        "chat",
        &[vec![token_id("chat") as f32, 1.0]],
    )
    .expect("embeddings");

    let mut word_index = WordIndex::new();
    word_index.merge(
        "chat",
        [("chat".to_string(), vec![(0, 0, 1)])].into_iter().collect(),
    );

    let assets = AssetsConfig {
        root: dir.join("static"),
        html_original: dir.join("html/original"),
        html_processed,
        audio: dir.join("audio"),
        images: dir.join("images"),
        embeddings,
        word_index: dir.join("word_map.json"),
    };

    AppState {
        word_index: Arc::new(word_index),
        pages: Arc::new(BTreeSet::from(["chat".to_string()])),
        models: Arc::new(vec![ModelHandle {
            name: MODEL_NAME.to_string(),
            tokenizer: Arc::new(StubTokenizer),
            model: Arc::new(StubModel),
        }]),
        tagger: Arc::new(StubTagger),
        assets: Arc::new(assets),
        max_length: 510,
    }
}

fn definitions_request(body: &str) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri("/definitions")
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

#[tokio::test]
async fn healthz_ok() {
    let dir = tempfile::tempdir().unwrap();
    let app = router(make_state(dir.path()));

    let response = app
        .oneshot(
            Request::builder()
                .uri("/healthz")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn models_endpoint_lists_configured_models() {
    let dir = tempfile::tempdir().unwrap();
    let app = router(make_state(dir.path()));

    let response = app
        .oneshot(
            Request::builder()
                .uri("/models")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = to_bytes(response.into_body(), 1024 * 1024).await.unwrap();
    let body = String::from_utf8(body.to_vec()).unwrap();

    assert_eq!(body, format!("<option value=\"0\">{MODEL_NAME}</option>"));
}

#[tokio::test]
async fn definitions_scores_matched_blocks() {
    let dir = tempfile::tempdir().unwrap();
    let app = router(make_state(dir.path()));

    // Characters 3..7 of "le chat dort" select "chat".
    let response = app
        .oneshot(definitions_request(
            "{\"text\":\"le chat dort\",\"selection_start\":3,\"selection_end\":7,\"model_index\":0}",
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = to_bytes(response.into_body(), 1024 * 1024).await.unwrap();
    let body = String::from_utf8(body.to_vec()).unwrap();

    assert!(body.starts_with("<div class=\"b\">"));
    // The stored example vector equals the selection embedding, so the
    // similarity is exactly 1.000.
    assert!(body.contains("title=\"1.000\""));
    assert!(body.contains("background-color: rgba("));
    assert!(body.contains("<span class=\"word\""));
}

#[tokio::test]
async fn definitions_without_matches_returns_the_fixed_fragment() {
    let dir = tempfile::tempdir().unwrap();
    let app = router(make_state(dir.path()));

    let response = app
        .oneshot(definitions_request(
            "{\"text\":\"rien\",\"selection_start\":0,\"selection_end\":4,\"model_index\":0}",
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = to_bytes(response.into_body(), 1024 * 1024).await.unwrap();
    let body = String::from_utf8(body.to_vec()).unwrap();

    assert!(body.contains("Aucun résultat trouvé"));
}

#[tokio::test]
async fn definitions_rejects_unknown_model_index() {
    let dir = tempfile::tempdir().unwrap();
    let app = router(make_state(dir.path()));

    let response = app
        .oneshot(definitions_request(
            "{\"text\":\"le chat\",\"selection_start\":0,\"selection_end\":2,\"model_index\":7}",
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn processed_pages_outside_the_listing_are_not_served() {
    let dir = tempfile::tempdir().unwrap();
    let app = router(make_state(dir.path()));

    let response = app
        .oneshot(
            Request::builder()
                .uri("/html/chat.html")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let app = router(make_state(dir.path()));
    let response = app
        .oneshot(
            Request::builder()
                .uri("/html/autre.html")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}
