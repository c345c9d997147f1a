//! Web server bootstrap: loads the read-only query resources once and
//! serves the API.

use std::net::SocketAddr;
use std::sync::Arc;

use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;
use tracing::info;

use lerobert::align::Tagger;
use lerobert::embed::{EmbeddingModel, TextTokenizer};

use crate::config::Config;
use crate::embedder::EmbeddingService;
use crate::handlers::{AppState, ModelHandle, router};
use crate::tagger::TreeTagger;
use crate::{Error, colors, http, store};

/// Runs the web server until it is shut down.
///
/// All shared resources — word index, page listing, model handles, tagger —
/// are constructed here and handed to the router as one immutable state, so
/// request handlers never touch process-wide mutables.
///
/// # Errors
///
/// Fails when a resource cannot be loaded, the embedding service is
/// unreachable, or the listener cannot bind.
pub async fn run(config: Config) -> Result<(), Error> {
    let word_index = store::load_word_index(&config.assets.word_index)?;
    info!("word index loaded: {} words", word_index.0.len());
    let pages = store::list_html_files(&config.assets.html_processed)?;
    info!("{} processed pages available", pages.len());

    let tagger: Arc<dyn Tagger + Send + Sync> = Arc::new(TreeTagger::new(&config.tagger));

    let client = http::build_client();
    let mut models = Vec::new();
    for name in &config.embedding.models {
        let service = Arc::new(
            EmbeddingService::connect(client.clone(), &config.embedding.endpoint, name).await?,
        );
        let tokenizer: Arc<dyn TextTokenizer> = service.clone();
        let model: Arc<dyn EmbeddingModel> = service;
        models.push(ModelHandle {
            name: name.clone(),
            tokenizer,
            model,
        });
        info!(model = %name, "embedding model connected");
    }

    write_selection_stylesheet(&config)?;

    let state = AppState {
        word_index: Arc::new(word_index),
        pages: Arc::new(pages),
        models: Arc::new(models),
        tagger,
        assets: Arc::new(config.assets.clone()),
        max_length: config.embedding.max_length,
    };
    let app = router(state).layer(TraceLayer::new_for_http());

    let address = format!("{}:{}", config.server.host, config.server.port);
    let address: SocketAddr = address
        .parse()
        .map_err(|_| Error::ListenAddress(address.clone()))?;
    let listener = TcpListener::bind(address).await.map_err(Error::Server)?;
    info!("listening on {address}");

    axum::serve(listener, app).await.map_err(Error::Server)
}

/// Writes the selection-color stylesheet consumed by the UI.
fn write_selection_stylesheet(config: &Config) -> Result<(), Error> {
    let css_dir = config.assets.root.join("css");
    std::fs::create_dir_all(&css_dir).map_err(|source| Error::Io {
        path: css_dir.clone(),
        source,
    })?;
    let path = css_dir.join("textbox.css");

    std::fs::write(&path, colors::selection_css()).map_err(|source| Error::Io { path, source })
}
