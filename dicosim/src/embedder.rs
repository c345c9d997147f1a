//! Client for the embedding inference service.
//!
//! Tokenization and token-level inference are delegated to a sidecar
//! speaking a small JSON contract: `POST /tokenize {model, text}` returns
//! the content token ids plus the model's special start/end ids, and
//! `POST /embed {model, ids}` returns one hidden-state vector per token.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use lerobert::embed::{EmbeddingModel, TextTokenizer};

use crate::Error;

#[derive(Debug, Serialize)]
struct TokenizeRequest<'a> {
    model: &'a str,
    text: &'a str,
}

#[derive(Debug, Deserialize)]
struct TokenizeResponse {
    ids: Vec<i64>,
    start: i64,
    end: i64,
}

#[derive(Debug, Serialize)]
struct EmbedRequest<'a> {
    model: &'a str,
    ids: &'a [i64],
}

#[derive(Debug, Deserialize)]
struct EmbedResponse {
    vectors: Vec<Vec<f32>>,
}

/// One model served by the inference sidecar.
#[derive(Debug, Clone)]
pub struct EmbeddingService {
    client: reqwest::Client,
    endpoint: String,
    model: String,
    specials: (i64, i64),
}

impl EmbeddingService {
    /// Connects to the service and caches the model's special token ids by
    /// tokenizing the empty string once.
    ///
    /// # Errors
    ///
    /// Returns [`Error::EmbeddingService`] if the service is unreachable or
    /// answers with a non-empty encoding for the empty string.
    pub async fn connect(
        client: reqwest::Client,
        endpoint: &str,
        model: &str,
    ) -> Result<EmbeddingService, Error> {
        let endpoint = endpoint.trim_end_matches('/').to_string();
        let response = tokenize(&client, &endpoint, model, "")
            .await
            .map_err(|err| Error::EmbeddingService(err.to_string()))?;
        if !response.ids.is_empty() {
            return Err(Error::EmbeddingService(format!(
                "tokenizing the empty string returned {} content tokens",
                response.ids.len()
            )));
        }

        Ok(EmbeddingService {
            client,
            endpoint,
            model: model.to_string(),
            specials: (response.start, response.end),
        })
    }

    /// The model name this handle is bound to.
    #[must_use]
    pub fn model(&self) -> &str {
        &self.model
    }
}

#[async_trait]
impl TextTokenizer for EmbeddingService {
    async fn encode(&self, text: &str) -> Result<Vec<i64>, lerobert::Error> {
        let response = tokenize(&self.client, &self.endpoint, &self.model, text)
            .await
            .map_err(transport)?;

        Ok(response.ids)
    }

    fn specials(&self) -> (i64, i64) {
        self.specials
    }
}

#[async_trait]
impl EmbeddingModel for EmbeddingService {
    async fn embed_tokens(&self, ids: &[i64]) -> Result<Vec<Vec<f32>>, lerobert::Error> {
        let request = EmbedRequest {
            model: &self.model,
            ids,
        };
        let response: EmbedResponse = self
            .client
            .post(format!("{endpoint}/embed", endpoint = self.endpoint))
            .json(&request)
            .send()
            .await
            .map_err(transport)?
            .error_for_status()
            .map_err(transport)?
            .json()
            .await
            .map_err(transport)?;

        Ok(response.vectors)
    }
}

async fn tokenize(
    client: &reqwest::Client,
    endpoint: &str,
    model: &str,
    text: &str,
) -> Result<TokenizeResponse, reqwest::Error> {
    let request = TokenizeRequest { model, text };
    client
        .post(format!("{endpoint}/tokenize"))
        .json(&request)
        .send()
        .await?
        .error_for_status()?
        .json()
        .await
}

fn transport(err: reqwest::Error) -> lerobert::Error {
    lerobert::Error::Embedding(err.to_string())
}
