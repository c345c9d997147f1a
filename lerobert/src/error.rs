use thiserror::Error;

/// Error.
#[derive(Debug, Error)]
pub enum Error {
    /// The underlying HTTP client could not be constructed.
    #[cfg(feature = "client")]
    #[error("could not construct http client: {0}")]
    BuildClient(#[source] reqwest::Error),
    /// An HTTP request failed.
    #[cfg(feature = "client")]
    #[error("request error: {0}")]
    Request(#[source] reqwest::Error),
    /// The document bytes are not valid UTF-8.
    #[error("malformed document bytes: {0}")]
    Parse(#[from] std::str::Utf8Error),
    /// An element required by the page structure is missing.
    #[error("could not find element: {0}")]
    MissingElement(&'static str),
    /// An index path no longer resolves to a text node.
    #[error("location path {0:?} does not resolve to a text node")]
    LocationNotFound(Vec<usize>),
    /// A persisted example id does not have the `{document}_{index}` shape.
    #[error("malformed example id: {0:?}")]
    ExampleId(String),
    /// The external word tagger failed.
    #[error("tagger error: {0}")]
    Tagger(#[source] Box<dyn std::error::Error + Send + Sync>),
    /// An embedding capability violated its contract.
    #[error("embedding capability error: {0}")]
    Embedding(String),
}
