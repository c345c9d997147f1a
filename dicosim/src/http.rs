//! HTTP features

use crate::consts;

pub use reqwest::Client;

/// Returns a default HTTP client.
///
/// # Panics
///
/// Panics if the default HTTP client fails to build.
#[must_use]
pub fn build_client() -> Client {
    builder().build().expect("could not build http client")
}

/// Returns a default HTTP client builder.
///
/// Redirects are followed (bounded): the dictionary redirects variant
/// spellings to their canonical definition page, and the resolved URL names
/// the cached file.
#[must_use]
pub fn builder() -> reqwest::ClientBuilder {
    reqwest::ClientBuilder::new()
        .gzip(true)
        .redirect(reqwest::redirect::Policy::limited(10))
        .timeout(consts::HTTP_TIMEOUT)
        .user_agent(consts::HTTP_USER_AGENT)
}
