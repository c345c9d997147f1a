//! A client for querying dictionnaire.lerobert.com.
//!
//! This module provides a high-level async interface for fetching definition
//! pages, autocomplete suggestions, the "Explorer le dictionnaire" listing
//! pages, and cached media files.

use std::collections::BTreeSet;
use std::time::Duration;

use reqwest::{ClientBuilder, redirect::Policy};
use scraper::{Html, Selector};
use serde::Deserialize;

use crate::{DICTIONARY_URL, Document, Error};

/// The relative path of definition pages.
pub const DEFINITION_PATH: &str = "/definition/";
/// The relative path of the autocomplete endpoint.
const AUTOCOMPLETE_PATH: &str = "/autocomplete.json";
/// The relative path of the explore listing pages.
const EXPLORE_PATH: &str = "/explore/def/";
/// The prefix of pronunciation audio sources.
pub const SOUNDS_PREFIX: &str = "/medias/SOUNDS/originals/mp3/";
/// The prefix of image thumbnail sources.
pub const IMAGES_PREFIX: &str = "/medias/IMAGES/originals/thumbnails/";

/// The structured result of fetching one definition page.
///
/// Non-200 statuses and pages without definitions are data (`def_exists:
/// false`), not errors; the caller decides whether to retry or skip, and no
/// retry is built in here.
#[derive(Debug, Clone)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct FetchOutcome {
    /// The word path that was requested.
    pub word_path: String,
    /// The HTTP status code of the response.
    pub status_code: u16,
    /// Whether the page contains definition blocks.
    pub def_exists: bool,
    /// The word path the dictionary resolved to, which differs from
    /// `word_path` when the request was redirected (variant spellings).
    pub resolved_path: Option<String>,
    /// The page HTML, present only when definitions were found.
    #[cfg_attr(feature = "serde", serde(skip))]
    pub html: Option<String>,
}

/// One page of the "Explorer le dictionnaire" listing.
#[derive(Debug, Clone)]
pub struct ExplorePage {
    /// Word paths of the definition links on this page.
    pub word_paths: Vec<String>,
    /// The last page number in the pagination footer, when present.
    pub last_page: Option<u32>,
}

#[derive(Debug, Deserialize)]
struct Suggestion {
    #[serde(rename = "type")]
    kind: String,
    page: String,
}

/// An asynchronous client for the dictionary.
#[derive(Debug)]
pub struct Client {
    /// The base URL of the service endpoint.
    base_url: String,
    /// The underlying [`reqwest::Client`] used for making HTTP requests.
    client: reqwest::Client,
}

impl Client {
    /// Constructs a new `Client` with default settings.
    ///
    /// # Panics
    ///
    /// Panics if the underlying HTTP client cannot be built. For a
    /// non-panicking version, see [`Client::try_new`].
    #[must_use]
    pub fn new() -> Client {
        Client::try_new().expect("could not construct http client")
    }

    /// Attempts to construct a new `Client` with default settings: gzip, a
    /// 30-second timeout, and a bounded redirect policy — the dictionary
    /// redirects variant spellings to their canonical page, and the resolved
    /// path names the cache file.
    ///
    /// # Errors
    ///
    /// Returns [`Error::BuildClient`] if the underlying `reqwest` client
    /// fails to build.
    pub fn try_new() -> Result<Client, Error> {
        let client = ClientBuilder::new()
            .gzip(true)
            .redirect(Policy::limited(10))
            .timeout(Duration::from_secs(30))
            .build()
            .map_err(Error::BuildClient)?;

        Ok(Self::with_client(client))
    }

    /// Constructs a `Client` using a pre-configured `reqwest::Client`.
    #[must_use]
    pub fn with_client(client: reqwest::Client) -> Client {
        let base_url = String::from(DICTIONARY_URL);

        Client { base_url, client }
    }

    /// Fetches the definition page for `word_path`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Request`] on transport failures. HTTP error statuses
    /// and definition-less pages are reported through the outcome instead.
    pub async fn fetch_definition(&self, word_path: &str) -> Result<FetchOutcome, Error> {
        let url = format!(
            "{base_url}{DEFINITION_PATH}{word_path}",
            base_url = self.base_url
        );
        let response = self.client.get(url).send().await.map_err(Error::Request)?;
        let status_code = response.status().as_u16();
        if !response.status().is_success() {
            return Ok(FetchOutcome {
                word_path: word_path.to_string(),
                status_code,
                def_exists: false,
                resolved_path: None,
                html: None,
            });
        }

        let resolved_path = response
            .url()
            .path_segments()
            .and_then(|mut segments| segments.next_back())
            .map(str::to_string);
        let body = response.text().await.map_err(Error::Request)?;
        let def_exists = !Document::parse(&body).find_definition_blocks().is_empty();

        Ok(FetchOutcome {
            word_path: word_path.to_string(),
            status_code,
            def_exists,
            resolved_path,
            html: def_exists.then_some(body),
        })
    }

    /// Returns the definition word paths suggested by the dictionary's
    /// built-in search for `term`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Request`] on transport or decoding failures.
    pub async fn autocomplete(&self, term: &str) -> Result<BTreeSet<String>, Error> {
        let url = format!(
            "{base_url}{AUTOCOMPLETE_PATH}",
            base_url = self.base_url
        );
        let suggestions: Vec<Suggestion> = self
            .client
            .get(url)
            .query(&[("t", "gui"), ("q", term)])
            .send()
            .await
            .map_err(Error::Request)?
            .error_for_status()
            .map_err(Error::Request)?
            .json()
            .await
            .map_err(Error::Request)?;

        Ok(suggestions
            .into_iter()
            .filter(|suggestion| suggestion.kind == "def")
            .filter_map(|suggestion| {
                suggestion
                    .page
                    .strip_prefix(DEFINITION_PATH)
                    .map(str::to_string)
            })
            .collect())
    }

    /// Fetches one "Explorer le dictionnaire" listing page, e.g. `A` or
    /// `A/2`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Request`] on transport failures, or
    /// [`Error::MissingElement`] if the listing structure is absent.
    pub async fn explore_page(&self, page_id: &str) -> Result<ExplorePage, Error> {
        let url = format!("{base_url}{EXPLORE_PATH}{page_id}", base_url = self.base_url);
        let body = self
            .client
            .get(url)
            .send()
            .await
            .map_err(Error::Request)?
            .error_for_status()
            .map_err(Error::Request)?
            .text()
            .await
            .map_err(Error::Request)?;

        parse_explore_page(&body)
    }

    /// Fetches a media file (audio, thumbnail) by its site-relative `src`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Request`] on transport failures or error statuses.
    pub async fn fetch_media(&self, src: &str) -> Result<Vec<u8>, Error> {
        let url = format!("{base_url}{src}", base_url = self.base_url);
        let bytes = self
            .client
            .get(url)
            .send()
            .await
            .map_err(Error::Request)?
            .error_for_status()
            .map_err(Error::Request)?
            .bytes()
            .await
            .map_err(Error::Request)?;

        Ok(bytes.to_vec())
    }
}

impl Default for Client {
    /// Creates a default `Client` instance.
    fn default() -> Self {
        Self::new()
    }
}

fn parse_explore_page(body: &str) -> Result<ExplorePage, Error> {
    let section_selector = Selector::parse("section.def > div").expect("section selector");
    let link_selector = Selector::parse(":scope > div.l-l > a").expect("link selector");
    let page_selector = Selector::parse(":scope > div.p > a").expect("page selector");

    let document = Html::parse_document(body);
    let section = document
        .select(&section_selector)
        .next()
        .ok_or(Error::MissingElement("section.def > div"))?;

    let word_paths = section
        .select(&link_selector)
        .filter_map(|link| link.attr("href"))
        .filter_map(|href| href.strip_prefix(DEFINITION_PATH))
        .map(str::to_string)
        .collect();
    let last_page = section
        .select(&page_selector)
        .last()
        .and_then(|link| link.text().collect::<String>().trim().parse().ok());

    Ok(ExplorePage {
        word_paths,
        last_page,
    })
}
