//! A client and parser for the French dictionary Le Robert
//! (dictionnaire.lerobert.com).
//!
//! The crate parses definition pages into a mutable [`Document`] tree, finds
//! definition blocks and their example sentences, aligns the output of an
//! external word/lemma tagger back onto the page markup
//! ([`align::wrap_words`]), builds the word lookup index consumed at query
//! time ([`index::WordIndex`]), and projects highlighted words onto token
//! embeddings ([`embed`]).

pub mod align;
#[cfg(feature = "client")]
pub mod client;
pub mod document;
pub mod embed;
mod error;
pub mod index;
pub mod locator;
pub mod process;

#[cfg(feature = "client")]
pub use client::Client;
pub use document::Document;
pub use error::Error;

/// The base URL of the dictionary.
pub const DICTIONARY_URL: &str = "https://dictionnaire.lerobert.com";
