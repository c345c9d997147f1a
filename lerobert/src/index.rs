//! The word lookup index.
//!
//! Maps every lowercase headword to the processed documents defining it,
//! with enough positional information — definition index, first global
//! example index, example count — to jump straight to the example spans to
//! re-render at query time, without re-parsing whole documents.

use std::collections::BTreeMap;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::Error;
use crate::document::{Document, extract_header_words};
use crate::process::EXAMPLE_CLASS;

/// `(definition_index, first_example_global_index, example_count)` for one
/// definition block.
pub type Location = (u32, u32, u32);

/// Per-document index entries: lowercase headword to block locations.
pub type DocumentIndex = BTreeMap<String, Vec<Location>>;

/// The global word index: lowercase word → document id → block locations.
///
/// `BTreeMap` keys keep serialization deterministic, so rebuilding the
/// index from the same documents yields byte-identical JSON.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(transparent))]
pub struct WordIndex(pub BTreeMap<String, BTreeMap<String, Vec<Location>>>);

impl WordIndex {
    /// Creates an empty index.
    #[must_use]
    pub fn new() -> WordIndex {
        WordIndex::default()
    }

    /// Returns the entries for a lowercase word.
    #[must_use]
    pub fn get(&self, word: &str) -> Option<&BTreeMap<String, Vec<Location>>> {
        self.0.get(word)
    }

    /// Returns whether the index contains no words.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Appends one document's entries under each word key. Entries are never
    /// removed; the index is append/rebuild-only.
    pub fn merge(&mut self, document_id: &str, document_index: DocumentIndex) {
        for (word, locations) in document_index {
            self.0
                .entry(word)
                .or_default()
                .entry(document_id.to_string())
                .or_default()
                .extend(locations);
        }
    }
}

/// Builds the index entries of one processed document.
///
/// Example positions are recovered from the ids persisted at processing
/// time. The first id of each block is checked against the running global
/// counter: a mismatch indicates an upstream id-assignment fault and is
/// flagged, but the persisted id wins — it is never silently corrected.
///
/// # Errors
///
/// Returns [`Error::ExampleId`] if a persisted id does not have the
/// `{document}_{index}` shape.
pub fn build_document_index(document: &Document) -> Result<DocumentIndex, Error> {
    let mut index = DocumentIndex::new();
    let mut expected_start = 0u32;

    for (definition_index, block) in document.find_definition_blocks().iter().enumerate() {
        let header = extract_header_words(block);
        let examples = block.elements_with_class(EXAMPLE_CLASS);
        let mut first_example = expected_start;
        if let Some(first) = examples.first() {
            first_example = example_index(first)?;
            if first_example != expected_start {
                #[cfg(feature = "log")]
                tracing::warn!(
                    definition_index,
                    persisted = first_example,
                    expected = expected_start,
                    "example id does not match the running counter"
                );
            }
        }

        let example_count = u32::try_from(examples.len()).unwrap_or(u32::MAX);
        let location: Location = (
            u32::try_from(definition_index).unwrap_or(u32::MAX),
            first_example,
            example_count,
        );
        for word in &header.words {
            index.entry(word.to_lowercase()).or_default().push(location);
        }

        expected_start = first_example + example_count;
    }

    Ok(index)
}

/// Parses the global example index out of a persisted `{document}_{index}`
/// id.
///
/// # Errors
///
/// Returns [`Error::ExampleId`] if the element has no id or the trailing
/// segment is not an integer.
pub fn example_index(example: &crate::document::Element) -> Result<u32, Error> {
    let id = example
        .attr("id")
        .ok_or_else(|| Error::ExampleId(String::new()))?;

    id.rsplit('_')
        .next()
        .and_then(|segment| segment.parse().ok())
        .ok_or_else(|| Error::ExampleId(id.to_string()))
}
