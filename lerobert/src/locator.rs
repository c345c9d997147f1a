//! Structural location of text nodes inside definition blocks.
//!
//! Definition pages share one markup template, so a text node can be
//! fingerprinted by the `(tag, class)` chain of its ancestors plus the
//! sibling offsets leading to it. Identical fingerprints across documents
//! mark "the same kind of slot", which is what lets content be relocated
//! after the page template is reprocessed. The index built here is an
//! offline auditing tool, not part of the request-serving path.

use std::collections::BTreeMap;

use crate::Error;
use crate::document::{Element, Node};

/// The `(tag-name, class)` ancestor chain of a text node, outermost first,
/// up to but excluding the enclosing definition block.
pub type LocationKey = Vec<(String, Option<String>)>;

/// Per-block grouping of index paths by location key.
pub type LocationIndex = BTreeMap<LocationKey, BTreeMap<usize, Vec<Vec<usize>>>>;

/// A text node located inside a definition block.
#[derive(Debug, Clone, PartialEq)]
pub struct LocatedText {
    /// The text content.
    pub text: String,
    /// Ancestor fingerprint.
    pub key: LocationKey,
    /// Sibling offsets from the block down to the text node, outermost
    /// first; the last entry is the text node's own offset.
    pub path: Vec<usize>,
}

/// Locates every text node under `block`, excluding pure-newline whitespace
/// nodes.
#[must_use]
pub fn locate_text_nodes(block: &Element) -> Vec<LocatedText> {
    let mut located = Vec::new();
    walk(block, &mut Vec::new(), &mut Vec::new(), &mut located);
    located
}

fn walk(
    element: &Element,
    ancestors: &mut LocationKey,
    path: &mut Vec<usize>,
    out: &mut Vec<LocatedText>,
) {
    for (index, child) in element.children.iter().enumerate() {
        match child {
            Node::Text(text) => {
                if text.chars().all(|c| c == '\n') {
                    continue;
                }
                let mut node_path = path.clone();
                node_path.push(index);
                out.push(LocatedText {
                    text: text.clone(),
                    key: ancestors.clone(),
                    path: node_path,
                });
            }
            Node::Element(el) => {
                ancestors.push((el.name.clone(), el.class.clone()));
                path.push(index);
                walk(el, ancestors, path, out);
                path.pop();
                ancestors.pop();
            }
        }
    }
}

/// Groups the located text nodes of all `blocks` by location key, then by
/// definition index. One block can match the same key several times (e.g.
/// repeated list items), hence the path sequence.
#[must_use]
pub fn index_by_location(blocks: &[&Element]) -> LocationIndex {
    let mut index: LocationIndex = BTreeMap::new();
    for (definition_index, block) in blocks.iter().enumerate() {
        for located in locate_text_nodes(block) {
            index
                .entry(located.key)
                .or_default()
                .entry(definition_index)
                .or_default()
                .push(located.path);
        }
    }

    index
}

/// Resolves an index path produced by [`locate_text_nodes`] back to its text
/// content.
///
/// # Errors
///
/// Returns [`Error::LocationNotFound`] if an offset is out of range or the
/// path does not end on a text node — the block's structure has drifted
/// since the index was built.
pub fn resolve<'a>(block: &'a Element, path: &[usize]) -> Result<&'a str, Error> {
    block
        .node_at(path)
        .and_then(Node::as_text)
        .ok_or_else(|| Error::LocationNotFound(path.to_vec()))
}
