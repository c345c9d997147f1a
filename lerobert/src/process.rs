//! Processing of raw definition pages for local use.
//!
//! Each definition block has its example sentences tagged and wrapped (the
//! headwords act as both target words and target lemmas), its examples
//! assigned stable `{document}_{index}` ids, and its dictionary links made
//! absolute. The result is the flat sequence of processed blocks that later
//! stages (word index, embeddings, query serving) operate on.

use std::collections::HashSet;

use crate::align::{Tagger, wrap_words};
use crate::document::{Document, Element, Node, extract_header_words};
use crate::{DICTIONARY_URL, Error};

/// Media prefix rewrites applied to processed pages so cached assets are
/// served locally.
const MEDIA_REWRITES: &[(&str, &str)] = &[
    ("/medias/SOUNDS/originals/mp3", "/audio"),
    ("/medias/IMAGES/originals/thumbnails", "/image-thumbnails"),
];

/// The CSS class marking an example sentence.
pub const EXAMPLE_CLASS: &str = "d_xpl";

/// The CSS class marking a highlighted word inside an example.
pub const WORD_CLASS: &str = "word";

/// Processes a parsed page in place and returns the processed HTML: the
/// `\n`-joined serialization of its definition blocks.
///
/// Example ids are assigned from a counter that increases across blocks in
/// document order, so an example's id always matches its global position in
/// the page at processing time.
///
/// # Errors
///
/// Returns [`Error::Tagger`] if the tagging call fails, or
/// [`Error::MissingElement`] if a wrapped example fragment no longer
/// contains its example element.
pub fn process_document<T>(
    document_id: &str,
    document: &mut Document,
    tagger: &T,
) -> Result<String, Error>
where
    T: Tagger + ?Sized,
{
    let block_paths = document.definition_block_paths();
    let mut processed_blocks = Vec::with_capacity(block_paths.len());
    let mut example_counter = 0usize;

    for block_path in block_paths {
        let Some(block) = document.root.element_at_mut(&block_path) else {
            continue;
        };

        // The headwords are matched as both surface words and lemmas, so
        // inflected forms inside the examples highlight too.
        let header = extract_header_words(block);
        let targets: HashSet<String> =
            header.words.iter().map(|word| word.to_lowercase()).collect();

        for example_path in block.paths_with_class(EXAMPLE_CLASS) {
            let Some(example) = block.element_at(&example_path) else {
                continue;
            };
            let wrapped = wrap_words(&example.html(), tagger, &targets, &targets)?;
            let mut replacement = find_example_fragment(&wrapped)
                .ok_or(Error::MissingElement("processed example fragment"))?;
            replacement.set_attr("id", format!("{document_id}_{example_counter}"));
            block.replace_node(&example_path, Node::Element(replacement))?;
            example_counter += 1;
        }

        block.visit_elements_mut(&mut |el| {
            if el.name == "a"
                && let Some(href) = el.attr("href")
                && href.starts_with('/')
            {
                let absolute = format!("{DICTIONARY_URL}{href}");
                el.set_attr("href", absolute);
                el.set_attr("target", "_blank");
                el.set_attr("rel", "noopener noreferrer");
            }
        });

        processed_blocks.push(block.html());
    }

    let mut processed = processed_blocks.join("\n");
    for (from, to) in MEDIA_REWRITES {
        processed = processed.replace(from, to);
    }

    Ok(processed)
}

/// Re-parses a wrapped example fragment and extracts its example element.
fn find_example_fragment(html: &str) -> Option<Element> {
    for node in Document::parse_fragment(html) {
        if let Node::Element(el) = node {
            if el.has_class(EXAMPLE_CLASS) {
                return Some(el);
            }
            if let Some(found) = el.find_descendant(&|inner| inner.has_class(EXAMPLE_CLASS)) {
                return Some(found.clone());
            }
        }
    }

    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::align::TagToken;

    struct StubTagger(Vec<TagToken>);

    impl Tagger for StubTagger {
        fn tag(&self, _text: &str) -> Result<Vec<TagToken>, Error> {
            Ok(self.0.clone())
        }
    }

    fn token(word: &str, pos: &str, lemma: &str) -> TagToken {
        TagToken {
            word: word.to_string(),
            pos: pos.to_string(),
            lemma: lemma.to_string(),
        }
    }

    const PAGE: &str = concat!(
        "<html><body><div class=\"ws-c\"><main><section class=\"def\">",
        "<div class=\"b\"><h3>chat</h3>",
        "<span class=\"d_xpl\">Le chat dort.</span>",
        "<a href=\"/definition/chatte\">chatte</a>",
        "</div>",
        "</section></main></div></body></html>",
    );

    #[test]
    fn processes_examples_links_and_ids() {
        let mut document = Document::parse(PAGE);
        let tagger = StubTagger(vec![
            token("Le", "DET", "le"),
            token("chat", "NOM", "chat"),
            token("dort", "VER", "dormir"),
        ]);
        let processed = process_document("chat", &mut document, &tagger).expect("processed");

        assert!(processed.contains(
            "<span class=\"d_xpl\" id=\"chat_0\">Le <span class=\"word\">chat</span> dort.</span>"
        ));
        assert!(processed.contains(
            "<a href=\"https://dictionnaire.lerobert.com/definition/chatte\" \
             target=\"_blank\" rel=\"noopener noreferrer\">chatte</a>"
        ));
        // The processed page is block-level only: the ancestor chain is gone.
        assert!(processed.starts_with("<div class=\"b\">"));
    }

    #[test]
    fn example_ids_increase_across_blocks() {
        let page = concat!(
            "<html><body><div class=\"ws-c\"><main><section class=\"def\">",
            "<div class=\"b\"><h3>un</h3>",
            "<span class=\"d_xpl\">aa</span><span class=\"d_xpl\">bb</span></div>",
            "<div class=\"b\"><h3>deux</h3><span class=\"d_xpl\">cc</span></div>",
            "</section></main></div></body></html>",
        );
        let mut document = Document::parse(page);
        let tagger = StubTagger(Vec::new());
        let processed = process_document("mot", &mut document, &tagger).expect("processed");

        assert!(processed.contains("id=\"mot_0\""));
        assert!(processed.contains("id=\"mot_1\""));
        assert!(processed.contains("id=\"mot_2\""));
    }

    #[test]
    fn rewrites_media_prefixes() {
        let page = concat!(
            "<html><body><div class=\"ws-c\"><main><section class=\"def\">",
            "<div class=\"b\"><h3>son</h3>",
            "<audio><source src=\"/medias/SOUNDS/originals/mp3/son.mp3\"></audio>",
            "</div></section></main></div></body></html>",
        );
        let mut document = Document::parse(page);
        let tagger = StubTagger(Vec::new());
        let processed = process_document("son", &mut document, &tagger).expect("processed");

        assert!(processed.contains("src=\"/audio/son.mp3\""));
        assert!(!processed.contains("/medias/SOUNDS"));
    }

    #[test]
    fn processed_output_reparses_into_same_blocks() {
        let mut document = Document::parse(PAGE);
        let tagger = StubTagger(vec![token("chat", "NOM", "chat")]);
        let processed = process_document("chat", &mut document, &tagger).expect("processed");

        let reparsed = Document::parse(&processed);
        assert_eq!(reparsed.find_definition_blocks().len(), 1);
    }
}
