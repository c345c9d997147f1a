//! Document model for dictionary definition pages.
//!
//! Pages are parsed leniently (html5ever via `scraper`) and converted into an
//! owned tree of [`Element`] and text nodes that supports the structural
//! queries, attribute edits and re-serialization the processing pipeline
//! needs. Sibling order is preserved from the source markup.

use std::collections::BTreeSet;

use scraper::Html;

use crate::Error;

/// HTML elements serialized without an end tag.
const VOID_ELEMENTS: &[&str] = &[
    "area", "base", "br", "col", "embed", "hr", "img", "input", "link", "meta", "param", "source",
    "track", "wbr",
];

/// A node of the document tree.
#[derive(Debug, Clone, PartialEq)]
pub enum Node {
    /// An element with attributes and children.
    Element(Element),
    /// A text leaf.
    Text(String),
}

impl Node {
    /// Returns the node as an element, if it is one.
    pub fn as_element(&self) -> Option<&Element> {
        match self {
            Node::Element(el) => Some(el),
            Node::Text(_) => None,
        }
    }

    /// Returns the node as a text leaf, if it is one.
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Node::Element(_) => None,
            Node::Text(text) => Some(text),
        }
    }

    fn write_html(&self, out: &mut String) {
        match self {
            Node::Element(el) => el.write_html(out),
            Node::Text(text) => escape_text(out, text),
        }
    }
}

/// An element of the document tree.
///
/// The `class` field mirrors the `class` attribute; inside a definition block
/// the source markup guarantees at most one class value per element, which is
/// what makes class-based location keys unambiguous.
#[derive(Debug, Clone, PartialEq)]
pub struct Element {
    /// Tag name.
    pub name: String,
    /// Attributes in source order.
    pub attrs: Vec<(String, String)>,
    /// The `class` attribute, if present.
    pub class: Option<String>,
    /// Child nodes in source order.
    pub children: Vec<Node>,
}

/// A parsed definition page.
#[derive(Debug, Clone)]
pub struct Document {
    /// The root `html` element.
    pub root: Element,
}

/// Headwords and grammatical categories extracted from a definition block
/// heading.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct HeaderData {
    /// The words being defined.
    pub words: Vec<String>,
    /// Grammatical category abbreviations.
    pub categories: Vec<String>,
}

impl Document {
    /// Parses an HTML document.
    ///
    /// The parser is lenient; dictionary-specific structure is not validated
    /// here.
    #[must_use]
    pub fn parse(html: &str) -> Document {
        let parsed = Html::parse_document(html);
        let root = match convert_node(*parsed.root_element()) {
            Some(Node::Element(root)) => root,
            _ => Element::new("html"),
        };

        Document { root }
    }

    /// Parses raw document bytes.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Parse`] if the bytes are not valid UTF-8.
    pub fn from_bytes(bytes: &[u8]) -> Result<Document, Error> {
        let html = std::str::from_utf8(bytes)?;

        Ok(Document::parse(html))
    }

    /// Parses an HTML fragment and returns its top-level nodes.
    #[must_use]
    pub fn parse_fragment(html: &str) -> Vec<Node> {
        let parsed = Html::parse_fragment(html);

        parsed.root_element().children().filter_map(convert_node).collect()
    }

    /// Returns the index paths (from the root element) of all definition
    /// blocks, in document order.
    ///
    /// Raw pages carry their blocks under the fixed ancestor chain
    /// `body > div.ws-c > main > section.def`; processed pages are flat
    /// sequences of `div.b` fragments that land directly under `body` when
    /// re-parsed. If neither pattern matches the result is empty.
    #[must_use]
    pub fn definition_block_paths(&self) -> Vec<Vec<usize>> {
        if let Some(paths) = self.raw_block_paths() {
            return paths;
        }

        self.processed_block_paths()
    }

    /// Returns all definition blocks in document order.
    #[must_use]
    pub fn find_definition_blocks(&self) -> Vec<&Element> {
        self.definition_block_paths()
            .iter()
            .filter_map(|path| self.root.element_at(path))
            .collect()
    }

    /// Block paths for an unprocessed page, or `None` if the ancestor chain
    /// is absent.
    fn raw_block_paths(&self) -> Option<Vec<Vec<usize>>> {
        let body_path = self.root.first_descendant_path("body")?;
        let body = self.root.element_at(&body_path)?;
        let ws_index = body.child_index(|el| el.name == "div" && el.has_class("ws-c"))?;
        let Some(Node::Element(ws_c)) = body.children.get(ws_index) else {
            return None;
        };
        let main_path = ws_c.first_descendant_path("main")?;
        let main = ws_c.element_at(&main_path)?;
        let section_index = main.child_index(|el| el.name == "section" && el.has_class("def"))?;
        let Some(Node::Element(section)) = main.children.get(section_index) else {
            return None;
        };

        let mut paths = Vec::new();
        for (index, child) in section.children.iter().enumerate() {
            if let Node::Element(el) = child
                && el.name == "div"
                && el.has_class("b")
            {
                let mut path = body_path.clone();
                path.push(ws_index);
                path.extend_from_slice(&main_path);
                path.push(section_index);
                path.push(index);
                paths.push(path);
            }
        }

        Some(paths)
    }

    /// Block paths for an already-processed page.
    fn processed_block_paths(&self) -> Vec<Vec<usize>> {
        let Some(body_path) = self.root.first_descendant_path("body") else {
            return Vec::new();
        };
        let Some(body) = self.root.element_at(&body_path) else {
            return Vec::new();
        };

        let mut paths = Vec::new();
        for (index, child) in body.children.iter().enumerate() {
            if let Node::Element(el) = child
                && el.name == "div"
                && el.has_class("b")
            {
                let mut path = body_path.clone();
                path.push(index);
                paths.push(path);
            }
        }

        paths
    }

    /// Returns the word path the page was originally saved under, taken from
    /// its `og:url` meta property.
    #[must_use]
    pub fn original_word_path(&self) -> Option<String> {
        let meta = self
            .root
            .find_descendant(&|el| el.name == "meta" && el.attr("property") == Some("og:url"))?;
        let content = meta.attr("content")?;

        content.rsplit('/').next().map(str::to_string)
    }

    /// Returns the word paths of all definition links on the page.
    #[must_use]
    pub fn definition_links(&self) -> BTreeSet<String> {
        let mut paths = BTreeSet::new();
        self.root.visit_elements(&mut |el| {
            if el.name == "a"
                && let Some(href) = el.attr("href")
                && let Some(path) = href.strip_prefix("/definition/")
                && !path.is_empty()
            {
                paths.insert(path.to_string());
            }
        });

        paths
    }

    /// Returns the deduplicated `src` values of all `tag_name` elements
    /// inside the page's definition blocks.
    #[must_use]
    pub fn media_sources(&self, tag_name: &str) -> BTreeSet<String> {
        let mut sources = BTreeSet::new();
        for block in self.find_definition_blocks() {
            block.visit_elements(&mut |el| {
                if el.name == tag_name
                    && let Some(src) = el.attr("src")
                {
                    sources.insert(src.to_string());
                }
            });
        }

        sources
    }
}

impl Element {
    /// Creates an empty element.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Element {
        Element {
            name: name.into(),
            attrs: Vec::new(),
            class: None,
            children: Vec::new(),
        }
    }

    /// Returns the value of the given attribute.
    #[must_use]
    pub fn attr(&self, name: &str) -> Option<&str> {
        self.attrs
            .iter()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value.as_str())
    }

    /// Sets an attribute, replacing any existing value and keeping the
    /// `class` field in sync.
    pub fn set_attr(&mut self, name: &str, value: impl Into<String>) {
        let value = value.into();
        if name == "class" {
            self.class = Some(value.clone());
        }
        if let Some(entry) = self.attrs.iter_mut().find(|(key, _)| key == name) {
            entry.1 = value;
        } else {
            self.attrs.push((name.to_string(), value));
        }
    }

    /// Returns whether the element's class attribute contains `class`.
    #[must_use]
    pub fn has_class(&self, class: &str) -> bool {
        self.class
            .as_deref()
            .is_some_and(|value| value.split_whitespace().any(|part| part == class))
    }

    /// Concatenated text of all descendant text nodes.
    #[must_use]
    pub fn text(&self) -> String {
        let mut out = String::new();
        self.collect_text(&mut out);
        out
    }

    fn collect_text(&self, out: &mut String) {
        for child in &self.children {
            match child {
                Node::Element(el) => el.collect_text(out),
                Node::Text(text) => out.push_str(text),
            }
        }
    }

    /// Returns the node at `path`, a chain of child offsets relative to this
    /// element.
    #[must_use]
    pub fn node_at(&self, path: &[usize]) -> Option<&Node> {
        let (&first, rest) = path.split_first()?;
        let child = self.children.get(first)?;
        if rest.is_empty() {
            return Some(child);
        }

        child.as_element()?.node_at(rest)
    }

    /// Returns the element at `path`.
    #[must_use]
    pub fn element_at(&self, path: &[usize]) -> Option<&Element> {
        if path.is_empty() {
            return Some(self);
        }

        self.node_at(path)?.as_element()
    }

    /// Returns the element at `path`, mutably.
    pub fn element_at_mut(&mut self, path: &[usize]) -> Option<&mut Element> {
        let Some((&first, rest)) = path.split_first() else {
            return Some(self);
        };
        match self.children.get_mut(first)? {
            Node::Element(el) => el.element_at_mut(rest),
            Node::Text(_) => None,
        }
    }

    /// Replaces the node at `path` with `node`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::LocationNotFound`] if `path` does not resolve.
    pub fn replace_node(&mut self, path: &[usize], node: Node) -> Result<(), Error> {
        let Some((&last, parent_path)) = path.split_last() else {
            return Err(Error::LocationNotFound(path.to_vec()));
        };
        let parent = self
            .element_at_mut(parent_path)
            .ok_or_else(|| Error::LocationNotFound(path.to_vec()))?;
        let slot = parent
            .children
            .get_mut(last)
            .ok_or_else(|| Error::LocationNotFound(path.to_vec()))?;
        *slot = node;

        Ok(())
    }

    /// Index of the first child element matching `predicate`, counted over
    /// all child nodes.
    #[must_use]
    pub fn child_index(&self, predicate: impl Fn(&Element) -> bool) -> Option<usize> {
        self.children.iter().position(|child| {
            child.as_element().is_some_and(&predicate)
        })
    }

    /// Path to the first descendant element named `name`, in document order.
    #[must_use]
    pub fn first_descendant_path(&self, name: &str) -> Option<Vec<usize>> {
        for (index, child) in self.children.iter().enumerate() {
            if let Node::Element(el) = child {
                if el.name == name {
                    return Some(vec![index]);
                }
                if let Some(mut rest) = el.first_descendant_path(name) {
                    let mut path = vec![index];
                    path.append(&mut rest);
                    return Some(path);
                }
            }
        }

        None
    }

    /// First descendant element named `name`, in document order.
    #[must_use]
    pub fn first_descendant(&self, name: &str) -> Option<&Element> {
        self.first_descendant_path(name)
            .and_then(|path| self.element_at(&path))
    }

    /// First descendant element matching `predicate`, in document order.
    #[must_use]
    pub fn find_descendant<F>(&self, predicate: &F) -> Option<&Element>
    where
        F: Fn(&Element) -> bool,
    {
        for child in &self.children {
            if let Node::Element(el) = child {
                if predicate(el) {
                    return Some(el);
                }
                if let Some(found) = el.find_descendant(predicate) {
                    return Some(found);
                }
            }
        }

        None
    }

    /// Visits every descendant element in document order.
    pub fn visit_elements<F>(&self, visitor: &mut F)
    where
        F: FnMut(&Element),
    {
        for child in &self.children {
            if let Node::Element(el) = child {
                visitor(el);
                el.visit_elements(visitor);
            }
        }
    }

    /// Visits every descendant element in document order, mutably.
    pub fn visit_elements_mut<F>(&mut self, visitor: &mut F)
    where
        F: FnMut(&mut Element),
    {
        for child in &mut self.children {
            if let Node::Element(el) = child {
                visitor(el);
                el.visit_elements_mut(visitor);
            }
        }
    }

    /// Paths of all descendant elements carrying `class`, in document order.
    #[must_use]
    pub fn paths_with_class(&self, class: &str) -> Vec<Vec<usize>> {
        let mut paths = Vec::new();
        self.collect_paths_with_class(class, &mut Vec::new(), &mut paths);
        paths
    }

    fn collect_paths_with_class(
        &self,
        class: &str,
        prefix: &mut Vec<usize>,
        out: &mut Vec<Vec<usize>>,
    ) {
        for (index, child) in self.children.iter().enumerate() {
            if let Node::Element(el) = child {
                prefix.push(index);
                if el.has_class(class) {
                    out.push(prefix.clone());
                }
                el.collect_paths_with_class(class, prefix, out);
                prefix.pop();
            }
        }
    }

    /// Descendant elements carrying `class`, in document order.
    #[must_use]
    pub fn elements_with_class(&self, class: &str) -> Vec<&Element> {
        self.paths_with_class(class)
            .iter()
            .filter_map(|path| self.element_at(path))
            .collect()
    }

    /// Serializes the element back to HTML.
    #[must_use]
    pub fn html(&self) -> String {
        let mut out = String::new();
        self.write_html(&mut out);
        out
    }

    fn write_html(&self, out: &mut String) {
        out.push('<');
        out.push_str(&self.name);
        for (name, value) in &self.attrs {
            out.push(' ');
            out.push_str(name);
            out.push_str("=\"");
            escape_attr(out, value);
            out.push('"');
        }
        out.push('>');
        if VOID_ELEMENTS.contains(&self.name.as_str()) {
            return;
        }
        for child in &self.children {
            child.write_html(out);
        }
        out.push_str("</");
        out.push_str(&self.name);
        out.push('>');
    }
}

/// Extracts the headwords and grammatical categories of a definition block
/// from its heading.
///
/// Words are the direct text children of the first `h3`, split on commas and
/// spaces; tokens fully wrapped in parentheses are annotations, not
/// headwords. Categories are the text values of the heading's `span.d_cat`
/// descendants.
#[must_use]
pub fn extract_header_words(block: &Element) -> HeaderData {
    let Some(heading) = block.first_descendant("h3") else {
        return HeaderData::default();
    };

    let mut words = Vec::new();
    for child in &heading.children {
        if let Node::Text(text) = child {
            for term in text.split(',') {
                for word in term.split(' ') {
                    let stripped = word.trim_matches([',', ' ', '\n']);
                    if !stripped.is_empty()
                        && !(stripped.starts_with('(') && stripped.ends_with(')'))
                    {
                        words.push(stripped.to_string());
                    }
                }
            }
        }
    }

    let mut categories = Vec::new();
    for cat in heading.elements_with_class("d_cat") {
        if cat.name != "span" {
            continue;
        }
        for child in &cat.children {
            if let Node::Text(text) = child {
                let stripped = text.trim_matches([',', ' ', '\n']);
                if !stripped.is_empty() {
                    categories.push(stripped.to_string());
                }
            }
        }
    }

    HeaderData { words, categories }
}

fn convert_node(node: ego_tree::NodeRef<'_, scraper::Node>) -> Option<Node> {
    match node.value() {
        scraper::Node::Text(text) => Some(Node::Text(text.text.to_string())),
        scraper::Node::Element(el) => {
            let attrs: Vec<(String, String)> = el
                .attrs()
                .map(|(name, value)| (name.to_string(), value.to_string()))
                .collect();
            let class = el.attr("class").map(str::to_string);
            let children = node.children().filter_map(convert_node).collect();

            Some(Node::Element(Element {
                name: el.name().to_string(),
                attrs,
                class,
                children,
            }))
        }
        _ => None,
    }
}

fn escape_text(out: &mut String, text: &str) {
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            _ => out.push(c),
        }
    }
}

fn escape_attr(out: &mut String, value: &str) {
    for c in value.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            _ => out.push(c),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const RAW_PAGE: &str = concat!(
        "<html><head><meta property=\"og:url\" ",
        "content=\"https://dictionnaire.lerobert.com/definition/chat\"></head>",
        "<body><div class=\"ws-c\"><main><section class=\"def\">",
        "<div class=\"b\"><h3>chat, chatte (se) <span class=\"d_cat\">nom</span></h3>",
        "<span class=\"d_xpl\">Le chat dort.</span></div>",
        "<div class=\"b\"><h3>chaton</h3></div>",
        "</section></main></div></body></html>",
    );

    #[test]
    fn finds_blocks_on_raw_pages() {
        let document = Document::parse(RAW_PAGE);
        let blocks = document.find_definition_blocks();

        assert_eq!(blocks.len(), 2);
        assert!(blocks[0].has_class("b"));
    }

    #[test]
    fn finds_blocks_on_processed_pages() {
        let processed = "<div class=\"b\"><h3>un</h3></div>\n<div class=\"b\"><h3>deux</h3></div>";
        let document = Document::parse(processed);
        let blocks = document.find_definition_blocks();

        assert_eq!(blocks.len(), 2);
        assert_eq!(extract_header_words(blocks[1]).words, vec!["deux"]);
    }

    #[test]
    fn missing_structure_yields_no_blocks() {
        let document = Document::parse("<html><body><p>rien</p></body></html>");

        assert!(document.find_definition_blocks().is_empty());
    }

    #[test]
    fn malformed_bytes_are_a_parse_error() {
        assert!(matches!(
            Document::from_bytes(&[0x3c, 0x70, 0xff, 0xfe]),
            Err(crate::Error::Parse(_))
        ));
        assert!(Document::from_bytes(b"<p>ok</p>").is_ok());
    }

    #[test]
    fn text_concatenates_descendants() {
        let document = Document::parse(RAW_PAGE);
        let blocks = document.find_definition_blocks();

        assert_eq!(blocks[0].text(), "chat, chatte (se) nomLe chat dort.");
    }

    #[test]
    fn extracts_header_words_and_categories() {
        let document = Document::parse(RAW_PAGE);
        let blocks = document.find_definition_blocks();
        let header = extract_header_words(blocks[0]);

        // "(se)" is fully parenthesized and therefore not a headword.
        assert_eq!(header.words, vec!["chat", "chatte"]);
        assert_eq!(header.categories, vec!["nom"]);
    }

    #[test]
    fn header_word_extraction_is_idempotent() {
        let document = Document::parse(RAW_PAGE);
        let blocks = document.find_definition_blocks();

        assert_eq!(
            extract_header_words(blocks[0]),
            extract_header_words(blocks[0])
        );
    }

    #[test]
    fn reads_original_word_path() {
        let document = Document::parse(RAW_PAGE);

        assert_eq!(document.original_word_path().as_deref(), Some("chat"));
    }

    #[test]
    fn serializes_attributes_and_text() {
        let nodes = Document::parse_fragment("<p class=\"d_xpl\">Le <b>chat</b> &amp; moi</p>");
        let element = nodes[0].as_element().expect("fragment element");

        assert_eq!(
            element.html(),
            "<p class=\"d_xpl\">Le <b>chat</b> &amp; moi</p>"
        );
    }

    #[test]
    fn set_attr_updates_class_field() {
        let mut element = Element::new("span");
        element.set_attr("class", "word");

        assert!(element.has_class("word"));
        assert_eq!(element.attr("class"), Some("word"));

        element.set_attr("class", "other");
        assert!(!element.has_class("word"));
    }

    #[test]
    fn replace_node_swaps_children() {
        let nodes = Document::parse_fragment("<div><p>a</p><p>b</p></div>");
        let mut root = match nodes.into_iter().next() {
            Some(Node::Element(el)) => el,
            _ => panic!("fragment element"),
        };
        root.replace_node(&[1], Node::Text("x".into())).expect("replace");

        assert_eq!(root.html(), "<div><p>a</p>x</div>");
    }
}
