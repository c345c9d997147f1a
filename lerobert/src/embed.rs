//! Projection of highlighted words onto contextual token embeddings.
//!
//! The tokenizer and model are external capabilities (an inference service
//! or an in-process model); this module only decides *which* of their token
//! vectors to average — the sub-tokens of highlighted words for example
//! fragments, or the selected span's sub-tokens for a user selection.

use async_trait::async_trait;

use crate::Error;
use crate::document::{Element, Node};
use crate::process::WORD_CLASS;

/// External tokenizer capability.
#[async_trait]
pub trait TextTokenizer: Send + Sync {
    /// Encodes `text` into content token ids, without special tokens.
    async fn encode(&self, text: &str) -> Result<Vec<i64>, Error>;

    /// The model-specific `(start, end)` special token ids bracketing every
    /// input sequence.
    fn specials(&self) -> (i64, i64);
}

/// External embedding model capability.
#[async_trait]
pub trait EmbeddingModel: Send + Sync {
    /// Runs the model over `ids` and returns one hidden-state vector per
    /// input token.
    async fn embed_tokens(&self, ids: &[i64]) -> Result<Vec<Vec<f32>>, Error>;
}

/// Embeds an example fragment as the mean hidden state of its highlighted
/// words' sub-tokens.
///
/// Every text node under `example` is tokenized independently (lowercased),
/// so highlighted-word boundaries are known per node from the
/// `class="word"` markers set during alignment. The fragment must contain at
/// least one highlighted word with a non-empty encoding; with an empty mask
/// the mean is undefined and the result is a NaN vector.
///
/// # Errors
///
/// Returns a capability error if encoding or inference fails, or
/// [`Error::Embedding`] if the model returns the wrong number of vectors.
pub async fn embed_fragment<T, M>(
    example: &Element,
    tokenizer: &T,
    model: &M,
) -> Result<Vec<f32>, Error>
where
    T: TextTokenizer + ?Sized,
    M: EmbeddingModel + ?Sized,
{
    let mut texts = Vec::new();
    collect_texts(example, &mut texts);

    let (start, end) = tokenizer.specials();
    let mut ids = vec![start];
    let mut mask = vec![false];
    for (text, highlighted) in texts {
        let tokens = tokenizer.encode(&text.to_lowercase()).await?;
        if !tokens.is_empty() {
            mask.extend(std::iter::repeat_n(highlighted, tokens.len()));
            ids.extend(tokens);
        }
    }
    ids.push(end);
    mask.push(false);

    masked_mean(model, &ids, &mask).await
}

/// Embeds a selected span of `text` contextually.
///
/// The selection (given as character offsets) is tokenized alone, then whole
/// words immediately before and after it are greedily consumed under a
/// symmetric per-side budget of `(max_length - selected) / 2` tokens; a word
/// that would overflow its side is excluded entirely, never truncated. Only
/// the selection's tokens are masked, so the surrounding words disambiguate
/// the embedding without contributing to it.
///
/// # Errors
///
/// Returns a capability error if encoding or inference fails, or
/// [`Error::Embedding`] if the model returns the wrong number of vectors.
pub async fn embed_selection<T, M>(
    text: &str,
    selection_start: usize,
    selection_end: usize,
    tokenizer: &T,
    model: &M,
    max_length: usize,
) -> Result<Vec<f32>, Error>
where
    T: TextTokenizer + ?Sized,
    M: EmbeddingModel + ?Sized,
{
    let byte_start = byte_offset(text, selection_start);
    let byte_end = byte_offset(text, selection_end).max(byte_start);
    let text_before = &text[..byte_start];
    let text_selected = &text[byte_start..byte_end];
    let text_after = &text[byte_end..];

    let selected = tokenizer.encode(&text_selected.to_lowercase()).await?;
    let budget = max_length.saturating_sub(selected.len()) / 2;

    let mut before: Vec<Vec<i64>> = Vec::new();
    let mut len_before = 0usize;
    for word in text_before.split(' ').rev() {
        let tokens = tokenizer.encode(&word.to_lowercase()).await?;
        if len_before + tokens.len() > budget {
            break;
        }
        if !tokens.is_empty() {
            len_before += tokens.len();
            before.push(tokens);
        }
    }
    before.reverse();

    let mut after: Vec<Vec<i64>> = Vec::new();
    let mut len_after = 0usize;
    for word in text_after.split(' ') {
        let tokens = tokenizer.encode(&word.to_lowercase()).await?;
        if len_after + tokens.len() > budget {
            break;
        }
        if !tokens.is_empty() {
            len_after += tokens.len();
            after.push(tokens);
        }
    }

    let (start, end) = tokenizer.specials();
    let mut mask = vec![false; len_before + 1];
    mask.extend(std::iter::repeat_n(true, selected.len()));
    mask.extend(std::iter::repeat_n(false, len_after + 1));

    let mut ids = vec![start];
    ids.extend(before.into_iter().flatten());
    ids.extend(selected);
    ids.extend(after.into_iter().flatten());
    ids.push(end);

    masked_mean(model, &ids, &mask).await
}

/// Cosine similarity between two vectors, with the epsilon guard of the
/// query path.
#[must_use]
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    const EPS: f32 = 1e-8;

    let dot: f32 = a.iter().zip(b).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();

    dot / (norm_a.max(EPS) * norm_b.max(EPS))
}

async fn masked_mean<M>(model: &M, ids: &[i64], mask: &[bool]) -> Result<Vec<f32>, Error>
where
    M: EmbeddingModel + ?Sized,
{
    let hidden = model.embed_tokens(ids).await?;
    if hidden.len() != ids.len() {
        return Err(Error::Embedding(format!(
            "model returned {} vectors for {} tokens",
            hidden.len(),
            ids.len()
        )));
    }

    let dim = hidden.first().map_or(0, Vec::len);
    let mut sum = vec![0.0f32; dim];
    let mut count = 0usize;
    for (vector, masked) in hidden.iter().zip(mask) {
        if *masked {
            for (acc, value) in sum.iter_mut().zip(vector) {
                *acc += value;
            }
            count += 1;
        }
    }

    // An empty mask yields NaN, per the documented precondition.
    let count = count as f32;
    Ok(sum.into_iter().map(|value| value / count).collect())
}

fn collect_texts(element: &Element, out: &mut Vec<(String, bool)>) {
    for child in &element.children {
        match child {
            Node::Text(text) => out.push((text.clone(), element.has_class(WORD_CLASS))),
            Node::Element(el) => collect_texts(el, out),
        }
    }
}

fn byte_offset(text: &str, char_offset: usize) -> usize {
    text.char_indices()
        .nth(char_offset)
        .map_or(text.len(), |(offset, _)| offset)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::Document;

    struct StubTokenizer;

    fn token_id(word: &str) -> i64 {
        word.bytes().map(i64::from).sum::<i64>() + 10
    }

    #[async_trait]
    impl TextTokenizer for StubTokenizer {
        async fn encode(&self, text: &str) -> Result<Vec<i64>, Error> {
            Ok(text.split_whitespace().map(token_id).collect())
        }

        fn specials(&self) -> (i64, i64) {
            (1, 2)
        }
    }

    struct StubModel;

    #[async_trait]
    impl EmbeddingModel for StubModel {
        async fn embed_tokens(&self, ids: &[i64]) -> Result<Vec<Vec<f32>>, Error> {
            Ok(ids.iter().map(|id| vec![*id as f32, 1.0]).collect())
        }
    }

    fn example_element(html: &str) -> Element {
        let nodes = Document::parse_fragment(html);
        match nodes.into_iter().next() {
            Some(Node::Element(el)) => el,
            _ => panic!("fragment element"),
        }
    }

    #[tokio::test]
    async fn fragment_embedding_averages_highlighted_tokens() {
        let example = example_element(
            "<span class=\"d_xpl\">Le <span class=\"word\">chat</span> dort.</span>",
        );
        let embedding = embed_fragment(&example, &StubTokenizer, &StubModel)
            .await
            .expect("embedding");

        assert_eq!(embedding, vec![token_id("chat") as f32, 1.0]);
    }

    #[tokio::test]
    async fn fragment_embedding_spans_multiple_highlights() {
        let example = example_element(concat!(
            "<span class=\"d_xpl\"><span class=\"word\">chat</span> et ",
            "<span class=\"word\">chatte</span></span>",
        ));
        let embedding = embed_fragment(&example, &StubTokenizer, &StubModel)
            .await
            .expect("embedding");

        let expected = (token_id("chat") + token_id("chatte")) as f32 / 2.0;
        assert_eq!(embedding, vec![expected, 1.0]);
    }

    #[tokio::test]
    async fn selection_embedding_masks_only_the_selection() {
        let text = "le chat noir dort";
        // Characters 3..7 select "chat".
        let embedding = embed_selection(text, 3, 7, &StubTokenizer, &StubModel, 510)
            .await
            .expect("embedding");

        assert_eq!(embedding, vec![token_id("chat") as f32, 1.0]);
    }

    #[tokio::test]
    async fn selection_context_respects_the_side_budget() {
        let text = "le petit chat noir dort";
        // Characters 9..13 select "chat"; budget (3-1)/2 = 1 word per side.
        let embedding = embed_selection(text, 9, 13, &StubTokenizer, &StubModel, 3)
            .await
            .expect("embedding");

        // Context words never enter the mask, so the mean is unchanged; the
        // budget only bounds the assembled input length.
        assert_eq!(embedding, vec![token_id("chat") as f32, 1.0]);
    }

    #[tokio::test]
    async fn oversized_selection_still_embeds() {
        let text = "chat";
        let embedding = embed_selection(text, 0, 4, &StubTokenizer, &StubModel, 0)
            .await
            .expect("embedding");

        assert_eq!(embedding, vec![token_id("chat") as f32, 1.0]);
    }

    #[test]
    fn cosine_similarity_of_identical_vectors_is_one() {
        let v = vec![0.5, -1.0, 2.0];

        assert!((cosine_similarity(&v, &v) - 1.0).abs() < 1e-6);
    }

    #[test]
    fn cosine_similarity_of_orthogonal_vectors_is_zero() {
        assert!(cosine_similarity(&[1.0, 0.0], &[0.0, 1.0]).abs() < 1e-6);
    }
}
