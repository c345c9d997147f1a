//! Alignment of tagger output onto HTML fragment markup.
//!
//! An external tagger retokenizes the fragment's visible text as one flat
//! stream; this module reconciles those tokens back onto exact byte ranges
//! of the original per-run text and rebuilds the fragment with matched
//! words wrapped in `<span class="word">` — without ever inserting markup
//! across a tag boundary.

use std::collections::HashSet;

use crate::Error;

/// One token produced by the external word tagger.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TagToken {
    /// Surface form as it appears in the text.
    pub word: String,
    /// Part-of-speech tag.
    pub pos: String,
    /// Lemma; may be a `|`-delimited disjunction of alternatives.
    pub lemma: String,
}

/// External word/lemma tagging capability.
pub trait Tagger {
    /// Tags `text`, returning tokens in their lexical order.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Tagger`] when the underlying tagger fails.
    fn tag(&self, text: &str) -> Result<Vec<TagToken>, Error>;
}

/// A text run between two markup runs, as byte offsets into the fragment.
#[derive(Debug, Clone, Copy)]
struct TextRun {
    start: usize,
    end: usize,
}

/// Wraps occurrences of the target words and lemmas in
/// `<span class="word">…</span>`.
///
/// `fragment` must be the serialization of exactly one element (it begins
/// with `<` and ends with `>`) whose text content carries no literal `<` or
/// `>`. `words` and `lemmas` are case-folded target sets; if both are empty
/// the fragment is returned unchanged and the tagger is never invoked.
///
/// Tokens the tagger returns are matched against the concatenated text runs
/// with a monotonically advancing search floor: the floor moves past every
/// token located in the flat text, accepted or not, so a repeated surface
/// form can never re-match an earlier occurrence. Tokens that cannot be
/// located, and tokens whose match would straddle two text runs, are
/// dropped silently — the fragment is still reconstructed in full, just
/// without that highlight.
///
/// # Errors
///
/// Returns [`Error::Tagger`] when the tagging call fails.
pub fn wrap_words<T>(
    fragment: &str,
    tagger: &T,
    words: &HashSet<String>,
    lemmas: &HashSet<String>,
) -> Result<String, Error>
where
    T: Tagger + ?Sized,
{
    if words.is_empty() && lemmas.is_empty() {
        return Ok(fragment.to_string());
    }

    let runs = scan_text_runs(fragment);
    if runs.is_empty() {
        return Ok(fragment.to_string());
    }

    // Tag the whole visible text at once: one external call, and the tagger
    // sees cross-run context, which it needs to lemmatize correctly at run
    // boundaries.
    let flat: String = runs
        .iter()
        .map(|run| &fragment[run.start..run.end])
        .collect();
    let tokens = tagger.tag(&flat)?;

    // Cumulative end offset of each run within the flat text.
    let mut acc_lens = Vec::with_capacity(runs.len());
    let mut total = 0usize;
    for run in &runs {
        total += run.end - run.start;
        acc_lens.push(total);
    }

    // Accepted highlight spans, local to each run.
    let mut accepted: Vec<Vec<(usize, usize)>> = vec![Vec::new(); runs.len()];
    let mut floor = 0usize;
    let mut current = 0usize;
    for token in &tokens {
        if token.word.is_empty() {
            continue;
        }
        let Some(offset) = flat[floor..].find(token.word.as_str()) else {
            continue;
        };
        let start = floor + offset;
        let end = start + token.word.len();
        floor = end;
        while start >= acc_lens[current] {
            current += 1;
        }

        let word_matches = words.contains(&token.word.to_lowercase());
        let lemma_matches = token
            .lemma
            .to_lowercase()
            .split('|')
            .any(|alternative| lemmas.contains(alternative));
        // Spans crossing into the next run would require markup inside a
        // tag boundary; those tokens are rejected outright.
        if (word_matches || lemma_matches) && end <= acc_lens[current] {
            let run_start = acc_lens[current] - (runs[current].end - runs[current].start);
            accepted[current].push((start - run_start, end - run_start));
        }
    }

    Ok(reassemble(fragment, &runs, &accepted))
}

/// Splits `fragment` into maximal text runs between a `>` and the following
/// `<`. Everything outside the runs is markup and is preserved verbatim.
fn scan_text_runs(fragment: &str) -> Vec<TextRun> {
    let mut runs = Vec::new();
    let mut pos = 0usize;
    while pos < fragment.len() {
        let Some(gt) = fragment[pos..].find('>') else {
            break;
        };
        let start = pos + gt + 1;
        if start >= fragment.len() {
            break;
        }
        let Some(lt) = fragment[start..].find('<') else {
            break;
        };
        let end = start + lt;
        if end > start {
            runs.push(TextRun { start, end });
        }
        pos = end;
    }

    runs
}

fn reassemble(fragment: &str, runs: &[TextRun], accepted: &[Vec<(usize, usize)>]) -> String {
    let mut out = String::with_capacity(fragment.len() + 64);
    out.push_str(&fragment[..runs[0].start]);
    for (index, run) in runs.iter().enumerate() {
        let text = &fragment[run.start..run.end];
        let mut cursor = 0usize;
        for &(start, end) in &accepted[index] {
            if start > cursor {
                out.push_str(&text[cursor..start]);
            }
            out.push_str("<span class=\"word\">");
            out.push_str(&text[start..end]);
            out.push_str("</span>");
            cursor = end;
        }
        out.push_str(&text[cursor..]);
        let markup_end = runs.get(index + 1).map_or(fragment.len(), |next| next.start);
        out.push_str(&fragment[run.end..markup_end]);
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Tagger stub returning a fixed token list.
    struct StubTagger(Vec<TagToken>);

    impl StubTagger {
        fn new(tokens: &[(&str, &str, &str)]) -> StubTagger {
            StubTagger(
                tokens
                    .iter()
                    .map(|(word, pos, lemma)| TagToken {
                        word: (*word).to_string(),
                        pos: (*pos).to_string(),
                        lemma: (*lemma).to_string(),
                    })
                    .collect(),
            )
        }
    }

    impl Tagger for StubTagger {
        fn tag(&self, _text: &str) -> Result<Vec<TagToken>, Error> {
            Ok(self.0.clone())
        }
    }

    /// Tagger stub that must never be reached.
    struct UnreachableTagger;

    impl Tagger for UnreachableTagger {
        fn tag(&self, _text: &str) -> Result<Vec<TagToken>, Error> {
            panic!("tagger invoked for empty target sets");
        }
    }

    fn set(values: &[&str]) -> HashSet<String> {
        values.iter().map(|v| (*v).to_string()).collect()
    }

    #[test]
    fn empty_targets_return_fragment_unchanged() {
        let fragment = "<p class=\"d_xpl\">Le <b>chat</b> dort.</p>";
        let wrapped =
            wrap_words(fragment, &UnreachableTagger, &HashSet::new(), &HashSet::new()).unwrap();

        assert_eq!(wrapped, fragment);
    }

    #[test]
    fn wraps_matched_word_inside_nested_markup() {
        let fragment = "<p class=\"d_xpl\">Le <b>chat</b> dort.</p>";
        let tagger = StubTagger::new(&[
            ("Le", "DET", "le"),
            ("chat", "NOM", "chat"),
            ("dort", "VER", "dormir"),
        ]);
        let wrapped = wrap_words(fragment, &tagger, &set(&["chat"]), &HashSet::new()).unwrap();

        assert_eq!(
            wrapped,
            "<p class=\"d_xpl\">Le <b><span class=\"word\">chat</span></b> dort.</p>"
        );
    }

    #[test]
    fn matches_through_lemma_alternatives() {
        let fragment = "<p>Les chiens dorment.</p>";
        let tagger = StubTagger::new(&[
            ("Les", "DET", "la|le"),
            ("chiens", "NOM", "chien"),
            ("dorment", "VER", "dormir"),
        ]);
        let wrapped =
            wrap_words(fragment, &tagger, &HashSet::new(), &set(&["le", "chien"])).unwrap();

        assert_eq!(
            wrapped,
            "<p><span class=\"word\">Les</span> <span class=\"word\">chiens</span> dorment.</p>"
        );
    }

    #[test]
    fn rejects_tokens_straddling_tag_boundaries() {
        let fragment = "<p>ab<b>cd</b>ef</p>";
        let tagger = StubTagger::new(&[("bc", "NOM", "bc")]);
        let wrapped = wrap_words(fragment, &tagger, &set(&["bc"]), &set(&["bc"])).unwrap();

        assert_eq!(wrapped, fragment);
    }

    #[test]
    fn repeated_words_match_strictly_increasing_positions() {
        let fragment = "<p>chat chat</p>";
        let tagger = StubTagger::new(&[("chat", "NOM", "chat"), ("chat", "NOM", "chat")]);
        let wrapped = wrap_words(fragment, &tagger, &set(&["chat"]), &HashSet::new()).unwrap();

        assert_eq!(
            wrapped,
            "<p><span class=\"word\">chat</span> <span class=\"word\">chat</span></p>"
        );
    }

    #[test]
    fn floor_advances_past_rejected_tokens() {
        // "la" occurs twice and is never a target; the second "la" must not
        // be re-found when locating "chat".
        let fragment = "<p>la la chat</p>";
        let tagger = StubTagger::new(&[
            ("la", "DET", "la"),
            ("la", "DET", "la"),
            ("chat", "NOM", "chat"),
        ]);
        let wrapped = wrap_words(fragment, &tagger, &set(&["chat"]), &HashSet::new()).unwrap();

        assert_eq!(wrapped, "<p>la la <span class=\"word\">chat</span></p>");
    }

    #[test]
    fn unlocatable_tokens_are_dropped() {
        let fragment = "<p>Le chat</p>";
        let tagger = StubTagger::new(&[
            ("absent", "NOM", "absent"),
            ("chat", "NOM", "chat"),
        ]);
        let wrapped = wrap_words(fragment, &tagger, &set(&["chat"]), &HashSet::new()).unwrap();

        assert_eq!(wrapped, "<p>Le <span class=\"word\">chat</span></p>");
    }

    #[test]
    fn wrapped_output_preserves_all_text() {
        let fragment = "<p class=\"d_xpl\">Le <b>chat</b> noir dort.</p>";
        let tagger = StubTagger::new(&[
            ("Le", "DET", "le"),
            ("chat", "NOM", "chat"),
            ("noir", "ADJ", "noir"),
            ("dort", "VER", "dormir"),
        ]);
        let wrapped = wrap_words(
            fragment,
            &tagger,
            &set(&["le", "chat", "noir", "dort"]),
            &HashSet::new(),
        )
        .unwrap();

        // Stripping the inserted spans must reconstruct the input exactly:
        // no characters added, dropped, or reordered.
        let stripped = wrapped
            .replace("<span class=\"word\">", "")
            .replace("</span>", "");
        assert_eq!(stripped, fragment);
    }

    #[test]
    fn accented_text_aligns_on_byte_offsets() {
        let fragment = "<p>Elle a été <b>félicitée</b>.</p>";
        let tagger = StubTagger::new(&[
            ("Elle", "PRO", "elle"),
            ("a", "VER", "avoir"),
            ("été", "VER", "être"),
            ("félicitée", "VER", "féliciter"),
        ]);
        let wrapped =
            wrap_words(fragment, &tagger, &HashSet::new(), &set(&["féliciter"])).unwrap();

        assert_eq!(
            wrapped,
            "<p>Elle a été <b><span class=\"word\">félicitée</span></b>.</p>"
        );
    }
}
