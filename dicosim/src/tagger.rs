//! Subprocess adapter for the external word tagger.

use std::io::Write;
use std::process::{Command, Stdio};

use lerobert::align::{TagToken, Tagger};
use tracing::warn;

use crate::config::TaggerConfig;

/// Drives a TreeTagger-style command: the text goes to stdin, and every
/// token comes back as one `word<TAB>pos<TAB>lemma` line on stdout.
#[derive(Debug, Clone)]
pub struct TreeTagger {
    command: String,
    args: Vec<String>,
}

impl TreeTagger {
    /// Creates an adapter for the configured command.
    #[must_use]
    pub fn new(config: &TaggerConfig) -> TreeTagger {
        TreeTagger {
            command: config.command.clone(),
            args: config.args.clone(),
        }
    }
}

impl Tagger for TreeTagger {
    fn tag(&self, text: &str) -> Result<Vec<TagToken>, lerobert::Error> {
        let mut child = Command::new(&self.command)
            .args(&self.args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .spawn()
            .map_err(boxed)?;

        if let Some(mut stdin) = child.stdin.take() {
            stdin.write_all(text.as_bytes()).map_err(boxed)?;
        }
        let output = child.wait_with_output().map_err(boxed)?;
        if !output.status.success() {
            return Err(boxed(std::io::Error::other(format!(
                "tagger exited with {status}",
                status = output.status
            ))));
        }

        let stdout = String::from_utf8_lossy(&output.stdout);
        let mut tokens = Vec::new();
        for line in stdout.lines() {
            let mut fields = line.split('\t');
            match (fields.next(), fields.next(), fields.next()) {
                (Some(word), Some(pos), Some(lemma)) if !word.is_empty() => {
                    tokens.push(TagToken {
                        word: word.to_string(),
                        pos: pos.to_string(),
                        lemma: lemma.to_string(),
                    });
                }
                _ => warn!(?line, "skipping malformed tagger line"),
            }
        }

        Ok(tokens)
    }
}

fn boxed(err: std::io::Error) -> lerobert::Error {
    lerobert::Error::Tagger(Box::new(err))
}
