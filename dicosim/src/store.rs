//! Persisted artifacts: the word index, per-model embedding stacks, and the
//! cached page listings.

use std::collections::BTreeSet;
use std::fs;
use std::path::{Path, PathBuf};

use lerobert::index::WordIndex;

use crate::Error;

/// Loads the word index JSON.
///
/// # Errors
///
/// Returns [`Error::Io`] or [`Error::Json`] when the file cannot be read or
/// parsed.
pub fn load_word_index(path: &Path) -> Result<WordIndex, Error> {
    let content = fs::read_to_string(path).map_err(|source| Error::Io {
        path: path.to_path_buf(),
        source,
    })?;

    serde_json::from_str(&content).map_err(|source| Error::Json {
        path: path.to_path_buf(),
        source,
    })
}

/// Writes the word index JSON, creating parent directories as needed.
///
/// # Errors
///
/// Returns [`Error::Io`] or [`Error::Json`] on failure.
pub fn save_word_index(path: &Path, index: &WordIndex) -> Result<(), Error> {
    create_parent(path)?;
    let content = serde_json::to_string(index).map_err(|source| Error::Json {
        path: path.to_path_buf(),
        source,
    })?;

    fs::write(path, content).map_err(|source| Error::Io {
        path: path.to_path_buf(),
        source,
    })
}

/// Path of the embedding stack for a `(model, document)` pair.
#[must_use]
pub fn embedding_path(root: &Path, model: &str, document_id: &str) -> PathBuf {
    root.join(model).join(format!("{document_id}.json"))
}

/// Loads the embedding stack for a `(model, document)` pair.
///
/// A missing file is `Ok(None)`: the document then contributes no
/// similarity results for that model.
///
/// # Errors
///
/// Returns [`Error::Io`] or [`Error::Json`] when an existing file cannot be
/// read or parsed.
pub fn load_embeddings(
    root: &Path,
    model: &str,
    document_id: &str,
) -> Result<Option<Vec<Vec<f32>>>, Error> {
    let path = embedding_path(root, model, document_id);
    if !path.exists() {
        return Ok(None);
    }

    let content = fs::read_to_string(&path).map_err(|source| Error::Io {
        path: path.clone(),
        source,
    })?;
    let vectors = serde_json::from_str(&content).map_err(|source| Error::Json {
        path,
        source,
    })?;

    Ok(Some(vectors))
}

/// Writes the embedding stack for a `(model, document)` pair.
///
/// # Errors
///
/// Returns [`Error::Io`] or [`Error::Json`] on failure.
pub fn save_embeddings(
    root: &Path,
    model: &str,
    document_id: &str,
    vectors: &[Vec<f32>],
) -> Result<(), Error> {
    let path = embedding_path(root, model, document_id);
    create_parent(&path)?;
    let content = serde_json::to_string(vectors).map_err(|source| Error::Json {
        path: path.clone(),
        source,
    })?;

    fs::write(&path, content).map_err(|source| Error::Io { path, source })
}

/// Lists the stems of the `.html` files in a cache directory.
///
/// # Errors
///
/// Returns [`Error::Io`] when the directory cannot be read.
pub fn list_html_files(dir: &Path) -> Result<BTreeSet<String>, Error> {
    let entries = fs::read_dir(dir).map_err(|source| Error::Io {
        path: dir.to_path_buf(),
        source,
    })?;

    let mut stems = BTreeSet::new();
    for entry in entries {
        let entry = entry.map_err(|source| Error::Io {
            path: dir.to_path_buf(),
            source,
        })?;
        let path = entry.path();
        if path.extension().is_some_and(|ext| ext == "html")
            && let Some(stem) = path.file_stem().and_then(|stem| stem.to_str())
        {
            stems.insert(stem.to_string());
        }
    }

    Ok(stems)
}

/// Path of a cached page.
#[must_use]
pub fn html_path(dir: &Path, stem: &str) -> PathBuf {
    dir.join(format!("{stem}.html"))
}

/// Reads a cached page.
///
/// # Errors
///
/// Returns [`Error::Io`] when the file cannot be read.
pub fn read_html_file(dir: &Path, stem: &str) -> Result<String, Error> {
    let path = html_path(dir, stem);

    fs::read_to_string(&path).map_err(|source| Error::Io { path, source })
}

/// Writes a cached page, creating the directory as needed.
///
/// # Errors
///
/// Returns [`Error::Io`] when the file cannot be written.
pub fn write_html_file(dir: &Path, stem: &str, content: &str) -> Result<(), Error> {
    fs::create_dir_all(dir).map_err(|source| Error::Io {
        path: dir.to_path_buf(),
        source,
    })?;
    let path = html_path(dir, stem);

    fs::write(&path, content).map_err(|source| Error::Io { path, source })
}

fn create_parent(path: &Path) -> Result<(), Error> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).map_err(|source| Error::Io {
            path: parent.to_path_buf(),
            source,
        })?;
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn word_index_round_trips() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("word_map.json");

        let mut index = WordIndex::new();
        index.merge(
            "chat",
            [("chat".to_string(), vec![(0, 0, 2)])].into_iter().collect(),
        );
        save_word_index(&path, &index).expect("save");

        assert_eq!(load_word_index(&path).expect("load"), index);
    }

    #[test]
    fn missing_embeddings_are_not_an_error() {
        let dir = tempfile::tempdir().expect("tempdir");

        let loaded = load_embeddings(dir.path(), "model", "chat").expect("load");
        assert!(loaded.is_none());
    }

    #[test]
    fn embeddings_round_trip_per_model() {
        let dir = tempfile::tempdir().expect("tempdir");
        let vectors = vec![vec![0.25, -1.0], vec![0.5, 2.0]];

        save_embeddings(dir.path(), "org/model", "chat", &vectors).expect("save");
        let loaded = load_embeddings(dir.path(), "org/model", "chat").expect("load");

        assert_eq!(loaded, Some(vectors));
    }

    #[test]
    fn lists_html_stems_only() {
        let dir = tempfile::tempdir().expect("tempdir");
        fs::write(dir.path().join("chat.html"), "x").expect("write");
        fs::write(dir.path().join("chien.html"), "x").expect("write");
        fs::write(dir.path().join("notes.txt"), "x").expect("write");

        let stems = list_html_files(dir.path()).expect("list");
        assert_eq!(
            stems.into_iter().collect::<Vec<_>>(),
            vec!["chat".to_string(), "chien".to_string()]
        );
    }
}
