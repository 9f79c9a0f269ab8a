use std::path::Path;

use async_trait::async_trait;
use burn::data::dataset::{self, InMemDataset};
use derive_new::new;
use serde::{Deserialize, Serialize};

use crate::utils::files::read_file;

use super::{DatasetError, LoadableDataset};

/// Document separator lines emitted by CoNLL-style corpora
static DOCSTART: &str = "-DOCSTART";

/// A sentence with one tag per word
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, new)]
pub struct Sentence {
    /// The words of the sentence
    pub words: Vec<String>,

    /// The word-level tags
    pub labels: Vec<String>,
}

/// A CoNLL-style token classification corpus: one token per line, the token in the first field
/// and its tag in the last field, with blank lines between sentences
pub struct Dataset {
    /// Underlying In-Memory dataset
    dataset: InMemDataset<Sentence>,
}

impl dataset::Dataset<Sentence> for Dataset {
    fn get(&self, index: usize) -> Option<Sentence> {
        self.dataset.get(index)
    }

    fn len(&self) -> usize {
        self.dataset.len()
    }
}

impl Dataset {
    /// Wrap already-parsed sentences
    pub fn from_sentences(sentences: Vec<Sentence>) -> Self {
        Self {
            dataset: InMemDataset::new(sentences),
        }
    }
}

#[async_trait]
impl LoadableDataset<Sentence> for Dataset {
    async fn load(path: &Path, delimiter: &str) -> Result<Self, DatasetError> {
        let lines = read_file(path).await.map_err(|source| DatasetError::Io {
            path: path.display().to_string(),
            source,
        })?;

        let sentences = parse(lines.as_slice(), delimiter).map_err(|(line, content)| {
            DatasetError::Malformed {
                path: path.display().to_string(),
                line,
                content,
            }
        })?;

        debug!("Read {} sentences from {}", sentences.len(), path.display());

        Ok(Self::from_sentences(sentences))
    }
}

/// Parse the lines of a CoNLL-style file. On failure, returns the 1-based line number and the
/// offending line.
pub fn parse<S: AsRef<str>>(lines: &[S], delimiter: &str) -> Result<Vec<Sentence>, (usize, String)> {
    let mut sentences = Vec::new();
    let mut words = Vec::new();
    let mut labels = Vec::new();

    for (i, line) in lines.iter().enumerate() {
        let line = line.as_ref();

        if line.starts_with(DOCSTART) {
            continue;
        }

        if line.trim().is_empty() {
            if !words.is_empty() {
                sentences.push(Sentence::new(
                    std::mem::take(&mut words),
                    std::mem::take(&mut labels),
                ));
            }

            continue;
        }

        let fields: Vec<&str> = line.split(delimiter).collect();

        match (fields.first(), fields.last()) {
            (Some(word), Some(label)) if fields.len() > 1 && !word.is_empty() => {
                words.push(word.to_string());
                labels.push(label.trim().to_string());
            }
            _ => return Err((i + 1, line.to_string())),
        }
    }

    if !words.is_empty() {
        sentences.push(Sentence::new(words, labels));
    }

    Ok(sentences)
}
