use std::path::Path;

use async_trait::async_trait;

/// CoNLL-style token classification corpora (GermEval 2014, CoNLL 2003)
pub mod conll;

/// A dataset which can be loaded from a delimited file
#[async_trait]
pub trait LoadableDataset<I>: burn::data::dataset::Dataset<I> {
    /// Load the dataset
    async fn load(path: &Path, delimiter: &str) -> Result<Self, DatasetError>
    where
        Self: std::marker::Sized;
}

/// Dataset Error
#[derive(thiserror::Error, Debug)]
pub enum DatasetError {
    /// The dataset file could not be read
    #[error("unable to read {path}: {source}")]
    Io {
        /// The dataset file path
        path: String,

        /// The underlying I/O error
        source: std::io::Error,
    },

    /// A line could not be split into a token and a tag
    #[error("malformed line {line} in {path}: {content:?}")]
    Malformed {
        /// The dataset file path
        path: String,

        /// The 1-based line number
        line: usize,

        /// The offending line
        content: String,
    },
}
