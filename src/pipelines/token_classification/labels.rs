use std::{
    collections::{BTreeMap, HashMap},
    path::Path,
};

use serde::{Deserialize, Serialize};

use crate::utils::{classes::invert_map, files::read_file};

/// The label given to word pieces that continue a word
pub static CONTINUATION_LABEL: &str = "X";

/// The label given to special tokens and padding
pub static PAD_LABEL: &str = "[PAD]";

/// The ordered set of entity tags for a token classification task. The two sentinel labels are
/// always the last two entries, in the order `X`, `[PAD]`, and the position of each label is its
/// numeric id.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "Vec<String>", into = "Vec<String>")]
pub struct LabelSet {
    labels: Vec<String>,
    label2id: HashMap<String, usize>,
}

impl LabelSet {
    /// Build a label set from task labels, appending the sentinel labels
    pub fn new<S: Into<String>>(labels: impl IntoIterator<Item = S>) -> Result<Self, LabelError> {
        let mut labels: Vec<String> = labels.into_iter().map(Into::into).collect();

        if labels.is_empty() {
            return Err(LabelError::Empty);
        }

        labels.push(CONTINUATION_LABEL.to_string());
        labels.push(PAD_LABEL.to_string());

        Self::from_full_list(labels)
    }

    /// Restore a label set from a list that already ends with the sentinel labels
    pub fn from_full_list(labels: Vec<String>) -> Result<Self, LabelError> {
        let n_labels = labels.len();

        if n_labels < 3 {
            return Err(LabelError::Empty);
        }

        if labels[n_labels - 2] != CONTINUATION_LABEL || labels[n_labels - 1] != PAD_LABEL {
            return Err(LabelError::MissingSentinels);
        }

        let mut label2id = HashMap::with_capacity(n_labels);

        for (id, label) in labels.iter().enumerate() {
            if label.is_empty() {
                return Err(LabelError::Blank(id));
            }

            if label2id.insert(label.clone(), id).is_some() {
                return Err(LabelError::Duplicate(label.clone()));
            }
        }

        Ok(Self { labels, label2id })
    }

    /// Parse the lines of a label file, one label per line. Blank lines are ignored.
    pub fn from_lines<S: AsRef<str>>(lines: impl IntoIterator<Item = S>) -> Result<Self, LabelError> {
        let labels: Vec<String> = lines
            .into_iter()
            .map(|line| line.as_ref().trim().to_string())
            .filter(|line| !line.is_empty())
            .collect();

        Self::new(labels)
    }

    /// Load a label file from disk
    pub async fn from_file(path: impl AsRef<Path>) -> Result<Self, LabelError> {
        let path = path.as_ref();

        let lines = read_file(path).await.map_err(|source| LabelError::Io {
            path: path.display().to_string(),
            source,
        })?;

        Self::from_lines(lines)
    }

    /// The number of labels, sentinels included
    pub fn len(&self) -> usize {
        self.labels.len()
    }

    /// A label set is never empty once constructed
    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }

    /// The numeric id for a label
    pub fn id(&self, label: &str) -> Option<usize> {
        self.label2id.get(label).copied()
    }

    /// The label for a numeric id
    pub fn label(&self, id: usize) -> Option<&str> {
        self.labels.get(id).map(String::as_str)
    }

    /// The id of the `[PAD]` label
    pub fn pad_id(&self) -> usize {
        self.labels.len() - 1
    }

    /// The id of the `X` label
    pub fn continuation_id(&self) -> usize {
        self.labels.len() - 2
    }

    /// True for the ids that never carry a word-level tag
    pub fn is_sentinel(&self, id: usize) -> bool {
        id == self.pad_id() || id == self.continuation_id()
    }

    /// The labels read from the label file, without the sentinels
    pub fn task_labels(&self) -> &[String] {
        &self.labels[..self.labels.len() - 2]
    }

    /// The labels in id order
    pub fn as_slice(&self) -> &[String] {
        &self.labels
    }

    /// A mapping from label ids to label names
    pub fn id2label(&self) -> BTreeMap<usize, String> {
        invert_map(self.label2id.clone())
    }
}

impl TryFrom<Vec<String>> for LabelSet {
    type Error = LabelError;

    fn try_from(labels: Vec<String>) -> Result<Self, Self::Error> {
        Self::from_full_list(labels)
    }
}

impl From<LabelSet> for Vec<String> {
    fn from(labels: LabelSet) -> Self {
        labels.labels
    }
}

/// Label Error
#[derive(thiserror::Error, Debug)]
pub enum LabelError {
    /// The label file could not be read
    #[error("unable to read label file {path}: {source}")]
    Io {
        /// The label file path
        path: String,

        /// The underlying I/O error
        source: std::io::Error,
    },

    /// No task labels were provided
    #[error("no labels defined")]
    Empty,

    /// A label appears more than once
    #[error("duplicate label {0}")]
    Duplicate(String),

    /// A label is blank
    #[error("blank label at position {0}")]
    Blank(usize),

    /// A stored label list does not end with the sentinel labels
    #[error("label list must end with \"X\" and \"[PAD]\"")]
    MissingSentinels,
}
