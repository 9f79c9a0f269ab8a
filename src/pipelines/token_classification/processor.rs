use std::{fs, path::Path};

use burn::config::Config as _;
use derive_new::new;
use serde::{Deserialize, Serialize};
use tokenizers::Tokenizer;

use crate::datasets::conll::Sentence;

use super::labels::LabelSet;

/// The processor config file name inside a saved bundle
pub static PROCESSOR_CONFIG_FILE: &str = "processor_config.json";

/// The tokenizer file name inside a saved bundle
pub static TOKENIZER_FILE: &str = "tokenizer.json";

/// Settings that control how raw text becomes model input
#[derive(burn::config::Config)]
pub struct ProcessorConfig {
    /// Model name the tokenizer belongs to (e.g., "bert-base-multilingual-cased")
    pub model_name: String,

    /// The ordered label set, sentinels included
    pub labels: LabelSet,

    /// Maximum number of tokens per sequence, special tokens included
    #[config(default = 128)]
    pub max_seq_len: usize,

    /// The field delimiter of the CoNLL-style data files
    #[config(default = "\" \".to_string()")]
    pub delimiter: String,

    /// Lower-case words before encoding them
    #[config(default = false)]
    pub do_lower_case: bool,
}

/// A training example converted to token ids with one label id per token
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, new)]
pub struct Feature {
    /// Token ids, special tokens included
    pub token_ids: Vec<usize>,

    /// Label ids aligned with `token_ids`
    pub label_ids: Vec<usize>,
}

/// A whitespace-separated word in a raw text, with byte offsets into the text
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, new)]
pub struct Word {
    /// The word
    pub text: String,

    /// Byte offset of the first character
    pub start: usize,

    /// Byte offset just past the last character
    pub end: usize,
}

/// A raw text prepared for inference
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct EncodedText {
    /// Token ids, special tokens included
    pub token_ids: Vec<usize>,

    /// The words of the text
    pub words: Vec<Word>,

    /// The position of the first token of each word, or `None` when truncation dropped the word
    pub first_tokens: Vec<Option<usize>>,
}

/// Token ids with the index of the word each token came from
#[derive(Clone, Debug, PartialEq, Eq)]
struct Encoded {
    ids: Vec<usize>,
    word_ids: Vec<Option<usize>>,
    ends_with_special: bool,
}

impl Encoded {
    /// Keep at most `max_len` tokens, holding on to a trailing special token
    fn truncate(&mut self, max_len: usize) {
        if self.ids.len() <= max_len {
            return;
        }

        match (self.ends_with_special, self.ids.pop(), self.word_ids.pop()) {
            (true, Some(last_id), Some(last_word)) if max_len > 0 => {
                self.ids.truncate(max_len - 1);
                self.word_ids.truncate(max_len - 1);
                self.ids.push(last_id);
                self.word_ids.push(last_word);
            }
            _ => {
                self.ids.truncate(max_len);
                self.word_ids.truncate(max_len);
            }
        }
    }
}

/// Converts sentences and raw texts into model input for token classification
#[derive(Clone)]
pub struct Processor {
    tokenizer: Tokenizer,
    config: ProcessorConfig,
}

impl Processor {
    /// Create a processor from a tokenizer and its settings
    pub fn new(tokenizer: Tokenizer, config: ProcessorConfig) -> Self {
        Self { tokenizer, config }
    }

    /// The processor settings
    pub fn config(&self) -> &ProcessorConfig {
        &self.config
    }

    /// The label set used to produce target ids
    pub fn labels(&self) -> &LabelSet {
        &self.config.labels
    }

    /// The maximum sequence length, special tokens included
    pub fn max_seq_len(&self) -> usize {
        self.config.max_seq_len
    }

    /// The tokenizer's padding token id
    pub fn pad_token_id(&self) -> usize {
        self.tokenizer
            .token_to_id("[PAD]")
            .map(|id| id as usize)
            .unwrap_or(0)
    }

    /// Convert a tagged sentence into a training feature. The first word piece of each word
    /// carries the word's tag, the remaining pieces carry `X` and special tokens carry `[PAD]`.
    pub fn featurize(&self, sentence: &Sentence) -> Result<Feature, ProcessorError> {
        if sentence.words.len() != sentence.labels.len() {
            return Err(ProcessorError::Misaligned {
                words: sentence.words.len(),
                labels: sentence.labels.len(),
            });
        }

        let labels = self.labels();

        let word_label_ids = sentence
            .labels
            .iter()
            .map(|label| {
                labels
                    .id(label)
                    .ok_or_else(|| ProcessorError::UnknownLabel(label.clone()))
            })
            .collect::<Result<Vec<_>, _>>()?;

        let encoded = self.encode_words(&sentence.words)?;

        let mut label_ids = Vec::with_capacity(encoded.ids.len());
        let mut previous = None;

        for word_id in &encoded.word_ids {
            let label_id = match word_id {
                None => labels.pad_id(),
                Some(_) if *word_id == previous => labels.continuation_id(),
                Some(word) => word_label_ids
                    .get(*word)
                    .copied()
                    .unwrap_or(labels.pad_id()),
            };

            label_ids.push(label_id);
            previous = *word_id;
        }

        Ok(Feature::new(encoded.ids, label_ids))
    }

    /// Split a raw text into words and encode it for inference
    pub fn encode_text(&self, text: &str) -> Result<EncodedText, ProcessorError> {
        let words = split_words(text);

        if words.is_empty() {
            return Ok(EncodedText {
                token_ids: Vec::new(),
                words,
                first_tokens: Vec::new(),
            });
        }

        let texts: Vec<String> = words.iter().map(|word| word.text.clone()).collect();
        let encoded = self.encode_words(&texts)?;

        let mut first_tokens = vec![None; words.len()];
        for (position, word_id) in encoded.word_ids.iter().enumerate() {
            if let Some(slot) = word_id.and_then(|word| first_tokens.get_mut(word)) {
                slot.get_or_insert(position);
            }
        }

        Ok(EncodedText {
            token_ids: encoded.ids,
            words,
            first_tokens,
        })
    }

    fn encode_words(&self, words: &[String]) -> Result<Encoded, ProcessorError> {
        let words: Vec<String> = if self.config.do_lower_case {
            words.iter().map(|word| word.to_lowercase()).collect()
        } else {
            words.to_vec()
        };

        let input: Vec<&str> = words.iter().map(String::as_str).collect();

        let encoding = self
            .tokenizer
            .encode(input, true)
            .map_err(|e| ProcessorError::Tokenizer(e.to_string()))?;

        let mut encoded = Encoded {
            ids: encoding.get_ids().iter().map(|id| *id as usize).collect(),
            word_ids: encoding
                .get_word_ids()
                .iter()
                .map(|word| word.map(|w| w as usize))
                .collect(),
            ends_with_special: encoding.get_special_tokens_mask().last() == Some(&1),
        };

        encoded.truncate(self.config.max_seq_len);

        Ok(encoded)
    }

    /// Save the processor settings and tokenizer into a bundle directory
    pub fn save(&self, dir: impl AsRef<Path>) -> Result<(), ProcessorError> {
        let dir = dir.as_ref();
        fs::create_dir_all(dir)?;

        self.config.save(dir.join(PROCESSOR_CONFIG_FILE))?;

        self.tokenizer
            .save(dir.join(TOKENIZER_FILE), false)
            .map_err(|e| ProcessorError::Tokenizer(e.to_string()))?;

        Ok(())
    }

    /// Load a processor from a bundle directory
    pub fn load(dir: impl AsRef<Path>) -> Result<Self, ProcessorError> {
        let dir = dir.as_ref();

        let config = ProcessorConfig::load(dir.join(PROCESSOR_CONFIG_FILE))
            .map_err(|e| ProcessorError::Config(e.to_string()))?;

        let tokenizer = Tokenizer::from_file(dir.join(TOKENIZER_FILE))
            .map_err(|e| ProcessorError::Tokenizer(e.to_string()))?;

        Ok(Self::new(tokenizer, config))
    }
}

/// Split a text on whitespace, keeping byte offsets
pub fn split_words(text: &str) -> Vec<Word> {
    let mut words = Vec::new();
    let mut start = None;

    for (i, c) in text.char_indices() {
        if c.is_whitespace() {
            if let Some(s) = start.take() {
                words.push(Word::new(text[s..i].to_string(), s, i));
            }
        } else if start.is_none() {
            start = Some(i);
        }
    }

    if let Some(s) = start {
        words.push(Word::new(text[s..].to_string(), s, text.len()));
    }

    words
}

/// Processor Error
#[derive(thiserror::Error, Debug)]
pub enum ProcessorError {
    /// The tokenizer failed to encode, load or save
    #[error("tokenizer error: {0}")]
    Tokenizer(String),

    /// A tag in the data is not part of the label set
    #[error("unknown label {0}")]
    UnknownLabel(String),

    /// A sentence has a different number of words and tags
    #[error("sentence has {words} words but {labels} labels")]
    Misaligned {
        /// Number of words
        words: usize,

        /// Number of tags
        labels: usize,
    },

    /// The processor config could not be read
    #[error("unable to load processor config: {0}")]
    Config(String),

    /// Bundle I/O failed
    #[error(transparent)]
    Io(#[from] std::io::Error),
}
