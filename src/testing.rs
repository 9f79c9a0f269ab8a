//! Shared fixtures for unit tests

use std::str::FromStr;

use tokenizers::Tokenizer;

use crate::pipelines::token_classification::{
    labels::LabelSet,
    processor::{Processor, ProcessorConfig},
};

/// A tiny WordPiece tokenizer with BERT-style special tokens
pub static TOKENIZER_JSON: &str = include_str!("../tests/fixtures/tokenizer.json");

/// The test tokenizer
pub fn tokenizer() -> Tokenizer {
    Tokenizer::from_str(TOKENIZER_JSON).expect("valid tokenizer definition")
}

/// A small GermEval-style label set
pub fn labels() -> LabelSet {
    LabelSet::new(["O", "B-PER", "I-PER", "B-LOC", "I-LOC"]).expect("valid labels")
}

/// A processor over the test tokenizer and labels
pub fn processor(max_seq_len: usize) -> Processor {
    Processor::new(
        tokenizer(),
        ProcessorConfig::new("test-model".to_string(), labels()).with_max_seq_len(max_seq_len),
    )
}
