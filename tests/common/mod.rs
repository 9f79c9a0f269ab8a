#![allow(dead_code)]

use std::{path::Path, str::FromStr};

use burn_ner::pipelines::token_classification::{
    processor::{Processor, ProcessorConfig},
    LabelSet,
};
use tokenizers::Tokenizer;

/// A WordPiece tokenizer with BERT special tokens and a handful of German words
pub static TOKENIZER_JSON: &str = include_str!("../fixtures/tokenizer.json");

/// A Hugging Face style config for a BERT encoder small enough to run in tests
pub static TINY_BERT_CONFIG: &str = include_str!("../fixtures/bert_config.json");

pub fn tokenizer() -> anyhow::Result<Tokenizer> {
    Tokenizer::from_str(TOKENIZER_JSON).map_err(|e| anyhow::anyhow!("{}", e))
}

pub fn labels() -> anyhow::Result<LabelSet> {
    Ok(LabelSet::new(["O", "B-PER", "I-PER", "B-LOC", "I-LOC"])?)
}

pub fn processor(labels: LabelSet) -> anyhow::Result<Processor> {
    Ok(Processor::new(
        tokenizer()?,
        ProcessorConfig::new("tiny-bert".to_string(), labels),
    ))
}

pub fn write_bert_config(dir: &Path) -> anyhow::Result<std::path::PathBuf> {
    let path = dir.join("bert_config.json");
    std::fs::write(&path, TINY_BERT_CONFIG)?;

    Ok(path)
}
