//! Adapt BERT to the Token Classification pipeline

use std::path::Path;

use bert_burn::model::BertModelConfig;
use burn::{config::Config as _, tensor::backend::Backend};

use crate::{
    models::heads::{HeadConfig, TokenClassificationHead},
    pipelines::token_classification::{labels::LabelSet, ModelConfig},
};

use super::Model;

/// The Model Configuration
#[derive(burn::config::Config)]
pub struct Config {
    /// The pretrained encoder configuration
    pub model: BertModelConfig,

    /// The labels scored by the prediction head, sentinels included
    pub labels: LabelSet,

    /// Dropout applied before the prediction head
    #[config(default = 0.1)]
    pub head_dropout: f64,
}

impl Config {
    /// The prediction head configuration
    pub fn head(&self) -> HeadConfig {
        HeadConfig::new(self.model.hidden_size, self.labels.len()).with_dropout(self.head_dropout)
    }

    /// Initialize the model
    pub fn init<B: Backend>(&self, device: &B::Device) -> Model<B> {
        let head: TokenClassificationHead<B> = self.head().init(device);

        Model {
            model: self.model.init(device),
            head,
            continuation_label_id: self.labels.continuation_id(),
            pad_label_id: self.labels.pad_id(),
        }
    }
}

impl ModelConfig for Config {
    fn load_pretrained(config_file: &Path, labels: LabelSet) -> anyhow::Result<Self> {
        let bert_config = BertModelConfig::load(config_file)
            .map_err(|e| anyhow!("Unable to load Hugging Face Config file: {}", e))?;

        let head_dropout = bert_config.hidden_dropout_prob;

        Ok(Config::new(bert_config, labels).with_head_dropout(head_dropout))
    }

    fn labels(&self) -> &LabelSet {
        &self.labels
    }
}
