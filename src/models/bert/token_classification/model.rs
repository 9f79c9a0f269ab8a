use std::path::PathBuf;

use bert_burn::{
    data::BertInferenceBatch,
    model::{BertModel, BertModelOutput},
};
use burn::{
    module::Module,
    nn::loss::CrossEntropyLossConfig,
    tensor::{activation::softmax, backend::Backend, Int, Tensor},
};

use crate::{
    models::heads::TokenClassificationHead,
    pipelines::token_classification::{self, batcher, ModelConfig as _, Output},
};

use super::Config;

/// BERT for Token Classification
#[derive(Module, Debug)]
pub struct Model<B: Backend> {
    /// The base BERT model
    pub model: BertModel<B>,

    /// Per-token prediction head
    pub head: TokenClassificationHead<B>,

    /// Target id of word-piece continuations, ignored by the loss
    pub continuation_label_id: usize,

    /// Target id of special tokens and padding, ignored by the loss
    pub pad_label_id: usize,
}

/// Define model behavior
impl<B: Backend> Model<B> {
    /// Unnormalized label scores: [batch_size, seq_length, n_classes]
    pub fn logits(&self, input: BertInferenceBatch<B>) -> Tensor<B, 3> {
        let [batch_size, seq_length] = input.tokens.dims();

        let BertModelOutput { hidden_states, .. } = self.model.forward(input);

        self.head
            .forward(hidden_states)
            .slice([0..batch_size, 0..seq_length])
            .reshape([batch_size, seq_length, self.head.n_classes()])
    }

    /// Defines forward pass for training
    pub fn forward(&self, input: BertInferenceBatch<B>, targets: Tensor<B, 2, Int>) -> Output<B> {
        let [batch_size, seq_length] = input.tokens.dims();

        let logits = self.logits(input);
        let device = logits.device();

        let targets = targets.to_device(&device);

        let loss = CrossEntropyLossConfig::new()
            .with_pad_tokens(Some(vec![self.continuation_label_id, self.pad_label_id]))
            .init(&device)
            .forward(
                logits
                    .clone()
                    .reshape([batch_size * seq_length, self.head.n_classes()]),
                targets.clone().reshape([batch_size * seq_length]),
            );

        Output {
            loss,
            logits,
            targets,
        }
    }

    /// Defines forward pass for inference
    pub fn infer(&self, input: BertInferenceBatch<B>) -> Tensor<B, 3> {
        softmax(self.logits(input), 2)
    }
}

impl<B: Backend> token_classification::Model<B> for Model<B> {
    /// The model configuration
    type Config = Config;

    fn init(config: &Self::Config, device: &B::Device) -> Self {
        config.init(device)
    }

    /// Load a model from a file
    fn load_from_safetensors(
        device: &B::Device,
        model_file: PathBuf,
        config: &Self::Config,
    ) -> anyhow::Result<Self> {
        if config.n_classes() < 3 {
            return Err(anyhow!(
                "The model configuration defines no task labels"
            ));
        }

        let record = BertModel::from_safetensors(model_file, device, config.model.clone());

        let mut model = config.init(device);
        model.model = model.model.load_record(record);

        Ok(model)
    }

    /// Perform a forward pass
    fn forward(&self, item: batcher::Train<B>) -> Output<B> {
        self.forward(
            BertInferenceBatch {
                tokens: item.input.tokens,
                mask_pad: item.input.mask_pad,
            },
            item.targets,
        )
    }

    /// Defines forward pass for inference
    fn infer(&self, input: batcher::Infer<B>) -> Tensor<B, 3> {
        self.infer(BertInferenceBatch {
            tokens: input.tokens,
            mask_pad: input.mask_pad,
        })
    }

    fn n_classes(&self) -> usize {
        self.head.n_classes()
    }
}
