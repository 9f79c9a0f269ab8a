use std::path::{Path, PathBuf};

use burn::{
    module::Module,
    tensor::{backend::Backend, Tensor},
};

use super::{
    batcher::{Infer, Train},
    labels::LabelSet,
    output::Output,
};

/// A trait for models that can be used for Token Classification
pub trait Model<B: Backend>: Module<B> {
    /// The model configuration
    type Config: ModelConfig;

    /// Initialize a model with fresh weights
    fn init(config: &Self::Config, device: &B::Device) -> Self;

    /// Load pretrained encoder weights and attach a freshly initialized prediction head
    fn load_from_safetensors(
        device: &B::Device,
        model_file: PathBuf,
        config: &Self::Config,
    ) -> anyhow::Result<Self>;

    /// Perform a forward pass and compute the loss against the batch targets
    fn forward(&self, item: Train<B>) -> Output<B>;

    /// Label probabilities for every token: [batch_size, seq_length, n_labels]
    fn infer(&self, input: Infer<B>) -> Tensor<B, 3>;

    /// The number of labels the prediction head scores, taken from its weights
    fn n_classes(&self) -> usize;
}

/// A trait for configs that can be used for Token Classification models
pub trait ModelConfig: burn::config::Config + Clone {
    /// Load a pretrained model configuration and size the prediction head for a label set
    fn load_pretrained(config_file: &Path, labels: LabelSet) -> anyhow::Result<Self>;

    /// The label set the prediction head was sized for
    fn labels(&self) -> &LabelSet;

    /// The number of output classes of the prediction head
    fn n_classes(&self) -> usize {
        self.labels().len()
    }
}
