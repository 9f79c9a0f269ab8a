use burn::{
    module::Module,
    nn::{Dropout, DropoutConfig, Linear, LinearConfig},
    tensor::{backend::Backend, Tensor},
};

/// Configuration for a token classification head
#[derive(burn::config::Config)]
pub struct HeadConfig {
    /// Size of the encoder hidden states
    pub hidden_size: usize,

    /// Number of labels to score, sentinels included
    pub n_classes: usize,

    /// Dropout applied to the hidden states before the projection
    #[config(default = 0.1)]
    pub dropout: f64,
}

impl HeadConfig {
    /// Initialize a head with fresh weights
    pub fn init<B: Backend>(&self, device: &B::Device) -> TokenClassificationHead<B> {
        TokenClassificationHead {
            dropout: DropoutConfig::new(self.dropout).init(),
            output: LinearConfig::new(self.hidden_size, self.n_classes).init(device),
        }
    }
}

/// Maps every encoder hidden state to one score per label
#[derive(Module, Debug)]
pub struct TokenClassificationHead<B: Backend> {
    dropout: Dropout,
    output: Linear<B>,
}

impl<B: Backend> TokenClassificationHead<B> {
    /// Label scores for hidden states of shape [batch_size, seq_length, hidden_size]
    pub fn forward(&self, hidden_states: Tensor<B, 3>) -> Tensor<B, 3> {
        let hidden_states = self.dropout.forward(hidden_states);

        self.output.forward(hidden_states)
    }

    /// The number of labels this head scores, read from the projection weights of shape
    /// [hidden_size, n_classes]
    pub fn n_classes(&self) -> usize {
        self.output.weight.val().dims()[1]
    }
}

#[cfg(test)]
mod tests {
    use burn::backend::NdArray;
    use pretty_assertions::assert_eq;

    use crate::testing;

    use super::*;

    #[test]
    fn test_output_matches_label_count() {
        let device = Default::default();
        let labels = testing::labels();

        let head = HeadConfig::new(8, labels.len()).init::<NdArray>(&device);
        let scores = head.forward(Tensor::zeros([2, 5, 8], &device));

        assert_eq!(head.n_classes(), 7);
        assert_eq!(scores.dims(), [2, 5, 7]);
    }

    #[test]
    fn test_rederived_head_follows_labels() -> anyhow::Result<()> {
        let device = Default::default();
        let labels = crate::pipelines::token_classification::labels::LabelSet::new(["O", "B-MISC"])?;

        let head = HeadConfig::new(8, labels.len()).init::<NdArray>(&device);
        let scores = head.forward(Tensor::zeros([1, 3, 8], &device));

        assert_eq!(scores.dims(), [1, 3, labels.len()]);

        Ok(())
    }

    #[test]
    fn test_width_follows_loaded_weights() {
        let device = Default::default();

        let wide = HeadConfig::new(8, 7).init::<NdArray>(&device);
        let narrow = HeadConfig::new(8, 5).init::<NdArray>(&device);

        let loaded = narrow.load_record(wide.into_record());

        assert_eq!(loaded.n_classes(), 7);
    }
}
