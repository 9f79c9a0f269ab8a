use burn::tensor::{backend::Backend, Int, Tensor};
use derive_new::new;

/// Token classification output for a training or evaluation batch
#[derive(new)]
pub struct Output<B: Backend> {
    /// The loss, ignoring `X` and `[PAD]` targets
    pub loss: Tensor<B, 1>,

    /// Unnormalized label scores: [batch_size, seq_length, n_labels]
    pub logits: Tensor<B, 3>,

    /// The target label ids: [batch_size, seq_length]
    pub targets: Tensor<B, 2, Int>,
}
