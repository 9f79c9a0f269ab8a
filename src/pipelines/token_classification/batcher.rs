use std::fmt::Debug;

use burn::{
    data::dataloader,
    nn::attention::generate_padding_mask,
    tensor::{backend::Backend, Bool, Int, Tensor},
};
use derive_new::new;

use crate::utils::tensors;

use super::processor::Feature;

/// An inference batch for token classification
#[derive(Debug, Clone, new)]
pub struct Infer<B: Backend> {
    /// Tokenized text as 2D tensor: [batch_size, seq_length]
    pub tokens: Tensor<B, 2, Int>,

    /// Padding mask for the tokenized text containing booleans for padding locations
    pub mask_pad: Tensor<B, 2, Bool>,
}

/// A training batch for token classification
#[derive(Clone, Debug, new)]
pub struct Train<B: Backend> {
    /// Bert Model input
    pub input: Infer<B>,

    /// Label ids for every token position: [batch_size, seq_length]
    pub targets: Tensor<B, 2, Int>,
}

/// Struct for batching token classification features
#[derive(Clone, new)]
pub struct Batcher<B: Backend> {
    /// ID of the padding token
    pub pad_token_id: usize,

    /// ID of the padding label
    pub pad_label_id: usize,

    /// Maximum sequence length for tokenized text
    pub max_seq_length: usize,

    /// Device on which to perform computation (e.g., CPU or CUDA device)
    pub device: B::Device,
}

impl<B: Backend> Batcher<B> {
    fn infer(&self, token_ids_list: Vec<Vec<usize>>) -> Infer<B> {
        let padding = generate_padding_mask(
            self.pad_token_id,
            token_ids_list,
            Some(self.max_seq_length),
            &self.device,
        );

        Infer {
            tokens: padding.tensor,
            mask_pad: padding.mask,
        }
    }
}

/// Implement Batcher trait for Batcher struct for inference
impl<B: Backend> dataloader::batcher::Batcher<Vec<usize>, Infer<B>> for Batcher<B> {
    /// Collects a vector of encoded texts into an inference batch
    fn batch(&self, items: Vec<Vec<usize>>) -> Infer<B> {
        self.infer(items)
    }
}

/// Implement Batcher trait for Batcher struct for training
impl<B: Backend> dataloader::batcher::Batcher<Feature, Train<B>> for Batcher<B> {
    /// Collects a vector of features into a training batch
    fn batch(&self, items: Vec<Feature>) -> Train<B> {
        let (token_ids_list, label_ids_list): (Vec<_>, Vec<_>) = items
            .into_iter()
            .map(|feature| (feature.token_ids, feature.label_ids))
            .unzip();

        let input = self.infer(token_ids_list);

        let seq_length = input.tokens.dims()[1];

        // Pad the label ids to match the tokenized sequence length
        let targets =
            tensors::pad_to::<B>(self.pad_label_id, label_ids_list, seq_length, &self.device);

        Train { input, targets }
    }
}
