//! The training orchestrator and the capabilities it drives.
//!
//! [`Trainer`] knows nothing about tensors. It steps a [`Trainable`] model through the batches of
//! a [`Batches`] source once per epoch, updating it through an [`Optimize`] implementation at the
//! learning rate produced by a [`Schedule`], and pauses every `evaluate_every` global steps to run
//! an [`Evaluate`] pass over held-out data.

use std::{collections::BTreeMap, sync::Arc};

use burn::{data::dataloader::DataLoader, LearningRate};
use serde::Serialize;

/// The epoch/step loop
pub mod trainer;

/// Learning-rate schedules
pub mod schedule;

/// Burn optimizer adaptor and factory
pub mod optimizer;

pub use optimizer::{initialize_optimizer, Backprop, OptimizerConfig};
pub use schedule::{Schedule, WarmupLinear};
pub use trainer::{Trainer, TrainerConfig, TrainingSummary};

/// A model the trainer can step: a forward computation followed by a loss
pub trait Trainable: Sized {
    /// The unit of training data
    type Batch;

    /// The result of a forward pass
    type Output;

    /// The loss handed to the optimizer
    type Loss;

    /// Run the forward computation for a batch
    fn forward(&self, batch: Self::Batch) -> anyhow::Result<Self::Output>;

    /// Compute the loss to optimize from a forward output
    fn compute_loss(&self, output: &Self::Output) -> Self::Loss;

    /// The loss as a plain number for reporting
    fn loss_value(loss: &Self::Loss) -> f64;
}

/// Applies a backward pass and a parameter update
pub trait Optimize<M: Trainable> {
    /// Update the model from a loss at the given learning rate
    fn step(&mut self, lr: LearningRate, model: M, loss: M::Loss) -> M;
}

/// Runs a full evaluation pass without mutating the model
pub trait Evaluate<M> {
    /// Evaluate the model on held-out data
    fn evaluate(&self, model: &M) -> anyhow::Result<Evaluation>;
}

/// A source of batches that can be iterated once per epoch
pub trait Batches {
    /// The batch type
    type Batch;

    /// Iterate over the batches of one epoch
    fn batches(&self) -> Box<dyn Iterator<Item = Self::Batch> + '_>;
}

impl<T: 'static> Batches for Arc<dyn DataLoader<T>> {
    type Batch = T;

    fn batches(&self) -> Box<dyn Iterator<Item = T> + '_> {
        Box::new(self.iter())
    }
}

impl<T: Clone> Batches for Vec<T> {
    type Batch = T;

    fn batches(&self) -> Box<dyn Iterator<Item = T> + '_> {
        Box::new(self.iter().cloned())
    }
}

/// The result of an evaluation pass
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct Evaluation {
    /// Mean loss over the evaluated batches
    pub loss: f64,

    /// Named metrics (e.g., "seq_f1")
    pub metrics: BTreeMap<String, f64>,
}

impl Evaluation {
    /// Create an evaluation with only a loss
    pub fn new(loss: f64) -> Self {
        Self {
            loss,
            metrics: BTreeMap::new(),
        }
    }

    /// Add a named metric
    pub fn with_metric(mut self, name: impl Into<String>, value: f64) -> Self {
        self.metrics.insert(name.into(), value);
        self
    }

    /// Look up a named metric
    pub fn metric(&self, name: &str) -> Option<f64> {
        self.metrics.get(name).copied()
    }
}
