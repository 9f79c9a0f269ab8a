//! Named entity recognition: labels, featurization, batching, training, persistence and
//! inference for token classification models

/// Label sets with the continuation and padding sentinels
pub mod labels;

/// Sentence and text encoding
pub mod processor;

/// Batcher
pub mod batcher;

/// Common model traits for token classification
pub mod model;

/// Forward pass output
pub mod output;

/// Span-level precision, recall and F1
pub mod metrics;

/// Evaluation over held-out data
pub mod evaluation;

/// Dataset splits and data loaders
pub mod silo;

/// Saving and loading models with their processor
pub mod persistence;

/// Training
pub mod training;

/// Inference
pub mod inference;

pub use batcher::Batcher;
pub use inference::{InferenceError, InferenceResult, Inferencer};
pub use labels::LabelSet;
pub use model::{Model, ModelConfig};
pub use output::Output;
pub use processor::Processor;
pub use training::{train, Config};
