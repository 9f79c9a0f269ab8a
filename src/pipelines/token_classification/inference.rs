use std::{marker::PhantomData, path::Path};

use burn::{data::dataloader::batcher::Batcher as _, tensor::backend::Backend};
use serde::Serialize;
use serde_json::Value;

use crate::utils::classes::argmax;

use super::{
    batcher::{Batcher, Infer},
    labels::LabelSet,
    metrics::extract_spans,
    model::Model,
    persistence::{self, BundleError},
    processor::{EncodedText, Processor, ProcessorError},
};

/// The key holding the raw text in each example
pub static TEXT_KEY: &str = "text";

/// Default number of examples per inference batch
pub const DEFAULT_BATCH_SIZE: usize = 16;

/// Produces label probabilities for encoded sequences
pub trait TokenClassifier {
    /// Label probabilities for every token of every sequence: [sequence][token][label]
    fn predict(&self, token_ids: Vec<Vec<usize>>) -> anyhow::Result<Vec<Vec<Vec<f32>>>>;
}

/// Runs a token classification model on a Burn backend
pub struct BurnClassifier<B: Backend, M: Model<B>> {
    model: M,
    batcher: Batcher<B>,
    backend: PhantomData<B>,
}

impl<B: Backend, M: Model<B>> BurnClassifier<B, M> {
    /// Wrap a model with a batcher for its processor
    pub fn new(model: M, processor: &Processor, device: B::Device) -> Self {
        let batcher = Batcher::new(
            processor.pad_token_id(),
            processor.labels().pad_id(),
            processor.max_seq_len(),
            device,
        );

        Self {
            model,
            batcher,
            backend: PhantomData,
        }
    }
}

impl<B: Backend, M: Model<B>> TokenClassifier for BurnClassifier<B, M> {
    fn predict(&self, token_ids: Vec<Vec<usize>>) -> anyhow::Result<Vec<Vec<Vec<f32>>>> {
        if token_ids.is_empty() {
            return Ok(Vec::new());
        }

        let input: Infer<B> = self.batcher.batch(token_ids);

        let probabilities = self.model.infer(input);
        let [batch_size, seq_length, n_labels] = probabilities.dims();

        let values = probabilities.into_data().convert::<f32>().value;

        if values.len() != batch_size * seq_length * n_labels {
            return Err(anyhow!(
                "Expected {} probabilities, got {}",
                batch_size * seq_length * n_labels,
                values.len()
            ));
        }

        Ok(values
            .chunks(seq_length * n_labels)
            .map(|sequence| {
                sequence
                    .chunks(n_labels)
                    .map(|token| token.to_vec())
                    .collect()
            })
            .collect())
    }
}

/// The prediction for one word of the input
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TokenPrediction {
    /// The word
    pub word: String,

    /// Byte offset of the word in the text
    pub start: usize,

    /// Byte offset just past the word
    pub end: usize,

    /// The predicted tag
    pub label: String,

    /// The probability of the predicted tag
    pub probability: f32,
}

/// An entity assembled from consecutive BIO tags
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Entity {
    /// The entity text
    pub text: String,

    /// The entity type (e.g., "PER")
    pub label: String,

    /// Byte offset of the entity in the text
    pub start: usize,

    /// Byte offset just past the entity
    pub end: usize,
}

/// The predictions for one example
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct InferenceResult {
    /// The input text
    pub text: String,

    /// One prediction per word that fit within the maximum sequence length
    pub predictions: Vec<TokenPrediction>,

    /// Entity spans
    pub entities: Vec<Entity>,
}

impl InferenceResult {
    fn empty(text: String) -> Self {
        Self {
            text,
            predictions: Vec::new(),
            entities: Vec::new(),
        }
    }
}

/// Maps raw text examples to per-word predictions with a loaded model and processor
pub struct Inferencer<C> {
    processor: Processor,
    classifier: C,
    batch_size: usize,
}

impl<C: TokenClassifier> Inferencer<C> {
    /// Create an inferencer from a processor and a classifier
    pub fn new(processor: Processor, classifier: C, batch_size: usize) -> Self {
        Self {
            processor,
            classifier,
            batch_size: batch_size.max(1),
        }
    }

    /// The processor
    pub fn processor(&self) -> &Processor {
        &self.processor
    }

    /// Predict every example, returning one result per example in input order. An example that is
    /// not an object with a string `text` field fails on its own without affecting the others.
    pub fn inference_from_dicts(
        &self,
        dicts: &[Value],
    ) -> Vec<Result<InferenceResult, InferenceError>> {
        let mut results: Vec<Option<Result<InferenceResult, InferenceError>>> =
            dicts.iter().map(|_| None).collect();

        let mut pending = Vec::new();

        for (i, dict) in dicts.iter().enumerate() {
            let prepared = extract_text(dict).and_then(|text| {
                let encoded = self.processor.encode_text(&text)?;
                Ok((text, encoded))
            });

            match prepared {
                Ok((text, encoded)) if encoded.token_ids.is_empty() => {
                    results[i] = Some(Ok(InferenceResult::empty(text)));
                }
                Ok((text, encoded)) => pending.push((i, text, encoded)),
                Err(err) => results[i] = Some(Err(err)),
            }
        }

        for chunk in pending.chunks(self.batch_size) {
            let token_ids = chunk
                .iter()
                .map(|(_, _, encoded)| encoded.token_ids.clone())
                .collect();

            match self.classifier.predict(token_ids) {
                Ok(probabilities) if probabilities.len() == chunk.len() => {
                    for ((i, text, encoded), sequence) in chunk.iter().zip(probabilities) {
                        results[*i] = Some(decode(
                            self.processor.labels(),
                            text,
                            encoded,
                            &sequence,
                        ));
                    }
                }
                Ok(probabilities) => {
                    let message = format!(
                        "expected predictions for {} sequences, got {}",
                        chunk.len(),
                        probabilities.len()
                    );
                    for (i, _, _) in chunk {
                        results[*i] = Some(Err(InferenceError::Model(message.clone())));
                    }
                }
                Err(err) => {
                    warn!("Inference failed for a batch of {} examples: {}", chunk.len(), err);
                    for (i, _, _) in chunk {
                        results[*i] = Some(Err(InferenceError::Model(err.to_string())));
                    }
                }
            }
        }

        results
            .into_iter()
            .map(|result| {
                result.unwrap_or_else(|| Err(InferenceError::Model("no prediction".to_string())))
            })
            .collect()
    }
}

impl<B: Backend, M: Model<B>> Inferencer<BurnClassifier<B, M>> {
    /// Load a saved model and processor bundle
    pub fn load(
        dir: impl AsRef<Path>,
        device: B::Device,
        batch_size: usize,
    ) -> Result<Self, BundleError> {
        let bundle = persistence::load::<B, M>(dir, &device)?;

        let classifier = BurnClassifier::new(bundle.model, &bundle.processor, device);

        Ok(Self::new(bundle.processor, classifier, batch_size))
    }
}

fn extract_text(dict: &Value) -> Result<String, InferenceError> {
    let object = dict.as_object().ok_or(InferenceError::NotAnObject)?;

    let value = object
        .get(TEXT_KEY)
        .ok_or_else(|| InferenceError::MissingField(TEXT_KEY.to_string()))?;

    value
        .as_str()
        .map(str::to_string)
        .ok_or_else(|| InferenceError::InvalidField(TEXT_KEY.to_string()))
}

/// Turn token-level probabilities into word predictions. Each word takes the prediction of its
/// first word piece, restricted to the task labels. Words dropped by truncation get no prediction.
fn decode(
    labels: &LabelSet,
    text: &str,
    encoded: &EncodedText,
    probabilities: &[Vec<f32>],
) -> Result<InferenceResult, InferenceError> {
    let n_task_labels = labels.task_labels().len();

    let mut predictions = Vec::with_capacity(encoded.words.len());

    for (word, first_token) in encoded.words.iter().zip(&encoded.first_tokens) {
        let Some(position) = first_token else {
            continue;
        };

        let token = probabilities.get(*position).ok_or_else(|| {
            InferenceError::Model(format!("no prediction for token {}", position))
        })?;

        let (label_id, probability) = token
            .get(..n_task_labels)
            .and_then(argmax)
            .ok_or_else(|| {
                InferenceError::Model(format!(
                    "expected {} label scores, got {}",
                    labels.len(),
                    token.len()
                ))
            })?;

        let label = labels
            .label(label_id)
            .ok_or_else(|| InferenceError::Model(format!("unknown label id {}", label_id)))?;

        predictions.push(TokenPrediction {
            word: word.text.clone(),
            start: word.start,
            end: word.end,
            label: label.to_string(),
            probability,
        });
    }

    let tags: Vec<&str> = predictions.iter().map(|p| p.label.as_str()).collect();

    let entities = extract_spans(&tags)
        .into_iter()
        .map(|span| {
            let start = predictions[span.start].start;
            let end = predictions[span.end - 1].end;

            Entity {
                text: text[start..end].to_string(),
                label: span.label,
                start,
                end,
            }
        })
        .collect();

    Ok(InferenceResult {
        text: text.to_string(),
        predictions,
        entities,
    })
}

/// Inference Error
#[derive(thiserror::Error, Debug)]
pub enum InferenceError {
    /// The example is not a JSON object
    #[error("example is not an object")]
    NotAnObject,

    /// The example lacks a required key
    #[error("example is missing the {0:?} field")]
    MissingField(String),

    /// A field does not hold a string
    #[error("example field {0:?} is not a string")]
    InvalidField(String),

    /// The text could not be encoded
    #[error(transparent)]
    Processor(#[from] ProcessorError),

    /// The model failed to produce predictions
    #[error("model failure: {0}")]
    Model(String),
}
