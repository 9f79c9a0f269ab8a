use std::{fs, path::Path};

use burn::{
    config::Config as _,
    module::Module,
    record::{CompactRecorder, Recorder},
    tensor::backend::Backend,
};

use super::{
    labels::LabelSet,
    model::{Model, ModelConfig},
    processor::{Processor, ProcessorError},
};

/// The model config file name inside a saved bundle
pub static MODEL_CONFIG_FILE: &str = "config.json";

/// The weights file stem inside a saved bundle. The recorder adds the `.mpk.gz` extension.
pub static MODEL_FILE: &str = "model";

/// A model loaded together with the processor it was trained with
pub struct Bundle<M, C> {
    /// The model weights
    pub model: M,

    /// The model configuration
    pub config: C,

    /// The processor that produces the model's input
    pub processor: Processor,
}

/// Save a model, its config and its processor into one directory
pub fn save<B, M>(
    dir: impl AsRef<Path>,
    model: M,
    config: &M::Config,
    processor: &Processor,
) -> Result<(), BundleError>
where
    B: Backend,
    M: Model<B>,
{
    let dir = dir.as_ref();

    check_labels(config.labels(), processor.labels())?;

    fs::create_dir_all(dir)?;

    config.save(dir.join(MODEL_CONFIG_FILE))?;

    let recorder = CompactRecorder::new();
    Recorder::<B>::record(&recorder, model.into_record(), dir.join(MODEL_FILE))
        .map_err(|e| BundleError::Record(e.to_string()))?;

    processor.save(dir)?;

    info!("Saved model and processor to {}", dir.display());

    Ok(())
}

/// Load a model and its processor from a bundle directory, checking that they agree on labels
pub fn load<B, M>(dir: impl AsRef<Path>, device: &B::Device) -> Result<Bundle<M, M::Config>, BundleError>
where
    B: Backend,
    M: Model<B>,
{
    let dir = dir.as_ref();

    if !dir.is_dir() {
        return Err(BundleError::Missing(dir.display().to_string()));
    }

    let config = M::Config::load(dir.join(MODEL_CONFIG_FILE))
        .map_err(|e| BundleError::Config(e.to_string()))?;

    let processor = Processor::load(dir)?;

    check_labels(config.labels(), processor.labels())?;

    let recorder = CompactRecorder::new();
    let record = Recorder::<B>::load(&recorder, dir.join(MODEL_FILE), device)
        .map_err(|e| BundleError::Record(e.to_string()))?;

    let model = M::init(&config, device).load_record(record);

    if model.n_classes() != config.n_classes() {
        return Err(BundleError::HeadSize {
            head: model.n_classes(),
            labels: config.n_classes(),
        });
    }

    info!(
        "Loaded model with {} labels from {}",
        config.n_classes(),
        dir.display()
    );

    Ok(Bundle {
        model,
        config,
        processor,
    })
}

/// The model and the processor must use the same labels in the same order
pub fn check_labels(model: &LabelSet, processor: &LabelSet) -> Result<(), BundleError> {
    if model != processor {
        return Err(BundleError::LabelMismatch {
            model: model.as_slice().to_vec(),
            processor: processor.as_slice().to_vec(),
        });
    }

    Ok(())
}

/// Bundle Error
#[derive(thiserror::Error, Debug)]
pub enum BundleError {
    /// The bundle directory does not exist
    #[error("no saved model found at {0}")]
    Missing(String),

    /// The model config could not be read
    #[error("unable to load model config: {0}")]
    Config(String),

    /// The weights could not be written or read
    #[error("unable to save or load model weights: {0}")]
    Record(String),

    /// The processor could not be written or read
    #[error(transparent)]
    Processor(#[from] ProcessorError),

    /// The model and processor labels disagree
    #[error("model labels {model:?} do not match processor labels {processor:?}")]
    LabelMismatch {
        /// Labels of the model config
        model: Vec<String>,

        /// Labels of the processor config
        processor: Vec<String>,
    },

    /// The prediction head does not score every label
    #[error("prediction head scores {head} labels but {labels} are defined")]
    HeadSize {
        /// Size of the head output
        head: usize,

        /// Number of labels
        labels: usize,
    },

    /// Bundle I/O failed
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

#[cfg(test)]
mod tests {
    use crate::testing;

    use super::*;

    #[test]
    fn test_check_labels() -> anyhow::Result<()> {
        let labels = testing::labels();
        let reordered = LabelSet::new(["B-PER", "O", "I-PER", "B-LOC", "I-LOC"])?;

        assert!(check_labels(&labels, &labels.clone()).is_ok());
        assert!(matches!(
            check_labels(&labels, &reordered),
            Err(BundleError::LabelMismatch { .. })
        ));

        Ok(())
    }
}
