use std::{
    collections::BTreeMap,
    path::{Path, PathBuf},
    sync::Arc,
};

use burn::{
    module::AutodiffModule,
    tensor::{backend::AutodiffBackend, Tensor},
};
use tokenizers::Tokenizer;

use crate::{
    tracking::ExperimentLogger,
    training::{
        initialize_optimizer, trainer::prefixed, Evaluate, Evaluation, OptimizerConfig, Trainable,
        Trainer, TrainerConfig,
    },
    utils::{device::set_all_seeds, hugging_face::download_hf_model},
};

use super::{
    batcher::Train,
    evaluation::Evaluator,
    labels::LabelSet,
    model::{Model, ModelConfig},
    persistence,
    processor::{Processor, ProcessorConfig},
    silo::{self, DataSilo},
};

/// The label file name looked up in the data directory when none is given
pub static LABEL_FILE: &str = "labels.txt";

/// Define configuration struct for the experiment
#[derive(burn::config::Config)]
pub struct Config {
    /// Directory holding `train.txt` and optionally `dev.txt` and `test.txt`
    pub data_dir: String,

    /// Label file, one label per line. Defaults to `labels.txt` in the data directory.
    pub label_file: Option<String>,

    /// Directory the trained model and processor are saved to
    #[config(default = "\"saved_models/bert-ner\".to_string()")]
    pub output_dir: String,

    /// Model name (e.g., "bert-base-multilingual-cased")
    #[config(default = "\"bert-base-multilingual-cased\".to_string()")]
    pub model_name: String,

    /// Lower-case words before tokenizing them
    #[config(default = false)]
    pub do_lower_case: bool,

    /// The field delimiter of the data files
    #[config(default = "\" \".to_string()")]
    pub delimiter: String,

    /// Maximum sequence length, special tokens included
    #[config(default = 128)]
    pub max_seq_len: usize,

    /// Batch size
    #[config(default = 16)]
    pub batch_size: usize,

    /// Number of epochs
    #[config(default = 3)]
    pub epochs: usize,

    /// Evaluate on the dev split every this many steps (0 disables periodic evaluation)
    #[config(default = 100)]
    pub evaluate_every: usize,

    /// Fraction of train held out for evaluation when there is no `dev.txt`
    #[config(default = 0.0)]
    pub dev_split: f64,

    /// Seed for weight initialization, shuffling and the dev split
    #[config(default = 123)]
    pub seed: u64,

    /// Use CUDA device 0 when available
    #[config(default = true)]
    pub use_cuda: bool,

    /// Optimizer and learning rate schedule settings
    #[config(default = "OptimizerConfig::new()")]
    pub optimizer: OptimizerConfig,

    /// Experiment name reported to the experiment logger
    #[config(default = "\"ner\".to_string()")]
    pub experiment_name: String,

    /// Run name reported to the experiment logger
    #[config(default = "\"run\".to_string()")]
    pub run_name: String,
}

impl Config {
    /// The label file to read
    pub fn label_path(&self) -> PathBuf {
        match &self.label_file {
            Some(path) => PathBuf::from(path),
            None => Path::new(&self.data_dir).join(LABEL_FILE),
        }
    }

    /// The settings as flat string parameters for an experiment logger
    pub fn params(&self) -> BTreeMap<String, String> {
        let value = serde_json::to_value(self).unwrap_or_default();

        let mut params = BTreeMap::new();
        flatten_params("", &value, &mut params);

        params
    }
}

fn flatten_params(prefix: &str, value: &serde_json::Value, params: &mut BTreeMap<String, String>) {
    match value {
        serde_json::Value::Object(map) => {
            for (key, value) in map {
                let key = if prefix.is_empty() {
                    key.clone()
                } else {
                    format!("{prefix}.{key}")
                };
                flatten_params(&key, value, params);
            }
        }
        serde_json::Value::String(s) => {
            params.insert(prefix.to_string(), s.clone());
        }
        serde_json::Value::Null => {}
        other => {
            params.insert(prefix.to_string(), other.to_string());
        }
    }
}

/// What a training run produced
#[derive(Debug, Clone)]
pub struct Outcome {
    /// Where the model and processor were saved
    pub output_dir: PathBuf,

    /// The number of optimization steps taken
    pub global_step: usize,

    /// The periodic dev evaluations with the step they ran at
    pub evaluations: Vec<(usize, Evaluation)>,

    /// The evaluation of the final model on the test split, if there is one
    pub test: Option<Evaluation>,
}

/// Fine-tune a pretrained model for token classification, then save it together with its
/// processor
pub async fn train<B, M>(
    device: B::Device,
    config: Config,
    logger: Arc<dyn ExperimentLogger>,
) -> anyhow::Result<Outcome>
where
    B: AutodiffBackend,
    M: Model<B> + AutodiffModule<B> + Trainable<Batch = Train<B>, Loss = Tensor<B, 1>>,
    Evaluator<B::InnerBackend>: Evaluate<M>,
{
    B::seed(config.seed);
    set_all_seeds(config.seed);

    logger.init_experiment(&config.experiment_name, &config.run_name);
    logger.log_params(&config.params());

    let labels = LabelSet::from_file(config.label_path()).await?;

    info!(
        "Using {} labels: {}",
        labels.len(),
        labels.as_slice().join(", ")
    );

    let data_dir = Path::new(&config.data_dir);
    silo::check_data_dir(data_dir)?;

    let files = download_hf_model(&config.model_name).await?;

    let tokenizer = Tokenizer::from_file(&files.tokenizer)
        .map_err(|e| anyhow!("Unable to load tokenizer for {}: {}", config.model_name, e))?;

    let processor = Processor::new(
        tokenizer,
        ProcessorConfig::new(config.model_name.clone(), labels.clone())
            .with_max_seq_len(config.max_seq_len)
            .with_delimiter(config.delimiter.clone())
            .with_do_lower_case(config.do_lower_case),
    );

    let silo = DataSilo::load(&processor, data_dir, config.dev_split, config.seed).await?;

    let loaders = silo.loaders::<B>(&processor, &device, config.batch_size, config.seed);

    let model_config = M::Config::load_pretrained(&files.config, labels)?;

    persistence::check_labels(model_config.labels(), processor.labels())?;

    let model = M::load_from_safetensors(&device, files.weights.clone(), &model_config)?;

    info!(
        "Loaded {} with a prediction head for {} labels",
        config.model_name,
        model.n_classes()
    );

    let (optimizer, schedule) =
        initialize_optimizer::<B, M>(&config.optimizer, loaders.n_batches, config.epochs);

    let trainer_config = TrainerConfig::new()
        .with_epochs(config.epochs)
        .with_evaluate_every(config.evaluate_every);

    let mut trainer = Trainer::new(optimizer, schedule, trainer_config).with_logger(logger.clone());

    if let Some(dev) = loaders.dev {
        trainer = trainer.with_evaluator(Evaluator::new(dev, processor.labels().clone()));
    }

    let summary = trainer.train(model, &loaders.train)?;

    info!("Training finished after {} steps", summary.global_step);

    let test = match loaders.test {
        Some(test) => {
            let evaluation = Evaluator::new(test, processor.labels().clone())
                .evaluate(&summary.model)?;

            info!(
                "Test set: loss {:.4}, seq_f1 {:.4}",
                evaluation.loss,
                evaluation.metric("seq_f1").unwrap_or_default()
            );

            logger.log_metrics(&prefixed("test", &evaluation), summary.global_step);

            Some(evaluation)
        }
        None => None,
    };

    let output_dir = PathBuf::from(&config.output_dir);

    persistence::save::<B, M>(&output_dir, summary.model, &model_config, &processor)?;

    Ok(Outcome {
        output_dir,
        global_step: summary.global_step,
        evaluations: summary.evaluations,
        test,
    })
}
