//! Command line tool to fine-tune a model for named entity recognition

use std::{path::Path, sync::Arc};

use anyhow::anyhow;
use burn::backend::{Autodiff, LibTorch};
use burn_ner::{
    cli::{datasets::Dataset, models::Model},
    models::bert,
    pipelines::token_classification,
    tracking::{ExperimentLogger, FileLogger, LogLogger},
    utils::device::initialize_device_settings,
};
use pico_args::Arguments;

const HELP: &str = "\
Usage: train [DATASET] [OPTIONS]

Arguments:
  DATASET              The dataset to use (e.g., 'germeval14', the default, or 'conll03')

Options:
  -h, --help           Print help
  -m, --model          The model to use (defaults to 'bert-base-multilingual-cased')
  -d, --data-dir       The path to the top-level data directory (defaults to 'data')
  -o, --output-dir     Where to save the trained model (defaults to 'saved_models/bert-<DATASET>')
  -l, --labels         The label file (defaults to 'labels.txt' in the dataset directory)
  -n, --num-epochs     Number of epochs to train for (defaults to 3)
  -b, --batch-size     Batch size (defaults to 16)
  -e, --evaluate-every Evaluate on the dev split every N steps, 0 to disable (defaults to 100)
  --max-seq-len        Maximum sequence length (defaults to 128)
  --learning-rate      Peak learning rate (defaults to 2e-5)
  --dev-split          Fraction of train to hold out when there is no dev.txt (defaults to 0)
  --seed               Random seed (defaults to 123)
  --tracking-dir       Store parameters and metrics under this directory
  --cpu                Do not use CUDA
";

#[derive(Debug)]
struct Args {
    dataset: Option<String>,
    model: Option<String>,
    data_dir: String,
    output_dir: Option<String>,
    labels: Option<String>,
    num_epochs: Option<usize>,
    batch_size: Option<usize>,
    evaluate_every: Option<usize>,
    max_seq_len: Option<usize>,
    learning_rate: Option<f64>,
    dev_split: Option<f64>,
    seed: Option<u64>,
    tracking_dir: Option<String>,
    use_cuda: bool,
}

impl Args {
    fn parse() -> anyhow::Result<Option<Self>> {
        let mut pargs = Arguments::from_env();

        // Help has a higher priority and should be handled separately.
        if pargs.contains(["-h", "--help"]) {
            return Ok(None);
        }

        let args = Args {
            model: pargs.opt_value_from_str(["-m", "--model"])?,
            data_dir: pargs
                .opt_value_from_str(["-d", "--data-dir"])?
                .unwrap_or_else(|| "data".to_string()),
            output_dir: pargs.opt_value_from_str(["-o", "--output-dir"])?,
            labels: pargs.opt_value_from_str(["-l", "--labels"])?,
            num_epochs: pargs.opt_value_from_str(["-n", "--num-epochs"])?,
            batch_size: pargs.opt_value_from_str(["-b", "--batch-size"])?,
            evaluate_every: pargs.opt_value_from_str(["-e", "--evaluate-every"])?,
            max_seq_len: pargs.opt_value_from_str("--max-seq-len")?,
            learning_rate: pargs.opt_value_from_str("--learning-rate")?,
            dev_split: pargs.opt_value_from_str("--dev-split")?,
            seed: pargs.opt_value_from_str("--seed")?,
            tracking_dir: pargs.opt_value_from_str("--tracking-dir")?,
            use_cuda: !pargs.contains("--cpu"),
            dataset: pargs.opt_free_from_str()?,
        };

        let remaining = pargs.finish();
        if !remaining.is_empty() {
            return Err(anyhow!("Unexpected arguments: {:?}", remaining));
        }

        Ok(Some(args))
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    pretty_env_logger::formatted_builder()
        .filter_level(log::LevelFilter::Info)
        .parse_env("RUST_LOG")
        .init();

    let Some(args) = Args::parse()? else {
        print!("{}", HELP);

        return Ok(());
    };

    let dataset = match &args.dataset {
        Some(dataset) => Dataset::try_from(dataset.as_str())?,
        None => Dataset::default(),
    };

    let model = match &args.model {
        Some(model) => Model::try_from(model.as_str())?,
        None => Model::default(),
    };

    let data_dir = Path::new(&args.data_dir).join(dataset.dir_name());

    let mut config = token_classification::Config::new(data_dir.display().to_string())
        .with_model_name(model.to_string())
        .with_do_lower_case(model.do_lower_case())
        .with_delimiter(dataset.delimiter().to_string())
        .with_output_dir(
            args.output_dir
                .clone()
                .unwrap_or_else(|| format!("saved_models/bert-{}", dataset)),
        )
        .with_label_file(args.labels.clone())
        .with_use_cuda(args.use_cuda)
        .with_experiment_name(format!("{}-ner", dataset));

    if let Some(num_epochs) = args.num_epochs {
        config.epochs = num_epochs;
    }

    if let Some(batch_size) = args.batch_size {
        config.batch_size = batch_size;
    }

    if let Some(evaluate_every) = args.evaluate_every {
        config.evaluate_every = evaluate_every;
    }

    if let Some(max_seq_len) = args.max_seq_len {
        config.max_seq_len = max_seq_len;
    }

    if let Some(learning_rate) = args.learning_rate {
        config.optimizer.learning_rate = learning_rate;
    }

    if let Some(dev_split) = args.dev_split {
        config.dev_split = dev_split;
    }

    if let Some(seed) = args.seed {
        config.seed = seed;
    }

    let logger: Arc<dyn ExperimentLogger> = match &args.tracking_dir {
        Some(dir) => Arc::new(FileLogger::new(dir)),
        None => Arc::new(LogLogger),
    };

    let (device, _n_gpu) = initialize_device_settings(config.use_cuda);

    let outcome = token_classification::train::<
        Autodiff<LibTorch>,
        bert::token_classification::Model<Autodiff<LibTorch>>,
    >(device, config, logger)
    .await?;

    if let Some((step, evaluation)) = outcome.evaluations.last() {
        log::info!(
            "Last dev evaluation at step {}: seq_f1 {:.4}",
            step,
            evaluation.metric("seq_f1").unwrap_or_default()
        );
    }

    if let Some(test) = &outcome.test {
        log::info!(
            "Test seq_f1 {:.4}",
            test.metric("seq_f1").unwrap_or_default()
        );
    }

    log::info!("Saved to {}", outcome.output_dir.display());

    Ok(())
}
