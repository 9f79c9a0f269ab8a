//! Command line tool for named entity recognition with a trained model

use anyhow::anyhow;
use burn::backend::LibTorch;
use burn_ner::{
    models::bert,
    pipelines::token_classification::{
        inference::{BurnClassifier, DEFAULT_BATCH_SIZE},
        Inferencer,
    },
    utils::device::initialize_device_settings,
};
use pico_args::Arguments;
use serde_json::{json, Value};

const HELP: &str = "\
Usage: infer BUNDLE_DIR [OPTIONS]

Arguments:
  BUNDLE_DIR           A directory written by the train command

Options:
  -h, --help           Print help
  -i, --input          A JSON file holding an array of {\"text\": ...} objects
  -b, --batch-size     Number of examples per batch (defaults to 16)
  --cpu                Do not use CUDA
";

#[derive(Debug)]
struct Args {
    bundle_dir: String,
    input: Option<String>,
    batch_size: usize,
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
            input: pargs.opt_value_from_str(["-i", "--input"])?,
            batch_size: pargs
                .opt_value_from_str(["-b", "--batch-size"])?
                .unwrap_or(DEFAULT_BATCH_SIZE),
            use_cuda: !pargs.contains("--cpu"),
            bundle_dir: pargs.free_from_str().map_err(|e| match e {
                pico_args::Error::MissingArgument => {
                    anyhow!("Missing required argument: BUNDLE_DIR")
                }
                _ => anyhow!("{}", e),
            })?,
        };

        Ok(Some(args))
    }
}

/// Examples used when no input file is given
fn sample_examples() -> Vec<Value> {
    vec![
        json!({"text": "Schartau sagte dem Tagesspiegel, dass Fischer ein Idiot sei"}),
        json!({"text": "Martin Müller spielt Handball in Berlin"}),
    ]
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

    let examples = match &args.input {
        Some(path) => {
            let content = tokio::fs::read_to_string(path).await?;

            serde_json::from_str::<Vec<Value>>(&content)
                .map_err(|e| anyhow!("Unable to parse examples from {}: {}", path, e))?
        }
        None => sample_examples(),
    };

    let (device, _n_gpu) = initialize_device_settings(args.use_cuda);

    let inferencer = Inferencer::<
        BurnClassifier<LibTorch, bert::token_classification::Model<LibTorch>>,
    >::load(&args.bundle_dir, device, args.batch_size)?;

    log::info!("Running inference on {} examples", examples.len());

    for result in inferencer.inference_from_dicts(&examples) {
        let line = match result {
            Ok(result) => serde_json::to_string(&result)?,
            Err(err) => json!({ "error": err.to_string() }).to_string(),
        };

        println!("{}", line);
    }

    Ok(())
}
