mod common;

use burn::{
    backend::{Autodiff, NdArray},
    module::AutodiffModule,
    tensor::backend::Backend as _,
};
use burn_ner::{
    models::bert::token_classification::{Config, Model},
    pipelines::token_classification::{
        self,
        evaluation::Evaluator,
        inference::{BurnClassifier, TokenClassifier},
        processor::Processor,
        silo::DataSilo,
        ModelConfig,
    },
    training::{initialize_optimizer, OptimizerConfig, Trainer, TrainerConfig},
};
use pretty_assertions::{assert_eq, assert_ne};

type Backend = Autodiff<NdArray>;
type TinyBert = Model<Backend>;

static TRAIN: &str = "\
Martin B-PER
Müller I-PER
spielt O
Handball O

Müller B-PER
spielt O
in O
Berlin B-LOC

Martin B-PER
spielt O
in O
Berlin B-LOC

Berlin B-LOC
";

static DEV: &str = "\
Martin B-PER
spielt O

in O
Berlin B-LOC
";

/// Label probabilities for a fixed sentence
fn predict(model: Model<NdArray>, processor: &Processor) -> anyhow::Result<Vec<Vec<Vec<f32>>>> {
    let encoded = processor.encode_text("Martin Müller spielt in Berlin")?;

    BurnClassifier::new(model, processor, Default::default()).predict(vec![encoded.token_ids])
}

#[tokio::test]
async fn test_fine_tunes_with_evaluation_every_step() -> anyhow::Result<()> {
    let dir = tempfile::tempdir()?;
    std::fs::write(dir.path().join("train.txt"), TRAIN)?;
    std::fs::write(dir.path().join("dev.txt"), DEV)?;

    let device = Default::default();
    Backend::seed(7);

    let labels = common::labels()?;
    let processor = common::processor(labels.clone())?;

    let silo = DataSilo::load(&processor, dir.path(), 0.0, 7).await?;
    let loaders = silo.loaders::<Backend>(&processor, &device, 2, 7);

    assert_eq!(loaders.n_batches, 2);
    assert_eq!(loaders.train.iter().count(), loaders.n_batches);

    let config = Config::load_pretrained(&common::write_bert_config(dir.path())?, labels.clone())?;
    let model: TinyBert = token_classification::Model::init(&config, &device);

    let before = predict(model.valid(), &processor)?;

    let (optimizer, schedule) = initialize_optimizer::<Backend, TinyBert>(
        &OptimizerConfig::new()
            .with_learning_rate(1e-2)
            .with_warmup_proportion(0.0),
        loaders.n_batches,
        1,
    );

    let dev = loaders
        .dev
        .ok_or_else(|| anyhow::anyhow!("dev.txt should produce a dev loader"))?;

    let trainer = Trainer::new(
        optimizer,
        schedule,
        TrainerConfig::new().with_epochs(1).with_evaluate_every(1),
    )
    .with_evaluator(Evaluator::new(dev, labels));

    let summary = trainer.train(model, &loaders.train)?;

    assert_eq!(summary.global_step, loaders.n_batches);
    assert_eq!(
        summary
            .evaluations
            .iter()
            .map(|(step, _)| *step)
            .collect::<Vec<_>>(),
        vec![1, 2]
    );

    for (_, evaluation) in &summary.evaluations {
        let seq_f1 = evaluation
            .metric("seq_f1")
            .ok_or_else(|| anyhow::anyhow!("evaluation without seq_f1"))?;

        assert!((0.0..=1.0).contains(&seq_f1), "seq_f1 out of range: {}", seq_f1);
        assert!(evaluation.loss.is_finite());
    }

    assert!(summary.final_loss.is_some_and(f64::is_finite));

    let after = predict(summary.model.valid(), &processor)?;

    assert_eq!(after.len(), before.len());
    assert_ne!(after, before);

    Ok(())
}
