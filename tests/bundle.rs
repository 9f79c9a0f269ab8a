mod common;

use burn::{backend::NdArray, config::Config as _};
use burn_ner::{
    models::bert::token_classification::{Config, Model},
    pipelines::token_classification::{
        self,
        inference::BurnClassifier,
        persistence::{self, BundleError},
        processor::Processor,
        Inferencer, LabelSet, ModelConfig,
    },
};
use pretty_assertions::assert_eq;
use serde_json::json;

type TinyBert = Model<NdArray>;

fn save_bundle(dir: &std::path::Path) -> anyhow::Result<(Config, Processor)> {
    let device = Default::default();

    let config = Config::load_pretrained(&common::write_bert_config(dir)?, common::labels()?)?;
    let processor = common::processor(common::labels()?)?;

    let model: TinyBert = token_classification::Model::init(&config, &device);

    persistence::save::<NdArray, TinyBert>(dir.join("bundle"), model, &config, &processor)?;

    Ok((config, processor))
}

#[test]
fn test_head_is_sized_for_labels() -> anyhow::Result<()> {
    let dir = tempfile::tempdir()?;
    let device = Default::default();

    let config = Config::load_pretrained(&common::write_bert_config(dir.path())?, common::labels()?)?;
    let model: TinyBert = token_classification::Model::init(&config, &device);

    assert_eq!(token_classification::Model::n_classes(&model), 7);
    assert_eq!(config.n_classes(), config.labels().len());

    let other = LabelSet::new(["O", "B-MISC", "I-MISC"])?;
    let rederived = Config::load_pretrained(&common::write_bert_config(dir.path())?, other)?;
    let model: TinyBert = token_classification::Model::init(&rederived, &device);

    assert_eq!(token_classification::Model::n_classes(&model), 5);
    assert_eq!(rederived.n_classes(), 5);

    Ok(())
}

#[test]
fn test_bundle_round_trip_keeps_labels() -> anyhow::Result<()> {
    let dir = tempfile::tempdir()?;
    let (config, processor) = save_bundle(dir.path())?;

    let bundle = persistence::load::<NdArray, TinyBert>(dir.path().join("bundle"), &Default::default())?;

    assert_eq!(bundle.config.labels(), config.labels());
    assert_eq!(
        bundle.processor.labels().as_slice(),
        processor.labels().as_slice()
    );
    assert_eq!(bundle.processor.max_seq_len(), processor.max_seq_len());

    Ok(())
}

#[test]
fn test_bundle_with_mismatched_labels_fails_to_load() -> anyhow::Result<()> {
    let dir = tempfile::tempdir()?;
    save_bundle(dir.path())?;

    // Replace the processor with one whose labels are ordered differently
    let reordered = LabelSet::new(["O", "B-LOC", "I-LOC", "B-PER", "I-PER"])?;
    common::processor(reordered)?.save(dir.path().join("bundle"))?;

    let result = persistence::load::<NdArray, TinyBert>(dir.path().join("bundle"), &Default::default());

    assert!(matches!(result, Err(BundleError::LabelMismatch { .. })));

    Ok(())
}

#[test]
fn test_bundle_with_resized_labels_fails_to_load() -> anyhow::Result<()> {
    let dir = tempfile::tempdir()?;
    save_bundle(dir.path())?;

    let bundle_dir = dir.path().join("bundle");

    // Config and processor agree with each other, but the saved head scores 7 labels
    let fewer = LabelSet::new(["O", "B-PER", "I-PER"])?;
    let config = Config::load_pretrained(&common::write_bert_config(dir.path())?, fewer.clone())?;
    config.save(bundle_dir.join(persistence::MODEL_CONFIG_FILE))?;
    common::processor(fewer)?.save(&bundle_dir)?;

    let result = persistence::load::<NdArray, TinyBert>(&bundle_dir, &Default::default());

    assert!(matches!(
        result,
        Err(BundleError::HeadSize { head: 7, labels: 5 })
    ));

    Ok(())
}

#[test]
fn test_missing_bundle_fails_to_load() {
    let result = persistence::load::<NdArray, TinyBert>("/nonexistent/bundle", &Default::default());

    assert!(matches!(result, Err(BundleError::Missing(_))));
}

#[test]
fn test_inference_from_saved_bundle() -> anyhow::Result<()> {
    let dir = tempfile::tempdir()?;
    let (config, _) = save_bundle(dir.path())?;

    let inferencer = Inferencer::<BurnClassifier<NdArray, TinyBert>>::load(
        dir.path().join("bundle"),
        Default::default(),
        2,
    )?;

    assert_eq!(inferencer.processor().labels(), config.labels());

    let examples = vec![
        json!({"text": "Martin Müller spielt Handball"}),
        json!({"txt": "in Berlin"}),
        json!({"text": "Müller spielt in Berlin"}),
        json!({"text": "Berlin"}),
    ];

    let results = inferencer.inference_from_dicts(&examples);

    assert_eq!(results.len(), examples.len());
    assert!(results[1].is_err());

    let texts: Vec<Option<&str>> = results
        .iter()
        .map(|result| result.as_ref().ok().map(|r| r.text.as_str()))
        .collect();
    assert_eq!(
        texts,
        vec![
            Some("Martin Müller spielt Handball"),
            None,
            Some("Müller spielt in Berlin"),
            Some("Berlin"),
        ]
    );

    let word_counts: Vec<usize> = results
        .iter()
        .filter_map(|result| result.as_ref().ok())
        .map(|r| r.predictions.len())
        .collect();
    assert_eq!(word_counts, vec![4, 4, 1]);

    for result in results.iter().filter_map(|result| result.as_ref().ok()) {
        for prediction in &result.predictions {
            assert!(config.labels().task_labels().contains(&prediction.label));
            assert!((0.0..=1.0).contains(&prediction.probability));
        }
    }

    Ok(())
}
