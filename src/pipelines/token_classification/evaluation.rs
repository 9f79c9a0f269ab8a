use std::sync::Arc;

use burn::{
    data::dataloader::DataLoader,
    tensor::{backend::Backend, ElementConversion},
};

use crate::training::Evaluation;

use super::{
    batcher::Train,
    labels::LabelSet,
    metrics::{seq_f1, Report},
    model::Model,
};

/// Runs a model over held-out batches and scores its predictions with span-level F1
#[derive(Clone)]
pub struct Evaluator<B: Backend> {
    loader: Arc<dyn DataLoader<Train<B>>>,
    labels: LabelSet,
}

impl<B: Backend> Evaluator<B> {
    /// Create an evaluator over a data loader
    pub fn new(loader: Arc<dyn DataLoader<Train<B>>>, labels: LabelSet) -> Self {
        Self { loader, labels }
    }

    /// Evaluate a model on every batch of the loader. Reports the mean batch loss along with
    /// "seq_f1", "precision" and "recall" and an "f1_<TYPE>" metric per entity type.
    pub fn evaluate_model<M: Model<B>>(&self, model: &M) -> anyhow::Result<Evaluation> {
        let mut loss_sum = 0.0;
        let mut n_batches = 0;
        let mut gold = Vec::new();
        let mut predicted = Vec::new();

        for batch in self.loader.iter() {
            let output = model.forward(batch);

            let [_, seq_length, _] = output.logits.dims();

            let targets = output.targets.into_data().convert::<i64>().value;
            let predictions = output.logits.argmax(2).into_data().convert::<i64>().value;

            let (batch_gold, batch_predicted) =
                decode_tags(&self.labels, &targets, &predictions, seq_length)?;

            gold.extend(batch_gold);
            predicted.extend(batch_predicted);

            loss_sum += output.loss.into_scalar().elem::<f64>();
            n_batches += 1;
        }

        if n_batches == 0 {
            return Err(anyhow!("Evaluation data has no batches"));
        }

        let report = seq_f1(&gold, &predicted);

        debug!("Evaluated {} sequences in {} batches", gold.len(), n_batches);

        Ok(to_evaluation(loss_sum / n_batches as f64, &report))
    }
}

/// Flatten a span report into evaluation metrics
pub fn to_evaluation(loss: f64, report: &Report) -> Evaluation {
    let evaluation = Evaluation::new(loss)
        .with_metric("seq_f1", report.micro.f1)
        .with_metric("precision", report.micro.precision)
        .with_metric("recall", report.micro.recall);

    report
        .per_label
        .iter()
        .fold(evaluation, |evaluation, (label, scores)| {
            evaluation.with_metric(format!("f1_{label}"), scores.f1)
        })
}

/// Turn flattened `[batch_size * seq_length]` target and prediction ids into word-level tag
/// sequences. Positions whose target is `X` or `[PAD]` are skipped, so only the first word piece
/// of each word is scored.
pub fn decode_tags(
    labels: &LabelSet,
    targets: &[i64],
    predictions: &[i64],
    seq_length: usize,
) -> anyhow::Result<(Vec<Vec<String>>, Vec<Vec<String>>)> {
    if targets.len() != predictions.len() {
        return Err(anyhow!(
            "{} targets but {} predictions",
            targets.len(),
            predictions.len()
        ));
    }

    if seq_length == 0 {
        return Ok((Vec::new(), Vec::new()));
    }

    let lookup = |id: i64| -> anyhow::Result<&str> {
        usize::try_from(id)
            .ok()
            .and_then(|id| labels.label(id))
            .ok_or_else(|| anyhow!("Label id {} is out of range", id))
    };

    let mut gold = Vec::new();
    let mut predicted = Vec::new();

    for (target_row, prediction_row) in targets
        .chunks(seq_length)
        .zip(predictions.chunks(seq_length))
    {
        let mut gold_tags = Vec::new();
        let mut predicted_tags = Vec::new();

        for (&target, &prediction) in target_row.iter().zip(prediction_row) {
            let target_id = usize::try_from(target)
                .map_err(|_| anyhow!("Label id {} is out of range", target))?;

            if labels.is_sentinel(target_id) {
                continue;
            }

            gold_tags.push(lookup(target)?.to_string());
            predicted_tags.push(lookup(prediction)?.to_string());
        }

        gold.push(gold_tags);
        predicted.push(predicted_tags);
    }

    Ok((gold, predicted))
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use crate::testing;

    use super::*;

    fn tags(values: &[&str]) -> Vec<String> {
        values.iter().map(|v| v.to_string()).collect()
    }

    #[test]
    fn test_decode_tags_skips_sentinel_targets() -> anyhow::Result<()> {
        let labels = testing::labels();
        // O=0 B-PER=1 I-PER=2 B-LOC=3 I-LOC=4 X=5 [PAD]=6
        let targets = [6, 1, 0, 0, 5, 6, 6, 3, 6, 6, 6, 6];
        let predictions = [0, 1, 0, 3, 1, 0, 0, 0, 0, 0, 0, 0];

        let (gold, predicted) = decode_tags(&labels, &targets, &predictions, 6)?;

        assert_eq!(gold, vec![tags(&["B-PER", "O", "O"]), tags(&["B-LOC"])]);
        assert_eq!(predicted, vec![tags(&["B-PER", "O", "B-LOC"]), tags(&["O"])]);

        Ok(())
    }

    #[test]
    fn test_decode_tags_keeps_sentinel_predictions() -> anyhow::Result<()> {
        let labels = testing::labels();

        let (_, predicted) = decode_tags(&labels, &[6, 1, 6], &[6, 5, 6], 3)?;

        assert_eq!(predicted, vec![tags(&["X"])]);

        Ok(())
    }

    #[test]
    fn test_decode_tags_rejects_unknown_ids() {
        let labels = testing::labels();

        let result = decode_tags(&labels, &[6, 1, 6], &[0, 42, 0], 3);

        assert!(result.is_err());
    }

    #[test]
    fn test_to_evaluation() {
        let gold = vec![tags(&["B-PER", "I-PER", "O", "B-LOC"])];
        let predicted = vec![tags(&["B-PER", "I-PER", "O", "O"])];

        let evaluation = to_evaluation(0.25, &seq_f1(&gold, &predicted));

        assert_eq!(evaluation.loss, 0.25);
        assert_eq!(evaluation.metric("precision"), Some(1.0));
        assert_eq!(evaluation.metric("recall"), Some(0.5));
        assert_eq!(evaluation.metric("f1_PER"), Some(1.0));
        assert_eq!(evaluation.metric("f1_LOC"), Some(0.0));
    }
}
