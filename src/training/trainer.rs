use std::{collections::BTreeMap, sync::Arc};

use anyhow::Context;

use crate::tracking::{ExperimentLogger, NoopLogger};

use super::{Batches, Evaluate, Evaluation, Optimize, Schedule, Trainable};

/// Epoch and evaluation settings for the training loop
#[derive(burn::config::Config)]
pub struct TrainerConfig {
    /// Number of passes over the training batches
    #[config(default = 3)]
    pub epochs: usize,

    /// Run an evaluation pass every this many global steps (0 disables periodic evaluation)
    #[config(default = 100)]
    pub evaluate_every: usize,

    /// Log training progress every this many global steps
    #[config(default = 50)]
    pub log_every: usize,
}

/// What a finished training run hands back
#[derive(Debug)]
pub struct TrainingSummary<M> {
    /// The model after the last step of the last epoch. This is not selected by any metric.
    pub model: M,

    /// The number of optimization steps taken
    pub global_step: usize,

    /// Each periodic evaluation with the global step it ran at
    pub evaluations: Vec<(usize, Evaluation)>,

    /// The loss of the last step, if any step ran
    pub final_loss: Option<f64>,
}

/// Drives a model through epochs of batches, one optimization step per batch, evaluating every
/// `evaluate_every` global steps. Any failure aborts the run.
pub struct Trainer<O, S, E> {
    optimizer: O,
    schedule: S,
    evaluator: Option<E>,
    config: TrainerConfig,
    logger: Arc<dyn ExperimentLogger>,
}

impl<O, S, E> Trainer<O, S, E> {
    /// Create a trainer without an evaluator
    pub fn new(optimizer: O, schedule: S, config: TrainerConfig) -> Self {
        Self {
            optimizer,
            schedule,
            evaluator: None,
            config,
            logger: Arc::new(NoopLogger),
        }
    }

    /// Evaluate on held-out data every `evaluate_every` steps
    pub fn with_evaluator(mut self, evaluator: E) -> Self {
        self.evaluator = Some(evaluator);
        self
    }

    /// Send step and evaluation metrics to an experiment logger
    pub fn with_logger(mut self, logger: Arc<dyn ExperimentLogger>) -> Self {
        self.logger = logger;
        self
    }

    /// Train the model, consuming the trainer and the optimizer state with it
    pub fn train<M, D>(self, model: M, data: &D) -> anyhow::Result<TrainingSummary<M>>
    where
        M: Trainable,
        D: Batches<Batch = M::Batch> + ?Sized,
        O: Optimize<M>,
        S: Schedule,
        E: Evaluate<M>,
    {
        let Self {
            mut optimizer,
            mut schedule,
            evaluator,
            config,
            logger,
        } = self;

        if config.evaluate_every > 0 && evaluator.is_none() {
            warn!("No evaluation data available, periodic evaluation is skipped");
        }

        let mut model = model;
        let mut global_step = 0;
        let mut evaluations = Vec::new();
        let mut final_loss = None;

        for epoch in 1..=config.epochs {
            let mut loss_sum = 0.0;
            let mut epoch_steps = 0;

            for batch in data.batches() {
                let step = global_step + 1;

                let output = model
                    .forward(batch)
                    .with_context(|| format!("Forward pass failed at step {step}"))?;

                let loss = model.compute_loss(&output);
                let loss_value = M::loss_value(&loss);
                drop(output);

                let lr = schedule.step();
                model = optimizer.step(lr, model, loss);

                global_step = step;
                epoch_steps += 1;
                loss_sum += loss_value;
                final_loss = Some(loss_value);

                if !loss_value.is_finite() {
                    warn!("Non-finite training loss {} at step {}", loss_value, step);
                }

                if config.log_every > 0 && step % config.log_every == 0 {
                    info!(
                        "Epoch {}/{} step {}: loss {:.4}, lr {:.3e}",
                        epoch, config.epochs, step, loss_value, lr
                    );
                }

                logger.log_metrics(
                    &BTreeMap::from([
                        ("train_loss".to_string(), loss_value),
                        ("learning_rate".to_string(), lr),
                    ]),
                    step,
                );

                if config.evaluate_every == 0 || step % config.evaluate_every != 0 {
                    continue;
                }

                if let Some(evaluator) = &evaluator {
                    let evaluation = evaluator
                        .evaluate(&model)
                        .with_context(|| format!("Evaluation failed at step {step}"))?;

                    info!(
                        "Evaluation at step {}: loss {:.4} {}",
                        step,
                        evaluation.loss,
                        format_metrics(&evaluation.metrics)
                    );

                    logger.log_metrics(&prefixed("dev", &evaluation), step);

                    evaluations.push((step, evaluation));
                }
            }

            if epoch_steps > 0 {
                info!(
                    "Finished epoch {}/{}: {} steps, mean loss {:.4}",
                    epoch,
                    config.epochs,
                    epoch_steps,
                    loss_sum / epoch_steps as f64
                );
            } else {
                warn!("Epoch {}/{} had no training batches", epoch, config.epochs);
            }
        }

        Ok(TrainingSummary {
            model,
            global_step,
            evaluations,
            final_loss,
        })
    }
}

/// Flatten an evaluation into metric names with a split prefix (e.g., "dev_seq_f1")
pub fn prefixed(split: &str, evaluation: &Evaluation) -> BTreeMap<String, f64> {
    let mut metrics: BTreeMap<String, f64> = evaluation
        .metrics
        .iter()
        .map(|(name, value)| (format!("{split}_{name}"), *value))
        .collect();

    metrics.insert(format!("{split}_loss"), evaluation.loss);

    metrics
}

fn format_metrics(metrics: &BTreeMap<String, f64>) -> String {
    metrics
        .iter()
        .map(|(name, value)| format!("{name} {value:.4}"))
        .collect::<Vec<_>>()
        .join(", ")
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn test_prefixed() {
        let evaluation = Evaluation::new(0.5).with_metric("seq_f1", 0.8);

        let metrics = prefixed("test", &evaluation);

        assert_eq!(
            metrics,
            BTreeMap::from([
                ("test_loss".to_string(), 0.5),
                ("test_seq_f1".to_string(), 0.8)
            ])
        );
    }
}
