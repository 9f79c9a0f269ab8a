use burn::{
    module::AutodiffModule,
    tensor::{backend::AutodiffBackend, ElementConversion, Tensor},
};

use crate::{
    pipelines::token_classification::{self, batcher::Train, evaluation::Evaluator, Output},
    training::{Evaluate, Evaluation, Trainable},
};

use super::Model;

/// Define training step
impl<B: AutodiffBackend> Trainable for Model<B> {
    type Batch = Train<B>;
    type Output = Output<B>;
    type Loss = Tensor<B, 1>;

    fn forward(&self, batch: Train<B>) -> anyhow::Result<Output<B>> {
        Ok(token_classification::Model::forward(self, batch))
    }

    fn compute_loss(&self, output: &Output<B>) -> Tensor<B, 1> {
        output.loss.clone()
    }

    fn loss_value(loss: &Tensor<B, 1>) -> f64 {
        loss.clone().into_scalar().elem::<f64>()
    }
}

/// Define validation step, run without gradient tracking
impl<B: AutodiffBackend> Evaluate<Model<B>> for Evaluator<B::InnerBackend> {
    fn evaluate(&self, model: &Model<B>) -> anyhow::Result<Evaluation> {
        self.evaluate_model(&model.valid())
    }
}
