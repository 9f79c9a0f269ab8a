use std::marker::PhantomData;

use burn::{
    grad_clipping::GradientClippingConfig,
    module::AutodiffModule,
    optim::{AdamWConfig, GradientsParams, Optimizer},
    tensor::{backend::AutodiffBackend, Tensor},
    LearningRate,
};

use super::{schedule::WarmupLinear, Optimize, Trainable};

/// Optimizer hyperparameters
#[derive(burn::config::Config)]
pub struct OptimizerConfig {
    /// Peak learning rate
    #[config(default = 2e-5)]
    pub learning_rate: LearningRate,

    /// Fraction of the total steps spent warming up
    #[config(default = 0.1)]
    pub warmup_proportion: f64,

    /// Adam epsilon
    #[config(default = 1e-8)]
    pub adam_epsilon: f32,

    /// Decoupled weight decay
    #[config(default = 0.01)]
    pub weight_decay: f32,

    /// Gradients are clipped to this norm
    #[config(default = 1.0)]
    pub max_grad_norm: f32,
}

/// Runs the backward pass on a scalar loss and applies a burn optimizer to the model
pub struct Backprop<O, B> {
    optim: O,
    backend: PhantomData<B>,
}

impl<O, B> Backprop<O, B> {
    /// Wrap a burn optimizer
    pub fn new(optim: O) -> Self {
        Self {
            optim,
            backend: PhantomData,
        }
    }
}

impl<O, B, M> Optimize<M> for Backprop<O, B>
where
    B: AutodiffBackend,
    M: Trainable<Loss = Tensor<B, 1>> + AutodiffModule<B>,
    O: Optimizer<M, B>,
{
    fn step(&mut self, lr: LearningRate, model: M, loss: Tensor<B, 1>) -> M {
        let grads = loss.backward();
        let grads = GradientsParams::from_grads(grads, &model);

        self.optim.step(lr, model, grads)
    }
}

/// Create the AdamW optimizer and its warmup-linear schedule, sized for `n_batches` per epoch
pub fn initialize_optimizer<B, M>(
    config: &OptimizerConfig,
    n_batches: usize,
    n_epochs: usize,
) -> (Backprop<impl Optimizer<M, B>, B>, WarmupLinear)
where
    B: AutodiffBackend,
    M: AutodiffModule<B>,
{
    let total_steps = n_batches * n_epochs;

    let optim = AdamWConfig::new()
        .with_epsilon(config.adam_epsilon)
        .with_weight_decay(config.weight_decay)
        .with_grad_clipping(Some(GradientClippingConfig::Norm(config.max_grad_norm)))
        .init::<B, M>();

    let schedule =
        WarmupLinear::with_proportion(config.learning_rate, config.warmup_proportion, total_steps);

    info!(
        "Optimizer: AdamW, lr {}, {} total steps, {} warmup steps",
        config.learning_rate,
        total_steps,
        schedule.warmup_steps()
    );

    (Backprop::new(optim), schedule)
}
