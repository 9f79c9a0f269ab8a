use burn::LearningRate;

/// A learning-rate schedule advanced once per optimization step
pub trait Schedule {
    /// Return the learning rate for the current step and advance to the next one
    fn step(&mut self) -> LearningRate;
}

/// Linear warmup from zero to the base learning rate, then linear decay back to zero at the end
/// of training
///
/// Formula:
/// - `t < warmup`: `lr * t / warmup`
/// - otherwise: `lr * max(0, (total - t) / (total - warmup))`
#[derive(Clone, Debug)]
pub struct WarmupLinear {
    learning_rate: LearningRate,
    warmup_steps: usize,
    total_steps: usize,
    current_step: usize,
}

impl WarmupLinear {
    /// Create a schedule with an explicit number of warmup steps
    pub fn new(learning_rate: LearningRate, warmup_steps: usize, total_steps: usize) -> Self {
        Self {
            learning_rate,
            warmup_steps: warmup_steps.min(total_steps),
            total_steps,
            current_step: 0,
        }
    }

    /// Create a schedule that warms up over a fraction of the total steps
    pub fn with_proportion(
        learning_rate: LearningRate,
        warmup_proportion: f64,
        total_steps: usize,
    ) -> Self {
        let warmup_steps = (warmup_proportion.clamp(0.0, 1.0) * total_steps as f64) as usize;

        Self::new(learning_rate, warmup_steps, total_steps)
    }

    /// The number of warmup steps
    pub fn warmup_steps(&self) -> usize {
        self.warmup_steps
    }

    /// The learning rate at the current step, without advancing
    pub fn current(&self) -> LearningRate {
        let step = self.current_step as f64;

        if self.current_step < self.warmup_steps {
            return self.learning_rate * step / self.warmup_steps as f64;
        }

        let decay_steps = self.total_steps.saturating_sub(self.warmup_steps);
        if decay_steps == 0 {
            return self.learning_rate;
        }

        let remaining = self.total_steps.saturating_sub(self.current_step) as f64;

        self.learning_rate * (remaining / decay_steps as f64).max(0.0)
    }
}

impl Schedule for WarmupLinear {
    fn step(&mut self) -> LearningRate {
        let lr = self.current();
        self.current_step += 1;

        lr
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    fn approx(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-12
    }

    #[test]
    fn test_warmup_then_decay() {
        let mut schedule = WarmupLinear::new(1.0, 2, 6);

        let rates: Vec<_> = (0..7).map(|_| schedule.step()).collect();

        let expected = [0.0, 0.5, 1.0, 0.75, 0.5, 0.25, 0.0];
        for (rate, expected) in rates.iter().zip(expected) {
            assert!(approx(*rate, expected), "{rate} != {expected}");
        }
    }

    #[test]
    fn test_proportion() {
        let schedule = WarmupLinear::with_proportion(2e-5, 0.1, 300);

        assert_eq!(schedule.warmup_steps(), 30);
        assert!(approx(schedule.current(), 0.0));
    }

    #[test]
    fn test_without_warmup() {
        let mut schedule = WarmupLinear::new(1.0, 0, 4);

        assert!(approx(schedule.step(), 1.0));
        assert!(approx(schedule.step(), 0.75));
    }

    #[test]
    fn test_never_negative() {
        let mut schedule = WarmupLinear::new(1.0, 1, 2);

        let rates: Vec<_> = (0..5).map(|_| schedule.step()).collect();

        assert!(rates.iter().all(|rate| *rate >= 0.0));
        assert!(approx(rates[4], 0.0));
    }
}
