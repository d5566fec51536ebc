// ============================================================
// Layer 5 — Learning-rate Schedule
// ============================================================
// Step decay: the rate is constant inside each block of
// `drop_every` epochs and is multiplied by `factor` at every
// block boundary.
//
//   lr(epoch) = initial · factor^floor(epoch / drop_every)
//
// With the defaults (0.1, 0.5, 20):
//   epochs  0..19 → 0.1
//   epochs 20..39 → 0.05
//   epochs 40..59 → 0.025  ...
//
// The rate is recomputed from the epoch number alone at the
// start of every epoch, so it never depends on what happened in
// earlier epochs (including a learning rate restored from a
// previous run's log).
//
// Reference: PyTorch StepLR (lr · gamma^(epoch / step_size))

use anyhow::Result;

use crate::domain::epoch::OptimizerState;
use crate::domain::traits::EpochObserver;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StepDecay {
    pub initial:    f64,
    pub factor:     f64,
    pub drop_every: usize,
}

impl StepDecay {
    pub fn new(initial: f64, factor: f64, drop_every: usize) -> Self {
        Self { initial, factor, drop_every }
    }

    /// Scheduled rate for a zero-based epoch
    pub fn lr_at(&self, epoch: usize) -> f64 {
        if self.drop_every == 0 {
            return self.initial;
        }
        let drops = (epoch / self.drop_every) as i32;
        self.initial * self.factor.powi(drops)
    }
}

impl Default for StepDecay {
    fn default() -> Self {
        Self::new(0.1, 0.5, 20)
    }
}

impl EpochObserver for StepDecay {
    fn name(&self) -> &str {
        "step_decay"
    }

    fn on_epoch_begin(&mut self, epoch: usize, state: &mut OptimizerState) -> Result<()> {
        state.lr = self.lr_at(epoch);
        Ok(())
    }
}
