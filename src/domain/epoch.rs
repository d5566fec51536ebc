// ============================================================
// Layer 3 — Epoch Domain Types
// ============================================================
// What one training epoch reports (EpochMetrics) and the part
// of the optimizer that epoch observers may look at or adjust
// (OptimizerState).
//
// The learning rate lives here rather than inside the Burn
// optimizer: Burn's `Optimizer::step` takes the rate as an
// argument, so the training loop reads `effective_lr()` every
// step and the observers steer it between epochs.
//
// Reference: Rust Book §5 (Structs and Methods)

use serde::{Deserialize, Serialize};

/// One row of metrics for a single training epoch
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EpochMetrics {
    /// Zero-based epoch index
    pub epoch: usize,

    /// Mean training loss over the epoch's steps (cross-entropy + L2)
    pub loss: f64,

    /// Fraction of training samples classified correctly
    pub accuracy: f64,

    /// Loss on the held-out evaluation set
    pub val_loss: f64,

    /// Fraction of held-out samples classified correctly
    pub val_accuracy: f64,

    /// Scheduled learning rate used during this epoch
    pub lr: f64,
}

impl EpochMetrics {
    /// Returns true if this epoch improved over the previous best val_loss
    pub fn is_improvement(&self, best_val_loss: f64) -> bool {
        self.val_loss < best_val_loss
    }
}

/// Learning-rate state shared between the training loop and its observers.
#[derive(Debug, Clone, PartialEq)]
pub struct OptimizerState {
    /// Scheduled learning rate for the current epoch
    pub lr: f64,

    /// Number of optimizer steps applied since training began
    pub iterations: u64,

    /// Inverse-time decay coefficient applied on top of `lr`
    pub decay: f64,
}

impl OptimizerState {
    pub fn new(lr: f64, decay: f64) -> Self {
        Self { lr, iterations: 0, decay }
    }

    /// Rate actually handed to the optimizer for the next step:
    ///   lr / (1 + decay * iterations)
    pub fn effective_lr(&self) -> f64 {
        self.lr / (1.0 + self.decay * self.iterations as f64)
    }
}
