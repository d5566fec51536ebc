// ============================================================
// Layer 3 — Core Traits (Abstractions)
// ============================================================
// The seams between layers. The application and ml layers
// program against these traits, so a different dataset reader
// or an extra per-epoch hook can be plugged in without touching
// the code that drives training.
//
// Reference: Rust Book §10 (Traits: Defining Shared Behaviour)
//            Rust Book §17 (Object Oriented Patterns)

use anyhow::Result;

use crate::domain::epoch::{EpochMetrics, OptimizerState};
use crate::domain::image::ImageSet;

// ─── DatasetSource ────────────────────────────────────────────────────────────
/// Any component that can provide the pre-partitioned dataset.
///
/// Implementations:
///   - Cifar10Loader → reads the CIFAR-10 binary batch files
pub trait DatasetSource {
    /// The training partition (raw pixel values, not normalized)
    fn load_train(&self) -> Result<ImageSet>;

    /// The held-out evaluation partition (raw pixel values)
    fn load_test(&self) -> Result<ImageSet>;
}

// ─── EpochObserver ────────────────────────────────────────────────────────────
/// One entry in the training loop's ordered hook list.
///
/// The loop calls every observer, in registration order, at three
/// points: once before the first epoch, at the start of each epoch,
/// and after each epoch's evaluation. Begin hooks may adjust the
/// optimizer state (that is how the schedule and the learning-rate
/// recovery work); end hooks only read it.
///
/// Implementations:
///   - StepDecay      → sets the scheduled rate each epoch
///   - CsvLogger      → appends log rows, recovers the last rate
///   - ProgressLogger → one tracing line per epoch
pub trait EpochObserver {
    /// Short name used in log messages
    fn name(&self) -> &str;

    fn on_train_begin(&mut self, _state: &mut OptimizerState) -> Result<()> {
        Ok(())
    }

    fn on_epoch_begin(&mut self, _epoch: usize, _state: &mut OptimizerState) -> Result<()> {
        Ok(())
    }

    fn on_epoch_end(&mut self, _metrics: &EpochMetrics, _state: &OptimizerState) -> Result<()> {
        Ok(())
    }
}
