// ============================================================
// Layer 6 — Training Log (CSV) and Progress Logging
// ============================================================
// Records one row per epoch to log.csv in the save directory.
//
// Columns (epoch first, the rest in alphabetical order):
//   epoch,accuracy,loss,lr,val_accuracy,val_loss
//
// Example:
//   epoch,accuracy,loss,lr,val_accuracy,val_loss
//   0,0.2214,4.9182,0.1,0.3105,3.8871
//   1,0.3540,3.2051,0.1,0.4012,2.9937
//
// Append mode:
//   Rows are appended across restarts; the header is written only
//   when the file is new or empty. Before the first epoch the
//   logger also tries to read the `lr` value of the last row and
//   put it back into the optimizer state. That recovery is best
//   effort: a missing, unreadable or malformed log is ignored and
//   training starts from the configured rate. Failing to WRITE a
//   row, on the other hand, is an error.
//
// Reference: Rust Book §9 (Error Handling)
//            Rust Book §12 (I/O and File Handling)

use anyhow::{anyhow, Context, Result};
use std::{
    fs::{self, OpenOptions},
    io::Write,
    path::{Path, PathBuf},
};

use crate::domain::epoch::{EpochMetrics, OptimizerState};
use crate::domain::traits::EpochObserver;

/// File name inside the save directory
pub const LOG_FILE: &str = "log.csv";

/// Header row, in column order
pub const LOG_COLUMNS: [&str; 6] = ["epoch", "accuracy", "loss", "lr", "val_accuracy", "val_loss"];

/// Appends epoch metrics to a CSV file.
pub struct CsvLogger {
    csv_path: PathBuf,
    append:   bool,
}

impl CsvLogger {
    pub fn new(csv_path: impl Into<PathBuf>, append: bool) -> Self {
        Self { csv_path: csv_path.into(), append }
    }

    /// Logger writing `log.csv` inside `dir`
    pub fn in_dir(dir: impl AsRef<Path>, append: bool) -> Self {
        Self::new(dir.as_ref().join(LOG_FILE), append)
    }

    /// Create (or truncate) the file and write the header when needed.
    fn prepare(&self) -> Result<()> {
        let has_rows = fs::metadata(&self.csv_path).map(|m| m.len() > 0).unwrap_or(false);
        if self.append && has_rows {
            return Ok(());
        }

        let mut f = fs::File::create(&self.csv_path)
            .with_context(|| format!("Cannot create training log '{}'", self.csv_path.display()))?;
        writeln!(f, "{}", LOG_COLUMNS.join(","))?;
        tracing::debug!("Created training log: '{}'", self.csv_path.display());
        Ok(())
    }

    /// Append one epoch's metrics as a new row.
    pub fn log(&self, m: &EpochMetrics) -> Result<()> {
        let mut f = OpenOptions::new()
            .append(true)
            .create(true)
            .open(&self.csv_path)
            .with_context(|| format!("Cannot open training log '{}'", self.csv_path.display()))?;

        writeln!(
            f,
            "{},{},{},{},{},{}",
            m.epoch, m.accuracy, m.loss, m.lr, m.val_accuracy, m.val_loss,
        )
        .with_context(|| format!("Cannot append to training log '{}'", self.csv_path.display()))?;

        tracing::debug!("Logged epoch {} (lr={})", m.epoch, m.lr);
        Ok(())
    }
}

/// Read the `lr` value of the last data row of a training log.
pub fn recover_last_lr(path: &Path) -> Result<f64> {
    let text = fs::read_to_string(path)?;
    let mut lines = text.lines().filter(|l| !l.trim().is_empty());

    let header = lines.next().ok_or_else(|| anyhow!("log is empty"))?;
    let column = header
        .split(',')
        .position(|name| name.trim() == "lr")
        .ok_or_else(|| anyhow!("log has no 'lr' column"))?;

    let last = lines.last().ok_or_else(|| anyhow!("log has no data rows"))?;
    let value = last
        .split(',')
        .nth(column)
        .ok_or_else(|| anyhow!("last row has no 'lr' field"))?;

    let lr: f64 = value.trim().parse()?;
    if !lr.is_finite() || lr <= 0.0 {
        return Err(anyhow!("recovered learning rate {lr} is not a positive number"));
    }
    Ok(lr)
}

impl EpochObserver for CsvLogger {
    fn name(&self) -> &str {
        "csv_logger"
    }

    fn on_train_begin(&mut self, state: &mut OptimizerState) -> Result<()> {
        if self.append && self.csv_path.exists() {
            match recover_last_lr(&self.csv_path) {
                Ok(lr) => {
                    tracing::info!("Restored learning rate {} from '{}'", lr, self.csv_path.display());
                    state.lr = lr;
                }
                Err(e) => {
                    tracing::debug!("Learning-rate recovery skipped: {e}");
                }
            }
        }
        self.prepare()
    }

    fn on_epoch_end(&mut self, metrics: &EpochMetrics, _state: &OptimizerState) -> Result<()> {
        self.log(metrics)
    }
}

// ─── ProgressLogger ───────────────────────────────────────────────────────────
/// Emits one tracing line per epoch and remembers the best val_loss.
pub struct ProgressLogger {
    epochs:        usize,
    best_val_loss: f64,
}

impl ProgressLogger {
    pub fn new(epochs: usize) -> Self {
        Self { epochs, best_val_loss: f64::INFINITY }
    }
}

impl EpochObserver for ProgressLogger {
    fn name(&self) -> &str {
        "progress"
    }

    fn on_epoch_end(&mut self, m: &EpochMetrics, state: &OptimizerState) -> Result<()> {
        tracing::info!(
            "Epoch {:>3}/{} | loss={:.4} | acc={:.2}% | val_loss={:.4} | val_acc={:.2}% | lr={} | steps={}",
            m.epoch + 1,
            self.epochs,
            m.loss,
            m.accuracy * 100.0,
            m.val_loss,
            m.val_accuracy * 100.0,
            m.lr,
            state.iterations,
        );
        if m.is_improvement(self.best_val_loss) {
            self.best_val_loss = m.val_loss;
            tracing::debug!("New best val_loss {:.4} at epoch {}", m.val_loss, m.epoch);
        }
        Ok(())
    }
}
