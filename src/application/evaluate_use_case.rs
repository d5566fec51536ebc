// ============================================================
// Layer 2 — EvaluateUseCase
// ============================================================
// Scores a network on the held-out images:
//
//   Step 1: Load the raw test set              (Layer 4 - data)
//   Step 2: Normalize and predict              (Layer 5 - ml)
//   Step 3: 0/1 classification error           (Layer 5 - ml)
//
// The test images are loaded again, un-normalized: prediction
// always starts from raw pixels. By default it applies the
// frozen production statistics, whether the model was just
// trained or loaded from disk; Training mode applies the
// statistics a run recorded instead.

use anyhow::Result;
use burn::prelude::*;

use crate::data::{loader::Cifar10Loader, normalizer::NormalizationMode};
use crate::domain::traits::DatasetSource;
use crate::ml::inferencer::{classification_error, Inferencer};

pub struct EvaluateUseCase {
    data_dir:   String,
    batch_size: usize,
    mode:       NormalizationMode,
}

impl EvaluateUseCase {
    pub fn new(data_dir: impl Into<String>, batch_size: usize) -> Self {
        Self { data_dir: data_dir.into(), batch_size, mode: NormalizationMode::Production }
    }

    pub fn with_mode(mut self, mode: NormalizationMode) -> Self {
        self.mode = mode;
        self
    }

    /// Fraction of held-out images the network gets wrong.
    pub fn classification_error<B: Backend>(&self, inferencer: Inferencer<B>) -> Result<f64> {
        let loader = Cifar10Loader::new(&self.data_dir);
        self.classification_error_with(&loader, inferencer)
    }

    pub fn classification_error_with<B: Backend>(
        &self,
        source:     &dyn DatasetSource,
        inferencer: Inferencer<B>,
    ) -> Result<f64> {
        let test       = source.load_test()?;
        let inferencer = inferencer.with_stats(self.mode.stats());

        tracing::info!("Predicting {} held-out images (batch={})", test.len(), self.batch_size);
        let probs = inferencer.predict_set(&test, self.batch_size)?;
        let error = classification_error(&probs, &test.labels)?;

        tracing::info!("Held-out accuracy: {:.2}%", (1.0 - error) * 100.0);
        Ok(error)
    }
}
