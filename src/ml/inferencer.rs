// ============================================================
// Layer 5 — Inferencer
// ============================================================
// Class probabilities for raw images with a trained network.
//
//   raw pixels [N, 32, 32, 3]
//       │  production normalization (unless already normalized)
//       ▼
//   chunks of `batch_size` images
//       │  forward pass on a plain (non-autodiff) backend:
//       │  dropout is inactive, batch-norm uses running stats
//       ▼
//   N rows of 10 probabilities
//
// The model is only read here; the same Inferencer can serve any
// number of predict calls.
//
// Reference: Burn Book §6 (Inference)

use anyhow::{ensure, Result};
use burn::{prelude::*, tensor::TensorData};

use crate::data::normalizer::NormalizationStats;
use crate::domain::image::{ImageSet, IMAGE_CHANNELS, IMAGE_HEIGHT, IMAGE_LEN, IMAGE_WIDTH, NUM_CLASSES};
use crate::infra::checkpoint::CheckpointManager;
use crate::ml::model::{ImageClassifier, ImageClassifierConfig, ModelError};

/// One row of class probabilities
pub type ClassProbabilities = [f32; NUM_CLASSES];

pub struct Inferencer<B: Backend> {
    model:  ImageClassifier<B>,
    stats:  NormalizationStats,
    device: B::Device,
}

impl<B: Backend> Inferencer<B> {
    /// Serve an in-memory model with the production statistics.
    pub fn new(model: ImageClassifier<B>, device: B::Device) -> Self {
        Self { model, stats: NormalizationStats::PRODUCTION, device }
    }

    /// Build the network and load the parameters saved in `ckpt`.
    pub fn from_checkpoint(ckpt: &CheckpointManager, device: B::Device) -> Result<Self> {
        let model_cfg = ImageClassifierConfig::new();
        model_cfg.validate()?;
        let model = ckpt.load_model(model_cfg.init::<B>(&device), &device)?;
        Ok(Self::new(model, device))
    }

    /// Override the statistics applied to raw input.
    pub fn with_stats(mut self, stats: NormalizationStats) -> Self {
        self.stats = stats;
        self
    }

    pub fn model(&self) -> &ImageClassifier<B> {
        &self.model
    }

    /// Probabilities for `pixels`, a flat NHWC buffer of whole images.
    /// `normalized` says whether the buffer is already normalized.
    pub fn predict(
        &self,
        pixels:     &[f32],
        batch_size: usize,
        normalized: bool,
    ) -> Result<Vec<ClassProbabilities>> {
        ensure!(batch_size > 0, "batch_size must be positive");
        if pixels.len() % IMAGE_LEN != 0 {
            return Err(ModelError::ShapeMismatch { actual: vec![pixels.len()] }.into());
        }

        let n_images = pixels.len() / IMAGE_LEN;
        // A batch never needs more than every image at once
        let per_chunk = batch_size.min(n_images).max(1);

        let mut out = Vec::with_capacity(n_images);
        for chunk in pixels.chunks(per_chunk * IMAGE_LEN) {
            let mut values = chunk.to_vec();
            if !normalized {
                self.stats.normalize(&mut values);
            }

            let n = values.len() / IMAGE_LEN;
            let images = Tensor::<B, 4>::from_data(
                TensorData::new(values, [n, IMAGE_HEIGHT, IMAGE_WIDTH, IMAGE_CHANNELS]),
                &self.device,
            );
            let probs = self
                .model
                .try_forward(images)?
                .into_data()
                .to_vec::<f32>()
                .map_err(|e| anyhow::anyhow!("Cannot read probabilities: {e:?}"))?;

            out.extend(probs.chunks_exact(NUM_CLASSES).map(|row| {
                let mut p = [0.0f32; NUM_CLASSES];
                p.copy_from_slice(row);
                p
            }));
        }

        tracing::debug!("Predicted {} images in batches of {}", out.len(), batch_size);
        Ok(out)
    }

    /// Predict every image of a raw (un-normalized) set.
    pub fn predict_set(&self, set: &ImageSet, batch_size: usize) -> Result<Vec<ClassProbabilities>> {
        self.predict(&set.pixels, batch_size, false)
    }

    /// Most probable class per image
    pub fn predict_classes(
        &self,
        pixels:     &[f32],
        batch_size: usize,
        normalized: bool,
    ) -> Result<Vec<usize>> {
        Ok(self.predict(pixels, batch_size, normalized)?.iter().map(argmax).collect())
    }
}

/// Index of the largest probability (first one on ties)
pub fn argmax(probs: &ClassProbabilities) -> usize {
    probs
        .iter()
        .enumerate()
        .fold((0, f32::NEG_INFINITY), |best, (i, &p)| if p > best.1 { (i, p) } else { best })
        .0
}

/// Fraction of images whose arg-max differs from the label (0/1 loss).
pub fn classification_error(probs: &[ClassProbabilities], labels: &[u8]) -> Result<f64> {
    ensure!(
        probs.len() == labels.len(),
        "{} predictions but {} labels",
        probs.len(),
        labels.len()
    );
    ensure!(!labels.is_empty(), "cannot score an empty set");

    let wrong = probs
        .iter()
        .zip(labels)
        .filter(|(p, label)| argmax(p) != **label as usize)
        .count();
    Ok(wrong as f64 / labels.len() as f64)
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use burn::backend::NdArray;

    type TestBackend = NdArray;

    fn probe(n: usize) -> Vec<f32> {
        (0..n * IMAGE_LEN).map(|i| ((i * 17) % 256) as f32).collect()
    }

    fn inferencer() -> Inferencer<TestBackend> {
        let device = Default::default();
        Inferencer::new(ImageClassifierConfig::new().init::<TestBackend>(&device), device)
    }

    #[test]
    fn test_predict_returns_probability_rows() {
        let probs = inferencer().predict(&probe(5), 2, false).unwrap();
        assert_eq!(probs.len(), 5);
        for row in probs {
            assert!(row.iter().all(|&p| p >= 0.0));
            assert_abs_diff_eq!(row.iter().sum::<f32>(), 1.0, epsilon = 1e-4);
        }
    }

    #[test]
    fn test_batch_size_does_not_change_results() {
        let inf = inferencer();
        let a = inf.predict(&probe(4), 1, false).unwrap();
        let b = inf.predict(&probe(4), 4, false).unwrap();
        for (x, y) in a.iter().zip(&b) {
            for (p, q) in x.iter().zip(y) {
                assert_abs_diff_eq!(p, q, epsilon = 1e-5);
            }
        }
    }

    #[test]
    fn test_prenormalized_flag_matches_manual_normalization() {
        let inf = inferencer();
        let raw = probe(2);
        let mut norm = raw.clone();
        NormalizationStats::PRODUCTION.normalize(&mut norm);

        let a = inf.predict(&raw, 2, false).unwrap();
        let b = inf.predict(&norm, 2, true).unwrap();
        for (x, y) in a.iter().zip(&b) {
            for (p, q) in x.iter().zip(y) {
                assert_abs_diff_eq!(p, q, epsilon = 1e-5);
            }
        }
    }

    #[test]
    fn test_oversized_batch_size_predicts_every_image() {
        let probs = inferencer().predict(&probe(2), usize::MAX, false).unwrap();
        assert_eq!(probs.len(), 2);
        assert!(inferencer().predict(&[], usize::MAX, false).unwrap().is_empty());
    }

    #[test]
    fn test_partial_image_is_rejected() {
        let err = inferencer().predict(&vec![0.0; IMAGE_LEN + 5], 8, false).unwrap_err();
        assert!(err.downcast_ref::<ModelError>().is_some());
    }

    #[test]
    fn test_save_load_save_load_gives_identical_outputs() {
        let dir    = tempfile::tempdir().unwrap();
        let device = Default::default();
        let first  = CheckpointManager::new(dir.path().join("first")).unwrap();
        let second = CheckpointManager::new(dir.path().join("second")).unwrap();

        let original = ImageClassifierConfig::new().init::<TestBackend>(&device);
        first.save_model(&original).unwrap();

        let loaded = Inferencer::<TestBackend>::from_checkpoint(&first, device).unwrap();
        second.save_model(loaded.model()).unwrap();
        let reloaded = Inferencer::<TestBackend>::from_checkpoint(&second, Default::default()).unwrap();

        let x = probe(3);
        let a = Inferencer::new(original, Default::default()).predict(&x, 3, false).unwrap();
        let b = loaded.predict(&x, 3, false).unwrap();
        let c = reloaded.predict(&x, 3, false).unwrap();
        assert_eq!(a, b);
        assert_eq!(b, c);
    }

    #[test]
    fn test_predict_classes_agree_with_probabilities() {
        let inf     = inferencer();
        let probs   = inf.predict(&probe(3), 3, false).unwrap();
        let classes = inf.predict_classes(&probe(3), 3, false).unwrap();
        assert_eq!(classes, probs.iter().map(argmax).collect::<Vec<_>>());
        assert!(classes.iter().all(|&c| c < NUM_CLASSES));
    }

    #[test]
    fn test_classification_error() {
        let mut probs = vec![[0.0f32; NUM_CLASSES]; 4];
        probs[0][3] = 1.0;
        probs[1][5] = 1.0;
        probs[2][0] = 1.0;
        probs[3][9] = 1.0;
        let err = classification_error(&probs, &[3, 5, 1, 2]).unwrap();
        assert_abs_diff_eq!(err, 0.5);
    }

    #[test]
    fn test_classification_error_rejects_length_mismatch() {
        let probs = vec![[0.1f32; NUM_CLASSES]; 2];
        assert!(classification_error(&probs, &[1]).is_err());
        assert!(classification_error(&[], &[]).is_err());
    }

    #[test]
    fn test_argmax_prefers_first_on_ties() {
        let mut p = [0.0f32; NUM_CLASSES];
        p[2] = 0.5;
        p[6] = 0.5;
        assert_eq!(argmax(&p), 2);
    }
}
