// ============================================================
// Layer 4 — Normalization Policy
// ============================================================
// Rescales raw pixel values to roughly zero mean and unit
// variance before they reach the network:
//
//   x' = (x - mean) / (std + 1e-7)
//
// Two sources of (mean, std), never mixed for one model:
//
//   Training   → computed once from the full training set and
//                applied to BOTH the training set and the held-out
//                set. Held-out data never contributes statistics.
//
//   Production → frozen constants (120.707, 64.15) captured from
//                a previous run on the standard training set. The
//                inference path uses these unless the caller says
//                its input is already normalized.
//
// The statistics are global: one mean and one std over every
// value in the tensor, not one per channel. The production
// constants were computed that way, so per-channel statistics
// would silently shift every input the saved weights see.
//
// Serving a model with statistics other than the ones it was
// trained with is NOT detected here. The training run records
// the statistics it used in train_config.json for auditing.
//
// Reference: Rust Book §13 (Iterators)

use serde::{Deserialize, Serialize};

use crate::domain::image::ImageSet;

/// Added to the standard deviation so a constant input never divides by zero
pub const NORMALIZATION_EPSILON: f64 = 1e-7;

/// A (mean, std) pair used to rescale images.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct NormalizationStats {
    pub mean: f64,
    pub std:  f64,
}

impl NormalizationStats {
    /// Constants for serving models trained on the standard training set
    pub const PRODUCTION: Self = Self { mean: 120.707, std: 64.15 };

    pub fn new(mean: f64, std: f64) -> Self {
        Self { mean, std }
    }

    /// Global mean and population standard deviation over every value.
    /// Accumulates in f64 so 150M-value training sets stay accurate.
    pub fn fit(values: &[f32]) -> Self {
        if values.is_empty() {
            return Self::new(0.0, 0.0);
        }
        let n    = values.len() as f64;
        let mean = values.iter().map(|&v| v as f64).sum::<f64>() / n;
        let var  = values
            .iter()
            .map(|&v| {
                let d = v as f64 - mean;
                d * d
            })
            .sum::<f64>()
            / n;
        Self::new(mean, var.sqrt())
    }

    /// Divisor applied after centring
    fn scale(&self) -> f64 {
        self.std + NORMALIZATION_EPSILON
    }

    /// Normalize a buffer in place
    pub fn normalize(&self, values: &mut [f32]) {
        let scale = self.scale();
        for v in values.iter_mut() {
            *v = ((*v as f64 - self.mean) / scale) as f32;
        }
    }

    /// Undo `normalize` in place
    pub fn denormalize(&self, values: &mut [f32]) {
        let scale = self.scale();
        for v in values.iter_mut() {
            *v = (*v as f64 * scale + self.mean) as f32;
        }
    }
}

/// Which statistics a caller wants applied.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum NormalizationMode {
    /// Statistics fitted on this run's training set
    Training(NormalizationStats),
    /// The frozen production constants
    Production,
}

impl NormalizationMode {
    pub fn stats(&self) -> NormalizationStats {
        match self {
            NormalizationMode::Training(stats) => *stats,
            NormalizationMode::Production      => NormalizationStats::PRODUCTION,
        }
    }
}

/// Fit statistics on `train` and apply them to both sets.
/// Returns the statistics so the caller can record them.
pub fn normalize_train_test(train: &mut ImageSet, test: &mut ImageSet) -> NormalizationStats {
    let stats = NormalizationStats::fit(&train.pixels);
    stats.normalize(&mut train.pixels);
    stats.normalize(&mut test.pixels);

    tracing::info!(
        "Normalization statistics from training set: mean={:.4}, std={:.4}",
        stats.mean,
        stats.std
    );
    stats
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::image::IMAGE_LEN;
    use approx::assert_abs_diff_eq;
    use rand::{rngs::StdRng, Rng, SeedableRng};

    fn random_set(n: usize, seed: u64) -> ImageSet {
        let mut rng = StdRng::seed_from_u64(seed);
        let pixels  = (0..n * IMAGE_LEN)
            .map(|_| rng.gen_range(0..=255u8) as f32)
            .collect();
        let labels  = (0..n).map(|i| (i % 10) as u8).collect();
        ImageSet::new(pixels, labels).unwrap()
    }

    #[test]
    fn test_fit_on_known_values() {
        let stats = NormalizationStats::fit(&[1.0, 2.0, 3.0, 4.0]);
        assert_abs_diff_eq!(stats.mean, 2.5, epsilon = 1e-12);
        // population std of 1..4
        assert_abs_diff_eq!(stats.std, 1.25f64.sqrt(), epsilon = 1e-12);
    }

    #[test]
    fn test_statistics_are_global_not_per_channel() {
        // Channel 0 is always 0, channels 1 and 2 always 30:
        // one global mean of 20 rather than three channel means.
        let pixels: Vec<f32> = (0..IMAGE_LEN)
            .map(|i| if i % 3 == 0 { 0.0 } else { 30.0 })
            .collect();
        let stats = NormalizationStats::fit(&pixels);
        assert_abs_diff_eq!(stats.mean, 20.0, epsilon = 1e-9);
    }

    #[test]
    fn test_training_normalization_gives_zero_mean_unit_std() {
        let mut train = random_set(4, 1);
        let mut test  = random_set(2, 2);
        normalize_train_test(&mut train, &mut test);

        let after = NormalizationStats::fit(&train.pixels);
        assert_abs_diff_eq!(after.mean, 0.0, epsilon = 1e-5);
        assert_abs_diff_eq!(after.std, 1.0, epsilon = 1e-5);
    }

    #[test]
    fn test_held_out_set_uses_training_statistics() {
        let mut train = random_set(2, 3);
        let mut test  = random_set(2, 4);
        let raw_test  = test.clone();
        let stats     = normalize_train_test(&mut train, &mut test);

        let expected = ((raw_test.pixels[5] as f64 - stats.mean) / (stats.std + 1e-7)) as f32;
        assert_abs_diff_eq!(test.pixels[5], expected, epsilon = 1e-6);
    }

    #[test]
    fn test_round_trip_training_stats() {
        let set       = random_set(1, 5);
        let stats     = NormalizationStats::fit(&set.pixels);
        let mut data  = set.pixels.clone();
        stats.normalize(&mut data);
        stats.denormalize(&mut data);
        for (a, b) in data.iter().zip(&set.pixels) {
            assert_abs_diff_eq!(a, b, epsilon = 1e-3);
        }
    }

    #[test]
    fn test_round_trip_production_stats() {
        let original: Vec<f32> = vec![0.0, 17.0, 120.707, 255.0];
        let mut data = original.clone();
        NormalizationStats::PRODUCTION.normalize(&mut data);
        assert_abs_diff_eq!(data[2], 0.0, epsilon = 1e-6);
        NormalizationStats::PRODUCTION.denormalize(&mut data);
        for (a, b) in data.iter().zip(&original) {
            assert_abs_diff_eq!(a, b, epsilon = 1e-3);
        }
    }

    #[test]
    fn test_constant_input_does_not_divide_by_zero() {
        let mut data = vec![5.0f32; 8];
        let stats    = NormalizationStats::fit(&data);
        stats.normalize(&mut data);
        assert!(data.iter().all(|v| v.is_finite() && *v == 0.0));
    }

    #[test]
    fn test_mode_selects_statistics() {
        let fitted = NormalizationStats::new(1.0, 2.0);
        assert_eq!(NormalizationMode::Training(fitted).stats(), fitted);
        assert_eq!(NormalizationMode::Production.stats(), NormalizationStats::PRODUCTION);
    }
}
