// ============================================================
// Layer 2 — TrainUseCase
// ============================================================
// Orchestrates a full training run in order:
//
//   Step 1: Load the CIFAR-10 train and test sets   (Layer 4 - data)
//   Step 2: Normalize both with train statistics    (Layer 4 - data)
//   Step 3: Build and validate the network          (Layer 5 - ml)
//   Step 4: Save the run config                     (Layer 6 - infra)
//   Step 5: Write the model summary                 (Layer 6 - infra)
//   Step 6: Run the training loop                   (Layer 5 - ml)
//
// The trained model is handed back on the inference backend so
// the caller can score it without reloading from disk.
//
// Reference: Rust Book §13 (Iterators and Closures)
//            Burn Book §5 (Training)

use anyhow::Result;
use burn::{module::AutodiffModule, tensor::backend::AutodiffBackend};
use serde::{Deserialize, Serialize};

use crate::data::{
    augment::AugmentConfig,
    dataset::ImageDataset,
    loader::Cifar10Loader,
    normalizer::{normalize_train_test, NormalizationStats},
};
use crate::domain::{
    image::{CLASS_NAMES, NUM_CLASSES},
    traits::DatasetSource,
};
use crate::infra::{
    checkpoint::CheckpointManager,
    metrics::{CsvLogger, ProgressLogger},
    summary::write_summary,
};
use crate::ml::{
    model::{ImageClassifier, ImageClassifierConfig},
    schedule::StepDecay,
    trainer::Trainer,
};

// ─── Training Configuration ──────────────────────────────────────────────────
// Every hyperparameter of a run. Serialisable so the run can be
// recorded next to its parameters in train_config.json.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrainConfig {
    pub save_dir:           String,
    pub data_dir:           String,
    pub batch_size:         usize,
    pub epochs:             usize,
    pub learning_rate:      f64,
    pub lr_drop_every:      usize,
    pub lr_drop_factor:     f64,
    /// Inverse-time decay per optimizer step
    pub lr_decay:           f64,
    pub momentum:           f64,
    pub weight_decay:       f64,
    pub seed:               u64,
    /// DataLoader threads producing augmented batches
    pub num_workers:        usize,
    pub predict_batch_size: usize,
    /// Keep log.csv rows from earlier runs
    pub append_log:         bool,
    pub augment:            AugmentConfig,
    /// Filled in once the training set has been seen
    pub normalization:      Option<NormalizationStats>,
}

impl Default for TrainConfig {
    fn default() -> Self {
        Self {
            save_dir:           "runs/cifar10vgg".to_string(),
            data_dir:           "data/cifar-10-batches-bin".to_string(),
            batch_size:         128,
            epochs:             250,
            learning_rate:      0.1,
            lr_drop_every:      20,
            lr_drop_factor:     0.5,
            lr_decay:           1e-6,
            momentum:           0.9,
            weight_decay:       0.0005,
            seed:               42,
            num_workers:        1,
            predict_batch_size: 50,
            append_log:         true,
            augment:            AugmentConfig::default(),
            normalization:      None,
        }
    }
}

impl TrainConfig {
    /// Layer hyperparameters derived from this run's settings
    pub fn model_config(&self) -> ImageClassifierConfig {
        ImageClassifierConfig::new()
            .with_num_classes(NUM_CLASSES)
            .with_weight_decay(self.weight_decay)
    }

    pub fn schedule(&self) -> StepDecay {
        StepDecay::new(self.learning_rate, self.lr_drop_factor, self.lr_drop_every)
    }
}

// ─── TrainUseCase ─────────────────────────────────────────────────────────────
pub struct TrainUseCase {
    config: TrainConfig,
}

impl TrainUseCase {
    pub fn new(config: TrainConfig) -> Self {
        Self { config }
    }

    /// Train from the dataset in `config.data_dir` and return the model
    /// on the inference backend.
    pub fn execute<B: AutodiffBackend>(&self, device: B::Device) -> Result<ImageClassifier<B::InnerBackend>> {
        let loader = Cifar10Loader::new(&self.config.data_dir);
        self.execute_with::<B>(&loader, device)
    }

    /// Same as `execute`, reading images from any source.
    pub fn execute_with<B: AutodiffBackend>(
        &self,
        source: &dyn DatasetSource,
        device: B::Device,
    ) -> Result<ImageClassifier<B::InnerBackend>> {
        let mut cfg = self.config.clone();

        // ── Step 1: Load images ───────────────────────────────────────────────
        tracing::info!("Loading dataset from '{}'", cfg.data_dir);
        let mut train = source.load_train()?;
        let mut test  = source.load_test()?;
        tracing::info!("Train shape {:?}, test shape {:?}", train.shape(), test.shape());
        for (name, count) in CLASS_NAMES.iter().zip(train.class_counts()) {
            tracing::debug!("  {:<10} {}", name, count);
        }

        // ── Step 2: Normalize ─────────────────────────────────────────────────
        // Statistics come from the training set only and are applied to both
        let stats = normalize_train_test(&mut train, &mut test);
        cfg.normalization = Some(stats);

        // ── Step 3: Build the network ─────────────────────────────────────────
        let model_cfg = cfg.model_config();
        model_cfg.validate()?;
        let model = model_cfg.init::<B>(&device);
        tracing::info!("Network ready: attention gates {:?}", model.attention_names());

        // ── Step 4: Record the run ────────────────────────────────────────────
        let ckpt = CheckpointManager::new(&cfg.save_dir)?;
        ckpt.save_config(&cfg)?;

        // ── Step 5: Model summary ─────────────────────────────────────────────
        write_summary(ckpt.dir(), &model_cfg)?;

        // ── Step 6: Training loop ─────────────────────────────────────────────
        let mut trainer = Trainer::<B>::new(&cfg, device)
            .with_observer(Box::new(cfg.schedule()))
            .with_observer(Box::new(CsvLogger::in_dir(ckpt.dir(), cfg.append_log)))
            .with_observer(Box::new(ProgressLogger::new(cfg.epochs)));

        let (model, history) =
            trainer.fit(model, ImageDataset::new(train), ImageDataset::new(test), &ckpt)?;
        if let Some(last) = history.last() {
            tracing::info!(
                "Final epoch: val_loss={:.4}, val_acc={:.2}%",
                last.val_loss,
                last.val_accuracy * 100.0
            );
        }

        Ok(model.valid())
    }
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;
    use burn::backend::{Autodiff, NdArray};

    use crate::domain::image::{ImageSet, IMAGE_LEN};
    use crate::infra::{checkpoint::CONFIG_FILE, metrics::LOG_FILE, summary::SUMMARY_FILE};

    struct SyntheticSource;

    impl SyntheticSource {
        fn set(n: usize) -> ImageSet {
            let pixels = (0..n * IMAGE_LEN).map(|i| ((i * 13) % 256) as f32).collect();
            let labels = (0..n).map(|i| (i % NUM_CLASSES) as u8).collect();
            ImageSet::new(pixels, labels).unwrap()
        }
    }

    impl DatasetSource for SyntheticSource {
        fn load_train(&self) -> Result<ImageSet> {
            Ok(Self::set(20))
        }

        fn load_test(&self) -> Result<ImageSet> {
            Ok(Self::set(10))
        }
    }

    #[test]
    fn test_default_hyperparameters() {
        let cfg = TrainConfig::default();
        assert_eq!(cfg.batch_size, 128);
        assert_eq!(cfg.epochs, 250);
        assert_eq!(cfg.learning_rate, 0.1);
        assert_eq!(cfg.schedule().lr_at(20), 0.05);
        assert_eq!(cfg.model_config().weight_decay, 0.0005);
    }

    #[test]
    fn test_execute_reads_data_dir_and_fails_fast_when_missing() {
        let dir = tempfile::tempdir().unwrap();
        let cfg = TrainConfig {
            save_dir: dir.path().join("run").to_string_lossy().into_owned(),
            data_dir: dir.path().join("missing").to_string_lossy().into_owned(),
            ..TrainConfig::default()
        };
        let result = TrainUseCase::new(cfg).execute::<Autodiff<NdArray>>(Default::default());
        assert!(result.is_err());
        assert!(!dir.path().join("run").exists());
    }

    #[test]
    fn test_execute_writes_run_artifacts() {
        let dir = tempfile::tempdir().unwrap();
        let cfg = TrainConfig {
            save_dir: dir.path().to_string_lossy().into_owned(),
            epochs: 1,
            batch_size: 10,
            ..TrainConfig::default()
        };

        TrainUseCase::new(cfg)
            .execute_with::<Autodiff<NdArray>>(&SyntheticSource, Default::default())
            .unwrap();

        for file in [CONFIG_FILE, LOG_FILE, SUMMARY_FILE, "cifar10vgg.mpk.gz"] {
            assert!(dir.path().join(file).exists(), "missing {file}");
        }
        let saved = CheckpointManager::new(dir.path()).unwrap().load_config().unwrap();
        assert!(saved.normalization.is_some());
    }
}
