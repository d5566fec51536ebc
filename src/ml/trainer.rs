// ============================================================
// Layer 5 — Training Loop
// ============================================================
// Runs the epochs: augmented batches from the DataLoader in, SGD
// updates out, one EpochMetrics row per epoch handed to the
// observers.
//
// Per epoch:
//   observers.on_epoch_begin   (step decay sets lr here)
//   for each augmented batch:
//       loss = cross_entropy(logits, one-hot) + L2 penalty
//       backward → SGD (momentum 0.9, Nesterov) with
//                  lr / (1 + decay · iterations)
//       iterations += 1
//   evaluate on the held-out set with model.valid()
//       (dropout off, batch-norm uses running statistics)
//   observers.on_epoch_end     (CSV row, progress line)
//
// After the last epoch the parameters are written through the
// CheckpointManager and the trained model is returned.
//
// Key Burn 0.20 points:
//   - Training runs on an AutodiffBackend B
//   - model.valid() returns the model on B::InnerBackend, which
//     shares B's device type, so evaluation needs no copy
//   - argmax(1) returns [N, 1]; flatten before .equal()
//
// Reference: Burn Book §5 (Training)
//            Sutskever et al. (2013) On the importance of momentum

use anyhow::{ensure, Result};
use burn::{
    data::dataloader::DataLoader,
    module::AutodiffModule,
    optim::{momentum::MomentumConfig, GradientsParams, Optimizer, SgdConfig},
    prelude::*,
    tensor::{activation::log_softmax, backend::AutodiffBackend},
};

use crate::application::train_use_case::TrainConfig;
use crate::data::{
    batcher::ImageBatch,
    dataset::ImageDataset,
    pipeline::{eval_loader, AugmentationPipeline, PipelineConfig},
};
use crate::domain::{
    epoch::{EpochMetrics, OptimizerState},
    traits::EpochObserver,
};
use crate::infra::checkpoint::CheckpointManager;
use crate::ml::model::ImageClassifier;

/// Owns the observer list and drives `fit`.
pub struct Trainer<B: AutodiffBackend> {
    config:    TrainConfig,
    device:    B::Device,
    observers: Vec<Box<dyn EpochObserver>>,
}

impl<B: AutodiffBackend> Trainer<B> {
    pub fn new(config: &TrainConfig, device: B::Device) -> Self {
        Self { config: config.clone(), device, observers: Vec::new() }
    }

    /// Observers run in the order they were added.
    pub fn with_observer(mut self, observer: Box<dyn EpochObserver>) -> Self {
        self.observers.push(observer);
        self
    }

    pub fn observer_names(&self) -> Vec<&str> {
        self.observers.iter().map(|o| o.name()).collect()
    }

    /// Train for `config.epochs` epochs and persist the final parameters.
    ///
    /// `train` and `eval` must already be normalized with the same statistics.
    pub fn fit(
        &mut self,
        mut model: ImageClassifier<B>,
        train:     ImageDataset,
        eval:      ImageDataset,
        ckpt:      &CheckpointManager,
    ) -> Result<(ImageClassifier<B>, Vec<EpochMetrics>)> {
        let cfg = &self.config;
        ensure!(cfg.batch_size > 0, "batch_size must be positive");

        let pipeline = AugmentationPipeline::<B>::new(
            train,
            PipelineConfig {
                batch_size:  cfg.batch_size,
                num_workers: cfg.num_workers,
                seed:        cfg.seed,
                augment:     cfg.augment,
            },
            &self.device,
        );
        let steps = pipeline.steps_per_epoch();
        ensure!(
            steps > 0,
            "training set is smaller than one batch (batch_size={})",
            cfg.batch_size
        );

        // ── SGD with Nesterov momentum ────────────────────────────────────────
        // v = μ·v + g
        // θ = θ - lr · (g + μ·v)
        let optim_cfg = SgdConfig::new().with_momentum(Some(
            MomentumConfig::new()
                .with_momentum(cfg.momentum)
                .with_dampening(0.0)
                .with_nesterov(true),
        ));
        let mut optim = optim_cfg.init::<B, ImageClassifier<B>>();

        // Evaluation runs on the inner backend, no autodiff overhead
        let eval_batches = eval_loader::<B::InnerBackend>(eval, cfg.batch_size, cfg.num_workers, &self.device);

        let mut state = OptimizerState::new(cfg.learning_rate, cfg.lr_decay);
        let mut history = Vec::with_capacity(cfg.epochs);

        tracing::info!(
            "Training {} epochs × {} steps (batch={}, observers={:?})",
            cfg.epochs,
            steps,
            cfg.batch_size,
            self.observer_names(),
        );

        for observer in self.observers.iter_mut() {
            observer.on_train_begin(&mut state)?;
        }

        for epoch in 0..cfg.epochs {
            for observer in self.observers.iter_mut() {
                observer.on_epoch_begin(epoch, &mut state)?;
            }
            let epoch_lr = state.lr;

            // ── Training phase ────────────────────────────────────────────────
            let mut loss_sum = 0.0f64;
            let mut batches  = 0usize;
            let mut correct  = 0usize;
            let mut seen     = 0usize;

            for batch in pipeline.epoch(epoch) {
                let n      = batch.len();
                let logits = model.forward_logits(batch.images);
                let loss   = cross_entropy(logits.clone(), batch.targets) + model.l2_penalty();

                loss_sum += loss.clone().into_scalar().elem::<f64>();
                batches  += 1;
                correct  += count_correct(logits, batch.labels);
                seen     += n;

                let grads = loss.backward();
                let grads = GradientsParams::from_grads(grads, &model);
                model = optim.step(state.effective_lr(), model, grads);
                state.iterations += 1;
            }

            let loss     = if batches > 0 { loss_sum / batches as f64 } else { f64::NAN };
            let accuracy = if seen > 0 { correct as f64 / seen as f64 } else { 0.0 };

            // ── Evaluation phase ──────────────────────────────────────────────
            let (val_loss, val_accuracy) = evaluate(&model.valid(), eval_batches.as_ref());

            let metrics = EpochMetrics { epoch, loss, accuracy, val_loss, val_accuracy, lr: epoch_lr };
            for observer in self.observers.iter_mut() {
                observer.on_epoch_end(&metrics, &state)?;
            }
            history.push(metrics);
        }

        let path = ckpt.save_model(&model)?;
        tracing::info!("Training complete, parameters saved to '{}'", path.display());
        Ok((model, history))
    }
}

/// Mean categorical cross-entropy between logits and one-hot targets.
pub fn cross_entropy<B: Backend>(logits: Tensor<B, 2>, targets: Tensor<B, 2>) -> Tensor<B, 1> {
    (log_softmax(logits, 1) * targets).sum_dim(1).mean().neg()
}

/// Number of rows whose arg-max equals the label.
pub fn count_correct<B: Backend>(logits: Tensor<B, 2>, labels: Tensor<B, 1, Int>) -> usize {
    // argmax(1) is [N, 1]; flatten to [N] before comparing
    let predicted = logits.argmax(1).flatten::<1>(0, 1);
    predicted.equal(labels).int().sum().into_scalar().elem::<i64>() as usize
}

/// Loss (cross-entropy + L2) and accuracy over every batch of `loader`.
pub fn evaluate<B: Backend>(
    model:  &ImageClassifier<B>,
    loader: &dyn DataLoader<B, ImageBatch<B>>,
) -> (f64, f64) {
    let mut ce_sum  = 0.0f64;
    let mut correct = 0usize;
    let mut seen    = 0usize;

    for batch in loader.iter() {
        let n      = batch.len();
        let logits = model.forward_logits(batch.images);
        let ce     = cross_entropy(logits.clone(), batch.targets).into_scalar().elem::<f64>();
        ce_sum  += ce * n as f64;
        correct += count_correct(logits, batch.labels);
        seen    += n;
    }

    if seen == 0 {
        return (f64::NAN, 0.0);
    }
    let n       = seen as f64;
    let penalty = model.l2_penalty().into_scalar().elem::<f64>();
    (ce_sum / n + penalty, correct as f64 / n)
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use burn::backend::{Autodiff, NdArray};
    use burn::tensor::TensorData;

    use std::sync::{Arc, Mutex};

    use crate::domain::image::{ImageSet, IMAGE_LEN};
    use crate::infra::metrics::{CsvLogger, LOG_COLUMNS, LOG_FILE};
    use crate::ml::model::ImageClassifierConfig;
    use crate::ml::schedule::StepDecay;

    type TestBackend   = NdArray;
    type TestAdBackend = Autodiff<NdArray>;

    fn tiny_set(n: usize, seed: usize) -> ImageSet {
        let pixels = (0..n * IMAGE_LEN)
            .map(|i| (((i * 31 + seed * 7) % 255) as f32 - 127.0) / 64.0)
            .collect();
        let labels = (0..n).map(|i| ((i + seed) % 10) as u8).collect();
        ImageSet::new(pixels, labels).unwrap()
    }

    #[test]
    fn test_cross_entropy_of_uniform_logits_is_ln_classes() {
        let device  = Default::default();
        let logits  = Tensor::<TestBackend, 2>::zeros([2, 10], &device);
        let mut oh  = vec![0.0f32; 20];
        oh[3]       = 1.0;
        oh[10 + 7]  = 1.0;
        let targets = Tensor::<TestBackend, 2>::from_data(TensorData::new(oh, [2, 10]), &device);

        let ce = cross_entropy(logits, targets).into_scalar().elem::<f64>();
        assert_abs_diff_eq!(ce, (10.0f64).ln(), epsilon = 1e-5);
    }

    #[test]
    fn test_count_correct() {
        let device = Default::default();
        let logits = Tensor::<TestBackend, 2>::from_data(
            TensorData::new(vec![0.1f32, 0.9, 0.8, 0.2, 0.3, 0.7], [3, 2]),
            &device,
        );
        let labels = Tensor::<TestBackend, 1, Int>::from_data(TensorData::new(vec![1i64, 1, 1], [3]), &device);
        assert_eq!(count_correct(logits, labels), 2);
    }

    #[test]
    fn test_evaluate_reports_probabilities_and_finite_loss() {
        let device = Default::default();
        let model  = ImageClassifierConfig::new().init::<TestBackend>(&device);
        let loader = eval_loader::<TestBackend>(ImageDataset::new(tiny_set(7, 1)), 3, 1, &device);

        let (loss, acc) = evaluate(&model, loader.as_ref());
        assert!(loss.is_finite() && loss > 0.0);
        assert!((0.0..=1.0).contains(&acc));
    }

    #[test]
    fn test_one_epoch_writes_single_log_row() {
        let dir    = tempfile::tempdir().unwrap();
        let device = Default::default();
        let ckpt   = CheckpointManager::new(dir.path()).unwrap();

        let config = TrainConfig {
            epochs: 1,
            batch_size: 10,
            ..TrainConfig::default()
        };
        let model = ImageClassifierConfig::new().init::<TestAdBackend>(&device);
        let train = ImageDataset::new(tiny_set(20, 0));
        let eval  = ImageDataset::new(tiny_set(10, 3));

        let mut trainer = Trainer::<TestAdBackend>::new(&config, device)
            .with_observer(Box::new(StepDecay::default()))
            .with_observer(Box::new(CsvLogger::in_dir(dir.path(), true)));
        let (_model, history) = trainer.fit(model, train, eval, &ckpt).unwrap();

        assert_eq!(history.len(), 1);
        assert_eq!(history[0].lr, 0.1);
        assert!(history[0].loss.is_finite());

        let log   = std::fs::read_to_string(dir.path().join(LOG_FILE)).unwrap();
        let lines: Vec<&str> = log.lines().collect();
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[0], "epoch,accuracy,loss,lr,val_accuracy,val_loss");
        assert_eq!(lines[1].split(',').nth(3), Some("0.1"));
        assert!(ckpt.model_file().exists());
    }

    #[test]
    fn test_training_set_smaller_than_batch_is_rejected() {
        let dir    = tempfile::tempdir().unwrap();
        let device = Default::default();
        let ckpt   = CheckpointManager::new(dir.path()).unwrap();

        let config  = TrainConfig { epochs: 1, batch_size: 8, ..TrainConfig::default() };
        let model   = ImageClassifierConfig::new().init::<TestAdBackend>(&device);
        let train   = ImageDataset::new(tiny_set(3, 0));
        let eval    = ImageDataset::new(tiny_set(2, 0));
        let mut trainer = Trainer::<TestAdBackend>::new(&config, device);

        assert!(trainer.fit(model, train, eval, &ckpt).is_err());
    }

    /// Records the learning rate the optimizer state holds at each hook.
    struct LrRecorder(Arc<Mutex<Vec<(&'static str, f64)>>>);

    impl EpochObserver for LrRecorder {
        fn name(&self) -> &str {
            "lr_recorder"
        }

        fn on_train_begin(&mut self, state: &mut OptimizerState) -> Result<()> {
            self.0.lock().unwrap().push(("train_begin", state.lr));
            Ok(())
        }

        fn on_epoch_begin(&mut self, _epoch: usize, state: &mut OptimizerState) -> Result<()> {
            self.0.lock().unwrap().push(("epoch_begin", state.lr));
            Ok(())
        }
    }

    #[test]
    fn test_restart_restores_logged_lr_then_schedule_overrides_it() {
        let dir    = tempfile::tempdir().unwrap();
        let device = Default::default();
        let ckpt   = CheckpointManager::new(dir.path()).unwrap();
        std::fs::write(
            dir.path().join(LOG_FILE),
            format!("{}\n44,0.9,0.3,0.0125,0.85,0.5\n", LOG_COLUMNS.join(",")),
        )
        .unwrap();

        let seen   = Arc::new(Mutex::new(Vec::new()));
        let config = TrainConfig { epochs: 1, batch_size: 10, ..TrainConfig::default() };
        let model  = ImageClassifierConfig::new().init::<TestAdBackend>(&device);
        let mut trainer = Trainer::<TestAdBackend>::new(&config, device)
            .with_observer(Box::new(CsvLogger::in_dir(dir.path(), true)))
            .with_observer(Box::new(StepDecay::default()))
            .with_observer(Box::new(LrRecorder(Arc::clone(&seen))));

        let train = ImageDataset::new(tiny_set(20, 0));
        let eval  = ImageDataset::new(tiny_set(10, 3));
        let (_model, history) = trainer.fit(model, train, eval, &ckpt).unwrap();

        assert_eq!(*seen.lock().unwrap(), vec![("train_begin", 0.0125), ("epoch_begin", 0.1)]);
        assert_eq!(history[0].lr, 0.1);

        let log = std::fs::read_to_string(dir.path().join(LOG_FILE)).unwrap();
        let last_row = log.lines().last().unwrap();
        assert_eq!(last_row.split(',').nth(3), Some("0.1"));
        assert_eq!(log.lines().count(), 3);
    }
}
