// ============================================================
// Layer 1 — CLI / Presentation Layer
// ============================================================
// Entry point for all user interaction, parsed with `clap`.
// All real work is delegated to Layer 2 (application).
//
//   cifar10vgg runs/vgg                      train, then score
//   cifar10vgg runs/vgg --skip-training      load saved params, score
//   cifar10vgg runs/vgg --backend ndarray    same, on the CPU
//   cifar10vgg runs/vgg --run-stats          score with the run's own statistics
//
// The only thing printed to stdout is the final 0/1 error.
//
// Reference: Rust Book §7 (Modules), §12 (CLI programs)

pub mod commands;

use anyhow::{anyhow, Result};
use burn::{
    backend::{Autodiff, NdArray, Wgpu},
    tensor::backend::AutodiffBackend,
};
use clap::Parser;
use commands::{BackendKind, RunArgs};

use crate::application::{
    evaluate_use_case::EvaluateUseCase,
    train_use_case::{TrainConfig, TrainUseCase},
};
use crate::data::normalizer::NormalizationMode;
use crate::infra::checkpoint::CheckpointManager;
use crate::ml::inferencer::Inferencer;

#[derive(Parser, Debug)]
#[command(
    name = "cifar10vgg",
    version,
    about = "Train a VGG-style CIFAR-10 classifier with attention gates, then report its held-out error."
)]
pub struct Cli {
    #[command(flatten)]
    pub args: RunArgs,
}

impl Cli {
    /// Pick the backend, then run generically over it.
    pub fn run(self) -> Result<()> {
        match self.args.backend {
            BackendKind::Wgpu    => self.run_on::<Autodiff<Wgpu>>(Default::default()),
            BackendKind::Ndarray => self.run_on::<Autodiff<NdArray>>(Default::default()),
        }
    }

    fn run_on<B: AutodiffBackend>(&self, device: B::Device) -> Result<()> {
        let args   = &self.args;
        let config = TrainConfig::from(args);
        tracing::info!("Backend: {:?}, device: {:?}", args.backend, device);

        let inferencer = if args.skip_training {
            let ckpt = CheckpointManager::new(&args.save_dir)?;
            Inferencer::<B::InnerBackend>::from_checkpoint(&ckpt, device)?
        } else {
            let model = TrainUseCase::new(config).execute::<B>(device.clone())?;
            Inferencer::new(model, device)
        };

        let error = EvaluateUseCase::new(&args.data_dir, args.predict_batch_size)
            .with_mode(self.normalization_mode()?)
            .classification_error(inferencer)?;

        println!("the validation 0/1 loss is: {error}");
        Ok(())
    }

    /// Production constants, or the statistics the run in SAVE_DIR recorded.
    fn normalization_mode(&self) -> Result<NormalizationMode> {
        if !self.args.run_stats {
            return Ok(NormalizationMode::Production);
        }
        let ckpt  = CheckpointManager::new(&self.args.save_dir)?;
        let stats = ckpt.load_config()?.normalization.ok_or_else(|| {
            anyhow!("'{}' records no normalization statistics", ckpt.dir().display())
        })?;
        tracing::info!("Scoring with run statistics: mean={:.4}, std={:.4}", stats.mean, stats.std);
        Ok(NormalizationMode::Training(stats))
    }
}
