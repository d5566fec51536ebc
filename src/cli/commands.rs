// ============================================================
// Layer 1 — CLI Arguments
// ============================================================
// `cifar10vgg <SAVE_DIR> [flags]`
//
// clap's derive macros generate:
//   - help text (--help)
//   - error messages for missing or malformed args
//   - type conversion (string → usize, u64, enum)
//
// Reference: Rust Book §12 (Building a CLI Program)

use clap::{Args, ValueEnum};

use crate::application::train_use_case::TrainConfig;

/// Where the tensors live
#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
pub enum BackendKind {
    /// GPU through wgpu (Vulkan / Metal / DX12)
    Wgpu,
    /// CPU through ndarray
    Ndarray,
}

/// Everything a run can be configured with.
#[derive(Args, Debug)]
pub struct RunArgs {
    /// Directory for parameters, log.csv, model.txt and train_config.json
    pub save_dir: String,

    /// Directory holding data_batch_1..5.bin and test_batch.bin
    #[arg(long, default_value = "data/cifar-10-batches-bin")]
    pub data_dir: String,

    #[arg(long, default_value_t = 250)]
    pub epochs: usize,

    #[arg(long, default_value_t = 128)]
    pub batch_size: usize,

    /// Images per forward pass when scoring the held-out set
    #[arg(long, default_value_t = 50)]
    pub predict_batch_size: usize,

    /// Drives shuffling and augmentation
    #[arg(long, default_value_t = 42)]
    pub seed: u64,

    /// DataLoader threads producing augmented batches
    #[arg(long, default_value_t = 1)]
    pub num_workers: usize,

    #[arg(long, value_enum, default_value_t = BackendKind::Wgpu)]
    pub backend: BackendKind,

    /// Load saved parameters from SAVE_DIR instead of training
    #[arg(long)]
    pub skip_training: bool,

    /// Score with the statistics recorded in train_config.json instead
    /// of the production constants
    #[arg(long)]
    pub run_stats: bool,
}

/// Boundary between Layer 1 and Layer 2: the application layer never
/// sees clap types.
impl From<&RunArgs> for TrainConfig {
    fn from(a: &RunArgs) -> Self {
        TrainConfig {
            save_dir:           a.save_dir.clone(),
            data_dir:           a.data_dir.clone(),
            epochs:             a.epochs,
            batch_size:         a.batch_size,
            predict_batch_size: a.predict_batch_size,
            seed:               a.seed,
            num_workers:        a.num_workers,
            ..TrainConfig::default()
        }
    }
}
