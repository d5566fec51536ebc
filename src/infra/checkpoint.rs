// ============================================================
// Layer 6 — Checkpoint Manager
// ============================================================
// Saves and restores the network parameters and the run
// configuration.
//
// Files in the save directory:
//   cifar10vgg.mpk.gz   ← every learned parameter and the
//                         batch-norm running statistics
//   train_config.json   ← TrainConfig, including the
//                         normalization statistics of the run
//
// The parameter file is written once, at the end of training,
// and overwrites any previous one. Loading needs a freshly built
// network of the same architecture to load the record into;
// Burn rejects a record whose structure doesn't match.
//
// Parameters are stored at full precision (NamedMpkGzFileRecorder
// with FullPrecisionSettings: MessagePack, gzip) so that
// load → save → load reproduces outputs exactly.
//
// Reference: Burn Book §5 (Records and Checkpointing)
//            Rust Book §9 (Error Handling)

use anyhow::{Context, Result};
use burn::{
    prelude::*,
    record::{FullPrecisionSettings, NamedMpkGzFileRecorder, Recorder},
};
use std::{
    fs,
    path::{Path, PathBuf},
};

use crate::application::train_use_case::TrainConfig;
use crate::ml::model::ImageClassifier;

/// Stem of the parameter file; the recorder appends `.mpk.gz`
pub const MODEL_FILE_STEM: &str = "cifar10vgg";

/// Run configuration written next to the parameters
pub const CONFIG_FILE: &str = "train_config.json";

type ParamRecorder = NamedMpkGzFileRecorder<FullPrecisionSettings>;

/// Owns one save directory.
pub struct CheckpointManager {
    dir: PathBuf,
}

impl CheckpointManager {
    /// Open a save directory, creating it (and its parents) if missing.
    pub fn new(dir: impl AsRef<Path>) -> Result<Self> {
        let dir = dir.as_ref().to_path_buf();
        fs::create_dir_all(&dir)
            .with_context(|| format!("Cannot create save directory '{}'", dir.display()))?;
        Ok(Self { dir })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Path handed to the recorder (no extension)
    fn model_stem(&self) -> PathBuf {
        self.dir.join(MODEL_FILE_STEM)
    }

    /// Path of the parameter file as it appears on disk
    pub fn model_file(&self) -> PathBuf {
        self.dir.join(format!("{MODEL_FILE_STEM}.mpk.gz"))
    }

    /// Write all parameters, replacing any earlier file.
    pub fn save_model<B: Backend>(&self, model: &ImageClassifier<B>) -> Result<PathBuf> {
        let stem = self.model_stem();
        ParamRecorder::new()
            .record(model.clone().into_record(), stem.clone())
            .with_context(|| format!("Failed to save parameters to '{}'", stem.display()))?;

        tracing::debug!("Saved parameters to '{}'", self.model_file().display());
        Ok(self.model_file())
    }

    /// Load the saved parameters into `model`, which must have been built
    /// with the same architecture.
    pub fn load_model<B: Backend>(
        &self,
        model:  ImageClassifier<B>,
        device: &B::Device,
    ) -> Result<ImageClassifier<B>> {
        let stem = self.model_stem();
        let record = ParamRecorder::new()
            .load(stem.clone(), device)
            .with_context(|| {
                format!(
                    "Cannot load parameters from '{}'. Has a model been trained into this directory?",
                    self.model_file().display()
                )
            })?;

        tracing::info!("Loaded parameters from '{}'", self.model_file().display());
        Ok(model.load_record(record))
    }

    /// Save the run configuration as pretty JSON.
    pub fn save_config(&self, cfg: &TrainConfig) -> Result<()> {
        let path = self.dir.join(CONFIG_FILE);
        let json = serde_json::to_string_pretty(cfg)?;

        fs::write(&path, json)
            .with_context(|| format!("Cannot write config to '{}'", path.display()))?;

        tracing::debug!("Saved training config to '{}'", path.display());
        Ok(())
    }

    /// Read back the configuration written by `save_config`.
    pub fn load_config(&self) -> Result<TrainConfig> {
        let path = self.dir.join(CONFIG_FILE);
        let json = fs::read_to_string(&path)
            .with_context(|| format!("Cannot read config from '{}'", path.display()))?;

        serde_json::from_str(&json)
            .with_context(|| format!("Malformed config in '{}'", path.display()))
    }
}
