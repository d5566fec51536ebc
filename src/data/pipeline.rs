// ============================================================
// Layer 4 — Augmentation Pipeline
// ============================================================
// Builds the training and evaluation DataLoaders.
//
// Training, per epoch:
//   1. The epoch number is handed to the batcher; it is part of
//      every per-sample augmentation seed.
//   2. Burn's DataLoader shuffles the indices (its RNG is seeded
//      once and advances every epoch, so a run is reproducible
//      and no two epochs share an order).
//   3. The loader's workers fetch the samples and the batcher
//      augments them on the rayon pool and uploads them.
//   4. Only full batches are kept: floor(N / batch_size) steps.
//
//   ImageDataset ──► DataLoader (workers) ──► ImageBatcher ──► training loop
//
// Evaluation uses the plain batcher, no shuffle, and keeps the
// final partial batch.
//
// Workers only read the dataset. They never see the model, so
// parameters are updated by exactly one thread.
//
// Reference: Burn Book §4 (Datasets and Dataloaders)

use burn::{
    data::{
        dataloader::{DataLoader, DataLoaderBuilder},
        dataset::Dataset,
    },
    prelude::*,
};
use std::sync::Arc;

use crate::data::{
    augment::AugmentConfig,
    batcher::{ImageBatch, ImageBatcher},
    dataset::{ImageDataset, ImageSample},
};

/// Settings for batch production.
#[derive(Debug, Clone, Copy)]
pub struct PipelineConfig {
    pub batch_size:  usize,
    /// DataLoader worker threads
    pub num_workers: usize,
    pub seed:        u64,
    pub augment:     AugmentConfig,
}

/// Shuffled, augmented training batches, one epoch at a time.
pub struct AugmentationPipeline<B: Backend> {
    loader:     Arc<dyn DataLoader<B, ImageBatch<B>>>,
    batcher:    ImageBatcher,
    batch_size: usize,
    steps:      usize,
}

impl<B: Backend> AugmentationPipeline<B> {
    /// Fit the pipeline to the training set and build its loader. None of
    /// the enabled perturbations depend on dataset statistics, so fitting
    /// only records the set size.
    pub fn new(dataset: ImageDataset, config: PipelineConfig, device: &B::Device) -> Self {
        let batch_size = config.batch_size.max(1);
        let steps      = dataset.len() / batch_size;
        tracing::info!(
            "Augmentation fitted on {} samples: rotation ±{}°, shift ±{}/{}, h-flip={}",
            dataset.len(),
            config.augment.rotation_range,
            config.augment.width_shift_range,
            config.augment.height_shift_range,
            config.augment.horizontal_flip,
        );

        let batcher = ImageBatcher::with_augmentation(config.augment, config.seed);
        let loader  = DataLoaderBuilder::<B, ImageSample, ImageBatch<B>>::new(batcher.clone())
            .batch_size(batch_size)
            .shuffle(config.seed)
            .num_workers(config.num_workers.max(1))
            .set_device(device.clone())
            .build(dataset);

        Self { loader, batcher, batch_size, steps }
    }

    /// Optimizer steps in one epoch: floor(N / batch_size)
    pub fn steps_per_epoch(&self) -> usize {
        self.steps
    }

    /// The full batches of one epoch. The incomplete tail is skipped.
    pub fn epoch(&self, epoch: usize) -> impl Iterator<Item = ImageBatch<B>> + '_ {
        self.batcher.set_epoch(epoch);
        let batch_size = self.batch_size;
        self.loader
            .iter()
            .filter(move |batch| batch.len() == batch_size)
            .take(self.steps)
    }
}

/// In-order batches over a held-out set, final partial batch included.
pub fn eval_loader<B: Backend>(
    dataset:     ImageDataset,
    batch_size:  usize,
    num_workers: usize,
    device:      &B::Device,
) -> Arc<dyn DataLoader<B, ImageBatch<B>>> {
    DataLoaderBuilder::<B, ImageSample, ImageBatch<B>>::new(ImageBatcher::new())
        .batch_size(batch_size.max(1))
        .num_workers(num_workers.max(1))
        .set_device(device.clone())
        .build(dataset)
}
