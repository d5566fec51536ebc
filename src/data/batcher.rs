// ============================================================
// Layer 4 — Image Batcher
// ============================================================
// Burn's DataLoader hands the batcher a Vec<ImageSample>; the
// batcher stacks them into the device tensors the model and the
// loss need.
//
// Training batchers also augment every sample before upload.
// Each sample gets its own RNG seeded from (seed, epoch, index),
// so a batch comes out the same whichever worker builds it and
// however rayon schedules the per-sample work. The epoch lives
// behind an Arc so the copy owned by the DataLoader sees the
// value the training loop sets.
//
// Shapes produced:
//   images  → [N, 32, 32, 3]  float (NHWC, as the model expects)
//   targets → [N, 10]         float one-hot rows
//   labels  → [N]             int class ids (for accuracy)
//
// Reference: Burn Book §4 (Batcher)
//            rayon crate documentation

use burn::{data::dataloader::batcher::Batcher, prelude::*, tensor::TensorData};
use rand::{rngs::StdRng, SeedableRng};
use rayon::prelude::*;
use std::sync::{
    atomic::{AtomicUsize, Ordering},
    Arc,
};

use crate::data::{augment::AugmentConfig, dataset::ImageSample};
use crate::domain::image::{one_hot, IMAGE_CHANNELS, IMAGE_HEIGHT, IMAGE_LEN, IMAGE_WIDTH, NUM_CLASSES};

// ─── ImageBatch ───────────────────────────────────────────────────────────────
/// A batch ready for the forward pass.
#[derive(Debug, Clone)]
pub struct ImageBatch<B: Backend> {
    /// [N, 32, 32, 3]
    pub images: Tensor<B, 4>,

    /// [N, 10] one-hot targets for categorical cross-entropy
    pub targets: Tensor<B, 2>,

    /// [N] class ids
    pub labels: Tensor<B, 1, Int>,
}

impl<B: Backend> ImageBatch<B> {
    /// Number of images in the batch
    pub fn len(&self) -> usize {
        self.labels.dims()[0]
    }
}

// ─── ImageBatcher ─────────────────────────────────────────────────────────────
#[derive(Clone, Debug, Default)]
pub struct ImageBatcher {
    augment: Option<AugmentConfig>,
    seed:    u64,
    epoch:   Arc<AtomicUsize>,
}

impl ImageBatcher {
    /// Uploads samples unchanged (evaluation).
    pub fn new() -> Self {
        Self::default()
    }

    /// Augments every sample before upload (training).
    pub fn with_augmentation(augment: AugmentConfig, seed: u64) -> Self {
        Self { augment: Some(augment), seed, epoch: Arc::default() }
    }

    /// Epoch used for the augmentation seeds; shared by every clone.
    pub fn set_epoch(&self, epoch: usize) {
        self.epoch.store(epoch, Ordering::Release);
    }

    pub fn epoch(&self) -> usize {
        self.epoch.load(Ordering::Acquire)
    }

    /// Replace each image in `pixels` by its augmented copy.
    fn augment_in_place(&self, augment: &AugmentConfig, pixels: &mut [f32], indices: &[usize]) {
        let epoch = self.epoch() as u64;
        let src   = pixels.to_vec();
        pixels
            .par_chunks_mut(IMAGE_LEN)
            .zip(src.par_chunks(IMAGE_LEN))
            .zip(indices.par_iter())
            .for_each(|((dst, img), &index)| {
                let mut rng = StdRng::seed_from_u64(mix(self.seed, epoch, index as u64));
                augment.augment(&mut rng, img, dst);
            });
    }
}

impl<B: Backend> Batcher<B, ImageSample, ImageBatch<B>> for ImageBatcher {
    fn batch(&self, items: Vec<ImageSample>, device: &B::Device) -> ImageBatch<B> {
        let n = items.len();
        let mut pixels  = Vec::with_capacity(n * IMAGE_LEN);
        let mut labels  = Vec::with_capacity(n);
        let mut indices = Vec::with_capacity(n);
        for s in items {
            pixels.extend(s.pixels);
            labels.push(s.label);
            indices.push(s.index);
        }

        if let Some(augment) = &self.augment {
            self.augment_in_place(augment, &mut pixels, &indices);
        }

        let images = Tensor::<B, 4>::from_data(
            TensorData::new(pixels, [n, IMAGE_HEIGHT, IMAGE_WIDTH, IMAGE_CHANNELS]),
            device,
        );

        let one_hot_flat: Vec<f32> = labels.iter().flat_map(|&l| one_hot(l)).collect();
        let targets = Tensor::<B, 2>::from_data(
            TensorData::new(one_hot_flat, [n, NUM_CLASSES]),
            device,
        );

        let ids: Vec<i64> = labels.iter().map(|&l| l as i64).collect();
        let labels = Tensor::<B, 1, Int>::from_data(TensorData::new(ids, [n]), device);

        ImageBatch { images, targets, labels }
    }
}

/// Combine seed, epoch and sample index into one well-spread seed
/// (splitmix64 finaliser).
fn mix(seed: u64, epoch: u64, index: u64) -> u64 {
    let mut z = seed
        .wrapping_add(epoch.wrapping_mul(0x9E37_79B9_7F4A_7C15))
        .wrapping_add(index.wrapping_mul(0xD1B5_4A32_D192_ED03));
    z = (z ^ (z >> 30)).wrapping_mul(0xBF58_476D_1CE4_E5B9);
    z = (z ^ (z >> 27)).wrapping_mul(0x94D0_49BB_1331_11EB);
    z ^ (z >> 31)
}
