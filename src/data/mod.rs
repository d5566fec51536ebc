// ============================================================
// Layer 4 — Data Pipeline
// ============================================================
// Everything from the CIFAR-10 binary files to device-ready
// tensor batches.
//
//   *.bin batch files
//       │
//       ▼
//   Cifar10Loader        → decodes records into an NHWC ImageSet
//       │
//       ▼
//   normalizer           → (x - mean) / (std + 1e-7)
//       │
//       ▼
//   ImageDataset         → implements Burn's Dataset trait
//       │
//       ▼
//   AugmentationPipeline → Burn DataLoader: shuffled batches
//       │                  fetched on worker threads
//       ▼
//   ImageBatcher         → augments the samples, uploads tensors
//
// Each module is responsible for exactly one step and is
// testable without a GPU.
//
// Reference: Burn Book §4 (Datasets and Dataloaders)
//            Rust Book §13 (Iterators and Closures)

/// Reads the CIFAR-10 binary batch files
pub mod loader;

/// Fits and applies the normalization statistics
pub mod normalizer;

/// Random rotation / shift / flip of single images
pub mod augment;

/// Implements Burn's Dataset trait over an ImageSet
pub mod dataset;

/// Burn Batcher: samples to (augmented) tensor batches
pub mod batcher;

/// Training and evaluation DataLoaders
pub mod pipeline;
