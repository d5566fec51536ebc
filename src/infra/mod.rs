// ============================================================
// Layer 6 — Infrastructure Layer
// ============================================================
// Files a run leaves behind in its save directory:
//
//   checkpoint.rs — cifar10vgg.mpk.gz (parameters, Burn
//                   NamedMpkGzFileRecorder) and train_config.json
//
//   metrics.rs    — log.csv, appended once per epoch, plus the
//                   tracing progress line
//
//   summary.rs    — model.txt, the layer table written before
//                   training starts
//
// Reference: Rust Book §7 (Modules)
//            Rust Book §9 (Error Handling with anyhow)
//            Burn Book §5 (Checkpointing)

/// Parameter and config persistence
pub mod checkpoint;

/// Training log and progress observers
pub mod metrics;

/// Layer table writer
pub mod summary;
