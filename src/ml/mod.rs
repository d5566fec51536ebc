// ============================================================
// Layer 5 — ML / Model Layer (Burn)
// ============================================================
// All network, loss and optimizer code lives here.
//
//   attention.rs  — fixed log-domain gate x · ln(relu(x) + 1)
//
//   model.rs      — the VGG-style classifier, built from one
//                   architecture table, plus its L2 penalty
//
//   schedule.rs   — step-decay learning rate observer
//
//   trainer.rs    — the epoch loop: augmented batches, SGD with
//                   Nesterov momentum, evaluation, observers,
//                   final save
//
//   inferencer.rs — batched prediction on a plain backend and
//                   the 0/1 classification error
//
// Reference: Burn Book §3 (Building Blocks)
//            Burn Book §5 (Training)

/// Parameter-free attention gate
pub mod attention;

/// Network architecture and construction
pub mod model;

/// Learning-rate schedule
pub mod schedule;

/// Training loop with evaluation and observers
pub mod trainer;

/// Batched inference on a trained network
pub mod inferencer;
