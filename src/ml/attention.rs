// ============================================================
// Layer 5 — Log-domain Attention Gate
// ============================================================
// A fixed (non-learned) gate applied to an activation map:
//
//   g   = ln(relu(x) + 1)
//   out = x * g
//
// Behaviour:
//   x <= 0  → relu(x) = 0 → g = ln(1) = 0 → out = 0
//             negative and zero activations are fully suppressed
//   x small → g ≈ x        → out ≈ x²
//   x large → g grows like ln(x), damping big activations
//
// The gate is composed from Burn tensor primitives (relu, add,
// log, mul), so the autodiff backend differentiates it like any
// other op. There are no parameters and no hand-written gradient.
//
// Reference: Burn Book §3 (Building Blocks)

use burn::{prelude::*, tensor::activation::relu};

/// Stateless gate. `stage` is the 1-based index used to name it
/// `attention_<stage>` in the model summary.
#[derive(Module, Clone, Debug)]
pub struct AttentionGate {
    pub stage: usize,
}

impl AttentionGate {
    pub fn new(stage: usize) -> Self {
        Self { stage }
    }

    pub fn name(&self) -> String {
        format!("attention_{}", self.stage)
    }

    /// Gate a tensor of any rank; output has the input's shape.
    pub fn forward<B: Backend, const D: usize>(&self, x: Tensor<B, D>) -> Tensor<B, D> {
        log_gate(x)
    }
}

/// x * ln(relu(x) + 1), elementwise
pub fn log_gate<B: Backend, const D: usize>(x: Tensor<B, D>) -> Tensor<B, D> {
    let gate = relu(x.clone()).add_scalar(1.0).log();
    x * gate
}
