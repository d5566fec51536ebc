// ============================================================
// Layer 2 — Application / Use Cases
// ============================================================
// This layer wires the other layers together for one goal
// (training a network, or scoring one).
//
// Rules for this layer:
//   - No tensor math or model code here
//   - No printing here (that's Layer 1)
//   - File access only through Layer 4 and Layer 6 types
//
// Reference: Clean Architecture pattern
//            Rust Book §7 (Module System)

// Load → normalize → build → train → save
pub mod train_use_case;

// Held-out 0/1 error of a trained network
pub mod evaluate_use_case;
