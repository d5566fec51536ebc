// ============================================================
// Layer 3 — Domain Layer
// ============================================================
// Pure Rust structs and traits that define the core concepts
// of the classifier: what an image set is, what one epoch of
// training reports, and the seams other layers implement.
//
// Rules for this layer:
//   - NO Burn framework types allowed here
//   - NO file I/O
//   - Only plain Rust structs, enums, and traits
//
// Reference: Rust Book §5 (Structs), §10 (Traits)

// Image/label arrays in NHWC layout and the dataset constants
pub mod image;

// Per-epoch metrics and the optimizer state observers can see
pub mod epoch;

// Core abstractions (traits) that other layers implement
pub mod traits;
