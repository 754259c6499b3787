// ============================================================
// Layer 3 — Domain Layer
// ============================================================
// Plain Rust types and traits that define the core concepts of
// the training driver:
//   - how a checkpoint file is named and recognised
//   - what a training session must be able to do
//
// Rules for this layer:
//   - NO Burn framework types allowed here
//   - NO file I/O
//   - Only plain Rust structs, enums, and traits

// Checkpoint file naming convention: <prefix>_epoch_<N>.pth.tar
pub mod checkpoint;

// Core abstractions (traits) that other layers implement
pub mod traits;
