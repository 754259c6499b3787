// ============================================================
// Layer 5 — ML / Model Layer (Burn)
// ============================================================
// Tensor-level code for the segmentation trainer.
//
// What's in this layer:
//
//   model.rs      — U-Net encoder/decoder
//                   [N,3,H,W] images → [N,C,H,W] class scores
//
//   loss.rs       — Annotation remap + pixel cross-entropy
//
//   scaler.rs     — Dynamic loss scaling: scale the loss,
//                   unscale the gradients, skip the optimizer
//                   step when they overflow
//
//   trainer.rs    — Per-batch training step, epoch pass,
//                   and the TrainingSession implementation
//
//   evaluator.rs  — Pixel accuracy / mean IoU on the
//                   validation loader
//
// Reference: Burn Book §3 (Building Blocks)
//            Burn Book §5 (Training)
//            Ronneberger et al. (2015) U-Net

/// U-Net segmentation model
pub mod model;

/// Mask remap and segmentation loss
pub mod loss;

/// Dynamic loss scaler
pub mod scaler;

/// Training step, epoch loop body and checkpoint hooks
pub mod trainer;

/// Validation accuracy report
pub mod evaluator;
