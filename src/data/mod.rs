// ============================================================
// Layer 4 — Data Pipeline
// ============================================================
// Everything from image/annotation files on disk to tensor
// batches on the training device:
//
//   ADEChallengeData2016/{images,annotations}/{training,validation}
//       │
//       ▼
//   SegmentationDataset  → pairs image ↔ mask files, decodes lazily
//       │
//       ▼
//   Pipeline             → resize / rotate / flip / normalize
//       │
//       ▼
//   SegmentationBatcher  → stacks items into [N,3,H,W] / [N,H,W]
//       │
//       ▼
//   DataLoader           → feeds batches to the training loop

/// Image + mask transformations (train and validation variants)
pub mod transform;

/// Implements Burn's Dataset trait over image/mask file pairs
pub mod dataset;

/// Implements Burn's Batcher trait to create tensor batches
pub mod batcher;

/// Resolves dataset directories and builds the train/validation loaders
pub mod loader;
