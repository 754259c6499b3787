// ============================================================
// Layer 6 — Infrastructure Layer
// ============================================================
// File-system concerns shared by the training layers:
//
//   checkpoint.rs — Finding, saving and loading checkpoints
//                   Serialises the model and optimizer records
//                   into one <prefix>_epoch_<N>.pth.tar file,
//                   picks the highest epoch on resume, writes
//                   the config snapshot and the exported model.
//
//   metrics.rs    — Training metrics logging
//                   One CSV row per training epoch.
//
// Reference: Rust Book §9 (Error Handling with anyhow)
//            Burn Book §5 (Records and Checkpointing)

/// Checkpoint discovery, save/load, config snapshot, export
pub mod checkpoint;

/// Training metrics CSV logger
pub mod metrics;
