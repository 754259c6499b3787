// ============================================================
// Layer 3 — Core Traits (Abstractions)
// ============================================================
// The epoch schedule (validate → train epochs → checkpoint →
// validate) is independent of what a model or a tensor is.
// Programming it against this trait lets the schedule be tested
// with a recording fake, while the real implementation
// (ml::trainer::Trainer) drives a Burn model.

use anyhow::Result;

// ─── TrainingSession ──────────────────────────────────────────────────────────
/// Everything the training schedule needs from a live session.
///
/// Implementations:
///   - `Trainer` → Burn U-Net, Adam, loss scaler, on-disk checkpoints
///   - (tests)   → records the sequence of calls
pub trait TrainingSession {
    /// Evaluate the current model on the validation set.
    fn validate(&mut self) -> Result<()>;

    /// Run one full pass over the training batches.
    /// `epoch` is zero-based, `total` is the configured epoch count.
    fn train_epoch(&mut self, epoch: usize, total: usize) -> Result<()>;

    /// Persist a fresh checkpoint of the current model and
    /// optimizer state, tagged with `epoch`.
    fn save_checkpoint(&mut self, epoch: usize) -> Result<()>;
}
