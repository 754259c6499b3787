// ============================================================
// Layer 1 — CLI / Presentation Layer
// ============================================================
// Entry point for all user interaction. There is exactly one
// thing this binary does (train the segmentation model), so the
// CLI is a flat set of flags with no subcommands.
//
// All business logic is delegated to Layer 2 (application).
// Malformed values (e.g. `--epochs ten`) are rejected by clap
// before anything else runs, with a non-zero exit status.

pub mod args;

use anyhow::Result;
use clap::Parser;

use crate::application::train_use_case::TrainUseCase;
use args::TrainArgs;

/// Top-level CLI. Every field of `TrainArgs` becomes a `--flag`.
#[derive(Parser, Debug)]
#[command(
    name = "seg-train",
    version,
    about = "Train a U-Net semantic segmentation model on ADE20K with checkpoint resume."
)]
pub struct Cli {
    #[command(flatten)]
    pub train: TrainArgs,
}

impl Cli {
    /// Convert the parsed flags into a `TrainConfig` and run training.
    /// This keeps the CLI layer thin — it only routes, never computes.
    pub fn run(self) -> Result<()> {
        tracing::info!(
            "Starting training: epochs={}, batch={}, lr={}",
            self.train.epochs,
            self.train.batch,
            self.train.lr
        );

        let use_case = TrainUseCase::new(self.train.into());
        use_case.execute()?;

        println!("Training complete. Final checkpoint saved.");
        Ok(())
    }
}
