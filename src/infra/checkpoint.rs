// ============================================================
// Layer 6 — Checkpoint Manager
// ============================================================
// Saves and restores training state with Burn's BinBytesRecorder.
//
// What gets saved per checkpoint (one file, one record):
//   TrainingStateRecord
//     model — all learned parameters + BN statistics
//     optim — Adam moment estimates, keyed by parameter id
//
// File naming convention (see domain::checkpoint):
//   <dir>/
//     seg_model_epoch_0.pth.tar
//     seg_model_epoch_5.pth.tar
//     ...
//     train_config.json      ← config snapshot of the run
//
// Resume picks the HIGHEST epoch found, whatever order the
// directory listing returns. Checkpoint files are never
// modified or deleted once written.
//
// Reference: Burn Book §5 (Records and Checkpointing)
//            Rust Book §9 (Error Handling)

use anyhow::{Context, Result};
use std::{
    fs,
    path::{Path, PathBuf},
};
use burn::{
    optim::Optimizer,
    prelude::*,
    record::{BinBytesRecorder, FullPrecisionSettings, NamedMpkFileRecorder, Record, Recorder},
    tensor::backend::AutodiffBackend,
};

use crate::application::train_use_case::TrainConfig;
use crate::domain::checkpoint::CheckpointName;
use crate::ml::model::{UNet, UNetRecord};

type CheckpointRecorder = BinBytesRecorder<FullPrecisionSettings>;

/// Everything a resumed run needs, serialised together.
#[derive(Record)]
pub struct TrainingStateRecord<B: Backend, O: Record<B>> {
    pub model: UNetRecord<B>,
    pub optim: O,
}

/// The highest-epoch checkpoint found on disk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LatestCheckpoint {
    pub epoch: usize,
    pub path:  PathBuf,
}

/// Training state after the resume decision.
pub struct Resumed<B: AutodiffBackend, O> {
    pub model: UNet<B>,
    pub optim: O,
    /// First epoch the loop will train
    pub epoch: usize,
}

/// Manages saving and loading of checkpoints.
/// All files are stored in the configured directory.
pub struct CheckpointManager {
    dir:    PathBuf,
    prefix: String,
}

impl CheckpointManager {
    /// Creates the directory if it doesn't already exist.
    pub fn new(dir: impl AsRef<Path>, prefix: impl Into<String>) -> Result<Self> {
        let dir = dir.as_ref().to_path_buf();
        fs::create_dir_all(&dir)
            .with_context(|| format!("Cannot create checkpoint directory '{}'", dir.display()))?;
        Ok(Self { dir, prefix: prefix.into() })
    }

    pub fn path_for(&self, epoch: usize) -> PathBuf {
        self.dir.join(CheckpointName::new(self.prefix.as_str(), epoch).file_name())
    }

    /// Scan the directory for `<prefix>_epoch_<N>.pth.tar` files and
    /// return the one with the largest N.
    ///
    /// A file that starts with the prefix but is not a well-formed
    /// checkpoint name is an error.
    pub fn latest(&self) -> Result<Option<LatestCheckpoint>> {
        let mut latest: Option<LatestCheckpoint> = None;

        let entries = fs::read_dir(&self.dir)
            .with_context(|| format!("Cannot read checkpoint directory '{}'", self.dir.display()))?;

        for entry in entries {
            let entry = entry?;
            let Some(file_name) = entry.file_name().to_str().map(str::to_owned) else {
                continue;
            };
            let Some(name) = CheckpointName::parse(&self.prefix, &file_name)? else {
                continue;
            };

            if latest.as_ref().map_or(true, |l| name.epoch > l.epoch) {
                latest = Some(LatestCheckpoint { epoch: name.epoch, path: entry.path() });
            }
        }

        Ok(latest)
    }

    /// Decide where training starts and restore state if asked to.
    ///
    ///   load_model = false  → start_from, nothing read
    ///   no checkpoint       → start_from
    ///   latest at epoch E   → max(start_from, E), model + optimizer restored
    pub fn resume<B, O>(
        &self,
        model:      UNet<B>,
        optim:      O,
        load_model: bool,
        start_from: usize,
        device:     &B::Device,
    ) -> Result<Resumed<B, O>>
    where
        B: AutodiffBackend,
        O: Optimizer<UNet<B>, B>,
    {
        if !load_model {
            tracing::info!("Checkpoint loading disabled, starting at epoch {}", start_from);
            return Ok(Resumed { model, optim, epoch: start_from });
        }

        let Some(latest) = self.latest()? else {
            tracing::info!("No checkpoint in '{}', starting at epoch {}", self.dir.display(), start_from);
            return Ok(Resumed { model, optim, epoch: start_from });
        };

        println!("=> Loading checkpoint '{}'", latest.path.display());
        let (model, optim) = self.load(model, optim, &latest.path, device)?;
        let epoch = start_from.max(latest.epoch);

        tracing::info!("Resumed from '{}', starting at epoch {}", latest.path.display(), epoch);
        Ok(Resumed { model, optim, epoch })
    }

    /// Serialise the current model and optimizer state for `epoch`.
    pub fn save<B, O>(&self, model: &UNet<B>, optim: &O, epoch: usize) -> Result<PathBuf>
    where
        B: AutodiffBackend,
        O: Optimizer<UNet<B>, B>,
    {
        let record = TrainingStateRecord {
            model: model.clone().into_record(),
            optim: optim.to_record(),
        };
        let bytes = <CheckpointRecorder as Recorder<B>>::record(&CheckpointRecorder::default(), record, ())
            .context("Failed to serialise training state")?;

        let path = self.path_for(epoch);
        fs::write(&path, bytes)
            .with_context(|| format!("Failed to save checkpoint to '{}'", path.display()))?;

        tracing::debug!("Saved checkpoint: epoch {}", epoch);
        Ok(path)
    }

    /// Restore model and optimizer state from one checkpoint file.
    ///
    /// The model must have the architecture the checkpoint was
    /// written with, or loading fails.
    pub fn load<B, O>(&self, model: UNet<B>, optim: O, path: &Path, device: &B::Device) -> Result<(UNet<B>, O)>
    where
        B: AutodiffBackend,
        O: Optimizer<UNet<B>, B>,
    {
        let bytes = fs::read(path)
            .with_context(|| format!("Cannot read checkpoint '{}'", path.display()))?;

        let record: TrainingStateRecord<B, O::Record> =
            <CheckpointRecorder as Recorder<B>>::load(&CheckpointRecorder::default(), bytes, device)
                .with_context(|| format!("'{}' is not a valid checkpoint", path.display()))?;

        Ok((model.load_record(record.model), optim.load_record(record.optim)))
    }

    /// Write the run configuration next to the checkpoints.
    pub fn save_config(&self, cfg: &TrainConfig) -> Result<()> {
        let path = self.dir.join("train_config.json");

        let json = serde_json::to_string_pretty(cfg)?;

        fs::write(&path, json)
            .with_context(|| format!("Cannot write config to '{}'", path.display()))?;

        tracing::debug!("Saved training config to '{}'", path.display());
        Ok(())
    }

    /// Write the model weights as a named MessagePack file.
    /// The recorder sets the `.mpk` extension.
    pub fn export<B: Backend>(&self, model: UNet<B>, path: &Path) -> Result<PathBuf> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)
                .with_context(|| format!("Cannot create export directory '{}'", parent.display()))?;
        }

        model
            .save_file(path.to_path_buf(), &NamedMpkFileRecorder::<FullPrecisionSettings>::new())
            .with_context(|| format!("Failed to export model to '{}'", path.display()))?;

        let written = path.with_extension("mpk");
        tracing::info!("Exported model to '{}'", written.display());
        Ok(written)
    }
}
