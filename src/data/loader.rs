// ============================================================
// Layer 4 — Loader Factory
// ============================================================
// Resolves the ADE20K directory layout and builds the two Burn
// DataLoaders the training loop consumes.
//
//   <root>/ADEChallengeData2016/images/training
//   <root>/ADEChallengeData2016/annotations/training
//   <root>/ADEChallengeData2016/images/validation
//   <root>/ADEChallengeData2016/annotations/validation
//
// An empty root means the paths are relative to the working
// directory.

use std::{path::PathBuf, sync::Arc};

use anyhow::{bail, Result};
use burn::{
    data::dataloader::{DataLoader, DataLoaderBuilder},
    tensor::backend::AutodiffBackend,
};

use crate::application::train_use_case::TrainConfig;
use crate::data::{
    batcher::{SegmentationBatch, SegmentationBatcher},
    dataset::SegmentationDataset,
};

const DATASET_DIR: &str = "ADEChallengeData2016";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DatasetPaths {
    pub train_images: PathBuf,
    pub train_masks:  PathBuf,
    pub val_images:   PathBuf,
    pub val_masks:    PathBuf,
}

impl DatasetPaths {
    pub fn resolve(root: &str) -> Self {
        let base = if root.is_empty() {
            PathBuf::from(DATASET_DIR)
        } else {
            PathBuf::from(root).join(DATASET_DIR)
        };

        Self {
            train_images: base.join("images").join("training"),
            train_masks:  base.join("annotations").join("training"),
            val_images:   base.join("images").join("validation"),
            val_masks:    base.join("annotations").join("validation"),
        }
    }
}

/// Training batches live on the autodiff backend; validation
/// batches on the inner backend (no gradient tracking).
pub struct SegmentationLoaders<B: AutodiffBackend> {
    pub train: Arc<dyn DataLoader<SegmentationBatch<B>>>,
    pub valid: Arc<dyn DataLoader<SegmentationBatch<B::InnerBackend>>>,
}

pub fn build_loaders<B: AutodiffBackend>(
    cfg:      &TrainConfig,
    train_ds: SegmentationDataset,
    val_ds:   SegmentationDataset,
    device:   &B::Device,
) -> SegmentationLoaders<B> {
    let mut train = DataLoaderBuilder::new(SegmentationBatcher::<B>::new(device.clone()))
        .batch_size(cfg.batch_size)
        .shuffle(cfg.shuffle_seed);

    let mut valid = DataLoaderBuilder::new(SegmentationBatcher::<B::InnerBackend>::new(device.clone()))
        .batch_size(cfg.batch_size);

    // zero workers = load on the training thread
    if cfg.num_workers > 0 {
        train = train.num_workers(cfg.num_workers);
        valid = valid.num_workers(cfg.num_workers);
    }

    SegmentationLoaders {
        train: train.build(train_ds),
        valid: valid.build(val_ds),
    }
}

/// Burn's loader stops a pass at the first sample the dataset
/// cannot produce. A pass that yielded fewer samples than the
/// dataset holds is an error, not a short epoch.
pub fn ensure_complete_pass(split: &str, seen: usize, expected: usize) -> Result<()> {
    if seen != expected {
        bail!(
            "{split} pass ended after {seen} of {expected} samples; \
             a sample failed to load (see the error above)"
        );
    }
    Ok(())
}
