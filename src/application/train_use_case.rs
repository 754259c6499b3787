// ============================================================
// Layer 2 — TrainUseCase
// ============================================================
// Orchestrates the full training run in order:
//
//   Step 1: Build train / validation transforms   (Layer 4 - data)
//   Step 2: Build model, optimizer, loss scaler   (Layer 5 - ml)
//   Step 3: Build train / validation loaders      (Layer 4 - data)
//   Step 4: Save config snapshot                  (Layer 6 - infra)
//   Step 5: Resume from latest checkpoint         (Layer 6 - infra)
//   Step 6: Validate → train epochs → validate    (Layer 2 - schedule)
//   Step 7: Export the trained weights            (Layer 6 - infra)
//
// Fixed settings (image size, worker count, checkpoint prefix)
// live in TrainConfig next to the CLI values. It is built once
// and read-only afterwards.

use std::path::PathBuf;

use anyhow::Result;
use burn::{
    backend::{wgpu::WgpuDevice, Autodiff, Wgpu},
    tensor::backend::AutodiffBackend,
};
use serde::{Deserialize, Serialize};

use crate::application::schedule::run_schedule;
use crate::data::{
    dataset::SegmentationDataset,
    loader::{build_loaders, DatasetPaths},
    transform::Pipeline,
};
use crate::infra::{checkpoint::CheckpointManager, metrics::MetricsLogger};
use crate::ml::{
    model::{UNet, UNetConfig},
    scaler::LossScaler,
    trainer::{optimizer_config, Trainer},
};

type TrainBackend = Autodiff<Wgpu>;

// ─── Training Configuration ──────────────────────────────────────────────────
// All settings for a training run. Serialisable so a snapshot can
// be written next to the checkpoints it produced.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrainConfig {
    pub batch_size:        usize,
    /// Dataset root; empty means "relative to the working directory"
    pub data_root:         String,
    pub epochs:            usize,
    pub lr:                f64,
    pub momentum:          f64,
    pub weight_decay:      f64,
    pub start_from:        usize,
    pub export_path:       PathBuf,
    pub load_model:        bool,

    pub img_height:        usize,
    pub img_width:         usize,
    pub num_workers:       usize,
    /// ADE20K scene-parsing classes; remapped targets reach 149
    pub num_classes:       usize,
    pub base_channels:     usize,
    pub unet_depth:        usize,
    /// Max absolute rotation in degrees for training augmentation
    pub rotate_limit:      f32,
    pub shuffle_seed:      u64,
    pub loss_scaling:      bool,

    pub checkpoint_dir:    PathBuf,
    pub checkpoint_prefix: String,
    pub checkpoint_every:  usize,
}

impl Default for TrainConfig {
    fn default() -> Self {
        Self {
            batch_size:        16,
            data_root:         String::new(),
            epochs:            20,
            lr:                1e-2,
            momentum:          0.9,
            weight_decay:      5e-4,
            start_from:        0,
            export_path:       PathBuf::from("segmentation_model.mpk"),
            load_model:        true,

            img_height:        128,
            img_width:         128,
            num_workers:       2,
            num_classes:       150,
            base_channels:     64,
            unet_depth:        4,
            rotate_limit:      35.0,
            shuffle_seed:      42,
            loss_scaling:      true,

            checkpoint_dir:    PathBuf::from("."),
            checkpoint_prefix: "seg_model".to_string(),
            checkpoint_every:  5,
        }
    }
}

// ─── TrainUseCase ─────────────────────────────────────────────────────────────
pub struct TrainUseCase {
    config: TrainConfig,
}

impl TrainUseCase {
    pub fn new(config: TrainConfig) -> Self {
        Self { config }
    }

    /// Run on the WGPU backend. The default device picks the best
    /// adapter available (discrete GPU first, CPU last) and stays
    /// fixed for the lifetime of the process.
    pub fn execute(&self) -> Result<()> {
        let device = WgpuDevice::default();
        tracing::info!("Using WGPU device: {:?}", device);
        run::<TrainBackend>(&self.config, device)
    }
}

/// The whole training workflow, generic over the autodiff backend.
pub fn run<B: AutodiffBackend>(cfg: &TrainConfig, device: B::Device) -> Result<()> {
    // ── Step 1: Transforms ────────────────────────────────────────────────────
    let train_pipeline = Pipeline::train(cfg.img_height, cfg.img_width, cfg.rotate_limit);
    let val_pipeline   = Pipeline::validation(cfg.img_height, cfg.img_width);

    // ── Step 2: Model, optimizer, loss scaler ─────────────────────────────────
    let model: UNet<B> = UNetConfig::new(cfg.num_classes)
        .with_base_channels(cfg.base_channels)
        .with_depth(cfg.unet_depth)
        .init(&device);
    let optim  = optimizer_config(cfg).init::<B, UNet<B>>();
    let scaler = if cfg.loss_scaling { LossScaler::new() } else { LossScaler::disabled() };
    tracing::info!(
        "Model ready: U-Net depth={}, base_channels={}, classes={}",
        cfg.unet_depth,
        cfg.base_channels,
        cfg.num_classes
    );

    // ── Step 3: Loaders ───────────────────────────────────────────────────────
    let paths    = DatasetPaths::resolve(&cfg.data_root);
    let train_ds = SegmentationDataset::from_dirs(&paths.train_images, &paths.train_masks, train_pipeline)?;
    let val_ds   = SegmentationDataset::from_dirs(&paths.val_images, &paths.val_masks, val_pipeline)?;
    tracing::info!("Dataset: {} train, {} validation", train_ds.sample_count(), val_ds.sample_count());
    let loaders  = build_loaders::<B>(cfg, train_ds, val_ds, &device);

    // ── Step 4: Config snapshot ───────────────────────────────────────────────
    let checkpoints = CheckpointManager::new(&cfg.checkpoint_dir, &cfg.checkpoint_prefix)?;
    checkpoints.save_config(cfg)?;

    // ── Step 5: Resume ────────────────────────────────────────────────────────
    let resumed = checkpoints.resume(model, optim, cfg.load_model, cfg.start_from, &device)?;

    // ── Step 6: Schedule ──────────────────────────────────────────────────────
    let metrics = MetricsLogger::new(&cfg.checkpoint_dir)?;
    tracing::info!("Logging epoch metrics to '{}'", metrics.csv_path().display());
    let mut trainer = Trainer::new(
        resumed.model,
        resumed.optim,
        scaler,
        loaders,
        checkpoints,
        metrics,
        cfg.lr,
        cfg.num_classes,
    );
    run_schedule(&mut trainer, resumed.epoch, cfg.epochs, cfg.checkpoint_every)?;

    // ── Step 7: Export ────────────────────────────────────────────────────────
    trainer.export(&cfg.export_path)?;

    tracing::info!("Training complete!");
    Ok(())
}
