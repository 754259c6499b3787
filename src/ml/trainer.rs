// ============================================================
// Layer 5 — Training Loop Body
// ============================================================
// The per-batch step and the per-epoch pass, on an autodiff
// backend with Adam and a dynamic loss scaler.
//
// Per batch, in loader order:
//   1. forward          images → scores
//   2. loss             mean pixel CE against the remapped mask
//   3. scale            loss × S
//   4. backward         gradients are fresh for every pass, so
//                       there is nothing to zero beforehand
//   5. scaler.step      unscale, skip on overflow, else Adam
//   6. scaler.update    grow / back off S
//   7. log              the unscaled loss
//
// Key Burn insight:
//   - Training runs on B (Autodiff<Wgpu>) for gradients
//   - model.valid() returns the model on B::InnerBackend
//   - The validation batcher must use B::InnerBackend too
//
// Reference: Burn Book §5, Kingma & Ba (2015) Adam

use std::path::{Path, PathBuf};

use anyhow::Result;
use burn::{
    module::AutodiffModule,
    optim::{decay::WeightDecayConfig, AdamConfig, GradientsParams, Optimizer},
    prelude::*,
    tensor::backend::AutodiffBackend,
};

use crate::application::train_use_case::TrainConfig;
use crate::data::{
    batcher::SegmentationBatch,
    loader::{ensure_complete_pass, SegmentationLoaders},
};
use crate::domain::traits::TrainingSession;
use crate::infra::{
    checkpoint::CheckpointManager,
    metrics::{EpochMetrics, MetricsLogger},
};
use crate::ml::{
    evaluator::check_accuracy,
    loss::segmentation_loss,
    model::UNet,
    scaler::LossScaler,
};

/// Adam with the momentum flag as β1 and L2 weight decay.
pub fn optimizer_config(cfg: &TrainConfig) -> AdamConfig {
    AdamConfig::new()
        .with_beta_1(cfg.momentum as f32)
        .with_weight_decay(Some(WeightDecayConfig::new(cfg.weight_decay as f32)))
}

/// One optimisation step. Returns the updated model and the
/// unscaled loss value of this batch.
pub fn train_step<B, O>(
    model:  UNet<B>,
    optim:  &mut O,
    scaler: &mut LossScaler,
    lr:     f64,
    batch:  SegmentationBatch<B>,
) -> (UNet<B>, f64)
where
    B: AutodiffBackend,
    O: Optimizer<UNet<B>, B>,
{
    let scores = model.forward(batch.images);
    let loss   = segmentation_loss(scores, batch.masks);
    let value: f64 = loss.clone().into_scalar().elem();

    let grads = scaler.scale(loss).backward();
    let grads = GradientsParams::from_grads(grads, &model);
    let model = scaler.step(optim, lr, model, grads);
    scaler.update();

    (model, value)
}

pub struct Trainer<B: AutodiffBackend, O: Optimizer<UNet<B>, B>> {
    model:       UNet<B>,
    optim:       O,
    scaler:      LossScaler,
    loaders:     SegmentationLoaders<B>,
    checkpoints: CheckpointManager,
    metrics:     MetricsLogger,
    lr:          f64,
    num_classes: usize,
}

impl<B: AutodiffBackend, O: Optimizer<UNet<B>, B>> Trainer<B, O> {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        model:       UNet<B>,
        optim:       O,
        scaler:      LossScaler,
        loaders:     SegmentationLoaders<B>,
        checkpoints: CheckpointManager,
        metrics:     MetricsLogger,
        lr:          f64,
        num_classes: usize,
    ) -> Self {
        Self { model, optim, scaler, loaders, checkpoints, metrics, lr, num_classes }
    }

    /// Write the inference weights to `path`.
    pub fn export(&self, path: &Path) -> Result<PathBuf> {
        self.checkpoints.export(self.model.valid(), path)
    }
}

impl<B: AutodiffBackend, O: Optimizer<UNet<B>, B>> TrainingSession for Trainer<B, O> {
    fn validate(&mut self) -> Result<()> {
        // BatchNorm uses running statistics on the inner backend
        let model  = self.model.valid();
        let report = check_accuracy(self.loaders.valid.as_ref(), &model, self.num_classes)?;
        report.print();
        Ok(())
    }

    fn train_epoch(&mut self, epoch: usize, total: usize) -> Result<()> {
        // Arc clone: the loop body needs `&mut self`
        let loader       = self.loaders.train.clone();
        let skipped_from = self.scaler.skipped_steps();

        let mut loss_sum = 0.0f64;
        let mut batches  = 0usize;
        let mut samples  = 0usize;

        for batch in loader.iter() {
            samples += batch.images.dims()[0];
            let (model, loss) = train_step(
                self.model.clone(),
                &mut self.optim,
                &mut self.scaler,
                self.lr,
                batch,
            );
            self.model = model;

            loss_sum += loss;
            batches  += 1;
            tracing::info!("epoch {}/{} batch {}: loss={:.4}", epoch, total, batches, loss);
        }

        ensure_complete_pass("Training", samples, loader.num_items())?;

        let metrics = EpochMetrics {
            epoch,
            train_loss:    if batches > 0 { loss_sum / batches as f64 } else { f64::NAN },
            batches,
            skipped_steps: self.scaler.skipped_steps() - skipped_from,
            loss_scale:    self.scaler.scale_factor(),
        };

        tracing::info!(
            "Epoch {} done: mean_loss={:.4}, batches={}, skipped={}, loss_scale={}",
            epoch,
            metrics.train_loss,
            metrics.batches,
            metrics.skipped_steps,
            metrics.loss_scale
        );
        self.metrics.log(&metrics)
    }

    fn save_checkpoint(&mut self, epoch: usize) -> Result<()> {
        let path = self.checkpoints.save(&self.model, &self.optim, epoch)?;
        println!("=> Saving checkpoint '{}'", path.display());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use burn::backend::{Autodiff, NdArray};

    use crate::ml::model::UNetConfig;

    type B = Autodiff<NdArray>;

    #[test]
    fn test_train_step_returns_loss_and_moves_weights() {
        let device = Default::default();
        let model: UNet<B> = UNetConfig::new(150)
            .with_base_channels(2)
            .with_depth(1)
            .init(&device);
        let mut optim  = optimizer_config(&TrainConfig::default()).init::<B, UNet<B>>();
        let mut scaler = LossScaler::new();

        let before: Vec<f32> = model.head.weight.val().into_data().to_vec().unwrap();

        let batch = SegmentationBatch {
            images: Tensor::<B, 4>::random([2, 3, 8, 8], burn::tensor::Distribution::Default, &device),
            masks:  Tensor::<B, 3>::zeros([2, 8, 8], &device),
        };
        let (model, loss) = train_step(model, &mut optim, &mut scaler, 1e-2, batch);

        let after: Vec<f32> = model.head.weight.val().into_data().to_vec().unwrap();
        assert!(loss.is_finite() && loss > 0.0);
        assert_eq!(scaler.skipped_steps(), 0);
        assert_ne!(before, after);
    }
}
