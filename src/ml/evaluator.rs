// ============================================================
// Layer 5 — Accuracy Checker
// ============================================================
// Runs the model in inference mode over the validation loader
// and reports:
//
//   pixel accuracy = correct pixels / all pixels
//   mean IoU       = mean over classes seen in prediction or
//                    target of |pred ∩ target| / |pred ∪ target|
//   val loss       = mean batch loss against remapped targets
//
// The report is informational; the schedule never reads it.

use anyhow::Result;
use burn::{data::dataloader::DataLoader, prelude::*};

use crate::data::{batcher::SegmentationBatch, loader::ensure_complete_pass};
use crate::ml::{
    loss::{remap_mask, segmentation_loss},
    model::UNet,
};

/// Per-class intersection/union counts accumulated over batches.
#[derive(Debug, Clone)]
pub struct ConfusionCounts {
    intersection: Vec<u64>,
    union:        Vec<u64>,
    correct:      u64,
    total:        u64,
}

impl ConfusionCounts {
    pub fn new(num_classes: usize) -> Self {
        Self {
            intersection: vec![0; num_classes],
            union:        vec![0; num_classes],
            correct:      0,
            total:        0,
        }
    }

    /// Indexes outside `0..num_classes` count toward accuracy only.
    pub fn add(&mut self, pred: &[i64], target: &[i64]) {
        let classes = self.union.len();
        let slot    = |c: i64| usize::try_from(c).ok().filter(|&c| c < classes);

        for (&p, &t) in pred.iter().zip(target) {
            self.total += 1;

            if p == t {
                self.correct += 1;
                if let Some(c) = slot(p) {
                    self.intersection[c] += 1;
                    self.union[c]        += 1;
                }
                continue;
            }

            if let Some(c) = slot(p) {
                self.union[c] += 1;
            }
            if let Some(c) = slot(t) {
                self.union[c] += 1;
            }
        }
    }

    pub fn pixel_accuracy(&self) -> f64 {
        if self.total == 0 {
            return 0.0;
        }
        self.correct as f64 / self.total as f64
    }

    pub fn mean_iou(&self) -> f64 {
        let ious: Vec<f64> = self
            .intersection
            .iter()
            .zip(&self.union)
            .filter(|(_, u)| **u > 0)
            .map(|(&i, &u)| i as f64 / u as f64)
            .collect();

        if ious.is_empty() {
            0.0
        } else {
            ious.iter().sum::<f64>() / ious.len() as f64
        }
    }

    pub fn pixels(&self) -> u64 {
        self.total
    }
}

#[derive(Debug, Clone)]
pub struct AccuracyReport {
    pub pixel_accuracy: f64,
    pub mean_iou:       f64,
    pub loss:           f64,
    pub pixels:         u64,
    pub batches:        usize,
}

impl AccuracyReport {
    pub fn print(&self) {
        println!(
            "Validation | pixel_acc={:.2}% | mean_iou={:.4} | val_loss={:.4} | {} pixels in {} batches",
            self.pixel_accuracy * 100.0,
            self.mean_iou,
            self.loss,
            self.pixels,
            self.batches,
        );
        tracing::info!(
            "Validation: pixel_acc={:.4}, mean_iou={:.4}, val_loss={:.4}",
            self.pixel_accuracy,
            self.mean_iou,
            self.loss
        );
    }
}

pub fn check_accuracy<B: Backend>(
    loader:      &dyn DataLoader<SegmentationBatch<B>>,
    model:       &UNet<B>,
    num_classes: usize,
) -> Result<AccuracyReport> {
    let mut counts   = ConfusionCounts::new(num_classes);
    let mut loss_sum = 0.0f64;
    let mut batches  = 0usize;
    let mut samples  = 0usize;

    for batch in loader.iter() {
        samples += batch.images.dims()[0];
        let scores = model.forward(batch.images);

        let loss: f64 = segmentation_loss(scores.clone(), batch.masks.clone())
            .into_scalar()
            .elem();
        loss_sum += loss;
        batches  += 1;

        // argmax(1) keeps the class axis: [N,1,H,W] → flatten all
        let pred   = scores.argmax(1).flatten::<1>(0, 3).into_data();
        let target = remap_mask(batch.masks).flatten::<1>(0, 2).into_data();

        let pred:   Vec<i64> = pred.iter::<i64>().collect();
        let target: Vec<i64> = target.iter::<i64>().collect();
        counts.add(&pred, &target);
    }

    ensure_complete_pass("Validation", samples, loader.num_items())?;

    Ok(AccuracyReport {
        pixel_accuracy: counts.pixel_accuracy(),
        mean_iou:       counts.mean_iou(),
        loss:           if batches > 0 { loss_sum / batches as f64 } else { f64::NAN },
        pixels:         counts.pixels(),
        batches,
    })
}
