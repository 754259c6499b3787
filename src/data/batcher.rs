// ============================================================
// Layer 4 — Segmentation Batcher
// ============================================================
// Implements Burn's Batcher trait to convert a Vec of
// SegmentationItems into device tensors.
//
//   Input:  N items, each a CHW image and an HW mask
//   Output: images [N, 3, H, W], masks [N, H, W]
//
// All items share H and W because every pipeline starts with a
// fixed-size Resize.

use burn::{
    data::dataloader::batcher::Batcher,
    prelude::*,
};

use crate::data::transform::SegmentationItem;

/// A batch ready for the forward pass.
#[derive(Debug, Clone)]
pub struct SegmentationBatch<B: Backend> {
    /// Normalised images — shape: [batch, 3, height, width]
    pub images: Tensor<B, 4>,

    /// Raw annotation values — shape: [batch, height, width].
    /// Converted to class indices by the loss, not here.
    pub masks: Tensor<B, 3>,
}

#[derive(Clone, Debug)]
pub struct SegmentationBatcher<B: Backend> {
    pub device: B::Device,
}

impl<B: Backend> SegmentationBatcher<B> {
    pub fn new(device: B::Device) -> Self {
        Self { device }
    }
}

impl<B: Backend> Batcher<SegmentationItem, SegmentationBatch<B>> for SegmentationBatcher<B> {
    fn batch(&self, items: Vec<SegmentationItem>) -> SegmentationBatch<B> {
        let batch_size = items.len();
        let height     = items[0].height;
        let width      = items[0].width;

        let image_flat: Vec<f32> = items
            .iter()
            .flat_map(|item| item.image.iter().copied())
            .collect();

        let mask_flat: Vec<f32> = items
            .iter()
            .flat_map(|item| item.mask.iter().copied())
            .collect();

        let images = Tensor::<B, 4>::from_data(
            TensorData::new(image_flat, [batch_size, 3, height, width]),
            &self.device,
        );

        let masks = Tensor::<B, 3>::from_data(
            TensorData::new(mask_flat, [batch_size, height, width]),
            &self.device,
        );

        SegmentationBatch { images, masks }
    }
}
