// ============================================================
// Layer 5 — Segmentation Loss
// ============================================================
// Annotation files store raw values. Before they can be used as
// class targets they are squashed into [0, 149]:
//
//   target = int( sigmoid(mask) × 149 )     (truncation toward 0)
//
//   mask  0  → 74      mask  10 → 148
//   mask -10 → 0       mask   2 → 131
//
// The loss is the mean pixel cross-entropy of the current batch
// against those targets.

use burn::{
    nn::loss::CrossEntropyLossConfig,
    prelude::*,
    tensor::activation::sigmoid,
};

/// Upper end of the remapped target range.
pub const MASK_SCALE: f64 = 149.0;

/// mask: [N, H, W] raw values → [N, H, W] class indices
pub fn remap_mask<B: Backend>(mask: Tensor<B, 3>) -> Tensor<B, 3, Int> {
    sigmoid(mask).mul_scalar(MASK_SCALE).int()
}

/// logits: [N, C, H, W], mask: [N, H, W] → scalar mean loss [1]
pub fn segmentation_loss<B: Backend>(logits: Tensor<B, 4>, mask: Tensor<B, 3>) -> Tensor<B, 1> {
    let [n, c, h, w] = logits.dims();
    let pixels = n * h * w;

    // class axis last, then one row per pixel
    let logits  = logits.permute([0, 2, 3, 1]).reshape([pixels, c]);
    let targets = remap_mask(mask).reshape([pixels]);

    CrossEntropyLossConfig::new()
        .init(&logits.device())
        .forward(logits, targets)
}

#[cfg(test)]
mod tests {
    use super::*;
    use burn::backend::NdArray;

    type B = NdArray;

    #[test]
    fn test_remap_truncates() {
        let device = Default::default();
        let mask = Tensor::<B, 3>::from_floats([[[0.0, 10.0], [-10.0, 2.0]]], &device);

        let remapped: Vec<i64> = remap_mask(mask).into_data().iter::<i64>().collect();
        assert_eq!(remapped, vec![74, 148, 0, 131]);
    }

    #[test]
    fn test_loss_is_mean_pixel_cross_entropy() {
        let device  = Default::default();
        let classes = 150;
        let peak    = 5.0f32;

        // 2×2 image; pixels 0..3 peak on their target, pixel 3 peaks on class 5
        let peaks = [74usize, 148, 0, 5];
        let mut values = vec![0.0f32; classes * 4];
        for (pixel, &class) in peaks.iter().enumerate() {
            values[class * 4 + pixel] = peak;
        }
        let logits = Tensor::<B, 4>::from_data(TensorData::new(values, [1, classes, 2, 2]), &device);
        let mask   = Tensor::<B, 3>::from_floats([[[0.0, 10.0], [-10.0, 2.0]]], &device);

        let loss: f64 = segmentation_loss(logits, mask).into_scalar().elem();

        let log_sum  = ((peak as f64).exp() + (classes - 1) as f64).ln();
        let expected = (3.0 * (log_sum - peak as f64) + log_sum) / 4.0;
        assert!((loss - expected).abs() < 1e-4, "loss {loss} != {expected}");
    }
}
