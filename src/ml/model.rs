// ============================================================
// Layer 5 — U-Net
// ============================================================
//
//   images [N, 3, H, W]
//     │
//     ├─ DoubleConv(3 → c)        ──────────────── skip ─┐
//     │  MaxPool /2                                      │
//     ├─ DoubleConv(c → 2c)       ───── skip ─┐          │
//     │  MaxPool /2                           │          │
//     ├─ DoubleConv(2c → 4c)   (bottleneck)   │          │
//     │                                       │          │
//     ├─ ConvT ×2 (4c → 2c), cat ◄────────────┘          │
//     ├─ DoubleConv(4c → 2c)                             │
//     ├─ ConvT ×2 (2c → c),  cat ◄───────────────────────┘
//     ├─ DoubleConv(2c → c)
//     │
//     └─ Conv 1×1 (c → num_classes)
//
//   scores [N, num_classes, H, W]
//
// Shown for depth = 2. H and W must be divisible by 2^depth.

use burn::{
    nn::{
        conv::{Conv2d, Conv2dConfig, ConvTranspose2d, ConvTranspose2dConfig},
        pool::{MaxPool2d, MaxPool2dConfig},
        BatchNorm, BatchNormConfig, PaddingConfig2d,
    },
    prelude::*,
    tensor::activation::relu,
};

// NOTE: #[derive(Config)] already generates Clone and Serialize/Deserialize
// internally — do NOT add them again or you get conflicting impls.
#[derive(Config, Debug)]
pub struct UNetConfig {
    pub num_classes:   usize,
    #[config(default = 3)]
    pub in_channels:   usize,
    #[config(default = 64)]
    pub base_channels: usize,
    /// Number of down-sampling stages
    #[config(default = 4)]
    pub depth:         usize,
}

impl UNetConfig {
    pub fn init<B: Backend>(&self, device: &B::Device) -> UNet<B> {
        let channels = |level: usize| self.base_channels << level;

        let mut encoders = Vec::with_capacity(self.depth);
        let mut in_ch    = self.in_channels;
        for level in 0..self.depth {
            encoders.push(DoubleConv::new(in_ch, channels(level), device));
            in_ch = channels(level);
        }

        let bottleneck = DoubleConv::new(in_ch, channels(self.depth), device);

        let mut ups      = Vec::with_capacity(self.depth);
        let mut decoders = Vec::with_capacity(self.depth);
        for level in (0..self.depth).rev() {
            ups.push(
                ConvTranspose2dConfig::new([channels(level + 1), channels(level)], [2, 2])
                    .with_stride([2, 2])
                    .init(device),
            );
            decoders.push(DoubleConv::new(2 * channels(level), channels(level), device));
        }

        let head = Conv2dConfig::new([self.base_channels, self.num_classes], [1, 1]).init(device);
        let pool = MaxPool2dConfig::new([2, 2]).with_strides([2, 2]).init();

        UNet { encoders, pool, bottleneck, ups, decoders, head }
    }
}

/// conv 3×3 → BN → ReLU, twice. Spatial size is preserved.
#[derive(Module, Debug)]
pub struct DoubleConv<B: Backend> {
    pub conv1: Conv2d<B>,
    pub norm1: BatchNorm<B, 2>,
    pub conv2: Conv2d<B>,
    pub norm2: BatchNorm<B, 2>,
}

impl<B: Backend> DoubleConv<B> {
    fn new(in_channels: usize, out_channels: usize, device: &B::Device) -> Self {
        let conv = |i, o| {
            Conv2dConfig::new([i, o], [3, 3])
                .with_padding(PaddingConfig2d::Same)
                .with_bias(false)
                .init(device)
        };
        Self {
            conv1: conv(in_channels, out_channels),
            norm1: BatchNormConfig::new(out_channels).init(device),
            conv2: conv(out_channels, out_channels),
            norm2: BatchNormConfig::new(out_channels).init(device),
        }
    }

    pub fn forward(&self, x: Tensor<B, 4>) -> Tensor<B, 4> {
        let x = relu(self.norm1.forward(self.conv1.forward(x)));
        relu(self.norm2.forward(self.conv2.forward(x)))
    }
}

#[derive(Module, Debug)]
pub struct UNet<B: Backend> {
    pub encoders:   Vec<DoubleConv<B>>,
    pub pool:       MaxPool2d,
    pub bottleneck: DoubleConv<B>,
    /// Ordered deepest first, matching `decoders`
    pub ups:        Vec<ConvTranspose2d<B>>,
    pub decoders:   Vec<DoubleConv<B>>,
    pub head:       Conv2d<B>,
}

impl<B: Backend> UNet<B> {
    /// images: [batch, 3, H, W] → scores: [batch, num_classes, H, W]
    pub fn forward(&self, images: Tensor<B, 4>) -> Tensor<B, 4> {
        let mut skips = Vec::with_capacity(self.encoders.len());
        let mut x     = images;

        for encoder in &self.encoders {
            x = encoder.forward(x);
            skips.push(x.clone());
            x = self.pool.forward(x);
        }

        x = self.bottleneck.forward(x);

        let stages = self.ups.iter().zip(&self.decoders).zip(skips.into_iter().rev());
        for ((up, decoder), skip) in stages {
            let upsampled = up.forward(x);
            x = decoder.forward(Tensor::cat(vec![skip, upsampled], 1));
        }

        self.head.forward(x)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use burn::backend::NdArray;

    #[test]
    fn test_output_shape_matches_input_resolution() {
        let device = Default::default();
        let model: UNet<NdArray> = UNetConfig::new(5)
            .with_base_channels(2)
            .with_depth(2)
            .init(&device);

        let images = Tensor::<NdArray, 4>::random(
            [2, 3, 16, 16],
            burn::tensor::Distribution::Default,
            &device,
        );
        assert_eq!(model.forward(images).dims(), [2, 5, 16, 16]);
    }

    #[test]
    fn test_stage_counts_follow_depth() {
        let model: UNet<NdArray> = UNetConfig::new(3)
            .with_base_channels(2)
            .with_depth(3)
            .init(&Default::default());
        assert_eq!(model.encoders.len(), 3);
        assert_eq!(model.ups.len(), 3);
        assert_eq!(model.decoders.len(), 3);
    }
}
