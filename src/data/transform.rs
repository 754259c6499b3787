// ============================================================
// Layer 4 — Transform Pipeline
// ============================================================
// Ordered image/mask transformations applied to every sample
// before batching.
//
//   train:       Resize → Rotate(±35°, p=1) → HFlip(0.5) → VFlip(0.5)
//                → Normalize(ImageNet) → tensor layout
//   validation:  Resize → Normalize(ImageNet) → tensor layout
//
// Geometric steps move image and mask together so labels stay
// aligned. The image is resampled bilinearly, the mask with
// nearest-neighbour so class indices are never blended.
// Normalize only touches the image.
//
// Geometric steps work on 8-bit pixels. Normalize is per-pixel
// and affine, so it is recorded and applied during the final
// conversion to tensor layout:
//   (v - mean * max_pixel) / (std * max_pixel)

use image::{
    imageops::{self, FilterType},
    GrayImage, Luma, Rgb, RgbImage,
};
use rand::Rng;

pub const IMAGENET_MEAN: [f32; 3] = [0.485, 0.456, 0.406];
pub const IMAGENET_STD:  [f32; 3] = [0.229, 0.224, 0.225];

/// One step of the pipeline.
#[derive(Debug, Clone, PartialEq)]
pub enum Transform {
    Resize { height: u32, width: u32 },
    /// Rotate by an angle drawn uniformly from [-limit, limit] degrees.
    Rotate { limit: f32 },
    HorizontalFlip { p: f64 },
    VerticalFlip { p: f64 },
    Normalize { mean: [f32; 3], std: [f32; 3], max_pixel_value: f32 },
}

/// A transformed sample in tensor layout.
#[derive(Debug, Clone)]
pub struct SegmentationItem {
    /// CHW, 3 channels, normalised
    pub image:  Vec<f32>,
    /// HW, raw annotation values
    pub mask:   Vec<f32>,
    pub height: usize,
    pub width:  usize,
}

#[derive(Debug, Clone)]
pub struct Pipeline {
    steps: Vec<Transform>,
}

impl Pipeline {
    pub fn new(steps: Vec<Transform>) -> Self {
        Self { steps }
    }

    pub fn train(height: usize, width: usize, rotate_limit: f32) -> Self {
        Self::new(vec![
            Transform::Resize { height: height as u32, width: width as u32 },
            Transform::Rotate { limit: rotate_limit },
            Transform::HorizontalFlip { p: 0.5 },
            Transform::VerticalFlip { p: 0.5 },
            imagenet_normalize(),
        ])
    }

    pub fn validation(height: usize, width: usize) -> Self {
        Self::new(vec![
            Transform::Resize { height: height as u32, width: width as u32 },
            imagenet_normalize(),
        ])
    }

    /// Run every step in order, then convert to tensor layout.
    pub fn apply<R: Rng + ?Sized>(
        &self,
        image: &RgbImage,
        mask:  &GrayImage,
        rng:   &mut R,
    ) -> SegmentationItem {
        let mut image = image.clone();
        let mut mask  = mask.clone();
        let mut normalization = None;

        for step in &self.steps {
            match step {
                Transform::Resize { height, width } => {
                    image = imageops::resize(&image, *width, *height, FilterType::Triangle);
                    mask  = imageops::resize(&mask, *width, *height, FilterType::Nearest);
                }
                Transform::Rotate { limit } => {
                    let angle = if *limit > 0.0 { rng.gen_range(-*limit..=*limit) } else { 0.0 };
                    image = rotate_bilinear(&image, angle);
                    mask  = rotate_nearest(&mask, angle);
                }
                Transform::HorizontalFlip { p } => {
                    if rng.gen_bool(*p) {
                        image = imageops::flip_horizontal(&image);
                        mask  = imageops::flip_horizontal(&mask);
                    }
                }
                Transform::VerticalFlip { p } => {
                    if rng.gen_bool(*p) {
                        image = imageops::flip_vertical(&image);
                        mask  = imageops::flip_vertical(&mask);
                    }
                }
                Transform::Normalize { mean, std, max_pixel_value } => {
                    normalization = Some((*mean, *std, *max_pixel_value));
                }
            }
        }

        to_item(&image, &mask, normalization)
    }
}

fn imagenet_normalize() -> Transform {
    Transform::Normalize { mean: IMAGENET_MEAN, std: IMAGENET_STD, max_pixel_value: 255.0 }
}

type Normalization = ([f32; 3], [f32; 3], f32);

/// HWC image → CHW vector (normalised if requested), HW mask → vector.
fn to_item(image: &RgbImage, mask: &GrayImage, normalization: Option<Normalization>) -> SegmentationItem {
    let (width, height) = image.dimensions();
    let plane = (width * height) as usize;

    let mut chw = vec![0.0f32; 3 * plane];
    for (x, y, pixel) in image.enumerate_pixels() {
        let offset = (y * width + x) as usize;
        for c in 0..3 {
            let v = pixel[c] as f32;
            chw[c * plane + offset] = match normalization {
                Some((mean, std, max)) => (v - mean[c] * max) / (std[c] * max),
                None => v,
            };
        }
    }

    SegmentationItem {
        image:  chw,
        mask:   mask.as_raw().iter().map(|&v| v as f32).collect(),
        height: height as usize,
        width:  width as usize,
    }
}

// ─── Rotation ─────────────────────────────────────────────────────────────────
// Inverse mapping about the image centre: for each output pixel,
// find where it came from in the source. Out-of-range coordinates
// are mirrored without repeating the edge pixel (reflect-101:
// ... 2 1 | 0 1 2 3 | 2 1 ...).

fn reflect_101(i: i64, n: i64) -> i64 {
    if n <= 1 {
        return 0;
    }
    let period = 2 * (n - 1);
    let m = i.rem_euclid(period);
    if m >= n { period - m } else { m }
}

/// Source coordinates for output pixel (x, y) when rotating by `angle_deg`.
fn source_coords(x: u32, y: u32, cx: f32, cy: f32, cos: f32, sin: f32) -> (f32, f32) {
    let dx = x as f32 - cx;
    let dy = y as f32 - cy;
    (cos * dx + sin * dy + cx, -sin * dx + cos * dy + cy)
}

pub(crate) fn rotate_nearest(mask: &GrayImage, angle_deg: f32) -> GrayImage {
    let (w, h) = mask.dimensions();
    let (sin, cos) = angle_deg.to_radians().sin_cos();
    let cx = (w as f32 - 1.0) / 2.0;
    let cy = (h as f32 - 1.0) / 2.0;

    GrayImage::from_fn(w, h, |x, y| {
        let (sx, sy) = source_coords(x, y, cx, cy, cos, sin);
        let sx = reflect_101(sx.round() as i64, w as i64) as u32;
        let sy = reflect_101(sy.round() as i64, h as i64) as u32;
        Luma([mask.get_pixel(sx, sy)[0]])
    })
}

pub(crate) fn rotate_bilinear(image: &RgbImage, angle_deg: f32) -> RgbImage {
    let (w, h) = image.dimensions();
    let (sin, cos) = angle_deg.to_radians().sin_cos();
    let cx = (w as f32 - 1.0) / 2.0;
    let cy = (h as f32 - 1.0) / 2.0;

    let at = |x: i64, y: i64| {
        *image.get_pixel(reflect_101(x, w as i64) as u32, reflect_101(y, h as i64) as u32)
    };

    RgbImage::from_fn(w, h, |x, y| {
        let (sx, sy) = source_coords(x, y, cx, cy, cos, sin);
        let (x0, y0) = (sx.floor(), sy.floor());
        let (fx, fy) = (sx - x0, sy - y0);
        let (x0, y0) = (x0 as i64, y0 as i64);

        let p00 = at(x0, y0);
        let p10 = at(x0 + 1, y0);
        let p01 = at(x0, y0 + 1);
        let p11 = at(x0 + 1, y0 + 1);

        let mut out = [0u8; 3];
        for c in 0..3 {
            let top    = p00[c] as f32 * (1.0 - fx) + p10[c] as f32 * fx;
            let bottom = p01[c] as f32 * (1.0 - fx) + p11[c] as f32 * fx;
            out[c] = (top * (1.0 - fy) + bottom * fy).round().clamp(0.0, 255.0) as u8;
        }
        Rgb(out)
    })
}
