// ============================================================
// Layer 4 — Segmentation Dataset
// ============================================================
// Pairs every image in an image directory with the annotation of
// the same file stem in a mask directory:
//
//   images/training/ADE_train_00000001.jpg
//   annotations/training/ADE_train_00000001.png
//
// Decoding and augmentation happen lazily in `get`, so only the
// file list is held in memory.

use std::{
    collections::HashMap,
    fs,
    path::{Path, PathBuf},
};

use anyhow::{bail, Context, Result};
use burn::data::dataset::Dataset;

use crate::data::transform::{Pipeline, SegmentationItem};

const IMAGE_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png"];
const MASK_EXTENSIONS:  &[&str] = &["png"];

/// One image file and its annotation file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SamplePair {
    pub image: PathBuf,
    pub mask:  PathBuf,
}

pub struct SegmentationDataset {
    pairs:    Vec<SamplePair>,
    pipeline: Pipeline,
}

impl SegmentationDataset {
    pub fn new(pairs: Vec<SamplePair>, pipeline: Pipeline) -> Self {
        Self { pairs, pipeline }
    }

    /// Scan both directories and pair files by stem, sorted by name.
    /// Images with no annotation are skipped with a warning.
    pub fn from_dirs(image_dir: &Path, mask_dir: &Path, pipeline: Pipeline) -> Result<Self> {
        let masks: HashMap<String, PathBuf> = list_files(mask_dir, MASK_EXTENSIONS)?
            .into_iter()
            .filter_map(|path| stem_of(&path).map(|stem| (stem, path)))
            .collect();

        let mut pairs   = Vec::new();
        let mut skipped = 0usize;

        for image in list_files(image_dir, IMAGE_EXTENSIONS)? {
            let Some(stem) = stem_of(&image) else { continue };
            match masks.get(&stem) {
                Some(mask) => pairs.push(SamplePair { image, mask: mask.clone() }),
                None => {
                    skipped += 1;
                    tracing::warn!("No annotation for '{}', skipping", image.display());
                }
            }
        }

        if skipped > 0 {
            tracing::warn!("{} images in '{}' had no annotation", skipped, image_dir.display());
        }
        tracing::debug!("Paired {} samples from '{}'", pairs.len(), image_dir.display());

        Ok(Self::new(pairs, pipeline))
    }

    pub fn sample_count(&self) -> usize {
        self.pairs.len()
    }

    /// Decode one pair from disk and run it through the pipeline.
    pub fn load(&self, index: usize) -> Result<SegmentationItem> {
        let Some(pair) = self.pairs.get(index) else {
            bail!("sample index {index} out of range ({} samples)", self.pairs.len());
        };

        let image = image::open(&pair.image)
            .with_context(|| format!("Cannot decode image '{}'", pair.image.display()))?
            .to_rgb8();
        let mask = image::open(&pair.mask)
            .with_context(|| format!("Cannot decode mask '{}'", pair.mask.display()))?
            .to_luma8();

        if image.dimensions() != mask.dimensions() {
            bail!(
                "'{}' is {:?} but its mask is {:?}",
                pair.image.display(),
                image.dimensions(),
                mask.dimensions()
            );
        }

        let mut rng = rand::thread_rng();
        Ok(self.pipeline.apply(&image, &mask, &mut rng))
    }
}

/// Burn's DataLoader only sees `Option`; a sample that fails to
/// decode is logged and ends the current pass over the dataset.
/// The trainer and evaluator turn that short pass into an error.
impl Dataset<SegmentationItem> for SegmentationDataset {
    fn get(&self, index: usize) -> Option<SegmentationItem> {
        if index >= self.pairs.len() {
            return None;
        }
        match self.load(index) {
            Ok(item) => Some(item),
            Err(e) => {
                tracing::error!("Failed to load sample {}: {:#}", index, e);
                None
            }
        }
    }

    fn len(&self) -> usize {
        self.pairs.len()
    }
}

/// Files directly inside `dir` with one of `extensions`, sorted.
fn list_files(dir: &Path, extensions: &[&str]) -> Result<Vec<PathBuf>> {
    let mut files = Vec::new();

    for entry in fs::read_dir(dir)
        .with_context(|| format!("Cannot read directory '{}'", dir.display()))?
    {
        let path = entry?.path();
        let matches = path
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| extensions.iter().any(|x| x.eq_ignore_ascii_case(e)))
            .unwrap_or(false);
        if matches && path.is_file() {
            files.push(path);
        }
    }

    files.sort();
    Ok(files)
}

fn stem_of(path: &Path) -> Option<String> {
    path.file_stem().and_then(|s| s.to_str()).map(str::to_owned)
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{GrayImage, Luma, Rgb, RgbImage};

    fn setup(dir: &Path) -> (PathBuf, PathBuf) {
        let images = dir.join("images");
        let masks  = dir.join("masks");
        fs::create_dir_all(&images).unwrap();
        fs::create_dir_all(&masks).unwrap();
        (images, masks)
    }

    #[test]
    fn test_pairs_by_stem_and_skips_unannotated() {
        let dir = tempfile::tempdir().unwrap();
        let (images, masks) = setup(dir.path());

        RgbImage::new(8, 8).save(images.join("b.png")).unwrap();
        RgbImage::new(8, 8).save(images.join("a.png")).unwrap();
        RgbImage::new(8, 8).save(images.join("orphan.png")).unwrap();
        GrayImage::new(8, 8).save(masks.join("a.png")).unwrap();
        GrayImage::new(8, 8).save(masks.join("b.png")).unwrap();
        fs::write(images.join("notes.txt"), "ignored").unwrap();

        let ds = SegmentationDataset::from_dirs(&images, &masks, Pipeline::validation(4, 4)).unwrap();

        assert_eq!(ds.len(), 2);
        // sorted by name
        assert!(ds.pairs[0].image.ends_with("a.png"));
        assert!(ds.pairs[1].mask.ends_with("b.png"));
    }

    #[test]
    fn test_get_decodes_and_transforms() {
        let dir = tempfile::tempdir().unwrap();
        let (images, masks) = setup(dir.path());

        RgbImage::from_pixel(10, 6, Rgb([50, 60, 70])).save(images.join("x.png")).unwrap();
        GrayImage::from_pixel(10, 6, Luma([12])).save(masks.join("x.png")).unwrap();

        let ds   = SegmentationDataset::from_dirs(&images, &masks, Pipeline::validation(4, 8)).unwrap();
        let item = ds.get(0).unwrap();

        assert_eq!((item.height, item.width), (4, 8));
        assert_eq!(item.image.len(), 3 * 4 * 8);
        assert!(item.mask.iter().all(|&v| v == 12.0));
        assert!(ds.get(1).is_none());
    }

    #[test]
    fn test_mismatched_mask_size_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let (images, masks) = setup(dir.path());

        RgbImage::new(10, 10).save(images.join("x.png")).unwrap();
        GrayImage::new(5, 5).save(masks.join("x.png")).unwrap();

        let ds = SegmentationDataset::from_dirs(&images, &masks, Pipeline::validation(4, 4)).unwrap();
        assert!(ds.load(0).is_err());
        assert!(ds.get(0).is_none());
    }

    #[test]
    fn test_missing_directory_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let result = SegmentationDataset::from_dirs(
            &dir.path().join("nope"),
            &dir.path().join("nope_either"),
            Pipeline::validation(4, 4),
        );
        assert!(result.is_err());
    }
}
