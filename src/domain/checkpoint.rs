// ============================================================
// Layer 3 — Checkpoint Naming
// ============================================================
// Checkpoints are discovered by file name alone, so the name is
// the contract:
//
//   <prefix>_epoch_<N>.pth.tar
//
//   seg_model_epoch_0.pth.tar
//   seg_model_epoch_5.pth.tar
//   seg_model_epoch_20.pth.tar
//
// Parsing takes the text after the LAST underscore, strips the
// fixed suffix and reads the rest as a decimal epoch number.
// A name that carries the prefix but not this shape is an error,
// never a silent zero.

use anyhow::{bail, Context, Result};

/// Fixed extension every checkpoint file carries.
pub const CHECKPOINT_SUFFIX: &str = ".pth.tar";

const RENAME_HINT: &str = "rename it or move it out of the checkpoint directory";

/// A checkpoint identity: which run (prefix) and which epoch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CheckpointName {
    pub prefix: String,
    pub epoch:  usize,
}

impl CheckpointName {
    pub fn new(prefix: impl Into<String>, epoch: usize) -> Self {
        Self { prefix: prefix.into(), epoch }
    }

    /// The on-disk file name for this checkpoint.
    pub fn file_name(&self) -> String {
        format!("{}_epoch_{}{}", self.prefix, self.epoch, CHECKPOINT_SUFFIX)
    }

    /// Recognise a directory entry.
    ///
    /// Returns:
    ///   - `Ok(None)`        — the name does not start with `prefix`
    ///   - `Ok(Some(epoch))` — a well-formed checkpoint name
    ///   - `Err(..)`         — starts with `prefix` but is malformed
    pub fn parse(prefix: &str, file_name: &str) -> Result<Option<Self>> {
        if !file_name.starts_with(prefix) {
            return Ok(None);
        }

        // rsplit always yields at least one segment
        let last = file_name.rsplit('_').next().unwrap_or(file_name);

        let Some(number) = last.strip_suffix(CHECKPOINT_SUFFIX) else {
            bail!(
                "'{file_name}' starts with checkpoint prefix '{prefix}' \
                 but does not end in '_<epoch>{CHECKPOINT_SUFFIX}'; {RENAME_HINT}"
            );
        };

        let epoch = number.parse::<usize>().with_context(|| {
            format!("'{file_name}': '{number}' is not a valid epoch number; {RENAME_HINT}")
        })?;

        Ok(Some(Self::new(prefix, epoch)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_file_name_format() {
        let name = CheckpointName::new("seg_model", 15);
        assert_eq!(name.file_name(), "seg_model_epoch_15.pth.tar");
    }

    #[test]
    fn test_parse_well_formed() {
        let parsed = CheckpointName::parse("seg_model", "seg_model_epoch_10.pth.tar").unwrap();
        assert_eq!(parsed, Some(CheckpointName::new("seg_model", 10)));
    }

    #[test]
    fn test_parse_ignores_other_files() {
        assert_eq!(CheckpointName::parse("seg_model", "metrics.csv").unwrap(), None);
        assert_eq!(CheckpointName::parse("seg_model", "segmentation_model.mpk").unwrap(), None);
        assert_eq!(CheckpointName::parse("seg_model", "train_config.json").unwrap(), None);
    }

    #[test]
    fn test_parse_malformed_is_an_error() {
        // carries the prefix, wrong suffix
        assert!(CheckpointName::parse("seg_model", "seg_model_epoch_3.mpk").is_err());
        // carries the prefix, last segment is not a number
        assert!(CheckpointName::parse("seg_model", "seg_model_final.pth.tar").is_err());
        assert!(CheckpointName::parse("seg_model", "seg_model_epoch_-1.pth.tar").is_err());
    }

    #[test]
    fn test_malformed_error_names_file_and_suggests_rename() {
        // e.g. left behind by `--export seg_model_final`
        let err = CheckpointName::parse("seg_model", "seg_model_final.mpk").unwrap_err();
        let msg = format!("{err:#}");
        assert!(msg.contains("seg_model_final.mpk"));
        assert!(msg.contains("rename it"));

        let err = CheckpointName::parse("seg_model", "seg_model_epoch_x.pth.tar").unwrap_err();
        assert!(format!("{err:#}").contains("rename it"));
    }

    #[test]
    fn test_round_trip_name() {
        for epoch in [0, 5, 20, 105] {
            let name = CheckpointName::new("seg_model", epoch);
            let parsed = CheckpointName::parse("seg_model", &name.file_name()).unwrap();
            assert_eq!(parsed, Some(name));
        }
    }
}
