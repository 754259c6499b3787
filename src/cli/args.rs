// ============================================================
// Layer 1 — CLI Arguments
// ============================================================
// The training flags. clap's derive macros generate help text,
// error messages and type conversion (string → usize, f64, bool).
//
// Long flags only; field names are turned into kebab-case flags,
// so `weight_decay` is `--weight-decay`.

use std::path::PathBuf;

use clap::{ArgAction, Args};

use crate::application::train_use_case::TrainConfig;

#[derive(Args, Debug)]
pub struct TrainArgs {
    /// Batch size
    #[arg(long, default_value_t = 16)]
    pub batch: usize,

    /// Path to dataset root dir (empty = ADEChallengeData2016 in the working directory)
    #[arg(long, default_value = "")]
    pub data: String,

    /// Number of epochs
    #[arg(long, default_value_t = 20)]
    pub epochs: usize,

    /// Learning rate
    #[arg(long, default_value_t = 1e-2)]
    pub lr: f64,

    /// Momentum for the training optimizer (Adam's first-moment decay)
    #[arg(long, default_value_t = 0.9)]
    pub momentum: f64,

    /// Weight decay
    #[arg(long, default_value_t = 5e-4)]
    pub weight_decay: f64,

    /// Epoch to start from when no later checkpoint is found
    #[arg(long, default_value_t = 0)]
    pub start_from: usize,

    /// Where to export the trained model weights
    #[arg(long, default_value = "segmentation_model.mpk")]
    pub export: PathBuf,

    /// Load the latest checkpoint from the working directory (true/false)
    #[arg(long, default_value_t = true, action = ArgAction::Set)]
    pub load_model: bool,
}

/// Boundary between Layer 1 and Layer 2 —
/// the application layer never sees clap types.
impl From<TrainArgs> for TrainConfig {
    fn from(a: TrainArgs) -> Self {
        TrainConfig {
            batch_size:   a.batch,
            data_root:    a.data,
            epochs:       a.epochs,
            lr:           a.lr,
            momentum:     a.momentum,
            weight_decay: a.weight_decay,
            start_from:   a.start_from,
            export_path:  a.export,
            load_model:   a.load_model,
            ..TrainConfig::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use clap::Parser;

    use crate::cli::Cli;
    use crate::application::train_use_case::TrainConfig;

    #[test]
    fn test_defaults() {
        let cli = Cli::try_parse_from(["seg-train"]).unwrap();
        let cfg: TrainConfig = cli.train.into();

        assert_eq!(cfg.batch_size, 16);
        assert_eq!(cfg.data_root, "");
        assert_eq!(cfg.epochs, 20);
        assert!((cfg.lr - 1e-2).abs() < 1e-12);
        assert!((cfg.momentum - 0.9).abs() < 1e-12);
        assert!((cfg.weight_decay - 5e-4).abs() < 1e-12);
        assert_eq!(cfg.start_from, 0);
        assert!(cfg.load_model);
    }

    #[test]
    fn test_explicit_flags() {
        let cli = Cli::try_parse_from([
            "seg-train",
            "--batch", "4",
            "--data", "/datasets",
            "--epochs", "5",
            "--weight-decay", "0.001",
            "--start-from", "3",
            "--load-model", "false",
            "--export", "out/model.mpk",
        ])
        .unwrap();
        let cfg: TrainConfig = cli.train.into();

        assert_eq!(cfg.batch_size, 4);
        assert_eq!(cfg.data_root, "/datasets");
        assert_eq!(cfg.epochs, 5);
        assert!((cfg.weight_decay - 0.001).abs() < 1e-12);
        assert_eq!(cfg.start_from, 3);
        assert!(!cfg.load_model);
        assert_eq!(cfg.export_path.to_str(), Some("out/model.mpk"));
    }

    #[test]
    fn test_malformed_number_is_rejected() {
        assert!(Cli::try_parse_from(["seg-train", "--epochs", "ten"]).is_err());
        assert!(Cli::try_parse_from(["seg-train", "--lr", "fast"]).is_err());
    }

    #[test]
    fn test_no_short_flags() {
        assert!(Cli::try_parse_from(["seg-train", "-b", "4"]).is_err());
    }
}
