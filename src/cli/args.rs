// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license

use clap::{Args, Parser, Subcommand};

/// CLI arguments parser.
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
#[command(after_help = r#"Examples:
    sign-inference classify --weights model.safetensors --clip clip.json
    sign-inference classify -w model.safetensors -c capture.json --raw --threshold 0.5
    sign-inference classify -w police.safetensors -c clip.json --labels police.txt
    sign-inference normalize --clip capture.json --output clip.json"#)]
pub struct Cli {
    #[command(subcommand)]
    /// Subcommand to execute.
    pub command: Commands,
}

/// Commands for the CLI.
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Classify a keypoint clip into a sign label
    Classify(ClassifyArgs),
    /// Segment and normalize a raw keypoint capture to 60 frames
    Normalize(NormalizeArgs),
}

/// Arguments for the classify command.
#[derive(Args, Debug)]
pub struct ClassifyArgs {
    /// Path to SafeTensors weights
    #[arg(short, long)]
    pub weights: String,

    /// Keypoint clip JSON (normalized unless --raw)
    #[arg(short, long)]
    pub clip: String,

    /// Label file, one label per line [default: 10 emergency signs]
    #[arg(short, long)]
    pub labels: Option<String>,

    /// Device to use (cpu, cuda:0, mps)
    #[arg(long)]
    pub device: Option<String>,

    /// Reject predictions whose top-1 probability is at or below this value
    #[arg(long)]
    pub threshold: Option<f32>,

    /// Segment and normalize the clip before classifying
    #[arg(long, default_value_t = false)]
    pub raw: bool,

    /// Show verbose output
    #[arg(long, default_value_t = true, action = clap::ArgAction::Set)]
    pub verbose: bool,
}

/// Arguments for the normalize command.
#[derive(Args, Debug)]
pub struct NormalizeArgs {
    /// Raw keypoint capture JSON
    #[arg(short, long)]
    pub clip: String,

    /// Output path [default: print to stdout]
    #[arg(short, long)]
    pub output: Option<String>,

    /// Frames in the normalized clip
    #[arg(long, default_value_t = 60)]
    pub frames: usize,

    /// Show verbose output
    #[arg(long, default_value_t = true, action = clap::ArgAction::Set)]
    pub verbose: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn verify_cli() {
        use clap::CommandFactory;
        Cli::command().debug_assert();
    }

    #[test]
    fn test_classify_args_defaults() {
        let args = Cli::parse_from(["app", "classify", "--weights", "model.safetensors", "--clip", "clip.json"]);
        match args.command {
            Commands::Classify(classify_args) => {
                assert_eq!(classify_args.weights, "model.safetensors");
                assert_eq!(classify_args.clip, "clip.json");
                assert!(classify_args.labels.is_none());
                assert!(classify_args.threshold.is_none());
                assert!(!classify_args.raw);
                assert!(classify_args.verbose);
            }
            Commands::Normalize(_) => panic!("expected classify"),
        }
    }

    #[test]
    fn test_classify_args_custom() {
        let args = Cli::parse_from([
            "app",
            "classify",
            "-w",
            "police.safetensors",
            "-c",
            "capture.json",
            "--labels",
            "police.txt",
            "--threshold",
            "0.5",
            "--raw",
            "--device",
            "cpu",
            "--verbose",
            "false",
        ]);
        match args.command {
            Commands::Classify(classify_args) => {
                assert_eq!(classify_args.labels.as_deref(), Some("police.txt"));
                assert_eq!(classify_args.threshold, Some(0.5));
                assert_eq!(classify_args.device.as_deref(), Some("cpu"));
                assert!(classify_args.raw);
                assert!(!classify_args.verbose);
            }
            Commands::Normalize(_) => panic!("expected classify"),
        }
    }

    #[test]
    fn test_normalize_args() {
        let args = Cli::parse_from(["app", "normalize", "--clip", "raw.json", "-o", "out.json"]);
        match args.command {
            Commands::Normalize(normalize_args) => {
                assert_eq!(normalize_args.clip, "raw.json");
                assert_eq!(normalize_args.output.as_deref(), Some("out.json"));
                assert_eq!(normalize_args.frames, 60);
            }
            Commands::Classify(_) => panic!("expected normalize"),
        }
    }
}
