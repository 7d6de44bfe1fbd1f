use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

#[derive(Debug, Parser)]
#[command(
    name = "framemark",
    about = "Annotate video frames with bounding boxes and build training datasets",
    disable_help_subcommand = true
)]
pub struct CliArgs {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Step through a video and draw boxes on every Nth frame
    Annotate(AnnotateArgs),
    /// Split annotated frames into train/val/test_dev sets
    Split(SplitArgs),
    /// Print the training command for the configured model
    TrainCommand(ConfigArgs),
    /// Print the decoding backends compiled into this build
    ListBackends,
}

#[derive(Debug, Args)]
pub struct ConfigArgs {
    /// Override the configuration file path
    #[arg(long = "config")]
    pub config: Option<PathBuf>,
}

#[derive(Debug, Args)]
pub struct AnnotateArgs {
    /// Video file, or a directory of frame images
    #[arg(value_name = "VIDEO")]
    pub input: PathBuf,

    /// Lock decoding to a specific backend implementation
    #[arg(short = 'b', long = "backend")]
    pub backend: Option<String>,

    #[command(flatten)]
    pub config: ConfigArgs,

    /// Root for images/<session>/ and labels/<session>/
    #[arg(long = "output-root", value_name = "DIR")]
    pub output_root: Option<PathBuf>,

    /// Replay input commands from a file instead of reading stdin
    #[arg(long = "script", value_name = "FILE")]
    pub script: Option<PathBuf>,

    /// Keep a JPEG of the annotated view at this path
    #[arg(long = "preview", value_name = "FILE")]
    pub preview: Option<PathBuf>,

    /// Frame to open first (rounded down to the stride)
    #[arg(long = "start-frame", default_value_t = 0)]
    pub start_frame: u64,

    /// Frames skipped by next/prev
    #[arg(long = "stride", value_parser = clap::value_parser!(u64).range(1..))]
    pub stride: Option<u64>,
}

#[derive(Debug, Args)]
pub struct SplitArgs {
    #[command(flatten)]
    pub config: ConfigArgs,

    /// Annotation output root holding images/ and labels/
    #[arg(long = "raw", value_name = "DIR")]
    pub raw: Option<PathBuf>,

    /// Directory that receives dataset_<timestamp>/
    #[arg(long = "out", value_name = "DIR")]
    pub out: Option<PathBuf>,
}

pub fn parse_cli() -> CliArgs {
    CliArgs::parse()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_annotate_flags() {
        let args = CliArgs::try_parse_from([
            "framemark",
            "annotate",
            "clip.mp4",
            "--backend",
            "mock",
            "--stride",
            "5",
            "--start-frame",
            "42",
            "--config",
            "cfg.json",
        ])
        .unwrap();
        let Command::Annotate(annotate) = args.command else {
            panic!("expected annotate");
        };
        assert_eq!(annotate.input, PathBuf::from("clip.mp4"));
        assert_eq!(annotate.backend.as_deref(), Some("mock"));
        assert_eq!(annotate.stride, Some(5));
        assert_eq!(annotate.start_frame, 42);
        assert_eq!(annotate.config.config, Some(PathBuf::from("cfg.json")));
    }

    #[test]
    fn rejects_zero_stride() {
        assert!(CliArgs::try_parse_from(["framemark", "annotate", "v.mp4", "--stride", "0"]).is_err());
    }

    #[test]
    fn parses_other_subcommands() {
        let split = CliArgs::try_parse_from(["framemark", "split", "--raw", "r", "--out", "o"]).unwrap();
        assert!(matches!(split.command, Command::Split(SplitArgs { raw: Some(_), out: Some(_), .. })));
        let train = CliArgs::try_parse_from(["framemark", "train-command"]).unwrap();
        assert!(matches!(train.command, Command::TrainCommand(_)));
        let list = CliArgs::try_parse_from(["framemark", "list-backends"]).unwrap();
        assert!(matches!(list.command, Command::ListBackends));
    }
}
