use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};

use crate::features::BadRowPolicy;

#[derive(Debug, Parser)]
#[command(author, version, about = "Predict on-time flight arrivals with logistic regression", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Write the typed flight schema as YAML
    Schema(SchemaArgs),
    /// Assign training days to train or holdout and write the result
    Split(SplitArgs),
    /// Train on the train split, save the model, and evaluate on the holdout split
    Train(TrainArgs),
    /// Evaluate a saved model on the holdout split
    Evaluate(EvaluateArgs),
}

#[derive(Debug, Args)]
pub struct SchemaArgs {
    /// Destination YAML file (stdout if omitted)
    #[arg(short = 'o', long = "output")]
    pub output: Option<PathBuf>,
}

#[derive(Debug, Args)]
pub struct SplitArgs {
    /// Day table with FL_DATE and is_train_day columns
    #[arg(short = 'd', long = "days")]
    pub days: PathBuf,
    /// Output CSV file (stdout if omitted)
    #[arg(short = 'o', long = "output")]
    pub output: Option<PathBuf>,
    /// YAML experiment configuration
    #[arg(long)]
    pub config: Option<PathBuf>,
    /// Seed for the holdout draw
    #[arg(long)]
    pub seed: Option<u64>,
    /// Days whose draw exceeds this fraction are held out
    #[arg(long = "train-fraction")]
    pub train_fraction: Option<f64>,
    /// CSV delimiter character
    #[arg(long, value_parser = parse_delimiter)]
    pub delimiter: Option<u8>,
    /// Character encoding of the input file (defaults to utf-8)
    #[arg(long = "input-encoding")]
    pub input_encoding: Option<String>,
}

/// Experiment parameters shared by `train` and `evaluate`; each flag
/// overrides the config file.
#[derive(Debug, Clone, Default, Args)]
pub struct TuningArgs {
    /// YAML experiment configuration
    #[arg(long)]
    pub config: Option<PathBuf>,
    /// Seed for the holdout draw
    #[arg(long)]
    pub seed: Option<u64>,
    /// Days whose draw exceeds this fraction are held out
    #[arg(long = "train-fraction")]
    pub train_fraction: Option<f64>,
    /// Score above which a flight is predicted on time
    #[arg(long)]
    pub threshold: Option<f64>,
    /// Number of chunks for parallel feature extraction
    #[arg(long)]
    pub partitions: Option<usize>,
    /// What to do with rows whose features cannot be extracted
    #[arg(long = "on-bad-row", value_enum)]
    pub on_bad_row: Option<BadRowPolicy>,
}

/// Optimiser parameters, accepted by `train` only.
#[derive(Debug, Clone, Default, Args)]
pub struct FitArgs {
    /// Maximum LBFGS iterations
    #[arg(long = "max-iterations")]
    pub max_iterations: Option<u64>,
    /// LBFGS gradient tolerance
    #[arg(long = "gradient-tolerance")]
    pub gradient_tolerance: Option<f64>,
    /// L2 regularization strength (0 disables)
    #[arg(long = "l2-penalty")]
    pub l2_penalty: Option<f64>,
}

#[derive(Debug, Clone, Args)]
pub struct InputArgs {
    /// Day table with FL_DATE and is_train_day columns
    #[arg(short = 'd', long = "days")]
    pub days: PathBuf,
    /// Flight CSV input (repeat for sharded inputs)
    #[arg(short = 'f', long = "flights", required = true, action = clap::ArgAction::Append)]
    pub flights: Vec<PathBuf>,
    /// Flight files carry no header row; columns are taken positionally
    #[arg(long = "no-flight-header")]
    pub no_flight_header: bool,
    /// YAML schema replacing the built-in flight schema
    #[arg(long = "flight-schema")]
    pub flight_schema: Option<PathBuf>,
    /// CSV delimiter character for all inputs
    #[arg(long, value_parser = parse_delimiter)]
    pub delimiter: Option<u8>,
    /// Character encoding of the input files (defaults to utf-8)
    #[arg(long = "input-encoding")]
    pub input_encoding: Option<String>,
}

#[derive(Debug, Clone, Copy, ValueEnum, PartialEq, Eq, Default)]
#[value(rename_all = "kebab-case")]
pub enum SummaryFormat {
    #[default]
    Table,
    Json,
}

#[derive(Debug, Clone, Args)]
pub struct ReportArgs {
    /// How to print the evaluation summary
    #[arg(long = "format", value_enum, default_value = "table")]
    pub format: SummaryFormat,
    /// Also write the evaluation summary as JSON to this file
    #[arg(long = "summary-output")]
    pub summary_output: Option<PathBuf>,
}

#[derive(Debug, Args)]
pub struct TrainArgs {
    #[command(flatten)]
    pub inputs: InputArgs,
    /// Destination for the trained model (JSON)
    #[arg(short = 'm', long = "model")]
    pub model: PathBuf,
    #[command(flatten)]
    pub tuning: TuningArgs,
    #[command(flatten)]
    pub fit: FitArgs,
    #[command(flatten)]
    pub report: ReportArgs,
}

#[derive(Debug, Args)]
pub struct EvaluateArgs {
    #[command(flatten)]
    pub inputs: InputArgs,
    /// Model produced by `train`
    #[arg(short = 'm', long = "model")]
    pub model: PathBuf,
    #[command(flatten)]
    pub tuning: TuningArgs,
    #[command(flatten)]
    pub report: ReportArgs,
}

pub fn parse_delimiter(value: &str) -> Result<u8, String> {
    match value {
        "tab" | "\t" => Ok(b'\t'),
        "comma" | "," => Ok(b','),
        "|" | "pipe" => Ok(b'|'),
        ";" | "semicolon" => Ok(b';'),
        other => {
            let mut chars = other.chars();
            let first = chars
                .next()
                .ok_or_else(|| "Delimiter cannot be empty".to_string())?;
            if chars.next().is_some() {
                return Err("Delimiter must be a single character".to_string());
            }
            if !first.is_ascii() {
                return Err("Delimiter must be ASCII".to_string());
            }
            Ok(first as u8)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_delimiter_accepts_names_and_characters() {
        assert_eq!(parse_delimiter("tab"), Ok(b'\t'));
        assert_eq!(parse_delimiter("pipe"), Ok(b'|'));
        assert_eq!(parse_delimiter(":"), Ok(b':'));
        assert!(parse_delimiter("").is_err());
        assert!(parse_delimiter("ab").is_err());
    }

    #[test]
    fn train_args_collect_repeated_flight_inputs() {
        let cli = Cli::try_parse_from([
            "flight-ontime",
            "train",
            "--days",
            "days.csv",
            "--flights",
            "a.csv",
            "--flights",
            "b.csv",
            "--model",
            "model.json",
            "--on-bad-row",
            "skip",
            "--format",
            "json",
        ])
        .expect("parse");
        match cli.command {
            Commands::Train(args) => {
                assert_eq!(args.inputs.flights.len(), 2);
                assert_eq!(args.tuning.on_bad_row, Some(BadRowPolicy::Skip));
                assert_eq!(args.report.format, SummaryFormat::Json);
                assert_eq!(args.tuning.seed, None);
                assert_eq!(args.fit.l2_penalty, None);
            }
            other => panic!("unexpected command {other:?}"),
        }
    }

    #[test]
    fn evaluate_rejects_fit_only_flags() {
        let base = [
            "flight-ontime",
            "evaluate",
            "--days",
            "days.csv",
            "--flights",
            "a.csv",
            "--model",
            "model.json",
        ];
        for flag in ["--l2-penalty", "--max-iterations", "--gradient-tolerance"] {
            let result = Cli::try_parse_from(base.iter().copied().chain([flag, "1"]));
            assert!(result.is_err(), "{flag} should be rejected by evaluate");
        }
        assert!(Cli::try_parse_from(base.iter().copied().chain(["--threshold", "0.5"])).is_ok());
    }
}
