//! End-to-end experiment pipeline.
//!
//! An [`ExperimentContext`] is built once per command from the resolved
//! configuration and input options, drives load -> split -> join -> extract
//! -> train/evaluate, and is consumed by the run so nothing outlives it.

use std::{
    io::Write,
    path::{Path, PathBuf},
};

use anyhow::{Context, Result, ensure};
use encoding_rs::Encoding;
use log::{debug, info, warn};

use crate::{
    cli::{EvaluateArgs, InputArgs, ReportArgs, SummaryFormat, TrainArgs},
    config::ExperimentConfig,
    evaluate::{EvaluationSummary, evaluate, label_predictions},
    features::{LabeledExample, extract_examples},
    io_utils,
    join::{DayLookup, JoinedSplits, SplitRole},
    model::{self, LogisticModel},
    records::{ReadOptions, flight_records, read_day_table},
    schema::{self, Schema},
    split::DaySplitter,
    table,
};

#[derive(Debug, Clone)]
pub struct ExperimentInputs {
    pub days: PathBuf,
    pub flights: Vec<PathBuf>,
    pub flight_header: bool,
    pub flight_schema: Option<PathBuf>,
    pub delimiter: Option<u8>,
    pub input_encoding: Option<String>,
}

impl From<&InputArgs> for ExperimentInputs {
    fn from(args: &InputArgs) -> Self {
        Self {
            days: args.days.clone(),
            flights: args.flights.clone(),
            flight_header: !args.no_flight_header,
            flight_schema: args.flight_schema.clone(),
            delimiter: args.delimiter,
            input_encoding: args.input_encoding.clone(),
        }
    }
}

pub struct ExperimentContext {
    config: ExperimentConfig,
    inputs: ExperimentInputs,
    schema: Schema,
    encoding: &'static Encoding,
}

#[derive(Debug, Clone)]
pub struct TrainingReport {
    pub model: LogisticModel,
    pub summary: EvaluationSummary,
    pub train_examples: usize,
    pub holdout_examples: usize,
}

impl ExperimentContext {
    pub fn new(config: ExperimentConfig, inputs: ExperimentInputs) -> Result<Self> {
        config.validate()?;
        ensure!(
            !inputs.flights.is_empty(),
            "At least one flight input is required"
        );
        let encoding = io_utils::resolve_encoding(inputs.input_encoding.as_deref())?;
        let schema = match &inputs.flight_schema {
            Some(path) => {
                Schema::load(path).with_context(|| format!("Loading schema from {path:?}"))?
            }
            None => schema::flight_schema(),
        };
        Ok(Self {
            config,
            inputs,
            schema,
            encoding,
        })
    }

    fn day_lookup(&self) -> Result<DayLookup> {
        let table = read_day_table(&self.inputs.days, self.inputs.delimiter, self.encoding)?;
        let splitter = DaySplitter::new(self.config.seed, self.config.train_fraction)?;
        let (days, counts) = splitter.assign(&table);
        info!(
            "Assigned {} day(s) with seed {}: {} train, {} holdout",
            days.len(),
            splitter.seed(),
            counts.train,
            counts.holdout
        );
        let lookup = DayLookup::new(days);
        debug!("Indexed {} day record(s) by date", lookup.len());
        Ok(lookup)
    }

    fn join(&self, keep: &[SplitRole]) -> Result<JoinedSplits> {
        let lookup = self.day_lookup()?;
        let options = ReadOptions {
            delimiter: self.inputs.delimiter,
            encoding: self.encoding,
            has_headers: self.schema.has_headers && self.inputs.flight_header,
        };
        let mut splits = JoinedSplits::default();
        for path in &self.inputs.flights {
            debug!("Joining flights from {path:?}");
            let flights = flight_records(path, &self.schema, options)?;
            splits
                .absorb(flights, &lookup, keep)
                .with_context(|| format!("Joining flights from {path:?}"))?;
        }
        splits.log_summary();
        Ok(splits)
    }

    fn examples(&self, splits: &JoinedSplits, role: SplitRole) -> Result<Vec<LabeledExample>> {
        let rows = splits.rows(role);
        let extraction = extract_examples(rows, self.config.partitions, self.config.on_bad_row)
            .with_context(|| format!("Building {role:?} examples"))?;
        info!(
            "Built {} {:?} example(s) from {} row(s)",
            extraction.examples.len(),
            role,
            rows.len()
        );
        Ok(extraction.examples)
    }

    fn score(&self, model: &LogisticModel, holdout: &[LabeledExample]) -> EvaluationSummary {
        if holdout.is_empty() {
            warn!(
                "No holdout examples with seed {} and train fraction {}; summary is masked",
                self.config.seed, self.config.train_fraction
            );
        }
        evaluate(label_predictions(model, holdout))
    }

    pub fn run_training(self, model_path: &Path) -> Result<TrainingReport> {
        let splits = self.join(&[SplitRole::Train, SplitRole::Holdout])?;
        let train = self.examples(&splits, SplitRole::Train)?;
        let model = model::train(&train, &self.config.train_options())?;
        model
            .save(model_path)
            .with_context(|| format!("Saving model to {model_path:?}"))?;
        info!("Model written to {model_path:?}");

        let holdout = self.examples(&splits, SplitRole::Holdout)?;
        let summary = self.score(&model, &holdout);
        Ok(TrainingReport {
            model,
            summary,
            train_examples: train.len(),
            holdout_examples: holdout.len(),
        })
    }

    pub fn run_evaluation(self, model: &LogisticModel) -> Result<EvaluationSummary> {
        let splits = self.join(&[SplitRole::Holdout])?;
        let holdout = self.examples(&splits, SplitRole::Holdout)?;
        Ok(self.score(model, &holdout))
    }
}

pub fn execute_train(args: &TrainArgs) -> Result<()> {
    let config = ExperimentConfig::resolve(&args.tuning, Some(&args.fit))?;
    let context = ExperimentContext::new(config, ExperimentInputs::from(&args.inputs))?;
    let report = context.run_training(&args.model)?;
    info!(
        "Trained on {} example(s), evaluated on {} holdout example(s)",
        report.train_examples, report.holdout_examples
    );
    emit_summary(&report.summary, &args.report)
}

pub fn execute_evaluate(args: &EvaluateArgs) -> Result<()> {
    let config = ExperimentConfig::resolve(&args.tuning, None)?;
    let mut model = LogisticModel::load(&args.model)
        .with_context(|| format!("Loading model from {:?}", args.model))?;
    if let Some(threshold) = config.threshold {
        debug!(
            "Overriding saved threshold {} with {threshold}",
            model.threshold
        );
        model = model.with_threshold(threshold);
    }
    let context = ExperimentContext::new(config, ExperimentInputs::from(&args.inputs))?;
    let summary = context.run_evaluation(&model)?;
    emit_summary(&summary, &args.report)
}

fn emit_summary(summary: &EvaluationSummary, report: &ReportArgs) -> Result<()> {
    match report.format {
        SummaryFormat::Table => {
            let headers = vec!["metric".to_string(), "value".to_string()];
            print!("{}", table::render_table(&headers, &summary.render_rows()));
        }
        SummaryFormat::Json => {
            let json =
                serde_json::to_string_pretty(summary).context("Serializing summary to JSON")?;
            println!("{json}");
        }
    }
    if let Some(path) = &report.summary_output {
        let mut writer = io_utils::open_output(Some(path))?;
        serde_json::to_writer_pretty(&mut writer, summary)
            .with_context(|| format!("Writing summary to {path:?}"))?;
        writer
            .flush()
            .with_context(|| format!("Flushing summary to {path:?}"))?;
    }
    Ok(())
}
