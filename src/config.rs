//! Experiment parameters: defaults, YAML loading, CLI overrides, validation.

use std::{fs::File, io::BufReader, path::Path};

use anyhow::{Context, Result, ensure};
use serde::{Deserialize, Serialize};

use crate::{
    cli::{FitArgs, TuningArgs},
    features::BadRowPolicy,
    model::{DEFAULT_GRADIENT_TOLERANCE, DEFAULT_MAX_ITERATIONS, DEFAULT_THRESHOLD, TrainOptions},
};

pub const DEFAULT_SEED: u64 = 13;
pub const DEFAULT_TRAIN_FRACTION: f64 = 0.8;
pub const DEFAULT_PARTITIONS: usize = 1000;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ExperimentConfig {
    pub seed: u64,
    /// Days whose draw exceeds this value are held out.
    pub train_fraction: f64,
    /// Decision threshold. Unset means 0.7 when training and the saved
    /// model's own threshold when evaluating.
    pub threshold: Option<f64>,
    pub partitions: usize,
    pub max_iterations: u64,
    pub gradient_tolerance: f64,
    pub l2_penalty: f64,
    pub on_bad_row: BadRowPolicy,
}

impl Default for ExperimentConfig {
    fn default() -> Self {
        Self {
            seed: DEFAULT_SEED,
            train_fraction: DEFAULT_TRAIN_FRACTION,
            threshold: None,
            partitions: DEFAULT_PARTITIONS,
            max_iterations: DEFAULT_MAX_ITERATIONS,
            gradient_tolerance: DEFAULT_GRADIENT_TOLERANCE,
            l2_penalty: 0.0,
            on_bad_row: BadRowPolicy::Fail,
        }
    }
}

impl ExperimentConfig {
    pub fn load(path: &Path) -> Result<Self> {
        let file = File::open(path).with_context(|| format!("Opening config file {path:?}"))?;
        let config: ExperimentConfig = serde_yaml::from_reader(BufReader::new(file))
            .with_context(|| format!("Parsing config YAML {path:?}"))?;
        Ok(config)
    }

    /// File values (or defaults) overridden by any flag given on the command
    /// line. `fit` carries the optimiser flags, which only `train` accepts.
    pub fn resolve(tuning: &TuningArgs, fit: Option<&FitArgs>) -> Result<Self> {
        let mut config = match &tuning.config {
            Some(path) => Self::load(path)?,
            None => Self::default(),
        };
        config.apply_overrides(tuning);
        if let Some(fit) = fit {
            config.apply_fit_overrides(fit);
        }
        config.validate()?;
        Ok(config)
    }

    pub fn apply_overrides(&mut self, tuning: &TuningArgs) {
        if let Some(seed) = tuning.seed {
            self.seed = seed;
        }
        if let Some(fraction) = tuning.train_fraction {
            self.train_fraction = fraction;
        }
        if let Some(threshold) = tuning.threshold {
            self.threshold = Some(threshold);
        }
        if let Some(partitions) = tuning.partitions {
            self.partitions = partitions;
        }
        if let Some(policy) = tuning.on_bad_row {
            self.on_bad_row = policy;
        }
    }

    pub fn apply_fit_overrides(&mut self, fit: &FitArgs) {
        if let Some(max_iterations) = fit.max_iterations {
            self.max_iterations = max_iterations;
        }
        if let Some(tolerance) = fit.gradient_tolerance {
            self.gradient_tolerance = tolerance;
        }
        if let Some(l2) = fit.l2_penalty {
            self.l2_penalty = l2;
        }
    }

    pub fn validate(&self) -> Result<()> {
        ensure!(
            (0.0..=1.0).contains(&self.train_fraction),
            "train_fraction must be within [0, 1] (got {})",
            self.train_fraction
        );
        if let Some(threshold) = self.threshold {
            ensure!(
                (0.0..=1.0).contains(&threshold),
                "threshold must be within [0, 1] (got {threshold})"
            );
        }
        ensure!(self.partitions >= 1, "partitions must be at least 1");
        ensure!(self.max_iterations >= 1, "max_iterations must be at least 1");
        ensure!(
            self.gradient_tolerance > 0.0,
            "gradient_tolerance must be positive (got {})",
            self.gradient_tolerance
        );
        ensure!(
            self.l2_penalty >= 0.0,
            "l2_penalty cannot be negative (got {})",
            self.l2_penalty
        );
        Ok(())
    }

    pub fn train_options(&self) -> TrainOptions {
        TrainOptions {
            max_iterations: self.max_iterations,
            gradient_tolerance: self.gradient_tolerance,
            l2_penalty: self.l2_penalty,
            threshold: self.threshold.unwrap_or(DEFAULT_THRESHOLD),
        }
    }
}
