//! Logistic regression classifier for on-time arrival.
//!
//! Fitting is delegated to `linfa-logistic` (LBFGS). The fitted coefficients
//! are copied into [`LogisticModel`], which owns the decision threshold and
//! the JSON persistence format.

use std::{fs::File, io::BufReader, path::Path};

use anyhow::{Context, Result, anyhow, ensure};
use linfa::{DatasetBase, prelude::*};
use linfa_logistic::LogisticRegression;
use log::{debug, info};
use ndarray::{Array1, Array2};
use serde::{Deserialize, Serialize};

use crate::features::{FEATURE_COUNT, FEATURE_NAMES, LabeledExample};

pub const MODEL_VERSION: u32 = 1;
pub const DEFAULT_THRESHOLD: f64 = 0.7;
pub const DEFAULT_MAX_ITERATIONS: u64 = 100;
pub const DEFAULT_GRADIENT_TOLERANCE: f64 = 1e-4;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TrainOptions {
    pub max_iterations: u64,
    pub gradient_tolerance: f64,
    /// L2 penalty; zero fits the unregularized model.
    pub l2_penalty: f64,
    pub threshold: f64,
}

impl Default for TrainOptions {
    fn default() -> Self {
        Self {
            max_iterations: DEFAULT_MAX_ITERATIONS,
            gradient_tolerance: DEFAULT_GRADIENT_TOLERANCE,
            l2_penalty: 0.0,
            threshold: DEFAULT_THRESHOLD,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogisticModel {
    pub model_version: u32,
    pub feature_names: Vec<String>,
    pub intercept: f64,
    pub weights: Vec<f64>,
    pub threshold: f64,
}

pub fn train(examples: &[LabeledExample], options: &TrainOptions) -> Result<LogisticModel> {
    ensure!(!examples.is_empty(), "Empty training set");
    let on_time = examples.iter().filter(|e| e.label == 1.0).count();
    ensure!(
        on_time > 0 && on_time < examples.len(),
        "Training set needs both on-time and late examples ({on_time} of {} on time)",
        examples.len()
    );

    let flat = examples
        .iter()
        .flat_map(|e| e.features.iter().copied())
        .collect::<Vec<_>>();
    let records = Array2::from_shape_vec((examples.len(), FEATURE_COUNT), flat)
        .context("Building training matrix")?;
    let targets = examples
        .iter()
        .map(|e| e.label as usize)
        .collect::<Array1<usize>>();
    let dataset = DatasetBase::new(records, targets);

    info!(
        "Fitting logistic regression on {} example(s) ({} on time)",
        examples.len(),
        on_time
    );
    let fitted = LogisticRegression::default()
        .with_intercept(true)
        .alpha(options.l2_penalty)
        .max_iterations(options.max_iterations)
        .gradient_tolerance(options.gradient_tolerance)
        .fit(&dataset)
        .map_err(|err| anyhow!("Fitting logistic regression: {err}"))?;

    let mut intercept = fitted.intercept();
    let mut weights = fitted.params().to_vec();
    let classes: Array1<usize> = fitted.predict(dataset.records());
    if positive_class_is_late(intercept, &weights, examples, &classes) {
        intercept = -intercept;
        weights.iter_mut().for_each(|w| *w = -*w);
    }

    let model = LogisticModel {
        model_version: MODEL_VERSION,
        feature_names: FEATURE_NAMES.iter().map(|s| s.to_string()).collect(),
        intercept,
        weights,
        threshold: options.threshold,
    };
    model.validate()?;
    debug!(
        "Fitted intercept {} and weights {:?}",
        model.intercept, model.weights
    );
    Ok(model)
}

/// The fitted coefficients score whichever class the fitter treats as
/// positive. Compare their sign with its own class predictions so the stored
/// model always scores the on-time class.
fn positive_class_is_late(
    intercept: f64,
    weights: &[f64],
    examples: &[LabeledExample],
    classes: &Array1<usize>,
) -> bool {
    examples
        .iter()
        .zip(classes.iter())
        .find_map(|(example, &class)| {
            let linear = intercept
                + weights
                    .iter()
                    .zip(example.features.iter())
                    .map(|(w, x)| w * x)
                    .sum::<f64>();
            (linear != 0.0).then_some((linear > 0.0) != (class == 1))
        })
        .unwrap_or(false)
}

fn sigmoid(z: f64) -> f64 {
    1.0 / (1.0 + (-z).exp())
}

impl LogisticModel {
    pub fn validate(&self) -> Result<()> {
        ensure!(
            self.weights.len() == FEATURE_COUNT,
            "Model has {} weight(s) but {} feature(s) are extracted",
            self.weights.len(),
            FEATURE_COUNT
        );
        ensure!(
            (0.0..=1.0).contains(&self.threshold),
            "Decision threshold must be within [0, 1] (got {})",
            self.threshold
        );
        ensure!(
            self.intercept.is_finite() && self.weights.iter().all(|w| w.is_finite()),
            "Model coefficients must be finite"
        );
        Ok(())
    }

    pub fn with_threshold(mut self, threshold: f64) -> Self {
        self.threshold = threshold;
        self
    }

    /// Probability that the flight arrives on time.
    pub fn score(&self, features: &[f64; FEATURE_COUNT]) -> f64 {
        let linear = self
            .weights
            .iter()
            .zip(features.iter())
            .map(|(w, x)| w * x)
            .sum::<f64>()
            + self.intercept;
        sigmoid(linear)
    }

    /// 1.0 when the score exceeds the threshold, else 0.0.
    pub fn predict(&self, features: &[f64; FEATURE_COUNT]) -> f64 {
        if self.score(features) > self.threshold {
            1.0
        } else {
            0.0
        }
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        let file = File::create(path).with_context(|| format!("Creating model file {path:?}"))?;
        serde_json::to_writer_pretty(file, self).context("Writing model JSON")
    }

    pub fn load(path: &Path) -> Result<Self> {
        let file = File::open(path).with_context(|| format!("Opening model file {path:?}"))?;
        let model: LogisticModel =
            serde_json::from_reader(BufReader::new(file)).context("Parsing model JSON")?;
        ensure!(
            model.model_version == MODEL_VERSION,
            "Unsupported model version {} (expected {})",
            model.model_version,
            MODEL_VERSION
        );
        model.validate()?;
        Ok(model)
    }
}
