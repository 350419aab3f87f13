//! Holdout scoring: grouped accuracy and RMSE over (label, prediction) pairs.
//!
//! Pairs are grouped by the predicted class. Group accuracy divides by the
//! group size clamped to at least one, so an empty group reports 1.0; the
//! same clamped sizes form the RMSE denominator. Empty groups are logged so
//! the masked value is not mistaken for a measured one.

use serde::Serialize;

use log::warn;

use crate::{features::LabeledExample, model::LogisticModel};

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct EvaluationSummary {
    pub total_cancel: usize,
    pub correct_cancel: f64,
    pub total_noncancel: usize,
    pub correct_noncancel: f64,
    pub rmse: f64,
}

pub fn label_predictions(model: &LogisticModel, examples: &[LabeledExample]) -> Vec<(f64, f64)> {
    examples
        .iter()
        .map(|example| (example.label, model.predict(&example.features)))
        .collect()
}

pub fn evaluate<I>(pairs: I) -> EvaluationSummary
where
    I: IntoIterator<Item = (f64, f64)>,
{
    let mut total_cancel = 0usize;
    let mut total_noncancel = 0usize;
    let mut corr_cancel = 0usize;
    let mut corr_noncancel = 0usize;
    let mut total_sq_err = 0.0f64;

    for (label, pred) in pairs {
        if pred == 0.0 {
            total_cancel += 1;
            if label == pred {
                corr_cancel += 1;
            }
        } else if pred == 1.0 {
            total_noncancel += 1;
            if label == pred {
                corr_noncancel += 1;
            }
        }
        total_sq_err += (label - pred) * (label - pred);
    }

    if total_cancel == 0 {
        warn!("No predicted-late rows; correct_cancel reported as 1.0");
    }
    if total_noncancel == 0 {
        warn!("No predicted-on-time rows; correct_noncancel reported as 1.0");
    }
    let cancel_denom = total_cancel.max(1);
    let nocancel_denom = total_noncancel.max(1);

    EvaluationSummary {
        total_cancel,
        correct_cancel: corr_cancel as f64 / cancel_denom as f64,
        total_noncancel,
        correct_noncancel: corr_noncancel as f64 / nocancel_denom as f64,
        rmse: (total_sq_err / (cancel_denom + nocancel_denom) as f64).sqrt(),
    }
}

impl EvaluationSummary {
    pub fn render_rows(&self) -> Vec<Vec<String>> {
        vec![
            vec!["total_cancel".to_string(), self.total_cancel.to_string()],
            vec![
                "correct_cancel".to_string(),
                format!("{:.4}", self.correct_cancel),
            ],
            vec!["total_noncancel".to_string(), self.total_noncancel.to_string()],
            vec![
                "correct_noncancel".to_string(),
                format!("{:.4}", self.correct_noncancel),
            ],
            vec!["rmse".to_string(), format!("{:.4}", self.rmse)],
        ]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::features::FEATURE_NAMES;

    #[test]
    fn mixed_predictions_split_evenly() {
        let summary = evaluate(vec![(1.0, 1.0), (0.0, 0.0), (1.0, 0.0), (0.0, 1.0)]);
        assert_eq!(summary.total_cancel, 2);
        assert_eq!(summary.total_noncancel, 2);
        assert_eq!(summary.correct_cancel, 0.5);
        assert_eq!(summary.correct_noncancel, 0.5);
        assert!((summary.rmse - 0.5f64.sqrt()).abs() < 1e-12);
    }

    #[test]
    fn empty_group_reports_unit_accuracy() {
        let summary = evaluate(vec![(1.0, 1.0), (0.0, 1.0)]);
        assert_eq!(summary.total_cancel, 0);
        assert_eq!(summary.correct_cancel, 1.0);
        assert_eq!(summary.correct_noncancel, 0.5);
        // denominator is 1 (clamped) + 2
        assert!((summary.rmse - (1.0f64 / 3.0).sqrt()).abs() < 1e-12);
    }

    #[test]
    fn no_pairs_yields_zero_error() {
        let summary = evaluate(Vec::new());
        assert_eq!(summary.total_cancel, 0);
        assert_eq!(summary.total_noncancel, 0);
        assert_eq!(summary.correct_cancel, 1.0);
        assert_eq!(summary.correct_noncancel, 1.0);
        assert_eq!(summary.rmse, 0.0);
    }

    #[test]
    fn summary_serializes_with_fixed_keys() {
        let summary = evaluate(vec![(1.0, 1.0)]);
        let json = serde_json::to_value(summary).unwrap();
        let keys = json.as_object().unwrap().keys().cloned().collect::<Vec<_>>();
        assert_eq!(keys.len(), 5);
        for key in [
            "total_cancel",
            "correct_cancel",
            "total_noncancel",
            "correct_noncancel",
            "rmse",
        ] {
            assert!(keys.contains(&key.to_string()));
        }
    }

    #[test]
    fn label_predictions_pairs_truth_with_model_output() {
        let model = LogisticModel {
            model_version: crate::model::MODEL_VERSION,
            feature_names: FEATURE_NAMES.iter().map(|s| s.to_string()).collect(),
            intercept: 0.0,
            weights: vec![1.0, 0.0, 0.0, 0.0, 0.0, 0.0],
            threshold: 0.7,
        };
        let examples = [
            LabeledExample {
                label: 1.0,
                features: [5.0, 0.0, 1.0, 0.0, 0.0, 0.0],
            },
            LabeledExample {
                label: 1.0,
                features: [-5.0, 0.0, 1.0, 0.0, 0.0, 0.0],
            },
        ];
        let pairs = label_predictions(&model, &examples);
        assert_eq!(pairs, vec![(1.0, 1.0), (1.0, 0.0)]);
    }
}
