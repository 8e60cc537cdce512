//! Classification metrics

use crate::error::{Result, SentinelError};
use ndarray::{Array1, Array2};
use serde::{Deserialize, Serialize};

/// Binary classification metrics at the 0.5 decision threshold
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ClassificationMetrics {
    pub accuracy: f64,
    pub precision: f64,
    pub recall: f64,
    pub f1_score: f64,
    /// (tp, fp, tn, fn)
    pub confusion: (usize, usize, usize, usize),
    /// Training wall time in seconds
    pub training_time_secs: f64,
    pub n_samples: usize,
}

impl ClassificationMetrics {
    /// Compute metrics from true labels and predicted labels (0/1)
    pub fn compute(y_true: &Array1<u32>, y_pred: &Array1<u32>) -> Result<Self> {
        if y_true.len() != y_pred.len() {
            return Err(SentinelError::ShapeError {
                expected: format!("{} predictions", y_true.len()),
                actual: format!("{} predictions", y_pred.len()),
            });
        }
        if y_true.is_empty() {
            return Err(SentinelError::InvalidParameter(
                "cannot compute metrics on empty labels".to_string(),
            ));
        }

        let (mut tp, mut fp, mut tn, mut fn_) = (0usize, 0usize, 0usize, 0usize);
        for (&t, &p) in y_true.iter().zip(y_pred.iter()) {
            match (t, p) {
                (1, 1) => tp += 1,
                (0, 1) => fp += 1,
                (0, 0) => tn += 1,
                (1, 0) => fn_ += 1,
                _ => {
                    return Err(SentinelError::InvalidParameter(format!(
                        "binary metrics expect labels in {{0,1}}, got true={t} pred={p}"
                    )))
                }
            }
        }

        let n = y_true.len();
        let precision = safe_ratio(tp, tp + fp);
        let recall = safe_ratio(tp, tp + fn_);
        let f1 = if precision + recall > 0.0 {
            2.0 * precision * recall / (precision + recall)
        } else {
            0.0
        };

        Ok(Self {
            accuracy: (tp + tn) as f64 / n as f64,
            precision,
            recall,
            f1_score: f1,
            confusion: (tp, fp, tn, fn_),
            training_time_secs: 0.0,
            n_samples: n,
        })
    }

    /// Attach training wall time
    pub fn with_training_time(mut self, secs: f64) -> Self {
        self.training_time_secs = secs;
        self
    }
}

/// Multiclass metrics: accuracy, macro-averaged precision/recall/F1, and
/// a K x K confusion matrix (rows = true class, columns = predicted class)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MulticlassMetrics {
    pub accuracy: f64,
    pub macro_precision: f64,
    pub macro_recall: f64,
    pub macro_f1: f64,
    pub confusion_matrix: Array2<usize>,
    pub n_classes: usize,
    pub training_time_secs: f64,
}

impl MulticlassMetrics {
    /// Compute metrics over labels in `0..n_classes`
    pub fn compute(y_true: &Array1<u32>, y_pred: &Array1<u32>, n_classes: usize) -> Result<Self> {
        if y_true.len() != y_pred.len() {
            return Err(SentinelError::ShapeError {
                expected: format!("{} predictions", y_true.len()),
                actual: format!("{} predictions", y_pred.len()),
            });
        }
        if y_true.is_empty() || n_classes == 0 {
            return Err(SentinelError::InvalidParameter(
                "cannot compute multiclass metrics on empty input".to_string(),
            ));
        }

        let mut confusion = Array2::<usize>::zeros((n_classes, n_classes));
        for (&t, &p) in y_true.iter().zip(y_pred.iter()) {
            let (t, p) = (t as usize, p as usize);
            if t >= n_classes || p >= n_classes {
                return Err(SentinelError::InvalidParameter(format!(
                    "label out of range: true={t} pred={p} n_classes={n_classes}"
                )));
            }
            confusion[[t, p]] += 1;
        }

        let correct: usize = (0..n_classes).map(|k| confusion[[k, k]]).sum();
        let accuracy = correct as f64 / y_true.len() as f64;

        let mut precision_sum = 0.0;
        let mut recall_sum = 0.0;
        let mut f1_sum = 0.0;
        for k in 0..n_classes {
            let tp = confusion[[k, k]];
            let predicted: usize = (0..n_classes).map(|i| confusion[[i, k]]).sum();
            let actual: usize = (0..n_classes).map(|j| confusion[[k, j]]).sum();

            let p = safe_ratio(tp, predicted);
            let r = safe_ratio(tp, actual);
            precision_sum += p;
            recall_sum += r;
            f1_sum += if p + r > 0.0 { 2.0 * p * r / (p + r) } else { 0.0 };
        }

        let k = n_classes as f64;
        Ok(Self {
            accuracy,
            macro_precision: precision_sum / k,
            macro_recall: recall_sum / k,
            macro_f1: f1_sum / k,
            confusion_matrix: confusion,
            n_classes,
            training_time_secs: 0.0,
        })
    }

    /// Attach training wall time
    pub fn with_training_time(mut self, secs: f64) -> Self {
        self.training_time_secs = secs;
        self
    }
}

fn safe_ratio(num: usize, den: usize) -> f64 {
    if den > 0 {
        num as f64 / den as f64
    } else {
        0.0
    }
}

/// Plain accuracy over integer labels
pub fn accuracy(y_true: &Array1<u32>, y_pred: &Array1<u32>) -> f64 {
    if y_true.is_empty() {
        return 0.0;
    }
    let correct = y_true
        .iter()
        .zip(y_pred.iter())
        .filter(|(t, p)| t == p)
        .count();
    correct as f64 / y_true.len() as f64
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn test_binary_metrics_known_values() {
        let y_true = array![1, 1, 1, 0, 0, 0, 0, 0];
        let y_pred = array![1, 1, 0, 0, 0, 0, 1, 0];

        let m = ClassificationMetrics::compute(&y_true, &y_pred).unwrap();
        assert_eq!(m.confusion, (2, 1, 4, 1));
        assert!((m.accuracy - 0.75).abs() < 1e-12);
        assert!((m.precision - 2.0 / 3.0).abs() < 1e-12);
        assert!((m.recall - 2.0 / 3.0).abs() < 1e-12);
        assert!((m.f1_score - 2.0 / 3.0).abs() < 1e-12);
    }

    #[test]
    fn test_binary_metrics_degenerate() {
        let y_true = array![0, 0, 0];
        let y_pred = array![0, 0, 0];

        let m = ClassificationMetrics::compute(&y_true, &y_pred).unwrap();
        assert_eq!(m.accuracy, 1.0);
        assert_eq!(m.precision, 0.0); // no positive predictions
    }

    #[test]
    fn test_multiclass_confusion() {
        let y_true = array![0, 1, 2, 2, 1, 0];
        let y_pred = array![0, 1, 2, 1, 1, 0];

        let m = MulticlassMetrics::compute(&y_true, &y_pred, 3).unwrap();
        assert!((m.accuracy - 5.0 / 6.0).abs() < 1e-12);
        assert_eq!(m.confusion_matrix[[2, 1]], 1);
        assert_eq!(m.confusion_matrix[[0, 0]], 2);
    }

    #[test]
    fn test_length_mismatch() {
        let y_true = array![0, 1];
        let y_pred = array![0];
        assert!(ClassificationMetrics::compute(&y_true, &y_pred).is_err());
    }
}
