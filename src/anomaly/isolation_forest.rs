//! Isolation forest
//!
//! Each tree isolates samples by random axis-aligned splits; anomalous
//! samples need fewer splits to isolate, so their expected path length is
//! short. The anomaly score is `2^(-E[h(x)] / c(n))` where `c(n)` is the
//! average path length of an unsuccessful BST search. The decision
//! threshold is taken from the training scores at the `1 - contamination`
//! quantile, so `decision_function` is negative for anomalies.

use crate::error::{Result, SentinelError};
use ndarray::{Array1, Array2, Axis};
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::{debug, info};

/// A single isolation tree node
#[derive(Debug, Clone, Serialize, Deserialize)]
enum IsoNode {
    Leaf {
        size: usize,
    },
    Split {
        feature_idx: usize,
        threshold: f64,
        left: Box<IsoNode>,
        right: Box<IsoNode>,
    },
}

/// Isolation forest anomaly detector
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IsolationForest {
    n_estimators: usize,
    max_samples: usize,
    contamination: f64,
    seed: u64,
    trees: Vec<IsoNode>,
    /// Normalizing constant c(psi) for the subsample size actually used
    avg_path_norm: f64,
    /// Score above which a sample is flagged anomalous
    threshold: f64,
    is_fitted: bool,
}

impl Default for IsolationForest {
    fn default() -> Self {
        Self::new()
    }
}

impl IsolationForest {
    pub fn new() -> Self {
        Self {
            n_estimators: 100,
            max_samples: 256,
            contamination: 0.1,
            seed: 42,
            trees: Vec::new(),
            avg_path_norm: 1.0,
            threshold: 0.5,
            is_fitted: false,
        }
    }

    pub fn with_n_estimators(mut self, n: usize) -> Self {
        self.n_estimators = n;
        self
    }

    pub fn with_max_samples(mut self, n: usize) -> Self {
        self.max_samples = n;
        self
    }

    pub fn with_contamination(mut self, contamination: f64) -> Self {
        self.contamination = contamination;
        self
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    /// Build the forest and calibrate the decision threshold on the
    /// training scores
    pub fn fit(&mut self, x: &Array2<f64>) -> Result<&mut Self> {
        let n = x.nrows();
        if n == 0 {
            return Err(SentinelError::TrainingError(
                "cannot fit isolation forest on empty matrix".into(),
            ));
        }
        if !(0.0..0.5).contains(&self.contamination) || self.contamination <= 0.0 {
            return Err(SentinelError::InvalidParameter(format!(
                "contamination must be in (0, 0.5), got {}",
                self.contamination
            )));
        }

        let psi = self.max_samples.min(n);
        let height_limit = (psi as f64).log2().ceil() as usize;
        self.avg_path_norm = average_path_length(psi);

        info!(
            trees = self.n_estimators,
            subsample = psi,
            "fitting isolation forest"
        );

        let seed = self.seed;
        self.trees = (0..self.n_estimators)
            .into_par_iter()
            .map(|tree_idx| {
                let mut rng = ChaCha8Rng::seed_from_u64(seed.wrapping_add(tree_idx as u64));
                let mut indices: Vec<usize> = (0..n).collect();
                indices.shuffle(&mut rng);
                indices.truncate(psi);
                build_tree(x, &indices, 0, height_limit, &mut rng)
            })
            .collect();
        self.is_fitted = true;

        // Threshold = (1 - contamination) quantile of training scores, so
        // the top `contamination` fraction of the training set is flagged.
        let mut train_scores = self.score_samples(x)?.to_vec();
        train_scores.sort_by(|a, b| a.total_cmp(b));
        let rank = ((1.0 - self.contamination) * (n as f64 - 1.0)).round() as usize;
        self.threshold = train_scores[rank.min(n - 1)];
        debug!(threshold = self.threshold, "calibrated anomaly threshold");

        Ok(self)
    }

    /// Anomaly scores in (0, 1]; higher means more anomalous
    pub fn score_samples(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        if !self.is_fitted {
            return Err(SentinelError::ModelNotFitted);
        }
        let scores: Vec<f64> = x
            .axis_iter(Axis(0))
            .map(|row| {
                let total: f64 = self
                    .trees
                    .iter()
                    .map(|tree| path_length(tree, &row, 0.0))
                    .sum();
                let mean_path = total / self.trees.len() as f64;
                2f64.powf(-mean_path / self.avg_path_norm)
            })
            .collect();
        Ok(Array1::from_vec(scores))
    }

    /// Signed margin to the calibrated threshold; negative means anomalous
    pub fn decision_function(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        let scores = self.score_samples(x)?;
        Ok(scores.mapv(|s| self.threshold - s))
    }

    /// -1 for anomalies, 1 for inliers
    pub fn predict(&self, x: &Array2<f64>) -> Result<Array1<i32>> {
        let decisions = self.decision_function(x)?;
        Ok(decisions.mapv(|d| if d < 0.0 { -1 } else { 1 }))
    }

    pub fn is_fitted(&self) -> bool {
        self.is_fitted
    }

    pub fn threshold(&self) -> f64 {
        self.threshold
    }

    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json)?;
        Ok(())
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let json = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&json)?)
    }
}

/// c(n): average path length of an unsuccessful BST search over n samples
fn average_path_length(n: usize) -> f64 {
    match n {
        // A partition of one sample is already isolated, two need one split
        0 | 1 => 0.0,
        2 => 1.0,
        _ => {
            let n = n as f64;
            // Euler-Mascheroni constant
            const GAMMA: f64 = 0.577_215_664_901_532_9;
            2.0 * ((n - 1.0).ln() + GAMMA) - 2.0 * (n - 1.0) / n
        }
    }
}

fn build_tree(
    x: &Array2<f64>,
    indices: &[usize],
    depth: usize,
    height_limit: usize,
    rng: &mut ChaCha8Rng,
) -> IsoNode {
    if indices.len() <= 1 || depth >= height_limit {
        return IsoNode::Leaf {
            size: indices.len(),
        };
    }

    let n_features = x.ncols();
    let feature_idx = rng.gen_range(0..n_features);

    let mut min = f64::INFINITY;
    let mut max = f64::NEG_INFINITY;
    for &i in indices {
        let v = x[[i, feature_idx]];
        min = min.min(v);
        max = max.max(v);
    }
    if min >= max {
        // Constant feature within this partition, cannot split further
        return IsoNode::Leaf {
            size: indices.len(),
        };
    }

    let threshold = min + rng.gen::<f64>() * (max - min);
    let (left, right): (Vec<usize>, Vec<usize>) = indices
        .iter()
        .partition(|&&i| x[[i, feature_idx]] < threshold);

    IsoNode::Split {
        feature_idx,
        threshold,
        left: Box::new(build_tree(x, &left, depth + 1, height_limit, rng)),
        right: Box::new(build_tree(x, &right, depth + 1, height_limit, rng)),
    }
}

fn path_length(node: &IsoNode, row: &ndarray::ArrayView1<f64>, depth: f64) -> f64 {
    match node {
        IsoNode::Leaf { size } => depth + average_path_length(*size),
        IsoNode::Split {
            feature_idx,
            threshold,
            left,
            right,
        } => {
            if row[*feature_idx] < *threshold {
                path_length(left, row, depth + 1.0)
            } else {
                path_length(right, row, depth + 1.0)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::Array2;
    use rand::Rng;

    /// Tight cluster around the origin plus a handful of far outliers
    fn cluster_with_outliers() -> Array2<f64> {
        let mut rng = ChaCha8Rng::seed_from_u64(7);
        let mut data = Vec::new();
        for _ in 0..95 {
            data.push(rng.gen::<f64>() * 0.5 - 0.25);
            data.push(rng.gen::<f64>() * 0.5 - 0.25);
        }
        for _ in 0..5 {
            data.push(8.0 + rng.gen::<f64>());
            data.push(8.0 + rng.gen::<f64>());
        }
        Array2::from_shape_vec((100, 2), data).unwrap()
    }

    #[test]
    fn test_outliers_score_higher() {
        let x = cluster_with_outliers();
        let mut forest = IsolationForest::new().with_seed(42);
        forest.fit(&x).unwrap();

        let scores = forest.score_samples(&x).unwrap();
        let inlier_mean: f64 = scores.iter().take(95).sum::<f64>() / 95.0;
        let outlier_mean: f64 = scores.iter().skip(95).sum::<f64>() / 5.0;
        assert!(
            outlier_mean > inlier_mean,
            "outliers {outlier_mean} <= inliers {inlier_mean}"
        );
    }

    #[test]
    fn test_decision_function_sign() {
        let x = cluster_with_outliers();
        let mut forest = IsolationForest::new().with_seed(42);
        forest.fit(&x).unwrap();

        let decisions = forest.decision_function(&x).unwrap();
        let preds = forest.predict(&x).unwrap();
        for (d, p) in decisions.iter().zip(preds.iter()) {
            assert_eq!(*p, if *d < 0.0 { -1 } else { 1 });
        }
        // The planted outliers must be flagged
        for i in 95..100 {
            assert_eq!(preds[i], -1, "outlier {i} not flagged");
        }
    }

    #[test]
    fn test_contamination_controls_flag_rate() {
        let x = cluster_with_outliers();
        let mut forest = IsolationForest::new()
            .with_contamination(0.1)
            .with_seed(42);
        forest.fit(&x).unwrap();

        let flagged = forest
            .predict(&x)
            .unwrap()
            .iter()
            .filter(|&&p| p == -1)
            .count();
        // Threshold taken at the 90% quantile of training scores
        assert!((5..=15).contains(&flagged), "flagged {flagged} of 100");
    }

    #[test]
    fn test_average_path_length_boundaries() {
        assert_eq!(average_path_length(0), 0.0);
        assert_eq!(average_path_length(1), 0.0);
        assert_eq!(average_path_length(2), 1.0);
        // c(n) = 2(ln(n-1) + gamma) - 2(n-1)/n for larger partitions
        let c256 = average_path_length(256);
        let expected = 2.0 * (255f64.ln() + 0.577_215_664_901_532_9) - 2.0 * 255.0 / 256.0;
        assert!((c256 - expected).abs() < 1e-12);
        assert!(c256 > average_path_length(128));
    }

    #[test]
    fn test_invalid_contamination_rejected() {
        let x = cluster_with_outliers();
        let mut forest = IsolationForest::new().with_contamination(0.7);
        assert!(matches!(
            forest.fit(&x),
            Err(SentinelError::InvalidParameter(_))
        ));
    }

    #[test]
    fn test_save_load_round_trip() {
        let x = cluster_with_outliers();
        let mut forest = IsolationForest::new().with_seed(42);
        forest.fit(&x).unwrap();

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("anomaly_detector.json");
        forest.save(&path).unwrap();

        let restored = IsolationForest::load(&path).unwrap();
        assert_eq!(
            forest.score_samples(&x).unwrap(),
            restored.score_samples(&x).unwrap()
        );
    }
}
