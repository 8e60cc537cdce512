//! Decision tree classifier (Gini)

use crate::error::{Result, SentinelError};
use ndarray::{Array1, Array2};
use rand::seq::SliceRandom;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Tree node: either a class-distribution leaf or a binary split
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum TreeNode {
    Leaf {
        /// Class probabilities in `classes` order
        probs: Vec<f64>,
        n_samples: usize,
    },
    Split {
        feature_idx: usize,
        threshold: f64,
        left: Box<TreeNode>,
        right: Box<TreeNode>,
        n_samples: usize,
    },
}

/// Gini decision tree supporting binary and multiclass labels.
///
/// Best-split search is parallelized over candidate features. Leaves store the
/// class distribution so predicted probabilities compose into soft voting.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DecisionTreeClassifier {
    root: Option<TreeNode>,
    /// Maximum depth; unlimited when `None`
    pub max_depth: Option<usize>,
    /// Minimum samples required to attempt a split
    pub min_samples_split: usize,
    /// Minimum samples allowed in a leaf
    pub min_samples_leaf: usize,
    /// Features considered per split; all when `None`
    pub max_features: Option<usize>,
    /// Seed for the per-split feature subsample
    pub seed: Option<u64>,
    n_features: usize,
    classes: Vec<u32>,
    feature_importances: Option<Array1<f64>>,
}

impl DecisionTreeClassifier {
    /// Create a tree with default hyperparameters
    pub fn new() -> Self {
        Self {
            root: None,
            max_depth: None,
            min_samples_split: 2,
            min_samples_leaf: 1,
            max_features: None,
            seed: None,
            n_features: 0,
            classes: Vec::new(),
            feature_importances: None,
        }
    }

    /// Set maximum depth
    pub fn with_max_depth(mut self, depth: usize) -> Self {
        self.max_depth = Some(depth);
        self
    }

    /// Set minimum samples to split
    pub fn with_min_samples_split(mut self, min_samples: usize) -> Self {
        self.min_samples_split = min_samples.max(2);
        self
    }

    /// Set minimum samples in leaf
    pub fn with_min_samples_leaf(mut self, min_samples: usize) -> Self {
        self.min_samples_leaf = min_samples.max(1);
        self
    }

    /// Set number of features considered per split
    pub fn with_max_features(mut self, max_features: usize) -> Self {
        self.max_features = Some(max_features.max(1));
        self
    }

    /// Set the feature-subsample seed
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    /// Fit the tree
    pub fn fit(&mut self, x: &Array2<f64>, y: &Array1<u32>) -> Result<&mut Self> {
        let n_samples = x.nrows();
        if n_samples != y.len() {
            return Err(SentinelError::ShapeError {
                expected: format!("y length = {n_samples}"),
                actual: format!("y length = {}", y.len()),
            });
        }
        if n_samples == 0 {
            return Err(SentinelError::TrainingError(
                "cannot fit on empty matrix".to_string(),
            ));
        }

        self.n_features = x.ncols();

        let mut classes: Vec<u32> = y.iter().copied().collect();
        classes.sort_unstable();
        classes.dedup();
        self.classes = classes;

        let mut rng = match self.seed {
            Some(seed) => ChaCha8Rng::seed_from_u64(seed),
            None => ChaCha8Rng::from_entropy(),
        };

        let mut importances = vec![0.0; self.n_features];
        let indices: Vec<usize> = (0..n_samples).collect();
        self.root = Some(self.build_tree(x, y, &indices, 0, &mut importances, &mut rng));

        let total: f64 = importances.iter().sum();
        if total > 0.0 {
            for imp in &mut importances {
                *imp /= total;
            }
        }
        self.feature_importances = Some(Array1::from_vec(importances));

        Ok(self)
    }

    fn build_tree(
        &self,
        x: &Array2<f64>,
        y: &Array1<u32>,
        indices: &[usize],
        depth: usize,
        importances: &mut [f64],
        rng: &mut ChaCha8Rng,
    ) -> TreeNode {
        let n_samples = indices.len();

        let should_stop = n_samples < self.min_samples_split
            || self.max_depth.is_some_and(|d| depth >= d)
            || self.is_pure(y, indices);

        if should_stop {
            return self.make_leaf(y, indices);
        }

        let Some((feature_idx, threshold, gain)) = self.find_best_split(x, y, indices, rng) else {
            return self.make_leaf(y, indices);
        };

        let (left_indices, right_indices): (Vec<usize>, Vec<usize>) = indices
            .iter()
            .partition(|&&i| x[[i, feature_idx]] <= threshold);

        if left_indices.len() < self.min_samples_leaf || right_indices.len() < self.min_samples_leaf
        {
            return self.make_leaf(y, indices);
        }

        importances[feature_idx] += n_samples as f64 * gain;

        let left = Box::new(self.build_tree(x, y, &left_indices, depth + 1, importances, rng));
        let right = Box::new(self.build_tree(x, y, &right_indices, depth + 1, importances, rng));

        TreeNode::Split {
            feature_idx,
            threshold,
            left,
            right,
            n_samples,
        }
    }

    fn find_best_split(
        &self,
        x: &Array2<f64>,
        y: &Array1<u32>,
        indices: &[usize],
        rng: &mut ChaCha8Rng,
    ) -> Option<(usize, f64, f64)> {
        let candidate_features: Vec<usize> = match self.max_features {
            Some(k) if k < self.n_features => {
                let mut all: Vec<usize> = (0..self.n_features).collect();
                all.shuffle(rng);
                all.truncate(k);
                all
            }
            _ => (0..self.n_features).collect(),
        };

        let parent_impurity = self.gini(y, indices);
        let n = indices.len() as f64;

        // Each candidate feature independently finds its best threshold
        let per_feature: Vec<Option<(usize, f64, f64)>> = candidate_features
            .into_par_iter()
            .map(|feature_idx| {
                let mut values: Vec<f64> =
                    indices.iter().map(|&i| x[[i, feature_idx]]).collect();
                values.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));
                values.dedup();

                let mut best_gain = 0.0f64;
                let mut best_threshold = 0.0f64;

                for window in values.windows(2) {
                    let threshold = (window[0] + window[1]) / 2.0;

                    let mut left_counts: HashMap<u32, usize> = HashMap::new();
                    let mut right_counts: HashMap<u32, usize> = HashMap::new();
                    let mut left_n = 0usize;
                    let mut right_n = 0usize;

                    for &idx in indices {
                        if x[[idx, feature_idx]] <= threshold {
                            *left_counts.entry(y[idx]).or_insert(0) += 1;
                            left_n += 1;
                        } else {
                            *right_counts.entry(y[idx]).or_insert(0) += 1;
                            right_n += 1;
                        }
                    }

                    if left_n < self.min_samples_leaf || right_n < self.min_samples_leaf {
                        continue;
                    }

                    let weighted = (left_n as f64 * gini_from_counts(&left_counts, left_n)
                        + right_n as f64 * gini_from_counts(&right_counts, right_n))
                        / n;

                    let gain = parent_impurity - weighted;
                    if gain > best_gain {
                        best_gain = gain;
                        best_threshold = threshold;
                    }
                }

                (best_gain > 0.0).then_some((feature_idx, best_threshold, best_gain))
            })
            .collect();

        per_feature
            .into_iter()
            .flatten()
            .max_by(|a, b| a.2.partial_cmp(&b.2).unwrap_or(std::cmp::Ordering::Equal))
    }

    fn make_leaf(&self, y: &Array1<u32>, indices: &[usize]) -> TreeNode {
        let mut counts = vec![0usize; self.classes.len()];
        for &i in indices {
            if let Ok(pos) = self.classes.binary_search(&y[i]) {
                counts[pos] += 1;
            }
        }
        let total = indices.len().max(1) as f64;
        TreeNode::Leaf {
            probs: counts.iter().map(|&c| c as f64 / total).collect(),
            n_samples: indices.len(),
        }
    }

    fn is_pure(&self, y: &Array1<u32>, indices: &[usize]) -> bool {
        match indices.first() {
            None => true,
            Some(&first) => indices.iter().all(|&i| y[i] == y[first]),
        }
    }

    fn gini(&self, y: &Array1<u32>, indices: &[usize]) -> f64 {
        let mut counts: HashMap<u32, usize> = HashMap::new();
        for &i in indices {
            *counts.entry(y[i]).or_insert(0) += 1;
        }
        gini_from_counts(&counts, indices.len())
    }

    /// Per-row class probabilities in `classes()` order
    pub fn predict_proba(&self, x: &Array2<f64>) -> Result<Array2<f64>> {
        let root = self.root.as_ref().ok_or(SentinelError::ModelNotFitted)?;

        if x.ncols() != self.n_features {
            return Err(SentinelError::ShapeError {
                expected: format!("{} features", self.n_features),
                actual: format!("{} features", x.ncols()),
            });
        }

        let n_classes = self.classes.len();
        let mut out = Array2::zeros((x.nrows(), n_classes));
        for (i, row) in x.rows().into_iter().enumerate() {
            let sample: Vec<f64> = row.iter().copied().collect();
            let probs = leaf_probs(root, &sample);
            for (j, &p) in probs.iter().enumerate() {
                out[[i, j]] = p;
            }
        }
        Ok(out)
    }

    /// Predicted labels (argmax of leaf distribution)
    pub fn predict(&self, x: &Array2<f64>) -> Result<Array1<u32>> {
        let probs = self.predict_proba(x)?;
        Ok(probs
            .rows()
            .into_iter()
            .map(|row| {
                let argmax = row
                    .iter()
                    .enumerate()
                    .max_by(|(_, a), (_, b)| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal))
                    .map(|(i, _)| i)
                    .unwrap_or(0);
                self.classes[argmax]
            })
            .collect())
    }

    /// Normalized split-gain importances
    pub fn feature_importances(&self) -> Option<&Array1<f64>> {
        self.feature_importances.as_ref()
    }

    /// The fitted class labels in probability-column order
    pub fn classes(&self) -> &[u32] {
        &self.classes
    }

    /// Whether the tree has been fitted
    pub fn is_fitted(&self) -> bool {
        self.root.is_some()
    }

    /// Tree depth (leaf-only tree has depth 1)
    pub fn depth(&self) -> usize {
        fn node_depth(node: &TreeNode) -> usize {
            match node {
                TreeNode::Leaf { .. } => 1,
                TreeNode::Split { left, right, .. } => 1 + node_depth(left).max(node_depth(right)),
            }
        }
        self.root.as_ref().map(node_depth).unwrap_or(0)
    }

    /// Persist the fitted tree as pretty JSON
    pub fn save(&self, path: impl AsRef<std::path::Path>) -> Result<()> {
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json)?;
        Ok(())
    }

    /// Restore a tree from a JSON artifact
    pub fn load(path: impl AsRef<std::path::Path>) -> Result<Self> {
        let json = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&json)?)
    }
}

impl Default for DecisionTreeClassifier {
    fn default() -> Self {
        Self::new()
    }
}

fn gini_from_counts(counts: &HashMap<u32, usize>, total: usize) -> f64 {
    if total == 0 {
        return 0.0;
    }
    let n = total as f64;
    1.0 - counts
        .values()
        .map(|&c| {
            let p = c as f64 / n;
            p * p
        })
        .sum::<f64>()
}

fn leaf_probs<'a>(node: &'a TreeNode, sample: &[f64]) -> &'a [f64] {
    match node {
        TreeNode::Leaf { probs, .. } => probs,
        TreeNode::Split {
            feature_idx,
            threshold,
            left,
            right,
            ..
        } => {
            if sample[*feature_idx] <= *threshold {
                leaf_probs(left, sample)
            } else {
                leaf_probs(right, sample)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn test_fits_separable_binary() {
        let x = array![[1.0, 0.0], [2.0, 0.0], [8.0, 0.0], [9.0, 0.0]];
        let y = array![0, 0, 1, 1];

        let mut tree = DecisionTreeClassifier::new().with_seed(42);
        tree.fit(&x, &y).unwrap();

        assert_eq!(tree.predict(&x).unwrap(), y);
    }

    #[test]
    fn test_multiclass_probabilities_sum_to_one() {
        let x = array![[0.0], [1.0], [10.0], [11.0], [20.0], [21.0]];
        let y = array![0, 0, 1, 1, 2, 2];

        let mut tree = DecisionTreeClassifier::new().with_seed(42);
        tree.fit(&x, &y).unwrap();

        let probs = tree.predict_proba(&x).unwrap();
        for row in probs.rows() {
            let sum: f64 = row.sum();
            assert!((sum - 1.0).abs() < 1e-10);
        }
        assert_eq!(tree.classes(), &[0, 1, 2]);
    }

    #[test]
    fn test_max_depth_limits_tree() {
        let x = array![[1.0], [2.0], [3.0], [4.0], [5.0], [6.0], [7.0], [8.0]];
        let y = array![0, 1, 0, 1, 0, 1, 0, 1];

        let mut tree = DecisionTreeClassifier::new().with_max_depth(2).with_seed(42);
        tree.fit(&x, &y).unwrap();

        assert!(tree.depth() <= 3); // root split + one level + leaves
    }

    #[test]
    fn test_importance_favors_informative_feature() {
        let x = array![[1.0, 5.0], [2.0, 5.0], [8.0, 5.0], [9.0, 5.0]];
        let y = array![0, 0, 1, 1];

        let mut tree = DecisionTreeClassifier::new().with_seed(42);
        tree.fit(&x, &y).unwrap();

        let imp = tree.feature_importances().unwrap();
        assert!(imp[0] > imp[1]);
    }
}
