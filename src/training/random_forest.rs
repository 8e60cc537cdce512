//! Random forest classifier

use crate::error::{Result, SentinelError};
use crate::training::decision_tree::DecisionTreeClassifier;
use ndarray::{Array1, Array2};
use rand::Rng;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

/// Bagged ensemble of Gini trees with sqrt feature subsampling.
///
/// Tree builds run in parallel; tree `i` is seeded with `seed + i` so a fixed
/// base seed reproduces the whole forest.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RandomForestClassifier {
    trees: Vec<DecisionTreeClassifier>,
    /// Number of trees
    pub n_estimators: usize,
    /// Maximum depth per tree
    pub max_depth: Option<usize>,
    /// Minimum samples to split
    pub min_samples_split: usize,
    /// Base random seed
    pub seed: u64,
    classes: Vec<u32>,
    n_features: usize,
    feature_importances: Option<Array1<f64>>,
}

impl RandomForestClassifier {
    /// Create a forest with the given number of trees
    pub fn new(n_estimators: usize) -> Self {
        Self {
            trees: Vec::new(),
            n_estimators: n_estimators.max(1),
            max_depth: None,
            min_samples_split: 2,
            seed: 42,
            classes: Vec::new(),
            n_features: 0,
            feature_importances: None,
        }
    }

    /// Set maximum tree depth
    pub fn with_max_depth(mut self, depth: usize) -> Self {
        self.max_depth = Some(depth);
        self
    }

    /// Set minimum samples to split
    pub fn with_min_samples_split(mut self, min_samples: usize) -> Self {
        self.min_samples_split = min_samples.max(2);
        self
    }

    /// Set the base seed
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    /// Fit the forest with bootstrap sampling
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
        let max_features = ((self.n_features as f64).sqrt().round() as usize)
            .clamp(1, self.n_features);

        let mut classes: Vec<u32> = y.iter().copied().collect();
        classes.sort_unstable();
        classes.dedup();
        self.classes = classes;

        let max_depth = self.max_depth;
        let min_samples_split = self.min_samples_split;
        let base_seed = self.seed;

        let trees: Result<Vec<DecisionTreeClassifier>> = (0..self.n_estimators)
            .into_par_iter()
            .map(|tree_idx| {
                let tree_seed = base_seed + tree_idx as u64;
                let mut rng = ChaCha8Rng::seed_from_u64(tree_seed);

                // Bootstrap sample with replacement
                let indices: Vec<usize> =
                    (0..n_samples).map(|_| rng.gen_range(0..n_samples)).collect();
                let (x_boot, y_boot) = gather(x, y, &indices);

                let mut tree = DecisionTreeClassifier::new()
                    .with_min_samples_split(min_samples_split)
                    .with_max_features(max_features)
                    .with_seed(tree_seed);
                if let Some(depth) = max_depth {
                    tree = tree.with_max_depth(depth);
                }
                tree.fit(&x_boot, &y_boot)?;
                Ok(tree)
            })
            .collect();
        self.trees = trees?;

        // Aggregate importances across trees
        let mut importances = Array1::<f64>::zeros(self.n_features);
        for tree in &self.trees {
            if let Some(imp) = tree.feature_importances() {
                importances += imp;
            }
        }
        let total = importances.sum();
        if total > 0.0 {
            importances /= total;
        }
        self.feature_importances = Some(importances);

        Ok(self)
    }

    /// Class probabilities averaged over trees, columns in `classes()` order
    pub fn predict_proba(&self, x: &Array2<f64>) -> Result<Array2<f64>> {
        if self.trees.is_empty() {
            return Err(SentinelError::ModelNotFitted);
        }

        let n_classes = self.classes.len();
        let mut avg = Array2::<f64>::zeros((x.nrows(), n_classes));

        for tree in &self.trees {
            let probs = tree.predict_proba(x)?;
            // Trees may have seen a subset of classes in their bootstrap;
            // map their columns into the forest's class order.
            for (tree_col, &class) in tree.classes().iter().enumerate() {
                if let Ok(forest_col) = self.classes.binary_search(&class) {
                    for i in 0..x.nrows() {
                        avg[[i, forest_col]] += probs[[i, tree_col]];
                    }
                }
            }
        }

        avg /= self.trees.len() as f64;
        Ok(avg)
    }

    /// Predicted labels (argmax of averaged probabilities)
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

    /// Aggregated, normalized feature importances
    pub fn feature_importances(&self) -> Option<&Array1<f64>> {
        self.feature_importances.as_ref()
    }

    /// The fitted class labels
    pub fn classes(&self) -> &[u32] {
        &self.classes
    }

    /// Whether the forest has been fitted
    pub fn is_fitted(&self) -> bool {
        !self.trees.is_empty()
    }

    /// Persist the fitted forest as pretty JSON
    pub fn save(&self, path: impl AsRef<std::path::Path>) -> Result<()> {
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json)?;
        Ok(())
    }

    /// Restore a forest from a JSON artifact
    pub fn load(path: impl AsRef<std::path::Path>) -> Result<Self> {
        let json = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&json)?)
    }
}

fn gather(x: &Array2<f64>, y: &Array1<u32>, indices: &[usize]) -> (Array2<f64>, Array1<u32>) {
    let n_cols = x.ncols();
    let mut data = Vec::with_capacity(indices.len() * n_cols);
    let mut labels = Vec::with_capacity(indices.len());
    for &i in indices {
        data.extend(x.row(i).iter().copied());
        labels.push(y[i]);
    }
    (
        Array2::from_shape_vec((indices.len(), n_cols), data).expect("bootstrap shape"),
        Array1::from_vec(labels),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    fn blobs() -> (Array2<f64>, Array1<u32>) {
        let mut data = Vec::new();
        let mut labels = Vec::new();
        for i in 0..20 {
            let jitter = (i % 5) as f64 * 0.1;
            if i < 10 {
                data.extend_from_slice(&[1.0 + jitter, 1.0 - jitter]);
                labels.push(0);
            } else {
                data.extend_from_slice(&[8.0 + jitter, 8.0 - jitter]);
                labels.push(1);
            }
        }
        (
            Array2::from_shape_vec((20, 2), data).unwrap(),
            Array1::from_vec(labels),
        )
    }

    #[test]
    fn test_forest_fits_blobs() {
        let (x, y) = blobs();
        let mut forest = RandomForestClassifier::new(20).with_seed(42);
        forest.fit(&x, &y).unwrap();

        assert_eq!(forest.predict(&x).unwrap(), y);
    }

    #[test]
    fn test_same_seed_same_forest() {
        let (x, y) = blobs();

        let mut a = RandomForestClassifier::new(10).with_seed(7);
        a.fit(&x, &y).unwrap();
        let mut b = RandomForestClassifier::new(10).with_seed(7);
        b.fit(&x, &y).unwrap();

        assert_eq!(a.predict_proba(&x).unwrap(), b.predict_proba(&x).unwrap());
    }

    #[test]
    fn test_probabilities_normalized() {
        let (x, y) = blobs();
        let mut forest = RandomForestClassifier::new(10).with_seed(42);
        forest.fit(&x, &y).unwrap();

        let probs = forest.predict_proba(&x).unwrap();
        for row in probs.rows() {
            assert!((row.sum() - 1.0).abs() < 1e-9);
        }
    }
}
