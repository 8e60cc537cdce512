//! Recursive feature elimination
//!
//! Repeatedly fits a random forest on the surviving feature subset and drops
//! the least important feature until the target count remains. The ranking
//! records elimination order; every kept feature has rank 1.

use crate::error::{Result, SentinelError};
use crate::training::RandomForestClassifier;
use ndarray::{Array2, Axis};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

/// Recursive feature elimination backed by random-forest importances
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeatureSelector {
    n_features_to_select: usize,
    n_estimators: usize,
    seed: u64,
    selected_indices: Vec<usize>,
    selected_names: Vec<String>,
    /// 1 for kept features; eliminated features get 2, 3, ... in reverse
    /// elimination order (last dropped = 2)
    ranking: Vec<u32>,
    is_fitted: bool,
}

impl Default for FeatureSelector {
    fn default() -> Self {
        Self::new(10)
    }
}

impl FeatureSelector {
    pub fn new(n_features_to_select: usize) -> Self {
        Self {
            n_features_to_select,
            n_estimators: 50,
            seed: 42,
            selected_indices: Vec::new(),
            selected_names: Vec::new(),
            ranking: Vec::new(),
            is_fitted: false,
        }
    }

    pub fn with_n_estimators(mut self, n: usize) -> Self {
        self.n_estimators = n;
        self
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    /// Run the elimination loop, one feature dropped per round
    pub fn fit(
        &mut self,
        x: &Array2<f64>,
        y: &ndarray::Array1<u32>,
        feature_names: &[String],
    ) -> Result<&mut Self> {
        let n_features = x.ncols();
        if feature_names.len() != n_features {
            return Err(SentinelError::ShapeError {
                expected: format!("{n_features} feature names"),
                actual: format!("{} feature names", feature_names.len()),
            });
        }
        if self.n_features_to_select == 0 || self.n_features_to_select > n_features {
            return Err(SentinelError::InvalidParameter(format!(
                "n_features_to_select must be in 1..={n_features}, got {}",
                self.n_features_to_select
            )));
        }

        info!(
            from = n_features,
            to = self.n_features_to_select,
            "running recursive feature elimination"
        );

        let mut surviving: Vec<usize> = (0..n_features).collect();
        let mut ranking = vec![1u32; n_features];
        let mut next_rank = 2u32;
        let mut eliminated: Vec<usize> = Vec::new();

        while surviving.len() > self.n_features_to_select {
            let subset = x.select(Axis(1), &surviving);
            let mut forest = RandomForestClassifier::new(self.n_estimators).with_seed(self.seed);
            forest.fit(&subset, y)?;
            let importances = forest
                .feature_importances()
                .ok_or_else(|| {
                    SentinelError::PreprocessingError(
                        "random forest produced no feature importances".into(),
                    )
                })?
                .to_vec();

            let weakest = importances
                .iter()
                .enumerate()
                .min_by(|(_, a), (_, b)| a.total_cmp(b))
                .map(|(i, _)| i)
                .ok_or_else(|| {
                    SentinelError::PreprocessingError("empty importance vector".into())
                })?;

            let dropped = surviving.remove(weakest);
            debug!(feature = %feature_names[dropped], "eliminated feature");
            eliminated.push(dropped);
        }

        // Last dropped = rank 2, first dropped = highest rank
        for &idx in eliminated.iter().rev() {
            ranking[idx] = next_rank;
            next_rank += 1;
        }

        self.selected_names = surviving
            .iter()
            .map(|&i| feature_names[i].clone())
            .collect();
        self.selected_indices = surviving;
        self.ranking = ranking;
        self.is_fitted = true;
        Ok(self)
    }

    /// Project a matrix onto the selected feature columns
    pub fn transform(&self, x: &Array2<f64>) -> Result<Array2<f64>> {
        if !self.is_fitted {
            return Err(SentinelError::ModelNotFitted);
        }
        if x.ncols() != self.ranking.len() {
            return Err(SentinelError::ShapeError {
                expected: format!("{} features", self.ranking.len()),
                actual: format!("{} features", x.ncols()),
            });
        }
        Ok(x.select(Axis(1), &self.selected_indices))
    }

    pub fn selected_indices(&self) -> &[usize] {
        &self.selected_indices
    }

    pub fn selected_names(&self) -> &[String] {
        &self.selected_names
    }

    /// Elimination ranking per original feature, 1 = kept
    pub fn ranking(&self) -> &[u32] {
        &self.ranking
    }

    pub fn is_fitted(&self) -> bool {
        self.is_fitted
    }
}
