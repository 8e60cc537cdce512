//! Random hyperparameter search with k-fold cross-validation

use crate::error::{Result, SentinelError};
use crate::training::metrics::accuracy;
use crate::training::mlp::{Activation, MlpClassifier, MlpConfig};
use ndarray::{Array1, Array2, Axis};
use rand::seq::SliceRandom;
use rand::Rng;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

/// One evaluated candidate configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CandidateScore {
    pub config: MlpConfig,
    /// Mean cross-validated accuracy
    pub mean_accuracy: f64,
    /// Per-fold accuracies
    pub fold_accuracies: Vec<f64>,
}

/// Seeded random search over an MLP hyperparameter grid.
///
/// Samples `n_iter` candidates from the grid, scores each with stratified
/// k-fold accuracy, then refits the best configuration on the full training
/// set.
#[derive(Debug, Clone)]
pub struct RandomSearch {
    /// Candidate hidden-layer layouts
    pub hidden_layouts: Vec<Vec<usize>>,
    /// Candidate activations
    pub activations: Vec<Activation>,
    /// Candidate L2 strengths
    pub alphas: Vec<f64>,
    /// Number of configurations to sample
    pub n_iter: usize,
    /// Cross-validation folds
    pub cv_folds: usize,
    /// Random seed
    pub seed: u64,
}

impl Default for RandomSearch {
    fn default() -> Self {
        Self {
            hidden_layouts: vec![vec![50], vec![100], vec![50, 50], vec![100, 50]],
            activations: vec![Activation::ReLU, Activation::Tanh],
            alphas: vec![1e-4, 1e-3, 1e-2],
            n_iter: 5,
            cv_folds: 3,
            seed: 42,
        }
    }
}

impl RandomSearch {
    /// Create a search over the stock MLP grid
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the sampling and fold seed
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    /// Run the search; returns the refit best model and all candidate scores
    pub fn run(
        &self,
        x: &Array2<f64>,
        y: &Array1<u32>,
    ) -> Result<(MlpClassifier, Vec<CandidateScore>)> {
        if x.nrows() < self.cv_folds {
            return Err(SentinelError::TrainingError(format!(
                "need at least {} rows for {}-fold CV, got {}",
                self.cv_folds,
                self.cv_folds,
                x.nrows()
            )));
        }

        let mut rng = ChaCha8Rng::seed_from_u64(self.seed);
        let folds = stratified_folds(y, self.cv_folds, self.seed);

        let mut scores: Vec<CandidateScore> = Vec::with_capacity(self.n_iter);

        for trial in 0..self.n_iter {
            let config = self.sample_config(&mut rng);
            debug!(trial, ?config.hidden_layers, ?config.activation, config.alpha, "evaluating candidate");

            let mut fold_accuracies = Vec::with_capacity(folds.len());
            for (train_idx, test_idx) in &folds {
                let x_train = x.select(Axis(0), train_idx);
                let y_train = y.select(Axis(0), train_idx);
                let x_test = x.select(Axis(0), test_idx);
                let y_test = y.select(Axis(0), test_idx);

                let mut model = MlpClassifier::new(config.clone());
                model.fit(&x_train, &y_train)?;
                let pred = model.predict(&x_test)?;
                fold_accuracies.push(accuracy(&y_test, &pred));
            }

            let mean_accuracy =
                fold_accuracies.iter().sum::<f64>() / fold_accuracies.len().max(1) as f64;
            scores.push(CandidateScore {
                config,
                mean_accuracy,
                fold_accuracies,
            });
        }

        let best = scores
            .iter()
            .max_by(|a, b| {
                a.mean_accuracy
                    .partial_cmp(&b.mean_accuracy)
                    .unwrap_or(std::cmp::Ordering::Equal)
            })
            .ok_or_else(|| SentinelError::TrainingError("no candidates evaluated".to_string()))?;

        info!(
            accuracy = best.mean_accuracy,
            layers = ?best.config.hidden_layers,
            "best candidate selected, refitting on full data"
        );

        let mut best_model = MlpClassifier::new(best.config.clone());
        best_model.fit(x, y)?;
        Ok((best_model, scores))
    }

    fn sample_config(&self, rng: &mut ChaCha8Rng) -> MlpConfig {
        let layers = self.hidden_layouts[rng.gen_range(0..self.hidden_layouts.len())].clone();
        let activation = self.activations[rng.gen_range(0..self.activations.len())];
        let alpha = self.alphas[rng.gen_range(0..self.alphas.len())];

        MlpConfig {
            hidden_layers: layers,
            activation,
            alpha,
            max_iter: 200,
            seed: Some(self.seed),
            ..Default::default()
        }
    }
}

/// Stratified k-fold index sets (train, test) preserving class balance.
///
/// Class groups are shuffled with the seeded RNG and dealt round-robin into
/// folds, so every fold sees roughly the full class distribution.
pub fn stratified_folds(y: &Array1<u32>, k: usize, seed: u64) -> Vec<(Vec<usize>, Vec<usize>)> {
    let mut rng = ChaCha8Rng::seed_from_u64(seed);

    let mut class_indices: std::collections::BTreeMap<u32, Vec<usize>> = Default::default();
    for (i, &label) in y.iter().enumerate() {
        class_indices.entry(label).or_default().push(i);
    }

    let mut folds: Vec<Vec<usize>> = vec![Vec::new(); k];
    for indices in class_indices.values_mut() {
        indices.shuffle(&mut rng);
        for (i, &idx) in indices.iter().enumerate() {
            folds[i % k].push(idx);
        }
    }

    (0..k)
        .map(|fold_idx| {
            let test = folds[fold_idx].clone();
            let train: Vec<usize> = folds
                .iter()
                .enumerate()
                .filter(|(i, _)| *i != fold_idx)
                .flat_map(|(_, f)| f.iter().copied())
                .collect();
            (train, test)
        })
        .collect()
}
