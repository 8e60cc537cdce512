//! Soft-voting ensemble
//!
//! Combines logistic regression, a random forest, and an MLP over the same
//! training matrix. The ensemble probability is the unweighted mean of the
//! member probabilities; the predicted class is its argmax. Members are
//! embedded in the serialized artifact so one file restores the whole
//! ensemble.

use crate::error::{Result, SentinelError};
use crate::training::{LogisticRegression, MlpClassifier, MlpConfig, RandomForestClassifier};
use ndarray::{Array1, Array2};
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::info;

/// Soft-voting binary ensemble: logistic regression + random forest + MLP
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VotingEnsemble {
    logistic: LogisticRegression,
    forest: RandomForestClassifier,
    mlp: MlpClassifier,
    is_fitted: bool,
}

impl VotingEnsemble {
    /// Create an ensemble with the stock member configurations
    pub fn new(seed: u64) -> Self {
        Self {
            logistic: LogisticRegression::new(),
            forest: RandomForestClassifier::new(50).with_seed(seed),
            mlp: MlpClassifier::new(MlpConfig {
                hidden_layers: vec![50, 50],
                seed: Some(seed),
                ..Default::default()
            }),
            is_fitted: false,
        }
    }

    /// Fit every member on the same matrix and binary labels
    pub fn fit(&mut self, x: &Array2<f64>, y: &Array1<u32>) -> Result<&mut Self> {
        info!(rows = x.nrows(), "fitting voting ensemble members");
        self.logistic.fit(x, y)?;
        self.forest.fit(x, y)?;
        self.mlp.fit(x, y)?;
        self.is_fitted = true;
        Ok(self)
    }

    /// Mean member probabilities, columns = [benign, malware]
    pub fn predict_proba(&self, x: &Array2<f64>) -> Result<Array2<f64>> {
        if !self.is_fitted {
            return Err(SentinelError::ModelNotFitted);
        }

        let n = x.nrows();
        let mut avg = Array2::<f64>::zeros((n, 2));

        // Logistic regression yields p(positive); expand to two columns
        let p_pos = self.logistic.predict_proba(x)?;
        for i in 0..n {
            avg[[i, 0]] += 1.0 - p_pos[i];
            avg[[i, 1]] += p_pos[i];
        }

        add_member_probs(&mut avg, &self.forest.predict_proba(x)?, self.forest.classes());
        add_member_probs(&mut avg, &self.mlp.predict_proba(x)?, self.mlp.classes());

        avg /= 3.0;
        Ok(avg)
    }

    /// Predicted 0/1 labels (argmax of the mean probabilities)
    pub fn predict(&self, x: &Array2<f64>) -> Result<Array1<u32>> {
        let probs = self.predict_proba(x)?;
        Ok(probs
            .rows()
            .into_iter()
            .map(|row| if row[1] >= row[0] { 1u32 } else { 0u32 })
            .collect())
    }

    /// Whether all members have been fitted
    pub fn is_fitted(&self) -> bool {
        self.is_fitted
    }

    /// Persist the ensemble (members embedded) as pretty JSON
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json)?;
        Ok(())
    }

    /// Restore an ensemble from a JSON artifact
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let json = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&json)?)
    }
}

/// Accumulate a member's probability matrix into the two-column average,
/// mapping the member's class order onto [0, 1]
fn add_member_probs(avg: &mut Array2<f64>, probs: &Array2<f64>, classes: &[u32]) {
    for (col, &class) in classes.iter().enumerate() {
        let target = class as usize;
        if target < 2 {
            for i in 0..avg.nrows() {
                avg[[i, target]] += probs[[i, col]];
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::Array2;

    fn blobs() -> (Array2<f64>, Array1<u32>) {
        let mut data = Vec::new();
        let mut labels = Vec::new();
        for i in 0..30 {
            let jitter = (i % 6) as f64 * 0.05;
            if i < 15 {
                data.extend_from_slice(&[-1.5 + jitter, -1.5 - jitter]);
                labels.push(0);
            } else {
                data.extend_from_slice(&[1.5 - jitter, 1.5 + jitter]);
                labels.push(1);
            }
        }
        (
            Array2::from_shape_vec((30, 2), data).unwrap(),
            Array1::from_vec(labels),
        )
    }

    #[test]
    fn test_ensemble_fits_and_predicts() {
        let (x, y) = blobs();
        let mut ensemble = VotingEnsemble::new(42);
        ensemble.fit(&x, &y).unwrap();

        let pred = ensemble.predict(&x).unwrap();
        let correct = y.iter().zip(pred.iter()).filter(|(a, b)| a == b).count();
        assert!(correct >= 28, "accuracy too low: {correct}/30");
    }

    #[test]
    fn test_probabilities_sum_to_one() {
        let (x, y) = blobs();
        let mut ensemble = VotingEnsemble::new(42);
        ensemble.fit(&x, &y).unwrap();

        let probs = ensemble.predict_proba(&x).unwrap();
        for row in probs.rows() {
            assert!((row.sum() - 1.0).abs() < 1e-9);
        }
    }

    #[test]
    fn test_save_load_round_trip() {
        let (x, y) = blobs();
        let mut ensemble = VotingEnsemble::new(42);
        ensemble.fit(&x, &y).unwrap();

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("ensemble.json");
        ensemble.save(&path).unwrap();

        let restored = VotingEnsemble::load(&path).unwrap();
        let original = ensemble.predict_proba(&x).unwrap();
        let reloaded = restored.predict_proba(&x).unwrap();
        assert_eq!(original.dim(), reloaded.dim());
        // Deserialized weights can land in a different memory layout, which
        // reorders float accumulation in the dot products.
        for (a, b) in original.iter().zip(reloaded.iter()) {
            assert!((a - b).abs() < 1e-9, "probabilities diverged: {a} vs {b}");
        }
    }

    #[test]
    fn test_unfitted_errors() {
        let ensemble = VotingEnsemble::new(42);
        assert!(matches!(
            ensemble.predict(&Array2::zeros((1, 2))),
            Err(SentinelError::ModelNotFitted)
        ));
    }
}
