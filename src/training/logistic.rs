//! Logistic regression (binary)

use crate::error::{Result, SentinelError};
use ndarray::{Array1, Array2};
use serde::{Deserialize, Serialize};

/// Binary logistic regression fitted by full-batch gradient descent on the
/// sigmoid loss with L2 regularization.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogisticRegression {
    coefficients: Option<Array1<f64>>,
    intercept: Option<f64>,
    /// Learning rate
    pub learning_rate: f64,
    /// L2 regularization strength
    pub alpha: f64,
    /// Maximum gradient-descent iterations
    pub max_iter: usize,
    /// Convergence tolerance on the coefficient update norm
    pub tol: f64,
    is_fitted: bool,
}

impl LogisticRegression {
    /// Create a model with default hyperparameters
    pub fn new() -> Self {
        Self {
            coefficients: None,
            intercept: None,
            learning_rate: 0.1,
            alpha: 0.01,
            max_iter: 1000,
            tol: 1e-6,
            is_fitted: false,
        }
    }

    /// Set the learning rate
    pub fn with_learning_rate(mut self, lr: f64) -> Self {
        self.learning_rate = lr;
        self
    }

    /// Set L2 regularization strength
    pub fn with_alpha(mut self, alpha: f64) -> Self {
        self.alpha = alpha;
        self
    }

    /// Set maximum iterations
    pub fn with_max_iter(mut self, max_iter: usize) -> Self {
        self.max_iter = max_iter;
        self
    }

    /// Fit on a feature matrix and 0/1 labels
    pub fn fit(&mut self, x: &Array2<f64>, y: &Array1<u32>) -> Result<&mut Self> {
        let n_samples = x.nrows();
        let n_features = x.ncols();

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

        let y_f: Array1<f64> = y.mapv(|v| v as f64);
        let mut weights = Array1::<f64>::zeros(n_features);
        let mut intercept = 0.0f64;
        let n = n_samples as f64;

        for _ in 0..self.max_iter {
            let logits = x.dot(&weights) + intercept;
            let probs = logits.mapv(sigmoid);
            let residual = &probs - &y_f;

            let grad_w = x.t().dot(&residual) / n + self.alpha * &weights;
            let grad_b = residual.sum() / n;

            let step_w = grad_w.mapv(|g| g * self.learning_rate);
            weights -= &step_w;
            intercept -= self.learning_rate * grad_b;

            let update_norm = step_w.iter().map(|v| v * v).sum::<f64>().sqrt();
            if update_norm < self.tol {
                break;
            }
        }

        self.coefficients = Some(weights);
        self.intercept = Some(intercept);
        self.is_fitted = true;
        Ok(self)
    }

    /// Probability of the positive class per row
    pub fn predict_proba(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        let weights = self
            .coefficients
            .as_ref()
            .ok_or(SentinelError::ModelNotFitted)?;
        let intercept = self.intercept.ok_or(SentinelError::ModelNotFitted)?;

        if x.ncols() != weights.len() {
            return Err(SentinelError::ShapeError {
                expected: format!("{} features", weights.len()),
                actual: format!("{} features", x.ncols()),
            });
        }

        Ok((x.dot(weights) + intercept).mapv(sigmoid))
    }

    /// Predicted 0/1 labels at the 0.5 threshold
    pub fn predict(&self, x: &Array2<f64>) -> Result<Array1<u32>> {
        Ok(self
            .predict_proba(x)?
            .mapv(|p| if p >= 0.5 { 1u32 } else { 0u32 }))
    }

    /// Whether the model has been fitted
    pub fn is_fitted(&self) -> bool {
        self.is_fitted
    }

    /// Fitted coefficient vector
    pub fn coefficients(&self) -> Option<&Array1<f64>> {
        self.coefficients.as_ref()
    }

    /// Persist the fitted model as pretty JSON
    pub fn save(&self, path: impl AsRef<std::path::Path>) -> Result<()> {
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json)?;
        Ok(())
    }

    /// Restore a model from a JSON artifact
    pub fn load(path: impl AsRef<std::path::Path>) -> Result<Self> {
        let json = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&json)?)
    }
}

impl Default for LogisticRegression {
    fn default() -> Self {
        Self::new()
    }
}

fn sigmoid(z: f64) -> f64 {
    1.0 / (1.0 + (-z).exp())
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    fn separable_fixture() -> (Array2<f64>, Array1<u32>) {
        let x = array![
            [-2.0, -1.5],
            [-1.8, -2.1],
            [-2.2, -1.9],
            [-1.5, -1.2],
            [2.0, 1.5],
            [1.8, 2.1],
            [2.2, 1.9],
            [1.5, 1.2],
        ];
        let y = array![0, 0, 0, 0, 1, 1, 1, 1];
        (x, y)
    }

    #[test]
    fn test_learns_separable_data() {
        let (x, y) = separable_fixture();
        let mut model = LogisticRegression::new();
        model.fit(&x, &y).unwrap();

        let pred = model.predict(&x).unwrap();
        assert_eq!(pred, y);
    }

    #[test]
    fn test_probabilities_ordered() {
        let (x, y) = separable_fixture();
        let mut model = LogisticRegression::new();
        model.fit(&x, &y).unwrap();

        let probs = model.predict_proba(&x).unwrap();
        assert!(probs[0] < 0.5);
        assert!(probs[4] > 0.5);
    }

    #[test]
    fn test_unfitted_predict_errors() {
        let model = LogisticRegression::new();
        assert!(matches!(
            model.predict(&array![[0.0]]),
            Err(SentinelError::ModelNotFitted)
        ));
    }
}
