//! Multi-layer perceptron classifier
//!
//! Feedforward network with a softmax output layer, trained by minibatch SGD
//! with momentum and L2 weight decay. Handles both the binary detector and
//! the multiclass malware-family model.

use crate::error::{Result, SentinelError};
use ndarray::{Array1, Array2, Axis};
use rand::prelude::*;
use rand_xoshiro::Xoshiro256PlusPlus;
use serde::{Deserialize, Serialize};

/// Hidden-layer activation function
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Activation {
    ReLU,
    Tanh,
}

impl Default for Activation {
    fn default() -> Self {
        Self::ReLU
    }
}

/// MLP hyperparameters
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MlpConfig {
    /// Hidden layer sizes
    pub hidden_layers: Vec<usize>,
    /// Hidden-layer activation
    pub activation: Activation,
    /// Learning rate
    pub learning_rate: f64,
    /// Number of passes over the training set
    pub max_iter: usize,
    /// Minibatch size
    pub batch_size: usize,
    /// L2 regularization strength
    pub alpha: f64,
    /// Momentum factor
    pub momentum: f64,
    /// Random seed for weight init and shuffling
    pub seed: Option<u64>,
}

impl Default for MlpConfig {
    fn default() -> Self {
        Self {
            hidden_layers: vec![100],
            activation: Activation::ReLU,
            learning_rate: 0.01,
            max_iter: 200,
            batch_size: 32,
            alpha: 1e-4,
            momentum: 0.9,
            seed: Some(42),
        }
    }
}

/// Softmax-output MLP classifier
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MlpClassifier {
    config: MlpConfig,
    weights: Vec<Array2<f64>>,
    biases: Vec<Array1<f64>>,
    n_features: usize,
    classes: Vec<u32>,
    is_fitted: bool,
}

impl MlpClassifier {
    /// Create an unfitted classifier
    pub fn new(config: MlpConfig) -> Self {
        Self {
            config,
            weights: Vec::new(),
            biases: Vec::new(),
            n_features: 0,
            classes: Vec::new(),
            is_fitted: false,
        }
    }

    /// The hyperparameter configuration
    pub fn config(&self) -> &MlpConfig {
        &self.config
    }

    /// Fit the network
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

        if self.classes.len() < 2 {
            return Err(SentinelError::TrainingError(
                "need at least 2 classes to train a classifier".to_string(),
            ));
        }

        self.initialize_weights();

        let mut rng = match self.config.seed {
            Some(seed) => Xoshiro256PlusPlus::seed_from_u64(seed.wrapping_add(1)),
            None => Xoshiro256PlusPlus::from_entropy(),
        };

        let y_onehot = self.to_onehot(y);

        let mut velocities_w: Vec<Array2<f64>> = self
            .weights
            .iter()
            .map(|w| Array2::zeros(w.raw_dim()))
            .collect();
        let mut velocities_b: Vec<Array1<f64>> = self
            .biases
            .iter()
            .map(|b| Array1::zeros(b.len()))
            .collect();

        let batch_size = self.config.batch_size.max(1);

        for _epoch in 0..self.config.max_iter {
            let mut indices: Vec<usize> = (0..n_samples).collect();
            indices.shuffle(&mut rng);

            for batch_start in (0..n_samples).step_by(batch_size) {
                let batch_end = (batch_start + batch_size).min(n_samples);
                let batch = &indices[batch_start..batch_end];

                let x_batch = gather_rows(x, batch);
                let y_batch = gather_rows(&y_onehot, batch);

                let (activations, z_values) = self.forward(&x_batch);
                let gradients = self.backward(&y_batch, &activations, &z_values);

                for (i, (grad_w, grad_b)) in gradients.into_iter().enumerate() {
                    velocities_w[i] = &velocities_w[i] * self.config.momentum
                        - &grad_w * self.config.learning_rate;
                    velocities_b[i] = &velocities_b[i] * self.config.momentum
                        - &grad_b * self.config.learning_rate;

                    self.weights[i] = &self.weights[i] + &velocities_w[i];
                    self.biases[i] = &self.biases[i] + &velocities_b[i];

                    // L2 weight decay
                    self.weights[i] = &self.weights[i]
                        * (1.0 - self.config.alpha * self.config.learning_rate);
                }
            }
        }

        self.is_fitted = true;
        Ok(self)
    }

    /// Per-row class probabilities from the softmax layer
    pub fn predict_proba(&self, x: &Array2<f64>) -> Result<Array2<f64>> {
        if !self.is_fitted {
            return Err(SentinelError::ModelNotFitted);
        }
        if x.ncols() != self.n_features {
            return Err(SentinelError::ShapeError {
                expected: format!("{} features", self.n_features),
                actual: format!("{} features", x.ncols()),
            });
        }
        let (activations, _) = self.forward(x);
        Ok(activations.last().cloned().unwrap_or_else(|| {
            Array2::zeros((x.nrows(), self.classes.len()))
        }))
    }

    /// Predicted labels (argmax of the softmax output)
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

    /// The fitted class labels in probability-column order
    pub fn classes(&self) -> &[u32] {
        &self.classes
    }

    /// Whether the network has been fitted
    pub fn is_fitted(&self) -> bool {
        self.is_fitted
    }

    /// Persist the fitted network as pretty JSON
    pub fn save(&self, path: impl AsRef<std::path::Path>) -> Result<()> {
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json)?;
        Ok(())
    }

    /// Restore a network from a JSON artifact
    pub fn load(path: impl AsRef<std::path::Path>) -> Result<Self> {
        let json = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&json)?)
    }

    fn initialize_weights(&mut self) {
        self.weights.clear();
        self.biases.clear();

        let mut rng = match self.config.seed {
            Some(seed) => Xoshiro256PlusPlus::seed_from_u64(seed),
            None => Xoshiro256PlusPlus::from_entropy(),
        };

        let mut layer_sizes = vec![self.n_features];
        layer_sizes.extend(&self.config.hidden_layers);
        layer_sizes.push(self.classes.len());

        for pair in layer_sizes.windows(2) {
            let (n_in, n_out) = (pair[0], pair[1]);
            // Xavier range
            let scale = (2.0 / (n_in + n_out) as f64).sqrt();

            let weights: Vec<f64> = (0..n_in * n_out)
                .map(|_| rng.gen::<f64>() * 2.0 * scale - scale)
                .collect();

            self.weights
                .push(Array2::from_shape_vec((n_in, n_out), weights).expect("layer shape"));
            self.biases.push(Array1::zeros(n_out));
        }
    }

    fn forward(&self, x: &Array2<f64>) -> (Vec<Array2<f64>>, Vec<Array2<f64>>) {
        let mut activations = vec![x.clone()];
        let mut z_values = Vec::new();

        let last = self.weights.len() - 1;
        for (i, (w, b)) in self.weights.iter().zip(self.biases.iter()).enumerate() {
            let z = activations.last().expect("forward input").dot(w) + b;
            z_values.push(z.clone());

            let a = if i < last {
                self.activate(&z)
            } else {
                softmax(&z)
            };
            activations.push(a);
        }

        (activations, z_values)
    }

    fn backward(
        &self,
        y_onehot: &Array2<f64>,
        activations: &[Array2<f64>],
        z_values: &[Array2<f64>],
    ) -> Vec<(Array2<f64>, Array1<f64>)> {
        let n = y_onehot.nrows() as f64;
        let mut gradients = Vec::new();

        // Softmax + cross-entropy gradient
        let mut delta = (activations.last().expect("output activation") - y_onehot) / n;

        for i in (0..self.weights.len()).rev() {
            let a_prev = &activations[i];
            let grad_w = a_prev.t().dot(&delta);
            let grad_b = delta.sum_axis(Axis(0));
            gradients.push((grad_w, grad_b));

            if i > 0 {
                let z = &z_values[i - 1];
                delta = delta.dot(&self.weights[i].t()) * self.activate_derivative(z);
            }
        }

        gradients.reverse();
        gradients
    }

    fn activate(&self, z: &Array2<f64>) -> Array2<f64> {
        match self.config.activation {
            Activation::ReLU => z.mapv(|v| v.max(0.0)),
            Activation::Tanh => z.mapv(|v| v.tanh()),
        }
    }

    fn activate_derivative(&self, z: &Array2<f64>) -> Array2<f64> {
        match self.config.activation {
            Activation::ReLU => z.mapv(|v| if v > 0.0 { 1.0 } else { 0.0 }),
            Activation::Tanh => {
                let t = z.mapv(|v| v.tanh());
                1.0 - &t * &t
            }
        }
    }

    fn to_onehot(&self, y: &Array1<u32>) -> Array2<f64> {
        let mut onehot = Array2::zeros((y.len(), self.classes.len()));
        for (i, &label) in y.iter().enumerate() {
            if let Ok(class_idx) = self.classes.binary_search(&label) {
                onehot[[i, class_idx]] = 1.0;
            }
        }
        onehot
    }
}

fn gather_rows(x: &Array2<f64>, indices: &[usize]) -> Array2<f64> {
    let n_cols = x.ncols();
    let mut rows = Vec::with_capacity(indices.len() * n_cols);
    for &i in indices {
        rows.extend(x.row(i).iter().copied());
    }
    Array2::from_shape_vec((indices.len(), n_cols), rows).expect("batch shape")
}

fn softmax(z: &Array2<f64>) -> Array2<f64> {
    let mut result = z.clone();
    for mut row in result.rows_mut() {
        let max = row.iter().cloned().fold(f64::NEG_INFINITY, f64::max);
        let exp_sum: f64 = row.iter().map(|&v| (v - max).exp()).sum();
        for v in row.iter_mut() {
            *v = (*v - max).exp() / exp_sum;
        }
    }
    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::Array2;

    fn two_blobs() -> (Array2<f64>, Array1<u32>) {
        let mut data = Vec::new();
        let mut labels = Vec::new();
        for i in 0..40 {
            let jitter = (i % 8) as f64 * 0.05;
            if i < 20 {
                data.extend_from_slice(&[-1.0 - jitter, -1.0 + jitter]);
                labels.push(0);
            } else {
                data.extend_from_slice(&[1.0 + jitter, 1.0 - jitter]);
                labels.push(1);
            }
        }
        (
            Array2::from_shape_vec((40, 2), data).unwrap(),
            Array1::from_vec(labels),
        )
    }

    #[test]
    fn test_mlp_learns_blobs() {
        let (x, y) = two_blobs();
        let config = MlpConfig {
            hidden_layers: vec![16],
            max_iter: 100,
            ..Default::default()
        };

        let mut mlp = MlpClassifier::new(config);
        mlp.fit(&x, &y).unwrap();

        let pred = mlp.predict(&x).unwrap();
        let correct = y.iter().zip(pred.iter()).filter(|(a, b)| a == b).count();
        assert!(correct >= 36, "accuracy too low: {correct}/40");
    }

    #[test]
    fn test_softmax_rows_sum_to_one() {
        let (x, y) = two_blobs();
        let mut mlp = MlpClassifier::new(MlpConfig {
            hidden_layers: vec![8],
            max_iter: 20,
            ..Default::default()
        });
        mlp.fit(&x, &y).unwrap();

        let probs = mlp.predict_proba(&x).unwrap();
        for row in probs.rows() {
            assert!((row.sum() - 1.0).abs() < 1e-9);
        }
    }

    #[test]
    fn test_seeded_fit_is_deterministic() {
        let (x, y) = two_blobs();
        let config = MlpConfig {
            hidden_layers: vec![8],
            max_iter: 10,
            seed: Some(3),
            ..Default::default()
        };

        let mut a = MlpClassifier::new(config.clone());
        a.fit(&x, &y).unwrap();
        let mut b = MlpClassifier::new(config);
        b.fit(&x, &y).unwrap();

        assert_eq!(a.predict_proba(&x).unwrap(), b.predict_proba(&x).unwrap());
    }

    #[test]
    fn test_single_class_errors() {
        let x = Array2::zeros((4, 2));
        let y = Array1::from_vec(vec![1, 1, 1, 1]);
        let mut mlp = MlpClassifier::new(MlpConfig::default());
        assert!(mlp.fit(&x, &y).is_err());
    }
}
