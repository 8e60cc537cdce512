//! PCA projections
//!
//! Linear dimensionality reduction for dataset exploration: top-k
//! eigenvectors of the covariance matrix extracted by power iteration with
//! deflation, projecting the feature matrix down to a small embedding with
//! per-component explained-variance ratios.

use crate::error::{Result, SentinelError};
use ndarray::{Array1, Array2, Axis};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};

/// PCA configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PcaConfig {
    /// Number of output dimensions
    pub n_components: usize,
    /// Subtract the per-feature mean before projecting
    pub center: bool,
    /// Divide by the per-feature standard deviation
    pub scale: bool,
    /// Seed for the power-iteration start vectors
    pub seed: u64,
}

impl Default for PcaConfig {
    fn default() -> Self {
        Self {
            n_components: 3,
            center: true,
            scale: true,
            seed: 42,
        }
    }
}

/// Projection output
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PcaResult {
    /// n_samples x n_components embedding
    pub embedding: Array2<f64>,
    /// Eigenvalue per extracted component
    pub eigenvalues: Vec<f64>,
    /// Fraction of total variance each component explains
    pub explained_variance_ratio: Vec<f64>,
}

/// Principal component analysis via power iteration
pub struct Pca {
    config: PcaConfig,
}

impl Pca {
    pub fn new(config: PcaConfig) -> Self {
        Self { config }
    }

    /// Project the matrix onto its top principal components
    pub fn fit_transform(&self, x: &Array2<f64>) -> Result<PcaResult> {
        let n = x.nrows();
        let d = x.ncols();
        if n < 2 {
            return Err(SentinelError::DataError(
                "PCA requires at least 2 samples".to_string(),
            ));
        }
        if d == 0 {
            return Err(SentinelError::DataError(
                "PCA requires at least 1 feature".to_string(),
            ));
        }

        let k = self.config.n_components.min(d).min(n);
        let prepared = self.center_and_scale(x);
        let cov = covariance(&prepared);

        let (eigenvalues, components) = self.power_iteration(&cov, k);

        // Ratios against the full variance, the covariance trace
        let total_variance: f64 = cov.diag().sum().max(1e-12);
        let explained_variance_ratio: Vec<f64> = eigenvalues
            .iter()
            .map(|&ev| (ev / total_variance).max(0.0))
            .collect();

        let embedding = prepared.dot(&components.t());

        Ok(PcaResult {
            embedding,
            eigenvalues,
            explained_variance_ratio,
        })
    }

    fn center_and_scale(&self, x: &Array2<f64>) -> Array2<f64> {
        if !self.config.center {
            return x.clone();
        }
        let means = x.mean_axis(Axis(0)).unwrap_or_else(|| Array1::zeros(x.ncols()));
        let mut out = x - &means;
        if self.config.scale {
            let n = x.nrows() as f64;
            for mut col in out.columns_mut() {
                let var = col.iter().map(|v| v * v).sum::<f64>() / n;
                let std = var.sqrt().max(1e-12);
                col.mapv_inplace(|v| v / std);
            }
        }
        out
    }

    /// Extract the top-k eigenpairs of a symmetric matrix, deflating after
    /// each converged component
    fn power_iteration(&self, cov: &Array2<f64>, k: usize) -> (Vec<f64>, Array2<f64>) {
        const MAX_ITER: usize = 300;
        const TOL: f64 = 1e-10;

        let d = cov.nrows();
        let mut work = cov.clone();
        let mut rng = ChaCha8Rng::seed_from_u64(self.config.seed);

        let mut eigenvalues = Vec::with_capacity(k);
        let mut components = Array2::<f64>::zeros((k, d));

        for c in 0..k {
            let mut v: Array1<f64> = Array1::from_iter((0..d).map(|_| rng.gen_range(-1.0..1.0)));
            let norm = v.dot(&v).sqrt().max(1e-12);
            v /= norm;

            let mut eigenvalue = 0.0;
            for _ in 0..MAX_ITER {
                let w = work.dot(&v);
                let new_eigenvalue = v.dot(&w);
                let w_norm = w.dot(&w).sqrt().max(1e-12);
                let new_v = w / w_norm;

                let diff = (&v - &new_v).mapv(|x| x * x).sum().sqrt();
                v = new_v;
                eigenvalue = new_eigenvalue;
                if diff < TOL {
                    break;
                }
            }

            let eigenvalue = eigenvalue.max(0.0);
            eigenvalues.push(eigenvalue);
            components.row_mut(c).assign(&v);

            // Deflate: A -= lambda v v^T
            for i in 0..d {
                for j in 0..d {
                    work[[i, j]] -= eigenvalue * v[i] * v[j];
                }
            }
        }

        (eigenvalues, components)
    }
}

/// Sample covariance matrix (n-1 denominator)
fn covariance(x: &Array2<f64>) -> Array2<f64> {
    let n = x.nrows() as f64;
    x.t().dot(x) / (n - 1.0).max(1.0)
}
