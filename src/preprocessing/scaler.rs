//! Feature standardization over dense matrices

use crate::error::{Result, SentinelError};
use ndarray::{Array1, Array2};
use serde::{Deserialize, Serialize};

/// Per-feature z-score standardization: (x - mean) / std.
///
/// Statistics are captured at fit time and reused for every later transform,
/// so scan-time rows are normalized exactly like the training data was.
/// Features with zero variance pass through unscaled (divisor clamped to 1).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StandardScaler {
    means: Option<Array1<f64>>,
    stds: Option<Array1<f64>>,
}

impl StandardScaler {
    /// Create a new unfitted scaler
    pub fn new() -> Self {
        Self {
            means: None,
            stds: None,
        }
    }

    /// Fit per-column mean and standard deviation
    pub fn fit(&mut self, x: &Array2<f64>) -> Result<&mut Self> {
        if x.nrows() == 0 {
            return Err(SentinelError::PreprocessingError(
                "cannot fit scaler on empty matrix".to_string(),
            ));
        }

        let n = x.nrows() as f64;
        let n_features = x.ncols();

        let mut means = Array1::zeros(n_features);
        let mut stds = Array1::zeros(n_features);

        for j in 0..n_features {
            let col = x.column(j);
            let mean = col.sum() / n;
            let var = col.iter().map(|&v| (v - mean) * (v - mean)).sum::<f64>() / n;
            means[j] = mean;
            let std = var.sqrt();
            stds[j] = if std > 1e-12 { std } else { 1.0 };
        }

        self.means = Some(means);
        self.stds = Some(stds);
        Ok(self)
    }

    /// Apply the fitted standardization
    pub fn transform(&self, x: &Array2<f64>) -> Result<Array2<f64>> {
        let means = self.means.as_ref().ok_or(SentinelError::ModelNotFitted)?;
        let stds = self.stds.as_ref().ok_or(SentinelError::ModelNotFitted)?;

        if x.ncols() != means.len() {
            return Err(SentinelError::ShapeError {
                expected: format!("{} features", means.len()),
                actual: format!("{} features", x.ncols()),
            });
        }

        let mut out = x.clone();
        for j in 0..x.ncols() {
            let mean = means[j];
            let std = stds[j];
            for v in out.column_mut(j).iter_mut() {
                *v = (*v - mean) / std;
            }
        }
        Ok(out)
    }

    /// Fit and transform in one step
    pub fn fit_transform(&mut self, x: &Array2<f64>) -> Result<Array2<f64>> {
        self.fit(x)?;
        self.transform(x)
    }

    /// Recover original units from standardized values
    pub fn inverse_transform(&self, x: &Array2<f64>) -> Result<Array2<f64>> {
        let means = self.means.as_ref().ok_or(SentinelError::ModelNotFitted)?;
        let stds = self.stds.as_ref().ok_or(SentinelError::ModelNotFitted)?;

        let mut out = x.clone();
        for j in 0..x.ncols() {
            let mean = means[j];
            let std = stds[j];
            for v in out.column_mut(j).iter_mut() {
                *v = *v * std + mean;
            }
        }
        Ok(out)
    }

    /// Fitted per-feature means
    pub fn means(&self) -> Option<&Array1<f64>> {
        self.means.as_ref()
    }

    /// Fitted per-feature standard deviations
    pub fn stds(&self) -> Option<&Array1<f64>> {
        self.stds.as_ref()
    }

    /// Whether the scaler has been fitted
    pub fn is_fitted(&self) -> bool {
        self.means.is_some()
    }
}

impl Default for StandardScaler {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn test_zero_mean_unit_variance() {
        let x = array![[1.0, 10.0], [2.0, 20.0], [3.0, 30.0], [4.0, 40.0]];

        let mut scaler = StandardScaler::new();
        let scaled = scaler.fit_transform(&x).unwrap();

        for j in 0..2 {
            let col = scaled.column(j);
            let mean = col.sum() / col.len() as f64;
            let var = col.iter().map(|&v| (v - mean).powi(2)).sum::<f64>() / col.len() as f64;
            assert!(mean.abs() < 1e-10);
            assert!((var - 1.0).abs() < 1e-10);
        }
    }

    #[test]
    fn test_constant_column_passes_through() {
        let x = array![[5.0], [5.0], [5.0]];

        let mut scaler = StandardScaler::new();
        let scaled = scaler.fit_transform(&x).unwrap();

        // std clamps to 1, so values become x - mean = 0
        assert!(scaled.iter().all(|&v| v.abs() < 1e-12));
    }

    #[test]
    fn test_inverse_recovers_values() {
        let x = array![[1.0, -3.0], [7.0, 0.5], [2.5, 9.0]];

        let mut scaler = StandardScaler::new();
        let scaled = scaler.fit_transform(&x).unwrap();
        let back = scaler.inverse_transform(&scaled).unwrap();

        for (a, b) in x.iter().zip(back.iter()) {
            assert!((a - b).abs() < 1e-10);
        }
    }

    #[test]
    fn test_shape_mismatch() {
        let mut scaler = StandardScaler::new();
        scaler.fit(&array![[1.0, 2.0], [3.0, 4.0]]).unwrap();

        let narrow = array![[1.0], [2.0]];
        assert!(matches!(
            scaler.transform(&narrow),
            Err(SentinelError::ShapeError { .. })
        ));
    }
}
