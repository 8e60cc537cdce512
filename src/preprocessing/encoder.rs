//! Label encoding
//!
//! Maps string labels to dense integer codes with a deterministic rule:
//! codes follow the lexicographic order of the distinct labels, so
//! `Benign` < `Malware` always encodes as 0 and 1 regardless of row order.

use crate::error::{Result, SentinelError};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Deterministic string-to-code label encoder
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LabelEncoder {
    classes: Vec<String>,
}

impl LabelEncoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Learn the code table from the distinct values, sorted lexicographically
    pub fn fit(&mut self, values: &[String]) -> Result<&mut Self> {
        if values.is_empty() {
            return Err(SentinelError::PreprocessingError(
                "cannot fit label encoder on empty input".to_string(),
            ));
        }
        let distinct: BTreeSet<&String> = values.iter().collect();
        self.classes = distinct.into_iter().cloned().collect();
        Ok(self)
    }

    /// Encode values with the fitted table; unseen labels are errors
    pub fn transform(&self, values: &[String]) -> Result<Vec<u32>> {
        if !self.is_fitted() {
            return Err(SentinelError::ModelNotFitted);
        }
        values
            .iter()
            .map(|v| {
                self.classes
                    .binary_search(v)
                    .map(|i| i as u32)
                    .map_err(|_| {
                        SentinelError::PreprocessingError(format!("unseen label '{v}'"))
                    })
            })
            .collect()
    }

    /// Fit the table and encode in one pass
    pub fn fit_transform(&mut self, values: &[String]) -> Result<Vec<u32>> {
        self.fit(values)?;
        self.transform(values)
    }

    /// Decode a single code back to its label
    pub fn inverse(&self, code: u32) -> Result<&str> {
        if !self.is_fitted() {
            return Err(SentinelError::ModelNotFitted);
        }
        self.classes
            .get(code as usize)
            .map(String::as_str)
            .ok_or_else(|| {
                SentinelError::PreprocessingError(format!(
                    "label code {code} out of range (0..{})",
                    self.classes.len()
                ))
            })
    }

    /// The fitted labels in code order
    pub fn classes(&self) -> &[String] {
        &self.classes
    }

    pub fn n_classes(&self) -> usize {
        self.classes.len()
    }

    pub fn is_fitted(&self) -> bool {
        !self.classes.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn strings(values: &[&str]) -> Vec<String> {
        values.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_codes_follow_sorted_order() {
        let mut encoder = LabelEncoder::new();
        let codes = encoder
            .fit_transform(&strings(&["Malware", "Benign", "Malware", "Benign"]))
            .unwrap();

        assert_eq!(encoder.classes(), &["Benign", "Malware"]);
        assert_eq!(codes, vec![1, 0, 1, 0]);
    }

    #[test]
    fn test_inverse_round_trip() {
        let mut encoder = LabelEncoder::new();
        encoder
            .fit(&strings(&["Trojan", "Ransomware", "Spyware"]))
            .unwrap();

        for (code, label) in [(0, "Ransomware"), (1, "Spyware"), (2, "Trojan")] {
            assert_eq!(encoder.inverse(code).unwrap(), label);
        }
        assert!(encoder.inverse(3).is_err());
    }

    #[test]
    fn test_unseen_label_is_an_error() {
        let mut encoder = LabelEncoder::new();
        encoder.fit(&strings(&["Benign", "Malware"])).unwrap();
        assert!(encoder.transform(&strings(&["Rootkit"])).is_err());
    }

    #[test]
    fn test_unfitted_and_empty_inputs_rejected() {
        let encoder = LabelEncoder::new();
        assert!(matches!(
            encoder.transform(&strings(&["Benign"])),
            Err(SentinelError::ModelNotFitted)
        ));

        let mut encoder = LabelEncoder::new();
        assert!(encoder.fit(&[]).is_err());
    }
}
