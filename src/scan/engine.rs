//! Scan engine
//!
//! Runs a loaded DataFrame through the fitted preprocessor and the
//! persisted models, producing one `ScanRecord` per row. Batches are
//! all-or-nothing: any row failing to transform or score fails the whole
//! scan with no partial records.

use crate::anomaly::IsolationForest;
use crate::ensemble::VotingEnsemble;
use crate::error::Result;
use crate::preprocessing::{DatasetPreprocessor, CATEGORY_COLUMN, CLASS_COLUMN};
use crate::training::{require_artifact, MlpClassifier};
use chrono::Local;
use polars::prelude::*;
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::info;

/// One scanned sample
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScanRecord {
    /// Local time of the scan, `%Y-%m-%d %H:%M:%S`
    pub timestamp: String,
    /// Row index within the scanned batch
    pub sample_id: usize,
    /// `"Malware"` or `"Benign"`
    pub status: String,
    /// Decoded malware family for malicious rows, `"N/A"` otherwise
    #[serde(rename = "type")]
    pub malware_type: String,
    /// Max ensemble class probability, as a percentage
    pub confidence: f64,
    /// Isolation-forest decision value; negative means anomalous
    pub anomaly_score: f64,
    pub is_anomaly: bool,
}

impl ScanRecord {
    pub fn is_malware(&self) -> bool {
        self.status == "Malware"
    }
}

/// Scans feature rows with the persisted model artifacts
pub struct ScanEngine {
    preprocessor: DatasetPreprocessor,
    ensemble: VotingEnsemble,
    detector: IsolationForest,
    multiclass: MlpClassifier,
}

impl ScanEngine {
    /// Load the scan artifacts from a registry directory. A missing artifact
    /// is reported by name with train-first guidance.
    pub fn from_registry(
        preprocessor: DatasetPreprocessor,
        registry_dir: impl AsRef<Path>,
    ) -> Result<Self> {
        let dir = registry_dir.as_ref();
        let ensemble = VotingEnsemble::load(require_artifact(dir, "ensemble.json")?)?;
        let detector = IsolationForest::load(require_artifact(dir, "anomaly_detector.json")?)?;
        let multiclass = MlpClassifier::load(require_artifact(dir, "mlp_multiclass.json")?)?;
        Ok(Self {
            preprocessor,
            ensemble,
            detector,
            multiclass,
        })
    }

    /// Assemble an engine from already-loaded parts
    pub fn new(
        preprocessor: DatasetPreprocessor,
        ensemble: VotingEnsemble,
        detector: IsolationForest,
        multiclass: MlpClassifier,
    ) -> Self {
        Self {
            preprocessor,
            ensemble,
            detector,
            multiclass,
        }
    }

    /// Scan every row of the frame. Label columns are dropped if present,
    /// the rest is transformed through the fitted preprocessor. An empty
    /// frame scans to an empty Vec.
    pub fn scan(&self, df: &DataFrame) -> Result<Vec<ScanRecord>> {
        if df.height() == 0 {
            return Ok(Vec::new());
        }

        let mut features = df.clone();
        for label in [CLASS_COLUMN, CATEGORY_COLUMN] {
            if features.get_column_names_str().contains(&label) {
                features = features.drop(label)?;
            }
        }

        let x = self.preprocessor.transform(&features)?;
        let probs = self.ensemble.predict_proba(&x)?;
        let preds = self.ensemble.predict(&x)?;
        let scores = self.detector.decision_function(&x)?;
        let family_codes = self.multiclass.predict(&x)?;

        let timestamp = Local::now().format("%Y-%m-%d %H:%M:%S").to_string();
        let mut records = Vec::with_capacity(x.nrows());
        for i in 0..x.nrows() {
            let is_malware = preds[i] == 1;
            let malware_type = if is_malware {
                self.preprocessor
                    .family_encoder()
                    .inverse(family_codes[i])?
                    .to_string()
            } else {
                "N/A".to_string()
            };
            let confidence = probs.row(i).iter().fold(f64::MIN, |a, &b| a.max(b)) * 100.0;
            let anomaly_score = scores[i];

            records.push(ScanRecord {
                timestamp: timestamp.clone(),
                sample_id: i,
                status: if is_malware { "Malware" } else { "Benign" }.to_string(),
                malware_type,
                confidence,
                anomaly_score,
                is_anomaly: anomaly_score < 0.0,
            });
        }

        info!(
            scanned = records.len(),
            malware = records.iter().filter(|r| r.is_malware()).count(),
            anomalies = records.iter().filter(|r| r.is_anomaly).count(),
            "scan complete"
        );
        Ok(records)
    }
}
