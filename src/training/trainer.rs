//! High-level trainer
//!
//! Fits the supervised models and the anomaly detector on a prepared split,
//! evaluates them on the held-out partition, and persists every fitted
//! artifact as a JSON file under a registry directory with a fixed name per
//! model.

use crate::anomaly::IsolationForest;
use crate::ensemble::VotingEnsemble;
use crate::error::{Result, SentinelError};
use crate::preprocessing::SplitDataset;
use crate::training::metrics::{ClassificationMetrics, MulticlassMetrics};
use crate::training::{
    DecisionTreeClassifier, LogisticRegression, MlpClassifier, MlpConfig, RandomForestClassifier,
    RandomSearch,
};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Instant;
use tracing::{info, warn};

/// Registry file name per artifact
pub const ARTIFACT_NAMES: &[&str] = &[
    "logistic_regression.json",
    "decision_tree.json",
    "random_forest.json",
    "mlp_optimized.json",
    "mlp_multiclass.json",
    "ensemble.json",
    "anomaly_detector.json",
];

/// Which model families to train
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ModelSelection {
    /// Logistic regression, decision tree, random forest
    Base,
    /// Tuned MLP, multiclass MLP, ensemble, anomaly detector
    Advanced,
    /// Everything
    All,
}

/// Evaluation result for one trained model
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum ModelReport {
    Binary(ClassificationMetrics),
    Multiclass(MulticlassMetrics),
    /// The anomaly detector has no labeled evaluation; reports the fraction
    /// of held-out samples flagged anomalous
    Anomaly { flagged_fraction: f64 },
}

/// Trains, evaluates and persists the model lineup
#[derive(Debug, Clone)]
pub struct ModelTrainer {
    registry_dir: PathBuf,
    seed: u64,
    reports: BTreeMap<String, ModelReport>,
}

impl ModelTrainer {
    pub fn new(registry_dir: impl Into<PathBuf>) -> Self {
        Self {
            registry_dir: registry_dir.into(),
            seed: 42,
            reports: BTreeMap::new(),
        }
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    /// Train the selected model families on the split and persist every
    /// fitted artifact. Returns the per-model evaluation reports.
    pub fn train(
        &mut self,
        split: &SplitDataset,
        selection: ModelSelection,
    ) -> Result<&BTreeMap<String, ModelReport>> {
        std::fs::create_dir_all(&self.registry_dir)?;

        if matches!(selection, ModelSelection::Base | ModelSelection::All) {
            self.train_base(split)?;
        }
        if matches!(selection, ModelSelection::Advanced | ModelSelection::All) {
            self.train_advanced(split)?;
        }
        Ok(&self.reports)
    }

    fn train_base(&mut self, split: &SplitDataset) -> Result<()> {
        let y_train = split.class_train()?;
        let y_test = split.class_test()?;

        info!("training logistic regression");
        let start = Instant::now();
        let mut logistic = LogisticRegression::new();
        logistic.fit(&split.x_train, y_train)?;
        let pred = logistic.predict(&split.x_test)?;
        let metrics = ClassificationMetrics::compute(y_test, &pred)?
            .with_training_time(start.elapsed().as_secs_f64());
        logistic.save(self.artifact_path("logistic_regression.json"))?;
        self.reports
            .insert("logistic_regression".into(), ModelReport::Binary(metrics));

        info!("training decision tree");
        let start = Instant::now();
        let mut tree = DecisionTreeClassifier::new().with_seed(self.seed);
        tree.fit(&split.x_train, y_train)?;
        let pred = tree.predict(&split.x_test)?;
        let metrics = ClassificationMetrics::compute(y_test, &pred)?
            .with_training_time(start.elapsed().as_secs_f64());
        tree.save(self.artifact_path("decision_tree.json"))?;
        self.reports
            .insert("decision_tree".into(), ModelReport::Binary(metrics));

        info!("training random forest");
        let start = Instant::now();
        let mut forest = RandomForestClassifier::new(100).with_seed(self.seed);
        forest.fit(&split.x_train, y_train)?;
        let pred = forest.predict(&split.x_test)?;
        let metrics = ClassificationMetrics::compute(y_test, &pred)?
            .with_training_time(start.elapsed().as_secs_f64());
        forest.save(self.artifact_path("random_forest.json"))?;
        self.reports
            .insert("random_forest".into(), ModelReport::Binary(metrics));

        Ok(())
    }

    fn train_advanced(&mut self, split: &SplitDataset) -> Result<()> {
        let y_train = split.class_train()?;
        let y_test = split.class_test()?;

        info!("running hyperparameter search for the tuned MLP");
        let start = Instant::now();
        let search = RandomSearch::new().with_seed(self.seed);
        let (mlp_optimized, _candidates) = search.run(&split.x_train, y_train)?;
        let pred = mlp_optimized.predict(&split.x_test)?;
        let metrics = ClassificationMetrics::compute(y_test, &pred)?
            .with_training_time(start.elapsed().as_secs_f64());
        mlp_optimized.save(self.artifact_path("mlp_optimized.json"))?;
        self.reports
            .insert("mlp_optimized".into(), ModelReport::Binary(metrics));

        self.train_multiclass(split)?;

        info!("training voting ensemble");
        let start = Instant::now();
        let mut ensemble = VotingEnsemble::new(self.seed);
        ensemble.fit(&split.x_train, y_train)?;
        let pred = ensemble.predict(&split.x_test)?;
        let metrics = ClassificationMetrics::compute(y_test, &pred)?
            .with_training_time(start.elapsed().as_secs_f64());
        ensemble.save(self.artifact_path("ensemble.json"))?;
        self.reports
            .insert("ensemble".into(), ModelReport::Binary(metrics));

        info!("training anomaly detector");
        let mut detector = IsolationForest::new().with_seed(self.seed);
        detector.fit(&split.x_train)?;
        let flagged = detector
            .predict(&split.x_test)?
            .iter()
            .filter(|&&p| p == -1)
            .count();
        let flagged_fraction = flagged as f64 / split.x_test.nrows().max(1) as f64;
        detector.save(self.artifact_path("anomaly_detector.json"))?;
        self.reports.insert(
            "anomaly_detector".into(),
            ModelReport::Anomaly { flagged_fraction },
        );

        Ok(())
    }

    /// Multiclass family model; skipped with a warning when the dataset
    /// carries no family labels
    fn train_multiclass(&mut self, split: &SplitDataset) -> Result<()> {
        let (y_train, y_test) = match (&split.y_family_train, &split.y_family_test) {
            (Some(train), Some(test)) => (train, test),
            _ => {
                warn!("no family labels present, skipping multiclass MLP");
                return Ok(());
            }
        };

        info!("training multiclass MLP");
        let start = Instant::now();
        let mut mlp = MlpClassifier::new(MlpConfig {
            hidden_layers: vec![100, 50],
            max_iter: 500,
            seed: Some(self.seed),
            ..Default::default()
        });
        mlp.fit(&split.x_train, y_train)?;
        let pred = mlp.predict(&split.x_test)?;
        let n_classes = mlp.classes().len();
        let metrics = MulticlassMetrics::compute(y_test, &pred, n_classes)?
            .with_training_time(start.elapsed().as_secs_f64());
        mlp.save(self.artifact_path("mlp_multiclass.json"))?;
        self.reports
            .insert("mlp_multiclass".into(), ModelReport::Multiclass(metrics));
        Ok(())
    }

    /// Evaluation reports accumulated so far
    pub fn reports(&self) -> &BTreeMap<String, ModelReport> {
        &self.reports
    }

    /// Which registry artifacts exist on disk
    pub fn registry_status(&self) -> Vec<(String, bool)> {
        registry_status(&self.registry_dir)
    }

    fn artifact_path(&self, name: &str) -> PathBuf {
        self.registry_dir.join(name)
    }
}

/// Presence of each known artifact under a registry directory
pub fn registry_status(registry_dir: impl AsRef<Path>) -> Vec<(String, bool)> {
    let dir = registry_dir.as_ref();
    ARTIFACT_NAMES
        .iter()
        .map(|name| ((*name).to_string(), dir.join(name).is_file()))
        .collect()
}

/// Resolve an artifact path, producing the train-first error when absent
pub fn require_artifact(registry_dir: impl AsRef<Path>, name: &str) -> Result<PathBuf> {
    let path = registry_dir.as_ref().join(name);
    if !path.is_file() {
        return Err(SentinelError::ModelNotFound(name.to_string()));
    }
    Ok(path)
}
