//! Integration test: training pipeline end-to-end

use memsentinel::preprocessing::{DatasetPreprocessor, SplitDataset};
use memsentinel::training::{
    registry_status, require_artifact, ModelReport, ModelSelection, ModelTrainer, ARTIFACT_NAMES,
};
use ndarray::{Array1, Array2};

/// Separable two-cluster split with binary and family labels
fn separable_split() -> SplitDataset {
    let mut x_train = Vec::new();
    let mut y_class = Vec::new();
    let mut y_family = Vec::new();
    for i in 0..30 {
        let jitter = (i % 5) as f64 * 0.15;
        if i < 15 {
            x_train.extend_from_slice(&[-2.0 + jitter, -2.5 - jitter, -1.8]);
            y_class.push(0);
            y_family.push(0);
        } else {
            x_train.extend_from_slice(&[2.0 - jitter, 2.5 + jitter, 1.8]);
            y_class.push(1);
            y_family.push(if i % 2 == 0 { 1 } else { 2 });
        }
    }
    let x_test = vec![
        -2.2, -2.4, -1.9, //
        -1.7, -2.6, -1.6, //
        2.2, 2.4, 1.9, //
        1.7, 2.6, 1.6,
    ];
    SplitDataset {
        x_train: Array2::from_shape_vec((30, 3), x_train).unwrap(),
        x_test: Array2::from_shape_vec((4, 3), x_test).unwrap(),
        y_class_train: Some(Array1::from_vec(y_class)),
        y_class_test: Some(Array1::from_vec(vec![0, 0, 1, 1])),
        y_family_train: Some(Array1::from_vec(y_family)),
        y_family_test: Some(Array1::from_vec(vec![0, 0, 1, 2])),
        feature_names: vec!["f0".into(), "f1".into(), "f2".into()],
    }
}

#[test]
fn test_all_selection_persists_every_artifact() {
    let dir = tempfile::tempdir().unwrap();
    let mut trainer = ModelTrainer::new(dir.path());
    let reports = trainer.train(&separable_split(), ModelSelection::All).unwrap().clone();

    for name in ARTIFACT_NAMES {
        assert!(dir.path().join(name).is_file(), "{name} missing");
    }
    assert!(registry_status(dir.path()).iter().all(|(_, present)| *present));

    // Separable clusters: every binary model should classify the held-out
    // rows correctly
    for (name, report) in &reports {
        if let ModelReport::Binary(metrics) = report {
            assert!(
                metrics.accuracy >= 0.75,
                "{name} accuracy {} too low",
                metrics.accuracy
            );
        }
    }
    assert!(reports.contains_key("ensemble"));
    assert!(reports.contains_key("anomaly_detector"));
    assert!(reports.contains_key("mlp_multiclass"));
}

#[test]
fn test_advanced_skips_multiclass_without_family_labels() {
    let mut split = separable_split();
    split.y_family_train = None;
    split.y_family_test = None;

    let dir = tempfile::tempdir().unwrap();
    let mut trainer = ModelTrainer::new(dir.path());
    let reports = trainer.train(&split, ModelSelection::Advanced).unwrap();

    assert!(!reports.contains_key("mlp_multiclass"));
    assert!(!dir.path().join("mlp_multiclass.json").exists());
    assert!(dir.path().join("ensemble.json").is_file());
}

#[test]
fn test_require_artifact_on_untrained_registry() {
    let dir = tempfile::tempdir().unwrap();
    let err = require_artifact(dir.path(), "random_forest.json").unwrap_err();
    let msg = err.to_string();
    assert!(msg.contains("random_forest.json"));
    assert!(msg.contains("run training first"));
}

#[test]
fn test_trained_models_reload_and_agree() {
    use memsentinel::training::RandomForestClassifier;

    let dir = tempfile::tempdir().unwrap();
    let split = separable_split();
    let mut trainer = ModelTrainer::new(dir.path());
    trainer.train(&split, ModelSelection::Base).unwrap();

    let forest =
        RandomForestClassifier::load(dir.path().join("random_forest.json")).unwrap();
    let pred = forest.predict(&split.x_test).unwrap();
    assert_eq!(pred.len(), 4);
    assert_eq!(pred[0], 0);
    assert_eq!(pred[3], 1);
}

#[test]
fn test_prepared_split_feeds_the_trainer() {
    use std::io::Write;

    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("malmem.csv");
    let mut f = std::fs::File::create(&path).unwrap();
    writeln!(f, "pslist.nproc,dlllist.ndlls,Category,Class").unwrap();
    for i in 0..15 {
        writeln!(f, "{},{},Benign,Benign", 40 + i % 4, 300 + i).unwrap();
    }
    for i in 0..15 {
        writeln!(f, "{},{},Trojan-Emotet-x{i},Malware", 130 + i, 900 + i).unwrap();
    }
    drop(f);

    let mut pre = DatasetPreprocessor::new();
    let split = pre.prepare(&path, 0.2, 42).unwrap();

    let registry = dir.path().join("models");
    let mut trainer = ModelTrainer::new(&registry);
    let reports = trainer.train(&split, ModelSelection::Base).unwrap();
    assert_eq!(reports.len(), 3);
}
