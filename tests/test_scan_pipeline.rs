//! Integration test: train, persist, scan, history

use memsentinel::error::SentinelError;
use memsentinel::preprocessing::DatasetPreprocessor;
use memsentinel::scan::{ScanEngine, ScanHistory};
use memsentinel::training::{ModelSelection, ModelTrainer};
use polars::prelude::*;
use std::io::Write;
use std::path::{Path, PathBuf};

fn write_labeled_csv(dir: &Path) -> PathBuf {
    let path = dir.join("malmem.csv");
    let mut f = std::fs::File::create(&path).unwrap();
    writeln!(f, "pslist.nproc,dlllist.ndlls,handles.nhandles,Category,Class").unwrap();
    for i in 0..20 {
        writeln!(f, "{},{},{},Benign,Benign", 40 + i % 5, 300 + i, 8000 + i * 10).unwrap();
    }
    for i in 0..10 {
        writeln!(
            f,
            "{},{},{},Ransomware-Ako-x{i},Malware",
            125 + i,
            920 + i * 2,
            21500 + i * 20
        )
        .unwrap();
    }
    for i in 0..10 {
        writeln!(
            f,
            "{},{},{},Trojan-Emotet-z{i},Malware",
            145 + i,
            990 + i * 2,
            23500 + i * 20
        )
        .unwrap();
    }
    path
}

/// Train everything into a registry and return the fitted preprocessor
fn trained_registry(dir: &Path) -> (DatasetPreprocessor, PathBuf) {
    let data = write_labeled_csv(dir);
    let registry = dir.join("models");

    let mut pre = DatasetPreprocessor::new();
    let split = pre.prepare(&data, 0.2, 42).unwrap();
    let mut trainer = ModelTrainer::new(&registry);
    trainer.train(&split, ModelSelection::All).unwrap();
    pre.save(registry.join("preprocessor.json")).unwrap();

    (pre, registry)
}

fn scan_frame() -> DataFrame {
    df! {
        "pslist.nproc" => [42.0, 128.0, 41.0, 148.0],
        "dlllist.ndlls" => [305.0, 925.0, 310.0, 995.0],
        "handles.nhandles" => [8050.0, 21600.0, 8100.0, 23600.0],
    }
    .unwrap()
}

#[test]
fn test_scan_end_to_end() {
    let dir = tempfile::tempdir().unwrap();
    let (_, registry) = trained_registry(dir.path());

    let pre = DatasetPreprocessor::load_fitted(registry.join("preprocessor.json")).unwrap();
    let engine = ScanEngine::from_registry(pre, &registry).unwrap();
    let records = engine.scan(&scan_frame()).unwrap();

    assert_eq!(records.len(), 4);
    for (i, r) in records.iter().enumerate() {
        assert_eq!(r.sample_id, i);
        assert!(r.status == "Malware" || r.status == "Benign");
        assert!((0.0..=100.0).contains(&r.confidence));
        if !r.is_malware() {
            assert_eq!(r.malware_type, "N/A");
        }
        assert_eq!(r.is_anomaly, r.anomaly_score < 0.0);
    }

    // Rows drawn from the training clusters should classify accordingly
    assert_eq!(records[0].status, "Benign");
    assert_eq!(records[1].status, "Malware");
    assert_eq!(records[3].status, "Malware");
}

#[test]
fn test_scan_empty_frame_yields_no_records() {
    let dir = tempfile::tempdir().unwrap();
    let (pre, registry) = trained_registry(dir.path());

    let engine = ScanEngine::from_registry(pre, &registry).unwrap();
    let empty = scan_frame().clear();
    assert!(engine.scan(&empty).unwrap().is_empty());
}

#[test]
fn test_scan_ignores_label_columns() {
    let dir = tempfile::tempdir().unwrap();
    let (pre, registry) = trained_registry(dir.path());
    let engine = ScanEngine::from_registry(pre, &registry).unwrap();

    let mut labeled = scan_frame();
    labeled
        .with_column(Column::new(
            "Class".into(),
            &["Benign", "Malware", "Benign", "Malware"],
        ))
        .unwrap();
    let records = engine.scan(&labeled).unwrap();
    assert_eq!(records.len(), 4);
}

#[test]
fn test_missing_artifact_is_reported_by_name() {
    let dir = tempfile::tempdir().unwrap();
    let (pre, registry) = trained_registry(dir.path());
    std::fs::remove_file(registry.join("ensemble.json")).unwrap();

    let err = ScanEngine::from_registry(pre, &registry).err().unwrap();
    assert!(matches!(err, SentinelError::ModelNotFound(name) if name == "ensemble.json"));
}

#[test]
fn test_history_append_filter_export() {
    let dir = tempfile::tempdir().unwrap();
    let (pre, registry) = trained_registry(dir.path());
    let engine = ScanEngine::from_registry(pre, &registry).unwrap();
    let records = engine.scan(&scan_frame()).unwrap();

    let history_path = dir.path().join("history/scan_history.json");
    let history = ScanHistory::new(&history_path);
    history.append_all(records.clone()).unwrap();
    history.append_all(records.clone()).unwrap();

    let stored = history.load();
    assert_eq!(stored.len(), 8);

    let malware = history.filter_by_status("Malware");
    assert!(malware.iter().all(|r| r.is_malware()));
    assert_eq!(
        malware.len(),
        stored.iter().filter(|r| r.is_malware()).count()
    );

    let out = dir.path().join("history.csv");
    history.export_csv(&out).unwrap();
    let csv = std::fs::read_to_string(&out).unwrap();
    assert!(csv.starts_with("timestamp,sample_id,status,type,confidence,anomaly_score,is_anomaly"));
    assert_eq!(csv.lines().count(), 9);

    history.clear().unwrap();
    assert!(history.load().is_empty());
}

#[test]
fn test_malformed_history_loads_as_empty() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("scan_history.json");
    std::fs::write(&path, "{not valid json").unwrap();

    let history = ScanHistory::new(&path);
    assert!(history.load().is_empty());
}
