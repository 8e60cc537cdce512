//! Scan history store
//!
//! Persists scan records as one JSON array on disk. Reads are forgiving: a
//! missing file is an empty history, and a malformed file is discarded as
//! empty with a warning. Writes rewrite the array wholesale behind a
//! process-wide lock; concurrent writers from separate processes are not
//! supported.

use crate::error::Result;
use crate::scan::ScanRecord;
use parking_lot::Mutex;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

static WRITE_LOCK: Mutex<()> = Mutex::new(());

/// JSON-array scan history at a fixed path
pub struct ScanHistory {
    path: PathBuf,
}

impl ScanHistory {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// All stored records. Missing file → empty; malformed JSON → warn and
    /// treat as empty.
    pub fn load(&self) -> Vec<ScanRecord> {
        let raw = match std::fs::read_to_string(&self.path) {
            Ok(raw) => raw,
            Err(_) => return Vec::new(),
        };
        match serde_json::from_str(&raw) {
            Ok(records) => records,
            Err(e) => {
                warn!(path = %self.path.display(), error = %e, "malformed history file, treating as empty");
                Vec::new()
            }
        }
    }

    /// Append one record
    pub fn append(&self, record: ScanRecord) -> Result<()> {
        self.append_all(std::iter::once(record))
    }

    /// Append a batch of records in one rewrite
    pub fn append_all(&self, records: impl IntoIterator<Item = ScanRecord>) -> Result<()> {
        let _guard = WRITE_LOCK.lock();
        let mut all = self.load();
        all.extend(records);
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        std::fs::write(&self.path, serde_json::to_string_pretty(&all)?)?;
        info!(total = all.len(), "history updated");
        Ok(())
    }

    /// Remove the history file
    pub fn clear(&self) -> Result<()> {
        let _guard = WRITE_LOCK.lock();
        if self.path.exists() {
            std::fs::remove_file(&self.path)?;
        }
        Ok(())
    }

    /// Records whose status matches exactly
    pub fn filter_by_status(&self, status: &str) -> Vec<ScanRecord> {
        self.load()
            .into_iter()
            .filter(|r| r.status == status)
            .collect()
    }

    /// Export the stored records as CSV
    pub fn export_csv(&self, out: impl AsRef<Path>) -> Result<()> {
        let records = self.load();
        let mut writer = csv::Writer::from_path(out.as_ref())?;
        writer.write_record([
            "timestamp",
            "sample_id",
            "status",
            "type",
            "confidence",
            "anomaly_score",
            "is_anomaly",
        ])?;
        for r in &records {
            writer.write_record([
                r.timestamp.as_str(),
                &r.sample_id.to_string(),
                r.status.as_str(),
                r.malware_type.as_str(),
                &format!("{:.4}", r.confidence),
                &format!("{:.6}", r.anomaly_score),
                &r.is_anomaly.to_string(),
            ])?;
        }
        writer.flush()?;
        Ok(())
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(id: usize, status: &str) -> ScanRecord {
        ScanRecord {
            timestamp: "2026-08-29 09:30:00".to_string(),
            sample_id: id,
            status: status.to_string(),
            malware_type: if status == "Malware" {
                "Trojan".to_string()
            } else {
                "N/A".to_string()
            },
            confidence: 88.0,
            anomaly_score: 0.01,
            is_anomaly: false,
        }
    }

    #[test]
    fn test_missing_file_is_empty_history() {
        let dir = tempfile::tempdir().unwrap();
        let history = ScanHistory::new(dir.path().join("history.json"));
        assert!(history.load().is_empty());
    }

    #[test]
    fn test_append_accumulates() {
        let dir = tempfile::tempdir().unwrap();
        let history = ScanHistory::new(dir.path().join("history.json"));

        history.append(record(0, "Benign")).unwrap();
        history
            .append_all([record(1, "Malware"), record(2, "Benign")])
            .unwrap();

        let all = history.load();
        assert_eq!(all.len(), 3);
        assert_eq!(all[1].sample_id, 1);
        assert_eq!(history.filter_by_status("Malware").len(), 1);
    }

    #[test]
    fn test_malformed_file_treated_as_empty() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("history.json");
        std::fs::write(&path, "{not valid json").unwrap();

        let history = ScanHistory::new(&path);
        assert!(history.load().is_empty());

        // Appending over garbage starts a fresh array
        history.append(record(0, "Benign")).unwrap();
        assert_eq!(history.load().len(), 1);
    }

    #[test]
    fn test_clear_removes_file() {
        let dir = tempfile::tempdir().unwrap();
        let history = ScanHistory::new(dir.path().join("history.json"));
        history.append(record(0, "Benign")).unwrap();
        history.clear().unwrap();
        assert!(!history.path().exists());
        assert!(history.load().is_empty());
    }

    #[test]
    fn test_csv_export_has_header_and_rows() {
        let dir = tempfile::tempdir().unwrap();
        let history = ScanHistory::new(dir.path().join("history.json"));
        history
            .append_all([record(0, "Malware"), record(1, "Benign")])
            .unwrap();

        let out = dir.path().join("history.csv");
        history.export_csv(&out).unwrap();
        let text = std::fs::read_to_string(&out).unwrap();
        assert!(text.starts_with("timestamp,sample_id,status,type,"));
        assert_eq!(text.lines().count(), 3);
    }
}
