//! CSV loading and export

use crate::data::DatasetCache;
use crate::error::{Result, SentinelError};
use polars::prelude::*;
use std::path::Path;
use std::sync::{Arc, OnceLock};
use tracing::info;

static FRAME_CACHE: OnceLock<DatasetCache<DataFrame>> = OnceLock::new();

/// Load a CSV into a DataFrame, halting when the file does not exist
pub fn load_csv(path: impl AsRef<Path>) -> Result<DataFrame> {
    let path = path.as_ref();
    if !path.exists() {
        return Err(SentinelError::DatasetNotFound(path.to_path_buf()));
    }
    let df = CsvReadOptions::default()
        .with_has_header(true)
        .with_infer_schema_length(Some(100))
        .try_into_reader_with_file_path(Some(path.to_path_buf()))?
        .finish()?;
    info!(
        rows = df.height(),
        columns = df.width(),
        path = %path.display(),
        "loaded dataset"
    );
    Ok(df)
}

/// Load a CSV through the process-wide dataset cache. Repeat reads of an
/// unchanged file share one parsed frame; an edited file is reparsed.
pub fn load_csv_cached(path: impl AsRef<Path>) -> Result<Arc<DataFrame>> {
    FRAME_CACHE
        .get_or_init(|| DatasetCache::new(8))
        .get_or_compute(path, |p| load_csv(p))
}

/// Write a DataFrame to CSV with a header row
pub fn export_csv(df: &mut DataFrame, path: impl AsRef<Path>) -> Result<()> {
    let mut file = std::fs::File::create(path.as_ref())?;
    CsvWriter::new(&mut file)
        .include_header(true)
        .finish(df)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_file_is_a_hard_error() {
        let err = load_csv("/nonexistent/memory_features.csv").unwrap_err();
        assert!(matches!(err, SentinelError::DatasetNotFound(_)));
    }

    #[test]
    fn test_round_trip_through_csv() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("features.csv");

        let mut df = df! {
            "pslist.nproc" => &[42.0, 51.0],
            "Class" => &["Benign", "Malware"],
        }
        .unwrap();
        export_csv(&mut df, &path).unwrap();

        let loaded = load_csv(&path).unwrap();
        assert_eq!(loaded.height(), 2);
        assert_eq!(loaded.width(), 2);
    }

    #[test]
    fn test_cached_loads_share_one_frame() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cached.csv");
        let mut df = df! {
            "pslist.nproc" => &[42.0, 51.0],
            "Class" => &["Benign", "Malware"],
        }
        .unwrap();
        export_csv(&mut df, &path).unwrap();

        let first = load_csv_cached(&path).unwrap();
        let second = load_csv_cached(&path).unwrap();
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(first.height(), 2);
    }
}
