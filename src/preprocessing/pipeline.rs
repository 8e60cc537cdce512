//! Dataset preprocessing pipeline
//!
//! Turns a raw memory-forensics CSV into model-ready train/test matrices plus
//! the fitted encoders and scaler needed to transform scan-time rows the same
//! way. One preprocessing run fits everything exactly once; the fitted state
//! lives on the [`DatasetPreprocessor`] for the rest of the session.

use crate::error::{Result, SentinelError};
use crate::preprocessing::{LabelEncoder, StandardScaler};
use ndarray::{Array1, Array2, Axis};
use polars::prelude::*;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;
use tracing::{debug, info, warn};

/// Binary target column in the source dataset
pub const CLASS_COLUMN: &str = "Class";
/// Composite category column, e.g. `Ransomware-Ako-<variant>`
pub const CATEGORY_COLUMN: &str = "Category";
/// Derived multiclass column: the Category prefix before the first `-`
pub const MALWARE_TYPE_COLUMN: &str = "MalwareType";

/// Where the standardization statistics come from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ScalePolicy {
    /// Fit the scaler on the full feature matrix before splitting.
    ///
    /// This reproduces the original system's output exactly, at the cost of
    /// leaking test-set statistics into the normalization.
    FitFull,
    /// Fit the scaler on the training partition only (leak-free).
    TrainOnly,
}

impl Default for ScalePolicy {
    fn default() -> Self {
        ScalePolicy::FitFull
    }
}

/// Six aligned partitions from one stratified split.
///
/// Row i of `x_train` corresponds to row i of `y_class_train` and
/// `y_family_train`; likewise for the test partitions. The label vectors are
/// `None` when the source frame lacked the corresponding column.
#[derive(Debug, Clone)]
pub struct SplitDataset {
    pub x_train: Array2<f64>,
    pub x_test: Array2<f64>,
    pub y_class_train: Option<Array1<u32>>,
    pub y_class_test: Option<Array1<u32>>,
    pub y_family_train: Option<Array1<u32>>,
    pub y_family_test: Option<Array1<u32>>,
    pub feature_names: Vec<String>,
}

impl SplitDataset {
    /// Total number of rows across both partitions
    pub fn n_samples(&self) -> usize {
        self.x_train.nrows() + self.x_test.nrows()
    }

    /// Binary train targets, or a clear error for binary-only consumers
    pub fn class_train(&self) -> Result<&Array1<u32>> {
        self.y_class_train.as_ref().ok_or_else(|| {
            SentinelError::PreprocessingError(format!(
                "dataset has no '{CLASS_COLUMN}' column; binary classification is unavailable"
            ))
        })
    }

    /// Binary test targets, or a clear error for binary-only consumers
    pub fn class_test(&self) -> Result<&Array1<u32>> {
        self.y_class_test.as_ref().ok_or_else(|| {
            SentinelError::PreprocessingError(format!(
                "dataset has no '{CLASS_COLUMN}' column; binary classification is unavailable"
            ))
        })
    }
}

/// Loads, encodes, scales, and splits the labeled dataset.
///
/// Fitted encoders and the scaler are retained so later scan-time rows can be
/// transformed with the exact parameters the models were trained on.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatasetPreprocessor {
    scale_policy: ScalePolicy,
    class_encoder: LabelEncoder,
    family_encoder: LabelEncoder,
    scaler: StandardScaler,
    feature_names: Vec<String>,
}

impl DatasetPreprocessor {
    /// Create a preprocessor with the default (source-compatible) scale policy
    pub fn new() -> Self {
        Self::with_scale_policy(ScalePolicy::default())
    }

    /// Create a preprocessor with an explicit scale policy
    pub fn with_scale_policy(scale_policy: ScalePolicy) -> Self {
        Self {
            scale_policy,
            class_encoder: LabelEncoder::new(),
            family_encoder: LabelEncoder::new(),
            scaler: StandardScaler::new(),
            feature_names: Vec::new(),
        }
    }

    /// Load the dataset CSV. Fails fast when the file does not exist.
    pub fn load(&self, path: impl AsRef<Path>) -> Result<DataFrame> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(SentinelError::DatasetNotFound(path.to_path_buf()));
        }

        let df = CsvReadOptions::default()
            .with_infer_schema_length(Some(100))
            .with_has_header(true)
            .try_into_reader_with_file_path(Some(path.to_path_buf()))?
            .finish()?;

        info!(rows = df.height(), cols = df.width(), path = %path.display(), "dataset loaded");
        Ok(df)
    }

    /// Derive and encode the label columns.
    ///
    /// If `Category` is present: compute `MalwareType` as the substring before
    /// the first `-` (the whole string when no `-`), fit the family encoder
    /// over the distinct values, replace the column with integer codes, then
    /// drop `Category`. If `Class` is present, fit the binary encoder and
    /// replace the column with codes. The two paths are independent.
    pub fn derive_labels(&mut self, df: &DataFrame) -> Result<DataFrame> {
        let mut out = df.clone();

        if let Ok(category) = df.column(CATEGORY_COLUMN) {
            let families: Vec<String> = category
                .str()?
                .into_iter()
                .map(|opt| {
                    let raw = opt.unwrap_or("");
                    malware_type_of(raw).to_string()
                })
                .collect();

            let codes = self.family_encoder.fit_transform(&families)?;
            debug!(classes = ?self.family_encoder.classes(), "malware families encoded");

            out.with_column(Column::new(MALWARE_TYPE_COLUMN.into(), codes))?;
            out = out.drop(CATEGORY_COLUMN)?;
        }

        if let Ok(class) = df.column(CLASS_COLUMN) {
            let labels = column_as_strings(class)?;
            let codes = self.class_encoder.fit_transform(&labels)?;
            out.with_column(Column::new(CLASS_COLUMN.into(), codes))?;
        } else {
            warn!("dataset has no '{CLASS_COLUMN}' column; binary labels will be absent");
        }

        Ok(out)
    }

    /// Scale the features and produce one stratified train/test split.
    ///
    /// Stratification keys on the binary label; when it is absent the split
    /// stratifies on the multiclass label, and falls back to a plain seeded
    /// shuffle split when neither label exists. The same row partition is
    /// applied to the features and both label vectors, so all outputs stay
    /// row-aligned.
    pub fn split(&mut self, df: &DataFrame, test_fraction: f64, seed: u64) -> Result<SplitDataset> {
        if !(0.0..1.0).contains(&test_fraction) || test_fraction <= 0.0 {
            return Err(SentinelError::InvalidParameter(format!(
                "test_fraction must be in (0, 1), got {test_fraction}"
            )));
        }

        let y_class = optional_u32_column(df, CLASS_COLUMN)?;
        let y_family = optional_u32_column(df, MALWARE_TYPE_COLUMN)?;

        let feature_names: Vec<String> = df
            .get_column_names()
            .iter()
            .map(|n| n.to_string())
            .filter(|n| n != CLASS_COLUMN && n != MALWARE_TYPE_COLUMN)
            .collect();

        if feature_names.is_empty() {
            return Err(SentinelError::PreprocessingError(
                "dataset has no feature columns".to_string(),
            ));
        }

        let x = frame_to_matrix(df, &feature_names)?;
        let n = x.nrows();
        if n < 2 {
            return Err(SentinelError::PreprocessingError(format!(
                "need at least 2 rows to split, got {n}"
            )));
        }

        // Row partition, stratified where a label is available.
        let strata = y_class.as_ref().or(y_family.as_ref());
        let (train_idx, test_idx) = stratified_partition(n, strata, test_fraction, seed);

        let x_scaled = match self.scale_policy {
            ScalePolicy::FitFull => self.scaler.fit_transform(&x)?,
            ScalePolicy::TrainOnly => {
                let x_train = x.select(Axis(0), &train_idx);
                self.scaler.fit(&x_train)?;
                self.scaler.transform(&x)?
            }
        };

        self.feature_names = feature_names.clone();

        let take = |y: &Option<Array1<u32>>, idx: &[usize]| -> Option<Array1<u32>> {
            y.as_ref().map(|v| v.select(Axis(0), idx))
        };

        let split = SplitDataset {
            x_train: x_scaled.select(Axis(0), &train_idx),
            x_test: x_scaled.select(Axis(0), &test_idx),
            y_class_train: take(&y_class, &train_idx),
            y_class_test: take(&y_class, &test_idx),
            y_family_train: take(&y_family, &train_idx),
            y_family_test: take(&y_family, &test_idx),
            feature_names,
        };

        info!(
            train = split.x_train.nrows(),
            test = split.x_test.nrows(),
            features = split.feature_names.len(),
            "dataset split"
        );
        Ok(split)
    }

    /// Run the full pipeline: load, derive labels, split.
    pub fn prepare(
        &mut self,
        path: impl AsRef<Path>,
        test_fraction: f64,
        seed: u64,
    ) -> Result<SplitDataset> {
        let df = self.load(path)?;
        let encoded = self.derive_labels(&df)?;
        self.split(&encoded, test_fraction, seed)
    }

    /// Transform new (scan-time) rows with the fitted feature set and scaler.
    ///
    /// Columns are selected and ordered by the fitted feature list; a missing
    /// fitted column is an error. Extra columns in the input are ignored.
    pub fn transform(&self, df: &DataFrame) -> Result<Array2<f64>> {
        if self.feature_names.is_empty() {
            return Err(SentinelError::ModelNotFitted);
        }
        let x = frame_to_matrix(df, &self.feature_names)?;
        self.scaler.transform(&x)
    }

    /// Binary label encoder, fitted during [`derive_labels`](Self::derive_labels)
    pub fn class_encoder(&self) -> &LabelEncoder {
        &self.class_encoder
    }

    /// Malware family encoder, fitted during [`derive_labels`](Self::derive_labels)
    pub fn family_encoder(&self) -> &LabelEncoder {
        &self.family_encoder
    }

    /// The fitted standardization transform
    pub fn scaler(&self) -> &StandardScaler {
        &self.scaler
    }

    /// Feature column names in matrix order
    pub fn feature_names(&self) -> &[String] {
        &self.feature_names
    }

    /// Configured scale policy
    pub fn scale_policy(&self) -> ScalePolicy {
        self.scale_policy
    }

    /// Persist the fitted state as pretty JSON
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json)?;
        Ok(())
    }

    /// Restore a fitted preprocessor from a JSON artifact
    pub fn load_fitted(path: impl AsRef<Path>) -> Result<Self> {
        let json = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&json)?)
    }
}

impl Default for DatasetPreprocessor {
    fn default() -> Self {
        Self::new()
    }
}

/// The Category prefix before the first `-`, or the whole string without one.
///
/// Benign rows get whatever their Category string yields; that value carries
/// no meaning and downstream consumers must not interpret it for benign
/// samples.
pub fn malware_type_of(category: &str) -> &str {
    match category.split_once('-') {
        Some((prefix, _)) => prefix,
        None => category,
    }
}

/// Extract a column's values as strings, accepting string or numeric dtypes
fn column_as_strings(column: &Column) -> Result<Vec<String>> {
    let series = column.as_materialized_series();
    if let Ok(ca) = series.str() {
        return Ok(ca
            .into_iter()
            .map(|opt| opt.unwrap_or("").to_string())
            .collect());
    }

    // Numeric labels (already 0/1 in some exports) stringify for encoding
    let casted = series.cast(&DataType::Int64)?;
    let ca = casted.i64()?;
    Ok(ca
        .into_iter()
        .map(|opt| opt.map(|v| v.to_string()).unwrap_or_default())
        .collect())
}

/// Read an integer label column if it exists
fn optional_u32_column(df: &DataFrame, name: &str) -> Result<Option<Array1<u32>>> {
    match df.column(name) {
        Ok(column) => {
            let casted = column.as_materialized_series().cast(&DataType::UInt32)?;
            let values: Vec<u32> = casted
                .u32()?
                .into_iter()
                .map(|opt| opt.unwrap_or(0))
                .collect();
            Ok(Some(Array1::from_vec(values)))
        }
        Err(_) => Ok(None),
    }
}

/// Materialize the named columns into a dense f64 matrix, column order fixed
fn frame_to_matrix(df: &DataFrame, columns: &[String]) -> Result<Array2<f64>> {
    let n_rows = df.height();
    let n_cols = columns.len();
    let mut data = Vec::with_capacity(n_rows * n_cols);

    let mut casted = Vec::with_capacity(n_cols);
    for name in columns {
        let column = df
            .column(name.as_str())
            .map_err(|_| SentinelError::FeatureNotFound(name.clone()))?;
        let series = column.as_materialized_series().cast(&DataType::Float64)?;
        casted.push(series);
    }

    for i in 0..n_rows {
        for series in &casted {
            let v = series.f64()?.get(i).unwrap_or(f64::NAN);
            data.push(v);
        }
    }

    Array2::from_shape_vec((n_rows, n_cols), data).map_err(|e| {
        SentinelError::PreprocessingError(format!("matrix construction failed: {e}"))
    })
}

/// Partition `0..n` into train/test index sets.
///
/// With strata: group row indices per class, shuffle each group with the
/// seeded RNG, take the last `test_fraction` of each group for test. Groups
/// are visited in ascending class order so the same seed always yields the
/// same assignment.
fn stratified_partition(
    n: usize,
    strata: Option<&Array1<u32>>,
    test_fraction: f64,
    seed: u64,
) -> (Vec<usize>, Vec<usize>) {
    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    let mut train = Vec::new();
    let mut test = Vec::new();

    let groups: BTreeMap<u32, Vec<usize>> = match strata {
        Some(y) => {
            let mut groups: BTreeMap<u32, Vec<usize>> = BTreeMap::new();
            for (i, &label) in y.iter().enumerate() {
                groups.entry(label).or_default().push(i);
            }
            groups
        }
        None => {
            let mut single = BTreeMap::new();
            single.insert(0, (0..n).collect());
            single
        }
    };

    for (_, mut indices) in groups {
        indices.shuffle(&mut rng);
        let n_test = ((indices.len() as f64) * test_fraction).round() as usize;
        let n_test = n_test.min(indices.len());
        let cut = indices.len() - n_test;
        test.extend_from_slice(&indices[cut..]);
        train.extend_from_slice(&indices[..cut]);
    }

    train.sort_unstable();
    test.sort_unstable();
    (train, test)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn labeled_frame() -> DataFrame {
        DataFrame::new(vec![
            Column::new("pslist.nproc".into(), &[40.0, 45.0, 120.0, 38.0, 130.0, 44.0]),
            Column::new("dlllist.ndlls".into(), &[300.0, 280.0, 900.0, 310.0, 880.0, 290.0]),
            Column::new(
                "Category".into(),
                &[
                    "Benign",
                    "Benign",
                    "Ransomware-Ako-x1",
                    "Benign",
                    "Trojan-Emotet-z9",
                    "Benign",
                ],
            ),
            Column::new(
                "Class".into(),
                &["Benign", "Benign", "Malware", "Benign", "Malware", "Benign"],
            ),
        ])
        .unwrap()
    }

    #[test]
    fn test_malware_type_prefix_rule() {
        assert_eq!(malware_type_of("Ransomware-Ako-abc123"), "Ransomware");
        assert_eq!(malware_type_of("Benign"), "Benign");
        assert_eq!(malware_type_of("Spyware-"), "Spyware");
        assert_eq!(malware_type_of(""), "");
    }

    #[test]
    fn test_derive_labels_encodes_and_drops_category() {
        let mut pre = DatasetPreprocessor::new();
        let encoded = pre.derive_labels(&labeled_frame()).unwrap();

        assert!(encoded.column(CATEGORY_COLUMN).is_err());
        assert!(encoded.column(MALWARE_TYPE_COLUMN).is_ok());

        // Benign=0, Malware=1 by lexicographic order
        assert_eq!(pre.class_encoder().classes(), &["Benign", "Malware"]);
        // Benign=0, Ransomware=1, Trojan=2
        assert_eq!(
            pre.family_encoder().classes(),
            &["Benign", "Ransomware", "Trojan"]
        );
    }

    #[test]
    fn test_split_partitions_and_alignment() {
        let mut pre = DatasetPreprocessor::new();
        let encoded = pre.derive_labels(&labeled_frame()).unwrap();
        let split = pre.split(&encoded, 0.34, 42).unwrap();

        assert_eq!(split.n_samples(), 6);
        assert_eq!(
            split.x_train.nrows(),
            split.y_class_train.as_ref().unwrap().len()
        );
        assert_eq!(
            split.x_train.nrows(),
            split.y_family_train.as_ref().unwrap().len()
        );
        assert_eq!(
            split.x_test.nrows(),
            split.y_class_test.as_ref().unwrap().len()
        );
        assert_eq!(split.feature_names, vec!["pslist.nproc", "dlllist.ndlls"]);
    }

    #[test]
    fn test_split_is_deterministic() {
        let mut pre_a = DatasetPreprocessor::new();
        let encoded = pre_a.derive_labels(&labeled_frame()).unwrap();
        let split_a = pre_a.split(&encoded, 0.34, 7).unwrap();

        let mut pre_b = DatasetPreprocessor::new();
        let encoded_b = pre_b.derive_labels(&labeled_frame()).unwrap();
        let split_b = pre_b.split(&encoded_b, 0.34, 7).unwrap();

        assert_eq!(split_a.x_train, split_b.x_train);
        assert_eq!(split_a.y_class_test, split_b.y_class_test);
    }

    #[test]
    fn test_split_without_class_column() {
        let df = DataFrame::new(vec![
            Column::new("pslist.nproc".into(), &[1.0, 2.0, 3.0, 4.0, 5.0, 6.0]),
            Column::new(
                "Category".into(),
                &["A-x", "A-y", "B-x", "B-y", "A-z", "B-z"],
            ),
        ])
        .unwrap();

        let mut pre = DatasetPreprocessor::new();
        let encoded = pre.derive_labels(&df).unwrap();
        let split = pre.split(&encoded, 0.34, 42).unwrap();

        assert!(split.y_class_train.is_none());
        assert!(split.y_family_train.is_some());
        assert!(matches!(
            split.class_train(),
            Err(SentinelError::PreprocessingError(_))
        ));
    }

    #[test]
    fn test_transform_requires_fitted_columns() {
        let mut pre = DatasetPreprocessor::new();
        let encoded = pre.derive_labels(&labeled_frame()).unwrap();
        pre.split(&encoded, 0.34, 42).unwrap();

        let missing = DataFrame::new(vec![Column::new(
            "pslist.nproc".into(),
            &[10.0, 20.0],
        )])
        .unwrap();
        assert!(matches!(
            pre.transform(&missing),
            Err(SentinelError::FeatureNotFound(_))
        ));
    }

    #[test]
    fn test_load_missing_file() {
        let pre = DatasetPreprocessor::new();
        assert!(matches!(
            pre.load("/nonexistent/malmem.csv"),
            Err(SentinelError::DatasetNotFound(_))
        ));
    }
}
