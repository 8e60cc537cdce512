//! Preprocessing
//!
//! Everything between a raw memory-forensics CSV and the dense matrices the
//! models consume: label encoding, standardization, the split pipeline, and
//! recursive feature elimination.

pub mod encoder;
pub mod feature_selection;
pub mod pipeline;
pub mod scaler;

pub use encoder::LabelEncoder;
pub use feature_selection::FeatureSelector;
pub use pipeline::{
    malware_type_of, DatasetPreprocessor, ScalePolicy, SplitDataset, CATEGORY_COLUMN, CLASS_COLUMN,
    MALWARE_TYPE_COLUMN,
};
pub use scaler::StandardScaler;
