//! Anomaly detection
//!
//! Isolation-forest scoring for samples that fall outside the training
//! distribution, independent of the supervised classifiers.

mod isolation_forest;

pub use isolation_forest::IsolationForest;
