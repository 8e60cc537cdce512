//! memsentinel - Memory-forensics malware detection pipeline
//!
//! This crate turns raw memory-dump feature tables (process, DLL, and handle
//! counts extracted from memory images) into trained malware classifiers and
//! scan reports:
//! - Dataset loading, label derivation, encoding, scaling, stratified splits
//! - Native model training (logistic regression, trees, forests, MLP)
//! - Soft-voting ensemble and isolation-forest anomaly scoring
//! - Scan engine with append-only history and HTML/PDF reporting
//!
//! # Modules
//!
//! ## Data
//! - [`data`] - CSV loading, dataset cache, criteria/query search
//! - [`preprocessing`] - Label encoding, standardization, train/test splits, RFE
//!
//! ## Models
//! - [`training`] - Classifiers, metrics, hyperparameter search, the trainer
//! - [`ensemble`] - Soft-voting ensemble over heterogeneous classifiers
//! - [`anomaly`] - Isolation-forest anomaly detection
//!
//! ## Operations
//! - [`scan`] - Scan engine and scan history store
//! - [`report`] - HTML report builder, Markdown parser, PDF renderer
//! - [`visualization`] - PCA projections for dataset exploration
//!
//! ## Services
//! - [`cli`] - Command-line interface

pub mod error;

pub mod data;
pub mod preprocessing;

pub mod training;
pub mod ensemble;
pub mod anomaly;

pub mod scan;
pub mod report;
pub mod visualization;

pub mod cli;

pub use error::{Result, SentinelError};

/// Re-export commonly used types
pub mod prelude {
    pub use crate::error::{Result, SentinelError};

    pub use crate::data::{DataSearcher, DatasetCache, SearchCriterion};
    pub use crate::preprocessing::{
        DatasetPreprocessor, FeatureSelector, LabelEncoder, ScalePolicy, SplitDataset,
        StandardScaler,
    };

    pub use crate::training::{
        ClassificationMetrics, DecisionTreeClassifier, LogisticRegression, MlpClassifier,
        MlpConfig, ModelTrainer, MulticlassMetrics, RandomForestClassifier, RandomSearch,
    };

    pub use crate::anomaly::IsolationForest;
    pub use crate::ensemble::VotingEnsemble;

    pub use crate::scan::{ScanEngine, ScanHistory, ScanRecord};

    pub use crate::report::{HtmlReport, MarkdownDocument, PdfRenderer, ReportDocument};

    pub use crate::visualization::{Pca, PcaConfig, PcaResult};
}
