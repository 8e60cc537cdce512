//! Model training
//!
//! From-scratch classifiers over dense `ndarray` matrices, a seeded random
//! hyperparameter search, evaluation metrics, and the high-level trainer
//! that persists fitted artifacts to the model registry.

pub mod decision_tree;
pub mod logistic;
pub mod metrics;
pub mod mlp;
pub mod random_forest;
pub mod search;
pub mod trainer;

pub use decision_tree::DecisionTreeClassifier;
pub use logistic::LogisticRegression;
pub use metrics::{accuracy, ClassificationMetrics, MulticlassMetrics};
pub use mlp::{Activation, MlpClassifier, MlpConfig};
pub use random_forest::RandomForestClassifier;
pub use search::{stratified_folds, CandidateScore, RandomSearch};
pub use trainer::{
    registry_status, require_artifact, ModelReport, ModelSelection, ModelTrainer, ARTIFACT_NAMES,
};
