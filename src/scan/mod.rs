//! Threat scanning
//!
//! The scan engine runs new feature rows through the persisted models; the
//! history store keeps every produced record on disk.

pub mod engine;
pub mod history;

pub use engine::{ScanEngine, ScanRecord};
pub use history::ScanHistory;
