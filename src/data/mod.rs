//! Data access
//!
//! CSV loading/export, the mtime-keyed dataset cache, and search over
//! loaded frames.

pub mod cache;
pub mod loader;
pub mod search;

pub use cache::DatasetCache;
pub use loader::{export_csv, load_csv, load_csv_cached};
pub use search::{DataSearcher, SearchCriterion};
