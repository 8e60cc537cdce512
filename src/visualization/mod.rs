//! Visualization data
//!
//! Produces the numeric projections the dashboards plot; no rendering here.

pub mod pca;

pub use pca::{Pca, PcaConfig, PcaResult};
