//! Report configuration: status mapping, grouping, thresholds.

pub mod loader;
pub mod types;

pub use loader::load;
pub use types::{GroupBy, HierarchyConfig, ReportConfig, StatusMapping};
