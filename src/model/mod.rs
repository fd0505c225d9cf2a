//! Model definitions for Brunata consumption data and InfluxDB data points.
//!
//! This module provides the core data structures for the provider's nested
//! time series, the reduction to one value per category, and the snapshot
//! handed downstream.

pub mod dataset;
pub mod extractor;
pub mod metrics;
pub mod snapshot;
pub mod traits;
pub mod types;

// Re-export commonly used items at the module level
pub use dataset::{ConsumptionDataset, ConsumptionPayload, MeterSeries, MeterSet};
pub use extractor::{latest_value, latest_value_with};
pub use metrics::ConsumptionMetric;
pub use snapshot::{ConsumptionSnapshot, MetricMapping};
pub use traits::{DataPointBuilder, SnapshotSink};
pub use types::{Category, Granularity, Measurement, TieBreak};
