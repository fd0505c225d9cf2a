use crate::error::{Result, StorageError};
use async_trait::async_trait;
use chrono::{DateTime, Local};
use influxdb2::models::DataPoint;

use super::snapshot::ConsumptionSnapshot;

/// Trait for types that can be converted to InfluxDB data points.
///
/// Implementors must be thread-safe (Send + Sync) so snapshots can be
/// handed between tasks.
pub trait DataPointBuilder: Send + Sync {
    /// Converts the metric into an InfluxDB DataPoint.
    ///
    /// # Returns
    /// - `Ok(DataPoint)` if conversion succeeds
    /// - `Err` if the metric data cannot be converted to a valid DataPoint
    fn to_point(&self) -> Result<DataPoint, StorageError>;
}

/// Downstream consumer of refresh results.
///
/// The host loop hands every successful snapshot to one sink; a failed
/// publish is logged and never fails the refresh itself.
#[async_trait]
pub trait SnapshotSink: Send + Sync {
    async fn publish(
        &self,
        snapshot: &ConsumptionSnapshot,
        timestamp: DateTime<Local>,
    ) -> Result<(), StorageError>;
}
