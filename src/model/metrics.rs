use crate::error::{Result, StorageError};
use chrono::{DateTime, Local};
use influxdb2::models::DataPoint;

use super::traits::DataPointBuilder;
use super::types::Measurement;

/// One published consumption value.
#[derive(Debug, Clone, PartialEq)]
pub struct ConsumptionMetric {
    /// Published metric name (e.g., "water_usage")
    pub name: String,
    /// Latest reading in the provider's unit
    pub value: f64,
    /// When the refresh cycle produced this value
    pub timestamp: DateTime<Local>,
}

impl DataPointBuilder for ConsumptionMetric {
    fn to_point(&self) -> Result<DataPoint, StorageError> {
        let timestamp = self
            .timestamp
            .timestamp_nanos_opt()
            .ok_or_else(|| StorageError::InvalidDataPoint("Timestamp overflow".to_string()))?;

        DataPoint::builder(Measurement::Consumption.to_string().as_str())
            .tag("metric", self.name.clone())
            .field("value", self.value)
            .timestamp(timestamp)
            .build()
            .map_err(|e| {
                StorageError::InvalidDataPoint(format!("Failed to build ConsumptionMetric: {}", e))
            })
    }
}
