use crate::config::InfluxConfig;
use crate::error::StorageError;
use crate::model::{ConsumptionSnapshot, DataPointBuilder, SnapshotSink};
use async_trait::async_trait;
use chrono::{DateTime, Local};
use futures::prelude::stream;
use influxdb2::models::DataPoint;

/// Writes snapshots to an InfluxDB2 bucket, one point per published metric.
pub struct InfluxSink {
    client: influxdb2::Client,
    bucket: String,
}

impl InfluxSink {
    pub(crate) fn new(config: InfluxConfig) -> Self {
        let client = influxdb2::Client::new(config.url, config.org, config.token);
        Self {
            client,
            bucket: config.bucket,
        }
    }

    pub async fn write(&self, points: Vec<DataPoint>) -> Result<(), StorageError> {
        Ok(self
            .client
            .write(self.bucket.as_str(), stream::iter(points))
            .await?)
    }
}

#[async_trait]
impl SnapshotSink for InfluxSink {
    async fn publish(
        &self,
        snapshot: &ConsumptionSnapshot,
        timestamp: DateTime<Local>,
    ) -> Result<(), StorageError> {
        let points = snapshot
            .to_metrics(timestamp)
            .iter()
            .map(|metric| metric.to_point())
            .collect::<Result<Vec<_>, _>>()?;

        if points.is_empty() {
            tracing::debug!("Snapshot has no values, nothing to write");
            return Ok(());
        }
        let count = points.len();
        self.write(points).await?;
        tracing::info!(points = count, bucket = %self.bucket, "Wrote snapshot to InfluxDB");
        Ok(())
    }
}

/// Used when no InfluxDB is configured.
pub struct LogSink;

#[async_trait]
impl SnapshotSink for LogSink {
    async fn publish(
        &self,
        snapshot: &ConsumptionSnapshot,
        timestamp: DateTime<Local>,
    ) -> Result<(), StorageError> {
        tracing::info!(
            at = %timestamp.format("%Y-%m-%dT%H:%M:%S%z"),
            snapshot = %snapshot,
            "Latest consumption"
        );
        Ok(())
    }
}
