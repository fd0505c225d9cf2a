//! Builders for datasets used by reduction tests.

use crate::model::{Category, ConsumptionDataset, Granularity, MeterSeries};

/// Builds a [`ConsumptionDataset`] at day granularity, keeping meters in
/// the order they are added.
#[derive(Debug, Default)]
pub struct DatasetBuilder {
    dataset: ConsumptionDataset,
}

impl DatasetBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a meter with the given readings to a category.
    pub fn meter(mut self, category: Category, meter_id: &str, values: &[(&str, f64)]) -> Self {
        let mut meters = self
            .dataset
            .meters(category, Granularity::Day)
            .cloned()
            .unwrap_or_default();
        meters.push(MeterSeries {
            meter_id: meter_id.to_string(),
            name: format!("Meter {}", meter_id),
            values: values
                .iter()
                .map(|(date, value)| (date.to_string(), *value))
                .collect(),
        });
        self.dataset.insert(category, Granularity::Day, meters);
        self
    }

    /// Adds a category whose day granularity holds no meters.
    pub fn empty(mut self, category: Category) -> Self {
        self.dataset.insert(category, Granularity::Day, Vec::new());
        self
    }

    pub fn build(self) -> ConsumptionDataset {
        self.dataset
    }
}
