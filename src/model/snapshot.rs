use chrono::{DateTime, Local};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use super::dataset::ConsumptionDataset;
use super::extractor::latest_value_with;
use super::metrics::ConsumptionMetric;
use super::traits::DataPointBuilder;
use super::types::{Category, TieBreak};

/// Which provider category feeds which published metric.
///
/// Parsed from `metric=Category` pairs separated by commas, e.g.
/// `water_usage=Water,electricity_usage=Other`.
#[derive(Debug, Clone, PartialEq)]
pub struct MetricMapping {
    entries: Vec<(String, Category)>,
}

impl MetricMapping {
    pub fn new(entries: Vec<(String, Category)>) -> Self {
        Self { entries }
    }

    pub fn entries(&self) -> &[(String, Category)] {
        &self.entries
    }
}

impl Default for MetricMapping {
    fn default() -> Self {
        Self::new(vec![
            ("water_usage".to_string(), Category::Water),
            ("electricity_usage".to_string(), Category::Other),
        ])
    }
}

impl FromStr for MetricMapping {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut entries: Vec<(String, Category)> = Vec::new();
        for pair in s.split(',').map(str::trim).filter(|p| !p.is_empty()) {
            let (metric, category) = pair
                .split_once('=')
                .ok_or_else(|| format!("expected metric=Category, got '{}'", pair))?;
            let metric = metric.trim();
            if metric.is_empty() {
                return Err(format!("empty metric name in '{}'", pair));
            }
            if entries.iter().any(|(name, _)| name == metric) {
                return Err(format!("metric '{}' mapped twice", metric));
            }
            entries.push((metric.to_string(), category.parse()?));
        }
        if entries.is_empty() {
            return Err("no metrics mapped".to_string());
        }
        Ok(Self::new(entries))
    }
}

impl fmt::Display for MetricMapping {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let pairs: Vec<String> = self
            .entries
            .iter()
            .map(|(metric, category)| format!("{}={}", metric, category))
            .collect();
        write!(f, "{}", pairs.join(","))
    }
}

/// Published values of one refresh cycle. `None` means no data.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ConsumptionSnapshot {
    values: BTreeMap<String, Option<f64>>,
}

impl ConsumptionSnapshot {
    /// Reduces a dataset to one value per mapped metric.
    pub fn from_dataset(
        dataset: &ConsumptionDataset,
        mapping: &MetricMapping,
        tie_break: &TieBreak,
    ) -> Self {
        let values = mapping
            .entries()
            .iter()
            .map(|(metric, category)| {
                (
                    metric.clone(),
                    latest_value_with(dataset, *category, tie_break),
                )
            })
            .collect();
        Self { values }
    }

    pub fn get(&self, metric: &str) -> Option<f64> {
        self.values.get(metric).copied().flatten()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, Option<f64>)> {
        self.values.iter().map(|(k, v)| (k.as_str(), *v))
    }

    /// Data points for every metric that has a value.
    pub fn to_metrics(&self, timestamp: DateTime<Local>) -> Vec<Box<dyn DataPointBuilder>> {
        self.values
            .iter()
            .filter_map(|(metric, value)| {
                value.map(|value| {
                    Box::new(ConsumptionMetric {
                        name: metric.clone(),
                        value,
                        timestamp,
                    }) as Box<dyn DataPointBuilder>
                })
            })
            .collect()
    }
}

impl fmt::Display for ConsumptionSnapshot {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let pairs: Vec<String> = self
            .values
            .iter()
            .map(|(metric, value)| match value {
                Some(v) => format!("{}={}", metric, v),
                None => format!("{}=none", metric),
            })
            .collect();
        write!(f, "{}", pairs.join(" "))
    }
}
