//! Consumption time series as returned by the provider.
//!
//! Payloads look like
//! `{ "Water": { "Meters": { "Day": { "<meterId>": { "Name": .., "Values": { "<date>": n } } } }, "Units": [..] } }`.
//! Meter order inside a granularity is kept exactly as the provider lists
//! it, because the default tie-break depends on it.

use serde::de::{Deserializer, MapAccess, Visitor};
use serde_derive::Deserialize;
use std::collections::BTreeMap;
use std::fmt;
use std::marker::PhantomData;

use super::types::{Category, Granularity};

/// Readings of one physical meter.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MeterSeries {
    pub meter_id: String,
    pub name: String,
    /// ISO-8601 date to reading. Zero-padded dates sort chronologically.
    pub values: BTreeMap<String, f64>,
}

impl MeterSeries {
    /// The reading with the greatest date, if any.
    pub fn latest(&self) -> Option<(&str, f64)> {
        self.values
            .iter()
            .next_back()
            .map(|(date, value)| (date.as_str(), *value))
    }
}

/// Meters of one category at one granularity, in provider order.
pub type MeterSet = Vec<MeterSeries>;

/// All granularities fetched for one category.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MeterGroup {
    pub granularities: BTreeMap<Granularity, MeterSet>,
}

/// Everything fetched during one refresh cycle.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ConsumptionDataset {
    categories: BTreeMap<Category, MeterGroup>,
}

impl ConsumptionDataset {
    pub fn new() -> Self {
        Self::default()
    }

    /// Stores the meters for one pair, replacing what was there.
    pub fn insert(&mut self, category: Category, granularity: Granularity, meters: MeterSet) {
        self.categories
            .entry(category)
            .or_default()
            .granularities
            .insert(granularity, meters);
    }

    pub fn group(&self, category: Category) -> Option<&MeterGroup> {
        self.categories.get(&category)
    }

    pub fn meters(&self, category: Category, granularity: Granularity) -> Option<&MeterSet> {
        self.group(category)?.granularities.get(&granularity)
    }

    pub fn is_empty(&self) -> bool {
        self.categories.is_empty()
    }

    pub fn clear(&mut self) {
        self.categories.clear();
    }
}

/// A decoded consumption response, keyed by known categories only.
#[derive(Debug, Default)]
pub struct ConsumptionPayload {
    categories: BTreeMap<Category, MeterGroup>,
}

impl ConsumptionPayload {
    /// Decodes a consumption response body.
    ///
    /// Categories and granularities the model does not know are dropped;
    /// a `null` category is treated as absent.
    pub fn from_json(body: &str) -> Result<Self, serde_json::Error> {
        let raw: BTreeMap<String, Option<RawCategory>> = serde_json::from_str(body)?;
        let mut categories = BTreeMap::new();

        for (name, raw_category) in raw {
            let Ok(category) = name.parse::<Category>() else {
                tracing::debug!(category = %name, "Ignoring unknown category in payload");
                continue;
            };
            let Some(raw_category) = raw_category else {
                continue;
            };

            let mut group = MeterGroup::default();
            for (granularity_name, meters) in raw_category.meters.unwrap_or_default() {
                let Ok(granularity) = granularity_name.parse::<Granularity>() else {
                    tracing::debug!(granularity = %granularity_name, "Ignoring unknown granularity");
                    continue;
                };
                group.granularities.insert(granularity, meters.into_series());
            }
            categories.insert(category, group);
        }

        Ok(Self { categories })
    }

    /// Removes and returns the meters for one pair; empty when absent.
    pub fn take(&mut self, category: Category, granularity: Granularity) -> MeterSet {
        self.categories
            .get_mut(&category)
            .and_then(|group| group.granularities.remove(&granularity))
            .unwrap_or_default()
    }
}

// `Units` is not read; readings are published in the provider's unit.
#[derive(Deserialize)]
struct RawCategory {
    #[serde(rename = "Meters", default)]
    meters: Option<BTreeMap<String, OrderedMeters>>,
}

#[derive(Deserialize)]
struct RawMeter {
    #[serde(rename = "Name", default)]
    name: Option<String>,
    #[serde(rename = "Values", default)]
    values: Option<BTreeMap<String, Option<f64>>>,
}

/// Meter map that remembers document order.
struct OrderedMeters(Vec<(String, RawMeter)>);

impl OrderedMeters {
    fn into_series(self) -> MeterSet {
        self.0
            .into_iter()
            .map(|(meter_id, raw)| MeterSeries {
                name: raw.name.unwrap_or_default(),
                values: raw
                    .values
                    .unwrap_or_default()
                    .into_iter()
                    .filter_map(|(date, value)| value.map(|v| (date, v)))
                    .collect(),
                meter_id,
            })
            .collect()
    }
}

struct OrderedMetersVisitor(PhantomData<RawMeter>);

impl<'de> Visitor<'de> for OrderedMetersVisitor {
    type Value = OrderedMeters;

    fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "a map of meter id to meter series")
    }

    fn visit_map<A>(self, mut access: A) -> Result<Self::Value, A::Error>
    where
        A: MapAccess<'de>,
    {
        let mut entries = Vec::with_capacity(access.size_hint().unwrap_or(0));
        while let Some((key, value)) = access.next_entry::<String, RawMeter>()? {
            entries.push((key, value));
        }
        Ok(OrderedMeters(entries))
    }

    fn visit_unit<E>(self) -> Result<Self::Value, E> {
        Ok(OrderedMeters(Vec::new()))
    }
}

impl<'de> serde::Deserialize<'de> for OrderedMeters {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        deserializer.deserialize_any(OrderedMetersVisitor(PhantomData))
    }
}
