//! Reduces a category's day series to the single value that gets published.

use super::dataset::ConsumptionDataset;
use super::types::{Category, Granularity, TieBreak};

/// Latest day reading for a category using the default tie-break.
///
/// Returns `None` when the category, its `Day` granularity, or every
/// meter's readings are missing. Missing data is never an error.
pub fn latest_value(dataset: &ConsumptionDataset, category: Category) -> Option<f64> {
    latest_value_with(dataset, category, &TieBreak::FirstListed)
}

/// Latest day reading for a category under an explicit tie-break.
pub fn latest_value_with(
    dataset: &ConsumptionDataset,
    category: Category,
    tie_break: &TieBreak,
) -> Option<f64> {
    let meters = dataset.meters(category, Granularity::Day)?;
    // meters without readings never take part
    let mut latest = meters
        .iter()
        .filter_map(|meter| meter.latest().map(|(date, value)| (meter, date, value)));

    match tie_break {
        TieBreak::FirstListed => latest.next().map(|(_, _, value)| value),
        TieBreak::MostRecent => latest
            // ties on date keep the earlier-listed meter
            .fold(None::<(&str, f64)>, |best, (_, date, value)| match best {
                Some((best_date, _)) if best_date >= date => best,
                _ => Some((date, value)),
            })
            .map(|(_, value)| value),
        TieBreak::Sum => latest
            .map(|(_, _, value)| value)
            .fold(None, |acc, value| Some(acc.unwrap_or(0.0) + value)),
        TieBreak::Meter(id) => latest
            .find(|(meter, _, _)| &meter.meter_id == id)
            .map(|(_, _, value)| value),
    }
}
