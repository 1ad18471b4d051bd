//! Summary statistics over a listing table

use serde_json::Value;

use super::table::{float_value, number};
use crate::submarket::state::Record;

/// One summarized column and the suffix used in its stat names
/// (`average<Label>`, `median<Label>`, `min<Label>`, `max<Label>`)
#[derive(Debug, Clone, Copy)]
pub struct Metric {
    pub column: &'static str,
    pub label: &'static str,
}

/// Average, median, min and max of each metric, plus `totalListings`.
///
/// Non-numeric and null cells are skipped. A metric with no values gets
/// `null` for all four stats. Min and max keep the original JSON value.
pub fn summarize(rows: &[Record], metrics: &[Metric]) -> Record {
    let mut summary = Record::new();

    for metric in metrics {
        let mut values: Vec<(f64, &Value)> = rows
            .iter()
            .filter_map(|row| number(row, metric.column).map(|n| (n, &row[metric.column])))
            .collect();
        values.sort_by(|a, b| a.0.total_cmp(&b.0));

        let (average, median, min, max) = match (values.first(), values.last()) {
            (Some(first), Some(last)) => {
                let nums: Vec<f64> = values.iter().map(|(n, _)| *n).collect();
                (
                    float_value(mean(&nums)),
                    float_value(median(&nums)),
                    first.1.clone(),
                    last.1.clone(),
                )
            }
            _ => (Value::Null, Value::Null, Value::Null, Value::Null),
        };

        summary.insert(format!("average{}", metric.label), average);
        summary.insert(format!("median{}", metric.label), median);
        summary.insert(format!("min{}", metric.label), min);
        summary.insert(format!("max{}", metric.label), max);
    }

    summary.insert("totalListings".to_string(), Value::from(rows.len()));
    summary
}

fn mean(sorted: &[f64]) -> f64 {
    sorted.iter().sum::<f64>() / sorted.len() as f64
}

/// Median of an ascending, non-empty slice
fn median(sorted: &[f64]) -> f64 {
    let mid = sorted.len() / 2;
    if sorted.len() % 2 == 0 {
        (sorted[mid - 1] + sorted[mid]) / 2.0
    } else {
        sorted[mid]
    }
}
