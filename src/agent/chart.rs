//! Chart projection of a result set.
//!
//! Derives a label/value pair for presentation: labels from the first
//! text-like column, values from the first all-numeric column. Computed on
//! demand and discarded after the response.

use serde::{Deserialize, Serialize};

use crate::db::{QueryResult, Value};

/// Chart-ready projection of a result set.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ChartData {
    /// Ordered labels, parallel to `values`.
    pub labels: Vec<String>,
    /// Ordered numeric values.
    pub values: Vec<f64>,
}

/// Projects a result set into chart data. Never fails: an empty result
/// yields empty sequences.
pub fn build_chart_data(result: &QueryResult) -> ChartData {
    if result.rows.is_empty() {
        return ChartData::default();
    }

    let label_col = result.rows[0]
        .iter()
        .position(|v| matches!(v, Value::Text(_)));

    let value_col = (0..result.columns.len().max(result.rows[0].len()))
        .find(|&i| result.rows.iter().all(|row| row.get(i).is_some_and(Value::is_numeric)));

    let values = value_col
        .map(|i| {
            result
                .rows
                .iter()
                .filter_map(|row| row.get(i).and_then(Value::as_f64))
                .collect()
        })
        .unwrap_or_default();

    let labels = match label_col {
        Some(i) => result
            .rows
            .iter()
            .map(|row| {
                row.get(i)
                    .map(Value::to_display_string)
                    .unwrap_or_default()
            })
            .collect(),
        // A single aggregate row labels itself with the column name; larger
        // all-numeric results fall back to row indices.
        None => match (result.rows.len(), value_col) {
            (1, Some(i)) => vec![result
                .columns
                .get(i)
                .map(|c| c.name.clone())
                .unwrap_or_else(|| "0".to_string())],
            (n, _) => (0..n).map(|i| i.to_string()).collect(),
        },
    };

    ChartData { labels, values }
}
