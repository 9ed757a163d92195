//! Field-level summary statistics over comparison output

use crate::engine::ComparisonTable;
use crate::relation::{Column, Relation};
use crate::value::{ColumnType, Value};
use serde::Serialize;

/// Aggregate match statistics for one compared field, computed only over
/// rows present on both sides
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FieldSummary {
    pub field: String,
    pub total: u64,
    pub matches: u64,
    /// Matches over total as a percentage, rounded to two decimals; absent
    /// when no row exists on both sides (the chosen zero-total sentinel)
    pub match_percentage: Option<f64>,
}

/// Reduces row-level comparison output into per-field statistics
pub struct SummaryAggregator;

impl SummaryAggregator {
    pub fn summarize(table: &ComparisonTable) -> Vec<FieldSummary> {
        let both_exist: Vec<_> = table
            .rows
            .iter()
            .filter(|row| row.exists_left && row.exists_right)
            .collect();
        let total = both_exist.len() as u64;

        table
            .plan
            .compare_columns
            .iter()
            .enumerate()
            .map(|(index, field)| {
                let matches = both_exist
                    .iter()
                    .filter(|row| row.fields[index].matched)
                    .count() as u64;
                let match_percentage = if total == 0 {
                    None
                } else {
                    Some(round2(matches as f64 / total as f64 * 100.0))
                };
                FieldSummary {
                    field: field.clone(),
                    total,
                    matches,
                    match_percentage,
                }
            })
            .collect()
    }
}

/// Flat relation view of field summaries for export
pub fn to_relation(summaries: &[FieldSummary]) -> Relation {
    let mut relation = Relation::new(vec![
        Column::new("field", ColumnType::Text),
        Column::new("total", ColumnType::Integer),
        Column::new("matches", ColumnType::Integer),
        Column::new("match_percentage", ColumnType::Float),
    ]);
    for summary in summaries {
        relation
            .push_row(vec![
                Value::Text(summary.field.clone()),
                Value::Integer(summary.total as i64),
                Value::Integer(summary.matches as i64),
                summary
                    .match_percentage
                    .map(Value::Float)
                    .unwrap_or(Value::Null),
            ])
            .expect("summary relation invariant");
    }
    relation
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}
