//! Tabular source: delimited files into typed relations

use crate::error::{RecLensError, Result};
use crate::relation::{Column, Relation};
use crate::value::{ColumnType, Value};
use std::path::Path;

/// Reader for delimited files with per-column type inference
pub struct CsvSource {
    delimiter: u8,
}

impl Default for CsvSource {
    fn default() -> Self {
        Self::new()
    }
}

impl CsvSource {
    pub fn new() -> Self {
        Self { delimiter: b',' }
    }

    pub fn with_delimiter(delimiter: u8) -> Self {
        Self { delimiter }
    }

    /// Load a delimited file into a typed relation.
    ///
    /// Column types are inferred over the whole file: `Boolean` when every
    /// non-empty field parses as true/false, else `Integer`, else `Float`,
    /// falling back to `Text`. Empty fields are null. A column with no
    /// non-empty values at all is typed `Text`.
    pub fn load(&self, path: &Path) -> Result<Relation> {
        if !path.exists() {
            return Err(RecLensError::source_not_found(path));
        }

        let mut reader = csv::ReaderBuilder::new()
            .delimiter(self.delimiter)
            .from_path(path)?;
        let headers: Vec<String> = reader.headers()?.iter().map(str::to_string).collect();

        let mut records = Vec::new();
        for record in reader.records() {
            records.push(record?);
        }

        let types = infer_column_types(headers.len(), &records);
        let columns = headers
            .into_iter()
            .zip(types.iter())
            .map(|(name, ty)| Column::new(name, *ty))
            .collect();

        let mut relation = Relation::new(columns);
        for record in &records {
            let row = record
                .iter()
                .zip(types.iter())
                .map(|(field, ty)| parse_value(field, *ty))
                .collect();
            relation.push_row(row)?;
        }

        log::debug!(
            "Loaded {} rows, {} columns from {}",
            relation.row_count(),
            relation.column_count(),
            path.display()
        );
        Ok(relation)
    }
}

/// Per-column candidate tracking: a parse failure for a narrower type
/// permanently widens the column
fn infer_column_types(column_count: usize, records: &[csv::StringRecord]) -> Vec<ColumnType> {
    struct Candidate {
        can_bool: bool,
        can_int: bool,
        can_float: bool,
        seen_value: bool,
    }

    let mut candidates: Vec<Candidate> = (0..column_count)
        .map(|_| Candidate {
            can_bool: true,
            can_int: true,
            can_float: true,
            seen_value: false,
        })
        .collect();

    for record in records {
        for (i, field) in record.iter().enumerate().take(column_count) {
            if field.is_empty() {
                continue;
            }
            let candidate = &mut candidates[i];
            candidate.seen_value = true;
            if candidate.can_bool && parse_bool(field).is_none() {
                candidate.can_bool = false;
            }
            if candidate.can_int && field.parse::<i64>().is_err() {
                candidate.can_int = false;
            }
            if candidate.can_float && field.parse::<f64>().is_err() {
                candidate.can_float = false;
            }
        }
    }

    candidates
        .iter()
        .map(|c| {
            if !c.seen_value {
                ColumnType::Text
            } else if c.can_bool {
                ColumnType::Boolean
            } else if c.can_int {
                ColumnType::Integer
            } else if c.can_float {
                ColumnType::Float
            } else {
                ColumnType::Text
            }
        })
        .collect()
}

fn parse_bool(field: &str) -> Option<bool> {
    match field.to_ascii_lowercase().as_str() {
        "true" => Some(true),
        "false" => Some(false),
        _ => None,
    }
}

fn parse_value(field: &str, ty: ColumnType) -> Value {
    if field.is_empty() {
        return Value::Null;
    }
    // Inference guarantees these parses succeed for the chosen type
    match ty {
        ColumnType::Boolean => parse_bool(field)
            .map(Value::Boolean)
            .unwrap_or_else(|| Value::Text(field.to_string())),
        ColumnType::Integer => field
            .parse::<i64>()
            .map(Value::Integer)
            .unwrap_or_else(|_| Value::Text(field.to_string())),
        ColumnType::Float => field
            .parse::<f64>()
            .map(Value::Float)
            .unwrap_or_else(|_| Value::Text(field.to_string())),
        ColumnType::Text => Value::Text(field.to_string()),
    }
}
