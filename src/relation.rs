//! In-memory typed relations

use crate::error::{RecLensError, Result};
use crate::value::{ColumnType, Value};
use indexmap::IndexMap;

/// A named, typed column of a relation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Column {
    pub name: String,
    pub column_type: ColumnType,
}

impl Column {
    pub fn new(name: impl Into<String>, column_type: ColumnType) -> Self {
        Self {
            name: name.into(),
            column_type,
        }
    }
}

/// An ordered set of named, typed columns plus zero or more rows.
/// Invariant: every row has exactly one value per declared column, and every
/// non-null value agrees with its column's declared type.
#[derive(Debug, Clone, Default)]
pub struct Relation {
    columns: Vec<Column>,
    rows: Vec<Vec<Value>>,
}

impl Relation {
    pub fn new(columns: Vec<Column>) -> Self {
        Self {
            columns,
            rows: Vec::new(),
        }
    }

    pub fn columns(&self) -> &[Column] {
        &self.columns
    }

    pub fn rows(&self) -> &[Vec<Value>] {
        &self.rows
    }

    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    pub fn column_count(&self) -> usize {
        self.columns.len()
    }

    pub fn column_names(&self) -> Vec<&str> {
        self.columns.iter().map(|c| c.name.as_str()).collect()
    }

    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c.name == name)
    }

    pub fn column_type(&self, name: &str) -> Option<ColumnType> {
        self.column_index(name).map(|i| self.columns[i].column_type)
    }

    /// Column name to declared type, in column order
    pub fn schema(&self) -> IndexMap<String, ColumnType> {
        self.columns
            .iter()
            .map(|c| (c.name.clone(), c.column_type))
            .collect()
    }

    /// Append a row, enforcing the relation invariant
    pub fn push_row(&mut self, row: Vec<Value>) -> Result<()> {
        if row.len() != self.columns.len() {
            return Err(RecLensError::relation(format!(
                "row has {} values but relation declares {} columns",
                row.len(),
                self.columns.len()
            )));
        }
        for (value, column) in row.iter().zip(&self.columns) {
            if let Some(value_type) = value.column_type() {
                if value_type != column.column_type {
                    return Err(RecLensError::relation(format!(
                        "value {} has type {} but column '{}' is {}",
                        value, value_type, column.name, column.column_type
                    )));
                }
            }
        }
        self.rows.push(row);
        Ok(())
    }

    /// Resolve a list of column names to indices, failing on the first
    /// name not present in the relation
    pub fn column_indices(&self, names: &[String]) -> Result<Vec<usize>> {
        names
            .iter()
            .map(|name| {
                self.column_index(name).ok_or_else(|| {
                    RecLensError::relation(format!("column '{}' not found in relation", name))
                })
            })
            .collect()
    }
}
