//! Schema validation between the two sides of an entity

use crate::error::{RecLensError, Result};
use crate::relation::Relation;

/// The comparison plan derived from a validated pair of schemas
#[derive(Debug, Clone)]
pub struct ComparisonPlan {
    /// Ordered primary-key column names
    pub key_columns: Vec<String>,
    /// Non-key, non-excluded columns, present on both sides, in left-side
    /// column order (deterministic; the union adds nothing because any
    /// one-sided column is rejected as asymmetric)
    pub compare_columns: Vec<String>,
    /// Excluded columns present on the left side, carried through unvalidated
    pub excluded_left: Vec<String>,
    /// Excluded columns present on the right side
    pub excluded_right: Vec<String>,
}

/// Validates column types, key presence, and column-set symmetry
pub struct SchemaValidator;

impl SchemaValidator {
    pub fn validate(
        left: &Relation,
        right: &Relation,
        primary_keys: &[String],
        exclude_columns: &[String],
    ) -> Result<ComparisonPlan> {
        let left_schema = left.schema();
        let right_schema = right.schema();

        // Matching columns must carry identical declared types
        for (name, left_type) in &left_schema {
            if let Some(right_type) = right_schema.get(name) {
                if left_type != right_type {
                    return Err(RecLensError::TypeMismatch {
                        column: name.clone(),
                        left_type: left_type.to_string(),
                        right_type: right_type.to_string(),
                    });
                }
            }
        }

        // Every primary key must exist on both sides
        for key in primary_keys {
            if !left_schema.contains_key(key) {
                return Err(RecLensError::MissingKeyColumn {
                    column: key.clone(),
                    side: "left".to_string(),
                });
            }
            if !right_schema.contains_key(key) {
                return Err(RecLensError::MissingKeyColumn {
                    column: key.clone(),
                    side: "right".to_string(),
                });
            }
        }

        let is_key = |name: &str| primary_keys.iter().any(|k| k == name);
        let is_excluded = |name: &str| exclude_columns.iter().any(|c| c == name);

        // Every comparison column from the union of both sides must exist on
        // both; no match semantics can be defined for a one-sided column
        for name in left_schema.keys().chain(right_schema.keys()) {
            if is_key(name) || is_excluded(name) {
                continue;
            }
            let present_on_left = left_schema.contains_key(name);
            let present_on_right = right_schema.contains_key(name);
            if !(present_on_left && present_on_right) {
                return Err(RecLensError::AsymmetricColumn {
                    column: name.clone(),
                    present_on_left,
                    present_on_right,
                });
            }
        }

        let compare_columns = left_schema
            .keys()
            .filter(|name| !is_key(name) && !is_excluded(name))
            .cloned()
            .collect();
        let excluded_left = exclude_columns
            .iter()
            .filter(|name| left_schema.contains_key(*name))
            .cloned()
            .collect();
        let excluded_right = exclude_columns
            .iter()
            .filter(|name| right_schema.contains_key(*name))
            .cloned()
            .collect();

        Ok(ComparisonPlan {
            key_columns: primary_keys.to_vec(),
            compare_columns,
            excluded_left,
            excluded_right,
        })
    }
}
