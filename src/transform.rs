//! Declarative pre-comparison transforms: the projection stage

use crate::error::{RecLensError, Result};
use crate::relation::{Column, Relation};
use crate::value::{ColumnType, Value};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::borrow::Cow;
use std::cmp::Ordering;

/// A declarative projection/filter applied to a side's raw relation before
/// comparison. Evaluation order: filters, then lookup, then select.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct TransformSpec {
    /// Ordered projection with optional renames; omitted means keep all
    #[serde(default)]
    pub select: Option<Vec<SelectColumn>>,
    /// Conjunction of row predicates
    #[serde(default)]
    pub filters: Vec<FilterSpec>,
    /// Inner join against a named shared reference dataset
    #[serde(default)]
    pub lookup: Option<LookupSpec>,
    /// Materialize the result once (and re-validate key uniqueness) instead
    /// of re-evaluating on every read
    #[serde(default)]
    pub cached: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct SelectColumn {
    pub column: String,
    #[serde(default)]
    pub rename: Option<String>,
}

impl SelectColumn {
    pub fn output_name(&self) -> &str {
        self.rename.as_deref().unwrap_or(&self.column)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct FilterSpec {
    pub column: String,
    pub op: FilterOp,
    #[serde(default)]
    pub value: Option<serde_json::Value>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FilterOp {
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
    IsNull,
    NotNull,
}

/// Inner join against a reference dataset: rows whose `match_column` value
/// has no counterpart in the dataset's `dataset_key` column are dropped.
/// Fetched columns replace same-named local columns, otherwise append.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct LookupSpec {
    pub dataset: String,
    pub match_column: String,
    pub dataset_key: String,
    pub fetch: Vec<SelectColumn>,
}

/// Shared reference datasets visible to transform evaluation
pub struct TransformContext<'a> {
    pub reference: &'a IndexMap<String, Relation>,
}

impl<'a> TransformContext<'a> {
    pub fn new(reference: &'a IndexMap<String, Relation>) -> Self {
        Self { reference }
    }
}

/// A side's relation after the projection stage. Materialized transforms are
/// evaluated once and key-checked; lazy transforms are re-evaluated on every
/// read and skip the key check (a documented tradeoff: faster for cheap
/// filters, unsafe for duplicate-producing projections).
#[derive(Debug)]
pub enum PreparedSide {
    Raw(Relation),
    Materialized(Relation),
    Lazy { raw: Relation, spec: TransformSpec },
}

impl PreparedSide {
    /// The relation to use for comparison
    pub fn realize(&self, ctx: &TransformContext<'_>) -> Result<Cow<'_, Relation>> {
        match self {
            PreparedSide::Raw(rel) | PreparedSide::Materialized(rel) => Ok(Cow::Borrowed(rel)),
            PreparedSide::Lazy { raw, spec } => Ok(Cow::Owned(evaluate(raw, spec, ctx)?)),
        }
    }
}

/// The projection stage of the pipeline
pub struct ProjectionStage;

impl ProjectionStage {
    /// Prepare a side's relation per its transform spec. `table` names the
    /// side in duplicate-key errors.
    pub fn prepare(
        raw: Relation,
        spec: Option<&TransformSpec>,
        primary_keys: &[String],
        table: &str,
        ctx: &TransformContext<'_>,
    ) -> Result<PreparedSide> {
        match spec {
            None => Ok(PreparedSide::Raw(raw)),
            Some(spec) if spec.cached => {
                log::info!("Materializing transform for table: {}", table);
                let evaluated = evaluate(&raw, spec, ctx)?;
                enforce_key_uniqueness(&evaluated, primary_keys, table)?;
                Ok(PreparedSide::Materialized(evaluated))
            }
            Some(spec) => {
                log::info!("Deferring lazy transform for table: {}", table);
                Ok(PreparedSide::Lazy {
                    raw,
                    spec: spec.clone(),
                })
            }
        }
    }
}

/// Evaluate a transform spec against a relation
pub fn evaluate(
    relation: &Relation,
    spec: &TransformSpec,
    ctx: &TransformContext<'_>,
) -> Result<Relation> {
    let mut current = apply_filters(relation, &spec.filters)?;
    if let Some(lookup) = &spec.lookup {
        current = apply_lookup(&current, lookup, ctx)?;
    }
    if let Some(select) = &spec.select {
        current = apply_select(&current, select)?;
    }
    Ok(current)
}

fn apply_filters(relation: &Relation, filters: &[FilterSpec]) -> Result<Relation> {
    if filters.is_empty() {
        return Ok(relation.clone());
    }

    let mut compiled = Vec::with_capacity(filters.len());
    for filter in filters {
        let index = relation.column_index(&filter.column).ok_or_else(|| {
            RecLensError::transform(format!(
                "filter column '{}' not found in relation",
                filter.column
            ))
        })?;
        let literal = match filter.op {
            FilterOp::IsNull | FilterOp::NotNull => Value::Null,
            _ => {
                let raw = filter.value.as_ref().ok_or_else(|| {
                    RecLensError::transform(format!(
                        "filter on column '{}' requires a literal value",
                        filter.column
                    ))
                })?;
                literal_to_value(raw, relation.columns()[index].column_type, &filter.column)?
            }
        };
        compiled.push((index, filter.op, literal));
    }

    let mut result = Relation::new(relation.columns().to_vec());
    for row in relation.rows() {
        let keep = compiled
            .iter()
            .all(|(index, op, literal)| predicate_holds(&row[*index], *op, literal));
        if keep {
            result.push_row(row.clone())?;
        }
    }
    Ok(result)
}

/// Null cells fail every predicate except the null tests
fn predicate_holds(cell: &Value, op: FilterOp, literal: &Value) -> bool {
    match op {
        FilterOp::IsNull => cell.is_null(),
        FilterOp::NotNull => !cell.is_null(),
        _ if cell.is_null() => false,
        FilterOp::Eq => cell.matches(literal),
        FilterOp::Ne => !cell.matches(literal),
        FilterOp::Lt => cell.cmp_key(literal) == Ordering::Less,
        FilterOp::Le => cell.cmp_key(literal) != Ordering::Greater,
        FilterOp::Gt => cell.cmp_key(literal) == Ordering::Greater,
        FilterOp::Ge => cell.cmp_key(literal) != Ordering::Less,
    }
}

fn literal_to_value(
    literal: &serde_json::Value,
    column_type: ColumnType,
    column: &str,
) -> Result<Value> {
    use serde_json::Value as Json;
    let converted = match (literal, column_type) {
        (Json::Null, _) => Some(Value::Null),
        (Json::Bool(b), ColumnType::Boolean) => Some(Value::Boolean(*b)),
        (Json::Number(n), ColumnType::Integer) => n.as_i64().map(Value::Integer),
        (Json::Number(n), ColumnType::Float) => n.as_f64().map(Value::Float),
        (Json::String(s), ColumnType::Text) => Some(Value::Text(s.clone())),
        _ => None,
    };
    converted.ok_or_else(|| {
        RecLensError::transform(format!(
            "filter literal {} is incompatible with column '{}' of type {}",
            literal, column, column_type
        ))
    })
}

fn apply_lookup(
    relation: &Relation,
    lookup: &LookupSpec,
    ctx: &TransformContext<'_>,
) -> Result<Relation> {
    let dataset = ctx.reference.get(&lookup.dataset).ok_or_else(|| {
        RecLensError::transform(format!(
            "unknown reference dataset '{}' in lookup",
            lookup.dataset
        ))
    })?;
    let local_index = relation.column_index(&lookup.match_column).ok_or_else(|| {
        RecLensError::transform(format!(
            "lookup match column '{}' not found in relation",
            lookup.match_column
        ))
    })?;
    let key_index = dataset.column_index(&lookup.dataset_key).ok_or_else(|| {
        RecLensError::transform(format!(
            "lookup key column '{}' not found in dataset '{}'",
            lookup.dataset_key, lookup.dataset
        ))
    })?;
    let mut fetch_indices = Vec::with_capacity(lookup.fetch.len());
    for fetch in &lookup.fetch {
        let index = dataset.column_index(&fetch.column).ok_or_else(|| {
            RecLensError::transform(format!(
                "lookup fetch column '{}' not found in dataset '{}'",
                fetch.column, lookup.dataset
            ))
        })?;
        fetch_indices.push(index);
    }

    // Output schema: fetched columns replace same-named local columns,
    // otherwise append at the end
    let mut columns = relation.columns().to_vec();
    let mut targets = Vec::with_capacity(lookup.fetch.len());
    for (fetch, &dataset_index) in lookup.fetch.iter().zip(&fetch_indices) {
        let name = fetch.output_name();
        let column_type = dataset.columns()[dataset_index].column_type;
        match columns.iter().position(|c| c.name == name) {
            Some(existing) => {
                columns[existing] = Column::new(name, column_type);
                targets.push(existing);
            }
            None => {
                columns.push(Column::new(name, column_type));
                targets.push(columns.len() - 1);
            }
        }
    }

    // Sorted index over the dataset key for equal-range probing
    let mut sorted: Vec<usize> = (0..dataset.row_count()).collect();
    sorted.sort_by(|&a, &b| dataset.rows()[a][key_index].cmp_key(&dataset.rows()[b][key_index]));

    let mut result = Relation::new(columns.clone());
    for row in relation.rows() {
        let probe = &row[local_index];
        if probe.is_null() {
            continue;
        }
        let lo = sorted
            .partition_point(|&i| dataset.rows()[i][key_index].cmp_key(probe) == Ordering::Less);
        let hi = sorted
            .partition_point(|&i| dataset.rows()[i][key_index].cmp_key(probe) != Ordering::Greater);
        for &dataset_row in &sorted[lo..hi] {
            let mut output = row.clone();
            output.resize(columns.len(), Value::Null);
            for (&target, &dataset_index) in targets.iter().zip(&fetch_indices) {
                output[target] = dataset.rows()[dataset_row][dataset_index].clone();
            }
            result.push_row(output)?;
        }
    }
    Ok(result)
}

fn apply_select(relation: &Relation, select: &[SelectColumn]) -> Result<Relation> {
    let mut indices = Vec::with_capacity(select.len());
    let mut columns = Vec::with_capacity(select.len());
    for item in select {
        let index = relation.column_index(&item.column).ok_or_else(|| {
            RecLensError::transform(format!(
                "selected column '{}' not found in relation",
                item.column
            ))
        })?;
        let name = item.output_name();
        if columns.iter().any(|c: &Column| c.name == name) {
            return Err(RecLensError::transform(format!(
                "duplicate output column '{}' in select",
                name
            )));
        }
        columns.push(Column::new(name, relation.columns()[index].column_type));
        indices.push(index);
    }

    let mut result = Relation::new(columns);
    for row in relation.rows() {
        result.push_row(indices.iter().map(|&i| row[i].clone()).collect())?;
    }
    Ok(result)
}

/// Enforce primary-key-tuple uniqueness over a materialized result. Key
/// columns missing after projection are left for the schema validator to
/// report with the proper error.
fn enforce_key_uniqueness(relation: &Relation, primary_keys: &[String], table: &str) -> Result<()> {
    let mut key_indices = Vec::with_capacity(primary_keys.len());
    for key in primary_keys {
        match relation.column_index(key) {
            Some(index) => key_indices.push(index),
            None => return Ok(()),
        }
    }

    let mut order: Vec<usize> = (0..relation.row_count()).collect();
    order.sort_by(|&a, &b| cmp_keys(relation, &key_indices, a, b));
    for pair in order.windows(2) {
        if cmp_keys(relation, &key_indices, pair[0], pair[1]) == Ordering::Equal {
            let key = key_indices
                .iter()
                .map(|&i| relation.rows()[pair[0]][i].to_string())
                .collect::<Vec<_>>()
                .join(", ");
            return Err(RecLensError::DuplicateKey {
                table: table.to_string(),
                key,
            });
        }
    }
    Ok(())
}

fn cmp_keys(relation: &Relation, key_indices: &[usize], a: usize, b: usize) -> Ordering {
    for &i in key_indices {
        match relation.rows()[a][i].cmp_key(&relation.rows()[b][i]) {
            Ordering::Equal => continue,
            other => return other,
        }
    }
    Ordering::Equal
}
