//! Reconciliation engine: sort-merge full outer join and field matching

use crate::error::Result;
use crate::relation::{Column, Relation};
use crate::schema::ComparisonPlan;
use crate::value::{ColumnType, Value};
use rayon::prelude::*;
use std::cmp::Ordering;

/// The aligned output for one key
#[derive(Debug, Clone)]
pub struct ComparisonRow {
    /// Key column values, coalesced across sides
    pub key: Vec<Value>,
    /// One entry per plan compare column: left value, right value, match flag
    pub fields: Vec<FieldPair>,
    /// Excluded-column values from the left side, aligned with the plan's
    /// `excluded_left` list; null when the left row is absent
    pub excluded_left: Vec<Value>,
    pub excluded_right: Vec<Value>,
    /// True iff every key column has a non-null value from the left relation
    pub exists_left: bool,
    pub exists_right: bool,
    /// True iff both sides exist and every field matches (vacuously true
    /// over zero comparison columns)
    pub full_match: bool,
}

#[derive(Debug, Clone)]
pub struct FieldPair {
    pub left: Value,
    pub right: Value,
    pub matched: bool,
}

/// The full comparison output for one entity
#[derive(Debug, Clone)]
pub struct ComparisonTable {
    pub plan: ComparisonPlan,
    pub rows: Vec<ComparisonRow>,
    key_types: Vec<ColumnType>,
    field_types: Vec<ColumnType>,
    excluded_left_types: Vec<ColumnType>,
    excluded_right_types: Vec<ColumnType>,
}

impl ComparisonTable {
    pub fn rows_left(&self) -> u64 {
        self.rows.iter().filter(|r| r.exists_left).count() as u64
    }

    pub fn rows_right(&self) -> u64 {
        self.rows.iter().filter(|r| r.exists_right).count() as u64
    }

    pub fn rows_fully_matched(&self) -> u64 {
        self.rows.iter().filter(|r| r.full_match).count() as u64
    }

    /// Flat result relation: key columns, then `{col}_left`, `{col}_right`,
    /// `{col}_match` per compared column, excluded-column values per side,
    /// and the `_exists_left`/`_exists_right`/`_full_match` flags
    pub fn to_relation(&self) -> Relation {
        let mut columns = Vec::new();
        for (name, ty) in self.plan.key_columns.iter().zip(&self.key_types) {
            columns.push(Column::new(name.clone(), *ty));
        }
        for (name, ty) in self.plan.compare_columns.iter().zip(&self.field_types) {
            columns.push(Column::new(format!("{}_left", name), *ty));
            columns.push(Column::new(format!("{}_right", name), *ty));
            columns.push(Column::new(format!("{}_match", name), ColumnType::Boolean));
        }
        for (name, ty) in self.plan.excluded_left.iter().zip(&self.excluded_left_types) {
            columns.push(Column::new(format!("{}_left", name), *ty));
        }
        for (name, ty) in self
            .plan
            .excluded_right
            .iter()
            .zip(&self.excluded_right_types)
        {
            columns.push(Column::new(format!("{}_right", name), *ty));
        }
        columns.push(Column::new("_exists_left", ColumnType::Boolean));
        columns.push(Column::new("_exists_right", ColumnType::Boolean));
        columns.push(Column::new("_full_match", ColumnType::Boolean));

        let mut relation = Relation::new(columns);
        for row in &self.rows {
            let mut values = Vec::with_capacity(relation.column_count());
            values.extend(row.key.iter().cloned());
            for field in &row.fields {
                values.push(field.left.clone());
                values.push(field.right.clone());
                values.push(Value::Boolean(field.matched));
            }
            values.extend(row.excluded_left.iter().cloned());
            values.extend(row.excluded_right.iter().cloned());
            values.push(Value::Boolean(row.exists_left));
            values.push(Value::Boolean(row.exists_right));
            values.push(Value::Boolean(row.full_match));
            relation
                .push_row(values)
                .expect("comparison table invariant");
        }
        relation
    }
}

/// Column index bundle for one side of the join
struct SidePlan {
    keys: Vec<usize>,
    fields: Vec<usize>,
    excluded_left: Vec<usize>,
    excluded_right: Vec<usize>,
}

/// Row alignment and field comparison over two validated relations
pub struct ReconciliationEngine;

impl ReconciliationEngine {
    /// Align rows by equality of the full primary-key tuple with full outer
    /// join semantics and compute per-field null-safe match flags.
    ///
    /// The join is a sort-merge over the key tuple: both sides are sorted by
    /// key and consumed as runs, so output is emitted streamingly and an
    /// external-sort row source can bound peak memory for very large inputs.
    /// Duplicate keys on one side cross-multiply, as in a general outer join.
    pub fn reconcile(
        left: &Relation,
        right: &Relation,
        plan: &ComparisonPlan,
    ) -> Result<ComparisonTable> {
        let left_plan = SidePlan {
            keys: left.column_indices(&plan.key_columns)?,
            fields: left.column_indices(&plan.compare_columns)?,
            excluded_left: left.column_indices(&plan.excluded_left)?,
            excluded_right: Vec::new(),
        };
        let right_plan = SidePlan {
            keys: right.column_indices(&plan.key_columns)?,
            fields: right.column_indices(&plan.compare_columns)?,
            excluded_left: Vec::new(),
            excluded_right: right.column_indices(&plan.excluded_right)?,
        };

        // Rows with a null key component never participate in alignment
        let (left_keyed, left_nullkey) = split_by_key_completeness(left, &left_plan.keys);
        let (right_keyed, right_nullkey) = split_by_key_completeness(right, &right_plan.keys);

        let left_sorted = sort_by_key(left, &left_plan.keys, left_keyed);
        let right_sorted = sort_by_key(right, &right_plan.keys, right_keyed);

        let key_types = plan
            .key_columns
            .iter()
            .map(|name| left.column_type(name).expect("validated key column"))
            .collect();
        let field_types = plan
            .compare_columns
            .iter()
            .map(|name| left.column_type(name).expect("validated compare column"))
            .collect();
        let excluded_left_types = plan
            .excluded_left
            .iter()
            .map(|name| left.column_type(name).expect("validated excluded column"))
            .collect();
        let excluded_right_types = plan
            .excluded_right
            .iter()
            .map(|name| right.column_type(name).expect("validated excluded column"))
            .collect();

        let mut table = ComparisonTable {
            plan: plan.clone(),
            rows: Vec::new(),
            key_types,
            field_types,
            excluded_left_types,
            excluded_right_types,
        };

        // Merge the two key-sorted runs
        let mut i = 0;
        let mut j = 0;
        while i < left_sorted.len() && j < right_sorted.len() {
            let ordering = cmp_key_tuples(
                &left.rows()[left_sorted[i]],
                &left_plan.keys,
                &right.rows()[right_sorted[j]],
                &right_plan.keys,
            );
            match ordering {
                Ordering::Less => {
                    table.rows.push(left_only_row(
                        left,
                        left_sorted[i],
                        &left_plan,
                        plan,
                        true,
                    ));
                    i += 1;
                }
                Ordering::Greater => {
                    table.rows.push(right_only_row(
                        right,
                        right_sorted[j],
                        &right_plan,
                        plan,
                        true,
                    ));
                    j += 1;
                }
                Ordering::Equal => {
                    let i_end = run_end(left, &left_plan.keys, &left_sorted, i);
                    let j_end = run_end(right, &right_plan.keys, &right_sorted, j);
                    for &li in &left_sorted[i..i_end] {
                        for &rj in &right_sorted[j..j_end] {
                            table
                                .rows
                                .push(matched_row(left, li, right, rj, &left_plan, &right_plan));
                        }
                    }
                    i = i_end;
                    j = j_end;
                }
            }
        }
        for &li in &left_sorted[i..] {
            table
                .rows
                .push(left_only_row(left, li, &left_plan, plan, true));
        }
        for &rj in &right_sorted[j..] {
            table
                .rows
                .push(right_only_row(right, rj, &right_plan, plan, true));
        }
        for li in left_nullkey {
            table
                .rows
                .push(left_only_row(left, li, &left_plan, plan, false));
        }
        for rj in right_nullkey {
            table
                .rows
                .push(right_only_row(right, rj, &right_plan, plan, false));
        }

        Ok(table)
    }
}

fn split_by_key_completeness(relation: &Relation, keys: &[usize]) -> (Vec<usize>, Vec<usize>) {
    let mut keyed = Vec::with_capacity(relation.row_count());
    let mut nullkey = Vec::new();
    for (index, row) in relation.rows().iter().enumerate() {
        if keys.iter().all(|&k| !row[k].is_null()) {
            keyed.push(index);
        } else {
            nullkey.push(index);
        }
    }
    (keyed, nullkey)
}

fn sort_by_key(relation: &Relation, keys: &[usize], mut indices: Vec<usize>) -> Vec<usize> {
    indices.par_sort_unstable_by(|&a, &b| {
        cmp_key_tuples(&relation.rows()[a], keys, &relation.rows()[b], keys)
    });
    indices
}

fn cmp_key_tuples(
    left_row: &[Value],
    left_keys: &[usize],
    right_row: &[Value],
    right_keys: &[usize],
) -> Ordering {
    for (&lk, &rk) in left_keys.iter().zip(right_keys) {
        match left_row[lk].cmp_key(&right_row[rk]) {
            Ordering::Equal => continue,
            other => return other,
        }
    }
    Ordering::Equal
}

fn run_end(relation: &Relation, keys: &[usize], sorted: &[usize], start: usize) -> usize {
    let mut end = start + 1;
    while end < sorted.len()
        && cmp_key_tuples(
            &relation.rows()[sorted[start]],
            keys,
            &relation.rows()[sorted[end]],
            keys,
        ) == Ordering::Equal
    {
        end += 1;
    }
    end
}

fn matched_row(
    left: &Relation,
    li: usize,
    right: &Relation,
    rj: usize,
    left_plan: &SidePlan,
    right_plan: &SidePlan,
) -> ComparisonRow {
    let left_row = &left.rows()[li];
    let right_row = &right.rows()[rj];
    // Coalesce is the left value: both key tuples are equal by the join
    // predicate, so this never hides a discrepancy
    let key = left_plan.keys.iter().map(|&k| left_row[k].clone()).collect();
    let fields: Vec<FieldPair> = left_plan
        .fields
        .iter()
        .zip(&right_plan.fields)
        .map(|(&lf, &rf)| {
            let left_value = left_row[lf].clone();
            let right_value = right_row[rf].clone();
            let matched = left_value.matches(&right_value);
            FieldPair {
                left: left_value,
                right: right_value,
                matched,
            }
        })
        .collect();
    let full_match = fields.iter().all(|f| f.matched);
    ComparisonRow {
        key,
        excluded_left: left_plan
            .excluded_left
            .iter()
            .map(|&e| left_row[e].clone())
            .collect(),
        excluded_right: right_plan
            .excluded_right
            .iter()
            .map(|&e| right_row[e].clone())
            .collect(),
        fields,
        exists_left: true,
        exists_right: true,
        full_match,
    }
}

fn left_only_row(
    left: &Relation,
    li: usize,
    left_plan: &SidePlan,
    plan: &ComparisonPlan,
    key_complete: bool,
) -> ComparisonRow {
    let left_row = &left.rows()[li];
    let fields = left_plan
        .fields
        .iter()
        .map(|&lf| {
            let left_value = left_row[lf].clone();
            let matched = left_value.matches(&Value::Null);
            FieldPair {
                left: left_value,
                right: Value::Null,
                matched,
            }
        })
        .collect();
    ComparisonRow {
        key: left_plan.keys.iter().map(|&k| left_row[k].clone()).collect(),
        fields,
        excluded_left: left_plan
            .excluded_left
            .iter()
            .map(|&e| left_row[e].clone())
            .collect(),
        excluded_right: vec![Value::Null; plan.excluded_right.len()],
        exists_left: key_complete,
        exists_right: false,
        full_match: false,
    }
}

fn right_only_row(
    right: &Relation,
    rj: usize,
    right_plan: &SidePlan,
    plan: &ComparisonPlan,
    key_complete: bool,
) -> ComparisonRow {
    let right_row = &right.rows()[rj];
    let fields = right_plan
        .fields
        .iter()
        .map(|&rf| {
            let right_value = right_row[rf].clone();
            let matched = Value::Null.matches(&right_value);
            FieldPair {
                left: Value::Null,
                right: right_value,
                matched,
            }
        })
        .collect();
    ComparisonRow {
        key: right_plan
            .keys
            .iter()
            .map(|&k| right_row[k].clone())
            .collect(),
        fields,
        excluded_left: vec![Value::Null; plan.excluded_left.len()],
        excluded_right: right_plan
            .excluded_right
            .iter()
            .map(|&e| right_row[e].clone())
            .collect(),
        exists_left: false,
        exists_right: key_complete,
        full_match: false,
    }
}
