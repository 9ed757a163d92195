//! Run orchestration: sequences reconciliation across configured entities,
//! isolating per-entity failures in an outcome ledger

use crate::config::{EntitySpec, RunConfig, SideSpec};
use crate::engine::{ComparisonTable, ReconciliationEngine};
use crate::error::{RecLensError, Result};
use crate::relation::{Column, Relation};
use crate::schema::SchemaValidator;
use crate::source::CsvSource;
use crate::summary::{self, FieldSummary, SummaryAggregator};
use crate::transform::{ProjectionStage, TransformContext};
use crate::value::{ColumnType, Value};
use indexmap::IndexMap;
use serde::Serialize;
use std::path::PathBuf;

/// Orchestrator lifecycle. `Failed` is reachable from `Running` only when
/// continue-on-error is off.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunState {
    Created,
    DefaultsResolved,
    ReferenceDataLoaded,
    Running,
    Completed,
    Failed,
}

/// One row of the outcome ledger; written exactly once per entity
#[derive(Debug, Clone, Serialize)]
pub struct EntityOutcome {
    pub entity: String,
    pub rows_left: Option<u64>,
    pub rows_right: Option<u64>,
    pub rows_fully_matched: Option<u64>,
    pub error_text: Option<String>,
    pub success: bool,
}

/// The comparison output retained for a successful entity
#[derive(Debug, Clone)]
pub struct EntityResult {
    pub compare: ComparisonTable,
    pub field_summaries: Vec<FieldSummary>,
}

/// A single comparison run over all configured entities
pub struct ReconRun {
    run_name: String,
    config: RunConfig,
    state: RunState,
    source: CsvSource,
    reference: IndexMap<String, Relation>,
    outcomes: IndexMap<String, EntityOutcome>,
    results: IndexMap<String, EntityResult>,
}

impl ReconRun {
    pub fn new(run_name: impl Into<String>, config: RunConfig) -> Self {
        Self {
            run_name: run_name.into(),
            config,
            state: RunState::Created,
            source: CsvSource::new(),
            reference: IndexMap::new(),
            outcomes: IndexMap::new(),
            results: IndexMap::new(),
        }
    }

    pub fn run_name(&self) -> &str {
        &self.run_name
    }

    pub fn state(&self) -> RunState {
        self.state
    }

    pub fn outcomes(&self) -> &IndexMap<String, EntityOutcome> {
        &self.outcomes
    }

    pub fn entity_result(&self, entity: &str) -> Option<&EntityResult> {
        self.results.get(entity)
    }

    /// Execute the comparison for all configured entities, in configured
    /// order. Callable at most once per run instance.
    ///
    /// Per-entity errors are recorded in the outcome ledger and re-raised
    /// unless `continue_on_error` is set. Configuration-time errors and
    /// orchestrator misuse abort immediately with no ledger entry.
    pub fn execute(&mut self, continue_on_error: bool) -> Result<()> {
        if self.state != RunState::Created {
            return Err(RecLensError::AlreadyExecuted);
        }

        self.resolve_defaults()?;
        self.config.validate()?;
        self.load_reference_datasets()?;
        self.state = RunState::Running;

        let entities = self.config.entities.clone();
        for entity in &entities {
            log::info!("[{}] Processing entity: [{}]", self.run_name, entity.entity_name);
            match self.compare_entity(entity) {
                Ok(result) => {
                    self.outcomes.insert(
                        entity.entity_name.clone(),
                        EntityOutcome {
                            entity: entity.entity_name.clone(),
                            rows_left: Some(result.compare.rows_left()),
                            rows_right: Some(result.compare.rows_right()),
                            rows_fully_matched: Some(result.compare.rows_fully_matched()),
                            error_text: None,
                            success: true,
                        },
                    );
                    self.results.insert(entity.entity_name.clone(), result);
                    log::info!(
                        "[{}] Completed processing entity: [{}]",
                        self.run_name,
                        entity.entity_name
                    );
                }
                Err(error) => {
                    log::error!(
                        "[{}] Error processing entity [{}]: {}",
                        self.run_name,
                        entity.entity_name,
                        error
                    );
                    self.outcomes.insert(
                        entity.entity_name.clone(),
                        EntityOutcome {
                            entity: entity.entity_name.clone(),
                            rows_left: None,
                            rows_right: None,
                            rows_fully_matched: None,
                            error_text: Some(error.to_string()),
                            success: false,
                        },
                    );
                    if !continue_on_error {
                        self.state = RunState::Failed;
                        return Err(error);
                    }
                }
            }
        }

        self.state = RunState::Completed;
        Ok(())
    }

    /// Fill unset side titles from run-level defaults and resolve the glob
    /// template for sides without an explicit input file
    fn resolve_defaults(&mut self) -> Result<()> {
        if let Some(defaults) = self.config.defaults.clone() {
            for entity in &mut self.config.entities {
                if entity.left_side.title.is_none() {
                    entity.left_side.title = defaults.left_side_title.clone();
                }
                if entity.right_side.title.is_none() {
                    entity.right_side.title = defaults.right_side_title.clone();
                }
            }
            if let Some(template) = &defaults.file_pattern_glob_template {
                for entity in &mut self.config.entities {
                    let entity_name = entity.entity_name.clone();
                    resolve_side_glob(&entity_name, "left", &mut entity.left_side, template)?;
                    resolve_side_glob(&entity_name, "right", &mut entity.right_side, template)?;
                }
            }
        }

        for entity in &self.config.entities {
            for (label, side) in [("left", &entity.left_side), ("right", &entity.right_side)] {
                if side.input_file.is_none() {
                    return Err(RecLensError::config(format!(
                        "entity '{}' {} side has no input file and no glob template resolved one",
                        entity.entity_name, label
                    )));
                }
            }
        }

        self.state = RunState::DefaultsResolved;
        Ok(())
    }

    /// Load the shared reference datasets, once, before any entity runs
    fn load_reference_datasets(&mut self) -> Result<()> {
        for dataset in &self.config.reference_datasets {
            log::info!(
                "[{}] Loading reference dataset: {} from {}",
                self.run_name,
                dataset.dataset_name,
                dataset.input_file.display()
            );
            let relation = self.source.load(&dataset.input_file)?;
            self.reference
                .insert(dataset.dataset_name.clone(), relation);
        }
        self.state = RunState::ReferenceDataLoaded;
        Ok(())
    }

    /// The full pipeline for one entity: load both sides, project, validate
    /// schemas, reconcile, aggregate
    fn compare_entity(&self, entity: &EntitySpec) -> Result<EntityResult> {
        let left_path = required_input(entity, &entity.left_side, "left")?;
        let right_path = required_input(entity, &entity.right_side, "right")?;
        let left_raw = self.source.load(&left_path)?;
        let right_raw = self.source.load(&right_path)?;

        let ctx = TransformContext::new(&self.reference);
        let left_prepared = ProjectionStage::prepare(
            left_raw,
            entity.left_side.transform.as_ref(),
            &entity.primary_keys,
            &side_table_name(entity, &entity.left_side, "left"),
            &ctx,
        )?;
        let right_prepared = ProjectionStage::prepare(
            right_raw,
            entity.right_side.transform.as_ref(),
            &entity.primary_keys,
            &side_table_name(entity, &entity.right_side, "right"),
            &ctx,
        )?;
        let left = left_prepared.realize(&ctx)?;
        let right = right_prepared.realize(&ctx)?;

        let plan = SchemaValidator::validate(
            &left,
            &right,
            &entity.primary_keys,
            &entity.exclude_columns,
        )?;
        let compare = ReconciliationEngine::reconcile(&left, &right, &plan)?;
        let field_summaries = SummaryAggregator::summarize(&compare);

        Ok(EntityResult {
            compare,
            field_summaries,
        })
    }

    /// The named result relations exposed for export: `{entity}_compare` and
    /// `{entity}_compare_field_summary` per successful entity, plus the
    /// run-wide outcome ledger
    pub fn result_tables(&self) -> Vec<(String, Relation)> {
        let mut tables = Vec::new();
        for (entity, result) in &self.results {
            tables.push((format!("{}_compare", entity), result.compare.to_relation()));
            tables.push((
                format!("{}_compare_field_summary", entity),
                summary::to_relation(&result.field_summaries),
            ));
        }
        tables.push((crate::RESULTS_TABLE.to_string(), self.outcome_relation()));
        tables
    }

    /// Flat relation view of the outcome ledger
    pub fn outcome_relation(&self) -> Relation {
        let mut relation = Relation::new(vec![
            Column::new("entity", ColumnType::Text),
            Column::new("rows_left", ColumnType::Integer),
            Column::new("rows_right", ColumnType::Integer),
            Column::new("rows_fully_matched", ColumnType::Integer),
            Column::new("error_text", ColumnType::Text),
            Column::new("success", ColumnType::Boolean),
        ]);
        for outcome in self.outcomes.values() {
            let as_int = |value: Option<u64>| {
                value.map(|v| Value::Integer(v as i64)).unwrap_or(Value::Null)
            };
            relation
                .push_row(vec![
                    Value::Text(outcome.entity.clone()),
                    as_int(outcome.rows_left),
                    as_int(outcome.rows_right),
                    as_int(outcome.rows_fully_matched),
                    outcome
                        .error_text
                        .clone()
                        .map(Value::Text)
                        .unwrap_or(Value::Null),
                    Value::Boolean(outcome.success),
                ])
                .expect("ledger relation invariant");
        }
        relation
    }
}

fn required_input(entity: &EntitySpec, side: &SideSpec, label: &str) -> Result<PathBuf> {
    side.input_file.clone().ok_or_else(|| {
        RecLensError::config(format!(
            "entity '{}' {} side input file missing after defaults resolution",
            entity.entity_name, label
        ))
    })
}

fn side_table_name(entity: &EntitySpec, side: &SideSpec, label: &str) -> String {
    match &side.title {
        Some(title) => format!("{}_{}", entity.entity_name, title),
        None => format!("{}_{}", entity.entity_name, label),
    }
}

/// Resolve a glob template for one side; the first lexical match wins
fn resolve_side_glob(
    entity_name: &str,
    label: &str,
    side: &mut SideSpec,
    template: &str,
) -> Result<()> {
    if side.input_file.is_some() {
        return Ok(());
    }
    let title = side.title.clone().ok_or_else(|| {
        RecLensError::config(format!(
            "entity '{}' {} side needs a title to resolve the glob template",
            entity_name, label
        ))
    })?;
    let pattern = template
        .replace("{entity}", entity_name)
        .replace("{title}", &title);
    let mut matches: Vec<PathBuf> = glob::glob(&pattern)?.filter_map(|m| m.ok()).collect();
    matches.sort();
    match matches.into_iter().next() {
        Some(path) => {
            log::info!(
                "Resolved [{}] {} side input to {} via pattern {}",
                entity_name,
                label,
                path.display(),
                pattern
            );
            side.input_file = Some(path);
            Ok(())
        }
        None => Err(RecLensError::NoFileMatch {
            entity: entity_name.to_string(),
            side: label.to_string(),
            pattern,
        }),
    }
}
