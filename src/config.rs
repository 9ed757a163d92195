//! Run configuration: entity specs, defaults, and reference datasets

use crate::error::{RecLensError, Result};
use crate::transform::TransformSpec;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fs;
use std::path::{Path, PathBuf};

/// One configured comparison unit: a pair of corresponding datasets plus
/// keys and exclusions. Constructed from validated configuration and only
/// mutated once, by defaults resolution, before any comparison begins.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct EntitySpec {
    pub entity_name: String,
    pub left_side: SideSpec,
    pub right_side: SideSpec,
    pub primary_keys: Vec<String>,
    #[serde(default)]
    pub exclude_columns: Vec<String>,
    /// Declared but not scheduled; reserved for future ordering support
    #[serde(default)]
    pub dependencies: Vec<String>,
}

/// One of the two datasets being compared for an entity
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct SideSpec {
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub input_file: Option<PathBuf>,
    #[serde(default)]
    pub transform: Option<TransformSpec>,
}

/// Run-level defaults applied to entities during defaults resolution
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct Defaults {
    #[serde(default)]
    pub left_side_title: Option<String>,
    #[serde(default)]
    pub right_side_title: Option<String>,
    /// Glob template with `{entity}` and `{title}` placeholders, used to
    /// locate side input files that have no explicit path
    #[serde(default)]
    pub file_pattern_glob_template: Option<String>,
}

/// A named shared lookup table usable by transform projections
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct ReferenceDatasetSpec {
    pub dataset_name: String,
    pub input_file: PathBuf,
}

/// Full configuration of a comparison run
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct RunConfig {
    pub entities: Vec<EntitySpec>,
    #[serde(default)]
    pub defaults: Option<Defaults>,
    #[serde(default)]
    pub reference_datasets: Vec<ReferenceDatasetSpec>,
}

impl RunConfig {
    /// Load and validate a JSON configuration file
    pub fn from_file(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Err(RecLensError::source_not_found(path));
        }
        let content = fs::read_to_string(path)?;
        let config: RunConfig = serde_json::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// Validate names, titles, key lists, and uniqueness constraints.
    /// Titles are only checked when set; defaults resolution may fill them
    /// later, after which the orchestrator validates again.
    pub fn validate(&self) -> Result<()> {
        if let Some(defaults) = &self.defaults {
            if let Some(title) = &defaults.left_side_title {
                validate_identifier(title, "defaults leftSideTitle")?;
            }
            if let Some(title) = &defaults.right_side_title {
                validate_identifier(title, "defaults rightSideTitle")?;
            }
        }

        for entity in &self.entities {
            validate_identifier(&entity.entity_name, "entity name")?;
            if let Some(title) = &entity.left_side.title {
                validate_identifier(title, "leftSide title")?;
            }
            if let Some(title) = &entity.right_side.title {
                validate_identifier(title, "rightSide title")?;
            }
            if entity.primary_keys.is_empty() {
                return Err(RecLensError::config(format!(
                    "entity '{}' declares no primary keys",
                    entity.entity_name
                )));
            }
        }

        if let Some(names) = duplicated(self.entities.iter().map(|e| e.entity_name.as_str())) {
            return Err(RecLensError::DuplicateEntityName { names });
        }
        if let Some(names) = duplicated(
            self.reference_datasets
                .iter()
                .map(|d| d.dataset_name.as_str()),
        ) {
            return Err(RecLensError::DuplicateDatasetName { names });
        }

        Ok(())
    }
}

/// Names must start with a letter or underscore and contain only letters,
/// numbers, and underscores
pub fn is_identifier(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

fn validate_identifier(name: &str, context: &str) -> Result<()> {
    if !is_identifier(name) {
        return Err(RecLensError::config(format!(
            "invalid {} '{}': must start with a letter or underscore and contain only letters, numbers, and underscores",
            context, name
        )));
    }
    Ok(())
}

fn duplicated<'a>(names: impl Iterator<Item = &'a str>) -> Option<Vec<String>> {
    let mut seen = BTreeSet::new();
    let mut dupes = BTreeSet::new();
    for name in names {
        if !seen.insert(name) {
            dupes.insert(name.to_string());
        }
    }
    if dupes.is_empty() {
        None
    } else {
        Some(dupes.into_iter().collect())
    }
}
