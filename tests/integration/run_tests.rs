//! End-to-end orchestration tests over configured runs

use crate::common::{sample_data, TestFixture};
use reclens::run::{ReconRun, RunState};
use reclens::{RecLensError, RunConfig};
use serde_json::json;

fn load_config(fixture: &TestFixture, config: &serde_json::Value) -> RunConfig {
    let path = fixture.create_json("compare.json", config).unwrap();
    RunConfig::from_file(&path).unwrap()
}

#[test]
fn test_identical_inputs_fully_match() {
    let fixture = TestFixture::new().unwrap();
    let left = fixture
        .create_csv("left.csv", &sample_data::matching_trades())
        .unwrap();
    let right = fixture
        .create_csv("right.csv", &sample_data::matching_trades())
        .unwrap();
    let config = load_config(&fixture, &sample_data::entity_config("trade", &left, &right));

    let mut run = ReconRun::new("test_run", config);
    run.execute(false).unwrap();

    assert_eq!(run.state(), RunState::Completed);
    let outcome = &run.outcomes()["trade"];
    assert!(outcome.success);
    assert_eq!(outcome.rows_left, Some(3));
    assert_eq!(outcome.rows_right, Some(3));
    assert_eq!(outcome.rows_fully_matched, Some(3));
}

#[test]
fn test_drifted_inputs_report_partial_match() {
    let fixture = TestFixture::new().unwrap();
    let left = fixture
        .create_csv("left.csv", &sample_data::matching_trades())
        .unwrap();
    let right = fixture
        .create_csv("right.csv", &sample_data::drifted_trades())
        .unwrap();
    let config = load_config(&fixture, &sample_data::entity_config("trade", &left, &right));

    let mut run = ReconRun::new("test_run", config);
    run.execute(false).unwrap();

    let outcome = &run.outcomes()["trade"];
    assert_eq!(outcome.rows_left, Some(3));
    assert_eq!(outcome.rows_right, Some(3));
    // only trade 2 agrees on every field
    assert_eq!(outcome.rows_fully_matched, Some(1));

    let result = run.entity_result("trade").unwrap();
    let price = result
        .field_summaries
        .iter()
        .find(|s| s.field == "price")
        .unwrap();
    // trades 1 and 2 exist on both sides; only trade 2's price agrees
    assert_eq!(price.total, 2);
    assert_eq!(price.matches, 1);
    assert_eq!(price.match_percentage, Some(50.0));
}

#[test]
fn test_duplicate_entity_names_abort_before_any_comparison() {
    let fixture = TestFixture::new().unwrap();
    let left = fixture
        .create_csv("left.csv", &sample_data::matching_trades())
        .unwrap();
    let right = fixture
        .create_csv("right.csv", &sample_data::matching_trades())
        .unwrap();
    let entity = json!({
        "entityName": "trade",
        "leftSide": {"inputFile": left},
        "rightSide": {"inputFile": right},
        "primaryKeys": ["trade_id"]
    });
    let config: RunConfig =
        serde_json::from_value(json!({"entities": [entity.clone(), entity]})).unwrap();

    let mut run = ReconRun::new("test_run", config);
    let err = run.execute(true).unwrap_err();

    assert!(matches!(err, RecLensError::DuplicateEntityName { .. }));
    // configuration errors never reach the ledger
    assert!(run.outcomes().is_empty());
    assert_ne!(run.state(), RunState::Completed);
}

#[test]
fn test_continue_on_error_isolates_failing_entity() {
    let fixture = TestFixture::new().unwrap();
    let left = fixture
        .create_csv("left.csv", &sample_data::matching_trades())
        .unwrap();
    let right = fixture
        .create_csv("right.csv", &sample_data::matching_trades())
        .unwrap();
    let missing = fixture.path("does_not_exist.csv");
    let config: RunConfig = serde_json::from_value(json!({
        "entities": [
            {
                "entityName": "bad",
                "leftSide": {"inputFile": missing},
                "rightSide": {"inputFile": right},
                "primaryKeys": ["trade_id"]
            },
            {
                "entityName": "good",
                "leftSide": {"inputFile": left},
                "rightSide": {"inputFile": right},
                "primaryKeys": ["trade_id"]
            }
        ]
    }))
    .unwrap();

    let mut run = ReconRun::new("test_run", config);
    run.execute(true).unwrap();

    assert_eq!(run.state(), RunState::Completed);
    assert_eq!(run.outcomes().len(), 2);

    let bad = &run.outcomes()["bad"];
    assert!(!bad.success);
    assert!(bad.error_text.is_some());
    assert_eq!(bad.rows_left, None);

    let good = &run.outcomes()["good"];
    assert!(good.success);
    assert_eq!(good.rows_fully_matched, Some(3));
}

#[test]
fn test_halt_on_first_error_stops_processing() {
    let fixture = TestFixture::new().unwrap();
    let right = fixture
        .create_csv("right.csv", &sample_data::matching_trades())
        .unwrap();
    let left = fixture
        .create_csv("left.csv", &sample_data::matching_trades())
        .unwrap();
    let missing = fixture.path("does_not_exist.csv");
    let config: RunConfig = serde_json::from_value(json!({
        "entities": [
            {
                "entityName": "bad",
                "leftSide": {"inputFile": missing},
                "rightSide": {"inputFile": right},
                "primaryKeys": ["trade_id"]
            },
            {
                "entityName": "never_reached",
                "leftSide": {"inputFile": left},
                "rightSide": {"inputFile": right},
                "primaryKeys": ["trade_id"]
            }
        ]
    }))
    .unwrap();

    let mut run = ReconRun::new("test_run", config);
    let err = run.execute(false).unwrap_err();

    assert!(matches!(err, RecLensError::SourceNotFound { .. }));
    assert_eq!(run.state(), RunState::Failed);
    assert_eq!(run.outcomes().len(), 1);
    assert!(!run.outcomes()["bad"].success);
}

#[test]
fn test_second_execute_is_rejected() {
    let fixture = TestFixture::new().unwrap();
    let left = fixture
        .create_csv("left.csv", &sample_data::matching_trades())
        .unwrap();
    let right = fixture
        .create_csv("right.csv", &sample_data::matching_trades())
        .unwrap();
    let config = load_config(&fixture, &sample_data::entity_config("trade", &left, &right));

    let mut run = ReconRun::new("test_run", config);
    run.execute(false).unwrap();
    let err = run.execute(false).unwrap_err();
    assert!(matches!(err, RecLensError::AlreadyExecuted));
}

#[test]
fn test_glob_template_resolves_side_inputs() {
    let fixture = TestFixture::new().unwrap();
    fixture
        .create_csv("trade_system_1_20260801.csv", &sample_data::matching_trades())
        .unwrap();
    fixture
        .create_csv("trade_system_2_20260801.csv", &sample_data::matching_trades())
        .unwrap();
    let template = format!("{}/{{entity}}_{{title}}_*.csv", fixture.root().display());
    let config: RunConfig = serde_json::from_value(json!({
        "defaults": {
            "leftSideTitle": "system_1",
            "rightSideTitle": "system_2",
            "filePatternGlobTemplate": template
        },
        "entities": [{
            "entityName": "trade",
            "leftSide": {},
            "rightSide": {},
            "primaryKeys": ["trade_id"]
        }]
    }))
    .unwrap();

    let mut run = ReconRun::new("test_run", config);
    run.execute(false).unwrap();
    assert!(run.outcomes()["trade"].success);
}

#[test]
fn test_glob_template_with_no_match_fails() {
    let fixture = TestFixture::new().unwrap();
    let template = format!("{}/{{entity}}_{{title}}_*.csv", fixture.root().display());
    let config: RunConfig = serde_json::from_value(json!({
        "defaults": {
            "leftSideTitle": "system_1",
            "rightSideTitle": "system_2",
            "filePatternGlobTemplate": template
        },
        "entities": [{
            "entityName": "trade",
            "leftSide": {},
            "rightSide": {},
            "primaryKeys": ["trade_id"]
        }]
    }))
    .unwrap();

    let mut run = ReconRun::new("test_run", config);
    let err = run.execute(true).unwrap_err();
    assert!(matches!(
        err,
        RecLensError::NoFileMatch { entity, side, .. } if entity == "trade" && side == "left"
    ));
    assert!(run.outcomes().is_empty());
}

#[test]
fn test_missing_reference_dataset_aborts_before_any_entity() {
    let fixture = TestFixture::new().unwrap();
    let left = fixture
        .create_csv("left.csv", &sample_data::matching_trades())
        .unwrap();
    let right = fixture
        .create_csv("right.csv", &sample_data::matching_trades())
        .unwrap();
    let missing = fixture.path("no_such_map.csv");
    let config: RunConfig = serde_json::from_value(json!({
        "referenceDatasets": [{"datasetName": "id_map", "inputFile": missing}],
        "entities": [{
            "entityName": "trade",
            "leftSide": {"inputFile": left},
            "rightSide": {"inputFile": right},
            "primaryKeys": ["trade_id"]
        }]
    }))
    .unwrap();

    let mut run = ReconRun::new("test_run", config);
    let err = run.execute(true).unwrap_err();

    assert!(matches!(err, RecLensError::SourceNotFound { .. }));
    // reference data loads before any entity runs, so nothing reaches the ledger
    assert!(run.outcomes().is_empty());
    assert_ne!(run.state(), RunState::Completed);
}

#[test]
fn test_reference_lookup_aligns_differing_key_spaces() {
    let fixture = TestFixture::new().unwrap();
    // system 1 keys trades by internal id, system 2 by external id
    let left = fixture
        .create_csv(
            "left.csv",
            &[
                vec!["internal_id", "price"],
                vec!["1", "150.00"],
                vec!["2", "2500.50"],
            ],
        )
        .unwrap();
    let right = fixture
        .create_csv(
            "right.csv",
            &[
                vec!["trade_id", "price"],
                vec!["10", "150.00"],
                vec!["20", "2500.50"],
            ],
        )
        .unwrap();
    let id_map = fixture
        .create_csv(
            "id_map.csv",
            &[
                vec!["internal_id", "external_id"],
                vec!["1", "10"],
                vec!["2", "20"],
            ],
        )
        .unwrap();
    let config: RunConfig = serde_json::from_value(json!({
        "referenceDatasets": [{"datasetName": "id_map", "inputFile": id_map}],
        "entities": [{
            "entityName": "trade",
            "leftSide": {
                "inputFile": left,
                "transform": {
                    "lookup": {
                        "dataset": "id_map",
                        "matchColumn": "internal_id",
                        "datasetKey": "internal_id",
                        "fetch": [{"column": "external_id", "rename": "trade_id"}]
                    },
                    "select": [
                        {"column": "trade_id"},
                        {"column": "price"}
                    ],
                    "cached": true
                }
            },
            "rightSide": {"inputFile": right},
            "primaryKeys": ["trade_id"]
        }]
    }))
    .unwrap();

    let mut run = ReconRun::new("test_run", config);
    run.execute(false).unwrap();

    let outcome = &run.outcomes()["trade"];
    assert!(outcome.success);
    assert_eq!(outcome.rows_left, Some(2));
    assert_eq!(outcome.rows_fully_matched, Some(2));
}

#[test]
fn test_cached_transform_duplicate_keys_fail_the_entity() {
    let fixture = TestFixture::new().unwrap();
    let left = fixture
        .create_csv(
            "left.csv",
            &[
                vec!["trade_id", "price"],
                vec!["1", "150.00"],
                vec!["1", "151.00"],
            ],
        )
        .unwrap();
    let right = fixture
        .create_csv(
            "right.csv",
            &[vec!["trade_id", "price"], vec!["1", "150.00"]],
        )
        .unwrap();
    let config: RunConfig = serde_json::from_value(json!({
        "entities": [{
            "entityName": "trade",
            "leftSide": {"inputFile": left, "transform": {"cached": true}},
            "rightSide": {"inputFile": right},
            "primaryKeys": ["trade_id"]
        }]
    }))
    .unwrap();

    let mut run = ReconRun::new("test_run", config);
    let err = run.execute(false).unwrap_err();
    assert!(matches!(err, RecLensError::DuplicateKey { .. }));
    assert!(!run.outcomes()["trade"].success);
}

#[test]
fn test_schema_mismatch_is_reported_per_entity() {
    let fixture = TestFixture::new().unwrap();
    let left = fixture
        .create_csv(
            "left.csv",
            &[vec!["trade_id", "price"], vec!["1", "150.00"]],
        )
        .unwrap();
    let right = fixture
        .create_csv(
            "right.csv",
            &[vec!["trade_id", "price"], vec!["1", "abc"]],
        )
        .unwrap();
    let config = load_config(&fixture, &sample_data::entity_config("trade", &left, &right));

    let mut run = ReconRun::new("test_run", config);
    let err = run.execute(false).unwrap_err();
    // price infers Float on the left and Text on the right
    assert!(matches!(
        err,
        RecLensError::TypeMismatch { column, .. } if column == "price"
    ));
}
