//! Full pipeline tests: configured run through to exported results

use crate::common::{sample_data, TestFixture};
use reclens::export::export_sqlite;
use reclens::run::ReconRun;
use reclens::RunConfig;
use rusqlite::Connection;
use serde_json::json;

#[test]
fn test_run_results_export_and_query_back() {
    let fixture = TestFixture::new().unwrap();
    let trade_left = fixture
        .create_csv("trade_left.csv", &sample_data::matching_trades())
        .unwrap();
    let trade_right = fixture
        .create_csv("trade_right.csv", &sample_data::drifted_trades())
        .unwrap();
    let position_left = fixture
        .create_csv(
            "position_left.csv",
            &[vec!["trade_id", "qty"], vec!["1", "100"], vec!["2", "20"]],
        )
        .unwrap();
    let position_right = fixture
        .create_csv(
            "position_right.csv",
            &[vec!["trade_id", "qty"], vec!["1", "100"], vec!["2", "20"]],
        )
        .unwrap();
    let config: RunConfig = serde_json::from_value(json!({
        "entities": [
            {
                "entityName": "trade",
                "leftSide": {"inputFile": trade_left},
                "rightSide": {"inputFile": trade_right},
                "primaryKeys": ["trade_id"]
            },
            {
                "entityName": "position",
                "leftSide": {"inputFile": position_left},
                "rightSide": {"inputFile": position_right},
                "primaryKeys": ["trade_id"]
            }
        ]
    }))
    .unwrap();

    let mut run = ReconRun::new("pipeline_run", config);
    run.execute(true).unwrap();

    let tables = run.result_tables();
    let names: Vec<&str> = tables.iter().map(|(name, _)| name.as_str()).collect();
    assert_eq!(
        names,
        vec![
            "trade_compare",
            "trade_compare_field_summary",
            "position_compare",
            "position_compare_field_summary",
            "entity_compare_results"
        ]
    );

    let db_path = fixture.path("pipeline_run.sqlite");
    export_sqlite(&tables, &db_path, false, 0).unwrap();

    let connection = Connection::open(&db_path).unwrap();

    let ledger: i64 = connection
        .query_row(
            "SELECT COUNT(*) FROM entity_compare_results WHERE success = 1",
            [],
            |r| r.get(0),
        )
        .unwrap();
    assert_eq!(ledger, 2);

    // trade keys {1,2,3} on the left and {1,2,4} on the right align to 4 rows
    let trade_rows: i64 = connection
        .query_row("SELECT COUNT(*) FROM trade_compare", [], |r| r.get(0))
        .unwrap();
    assert_eq!(trade_rows, 4);

    let mismatched: i64 = connection
        .query_row(
            "SELECT COUNT(*) FROM trade_compare WHERE _full_match = 0",
            [],
            |r| r.get(0),
        )
        .unwrap();
    assert_eq!(mismatched, 3);

    // position matches fully and its summary reflects that
    let qty_pct: f64 = connection
        .query_row(
            "SELECT match_percentage FROM position_compare_field_summary WHERE field = 'qty'",
            [],
            |r| r.get(0),
        )
        .unwrap();
    assert_eq!(qty_pct, 100.0);
}

#[test]
fn test_excluded_columns_are_carried_but_not_compared() {
    let fixture = TestFixture::new().unwrap();
    let left = fixture
        .create_csv(
            "left.csv",
            &[
                vec!["trade_id", "price", "audit_ts"],
                vec!["1", "150.00", "2026-08-01T10:00:00"],
            ],
        )
        .unwrap();
    let right = fixture
        .create_csv(
            "right.csv",
            &[
                vec!["trade_id", "price", "audit_ts"],
                vec!["1", "150.00", "2026-08-02T09:30:00"],
            ],
        )
        .unwrap();
    let config: RunConfig = serde_json::from_value(json!({
        "entities": [{
            "entityName": "trade",
            "leftSide": {"inputFile": left},
            "rightSide": {"inputFile": right},
            "primaryKeys": ["trade_id"],
            "excludeColumns": ["audit_ts"]
        }]
    }))
    .unwrap();

    let mut run = ReconRun::new("test_run", config);
    run.execute(false).unwrap();

    // timestamps differ but the row still fully matches
    assert_eq!(run.outcomes()["trade"].rows_fully_matched, Some(1));

    let result = run.entity_result("trade").unwrap();
    assert!(result
        .field_summaries
        .iter()
        .all(|summary| summary.field != "audit_ts"));
    let flat = result.compare.to_relation();
    // excluded values are still carried per side for inspection
    assert!(flat.column_index("audit_ts_left").is_some());
    assert!(flat.column_index("audit_ts_right").is_some());
    assert!(flat.column_index("audit_ts_match").is_none());
}

#[test]
fn test_filter_transform_narrows_one_side() {
    let fixture = TestFixture::new().unwrap();
    let left = fixture
        .create_csv(
            "left.csv",
            &[
                vec!["trade_id", "price", "status"],
                vec!["1", "150.00", "live"],
                vec!["2", "2500.50", "cancelled"],
            ],
        )
        .unwrap();
    let right = fixture
        .create_csv(
            "right.csv",
            &[
                vec!["trade_id", "price", "status"],
                vec!["1", "150.00", "live"],
            ],
        )
        .unwrap();
    let config: RunConfig = serde_json::from_value(json!({
        "entities": [{
            "entityName": "trade",
            "leftSide": {
                "inputFile": left,
                "transform": {
                    "filters": [{"column": "status", "op": "eq", "value": "live"}]
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
    // the cancelled trade is filtered out before comparison
    assert_eq!(outcome.rows_left, Some(1));
    assert_eq!(outcome.rows_fully_matched, Some(1));
}
