//! Result sinks: compressed CSV archive and SQLite database export

use crate::error::{RecLensError, Result};
use crate::progress::create_file_progress;
use crate::relation::Relation;
use crate::value::Value;
use rusqlite::Connection;
use std::fs::File;
use std::path::Path;
use tar::Builder;
use zstd::Encoder;

/// Write each named result relation as a CSV file into a zstd-compressed tar
/// archive. Compare tables can be filtered to mismatched rows only. Refuses
/// to overwrite an existing archive.
pub fn export_csv_archive(
    tables: &[(String, Relation)],
    archive_path: &Path,
    mismatches_only: bool,
) -> Result<()> {
    if archive_path.exists() {
        return Err(RecLensError::export(format!(
            "archive file '{}' already exists",
            archive_path.display()
        )));
    }

    let mut files = Vec::with_capacity(tables.len());
    for (name, relation) in tables {
        let bytes = relation_to_csv_bytes(relation, should_filter(name, mismatches_only))?;
        log::info!(
            "Exporting table: {} mismatches_only={}",
            name,
            mismatches_only
        );
        files.push((format!("{}.csv", name), bytes));
    }

    let archive_file = File::create(archive_path)?;
    let total_size: u64 = files.iter().map(|(_, content)| content.len() as u64).sum();
    let progress = create_file_progress(total_size, "Creating archive");

    let mut encoder = Encoder::new(archive_file, 3)?;
    {
        let mut tar_builder = Builder::new(&mut encoder);
        let mut processed = 0u64;
        for (filename, content) in &files {
            let mut header = tar::Header::new_gnu();
            header.set_size(content.len() as u64);
            header.set_mode(0o644);
            header.set_cksum();
            tar_builder.append_data(&mut header, filename, content.as_slice())?;
            processed += content.len() as u64;
            progress.set_position(processed);
        }
        tar_builder.finish()?;
    }
    encoder.finish()?;
    progress.finish_with_message("Archive created");

    log::info!("Archive created at: {}", archive_path.display());
    Ok(())
}

/// Write each named result relation into a SQLite database file. Tables
/// larger than `sample_threshold` rows are stride-sampled down to roughly
/// the threshold (deterministic, unlike random sampling, so re-exports are
/// comparable); a threshold of zero disables sampling. Refuses to overwrite
/// an existing file.
pub fn export_sqlite(
    tables: &[(String, Relation)],
    db_path: &Path,
    mismatches_only: bool,
    sample_threshold: u64,
) -> Result<()> {
    if db_path.exists() {
        return Err(RecLensError::export(format!(
            "SQLite database file '{}' already exists",
            db_path.display()
        )));
    }

    let mut connection = Connection::open(db_path)?;
    let tx = connection.transaction()?;
    for (name, relation) in tables {
        log::info!("Exporting table: {}", name);
        let create = format!(
            "CREATE TABLE \"{}\" ({})",
            name,
            relation
                .columns()
                .iter()
                .map(|c| format!("\"{}\" {}", c.name, sqlite_type(c)))
                .collect::<Vec<_>>()
                .join(", ")
        );
        tx.execute(&create, [])?;

        let insert = format!(
            "INSERT INTO \"{}\" VALUES ({})",
            name,
            vec!["?"; relation.column_count()].join(", ")
        );
        let mut statement = tx.prepare(&insert)?;

        let rows = selected_rows(relation, should_filter(name, mismatches_only));
        let sampled = stride_sample(rows, sample_threshold);
        let exported = sampled.len();
        for row in sampled {
            let params: Vec<rusqlite::types::Value> =
                row.iter().map(to_sql_value).collect();
            statement.execute(rusqlite::params_from_iter(params))?;
        }
        log::info!("Exported {} rows from {}", exported, name);
    }
    tx.commit()?;

    Ok(())
}

/// Mismatch filtering applies only to per-entity compare tables
fn should_filter(table_name: &str, mismatches_only: bool) -> bool {
    mismatches_only && table_name.ends_with("_compare")
}

fn selected_rows<'a>(relation: &'a Relation, mismatches_only: bool) -> Vec<&'a Vec<Value>> {
    match (mismatches_only, relation.column_index("_full_match")) {
        (true, Some(index)) => relation
            .rows()
            .iter()
            .filter(|row| row[index] == Value::Boolean(false))
            .collect(),
        _ => relation.rows().iter().collect(),
    }
}

fn stride_sample(rows: Vec<&Vec<Value>>, threshold: u64) -> Vec<&Vec<Value>> {
    if threshold == 0 || rows.len() as u64 <= threshold {
        return rows;
    }
    log::info!("sampling {} rows of {}", threshold, rows.len());
    let stride = (rows.len() as u64).div_ceil(threshold) as usize;
    rows.into_iter().step_by(stride).collect()
}

fn relation_to_csv_bytes(relation: &Relation, mismatches_only: bool) -> Result<Vec<u8>> {
    let mut writer = csv::Writer::from_writer(Vec::new());
    writer.write_record(relation.column_names())?;
    for row in selected_rows(relation, mismatches_only) {
        writer.write_record(row.iter().map(Value::render))?;
    }
    writer
        .into_inner()
        .map_err(|e| RecLensError::export(format!("failed to flush CSV writer: {}", e)))
}

fn sqlite_type(column: &crate::relation::Column) -> &'static str {
    use crate::value::ColumnType;
    match column.column_type {
        ColumnType::Boolean | ColumnType::Integer => "INTEGER",
        ColumnType::Float => "REAL",
        ColumnType::Text => "TEXT",
    }
}

fn to_sql_value(value: &Value) -> rusqlite::types::Value {
    use rusqlite::types::Value as Sql;
    match value {
        Value::Null => Sql::Null,
        Value::Boolean(b) => Sql::Integer(*b as i64),
        Value::Integer(i) => Sql::Integer(*i),
        Value::Float(f) => Sql::Real(*f),
        Value::Text(s) => Sql::Text(s.clone()),
    }
}
