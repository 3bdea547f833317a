#![cfg(all(feature = "io-parquet", feature = "io-csv"))]

use ironbackup::config::BackupConfig;
use ironbackup::job::BackupJob;
use ironbackup::restore::{restore_artifact, restored_path};
use ironbackup::testing::{FixedClock, MemorySource, hr_tables};
use chrono::NaiveDate;
use ironbackup::{BackupError, BackupFormat, Column, ColumnType, RowBatch, Value};
use std::fs;
use std::path::Path;

fn read_csv(path: &Path) -> anyhow::Result<(Vec<String>, Vec<Vec<String>>)> {
    let mut reader = csv::Reader::from_path(path)?;
    let header = reader.headers()?.iter().map(str::to_string).collect();
    let mut rows = Vec::new();
    for record in reader.records() {
        rows.push(record?.iter().map(str::to_string).collect());
    }
    Ok((header, rows))
}

#[test]
fn every_hr_table_restores_with_same_shape() -> anyhow::Result<()> {
    let tmp = tempfile::tempdir()?;
    let config = BackupConfig::new(tmp.path()).with_chunk_size(2);
    let clock = FixedClock::ymd_hms(2024, 3, 1, 9, 15, 0);
    let job = BackupJob::new(&config, &clock);
    let source = MemorySource::hr();

    for (table, batch) in hr_tables() {
        let outcome = job.run(&source, table, BackupFormat::Columnar)?;
        let report = restore_artifact(&outcome.path, &config.restore_dir)?;
        assert_eq!(report.output, restored_path(&outcome.path, &config.restore_dir));
        assert_eq!(report.rows, batch.len() as u64);

        let expected: Vec<String> = batch.column_names().map(str::to_string).collect();
        assert_eq!(report.columns, expected);

        let (header, rows) = read_csv(&report.output)?;
        assert_eq!(header, expected);
        assert_eq!(rows.len(), batch.len());
    }
    Ok(())
}

#[test]
fn timestamps_restore_as_iso_text() -> anyhow::Result<()> {
    let tmp = tempfile::tempdir()?;
    let config = BackupConfig::new(tmp.path());
    let clock = FixedClock::ymd_hms(2024, 3, 1, 9, 15, 0);
    let outcome =
        BackupJob::new(&config, &clock).run(&MemorySource::hr(), "hired_employees", BackupFormat::Columnar)?;

    let report = restore_artifact(&outcome.path, &config.restore_dir)?;
    let (header, rows) = read_csv(&report.output)?;
    let at = header.iter().position(|h| h == "datetime").expect("datetime column");
    assert!(rows.iter().any(|r| r[at] == "2023-01-15T08:30:00"));
    Ok(())
}

#[test]
fn sub_second_timestamps_keep_their_fraction() -> anyhow::Result<()> {
    let tmp = tempfile::tempdir()?;
    let config = BackupConfig::new(tmp.path());
    let clock = FixedClock::ymd_hms(2024, 3, 1, 9, 15, 0);
    let at = NaiveDate::from_ymd_opt(2023, 6, 30)
        .and_then(|d| d.and_hms_milli_opt(23, 59, 59, 250))
        .expect("valid timestamp");
    let batch = RowBatch::from_rows(
        vec![Column::new("id", ColumnType::Int), Column::new("at", ColumnType::Timestamp)],
        vec![vec![Value::Int(1), Value::Timestamp(at)]],
    );
    let source = MemorySource::new().with_table("events", batch);
    let outcome = BackupJob::new(&config, &clock).run(&source, "events", BackupFormat::Columnar)?;

    let report = restore_artifact(&outcome.path, &config.restore_dir)?;
    let (_, rows) = read_csv(&report.output)?;
    assert_eq!(rows, vec![vec!["1".to_string(), "2023-06-30T23:59:59.250".to_string()]]);
    Ok(())
}

#[test]
fn empty_table_restores_to_header_only_csv() -> anyhow::Result<()> {
    let tmp = tempfile::tempdir()?;
    let config = BackupConfig::new(tmp.path());
    let clock = FixedClock::ymd_hms(2024, 3, 1, 9, 15, 0);
    let empty = RowBatch::new(vec![
        Column::new("id", ColumnType::Int),
        Column::new("title", ColumnType::Text),
    ]);
    let source = MemorySource::new().with_table("archived", empty);
    let outcome = BackupJob::new(&config, &clock).run(&source, "archived", BackupFormat::Columnar)?;

    let report = restore_artifact(&outcome.path, &config.restore_dir)?;
    assert_eq!(report.rows, 0);
    let (header, rows) = read_csv(&report.output)?;
    assert_eq!(header, vec!["id", "title"]);
    assert!(rows.is_empty());
    Ok(())
}

#[cfg(feature = "io-avro")]
#[test]
fn row_format_artifacts_are_not_restorable() -> anyhow::Result<()> {
    let tmp = tempfile::tempdir()?;
    let config = BackupConfig::new(tmp.path());
    let clock = FixedClock::ymd_hms(2024, 3, 1, 9, 15, 0);
    let outcome = BackupJob::new(&config, &clock).run(&MemorySource::hr(), "jobs", BackupFormat::Row)?;

    let err = restore_artifact(&outcome.path, &config.restore_dir).unwrap_err();
    assert!(matches!(err, BackupError::UnsupportedRestoreFormat { .. }));
    assert!(!restored_path(&outcome.path, &config.restore_dir).exists());
    Ok(())
}

#[test]
fn corrupt_artifact_leaves_no_csv() -> anyhow::Result<()> {
    let tmp = tempfile::tempdir()?;
    let artifact = tmp.path().join("jobs_20240301091500.parquet");
    fs::write(&artifact, b"PAR1 not really parquet")?;
    let out = tmp.path().join("restored");

    assert!(restore_artifact(&artifact, &out).is_err());
    assert!(!restored_path(&artifact, &out).exists());
    Ok(())
}

#[test]
fn missing_artifact_is_not_found() -> anyhow::Result<()> {
    let tmp = tempfile::tempdir()?;
    let err = restore_artifact(&tmp.path().join("gone_20240301091500.parquet"), tmp.path()).unwrap_err();
    assert!(matches!(err, BackupError::Io(ref e) if e.kind() == std::io::ErrorKind::NotFound));
    Ok(())
}
