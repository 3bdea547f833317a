#![cfg(feature = "sqlite")]

use ironbackup::source::sqlite::SqliteSource;
use ironbackup::source::{DataSource, ReadMode};
use ironbackup::testing::{
    assert_chunked, assert_same_rows, departments_batch, hired_employees_batch, seed_sqlite,
};
use ironbackup::{BackupError, ColumnType, RowBatch, Value};
use std::fs;

fn seeded() -> anyhow::Result<(tempfile::TempDir, SqliteSource)> {
    let tmp = tempfile::tempdir()?;
    let db = tmp.path().join("hr.sqlite");
    seed_sqlite(&db)?;
    let source = SqliteSource::open(&db)?;
    Ok((tmp, source))
}

#[test]
fn chunking_partitions_the_table() -> anyhow::Result<()> {
    let (_tmp, source) = seeded()?;
    for n in 1..=6 {
        let mut batches: Vec<RowBatch> = Vec::new();
        let stats = source.scan("departments", ReadMode::Chunked(n), &mut batches)?;
        assert_eq!(stats.rows, 5);
        assert_chunked(&batches, n);
        assert_same_rows(&batches, &departments_batch());
    }
    Ok(())
}

#[test]
fn whole_mode_is_one_batch() -> anyhow::Result<()> {
    let (_tmp, source) = seeded()?;
    let mut batches: Vec<RowBatch> = Vec::new();
    source.scan("hired_employees", ReadMode::Whole, &mut batches)?;
    assert_eq!(batches.len(), 1);
    assert_same_rows(&batches, &hired_employees_batch());
    Ok(())
}

#[test]
fn declared_datetime_columns_arrive_as_timestamps() -> anyhow::Result<()> {
    let (_tmp, source) = seeded()?;
    let mut batches: Vec<RowBatch> = Vec::new();
    source.scan("hired_employees", ReadMode::Chunked(10), &mut batches)?;

    let batch = &batches[0];
    let types: Vec<ColumnType> = batch.columns().iter().map(|c| c.ty).collect();
    assert_eq!(
        types,
        vec![
            ColumnType::Int,
            ColumnType::Text,
            ColumnType::Timestamp,
            ColumnType::Int,
            ColumnType::Int
        ]
    );
    assert!(batch.column_values(2).all(|v| matches!(v, Value::Timestamp(_))));
    Ok(())
}

#[test]
fn missing_table_is_a_source_error() -> anyhow::Result<()> {
    let (_tmp, source) = seeded()?;
    let mut batches: Vec<RowBatch> = Vec::new();
    let err = source
        .scan("no_such_table", ReadMode::Chunked(10), &mut batches)
        .unwrap_err();
    assert!(matches!(err, BackupError::Source { ref table, .. } if table == "no_such_table"));
    assert!(!err.is_fatal());
    assert!(batches.is_empty());
    Ok(())
}

#[test]
fn missing_or_foreign_files_fail_to_open() -> anyhow::Result<()> {
    let tmp = tempfile::tempdir()?;
    let err = SqliteSource::open(tmp.path().join("absent.sqlite")).err().expect("missing file");
    assert!(err.is_fatal());

    let junk = tmp.path().join("notes.sqlite");
    fs::write(&junk, "this is not a database, just some text long enough to have a header")?;
    let err = SqliteSource::open(&junk).err().expect("not a database");
    assert!(matches!(err, BackupError::Connection { .. }));
    Ok(())
}

#[test]
fn probe_and_describe() -> anyhow::Result<()> {
    let (tmp, source) = seeded()?;
    assert!(source.probe()?.starts_with("SQLite "));
    assert!(source.describe().starts_with("sqlite:"));
    assert!(source.describe().contains(&*tmp.path().to_string_lossy()));

    let memory = SqliteSource::from_connection(rusqlite::Connection::open_in_memory()?);
    assert_eq!(memory.describe(), "sqlite::memory:");
    Ok(())
}

fn loosely_typed() -> anyhow::Result<(tempfile::TempDir, SqliteSource)> {
    let tmp = tempfile::tempdir()?;
    let db = tmp.path().join("loose.sqlite");
    rusqlite::Connection::open(&db)?.execute_batch(
        "CREATE TABLE hired (id INTEGER, hired_at DATETIME);
         INSERT INTO hired VALUES (1, '2021-11-07 02:48:42'), (2, 'unknown'), (3, NULL);
         CREATE TABLE prices (item TEXT, price INTEGER, active BOOLEAN);
         INSERT INTO prices VALUES ('a', 10.5, 1), ('b', 3, 'yes');",
    )?;
    let source = SqliteSource::open(&db)?;
    Ok((tmp, source))
}

#[test]
fn values_that_break_the_declared_type_degrade_gracefully() -> anyhow::Result<()> {
    let (_tmp, source) = loosely_typed()?;

    let mut hired: Vec<RowBatch> = Vec::new();
    source.scan("hired", ReadMode::Whole, &mut hired)?;
    let types: Vec<ColumnType> = hired[0].columns().iter().map(|c| c.ty).collect();
    assert_eq!(types, vec![ColumnType::Int, ColumnType::Text]);
    let stamps: Vec<Value> = hired[0].column_values(1).cloned().collect();
    assert!(stamps.contains(&Value::Text("unknown".into())));
    assert!(stamps.contains(&Value::Text("2021-11-07 02:48:42".into())));

    let mut prices: Vec<RowBatch> = Vec::new();
    source.scan("prices", ReadMode::Whole, &mut prices)?;
    let types: Vec<ColumnType> = prices[0].columns().iter().map(|c| c.ty).collect();
    assert_eq!(types, vec![ColumnType::Text, ColumnType::Float, ColumnType::Text]);
    let amounts: Vec<Value> = prices[0].column_values(1).cloned().collect();
    assert!(amounts.contains(&Value::Float(10.5)));
    assert!(amounts.contains(&Value::Float(3.0)));
    Ok(())
}

#[cfg(all(feature = "io-parquet", feature = "io-avro"))]
#[test]
fn loosely_typed_tables_back_up_in_both_formats() -> anyhow::Result<()> {
    use ironbackup::BackupFormat;
    use ironbackup::config::BackupConfig;
    use ironbackup::pipeline::{Pipeline, RunRequest};
    use ironbackup::testing::FixedClock;

    let (tmp, source) = loosely_typed()?;
    let config = BackupConfig::new(tmp.path().join("backups"));
    let clock = FixedClock::ymd_hms(2024, 2, 1, 6, 0, 0);
    for format in [BackupFormat::Columnar, BackupFormat::Row] {
        let req = RunRequest::from_config(&config)
            .with_format(format)
            .with_tables(["hired", "prices"]);
        let report = Pipeline::new(&config).with_clock(&clock).run(&source, &req)?;
        assert!(report.all_succeeded(), "{format}: {:?}", report.failed().collect::<Vec<_>>());
        assert_eq!(report.succeeded().map(|j| j.rows).sum::<u64>(), 5);
    }
    Ok(())
}
