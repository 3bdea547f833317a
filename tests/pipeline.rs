#![cfg(all(feature = "io-parquet", feature = "io-avro", feature = "io-csv"))]

use ironbackup::config::BackupConfig;
use ironbackup::io::glob::artifacts_for;
use ironbackup::manifest::read_manifest;
use ironbackup::pipeline::{Pipeline, RestoreOutcome, RunRequest};
use ironbackup::testing::{FixedClock, MemorySource};
use ironbackup::{BackupFormat, Column, ColumnType, RowBatch};

fn clock() -> FixedClock {
    FixedClock::ymd_hms(2024, 1, 1, 8, 0, 0)
}

#[test]
fn manifest_records_run_and_restore_check() -> anyhow::Result<()> {
    let tmp = tempfile::tempdir()?;
    let config = BackupConfig::new(tmp.path());
    let clock = clock();
    let req = RunRequest::from_config(&config)
        .with_tables(["departments", "jobs"])
        .with_restore_check(true);

    let report = Pipeline::new(&config).with_clock(&clock).run(&MemorySource::hr(), &req)?;
    assert!(report.all_succeeded());

    let manifest_path = report.manifest.clone().map_err(anyhow::Error::msg)?;
    assert_eq!(manifest_path, tmp.path().join("manifest/manifest_20240101.json"));
    let manifest = read_manifest(&manifest_path)?;
    assert_eq!(manifest.date, "20240101");
    assert_eq!(manifest.format, BackupFormat::Columnar);
    assert_eq!(manifest.tables, vec!["departments", "jobs"]);
    assert_eq!(manifest.backup_dir, tmp.path().join("columnar"));
    assert_eq!(manifest.timestamp, "2024-01-01T08:00:00.000000");

    let check = manifest.restore_check.expect("restore check recorded");
    assert_eq!(check.table, "departments");
    assert_eq!(
        check.backup_file,
        tmp.path().join("columnar/20240101/departments_20240101080000.parquet")
    );
    assert_eq!(check.restored_files.len(), 1);
    assert!(check.restored_files[0].exists());
    assert!(check.restored_files[0].starts_with(tmp.path().join("restored")));
    Ok(())
}

#[test]
fn one_failing_table_does_not_stop_the_run() -> anyhow::Result<()> {
    let tmp = tempfile::tempdir()?;
    let config = BackupConfig::new(tmp.path());
    let clock = clock();
    let source = MemorySource::hr().without_table("jobs");

    let report = Pipeline::new(&config)
        .with_clock(&clock)
        .run(&source, &RunRequest::from_config(&config))?;

    assert!(!report.all_succeeded());
    let failed: Vec<_> = report.failed().map(|(t, _)| t).collect();
    assert_eq!(failed, vec!["jobs"]);
    assert_eq!(report.succeeded().count(), 2);

    let dir = config.format_dir(BackupFormat::Columnar);
    assert!(artifacts_for(&dir, "jobs", BackupFormat::Columnar)?.is_empty());
    assert_eq!(artifacts_for(&dir, "hired_employees", BackupFormat::Columnar)?.len(), 1);

    // attempted tables are all listed
    let manifest = read_manifest(&report.manifest.clone().map_err(anyhow::Error::msg)?)?;
    assert_eq!(manifest.tables, vec!["departments", "jobs", "hired_employees"]);
    Ok(())
}

#[test]
fn mid_scan_failure_leaves_no_partial_artifact() -> anyhow::Result<()> {
    let tmp = tempfile::tempdir()?;
    let config = BackupConfig::new(tmp.path()).with_chunk_size(1);
    let clock = clock();
    let source = MemorySource::hr().failing_after("departments", 3);

    let report = Pipeline::new(&config)
        .with_clock(&clock)
        .run(&source, &RunRequest::from_config(&config).with_tables(["departments"]))?;

    assert_eq!(report.failed().count(), 1);
    let dir = config.format_dir(BackupFormat::Columnar);
    assert!(artifacts_for(&dir, "departments", BackupFormat::Columnar)?.is_empty());
    Ok(())
}

#[test]
fn panicking_table_is_isolated() -> anyhow::Result<()> {
    let tmp = tempfile::tempdir()?;
    let config = BackupConfig::new(tmp.path());
    let clock = clock();
    let source = MemorySource::hr().panicking("departments");

    let report = Pipeline::new(&config)
        .with_clock(&clock)
        .run(&source, &RunRequest::from_config(&config))?;

    let (table, error) = report.failed().next().expect("one failure");
    assert_eq!(table, "departments");
    assert!(error.contains("panicked"));
    assert_eq!(report.succeeded().count(), 2);
    assert!(report.manifest.is_ok());
    Ok(())
}

#[test]
fn panicking_table_leaves_no_artifact() -> anyhow::Result<()> {
    let tmp = tempfile::tempdir()?;
    let config = BackupConfig::new(tmp.path()).with_chunk_size(1);
    let clock = clock();
    let source = MemorySource::hr().panicking_after("departments", 2);
    let req = RunRequest::from_config(&config).with_restore_check(true);

    let report = Pipeline::new(&config).with_clock(&clock).run(&source, &req)?;

    let (table, error) = report.failed().next().expect("one failure");
    assert_eq!(table, "departments");
    assert!(error.contains("panicked"));
    let dir = config.format_dir(BackupFormat::Columnar);
    assert!(artifacts_for(&dir, "departments", BackupFormat::Columnar)?.is_empty());
    assert!(matches!(
        report.restore,
        Some(RestoreOutcome::Skipped { ref table, .. }) if table == "departments"
    ));
    Ok(())
}

#[test]
fn unreachable_source_aborts_before_writing_anything() -> anyhow::Result<()> {
    let tmp = tempfile::tempdir()?;
    let config = BackupConfig::new(tmp.path());
    let clock = clock();

    let err = Pipeline::new(&config)
        .with_clock(&clock)
        .run(&MemorySource::hr().unreachable(), &RunRequest::from_config(&config))
        .unwrap_err();

    assert!(err.is_fatal());
    assert!(!config.manifest_dir().exists());
    assert!(!config.format_dir(BackupFormat::Columnar).exists());
    Ok(())
}

#[test]
fn runs_in_the_same_second_do_not_overwrite() -> anyhow::Result<()> {
    let tmp = tempfile::tempdir()?;
    let config = BackupConfig::new(tmp.path());
    let clock = clock();
    let req = RunRequest::from_config(&config).with_tables(["jobs"]);
    let pipeline = Pipeline::new(&config).with_clock(&clock);

    let first = pipeline.run(&MemorySource::hr(), &req)?;
    let second = pipeline.run(&MemorySource::hr(), &req)?;

    let a = &first.succeeded().next().expect("first run").path;
    let b = &second.succeeded().next().expect("second run").path;
    assert_ne!(a, b);
    assert!(a.ends_with("jobs_20240101080000.parquet"));
    assert!(b.ends_with("jobs_20240101080001.parquet"));
    assert!(a.exists() && b.exists());
    Ok(())
}

#[test]
fn empty_table_backs_up_in_both_formats() -> anyhow::Result<()> {
    let tmp = tempfile::tempdir()?;
    let config = BackupConfig::new(tmp.path());
    let clock = clock();
    let empty = RowBatch::new(vec![
        Column::new("id", ColumnType::Int),
        Column::new("name", ColumnType::Text),
    ]);
    let source = MemorySource::new().with_table("archived", empty);

    for format in [BackupFormat::Columnar, BackupFormat::Row] {
        let req = RunRequest::from_config(&config)
            .with_format(format)
            .with_tables(["archived"]);
        let report = Pipeline::new(&config).with_clock(&clock).run(&source, &req)?;
        let job = report.succeeded().next().expect("archived backed up");
        assert_eq!(job.rows, 0);
        assert_eq!(job.batches, 1);
        assert!(job.path.exists());
        assert_eq!(
            job.path.extension().and_then(|e| e.to_str()),
            Some(format.extension())
        );
    }
    Ok(())
}

#[test]
fn row_format_restore_check_fails_without_aborting() -> anyhow::Result<()> {
    let tmp = tempfile::tempdir()?;
    let config = BackupConfig::new(tmp.path());
    let clock = clock();
    let req = RunRequest::from_config(&config)
        .with_format(BackupFormat::Row)
        .with_restore_check(true);

    let report = Pipeline::new(&config).with_clock(&clock).run(&MemorySource::hr(), &req)?;
    assert_eq!(report.succeeded().count(), 3);
    assert!(matches!(
        report.restore,
        Some(RestoreOutcome::Failed { ref table, ref error })
            if table == "departments" && error.contains("not supported")
    ));

    let manifest = read_manifest(&report.manifest.clone().map_err(anyhow::Error::msg)?)?;
    assert_eq!(manifest.format, BackupFormat::Row);
    assert_eq!(manifest.backup_dir, tmp.path().join("row"));
    assert!(manifest.restore_check.is_none());
    Ok(())
}

#[test]
fn restore_check_skips_when_first_table_failed() -> anyhow::Result<()> {
    let tmp = tempfile::tempdir()?;
    let config = BackupConfig::new(tmp.path());
    let clock = clock();
    let source = MemorySource::hr().without_table("departments");
    let req = RunRequest::from_config(&config).with_restore_check(true);

    let report = Pipeline::new(&config).with_clock(&clock).run(&source, &req)?;
    assert!(matches!(
        report.restore,
        Some(RestoreOutcome::Skipped { ref table, .. }) if table == "departments"
    ));
    Ok(())
}

#[test]
fn flat_layout_and_single_batch_tables() -> anyhow::Result<()> {
    let tmp = tempfile::tempdir()?;
    let config = BackupConfig::new(tmp.path())
        .with_date_folder(false)
        .with_chunk_size(1)
        .with_single_batch(["hired_employees"]);
    let clock = clock();

    let report = Pipeline::new(&config)
        .with_clock(&clock)
        .run(&MemorySource::hr(), &RunRequest::from_config(&config))?;

    let flat = tmp.path().join("columnar");
    for job in report.succeeded() {
        assert_eq!(job.path.parent(), Some(flat.as_path()));
        let expected = if job.table == "hired_employees" { 1 } else { job.rows };
        assert_eq!(job.batches, expected);
    }
    Ok(())
}

#[test]
fn empty_table_list_is_rejected() -> anyhow::Result<()> {
    let tmp = tempfile::tempdir()?;
    let config = BackupConfig::new(tmp.path());
    let req = RunRequest::from_config(&config).with_tables(Vec::<String>::new());
    assert!(Pipeline::new(&config).run(&MemorySource::hr(), &req).is_err());
    Ok(())
}
