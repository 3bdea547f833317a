//! Pre-built tables for tests: the three HR tables the pipeline backs up by
//! default, plus a batch touching every column type.

use crate::batch::{Column, ColumnType, RowBatch, Value};
use chrono::NaiveDate;

fn ts(y: i32, m: u32, d: u32, h: u32, min: u32) -> Value {
    NaiveDate::from_ymd_opt(y, m, d)
        .and_then(|date| date.and_hms_opt(h, min, 0))
        .map_or(Value::Null, Value::Timestamp)
}

fn id_name(rows: &[(i64, &str)]) -> RowBatch {
    RowBatch::from_rows(
        vec![
            Column::new("id", ColumnType::Int),
            Column::new("name", ColumnType::Text),
        ],
        rows.iter()
            .map(|(id, name)| vec![Value::Int(*id), Value::from(*name)])
            .collect(),
    )
}

/// `departments(id, name)`, five rows.
///
/// # Example
///
/// ```
/// use ironbackup::testing::departments_batch;
///
/// let batch = departments_batch();
/// assert_eq!(batch.len(), 5);
/// ```
#[must_use]
pub fn departments_batch() -> RowBatch {
    id_name(&[
        (1, "IT"),
        (2, "HR"),
        (3, "Finance"),
        (4, "Legal"),
        (5, "Operations"),
    ])
}

/// `jobs(id, name)`, three rows.
#[must_use]
pub fn jobs_batch() -> RowBatch {
    id_name(&[(1, "Developer"), (2, "Manager"), (3, "Analyst")])
}

/// `hired_employees(id, name, datetime, department_id, job_id)`, four rows,
/// one with null foreign keys.
#[must_use]
pub fn hired_employees_batch() -> RowBatch {
    RowBatch::from_rows(
        vec![
            Column::new("id", ColumnType::Int),
            Column::new("name", ColumnType::Text),
            Column::new("datetime", ColumnType::Timestamp),
            Column::new("department_id", ColumnType::Int),
            Column::new("job_id", ColumnType::Int),
        ],
        vec![
            vec![Value::Int(1), "Juan Perez".into(), ts(2023, 1, 15, 8, 30), Value::Int(1), Value::Int(1)],
            vec![Value::Int(2), "Maria Garcia".into(), ts(2023, 2, 20, 9, 15), Value::Int(2), Value::Int(2)],
            vec![Value::Int(3), "Carlos Lopez".into(), ts(2023, 3, 10, 10, 0), Value::Int(3), Value::Int(3)],
            vec![Value::Int(4), "Ana Torres".into(), ts(2023, 4, 2, 14, 45), Value::Null, Value::Null],
        ],
    )
}

/// The default table set, in backup order.
#[must_use]
pub fn hr_tables() -> Vec<(&'static str, RowBatch)> {
    vec![
        ("departments", departments_batch()),
        ("jobs", jobs_batch()),
        ("hired_employees", hired_employees_batch()),
    ]
}

/// One column of every type, with a null in each.
#[must_use]
pub fn typed_batch() -> RowBatch {
    RowBatch::from_rows(
        vec![
            Column::new("id", ColumnType::Int),
            Column::new("score", ColumnType::Float),
            Column::new("active", ColumnType::Bool),
            Column::new("seen_at", ColumnType::Timestamp),
            Column::new("note", ColumnType::Text),
        ],
        vec![
            vec![
                Value::Int(i64::MAX),
                Value::Float(0.5),
                Value::Bool(true),
                ts(2024, 2, 29, 23, 59),
                "first".into(),
            ],
            vec![Value::Int(-1), Value::Null, Value::Bool(false), Value::Null, Value::Null],
            vec![Value::Null, Value::Float(-2.25), Value::Null, ts(1999, 12, 31, 0, 0), "".into()],
        ],
    )
}

/// Create the HR tables in a SQLite database at `path` and fill them with the
/// fixture rows. Existing tables are dropped first.
///
/// Timestamps are stored as ISO-8601 text, the way SQLite applications usually
/// keep them.
///
/// # Errors
/// Returns any SQLite error.
#[cfg(feature = "sqlite")]
pub fn seed_sqlite(path: impl AsRef<std::path::Path>) -> rusqlite::Result<()> {
    use rusqlite::{Connection, params_from_iter};

    let conn = Connection::open(path)?;
    conn.execute_batch(
        "DROP TABLE IF EXISTS departments;
         DROP TABLE IF EXISTS jobs;
         DROP TABLE IF EXISTS hired_employees;
         CREATE TABLE departments (id INTEGER PRIMARY KEY, name VARCHAR(255) NOT NULL);
         CREATE TABLE jobs (id INTEGER PRIMARY KEY, name VARCHAR(255) NOT NULL);
         CREATE TABLE hired_employees (
             id INTEGER PRIMARY KEY,
             name VARCHAR(255) NOT NULL,
             datetime DATETIME NOT NULL,
             department_id INTEGER,
             job_id INTEGER
         );",
    )?;
    for (table, batch) in hr_tables() {
        let names: Vec<&str> = batch.column_names().collect();
        let marks: Vec<String> = (1..=names.len()).map(|i| format!("?{i}")).collect();
        let sql = format!(
            "INSERT INTO {table} ({}) VALUES ({})",
            names.join(", "),
            marks.join(", ")
        );
        let mut stmt = conn.prepare(&sql)?;
        for row in batch.rows() {
            stmt.execute(params_from_iter(row.iter().map(sql_value)))?;
        }
    }
    Ok(())
}

#[cfg(feature = "sqlite")]
fn sql_value(v: &Value) -> rusqlite::types::Value {
    use rusqlite::types::Value as Sql;
    match v {
        Value::Null => Sql::Null,
        Value::Int(i) => Sql::Integer(*i),
        Value::Float(f) => Sql::Real(*f),
        Value::Bool(b) => Sql::Integer(i64::from(*b)),
        Value::Timestamp(_) | Value::Text(_) => Sql::Text(v.to_string()),
    }
}
