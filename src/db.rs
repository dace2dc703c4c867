use std::path::Path;

use rusqlite::types::Value as SqlValue;
use rusqlite::{params_from_iter, Connection};
use tracing::{error, info};

use crate::error::PersistError;
use crate::model::LoadMode;
use crate::normalize::{PolicyRow, PolicyTable, COLUMNS};

/// Keeps each statement well under SQLite's bind-parameter limit.
const ROWS_PER_STATEMENT: usize = 100;
const DATE_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

pub fn connect(path: &Path) -> rusqlite::Result<Connection> {
    if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
        // open() reports the real problem if this fails
        let _ = std::fs::create_dir_all(dir);
    }
    let conn = Connection::open(path)?;
    conn.execute_batch("PRAGMA journal_mode=WAL;")?;
    Ok(conn)
}

/// `id` is written explicitly by full loads and assigned by SQLite on upsert inserts.
pub fn init_schema(conn: &Connection, table: &str) -> rusqlite::Result<()> {
    conn.execute_batch(&format!(
        "
        CREATE TABLE IF NOT EXISTS {table} (
            id       INTEGER PRIMARY KEY,
            chrgrNm  TEXT NOT NULL DEFAULT '',
            deptNm   TEXT NOT NULL DEFAULT '',
            title    TEXT NOT NULL DEFAULT '',
            regDt    TEXT,
            cont     TEXT NOT NULL DEFAULT '',
            telNo    TEXT NOT NULL DEFAULT '',
            inqCnt   INTEGER NOT NULL DEFAULT 0 CHECK (inqCnt >= 0),
            url      TEXT NOT NULL UNIQUE
        );
        "
    ))
}

pub fn count_rows(conn: &Connection, table: &str) -> rusqlite::Result<i64> {
    conn.query_row(&format!("SELECT COUNT(*) FROM {table}"), [], |row| row.get(0))
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PersistReport {
    pub inserted: usize,
    pub updated: usize,
}

/// Write `data` into `table` in a single transaction: plain insert for full
/// loads, upsert on `url` for incremental syncs. Nothing is committed on error.
pub fn persist(
    conn: &Connection,
    table: &str,
    data: &PolicyTable,
) -> Result<PersistReport, PersistError> {
    let result = match data.mode {
        LoadMode::Full => insert_all(conn, table, data),
        LoadMode::Incremental => upsert_all(conn, table, data),
    };

    match result {
        Ok(report) => {
            info!(
                mode = %data.mode,
                table,
                inserted = report.inserted,
                updated = report.updated,
                "committed"
            );
            Ok(report)
        }
        Err(source) => {
            error!(mode = %data.mode, table, error = %source, "rolled back");
            Err(PersistError {
                mode: data.mode,
                table: table.to_string(),
                source,
            })
        }
    }
}

fn insert_all(conn: &Connection, table: &str, data: &PolicyTable) -> rusqlite::Result<PersistReport> {
    let columns = data.columns();

    let tx = conn.unchecked_transaction()?;
    let mut inserted = 0;
    for chunk in data.rows.chunks(ROWS_PER_STATEMENT) {
        let sql = insert_sql(table, &columns, chunk.len());
        let mut stmt = tx.prepare_cached(&sql)?;
        inserted += stmt.execute(params_from_iter(chunk.iter().flat_map(|r| row_values(r, true))))?;
    }
    tx.commit()?;

    Ok(PersistReport {
        inserted,
        updated: 0,
    })
}

fn upsert_all(conn: &Connection, table: &str, data: &PolicyTable) -> rusqlite::Result<PersistReport> {
    let columns = data.columns();
    let set_clause = COLUMNS
        .iter()
        .filter(|c| **c != "url")
        .map(|c| format!("{c} = excluded.{c}"))
        .collect::<Vec<_>>()
        .join(", ");

    let tx = conn.unchecked_transaction()?;
    let before = count_rows(&tx, table)?;
    for chunk in data.rows.chunks(ROWS_PER_STATEMENT) {
        let sql = format!(
            "{} ON CONFLICT(url) DO UPDATE SET {}",
            insert_sql(table, &columns, chunk.len()),
            set_clause
        );
        let mut stmt = tx.prepare_cached(&sql)?;
        stmt.execute(params_from_iter(chunk.iter().flat_map(|r| row_values(r, false))))?;
    }
    let after = count_rows(&tx, table)?;
    tx.commit()?;

    let inserted = (after - before).max(0) as usize;
    Ok(PersistReport {
        inserted,
        updated: data.len().saturating_sub(inserted),
    })
}

fn insert_sql(table: &str, columns: &[&str], rows: usize) -> String {
    let tuple = format!("({})", vec!["?"; columns.len()].join(", "));
    format!(
        "INSERT INTO {} ({}) VALUES {}",
        table,
        columns.join(", "),
        vec![tuple.as_str(); rows].join(", ")
    )
}

fn row_values(r: &PolicyRow, with_id: bool) -> Vec<SqlValue> {
    let mut values = Vec::with_capacity(COLUMNS.len() + 1);
    if with_id {
        values.push(r.sequence_id.map_or(SqlValue::Null, SqlValue::Integer));
    }
    values.extend([
        SqlValue::Text(r.charger_name.clone()),
        SqlValue::Text(r.department_name.clone()),
        SqlValue::Text(r.title.clone()),
        r.registered_date
            .map_or(SqlValue::Null, |d| SqlValue::Text(d.format(DATE_FORMAT).to_string())),
        SqlValue::Text(r.content.clone()),
        SqlValue::Text(r.phone_number.clone()),
        SqlValue::Integer(r.inquiry_count),
        SqlValue::Text(r.url.clone()),
    ]);
    values
}
