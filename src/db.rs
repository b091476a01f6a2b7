use std::path::{Path, PathBuf};

use log::{debug, info};
use regex::Regex;
use rusqlite::types::Value;
use rusqlite::{Connection, OpenFlags, ToSql};

use crate::error::{ConferenciaError, Result};
use crate::models::{DateRange, RawDbRecord};
use crate::source::DataSource;

/// Placeholders from string-formatted query templates. Filters must be bound
/// as parameters instead.
const INTERPOLATION_PATTERN: &str = r"\{[A-Za-z_][A-Za-z0-9_]*\}";

pub const PARAM_DATE_START: &str = ":date_start";
pub const PARAM_DATE_END: &str = ":date_end";
pub const PARAM_ORG_ID: &str = ":org_id";

/// Open the ERP database read-only. Never creates a file.
pub fn get_connection(db_path: &Path) -> Result<Connection> {
    if !db_path.exists() {
        return Err(ConferenciaError::Connectivity(format!(
            "database not found at {}",
            db_path.display()
        )));
    }
    Connection::open_with_flags(db_path, OpenFlags::SQLITE_OPEN_READ_ONLY)
        .map_err(|e| ConferenciaError::Connectivity(e.to_string()))
}

/// Reject templates that expect filters to be spliced in as text.
pub fn validate_query(query: &str) -> Result<()> {
    if query.trim().is_empty() {
        return Err(ConferenciaError::Configuration("query template is empty".to_string()));
    }
    let re = Regex::new(INTERPOLATION_PATTERN).map_err(|e| ConferenciaError::Other(e.to_string()))?;
    if let Some(m) = re.find(query) {
        return Err(ConferenciaError::Configuration(format!(
            "query template uses text placeholder {}; bind {PARAM_DATE_START}, {PARAM_DATE_END} and {PARAM_ORG_ID} instead",
            m.as_str()
        )));
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// SqliteSource
// ---------------------------------------------------------------------------

/// Fiscal notes read from a SQLite copy of the ERP database.
///
/// The query must return four columns, in order: document number, party name,
/// total value, status code.
pub struct SqliteSource {
    path: Option<PathBuf>,
    query: Option<String>,
}

impl SqliteSource {
    pub fn new(path: Option<PathBuf>, query: Option<String>) -> Self {
        Self { path, query }
    }

    fn require_config(&self) -> Result<(&Path, &str)> {
        let path = self.path.as_deref().ok_or_else(|| {
            ConferenciaError::Configuration("no database configured (run `conferencia init --database <file>`)".into())
        })?;
        let query = self
            .query
            .as_deref()
            .filter(|q| !q.trim().is_empty())
            .ok_or_else(|| {
                ConferenciaError::Configuration("no query configured (run `conferencia init --query-file <file>`)".into())
            })?;
        validate_query(query)?;
        Ok((path, query))
    }
}

impl DataSource for SqliteSource {
    fn fetch(&self, range: &DateRange, organization_id: Option<i64>) -> Result<Vec<RawDbRecord>> {
        let (path, query) = self.require_config()?;
        let conn = get_connection(path)?;
        let records = run_query(&conn, query, range, organization_id)
            .map_err(|e| ConferenciaError::Connectivity(e.to_string()))?;
        info!("fetched {} fiscal notes from {}", records.len(), path.display());
        Ok(records)
    }
}

fn run_query(
    conn: &Connection,
    query: &str,
    range: &DateRange,
    organization_id: Option<i64>,
) -> rusqlite::Result<Vec<RawDbRecord>> {
    let mut stmt = conn.prepare(query)?;

    let start = range.start.format("%Y-%m-%d").to_string();
    let end = range.end.format("%Y-%m-%d").to_string();
    let candidates: [(&str, &dyn ToSql); 3] = [
        (PARAM_DATE_START, &start),
        (PARAM_DATE_END, &end),
        (PARAM_ORG_ID, &organization_id),
    ];
    let mut bound: Vec<(&str, &dyn ToSql)> = Vec::new();
    for (name, value) in candidates {
        if stmt.parameter_index(name)?.is_some() {
            bound.push((name, value));
        }
    }
    debug!("binding {start}..{end} org={organization_id:?} ({} parameters)", bound.len());

    let rows = stmt
        .query_map(bound.as_slice(), |row| {
            Ok(RawDbRecord {
                document_number_raw: value_to_text(row.get(0)?),
                party_name: value_to_text(row.get(1)?),
                total_value: value_to_f64(row.get(2)?),
                status_code: value_to_i64(row.get(3)?),
            })
        })?
        .collect::<std::result::Result<Vec<_>, _>>()?;
    Ok(rows)
}

// ---------------------------------------------------------------------------
// Best-effort coercion of loosely typed columns
// ---------------------------------------------------------------------------

fn value_to_text(v: Value) -> String {
    match v {
        Value::Null => String::new(),
        Value::Integer(i) => i.to_string(),
        Value::Real(f) => f.to_string(),
        Value::Text(s) => s,
        Value::Blob(b) => String::from_utf8_lossy(&b).into_owned(),
    }
}

fn value_to_f64(v: Value) -> f64 {
    match v {
        Value::Integer(i) => i as f64,
        Value::Real(f) => f,
        Value::Text(s) => s.trim().parse().unwrap_or(0.0),
        Value::Null | Value::Blob(_) => 0.0,
    }
}

fn value_to_i64(v: Value) -> i64 {
    match v {
        Value::Integer(i) => i,
        Value::Real(f) => f as i64,
        Value::Text(s) => s.trim().parse().unwrap_or(0),
        Value::Null | Value::Blob(_) => 0,
    }
}
