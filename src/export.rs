use std::io::Write;
use std::path::{Path, PathBuf};

use chrono::NaiveDate;
use log::{debug, info};
use serde::Serialize;

use crate::error::Result;
use crate::keys::{normalize_db_key, normalize_sheet_key};
use crate::models::{RawDbRecord, RawSheetRecord};
use crate::reconciler::{ReconciliationResult, StatusMismatch};

// ---------------------------------------------------------------------------
// Row shapes
// ---------------------------------------------------------------------------

#[derive(Serialize)]
struct DbRow<'a> {
    key: i64,
    document_number: &'a str,
    party_name: &'a str,
    total_value: f64,
    status_code: i64,
}

impl<'a> From<&'a RawDbRecord> for DbRow<'a> {
    fn from(r: &'a RawDbRecord) -> Self {
        Self {
            key: normalize_db_key(&r.document_number_raw),
            document_number: &r.document_number_raw,
            party_name: &r.party_name,
            total_value: r.total_value,
            status_code: r.status_code,
        }
    }
}

/// Spreadsheet rows keep the spreadsheet's own headers.
#[derive(Serialize)]
struct SheetRow<'a> {
    #[serde(rename = "CHAVE")]
    key: i64,
    #[serde(rename = "LINHA")]
    row: usize,
    #[serde(rename = "Nº NF")]
    note_number: Option<&'a str>,
    #[serde(rename = "DATA NF")]
    note_date: Option<NaiveDate>,
    #[serde(rename = "DATA DE RECEBIMENTO")]
    receipt: Option<&'a str>,
    #[serde(rename = "VALOR NF")]
    total_value: Option<f64>,
}

impl<'a> From<&'a RawSheetRecord> for SheetRow<'a> {
    fn from(r: &'a RawSheetRecord) -> Self {
        Self {
            key: normalize_sheet_key(r.note_number_raw.as_deref()),
            row: r.row,
            note_number: r.note_number_raw.as_deref(),
            note_date: r.note_date,
            receipt: r.receipt_field.as_deref(),
            total_value: r.total_value,
        }
    }
}

#[derive(Serialize)]
struct MismatchRow<'a> {
    key: i64,
    db_document_number: &'a str,
    db_cancelled: bool,
    party_name: &'a str,
    db_total_value: f64,
    sheet_row: usize,
    sheet_note_number: Option<&'a str>,
    sheet_receipt: Option<&'a str>,
    sheet_cancelled: bool,
    sheet_total_value: Option<f64>,
}

impl<'a> From<&'a StatusMismatch> for MismatchRow<'a> {
    fn from(m: &'a StatusMismatch) -> Self {
        Self {
            key: m.key,
            db_document_number: &m.db.document_number_raw,
            db_cancelled: m.db_cancelled,
            party_name: &m.db.party_name,
            db_total_value: m.db.total_value,
            sheet_row: m.sheet.row,
            sheet_note_number: m.sheet.note_number_raw.as_deref(),
            sheet_receipt: m.sheet.receipt_field.as_deref(),
            sheet_cancelled: m.sheet_cancelled,
            sheet_total_value: m.sheet.total_value,
        }
    }
}

// ---------------------------------------------------------------------------
// Writers
// ---------------------------------------------------------------------------

fn write_rows<W: Write, T: Serialize>(out: W, rows: impl IntoIterator<Item = T>) -> Result<()> {
    let mut wtr = csv::Writer::from_writer(out);
    for row in rows {
        wtr.serialize(row)?;
    }
    wtr.flush()?;
    Ok(())
}

pub fn write_missing_from_spreadsheet<W: Write>(out: W, rows: &[RawDbRecord]) -> Result<()> {
    write_rows(out, rows.iter().map(DbRow::from))
}

pub fn write_missing_from_database<W: Write>(out: W, rows: &[RawSheetRecord]) -> Result<()> {
    write_rows(out, rows.iter().map(SheetRow::from))
}

pub fn write_status_mismatches<W: Write>(out: W, rows: &[StatusMismatch]) -> Result<()> {
    write_rows(out, rows.iter().map(MismatchRow::from))
}

const MISSING_FROM_SPREADSHEET: &str = "missing_from_spreadsheet";
const MISSING_FROM_DATABASE: &str = "missing_from_database";
const STATUS_MISMATCHES: &str = "status_mismatches";

/// Write one CSV per non-empty category into `dir` as `{category}-{stamp}.csv`.
/// A category that came out empty has any earlier file with the same name
/// removed, so nothing left in `dir` describes an older run. Returns the
/// written paths.
pub fn export_all(result: &ReconciliationResult, dir: &Path, stamp: &str) -> Result<Vec<PathBuf>> {
    std::fs::create_dir_all(dir)?;
    let mut written = Vec::new();
    let file_for = |name: &str| dir.join(format!("{name}-{stamp}.csv"));

    let path = file_for(MISSING_FROM_SPREADSHEET);
    if result.db_only.is_empty() {
        remove_stale(&path)?;
    } else {
        write_missing_from_spreadsheet(std::fs::File::create(&path)?, &result.db_only)?;
        written.push(path);
    }

    let path = file_for(MISSING_FROM_DATABASE);
    if result.sheet_only.is_empty() {
        remove_stale(&path)?;
    } else {
        write_missing_from_database(std::fs::File::create(&path)?, &result.sheet_only)?;
        written.push(path);
    }

    let path = file_for(STATUS_MISMATCHES);
    if result.status_mismatches.is_empty() {
        remove_stale(&path)?;
    } else {
        write_status_mismatches(std::fs::File::create(&path)?, &result.status_mismatches)?;
        written.push(path);
    }

    info!("exported {} file(s) to {}", written.len(), dir.display());
    Ok(written)
}

fn remove_stale(path: &Path) -> Result<()> {
    match std::fs::remove_file(path) {
        Ok(()) => {
            debug!("removed stale export {}", path.display());
            Ok(())
        }
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(e.into()),
    }
}
