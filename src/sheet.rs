//! Control spreadsheet reader (XLSX or CSV).
//!
//! Layout: two title rows, the column header on the third row, data below.

use std::path::Path;

use chrono::{NaiveDate, NaiveDateTime};
use log::{debug, info};
use serde::Serialize;

use crate::error::{ConferenciaError, Result};
use crate::models::{DateRange, RawSheetRecord};

pub const COL_NOTE_NUMBER: &str = "Nº NF";
pub const COL_NOTE_DATE: &str = "DATA NF";
pub const COL_RECEIPT: &str = "DATA DE RECEBIMENTO";
pub const COL_VALUE: &str = "VALOR NF";

/// Zero-based index of the header row.
pub const HEADER_ROW: usize = 2;

// ---------------------------------------------------------------------------
// Format
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SheetFormat {
    Xlsx,
    Csv,
}

impl SheetFormat {
    /// `.csv` is read as CSV; everything else is treated as a workbook.
    pub fn from_path(path: &Path) -> Self {
        match path.extension() {
            Some(ext) if ext.eq_ignore_ascii_case("csv") => Self::Csv,
            _ => Self::Xlsx,
        }
    }

    pub fn key(&self) -> &'static str {
        match self {
            Self::Xlsx => "xlsx",
            Self::Csv => "csv",
        }
    }
}

// ---------------------------------------------------------------------------
// Cells
// ---------------------------------------------------------------------------

/// A cell value independent of the file format it came from.
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Cell {
    Empty,
    Text(String),
    Number(f64),
    Date(NaiveDate),
}

impl Cell {
    fn text(raw: &str) -> Self {
        if raw.trim().is_empty() {
            Self::Empty
        } else {
            Self::Text(raw.to_string())
        }
    }

    fn as_text(&self) -> Option<String> {
        match self {
            Self::Empty => None,
            Self::Text(s) => Some(s.clone()),
            Self::Number(f) => Some(f.to_string()),
            Self::Date(d) => Some(d.format("%Y-%m-%d").to_string()),
        }
    }

    fn as_date(&self) -> Option<NaiveDate> {
        match self {
            Self::Empty => None,
            Self::Text(s) => parse_date(s),
            Self::Number(f) => excel_serial_to_date(*f),
            Self::Date(d) => Some(*d),
        }
    }

    fn as_amount(&self) -> Option<f64> {
        match self {
            Self::Number(f) => Some(*f),
            Self::Text(s) => parse_amount(s),
            Self::Empty | Self::Date(_) => None,
        }
    }
}

pub fn excel_serial_to_date(serial: f64) -> Option<NaiveDate> {
    if !serial.is_finite() || serial < 0.0 {
        return None;
    }
    // Excel epoch is 1899-12-30 (accounting for the 1900 leap year bug)
    let base = NaiveDate::from_ymd_opt(1899, 12, 30)?;
    base.checked_add_days(chrono::Days::new(serial.trunc() as u64))
}

const DATE_FORMATS: &[&str] = &["%Y-%m-%d", "%d/%m/%Y", "%d-%m-%Y", "%d/%m/%y"];
const DATETIME_FORMATS: &[&str] = &[
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%dT%H:%M:%S",
    "%d/%m/%Y %H:%M:%S",
    "%d/%m/%Y %H:%M",
];

/// ISO first, then day-first Brazilian forms. Anything else is `None`.
pub fn parse_date(raw: &str) -> Option<NaiveDate> {
    let s = raw.trim();
    DATE_FORMATS
        .iter()
        .find_map(|fmt| NaiveDate::parse_from_str(s, fmt).ok())
        .or_else(|| {
            DATETIME_FORMATS
                .iter()
                .find_map(|fmt| NaiveDateTime::parse_from_str(s, fmt).ok())
                .map(|dt| dt.date())
        })
}

/// Best-effort number coercion: strips `R$`, spaces and quotes, accepts both
/// `1.234,56` and `1,234.56`, and `(50,00)` as a negative.
pub fn parse_amount(raw: &str) -> Option<f64> {
    let s: String = raw
        .replace("R$", "")
        .chars()
        .filter(|c| !c.is_whitespace() && *c != '"')
        .collect();
    if let Some(inner) = s.strip_prefix('(').and_then(|v| v.strip_suffix(')')) {
        return parse_amount(inner).map(|v| -v);
    }
    let normalized = match (s.rfind(','), s.rfind('.')) {
        (Some(comma), Some(dot)) if comma > dot => s.replace('.', "").replace(',', "."),
        (Some(_), Some(_)) => s.replace(',', ""),
        (Some(_), None) => s.replace(',', "."),
        _ => s,
    };
    normalized.parse::<f64>().ok().filter(|v| v.is_finite())
}

// ---------------------------------------------------------------------------
// SheetData
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct SheetData {
    /// Trimmed header names, in file order.
    pub columns: Vec<String>,
    pub records: Vec<RawSheetRecord>,
}

impl SheetData {
    pub fn has_column(&self, name: &str) -> bool {
        self.columns.iter().any(|c| c == name)
    }

    /// Keep rows whose note date is inside `range`. Rows with no readable
    /// date are dropped. Without a date column nothing is filtered.
    pub fn within(&self, range: &DateRange) -> Vec<RawSheetRecord> {
        if !self.has_column(COL_NOTE_DATE) {
            return self.records.clone();
        }
        self.records
            .iter()
            .filter(|r| range.contains(r.note_date))
            .cloned()
            .collect()
    }
}

pub fn parse(bytes: &[u8], format: SheetFormat) -> Result<SheetData> {
    let grid = match format {
        SheetFormat::Xlsx => read_xlsx_grid(bytes)?,
        SheetFormat::Csv => read_csv_grid(bytes)?,
    };
    let (columns, records) = records_from_grid(grid)?;
    info!("read {} spreadsheet rows ({})", records.len(), format.key());
    Ok(SheetData {
        columns,
        records,
    })
}

static EMPTY_CELL: Cell = Cell::Empty;

/// Short rows are padded with empty cells.
fn cell_at(cells: &[Cell], idx: Option<usize>) -> &Cell {
    idx.and_then(|i| cells.get(i)).unwrap_or(&EMPTY_CELL)
}

/// `grid` holds `(row_number, cells)` pairs, row numbers 1-based.
pub(crate) fn records_from_grid(grid: Vec<(usize, Vec<Cell>)>) -> Result<(Vec<String>, Vec<RawSheetRecord>)> {
    let mut rows = grid.into_iter();
    let Some((_, header)) = rows.nth(HEADER_ROW) else {
        return Err(ConferenciaError::Parse(format!(
            "expected a header on row {}, but the file is shorter",
            HEADER_ROW + 1
        )));
    };
    let columns: Vec<String> = header
        .iter()
        .map(|c| c.as_text().unwrap_or_default().trim().to_string())
        .collect();
    debug!("spreadsheet columns: {columns:?}");

    let find = |name: &str| columns.iter().position(|c| c == name);
    let idx_number = find(COL_NOTE_NUMBER).ok_or_else(|| ConferenciaError::Schema {
        column: COL_NOTE_NUMBER.to_string(),
    })?;
    let idx_date = find(COL_NOTE_DATE);
    let idx_receipt = find(COL_RECEIPT);
    let idx_value = find(COL_VALUE);

    let mut records = Vec::new();
    for (row, cells) in rows {
        if cells.iter().all(|c| *c == Cell::Empty) {
            continue;
        }
        records.push(RawSheetRecord {
            row,
            note_number_raw: cell_at(&cells, Some(idx_number)).as_text(),
            note_date: cell_at(&cells, idx_date).as_date(),
            receipt_field: cell_at(&cells, idx_receipt).as_text(),
            total_value: cell_at(&cells, idx_value).as_amount(),
        });
    }
    Ok((columns, records))
}

// ---------------------------------------------------------------------------
// CSV
// ---------------------------------------------------------------------------

/// Semicolon-separated exports are common; pick whichever separator the
/// header line uses more.
fn sniff_delimiter(bytes: &[u8]) -> u8 {
    let header = bytes
        .split(|b| *b == b'\n')
        .filter(|line| !line.iter().all(u8::is_ascii_whitespace))
        .nth(HEADER_ROW)
        .unwrap_or(bytes);
    let semicolons = header.iter().filter(|b| **b == b';').count();
    let commas = header.iter().filter(|b| **b == b',').count();
    if semicolons > commas {
        b';'
    } else {
        b','
    }
}

fn read_csv_grid(bytes: &[u8]) -> Result<Vec<(usize, Vec<Cell>)>> {
    let mut rdr = csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .delimiter(sniff_delimiter(bytes))
        .from_reader(bytes);
    let mut grid = Vec::new();
    for (i, result) in rdr.byte_records().enumerate() {
        let record = result.map_err(|e| ConferenciaError::Parse(e.to_string()))?;
        let row = record.position().map_or(i + 1, |p| p.line() as usize);
        let cells = record
            .iter()
            .map(|field| Cell::text(&String::from_utf8_lossy(field)))
            .collect();
        grid.push((row, cells));
    }
    Ok(grid)
}

// ---------------------------------------------------------------------------
// XLSX (feature-gated)
// ---------------------------------------------------------------------------

#[cfg(feature = "xlsx")]
fn read_xlsx_grid(bytes: &[u8]) -> Result<Vec<(usize, Vec<Cell>)>> {
    use calamine::{Data, Reader, Xlsx};

    let mut workbook: Xlsx<_> = Xlsx::new(std::io::Cursor::new(bytes))
        .map_err(|e| ConferenciaError::Parse(format!("failed to open XLSX: {e}")))?;
    let range = workbook
        .worksheet_range_at(0)
        .ok_or_else(|| ConferenciaError::Parse("workbook has no worksheets".to_string()))?
        .map_err(|e| ConferenciaError::Parse(format!("failed to read first worksheet: {e}")))?;

    // The range starts at the first used cell; pad so row/column indexes match the sheet.
    let (first_row, first_col) = range.start().unwrap_or((0, 0));
    let mut grid: Vec<(usize, Vec<Cell>)> = (0..first_row as usize).map(|r| (r + 1, Vec::new())).collect();
    for (i, row) in range.rows().enumerate() {
        let mut cells = vec![Cell::Empty; first_col as usize];
        cells.extend(row.iter().map(|data| match data {
            Data::Empty | Data::Error(_) => Cell::Empty,
            Data::String(s) => Cell::text(s),
            Data::Float(f) => Cell::Number(*f),
            Data::Int(n) => Cell::Number(*n as f64),
            Data::Bool(b) => Cell::Text(b.to_string()),
            Data::DateTime(dt) => excel_serial_to_date(dt.as_f64()).map_or(Cell::Empty, Cell::Date),
            Data::DateTimeIso(s) => parse_date(s).map_or_else(|| Cell::text(s), Cell::Date),
            Data::DurationIso(s) => Cell::text(s),
        }));
        grid.push((first_row as usize + i + 1, cells));
    }
    Ok(grid)
}

#[cfg(not(feature = "xlsx"))]
fn read_xlsx_grid(_bytes: &[u8]) -> Result<Vec<(usize, Vec<Cell>)>> {
    Err(ConferenciaError::Parse(
        "XLSX support is not enabled in this build; save the sheet as CSV".to_string(),
    ))
}
