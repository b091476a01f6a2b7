use chrono::NaiveDate;
use serde::Serialize;

use crate::error::{ConferenciaError, Result};

/// Inclusive date range selected for a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct DateRange {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl DateRange {
    pub fn new(start: NaiveDate, end: NaiveDate) -> Result<Self> {
        if start > end {
            return Err(ConferenciaError::InvalidDateRange(format!(
                "start {start} is after end {end}"
            )));
        }
        Ok(Self { start, end })
    }

    /// A missing date never falls inside the range.
    pub fn contains(&self, date: Option<NaiveDate>) -> bool {
        match date {
            Some(d) => d >= self.start && d <= self.end,
            None => false,
        }
    }
}

/// One fiscal note as returned by the ERP query.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RawDbRecord {
    pub document_number_raw: String,
    pub party_name: String,
    pub total_value: f64,
    pub status_code: i64,
}

/// One data row of the control spreadsheet.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RawSheetRecord {
    /// 1-based row number in the source file.
    pub row: usize,
    pub note_number_raw: Option<String>,
    pub note_date: Option<NaiveDate>,
    pub receipt_field: Option<String>,
    pub total_value: Option<f64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Origin {
    Database,
    Spreadsheet,
}

/// A raw record with its canonical key and cancellation flag.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NormalizedRecord<P> {
    pub key: i64,
    pub cancelled: bool,
    pub origin: Origin,
    pub payload: P,
}
