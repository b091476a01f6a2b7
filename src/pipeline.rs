use log::{info, warn};
use serde::Serialize;
use sha2::{Digest, Sha256};

use crate::error::Result;
use crate::models::DateRange;
use crate::reconciler::{normalize_db_records, normalize_sheet_records, reconcile, ReconciliationResult};
use crate::sheet::{self, SheetFormat};
use crate::source::{fetch_or_empty, DataSource};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct RunParams {
    pub range: DateRange,
    /// `None` reconciles across all organizations.
    pub organization_id: Option<i64>,
}

/// Everything one reconciliation run produced. Owned by the caller and
/// dropped or replaced by the next run.
#[derive(Debug, Clone, Serialize)]
pub struct RunOutcome {
    pub params: RunParams,
    /// Why the ERP side is empty, when the data source failed.
    pub db_warning: Option<String>,
    pub db_records: usize,
    /// Data rows in the spreadsheet before the date filter.
    pub sheet_rows: usize,
    /// Data rows compared after the date filter.
    pub sheet_records: usize,
    /// SHA-256 of the spreadsheet bytes, so a report or export can be traced
    /// back to the exact file that produced it.
    pub sheet_checksum: String,
    pub result: ReconciliationResult,
}

pub fn compute_checksum(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    hex::encode(hasher.finalize())
}

/// Run one reconciliation.
///
/// The spreadsheet is read first: if it is unreadable or lacks the note
/// number column the run stops before touching the database. A failing data
/// source does not stop the run; the ERP side is then empty and the outcome
/// carries the reason.
pub fn run<S: DataSource + ?Sized>(
    source: &S,
    sheet_bytes: &[u8],
    format: SheetFormat,
    params: &RunParams,
) -> Result<RunOutcome> {
    let sheet_data = sheet::parse(sheet_bytes, format)?;
    let sheet_rows = sheet_data.within(&params.range);
    info!(
        "{} of {} spreadsheet rows fall in {}..{}",
        sheet_rows.len(),
        sheet_data.records.len(),
        params.range.start,
        params.range.end
    );

    let fetched = fetch_or_empty(source, &params.range, params.organization_id)?;

    let db = normalize_db_records(&fetched.records);
    let sheet = normalize_sheet_records(&sheet_rows);
    let result = reconcile(&db, &sheet);

    if !result.duplicated_join_keys.is_empty() {
        warn!(
            "note numbers repeated within a source, mismatches may be listed more than once: {:?}",
            result.duplicated_join_keys
        );
    }

    Ok(RunOutcome {
        params: *params,
        db_warning: fetched.warning,
        db_records: db.len(),
        sheet_rows: sheet_data.records.len(),
        sheet_records: sheet.len(),
        sheet_checksum: compute_checksum(sheet_bytes),
        result,
    })
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeSet;

    use chrono::NaiveDate;

    use super::*;
    use crate::db::tests::{test_erp_db, QUERY};
    use crate::db::SqliteSource;
    use crate::error::ConferenciaError;
    use crate::models::RawDbRecord;

    struct FixedSource(Vec<RawDbRecord>);

    impl DataSource for FixedSource {
        fn fetch(&self, _range: &DateRange, _organization_id: Option<i64>) -> Result<Vec<RawDbRecord>> {
            Ok(self.0.clone())
        }
    }

    struct DownSource;

    impl DataSource for DownSource {
        fn fetch(&self, _range: &DateRange, _organization_id: Option<i64>) -> Result<Vec<RawDbRecord>> {
            Err(ConferenciaError::Connectivity("login timeout expired".into()))
        }
    }

    fn db_row(number: &str, status: i64) -> RawDbRecord {
        RawDbRecord {
            document_number_raw: number.to_string(),
            party_name: "Fornecedor".to_string(),
            total_value: 1.0,
            status_code: status,
        }
    }

    fn january() -> RunParams {
        RunParams {
            range: DateRange::new(
                NaiveDate::from_ymd_opt(2025, 1, 1).unwrap(),
                NaiveDate::from_ymd_opt(2025, 1, 31).unwrap(),
            )
            .unwrap(),
            organization_id: Some(1),
        }
    }

    fn keys(items: &[i64]) -> BTreeSet<i64> {
        items.iter().copied().collect()
    }

    const SHEET: &str = "\
CONFERÊNCIA
2025
Nº NF,DATA NF,DATA DE RECEBIMENTO,VALOR NF
001/200,05/01/2025,CANCELADO,10
001/300,06/01/2025,07/01/2025,20
001/900,06/03/2025,07/03/2025,30
";

    #[test]
    fn test_run_reports_three_categories() {
        let source = FixedSource(vec![db_row("00010100", 1), db_row("00010200", 0)]);
        let outcome = run(&source, SHEET.as_bytes(), SheetFormat::Csv, &january()).unwrap();
        let result = &outcome.result;
        assert_eq!(result.missing_from_spreadsheet, keys(&[100]));
        assert_eq!(result.missing_from_database, keys(&[300]));
        assert_eq!(result.status_mismatches.len(), 1);
        assert_eq!(result.status_mismatches[0].key, 200);
        assert!(!result.status_mismatches[0].db_cancelled);
        assert!(result.status_mismatches[0].sheet_cancelled);
        assert_eq!(outcome.sheet_rows, 3);
        assert_eq!(outcome.sheet_records, 2);
        assert_eq!(outcome.db_records, 2);
        assert!(outcome.db_warning.is_none());
        assert_eq!(outcome.sheet_checksum.len(), 64);
    }

    #[test]
    fn test_run_survives_data_source_failure() {
        let sheet = "t\nt\nNº NF\n10\n20\n";
        let outcome = run(&DownSource, sheet.as_bytes(), SheetFormat::Csv, &january()).unwrap();
        assert_eq!(outcome.result.missing_from_database, keys(&[10, 20]));
        assert!(outcome.result.missing_from_spreadsheet.is_empty());
        assert!(outcome.result.status_mismatches.is_empty());
        assert!(outcome.db_warning.unwrap().contains("login timeout"));
    }

    #[test]
    fn test_run_aborts_without_note_number_column() {
        let sheet = "t\nt\nNUMERO,DATA NF\n10,01/01/2025\n";
        let err = run(&FixedSource(vec![]), sheet.as_bytes(), SheetFormat::Csv, &january()).unwrap_err();
        assert!(matches!(err, ConferenciaError::Schema { .. }));
    }

    #[test]
    fn test_run_against_sqlite_source() {
        let dir = tempfile::tempdir().unwrap();
        let source = SqliteSource::new(Some(test_erp_db(dir.path())), Some(QUERY.to_string()));
        let sheet = "\
CONTROLE
x
Nº NF,DATA NF,DATA DE RECEBIMENTO
001/100,10/01/2025,15/01/2025
001/200,15/01/2025,20/01/2025
001/555,16/01/2025,CANCELADO
";
        let outcome = run(&source, sheet.as_bytes(), SheetFormat::Csv, &january()).unwrap();
        let result = &outcome.result;
        // Note 100 is cancelled in the ERP but was received per the sheet.
        assert_eq!(result.status_mismatches.len(), 1);
        assert_eq!(result.status_mismatches[0].key, 100);
        assert_eq!(result.status_mismatches[0].db.party_name, "Construtora Alfa");
        assert_eq!(result.missing_from_database, keys(&[555]));
        assert!(result.missing_from_spreadsheet.is_empty());
    }

    #[test]
    fn test_checksum_is_sha256_hex() {
        assert_eq!(
            compute_checksum(b"abc"),
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
    }
}
