use std::collections::{BTreeSet, HashMap};

use serde::Serialize;

use crate::classifier::{classify_db_cancelled, classify_sheet_cancelled};
use crate::keys::{normalize_db_key, normalize_sheet_key};
use crate::models::{NormalizedRecord, Origin, RawDbRecord, RawSheetRecord};

pub type DbRecord = NormalizedRecord<RawDbRecord>;
pub type SheetRecord = NormalizedRecord<RawSheetRecord>;

// ---------------------------------------------------------------------------
// Normalization
// ---------------------------------------------------------------------------

pub fn normalize_db_records(rows: &[RawDbRecord]) -> Vec<DbRecord> {
    rows.iter()
        .map(|r| NormalizedRecord {
            key: normalize_db_key(&r.document_number_raw),
            cancelled: classify_db_cancelled(r.status_code),
            origin: Origin::Database,
            payload: r.clone(),
        })
        .collect()
}

pub fn normalize_sheet_records(rows: &[RawSheetRecord]) -> Vec<SheetRecord> {
    rows.iter()
        .map(|r| NormalizedRecord {
            key: normalize_sheet_key(r.note_number_raw.as_deref()),
            cancelled: classify_sheet_cancelled(r.receipt_field.as_deref()),
            origin: Origin::Spreadsheet,
            payload: r.clone(),
        })
        .collect()
}

// ---------------------------------------------------------------------------
// Result
// ---------------------------------------------------------------------------

/// A note found on both sides whose cancellation flags disagree.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StatusMismatch {
    pub key: i64,
    pub db_cancelled: bool,
    pub sheet_cancelled: bool,
    pub db: RawDbRecord,
    pub sheet: RawSheetRecord,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ReconciliationSummary {
    pub missing_from_spreadsheet: usize,
    pub missing_from_database: usize,
    pub status_mismatches: usize,
}

impl ReconciliationSummary {
    pub fn is_clean(&self) -> bool {
        self.missing_from_spreadsheet == 0 && self.missing_from_database == 0 && self.status_mismatches == 0
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ReconciliationResult {
    pub missing_from_spreadsheet: BTreeSet<i64>,
    pub missing_from_database: BTreeSet<i64>,
    pub status_mismatches: Vec<StatusMismatch>,
    /// Database rows behind `missing_from_spreadsheet`, in input order.
    pub db_only: Vec<RawDbRecord>,
    /// Spreadsheet rows behind `missing_from_database`, in input order.
    pub sheet_only: Vec<RawSheetRecord>,
    /// Keys present in both sources where at least one side repeats the key,
    /// so the join emitted more than one pair for it.
    pub duplicated_join_keys: BTreeSet<i64>,
}

impl ReconciliationResult {
    pub fn summary(&self) -> ReconciliationSummary {
        ReconciliationSummary {
            missing_from_spreadsheet: self.missing_from_spreadsheet.len(),
            missing_from_database: self.missing_from_database.len(),
            status_mismatches: self.status_mismatches.len(),
        }
    }
}

// ---------------------------------------------------------------------------
// reconcile
// ---------------------------------------------------------------------------

/// Compare the two normalized collections.
///
/// Membership is decided on distinct keys. The mismatch check is an inner
/// join on key: when either side repeats a key, every DB row for it is paired
/// with every sheet row for it, so one note can yield several mismatch rows.
pub fn reconcile(db: &[DbRecord], sheet: &[SheetRecord]) -> ReconciliationResult {
    let db_keys: BTreeSet<i64> = db.iter().map(|r| r.key).collect();
    let sheet_keys: BTreeSet<i64> = sheet.iter().map(|r| r.key).collect();

    let missing_from_spreadsheet: BTreeSet<i64> = db_keys.difference(&sheet_keys).copied().collect();
    let missing_from_database: BTreeSet<i64> = sheet_keys.difference(&db_keys).copied().collect();

    let db_only = db
        .iter()
        .filter(|r| missing_from_spreadsheet.contains(&r.key))
        .map(|r| r.payload.clone())
        .collect();
    let sheet_only = sheet
        .iter()
        .filter(|r| missing_from_database.contains(&r.key))
        .map(|r| r.payload.clone())
        .collect();

    let mut sheet_by_key: HashMap<i64, Vec<&SheetRecord>> = HashMap::new();
    for r in sheet {
        sheet_by_key.entry(r.key).or_default().push(r);
    }

    let mut db_counts: HashMap<i64, usize> = HashMap::new();
    for r in db {
        *db_counts.entry(r.key).or_default() += 1;
    }

    let mut status_mismatches = Vec::new();
    for d in db {
        let Some(matches) = sheet_by_key.get(&d.key) else {
            continue;
        };
        for s in matches {
            if d.cancelled != s.cancelled {
                status_mismatches.push(StatusMismatch {
                    key: d.key,
                    db_cancelled: d.cancelled,
                    sheet_cancelled: s.cancelled,
                    db: d.payload.clone(),
                    sheet: s.payload.clone(),
                });
            }
        }
    }

    let duplicated_join_keys = db_keys
        .intersection(&sheet_keys)
        .filter(|k| {
            let on_db = db_counts.get(k).copied().unwrap_or(0);
            let on_sheet = sheet_by_key.get(k).map_or(0, Vec::len);
            on_db > 1 || on_sheet > 1
        })
        .copied()
        .collect();

    ReconciliationResult {
        missing_from_spreadsheet,
        missing_from_database,
        status_mismatches,
        db_only,
        sheet_only,
        duplicated_join_keys,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn db_row(number: &str, status: i64) -> RawDbRecord {
        RawDbRecord {
            document_number_raw: number.to_string(),
            party_name: format!("Fornecedor {number}"),
            total_value: 100.0,
            status_code: status,
        }
    }

    fn sheet_row(row: usize, number: &str, receipt: Option<&str>) -> RawSheetRecord {
        RawSheetRecord {
            row,
            note_number_raw: Some(number.to_string()),
            note_date: None,
            receipt_field: receipt.map(str::to_string),
            total_value: Some(100.0),
        }
    }

    fn keys(items: &[i64]) -> BTreeSet<i64> {
        items.iter().copied().collect()
    }

    #[test]
    fn test_normalization_applies_both_rules() {
        let db = normalize_db_records(&[db_row("00014532", 1)]);
        assert_eq!(db[0].key, 4532);
        assert!(db[0].cancelled);
        assert_eq!(db[0].origin, Origin::Database);

        let sheet = normalize_sheet_records(&[sheet_row(4, "001/4532", Some("Cancelado"))]);
        assert_eq!(sheet[0].key, 4532);
        assert!(sheet[0].cancelled);
        assert_eq!(sheet[0].origin, Origin::Spreadsheet);
    }

    #[test]
    fn test_three_categories() {
        let db = normalize_db_records(&[db_row("100", 1), db_row("200", 0)]);
        let sheet = normalize_sheet_records(&[
            sheet_row(4, "200", Some("CANCELADO")),
            sheet_row(5, "300", Some("10/01/2025")),
        ]);
        let result = reconcile(&db, &sheet);

        assert_eq!(result.missing_from_spreadsheet, keys(&[100]));
        assert_eq!(result.missing_from_database, keys(&[300]));
        assert_eq!(result.status_mismatches.len(), 1);
        let m = &result.status_mismatches[0];
        assert_eq!(m.key, 200);
        assert!(!m.db_cancelled);
        assert!(m.sheet_cancelled);
        assert_eq!(m.db.document_number_raw, "200");
        assert_eq!(m.sheet.row, 4);

        assert_eq!(result.db_only.len(), 1);
        assert_eq!(result.db_only[0].document_number_raw, "100");
        assert_eq!(result.sheet_only.len(), 1);
        assert_eq!(result.sheet_only[0].row, 5);
        assert!(result.duplicated_join_keys.is_empty());
    }

    #[test]
    fn test_empty_database_reports_every_sheet_key() {
        let sheet = normalize_sheet_records(&[sheet_row(4, "10", None), sheet_row(5, "20.0", None)]);
        let result = reconcile(&[], &sheet);
        assert_eq!(result.missing_from_database, keys(&[10, 20]));
        assert!(result.missing_from_spreadsheet.is_empty());
        assert!(result.status_mismatches.is_empty());
        assert_eq!(result.summary().missing_from_database, 2);
    }

    #[test]
    fn test_matching_status_is_clean() {
        let db = normalize_db_records(&[db_row("00010001", 1), db_row("00010002", 0)]);
        let sheet = normalize_sheet_records(&[
            sheet_row(4, "1/1", Some("cancelada")),
            sheet_row(5, "1/2", Some("05/01/2025")),
        ]);
        let result = reconcile(&db, &sheet);
        assert!(result.summary().is_clean());
    }

    #[test]
    fn test_duplicate_keys_cross_product() {
        let db = normalize_db_records(&[db_row("50", 0), db_row("00000050", 0)]);
        let sheet = normalize_sheet_records(&[
            sheet_row(4, "50", Some("CANCELADO")),
            sheet_row(5, "001/50", Some("cancelled")),
        ]);
        let result = reconcile(&db, &sheet);
        assert_eq!(result.status_mismatches.len(), 4);
        assert!(result.status_mismatches.iter().all(|m| m.key == 50));
        assert_eq!(result.duplicated_join_keys, keys(&[50]));
        // Order: DB input order, then sheet input order.
        assert_eq!(result.status_mismatches[0].db.document_number_raw, "50");
        assert_eq!(result.status_mismatches[0].sheet.row, 4);
        assert_eq!(result.status_mismatches[1].sheet.row, 5);
        assert_eq!(result.status_mismatches[2].db.document_number_raw, "00000050");
    }

    #[test]
    fn test_unknown_keys_collapse_and_match() {
        let db = normalize_db_records(&[db_row("ABC", 0)]);
        let sheet = normalize_sheet_records(&[sheet_row(4, "???", None)]);
        let result = reconcile(&db, &sheet);
        assert!(result.missing_from_spreadsheet.is_empty());
        assert!(result.missing_from_database.is_empty());
    }

    #[test]
    fn test_reconcile_is_idempotent() {
        let db = normalize_db_records(&[db_row("100", 1), db_row("200", 0), db_row("200", 1)]);
        let sheet = normalize_sheet_records(&[sheet_row(4, "200", Some("CANCEL")), sheet_row(5, "300", None)]);
        let db_before = db.clone();
        let sheet_before = sheet.clone();
        let first = reconcile(&db, &sheet);
        let second = reconcile(&db, &sheet);
        assert_eq!(first, second);
        assert_eq!(db, db_before);
        assert_eq!(sheet, sheet_before);
    }

    #[test]
    fn test_set_algebra_partitions_each_side() {
        let db = normalize_db_records(&[db_row("1", 0), db_row("2", 0), db_row("3", 1), db_row("7", 0)]);
        let sheet = normalize_sheet_records(&[
            sheet_row(4, "2", None),
            sheet_row(5, "3", None),
            sheet_row(6, "4", None),
            sheet_row(7, "5", None),
        ]);
        let a: BTreeSet<i64> = db.iter().map(|r| r.key).collect();
        let b: BTreeSet<i64> = sheet.iter().map(|r| r.key).collect();
        let both: BTreeSet<i64> = a.intersection(&b).copied().collect();
        let result = reconcile(&db, &sheet);

        let union_a: BTreeSet<i64> = result.missing_from_spreadsheet.union(&both).copied().collect();
        assert_eq!(union_a, a);
        assert!(result.missing_from_spreadsheet.is_disjoint(&both));

        let union_b: BTreeSet<i64> = result.missing_from_database.union(&both).copied().collect();
        assert_eq!(union_b, b);
        assert!(result.missing_from_database.is_disjoint(&both));

        for m in &result.status_mismatches {
            assert!(both.contains(&m.key));
        }
    }
}
