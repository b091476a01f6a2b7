/// ERP status code for a cancelled note. Every other code counts as active.
pub const DB_STATUS_CANCELLED: i64 = 1;

const CANCEL_MARKER: &str = "CANCEL";

pub fn classify_db_cancelled(status_code: i64) -> bool {
    status_code == DB_STATUS_CANCELLED
}

/// The spreadsheet has no status column; users write "CANCELADO" (or similar)
/// into the receipt date column instead.
pub fn classify_sheet_cancelled(receipt_field: Option<&str>) -> bool {
    receipt_field.is_some_and(|f| f.to_uppercase().contains(CANCEL_MARKER))
}
