use colored::Colorize;
use comfy_table::{Cell, Table};

use crate::fmt::{date_br, money, money_opt, plural, status_label};
use crate::models::{RawDbRecord, RawSheetRecord};
use crate::pipeline::RunOutcome;
use crate::reconciler::{ReconciliationSummary, StatusMismatch};

pub fn format_summary(summary: &ReconciliationSummary) -> String {
    let count = |n: usize| {
        let s = plural(n, "note", "notes");
        if n == 0 {
            s.green().to_string()
        } else {
            s.red().to_string()
        }
    };

    let mut table = Table::new();
    table.set_header(vec!["Check", "Result", "Meaning"]);
    table.add_row(vec![
        Cell::new("Missing from spreadsheet"),
        Cell::new(count(summary.missing_from_spreadsheet)),
        Cell::new("In the ERP but not in the spreadsheet"),
    ]);
    table.add_row(vec![
        Cell::new("Missing from database"),
        Cell::new(count(summary.missing_from_database)),
        Cell::new("In the spreadsheet but not in the ERP"),
    ]);
    table.add_row(vec![
        Cell::new("Status mismatch"),
        Cell::new(count(summary.status_mismatches)),
        Cell::new("Cancelled on one side, active on the other"),
    ]);
    let verdict = if summary.is_clean() {
        "Everything matches.".green().to_string()
    } else {
        "Discrepancies found.".red().to_string()
    };
    format!("{}\n{table}\n{verdict}", "Reconciliation Result".bold())
}

pub fn format_status_mismatches(rows: &[StatusMismatch]) -> String {
    if rows.is_empty() {
        return "All good: cancellation status matches on both sides.".green().to_string();
    }

    let mut table = Table::new();
    table.set_header(vec!["Key", "ERP Nº", "ERP Status", "Party", "ERP Value", "Sheet Row", "Sheet Nº", "Sheet Receipt", "Sheet Status"]);
    for m in rows {
        table.add_row(vec![
            Cell::new(m.key),
            Cell::new(&m.db.document_number_raw),
            Cell::new(status_label(m.db_cancelled)),
            Cell::new(&m.db.party_name),
            Cell::new(money(m.db.total_value)),
            Cell::new(m.sheet.row),
            Cell::new(m.sheet.note_number_raw.as_deref().unwrap_or("")),
            Cell::new(m.sheet.receipt_field.as_deref().unwrap_or("")),
            Cell::new(status_label(m.sheet_cancelled)),
        ]);
    }
    format!("{} ({})\n{table}", "Status Mismatch".red().bold(), rows.len())
}

pub fn format_missing_from_database(rows: &[RawSheetRecord]) -> String {
    if rows.is_empty() {
        return "All good: every spreadsheet note is in the ERP.".green().to_string();
    }

    let mut table = Table::new();
    table.set_header(vec!["Row", "Nº NF", "DATA NF", "DATA DE RECEBIMENTO", "VALOR NF"]);
    for r in rows {
        table.add_row(vec![
            Cell::new(r.row),
            Cell::new(r.note_number_raw.as_deref().unwrap_or("")),
            Cell::new(date_br(r.note_date)),
            Cell::new(r.receipt_field.as_deref().unwrap_or("")),
            Cell::new(money_opt(r.total_value)),
        ]);
    }
    format!(
        "{} ({})\nIn the spreadsheet, but the ERP has no such note.\n{table}",
        "Missing from Database".yellow().bold(),
        rows.len()
    )
}

pub fn format_missing_from_spreadsheet(rows: &[RawDbRecord]) -> String {
    if rows.is_empty() {
        return "All good: no ERP notes are missing from the spreadsheet.".green().to_string();
    }

    let mut table = Table::new();
    table.set_header(vec!["Document Nº", "Party", "Value", "Status"]);
    for r in rows {
        table.add_row(vec![
            Cell::new(&r.document_number_raw),
            Cell::new(&r.party_name),
            Cell::new(money(r.total_value)),
            Cell::new(r.status_code),
        ]);
    }
    format!(
        "{} ({})\nIn the ERP, but not listed in the spreadsheet.\n{table}",
        "Missing from Spreadsheet".cyan().bold(),
        rows.len()
    )
}

fn short_checksum(checksum: &str) -> &str {
    checksum.get(..12).unwrap_or(checksum)
}

/// Full text report for one spreadsheet.
pub fn format_outcome(label: &str, outcome: &RunOutcome) -> String {
    let params = &outcome.params;
    let org = match params.organization_id {
        Some(id) => format!("organization {id}"),
        None => "all organizations".to_string(),
    };
    let mut out = format!(
        "{}\n{} to {}, {org}\nERP notes: {}   Spreadsheet rows: {} ({} in range)\nSHA-256: {}\n",
        label.bold(),
        date_br(Some(params.range.start)),
        date_br(Some(params.range.end)),
        outcome.db_records,
        outcome.sheet_rows,
        outcome.sheet_records,
        short_checksum(&outcome.sheet_checksum),
    );
    if let Some(warning) = &outcome.db_warning {
        out.push_str(&format!(
            "{} {warning}\nThe ERP side is empty: every spreadsheet note is reported as missing from the database.\n",
            "Warning:".yellow().bold()
        ));
    }

    let result = &outcome.result;
    out.push('\n');
    out.push_str(&format_summary(&result.summary()));
    out.push_str("\n\n");
    out.push_str(&format_status_mismatches(&result.status_mismatches));
    out.push_str("\n\n");
    out.push_str(&format_missing_from_database(&result.sheet_only));
    out.push_str("\n\n");
    out.push_str(&format_missing_from_spreadsheet(&result.db_only));

    if !result.duplicated_join_keys.is_empty() {
        let keys: Vec<String> = result.duplicated_join_keys.iter().map(i64::to_string).collect();
        out.push_str(&format!(
            "\n\nNote: note numbers repeated within a source ({}); their mismatches are listed once per pair.",
            keys.join(", ")
        ));
    }
    out
}
