pub mod init;
pub mod reconcile;
pub mod report;
pub mod status;

use chrono::{Datelike, NaiveDate};
use clap::{Args, Parser, Subcommand};

use crate::error::{ConferenciaError, Result};
use crate::sheet::parse_date;

/// Parse a `--from`/`--to` value (YYYY-MM-DD or DD/MM/YYYY), falling back to
/// `default` when absent.
pub(crate) fn parse_date_arg(value: Option<&str>, default: NaiveDate) -> Result<NaiveDate> {
    match value {
        None => Ok(default),
        Some(v) => parse_date(v)
            .ok_or_else(|| ConferenciaError::InvalidDateRange(format!("cannot read date '{v}'"))),
    }
}

pub(crate) fn start_of_year(today: NaiveDate) -> NaiveDate {
    NaiveDate::from_ymd_opt(today.year(), 1, 1).unwrap_or(today)
}

#[derive(Parser)]
#[command(
    name = "conferencia",
    about = "Reconcile ERP fiscal notes against a control spreadsheet."
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Save the ERP database location, query and defaults.
    Init {
        /// SQLite copy of the ERP database
        #[arg(long)]
        database: Option<String>,
        /// File holding the SQL query (binds :date_start, :date_end, :org_id)
        #[arg(long = "query-file")]
        query_file: Option<String>,
        /// Default organization code
        #[arg(long)]
        org: Option<i64>,
        /// Directory for exported CSV files
        #[arg(long = "export-dir")]
        export_dir: Option<String>,
        /// Seconds a fetched ERP result may be reused
        #[arg(long = "cache-ttl")]
        cache_ttl: Option<u64>,
    },
    /// Compare one or more control spreadsheets against the ERP.
    Reconcile(ReconcileArgs),
    /// Show the current configuration.
    Status,
}

#[derive(Args)]
pub struct ReconcileArgs {
    /// Spreadsheet(s) to check (.xlsx or .csv)
    #[arg(required = true)]
    pub files: Vec<String>,
    /// Start date: YYYY-MM-DD (default: January 1st of this year)
    #[arg(long = "from")]
    pub from_date: Option<String>,
    /// End date: YYYY-MM-DD (default: today)
    #[arg(long = "to")]
    pub to_date: Option<String>,
    /// Organization code
    #[arg(long, conflicts_with = "all_orgs")]
    pub org: Option<i64>,
    /// Ignore the organization code and check every organization
    #[arg(long = "all-orgs")]
    pub all_orgs: bool,
    /// Write the three result tables as CSV to the configured export dir
    #[arg(long)]
    pub export: bool,
    /// Write the CSV files here instead (implies --export)
    #[arg(long = "export-dir")]
    pub export_dir: Option<String>,
    /// Print the full outcome as JSON instead of tables
    #[arg(long)]
    pub json: bool,
    /// Override the configured database
    #[arg(long)]
    pub database: Option<String>,
    /// Override the configured query with the SQL in this file
    #[arg(long = "query-file")]
    pub query_file: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    #[test]
    fn test_parse_date_arg() {
        assert_eq!(parse_date_arg(None, d(2025, 6, 1)).unwrap(), d(2025, 6, 1));
        assert_eq!(parse_date_arg(Some("2025-01-31"), d(2025, 6, 1)).unwrap(), d(2025, 1, 31));
        assert_eq!(parse_date_arg(Some("31/01/2025"), d(2025, 6, 1)).unwrap(), d(2025, 1, 31));
        assert!(parse_date_arg(Some("ontem"), d(2025, 6, 1)).is_err());
    }

    #[test]
    fn test_start_of_year() {
        assert_eq!(start_of_year(d(2025, 10, 16)), d(2025, 1, 1));
    }

    #[test]
    fn test_org_flags_conflict() {
        let parsed = Cli::try_parse_from(["conferencia", "reconcile", "a.csv", "--org", "1", "--all-orgs"]);
        assert!(parsed.is_err());
    }

    #[test]
    fn test_reconcile_requires_a_file() {
        assert!(Cli::try_parse_from(["conferencia", "reconcile"]).is_err());
        assert!(Cli::try_parse_from(["conferencia", "reconcile", "a.csv", "b.xlsx"]).is_ok());
    }
}
