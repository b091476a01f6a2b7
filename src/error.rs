use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConferenciaError {
    #[error("Database error: {0}")]
    Db(#[from] rusqlite::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    /// Missing connection parameters or an unusable query template.
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// The data source could not be reached or the query failed.
    #[error("Could not connect to the ERP database: {0}")]
    Connectivity(String),

    /// The spreadsheet could not be read at all.
    #[error("Could not read spreadsheet: {0}")]
    Parse(String),

    #[error("Column '{column}' not found in spreadsheet. Check the file.")]
    Schema { column: String },

    #[error("Invalid date range: {0}")]
    InvalidDateRange(String),

    #[error("Settings error: {0}")]
    Settings(String),

    #[error("{0}")]
    Other(String),
}

impl ConferenciaError {
    /// Errors the data source boundary absorbs into an empty record set.
    pub fn is_data_source_failure(&self) -> bool {
        matches!(self, Self::Configuration(_) | Self::Connectivity(_))
    }
}

pub type Result<T> = std::result::Result<T, ConferenciaError>;
