use std::time::Duration;
use thiserror::Error;

pub type EtlResult<T> = Result<T, EtlError>;

#[derive(Error, Debug)]
pub enum EtlError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("YAML parsing error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// The uploaded file could not be read as a workbook at all
    #[error("Error processing the file: {0}")]
    Workbook(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Export error: {0}")]
    Export(String),

    #[error(transparent)]
    Load(#[from] LoadError),
}

/// Failures while writing cleaned sheets to the warehouse.
///
/// Any of these aborts the whole run; nothing is committed.
#[derive(Error, Debug)]
pub enum LoadError {
    #[error("PostgreSQL Error: could not connect: {0}")]
    Connect(String),

    /// Columns of unequal length; nothing from this sheet was sent
    #[error("PostgreSQL Error: sheet '{sheet}' is malformed: {message}")]
    InvalidSheet { sheet: String, message: String },

    #[error("PostgreSQL Error: could not create table '{table}' for sheet '{sheet}': {message}")]
    CreateTable {
        sheet: String,
        table: String,
        message: String,
    },

    /// `row` is the 1-based data row that started the failing statement
    #[error("PostgreSQL Error: insert into '{table}' failed at row {row} of sheet '{sheet}': {message}")]
    Insert {
        sheet: String,
        table: String,
        row: usize,
        message: String,
    },

    #[error("PostgreSQL Error: commit failed: {0}")]
    Commit(String),

    #[error("PostgreSQL Error: load timed out after {0:?}, nothing was committed")]
    Timeout(Duration),
}

impl LoadError {
    /// Short label for the step that failed
    pub fn phase(&self) -> &'static str {
        match self {
            LoadError::Connect(_) => "connect",
            LoadError::InvalidSheet { .. } => "validate",
            LoadError::CreateTable { .. } => "create_table",
            LoadError::Insert { .. } => "insert",
            LoadError::Commit(_) => "commit",
            LoadError::Timeout(_) => "timeout",
        }
    }

    /// Sheet the failure is attributable to, if any
    pub fn sheet(&self) -> Option<&str> {
        match self {
            LoadError::InvalidSheet { sheet, .. }
            | LoadError::CreateTable { sheet, .. }
            | LoadError::Insert { sheet, .. } => Some(sheet),
            _ => None,
        }
    }
}
