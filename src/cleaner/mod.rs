//! Sheet cleaning: required-sheet validation and date enrichment
//!
//! The cleaner never mutates the uploaded workbook. Each required sheet that is
//! present is copied, its first candidate date column (in priority order) is
//! parsed day-first and expanded into calendar fields, and the copy is placed in
//! the cleaned workbook. Missing sheets produce warnings, not errors.

pub mod dates;

pub use dates::{enrich_date_column, parse_day_first, CalendarFields, DERIVED_COLUMNS};

use crate::config::CleanerConfig;
use crate::types::{Table, Workbook};
use serde::Serialize;
use std::fmt;
use tracing::{debug, info, warn};

/// A required sheet that was not in the upload
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SheetWarning {
    pub sheet: String,
    pub message: String,
}

impl SheetWarning {
    pub fn missing(sheet: &str) -> Self {
        Self {
            sheet: sheet.to_string(),
            message: format!("Sheet '{}' not found in the file.", sheet),
        }
    }
}

impl fmt::Display for SheetWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message)
    }
}

/// What happened to one cleaned sheet
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SheetSummary {
    pub sheet: String,
    pub rows: usize,
    /// Column that was enriched, if any candidate was present
    pub date_column: Option<String>,
    /// Rows whose date could not be parsed
    pub unparsed_dates: usize,
}

/// Result of cleaning one upload
#[derive(Debug, Clone, Default)]
pub struct CleanReport {
    /// Present required sheets, in required order
    pub workbook: Workbook,
    pub warnings: Vec<SheetWarning>,
    pub summaries: Vec<SheetSummary>,
}

/// Validates required sheet names and enriches date columns
#[derive(Debug, Clone)]
pub struct SheetCleaner {
    required_sheets: Vec<String>,
    date_columns: Vec<String>,
}

impl Default for SheetCleaner {
    fn default() -> Self {
        Self::new(&CleanerConfig::default())
    }
}

impl SheetCleaner {
    pub fn new(config: &CleanerConfig) -> Self {
        Self {
            required_sheets: config.required_sheets.clone(),
            date_columns: config.date_columns.clone(),
        }
    }

    pub fn required_sheets(&self) -> &[String] {
        &self.required_sheets
    }

    /// Index of the first candidate date column present in `table`
    pub fn find_date_column(&self, table: &Table) -> Option<usize> {
        self.date_columns
            .iter()
            .find_map(|candidate| table.column_index(candidate))
    }

    /// Clean every required sheet present in `raw`
    pub fn clean(&self, raw: &Workbook) -> CleanReport {
        let mut report = CleanReport::default();

        for name in &self.required_sheets {
            let Some(sheet) = raw.get(name) else {
                warn!("Sheet '{}' not found", name);
                report.warnings.push(SheetWarning::missing(name));
                continue;
            };

            let (table, summary) = self.clean_sheet(sheet);
            report.workbook.add_sheet(table);
            report.summaries.push(summary);
        }

        info!(
            "Cleaned {} of {} required sheets ({} rows)",
            report.workbook.len(),
            self.required_sheets.len(),
            report.workbook.total_rows()
        );
        report
    }

    fn clean_sheet(&self, sheet: &Table) -> (Table, SheetSummary) {
        let mut table = sheet.clone();
        let date_index = self.find_date_column(&table);

        let unparsed_dates = match date_index {
            Some(idx) => {
                debug!("Enriching '{}' from column '{}'", table.name, table.columns[idx].name);
                enrich_date_column(&mut table, idx)
            }
            None => {
                debug!("No date column in '{}'", table.name);
                0
            }
        };

        if unparsed_dates > 0 {
            warn!(
                "{} rows in '{}' have unparseable dates",
                unparsed_dates, table.name
            );
        }

        let summary = SheetSummary {
            sheet: table.name.clone(),
            rows: table.row_count(),
            date_column: date_index.map(|idx| table.columns[idx].name.clone()),
            unparsed_dates,
        };
        (table, summary)
    }
}
