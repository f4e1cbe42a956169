//! Spreadsheet import/export
//!
//! - Import: uploaded spreadsheet (.xlsx, .xls, .xlsb, .ods) → [`Workbook`](crate::types::Workbook)
//! - Export: cleaned workbook → .xlsx for review

mod exporter;
mod importer;

pub use exporter::ExcelExporter;
pub use importer::ExcelImporter;
