//! Sheet ETL - master sheet cleaning and warehouse loading
//!
//! Reads a multi-sheet production workbook, keeps the six workflow stages
//! (Intake, Sorting, Low-Risk, High-Care, Assembly, Dispatch), enriches each
//! stage's date column with calendar fields, and loads the cleaned tables into
//! PostgreSQL as `cleaned_<sheet>` in a single transaction.
//!
//! # Example
//!
//! ```no_run
//! use sheet_etl::cleaner::SheetCleaner;
//! use sheet_etl::excel::ExcelImporter;
//!
//! let raw = ExcelImporter::import_path("master.xlsx")?;
//! let report = SheetCleaner::default().clean(&raw);
//!
//! for warning in &report.warnings {
//!     println!("{}", warning);
//! }
//! println!("Cleaned sheets: {:?}", report.workbook.sheet_names());
//! # Ok::<(), sheet_etl::error::EtlError>(())
//! ```

pub mod api;
pub mod cleaner;
pub mod cli;
pub mod config;
pub mod error;
pub mod excel;
pub mod loader;
pub mod types;

// Re-export commonly used types
pub use cleaner::{CleanReport, SheetCleaner};
pub use config::Config;
pub use error::{EtlError, EtlResult, LoadError};
pub use loader::{LoadReport, WarehouseLoader};
pub use types::{CellValue, Column, Table, Workbook};
