//! Spreadsheet importer - uploaded file → named tables

use crate::cleaner::dates::excel_serial_to_datetime;
use crate::error::{EtlError, EtlResult};
use crate::types::{CellValue, Table, Workbook};
use calamine::{open_workbook_auto, open_workbook_auto_from_rs, Data, Range, Reader, Sheets};
use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use std::collections::HashMap;
use std::io::{Cursor, Read, Seek};
use std::path::Path;
use tracing::{debug, info};

/// Reads every worksheet of a spreadsheet into a [`Workbook`].
///
/// The first row of each sheet is the header. xlsx, xlsm, xlsb, xls and ods
/// are detected automatically.
pub struct ExcelImporter;

impl ExcelImporter {
    /// Import a spreadsheet from disk
    pub fn import_path<P: AsRef<Path>>(path: P) -> EtlResult<Workbook> {
        let path = path.as_ref();
        let sheets = open_workbook_auto(path).map_err(|e| {
            EtlError::Workbook(format!("failed to open {}: {}", path.display(), e))
        })?;
        info!("Reading workbook {}", path.display());
        Self::import_sheets(sheets)
    }

    /// Import an uploaded spreadsheet held in memory
    pub fn import_bytes(bytes: Vec<u8>) -> EtlResult<Workbook> {
        if bytes.is_empty() {
            return Err(EtlError::Workbook("uploaded file is empty".to_string()));
        }
        let sheets = open_workbook_auto_from_rs(Cursor::new(bytes))
            .map_err(|e| EtlError::Workbook(format!("failed to open upload: {}", e)))?;
        Self::import_sheets(sheets)
    }

    fn import_sheets<RS: Read + Seek>(mut sheets: Sheets<RS>) -> EtlResult<Workbook> {
        let mut workbook = Workbook::new();

        for sheet_name in sheets.sheet_names() {
            let range = sheets.worksheet_range(&sheet_name).map_err(|e| {
                EtlError::Workbook(format!("failed to read sheet '{}': {}", sheet_name, e))
            })?;
            let table = Self::process_sheet(&sheet_name, &range);
            debug!(
                "Sheet '{}': {} columns, {} rows",
                sheet_name,
                table.columns.len(),
                table.row_count()
            );
            workbook.add_sheet(table);
        }

        info!("Workbook has {} sheets", workbook.len());
        Ok(workbook)
    }

    /// Convert one worksheet range; row 0 is the header
    fn process_sheet(sheet_name: &str, range: &Range<Data>) -> Table {
        let mut rows = range.rows();
        let Some(header) = rows.next() else {
            return Table::new(sheet_name);
        };

        let headers = Self::column_names(header);
        let data = rows.map(|row| row.iter().map(Self::convert_cell).collect::<Vec<_>>());
        Table::from_rows(sheet_name, &headers, data)
    }

    /// Header names; blanks become `col_<n>`, repeats get `.1`, `.2`, ...
    fn column_names(header: &[Data]) -> Vec<String> {
        let mut seen: HashMap<String, usize> = HashMap::new();

        header
            .iter()
            .enumerate()
            .map(|(col, cell)| {
                let name = match cell {
                    Data::String(s) if !s.trim().is_empty() => s.clone(),
                    Data::Int(i) => i.to_string(),
                    Data::Float(f) => f.to_string(),
                    Data::Bool(b) => b.to_string(),
                    _ => format!("col_{}", col),
                };
                let count = seen.entry(name.clone()).or_insert(0);
                let unique = if *count == 0 {
                    name
                } else {
                    format!("{}.{}", name, count)
                };
                *count += 1;
                unique
            })
            .collect()
    }

    /// Convert one calamine cell
    fn convert_cell(cell: &Data) -> CellValue {
        match cell {
            Data::Empty | Data::Error(_) => CellValue::Null,
            Data::String(s) if s.trim().is_empty() => CellValue::Null,
            Data::String(s) => CellValue::Text(s.clone()),
            Data::Int(i) => CellValue::Int(*i),
            Data::Float(f) => {
                if f.fract() == 0.0 && f.abs() < i64::MAX as f64 {
                    CellValue::Int(*f as i64)
                } else {
                    CellValue::Float(*f)
                }
            }
            Data::Bool(b) => CellValue::Bool(*b),
            Data::DateTime(dt) => match excel_serial_to_datetime(dt.as_f64()) {
                Some(value) if value.time() == NaiveTime::MIN => CellValue::Date(value.date()),
                Some(value) => CellValue::DateTime(value),
                None => CellValue::Float(dt.as_f64()),
            },
            Data::DateTimeIso(s) => {
                if let Ok(value) = NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S%.f") {
                    CellValue::DateTime(value)
                } else if let Ok(date) = NaiveDate::parse_from_str(s, "%Y-%m-%d") {
                    CellValue::Date(date)
                } else {
                    CellValue::Text(s.clone())
                }
            }
            Data::DurationIso(s) => CellValue::Text(s.clone()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_column_names_blank_and_duplicates() {
        let header = vec![
            Data::String("Date".to_string()),
            Data::Empty,
            Data::String("Date".to_string()),
            Data::Float(2024.0),
            Data::String("Date".to_string()),
        ];
        assert_eq!(
            ExcelImporter::column_names(&header),
            vec!["Date", "col_1", "Date.1", "2024", "Date.2"]
        );
    }

    #[test]
    fn test_convert_cell_scalars() {
        assert_eq!(ExcelImporter::convert_cell(&Data::Empty), CellValue::Null);
        assert_eq!(
            ExcelImporter::convert_cell(&Data::String("  ".to_string())),
            CellValue::Null
        );
        assert_eq!(ExcelImporter::convert_cell(&Data::Float(5.0)), CellValue::Int(5));
        assert_eq!(ExcelImporter::convert_cell(&Data::Float(2.5)), CellValue::Float(2.5));
        assert_eq!(ExcelImporter::convert_cell(&Data::Bool(true)), CellValue::Bool(true));
    }

    #[test]
    fn test_convert_cell_iso_datetime() {
        let cell = Data::DateTimeIso("2024-04-03".to_string());
        assert_eq!(
            ExcelImporter::convert_cell(&cell),
            CellValue::Date(NaiveDate::from_ymd_opt(2024, 4, 3).unwrap())
        );
        let cell = Data::DateTimeIso("2024-04-03T10:00:00".to_string());
        assert!(matches!(ExcelImporter::convert_cell(&cell), CellValue::DateTime(_)));
    }

    #[test]
    fn test_import_bytes_rejects_garbage() {
        let result = ExcelImporter::import_bytes(b"definitely not a spreadsheet".to_vec());
        assert!(matches!(result, Err(EtlError::Workbook(_))));
    }

    #[test]
    fn test_import_bytes_rejects_empty() {
        let result = ExcelImporter::import_bytes(Vec::new());
        assert!(matches!(result, Err(EtlError::Workbook(_))));
    }
}
