//! Excel exporter implementation - cleaned sheets → .xlsx for offline review

use crate::error::{EtlError, EtlResult};
use crate::types::{CellValue, Table, Workbook};
use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use rust_xlsxwriter::{Format, Workbook as XlsxWorkbook, Worksheet};
use std::path::Path;
use tracing::info;

/// Writes a [`Workbook`] to .xlsx, one worksheet per table
pub struct ExcelExporter<'a> {
    workbook: &'a Workbook,
}

impl<'a> ExcelExporter<'a> {
    /// Create a new Excel exporter
    pub fn new(workbook: &'a Workbook) -> Self {
        Self { workbook }
    }

    /// Export to an .xlsx file
    pub fn export(&self, output_path: &Path) -> EtlResult<()> {
        let mut xlsx = self.build()?;
        xlsx.save(output_path)
            .map_err(|e| EtlError::Export(format!("Failed to save Excel file: {}", e)))?;
        info!("Exported {} sheets to {}", self.workbook.len(), output_path.display());
        Ok(())
    }

    /// Export to an in-memory .xlsx
    pub fn to_bytes(&self) -> EtlResult<Vec<u8>> {
        let mut xlsx = self.build()?;
        xlsx.save_to_buffer()
            .map_err(|e| EtlError::Export(format!("Failed to write Excel buffer: {}", e)))
    }

    fn build(&self) -> EtlResult<XlsxWorkbook> {
        let mut xlsx = XlsxWorkbook::new();
        for table in self.workbook {
            let worksheet = xlsx.add_worksheet();
            Self::export_table(worksheet, table)?;
        }
        Ok(xlsx)
    }

    /// Export a single table to a worksheet
    fn export_table(worksheet: &mut Worksheet, table: &Table) -> EtlResult<()> {
        worksheet
            .set_name(&table.name)
            .map_err(|e| EtlError::Export(format!("Failed to set worksheet name: {}", e)))?;

        let header_format = Format::new().set_bold();
        let date_format = Format::new().set_num_format("yyyy-mm-dd");
        let datetime_format = Format::new().set_num_format("yyyy-mm-dd hh:mm:ss");

        for (col_idx, column) in table.columns.iter().enumerate() {
            let col = col_idx as u16;
            worksheet
                .write_string_with_format(0, col, &column.name, &header_format)
                .map_err(|e| EtlError::Export(format!("Failed to write header: {}", e)))?;

            for (row_idx, value) in column.values.iter().enumerate() {
                let row = (row_idx + 1) as u32;
                let result = match value {
                    CellValue::Null => continue,
                    CellValue::Int(i) => worksheet.write_number(row, col, *i as f64),
                    CellValue::Float(f) => worksheet.write_number(row, col, *f),
                    CellValue::Text(s) => worksheet.write_string(row, col, s),
                    CellValue::Bool(b) => worksheet.write_boolean(row, col, *b),
                    CellValue::Date(d) => worksheet.write_number_with_format(
                        row,
                        col,
                        excel_serial(d.and_time(NaiveTime::MIN)),
                        &date_format,
                    ),
                    CellValue::DateTime(dt) => {
                        worksheet.write_number_with_format(row, col, excel_serial(*dt), &datetime_format)
                    }
                };
                result.map_err(|e| {
                    EtlError::Export(format!(
                        "Failed to write {} cell in '{}': {}",
                        value.type_name(),
                        table.name,
                        e
                    ))
                })?;
            }
        }

        worksheet
            .set_freeze_panes(1, 0)
            .map_err(|e| EtlError::Export(format!("Failed to freeze header row: {}", e)))?;
        Ok(())
    }
}

/// Excel serial day number (1900 system) for timestamps after 1900-02-28
fn excel_serial(value: NaiveDateTime) -> f64 {
    let epoch = NaiveDate::from_ymd_opt(1899, 12, 30)
        .unwrap_or_default()
        .and_time(NaiveTime::MIN);
    let elapsed = value - epoch;
    elapsed.num_seconds() as f64 / 86_400.0
}
