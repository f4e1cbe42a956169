use crate::cleaner::{CleanReport, SheetCleaner};
use crate::config::Config;
use crate::error::{EtlError, EtlResult};
use crate::excel::{ExcelExporter, ExcelImporter};
use crate::loader::{LoadReport, WarehouseLoader};
use crate::types::{CellValue, Table};
use colored::Colorize;
use std::path::{Path, PathBuf};

/// Widest a preview cell is allowed to render
const MAX_CELL_WIDTH: usize = 24;

/// Format a cell for the terminal preview
fn format_cell(value: &CellValue) -> String {
    let text = match value {
        CellValue::Null => String::new(),
        CellValue::Float(f) => {
            let rounded = (f * 1e6).round() / 1e6;
            format!("{:.6}", rounded)
                .trim_end_matches('0')
                .trim_end_matches('.')
                .to_string()
        }
        other => other.to_string(),
    };

    if text.chars().count() > MAX_CELL_WIDTH {
        let cut: String = text.chars().take(MAX_CELL_WIDTH - 1).collect();
        format!("{}…", cut)
    } else {
        text
    }
}

/// Render the first `rows` rows of a table as aligned text
pub fn render_preview(table: &Table, rows: usize) -> String {
    let head = table.head(rows);
    let headers: Vec<String> = head.columns.iter().map(|c| c.name.clone()).collect();
    let body: Vec<Vec<String>> = (0..head.row_count())
        .filter_map(|idx| head.row(idx))
        .map(|row| row.into_iter().map(format_cell).collect())
        .collect();

    let widths: Vec<usize> = headers
        .iter()
        .enumerate()
        .map(|(col, name)| {
            body.iter()
                .map(|row| row[col].chars().count())
                .chain(std::iter::once(name.chars().count()))
                .max()
                .unwrap_or(0)
        })
        .collect();

    let line = |cells: &[String]| -> String {
        cells
            .iter()
            .zip(&widths)
            .map(|(cell, width)| format!("{:<width$}", cell, width = width))
            .collect::<Vec<_>>()
            .join(" | ")
            .trim_end()
            .to_string()
    };

    let mut out = String::new();
    out.push_str(&line(&headers));
    out.push('\n');
    out.push_str(
        &widths
            .iter()
            .map(|w| "-".repeat(*w))
            .collect::<Vec<_>>()
            .join("-+-"),
    );
    out.push('\n');
    for row in &body {
        out.push_str(&line(row));
        out.push('\n');
    }
    out
}

/// Read and clean a workbook, printing warnings as they are found
fn read_and_clean(file: &Path, config: &Config) -> EtlResult<CleanReport> {
    let raw = ExcelImporter::import_path(file)?;
    println!(
        "   Read {} sheets: {}",
        raw.len(),
        raw.sheet_names().join(", ")
    );

    let report = SheetCleaner::new(&config.cleaner).clean(&raw);
    for warning in &report.warnings {
        println!("   {} {}", "⚠️ ".yellow(), warning.to_string().yellow());
    }
    println!();
    Ok(report)
}

fn print_report(report: &CleanReport, rows: usize) {
    for (table, summary) in report.workbook.iter().zip(&report.summaries) {
        println!(
            "{} {} ({} rows)",
            "📄".cyan(),
            table.name.bold().cyan(),
            summary.rows
        );
        match &summary.date_column {
            Some(column) => println!("   Date column: {}", column.bright_blue()),
            None => println!("   {}", "No date column found".dimmed()),
        }
        if summary.unparsed_dates > 0 {
            println!(
                "   {}",
                format!("{} dates could not be parsed", summary.unparsed_dates).yellow()
            );
        }
        println!();
        print!("{}", render_preview(table, rows));
        println!();
    }
}

/// Execute the clean command
pub fn clean(file: PathBuf, rows: Option<usize>, config: &Config) -> EtlResult<()> {
    println!("{}", "🧹 Sheet ETL - Cleaning master sheet".bold().green());
    println!("   File: {}", file.display());

    let report = read_and_clean(&file, config)?;
    let rows = rows.unwrap_or(config.cleaner.preview_rows);
    print_report(&report, rows);

    println!(
        "{}",
        format!(
            "✅ Cleaned {} sheets ({} rows)",
            report.workbook.len(),
            report.workbook.total_rows()
        )
        .bold()
        .green()
    );
    Ok(())
}

/// Execute the load command
pub fn load(file: PathBuf, confirm: bool, config: &Config) -> EtlResult<()> {
    println!("{}", "🚚 Sheet ETL - Loading master sheet".bold().green());
    println!("   File: {}", file.display());

    let report = read_and_clean(&file, config)?;
    print_report(&report, config.cleaner.preview_rows);

    if !confirm {
        println!(
            "{}",
            "PostgreSQL upload is disabled. You can review the data above.".yellow()
        );
        println!("   Re-run with {} to upload.", "--confirm".bold());
        return Ok(());
    }

    println!(
        "   Target: {}:{}/{}",
        config.warehouse.host, config.warehouse.port, config.warehouse.database
    );

    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()?;
    let loader = WarehouseLoader::postgres(&config.warehouse);

    match runtime.block_on(loader.load(&report.workbook, true)) {
        Ok(LoadReport::Committed { sheets, rows, .. }) => {
            for sheet in &sheets {
                println!(
                    "   {} → {} ({} rows)",
                    sheet.sheet,
                    sheet.table.bright_blue(),
                    sheet.rows
                );
            }
            println!();
            println!(
                "{}",
                format!("✅ Data successfully uploaded to PostgreSQL! ({} rows)", rows)
                    .bold()
                    .green()
            );
            Ok(())
        }
        Ok(LoadReport::Skipped) => Ok(()),
        Err(e) => {
            println!("{}", format!("❌ {}", e).bold().red());
            println!("   {}", "Nothing was committed.".red());
            Err(EtlError::Load(e))
        }
    }
}

/// Execute the export command
pub fn export(file: PathBuf, output: PathBuf, config: &Config) -> EtlResult<()> {
    println!("{}", "📊 Sheet ETL - Exporting cleaned sheets".bold().green());
    println!("   Input:  {}", file.display());
    println!("   Output: {}", output.display());

    let report = read_and_clean(&file, config)?;
    ExcelExporter::new(&report.workbook).export(&output)?;

    println!(
        "{}",
        format!(
            "✅ Wrote {} sheets to {}",
            report.workbook.len(),
            output.display()
        )
        .bold()
        .green()
    );
    Ok(())
}

/// Execute the config command
pub fn show_config(config: &Config) -> EtlResult<()> {
    println!("{}", "⚙️  Sheet ETL - Effective configuration".bold().green());
    println!();
    print!("{}", config.to_redacted_yaml()?);
    Ok(())
}
