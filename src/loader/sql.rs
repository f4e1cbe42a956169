//! SQL statement shapes issued by the loader.
//!
//! Identifiers are always double-quoted. Values are never written into SQL text:
//! every non-null cell becomes a `$n` placeholder and nulls are the `NULL`
//! keyword, so untyped nulls never clash with the target column type.

use crate::types::{CellValue, Table};
use serde::Serialize;

/// Bind parameters Postgres accepts in one statement (the count is a signed 16-bit field)
pub const MAX_BIND_PARAMS: usize = i16::MAX as usize;

/// `cleaned_` + sheet name lowercased with spaces as underscores
pub fn target_table_name(sheet: &str) -> String {
    format!("cleaned_{}", sheet.to_lowercase().replace(' ', "_"))
}

/// Double-quote an identifier, doubling embedded quotes
pub fn quote_ident(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

/// Column type used when creating a missing target table
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum SqlType {
    BigInt,
    Double,
    Boolean,
    Date,
    Timestamp,
    Text,
}

impl SqlType {
    pub fn as_sql(&self) -> &'static str {
        match self {
            SqlType::BigInt => "BIGINT",
            SqlType::Double => "DOUBLE PRECISION",
            SqlType::Boolean => "BOOLEAN",
            SqlType::Date => "DATE",
            SqlType::Timestamp => "TIMESTAMP",
            SqlType::Text => "TEXT",
        }
    }

    fn of(value: &CellValue) -> Option<SqlType> {
        match value {
            CellValue::Null => None,
            CellValue::Int(_) => Some(SqlType::BigInt),
            CellValue::Float(_) => Some(SqlType::Double),
            CellValue::Text(_) => Some(SqlType::Text),
            CellValue::Bool(_) => Some(SqlType::Boolean),
            CellValue::Date(_) => Some(SqlType::Date),
            CellValue::DateTime(_) => Some(SqlType::Timestamp),
        }
    }

    fn merge(self, other: SqlType) -> SqlType {
        use SqlType::*;
        match (self, other) {
            (a, b) if a == b => a,
            (BigInt, Double) | (Double, BigInt) => Double,
            (Date, Timestamp) | (Timestamp, Date) => Timestamp,
            _ => Text,
        }
    }

    /// Narrowest type holding every non-null value; all-null columns are TEXT
    pub fn infer(values: &[CellValue]) -> SqlType {
        values
            .iter()
            .filter_map(SqlType::of)
            .reduce(SqlType::merge)
            .unwrap_or(SqlType::Text)
    }
}

/// `CREATE TABLE IF NOT EXISTS` derived from a sheet header
#[derive(Debug, Clone, PartialEq)]
pub struct CreateTableStatement {
    pub table: String,
    pub columns: Vec<(String, SqlType)>,
}

impl CreateTableStatement {
    pub fn from_table(target: &str, table: &Table) -> Self {
        Self {
            table: target.to_string(),
            columns: table
                .columns
                .iter()
                .map(|c| (c.name.clone(), SqlType::infer(&c.values)))
                .collect(),
        }
    }

    pub fn to_sql(&self) -> String {
        let columns: Vec<String> = self
            .columns
            .iter()
            .map(|(name, ty)| format!("{} {}", quote_ident(name), ty.as_sql()))
            .collect();
        format!(
            "CREATE TABLE IF NOT EXISTS {} ({})",
            quote_ident(&self.table),
            columns.join(", ")
        )
    }
}

/// One INSERT statement covering one or more rows of a sheet
#[derive(Debug, Clone, PartialEq)]
pub struct InsertStatement<'a> {
    pub table: &'a str,
    pub columns: Vec<&'a str>,
    pub rows: Vec<Vec<&'a CellValue>>,
}

impl<'a> InsertStatement<'a> {
    /// Rows `start..end` of `source`, targeting `table`
    pub fn for_rows(table: &'a str, source: &'a Table, start: usize, end: usize) -> Self {
        Self {
            table,
            columns: source.column_names(),
            rows: (start..end).filter_map(|idx| source.row(idx)).collect(),
        }
    }

    pub fn to_sql(&self) -> String {
        let columns: Vec<String> = self.columns.iter().map(|c| quote_ident(c)).collect();
        let mut placeholder = 0;
        let tuples: Vec<String> = self
            .rows
            .iter()
            .map(|row| {
                let cells: Vec<String> = row
                    .iter()
                    .map(|value| {
                        if value.is_null() {
                            "NULL".to_string()
                        } else {
                            placeholder += 1;
                            format!("${}", placeholder)
                        }
                    })
                    .collect();
                format!("({})", cells.join(","))
            })
            .collect();

        format!(
            "INSERT INTO {} ({}) VALUES {}",
            quote_ident(self.table),
            columns.join(","),
            tuples.join(",")
        )
    }

    /// Values to bind, in placeholder order
    pub fn bound_values(&self) -> impl Iterator<Item = &'a CellValue> + '_ {
        self.rows
            .iter()
            .flat_map(|row| row.iter().copied())
            .filter(|value| !value.is_null())
    }
}
