//! Warehouse loading
//!
//! Loading is gated by an explicit confirmation. A confirmed load opens one
//! session, writes every cleaned sheet into `cleaned_<sheet>` in workbook order
//! and commits once at the end. Any failure aborts the run with nothing
//! committed; the session is closed on every path.
//!
//! Re-running a successful load inserts the rows again. Target tables need a
//! uniqueness constraint if duplicates matter.

pub mod postgres;
pub mod sql;

pub use postgres::PostgresWarehouse;
pub use sql::{
    target_table_name, CreateTableStatement, InsertStatement, SqlType, MAX_BIND_PARAMS,
};

use crate::config::{InsertMode, TableCreation, WarehouseConfig};
use crate::error::LoadError;
use crate::types::{Table, Workbook};
use async_trait::async_trait;
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info};

/// Opens sessions against the target database
#[async_trait]
pub trait Warehouse: Send + Sync {
    /// Acquire a connection and begin a transaction
    async fn connect(&self) -> anyhow::Result<Box<dyn WarehouseSession>>;
}

#[async_trait]
impl<T: Warehouse + ?Sized> Warehouse for Arc<T> {
    async fn connect(&self) -> anyhow::Result<Box<dyn WarehouseSession>> {
        (**self).connect().await
    }
}

/// One connection with one open transaction
#[async_trait]
pub trait WarehouseSession: Send {
    async fn create_table(&mut self, statement: &CreateTableStatement) -> anyhow::Result<()>;

    /// Execute one INSERT, returning the number of rows written
    async fn insert(&mut self, statement: &InsertStatement<'_>) -> anyhow::Result<u64>;

    async fn commit(&mut self) -> anyhow::Result<()>;

    /// Release the connection; an uncommitted transaction is rolled back
    async fn close(self: Box<Self>);
}

#[derive(Debug, Clone, PartialEq)]
pub struct LoadOptions {
    pub table_creation: TableCreation,
    pub insert_mode: InsertMode,
    pub batch_size: usize,
    /// Limit for the whole load, not per statement
    pub timeout: Option<Duration>,
}

impl Default for LoadOptions {
    fn default() -> Self {
        Self::from(&WarehouseConfig::default())
    }
}

impl From<&WarehouseConfig> for LoadOptions {
    fn from(config: &WarehouseConfig) -> Self {
        Self {
            table_creation: config.table_creation,
            insert_mode: config.insert_mode,
            batch_size: config.batch_size,
            timeout: config.load_timeout_secs.map(Duration::from_secs),
        }
    }
}

impl LoadOptions {
    /// Rows per INSERT for a table of `columns` columns, capped so one
    /// statement never binds more than [`MAX_BIND_PARAMS`] values
    pub fn rows_per_statement(&self, columns: usize) -> usize {
        match self.insert_mode {
            InsertMode::PerRow => 1,
            InsertMode::Batched => {
                let cap = (MAX_BIND_PARAMS / columns.max(1)).max(1);
                self.batch_size.clamp(1, cap)
            }
        }
    }
}

/// Rows written for one sheet
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SheetLoad {
    pub sheet: String,
    pub table: String,
    pub rows: usize,
    pub statements: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum LoadReport {
    /// Not confirmed; nothing was touched
    Skipped,
    Committed {
        sheets: Vec<SheetLoad>,
        rows: usize,
        statements: usize,
    },
}

pub struct WarehouseLoader<W> {
    warehouse: W,
    options: LoadOptions,
}

impl WarehouseLoader<PostgresWarehouse> {
    pub fn postgres(config: &WarehouseConfig) -> Self {
        Self::new(PostgresWarehouse::new(config.clone()), LoadOptions::from(config))
    }
}

impl<W: Warehouse> WarehouseLoader<W> {
    pub fn new(warehouse: W, options: LoadOptions) -> Self {
        Self { warehouse, options }
    }

    pub fn options(&self) -> &LoadOptions {
        &self.options
    }

    /// Write every cleaned sheet, or do nothing unless `confirmed`
    pub async fn load(&self, cleaned: &Workbook, confirmed: bool) -> Result<LoadReport, LoadError> {
        if !confirmed {
            info!("Upload not confirmed, skipping warehouse load");
            return Ok(LoadReport::Skipped);
        }

        let mut session = self
            .warehouse
            .connect()
            .await
            .map_err(|e| LoadError::Connect(format!("{:#}", e)))?;

        let outcome = match self.options.timeout {
            Some(limit) => tokio::time::timeout(limit, self.load_all(session.as_mut(), cleaned))
                .await
                .unwrap_or(Err(LoadError::Timeout(limit))),
            None => self.load_all(session.as_mut(), cleaned).await,
        };
        session.close().await;

        match outcome {
            Ok(sheets) => {
                let rows = sheets.iter().map(|s| s.rows).sum();
                let statements = sheets.iter().map(|s| s.statements).sum();
                info!("Committed {} rows across {} sheets", rows, sheets.len());
                Ok(LoadReport::Committed {
                    sheets,
                    rows,
                    statements,
                })
            }
            Err(e) => {
                error!("Load aborted ({}): {}", e.phase(), e);
                Err(e)
            }
        }
    }

    async fn load_all(
        &self,
        session: &mut dyn WarehouseSession,
        cleaned: &Workbook,
    ) -> Result<Vec<SheetLoad>, LoadError> {
        let mut loaded = Vec::with_capacity(cleaned.len());
        for table in cleaned {
            loaded.push(self.load_sheet(session, table).await?);
        }
        session
            .commit()
            .await
            .map_err(|e| LoadError::Commit(format!("{:#}", e)))?;
        Ok(loaded)
    }

    async fn load_sheet(
        &self,
        session: &mut dyn WarehouseSession,
        table: &Table,
    ) -> Result<SheetLoad, LoadError> {
        let target = target_table_name(&table.name);
        info!("Uploading: {} → Table: {}", table.name, target);

        table
            .validate_lengths()
            .map_err(|message| LoadError::InvalidSheet {
                sheet: table.name.clone(),
                message,
            })?;

        if self.options.table_creation == TableCreation::CreateIfMissing {
            let ddl = CreateTableStatement::from_table(&target, table);
            session
                .create_table(&ddl)
                .await
                .map_err(|e| LoadError::CreateTable {
                    sheet: table.name.clone(),
                    table: target.clone(),
                    message: format!("{:#}", e),
                })?;
        }

        let row_count = if table.columns.is_empty() { 0 } else { table.row_count() };
        let chunk = self.options.rows_per_statement(table.columns.len());
        let mut statements = 0;

        for start in (0..row_count).step_by(chunk) {
            let end = (start + chunk).min(row_count);
            let statement = InsertStatement::for_rows(&target, table, start, end);
            session
                .insert(&statement)
                .await
                .map_err(|e| LoadError::Insert {
                    sheet: table.name.clone(),
                    table: target.clone(),
                    row: start + 1,
                    message: format!("{:#}", e),
                })?;
            statements += 1;
        }

        debug!("{} rows in {} statements for {}", row_count, statements, target);
        Ok(SheetLoad {
            sheet: table.name.clone(),
            table: target,
            rows: row_count,
            statements,
        })
    }
}
