//! Warehouse loader tests
//!
//! Drives `WarehouseLoader` against an in-memory warehouse that records every
//! call, so ordering, statement counts and rollback behaviour can be checked
//! without a database.

use async_trait::async_trait;
use pretty_assertions::assert_eq;
use sheet_etl::config::{InsertMode, TableCreation};
use sheet_etl::error::LoadError;
use sheet_etl::loader::{
    CreateTableStatement, InsertStatement, LoadOptions, LoadReport, Warehouse, WarehouseLoader,
    WarehouseSession, MAX_BIND_PARAMS,
};
use sheet_etl::types::{CellValue, Table, Workbook};
use std::sync::{Arc, Mutex};
use std::time::Duration;

// ═══════════════════════════════════════════════════════════════════════════
// RECORDING WAREHOUSE
// ═══════════════════════════════════════════════════════════════════════════

#[derive(Debug, Clone, PartialEq)]
enum Event {
    Connect,
    Create(String),
    Insert { table: String, rows: usize },
    Commit,
    Close,
}

#[derive(Clone, Default)]
struct RecordingWarehouse {
    log: Arc<Mutex<Vec<Event>>>,
    refuse_connect: bool,
    /// Fail the n-th (1-based) insert into this table
    fail_insert: Option<(String, usize)>,
    fail_commit: bool,
    insert_delay: Option<Duration>,
    /// Placeholders bound by each executed insert
    bound: Arc<Mutex<Vec<usize>>>,
}

impl RecordingWarehouse {
    fn events(&self) -> Vec<Event> {
        self.log.lock().unwrap().clone()
    }

    fn inserts(&self) -> Vec<(String, usize)> {
        self.events()
            .into_iter()
            .filter_map(|e| match e {
                Event::Insert { table, rows } => Some((table, rows)),
                _ => None,
            })
            .collect()
    }

    fn count(&self, wanted: &Event) -> usize {
        self.events().iter().filter(|e| *e == wanted).count()
    }
}

struct RecordingSession {
    warehouse: RecordingWarehouse,
    inserts_per_table: std::collections::HashMap<String, usize>,
}

#[async_trait]
impl Warehouse for RecordingWarehouse {
    async fn connect(&self) -> anyhow::Result<Box<dyn WarehouseSession>> {
        if self.refuse_connect {
            anyhow::bail!("connection refused");
        }
        self.log.lock().unwrap().push(Event::Connect);
        Ok(Box::new(RecordingSession {
            warehouse: self.clone(),
            inserts_per_table: Default::default(),
        }))
    }
}

#[async_trait]
impl WarehouseSession for RecordingSession {
    async fn create_table(&mut self, statement: &CreateTableStatement) -> anyhow::Result<()> {
        self.warehouse
            .log
            .lock()
            .unwrap()
            .push(Event::Create(statement.table.clone()));
        Ok(())
    }

    async fn insert(&mut self, statement: &InsertStatement<'_>) -> anyhow::Result<u64> {
        if let Some(delay) = self.warehouse.insert_delay {
            tokio::time::sleep(delay).await;
        }

        let count = self
            .inserts_per_table
            .entry(statement.table.to_string())
            .or_default();
        *count += 1;

        if let Some((table, nth)) = &self.warehouse.fail_insert {
            if table == statement.table && *count == *nth {
                anyhow::bail!("null value in column \"Batch\" violates not-null constraint");
            }
        }

        self.warehouse
            .bound
            .lock()
            .unwrap()
            .push(statement.bound_values().count());
        self.warehouse.log.lock().unwrap().push(Event::Insert {
            table: statement.table.to_string(),
            rows: statement.rows.len(),
        });
        Ok(statement.rows.len() as u64)
    }

    async fn commit(&mut self) -> anyhow::Result<()> {
        if self.warehouse.fail_commit {
            anyhow::bail!("could not serialize access");
        }
        self.warehouse.log.lock().unwrap().push(Event::Commit);
        Ok(())
    }

    async fn close(self: Box<Self>) {
        self.warehouse.log.lock().unwrap().push(Event::Close);
    }
}

// ═══════════════════════════════════════════════════════════════════════════
// FIXTURES
// ═══════════════════════════════════════════════════════════════════════════

fn sheet(name: &str, rows: usize) -> Table {
    Table::from_rows(
        name,
        &["Batch", "Qty"],
        (1..=rows).map(|i| vec![CellValue::from(format!("B-{}", i)), CellValue::Int(i as i64)]),
    )
}

fn wide_sheet(name: &str, rows: usize, columns: usize) -> Table {
    let headers: Vec<String> = (1..=columns).map(|c| format!("c{}", c)).collect();
    Table::from_rows(
        name,
        headers.as_slice(),
        (0..rows).map(|r| (0..columns).map(|c| CellValue::Int((r * columns + c) as i64)).collect()),
    )
}

fn cleaned(sheets: Vec<Table>) -> Workbook {
    sheets.into_iter().collect()
}

fn loader(warehouse: &RecordingWarehouse) -> WarehouseLoader<RecordingWarehouse> {
    WarehouseLoader::new(warehouse.clone(), LoadOptions::default())
}

// ═══════════════════════════════════════════════════════════════════════════
// CONFIRMATION GATE
// ═══════════════════════════════════════════════════════════════════════════

#[tokio::test]
async fn test_unconfirmed_load_never_connects() {
    let warehouse = RecordingWarehouse::default();
    let workbook = cleaned(vec![sheet("Intake", 3)]);

    let report = loader(&warehouse).load(&workbook, false).await.unwrap();

    assert_eq!(report, LoadReport::Skipped);
    assert!(warehouse.events().is_empty());
}

#[tokio::test]
async fn test_unconfirmed_load_ignores_unreachable_database() {
    let warehouse = RecordingWarehouse {
        refuse_connect: true,
        ..Default::default()
    };
    let workbook = cleaned(vec![sheet("Intake", 1)]);

    let report = loader(&warehouse).load(&workbook, false).await;
    assert!(matches!(report, Ok(LoadReport::Skipped)));
}

// ═══════════════════════════════════════════════════════════════════════════
// SUCCESSFUL LOADS
// ═══════════════════════════════════════════════════════════════════════════

#[tokio::test]
async fn test_one_insert_per_row_then_single_commit() {
    let warehouse = RecordingWarehouse::default();
    let workbook = cleaned(vec![sheet("Low-Risk", 2), sheet("Dispatch", 1)]);

    let report = loader(&warehouse).load(&workbook, true).await.unwrap();

    assert_eq!(
        warehouse.events(),
        vec![
            Event::Connect,
            Event::Insert {
                table: "cleaned_low-risk".to_string(),
                rows: 1
            },
            Event::Insert {
                table: "cleaned_low-risk".to_string(),
                rows: 1
            },
            Event::Insert {
                table: "cleaned_dispatch".to_string(),
                rows: 1
            },
            Event::Commit,
            Event::Close,
        ]
    );

    match report {
        LoadReport::Committed {
            sheets,
            rows,
            statements,
        } => {
            assert_eq!(rows, 3);
            assert_eq!(statements, 3);
            assert_eq!(sheets.len(), 2);
            assert_eq!(sheets[0].table, "cleaned_low-risk");
            assert_eq!(sheets[1].sheet, "Dispatch");
        }
        other => panic!("expected a committed load, got {:?}", other),
    }
}

#[tokio::test]
async fn test_target_table_names_lowercase_and_underscore() {
    let warehouse = RecordingWarehouse::default();
    let workbook = cleaned(vec![sheet("High Care", 1), sheet("Intake", 1)]);

    loader(&warehouse).load(&workbook, true).await.unwrap();

    let tables: Vec<String> = warehouse.inserts().into_iter().map(|(t, _)| t).collect();
    assert_eq!(tables, vec!["cleaned_high_care", "cleaned_intake"]);
}

#[tokio::test]
async fn test_empty_sheet_writes_nothing_but_still_commits() {
    let warehouse = RecordingWarehouse::default();
    let workbook = cleaned(vec![sheet("Sorting", 0)]);

    let report = loader(&warehouse).load(&workbook, true).await.unwrap();

    assert_eq!(
        warehouse.events(),
        vec![Event::Connect, Event::Commit, Event::Close]
    );
    assert!(matches!(report, LoadReport::Committed { rows: 0, .. }));
}

#[tokio::test]
async fn test_batched_mode_chunks_rows() {
    let warehouse = RecordingWarehouse::default();
    let options = LoadOptions {
        insert_mode: InsertMode::Batched,
        batch_size: 2,
        ..LoadOptions::default()
    };
    let workbook = cleaned(vec![sheet("Assembly", 5)]);

    let report = WarehouseLoader::new(warehouse.clone(), options)
        .load(&workbook, true)
        .await
        .unwrap();

    let sizes: Vec<usize> = warehouse.inserts().into_iter().map(|(_, n)| n).collect();
    assert_eq!(sizes, vec![2, 2, 1]);
    assert!(matches!(
        report,
        LoadReport::Committed {
            rows: 5,
            statements: 3,
            ..
        }
    ));
}

#[tokio::test]
async fn test_batched_mode_stays_under_bind_parameter_limit() {
    let warehouse = RecordingWarehouse::default();
    let options = LoadOptions {
        insert_mode: InsertMode::Batched,
        batch_size: 10_000,
        ..LoadOptions::default()
    };
    let workbook = cleaned(vec![wide_sheet("Dispatch", 10_000, 8)]);

    let report = WarehouseLoader::new(warehouse.clone(), options)
        .load(&workbook, true)
        .await
        .unwrap();

    let bound = warehouse.bound.lock().unwrap().clone();
    assert!(bound.len() > 1);
    assert!(bound.iter().all(|&n| n <= MAX_BIND_PARAMS));
    assert_eq!(bound.iter().sum::<usize>(), 80_000);

    let sizes: Vec<usize> = warehouse.inserts().into_iter().map(|(_, n)| n).collect();
    assert_eq!(sizes, vec![4095, 4095, 1810]);
    assert!(matches!(report, LoadReport::Committed { rows: 10_000, .. }));
}

#[test]
fn test_rows_per_statement_is_capped_by_width() {
    let batched = LoadOptions {
        insert_mode: InsertMode::Batched,
        batch_size: 500,
        ..LoadOptions::default()
    };
    assert_eq!(batched.rows_per_statement(2), 500);
    assert_eq!(batched.rows_per_statement(100), 327);
    assert_eq!(batched.rows_per_statement(0), 500);
    assert_eq!(batched.rows_per_statement(40_000), 1);
    assert_eq!(LoadOptions::default().rows_per_statement(8), 1);
}

#[tokio::test]
async fn test_create_if_missing_runs_before_first_insert() {
    let warehouse = RecordingWarehouse::default();
    let options = LoadOptions {
        table_creation: TableCreation::CreateIfMissing,
        ..LoadOptions::default()
    };
    let workbook = cleaned(vec![sheet("Intake", 1), sheet("Dispatch", 1)]);

    WarehouseLoader::new(warehouse.clone(), options)
        .load(&workbook, true)
        .await
        .unwrap();

    let events = warehouse.events();
    assert_eq!(events[1], Event::Create("cleaned_intake".to_string()));
    assert!(matches!(&events[2], Event::Insert { table, .. } if table == "cleaned_intake"));
    assert_eq!(events[3], Event::Create("cleaned_dispatch".to_string()));
}

#[tokio::test]
async fn test_default_options_do_not_create_tables() {
    let warehouse = RecordingWarehouse::default();
    let workbook = cleaned(vec![sheet("Intake", 2)]);

    loader(&warehouse).load(&workbook, true).await.unwrap();

    assert!(!warehouse
        .events()
        .iter()
        .any(|e| matches!(e, Event::Create(_))));
}

// ═══════════════════════════════════════════════════════════════════════════
// FAILURES
// ═══════════════════════════════════════════════════════════════════════════

#[tokio::test]
async fn test_insert_failure_aborts_without_commit() {
    let warehouse = RecordingWarehouse {
        fail_insert: Some(("cleaned_sorting".to_string(), 2)),
        ..Default::default()
    };
    let workbook = cleaned(vec![sheet("Intake", 1), sheet("Sorting", 5), sheet("Dispatch", 1)]);

    let err = loader(&warehouse).load(&workbook, true).await.unwrap_err();

    match &err {
        LoadError::Insert {
            sheet, table, row, ..
        } => {
            assert_eq!(sheet, "Sorting");
            assert_eq!(table, "cleaned_sorting");
            assert_eq!(*row, 2);
        }
        other => panic!("expected an insert failure, got {:?}", other),
    }
    assert_eq!(err.phase(), "insert");
    assert!(err.to_string().starts_with("PostgreSQL Error:"));

    assert_eq!(warehouse.count(&Event::Commit), 0);
    assert_eq!(warehouse.count(&Event::Close), 1);
    // Nothing from the sheet after the failure was attempted
    assert!(!warehouse
        .inserts()
        .iter()
        .any(|(table, _)| table == "cleaned_dispatch"));
}

#[tokio::test]
async fn test_connect_failure_is_reported() {
    let warehouse = RecordingWarehouse {
        refuse_connect: true,
        ..Default::default()
    };
    let workbook = cleaned(vec![sheet("Intake", 1)]);

    let err = loader(&warehouse).load(&workbook, true).await.unwrap_err();

    assert!(matches!(err, LoadError::Connect(_)));
    assert!(err.to_string().contains("connection refused"));
    assert!(warehouse.events().is_empty());
}

#[tokio::test]
async fn test_commit_failure_still_closes() {
    let warehouse = RecordingWarehouse {
        fail_commit: true,
        ..Default::default()
    };
    let workbook = cleaned(vec![sheet("Intake", 2)]);

    let err = loader(&warehouse).load(&workbook, true).await.unwrap_err();

    assert_eq!(err.phase(), "commit");
    assert_eq!(warehouse.events().last(), Some(&Event::Close));
}

#[tokio::test]
async fn test_timeout_aborts_and_closes() {
    let warehouse = RecordingWarehouse {
        insert_delay: Some(Duration::from_millis(200)),
        ..Default::default()
    };
    let options = LoadOptions {
        timeout: Some(Duration::from_millis(50)),
        ..LoadOptions::default()
    };
    let workbook = cleaned(vec![sheet("Intake", 3)]);

    let err = WarehouseLoader::new(warehouse.clone(), options)
        .load(&workbook, true)
        .await
        .unwrap_err();

    assert!(matches!(err, LoadError::Timeout(limit) if limit == Duration::from_millis(50)));
    assert!(err.to_string().contains("50ms"));
    assert_eq!(warehouse.count(&Event::Commit), 0);
    assert_eq!(warehouse.events().last(), Some(&Event::Close));
}

#[tokio::test]
async fn test_ragged_sheet_is_rejected_before_any_insert() {
    let warehouse = RecordingWarehouse::default();
    let mut ragged = sheet("Sorting", 3);
    ragged.columns[1].values.pop();
    let workbook = cleaned(vec![ragged]);

    let err = loader(&warehouse).load(&workbook, true).await.unwrap_err();

    assert_eq!(err.phase(), "validate");
    assert_eq!(err.sheet(), Some("Sorting"));
    assert!(warehouse.inserts().is_empty());
    assert_eq!(
        warehouse.events(),
        vec![Event::Connect, Event::Close]
    );
}
