//! Configuration file (`sheet-etl.yaml`)
//!
//! Every section is optional; missing keys fall back to the defaults below.
//!
//! ```yaml
//! cleaner:
//!   required_sheets: [Intake, Sorting, Low-Risk, High-Care, Assembly, Dispatch]
//!   date_columns: [Date, Entry_Date, Departure_Date_ID]
//!   preview_rows: 5
//! warehouse:
//!   host: localhost
//!   port: 5432
//!   database: warehouse
//!   user: etl
//!   password: secret
//!   table_creation: assume_exists   # or create_if_missing
//!   insert_mode: per_row            # or batched
//!   batch_size: 500
//! server:
//!   host: 127.0.0.1
//!   port: 8080
//!   max_upload_bytes: 26214400
//! ```

use crate::error::{EtlError, EtlResult};
use crate::loader::MAX_BIND_PARAMS;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use tracing::{debug, info};

/// Default config file looked up in the working directory
pub const DEFAULT_CONFIG_FILE: &str = "sheet-etl.yaml";

/// Workflow stages expected in the master sheet, in processing order
pub const REQUIRED_SHEETS: [&str; 6] = [
    "Intake",
    "Sorting",
    "Low-Risk",
    "High-Care",
    "Assembly",
    "Dispatch",
];

/// Date columns checked in priority order; the first present one is enriched
pub const DATE_COLUMNS: [&str; 3] = ["Date", "Entry_Date", "Departure_Date_ID"];

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct Config {
    pub cleaner: CleanerConfig,
    pub warehouse: WarehouseConfig,
    pub server: ServerConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct CleanerConfig {
    pub required_sheets: Vec<String>,
    pub date_columns: Vec<String>,
    pub preview_rows: usize,
}

impl Default for CleanerConfig {
    fn default() -> Self {
        Self {
            required_sheets: REQUIRED_SHEETS.iter().map(|s| s.to_string()).collect(),
            date_columns: DATE_COLUMNS.iter().map(|s| s.to_string()).collect(),
            preview_rows: 5,
        }
    }
}

/// Whether target tables are created before inserting
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum TableCreation {
    /// Tables must already exist
    #[default]
    AssumeExists,
    /// `CREATE TABLE IF NOT EXISTS` from the sheet header before its first insert
    CreateIfMissing,
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum InsertMode {
    /// One INSERT statement per row
    #[default]
    PerRow,
    /// Multi-row INSERT statements of `batch_size` rows
    Batched,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct WarehouseConfig {
    pub host: String,
    pub port: u16,
    pub database: String,
    pub user: String,
    pub password: String,
    pub connect_timeout_secs: u64,
    /// Upper bound for a whole load; `None` waits indefinitely
    pub load_timeout_secs: Option<u64>,
    pub table_creation: TableCreation,
    pub insert_mode: InsertMode,
    pub batch_size: usize,
}

impl Default for WarehouseConfig {
    fn default() -> Self {
        Self {
            host: "localhost".to_string(),
            port: 5432,
            database: "warehouse".to_string(),
            user: "postgres".to_string(),
            password: String::new(),
            connect_timeout_secs: 10,
            load_timeout_secs: None,
            table_creation: TableCreation::AssumeExists,
            insert_mode: InsertMode::PerRow,
            batch_size: 500,
        }
    }
}

impl WarehouseConfig {
    /// Copy with the password masked, for display
    pub fn redacted(&self) -> Self {
        let mut copy = self.clone();
        if !copy.password.is_empty() {
            copy.password = "********".to_string();
        }
        copy
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    /// Largest accepted upload, in bytes
    pub max_upload_bytes: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 8080,
            max_upload_bytes: 25 * 1024 * 1024,
        }
    }
}

impl Config {
    /// Parse configuration from YAML text
    pub fn from_yaml(content: &str) -> EtlResult<Self> {
        let config: Config = serde_yaml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a file
    pub fn from_file(path: &Path) -> EtlResult<Self> {
        debug!("Reading config from {}", path.display());
        let content = fs::read_to_string(path)?;
        Self::from_yaml(&content)
    }

    /// Load `path` if given, else `sheet-etl.yaml` if present, else defaults
    pub fn load(path: Option<&Path>) -> EtlResult<Self> {
        if let Some(path) = path {
            return Self::from_file(path);
        }
        let default_path = Path::new(DEFAULT_CONFIG_FILE);
        if default_path.exists() {
            info!("Loading config from {}", default_path.display());
            return Self::from_file(default_path);
        }
        debug!("No config file found, using defaults");
        Ok(Self::default())
    }

    pub fn validate(&self) -> EtlResult<()> {
        if self.cleaner.required_sheets.is_empty() {
            return Err(EtlError::Config(
                "cleaner.required_sheets must not be empty".to_string(),
            ));
        }
        if self.warehouse.insert_mode == InsertMode::Batched && self.warehouse.batch_size == 0 {
            return Err(EtlError::Config(
                "warehouse.batch_size must be at least 1 in batched mode".to_string(),
            ));
        }
        if self.warehouse.insert_mode == InsertMode::Batched
            && self.warehouse.batch_size > MAX_BIND_PARAMS
        {
            return Err(EtlError::Config(format!(
                "warehouse.batch_size must be at most {} in batched mode",
                MAX_BIND_PARAMS
            )));
        }
        Ok(())
    }

    /// YAML rendering with the password masked
    pub fn to_redacted_yaml(&self) -> EtlResult<String> {
        let mut copy = self.clone();
        copy.warehouse = self.warehouse.redacted();
        Ok(serde_yaml::to_string(&copy)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.cleaner.required_sheets.len(), 6);
        assert_eq!(config.cleaner.required_sheets[3], "High-Care");
        assert_eq!(config.cleaner.date_columns[0], "Date");
        assert_eq!(config.cleaner.preview_rows, 5);
        assert_eq!(config.warehouse.port, 5432);
        assert_eq!(config.warehouse.table_creation, TableCreation::AssumeExists);
        assert_eq!(config.warehouse.insert_mode, InsertMode::PerRow);
        assert_eq!(config.server.port, 8080);
    }

    #[test]
    fn test_partial_yaml_keeps_defaults() {
        let config = Config::from_yaml(
            "warehouse:\n  host: db.internal\n  table_creation: create_if_missing\n",
        )
        .unwrap();
        assert_eq!(config.warehouse.host, "db.internal");
        assert_eq!(config.warehouse.port, 5432);
        assert_eq!(config.warehouse.table_creation, TableCreation::CreateIfMissing);
        assert_eq!(config.cleaner, CleanerConfig::default());
    }

    #[test]
    fn test_custom_sheet_names() {
        let config = Config::from_yaml("cleaner:\n  required_sheets: [Intake, High Care]\n").unwrap();
        assert_eq!(config.cleaner.required_sheets, vec!["Intake", "High Care"]);
    }

    #[test]
    fn test_rejects_empty_required_sheets() {
        let result = Config::from_yaml("cleaner:\n  required_sheets: []\n");
        assert!(matches!(result, Err(EtlError::Config(_))));
    }

    #[test]
    fn test_rejects_zero_batch_size() {
        let result = Config::from_yaml("warehouse:\n  insert_mode: batched\n  batch_size: 0\n");
        assert!(matches!(result, Err(EtlError::Config(_))));
    }

    #[test]
    fn test_rejects_batch_size_over_bind_limit() {
        let result = Config::from_yaml("warehouse:\n  insert_mode: batched\n  batch_size: 40000\n");
        match result {
            Err(EtlError::Config(message)) => assert!(message.contains("batch_size")),
            other => panic!("expected config error, got {:?}", other.map(|_| ())),
        }

        let at_limit =
            Config::from_yaml("warehouse:\n  insert_mode: batched\n  batch_size: 32767\n");
        assert!(at_limit.is_ok());
    }

    #[test]
    fn test_invalid_yaml() {
        let result = Config::from_yaml("warehouse: [unclosed");
        assert!(matches!(result, Err(EtlError::Yaml(_))));
    }

    #[test]
    fn test_redacted_hides_password() {
        let mut config = Config::default();
        config.warehouse.password = "hunter2".to_string();
        let yaml = config.to_redacted_yaml().unwrap();
        assert!(!yaml.contains("hunter2"));
        assert!(yaml.contains("********"));
    }

    #[test]
    fn test_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "server:\n  port: 9000").unwrap();
        let config = Config::load(Some(file.path())).unwrap();
        assert_eq!(config.server.port, 9000);
        assert_eq!(config.server.host, "127.0.0.1");
    }
}
