use clap::{Parser, Subcommand};
use sheet_etl::cli;
use sheet_etl::config::{Config, InsertMode, TableCreation};
use sheet_etl::error::EtlResult;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "sheet-etl")]
#[command(about = "Clean a production master sheet and load it into PostgreSQL")]
#[command(long_about = "Sheet ETL - Master sheet cleaning and warehouse loading

Reads a multi-sheet workbook (.xlsx, .xls, .ods), keeps the workflow stages
Intake, Sorting, Low-Risk, High-Care, Assembly and Dispatch, and enriches the
first date column of each (Date, Entry_Date, Departure_Date_ID) with day,
month, year, day_name, month_name and quarter. Dates are read day-first.

COMMANDS:
  clean    - Preview the cleaned sheets
  load     - Clean, preview and (with --confirm) insert into cleaned_<sheet>
  export   - Write the cleaned sheets to a new .xlsx for review
  config   - Show the effective configuration

EXAMPLES:
  sheet-etl clean master.xlsx --rows 10
  sheet-etl load master.xlsx --confirm
  sheet-etl load master.xlsx --confirm --create-tables --batch-size 500
  sheet-etl export master.xlsx cleaned.xlsx

Configuration is read from --config, else ./sheet-etl.yaml, else defaults.")]
#[command(version)]
struct Cli {
    /// Path to a YAML configuration file
    #[arg(short, long, global = true, env = "SHEET_ETL_CONFIG")]
    config: Option<PathBuf>,

    /// Log progress to stderr
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Clean a workbook and preview the result
    Clean {
        /// Path to the master sheet
        file: PathBuf,

        /// Rows to preview per sheet
        #[arg(short, long)]
        rows: Option<usize>,
    },

    #[command(long_about = "Clean a workbook and load it into PostgreSQL.

Without --confirm the cleaned sheets are previewed and nothing is written.
With --confirm every cleaned sheet is inserted into cleaned_<sheet> on one
connection and committed once at the end. Any failure rolls back the whole
load.")]
    /// Clean a workbook and load it into PostgreSQL
    Load {
        /// Path to the master sheet
        file: PathBuf,

        /// Actually write to the database
        #[arg(long)]
        confirm: bool,

        /// Create missing target tables from the sheet headers
        #[arg(long)]
        create_tables: bool,

        /// Insert this many rows per statement instead of one
        #[arg(long)]
        batch_size: Option<usize>,

        /// Abort the load after this many seconds
        #[arg(long)]
        timeout: Option<u64>,

        /// Database host
        #[arg(long, env = "SHEET_ETL_DB_HOST")]
        db_host: Option<String>,

        /// Database password
        #[arg(long, env = "SHEET_ETL_DB_PASSWORD", hide_env_values = true)]
        db_password: Option<String>,
    },

    /// Write the cleaned sheets to an Excel file
    Export {
        /// Path to the master sheet
        file: PathBuf,

        /// Output .xlsx path
        output: PathBuf,
    },

    /// Show the effective configuration (password masked)
    Config,
}

fn init_tracing(verbose: bool) {
    let default = if verbose { "sheet_etl=info" } else { "sheet_etl=warn" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default)),
        )
        .with_writer(std::io::stderr)
        .init();
}

fn main() -> EtlResult<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let mut config = Config::load(cli.config.as_deref())?;

    match cli.command {
        Commands::Clean { file, rows } => cli::clean(file, rows, &config),

        Commands::Load {
            file,
            confirm,
            create_tables,
            batch_size,
            timeout,
            db_host,
            db_password,
        } => {
            let warehouse = &mut config.warehouse;
            if create_tables {
                warehouse.table_creation = TableCreation::CreateIfMissing;
            }
            if let Some(size) = batch_size {
                warehouse.insert_mode = InsertMode::Batched;
                warehouse.batch_size = size;
            }
            if timeout.is_some() {
                warehouse.load_timeout_secs = timeout;
            }
            if let Some(host) = db_host {
                warehouse.host = host;
            }
            if let Some(password) = db_password {
                warehouse.password = password;
            }
            config.validate()?;
            cli::load(file, confirm, &config)
        }

        Commands::Export { file, output } => cli::export(file, output, &config),

        Commands::Config => cli::show_config(&config),
    }
}
