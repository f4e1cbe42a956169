//! Sheet ETL API Server binary
//!
//! HTTP API behind the browser upload page.
//! Provides clean and load endpoints.

use clap::Parser;
use sheet_etl::api::{run_api_server, server::ApiConfig};
use sheet_etl::config::Config;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "sheet-etl-server")]
#[command(version)]
#[command(about = "Sheet ETL API Server - upload, preview and load master sheets")]
#[command(long_about = r#"
Sheet ETL API Server

Provides endpoints for the upload page:
  - POST /api/v1/clean - Clean an uploaded workbook and preview it
  - POST /api/v1/load  - Clean an uploaded workbook and load it into PostgreSQL

Additional endpoints:
  - GET  /health       - Health check
  - GET  /version      - Server version info
  - GET  /             - API documentation

Uploads are multipart/form-data with a `file` field. Loading also needs
`confirm=true`; without it the response is the preview only.

Example usage:
  sheet-etl-server                           # Start on localhost:8080
  sheet-etl-server --host 0.0.0.0 --port 3000 --config sheet-etl.yaml

  curl -F file=@master.xlsx http://localhost:8080/api/v1/clean
  curl -F file=@master.xlsx -F confirm=true http://localhost:8080/api/v1/load
"#)]
struct Args {
    /// Host address to bind to (use 0.0.0.0 for all interfaces)
    #[arg(short = 'H', long, env = "SHEET_ETL_HOST")]
    host: Option<String>,

    /// Port to listen on
    #[arg(short, long, env = "SHEET_ETL_PORT")]
    port: Option<u16>,

    /// Path to a YAML configuration file
    #[arg(short, long, env = "SHEET_ETL_CONFIG")]
    config: Option<PathBuf>,

    /// Database password
    #[arg(long, env = "SHEET_ETL_DB_PASSWORD", hide_env_values = true)]
    db_password: Option<String>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("sheet_etl=info,tower_http=info")),
        )
        .init();

    let mut config = Config::load(args.config.as_deref())?;
    if let Some(password) = args.db_password {
        config.warehouse.password = password;
    }

    let api = ApiConfig {
        host: args.host.unwrap_or_else(|| config.server.host.clone()),
        port: args.port.unwrap_or(config.server.port),
    };

    run_api_server(api, config).await
}
