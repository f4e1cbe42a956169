//! Sheet ETL API Server module
//!
//! Provides the HTTP API used by the browser upload page.
//! Run with `sheet-etl-server`.

pub mod handlers;
pub mod server;

pub use server::{build_router, run_api_server};
