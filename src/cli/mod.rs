//! CLI command handlers

pub mod commands;

pub use commands::{clean, export, load, render_preview, show_config};
