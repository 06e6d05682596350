//! Command-line helpers for working with GROQ projections.
//!
//! Exposed as a module so other tools can reuse the conversions without
//! shelling out to the `groq` binary.

mod convert;

pub use convert::{expand_projection, format_text, from_json, parse_include, to_json};

use std::io;

use thiserror::Error;

use crate::error::BridgeError;

/// Errors that can occur during CLI operations
#[derive(Debug, Error)]
pub enum CliError {
    #[error("Invalid projection: {0}")]
    Bridge(#[from] BridgeError),

    #[error("Invalid JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    #[error("No input provided. Pass it as an argument or pipe it to stdin.")]
    NoInput,

    /// Include argument not of the form `path=fragment`
    #[error("Invalid include '{0}', expected PATH=FRAGMENT")]
    InvalidInclude(String),
}
