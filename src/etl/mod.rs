//! Load-and-transform pipeline
//!
//! Staging tables are always loaded completely before any transform runs,
//! since the transforms read nothing else.

mod copy;
mod jsonpath;
mod local;
mod transform;

pub use copy::{copy_specs, copy_statements, CopySpec, JsonFormat};
pub use jsonpath::{JsonPath, JsonPaths};
pub use transform::{insert_statements, WeekdayRule};

use std::path::PathBuf;

use tracing::info;

use crate::config::{Settings, Target};
use crate::error::Result;
use crate::statement::{run_statements, Statement};
use crate::warehouse::Session;

#[derive(Debug, thiserror::Error)]
pub enum LoadError {
    #[error("failed to read {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to list {}: {source}", .path.display())]
    Walk {
        path: PathBuf,
        #[source]
        source: walkdir::Error,
    },

    #[error("invalid JSON in {}: {source}", .path.display())]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("{} holds a JSON value that is not an object", .path.display())]
    NotAnObject { path: PathBuf },

    #[error("{} is not valid UTF-8 and no replacement character is set", .path.display())]
    InvalidUtf8 { path: PathBuf },

    #[error("invalid JSONPaths file {}: {reason}", .path.display())]
    JsonPaths { path: PathBuf, reason: String },

    #[error("JSONPaths file {} lists {paths} paths but {table} has {columns} columns to load", .path.display())]
    ColumnCount {
        path: PathBuf,
        paths: usize,
        table: &'static str,
        columns: usize,
    },

    #[error("{0} is not a staging table")]
    UnknownTable(String),
}

/// Statements that fill the staging tables on the configured target.
pub fn staging_statements(settings: &Settings) -> Result<Vec<Statement>> {
    let specs = copy_specs(&settings.sources);
    match &settings.target {
        Target::Redshift { iam_role, .. } => {
            Ok(copy_statements(&specs, iam_role, &settings.region))
        }
        Target::Sqlite { .. } => Ok(local::load_statements(&specs)?),
    }
}

pub fn load_staging_tables(session: &mut dyn Session, settings: &Settings) -> Result<usize> {
    let statements = staging_statements(settings)?;
    let count = run_statements(session, &statements)?;
    info!(count, "staging tables loaded");
    Ok(count)
}

pub fn insert_tables(session: &mut dyn Session, settings: &Settings) -> Result<usize> {
    let statements = insert_statements(settings.dialect(), settings.weekday);
    let count = run_statements(session, &statements)?;
    info!(count, weekday = ?settings.weekday, "star tables filled");
    Ok(count)
}

/// Load both staging tables, then run every transform. Returns the number
/// of statements run.
pub fn run(session: &mut dyn Session, settings: &Settings) -> Result<usize> {
    let loaded = load_staging_tables(session, settings)?;
    let inserted = insert_tables(session, settings)?;
    Ok(loaded + inserted)
}
