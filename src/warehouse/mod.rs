//! Warehouse sessions and SQL dialects
//!
//! A session is the only thing the phases talk to: it runs plain SQL text and
//! commits. Two engines implement it:
//! - Redshift: Postgres wire protocol through sqlx
//! - SQLite: embedded file, used for local runs and tests

mod redshift;
pub mod schema;
mod sqlite;

pub use redshift::RedshiftSession;
pub use sqlite::SqliteSession;

use std::fmt;

use tracing::info;

use crate::config::{Settings, Target};
use crate::error::{Error, Result};

#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    #[error(transparent)]
    Postgres(#[from] sqlx::Error),

    #[error(transparent)]
    Sqlite(#[from] rusqlite::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// A single database session
pub trait Session {
    /// Run one statement. Opens a transaction if none is open.
    fn execute(&mut self, sql: &str) -> std::result::Result<(), SessionError>;

    /// Commit the open transaction, if any.
    fn commit(&mut self) -> std::result::Result<(), SessionError>;

    /// Close the session. Anything not committed is discarded.
    fn close(self: Box<Self>) -> std::result::Result<(), SessionError> {
        Ok(())
    }
}

/// SQL flavour the statements are rendered in
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dialect {
    Redshift,
    Sqlite,
}

impl Dialect {
    pub fn as_str(&self) -> &'static str {
        match self {
            Dialect::Redshift => "redshift",
            Dialect::Sqlite => "sqlite",
        }
    }
}

impl fmt::Display for Dialect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Open a session on the configured target.
pub fn open_session(settings: &Settings) -> Result<Box<dyn Session>> {
    match &settings.target {
        Target::Redshift { cluster, .. } => {
            info!(connection = %cluster.redacted(), "connecting to redshift");
            let session = RedshiftSession::connect(cluster, settings.statement_timeout)
                .map_err(Error::Connect)?;
            Ok(Box::new(session))
        }
        Target::Sqlite { path } => {
            info!(path = %path.display(), "opening sqlite warehouse");
            let session = SqliteSession::open(path).map_err(Error::Connect)?;
            Ok(Box::new(session))
        }
    }
}
