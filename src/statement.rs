//! Statement descriptors and the sequential runner shared by every phase

use std::fmt;
use std::time::Instant;

use tracing::{debug, info};

use crate::error::{Error, Result};
use crate::warehouse::Session;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Drop,
    Create,
    Copy,
    Insert,
}

impl Phase {
    pub fn as_str(&self) -> &'static str {
        match self {
            Phase::Drop => "drop",
            Phase::Create => "create",
            Phase::Copy => "copy",
            Phase::Insert => "insert",
        }
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One SQL statement plus what it is for
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Statement {
    pub phase: Phase,
    /// Short name used in logs and errors, e.g. `users_tab`
    pub label: String,
    pub sql: String,
}

impl Statement {
    pub fn new(phase: Phase, label: impl Into<String>, sql: impl Into<String>) -> Self {
        Self {
            phase,
            label: label.into(),
            sql: sql.into(),
        }
    }
}

/// Quote a value as a SQL string literal.
pub fn quote_literal(value: &str) -> String {
    format!("'{}'", value.replace('\'', "''"))
}

/// Execute and commit each statement in order.
///
/// Stops at the first failure; statements committed before it stay applied.
/// Returns the number of statements executed.
pub fn run_statements(session: &mut dyn Session, statements: &[Statement]) -> Result<usize> {
    for statement in statements {
        let started = Instant::now();
        debug!(phase = %statement.phase, label = %statement.label, sql = %statement.sql);

        session
            .execute(&statement.sql)
            .and_then(|()| session.commit())
            .map_err(|source| Error::Statement {
                phase: statement.phase,
                label: statement.label.clone(),
                source,
            })?;

        info!(
            phase = %statement.phase,
            label = %statement.label,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "statement committed"
        );
    }

    Ok(statements.len())
}
