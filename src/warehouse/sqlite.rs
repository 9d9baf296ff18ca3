//! Embedded SQLite session

use std::path::Path;

use chrono::{Datelike, NaiveDateTime, Timelike};
use rusqlite::functions::FunctionFlags;
use rusqlite::Connection;

use super::{Session, SessionError};

const TIMESTAMP_FORMATS: [&str; 3] = [
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M",
];

pub struct SqliteSession {
    conn: Connection,
    in_transaction: bool,
}

impl SqliteSession {
    pub fn open(path: &Path) -> Result<Self, SessionError> {
        // Ensure parent directory exists
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        Self::with_connection(Connection::open(path)?)
    }

    pub fn in_memory() -> Result<Self, SessionError> {
        Self::with_connection(Connection::open_in_memory()?)
    }

    fn with_connection(conn: Connection) -> Result<Self, SessionError> {
        register_functions(&conn)?;
        Ok(Self {
            conn,
            in_transaction: false,
        })
    }

    /// Underlying connection, for reading results back
    pub fn connection(&self) -> &Connection {
        &self.conn
    }
}

impl Session for SqliteSession {
    fn execute(&mut self, sql: &str) -> Result<(), SessionError> {
        if !self.in_transaction {
            self.conn.execute_batch("BEGIN")?;
            self.in_transaction = true;
        }
        self.conn.execute_batch(sql)?;
        Ok(())
    }

    fn commit(&mut self) -> Result<(), SessionError> {
        if self.in_transaction {
            self.conn.execute_batch("COMMIT")?;
            self.in_transaction = false;
        }
        Ok(())
    }

    fn close(self: Box<Self>) -> Result<(), SessionError> {
        self.conn.close().map_err(|(_, e)| e.into())
    }
}

/// `date_part(field, timestamp)`, matching what the warehouse's `EXTRACT`
/// returns for the fields the time dimension uses.
fn register_functions(conn: &Connection) -> rusqlite::Result<()> {
    conn.create_scalar_function(
        "date_part",
        2,
        FunctionFlags::SQLITE_UTF8 | FunctionFlags::SQLITE_DETERMINISTIC,
        |ctx| {
            let field: String = ctx.get(0)?;
            let value: Option<String> = ctx.get(1)?;
            let Some(value) = value else {
                return Ok(None);
            };

            let timestamp = parse_timestamp(&value).ok_or_else(|| {
                rusqlite::Error::UserFunctionError(
                    format!("invalid timestamp '{}'", value).into(),
                )
            })?;

            date_part(&field, &timestamp).map(Some).ok_or_else(|| {
                rusqlite::Error::UserFunctionError(
                    format!("unsupported date part '{}'", field).into(),
                )
            })
        },
    )
}

fn parse_timestamp(value: &str) -> Option<NaiveDateTime> {
    TIMESTAMP_FORMATS
        .iter()
        .find_map(|format| NaiveDateTime::parse_from_str(value, format).ok())
}

/// Calendar component of a timestamp.
///
/// `week` is the ISO-8601 week number and `dow` counts from Sunday = 0.
fn date_part(field: &str, timestamp: &NaiveDateTime) -> Option<i64> {
    let part = match field.to_ascii_lowercase().as_str() {
        "hour" => timestamp.hour() as i64,
        "day" => timestamp.day() as i64,
        "week" => timestamp.iso_week().week() as i64,
        "month" => timestamp.month() as i64,
        "year" => timestamp.year() as i64,
        "dow" => timestamp.weekday().num_days_from_sunday() as i64,
        _ => return None,
    };
    Some(part)
}
