//! Redshift session over the Postgres wire protocol

use std::time::Duration;

use sqlx::postgres::PgConnectOptions;
use sqlx::{ConnectOptions, Connection, PgConnection};
use tokio::runtime::Runtime;
use tracing::{debug, instrument};

use super::{Session, SessionError};
use crate::config::ClusterSettings;

/// A dedicated connection to the cluster.
///
/// The phases are synchronous, so the connection is driven by its own
/// current-thread runtime and every call blocks until the server answers.
pub struct RedshiftSession {
    runtime: Runtime,
    conn: PgConnection,
    in_transaction: bool,
}

impl RedshiftSession {
    #[instrument(skip_all, err)]
    pub fn connect(
        cluster: &ClusterSettings,
        statement_timeout: Option<Duration>,
    ) -> Result<Self, SessionError> {
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()?;

        let mut conn = runtime.block_on(connect_options(cluster).connect())?;

        if let Some(timeout) = statement_timeout {
            let sql = format!("SET statement_timeout TO {}", timeout.as_millis());
            runtime.block_on(sqlx::raw_sql(&sql).execute(&mut conn))?;
            debug!(timeout_ms = timeout.as_millis() as u64, "statement timeout set");
        }

        Ok(Self {
            runtime,
            conn,
            in_transaction: false,
        })
    }

    fn run(&mut self, sql: &str) -> Result<(), SessionError> {
        self.runtime
            .block_on(sqlx::raw_sql(sql).execute(&mut self.conn))?;
        Ok(())
    }
}

impl Session for RedshiftSession {
    fn execute(&mut self, sql: &str) -> Result<(), SessionError> {
        if !self.in_transaction {
            self.run("BEGIN")?;
            self.in_transaction = true;
        }
        self.run(sql)
    }

    fn commit(&mut self) -> Result<(), SessionError> {
        if self.in_transaction {
            self.run("COMMIT")?;
            self.in_transaction = false;
        }
        Ok(())
    }

    fn close(self: Box<Self>) -> Result<(), SessionError> {
        let Self { runtime, conn, .. } = *self;
        runtime.block_on(conn.close())?;
        Ok(())
    }
}

fn connect_options(cluster: &ClusterSettings) -> PgConnectOptions {
    PgConnectOptions::new()
        .host(&cluster.host)
        .port(cluster.db_port)
        .database(&cluster.db_name)
        .username(&cluster.db_user)
        .password(&cluster.db_password)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_connect_options_from_cluster() {
        let cluster = ClusterSettings {
            host: "dwhcluster.example.com".to_string(),
            db_name: "dwh".to_string(),
            db_user: "dwhuser".to_string(),
            db_password: "secret".to_string(),
            db_port: 5439,
        };
        let options = connect_options(&cluster);

        assert_eq!(options.get_host(), "dwhcluster.example.com");
        assert_eq!(options.get_port(), 5439);
        assert_eq!(options.get_database(), Some("dwh"));
        assert_eq!(options.get_username(), "dwhuser");
    }
}
