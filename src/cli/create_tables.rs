//! Schema rebuild command

use anyhow::{Context, Result};

use crate::config::Settings;
use crate::warehouse::{open_session, schema};

pub fn run(settings: &Settings) -> Result<()> {
    let mut session = open_session(settings)?;

    let count = schema::rebuild(session.as_mut(), settings.dialect())
        .context("schema rebuild stopped; tables may be partially rebuilt, run again")?;

    session.close().context("failed to close warehouse session")?;

    println!(
        "✅ Schema rebuilt: {} tables ({} statements, {})",
        schema::warehouse_tables().len(),
        count,
        settings.dialect()
    );
    Ok(())
}
