//! Load-and-transform command

use anyhow::{Context, Result};

use crate::config::Settings;
use crate::etl;
use crate::warehouse::open_session;

pub fn run(settings: &Settings) -> Result<()> {
    let mut session = open_session(settings)?;

    let count = etl::run(session.as_mut(), settings).context(
        "etl stopped; staging may be partly loaded, rebuild the schema before rerunning",
    )?;

    session.close().context("failed to close warehouse session")?;

    println!("✅ ETL complete: {} statements ({})", count, settings.dialect());
    Ok(())
}
