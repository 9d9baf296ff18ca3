use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use tracing::{info, warn};

use sparkify_dwh::cli::{create_tables, etl, sql};
use sparkify_dwh::config::Settings;
use sparkify_dwh::{Dialect, Phase};

#[derive(Parser)]
#[command(name = "sparkify-dwh")]
#[command(about = "Star-schema warehouse provisioning and ELT for song play event logs")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Settings file path
    #[arg(short, long, default_value = "dwh.yaml", env = "SPARKIFY_DWH_CONFIG")]
    config: String,
}

#[derive(Subcommand)]
enum Commands {
    /// Drop and recreate every warehouse table
    CreateTables,

    /// Bulk-load the staging tables, then fill the star schema
    Etl,

    /// Print the SQL each phase runs, without connecting
    Sql {
        /// Only this phase (default: all, in run order)
        #[arg(short, long, value_enum)]
        phase: Option<PhaseArg>,

        /// SQL dialect (default: the configured engine's)
        #[arg(short, long, value_enum)]
        dialect: Option<DialectArg>,
    },
}

#[derive(Clone, Copy, ValueEnum)]
enum PhaseArg {
    Drop,
    Create,
    Copy,
    Insert,
}

impl From<PhaseArg> for Phase {
    fn from(arg: PhaseArg) -> Self {
        match arg {
            PhaseArg::Drop => Phase::Drop,
            PhaseArg::Create => Phase::Create,
            PhaseArg::Copy => Phase::Copy,
            PhaseArg::Insert => Phase::Insert,
        }
    }
}

#[derive(Clone, Copy, ValueEnum)]
enum DialectArg {
    Redshift,
    Sqlite,
}

impl From<DialectArg> for Dialect {
    fn from(arg: DialectArg) -> Self {
        match arg {
            DialectArg::Redshift => Dialect::Redshift,
            DialectArg::Sqlite => Dialect::Sqlite,
        }
    }
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::CreateTables => {
            let settings = Settings::resolve(&cli.config)?;
            info!(dialect = %settings.dialect(), "rebuilding schema");
            create_tables::run(&settings)?;
        }
        Commands::Etl => {
            let settings = Settings::resolve(&cli.config)?;
            info!(dialect = %settings.dialect(), weekday = ?settings.weekday, "running etl");
            etl::run(&settings)?;
        }
        Commands::Sql { phase, dialect } => {
            // Previewing DDL works without a settings file.
            let settings = match Settings::resolve(&cli.config) {
                Ok(settings) => Some(settings),
                Err(e) => {
                    warn!("settings unavailable: {}", e);
                    None
                }
            };

            let dialect = dialect
                .map(Dialect::from)
                .or_else(|| settings.as_ref().map(|s| s.dialect()))
                .unwrap_or(Dialect::Redshift);

            let phases: Vec<Phase> = match phase {
                Some(p) => vec![p.into()],
                None if settings.is_some() => {
                    vec![Phase::Drop, Phase::Create, Phase::Copy, Phase::Insert]
                }
                None => vec![Phase::Drop, Phase::Create, Phase::Insert],
            };

            sql::run(&phases, dialect, settings.as_ref()).context("failed to render SQL")?;
        }
    }

    Ok(())
}
