//! Crate error type

use crate::config::ConfigError;
use crate::etl::LoadError;
use crate::statement::Phase;
use crate::warehouse::SessionError;

pub type Result<T> = std::result::Result<T, Error>;

/// Everything that can stop a phase once settings are resolved. None of
/// these are recovered from internally; they travel to the process boundary.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("failed to open warehouse session: {0}")]
    Connect(#[source] SessionError),

    #[error("failed to prepare staging load: {0}")]
    Load(#[from] LoadError),

    #[error("{phase} statement '{label}' failed: {source}")]
    Statement {
        phase: Phase,
        label: String,
        #[source]
        source: SessionError,
    },
}
