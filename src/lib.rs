pub mod cli;
pub mod config;
pub mod error;
pub mod etl;
pub mod statement;
pub mod warehouse;

pub use config::{Config, Settings};
pub use error::{Error, Result};
pub use statement::{Phase, Statement};
pub use warehouse::{Dialect, Session};
