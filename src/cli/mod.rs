//! Command implementations

pub mod create_tables;
pub mod etl;
pub mod sql;
