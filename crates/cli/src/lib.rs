//! Public library modules for the CLI crate
pub mod chat;
pub mod report;
