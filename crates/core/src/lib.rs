//! Core library: collection, classification, persistence glue and the query session.

pub mod classifier;
pub mod collector;
pub mod config;
pub mod models;
pub mod pipeline;
pub mod query;
