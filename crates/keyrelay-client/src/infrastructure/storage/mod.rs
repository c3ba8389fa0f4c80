//! Storage infrastructure: configuration file persistence.

pub mod config;
