//! Docker Compose descriptors
//!
//! This module models compose files, generates them from project options,
//! and reads/writes/checks them on disk.

pub mod config;
pub mod generator;
pub mod parser;

pub use config::{ComposeConfig, ServiceConfig};
pub use generator::generate;
pub use parser::ComposeParser;
