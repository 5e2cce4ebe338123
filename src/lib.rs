//! Stackforge - compose stacks for scaffolded backend projects
//!
//! Stackforge turns a project's options (database, ORM, cache, broker and
//! friends) into the `docker-compose` descriptor the project ships with:
//!
//! - Typed project options with validation
//! - Options files (YAML or JSON) layered under command-line flags
//! - Deterministic compose descriptor generation
//! - Compose file rendering, checking and startup ordering

pub mod compose;
pub mod error;
pub mod project;

pub use error::{Result, StackforgeError};
