//! Project options and how they are loaded

pub mod loader;
pub mod options;

pub use loader::{resolve, switch, OptionLayer, OptionsFormat};
pub use options::{DatabaseKind, DatabaseOptions, Orm, ProjectOptions};
