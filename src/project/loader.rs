//! Options loading
//!
//! Options are assembled from layers: an optional options file (YAML or
//! JSON) and the command line. Later layers win field by field.

use super::options::{DatabaseKind, DatabaseOptions, Orm, ProjectOptions};
use crate::error::{Result, StackforgeError};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// File name of the per-user defaults file
pub const DEFAULTS_FILE: &str = "defaults.yaml";

/// One layer of project options; every field is optional
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct OptionLayer {
    #[serde(default)]
    pub project_name: Option<String>,
    #[serde(default)]
    pub database: Option<DatabaseKind>,
    #[serde(default)]
    pub database_image: Option<String>,
    #[serde(default)]
    pub database_port: Option<u16>,
    #[serde(default)]
    pub orm: Option<Orm>,
    #[serde(default)]
    pub enable_redis: Option<bool>,
    #[serde(default)]
    pub enable_rmq: Option<bool>,
    #[serde(default)]
    pub enable_kafka: Option<bool>,
    #[serde(default)]
    pub enable_taskiq: Option<bool>,
    #[serde(default)]
    pub enable_migrations: Option<bool>,
    #[serde(default)]
    pub traefik_labels: Option<bool>,
}

/// Options file format
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OptionsFormat {
    Yaml,
    Json,
}

impl OptionsFormat {
    /// Pick a format from a file extension; anything but `.json` is YAML
    pub fn from_path(path: &Path) -> Self {
        match path.extension().and_then(|e| e.to_str()) {
            Some(ext) if ext.eq_ignore_ascii_case("json") => OptionsFormat::Json,
            _ => OptionsFormat::Yaml,
        }
    }
}

impl OptionLayer {
    /// Parse a layer from file contents
    pub fn parse_str(content: &str, format: OptionsFormat) -> Result<Self> {
        match format {
            OptionsFormat::Yaml => serde_yaml::from_str(content).map_err(|e| {
                StackforgeError::InvalidConfig(format!("failed to parse options: {}", e))
            }),
            OptionsFormat::Json => serde_json::from_str(content).map_err(|e| {
                StackforgeError::InvalidConfig(format!("failed to parse options: {}", e))
            }),
        }
    }

    /// Read a layer from an options file
    pub fn load_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        tracing::debug!("Loaded options file {}", path.display());
        Self::parse_str(&content, OptionsFormat::from_path(path))
    }

    /// Overlay another layer on top of this one (overlay wins)
    pub fn merge(self, overlay: OptionLayer) -> OptionLayer {
        OptionLayer {
            project_name: overlay.project_name.or(self.project_name),
            database: overlay.database.or(self.database),
            database_image: overlay.database_image.or(self.database_image),
            database_port: overlay.database_port.or(self.database_port),
            orm: overlay.orm.or(self.orm),
            enable_redis: overlay.enable_redis.or(self.enable_redis),
            enable_rmq: overlay.enable_rmq.or(self.enable_rmq),
            enable_kafka: overlay.enable_kafka.or(self.enable_kafka),
            enable_taskiq: overlay.enable_taskiq.or(self.enable_taskiq),
            enable_migrations: overlay.enable_migrations.or(self.enable_migrations),
            traefik_labels: overlay.traefik_labels.or(self.traefik_labels),
        }
    }

    /// Resolve into validated project options
    pub fn into_options(self) -> Result<ProjectOptions> {
        let project_name = self.project_name.ok_or_else(|| {
            StackforgeError::InvalidConfig("project name is required".to_string())
        })?;

        let options = ProjectOptions {
            project_name,
            database: DatabaseOptions {
                kind: self.database.unwrap_or_default(),
                image: self.database_image,
                port: self.database_port,
            },
            orm: self.orm.unwrap_or_default(),
            enable_redis: self.enable_redis.unwrap_or(false),
            enable_rmq: self.enable_rmq.unwrap_or(false),
            enable_kafka: self.enable_kafka.unwrap_or(false),
            enable_taskiq: self.enable_taskiq.unwrap_or(false),
            enable_migrations: self.enable_migrations.unwrap_or(false),
            traefik_labels: self.traefik_labels.unwrap_or(false),
        };

        options.validate()?;
        Ok(options)
    }
}

/// Resolve an `--x` / `--no-x` flag pair into a layer value
///
/// Neither flag defers to lower layers, so a defaults file can be
/// overridden in both directions.
pub fn switch(on: bool, off: bool) -> Option<bool> {
    match (on, off) {
        (true, _) => Some(true),
        (false, true) => Some(false),
        (false, false) => None,
    }
}

/// Location of the per-user defaults file
pub fn default_options_path() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join("stackforge").join(DEFAULTS_FILE))
}

/// Build project options from an optional file and command-line overrides
///
/// When `file` is `None`, the per-user defaults file is used if it exists.
pub fn resolve(file: Option<&Path>, overrides: OptionLayer) -> Result<ProjectOptions> {
    let base = match file {
        Some(path) => OptionLayer::load_file(path)?,
        None => match default_options_path().filter(|p| p.exists()) {
            Some(path) => OptionLayer::load_file(&path)?,
            None => OptionLayer::default(),
        },
    };

    base.merge(overrides).into_options()
}
