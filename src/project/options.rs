//! Project options
//!
//! The switches a scaffolded project is generated from. Options are fixed
//! once loaded; everything downstream only reads them.

use crate::error::{Result, StackforgeError};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::sync::OnceLock;

/// Database backend kind
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase", try_from = "String")]
pub enum DatabaseKind {
    #[default]
    None,
    Sqlite,
    Postgresql,
    Mysql,
}

impl DatabaseKind {
    /// All kinds, in menu order
    pub const ALL: [DatabaseKind; 4] = [
        DatabaseKind::None,
        DatabaseKind::Sqlite,
        DatabaseKind::Postgresql,
        DatabaseKind::Mysql,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            DatabaseKind::None => "none",
            DatabaseKind::Sqlite => "sqlite",
            DatabaseKind::Postgresql => "postgresql",
            DatabaseKind::Mysql => "mysql",
        }
    }

    /// Image used when none is configured
    pub fn default_image(&self) -> Option<&'static str> {
        match self {
            DatabaseKind::Postgresql => Some("postgres:13.8-bullseye"),
            DatabaseKind::Mysql => Some("bitnami/mysql:8.0.30"),
            DatabaseKind::None | DatabaseKind::Sqlite => None,
        }
    }

    /// Port used when none is configured
    pub fn default_port(&self) -> Option<u16> {
        match self {
            DatabaseKind::Postgresql => Some(5432),
            DatabaseKind::Mysql => Some(3306),
            DatabaseKind::None | DatabaseKind::Sqlite => None,
        }
    }

    /// Whether this kind runs as its own container
    pub fn is_server(&self) -> bool {
        matches!(self, DatabaseKind::Postgresql | DatabaseKind::Mysql)
    }
}

impl fmt::Display for DatabaseKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DatabaseKind {
    type Err = StackforgeError;

    fn from_str(s: &str) -> Result<Self> {
        DatabaseKind::ALL
            .into_iter()
            .find(|kind| kind.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| {
                StackforgeError::InvalidConfig(format!(
                    "unknown database '{}' (expected one of: none, sqlite, postgresql, mysql)",
                    s
                ))
            })
    }
}

impl TryFrom<String> for DatabaseKind {
    type Error = StackforgeError;

    fn try_from(value: String) -> Result<Self> {
        value.parse()
    }
}

/// ORM the generated project uses
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase", try_from = "String")]
pub enum Orm {
    #[default]
    None,
    Sqlalchemy,
    Ormar,
    Tortoise,
    Piccolo,
}

impl Orm {
    pub const ALL: [Orm; 5] = [Orm::None, Orm::Sqlalchemy, Orm::Ormar, Orm::Tortoise, Orm::Piccolo];

    pub fn as_str(&self) -> &'static str {
        match self {
            Orm::None => "none",
            Orm::Sqlalchemy => "sqlalchemy",
            Orm::Ormar => "ormar",
            Orm::Tortoise => "tortoise",
            Orm::Piccolo => "piccolo",
        }
    }

    /// Command that applies pending migrations
    pub fn migration_command(&self) -> Option<&'static str> {
        match self {
            Orm::Sqlalchemy | Orm::Ormar => Some("alembic upgrade head"),
            Orm::Tortoise => Some("aerich upgrade"),
            Orm::Piccolo => Some("piccolo migrations forwards all"),
            Orm::None => None,
        }
    }
}

impl fmt::Display for Orm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Orm {
    type Err = StackforgeError;

    fn from_str(s: &str) -> Result<Self> {
        Orm::ALL
            .into_iter()
            .find(|orm| orm.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| {
                StackforgeError::InvalidConfig(format!(
                    "unknown orm '{}' (expected one of: none, sqlalchemy, ormar, tortoise, piccolo)",
                    s
                ))
            })
    }
}

impl TryFrom<String> for Orm {
    type Error = StackforgeError;

    fn try_from(value: String) -> Result<Self> {
        value.parse()
    }
}

/// Database selection with optional image/port overrides
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DatabaseOptions {
    /// Backend kind
    #[serde(default)]
    pub kind: DatabaseKind,
    /// Container image (defaults per kind)
    #[serde(default)]
    pub image: Option<String>,
    /// Connection port (defaults per kind)
    #[serde(default)]
    pub port: Option<u16>,
}

impl DatabaseOptions {
    pub fn new(kind: DatabaseKind) -> Self {
        Self {
            kind,
            image: None,
            port: None,
        }
    }

    /// Configured image, falling back to the kind's default
    pub fn image(&self) -> Option<&str> {
        self.image.as_deref().or_else(|| self.kind.default_image())
    }

    /// Configured port, falling back to the kind's default
    pub fn port(&self) -> Option<u16> {
        self.port.or_else(|| self.kind.default_port())
    }
}

impl From<DatabaseKind> for DatabaseOptions {
    fn from(kind: DatabaseKind) -> Self {
        Self::new(kind)
    }
}

/// Options a project stack is generated from
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProjectOptions {
    /// Project identifier
    pub project_name: String,
    /// Database backend
    #[serde(default)]
    pub database: DatabaseOptions,
    /// ORM (selects the migration command)
    #[serde(default)]
    pub orm: Orm,
    #[serde(default)]
    pub enable_redis: bool,
    #[serde(default)]
    pub enable_rmq: bool,
    #[serde(default)]
    pub enable_kafka: bool,
    #[serde(default)]
    pub enable_taskiq: bool,
    #[serde(default)]
    pub enable_migrations: bool,
    #[serde(default)]
    pub traefik_labels: bool,
}

fn project_name_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"^[A-Za-z_][A-Za-z0-9_]*$").expect("valid regex"))
}

impl ProjectOptions {
    /// Options with every switch off
    pub fn new(project_name: impl Into<String>) -> Self {
        Self {
            project_name: project_name.into(),
            database: DatabaseOptions::default(),
            orm: Orm::None,
            enable_redis: false,
            enable_rmq: false,
            enable_kafka: false,
            enable_taskiq: false,
            enable_migrations: false,
            traefik_labels: false,
        }
    }

    /// Upper-cased project name used as the environment variable prefix
    pub fn env_prefix(&self) -> String {
        self.project_name.to_uppercase()
    }

    /// Hostname for a component container, e.g. `myapp-db`
    pub fn hostname(&self, component: &str) -> String {
        format!("{}-{}", self.project_name, component)
    }

    /// Name of the volume holding database state
    pub fn db_volume(&self) -> String {
        format!("{}-db-data", self.project_name)
    }

    /// Image tag of the application itself
    pub fn app_image(&self) -> String {
        format!(
            "{}:${{{}_VERSION:-latest}}",
            self.project_name,
            self.env_prefix()
        )
    }

    /// Check the options against their constraints
    pub fn validate(&self) -> Result<()> {
        if self.project_name.is_empty() {
            return Err(StackforgeError::InvalidConfig(
                "project name must not be empty".to_string(),
            ));
        }

        if !project_name_pattern().is_match(&self.project_name) {
            return Err(StackforgeError::InvalidConfig(format!(
                "project name '{}' must start with a letter or underscore and contain only letters, digits and underscores",
                self.project_name
            )));
        }

        if let Some(image) = &self.database.image {
            if image.trim().is_empty() {
                return Err(StackforgeError::InvalidConfig(
                    "database image must not be blank".to_string(),
                ));
            }
        }

        if self.database.port == Some(0) {
            return Err(StackforgeError::InvalidConfig(
                "database port must be non-zero".to_string(),
            ));
        }

        if self.orm == Orm::Piccolo && self.database.kind == DatabaseKind::Mysql {
            return Err(StackforgeError::InvalidConfig(
                "piccolo does not support mysql".to_string(),
            ));
        }

        Ok(())
    }
}
