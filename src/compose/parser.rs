//! Docker Compose file reading, writing and checking

use super::config::ComposeConfig;
use crate::error::{Result, StackforgeError};
use std::collections::HashSet;
use std::path::{Path, PathBuf};

/// Default compose file names
pub const DEFAULT_COMPOSE_FILES: &[&str] = &[
    "compose.yaml",
    "compose.yml",
    "docker-compose.yaml",
    "docker-compose.yml",
];

/// File name generated stacks are written to
pub const GENERATED_COMPOSE_FILE: &str = "docker-compose.yml";

/// Directory of a scaffolded project that holds deployment files
pub const DEPLOY_DIR: &str = "deploy";

/// Default output path, relative to the project root
pub const DEFAULT_OUTPUT_PATH: &str = "deploy/docker-compose.yml";

/// Plain scalars that YAML 1.1 loaders (docker-compose v1, PyYAML) read as
/// booleans or null. Lowercase `true`/`false`/`null` are absent: serde_yaml
/// already quotes those when they are strings, so bare ones are real values.
const YAML11_AMBIGUOUS: &[&str] = &[
    "y", "Y", "yes", "Yes", "YES", "n", "N", "no", "No", "NO", "on", "On", "ON", "off", "Off",
    "OFF", "True", "TRUE", "False", "FALSE", "Null", "NULL", "~",
];

/// Compose file parser
pub struct ComposeParser;

impl ComposeParser {
    /// Find compose file in directory, then in its `deploy/` subdirectory
    pub fn find_compose_file(dir: &Path) -> Option<PathBuf> {
        let deploy = dir.join(DEPLOY_DIR);
        let found = [dir, deploy.as_path()]
            .into_iter()
            .flat_map(|base| DEFAULT_COMPOSE_FILES.iter().map(move |name| base.join(name)))
            .find(|path| path.exists());
        found
    }

    /// Parse compose file from path
    pub fn parse_file(path: &Path) -> Result<ComposeConfig> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| StackforgeError::ComposeParse(format!("Failed to read file: {}", e)))?;

        Self::parse_str(&content)
    }

    /// Parse compose file from string
    pub fn parse_str(content: &str) -> Result<ComposeConfig> {
        serde_yaml::from_str(content)
            .map_err(|e| StackforgeError::ComposeParse(format!("Failed to parse YAML: {}", e)))
    }

    /// Serialize a compose configuration as YAML
    ///
    /// Strings such as `no` or `yes` are emitted quoted so YAML 1.1 loaders
    /// keep them as strings.
    pub fn render(config: &ComposeConfig) -> Result<String> {
        let yaml = serde_yaml::to_string(config)?;
        Ok(quote_ambiguous_scalars(&yaml))
    }

    /// Write a compose configuration to `path`
    ///
    /// An existing file is only replaced when `force` is set.
    pub fn write_file(config: &ComposeConfig, path: &Path, force: bool) -> Result<()> {
        if path.exists() && !force {
            return Err(StackforgeError::OutputExists(path.to_path_buf()));
        }

        let content = Self::render(config)?;

        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, content)?;

        tracing::info!("Wrote {}", path.display());
        Ok(())
    }

    /// Validate compose configuration
    ///
    /// Hard errors are returned as `Err`; soft problems come back as warnings.
    pub fn validate(config: &ComposeConfig) -> Result<Vec<String>> {
        let mut warnings = Vec::new();

        for (name, service) in &config.services {
            // Service must have either image or build
            if service.image.is_none() && service.build.is_none() {
                return Err(StackforgeError::ComposeParse(format!(
                    "Service '{}' must have either 'image' or 'build' specified",
                    name
                )));
            }

            for dep in service.dependency_names() {
                if !config.services.contains_key(&dep) {
                    return Err(StackforgeError::ComposeParse(format!(
                        "Service '{}' depends on unknown service '{}'",
                        name, dep
                    )));
                }
            }

            for net in service.network_names() {
                if net != "default" && !config.networks.contains_key(&net) {
                    warnings.push(format!(
                        "Service '{}' references undefined network '{}' (will be created)",
                        name, net
                    ));
                }
            }

            for source in service.named_volume_sources() {
                if !config.volumes.contains_key(&source) {
                    warnings.push(format!(
                        "Service '{}' references undefined volume '{}' (will be created)",
                        name, source
                    ));
                }
            }
        }

        Ok(warnings)
    }

    /// Order in which an orchestrator would start the services
    ///
    /// Dependencies come before their dependents. A service's dependency
    /// list is treated as a set; ties fall back to declaration order.
    pub fn startup_order(config: &ComposeConfig) -> Result<Vec<String>> {
        let mut order = Vec::new();
        let mut visited = HashSet::new();
        let mut visiting = HashSet::new();

        for service_name in config.services.keys() {
            Self::visit(config, service_name, &mut visited, &mut visiting, &mut order)?;
        }

        Ok(order)
    }

    /// Depth-first topological sort over `depends_on`
    fn visit(
        config: &ComposeConfig,
        service: &str,
        visited: &mut HashSet<String>,
        visiting: &mut HashSet<String>,
        order: &mut Vec<String>,
    ) -> Result<()> {
        if visited.contains(service) {
            return Ok(());
        }

        if visiting.contains(service) {
            return Err(StackforgeError::Compose(format!(
                "Circular dependency detected for service: {}",
                service
            )));
        }

        visiting.insert(service.to_string());

        if let Some(service_config) = config.services.get(service) {
            for dep in service_config.dependency_names() {
                Self::visit(config, &dep, visited, visiting, order)?;
            }
        }

        visiting.remove(service);
        visited.insert(service.to_string());
        order.push(service.to_string());

        Ok(())
    }
}

/// Quote plain scalars in block-style YAML that YAML 1.1 would not read as strings
fn quote_ambiguous_scalars(yaml: &str) -> String {
    let mut out = String::with_capacity(yaml.len() + 16);
    // Indentation of the line that opened a block scalar (`|` / `>`)
    let mut block_indent: Option<usize> = None;

    for line in yaml.lines() {
        let indent = line.len() - line.trim_start().len();

        if let Some(open) = block_indent {
            if line.trim().is_empty() || indent > open {
                out.push_str(line);
                out.push('\n');
                continue;
            }
            block_indent = None;
        }

        let split = match line.rfind(": ") {
            Some(idx) => Some(idx + 2),
            None => {
                let trimmed = line.trim_start();
                trimmed.starts_with("- ").then(|| indent + 2)
            }
        };

        match split {
            Some(at) => {
                let (head, value) = line.split_at(at);
                if value.starts_with('|') || value.starts_with('>') {
                    block_indent = Some(indent);
                    out.push_str(line);
                } else if YAML11_AMBIGUOUS.contains(&value) {
                    out.push_str(head);
                    out.push('\'');
                    out.push_str(value);
                    out.push('\'');
                } else {
                    out.push_str(line);
                }
            }
            None => out.push_str(line),
        }
        out.push('\n');
    }

    out
}
