//! Agent configuration and the known service fleet.
//!
//! Values are layered: built-in defaults, then an optional YAML file, then
//! environment variables.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::debug;

/// Default configuration file name, looked up in the working directory.
pub const CONFIG_FILE: &str = "spi-agent.yml";

/// Every service repository the agent knows how to work with.
pub const SERVICES: &[&str] = &[
    "partition",
    "entitlements",
    "legal",
    "schema",
    "file",
    "storage",
    "indexer",
    "indexer-queue",
    "search",
    "workflow",
];

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AgentConfig {
    /// GitHub organization that owns the forks.
    pub organization: String,
    /// Upstream template repository the forks are created from.
    pub template_repo: String,
    pub default_branch: String,
    /// Run logs, the debug log and persisted workflow results go here.
    pub log_directory: PathBuf,
    pub copilot_model: Option<String>,
    pub copilot_command: String,
    #[serde(skip_serializing)]
    pub github_token: Option<String>,
    pub github_api_url: String,
    /// Directory under the working directory holding cloned services.
    pub repos_root: String,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            organization: "danielscholl-osdu".to_string(),
            template_repo: "azure/osdu-spi".to_string(),
            default_branch: "main".to_string(),
            log_directory: PathBuf::from("logs"),
            copilot_model: Some("claude-sonnet-4.5".to_string()),
            copilot_command: "copilot".to_string(),
            github_token: None,
            github_api_url: "https://api.github.com".to_string(),
            repos_root: "repos".to_string(),
        }
    }
}

impl AgentConfig {
    /// Loads configuration from a YAML file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path_ref = path.as_ref();
        debug!(path = %path_ref.display(), "Loading configuration from file");
        let content = std::fs::read_to_string(path_ref)?;
        Self::parse_yaml(&content)
    }

    /// Parses configuration from a YAML string. Missing keys keep their defaults.
    pub fn parse_yaml(content: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_yaml::from_str(content)?;
        debug!(
            organization = %config.organization,
            model = ?config.copilot_model,
            "Configuration loaded"
        );
        Ok(config)
    }

    /// Full load: an explicit path must exist; the default file is optional.
    pub fn load(explicit: Option<&Path>) -> Result<Self, ConfigError> {
        let mut config = match explicit {
            Some(path) => Self::from_file(path)?,
            None if Path::new(CONFIG_FILE).is_file() => Self::from_file(CONFIG_FILE)?,
            None => Self::default(),
        };
        config.apply_env(|key| std::env::var(key).ok());
        config.validate()?;
        Ok(config)
    }

    /// Overrides fields from environment-style lookups. Empty values are ignored.
    pub fn apply_env(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(v) = get("SPI_AGENT_ORGANIZATION") {
            self.organization = v;
        }
        if let Some(v) = get("SPI_AGENT_TEMPLATE_REPO") {
            self.template_repo = v;
        }
        if let Some(v) = get("SPI_AGENT_DEFAULT_BRANCH") {
            self.default_branch = v;
        }
        if let Some(v) = get("SPI_AGENT_LOG_DIRECTORY") {
            self.log_directory = PathBuf::from(v);
        }
        if let Some(v) = get("SPI_AGENT_COPILOT_MODEL") {
            self.copilot_model = Some(v);
        }
        if let Some(v) = get("SPI_AGENT_COPILOT_COMMAND") {
            self.copilot_command = v;
        }
        if let Some(v) = get("GITHUB_TOKEN") {
            self.github_token = Some(v);
        }
        if let Some(v) = get("SPI_AGENT_GITHUB_API_URL") {
            self.github_api_url = v;
        }
        if let Some(v) = get("SPI_AGENT_REPOS_ROOT") {
            self.repos_root = v;
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.organization.trim().is_empty() {
            return Err(ConfigError::Missing("organization"));
        }
        if self.copilot_command.trim().is_empty() {
            return Err(ConfigError::Missing("copilot_command"));
        }
        Ok(())
    }
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("YAML parse error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("Configuration value '{0}' must not be empty")]
    Missing(&'static str),
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ServiceListError {
    #[error("No services given")]
    Empty,

    #[error("Unknown service(s): {}. Available: {}", .0.join(", "), SERVICES.join(", "))]
    Unknown(Vec<String>),
}

/// Parses `all` or a comma-separated list into known service names.
///
/// Names are trimmed and lower-cased; duplicates collapse keeping first order.
pub fn parse_services(arg: &str) -> Result<Vec<String>, ServiceListError> {
    if arg.trim().eq_ignore_ascii_case("all") {
        return Ok(SERVICES.iter().map(|s| (*s).to_string()).collect());
    }

    let mut services: Vec<String> = Vec::new();
    let mut unknown: Vec<String> = Vec::new();
    for name in arg.split(',').map(|s| s.trim().to_lowercase()).filter(|s| !s.is_empty()) {
        if !SERVICES.contains(&name.as_str()) {
            if !unknown.contains(&name) {
                unknown.push(name);
            }
        } else if !services.contains(&name) {
            services.push(name);
        }
    }

    if !unknown.is_empty() {
        return Err(ServiceListError::Unknown(unknown));
    }
    if services.is_empty() {
        return Err(ServiceListError::Empty);
    }
    Ok(services)
}
