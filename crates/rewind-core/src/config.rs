use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::env;
use std::path::{Path, PathBuf};

use crate::plan::SortDir;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProjectConfig {
    #[serde(default)]
    pub service: ServiceConfig,
    #[serde(default)]
    pub query: QueryConfig,
    #[serde(default)]
    pub store: StoreConfig,
}

/// Names of the bookkeeping collections and graphs that hold the event log
/// itself. None of them is ever addressable by a scope.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceConfig {
    #[serde(default = "default_events")]
    pub events: String,
    #[serde(default = "default_snapshots")]
    pub snapshots: String,
    #[serde(default = "default_commands")]
    pub commands: String,
    #[serde(default = "default_evt_ss_links")]
    pub evt_ss_links: String,
    #[serde(default = "default_snapshot_links")]
    pub snapshot_links: String,
    #[serde(default = "default_reserved_graphs")]
    pub reserved_graphs: Vec<String>,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            events: default_events(),
            snapshots: default_snapshots(),
            commands: default_commands(),
            evt_ss_links: default_evt_ss_links(),
            snapshot_links: default_snapshot_links(),
            reserved_graphs: default_reserved_graphs(),
        }
    }
}

impl ServiceConfig {
    /// All bookkeeping collection names.
    #[must_use]
    pub fn collections(&self) -> [&str; 5] {
        [
            self.events.as_str(),
            self.snapshots.as_str(),
            self.commands.as_str(),
            self.evt_ss_links.as_str(),
            self.snapshot_links.as_str(),
        ]
    }

    #[must_use]
    pub fn is_service_collection(&self, name: &str) -> bool {
        self.collections().contains(&name)
    }

    #[must_use]
    pub fn is_reserved_graph(&self, name: &str) -> bool {
        self.reserved_graphs.iter().any(|g| g == name)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueryConfig {
    /// Sort direction used when a request does not name one.
    #[serde(default)]
    pub default_sort: SortDir,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoreConfig {
    /// SQLite store, relative to the project root.
    #[serde(default)]
    pub db: Option<PathBuf>,
    /// JSON Lines event log, relative to the project root.
    #[serde(default)]
    pub log: Option<PathBuf>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UserConfig {
    #[serde(default)]
    pub output: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EffectiveConfig {
    pub project: ProjectConfig,
    pub user: UserConfig,
    pub resolved_output: Option<String>,
}

fn default_events() -> String {
    "evstore_events".to_string()
}

fn default_snapshots() -> String {
    "evstore_snapshots".to_string()
}

fn default_commands() -> String {
    "evstore_commands".to_string()
}

fn default_evt_ss_links() -> String {
    "evstore_evt_ss_links".to_string()
}

fn default_snapshot_links() -> String {
    "evstore_snapshot_links".to_string()
}

fn default_reserved_graphs() -> Vec<String> {
    vec!["evstore_history".to_string()]
}

pub fn load_project_config(project_root: &Path) -> Result<ProjectConfig> {
    let path = project_root.join(".rewind/config.toml");
    if !path.exists() {
        return Ok(ProjectConfig::default());
    }

    let content = std::fs::read_to_string(&path)
        .with_context(|| format!("Failed to read {}", path.display()))?;

    toml::from_str::<ProjectConfig>(&content)
        .with_context(|| format!("Failed to parse {}", path.display()))
}

pub fn load_user_config() -> Result<UserConfig> {
    let Some(config_dir) = dirs::config_dir() else {
        return Ok(UserConfig::default());
    };

    let path = config_dir.join("rewind/config.toml");
    if !path.exists() {
        return Ok(UserConfig::default());
    }

    let content = std::fs::read_to_string(&path)
        .with_context(|| format!("Failed to read {}", path.display()))?;

    toml::from_str::<UserConfig>(&content)
        .with_context(|| format!("Failed to parse {}", path.display()))
}

pub fn resolve_config(project_root: &Path) -> Result<EffectiveConfig> {
    let project = load_project_config(project_root)?;
    let user = load_user_config()?;

    let resolved_output = env::var("FORMAT").ok().or_else(|| user.output.clone());

    Ok(EffectiveConfig {
        project,
        user,
        resolved_output,
    })
}
