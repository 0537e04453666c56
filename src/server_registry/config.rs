//! Server configuration loading.
//!
//! Reads a JSON document of the form
//! `{"mcpServers": {"<name>": {"command": ..., "args": [...], "env": {...}}}}`
//! and resolves environment variables in launch fields.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::Deserialize;

use super::errors::ConfigError;
use crate::interpolate::interpolate_env_vars;

// ─── Public Types ────────────────────────────────────────────────────────────

/// How to launch one tool server. Immutable after load.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerDescriptor {
    pub name: String,
    pub command: String,
    pub args: Vec<String>,
    pub env: BTreeMap<String, String>,
    pub cwd: Option<PathBuf>,
}

impl ServerDescriptor {
    /// A descriptor with no args, env, or working directory.
    pub fn new(name: impl Into<String>, command: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            command: command.into(),
            args: Vec::new(),
            env: BTreeMap::new(),
            cwd: None,
        }
    }
}

/// The set of configured servers, keyed by name.
///
/// Holds launch descriptors only; live connections belong to the session
/// manager.
#[derive(Debug, Clone, Default)]
pub struct ServerRegistry {
    servers: BTreeMap<String, ServerDescriptor>,
    source: Option<PathBuf>,
}

// ─── Document Shape ──────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
struct ConfigDocument {
    #[serde(rename = "mcpServers", alias = "servers", default)]
    servers: BTreeMap<String, ServerEntry>,
}

#[derive(Debug, Deserialize)]
struct ServerEntry {
    #[serde(default)]
    command: Option<String>,
    #[serde(default)]
    args: Vec<String>,
    #[serde(default)]
    env: BTreeMap<String, String>,
    #[serde(default)]
    cwd: Option<String>,
    #[serde(default = "default_enabled")]
    enabled: bool,
}

fn default_enabled() -> bool {
    true
}

impl ServerEntry {
    fn into_descriptor(self, name: &str) -> Result<ServerDescriptor, ConfigError> {
        let command = self
            .command
            .map(|c| interpolate_env_vars(c.trim()))
            .filter(|c| !c.is_empty())
            .ok_or_else(|| ConfigError::MissingCommand {
                server: name.to_string(),
            })?;

        Ok(ServerDescriptor {
            name: name.to_string(),
            command,
            args: self.args.iter().map(|a| interpolate_env_vars(a)).collect(),
            env: self
                .env
                .into_iter()
                .map(|(k, v)| (k, interpolate_env_vars(&v)))
                .collect(),
            cwd: self
                .cwd
                .map(|dir| interpolate_env_vars(&dir))
                .filter(|dir| !dir.is_empty())
                .map(PathBuf::from),
        })
    }
}

// ─── Loading ─────────────────────────────────────────────────────────────────

impl ServerRegistry {
    /// Load and validate a configuration file.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let raw = std::fs::read_to_string(path).map_err(|e| ConfigError::Read {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        let mut registry = Self::parse(&raw, path)?;
        registry.source = Some(path.to_path_buf());

        tracing::info!(
            path = %path.display(),
            servers = registry.servers.len(),
            "loaded server config"
        );
        Ok(registry)
    }

    /// Parse a configuration document. `origin` is used in error messages.
    pub fn parse(raw: &str, origin: &Path) -> Result<Self, ConfigError> {
        let doc: ConfigDocument = serde_json::from_str(raw).map_err(|e| ConfigError::Parse {
            path: origin.to_path_buf(),
            reason: e.to_string(),
        })?;

        let mut servers = BTreeMap::new();
        for (name, entry) in doc.servers {
            if !entry.enabled {
                tracing::debug!(server = %name, "skipping disabled server");
                continue;
            }
            let descriptor = entry.into_descriptor(&name)?;
            servers.insert(name, descriptor);
        }

        Ok(Self {
            servers,
            source: None,
        })
    }

    /// Build a registry directly from descriptors.
    pub fn from_descriptors(descriptors: impl IntoIterator<Item = ServerDescriptor>) -> Self {
        Self {
            servers: descriptors
                .into_iter()
                .map(|d| (d.name.clone(), d))
                .collect(),
            source: None,
        }
    }

    pub fn get(&self, name: &str) -> Option<&ServerDescriptor> {
        self.servers.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.servers.contains_key(name)
    }

    /// Configured server names, sorted.
    pub fn names(&self) -> Vec<String> {
        self.servers.keys().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.servers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.servers.is_empty()
    }

    /// The file this registry was loaded from, if any.
    pub fn source(&self) -> Option<&Path> {
        self.source.as_deref()
    }
}

// ─── Tests ───────────────────────────────────────────────────────────────────
