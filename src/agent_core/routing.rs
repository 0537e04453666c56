//! Per-prompt tool routing.
//!
//! Maps the tool names exposed to the model back to `(server, tool)`. A name
//! offered by exactly one server is exposed as-is; a name offered by several
//! is exposed only as `{server}__{tool}`, and the bare name becomes
//! ambiguous.

use std::collections::{BTreeMap, HashMap, HashSet};

use thiserror::Error;

use crate::mcp_client::types::ToolDescriptor;

/// Separator between server and tool in qualified names.
pub const QUALIFIER: &str = "__";

/// Where an exposed tool name leads.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RouteTarget {
    pub server: String,
    pub tool: String,
}

/// One tool as the model will see it.
#[derive(Debug, Clone)]
pub struct ExposedTool {
    pub exposed_name: String,
    pub server: String,
    pub tool: ToolDescriptor,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RoutingError {
    #[error("no selected server offers tool '{name}'")]
    UnknownTool { name: String },

    #[error("tool '{name}' is offered by several servers ({}); use a qualified name", servers.join(", "))]
    Ambiguous { name: String, servers: Vec<String> },
}

impl RoutingError {
    pub fn kind(&self) -> &'static str {
        match self {
            RoutingError::UnknownTool { .. } => "unknown_tool",
            RoutingError::Ambiguous { .. } => "ambiguous_tool",
        }
    }
}

/// An exposed name that more than one tool would have used.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NameClash {
    pub exposed_name: String,
    pub claimants: Vec<RouteTarget>,
}

impl NameClash {
    /// `server/tool` pairs, comma separated.
    pub fn describe_claimants(&self) -> String {
        self.claimants
            .iter()
            .map(|c| format!("{}/{}", c.server, c.tool))
            .collect::<Vec<_>>()
            .join(", ")
    }
}

/// Exposed name → owning server. Rebuilt for every prompt.
#[derive(Debug, Default)]
pub struct RoutingTable {
    routes: HashMap<String, RouteTarget>,
    ambiguous: HashMap<String, Vec<String>>,
}

pub fn qualified_name(server: &str, tool: &str) -> String {
    format!("{server}{QUALIFIER}{tool}")
}

impl RoutingTable {
    /// Build the table from per-server catalogs, in server order.
    ///
    /// Returns the table, the tools to expose in a stable order, and every
    /// exposed name claimed by more than one tool. Clashing names are routed
    /// nowhere and resolve as ambiguous.
    pub fn build(
        catalogs: &[(String, Vec<ToolDescriptor>)],
    ) -> (Self, Vec<ExposedTool>, Vec<NameClash>) {
        let mut owners: BTreeMap<&str, Vec<&str>> = BTreeMap::new();
        for (server, tools) in catalogs {
            for tool in tools {
                let servers = owners.entry(tool.name.as_str()).or_default();
                if !servers.contains(&server.as_str()) {
                    servers.push(server.as_str());
                }
            }
        }

        // (exposed name, server, tool) in catalog order. A server listing the
        // same tool twice contributes one candidate.
        let mut seen: HashSet<(String, &str, &str)> = HashSet::new();
        let mut candidates: Vec<(String, &str, &ToolDescriptor)> = Vec::new();
        for (server, tools) in catalogs {
            for tool in tools {
                let collides = owners
                    .get(tool.name.as_str())
                    .is_some_and(|servers| servers.len() > 1);
                let exposed_name = if collides {
                    qualified_name(server, &tool.name)
                } else {
                    tool.name.clone()
                };
                if seen.insert((exposed_name.clone(), server.as_str(), tool.name.as_str())) {
                    candidates.push((exposed_name, server.as_str(), tool));
                }
            }
        }

        let mut claims: HashMap<String, Vec<RouteTarget>> = HashMap::new();
        for (name, server, tool) in &candidates {
            claims.entry(name.clone()).or_default().push(RouteTarget {
                server: server.to_string(),
                tool: tool.name.clone(),
            });
        }

        let mut table = RoutingTable::default();
        let mut exposed = Vec::new();
        let mut clashes: Vec<NameClash> = Vec::new();

        for (exposed_name, server, tool) in candidates {
            let claimants = claims.remove(&exposed_name);
            match claimants {
                Some(claimants) if claimants.len() > 1 => {
                    let mut servers: Vec<String> = Vec::new();
                    for c in &claimants {
                        if !servers.contains(&c.server) {
                            servers.push(c.server.clone());
                        }
                    }
                    table.ambiguous.insert(exposed_name.clone(), servers);
                    clashes.push(NameClash {
                        exposed_name,
                        claimants,
                    });
                }
                // Already reported as a clash.
                None => {}
                Some(_) => {
                    table.routes.insert(
                        exposed_name.clone(),
                        RouteTarget {
                            server: server.to_string(),
                            tool: tool.name.clone(),
                        },
                    );
                    exposed.push(ExposedTool {
                        exposed_name,
                        server: server.to_string(),
                        tool: tool.clone(),
                    });
                }
            }
        }

        for (name, servers) in owners {
            if servers.len() > 1 {
                table.ambiguous.insert(
                    name.to_string(),
                    servers.into_iter().map(str::to_string).collect(),
                );
            }
        }

        (table, exposed, clashes)
    }

    /// Drop a route, e.g. for a tool whose schema could not be translated.
    pub fn remove(&mut self, exposed_name: &str) {
        self.routes.remove(exposed_name);
    }

    pub fn resolve(&self, name: &str) -> Result<&RouteTarget, RoutingError> {
        if let Some(target) = self.routes.get(name) {
            return Ok(target);
        }
        match self.ambiguous.get(name) {
            Some(servers) => Err(RoutingError::Ambiguous {
                name: name.to_string(),
                servers: servers.clone(),
            }),
            None => Err(RoutingError::UnknownTool {
                name: name.to_string(),
            }),
        }
    }

    pub fn len(&self) -> usize {
        self.routes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.routes.is_empty()
    }
}

// ─── Tests ───────────────────────────────────────────────────────────────────
