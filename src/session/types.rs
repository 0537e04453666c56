//! Session manager result types.

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::mcp_client::types::ServerInfo;

/// Result of a successful `connect`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ConnectOutcome {
    Connected,
    AlreadyConnected,
}

/// One item tagged with the server that offered it.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ServerItem<T> {
    pub server: String,
    #[serde(flatten)]
    pub item: T,
}

/// A server that could not be queried during an aggregate operation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ServerFailure {
    pub server: String,
    pub error: String,
}

/// Items gathered from one or more servers, plus the servers that failed.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Listing<T> {
    pub items: Vec<ServerItem<T>>,
    pub failures: Vec<ServerFailure>,
}

impl<T> Default for Listing<T> {
    fn default() -> Self {
        Self {
            items: Vec::new(),
            failures: Vec::new(),
        }
    }
}

impl<T> Listing<T> {
    /// Items from `server`, without the server tag.
    pub fn items_from<'a>(&'a self, server: &'a str) -> impl Iterator<Item = &'a T> + 'a {
        self.items
            .iter()
            .filter(move |i| i.server == server)
            .map(|i| &i.item)
    }
}

/// Outcome of connecting every configured server.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ConnectAllReport {
    pub connected: Vec<String>,
    pub failures: Vec<ServerFailure>,
}

/// Connection state of one configured server.
#[derive(Debug, Clone, Serialize)]
pub struct ServerStatus {
    pub name: String,
    pub connected: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tool_count: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub connected_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub server_info: Option<ServerInfo>,
}
