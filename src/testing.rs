//! In-memory stand-ins for tool servers and the model API.

use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use serde_json::{json, Value};

use crate::inference::types::{ContentBlock, MessagesRequest, MessagesResponse};
use crate::inference::{InferenceError, ModelApi};
use crate::mcp_client::types::{
    error_codes, GetPromptResult, PromptDescriptor, PromptMessage, ResourceContents,
    ResourceDescriptor, ServerCapabilities, ServerInfo, ToolCallOutput, ToolDescriptor,
};
use crate::mcp_client::{Connector, Content, McpError, ServerSession};
use crate::server_registry::{ServerDescriptor, ServerRegistry};

// ─── Fake tool servers ───────────────────────────────────────────────────────

pub fn tool(name: &str, required: &[&str]) -> ToolDescriptor {
    let properties: serde_json::Map<String, Value> = required
        .iter()
        .map(|p| (p.to_string(), json!({"type": "string"})))
        .collect();
    ToolDescriptor {
        name: name.to_string(),
        description: Some(format!("{name} tool")),
        input_schema: Some(json!({
            "type": "object",
            "properties": properties,
            "required": required,
        })),
    }
}

/// Behaviour of one fake server.
#[derive(Clone, Default)]
pub struct FakeServer {
    pub tools: Vec<ToolDescriptor>,
    /// `None` means the prompts capability is not advertised.
    pub prompts: Option<Vec<PromptDescriptor>>,
    /// `None` means the resources capability is not advertised.
    pub resources: Option<Vec<(ResourceDescriptor, String)>>,
    /// Tools whose calls come back with `isError: true`.
    pub erroring_tools: HashSet<String>,
    /// Tools whose calls fail at the JSON-RPC level.
    pub rpc_failing_tools: HashSet<String>,
    pub fail_list_tools: bool,
    pub refuse_connect: bool,
    pub call_delay: Option<Duration>,
    /// Advertise prompts and resources even when they are not served.
    pub advertise_all: bool,
    /// Canned text results by tool name. Other tools echo their arguments.
    pub results: HashMap<String, String>,
}

impl FakeServer {
    pub fn with_tools(tools: Vec<ToolDescriptor>) -> Self {
        Self {
            tools,
            ..Default::default()
        }
    }
}

/// A call observed by a fake session.
#[derive(Debug, Clone, PartialEq)]
pub struct RecordedCall {
    pub server: String,
    pub tool: String,
    pub arguments: Value,
}

#[derive(Clone, Default)]
pub struct FakeConnector {
    servers: HashMap<String, FakeServer>,
    connect_delay: Option<Duration>,
    pub connects: Arc<AtomicUsize>,
    pub calls: Arc<Mutex<Vec<RecordedCall>>>,
}

impl FakeConnector {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn server(mut self, name: &str, server: FakeServer) -> Self {
        self.servers.insert(name.to_string(), server);
        self
    }

    pub fn connect_delay(mut self, delay: Duration) -> Self {
        self.connect_delay = Some(delay);
        self
    }

    /// A registry with one descriptor per fake server.
    pub fn registry(&self) -> ServerRegistry {
        ServerRegistry::from_descriptors(
            self.servers
                .keys()
                .map(|name| ServerDescriptor::new(name.clone(), format!("fake-{name}"))),
        )
    }

    pub fn recorded_calls(&self) -> Vec<RecordedCall> {
        self.calls.lock().map(|c| c.clone()).unwrap_or_default()
    }

    pub fn connect_count(&self) -> usize {
        self.connects.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Connector for FakeConnector {
    async fn connect(
        &self,
        descriptor: &ServerDescriptor,
    ) -> Result<Box<dyn ServerSession>, McpError> {
        self.connects.fetch_add(1, Ordering::SeqCst);
        if let Some(delay) = self.connect_delay {
            tokio::time::sleep(delay).await;
        }

        let server = self
            .servers
            .get(&descriptor.name)
            .cloned()
            .ok_or_else(|| McpError::SpawnFailed {
                name: descriptor.name.clone(),
                reason: "no such fake server".into(),
            })?;

        if server.refuse_connect {
            return Err(McpError::InitFailed {
                name: descriptor.name.clone(),
                reason: "handshake refused".into(),
            });
        }

        let capabilities = ServerCapabilities {
            tools: Some(json!({})),
            prompts: (server.advertise_all || server.prompts.is_some()).then(|| json!({})),
            resources: (server.advertise_all || server.resources.is_some()).then(|| json!({})),
        };

        Ok(Box::new(FakeSession {
            name: descriptor.name.clone(),
            server,
            capabilities,
            info: ServerInfo {
                name: Some(format!("fake-{}", descriptor.name)),
                version: Some("0.0.1".into()),
            },
            closed: AtomicBool::new(false),
            calls: Arc::clone(&self.calls),
        }))
    }
}

pub struct FakeSession {
    name: String,
    server: FakeServer,
    capabilities: ServerCapabilities,
    info: ServerInfo,
    closed: AtomicBool,
    calls: Arc<Mutex<Vec<RecordedCall>>>,
}

impl FakeSession {
    fn ensure_open(&self) -> Result<(), McpError> {
        if self.closed.load(Ordering::SeqCst) {
            Err(McpError::TransportError {
                server: self.name.clone(),
                reason: "transport is closed".into(),
            })
        } else {
            Ok(())
        }
    }

    fn method_not_found() -> McpError {
        McpError::ServerError {
            code: error_codes::METHOD_NOT_FOUND,
            message: "Method not found".into(),
            data: None,
        }
    }
}

#[async_trait]
impl ServerSession for FakeSession {
    fn capabilities(&self) -> &ServerCapabilities {
        &self.capabilities
    }

    fn server_info(&self) -> Option<&ServerInfo> {
        Some(&self.info)
    }

    async fn list_tools(&self) -> Result<Vec<ToolDescriptor>, McpError> {
        self.ensure_open()?;
        if self.server.fail_list_tools {
            return Err(McpError::TransportError {
                server: self.name.clone(),
                reason: "server stdout closed (process may have exited)".into(),
            });
        }
        Ok(self.server.tools.clone())
    }

    async fn call_tool(&self, name: &str, arguments: Value) -> Result<ToolCallOutput, McpError> {
        self.ensure_open()?;
        if let Ok(mut calls) = self.calls.lock() {
            calls.push(RecordedCall {
                server: self.name.clone(),
                tool: name.to_string(),
                arguments: arguments.clone(),
            });
        }
        if let Some(delay) = self.server.call_delay {
            tokio::time::sleep(delay).await;
        }
        if self.server.rpc_failing_tools.contains(name) {
            return Err(McpError::ServerError {
                code: error_codes::INTERNAL_ERROR,
                message: format!("{name} crashed"),
                data: None,
            });
        }
        if self.server.erroring_tools.contains(name) {
            return Ok(ToolCallOutput {
                content: vec![Content::Text {
                    text: format!("{name} failed"),
                }],
                is_error: true,
                structured_content: None,
            });
        }
        if let Some(text) = self.server.results.get(name) {
            return Ok(ToolCallOutput::text(text.clone()));
        }
        Ok(ToolCallOutput::text(format!("{}/{name}: {arguments}", self.name)))
    }

    async fn list_prompts(&self) -> Result<Vec<PromptDescriptor>, McpError> {
        self.ensure_open()?;
        self.server.prompts.clone().ok_or_else(Self::method_not_found)
    }

    async fn get_prompt(
        &self,
        name: &str,
        arguments: serde_json::Map<String, Value>,
    ) -> Result<GetPromptResult, McpError> {
        self.ensure_open()?;
        let prompts = self.server.prompts.as_ref().ok_or_else(Self::method_not_found)?;
        if !prompts.iter().any(|p| p.name == name) {
            return Err(McpError::ServerError {
                code: -32602,
                message: format!("unknown prompt: {name}"),
                data: None,
            });
        }
        Ok(GetPromptResult {
            description: None,
            messages: vec![PromptMessage {
                role: "user".into(),
                content: Content::Text {
                    text: format!("{name} with {}", Value::Object(arguments)),
                },
            }],
        })
    }

    async fn list_resources(&self) -> Result<Vec<ResourceDescriptor>, McpError> {
        self.ensure_open()?;
        self.server
            .resources
            .as_ref()
            .map(|r| r.iter().map(|(d, _)| d.clone()).collect())
            .ok_or_else(Self::method_not_found)
    }

    async fn read_resource(&self, uri: &str) -> Result<Vec<ResourceContents>, McpError> {
        self.ensure_open()?;
        let resources = self.server.resources.as_ref().ok_or_else(Self::method_not_found)?;
        resources
            .iter()
            .find(|(d, _)| d.uri == uri)
            .map(|(d, text)| {
                vec![ResourceContents {
                    uri: d.uri.clone(),
                    mime_type: Some("text/plain".into()),
                    text: Some(text.clone()),
                    blob: None,
                }]
            })
            .ok_or_else(|| McpError::ServerError {
                code: -32002,
                message: format!("resource not found: {uri}"),
                data: None,
            })
    }

    async fn close(&self) {
        self.closed.store(true, Ordering::SeqCst);
    }
}

// ─── Scripted model ──────────────────────────────────────────────────────────

/// Replays canned responses and records every request it receives.
#[derive(Default)]
pub struct ScriptedModel {
    replies: Mutex<VecDeque<Result<MessagesResponse, InferenceError>>>,
    pub requests: Mutex<Vec<MessagesRequest>>,
}

impl ScriptedModel {
    pub fn replying(blocks: Vec<ContentBlock>) -> Self {
        let model = Self::default();
        model.push(Ok(MessagesResponse {
            id: "msg_test".into(),
            model: "claude-test".into(),
            content: blocks,
            stop_reason: Some("end_turn".into()),
            usage: None,
        }));
        model
    }

    pub fn failing(error: InferenceError) -> Self {
        let model = Self::default();
        model.push(Err(error));
        model
    }

    pub fn push(&self, reply: Result<MessagesResponse, InferenceError>) {
        if let Ok(mut replies) = self.replies.lock() {
            replies.push_back(reply);
        }
    }

    pub fn last_request(&self) -> Option<MessagesRequest> {
        self.requests.lock().ok().and_then(|r| r.last().cloned())
    }
}

#[async_trait]
impl ModelApi for ScriptedModel {
    async fn create_message(
        &self,
        request: MessagesRequest,
    ) -> Result<MessagesResponse, InferenceError> {
        if let Ok(mut requests) = self.requests.lock() {
            requests.push(request);
        }
        self.replies
            .lock()
            .ok()
            .and_then(|mut r| r.pop_front())
            .unwrap_or_else(|| {
                Err(InferenceError::InvalidResponse {
                    reason: "no scripted reply left".into(),
                })
            })
    }
}

pub fn text_block(text: &str) -> ContentBlock {
    ContentBlock::Text {
        text: text.to_string(),
    }
}

pub fn tool_use(id: &str, name: &str, input: Value) -> ContentBlock {
    ContentBlock::ToolUse {
        id: id.to_string(),
        name: name.to_string(),
        input,
    }
}
