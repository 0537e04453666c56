//! Prompt orchestrator.
//!
//! One prompt, one model round-trip:
//!
//! 1. Pick the servers (all connected, or the connected subset of a list).
//! 2. List their tools live, build the routing table, translate schemas.
//! 3. Send the prompt, a tool-listing system message and the tool
//!    definitions to the model.
//! 4. Route every `tool_use` block back to its server, sequentially, and
//!    record each outcome.
//!
//! Tool results are returned to the caller, not fed back to the model.

use std::sync::Arc;

use uuid::Uuid;

use super::errors::OrchestratorError;
use super::routing::RoutingTable;
use super::types::{OrchestratorResult, ToolCallOutcome, ToolCallRecord};
use crate::inference::config::ModelConfig;
use crate::inference::types::{ContentBlock, MessageParam, MessagesRequest, ToolDefinition};
use crate::inference::ModelApi;
use crate::schema::translate_as;
use crate::session::SessionManager;

/// Opening line of the system message when no preamble is configured.
pub const DEFAULT_SYSTEM_PREAMBLE: &str =
    "You are a helpful AI assistant with access to tools from connected MCP servers.";

/// Per-request model settings.
#[derive(Debug, Clone)]
pub struct OrchestratorSettings {
    pub model: String,
    pub max_tokens: u32,
    pub system_preamble: Option<String>,
}

impl From<&ModelConfig> for OrchestratorSettings {
    fn from(config: &ModelConfig) -> Self {
        Self {
            model: config.model.clone(),
            max_tokens: config.max_tokens,
            system_preamble: config.system_preamble.clone(),
        }
    }
}

pub struct PromptOrchestrator {
    sessions: Arc<SessionManager>,
    model_api: Arc<dyn ModelApi>,
    settings: OrchestratorSettings,
}

impl PromptOrchestrator {
    pub fn new(
        sessions: Arc<SessionManager>,
        model_api: Arc<dyn ModelApi>,
        settings: OrchestratorSettings,
    ) -> Self {
        Self {
            sessions,
            model_api,
            settings,
        }
    }

    pub fn sessions(&self) -> &Arc<SessionManager> {
        &self.sessions
    }

    /// Send one prompt with the tools of `servers` (all connected when `None`).
    ///
    /// Only a model API failure is fatal. Server, schema and tool-call
    /// problems are reported as warnings or on the individual records.
    pub async fn send(
        &self,
        prompt: &str,
        servers: Option<&[String]>,
    ) -> Result<OrchestratorResult, OrchestratorError> {
        let mut warnings = Vec::new();

        // 1. Server selection
        let connected = self.sessions.connected_servers().await;
        let selected: Vec<String> = match servers {
            None => connected,
            Some(names) => {
                let mut selected = Vec::new();
                for name in names {
                    if !connected.contains(name) {
                        warnings.push(format!("server '{name}' is not connected; skipped"));
                    } else if !selected.contains(name) {
                        selected.push(name.clone());
                    }
                }
                selected
            }
        };

        // 2. Tool catalogs
        let listings = futures::future::join_all(
            selected.iter().map(|s| self.sessions.list_tools(Some(s))),
        )
        .await;

        let mut catalogs = Vec::with_capacity(selected.len());
        for (server, listing) in selected.iter().zip(listings) {
            match listing {
                Ok(listing) => catalogs.push((
                    server.clone(),
                    listing.items.into_iter().map(|i| i.item).collect::<Vec<_>>(),
                )),
                Err(e) => {
                    tracing::warn!(server = %server, error = %e, "tool listing failed, skipping server");
                    warnings.push(format!("server '{server}' skipped: {e}"));
                }
            }
        }

        let (mut routes, exposed, clashes) = RoutingTable::build(&catalogs);
        for clash in &clashes {
            let claimants = clash.describe_claimants();
            tracing::warn!(name = %clash.exposed_name, claimants = %claimants, "exposed tool name clash");
            warnings.push(format!(
                "tool name '{}' is claimed by {claimants}; skipped",
                clash.exposed_name
            ));
        }

        let mut definitions: Vec<ToolDefinition> = Vec::with_capacity(exposed.len());
        let mut owners: Vec<String> = Vec::with_capacity(exposed.len());
        for candidate in &exposed {
            match translate_as(&candidate.tool, &candidate.exposed_name) {
                Ok(def) => {
                    definitions.push(def);
                    owners.push(candidate.server.clone());
                }
                Err(e) => {
                    tracing::warn!(
                        server = %candidate.server,
                        tool = %candidate.tool.name,
                        error = %e,
                        "tool schema rejected"
                    );
                    routes.remove(&candidate.exposed_name);
                    warnings.push(format!(
                        "tool '{}' from server '{}' skipped: {}",
                        candidate.tool.name, candidate.server, e.reason
                    ));
                }
            }
        }

        // 3. Model call
        let system = (!definitions.is_empty()).then(|| self.system_message(&definitions, &owners));
        let request = MessagesRequest {
            model: self.settings.model.clone(),
            max_tokens: self.settings.max_tokens,
            system,
            messages: vec![MessageParam::user(prompt)],
            tools: (!definitions.is_empty()).then_some(definitions),
        };

        tracing::info!(
            servers = selected.len(),
            tools = routes.len(),
            "sending prompt to model"
        );

        let response = self.model_api.create_message(request).await.map_err(|e| {
            tracing::error!(error = %e, "model request failed");
            OrchestratorError::from(e)
        })?;

        // 4. Response folding and tool dispatch
        let mut texts = Vec::new();
        let mut tool_calls = Vec::new();
        for block in response.content {
            match block {
                ContentBlock::Text { text } => texts.push(text),
                ContentBlock::ToolUse { id, name, input } => {
                    tool_calls.push(self.dispatch(&routes, id, name, input).await);
                }
                ContentBlock::Unknown => {
                    tracing::debug!("ignoring unsupported content block");
                }
            }
        }

        Ok(OrchestratorResult {
            id: response.id,
            model: response.model,
            text: texts.join("\n"),
            tool_calls,
            warnings,
            stop_reason: response.stop_reason,
        })
    }

    /// Route one tool call and run it. Never fails: errors go on the record.
    async fn dispatch(
        &self,
        routes: &RoutingTable,
        id: String,
        name: String,
        input: serde_json::Value,
    ) -> ToolCallRecord {
        let id = if id.is_empty() {
            format!("call_{}", Uuid::new_v4())
        } else {
            id
        };
        let target = match routes.resolve(&name) {
            Ok(target) => target,
            Err(e) => {
                tracing::warn!(tool = %name, error = %e, "unroutable tool call");
                return ToolCallRecord {
                    id,
                    outcome: ToolCallOutcome::Error {
                        kind: e.kind().to_string(),
                        message: e.to_string(),
                    },
                    name,
                    server: None,
                    input,
                };
            }
        };

        let outcome = match self
            .sessions
            .call_tool(&target.server, &target.tool, input.clone())
            .await
        {
            Ok(result) => ToolCallOutcome::Success { result },
            Err(e) => ToolCallOutcome::Error {
                kind: e.kind().to_string(),
                message: e.to_string(),
            },
        };

        ToolCallRecord {
            id,
            name,
            server: Some(target.server.clone()),
            input,
            outcome,
        }
    }

    fn system_message(&self, definitions: &[ToolDefinition], owners: &[String]) -> String {
        let mut system = self
            .settings
            .system_preamble
            .clone()
            .unwrap_or_else(|| DEFAULT_SYSTEM_PREAMBLE.to_string());
        system.push_str("\n\nYou have access to the following tools from MCP servers:");
        for (i, (def, server)) in definitions.iter().zip(owners).enumerate() {
            system.push_str(&format!("\n{}. {} (from {server})", i + 1, def.name));
            if let Some(desc) = &def.description {
                system.push_str(": ");
                system.push_str(desc);
            }
        }
        system
    }
}

// ─── Tests ───────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::inference::InferenceError;
    use crate::mcp_client::types::ToolDescriptor;
    use crate::testing::{text_block, tool, tool_use, FakeConnector, FakeServer, ScriptedModel};
    use serde_json::json;

    fn settings() -> OrchestratorSettings {
        OrchestratorSettings {
            model: "claude-test".into(),
            max_tokens: 1000,
            system_preamble: None,
        }
    }

    async fn setup(
        connector: FakeConnector,
        model: ScriptedModel,
    ) -> (PromptOrchestrator, Arc<ScriptedModel>, FakeConnector) {
        let sessions = Arc::new(SessionManager::new(
            connector.registry(),
            Arc::new(connector.clone()),
        ));
        sessions.connect_all().await;
        let model = Arc::new(model);
        let orchestrator = PromptOrchestrator::new(sessions, model.clone(), settings());
        (orchestrator, model, connector)
    }

    fn fs_and_net() -> FakeConnector {
        FakeConnector::new()
            .server(
                "fs",
                FakeServer::with_tools(vec![
                    tool("read_file", &["path"]),
                    tool("write_file", &["path", "content"]),
                ]),
            )
            .server("net", FakeServer::with_tools(vec![tool("fetch", &["url"])]))
    }

    #[tokio::test]
    async fn test_end_to_end_routes_calls_to_owning_servers() {
        let model = ScriptedModel::replying(vec![
            text_block("Reading both."),
            tool_use("t1", "read_file", json!({"path": "/etc/hosts"})),
            tool_use("t2", "fetch", json!({"url": "https://example.com"})),
            text_block("Done."),
        ]);
        let (orch, model, connector) = setup(fs_and_net(), model).await;

        let result = orch.send("read and fetch", None).await.unwrap();
        assert_eq!(result.text, "Reading both.\nDone.");
        assert_eq!(result.tool_calls.len(), 2);
        assert!(result.tool_calls.iter().all(ToolCallRecord::is_success));
        assert_eq!(result.tool_calls[0].server.as_deref(), Some("fs"));
        assert_eq!(result.tool_calls[1].server.as_deref(), Some("net"));
        assert!(result.warnings.is_empty());

        let calls = connector.recorded_calls();
        assert_eq!(calls.len(), 2);
        assert_eq!((calls[0].server.as_str(), calls[0].tool.as_str()), ("fs", "read_file"));
        assert_eq!((calls[1].server.as_str(), calls[1].tool.as_str()), ("net", "fetch"));

        let request = model.last_request().unwrap();
        assert_eq!(request.model, "claude-test");
        assert_eq!(request.messages, vec![MessageParam::user("read and fetch")]);
        let tools = request.tools.unwrap();
        assert_eq!(tools.len(), 3);
        let system = request.system.unwrap();
        assert!(system.starts_with(DEFAULT_SYSTEM_PREAMBLE));
        assert!(system.contains("1. read_file (from fs): read_file tool"));
        assert!(system.contains("3. fetch (from net)"));
    }

    #[tokio::test]
    async fn test_unroutable_tool_contacts_no_server() {
        let model = ScriptedModel::replying(vec![tool_use("t1", "format_disk", json!({}))]);
        let (orch, _, connector) = setup(fs_and_net(), model).await;

        let result = orch.send("go", None).await.unwrap();
        assert_eq!(result.tool_calls.len(), 1);
        let record = &result.tool_calls[0];
        assert_eq!(record.error_kind(), Some("unknown_tool"));
        assert!(record.server.is_none());
        assert!(connector.recorded_calls().is_empty());
    }

    #[tokio::test]
    async fn test_partial_failures_keep_siblings_and_text() {
        let mut fs = FakeServer::with_tools(vec![tool("read_file", &["path"]), tool("stat", &[])]);
        fs.erroring_tools.insert("stat".into());
        let connector = FakeConnector::new().server("fs", fs);
        let model = ScriptedModel::replying(vec![
            text_block("Trying."),
            tool_use("t1", "stat", json!({})),
            tool_use("t2", "read_file", json!({})),
            tool_use("t3", "read_file", json!({"path": "/a"})),
        ]);
        let (orch, _, connector) = setup(connector, model).await;

        let result = orch.send("go", None).await.unwrap();
        assert_eq!(result.text, "Trying.");
        let kinds: Vec<Option<&str>> = result.tool_calls.iter().map(|r| r.error_kind()).collect();
        assert_eq!(
            kinds,
            vec![Some("tool_execution_error"), Some("missing_arguments"), None]
        );
        // The missing-arguments call never reached the server.
        assert_eq!(connector.recorded_calls().len(), 2);
    }

    #[tokio::test]
    async fn test_no_tools_means_no_system_and_no_tools_field() {
        let model = ScriptedModel::replying(vec![text_block("Hello!")]);
        let (orch, model, _) = setup(FakeConnector::new(), model).await;

        let result = orch.send("hi", None).await.unwrap();
        assert_eq!(result.text, "Hello!");
        assert!(result.tool_calls.is_empty());

        let request = model.last_request().unwrap();
        assert!(request.system.is_none());
        assert!(request.tools.is_none());
    }

    #[tokio::test]
    async fn test_selected_servers_filter_and_warn() {
        let model = ScriptedModel::replying(vec![text_block("ok")]);
        let (orch, model, _) = setup(fs_and_net(), model).await;

        let selection = vec!["net".to_string(), "ghost".to_string(), "net".to_string()];
        let result = orch.send("hi", Some(selection.as_slice())).await.unwrap();
        assert_eq!(result.warnings.len(), 1);
        assert!(result.warnings[0].contains("ghost"));

        let tools = model.last_request().unwrap().tools.unwrap();
        let names: Vec<&str> = tools.iter().map(|t| t.name.as_str()).collect();
        assert_eq!(names, vec!["fetch"]);
    }

    #[tokio::test]
    async fn test_calls_outside_selection_are_unroutable() {
        let model = ScriptedModel::replying(vec![tool_use("t1", "read_file", json!({"path": "/a"}))]);
        let (orch, _, connector) = setup(fs_and_net(), model).await;

        let selection = vec!["net".to_string()];
        let result = orch.send("hi", Some(selection.as_slice())).await.unwrap();
        assert_eq!(result.tool_calls[0].error_kind(), Some("unknown_tool"));
        assert!(connector.recorded_calls().is_empty());
    }

    #[tokio::test]
    async fn test_model_failure_is_fatal() {
        let model = ScriptedModel::failing(InferenceError::HttpError {
            status: 400,
            body: r#"{"type":"error","error":{"type":"invalid_request_error","message":"bad tools"}}"#
                .into(),
        });
        let (orch, _, connector) = setup(fs_and_net(), model).await;

        let err = orch.send("hi", None).await.unwrap_err();
        let OrchestratorError::ModelApi { message } = err;
        assert!(message.contains("HTTP 400"));
        assert!(message.contains("bad tools"));
        assert!(connector.recorded_calls().is_empty());
    }

    #[tokio::test]
    async fn test_colliding_tools_are_qualified_and_routed() {
        let connector = FakeConnector::new()
            .server("docs", FakeServer::with_tools(vec![tool("search", &["q"])]))
            .server("web", FakeServer::with_tools(vec![tool("search", &["q"])]));
        let model = ScriptedModel::replying(vec![
            tool_use("t1", "web__search", json!({"q": "rust"})),
            tool_use("t2", "search", json!({"q": "rust"})),
        ]);
        let (orch, model, connector) = setup(connector, model).await;

        let result = orch.send("search", None).await.unwrap();
        assert!(result.tool_calls[0].is_success());
        assert_eq!(result.tool_calls[0].server.as_deref(), Some("web"));
        assert_eq!(result.tool_calls[1].error_kind(), Some("ambiguous_tool"));

        let calls = connector.recorded_calls();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].server, "web");
        assert_eq!(calls[0].tool, "search");

        let tools = model.last_request().unwrap().tools.unwrap();
        let names: Vec<&str> = tools.iter().map(|t| t.name.as_str()).collect();
        assert_eq!(names, vec!["docs__search", "web__search"]);
    }

    #[tokio::test]
    async fn test_untranslatable_tool_is_skipped_with_warning() {
        let no_type = ToolDescriptor {
            name: "legacy".into(),
            description: None,
            input_schema: Some(json!({"properties": {"x": {"type": "string"}}})),
        };
        let connector = FakeConnector::new().server(
            "old",
            FakeServer::with_tools(vec![no_type, tool("ok_tool", &[])]),
        );
        let model = ScriptedModel::replying(vec![tool_use("t1", "legacy", json!({}))]);
        let (orch, model, connector) = setup(connector, model).await;

        let result = orch.send("go", None).await.unwrap();
        assert_eq!(result.warnings.len(), 1);
        assert!(result.warnings[0].contains("legacy"));
        assert_eq!(result.tool_calls[0].error_kind(), Some("unknown_tool"));
        assert!(connector.recorded_calls().is_empty());

        let tools = model.last_request().unwrap().tools.unwrap();
        assert_eq!(tools.len(), 1);
        assert_eq!(tools[0].name, "ok_tool");
    }

    #[tokio::test]
    async fn test_failing_server_listing_becomes_warning() {
        let connector = fs_and_net().server(
            "broken",
            FakeServer {
                fail_list_tools: true,
                ..Default::default()
            },
        );
        let model = ScriptedModel::replying(vec![text_block("ok")]);
        let (orch, model, _) = setup(connector, model).await;

        let result = orch.send("hi", None).await.unwrap();
        assert_eq!(result.warnings.len(), 1);
        assert!(result.warnings[0].contains("broken"));
        assert_eq!(model.last_request().unwrap().tools.unwrap().len(), 3);
    }

    #[tokio::test]
    async fn test_missing_tool_use_id_gets_generated() {
        let model = ScriptedModel::replying(vec![tool_use("", "fetch", json!({"url": "u"}))]);
        let (orch, _, _) = setup(fs_and_net(), model).await;

        let result = orch.send("go", None).await.unwrap();
        assert!(result.tool_calls[0].id.starts_with("call_"));
        assert!(result.tool_calls[0].is_success());
    }

    #[tokio::test]
    async fn test_read_file_scenario_routes_to_fs_only() {
        let mut fs = FakeServer::with_tools(vec![tool("read_file", &["file_path"])]);
        fs.results
            .insert("read_file".into(), "contents of a.txt".into());
        let connector = FakeConnector::new()
            .server("fs", fs)
            .server("net", FakeServer::with_tools(vec![tool("fetch_url", &["url"])]));
        let model = ScriptedModel::replying(vec![tool_use(
            "toolu_1",
            "read_file",
            json!({"file_path": "/tmp/a.txt"}),
        )]);
        let (orch, _, connector) = setup(connector, model).await;

        let result = orch.send("read /tmp/a.txt", None).await.unwrap();
        assert_eq!(result.tool_calls.len(), 1);
        let record = &result.tool_calls[0];
        assert_eq!(record.id, "toolu_1");
        assert_eq!(record.server.as_deref(), Some("fs"));
        match &record.outcome {
            ToolCallOutcome::Success { result } => {
                assert_eq!(result.text_content(), "contents of a.txt");
            }
            other => panic!("expected success, got {other:?}"),
        }

        let calls = connector.recorded_calls();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].server, "fs");
        assert_eq!(calls[0].arguments, json!({"file_path": "/tmp/a.txt"}));
        assert!(calls.iter().all(|c| c.server != "net"));
    }

    #[tokio::test]
    async fn test_exposed_name_clash_is_warned_and_unroutable() {
        let connector = FakeConnector::new()
            .server("fs", FakeServer::with_tools(vec![tool("search", &[])]))
            .server(
                "web",
                FakeServer::with_tools(vec![tool("search", &[]), tool("fs__search", &[])]),
            );
        let model = ScriptedModel::replying(vec![tool_use("t1", "fs__search", json!({}))]);
        let (orch, model, connector) = setup(connector, model).await;

        let result = orch.send("look it up", None).await.unwrap();
        assert_eq!(result.warnings.len(), 1);
        assert!(result.warnings[0].contains("fs/search, web/fs__search"));
        assert_eq!(result.tool_calls[0].error_kind(), Some("ambiguous_tool"));
        assert!(connector.recorded_calls().is_empty());

        let tools = model.last_request().unwrap().tools.unwrap();
        let names: Vec<&str> = tools.iter().map(|t| t.name.as_str()).collect();
        assert_eq!(names, vec!["web__search"]);
    }
}
