//! Interactive command loop.

use std::sync::Arc;

use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt};

use super::parser::{parse_command, Command, ConnectTarget, HELP};
use super::render;
use crate::agent_core::PromptOrchestrator;
use crate::session::{ConnectOutcome, SessionManager};

/// Whether the loop should keep reading.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flow {
    Continue,
    Exit,
}

pub struct Repl {
    sessions: Arc<SessionManager>,
    orchestrator: Option<Arc<PromptOrchestrator>>,
}

impl Repl {
    pub fn new(
        sessions: Arc<SessionManager>,
        orchestrator: Option<Arc<PromptOrchestrator>>,
    ) -> Self {
        Self {
            sessions,
            orchestrator,
        }
    }

    /// Read commands from `input` until EOF or `exit`, writing to `output`.
    pub async fn run<R, W>(&self, input: R, mut output: W) -> std::io::Result<()>
    where
        R: AsyncBufRead + Unpin,
        W: AsyncWrite + Unpin,
    {
        output
            .write_all(b"mcp-relay interactive mode. Type 'help' for commands.\n")
            .await?;
        let mut lines = input.lines();
        loop {
            output.write_all(b"mcp> ").await?;
            output.flush().await?;

            let Some(line) = lines.next_line().await? else {
                break;
            };
            let (reply, flow) = self.execute_line(&line).await;
            if !reply.is_empty() {
                output.write_all(reply.as_bytes()).await?;
                output.write_all(b"\n").await?;
            }
            if flow == Flow::Exit {
                break;
            }
        }
        output.flush().await
    }

    /// Run one input line and return the text to show.
    pub async fn execute_line(&self, line: &str) -> (String, Flow) {
        let command = match parse_command(line) {
            Ok(Some(command)) => command,
            Ok(None) => return (String::new(), Flow::Continue),
            Err(e) => return (format!("error: {e}"), Flow::Continue),
        };
        tracing::debug!(?command, "repl command");

        if command == Command::Exit {
            return ("Bye.".to_string(), Flow::Exit);
        }
        let reply = match self.execute(command).await {
            Ok(text) => text,
            Err(message) => format!("error: {message}"),
        };
        (reply, Flow::Continue)
    }

    async fn execute(&self, command: Command) -> Result<String, String> {
        let sessions = &self.sessions;
        let text = match command {
            Command::Help => HELP.to_string(),
            Command::Exit => String::new(),
            Command::Servers => render::statuses(&sessions.server_statuses().await),
            Command::Connected => {
                render::names(&sessions.connected_servers().await, "No servers connected.")
            }
            Command::Connect {
                target: ConnectTarget::All,
            } => render::connect_report(&sessions.connect_all().await),
            Command::Connect {
                target: ConnectTarget::Server(name),
            } => match sessions.connect(&name).await.map_err(|e| e.to_string())? {
                ConnectOutcome::Connected => format!("Connected to {name}."),
                ConnectOutcome::AlreadyConnected => format!("Already connected to {name}."),
            },
            Command::Disconnect { server } => {
                let closed = sessions
                    .disconnect(server.as_deref())
                    .await
                    .map_err(|e| e.to_string())?;
                if closed.is_empty() {
                    "No servers connected.".to_string()
                } else {
                    format!("Disconnected: {}", closed.join(", "))
                }
            }
            Command::Tools { server } => render::tools(
                &sessions
                    .list_tools(server.as_deref())
                    .await
                    .map_err(|e| e.to_string())?,
            ),
            Command::Call {
                server,
                tool,
                arguments,
            } => render::tool_output(
                &sessions
                    .call_tool(&server, &tool, arguments)
                    .await
                    .map_err(|e| e.to_string())?,
            ),
            Command::Prompts { server } => render::prompts(
                &sessions
                    .list_prompts(server.as_deref())
                    .await
                    .map_err(|e| e.to_string())?,
            ),
            Command::Execute {
                server,
                prompt,
                arguments,
            } => render::prompt_result(
                &sessions
                    .get_prompt(&server, &prompt, arguments)
                    .await
                    .map_err(|e| e.to_string())?,
            ),
            Command::Resources { server } => render::resources(
                &sessions
                    .list_resources(server.as_deref())
                    .await
                    .map_err(|e| e.to_string())?,
            ),
            Command::Read { server, uri } => render::resource_contents(
                &sessions
                    .read_resource(&server, &uri)
                    .await
                    .map_err(|e| e.to_string())?,
            ),
            Command::Prompt { servers, text } => {
                let orchestrator = self.orchestrator.as_ref().ok_or_else(|| {
                    "model API is not configured (set ANTHROPIC_API_KEY)".to_string()
                })?;
                let result = orchestrator
                    .send(&text, servers.as_deref())
                    .await
                    .map_err(|e| e.to_string())?;
                render::orchestrator_result(&result)
            }
        };
        Ok(text)
    }
}

// ─── Tests ───────────────────────────────────────────────────────────────────
