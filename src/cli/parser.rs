//! REPL command parsing.

use serde_json::Value;
use thiserror::Error;

/// One REPL command.
#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    Servers,
    Connected,
    Connect { target: ConnectTarget },
    Disconnect { server: Option<String> },
    Tools { server: Option<String> },
    Call { server: String, tool: String, arguments: Value },
    Prompts { server: Option<String> },
    Execute {
        server: String,
        prompt: String,
        arguments: serde_json::Map<String, Value>,
    },
    Resources { server: Option<String> },
    Read { server: String, uri: String },
    Prompt { servers: Option<Vec<String>>, text: String },
    Help,
    Exit,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConnectTarget {
    All,
    Server(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParseError {
    #[error("unknown command '{0}' (try 'help')")]
    UnknownCommand(String),

    #[error("usage: {0}")]
    Usage(&'static str),

    #[error("invalid JSON arguments: {0}")]
    InvalidJson(String),
}

pub const HELP: &str = "\
Commands:
  servers                          configured servers and their state
  connected                        connected server names
  connect <name|all>               connect one or every server
  disconnect [name]                disconnect one or every server
  tools [server]                   list tools
  call <server> <tool> [json]      call a tool with JSON object arguments
  prompts [server]                 list prompt templates
  execute <server> <prompt> [json] render a prompt template
  resources [server]               list resources
  read <server> <uri>              read a resource
  prompt [@s1,s2] <text>           ask the model, optionally limited to servers
  help                             this text
  exit | quit                      leave";

/// Split off the first whitespace-delimited word.
fn split_word(input: &str) -> (&str, &str) {
    let input = input.trim_start();
    match input.find(char::is_whitespace) {
        Some(idx) => (&input[..idx], input[idx..].trim_start()),
        None => (input, ""),
    }
}

fn optional_word(rest: &str) -> Option<String> {
    let (word, _) = split_word(rest);
    (!word.is_empty()).then(|| word.to_string())
}

fn parse_json_object(raw: &str) -> Result<serde_json::Map<String, Value>, ParseError> {
    if raw.trim().is_empty() {
        return Ok(serde_json::Map::new());
    }
    match serde_json::from_str::<Value>(raw) {
        Ok(Value::Object(map)) => Ok(map),
        Ok(_) => Err(ParseError::InvalidJson("expected a JSON object".into())),
        Err(e) => Err(ParseError::InvalidJson(e.to_string())),
    }
}

/// Parse one input line. Blank lines yield `Ok(None)`.
pub fn parse_command(line: &str) -> Result<Option<Command>, ParseError> {
    let (head, rest) = split_word(line.trim());
    if head.is_empty() {
        return Ok(None);
    }

    let command = match head.to_ascii_lowercase().as_str() {
        "servers" => Command::Servers,
        "connected" => Command::Connected,
        "connect" => match optional_word(rest) {
            None => return Err(ParseError::Usage("connect <name|all>")),
            Some(name) if name.eq_ignore_ascii_case("all") => Command::Connect {
                target: ConnectTarget::All,
            },
            Some(name) => Command::Connect {
                target: ConnectTarget::Server(name),
            },
        },
        "disconnect" => Command::Disconnect {
            server: optional_word(rest),
        },
        "tools" => Command::Tools {
            server: optional_word(rest),
        },
        "call" => {
            let (server, rest) = split_word(rest);
            let (tool, raw_args) = split_word(rest);
            if server.is_empty() || tool.is_empty() {
                return Err(ParseError::Usage("call <server> <tool> [json]"));
            }
            Command::Call {
                server: server.to_string(),
                tool: tool.to_string(),
                arguments: Value::Object(parse_json_object(raw_args)?),
            }
        }
        "prompts" => Command::Prompts {
            server: optional_word(rest),
        },
        "execute" => {
            let (server, rest) = split_word(rest);
            let (prompt, raw_args) = split_word(rest);
            if server.is_empty() || prompt.is_empty() {
                return Err(ParseError::Usage("execute <server> <prompt> [json]"));
            }
            Command::Execute {
                server: server.to_string(),
                prompt: prompt.to_string(),
                arguments: parse_json_object(raw_args)?,
            }
        }
        "resources" => Command::Resources {
            server: optional_word(rest),
        },
        "read" => {
            let (server, uri) = split_word(rest);
            if server.is_empty() || uri.is_empty() {
                return Err(ParseError::Usage("read <server> <uri>"));
            }
            Command::Read {
                server: server.to_string(),
                uri: uri.trim().to_string(),
            }
        }
        "prompt" => {
            let (servers, text) = match rest.strip_prefix('@') {
                Some(after) => {
                    let (list, text) = split_word(after);
                    let servers: Vec<String> = list
                        .split(',')
                        .map(str::trim)
                        .filter(|s| !s.is_empty())
                        .map(str::to_string)
                        .collect();
                    (Some(servers), text)
                }
                None => (None, rest),
            };
            if text.trim().is_empty() {
                return Err(ParseError::Usage("prompt [@s1,s2] <text>"));
            }
            Command::Prompt {
                servers,
                text: text.trim().to_string(),
            }
        }
        "help" | "?" => Command::Help,
        "exit" | "quit" => Command::Exit,
        other => return Err(ParseError::UnknownCommand(other.to_string())),
    };

    Ok(Some(command))
}

// ─── Tests ───────────────────────────────────────────────────────────────────
