//! Plain-text rendering for REPL output.

use std::fmt::Write;

use crate::agent_core::{OrchestratorResult, ToolCallOutcome};
use crate::mcp_client::types::{
    GetPromptResult, PromptDescriptor, ResourceContents, ResourceDescriptor, ToolCallOutput,
    ToolDescriptor,
};
use crate::session::{ConnectAllReport, Listing, ServerFailure, ServerStatus};

pub fn statuses(statuses: &[ServerStatus]) -> String {
    if statuses.is_empty() {
        return "No servers configured.".to_string();
    }
    let mut out = String::new();
    for s in statuses {
        match (s.connected, s.connected_at) {
            (true, Some(at)) => {
                let _ = writeln!(
                    out,
                    "  {} [connected since {}, {} tools]",
                    s.name,
                    at.format("%H:%M:%S"),
                    s.tool_count.unwrap_or(0)
                );
            }
            _ => {
                let _ = writeln!(out, "  {} [disconnected]", s.name);
            }
        }
    }
    out.trim_end().to_string()
}

pub fn names(names: &[String], empty: &str) -> String {
    if names.is_empty() {
        empty.to_string()
    } else {
        names
            .iter()
            .map(|n| format!("  {n}"))
            .collect::<Vec<_>>()
            .join("\n")
    }
}

pub fn connect_report(report: &ConnectAllReport) -> String {
    let mut out = names(&report.connected, "No servers connected.");
    append_failures(&mut out, &report.failures);
    out
}

fn append_failures(out: &mut String, failures: &[ServerFailure]) {
    for f in failures {
        let _ = write!(out, "\n  ! {}: {}", f.server, f.error);
    }
}

fn listing<T>(listing: &Listing<T>, empty: &str, line: impl Fn(&T) -> String) -> String {
    let mut out = if listing.items.is_empty() {
        empty.to_string()
    } else {
        let mut out = String::new();
        let mut current: Option<&str> = None;
        for entry in &listing.items {
            if current != Some(entry.server.as_str()) {
                let _ = writeln!(out, "[{}]", entry.server);
                current = Some(entry.server.as_str());
            }
            let _ = writeln!(out, "  {}", line(&entry.item));
        }
        out.trim_end().to_string()
    };
    append_failures(&mut out, &listing.failures);
    out
}

pub fn tools(tools: &Listing<ToolDescriptor>) -> String {
    listing(tools, "No tools available.", |t| {
        let required = t.required_properties();
        let mut line = t.name.clone();
        if !required.is_empty() {
            let _ = write!(line, " ({})", required.join(", "));
        }
        if let Some(desc) = &t.description {
            let _ = write!(line, ": {}", first_line(desc));
        }
        line
    })
}

pub fn prompts(prompts: &Listing<PromptDescriptor>) -> String {
    listing(prompts, "No prompts available.", |p| {
        let args: Vec<String> = p
            .arguments
            .iter()
            .map(|a| {
                if a.required {
                    a.name.clone()
                } else {
                    format!("{}?", a.name)
                }
            })
            .collect();
        let mut line = format!("{}({})", p.name, args.join(", "));
        if let Some(desc) = &p.description {
            let _ = write!(line, ": {}", first_line(desc));
        }
        line
    })
}

pub fn resources(resources: &Listing<ResourceDescriptor>) -> String {
    listing(resources, "No resources available.", |r| match &r.name {
        Some(name) => format!("{} ({name})", r.uri),
        None => r.uri.clone(),
    })
}

pub fn tool_output(output: &ToolCallOutput) -> String {
    output.text_content()
}

pub fn prompt_result(result: &GetPromptResult) -> String {
    let mut out = String::new();
    if let Some(desc) = &result.description {
        let _ = writeln!(out, "{desc}");
    }
    for message in &result.messages {
        let text = ToolCallOutput {
            content: vec![message.content.clone()],
            is_error: false,
            structured_content: None,
        }
        .text_content();
        let _ = writeln!(out, "[{}] {text}", message.role);
    }
    out.trim_end().to_string()
}

pub fn resource_contents(contents: &[ResourceContents]) -> String {
    contents
        .iter()
        .map(|c| match (&c.text, &c.blob) {
            (Some(text), _) => text.clone(),
            (None, Some(blob)) => format!("[binary {} bytes base64] {}", blob.len(), c.uri),
            (None, None) => format!("[empty] {}", c.uri),
        })
        .collect::<Vec<_>>()
        .join("\n")
}

pub fn orchestrator_result(result: &OrchestratorResult) -> String {
    let mut out = String::new();
    for w in &result.warnings {
        let _ = writeln!(out, "warning: {w}");
    }
    if !result.text.is_empty() {
        let _ = writeln!(out, "{}", result.text);
    }
    for call in &result.tool_calls {
        let target = call.server.as_deref().unwrap_or("?");
        let _ = writeln!(out, "\n> {} on {target} {}", call.name, call.input);
        match &call.outcome {
            ToolCallOutcome::Success { result } => {
                let _ = writeln!(out, "{}", result.text_content());
            }
            ToolCallOutcome::Error { kind, message } => {
                let _ = writeln!(out, "error ({kind}): {message}");
            }
        }
    }
    out.trim_end().to_string()
}

fn first_line(text: &str) -> &str {
    text.lines().next().unwrap_or("").trim()
}
