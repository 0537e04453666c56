//! Sampling: lets a tool server ask the relay's model for a completion.
//!
//! A server sends `sampling/createMessage` while one of its own requests is
//! in flight; the transport hands it here and writes back whatever this
//! returns.

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;

use crate::inference::client::ModelApi;
use crate::inference::types::{ContentBlock, MessageParam, MessagesRequest, Role};
use crate::mcp_client::types::{
    error_codes, Content, CreateMessageParams, CreateMessageResult, JsonRpcError,
};
use crate::mcp_client::ServerRequestHandler;

pub const CREATE_MESSAGE: &str = "sampling/createMessage";

/// Answers `sampling/createMessage` with one Messages API call.
pub struct SamplingHandler {
    model_api: Arc<dyn ModelApi>,
    model: String,
}

impl SamplingHandler {
    pub fn new(model_api: Arc<dyn ModelApi>, model: impl Into<String>) -> Self {
        Self {
            model_api,
            model: model.into(),
        }
    }

    async fn create_message(&self, server: &str, params: Option<Value>) -> Result<Value, JsonRpcError> {
        let params: CreateMessageParams = serde_json::from_value(params.unwrap_or(Value::Null))
            .map_err(|e| JsonRpcError::new(error_codes::INVALID_PARAMS, e.to_string()))?;

        let request = MessagesRequest {
            model: self.model.clone(),
            max_tokens: params.max_tokens,
            system: params.system_prompt,
            messages: to_messages(params.messages)?,
            tools: None,
        };

        tracing::info!(
            server,
            messages = request.messages.len(),
            max_tokens = request.max_tokens,
            "sampling request"
        );

        let response = self
            .model_api
            .create_message(request)
            .await
            .map_err(|e| JsonRpcError::new(error_codes::INTERNAL_ERROR, e.to_string()))?;

        let text = response
            .content
            .iter()
            .filter_map(|block| match block {
                ContentBlock::Text { text } => Some(text.as_str()),
                _ => None,
            })
            .collect::<Vec<_>>()
            .join("\n");

        let result = CreateMessageResult {
            role: "assistant".into(),
            content: Content::Text { text },
            model: response.model,
            stop_reason: response.stop_reason.map(stop_reason),
        };
        serde_json::to_value(result)
            .map_err(|e| JsonRpcError::new(error_codes::INTERNAL_ERROR, e.to_string()))
    }
}

#[async_trait]
impl ServerRequestHandler for SamplingHandler {
    async fn handle(
        &self,
        server: &str,
        method: &str,
        params: Option<Value>,
    ) -> Result<Value, JsonRpcError> {
        match method {
            CREATE_MESSAGE => self.create_message(server, params).await,
            "ping" => Ok(serde_json::json!({})),
            other => Err(JsonRpcError::new(
                error_codes::METHOD_NOT_FOUND,
                format!("client does not handle '{other}'"),
            )),
        }
    }
}

/// Only text turns can be forwarded.
fn to_messages(
    messages: Vec<crate::mcp_client::types::SamplingMessage>,
) -> Result<Vec<MessageParam>, JsonRpcError> {
    messages
        .into_iter()
        .map(|m| {
            let role = match m.role.as_str() {
                "assistant" => Role::Assistant,
                _ => Role::User,
            };
            match m.content {
                Content::Text { text } => Ok(MessageParam { role, content: text }),
                _ => Err(JsonRpcError::new(
                    error_codes::INVALID_PARAMS,
                    "only text sampling messages are supported",
                )),
            }
        })
        .collect()
}

/// Messages API stop reasons use snake_case; the protocol uses camelCase.
fn stop_reason(reason: String) -> String {
    match reason.as_str() {
        "end_turn" => "endTurn".into(),
        "max_tokens" => "maxTokens".into(),
        "stop_sequence" => "stopSequence".into(),
        _ => reason,
    }
}
