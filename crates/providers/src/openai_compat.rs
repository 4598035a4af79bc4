//! OpenAI-compatible model backend.
//!
//! Works with any endpoint exposing `/chat/completions` with tool calling.
//! The dialogue's turn sequence is converted to API messages on every send;
//! tool-call / tool-result pairing is reconstructed from turn order (a tool
//! result always immediately follows the model turn that requested it).
//! One attempt per call, no retries, no streaming.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use snowdesk_core::error::ModelError;
use snowdesk_core::model::{ModelReply, ModelService};
use snowdesk_core::tool::{ToolDefinition, ToolInvocation};
use snowdesk_core::turn::{DialogueTurn, TurnContent};
use tracing::debug;

/// Generation parameters for the backend.
#[derive(Debug, Clone)]
pub struct GenerationParams {
    pub model: String,
    pub temperature: f32,
    pub max_tokens: u32,
    pub system_instruction: String,
}

/// An OpenAI-compatible model client.
pub struct OpenAiCompatModel {
    base_url: String,
    api_key: Option<String>,
    params: GenerationParams,
    client: reqwest::Client,
}

impl OpenAiCompatModel {
    pub fn new(
        base_url: impl Into<String>,
        api_key: Option<String>,
        params: GenerationParams,
        timeout: std::time::Duration,
    ) -> Result<Self, ModelError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| ModelError::Network(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key,
            params,
            client,
        })
    }
}

#[derive(Debug, Serialize)]
struct ApiMessage {
    role: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    content: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tool_calls: Option<Vec<ApiToolCall>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tool_call_id: Option<String>,
}

#[derive(Debug, Serialize)]
struct ApiToolCall {
    id: String,
    r#type: &'static str,
    function: ApiFunction,
}

#[derive(Debug, Serialize)]
struct ApiFunction {
    name: String,
    arguments: String,
}

#[derive(Debug, Deserialize)]
struct ApiResponse {
    choices: Vec<ApiChoice>,
}

#[derive(Debug, Deserialize)]
struct ApiChoice {
    message: ApiResponseMessage,
}

#[derive(Debug, Deserialize)]
struct ApiResponseMessage {
    #[serde(default)]
    content: Option<String>,
    #[serde(default)]
    tool_calls: Vec<ApiResponseToolCall>,
}

#[derive(Debug, Deserialize)]
struct ApiResponseToolCall {
    function: ApiResponseFunction,
}

#[derive(Debug, Deserialize)]
struct ApiResponseFunction {
    name: String,
    arguments: String,
}

/// Convert the turn sequence to API messages, prepending the system
/// instruction. Call IDs are synthesized from turn sequence numbers; the
/// tool result that follows a tool-call turn reuses the call's ID.
fn to_api_messages(system_instruction: &str, turns: &[DialogueTurn]) -> Vec<ApiMessage> {
    let mut messages = vec![ApiMessage {
        role: "system",
        content: Some(system_instruction.to_string()),
        tool_calls: None,
        tool_call_id: None,
    }];

    let mut pending_call_id: Option<String> = None;
    for turn in turns {
        match &turn.content {
            TurnContent::Text { text } => {
                let role = match turn.role {
                    snowdesk_core::Role::User => "user",
                    _ => "assistant",
                };
                messages.push(ApiMessage {
                    role,
                    content: Some(text.clone()),
                    tool_calls: None,
                    tool_call_id: None,
                });
            }
            TurnContent::ToolCall { invocation } => {
                let call_id = format!("call_{}", turn.sequence);
                messages.push(ApiMessage {
                    role: "assistant",
                    content: None,
                    tool_calls: Some(vec![ApiToolCall {
                        id: call_id.clone(),
                        r#type: "function",
                        function: ApiFunction {
                            name: invocation.name.clone(),
                            arguments: serde_json::Value::Object(invocation.arguments.clone())
                                .to_string(),
                        },
                    }]),
                    tool_call_id: None,
                });
                pending_call_id = Some(call_id);
            }
            TurnContent::ToolResult { payload, .. } => {
                messages.push(ApiMessage {
                    role: "tool",
                    content: Some(payload.clone()),
                    tool_calls: None,
                    tool_call_id: pending_call_id.take(),
                });
            }
        }
    }
    messages
}

/// Classify an API response as final text or the first tool call.
fn classify_reply(response: ApiResponse) -> Result<ModelReply, ModelError> {
    let choice = response
        .choices
        .into_iter()
        .next()
        .ok_or_else(|| ModelError::MalformedResponse("response contained no choices".into()))?;

    if let Some(call) = choice.message.tool_calls.into_iter().next() {
        let arguments: serde_json::Map<String, serde_json::Value> =
            serde_json::from_str(&call.function.arguments).unwrap_or_default();
        return Ok(ModelReply::ToolCall(ToolInvocation {
            name: call.function.name,
            arguments,
        }));
    }

    match choice.message.content {
        Some(text) => Ok(ModelReply::Final(text)),
        None => Err(ModelError::MalformedResponse(
            "response had neither text content nor tool calls".into(),
        )),
    }
}

#[async_trait]
impl ModelService for OpenAiCompatModel {
    fn name(&self) -> &str {
        "openai_compat"
    }

    async fn send(
        &self,
        turns: &[DialogueTurn],
        tools: &[ToolDefinition],
    ) -> Result<ModelReply, ModelError> {
        let url = format!("{}/chat/completions", self.base_url);

        let mut body = serde_json::json!({
            "model": self.params.model,
            "messages": to_api_messages(&self.params.system_instruction, turns),
            "temperature": self.params.temperature,
            "max_tokens": self.params.max_tokens,
            "stream": false,
        });

        if !tools.is_empty() {
            let api_tools: Vec<serde_json::Value> = tools
                .iter()
                .map(|t| {
                    serde_json::json!({
                        "type": "function",
                        "function": {
                            "name": t.name,
                            "description": t.description,
                            "parameters": t.parameters,
                        }
                    })
                })
                .collect();
            body["tools"] = serde_json::json!(api_tools);
        }

        debug!(model = %self.params.model, turns = turns.len(), "Sending completion request");

        let mut request = self.client.post(&url).json(&body);
        if let Some(key) = &self.api_key {
            request = request.bearer_auth(key);
        }

        let response = request.send().await.map_err(|e| {
            if e.is_timeout() {
                ModelError::Timeout(e.to_string())
            } else {
                ModelError::Network(e.to_string())
            }
        })?;

        let status = response.status();
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(ModelError::ApiError {
                status_code: status.as_u16(),
                message,
            });
        }

        let api_response: ApiResponse = response
            .json()
            .await
            .map_err(|e| ModelError::MalformedResponse(e.to_string()))?;

        classify_reply(api_response)
    }
}
