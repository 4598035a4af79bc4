//! Dialogue turn and conversation-state domain types.
//!
//! A dialogue is the append-only sequence of turns owned by a single
//! `answer` invocation: user text in, model replies (text or tool calls),
//! opaque tool results fed back. Turns carry a monotonic sequence number so
//! ordering survives serialization across turn boundaries.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::tool::ToolInvocation;

/// Who produced a turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// The end user
    User,
    /// The generative model
    Model,
    /// A tool execution result
    Tool,
}

/// The payload of a single turn.
///
/// Tool results are opaque: the orchestrator records the serialized payload
/// and the originating tool name (provenance) but never inspects the
/// payload's internal shape.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum TurnContent {
    /// Plain text (user query or final model answer).
    Text { text: String },

    /// A tool call requested by the model.
    ToolCall { invocation: ToolInvocation },

    /// The serialized result of a tool execution.
    ToolResult { tool_name: String, payload: String },
}

/// One unit of the dialogue sequence.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DialogueTurn {
    /// Unique turn ID
    pub id: String,

    /// Who produced this turn
    pub role: Role,

    /// The turn payload
    pub content: TurnContent,

    /// Position within the dialogue, monotonic, assigned on append
    pub sequence: u32,

    /// Timestamp
    pub timestamp: DateTime<Utc>,
}

impl DialogueTurn {
    fn new(role: Role, content: TurnContent) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            role,
            content,
            sequence: 0,
            timestamp: Utc::now(),
        }
    }

    /// A user text turn.
    pub fn user(text: impl Into<String>) -> Self {
        Self::new(Role::User, TurnContent::Text { text: text.into() })
    }

    /// A model text turn (the final answer).
    pub fn model_text(text: impl Into<String>) -> Self {
        Self::new(Role::Model, TurnContent::Text { text: text.into() })
    }

    /// A model turn requesting a tool call.
    pub fn model_tool_call(invocation: ToolInvocation) -> Self {
        Self::new(Role::Model, TurnContent::ToolCall { invocation })
    }

    /// A tool result turn carrying the opaque payload.
    pub fn tool_result(tool_name: impl Into<String>, payload: impl Into<String>) -> Self {
        Self::new(
            Role::Tool,
            TurnContent::ToolResult {
                tool_name: tool_name.into(),
                payload: payload.into(),
            },
        )
    }
}

/// Phase of the orchestration state machine.
///
/// `Init → SafetyCheckInput → AwaitingModel → {ToolDispatch → AwaitingModel}*
/// → SafetyCheckOutput → Done`, with absorbing `SecurityBlocked` and `Failed`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    Init,
    SafetyCheckInput,
    AwaitingModel,
    ToolDispatch,
    SafetyCheckOutput,
    Done,
    SecurityBlocked,
    Failed,
}

/// The conversation state owned by one `answer` invocation.
///
/// Turns are append-only; `sequence` is assigned on push. The dialogue is
/// dropped when the invocation returns; there is no cross-call persistence.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Dialogue {
    /// Ordered turns
    pub turns: Vec<DialogueTurn>,

    /// Current state-machine phase
    pub phase: Phase,

    /// Completed tool-dispatch iterations
    pub iterations: u32,
}

impl Dialogue {
    /// Create a new empty dialogue in the `Init` phase.
    pub fn new() -> Self {
        Self {
            turns: Vec::new(),
            phase: Phase::Init,
            iterations: 0,
        }
    }

    /// Append a turn, assigning the next sequence number.
    pub fn push(&mut self, mut turn: DialogueTurn) {
        turn.sequence = self.turns.len() as u32;
        self.turns.push(turn);
    }

    /// Transition to a new phase.
    pub fn transition(&mut self, phase: Phase) {
        tracing::debug!(from = ?self.phase, to = ?phase, "Phase transition");
        self.phase = phase;
    }
}

impl Default for Dialogue {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn push_assigns_monotonic_sequence() {
        let mut dialogue = Dialogue::new();
        dialogue.push(DialogueTurn::user("first"));
        dialogue.push(DialogueTurn::model_text("second"));
        dialogue.push(DialogueTurn::tool_result("search_knowledge", "{}"));

        let seqs: Vec<u32> = dialogue.turns.iter().map(|t| t.sequence).collect();
        assert_eq!(seqs, vec![0, 1, 2]);
    }

    #[test]
    fn tool_result_carries_provenance() {
        let turn = DialogueTurn::tool_result("fetch_weather", r#"{"alerts":[]}"#);
        assert_eq!(turn.role, Role::Tool);
        match &turn.content {
            TurnContent::ToolResult { tool_name, payload } => {
                assert_eq!(tool_name, "fetch_weather");
                assert_eq!(payload, r#"{"alerts":[]}"#);
            }
            other => panic!("unexpected content: {other:?}"),
        }
    }

    #[test]
    fn turn_serialization_roundtrip() {
        let turn = DialogueTurn::user("How icy are the roads?");
        let json = serde_json::to_string(&turn).unwrap();
        let back: DialogueTurn = serde_json::from_str(&json).unwrap();
        assert_eq!(back.role, Role::User);
        match back.content {
            TurnContent::Text { text } => assert_eq!(text, "How icy are the roads?"),
            other => panic!("unexpected content: {other:?}"),
        }
    }

    #[test]
    fn new_dialogue_starts_in_init() {
        let dialogue = Dialogue::new();
        assert_eq!(dialogue.phase, Phase::Init);
        assert_eq!(dialogue.iterations, 0);
        assert!(dialogue.turns.is_empty());
    }
}
