//! ModelService trait: the abstraction over the generative-language backend.
//!
//! The orchestrator sends the full turn sequence plus the declared tool
//! capability set and gets back either final text or a tool call. Exactly
//! one attempt per call; retries would blur the blocked-vs-timeout
//! distinction the error taxonomy depends on.

use async_trait::async_trait;

use crate::error::ModelError;
use crate::tool::{ToolDefinition, ToolInvocation};
use crate::turn::DialogueTurn;

/// One reply from the model: either the final answer text, or a request
/// for auxiliary data via a tool call.
#[derive(Debug, Clone)]
pub enum ModelReply {
    /// Final answer text; the dialogue loop ends here.
    Final(String),

    /// The model wants a tool executed before it can answer.
    ToolCall(ToolInvocation),
}

/// The generative model backend.
#[async_trait]
pub trait ModelService: Send + Sync {
    /// A human-readable name for this backend (used in logs and error codes).
    fn name(&self) -> &str;

    /// Send the full turn sequence and declared tools; get one reply.
    async fn send(
        &self,
        turns: &[DialogueTurn],
        tools: &[ToolDefinition],
    ) -> std::result::Result<ModelReply, ModelError>;
}
