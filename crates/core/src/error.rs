//! Error types for the snowdesk domain.
//!
//! Uses `thiserror` for ergonomic error definitions. Each collaborator
//! boundary (model, safety, retrieval, weather, tools) has its own enum;
//! only terminal kinds ever reach the caller of `answer`.

use thiserror::Error;

/// The top-level error type for snowdesk operations.
#[derive(Debug, Error)]
pub enum Error {
    #[error("Model service error: {0}")]
    Model(#[from] ModelError),

    #[error("Safety service error: {0}")]
    Safety(#[from] SafetyError),

    #[error("Tool error: {0}")]
    Tool(#[from] ToolError),

    #[error("Configuration error: {message}")]
    Config { message: String },

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Result type alias using our Error.
pub type Result<T> = std::result::Result<T, Error>;

/// Failures talking to the generative model backend.
///
/// These are transport-level: a single attempt timed out, the endpoint
/// rejected us, or the payload could not be understood. There are no
/// retries anywhere in the dialogue loop.
#[derive(Debug, Clone, Error)]
pub enum ModelError {
    #[error("API request failed: {message} (status: {status_code})")]
    ApiError { status_code: u16, message: String },

    #[error("Request timed out: {0}")]
    Timeout(String),

    #[error("Network error: {0}")]
    Network(String),

    #[error("Malformed model response: {0}")]
    MalformedResponse(String),
}

/// Failures from the content-safety service.
///
/// A content match is NOT an error; it is a [`crate::safety::SafetyVerdict`]
/// with `blocked = true`. `Service` means the moderation endpoint itself
/// failed (transport/timeout), which must surface as an operational failure,
/// never as a block.
#[derive(Debug, Clone, Error)]
pub enum SafetyError {
    #[error("Safety service unavailable: {0}")]
    Service(String),

    #[error("Malformed safety response: {0}")]
    MalformedResponse(String),
}

/// Failures inside tool executors.
///
/// All of these are absorbed locally: the executors degrade to empty
/// results and the dialogue continues. They never abort an `answer` call.
#[derive(Debug, Error)]
pub enum ToolError {
    #[error("Invalid tool arguments: {0}")]
    InvalidArguments(String),

    #[error("Tool execution failed: {tool_name}: {reason}")]
    ExecutionFailed { tool_name: String, reason: String },
}

/// Failures from the knowledge retrieval backend.
#[derive(Debug, Clone, Error)]
pub enum RetrievalError {
    #[error("Retrieval query failed: {0}")]
    QueryFailed(String),

    #[error("Network error: {0}")]
    Network(String),
}

/// Failures from the weather data backend.
#[derive(Debug, Clone, Error)]
pub enum WeatherError {
    #[error("Weather request failed: {message} (status: {status_code})")]
    ApiError { status_code: u16, message: String },

    #[error("Network error: {0}")]
    Network(String),

    #[error("Malformed weather response: {0}")]
    MalformedResponse(String),
}
