//! Tool invocation and dispatch types.
//!
//! Dispatch is a closed tagged variant rather than a string-keyed registry:
//! the model's (name, arguments) pair is parsed into a [`ToolRequest`], and
//! unknown names land in the `Unrecognized` variant; representable, not a
//! lookup failure. Adding a tool means adding a variant here plus an arm in
//! the tool set's dispatch match.

use serde::{Deserialize, Serialize};

/// Canonical name of the knowledge-search tool.
pub const TOOL_SEARCH_KNOWLEDGE: &str = "search_knowledge";

/// Canonical name of the weather tool.
pub const TOOL_FETCH_WEATHER: &str = "fetch_weather";

/// A named, argument-bearing request the model issues for external data.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolInvocation {
    /// Name of the tool to execute
    pub name: String,

    /// Arguments as a JSON object (argument name → value, unique keys)
    pub arguments: serde_json::Map<String, serde_json::Value>,
}

/// The capability category a tool belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ToolCategory {
    /// FAQ / knowledge-base retrieval
    Knowledge,
    /// Weather alerts and forecasts
    Weather,
}

/// A tool definition sent to the model so it knows what it can call.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolDefinition {
    /// The tool name
    pub name: String,

    /// Description of what the tool does
    pub description: String,

    /// JSON Schema describing the tool's parameters
    pub parameters: serde_json::Value,
}

/// A parsed tool request, closed over the capabilities this system has.
#[derive(Debug, Clone, PartialEq)]
pub enum ToolRequest {
    /// Search the knowledge base for relevant FAQ passages.
    SearchKnowledge { query: String },

    /// Fetch weather alerts and forecast for coordinates.
    FetchWeather { latitude: f64, longitude: f64 },

    /// A name this system does not recognize.
    Unrecognized { name: String },
}

impl ToolRequest {
    /// Parse a model-issued invocation into a request.
    ///
    /// Missing optional arguments fall back to the provided default
    /// coordinates (the model frequently omits lat/lon when the user did
    /// not name a place).
    pub fn parse(invocation: &ToolInvocation, default_lat: f64, default_lon: f64) -> Self {
        match invocation.name.as_str() {
            TOOL_SEARCH_KNOWLEDGE => {
                let query = invocation
                    .arguments
                    .get("query")
                    .and_then(|v| v.as_str())
                    .unwrap_or("")
                    .to_string();
                ToolRequest::SearchKnowledge { query }
            }
            TOOL_FETCH_WEATHER => {
                let latitude = invocation
                    .arguments
                    .get("latitude")
                    .and_then(|v| v.as_f64())
                    .unwrap_or(default_lat);
                let longitude = invocation
                    .arguments
                    .get("longitude")
                    .and_then(|v| v.as_f64())
                    .unwrap_or(default_lon);
                ToolRequest::FetchWeather {
                    latitude,
                    longitude,
                }
            }
            other => ToolRequest::Unrecognized {
                name: other.to_string(),
            },
        }
    }

    /// The capability category of this request, if recognized.
    pub fn category(&self) -> Option<ToolCategory> {
        match self {
            ToolRequest::SearchKnowledge { .. } => Some(ToolCategory::Knowledge),
            ToolRequest::FetchWeather { .. } => Some(ToolCategory::Weather),
            ToolRequest::Unrecognized { .. } => None,
        }
    }
}
