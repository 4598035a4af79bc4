//! Tool executors and upstream data clients for snowdesk.
//!
//! The [`ToolSet`] is the dispatch boundary: the orchestrator hands it a
//! parsed [`ToolRequest`] and gets back one opaque serialized payload.
//! Dispatch is a match over a closed variant; adding a tool means adding a
//! variant in core and an arm here, not changing the dialogue loop. All
//! executor failures are absorbed into empty/partial payloads; nothing in
//! this crate ever aborts a dialogue.

pub mod fetch_weather;
pub mod retrieval_client;
pub mod search_knowledge;
pub mod weather_client;

use std::sync::Arc;

use snowdesk_core::retrieval::RetrievalService;
use snowdesk_core::tool::{ToolDefinition, ToolRequest};
use snowdesk_core::weather::WeatherService;

pub use fetch_weather::{FetchWeatherTool, WeatherCaches};
pub use retrieval_client::VectorSearchClient;
pub use search_knowledge::SearchKnowledgeTool;
pub use weather_client::NwsWeatherClient;

/// The capability-indexed tool set shared across concurrent dialogues.
pub struct ToolSet {
    knowledge: SearchKnowledgeTool,
    weather: FetchWeatherTool,
}

impl ToolSet {
    pub fn new(knowledge: SearchKnowledgeTool, weather: FetchWeatherTool) -> Self {
        Self { knowledge, weather }
    }

    /// Convenience constructor wiring executors from service handles.
    pub fn from_services(
        retrieval: Arc<dyn RetrievalService>,
        weather: Arc<dyn WeatherService>,
        caches: Arc<WeatherCaches>,
        top_k: usize,
        region: impl Into<String>,
    ) -> Self {
        Self {
            knowledge: SearchKnowledgeTool::new(retrieval, top_k),
            weather: FetchWeatherTool::new(weather, caches, region),
        }
    }

    /// Definitions declared to the model. The weather capability can be
    /// withheld per request.
    pub fn definitions(&self, include_weather: bool) -> Vec<ToolDefinition> {
        let mut defs = vec![SearchKnowledgeTool::definition()];
        if include_weather {
            defs.push(FetchWeatherTool::definition());
        }
        defs
    }

    /// Execute a parsed request, returning the opaque result payload.
    ///
    /// `Unrecognized` yields an error payload that is fed back into the
    /// dialogue so the model can self-correct; it never fails the call.
    pub async fn dispatch(&self, request: &ToolRequest) -> String {
        match request {
            ToolRequest::SearchKnowledge { query } => self.knowledge.execute(query).await,
            ToolRequest::FetchWeather {
                latitude,
                longitude,
            } => self.weather.execute(*latitude, *longitude).await,
            ToolRequest::Unrecognized { name } => unknown_tool_payload(name),
        }
    }
}

/// The synthesized error payload for a tool name this system does not know.
pub fn unknown_tool_payload(name: &str) -> String {
    serde_json::json!({ "error": format!("Unknown function: {name}") }).to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use snowdesk_core::error::{RetrievalError, WeatherError};
    use snowdesk_core::retrieval::FaqMatch;
    use snowdesk_core::weather::{ForecastPeriod, WeatherAlert};
    use std::time::Duration;

    struct EmptyRetrieval;

    #[async_trait]
    impl RetrievalService for EmptyRetrieval {
        async fn search(&self, _query: &str, _k: usize) -> Result<Vec<FaqMatch>, RetrievalError> {
            Ok(Vec::new())
        }
    }

    struct EmptyWeather;

    #[async_trait]
    impl WeatherService for EmptyWeather {
        async fn alerts(&self, _region: &str) -> Result<Vec<WeatherAlert>, WeatherError> {
            Ok(Vec::new())
        }

        async fn forecast(
            &self,
            _latitude: f64,
            _longitude: f64,
        ) -> Result<Vec<ForecastPeriod>, WeatherError> {
            Ok(Vec::new())
        }
    }

    fn tool_set() -> ToolSet {
        ToolSet::from_services(
            Arc::new(EmptyRetrieval),
            Arc::new(EmptyWeather),
            Arc::new(WeatherCaches::new(Duration::from_secs(300))),
            3,
            "AK",
        )
    }

    #[test]
    fn definitions_include_weather_by_default() {
        let set = tool_set();
        let defs = set.definitions(true);
        assert_eq!(defs.len(), 2);
        assert_eq!(defs[0].name, "search_knowledge");
        assert_eq!(defs[1].name, "fetch_weather");
    }

    #[test]
    fn weather_capability_can_be_withheld() {
        let set = tool_set();
        let defs = set.definitions(false);
        assert_eq!(defs.len(), 1);
        assert_eq!(defs[0].name, "search_knowledge");
    }

    #[tokio::test]
    async fn unrecognized_dispatch_returns_error_payload() {
        let set = tool_set();
        let payload = set
            .dispatch(&ToolRequest::Unrecognized {
                name: "fly_drone".into(),
            })
            .await;
        let parsed: serde_json::Value = serde_json::from_str(&payload).unwrap();
        assert_eq!(parsed["error"], "Unknown function: fly_drone");
    }

    #[tokio::test]
    async fn dispatch_returns_opaque_json_payloads() {
        let set = tool_set();

        let knowledge = set
            .dispatch(&ToolRequest::SearchKnowledge {
                query: "closures".into(),
            })
            .await;
        assert!(serde_json::from_str::<serde_json::Value>(&knowledge).is_ok());

        let weather = set
            .dispatch(&ToolRequest::FetchWeather {
                latitude: 61.0,
                longitude: -149.0,
            })
            .await;
        assert!(serde_json::from_str::<serde_json::Value>(&weather).is_ok());
    }
}
