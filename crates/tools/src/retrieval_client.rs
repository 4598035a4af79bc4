//! Vector-search client for the FAQ knowledge base.
//!
//! Talks to a retrieval endpoint that embeds the query server-side and
//! returns the nearest passages with their distances, already sorted by
//! increasing distance.

use async_trait::async_trait;
use serde::Deserialize;
use snowdesk_core::error::RetrievalError;
use snowdesk_core::retrieval::{FaqMatch, RetrievalService};
use tracing::debug;

pub struct VectorSearchClient {
    endpoint: String,
    client: reqwest::Client,
}

#[derive(Debug, Deserialize)]
struct SearchResponse {
    #[serde(default)]
    results: Vec<SearchRow>,
}

#[derive(Debug, Deserialize)]
struct SearchRow {
    question: String,
    answer: String,
    distance: f64,
}

impl VectorSearchClient {
    pub fn new(
        endpoint: impl Into<String>,
        timeout: std::time::Duration,
    ) -> Result<Self, RetrievalError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| RetrievalError::Network(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            endpoint: endpoint.into(),
            client,
        })
    }
}

#[async_trait]
impl RetrievalService for VectorSearchClient {
    async fn search(&self, query: &str, k: usize) -> Result<Vec<FaqMatch>, RetrievalError> {
        debug!(k, "Searching knowledge base");

        let response = self
            .client
            .post(&self.endpoint)
            .json(&serde_json::json!({ "query": query, "top_k": k }))
            .send()
            .await
            .map_err(|e| RetrievalError::Network(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(RetrievalError::QueryFailed(format!(
                "retrieval endpoint returned status {status}"
            )));
        }

        let body: SearchResponse = response
            .json()
            .await
            .map_err(|e| RetrievalError::QueryFailed(e.to_string()))?;

        // Backend order is preserved; no local re-sort or tie-breaking.
        Ok(body
            .results
            .into_iter()
            .map(|row| FaqMatch {
                question: row.question,
                answer: row.answer,
                distance: row.distance,
            })
            .collect())
    }
}
