//! The `search_knowledge` tool executor.
//!
//! Asks the retrieval backend for the top-K nearest FAQ passages and
//! serializes them into one opaque JSON payload for the model. Retrieval
//! failure degrades to an empty result set; the dialogue proceeds on
//! whatever other context exists.

use std::sync::Arc;

use snowdesk_core::retrieval::{FaqMatch, RetrievalService};
use snowdesk_core::tool::{ToolDefinition, TOOL_SEARCH_KNOWLEDGE};
use tracing::warn;

pub struct SearchKnowledgeTool {
    retrieval: Arc<dyn RetrievalService>,
    top_k: usize,
}

impl SearchKnowledgeTool {
    pub fn new(retrieval: Arc<dyn RetrievalService>, top_k: usize) -> Self {
        Self { retrieval, top_k }
    }

    pub fn definition() -> ToolDefinition {
        ToolDefinition {
            name: TOOL_SEARCH_KNOWLEDGE.into(),
            description: "Search the snow department FAQ database for information about \
                          services, operations, policies, procedures, and contacts."
                .into(),
            parameters: serde_json::json!({
                "type": "object",
                "properties": {
                    "query": {
                        "type": "string",
                        "description": "The search query to find relevant FAQs"
                    }
                },
                "required": ["query"]
            }),
        }
    }

    /// Execute a search and serialize the result payload.
    pub async fn execute(&self, query: &str) -> String {
        let faqs = match self.retrieval.search(query, self.top_k).await {
            Ok(faqs) => faqs,
            Err(e) => {
                // Soft failure: the model gets an empty result set.
                warn!(error = %e, "Knowledge retrieval failed, returning empty results");
                Vec::new()
            }
        };
        serialize_results(&faqs)
    }
}

/// Serialize matches in backend order. Relevance is `1 − distance`; the
/// distance metric is assumed bounded in [0, 1] and out-of-range values are
/// passed through rather than clamped, since the correct bound depends on
/// the retrieval backend.
fn serialize_results(faqs: &[FaqMatch]) -> String {
    let entries: Vec<serde_json::Value> = faqs
        .iter()
        .map(|faq| {
            serde_json::json!({
                "question": faq.question,
                "answer": faq.answer,
                "relevance": format!("{:.2}", 1.0 - faq.distance),
            })
        })
        .collect();

    serde_json::json!({
        "found": !faqs.is_empty(),
        "count": faqs.len(),
        "faqs": entries,
    })
    .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use snowdesk_core::error::RetrievalError;

    struct FixedRetrieval {
        matches: Vec<FaqMatch>,
    }

    #[async_trait]
    impl RetrievalService for FixedRetrieval {
        async fn search(&self, _query: &str, k: usize) -> Result<Vec<FaqMatch>, RetrievalError> {
            Ok(self.matches.iter().take(k).cloned().collect())
        }
    }

    struct FailingRetrieval;

    #[async_trait]
    impl RetrievalService for FailingRetrieval {
        async fn search(&self, _query: &str, _k: usize) -> Result<Vec<FaqMatch>, RetrievalError> {
            Err(RetrievalError::QueryFailed("backend down".into()))
        }
    }

    fn faq(question: &str, distance: f64) -> FaqMatch {
        FaqMatch {
            question: question.into(),
            answer: format!("answer to {question}"),
            distance,
        }
    }

    #[tokio::test]
    async fn results_keep_backend_order_and_relevance() {
        let tool = SearchKnowledgeTool::new(
            Arc::new(FixedRetrieval {
                matches: vec![faq("snow emergency", 0.05), faq("plow schedule", 0.25)],
            }),
            3,
        );

        let payload = tool.execute("how do I report a snow emergency").await;
        let parsed: serde_json::Value = serde_json::from_str(&payload).unwrap();

        assert_eq!(parsed["found"], serde_json::json!(true));
        assert_eq!(parsed["count"], serde_json::json!(2));
        let faqs = parsed["faqs"].as_array().unwrap();
        assert_eq!(faqs[0]["question"], "snow emergency");
        assert_eq!(faqs[0]["relevance"], "0.95");
        assert_eq!(faqs[1]["relevance"], "0.75");
    }

    #[tokio::test]
    async fn retrieval_failure_yields_empty_payload() {
        let tool = SearchKnowledgeTool::new(Arc::new(FailingRetrieval), 3);
        let payload = tool.execute("anything").await;
        let parsed: serde_json::Value = serde_json::from_str(&payload).unwrap();

        assert_eq!(parsed["found"], serde_json::json!(false));
        assert_eq!(parsed["count"], serde_json::json!(0));
        assert!(parsed["faqs"].as_array().unwrap().is_empty());
    }

    #[test]
    fn out_of_range_distance_is_not_clamped() {
        let payload = serialize_results(&[faq("odd metric", 1.4)]);
        let parsed: serde_json::Value = serde_json::from_str(&payload).unwrap();
        assert_eq!(parsed["faqs"][0]["relevance"], "-0.40");
    }

    #[test]
    fn definition_names_the_tool() {
        let def = SearchKnowledgeTool::definition();
        assert_eq!(def.name, TOOL_SEARCH_KNOWLEDGE);
        assert!(def.parameters["required"]
            .as_array()
            .unwrap()
            .contains(&serde_json::json!("query")));
    }
}
