//! Content-safety gate client.
//!
//! Wraps an external moderation / jailbreak-detection service that exposes
//! one sanitize endpoint per role (user prompt vs. model response). Policy
//! is fail-closed and all-or-nothing: if any named filter matches, the whole
//! text is rejected. The gate never mutates text on pass-through, and a
//! transport failure is surfaced as [`SafetyError::Service`]; an outage
//! must never masquerade as a security block.

use async_trait::async_trait;
use snowdesk_core::error::SafetyError;
use snowdesk_core::safety::{SafetyGate, SafetyRole, SafetyVerdict};
use tracing::{debug, warn};

/// HTTP client for the moderation service.
pub struct ModerationGate {
    input_endpoint: String,
    output_endpoint: String,
    api_key: Option<String>,
    client: reqwest::Client,
}

impl ModerationGate {
    /// Create a gate with the per-role endpoints and a fixed per-call timeout.
    pub fn new(
        input_endpoint: impl Into<String>,
        output_endpoint: impl Into<String>,
        api_key: Option<String>,
        timeout: std::time::Duration,
    ) -> Result<Self, SafetyError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| SafetyError::Service(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            input_endpoint: input_endpoint.into(),
            output_endpoint: output_endpoint.into(),
            api_key,
            client,
        })
    }

    fn endpoint(&self, role: SafetyRole) -> &str {
        match role {
            SafetyRole::Input => &self.input_endpoint,
            SafetyRole::Output => &self.output_endpoint,
        }
    }

    fn payload(role: SafetyRole, text: &str) -> serde_json::Value {
        match role {
            SafetyRole::Input => serde_json::json!({ "userPromptData": { "text": text } }),
            SafetyRole::Output => serde_json::json!({ "modelResponseData": { "text": text } }),
        }
    }
}

/// Walk the sanitization result and collect the names of filters that
/// reported a match. The filter map is open-ended; each entry nests its
/// verdict under one of several known result keys.
fn matched_filters(body: &serde_json::Value) -> Vec<String> {
    const RESULT_KEYS: &[&str] = &[
        "csamFilterFilterResult",
        "raiFilterResult",
        "piAndJailbreakFilterResult",
        "sdpFilterResult",
        "maliciousUriFilterResult",
    ];

    let Some(filters) = body
        .pointer("/sanitizationResult/filterResults")
        .and_then(|v| v.as_object())
    else {
        return Vec::new();
    };

    let mut blocked = Vec::new();
    for (name, entry) in filters {
        let match_found = RESULT_KEYS.iter().any(|key| {
            entry
                .get(key)
                .and_then(|r| r.get("matchState"))
                .and_then(|s| s.as_str())
                == Some("MATCH_FOUND")
        });
        if match_found {
            blocked.push(name.clone());
        }
    }
    blocked
}

#[async_trait]
impl SafetyGate for ModerationGate {
    async fn check(&self, role: SafetyRole, text: &str) -> Result<SafetyVerdict, SafetyError> {
        let mut request = self
            .client
            .post(self.endpoint(role))
            .json(&Self::payload(role, text));

        if let Some(key) = &self.api_key {
            request = request.bearer_auth(key);
        }

        let response = request.send().await.map_err(|e| {
            if e.is_timeout() {
                SafetyError::Service(format!("sanitize call timed out: {e}"))
            } else {
                SafetyError::Service(format!("sanitize call failed: {e}"))
            }
        })?;

        let status = response.status();
        if !status.is_success() {
            return Err(SafetyError::Service(format!(
                "sanitize endpoint returned status {status}"
            )));
        }

        let body: serde_json::Value = response
            .json()
            .await
            .map_err(|e| SafetyError::MalformedResponse(e.to_string()))?;

        let filters = matched_filters(&body);
        if filters.is_empty() {
            debug!(?role, "Safety check passed");
            Ok(SafetyVerdict::pass())
        } else {
            warn!(?role, filters = ?filters, "Safety check blocked text");
            Ok(SafetyVerdict::blocked(filters))
        }
    }
}
