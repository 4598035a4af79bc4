//! SafetyGate trait: the content-safety boundary.
//!
//! Applied exactly once to raw user input and, only if input passed, exactly
//! once to the final answer; never to intermediate tool payloads. Policy is
//! fail-closed and all-or-nothing: any matched filter rejects the entire
//! text, with no partial redaction and no retry. Pass-through never mutates
//! the text.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::SafetyError;

/// Which side of the dialogue a text belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SafetyRole {
    /// Raw user input, before the model ever sees it
    Input,
    /// The model's final answer, before the caller ever sees it
    Output,
}

/// The verdict for one piece of text.
///
/// `matched_filters` is open-ended; filter names come from the external
/// moderation service and are not a fixed enum.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SafetyVerdict {
    /// Whether the text is rejected outright
    pub blocked: bool,

    /// Names of the filters that matched (empty when not blocked)
    pub matched_filters: Vec<String>,
}

impl SafetyVerdict {
    /// A passing verdict with no matched filters.
    pub fn pass() -> Self {
        Self {
            blocked: false,
            matched_filters: Vec::new(),
        }
    }

    /// A blocking verdict with the given matched filter names.
    pub fn blocked(filters: Vec<String>) -> Self {
        Self {
            blocked: true,
            matched_filters: filters,
        }
    }
}

/// The external moderation / jailbreak-detection service.
///
/// A transport-level failure is a [`SafetyError`], distinct from a content
/// match: infrastructure outages must surface as operational failures, not
/// masquerade as security blocks.
#[async_trait]
pub trait SafetyGate: Send + Sync {
    async fn check(
        &self,
        role: SafetyRole,
        text: &str,
    ) -> std::result::Result<SafetyVerdict, SafetyError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pass_verdict_has_no_filters() {
        let v = SafetyVerdict::pass();
        assert!(!v.blocked);
        assert!(v.matched_filters.is_empty());
    }

    #[test]
    fn blocked_verdict_keeps_filter_names() {
        let v = SafetyVerdict::blocked(vec!["pi_and_jailbreak".into(), "rai".into()]);
        assert!(v.blocked);
        assert_eq!(v.matched_filters.len(), 2);
        assert!(v.matched_filters.contains(&"pi_and_jailbreak".to_string()));
    }

    #[test]
    fn verdict_serialization_roundtrip() {
        let v = SafetyVerdict::blocked(vec!["csam".into()]);
        let json = serde_json::to_string(&v).unwrap();
        let back: SafetyVerdict = serde_json::from_str(&json).unwrap();
        assert!(back.blocked);
        assert_eq!(back.matched_filters, vec!["csam".to_string()]);
    }
}
