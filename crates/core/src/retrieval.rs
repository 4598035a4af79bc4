//! RetrievalService trait: the knowledge-base vector-search boundary.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::RetrievalError;

/// One retrieved FAQ passage.
///
/// `distance` is whatever metric the backend uses; results arrive already
/// sorted by increasing distance and are not re-sorted locally.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FaqMatch {
    pub question: String,
    pub answer: String,
    pub distance: f64,
}

/// The external vector-search backend over the FAQ corpus.
#[async_trait]
pub trait RetrievalService: Send + Sync {
    /// Return the top-`k` nearest passages to `query`, in backend order.
    async fn search(
        &self,
        query: &str,
        k: usize,
    ) -> std::result::Result<Vec<FaqMatch>, RetrievalError>;
}
