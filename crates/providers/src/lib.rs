//! Generative-model backend clients for snowdesk.
//!
//! One implementation today: any OpenAI-compatible `/chat/completions`
//! endpoint with tool calling. The orchestrator only sees the
//! [`snowdesk_core::ModelService`] trait.

pub mod openai_compat;

pub use openai_compat::{GenerationParams, OpenAiCompatModel};
