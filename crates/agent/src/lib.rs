//! Dialogue orchestrator for snowdesk.
//!
//! Drives one question through the safety-gated tool-calling loop:
//! input gate → model → tool dispatch (zero or more, hard-capped) →
//! output gate → one structured [`AnswerReport`].

pub mod orchestrator;

pub use orchestrator::{AnswerReport, AnswerRequest, Orchestrator, APOLOGY_TEXT, REFUSAL_TEXT};
