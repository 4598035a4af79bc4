//! # Snowdesk Core
//!
//! Domain types, traits, and error definitions for the snowdesk dialogue
//! orchestration engine. This crate has **zero framework dependencies**;
//! it defines the domain model that all other crates implement against.
//!
//! ## Design Philosophy
//!
//! Every collaborator (model backend, safety service, retrieval backend,
//! weather service) is defined as a trait here. Implementations live in
//! their respective crates. This enables:
//! - Swapping implementations via configuration
//! - Easy testing with mock implementations
//! - Clean dependency graph (all crates depend inward on core)

pub mod error;
pub mod model;
pub mod retrieval;
pub mod safety;
pub mod tool;
pub mod turn;
pub mod weather;

// Re-export key types at crate root for ergonomics
pub use error::{Error, Result};
pub use model::{ModelReply, ModelService};
pub use retrieval::{FaqMatch, RetrievalService};
pub use safety::{SafetyGate, SafetyRole, SafetyVerdict};
pub use tool::{ToolCategory, ToolDefinition, ToolInvocation, ToolRequest};
pub use turn::{Dialogue, DialogueTurn, Phase, Role, TurnContent};
pub use weather::{ForecastPeriod, WeatherAlert, WeatherService};
