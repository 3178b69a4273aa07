//! LLM client layer used by the artifact generator and refiner.
//!
//! - Message and completion types
//! - LlmClient trait for API abstraction
//! - AnthropicClient implementation and a scripted MockLlmClient

pub mod anthropic;
pub mod client;
pub mod types;

pub use anthropic::{AnthropicClient, AnthropicConfig};
pub use client::{LlmClient, MockLlmClient};
pub use types::{CompletionRequest, CompletionResponse, Message, Role, StopReason, Usage};
