//! Narrative insight generation over the analysis results.
//!
//! Talks to an OpenAI-compatible chat-completions endpoint through the
//! [`CompletionBackend`] trait.

pub mod client;
pub mod pipeline;
pub mod prompts;

pub use client::{ChatMessage, ClientConfig, CompletionBackend, OpenAiClient};
pub use pipeline::{InsightPipeline, Insights, RetryPolicy};
pub use prompts::PromptContext;
