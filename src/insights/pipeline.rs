//! Three-stage insight generation.
//!
//! The initial and deep-dive stages are independent and run concurrently;
//! the executive stage merges their output.

use anyhow::Result;
use serde::Serialize;
use std::time::Duration;
use tracing::{info, warn};

use super::client::{ChatMessage, CompletionBackend};
use super::prompts::{self, PromptContext};

/// Narrative produced by one insight run.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Insights {
    pub initial: String,
    pub deep_dive: String,
    pub executive_summary: String,
}

/// Attempts per stage and the base delay between them.
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    pub attempts: usize,
    pub base_delay: Duration,
}

impl RetryPolicy {
    pub fn new(attempts: usize, base_delay: Duration) -> Self {
        Self {
            attempts: attempts.max(1),
            base_delay,
        }
    }

    /// Delay after the given failed attempt (1-based); grows linearly.
    fn delay_after(&self, attempt: usize) -> Duration {
        u32::try_from(attempt)
            .ok()
            .and_then(|n| self.base_delay.checked_mul(n))
            .unwrap_or(Duration::MAX)
    }
}

pub struct InsightPipeline<B> {
    backend: B,
    retry: RetryPolicy,
}

impl<B: CompletionBackend> InsightPipeline<B> {
    pub fn new(backend: B, retry: RetryPolicy) -> Self {
        Self { backend, retry }
    }

    pub async fn run(&self, context: &PromptContext) -> Result<Insights> {
        let initial_messages = prompts::initial_messages(context);
        let deep_dive_messages = prompts::deep_dive_messages(context);

        info!("Running initial insights and deep dive");
        let (initial, deep_dive) = futures::try_join!(
            self.complete_stage("initial insights", &initial_messages),
            self.complete_stage("deep dive", &deep_dive_messages),
        )?;

        info!("Merging findings into executive report");
        let executive_messages = prompts::executive_messages(&initial, &deep_dive);
        let executive_summary = self
            .complete_stage("executive summary", &executive_messages)
            .await?;

        Ok(Insights {
            initial,
            deep_dive,
            executive_summary,
        })
    }

    async fn complete_stage(&self, stage: &str, messages: &[ChatMessage]) -> Result<String> {
        let mut attempt = 1;
        loop {
            match self.backend.complete(messages).await {
                Ok(text) => {
                    info!("Stage '{}' completed ({} chars)", stage, text.len());
                    return Ok(text);
                }
                Err(e) if attempt < self.retry.attempts => {
                    let delay = self.retry.delay_after(attempt);
                    warn!(
                        "Stage '{}' attempt {}/{} failed: {}. Retrying in {:?}",
                        stage, attempt, self.retry.attempts, e, delay
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                Err(e) => {
                    return Err(e.context(format!(
                        "Stage '{}' failed after {} attempt(s)",
                        stage, attempt
                    )));
                }
            }
        }
    }
}
