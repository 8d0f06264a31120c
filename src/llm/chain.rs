//! Ordered fallback chain of text-generation providers
//!
//! Providers are tried in priority order. A transport error, a timeout or an
//! output rejected by the caller's validator moves on to the next provider.
//! One budget covers the whole chain; once it is spent no further provider is
//! tried.

use std::sync::Arc;
use std::time::Duration;

use tokio::time::Instant;
use tracing::debug;
use tracing::warn;

use super::client::ChatClient;
use super::TextGenerator;
use crate::config::LlmConfig;
use crate::errors::CohortMatchError;
use crate::errors::Result;

struct ChainEntry {
    generator: Arc<dyn TextGenerator>,
    timeout: Duration,
}

pub struct ProviderChain {
    chain: Vec<ChainEntry>,
    budget: Duration,
}

impl ProviderChain {
    pub fn new(budget: Duration) -> Self {
        Self {
            chain: Vec::new(),
            budget,
        }
    }

    /// Build every `[[llm.providers]]` entry in configured order
    pub fn from_config(config: &LlmConfig) -> Result<Self> {
        let mut chain = Self::new(Duration::from_secs(config.budget_secs));
        for provider in &config.providers {
            chain.push(
                Arc::new(ChatClient::from_config(provider)?),
                Duration::from_secs(provider.timeout_secs),
            );
        }
        Ok(chain)
    }

    /// Add a provider to the end of the chain
    pub fn push(&mut self, generator: Arc<dyn TextGenerator>, timeout: Duration) {
        self.chain.push(ChainEntry { generator, timeout });
    }

    pub fn is_empty(&self) -> bool {
        self.chain.is_empty()
    }

    pub fn provider_names(&self) -> Vec<String> {
        self.chain
            .iter()
            .map(|e| e.generator.name().to_string())
            .collect()
    }

    /// Generate and validate, returning the first accepted output and the
    /// name of the provider that produced it
    pub async fn generate_validated<T, F>(
        &self,
        system: &str,
        user: &str,
        validate: F,
    ) -> Result<(T, String)>
    where
        F: Fn(&str) -> Result<T>,
    {
        let deadline = Instant::now() + self.budget;
        let mut last_error = None;

        for entry in &self.chain {
            let name = entry.generator.name();
            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                warn!(provider = name, "generation budget exhausted before provider");
                last_error = Some(CohortMatchError::Timeout(self.budget.as_millis() as u64));
                break;
            }

            let attempt_timeout = entry.timeout.min(remaining);
            let outcome =
                tokio::time::timeout(attempt_timeout, entry.generator.generate(system, user)).await;

            let raw = match outcome {
                Ok(Ok(raw)) => raw,
                Ok(Err(e)) => {
                    warn!(provider = name, error = %e, "provider failed, trying next in chain");
                    last_error = Some(e);
                    continue;
                }
                Err(_) => {
                    warn!(
                        provider = name,
                        timeout_ms = attempt_timeout.as_millis() as u64,
                        "provider timed out, trying next in chain"
                    );
                    last_error = Some(CohortMatchError::Timeout(attempt_timeout.as_millis() as u64));
                    continue;
                }
            };

            match validate(&raw) {
                Ok(value) => {
                    debug!(provider = name, "provider output accepted");
                    return Ok((value, name.to_string()));
                }
                Err(e) => {
                    warn!(provider = name, error = %e, "provider output rejected, trying next in chain");
                    last_error = Some(e);
                }
            }
        }

        Err(last_error.unwrap_or_else(|| {
            CohortMatchError::LlmError("no text-generation providers configured".to_string())
        }))
    }
}
