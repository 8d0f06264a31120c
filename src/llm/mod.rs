//! Text-generation providers used by the generative selection stage

pub mod chain;
pub mod client;
pub mod prompts;

use async_trait::async_trait;
pub use chain::ProviderChain;
pub use client::ChatClient;
pub use client::ChatProvider;
pub use prompts::PromptTemplate;
pub use prompts::SelectionPrompts;

use crate::errors::Result;

/// (system, user) → raw completion text
#[async_trait]
pub trait TextGenerator: Send + Sync {
    /// Name used in logs and fallback warnings
    fn name(&self) -> &str;

    async fn generate(&self, system: &str, user: &str) -> Result<String>;
}
