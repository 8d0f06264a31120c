//! Embeddings generation and the candidate embedding index
//!
//! This module provides:
//! - HTTP clients for OpenAI-compatible and Ollama embedding endpoints
//! - Text assembly for candidate and profile embeddings
//! - The precomputed, content-addressed embedding index with cosine retrieval
//!
//! # Examples
//!
//! ```rust,no_run
//! use cohort_match::config::AppConfig;
//! use cohort_match::embeddings::EmbeddingClient;
//! use cohort_match::embeddings::TextEmbedder;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = AppConfig::load()?;
//!     let client = EmbeddingClient::from_app_config(&config)?;
//!
//!     let embedding = client.embed("Curious, kind, loves robotics").await?;
//!     println!("Generated embedding with {} dimensions", embedding.len());
//!
//!     Ok(())
//! }
//! ```

pub mod client;
pub mod index;
pub mod text;

use async_trait::async_trait;
pub use client::EmbeddingClient;
pub use client::EmbeddingProvider;
pub use index::cosine_similarity;
pub use index::EmbeddingIndex;
pub use index::EmbeddingRecord;
pub use index::Shortlist;
pub use index::ShortlistEntry;

use crate::errors::Result;

/// Text → fixed-dimension vector capability
#[async_trait]
pub trait TextEmbedder: Send + Sync {
    /// Identifier stored alongside cached vectors; a change forces a rebuild
    fn model_id(&self) -> &str;

    fn dimension(&self) -> usize;

    async fn embed(&self, text: &str) -> Result<Vec<f32>>;

    /// Embed several texts; providers without batch support embed one at a time
    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        let mut vectors = Vec::with_capacity(texts.len());
        for text in texts {
            vectors.push(self.embed(text).await?);
        }
        Ok(vectors)
    }
}
