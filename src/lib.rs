pub mod analytics;
pub mod api;
pub mod cache;
pub mod cli;
pub mod config;
pub mod corpus;
pub mod embeddings;
pub mod errors;
pub mod llm;
pub mod logging;
pub mod models;
pub mod pipeline;
pub mod profile;
pub mod retrieval;
pub mod router;
pub mod scoring;
pub mod selection;
pub mod vocabulary;

#[cfg(test)]
mod models_tests;

pub use config::AppConfig;
pub use errors::*;
pub use pipeline::MatchPipeline;
