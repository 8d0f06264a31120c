//! CLI command handlers

use std::io::Read;
use std::path::Path;
use std::path::PathBuf;
use std::sync::Arc;

use crate::cli::commands::IndexCommands;
use crate::cli::commands::StrategyArg;
use crate::cli::output::*;
use crate::corpus::Corpus;
use crate::corpus::JsonFileCorpusProvider;
use crate::embeddings::EmbeddingClient;
use crate::embeddings::EmbeddingIndex;
use crate::embeddings::TextEmbedder;
use crate::models::MatchOptions;
use crate::models::RawProfileInput;
use crate::AppConfig;
use crate::CohortMatchError;
use crate::MatchPipeline;
use crate::Result;

fn read_input(input: &Path) -> Result<String> {
    if input == Path::new("-") {
        let mut buffer = String::new();
        std::io::stdin().read_to_string(&mut buffer)?;
        return Ok(buffer);
    }
    Ok(std::fs::read_to_string(input)?)
}

/// Handle match command
pub async fn handle_match_command(
    config: &AppConfig,
    input: &Path,
    strategy: Option<StrategyArg>,
    json: bool,
) -> Result<()> {
    let content = read_input(input)?;
    let value: serde_json::Value = serde_json::from_str(&content)?;
    let raw = RawProfileInput::from_value(value);
    let options = MatchOptions {
        strategy: strategy.map(Into::into),
        ..MatchOptions::default()
    };

    let pipeline = MatchPipeline::from_config(config).await?;
    let result = pipeline.match_profile(&raw, &options).await;

    if json {
        println!("{}", serde_json::to_string_pretty(&result)?);
    } else {
        print_selection(&result);
    }
    Ok(())
}

/// Handle serve command
pub async fn handle_serve_command(
    config: &AppConfig,
    host: String,
    port: u16,
    cors: bool,
) -> Result<()> {
    println!("🚀 Starting cohort-match API Server");
    println!("===================================\n");
    println!("📍 Host: {host}");
    println!("🔌 Port: {port}");
    println!("🌐 CORS: {}", if cors { "Enabled" } else { "Disabled" });
    println!();

    crate::api::serve_api(config, host, port, cors).await
}

/// Handle index subcommands
pub async fn handle_index_command(config: &AppConfig, command: IndexCommands) -> Result<()> {
    match command {
        IndexCommands::Build { force } => handle_index_build(config, force).await,
    }
}

async fn handle_index_build(config: &AppConfig, force: bool) -> Result<()> {
    if !config.embeddings.enabled {
        return Err(CohortMatchError::ConfigError(
            "embeddings are disabled; set [embeddings] enabled = true".to_string(),
        ));
    }

    let corpus = Corpus::load(&JsonFileCorpusProvider::new(&config.corpus.path)).await?;
    let embedder: Arc<dyn TextEmbedder> = Arc::new(EmbeddingClient::from_app_config(config)?);
    let cache_path = PathBuf::from(&config.embeddings.cache_path);

    print_info(&format!(
        "Embedding {} candidates with {} ({})",
        corpus.len(),
        config.embeddings.model,
        config.embeddings.provider
    ));

    let index = if force {
        let index = EmbeddingIndex::build(&corpus, embedder.as_ref()).await?;
        index.save(&cache_path)?;
        index
    } else {
        EmbeddingIndex::load_or_build(&corpus, Some(embedder.as_ref()), Some(&cache_path)).await?
    };

    print_success(&format!(
        "Embedding index ready: {} vectors, dimension {}, written to {}",
        index.len(),
        index.dimension(),
        cache_path.display()
    ));
    Ok(())
}

/// Handle config command
pub fn handle_config_command(config: &AppConfig) {
    print_config(config);
    if config.llm.providers.is_empty() && config.experiment.generative_percent > 0 {
        print_warning("Generative share is set but no LLM providers are configured");
    }
}
