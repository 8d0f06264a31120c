//! CLI output formatting utilities

use crate::config::mask_secret;
use crate::config::mask_url;
use crate::models::SelectedCandidate;
use crate::models::SelectionResult;
use crate::AppConfig;

/// Truncate at a character boundary, appending "..." when shortened
#[must_use]
pub fn truncate_str(s: &str, max_chars: usize) -> String {
    if s.chars().count() > max_chars {
        let truncated: String = s.chars().take(max_chars).collect();
        format!("{truncated}...")
    } else {
        s.to_string()
    }
}

fn print_candidate(label: &str, candidate: &SelectedCandidate) {
    match &candidate.title {
        Some(title) => println!("  {label}: {} ({title}) [{}]", candidate.name, candidate.id),
        None => println!("  {label}: {} [{}]", candidate.name, candidate.id),
    }
    if !candidate.bio.is_empty() {
        println!("    {}", truncate_str(&candidate.bio, 120));
    }
    if let Some(video) = &candidate.video_url {
        println!("    🎬 {video}");
    }
}

/// Print a selection result for humans
pub fn print_selection(result: &SelectionResult) {
    println!("🎯 Match score: {}", result.match_score);
    println!(
        "   Strategy: {}{}{}",
        result.strategy_used.as_str(),
        if result.fallback_used { " (fallback)" } else { "" },
        if result.from_cache { " (cached)" } else { "" }
    );
    println!();

    print_candidate("Staff", &result.selected_staff);
    print_candidate("Current member", &result.selected_current_member);
    if let Some(alumni) = &result.selected_alumni {
        print_candidate("Alumni", alumni);
    }
    println!();

    if !result.program_labels.is_empty() {
        println!("🏷️  Programs: {}", result.program_labels.join(", "));
    }
    println!("💬 {}", result.message);
    println!("🧭 {}", result.reasoning);
}

pub fn print_config(config: &AppConfig) {
    println!("📋 cohort-match Configuration:");
    println!();

    println!("📝 Logging:");
    println!("  Level: {}", config.logging.level);
    println!("  Directory: {}", config.logging.log_dir);
    println!();

    println!("📚 Corpus:");
    println!("  Path: {}", config.corpus.path);
    if let Some(path) = &config.vocabulary.path {
        println!("  Vocabulary: {path}");
    } else {
        println!("  Vocabulary: built-in");
    }
    println!();

    println!("🧠 Embeddings:");
    println!("  Enabled: {}", config.embeddings.enabled);
    println!("  Provider: {}", config.embeddings.provider);
    println!("  Endpoint: {}", mask_url(&config.embeddings.endpoint));
    println!("  Model: {}", config.embeddings.model);
    println!("  Dimension: {}", config.embeddings.dimension);
    println!("  Key: {}", mask_secret(config.embeddings.api_key.as_deref()));
    println!("  Cache: {}", config.embeddings.cache_path);
    println!();

    println!("🔎 Retrieval:");
    println!(
        "  Top-k: members {}, alumni {}, staff {}",
        config.retrieval.current_member_top_k,
        config.retrieval.alumni_top_k,
        config.retrieval.staff_top_k
    );
    println!("  Min similarity: {}", config.retrieval.min_similarity);
    println!();

    println!("🤖 LLM (budget {}s):", config.llm.budget_secs);
    if config.llm.providers.is_empty() {
        println!("  No providers configured");
    }
    for provider in &config.llm.providers {
        println!(
            "  {} [{}] {} model={} timeout={}s key={}",
            provider.name,
            provider.kind,
            mask_url(&provider.endpoint),
            provider.model,
            provider.timeout_secs,
            mask_secret(provider.api_key.as_deref())
        );
    }
    println!();

    println!("💾 Cache:");
    println!("  Backend: {:?}", config.cache.backend);
    println!("  TTL: {}s", config.cache.ttl_secs);
    println!("  Read timeout: {}ms", config.cache.read_timeout_ms);
    if let Some(url) = &config.cache.redis_url {
        println!("  Redis: {}", mask_url(url));
    }
    println!();

    println!("🧪 Experiment:");
    println!("  Enabled: {}", config.experiment.enabled);
    println!("  Generative: {}%", config.experiment.generative_percent);
    println!("  Semantic: {}%", config.experiment.semantic_percent);
    println!("  Request ceiling: {}ms", config.pipeline.request_ceiling_ms);
}

pub fn print_info(msg: &str) {
    println!("ℹ️  {msg}");
}

pub fn print_success(msg: &str) {
    println!("✅ {msg}");
}

pub fn print_warning(msg: &str) {
    println!("⚠️  {msg}");
}
