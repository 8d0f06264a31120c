//! Text assembly and preprocessing for embedding generation
//!
//! Candidate-side text is a weighted summary of the record; profile-side text
//! repeats the family's own description three times so it dominates the
//! list-type fields.

use tracing::debug;
use tracing::warn;

use crate::corpus::CandidateRecord;
use crate::errors::CohortMatchError;
use crate::models::MatchingProfile;

/// Longest text sent to an embedding provider
pub const MAX_EMBEDDING_CHARS: usize = 2000;

/// Times the free-text description is repeated in the profile embedding input
pub const DESCRIPTION_WEIGHT: usize = 3;

/// Preprocess text for embedding generation
///
/// Normalizes whitespace, strips control characters and truncates long text
/// on a word boundary.
pub fn preprocess_text_for_embedding(text: &str) -> Result<String, CohortMatchError> {
    let sanitized = sanitize_text(&normalize_whitespace(text));

    if sanitized.trim().is_empty() {
        return Err(CohortMatchError::EmbeddingError(
            "Text contains only whitespace after preprocessing".to_string(),
        ));
    }

    if sanitized.chars().count() > MAX_EMBEDDING_CHARS {
        warn!(
            "Text too long ({} chars), truncating to {}",
            sanitized.chars().count(),
            MAX_EMBEDDING_CHARS
        );
        return Ok(smart_truncate_text(&sanitized, MAX_EMBEDDING_CHARS));
    }

    debug!("Preprocessed text: {} -> {} chars", text.len(), sanitized.len());
    Ok(sanitized)
}

/// Normalize whitespace and newlines
fn normalize_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<&str>>().join(" ")
}

/// Replace control characters with spaces and collapse the result
fn sanitize_text(text: &str) -> String {
    text.chars()
        .map(|c| if c.is_control() { ' ' } else { c })
        .collect::<String>()
        .split_whitespace()
        .collect::<Vec<&str>>()
        .join(" ")
}

/// Truncate to `max_chars` characters, preferring the last word boundary
fn smart_truncate_text(text: &str, max_chars: usize) -> String {
    let truncated: String = text.chars().take(max_chars).collect();
    if let Some(last_space) = truncated.rfind(' ') {
        if last_space > truncated.len() * 3 / 4 {
            return truncated[..last_space].to_string();
        }
    }
    truncated
}

/// Weighted summary of one candidate record
pub fn candidate_summary(record: &CandidateRecord) -> String {
    let p = record.profile();
    let mut parts: Vec<String> = Vec::new();

    parts.push(format!("{} ({})", record.display_name(), record.category()));
    if let Some(title) = record.title() {
        parts.push(title);
    }
    if !p.bio.trim().is_empty() {
        parts.push(p.bio.trim().to_string());
    }
    if !record.specialties().is_empty() {
        parts.push(format!("Specialties: {}", record.specialties().join(", ")));
    }
    if !p.interest_keywords.is_empty() {
        // Keywords twice: they are the most reliable topical signal on a record
        let keywords = p.interest_keywords.join(", ");
        parts.push(format!("Interests: {keywords}"));
        parts.push(keywords);
    }
    if !p.persona_descriptors.is_empty() {
        parts.push(format!("Personality: {}", p.persona_descriptors.join(", ")));
    }
    if !p.highlights.is_empty() {
        parts.push(format!("Highlights: {}", p.highlights.join("; ")));
    }
    if !p.awards.is_empty() {
        parts.push(format!("Awards: {}", p.awards.join("; ")));
    }

    parts.join(". ")
}

/// Profile-side embedding input
pub fn profile_query_text(profile: &MatchingProfile) -> String {
    let mut parts: Vec<String> = Vec::new();

    let description = profile.description_text.trim();
    if !description.is_empty() {
        for _ in 0..DESCRIPTION_WEIGHT {
            parts.push(description.to_string());
        }
    }
    if !profile.traits.is_empty() {
        parts.push(format!("Personality: {}", profile.traits.join(", ")));
    }
    if !profile.primary_interests.is_empty() {
        parts.push(format!(
            "Interests: {}",
            profile
                .primary_interests
                .iter()
                .cloned()
                .collect::<Vec<_>>()
                .join(", ")
        ));
    }
    if !profile.family_values.is_empty() {
        parts.push(format!(
            "Values: {}",
            profile
                .family_values
                .iter()
                .cloned()
                .collect::<Vec<_>>()
                .join(", ")
        ));
    }
    parts.push(format!("Grade: {}", profile.grade_band));

    parts.join(". ")
}
