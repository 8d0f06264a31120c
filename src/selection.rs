//! Generative selection over a semantic shortlist
//!
//! The model sees every offered candidate and must answer with one JSON
//! object naming ids it was actually offered. Nothing beyond stripping a
//! single markdown fence is repaired; anything else is a rejected answer and
//! the provider chain moves on.

use std::collections::HashMap;
use std::collections::HashSet;

use serde::Deserialize;
use tracing::debug;

use crate::corpus::CandidateRecord;
use crate::corpus::Corpus;
use crate::embeddings::Shortlist;
use crate::errors::CohortMatchError;
use crate::errors::Result;
use crate::llm::ProviderChain;
use crate::llm::SelectionPrompts;
use crate::models::Category;
use crate::models::MatchingProfile;

/// Generative scores are clamped into this range
pub const GENERATIVE_SCORE_MIN: u8 = 85;
pub const GENERATIVE_SCORE_MAX: u8 = 100;

const BIO_PREVIEW_CHARS: usize = 280;

/// A candidate shown to the model, with its retrieval similarity
#[derive(Debug, Clone)]
pub struct OfferedCandidate<'a> {
    pub record: &'a CandidateRecord,
    pub similarity: Option<f32>,
}

/// Candidates offered per category
#[derive(Debug, Clone, Default)]
pub struct OfferedCandidates<'a> {
    pub current_members: Vec<OfferedCandidate<'a>>,
    pub staff: Vec<OfferedCandidate<'a>>,
    pub alumni: Vec<OfferedCandidate<'a>>,
}

impl<'a> OfferedCandidates<'a> {
    /// Shortlisted records per category; an empty member or staff shortlist
    /// offers that whole corpus category instead. Alumni are offered only if
    /// `alumni_allowed` accepts them.
    pub fn from_shortlist(
        corpus: &'a Corpus,
        shortlist: &Shortlist,
        alumni_allowed: impl Fn(&CandidateRecord) -> bool,
    ) -> Self {
        let pick = |category: Category| -> Vec<OfferedCandidate<'a>> {
            let entries = shortlist.category(category);
            if entries.is_empty() {
                return corpus
                    .category(category)
                    .iter()
                    .map(|record| OfferedCandidate {
                        record,
                        similarity: None,
                    })
                    .collect();
            }
            entries
                .iter()
                .filter_map(|entry| {
                    corpus
                        .get(category, &entry.candidate_id)
                        .map(|record| OfferedCandidate {
                            record,
                            similarity: Some(entry.similarity),
                        })
                })
                .collect()
        };

        let current_members = pick(Category::CurrentMember);
        let staff = pick(Category::Staff);
        let alumni = shortlist
            .category(Category::Alumni)
            .iter()
            .filter_map(|entry| {
                corpus
                    .get(Category::Alumni, &entry.candidate_id)
                    .map(|record| OfferedCandidate {
                        record,
                        similarity: Some(entry.similarity),
                    })
            })
            .filter(|offered| alumni_allowed(offered.record))
            .collect();

        Self {
            current_members,
            staff,
            alumni,
        }
    }

    fn category(&self, category: Category) -> &[OfferedCandidate<'a>] {
        match category {
            Category::CurrentMember => &self.current_members,
            Category::Alumni => &self.alumni,
            Category::Staff => &self.staff,
        }
    }

    fn ids(&self, category: Category) -> HashSet<&str> {
        self.category(category).iter().map(|o| o.record.id()).collect()
    }

    pub fn record(&self, category: Category, id: &str) -> Option<&'a CandidateRecord> {
        self.category(category)
            .iter()
            .find(|o| o.record.id() == id)
            .map(|o| o.record)
    }
}

/// Validated model answer
#[derive(Debug, Clone, PartialEq)]
pub struct GenerativePick {
    pub current_member_id: String,
    pub staff_id: String,
    pub alumni_id: Option<String>,
    pub match_score: u8,
    pub reasoning: String,
    pub message: Option<String>,
    pub provider: String,
}

#[derive(Debug, Deserialize)]
struct RawSelection {
    current_member_id: String,
    staff_id: String,
    #[serde(default)]
    alumni_id: Option<String>,
    match_score: f64,
    reasoning: String,
    #[serde(default)]
    message: Option<String>,
}

/// Remove one surrounding markdown code fence, if present
fn strip_code_fence(raw: &str) -> &str {
    let trimmed = raw.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    let Some(body) = rest.strip_suffix("```") else {
        return trimmed;
    };
    // drop the language tag line (```json)
    match body.find('\n') {
        Some(newline) => body[newline + 1..].trim(),
        None => body.trim(),
    }
}

/// Parse and validate raw model output against the offered ids
pub fn parse_selection(raw: &str, offered: &OfferedCandidates<'_>) -> Result<GenerativePick> {
    let body = strip_code_fence(raw);
    let parsed: RawSelection = serde_json::from_str(body)
        .map_err(|e| CohortMatchError::InvalidSelection(format!("not a selection object: {e}")))?;

    if !offered.ids(Category::CurrentMember).contains(parsed.current_member_id.as_str()) {
        return Err(CohortMatchError::InvalidSelection(format!(
            "current member {} was not offered",
            parsed.current_member_id
        )));
    }
    if !offered.ids(Category::Staff).contains(parsed.staff_id.as_str()) {
        return Err(CohortMatchError::InvalidSelection(format!(
            "staff {} was not offered",
            parsed.staff_id
        )));
    }

    let alumni_id = parsed.alumni_id.filter(|id| !id.trim().is_empty());
    if let Some(id) = &alumni_id {
        if !offered.ids(Category::Alumni).contains(id.as_str()) {
            return Err(CohortMatchError::InvalidSelection(format!(
                "alumnus {id} was not offered"
            )));
        }
    }

    if !parsed.match_score.is_finite() {
        return Err(CohortMatchError::InvalidSelection(
            "match_score is not a number".to_string(),
        ));
    }
    if parsed.reasoning.trim().is_empty() {
        return Err(CohortMatchError::InvalidSelection(
            "reasoning is empty".to_string(),
        ));
    }

    let match_score = parsed
        .match_score
        .round()
        .clamp(f64::from(GENERATIVE_SCORE_MIN), f64::from(GENERATIVE_SCORE_MAX)) as u8;

    Ok(GenerativePick {
        current_member_id: parsed.current_member_id,
        staff_id: parsed.staff_id,
        alumni_id,
        match_score,
        reasoning: parsed.reasoning.trim().to_string(),
        message: parsed
            .message
            .map(|m| m.trim().to_string())
            .filter(|m| !m.is_empty()),
        provider: String::new(),
    })
}

fn describe_candidate(offered: &OfferedCandidate<'_>) -> String {
    let record = offered.record;
    let p = record.profile();
    let mut fields = vec![
        format!("id: {}", record.id()),
        format!("name: {}", record.display_name()),
    ];
    if let Some(title) = record.title() {
        fields.push(format!("role: {title}"));
    }
    if !record.specialties().is_empty() {
        fields.push(format!("specialties: {}", record.specialties().join(", ")));
    }
    if !p.interest_keywords.is_empty() {
        fields.push(format!("interests: {}", p.interest_keywords.join(", ")));
    }
    if !p.persona_descriptors.is_empty() {
        fields.push(format!("personality: {}", p.persona_descriptors.join(", ")));
    }
    fields.push(format!(
        "video: {}",
        if record.has_video() { "yes" } else { "no" }
    ));
    if let Some(similarity) = offered.similarity {
        fields.push(format!("similarity: {similarity:.2}"));
    }
    let bio: String = p.bio.chars().take(BIO_PREVIEW_CHARS).collect();
    if !bio.trim().is_empty() {
        fields.push(format!("bio: {}", bio.trim()));
    }
    format!("- {}", fields.join(" | "))
}

fn describe_list(candidates: &[OfferedCandidate<'_>]) -> String {
    if candidates.is_empty() {
        return "(none offered; use null for alumni_id)".to_string();
    }
    candidates
        .iter()
        .map(describe_candidate)
        .collect::<Vec<_>>()
        .join("\n")
}

fn join_or_none<'s>(items: impl Iterator<Item = &'s String>) -> String {
    let joined = items.map(String::as_str).collect::<Vec<_>>().join(", ");
    if joined.is_empty() {
        "(none given)".to_string()
    } else {
        joined
    }
}

/// (system, user) prompt pair for one request
pub fn build_prompts(profile: &MatchingProfile, offered: &OfferedCandidates<'_>) -> (String, String) {
    let description = if profile.description_text.trim().is_empty() {
        "(none given)".to_string()
    } else {
        profile.description_text.trim().to_string()
    };
    let values: HashMap<&str, String> = HashMap::from([
        ("grade_band", profile.grade_band.to_string()),
        ("description", description),
        ("traits", join_or_none(profile.traits.iter())),
        ("interests", join_or_none(profile.primary_interests.iter())),
        ("values", join_or_none(profile.family_values.iter())),
        ("current_members", describe_list(&offered.current_members)),
        ("staff", describe_list(&offered.staff)),
        ("alumni", describe_list(&offered.alumni)),
    ]);

    (
        SelectionPrompts::system().render(&HashMap::new()),
        SelectionPrompts::user().render(&values),
    )
}

pub struct GenerativeSelector {
    chain: ProviderChain,
}

impl GenerativeSelector {
    pub fn new(chain: ProviderChain) -> Self {
        Self { chain }
    }

    pub fn is_available(&self) -> bool {
        !self.chain.is_empty()
    }

    pub fn provider_names(&self) -> Vec<String> {
        self.chain.provider_names()
    }

    /// Ask the provider chain for a validated pick
    pub async fn select(
        &self,
        profile: &MatchingProfile,
        offered: &OfferedCandidates<'_>,
    ) -> Result<GenerativePick> {
        if offered.current_members.is_empty() || offered.staff.is_empty() {
            return Err(CohortMatchError::InvalidSelection(
                "nothing to offer for a required category".to_string(),
            ));
        }

        let (system, user) = build_prompts(profile, offered);
        debug!(
            current_members = offered.current_members.len(),
            staff = offered.staff.len(),
            alumni = offered.alumni.len(),
            "Requesting generative selection"
        );

        let (mut pick, provider) = self
            .chain
            .generate_validated(&system, &user, |raw| parse_selection(raw, offered))
            .await?;
        pick.provider = provider;
        Ok(pick)
    }
}
