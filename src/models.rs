//! Core data types shared by every matching stage

use std::collections::BTreeSet;
use std::fmt;

use serde::Deserialize;
use serde::Serialize;
use serde_json::Map;
use serde_json::Value;

/// One of the four coarse developmental stages used to weight relevance
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GradeBand {
    Lower,
    Intermediate,
    Middle,
    Upper,
}

impl GradeBand {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Lower => "lower",
            Self::Intermediate => "intermediate",
            Self::Middle => "middle",
            Self::Upper => "upper",
        }
    }

    fn ordinal(self) -> i8 {
        match self {
            Self::Lower => 0,
            Self::Intermediate => 1,
            Self::Middle => 2,
            Self::Upper => 3,
        }
    }

    /// lower↔intermediate, intermediate↔middle, middle↔upper
    pub fn is_adjacent(self, other: GradeBand) -> bool {
        (self.ordinal() - other.ordinal()).abs() == 1
    }
}

impl fmt::Display for GradeBand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Grade relevance declared on a corpus record
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GradeScope {
    Lower,
    Intermediate,
    Middle,
    Upper,
    All,
}

impl GradeScope {
    pub fn band(self) -> Option<GradeBand> {
        match self {
            Self::Lower => Some(GradeBand::Lower),
            Self::Intermediate => Some(GradeBand::Intermediate),
            Self::Middle => Some(GradeBand::Middle),
            Self::Upper => Some(GradeBand::Upper),
            Self::All => None,
        }
    }
}

/// Corpus category of a candidate record
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Category {
    CurrentMember,
    Alumni,
    Staff,
}

impl Category {
    pub const ALL: [Category; 3] = [Category::CurrentMember, Category::Alumni, Category::Staff];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::CurrentMember => "current_member",
            Self::Alumni => "alumni",
            Self::Staff => "staff",
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Structured matching profile produced by the normalizer
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MatchingProfile {
    pub grade_band: GradeBand,
    /// Ordered, deduplicated trait tokens (at most 7)
    pub traits: Vec<String>,
    /// Interests after category expansion
    pub interests: BTreeSet<String>,
    /// Interests exactly as the family entered them (lower-cased)
    pub primary_interests: BTreeSet<String>,
    pub family_values: BTreeSet<String>,
    pub description_text: String,
}

impl MatchingProfile {
    /// Profile with no signal at all, used when every intake field is missing
    pub fn empty(grade_band: GradeBand) -> Self {
        Self {
            grade_band,
            traits: Vec::new(),
            interests: BTreeSet::new(),
            primary_interests: BTreeSet::new(),
            family_values: BTreeSet::new(),
            description_text: String::new(),
        }
    }
}

/// Raw intake payload as submitted by the questionnaire
///
/// Every field is a loose JSON value so that a malformed submission still
/// deserializes; the normalizer decides what each shape means. Fields are
/// read one at a time, so one bad or duplicated key never costs the others.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(from = "Value")]
pub struct RawProfileInput {
    pub grade: Option<Value>,
    pub description: Option<Value>,
    pub secondary_description: Option<Value>,
    pub interests: Option<Value>,
    pub family_values: Option<Value>,
    /// Never part of any match computation
    pub session_id: Option<Value>,
    pub request_id: Option<Value>,
}

/// Accepted keys per field, highest precedence first
const GRADE_KEYS: &[&str] = &["grade", "gradeLevel", "grade_level"];
const DESCRIPTION_KEYS: &[&str] = &["description", "childDescription", "child_description"];
const SECONDARY_KEYS: &[&str] = &[
    "secondary_description",
    "secondaryDescription",
    "additional_description",
];
const INTEREST_KEYS: &[&str] = &["interests"];
const VALUE_KEYS: &[&str] = &["family_values", "familyValues", "values"];
const SESSION_KEYS: &[&str] = &["session_id", "sessionId"];
const REQUEST_KEYS: &[&str] = &["request_id", "requestId"];

fn pick(map: &Map<String, Value>, keys: &[&str]) -> Option<Value> {
    keys.iter()
        .filter_map(|key| map.get(*key))
        .find(|value| !value.is_null())
        .cloned()
}

impl RawProfileInput {
    /// Interpret any JSON value as an intake payload; non-objects become empty input
    pub fn from_value(value: Value) -> Self {
        let Value::Object(map) = value else {
            return Self::default();
        };

        Self {
            grade: pick(&map, GRADE_KEYS),
            description: pick(&map, DESCRIPTION_KEYS),
            secondary_description: pick(&map, SECONDARY_KEYS),
            interests: pick(&map, INTEREST_KEYS),
            family_values: pick(&map, VALUE_KEYS),
            session_id: pick(&map, SESSION_KEYS),
            request_id: pick(&map, REQUEST_KEYS),
        }
    }
}

impl From<Value> for RawProfileInput {
    fn from(value: Value) -> Self {
        Self::from_value(value)
    }
}

/// Stage combination the orchestrator may run for one request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Strategy {
    Deterministic,
    SemanticDeterministic,
    SemanticGenerative,
}

impl fmt::Display for Strategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(StrategyUsed::from(*self).as_str())
    }
}

/// Strategy recorded on a result; `Fallback` marks a degraded answer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StrategyUsed {
    Deterministic,
    SemanticDeterministic,
    SemanticGenerative,
    Fallback,
}

impl StrategyUsed {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Deterministic => "deterministic",
            Self::SemanticDeterministic => "semantic_deterministic",
            Self::SemanticGenerative => "semantic_generative",
            Self::Fallback => "fallback",
        }
    }
}

impl From<Strategy> for StrategyUsed {
    fn from(strategy: Strategy) -> Self {
        match strategy {
            Strategy::Deterministic => Self::Deterministic,
            Strategy::SemanticDeterministic => Self::SemanticDeterministic,
            Strategy::SemanticGenerative => Self::SemanticGenerative,
        }
    }
}

/// Named sub-scores behind a candidate's total
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ScoreBreakdown {
    pub base: f32,
    pub grade: f32,
    pub interests: f32,
    pub values: f32,
    pub persona: f32,
    pub coverage: f32,
    pub free_text: f32,
    pub media: f32,
    pub narrative: f32,
}

impl ScoreBreakdown {
    pub fn total(&self) -> f32 {
        self.base
            + self.grade
            + self.interests
            + self.values
            + self.persona
            + self.coverage
            + self.free_text
            + self.media
            + self.narrative
    }

    /// Everything except the fixed base and grade alignment
    pub fn keyword_signal(&self) -> f32 {
        self.interests + self.values + self.persona + self.coverage + self.free_text
    }
}

/// Ephemeral per-request ranking entry
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoredCandidate {
    pub candidate_id: String,
    pub category: Category,
    pub score: f32,
    pub breakdown: ScoreBreakdown,
}

/// Candidate as presented in a selection result
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SelectedCandidate {
    pub id: String,
    pub category: Category,
    pub name: String,
    pub title: Option<String>,
    pub bio: String,
    pub video_url: Option<String>,
    pub highlights: Vec<String>,
}

/// Final answer of the pipeline, also the cached payload
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SelectionResult {
    pub selected_current_member: SelectedCandidate,
    pub selected_staff: SelectedCandidate,
    pub selected_alumni: Option<SelectedCandidate>,
    pub match_score: u8,
    pub message: String,
    pub reasoning: String,
    pub strategy_used: StrategyUsed,
    pub program_labels: Vec<String>,
    #[serde(default)]
    pub fallback_used: bool,
    #[serde(default)]
    pub from_cache: bool,
}

/// Per-category shortlist sizes for semantic retrieval
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CategoryLimits {
    pub current_members: usize,
    pub alumni: usize,
    pub staff: usize,
}

impl CategoryLimits {
    pub fn for_category(&self, category: Category) -> usize {
        match category {
            Category::CurrentMember => self.current_members,
            Category::Alumni => self.alumni,
            Category::Staff => self.staff,
        }
    }
}

/// Per-request overrides accepted by `match`
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MatchOptions {
    #[serde(default)]
    pub strategy: Option<Strategy>,
    #[serde(default)]
    pub top_k: Option<CategoryLimits>,
    #[serde(default)]
    pub min_similarity: Option<f32>,
}

impl MatchOptions {
    /// Shortlist overrides change the answer for the same profile, so such
    /// requests neither read nor write the result cache
    pub fn overrides_shortlist(&self) -> bool {
        self.top_k.is_some() || self.min_similarity.is_some()
    }
}
