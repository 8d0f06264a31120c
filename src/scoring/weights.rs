use serde::Deserialize;
use serde::Serialize;

/// Tunable point values for the deterministic scorer (`[scoring]` table)
///
/// Defaults keep media > interest match > value match > persona match.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScoringWeights {
    pub staff_base: f32,
    pub member_base: f32,

    pub grade_exact: f32,
    pub grade_adjacent: f32,
    pub grade_all: f32,
    pub grade_unknown: f32,
    pub grade_mismatch: f32,

    pub interest_match: f32,
    pub interest_cap: usize,
    pub value_match: f32,
    pub value_cap: usize,
    pub persona_match: f32,
    pub persona_cap: usize,

    pub coverage: f32,
    pub coverage_cap: usize,
    pub free_text: f32,
    pub free_text_cap: usize,

    pub media: f32,
    pub narrative: f32,

    /// Composite score before bonuses
    pub composite_base: f32,
    pub composite_scale: f32,
    pub composite_member_cap: f32,
    pub composite_staff_cap: f32,
    pub composite_alumni_cap: f32,
    pub composite_min: f32,
    pub composite_max: f32,
}

impl Default for ScoringWeights {
    fn default() -> Self {
        Self {
            staff_base: 50.0,
            member_base: 40.0,
            grade_exact: 12.0,
            grade_adjacent: 7.0,
            grade_all: 5.0,
            grade_unknown: 3.0,
            grade_mismatch: 1.0,
            interest_match: 6.0,
            interest_cap: 4,
            value_match: 5.0,
            value_cap: 3,
            persona_match: 4.0,
            persona_cap: 2,
            coverage: 3.0,
            coverage_cap: 3,
            free_text: 2.0,
            free_text_cap: 3,
            media: 15.0,
            narrative: 4.0,
            composite_base: 82.0,
            composite_scale: 0.15,
            composite_member_cap: 6.0,
            composite_staff_cap: 6.0,
            composite_alumni_cap: 3.0,
            composite_min: 78.0,
            composite_max: 96.0,
        }
    }
}

impl ScoringWeights {
    /// Whether the configured values keep the documented precedence
    pub fn preserves_precedence(&self) -> bool {
        self.media > self.interest_match
            && self.interest_match > self.value_match
            && self.value_match > self.persona_match
            && self.staff_base > self.member_base
            && self.grade_exact > self.grade_adjacent
            && self.grade_adjacent > self.grade_all
            && self.grade_all > self.grade_unknown
            && self.grade_mismatch > 0.0
            && self.composite_min <= self.composite_max
    }
}
