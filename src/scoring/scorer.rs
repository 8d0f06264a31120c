//! Rule-based ranking that never touches the network
//!
//! Current members and alumni share one scoring function; staff start from a
//! higher base and also match on their specialties. Ranking is stable, so an
//! equal score keeps corpus order.

use std::collections::BTreeSet;
use std::collections::HashSet;
use std::sync::Arc;

use crate::corpus::CandidateRecord;
use crate::corpus::Corpus;
use crate::embeddings::Shortlist;
use crate::models::Category;
use crate::models::GradeBand;
use crate::models::GradeScope;
use crate::models::MatchingProfile;
use crate::models::ScoreBreakdown;
use crate::models::ScoredCandidate;
use crate::models::SelectionResult;
use crate::models::StrategyUsed;
use crate::scoring::ScoringWeights;
use crate::vocabulary::fold_separators;
use crate::vocabulary::terms_overlap;
use crate::vocabulary::MatchVocabulary;

/// One chosen candidate together with its record
#[derive(Debug, Clone)]
pub struct RankedPick<'a> {
    pub record: &'a CandidateRecord,
    pub scored: ScoredCandidate,
}

/// Deterministic picks for one request
#[derive(Debug, Clone)]
pub struct Ranking<'a> {
    pub current_member: RankedPick<'a>,
    pub staff: RankedPick<'a>,
    pub alumni: Option<RankedPick<'a>>,
    pub match_score: u8,
}

/// Profile fields folded once per request
struct ProfileTerms<'p> {
    interests: Vec<String>,
    primary_interests: &'p BTreeSet<String>,
    values: Vec<String>,
    traits: Vec<String>,
    description: String,
}

impl<'p> ProfileTerms<'p> {
    fn new(profile: &'p MatchingProfile) -> Self {
        Self {
            interests: profile.interests.iter().map(|i| fold_separators(i)).collect(),
            primary_interests: &profile.primary_interests,
            values: profile.family_values.iter().map(|v| fold_separators(v)).collect(),
            traits: profile.traits.iter().map(|t| fold_separators(t)).collect(),
            description: profile.description_text.to_lowercase(),
        }
    }
}

/// Folded keyword fields of one candidate
struct CandidateTerms {
    keywords: Vec<String>,
    persona: Vec<String>,
}

impl CandidateTerms {
    fn new(record: &CandidateRecord) -> Self {
        let profile = record.profile();
        let mut seen = HashSet::new();
        let keywords = profile
            .interest_keywords
            .iter()
            .chain(record.specialties())
            .map(|k| fold_separators(k))
            .filter(|k| !k.is_empty() && seen.insert(k.clone()))
            .collect();
        let persona = profile
            .persona_descriptors
            .iter()
            .map(|p| fold_separators(p))
            .filter(|p| !p.is_empty())
            .collect();
        Self { keywords, persona }
    }

    fn all(&self) -> impl Iterator<Item = &String> {
        self.keywords.iter().chain(&self.persona)
    }
}

pub struct DeterministicScorer {
    vocab: Arc<MatchVocabulary>,
    weights: ScoringWeights,
}

impl DeterministicScorer {
    pub fn new(vocab: Arc<MatchVocabulary>, weights: ScoringWeights) -> Self {
        Self { vocab, weights }
    }

    /// Score one candidate against the profile
    pub fn score(&self, profile: &MatchingProfile, record: &CandidateRecord) -> ScoredCandidate {
        self.score_with(&ProfileTerms::new(profile), profile.grade_band, record)
    }

    fn score_with(
        &self,
        terms: &ProfileTerms<'_>,
        band: GradeBand,
        record: &CandidateRecord,
    ) -> ScoredCandidate {
        let w = &self.weights;
        let candidate = CandidateTerms::new(record);

        let base = match record.category() {
            Category::Staff => w.staff_base,
            Category::CurrentMember | Category::Alumni => w.member_base,
        };

        let interest_hits = candidate
            .keywords
            .iter()
            .filter(|k| terms.interests.iter().any(|i| terms_overlap(k, i)))
            .count();

        let value_hits = terms
            .values
            .iter()
            .filter(|v| candidate.all().any(|c| terms_overlap(c, v)))
            .count();

        let persona_hits = candidate
            .persona
            .iter()
            .filter(|p| terms.traits.iter().any(|t| terms_overlap(p, t)))
            .count();

        let coverage_hits = terms
            .primary_interests
            .iter()
            .filter(|interest| {
                self.vocab.coverage_groups_for(interest).any(|group| {
                    group
                        .terms
                        .iter()
                        .any(|term| candidate.all().any(|c| c.contains(term.as_str())))
                })
            })
            .count();

        let free_text_hits = if terms.description.is_empty() {
            0
        } else {
            candidate
                .all()
                .filter(|c| c.chars().count() >= 3 && terms.description.contains(c.as_str()))
                .count()
        };

        let breakdown = ScoreBreakdown {
            base,
            grade: self.grade_alignment(band, record.profile().grade_relevance),
            interests: capped(interest_hits, w.interest_cap, w.interest_match),
            values: capped(value_hits, w.value_cap, w.value_match),
            persona: capped(persona_hits, w.persona_cap, w.persona_match),
            coverage: capped(coverage_hits, w.coverage_cap, w.coverage),
            free_text: capped(free_text_hits, w.free_text_cap, w.free_text),
            media: if record.has_video() { w.media } else { 0.0 },
            narrative: if record.has_narrative() {
                w.narrative
            } else {
                0.0
            },
        };

        ScoredCandidate {
            candidate_id: record.id().to_string(),
            category: record.category(),
            score: breakdown.total(),
            breakdown,
        }
    }

    fn grade_alignment(&self, band: GradeBand, relevance: Option<GradeScope>) -> f32 {
        let w = &self.weights;
        match relevance {
            None => w.grade_unknown,
            Some(GradeScope::All) => w.grade_all,
            Some(scope) => match scope.band() {
                Some(b) if b == band => w.grade_exact,
                Some(b) if b.is_adjacent(band) => w.grade_adjacent,
                Some(_) => w.grade_mismatch,
                None => w.grade_all,
            },
        }
    }

    /// Score and sort best first; equal scores keep input order
    pub fn rank<'a>(
        &self,
        profile: &MatchingProfile,
        records: impl IntoIterator<Item = &'a CandidateRecord>,
    ) -> Vec<RankedPick<'a>> {
        let terms = ProfileTerms::new(profile);
        let mut ranked: Vec<RankedPick<'a>> = records
            .into_iter()
            .map(|record| RankedPick {
                record,
                scored: self.score_with(&terms, profile.grade_band, record),
            })
            .collect();
        ranked.sort_by(|a, b| b.scored.score.total_cmp(&a.scored.score));
        ranked
    }

    /// Whether the profile shows the athletics or health-career signal that
    /// makes an alumni introduction worthwhile
    pub fn alumni_gate_open(&self, profile: &MatchingProfile) -> bool {
        let mut signal = String::new();
        for part in profile
            .primary_interests
            .iter()
            .chain(&profile.interests)
            .chain(&profile.traits)
            .chain(&profile.family_values)
        {
            signal.push_str(part);
            signal.push(' ');
        }
        signal.push_str(&profile.description_text);

        self.vocab.signals_athletics(&signal) || self.vocab.signals_medical(&signal)
    }

    /// Alumni a request may be offered: none when gated out, otherwise only
    /// those with a recognized video
    pub fn eligible_alumni<'a>(
        &self,
        profile: &MatchingProfile,
        pool: impl IntoIterator<Item = &'a CandidateRecord>,
    ) -> Vec<&'a CandidateRecord> {
        if !self.alumni_gate_open(profile) {
            return Vec::new();
        }
        pool.into_iter().filter(|r| r.has_video()).collect()
    }

    /// Pick the deterministic answer over the whole corpus or a shortlist
    ///
    /// A category whose shortlist is empty falls back to the full corpus
    /// category, and an empty ranking falls back to the first corpus record.
    pub fn select<'a>(
        &self,
        profile: &MatchingProfile,
        corpus: &'a Corpus,
        shortlist: Option<&Shortlist>,
    ) -> Ranking<'a> {
        let current_member = self
            .rank(profile, pool(corpus, shortlist, Category::CurrentMember))
            .into_iter()
            .next()
            .unwrap_or_else(|| self.anchor(profile, corpus.first_current_member()));

        let staff = self
            .rank(profile, pool(corpus, shortlist, Category::Staff))
            .into_iter()
            .next()
            .unwrap_or_else(|| self.anchor(profile, corpus.first_staff()));

        let eligible = self.eligible_alumni(profile, pool(corpus, shortlist, Category::Alumni));
        let alumni = self
            .rank(profile, eligible)
            .into_iter()
            .find(|pick| pick.scored.score > 0.0);

        let match_score = self.composite_score(
            &current_member.scored,
            &staff.scored,
            alumni.as_ref().map(|a| &a.scored),
        );

        Ranking {
            current_member,
            staff,
            alumni,
            match_score,
        }
    }

    fn anchor<'a>(&self, profile: &MatchingProfile, record: &'a CandidateRecord) -> RankedPick<'a> {
        RankedPick {
            record,
            scored: self.score(profile, record),
        }
    }

    /// Base plus scaled, capped bonuses, clamped to the configured range
    pub fn composite_score(
        &self,
        member: &ScoredCandidate,
        staff: &ScoredCandidate,
        alumni: Option<&ScoredCandidate>,
    ) -> u8 {
        let w = &self.weights;
        let bonus = |score: f32, base: f32, cap: f32| ((score - base).max(0.0) * w.composite_scale).min(cap);

        let mut total = w.composite_base
            + bonus(member.score, w.member_base, w.composite_member_cap)
            + bonus(staff.score, w.staff_base, w.composite_staff_cap);
        if let Some(alumni) = alumni {
            total += bonus(alumni.score, w.member_base, w.composite_alumni_cap);
        }

        // max-then-min never panics, even on an inverted range
        total.max(w.composite_min).min(w.composite_max).clamp(0.0, 100.0).round() as u8
    }

    /// Division label first, then one label per interest category touched
    pub fn program_labels(&self, profile: &MatchingProfile) -> Vec<String> {
        let mut labels = vec![self.vocab.division_label(profile.grade_band).to_string()];
        for category in self.vocab.interest_categories() {
            let touched = profile
                .primary_interests
                .iter()
                .chain(&profile.interests)
                .any(|interest| {
                    terms_overlap(interest, &category.name)
                        || category.synonyms.iter().any(|s| terms_overlap(interest, s))
                });
            if touched && !labels.contains(&category.program_label) {
                labels.push(category.program_label.clone());
            }
        }
        labels
    }

    /// Deterministic answer as a complete result
    pub fn to_result(
        &self,
        ranking: &Ranking<'_>,
        profile: &MatchingProfile,
        strategy_used: StrategyUsed,
    ) -> SelectionResult {
        SelectionResult {
            selected_current_member: ranking.current_member.record.to_selected(),
            selected_staff: ranking.staff.record.to_selected(),
            selected_alumni: ranking.alumni.as_ref().map(|a| a.record.to_selected()),
            match_score: ranking.match_score,
            message: compose_message(
                self.vocab.division_label(profile.grade_band),
                ranking.current_member.record,
                ranking.staff.record,
                ranking.alumni.as_ref().map(|a| a.record),
            ),
            reasoning: compose_reasoning(ranking),
            strategy_used,
            program_labels: self.program_labels(profile),
            fallback_used: false,
            from_cache: false,
        }
    }
}

fn pool<'a>(
    corpus: &'a Corpus,
    shortlist: Option<&Shortlist>,
    category: Category,
) -> impl Iterator<Item = &'a CandidateRecord> + 'a {
    let allowed: Option<HashSet<String>> = shortlist
        .map(|s| s.category(category))
        .filter(|entries| !entries.is_empty())
        .map(|entries| entries.iter().map(|e| e.candidate_id.clone()).collect());

    corpus
        .category(category)
        .iter()
        .filter(move |r| allowed.as_ref().map_or(true, |ids| ids.contains(r.id())))
}

fn capped(hits: usize, cap: usize, weight: f32) -> f32 {
    hits.min(cap) as f32 * weight
}

/// Human-readable introduction naming everyone selected
pub fn compose_message(
    division: &str,
    member: &CandidateRecord,
    staff: &CandidateRecord,
    alumni: Option<&CandidateRecord>,
) -> String {
    let staff_intro = match staff.title() {
        Some(title) => format!("{} ({title})", staff.display_name()),
        None => staff.display_name(),
    };
    let mut message = format!(
        "Based on what you shared, we think your family will connect with {staff_intro} and with {}, one of our current students. Both can speak to life in our {division}.",
        member.display_name()
    );
    if let Some(alumni) = alumni {
        message.push_str(&format!(
            " You may also enjoy hearing from {}, a graduate whose path reflects similar interests.",
            alumni.display_name()
        ));
    }
    message
}

/// Largest named sub-scores per pick, e.g. "Sam Lee: persona 8, free text 6"
pub fn compose_reasoning(ranking: &Ranking<'_>) -> String {
    let mut lines = vec![
        describe_pick(&ranking.staff),
        describe_pick(&ranking.current_member),
    ];
    if let Some(alumni) = &ranking.alumni {
        lines.push(describe_pick(alumni));
    }
    lines.join("; ")
}

fn describe_pick(pick: &RankedPick<'_>) -> String {
    let b = &pick.scored.breakdown;
    let mut factors = [
        ("grade", b.grade),
        ("interests", b.interests),
        ("values", b.values),
        ("persona", b.persona),
        ("coverage", b.coverage),
        ("free text", b.free_text),
        ("media", b.media),
        ("narrative", b.narrative),
    ];
    factors.sort_by(|a, b| b.1.total_cmp(&a.1));

    let top: Vec<String> = factors
        .iter()
        .filter(|(_, v)| *v > 0.0)
        .take(3)
        .map(|(name, v)| format!("{name} {v:.0}"))
        .collect();

    if top.is_empty() {
        format!("{}: default pick", pick.record.display_name())
    } else {
        format!("{}: {}", pick.record.display_name(), top.join(", "))
    }
}
