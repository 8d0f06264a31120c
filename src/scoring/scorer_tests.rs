//! Unit tests for the deterministic scorer

#[cfg(test)]
mod tests {
    use std::collections::BTreeSet;
    use std::sync::Arc;

    use serde_json::json;

    use crate::corpus::fixtures;
    use crate::corpus::CandidateRecord;
    use crate::corpus::Corpus;
    use crate::corpus::CorpusData;
    use crate::embeddings::Shortlist;
    use crate::embeddings::ShortlistEntry;
    use crate::models::GradeBand;
    use crate::models::GradeScope;
    use crate::models::MatchingProfile;
    use crate::models::RawProfileInput;
    use crate::models::StrategyUsed;
    use crate::profile::normalize;
    use crate::scoring::DeterministicScorer;
    use crate::scoring::ScoringWeights;
    use crate::vocabulary::MatchVocabulary;

    fn scorer() -> DeterministicScorer {
        DeterministicScorer::new(Arc::new(MatchVocabulary::default()), ScoringWeights::default())
    }

    fn profile_from(value: serde_json::Value) -> MatchingProfile {
        normalize(&RawProfileInput::from_value(value), &MatchVocabulary::default())
    }

    fn artistic_vs_athletic_corpus() -> Corpus {
        let mut artistic = fixtures::profile("s-art", "Iris");
        artistic.persona_descriptors = vec![
            "artistic".to_string(),
            "creative".to_string(),
            "imaginative".to_string(),
        ];
        artistic.interest_keywords = vec!["visual arts".to_string()];

        let mut athletic = fixtures::profile("s-ath", "Cole");
        athletic.interest_keywords = vec!["athletics".to_string()];

        Corpus::new(CorpusData {
            current_members: vec![fixtures::member(fixtures::profile("m1", "Maya"))],
            alumni: vec![],
            staff: vec![fixtures::staff(athletic), fixtures::staff(artistic)],
        })
        .unwrap()
    }

    #[test]
    fn test_persona_match_outranks_interest_only_match() {
        let corpus = artistic_vs_athletic_corpus();
        let profile = profile_from(json!({
            "grade": "upper",
            "description": "creative artistic imaginative",
            "interests": ["athletics"],
            "familyValues": ["academic_rigor"]
        }));

        let scorer = scorer();
        let ranked = scorer.rank(&profile, corpus.category(crate::models::Category::Staff));
        assert_eq!(ranked[0].record.id(), "s-art");

        let artistic = &ranked[0].scored.breakdown;
        let athletic = &ranked[1].scored.breakdown;
        assert_eq!(artistic.persona, 8.0);
        assert_eq!(artistic.free_text, 6.0);
        assert_eq!(athletic.interests, 6.0);
        assert_eq!(athletic.coverage, 3.0);
        assert!(artistic.keyword_signal() > athletic.keyword_signal());

        let ranking = scorer.select(&profile, &corpus, None);
        assert_eq!(ranking.staff.record.id(), "s-art");
    }

    #[test]
    fn test_empty_profile_still_selects_member_and_staff() {
        let corpus = Corpus::new(fixtures::minimal()).unwrap();
        let profile = profile_from(json!({ "grade": "middle" }));
        let scorer = scorer();
        let ranking = scorer.select(&profile, &corpus, None);

        assert_eq!(ranking.current_member.record.id(), "m1");
        assert_eq!(ranking.staff.record.id(), "s1");
        assert!(ranking.alumni.is_none());
        assert!((78..=96).contains(&ranking.match_score));

        let result = scorer.to_result(&ranking, &profile, StrategyUsed::Deterministic);
        assert_eq!(result.program_labels, vec!["Middle School".to_string()]);
        assert!(result.message.contains("Sam Tester"));
        assert!(!result.fallback_used);
    }

    #[test]
    fn test_ties_keep_corpus_order() {
        let corpus = Corpus::new(CorpusData {
            current_members: vec![
                fixtures::member(fixtures::profile("m-first", "Ana")),
                fixtures::member(fixtures::profile("m-second", "Bea")),
            ],
            alumni: vec![],
            staff: vec![fixtures::staff(fixtures::profile("s1", "Sam"))],
        })
        .unwrap();
        let profile = MatchingProfile::empty(GradeBand::Middle);
        let ranking = scorer().select(&profile, &corpus, None);
        assert_eq!(ranking.current_member.record.id(), "m-first");
    }

    #[test]
    fn test_grade_alignment_ordering() {
        let scorer = scorer();
        let profile = MatchingProfile::empty(GradeBand::Middle);
        let score_for = |scope: Option<GradeScope>| {
            let mut p = fixtures::profile("m", "Gia");
            p.grade_relevance = scope;
            scorer
                .score(&profile, &CandidateRecord::CurrentMember(fixtures::member(p)))
                .breakdown
                .grade
        };

        let exact = score_for(Some(GradeScope::Middle));
        let adjacent = score_for(Some(GradeScope::Upper));
        let all = score_for(Some(GradeScope::All));
        let unknown = score_for(None);
        let mismatch = score_for(Some(GradeScope::Lower));
        assert!(exact > adjacent && adjacent > all && all > unknown && unknown > mismatch);
        assert!(mismatch > 0.0);
    }

    #[test]
    fn test_media_bonus_beats_single_keyword() {
        let weights = ScoringWeights::default();
        assert!(weights.media > weights.interest_match);

        let scorer = scorer();
        let profile = profile_from(json!({ "interests": ["robotics"] }));
        let mut with_video = fixtures::profile("v", "Vic");
        with_video.video_url = Some("https://youtu.be/abc".to_string());
        let mut with_keyword = fixtures::profile("k", "Kai");
        with_keyword.interest_keywords = vec!["robotics".to_string()];

        let video = scorer.score(&profile, &CandidateRecord::CurrentMember(fixtures::member(with_video)));
        let keyword =
            scorer.score(&profile, &CandidateRecord::CurrentMember(fixtures::member(with_keyword)));
        assert!(video.score > keyword.score);
    }

    #[test]
    fn test_keyword_caps_apply() {
        let scorer = scorer();
        let profile = profile_from(json!({
            "interests": ["soccer", "basketball", "tennis", "golf", "rowing", "hockey"]
        }));
        let mut p = fixtures::profile("s", "Max");
        p.interest_keywords = ["soccer", "basketball", "tennis", "golf", "rowing", "hockey"]
            .iter()
            .map(|s| s.to_string())
            .collect();
        let scored = scorer.score(&profile, &CandidateRecord::Staff(fixtures::staff(p)));
        let w = ScoringWeights::default();
        assert_eq!(scored.breakdown.interests, w.interest_cap as f32 * w.interest_match);
        assert_eq!(scored.breakdown.coverage, w.coverage_cap as f32 * w.coverage);
    }

    #[test]
    fn test_values_match_with_separator_folding() {
        let scorer = scorer();
        let profile = profile_from(json!({ "values": ["community-service", "Academic_Rigor"] }));
        let mut p = fixtures::profile("s", "Dee");
        p.interest_keywords = vec!["community service".to_string()];
        let scored = scorer.score(&profile, &CandidateRecord::Staff(fixtures::staff(p)));
        assert_eq!(scored.breakdown.values, ScoringWeights::default().value_match);
    }

    fn alumni_corpus() -> Corpus {
        let mut with_video = fixtures::profile("a-video", "Vera");
        with_video.video_url = Some("https://www.youtube.com/shorts/xyz".to_string());
        with_video.interest_keywords = vec!["soccer".to_string()];
        let mut without_video = fixtures::profile("a-plain", "Paul");
        without_video.interest_keywords = vec!["soccer".to_string(), "basketball".to_string()];

        let mut data = fixtures::minimal();
        data.alumni = vec![fixtures::alumnus(without_video), fixtures::alumnus(with_video)];
        Corpus::new(data).unwrap()
    }

    #[test]
    fn test_alumni_gated_out_without_signal() {
        let corpus = alumni_corpus();
        let profile = profile_from(json!({ "interests": ["painting"], "description": "quiet reader" }));
        let ranking = scorer().select(&profile, &corpus, None);
        assert!(ranking.alumni.is_none());
    }

    #[test]
    fn test_alumni_gate_requires_video() {
        let corpus = alumni_corpus();
        let profile = profile_from(json!({ "interests": ["soccer", "basketball"] }));
        let scorer = scorer();
        assert!(scorer.alumni_gate_open(&profile));

        let ranking = scorer.select(&profile, &corpus, None);
        assert_eq!(ranking.alumni.as_ref().map(|a| a.record.id()), Some("a-video"));
    }

    #[test]
    fn test_medical_signal_opens_gate() {
        let profile = profile_from(json!({ "description": "She wants to become a doctor someday" }));
        assert!(scorer().alumni_gate_open(&profile));
    }

    #[test]
    fn test_shortlist_restricts_pool_and_empty_category_uses_corpus() {
        let corpus = Corpus::new(CorpusData {
            current_members: vec![
                fixtures::member(fixtures::profile("m1", "Ana")),
                fixtures::member(fixtures::profile("m2", "Bea")),
            ],
            alumni: vec![],
            staff: vec![
                fixtures::staff(fixtures::profile("s1", "Sam")),
                fixtures::staff(fixtures::profile("s2", "Sol")),
            ],
        })
        .unwrap();
        let shortlist = Shortlist {
            current_members: vec![ShortlistEntry {
                candidate_id: "m2".to_string(),
                similarity: 0.9,
            }],
            alumni: vec![],
            staff: vec![],
        };
        let profile = MatchingProfile::empty(GradeBand::Upper);
        let ranking = scorer().select(&profile, &corpus, Some(&shortlist));
        assert_eq!(ranking.current_member.record.id(), "m2");
        assert_eq!(ranking.staff.record.id(), "s1");
    }

    #[test]
    fn test_composite_score_is_clamped() {
        let scorer = scorer();
        let mut rich = fixtures::profile("m", "Rae");
        rich.video_url = Some("https://youtu.be/1".to_string());
        rich.highlights = vec!["State champion".to_string()];
        rich.interest_keywords = ["soccer", "tennis", "golf", "rowing", "hockey"]
            .iter()
            .map(|s| s.to_string())
            .collect();
        let profile = profile_from(json!({
            "interests": ["soccer", "tennis", "golf", "rowing", "hockey"],
            "description": "soccer tennis golf"
        }));
        let member = scorer.score(&profile, &CandidateRecord::CurrentMember(fixtures::member(rich.clone())));
        let staff = scorer.score(&profile, &CandidateRecord::Staff(fixtures::staff(rich)));
        let score = scorer.composite_score(&member, &staff, Some(&member));
        assert_eq!(score, 96);
    }

    #[test]
    fn test_inverted_composite_range_does_not_panic() {
        let weights: ScoringWeights =
            toml::from_str("composite_min = 90.0\ncomposite_max = 80.0").unwrap();
        let scorer = DeterministicScorer::new(Arc::new(MatchVocabulary::default()), weights);
        let profile = profile_from(json!({"grade": "upper"}));
        let record = CandidateRecord::CurrentMember(fixtures::member(fixtures::profile("m", "Rae")));
        let scored = scorer.score(&profile, &record);
        assert_eq!(scorer.composite_score(&scored, &scored, None), 80);
    }

    #[test]
    fn test_program_labels_follow_vocabulary_order() {
        let profile = profile_from(json!({
            "grade": "9th",
            "interests": ["robotics", "soccer"]
        }));
        let labels = scorer().program_labels(&profile);
        assert_eq!(
            labels,
            vec![
                "Upper School".to_string(),
                "Athletics Program".to_string(),
                "STEM Program".to_string()
            ]
        );
    }

    #[test]
    fn test_reasoning_names_top_factors() {
        let corpus = artistic_vs_athletic_corpus();
        let mut profile = MatchingProfile::empty(GradeBand::Upper);
        profile.traits = vec!["artistic".to_string()];
        profile.primary_interests = BTreeSet::new();
        let scorer = scorer();
        let ranking = scorer.select(&profile, &corpus, None);
        let result = scorer.to_result(&ranking, &profile, StrategyUsed::Deterministic);
        assert!(result.reasoning.starts_with("Iris Tester: persona 4"));
    }
}
