//! Unit tests for the shared data model

#[cfg(test)]
mod tests {
    use serde_json::json;

    use crate::models::*;

    #[test]
    fn test_grade_band_adjacency() {
        assert!(GradeBand::Lower.is_adjacent(GradeBand::Intermediate));
        assert!(GradeBand::Intermediate.is_adjacent(GradeBand::Middle));
        assert!(GradeBand::Middle.is_adjacent(GradeBand::Upper));
        assert!(GradeBand::Upper.is_adjacent(GradeBand::Middle));
        assert!(!GradeBand::Lower.is_adjacent(GradeBand::Middle));
        assert!(!GradeBand::Lower.is_adjacent(GradeBand::Upper));
        assert!(!GradeBand::Middle.is_adjacent(GradeBand::Middle));
    }

    #[test]
    fn test_grade_scope_band() {
        assert_eq!(GradeScope::Upper.band(), Some(GradeBand::Upper));
        assert_eq!(GradeScope::All.band(), None);
    }

    #[test]
    fn test_raw_input_accepts_aliases() {
        let raw = RawProfileInput::from_value(json!({
            "gradeLevel": "9th",
            "values": ["community"],
            "sessionId": "abc"
        }));
        assert_eq!(raw.grade, Some(json!("9th")));
        assert_eq!(raw.family_values, Some(json!(["community"])));
        assert_eq!(raw.session_id, Some(json!("abc")));
    }

    #[test]
    fn test_raw_input_from_non_object_is_empty() {
        let raw = RawProfileInput::from_value(json!([1, 2, 3]));
        assert!(raw.grade.is_none());
        assert!(raw.interests.is_none());

        let raw = RawProfileInput::from_value(json!("just text"));
        assert!(raw.description.is_none());
    }

    #[test]
    fn test_raw_input_duplicate_aliases_keep_other_fields() {
        let raw = RawProfileInput::from_value(json!({
            "grade": "upper",
            "description": "creative artistic",
            "interests": ["soccer"],
            "values": ["teamwork"],
            "familyValues": ["kindness"]
        }));
        assert_eq!(raw.grade, Some(json!("upper")));
        assert_eq!(raw.description, Some(json!("creative artistic")));
        assert_eq!(raw.interests, Some(json!(["soccer"])));
        // camelCase outranks the short alias
        assert_eq!(raw.family_values, Some(json!(["kindness"])));
    }

    #[test]
    fn test_raw_input_null_falls_through_to_alias() {
        let raw = RawProfileInput::from_value(json!({
            "grade": null,
            "gradeLevel": "7",
            "interests": 42
        }));
        assert_eq!(raw.grade, Some(json!("7")));
        assert_eq!(raw.interests, Some(json!(42)));
    }

    #[test]
    fn test_raw_input_deserializes_tolerantly() {
        let raw: RawProfileInput =
            serde_json::from_str(r#"{"grade": "k", "values": "a", "family_values": "b"}"#).unwrap();
        assert_eq!(raw.grade, Some(json!("k")));
        assert_eq!(raw.family_values, Some(json!("b")));

        let raw: RawProfileInput = serde_json::from_str("[1, 2, 3]").unwrap();
        assert!(raw.grade.is_none());
    }

    #[test]
    fn test_strategy_display_and_conversion() {
        assert_eq!(Strategy::SemanticGenerative.to_string(), "semantic_generative");
        assert_eq!(
            StrategyUsed::from(Strategy::Deterministic),
            StrategyUsed::Deterministic
        );
    }

    #[test]
    fn test_strategy_serde_names() {
        let value = serde_json::to_value(StrategyUsed::Fallback).unwrap();
        assert_eq!(value, json!("fallback"));
        let parsed: Strategy = serde_json::from_value(json!("semantic_deterministic")).unwrap();
        assert_eq!(parsed, Strategy::SemanticDeterministic);
    }

    #[test]
    fn test_breakdown_totals() {
        let breakdown = ScoreBreakdown {
            base: 40.0,
            grade: 12.0,
            interests: 6.0,
            persona: 4.0,
            media: 15.0,
            ..ScoreBreakdown::default()
        };
        assert!((breakdown.total() - 77.0).abs() < f32::EPSILON);
        assert!((breakdown.keyword_signal() - 10.0).abs() < f32::EPSILON);
    }

    #[test]
    fn test_match_options_shortlist_overrides() {
        assert!(!MatchOptions::default().overrides_shortlist());
        let forced = MatchOptions {
            strategy: Some(Strategy::Deterministic),
            ..MatchOptions::default()
        };
        assert!(!forced.overrides_shortlist());
        let narrowed = MatchOptions {
            min_similarity: Some(0.5),
            ..MatchOptions::default()
        };
        assert!(narrowed.overrides_shortlist());
    }
}
