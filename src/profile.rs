//! Profile normalizer: raw intake fields → `MatchingProfile`
//!
//! Every function here is total. Malformed or missing input degrades to
//! defaults (grade → middle, lists → empty) and is only logged at debug level.

use std::collections::BTreeSet;

use serde_json::Value;
use tracing::debug;

use crate::models::GradeBand;
use crate::models::MatchingProfile;
use crate::models::RawProfileInput;
use crate::vocabulary::fold_separators;
use crate::vocabulary::MatchVocabulary;

/// Tokens taken from the primary description
pub const PRIMARY_TRAIT_CAP: usize = 5;
/// Combined cap once the secondary description is considered
pub const COMBINED_TRAIT_CAP: usize = 7;
/// Tokens shorter than this never become traits
const MIN_TRAIT_LEN: usize = 3;

/// Normalize a raw intake payload
pub fn normalize(raw: &RawProfileInput, vocab: &MatchVocabulary) -> MatchingProfile {
    let grade_band = raw
        .grade
        .as_ref()
        .and_then(value_as_text)
        .map_or_else(
            || {
                debug!("Grade missing or malformed, defaulting to middle");
                GradeBand::Middle
            },
            |g| normalize_grade(&g),
        );

    let description = raw
        .description
        .as_ref()
        .and_then(value_as_text)
        .unwrap_or_default();
    let secondary = raw.secondary_description.as_ref().and_then(value_as_text);

    let traits = extract_traits(&description, secondary.as_deref(), vocab);

    let primary_interests: BTreeSet<String> = value_as_list(raw.interests.as_ref())
        .into_iter()
        .map(|i| fold_separators(&i))
        .filter(|i| !i.is_empty())
        .collect();
    let interests = expand_interests(&primary_interests, vocab);

    let family_values = value_as_list(raw.family_values.as_ref())
        .into_iter()
        .map(|v| fold_separators(&v))
        .filter(|v| !v.is_empty())
        .collect();

    let mut description_text = description.trim().to_string();
    if let Some(extra) = secondary.as_deref().map(str::trim).filter(|s| !s.is_empty()) {
        if !description_text.is_empty() {
            description_text.push(' ');
        }
        description_text.push_str(extra);
    }

    MatchingProfile {
        grade_band,
        traits,
        interests,
        primary_interests,
        family_values,
        description_text,
    }
}

/// Map any grade spelling onto one of the four bands; unknown → middle
pub fn normalize_grade(raw: &str) -> GradeBand {
    let grade = fold_separators(raw);
    if grade.is_empty() {
        return GradeBand::Middle;
    }

    if grade.contains("upper elementary") {
        return GradeBand::Intermediate;
    }
    if grade.contains("junior high") {
        return GradeBand::Middle;
    }
    if ["pre k", "prek", "preschool", "pre school", "kindergarten", "early childhood"]
        .iter()
        .any(|s| grade.contains(s))
        || matches!(grade.as_str(), "k" | "pk" | "jk" | "sk" | "tk")
    {
        return GradeBand::Lower;
    }

    if let Some(number) = first_number(&grade) {
        return match number {
            0..=3 => GradeBand::Lower,
            4..=5 => GradeBand::Intermediate,
            6..=8 => GradeBand::Middle,
            9..=12 => GradeBand::Upper,
            _ => GradeBand::Middle,
        };
    }

    for word in grade.split_whitespace() {
        let band = match word {
            "first" | "second" | "third" => Some(GradeBand::Lower),
            "fourth" | "fifth" => Some(GradeBand::Intermediate),
            "sixth" | "seventh" | "eighth" => Some(GradeBand::Middle),
            "ninth" | "tenth" | "eleventh" | "twelfth" | "freshman" | "sophomore" | "junior"
            | "senior" => Some(GradeBand::Upper),
            _ => None,
        };
        if let Some(band) = band {
            return band;
        }
    }

    if grade.contains("lower") || grade.contains("primary") || grade.contains("elementary") {
        GradeBand::Lower
    } else if grade.contains("intermediate") {
        GradeBand::Intermediate
    } else if grade.contains("middle") {
        GradeBand::Middle
    } else if grade.contains("upper") || grade.contains("high") {
        GradeBand::Upper
    } else {
        debug!(grade = %raw, "Unrecognized grade, defaulting to middle");
        GradeBand::Middle
    }
}

fn first_number(text: &str) -> Option<u32> {
    let digits: String = text
        .chars()
        .skip_while(|c| !c.is_ascii_digit())
        .take_while(char::is_ascii_digit)
        .collect();
    digits.parse().ok()
}

/// Extract up to 5 trait tokens from the description, topped up to 7 from the
/// secondary description
pub fn extract_traits(
    primary: &str,
    secondary: Option<&str>,
    vocab: &MatchVocabulary,
) -> Vec<String> {
    let mut traits: Vec<String> = Vec::new();
    push_tokens(&mut traits, primary, PRIMARY_TRAIT_CAP, vocab);
    if let Some(secondary) = secondary {
        push_tokens(&mut traits, secondary, COMBINED_TRAIT_CAP, vocab);
    }
    traits
}

fn push_tokens(out: &mut Vec<String>, text: &str, cap: usize, vocab: &MatchVocabulary) {
    for token in tokenize(text) {
        if out.len() >= cap {
            break;
        }
        if token.chars().count() < MIN_TRAIT_LEN || vocab.is_stop_word(&token) {
            continue;
        }
        if !out.contains(&token) {
            out.push(token);
        }
    }
}

/// Lower-cased word tokens; apostrophes inside words are kept
pub fn tokenize(text: &str) -> impl Iterator<Item = String> + '_ {
    text.split(|c: char| !(c.is_alphanumeric() || c == '\''))
        .map(|t| t.trim_matches('\'').to_lowercase())
        .filter(|t| !t.is_empty())
}

/// Expand interests with the full synonym set of every category they touch
///
/// Expansion runs to a fixed point, so expanding an already-expanded set is a
/// no-op.
pub fn expand_interests(raw: &BTreeSet<String>, vocab: &MatchVocabulary) -> BTreeSet<String> {
    let mut expanded: BTreeSet<String> = raw.clone();
    loop {
        let mut additions: Vec<String> = Vec::new();
        for interest in &expanded {
            for category in vocab.categories_touching(interest) {
                for synonym in category.synonyms.iter().chain(std::iter::once(&category.name)) {
                    if !expanded.contains(synonym) {
                        additions.push(synonym.clone());
                    }
                }
            }
        }
        if additions.is_empty() {
            return expanded;
        }
        expanded.extend(additions);
    }
}

/// Text view of a loosely typed value
fn value_as_text(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Array(items) => {
            let parts: Vec<String> = items.iter().filter_map(value_as_text).collect();
            (!parts.is_empty()).then(|| parts.join(" "))
        }
        _ => None,
    }
}

/// List view of a loosely typed value; a string is split on commas
fn value_as_list(value: Option<&Value>) -> Vec<String> {
    match value {
        Some(Value::Array(items)) => items
            .iter()
            .filter_map(|item| match item {
                Value::String(s) => Some(s.clone()),
                Value::Number(n) => Some(n.to_string()),
                _ => None,
            })
            .collect(),
        Some(Value::String(s)) => s.split([',', ';']).map(str::to_string).collect(),
        Some(other) => {
            debug!(value = %other, "Ignoring malformed list field");
            Vec::new()
        }
        None => Vec::new(),
    }
}
