//! Keyword, synonym and pattern tables shared by normalization, retrieval and scoring
//!
//! A single `MatchVocabulary` is built per environment and handed to every
//! component that needs it. The built-in tables can be replaced wholesale by a
//! TOML file with the same shape as [`VocabularyTables`].

use std::collections::HashSet;
use std::path::Path;

use regex::Regex;
use serde::Deserialize;
use serde::Serialize;
use tracing::warn;

use crate::models::GradeBand;
use crate::Result;

/// Interest category used for expansion and program labels
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InterestCategory {
    pub name: String,
    pub program_label: String,
    pub synonyms: Vec<String>,
}

/// Coarse topical group for primary-interest coverage
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CoverageGroup {
    pub name: String,
    /// Word stems; a field covers the group if it contains any of them
    pub terms: Vec<String>,
}

/// Division labels per grade band
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DivisionLabels {
    pub lower: String,
    pub intermediate: String,
    pub middle: String,
    pub upper: String,
}

impl Default for DivisionLabels {
    fn default() -> Self {
        Self {
            lower: "Lower School".to_string(),
            intermediate: "Intermediate School".to_string(),
            middle: "Middle School".to_string(),
            upper: "Upper School".to_string(),
        }
    }
}

/// Serializable form of the vocabulary
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VocabularyTables {
    pub interest_categories: Vec<InterestCategory>,
    pub coverage_groups: Vec<CoverageGroup>,
    pub stop_words: Vec<String>,
    pub athletics_patterns: Vec<String>,
    pub medical_patterns: Vec<String>,
    #[serde(default)]
    pub divisions: DivisionLabels,
}

/// Compiled vocabulary
#[derive(Debug, Clone)]
pub struct MatchVocabulary {
    interest_categories: Vec<InterestCategory>,
    coverage_groups: Vec<CoverageGroup>,
    stop_words: HashSet<String>,
    athletics_patterns: Vec<Regex>,
    medical_patterns: Vec<Regex>,
    divisions: DivisionLabels,
}

impl Default for MatchVocabulary {
    fn default() -> Self {
        Self::compile(VocabularyTables::builtin())
    }
}

impl MatchVocabulary {
    /// Compile tables; invalid patterns are dropped with a warning
    pub fn compile(tables: VocabularyTables) -> Self {
        let interest_categories = tables
            .interest_categories
            .into_iter()
            .map(|category| InterestCategory {
                name: fold_separators(&category.name),
                program_label: category.program_label,
                synonyms: category
                    .synonyms
                    .iter()
                    .map(|s| fold_separators(s))
                    .filter(|s| !s.is_empty())
                    .collect(),
            })
            .collect();

        Self {
            interest_categories,
            coverage_groups: tables.coverage_groups,
            stop_words: tables
                .stop_words
                .into_iter()
                .map(|w| w.to_lowercase())
                .collect(),
            athletics_patterns: compile_patterns("athletics", &tables.athletics_patterns),
            medical_patterns: compile_patterns("medical", &tables.medical_patterns),
            divisions: tables.divisions,
        }
    }

    /// Load tables from a TOML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let tables: VocabularyTables = toml::from_str(&content)?;
        Ok(Self::compile(tables))
    }

    pub fn interest_categories(&self) -> &[InterestCategory] {
        &self.interest_categories
    }

    pub fn is_stop_word(&self, token: &str) -> bool {
        self.stop_words.contains(token)
    }

    pub fn division_label(&self, band: GradeBand) -> &str {
        match band {
            GradeBand::Lower => &self.divisions.lower,
            GradeBand::Intermediate => &self.divisions.intermediate,
            GradeBand::Middle => &self.divisions.middle,
            GradeBand::Upper => &self.divisions.upper,
        }
    }

    /// Categories whose name or synonyms overlap `term` by containment
    pub fn categories_touching<'a>(
        &'a self,
        term: &'a str,
    ) -> impl Iterator<Item = &'a InterestCategory> + 'a {
        self.interest_categories.iter().filter(move |category| {
            terms_overlap(term, &category.name)
                || category.synonyms.iter().any(|s| terms_overlap(term, s))
        })
    }

    /// Coverage groups an interest belongs to
    pub fn coverage_groups_for<'a>(
        &'a self,
        interest: &'a str,
    ) -> impl Iterator<Item = &'a CoverageGroup> + 'a {
        self.coverage_groups.iter().filter(move |group| {
            fold_separators(&group.name) == interest
                || group.terms.iter().any(|t| interest.contains(t.as_str()))
        })
    }

    pub fn signals_athletics(&self, text: &str) -> bool {
        self.athletics_patterns.iter().any(|re| re.is_match(text))
    }

    pub fn signals_medical(&self, text: &str) -> bool {
        self.medical_patterns.iter().any(|re| re.is_match(text))
    }
}

/// Lower-case, fold `_`/`-` into spaces and collapse whitespace
pub fn fold_separators(term: &str) -> String {
    term.to_lowercase()
        .replace(['_', '-', '/'], " ")
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

/// Substring containment in either direction on folded terms
///
/// Terms shorter than three characters only match exactly, otherwise a single
/// letter would be "contained" in every synonym.
pub fn terms_overlap(a: &str, b: &str) -> bool {
    if a.is_empty() || b.is_empty() {
        return false;
    }
    if a == b {
        return true;
    }
    let (shorter, longer) = if a.len() <= b.len() { (a, b) } else { (b, a) };
    shorter.len() >= 3 && longer.contains(shorter)
}

fn compile_patterns(kind: &str, patterns: &[String]) -> Vec<Regex> {
    patterns
        .iter()
        .filter_map(|pattern| match Regex::new(&format!("(?i){pattern}")) {
            Ok(re) => Some(re),
            Err(e) => {
                warn!(kind, pattern = %pattern, error = %e, "Dropping invalid gating pattern");
                None
            }
        })
        .collect()
}

fn strings(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| (*s).to_string()).collect()
}

impl VocabularyTables {
    /// Built-in tables
    pub fn builtin() -> Self {
        let category = |name: &str, label: &str, synonyms: &[&str]| InterestCategory {
            name: name.to_string(),
            program_label: label.to_string(),
            synonyms: strings(synonyms),
        };
        let group = |name: &str, terms: &[&str]| CoverageGroup {
            name: name.to_string(),
            terms: strings(terms),
        };

        Self {
            interest_categories: vec![
                category(
                    "athletics",
                    "Athletics Program",
                    &[
                        "athletics",
                        "sports",
                        "soccer",
                        "basketball",
                        "football",
                        "lacrosse",
                        "tennis",
                        "swimming",
                        "track",
                        "cross country",
                        "volleyball",
                        "baseball",
                        "softball",
                        "hockey",
                        "golf",
                        "rowing",
                        "fitness",
                    ],
                ),
                category(
                    "visual_arts",
                    "Visual Arts Program",
                    &[
                        "visual arts",
                        "painting",
                        "drawing",
                        "ceramics",
                        "sculpture",
                        "photography",
                        "design",
                        "creative",
                    ],
                ),
                category(
                    "performing_arts",
                    "Performing Arts Program",
                    &[
                        "performing arts",
                        "music",
                        "theater",
                        "theatre",
                        "drama",
                        "dance",
                        "choir",
                        "orchestra",
                        "band",
                        "singing",
                    ],
                ),
                category(
                    "stem",
                    "STEM Program",
                    &[
                        "stem",
                        "science",
                        "technology",
                        "engineering",
                        "math",
                        "mathematics",
                        "robotics",
                        "coding",
                        "programming",
                        "computer science",
                        "physics",
                        "chemistry",
                        "biology",
                    ],
                ),
                category(
                    "humanities",
                    "Humanities Program",
                    &[
                        "humanities",
                        "reading",
                        "writing",
                        "literature",
                        "history",
                        "debate",
                        "languages",
                        "journalism",
                        "poetry",
                    ],
                ),
                category(
                    "service",
                    "Service & Leadership Program",
                    &[
                        "service",
                        "community service",
                        "volunteering",
                        "leadership",
                        "social justice",
                        "environment",
                        "sustainability",
                    ],
                ),
                category(
                    "health",
                    "Health Sciences Pathway",
                    &[
                        "health",
                        "healthcare",
                        "medicine",
                        "medical",
                        "pre med",
                        "nursing",
                        "anatomy",
                    ],
                ),
            ],
            coverage_groups: vec![
                group(
                    "sports",
                    &[
                        "sport", "athlet", "soccer", "ball", "team", "fitness", "swim", "run",
                        "track", "tennis", "lacrosse", "hockey", "golf", "rowing",
                    ],
                ),
                group(
                    "arts",
                    &[
                        "art", "paint", "draw", "ceramic", "sculpt", "photo", "design", "creat",
                        "music", "theat", "drama", "danc", "sing", "choir", "band", "orchestra",
                    ],
                ),
                group(
                    "stem",
                    &[
                        "stem", "scien", "math", "tech", "engineer", "robot", "cod", "comput",
                        "physic", "chemi", "biolog",
                    ],
                ),
                group(
                    "humanities",
                    &[
                        "humanit", "read", "writ", "literat", "histor", "debat", "language",
                        "journal", "poet",
                    ],
                ),
                group(
                    "service",
                    &[
                        "servic", "volunt", "communit", "leader", "justice", "environment",
                        "sustainab",
                    ],
                ),
                group(
                    "health",
                    &[
                        "health", "medic", "nurs", "doctor", "anatom", "biolog", "wellness",
                    ],
                ),
            ],
            stop_words: strings(&[
                "a", "an", "the", "and", "or", "but", "nor", "is", "are", "was", "were", "be",
                "been", "being", "am", "to", "of", "in", "on", "at", "for", "with", "about", "as",
                "by", "from", "into", "onto", "over", "under", "he", "she", "they", "them", "his",
                "her", "hers", "their", "theirs", "it", "its", "i", "me", "my", "mine", "we",
                "us", "our", "you", "your", "this", "that", "these", "those", "very", "really",
                "so", "too", "also", "just", "quite", "has", "have", "had", "do", "does", "did",
                "loves", "love", "likes", "like", "enjoys", "enjoy", "child", "kid", "kids",
                "son", "daughter", "who", "what", "when", "where", "which", "why", "how", "not",
                "no", "can", "will", "would", "should", "could", "may", "might", "more", "most",
                "much", "many", "lot", "lots", "always", "often", "sometimes", "there", "here",
                "all", "any", "some", "each", "every", "than", "then", "out", "up", "down",
                "who's", "she's", "he's", "they're", "it's", "and/or",
            ]),
            athletics_patterns: strings(&[
                r"\bathlet\w*",
                r"\bsports?\b",
                r"\bvarsity\b",
                r"\b(soccer|basketball|football|lacrosse|tennis|volleyball|baseball|softball|hockey|rowing|wrestling)\b",
                r"\bswim\w*",
                r"\btrack\b",
                r"\brecruit\w*",
            ]),
            medical_patterns: strings(&[
                r"\bmedic\w*",
                r"\bpre[\s-]?med\b",
                r"\b(doctor|physician|surgeon|dentist\w*|nurs\w*|pharmac\w*)\b",
                r"\bhealth\s*care\b",
                r"\bhealth\s+(career|science)s?\b",
                r"\banatom\w*",
            ]),
            divisions: DivisionLabels::default(),
        }
    }
}
