//! Read-only content corpus of candidate records
//!
//! The corpus is loaded once at startup through a [`CorpusProvider`] and then
//! shared behind an `Arc`. A corpus without at least one current member and
//! one staff member cannot guarantee a complete answer and is rejected.

use std::collections::HashSet;
use std::path::PathBuf;

use async_trait::async_trait;
use lazy_static::lazy_static;
use regex::Regex;
use serde::Deserialize;
use serde::Serialize;
use sha2::Digest;
use sha2::Sha256;
use tracing::info;

use crate::errors::CohortMatchError;
use crate::models::Category;
use crate::models::GradeScope;
use crate::models::SelectedCandidate;
use crate::Result;

lazy_static! {
    /// Short-form video hosts the presentation layer can embed
    static ref SHORT_VIDEO_URL: Regex = Regex::new(
        r"(?i)^https?://(www\.|m\.|vm\.)?(youtube\.com/shorts/|youtu\.be/|tiktok\.com/|instagram\.com/reels?/|vimeo\.com/)\S+"
    )
    .unwrap_or_else(|e| unreachable!("static video pattern: {e}"));
}

/// Fields every candidate record carries
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CandidateProfile {
    pub id: String,
    pub first_name: String,
    #[serde(default)]
    pub last_name: String,
    #[serde(default)]
    pub bio: String,
    #[serde(default)]
    pub interest_keywords: Vec<String>,
    #[serde(default)]
    pub persona_descriptors: Vec<String>,
    #[serde(default)]
    pub grade_relevance: Option<GradeScope>,
    #[serde(default)]
    pub video_url: Option<String>,
    #[serde(default)]
    pub highlights: Vec<String>,
    #[serde(default)]
    pub awards: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CurrentMember {
    #[serde(flatten)]
    pub profile: CandidateProfile,
    #[serde(default)]
    pub grade_level: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Alumnus {
    #[serde(flatten)]
    pub profile: CandidateProfile,
    #[serde(default)]
    pub graduation_year: Option<u16>,
    #[serde(default)]
    pub current_role: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StaffMember {
    #[serde(flatten)]
    pub profile: CandidateProfile,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub specialties: Vec<String>,
}

/// One corpus entry
#[derive(Debug, Clone, PartialEq)]
pub enum CandidateRecord {
    CurrentMember(CurrentMember),
    Alumni(Alumnus),
    Staff(StaffMember),
}

impl CandidateRecord {
    pub fn profile(&self) -> &CandidateProfile {
        match self {
            Self::CurrentMember(m) => &m.profile,
            Self::Alumni(a) => &a.profile,
            Self::Staff(s) => &s.profile,
        }
    }

    pub fn id(&self) -> &str {
        &self.profile().id
    }

    pub fn category(&self) -> Category {
        match self {
            Self::CurrentMember(_) => Category::CurrentMember,
            Self::Alumni(_) => Category::Alumni,
            Self::Staff(_) => Category::Staff,
        }
    }

    pub fn display_name(&self) -> String {
        let p = self.profile();
        format!("{} {}", p.first_name.trim(), p.last_name.trim())
            .trim()
            .to_string()
    }

    /// Role line shown next to the name
    pub fn title(&self) -> Option<String> {
        match self {
            Self::CurrentMember(m) => m.grade_level.clone(),
            Self::Alumni(a) => match (&a.current_role, a.graduation_year) {
                (Some(role), Some(year)) => Some(format!("{role} (Class of {year})")),
                (Some(role), None) => Some(role.clone()),
                (None, Some(year)) => Some(format!("Class of {year}")),
                (None, None) => None,
            },
            Self::Staff(s) => s.title.clone(),
        }
    }

    pub fn specialties(&self) -> &[String] {
        match self {
            Self::Staff(s) => &s.specialties,
            _ => &[],
        }
    }

    /// Whether the record links a recognized short-form video
    pub fn has_video(&self) -> bool {
        self.profile()
            .video_url
            .as_deref()
            .is_some_and(is_short_form_video)
    }

    /// Whether the record carries structured outcome highlights or awards
    pub fn has_narrative(&self) -> bool {
        let p = self.profile();
        !p.highlights.is_empty() || !p.awards.is_empty()
    }

    pub fn to_selected(&self) -> SelectedCandidate {
        let p = self.profile();
        SelectedCandidate {
            id: p.id.clone(),
            category: self.category(),
            name: self.display_name(),
            title: self.title(),
            bio: p.bio.clone(),
            video_url: p.video_url.clone(),
            highlights: p.highlights.iter().chain(&p.awards).cloned().collect(),
        }
    }
}

pub fn is_short_form_video(url: &str) -> bool {
    SHORT_VIDEO_URL.is_match(url.trim())
}

/// The three flat candidate lists a corpus provider returns
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CorpusData {
    #[serde(default)]
    pub current_members: Vec<CurrentMember>,
    #[serde(default)]
    pub alumni: Vec<Alumnus>,
    #[serde(default)]
    pub staff: Vec<StaffMember>,
}

/// Source of corpus data; the persistence mechanism is opaque to the matcher
#[async_trait]
pub trait CorpusProvider: Send + Sync {
    async fn load(&self) -> Result<CorpusData>;
}

/// Reads the corpus from a JSON document
pub struct JsonFileCorpusProvider {
    path: PathBuf,
}

impl JsonFileCorpusProvider {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

#[async_trait]
impl CorpusProvider for JsonFileCorpusProvider {
    async fn load(&self) -> Result<CorpusData> {
        let content = tokio::fs::read_to_string(&self.path).await.map_err(|e| {
            CohortMatchError::CorpusFatal(format!("cannot read {}: {e}", self.path.display()))
        })?;
        serde_json::from_str(&content).map_err(|e| {
            CohortMatchError::CorpusFatal(format!("cannot parse {}: {e}", self.path.display()))
        })
    }
}

/// Serves a corpus held in memory
pub struct StaticCorpusProvider {
    data: CorpusData,
}

impl StaticCorpusProvider {
    pub fn new(data: CorpusData) -> Self {
        Self { data }
    }
}

#[async_trait]
impl CorpusProvider for StaticCorpusProvider {
    async fn load(&self) -> Result<CorpusData> {
        Ok(self.data.clone())
    }
}

/// Validated, read-only corpus
#[derive(Debug, Clone)]
pub struct Corpus {
    current_members: Vec<CandidateRecord>,
    alumni: Vec<CandidateRecord>,
    staff: Vec<CandidateRecord>,
    content_hash: String,
}

impl Corpus {
    /// Validate provider data; empty required categories or duplicate ids are fatal
    pub fn new(data: CorpusData) -> Result<Self> {
        if data.current_members.is_empty() {
            return Err(CohortMatchError::CorpusFatal(
                "corpus has no current members".to_string(),
            ));
        }
        if data.staff.is_empty() {
            return Err(CohortMatchError::CorpusFatal(
                "corpus has no staff members".to_string(),
            ));
        }

        let current_members: Vec<_> = data
            .current_members
            .into_iter()
            .map(CandidateRecord::CurrentMember)
            .collect();
        let alumni: Vec<_> = data.alumni.into_iter().map(CandidateRecord::Alumni).collect();
        let staff: Vec<_> = data.staff.into_iter().map(CandidateRecord::Staff).collect();

        let mut seen = HashSet::new();
        for record in current_members.iter().chain(&alumni).chain(&staff) {
            if record.id().trim().is_empty() {
                return Err(CohortMatchError::CorpusFatal(format!(
                    "{} record without id",
                    record.category()
                )));
            }
            if !seen.insert(record.id().to_string()) {
                return Err(CohortMatchError::CorpusFatal(format!(
                    "duplicate candidate id {}",
                    record.id()
                )));
            }
        }

        let mut corpus = Self {
            current_members,
            alumni,
            staff,
            content_hash: String::new(),
        };
        corpus.content_hash = corpus.compute_content_hash();
        Ok(corpus)
    }

    /// Load and validate through a provider
    pub async fn load(provider: &dyn CorpusProvider) -> Result<Self> {
        let corpus = Self::new(provider.load().await?)?;
        info!(
            current_members = corpus.current_members.len(),
            alumni = corpus.alumni.len(),
            staff = corpus.staff.len(),
            content_hash = %&corpus.content_hash[..12],
            "Corpus loaded"
        );
        Ok(corpus)
    }

    pub fn category(&self, category: Category) -> &[CandidateRecord] {
        match category {
            Category::CurrentMember => &self.current_members,
            Category::Alumni => &self.alumni,
            Category::Staff => &self.staff,
        }
    }

    /// First current member; `new` rejects a corpus without one
    pub fn first_current_member(&self) -> &CandidateRecord {
        &self.current_members[0]
    }

    /// First staff member; `new` rejects a corpus without one
    pub fn first_staff(&self) -> &CandidateRecord {
        &self.staff[0]
    }

    pub fn get(&self, category: Category, id: &str) -> Option<&CandidateRecord> {
        self.category(category).iter().find(|r| r.id() == id)
    }

    pub fn iter(&self) -> impl Iterator<Item = &CandidateRecord> {
        self.current_members
            .iter()
            .chain(&self.alumni)
            .chain(&self.staff)
    }

    pub fn len(&self) -> usize {
        self.current_members.len() + self.alumni.len() + self.staff.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// SHA-256 over every record's embedding text, in corpus order
    pub fn content_hash(&self) -> &str {
        &self.content_hash
    }

    fn compute_content_hash(&self) -> String {
        let mut hasher = Sha256::new();
        for record in self.iter() {
            hasher.update(record.category().as_str().as_bytes());
            hasher.update([0u8]);
            hasher.update(record.id().as_bytes());
            hasher.update([0u8]);
            hasher.update(crate::embeddings::text::candidate_summary(record).as_bytes());
            hasher.update([0xffu8]);
        }
        hex::encode(hasher.finalize())
    }
}
