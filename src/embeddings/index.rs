//! Precomputed candidate vectors and cosine-similarity retrieval
//!
//! The index is persisted as a versioned JSON blob keyed by the corpus content
//! hash and the embedding model id. Any key mismatch rebuilds every vector.

use std::path::Path;

use chrono::DateTime;
use chrono::Utc;
use serde::Deserialize;
use serde::Serialize;
use tracing::debug;
use tracing::info;
use tracing::warn;

use super::text::candidate_summary;
use super::TextEmbedder;
use crate::corpus::Corpus;
use crate::errors::CohortMatchError;
use crate::errors::Result;
use crate::models::Category;
use crate::models::CategoryLimits;

/// Bump when the blob layout or the candidate summary format changes
pub const INDEX_FORMAT_VERSION: u32 = 2;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EmbeddingRecord {
    pub candidate_id: String,
    pub category: Category,
    pub vector: Vec<f32>,
}

#[derive(Debug, Serialize, Deserialize)]
struct IndexBlob {
    version: u32,
    content_hash: String,
    model_id: String,
    dimension: usize,
    created_at: DateTime<Utc>,
    records: Vec<EmbeddingRecord>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ShortlistEntry {
    pub candidate_id: String,
    pub similarity: f32,
}

/// Per-category retrieval result, best first
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Shortlist {
    pub current_members: Vec<ShortlistEntry>,
    pub alumni: Vec<ShortlistEntry>,
    pub staff: Vec<ShortlistEntry>,
}

impl Shortlist {
    pub fn category(&self, category: Category) -> &[ShortlistEntry] {
        match category {
            Category::CurrentMember => &self.current_members,
            Category::Alumni => &self.alumni,
            Category::Staff => &self.staff,
        }
    }

    fn category_mut(&mut self, category: Category) -> &mut Vec<ShortlistEntry> {
        match category {
            Category::CurrentMember => &mut self.current_members,
            Category::Alumni => &mut self.alumni,
            Category::Staff => &mut self.staff,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.current_members.is_empty() && self.alumni.is_empty() && self.staff.is_empty()
    }

    pub fn len(&self) -> usize {
        self.current_members.len() + self.alumni.len() + self.staff.len()
    }

}

/// Cosine similarity; zero-norm vectors score 0, mismatched lengths are an error
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> Result<f32> {
    if a.len() != b.len() {
        return Err(CohortMatchError::EmbeddingError(format!(
            "dimension mismatch: {} vs {}",
            a.len(),
            b.len()
        )));
    }
    let mut dot = 0.0f32;
    let mut norm_a = 0.0f32;
    let mut norm_b = 0.0f32;
    for (x, y) in a.iter().zip(b) {
        dot += x * y;
        norm_a += x * x;
        norm_b += y * y;
    }
    if norm_a == 0.0 || norm_b == 0.0 {
        return Ok(0.0);
    }
    Ok(dot / (norm_a.sqrt() * norm_b.sqrt()))
}

#[derive(Debug, Clone)]
pub struct EmbeddingIndex {
    content_hash: String,
    model_id: String,
    dimension: usize,
    records: Vec<EmbeddingRecord>,
}

impl EmbeddingIndex {
    /// Embed every candidate of the corpus
    pub async fn build(corpus: &Corpus, embedder: &dyn TextEmbedder) -> Result<Self> {
        let start = std::time::Instant::now();
        let summaries: Vec<String> = corpus.iter().map(candidate_summary).collect();
        let vectors = embedder.embed_batch(&summaries).await?;
        if vectors.len() != summaries.len() {
            return Err(CohortMatchError::EmbeddingError(format!(
                "embedder returned {} vectors for {} candidates",
                vectors.len(),
                summaries.len()
            )));
        }
        if let Some(bad) = vectors.iter().find(|v| v.len() != embedder.dimension()) {
            return Err(CohortMatchError::EmbeddingError(format!(
                "embedder returned a {}-dimension vector, expected {}",
                bad.len(),
                embedder.dimension()
            )));
        }

        let records = corpus
            .iter()
            .zip(vectors)
            .map(|(record, vector)| EmbeddingRecord {
                candidate_id: record.id().to_string(),
                category: record.category(),
                vector,
            })
            .collect();

        info!(
            "Built embedding index for {} candidates with {} in {:.2}s",
            corpus.len(),
            embedder.model_id(),
            start.elapsed().as_secs_f64()
        );

        Ok(Self {
            content_hash: corpus.content_hash().to_string(),
            model_id: embedder.model_id().to_string(),
            dimension: embedder.dimension(),
            records,
        })
    }

    /// Reuse the on-disk blob when its keys match, otherwise rebuild and persist
    ///
    /// With no usable blob and no embedder the index cannot exist, which is a
    /// `CorpusFatal` error.
    pub async fn load_or_build(
        corpus: &Corpus,
        embedder: Option<&dyn TextEmbedder>,
        cache_path: Option<&Path>,
    ) -> Result<Self> {
        let expected_model = embedder.map(|e| e.model_id());

        if let Some(path) = cache_path {
            match Self::read_blob(path) {
                Ok(Some(blob)) => {
                    if let Some(index) = Self::from_blob(blob, corpus, expected_model) {
                        info!("Loaded embedding index from {}", path.display());
                        return Ok(index);
                    }
                    info!("Embedding cache at {} is stale, rebuilding", path.display());
                }
                Ok(None) => debug!("No embedding cache at {}", path.display()),
                Err(e) => warn!("Ignoring unreadable embedding cache {}: {}", path.display(), e),
            }
        }

        let embedder = embedder.ok_or_else(|| {
            CohortMatchError::CorpusFatal(
                "no usable embedding cache and no embedding provider configured".to_string(),
            )
        })?;

        let index = Self::build(corpus, embedder)
            .await
            .map_err(|e| CohortMatchError::CorpusFatal(format!("embedding index build failed: {e}")))?;

        if let Some(path) = cache_path {
            if let Err(e) = index.save(path) {
                warn!("Failed to persist embedding cache to {}: {}", path.display(), e);
            }
        }

        Ok(index)
    }

    fn read_blob(path: &Path) -> Result<Option<IndexBlob>> {
        if !path.exists() {
            return Ok(None);
        }
        let bytes = std::fs::read(path)?;
        Ok(Some(serde_json::from_slice(&bytes)?))
    }

    fn from_blob(blob: IndexBlob, corpus: &Corpus, expected_model: Option<&str>) -> Option<Self> {
        if blob.version != INDEX_FORMAT_VERSION {
            debug!("Embedding cache version {} != {}", blob.version, INDEX_FORMAT_VERSION);
            return None;
        }
        if blob.content_hash != corpus.content_hash() {
            debug!("Embedding cache content hash differs from corpus");
            return None;
        }
        if let Some(model) = expected_model {
            if blob.model_id != model {
                debug!("Embedding cache model {} != {}", blob.model_id, model);
                return None;
            }
        }
        if blob.records.len() != corpus.len()
            || blob.records.iter().any(|r| r.vector.len() != blob.dimension)
        {
            return None;
        }

        Some(Self {
            content_hash: blob.content_hash,
            model_id: blob.model_id,
            dimension: blob.dimension,
            records: blob.records,
        })
    }

    /// Write the versioned blob atomically (temp file + rename)
    pub fn save(&self, path: &Path) -> Result<()> {
        let blob = IndexBlob {
            version: INDEX_FORMAT_VERSION,
            content_hash: self.content_hash.clone(),
            model_id: self.model_id.clone(),
            dimension: self.dimension,
            created_at: Utc::now(),
            records: self.records.clone(),
        };
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        let tmp = path.with_extension("json.tmp");
        std::fs::write(&tmp, serde_json::to_vec(&blob)?)?;
        std::fs::rename(&tmp, path)?;
        Ok(())
    }

    pub fn model_id(&self) -> &str {
        &self.model_id
    }

    pub fn dimension(&self) -> usize {
        self.dimension
    }

    pub fn content_hash(&self) -> &str {
        &self.content_hash
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Top-K per category above `min_similarity`, best first; ties keep corpus order
    ///
    /// A query whose dimension differs from the index is an error rather than an
    /// empty shortlist, so it cannot pass for an over-strict threshold.
    pub fn retrieve(
        &self,
        query: &[f32],
        limits: CategoryLimits,
        min_similarity: f32,
    ) -> Result<Shortlist> {
        if query.len() != self.dimension {
            warn!(
                expected = self.dimension,
                actual = query.len(),
                model = %self.model_id,
                "Query embedding dimension does not match the index"
            );
            return Err(CohortMatchError::EmbeddingError(format!(
                "query has {} dimensions, index {} has {}",
                query.len(),
                self.model_id,
                self.dimension
            )));
        }

        let mut shortlist = Shortlist::default();
        for record in &self.records {
            let similarity = cosine_similarity(query, &record.vector)?;
            if similarity >= min_similarity {
                shortlist.category_mut(record.category).push(ShortlistEntry {
                    candidate_id: record.candidate_id.clone(),
                    similarity,
                });
            }
        }

        for category in Category::ALL {
            let entries = shortlist.category_mut(category);
            // stable sort keeps corpus order among equal similarities
            entries.sort_by(|a, b| b.similarity.total_cmp(&a.similarity));
            entries.truncate(limits.for_category(category));
        }

        Ok(shortlist)
    }
}
