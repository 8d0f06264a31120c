//! Profile-to-shortlist retrieval over the embedding index

use std::sync::Arc;

use tracing::debug;

use crate::embeddings::text::profile_query_text;
use crate::embeddings::EmbeddingIndex;
use crate::embeddings::Shortlist;
use crate::embeddings::TextEmbedder;
use crate::errors::Result;
use crate::models::CategoryLimits;
use crate::models::MatchingProfile;

pub struct SemanticRetriever {
    embedder: Arc<dyn TextEmbedder>,
}

impl SemanticRetriever {
    pub fn new(embedder: Arc<dyn TextEmbedder>) -> Self {
        Self { embedder }
    }

    /// Embed the profile and pull the per-category shortlist from `index`
    pub async fn shortlist(
        &self,
        index: &EmbeddingIndex,
        profile: &MatchingProfile,
        limits: CategoryLimits,
        min_similarity: f32,
    ) -> Result<Shortlist> {
        let query = self.embedder.embed(&profile_query_text(profile)).await?;
        let shortlist = index.retrieve(&query, limits, min_similarity)?;
        debug!(
            current_members = shortlist.current_members.len(),
            alumni = shortlist.alumni.len(),
            staff = shortlist.staff.len(),
            "Semantic shortlist"
        );
        Ok(shortlist)
    }
}

#[cfg(test)]
mod tests {
    use async_trait::async_trait;

    use super::*;
    use crate::corpus::fixtures;
    use crate::corpus::Corpus;
    use crate::errors::CohortMatchError;
    use crate::models::GradeBand;

    struct ConstantEmbedder;

    #[async_trait]
    impl TextEmbedder for ConstantEmbedder {
        fn model_id(&self) -> &str {
            "constant"
        }

        fn dimension(&self) -> usize {
            2
        }

        async fn embed(&self, _text: &str) -> Result<Vec<f32>> {
            Ok(vec![1.0, 1.0])
        }
    }

    /// Reports a different width than the index was built with
    struct WideEmbedder;

    #[async_trait]
    impl TextEmbedder for WideEmbedder {
        fn model_id(&self) -> &str {
            "constant"
        }

        fn dimension(&self) -> usize {
            3
        }

        async fn embed(&self, _text: &str) -> Result<Vec<f32>> {
            Ok(vec![1.0, 1.0, 1.0])
        }
    }

    struct DownEmbedder;

    #[async_trait]
    impl TextEmbedder for DownEmbedder {
        fn model_id(&self) -> &str {
            "down"
        }

        fn dimension(&self) -> usize {
            2
        }

        async fn embed(&self, _text: &str) -> Result<Vec<f32>> {
            Err(CohortMatchError::HttpError("connection refused".to_string()))
        }
    }

    fn limits() -> CategoryLimits {
        CategoryLimits {
            current_members: 6,
            alumni: 4,
            staff: 6,
        }
    }

    #[tokio::test]
    async fn test_shortlist_covers_every_category() {
        let corpus = Corpus::new(fixtures::minimal()).unwrap();
        let embedder: Arc<dyn TextEmbedder> = Arc::new(ConstantEmbedder);
        let index = EmbeddingIndex::build(&corpus, embedder.as_ref()).await.unwrap();
        let retriever = SemanticRetriever::new(embedder);

        let profile = MatchingProfile::empty(GradeBand::Middle);
        let shortlist = retriever
            .shortlist(&index, &profile, limits(), 0.5)
            .await
            .unwrap();
        assert_eq!(shortlist.len(), 3);
        assert_eq!(shortlist.staff[0].candidate_id, "s1");
    }

    #[tokio::test]
    async fn test_embedder_failure_propagates() {
        let corpus = Corpus::new(fixtures::minimal()).unwrap();
        let index = EmbeddingIndex::build(&corpus, &ConstantEmbedder).await.unwrap();
        let retriever = SemanticRetriever::new(Arc::new(DownEmbedder));
        let result = retriever
            .shortlist(&index, &MatchingProfile::empty(GradeBand::Upper), limits(), 0.0)
            .await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn test_dimension_mismatch_is_not_an_empty_shortlist() {
        let corpus = Corpus::new(fixtures::minimal()).unwrap();
        let index = EmbeddingIndex::build(&corpus, &ConstantEmbedder).await.unwrap();
        let retriever = SemanticRetriever::new(Arc::new(WideEmbedder));
        let err = retriever
            .shortlist(&index, &MatchingProfile::empty(GradeBand::Upper), limits(), 0.0)
            .await
            .unwrap_err();
        assert!(matches!(err, CohortMatchError::EmbeddingError(_)));
    }
}
