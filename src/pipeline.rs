//! Match pipeline orchestration
//!
//! Every request ends in a [`SelectionResult`]. The deterministic ranking is
//! computed before any optional stage runs, so a failed retrieval, a rejected
//! generation or the request ceiling all fall back to an answer that is
//! already in hand.

use std::path::PathBuf;
use std::sync::Arc;
use std::sync::PoisonError;
use std::sync::RwLock;
use std::time::Duration;
use std::time::Instant;

use serde::Serialize;
use tracing::debug;
use tracing::info;
use tracing::warn;
use uuid::Uuid;

use crate::analytics::AnalyticsSnapshot;
use crate::analytics::MatchAnalytics;
use crate::cache::cache_key;
use crate::cache::fingerprint;
use crate::cache::CacheStats;
use crate::cache::ResultCache;
use crate::config::AppConfig;
use crate::config::RetrievalConfig;
use crate::corpus::Corpus;
use crate::corpus::CorpusProvider;
use crate::corpus::JsonFileCorpusProvider;
use crate::embeddings::EmbeddingClient;
use crate::embeddings::EmbeddingIndex;
use crate::embeddings::TextEmbedder;
use crate::errors::CohortMatchError;
use crate::errors::Result;
use crate::llm::ProviderChain;
use crate::models::Category;
use crate::models::MatchOptions;
use crate::models::MatchingProfile;
use crate::models::RawProfileInput;
use crate::models::SelectionResult;
use crate::models::Strategy;
use crate::models::StrategyUsed;
use crate::profile;
use crate::retrieval::SemanticRetriever;
use crate::router::Capabilities;
use crate::router::ExperimentRouter;
use crate::scoring::compose_message;
use crate::scoring::DeterministicScorer;
use crate::scoring::Ranking;
use crate::scoring::ScoringWeights;
use crate::selection::GenerativePick;
use crate::selection::GenerativeSelector;
use crate::selection::OfferedCandidates;
use crate::vocabulary::MatchVocabulary;

/// Corpus and its embedding index, swapped together on reload
#[derive(Debug)]
pub struct CorpusSnapshot {
    pub corpus: Corpus,
    pub index: Option<EmbeddingIndex>,
}

/// An optional stage that could not produce an answer
#[derive(Debug)]
struct StageFailure {
    stage: &'static str,
    error: CohortMatchError,
}

impl StageFailure {
    fn new(stage: &'static str, error: CohortMatchError) -> Self {
        Self { stage, error }
    }
}

/// Health summary for the HTTP and CLI surfaces
#[derive(Debug, Clone, Serialize)]
pub struct PipelineStatus {
    pub current_members: usize,
    pub alumni: usize,
    pub staff: usize,
    pub corpus_hash: String,
    pub semantic_available: bool,
    pub embedding_model: Option<String>,
    pub generative_providers: Vec<String>,
    pub cache_backend: String,
}

pub struct MatchPipeline {
    snapshot: RwLock<Arc<CorpusSnapshot>>,
    vocab: Arc<MatchVocabulary>,
    scorer: DeterministicScorer,
    embedder: Option<Arc<dyn TextEmbedder>>,
    retriever: Option<SemanticRetriever>,
    index_cache_path: Option<PathBuf>,
    selector: Option<GenerativeSelector>,
    cache: ResultCache,
    router: ExperimentRouter,
    analytics: MatchAnalytics,
    retrieval: RetrievalConfig,
    request_ceiling: Duration,
}

impl MatchPipeline {
    pub fn builder(corpus: Corpus) -> MatchPipelineBuilder {
        MatchPipelineBuilder::new(corpus)
    }

    /// Wire every collaborator named in the configuration
    ///
    /// Corpus and embedding index problems are fatal here; everything else
    /// only narrows which strategies can run.
    pub async fn from_config(config: &AppConfig) -> Result<Self> {
        let vocab = match &config.vocabulary.path {
            Some(path) => {
                info!("Loading match vocabulary from {}", path);
                MatchVocabulary::from_file(path)?
            }
            None => MatchVocabulary::default(),
        };

        let corpus = Corpus::load(&JsonFileCorpusProvider::new(&config.corpus.path)).await?;

        let mut builder = MatchPipeline::builder(corpus)
            .vocabulary(vocab)
            .weights(config.scoring.clone())
            .retrieval(config.retrieval.clone())
            .cache(ResultCache::from_settings(&config.cache)?)
            .router(ExperimentRouter::new(config.experiment.clone()))
            .request_ceiling(config.request_ceiling());

        if config.embeddings.enabled {
            let embedder: Arc<dyn TextEmbedder> = Arc::new(EmbeddingClient::from_app_config(config)?);
            let cache_path = PathBuf::from(&config.embeddings.cache_path);
            let index = EmbeddingIndex::load_or_build(
                &builder.corpus,
                Some(embedder.as_ref()),
                Some(&cache_path),
            )
            .await?;
            builder = builder.semantic(embedder, index).index_cache_path(cache_path);
        } else {
            info!("Embeddings disabled; semantic strategies degrade to deterministic");
        }

        let chain = ProviderChain::from_config(&config.llm)?;
        if chain.is_empty() {
            info!("No text-generation providers configured");
        } else {
            builder = builder.selector(GenerativeSelector::new(chain));
        }

        Ok(builder.build())
    }

    /// Swap in a freshly loaded corpus and matching index
    ///
    /// In-flight requests keep the snapshot they started with.
    pub async fn reload(&self, provider: &dyn CorpusProvider) -> Result<()> {
        let corpus = Corpus::load(provider).await?;
        let index = match &self.embedder {
            Some(embedder) => Some(
                EmbeddingIndex::load_or_build(
                    &corpus,
                    Some(embedder.as_ref()),
                    self.index_cache_path.as_deref(),
                )
                .await?,
            ),
            None => None,
        };

        let snapshot = Arc::new(CorpusSnapshot { corpus, index });
        *self.snapshot.write().unwrap_or_else(PoisonError::into_inner) = snapshot;
        info!("Corpus snapshot replaced");
        Ok(())
    }

    pub fn snapshot(&self) -> Arc<CorpusSnapshot> {
        self.snapshot
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn router(&self) -> &ExperimentRouter {
        &self.router
    }

    pub fn analytics(&self) -> AnalyticsSnapshot {
        self.analytics.snapshot()
    }

    pub fn cache_stats(&self) -> CacheStats {
        self.cache.stats()
    }

    pub fn status(&self) -> PipelineStatus {
        let snapshot = self.snapshot();
        let corpus = &snapshot.corpus;
        PipelineStatus {
            current_members: corpus.category(Category::CurrentMember).len(),
            alumni: corpus.category(Category::Alumni).len(),
            staff: corpus.category(Category::Staff).len(),
            corpus_hash: corpus.content_hash().to_string(),
            semantic_available: self.capabilities(&snapshot).semantic,
            embedding_model: snapshot.index.as_ref().map(|i| i.model_id().to_string()),
            generative_providers: self
                .selector
                .as_ref()
                .map(GenerativeSelector::provider_names)
                .unwrap_or_default(),
            cache_backend: self.cache.backend_name().to_string(),
        }
    }

    fn capabilities(&self, snapshot: &CorpusSnapshot) -> Capabilities {
        Capabilities {
            semantic: self.retriever.is_some() && snapshot.index.is_some(),
            generative: self
                .selector
                .as_ref()
                .is_some_and(GenerativeSelector::is_available),
        }
    }

    /// Match one intake payload; never fails
    pub async fn match_profile(
        &self,
        raw: &RawProfileInput,
        options: &MatchOptions,
    ) -> SelectionResult {
        let started = Instant::now();
        let request_id = Uuid::new_v4().to_string();
        let snapshot = self.snapshot();
        let profile = profile::normalize(raw, &self.vocab);

        let fp = fingerprint(&profile);
        let assignment = self
            .router
            .assign(&fp, options.strategy, self.capabilities(&snapshot));
        if assignment.strategy != assignment.requested {
            debug!(
                request_id = %request_id,
                requested = %assignment.requested,
                strategy = %assignment.strategy,
                "Strategy degraded to available collaborators"
            );
        }

        let cacheable = !options.overrides_shortlist();
        let key = cache_key(&fp, assignment.strategy);

        if cacheable {
            if let Some(hit) = self.cache.get(&key).await {
                self.analytics
                    .record(&request_id, &hit, started.elapsed().as_millis() as u64);
                return hit;
            }
        }

        let baseline = self.scorer.select(&profile, &snapshot.corpus, None);

        let result = if assignment.strategy == Strategy::Deterministic {
            self.scorer
                .to_result(&baseline, &profile, StrategyUsed::Deterministic)
        } else {
            let optional = self.run_optional_stages(
                assignment.strategy,
                &snapshot,
                &profile,
                &baseline,
                options,
            );
            let outcome = match tokio::time::timeout(self.request_ceiling, optional).await {
                Ok(outcome) => outcome,
                Err(_) => Err(StageFailure::new(
                    "request_ceiling",
                    CohortMatchError::Timeout(self.request_ceiling.as_millis() as u64),
                )),
            };
            match outcome {
                Ok(result) => result,
                Err(failure) => {
                    warn!(
                        request_id = %request_id,
                        stage = failure.stage,
                        error = %failure.error,
                        "Optional stage unavailable, serving deterministic fallback"
                    );
                    let mut fallback =
                        self.scorer
                            .to_result(&baseline, &profile, StrategyUsed::Fallback);
                    fallback.fallback_used = true;
                    fallback
                }
            }
        };

        if cacheable {
            self.cache.put(key, result.clone());
        }
        self.analytics
            .record(&request_id, &result, started.elapsed().as_millis() as u64);
        result
    }

    async fn run_optional_stages(
        &self,
        strategy: Strategy,
        snapshot: &CorpusSnapshot,
        profile: &MatchingProfile,
        baseline: &Ranking<'_>,
        options: &MatchOptions,
    ) -> std::result::Result<SelectionResult, StageFailure> {
        let (Some(retriever), Some(index)) = (&self.retriever, &snapshot.index) else {
            return Err(StageFailure::new(
                "retrieval",
                CohortMatchError::EmbeddingError("semantic retrieval not available".to_string()),
            ));
        };

        let limits = options.top_k.unwrap_or_else(|| self.retrieval.limits());
        let min_similarity = options
            .min_similarity
            .unwrap_or(self.retrieval.min_similarity);
        let shortlist = retriever
            .shortlist(index, profile, limits, min_similarity)
            .await
            .map_err(|e| StageFailure::new("retrieval", e))?;

        if shortlist.is_empty() {
            debug!(min_similarity, "Empty shortlist, using full-corpus ranking");
            let mut result = self
                .scorer
                .to_result(baseline, profile, StrategyUsed::Deterministic);
            result.fallback_used = true;
            return Ok(result);
        }

        match strategy {
            Strategy::SemanticGenerative => {
                let selector = self.selector.as_ref().ok_or_else(|| {
                    StageFailure::new(
                        "generation",
                        CohortMatchError::LlmError("no generative selector".to_string()),
                    )
                })?;
                let gate_open = self.scorer.alumni_gate_open(profile);
                let offered = OfferedCandidates::from_shortlist(&snapshot.corpus, &shortlist, |r| {
                    gate_open && r.has_video()
                });
                let pick = selector
                    .select(profile, &offered)
                    .await
                    .map_err(|e| StageFailure::new("generation", e))?;
                self.generative_result(profile, &offered, pick)
                    .map_err(|e| StageFailure::new("generation", e))
            }
            _ => {
                let ranking = self
                    .scorer
                    .select(profile, &snapshot.corpus, Some(&shortlist));
                Ok(self
                    .scorer
                    .to_result(&ranking, profile, StrategyUsed::SemanticDeterministic))
            }
        }
    }

    fn generative_result(
        &self,
        profile: &MatchingProfile,
        offered: &OfferedCandidates<'_>,
        pick: GenerativePick,
    ) -> Result<SelectionResult> {
        let lookup = |category: Category, id: &str| {
            offered.record(category, id).ok_or_else(|| {
                CohortMatchError::InvalidSelection(format!("{category} {id} was not offered"))
            })
        };
        let member = lookup(Category::CurrentMember, &pick.current_member_id)?;
        let staff = lookup(Category::Staff, &pick.staff_id)?;
        let alumni = match &pick.alumni_id {
            Some(id) => Some(lookup(Category::Alumni, id)?),
            None => None,
        };

        let message = pick.message.unwrap_or_else(|| {
            compose_message(
                self.vocab.division_label(profile.grade_band),
                member,
                staff,
                alumni,
            )
        });
        debug!(provider = %pick.provider, "Generative selection accepted");

        Ok(SelectionResult {
            selected_current_member: member.to_selected(),
            selected_staff: staff.to_selected(),
            selected_alumni: alumni.map(|a| a.to_selected()),
            match_score: pick.match_score,
            message,
            reasoning: pick.reasoning,
            strategy_used: StrategyUsed::SemanticGenerative,
            program_labels: self.scorer.program_labels(profile),
            fallback_used: false,
            from_cache: false,
        })
    }
}

/// Assembles a [`MatchPipeline`] from explicit collaborators
pub struct MatchPipelineBuilder {
    corpus: Corpus,
    vocab: MatchVocabulary,
    weights: ScoringWeights,
    semantic: Option<(Arc<dyn TextEmbedder>, EmbeddingIndex)>,
    index_cache_path: Option<PathBuf>,
    selector: Option<GenerativeSelector>,
    cache: ResultCache,
    router: ExperimentRouter,
    retrieval: RetrievalConfig,
    request_ceiling: Duration,
}

impl MatchPipelineBuilder {
    fn new(corpus: Corpus) -> Self {
        Self {
            corpus,
            vocab: MatchVocabulary::default(),
            weights: ScoringWeights::default(),
            semantic: None,
            index_cache_path: None,
            selector: None,
            cache: ResultCache::disabled(),
            router: ExperimentRouter::default(),
            retrieval: RetrievalConfig::default(),
            request_ceiling: Duration::from_secs(12),
        }
    }

    #[must_use]
    pub fn vocabulary(mut self, vocab: MatchVocabulary) -> Self {
        self.vocab = vocab;
        self
    }

    #[must_use]
    pub fn weights(mut self, weights: ScoringWeights) -> Self {
        self.weights = weights;
        self
    }

    /// Enable semantic retrieval with an index built by `embedder`
    #[must_use]
    pub fn semantic(mut self, embedder: Arc<dyn TextEmbedder>, index: EmbeddingIndex) -> Self {
        self.semantic = Some((embedder, index));
        self
    }

    #[must_use]
    pub fn index_cache_path(mut self, path: PathBuf) -> Self {
        self.index_cache_path = Some(path);
        self
    }

    #[must_use]
    pub fn selector(mut self, selector: GenerativeSelector) -> Self {
        self.selector = Some(selector);
        self
    }

    #[must_use]
    pub fn cache(mut self, cache: ResultCache) -> Self {
        self.cache = cache;
        self
    }

    #[must_use]
    pub fn router(mut self, router: ExperimentRouter) -> Self {
        self.router = router;
        self
    }

    #[must_use]
    pub fn retrieval(mut self, retrieval: RetrievalConfig) -> Self {
        self.retrieval = retrieval;
        self
    }

    #[must_use]
    pub fn request_ceiling(mut self, ceiling: Duration) -> Self {
        self.request_ceiling = ceiling;
        self
    }

    pub fn build(self) -> MatchPipeline {
        let vocab = Arc::new(self.vocab);
        let (embedder, index) = match self.semantic {
            Some((embedder, index)) => (Some(embedder), Some(index)),
            None => (None, None),
        };

        MatchPipeline {
            snapshot: RwLock::new(Arc::new(CorpusSnapshot {
                corpus: self.corpus,
                index,
            })),
            scorer: DeterministicScorer::new(Arc::clone(&vocab), self.weights),
            vocab,
            retriever: embedder.clone().map(SemanticRetriever::new),
            embedder,
            index_cache_path: self.index_cache_path,
            selector: self.selector,
            cache: self.cache,
            router: self.router,
            analytics: MatchAnalytics::new(),
            retrieval: self.retrieval,
            request_ceiling: self.request_ceiling,
        }
    }
}
