//! End-to-end tests of the match pipeline with in-process collaborators

use std::sync::atomic::AtomicUsize;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use cohort_match::cache::MemoryStore;
use cohort_match::cache::ResultCache;
use cohort_match::corpus::Corpus;
use cohort_match::corpus::CorpusData;
use cohort_match::corpus::StaticCorpusProvider;
use cohort_match::embeddings::EmbeddingIndex;
use cohort_match::embeddings::TextEmbedder;
use cohort_match::llm::ProviderChain;
use cohort_match::llm::TextGenerator;
use cohort_match::models::CategoryLimits;
use cohort_match::models::MatchOptions;
use cohort_match::models::RawProfileInput;
use cohort_match::models::Strategy;
use cohort_match::models::StrategyUsed;
use cohort_match::router::ExperimentConfig;
use cohort_match::router::ExperimentRouter;
use cohort_match::scoring::ScoringWeights;
use cohort_match::selection::GenerativeSelector;
use cohort_match::CohortMatchError;
use cohort_match::MatchPipeline;
use cohort_match::Result;
use serde_json::json;

fn corpus_data() -> CorpusData {
    serde_json::from_value(json!({
        "current_members": [
            {"id": "m-art", "first_name": "Maya", "last_name": "Lin", "grade_level": "Grade 10",
             "grade_relevance": "upper", "interest_keywords": ["painting"],
             "persona_descriptors": ["creative"], "bio": "Maya paints murals."},
            {"id": "m-sport", "first_name": "Theo", "last_name": "Park", "grade_level": "Grade 7",
             "grade_relevance": "middle", "interest_keywords": ["soccer"],
             "bio": "Theo captains the soccer team."}
        ],
        "alumni": [
            {"id": "a-plain", "first_name": "Ria", "last_name": "Shah", "graduation_year": 2012,
             "interest_keywords": ["soccer"], "bio": "Ria played soccer in college."},
            {"id": "a-video", "first_name": "Ben", "last_name": "Ode", "graduation_year": 2010,
             "current_role": "Physician", "interest_keywords": ["soccer", "medicine"],
             "video_url": "https://youtu.be/abc123", "bio": "Ben is a sports physician."}
        ],
        "staff": [
            {"id": "s-ath", "first_name": "Cole", "last_name": "Reed", "title": "Athletic Director",
             "grade_relevance": "upper", "interest_keywords": ["athletics"],
             "bio": "Cole runs the athletics program."},
            {"id": "s-art", "first_name": "Iris", "last_name": "Vale", "title": "Art Teacher",
             "grade_relevance": "upper", "interest_keywords": ["visual arts"],
             "persona_descriptors": ["artistic", "creative", "imaginative"],
             "bio": "Iris teaches studio art."}
        ]
    }))
    .unwrap()
}

fn corpus() -> Corpus {
    Corpus::new(corpus_data()).unwrap()
}

fn raw(value: serde_json::Value) -> RawProfileInput {
    RawProfileInput::from_value(value)
}

fn deterministic_only() -> ExperimentRouter {
    ExperimentRouter::new(ExperimentConfig {
        enabled: false,
        semantic_percent: 0,
        generative_percent: 0,
    })
}

/// Counts keyword families per axis; the last axis keeps every vector non-zero
struct KeywordEmbedder;

#[async_trait]
impl TextEmbedder for KeywordEmbedder {
    fn model_id(&self) -> &str {
        "keyword-test"
    }

    fn dimension(&self) -> usize {
        4
    }

    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        let text = text.to_lowercase();
        let hits = |terms: &[&str]| terms.iter().filter(|t| text.contains(*t)).count() as f32;
        Ok(vec![
            hits(&["art", "paint", "creative"]),
            hits(&["soccer", "athlet", "sport"]),
            hits(&["robot", "science", "math"]),
            1.0,
        ])
    }
}

struct FailingGenerator {
    calls: AtomicUsize,
}

#[async_trait]
impl TextGenerator for FailingGenerator {
    fn name(&self) -> &str {
        "failing"
    }

    async fn generate(&self, _system: &str, _user: &str) -> Result<String> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Err(CohortMatchError::LlmError("provider down".to_string()))
    }
}

struct CannedGenerator(String);

#[async_trait]
impl TextGenerator for CannedGenerator {
    fn name(&self) -> &str {
        "canned"
    }

    async fn generate(&self, _system: &str, _user: &str) -> Result<String> {
        Ok(self.0.clone())
    }
}

fn selector(generator: Arc<dyn TextGenerator>) -> GenerativeSelector {
    let mut chain = ProviderChain::new(Duration::from_secs(5));
    chain.push(generator, Duration::from_secs(2));
    GenerativeSelector::new(chain)
}

async fn semantic_pipeline(generator: Arc<dyn TextGenerator>) -> MatchPipeline {
    let corpus = corpus();
    let embedder: Arc<dyn TextEmbedder> = Arc::new(KeywordEmbedder);
    let index = EmbeddingIndex::build(&corpus, embedder.as_ref()).await.unwrap();
    MatchPipeline::builder(corpus)
        .semantic(embedder, index)
        .selector(selector(generator))
        .build()
}

fn wide_open() -> MatchOptions {
    MatchOptions {
        strategy: Some(Strategy::SemanticGenerative),
        top_k: Some(CategoryLimits {
            current_members: 10,
            alumni: 10,
            staff: 10,
        }),
        min_similarity: Some(0.0),
    }
}

#[tokio::test]
async fn test_empty_middle_profile_gets_complete_answer() {
    let pipeline = MatchPipeline::builder(corpus())
        .router(deterministic_only())
        .build();

    let result = pipeline
        .match_profile(&raw(json!({"grade": "middle"})), &MatchOptions::default())
        .await;

    assert!(!result.selected_staff.id.is_empty());
    assert!(!result.selected_current_member.id.is_empty());
    assert!((78..=96).contains(&result.match_score));
    assert_eq!(result.strategy_used, StrategyUsed::Deterministic);
    assert!(!result.fallback_used);
    assert!(result.selected_alumni.is_none());
}

#[tokio::test]
async fn test_garbage_input_still_matches() {
    let pipeline = MatchPipeline::builder(corpus())
        .router(deterministic_only())
        .build();

    let result = pipeline
        .match_profile(&raw(json!(["not", "an", "object"])), &MatchOptions::default())
        .await;
    assert!((78..=96).contains(&result.match_score));
}

#[tokio::test]
async fn test_persona_match_wins_staff() {
    let pipeline = MatchPipeline::builder(corpus())
        .router(deterministic_only())
        .build();

    let result = pipeline
        .match_profile(
            &raw(json!({
                "grade": "upper",
                "description": "creative artistic imaginative",
                "interests": ["athletics"],
                "familyValues": ["academic_rigor"]
            })),
            &MatchOptions::default(),
        )
        .await;

    assert_eq!(result.selected_staff.id, "s-art");
    assert_eq!(result.program_labels[0], "Upper School");
}

#[tokio::test]
async fn test_alumni_gating() {
    let pipeline = MatchPipeline::builder(corpus())
        .router(deterministic_only())
        .build();

    let no_signal = pipeline
        .match_profile(
            &raw(json!({"grade": "upper", "interests": ["painting"]})),
            &MatchOptions::default(),
        )
        .await;
    assert!(no_signal.selected_alumni.is_none());

    let athletic = pipeline
        .match_profile(
            &raw(json!({"grade": "upper", "interests": ["soccer"]})),
            &MatchOptions::default(),
        )
        .await;
    // only the alumnus with a video is eligible
    assert_eq!(athletic.selected_alumni.map(|a| a.id).as_deref(), Some("a-video"));
}

#[tokio::test]
async fn test_failing_generator_falls_back() {
    let generator = Arc::new(FailingGenerator {
        calls: AtomicUsize::new(0),
    });
    let pipeline = semantic_pipeline(generator.clone()).await;

    let result = pipeline
        .match_profile(
            &raw(json!({"grade": "upper", "description": "creative painter"})),
            &wide_open(),
        )
        .await;

    assert_eq!(generator.calls.load(Ordering::SeqCst), 1);
    assert_eq!(result.strategy_used, StrategyUsed::Fallback);
    assert!(result.fallback_used);
    assert!((78..=96).contains(&result.match_score));
    assert!(!result.selected_staff.id.is_empty());
    assert!(!result.selected_current_member.id.is_empty());

    let stats = pipeline.analytics();
    assert_eq!(stats.fallbacks, 1);
}

#[tokio::test]
async fn test_generative_pick_is_used() {
    let canned = json!({
        "current_member_id": "m-art",
        "staff_id": "s-art",
        "alumni_id": null,
        "match_score": 72,
        "reasoning": "Shared love of studio art."
    })
    .to_string();
    let pipeline = semantic_pipeline(Arc::new(CannedGenerator(format!("```json\n{canned}\n```")))).await;

    let result = pipeline
        .match_profile(
            &raw(json!({"grade": "upper", "description": "creative painter"})),
            &wide_open(),
        )
        .await;

    assert_eq!(result.strategy_used, StrategyUsed::SemanticGenerative);
    assert_eq!(result.selected_staff.id, "s-art");
    assert_eq!(result.selected_current_member.id, "m-art");
    // clamped up into the generative range
    assert_eq!(result.match_score, 85);
    assert_eq!(result.reasoning, "Shared love of studio art.");
    assert!(result.message.contains("Iris Vale"));
}

#[tokio::test]
async fn test_generative_pick_outside_offer_falls_back() {
    let canned = json!({
        "current_member_id": "m-nobody",
        "staff_id": "s-art",
        "match_score": 95,
        "reasoning": "Made up."
    })
    .to_string();
    let pipeline = semantic_pipeline(Arc::new(CannedGenerator(canned))).await;

    let result = pipeline
        .match_profile(&raw(json!({"grade": "upper"})), &wide_open())
        .await;
    assert_eq!(result.strategy_used, StrategyUsed::Fallback);
}

#[tokio::test]
async fn test_semantic_deterministic_ranks_shortlist() {
    let pipeline = semantic_pipeline(Arc::new(CannedGenerator(String::new()))).await;
    let options = MatchOptions {
        strategy: Some(Strategy::SemanticDeterministic),
        ..MatchOptions::default()
    };

    let result = pipeline
        .match_profile(
            &raw(json!({"grade": "upper", "description": "creative art painting"})),
            &options,
        )
        .await;
    assert_eq!(result.strategy_used, StrategyUsed::SemanticDeterministic);
    assert!((78..=96).contains(&result.match_score));
}

#[tokio::test]
async fn test_missing_collaborators_degrade_to_deterministic() {
    let pipeline = MatchPipeline::builder(corpus())
        .router(ExperimentRouter::new(ExperimentConfig {
            enabled: true,
            semantic_percent: 0,
            generative_percent: 100,
        }))
        .build();

    let result = pipeline
        .match_profile(&raw(json!({"grade": "lower"})), &MatchOptions::default())
        .await;
    assert_eq!(result.strategy_used, StrategyUsed::Deterministic);
    assert!(!result.fallback_used);
}

/// Answers only after a minute, long past any request ceiling
struct StalledGenerator;

#[async_trait]
impl TextGenerator for StalledGenerator {
    fn name(&self) -> &str {
        "stalled"
    }

    async fn generate(&self, _system: &str, _user: &str) -> Result<String> {
        tokio::time::sleep(Duration::from_secs(60)).await;
        Ok(json!({
            "current_member_id": "m-art",
            "staff_id": "s-art",
            "match_score": 99,
            "reasoning": "Too late."
        })
        .to_string())
    }
}

#[tokio::test(start_paused = true)]
async fn test_request_ceiling_serves_baseline() {
    let corpus = corpus();
    let embedder: Arc<dyn TextEmbedder> = Arc::new(KeywordEmbedder);
    let index = EmbeddingIndex::build(&corpus, embedder.as_ref()).await.unwrap();
    let mut chain = ProviderChain::new(Duration::from_secs(300));
    chain.push(Arc::new(StalledGenerator), Duration::from_secs(300));
    let pipeline = MatchPipeline::builder(corpus)
        .semantic(embedder, index)
        .selector(GenerativeSelector::new(chain))
        .request_ceiling(Duration::from_secs(1))
        .build();
    let baseline = MatchPipeline::builder(self::corpus())
        .router(deterministic_only())
        .build();

    let profile = raw(json!({"grade": "upper", "description": "creative painter"}));
    let started = tokio::time::Instant::now();
    let result = pipeline.match_profile(&profile, &wide_open()).await;
    let expected = baseline
        .match_profile(&profile, &MatchOptions::default())
        .await;

    assert!(started.elapsed() < Duration::from_secs(60));
    assert_eq!(result.strategy_used, StrategyUsed::Fallback);
    assert!(result.fallback_used);
    assert_eq!(result.selected_staff.id, expected.selected_staff.id);
    assert_eq!(
        result.selected_current_member.id,
        expected.selected_current_member.id
    );
    assert_eq!(result.match_score, expected.match_score);
}

/// Candidates and queries land on orthogonal axes, so nothing clears a threshold
struct OrthogonalEmbedder;

#[async_trait]
impl TextEmbedder for OrthogonalEmbedder {
    fn model_id(&self) -> &str {
        "orthogonal-test"
    }

    fn dimension(&self) -> usize {
        2
    }

    async fn embed(&self, _text: &str) -> Result<Vec<f32>> {
        Ok(vec![0.0, 1.0])
    }

    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        Ok(texts.iter().map(|_| vec![1.0, 0.0]).collect())
    }
}

#[tokio::test]
async fn test_empty_shortlist_ranks_full_corpus() {
    let corpus = corpus();
    let embedder: Arc<dyn TextEmbedder> = Arc::new(OrthogonalEmbedder);
    let index = EmbeddingIndex::build(&corpus, embedder.as_ref()).await.unwrap();
    let pipeline = MatchPipeline::builder(corpus)
        .semantic(embedder, index)
        .build();
    let baseline = MatchPipeline::builder(self::corpus())
        .router(deterministic_only())
        .build();

    let profile = raw(json!({
        "grade": "upper",
        "description": "creative artistic imaginative",
        "interests": ["athletics"]
    }));
    let options = MatchOptions {
        strategy: Some(Strategy::SemanticDeterministic),
        min_similarity: Some(0.99),
        ..MatchOptions::default()
    };
    let result = pipeline.match_profile(&profile, &options).await;
    let expected = baseline
        .match_profile(&profile, &MatchOptions::default())
        .await;

    assert_eq!(result.strategy_used, StrategyUsed::Deterministic);
    assert!(result.fallback_used);
    assert_eq!(result.selected_staff.id, expected.selected_staff.id);
    assert_eq!(result.selected_staff.id, "s-art");
    assert_eq!(
        result.selected_current_member.id,
        expected.selected_current_member.id
    );
}

#[tokio::test]
async fn test_inverted_score_range_still_answers() {
    let weights: ScoringWeights =
        toml::from_str("composite_min = 90.0\ncomposite_max = 80.0").unwrap();
    let pipeline = MatchPipeline::builder(corpus())
        .weights(weights)
        .router(deterministic_only())
        .build();

    let result = pipeline
        .match_profile(&raw(json!({"grade": "upper"})), &MatchOptions::default())
        .await;
    assert_eq!(result.match_score, 80);
    assert!(!result.selected_staff.id.is_empty());
}

fn memory_cache(ttl: Duration) -> ResultCache {
    ResultCache::new(
        Arc::new(MemoryStore::new(100)),
        ttl,
        Duration::from_millis(500),
    )
}

#[tokio::test]
async fn test_cache_round_trip() {
    let pipeline = MatchPipeline::builder(corpus())
        .router(deterministic_only())
        .cache(memory_cache(Duration::from_secs(60)))
        .build();
    let input = raw(json!({"grade": "upper", "interests": ["soccer"], "sessionId": "abc"}));

    let first = pipeline.match_profile(&input, &MatchOptions::default()).await;
    assert!(!first.from_cache);
    tokio::time::sleep(Duration::from_millis(100)).await;

    // a different session id must not change the fingerprint
    let again = raw(json!({"grade": "upper", "interests": ["soccer"], "sessionId": "xyz"}));
    let second = pipeline.match_profile(&again, &MatchOptions::default()).await;
    assert!(second.from_cache);

    let mut expected = first.clone();
    expected.from_cache = true;
    assert_eq!(second, expected);
    assert_eq!(pipeline.cache_stats().hits, 1);
}

#[tokio::test]
async fn test_cache_expires_after_ttl() {
    let pipeline = MatchPipeline::builder(corpus())
        .router(deterministic_only())
        .cache(memory_cache(Duration::ZERO))
        .build();
    let input = raw(json!({"grade": "middle"}));

    pipeline.match_profile(&input, &MatchOptions::default()).await;
    tokio::time::sleep(Duration::from_millis(100)).await;
    let second = pipeline.match_profile(&input, &MatchOptions::default()).await;
    assert!(!second.from_cache);
}

#[tokio::test]
async fn test_threshold_override_bypasses_cache() {
    let pipeline = MatchPipeline::builder(corpus())
        .router(deterministic_only())
        .cache(memory_cache(Duration::from_secs(60)))
        .build();
    let input = raw(json!({"grade": "middle"}));
    let options = MatchOptions {
        min_similarity: Some(0.5),
        ..MatchOptions::default()
    };

    pipeline.match_profile(&input, &options).await;
    tokio::time::sleep(Duration::from_millis(100)).await;
    let second = pipeline.match_profile(&input, &options).await;
    assert!(!second.from_cache);
    assert_eq!(pipeline.cache_stats().writes, 0);
}

#[tokio::test]
async fn test_router_hot_swap_applies_to_next_request() {
    let pipeline = semantic_pipeline(Arc::new(CannedGenerator(String::new()))).await;
    pipeline
        .router()
        .update(ExperimentConfig {
            enabled: true,
            semantic_percent: 100,
            generative_percent: 0,
        })
        .unwrap();

    let result = pipeline
        .match_profile(
            &raw(json!({"grade": "upper", "description": "creative art"})),
            &MatchOptions::default(),
        )
        .await;
    assert_eq!(result.strategy_used, StrategyUsed::SemanticDeterministic);
}

#[tokio::test]
async fn test_reload_swaps_corpus() {
    let pipeline = MatchPipeline::builder(corpus())
        .router(deterministic_only())
        .build();

    let mut data = corpus_data();
    data.staff.truncate(1);
    data.staff[0].profile.id = "s-new".to_string();
    pipeline
        .reload(&StaticCorpusProvider::new(data))
        .await
        .unwrap();

    let result = pipeline
        .match_profile(&raw(json!({"grade": "upper"})), &MatchOptions::default())
        .await;
    assert_eq!(result.selected_staff.id, "s-new");
    assert_eq!(pipeline.status().staff, 1);
}

#[tokio::test]
async fn test_reload_rejects_corpus_without_staff() {
    let pipeline = MatchPipeline::builder(corpus()).build();
    let mut data = corpus_data();
    data.staff.clear();

    let err = pipeline
        .reload(&StaticCorpusProvider::new(data))
        .await
        .unwrap_err();
    assert!(err.is_fatal());
    assert_eq!(pipeline.status().staff, 2);
}

#[tokio::test]
async fn test_pipeline_from_example_config() {
    let mut config = cohort_match::AppConfig::from_file(concat!(
        env!("CARGO_MANIFEST_DIR"),
        "/config.example.toml"
    ))
    .unwrap();
    config.corpus.path = concat!(env!("CARGO_MANIFEST_DIR"), "/data/corpus.example.json").to_string();

    let pipeline = MatchPipeline::from_config(&config).await.unwrap();
    let result = pipeline
        .match_profile(
            &raw(json!({
                "grade": "11th grade",
                "description": "curious kid who loves robotics",
                "interests": ["robotics"]
            })),
            &MatchOptions::default(),
        )
        .await;

    assert_eq!(result.selected_staff.id, "st-ruth");
    assert_eq!(result.selected_current_member.id, "cm-ava");
    assert_eq!(result.strategy_used, StrategyUsed::Deterministic);
    assert!(result.program_labels.contains(&"STEM Program".to_string()));
}
