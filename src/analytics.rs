//! In-process match counters

use std::sync::atomic::AtomicU64;
use std::sync::atomic::Ordering;

use dashmap::DashMap;
use serde::Serialize;
use tracing::info;

use crate::models::SelectionResult;
use crate::models::StrategyUsed;

#[derive(Debug, Default)]
pub struct MatchAnalytics {
    by_strategy: DashMap<StrategyUsed, u64>,
    total: AtomicU64,
    fallbacks: AtomicU64,
    cache_hits: AtomicU64,
    cache_misses: AtomicU64,
    score_sum: AtomicU64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AnalyticsSnapshot {
    pub total_matches: u64,
    pub by_strategy: Vec<(StrategyUsed, u64)>,
    pub fallbacks: u64,
    pub cache_hits: u64,
    pub cache_misses: u64,
    pub average_match_score: f64,
}

impl MatchAnalytics {
    pub fn new() -> Self {
        Self::default()
    }

    /// Count one finished request and emit its structured event
    pub fn record(&self, request_id: &str, result: &SelectionResult, elapsed_ms: u64) {
        *self.by_strategy.entry(result.strategy_used).or_insert(0) += 1;
        self.total.fetch_add(1, Ordering::Relaxed);
        if result.fallback_used {
            self.fallbacks.fetch_add(1, Ordering::Relaxed);
        }
        if result.from_cache {
            self.cache_hits.fetch_add(1, Ordering::Relaxed);
        } else {
            self.cache_misses.fetch_add(1, Ordering::Relaxed);
        }
        self.score_sum
            .fetch_add(u64::from(result.match_score), Ordering::Relaxed);

        info!(
            request_id,
            strategy = result.strategy_used.as_str(),
            fallback = result.fallback_used,
            from_cache = result.from_cache,
            match_score = result.match_score,
            staff_id = %result.selected_staff.id,
            current_member_id = %result.selected_current_member.id,
            alumni_id = result.selected_alumni.as_ref().map_or("", |a| a.id.as_str()),
            elapsed_ms,
            "Match completed"
        );
    }

    pub fn snapshot(&self) -> AnalyticsSnapshot {
        let total = self.total.load(Ordering::Relaxed);
        let mut by_strategy: Vec<(StrategyUsed, u64)> = self
            .by_strategy
            .iter()
            .map(|entry| (*entry.key(), *entry.value()))
            .collect();
        by_strategy.sort_by_key(|(strategy, _)| strategy.as_str());

        AnalyticsSnapshot {
            total_matches: total,
            by_strategy,
            fallbacks: self.fallbacks.load(Ordering::Relaxed),
            cache_hits: self.cache_hits.load(Ordering::Relaxed),
            cache_misses: self.cache_misses.load(Ordering::Relaxed),
            average_match_score: if total == 0 {
                0.0
            } else {
                self.score_sum.load(Ordering::Relaxed) as f64 / total as f64
            },
        }
    }
}
