//! Deterministic scoring: the fallback of last resort
//!
//! Everything here is synchronous and infallible for a validated corpus.

pub mod scorer;
pub mod weights;

#[cfg(test)]
mod scorer_tests;

pub use scorer::compose_message;
pub use scorer::DeterministicScorer;
pub use scorer::RankedPick;
pub use scorer::Ranking;
pub use weights::ScoringWeights;
