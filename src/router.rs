//! Per-request strategy assignment
//!
//! Assignment is a pure function of the profile fingerprint hashed into 100
//! buckets, so the same family always lands on the same arm. The configuration
//! lives in an explicitly constructed [`ExperimentRouter`] handle that can be
//! hot-swapped; each decision works on a snapshot.

use std::sync::Arc;
use std::sync::PoisonError;
use std::sync::RwLock;

use serde::Deserialize;
use serde::Serialize;
use sha2::Digest;
use sha2::Sha256;
use tracing::info;

use crate::errors::CohortMatchError;
use crate::errors::Result;
use crate::models::Strategy;

pub const BUCKETS: u64 = 100;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExperimentConfig {
    pub enabled: bool,
    /// Share of buckets routed to semantic retrieval + deterministic ranking
    pub semantic_percent: u8,
    /// Share of buckets routed to semantic retrieval + generative selection
    pub generative_percent: u8,
}

impl Default for ExperimentConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            semantic_percent: 0,
            generative_percent: 100,
        }
    }
}

impl ExperimentConfig {
    pub fn validate(&self) -> Result<()> {
        let total = u16::from(self.semantic_percent) + u16::from(self.generative_percent);
        if total > 100 {
            return Err(CohortMatchError::ConfigError(format!(
                "experiment split exceeds 100% (semantic {} + generative {})",
                self.semantic_percent, self.generative_percent
            )));
        }
        Ok(())
    }

    /// Arm for one bucket, ignoring collaborator availability
    pub fn strategy_for_bucket(&self, bucket: u8) -> Strategy {
        if !self.enabled {
            return Strategy::Deterministic;
        }
        let bucket = u16::from(bucket);
        let generative = u16::from(self.generative_percent);
        let semantic = u16::from(self.semantic_percent);
        if bucket < generative {
            Strategy::SemanticGenerative
        } else if bucket < generative + semantic {
            Strategy::SemanticDeterministic
        } else {
            Strategy::Deterministic
        }
    }
}

/// Which optional collaborators this process actually has
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Capabilities {
    pub semantic: bool,
    pub generative: bool,
}

impl Capabilities {
    /// Nearest runnable strategy to `wanted`
    pub fn degrade(&self, wanted: Strategy) -> Strategy {
        match wanted {
            Strategy::SemanticGenerative if self.generative && self.semantic => wanted,
            Strategy::SemanticGenerative | Strategy::SemanticDeterministic if self.semantic => {
                Strategy::SemanticDeterministic
            }
            _ => Strategy::Deterministic,
        }
    }
}

/// Outcome of routing one request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Assignment {
    pub bucket: u8,
    /// Arm chosen by config or override
    pub requested: Strategy,
    /// Arm that will actually run
    pub strategy: Strategy,
    pub overridden: bool,
}

/// Bucket in `[0, 100)` derived from the profile fingerprint
pub fn bucket_for(fingerprint: &str) -> u8 {
    let digest = Sha256::digest(fingerprint.as_bytes());
    let mut prefix = [0u8; 8];
    prefix.copy_from_slice(&digest[..8]);
    (u64::from_be_bytes(prefix) % BUCKETS) as u8
}

/// Shareable, hot-swappable router handle
#[derive(Debug, Clone)]
pub struct ExperimentRouter {
    config: Arc<RwLock<ExperimentConfig>>,
}

impl ExperimentRouter {
    pub fn new(config: ExperimentConfig) -> Self {
        Self {
            config: Arc::new(RwLock::new(config)),
        }
    }

    /// Current configuration snapshot
    pub fn snapshot(&self) -> ExperimentConfig {
        self.config
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Replace the configuration; in-flight requests keep the snapshot they took
    pub fn update(&self, config: ExperimentConfig) -> Result<ExperimentConfig> {
        config.validate()?;
        let mut guard = self.config.write().unwrap_or_else(PoisonError::into_inner);
        let previous = std::mem::replace(&mut *guard, config.clone());
        info!(
            enabled = config.enabled,
            semantic_percent = config.semantic_percent,
            generative_percent = config.generative_percent,
            "Experiment configuration updated"
        );
        Ok(previous)
    }

    /// Route one request; an explicit override always wins over the split
    pub fn assign(
        &self,
        fingerprint: &str,
        override_strategy: Option<Strategy>,
        capabilities: Capabilities,
    ) -> Assignment {
        let bucket = bucket_for(fingerprint);
        let requested = match override_strategy {
            Some(strategy) => strategy,
            None => self.snapshot().strategy_for_bucket(bucket),
        };
        Assignment {
            bucket,
            requested,
            strategy: capabilities.degrade(requested),
            overridden: override_strategy.is_some(),
        }
    }
}

impl Default for ExperimentRouter {
    fn default() -> Self {
        Self::new(ExperimentConfig::default())
    }
}
