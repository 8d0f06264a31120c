//! API request and response types

use serde::Deserialize;
use serde::Serialize;
use serde_json::Value;

use crate::analytics::AnalyticsSnapshot;
use crate::cache::CacheStats;
use crate::models::MatchOptions;
use crate::models::RawProfileInput;
use crate::pipeline::PipelineStatus;
use crate::router::ExperimentConfig;

/// Standard API response wrapper
#[derive(Debug, Serialize, Deserialize)]
pub struct ApiResponse<T> {
    pub success: bool,
    pub data: Option<T>,
    pub error: Option<String>,
}

impl<T> ApiResponse<T> {
    pub fn success(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(message.into()),
        }
    }
}

/// Health check response
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub pipeline: PipelineStatus,
}

/// Match request body
///
/// The questionnaire answers go in `profile`; a body without that key is
/// read as the answers themselves.
#[derive(Debug, Deserialize)]
pub struct MatchRequest {
    #[serde(default)]
    pub profile: Option<Value>,
    #[serde(default)]
    pub options: MatchOptions,
    #[serde(flatten)]
    pub inline: serde_json::Map<String, Value>,
}

impl MatchRequest {
    pub fn into_parts(self) -> (RawProfileInput, MatchOptions) {
        let raw = match self.profile {
            Some(profile) => RawProfileInput::from_value(profile),
            None => RawProfileInput::from_value(Value::Object(self.inline)),
        };
        (raw, self.options)
    }
}

/// Statistics response
#[derive(Debug, Serialize)]
pub struct StatsResponse {
    pub matches: AnalyticsSnapshot,
    pub cache: CacheStats,
    pub cache_hit_rate: f64,
    pub experiment: ExperimentConfig,
}

/// Result of an experiment hot-swap
#[derive(Debug, Serialize)]
pub struct ExperimentUpdateResponse {
    pub previous: ExperimentConfig,
    pub current: ExperimentConfig,
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::models::Strategy;

    #[test]
    fn test_match_request_with_profile_key() {
        let request: MatchRequest = serde_json::from_value(json!({
            "profile": {"grade": "upper", "interests": ["art"]},
            "options": {"strategy": "deterministic"}
        }))
        .unwrap();
        let (raw, options) = request.into_parts();
        assert!(raw.grade.is_some());
        assert_eq!(options.strategy, Some(Strategy::Deterministic));
    }

    #[test]
    fn test_match_request_inline_answers() {
        let request: MatchRequest =
            serde_json::from_value(json!({"grade": "middle", "familyValues": "kindness"})).unwrap();
        let (raw, options) = request.into_parts();
        assert!(raw.grade.is_some());
        assert!(raw.family_values.is_some());
        assert!(options.strategy.is_none());
        assert!(!options.overrides_shortlist());
    }

    #[test]
    fn test_error_envelope() {
        let body = serde_json::to_value(ApiResponse::<()>::error("bad")).unwrap();
        assert_eq!(body, json!({"success": false, "data": null, "error": "bad"}));
    }
}
