use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::state::RequestState;

/// Clinical urgency, ordered from least to most severe. Serialized with the
/// exact Spanish wire values the structured-completion contract fixes; any
/// other string is a parse failure, never coerced.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum UrgencyLevel {
    #[serde(rename = "Baja")]
    Low,
    #[serde(rename = "Moderada")]
    Moderate,
    #[serde(rename = "Alta")]
    High,
    #[serde(rename = "Crítica")]
    Critical,
}

/// Structured triage output, built fresh per request from the external
/// collaborator's schema-constrained response and never persisted.
///
/// Deserialization is strict: every field is required and the urgency enum is
/// closed, so a malformed response can never yield a partially-populated
/// recommendation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TriageRecommendation {
    pub diagnosis: String,
    pub icd10_code: String,
    pub urgency_level: UrgencyLevel,
    pub specialty_referral: String,
    /// Brief clinical justification, advisory ~30 word bound.
    pub reasoning: String,
    /// Ordered, possibly empty.
    pub recommended_lab_tests: Vec<String>,
}

/// Parse the raw structured-completion text into a recommendation.
///
/// Models occasionally wrap JSON in a markdown fence even when told not to,
/// so one fence-stripping retry is allowed. Anything that still does not
/// match the schema yields `None`.
pub fn parse_recommendation(raw: &str) -> Option<TriageRecommendation> {
    let trimmed = raw.trim();
    if let Ok(parsed) = serde_json::from_str::<TriageRecommendation>(trimmed) {
        return Some(parsed);
    }

    let unfenced = strip_code_fence(trimmed);
    match serde_json::from_str::<TriageRecommendation>(unfenced) {
        Ok(parsed) => Some(parsed),
        Err(e) => {
            warn!("triage response did not match schema: {}", e);
            None
        }
    }
}

fn strip_code_fence(text: &str) -> &str {
    let text = text
        .strip_prefix("```json")
        .or_else(|| text.strip_prefix("```"))
        .unwrap_or(text);
    text.strip_suffix("```").unwrap_or(text).trim()
}

/// Visible state of the triage modal, derived from the flow's request state:
/// loading while the call is in flight, ready on a parsed recommendation,
/// and closed otherwise. A null result never renders content.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "state", content = "recommendation", rename_all = "snake_case")]
pub enum TriageModalState {
    Closed,
    Loading,
    Ready(TriageRecommendation),
}

impl From<&RequestState<Option<TriageRecommendation>>> for TriageModalState {
    fn from(state: &RequestState<Option<TriageRecommendation>>) -> Self {
        match state {
            RequestState::Pending => TriageModalState::Loading,
            RequestState::Succeeded(Some(recommendation)) => {
                TriageModalState::Ready(recommendation.clone())
            }
            _ => TriageModalState::Closed,
        }
    }
}
