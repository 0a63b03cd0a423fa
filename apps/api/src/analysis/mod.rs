//! Analysis Engine seam.
//!
//! The engine itself is external. Workers only see `Arc<dyn AnalysisEngine>`,
//! chosen at startup from `ANALYSIS_ENGINE`:
//! - `http`: forwards raw bytes to a remote analysis service.
//! - `llm`: extracts PDF text and asks Claude for a structured review.

use async_trait::async_trait;
use bytes::Bytes;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::documents::models::{DocumentId, DocumentKind};

pub mod http;
pub mod llm;
pub mod prompts;
pub mod rating;

/// A successful review of one document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnalysisOutcome {
    pub score: u8, // 0 – 100
    pub feedback: Vec<String>,
    pub suggestions: Vec<String>,
}

#[derive(Debug, Error)]
pub enum AnalysisError {
    #[error("Analysis engine request failed: {0}")]
    Engine(String),

    #[error("Analysis engine returned an invalid result: {0}")]
    InvalidResponse(String),

    #[error("Cannot analyse {0:?} documents")]
    UnsupportedFormat(DocumentKind),

    #[error("Text extraction failed: {0}")]
    Extraction(String),
}

/// Everything an engine gets to see about a document.
#[derive(Debug, Clone)]
pub struct AnalysisRequest {
    pub document_id: DocumentId,
    pub filename: String,
    pub kind: DocumentKind,
    pub bytes: Bytes,
}

#[async_trait]
pub trait AnalysisEngine: Send + Sync {
    fn name(&self) -> &'static str;

    async fn analyze(&self, request: &AnalysisRequest) -> Result<AnalysisOutcome, AnalysisError>;
}

/// Engine payload as received on the wire, before range and emptiness checks.
#[derive(Debug, Clone, Deserialize)]
pub struct RawAnalysis {
    pub score: f64,
    #[serde(default)]
    pub feedback: Vec<String>,
    #[serde(default)]
    pub suggestions: Vec<String>,
}

impl RawAnalysis {
    /// Rejects anything that would break the Completed-document invariants:
    /// a score outside 0–100, or no feedback / no suggestions.
    /// Fractional scores are rounded.
    pub fn into_outcome(self) -> Result<AnalysisOutcome, AnalysisError> {
        if !self.score.is_finite() || !(0.0..=100.0).contains(&self.score) {
            return Err(AnalysisError::InvalidResponse(format!(
                "score {} is outside 0-100",
                self.score
            )));
        }

        let feedback = non_blank(self.feedback);
        let suggestions = non_blank(self.suggestions);
        if feedback.is_empty() {
            return Err(AnalysisError::InvalidResponse(
                "no feedback returned".to_string(),
            ));
        }
        if suggestions.is_empty() {
            return Err(AnalysisError::InvalidResponse(
                "no suggestions returned".to_string(),
            ));
        }

        Ok(AnalysisOutcome {
            score: self.score.round() as u8,
            feedback,
            suggestions,
        })
    }
}

fn non_blank(items: Vec<String>) -> Vec<String> {
    items
        .into_iter()
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn raw(score: f64, feedback: &[&str], suggestions: &[&str]) -> RawAnalysis {
        RawAnalysis {
            score,
            feedback: feedback.iter().map(|s| s.to_string()).collect(),
            suggestions: suggestions.iter().map(|s| s.to_string()).collect(),
        }
    }

    #[test]
    fn test_valid_result_passes() {
        let outcome = raw(82.0, &["Strong summary"], &["Add metrics"])
            .into_outcome()
            .unwrap();
        assert_eq!(outcome.score, 82);
        assert_eq!(outcome.feedback, vec!["Strong summary"]);
    }

    #[test]
    fn test_fractional_score_is_rounded() {
        let outcome = raw(89.6, &["ok"], &["ok"]).into_outcome().unwrap();
        assert_eq!(outcome.score, 90);
    }

    #[test]
    fn test_out_of_range_score_is_rejected() {
        for score in [-1.0, 100.5, f64::NAN] {
            let err = raw(score, &["a"], &["b"]).into_outcome().unwrap_err();
            assert!(matches!(err, AnalysisError::InvalidResponse(_)), "{score}");
        }
    }

    #[test]
    fn test_blank_feedback_is_rejected() {
        let err = raw(70.0, &["  ", ""], &["b"]).into_outcome().unwrap_err();
        assert!(err.to_string().contains("no feedback"));

        let err = raw(70.0, &["a"], &[]).into_outcome().unwrap_err();
        assert!(err.to_string().contains("no suggestions"));
    }

    #[test]
    fn test_missing_lists_deserialize_as_empty() {
        let parsed: RawAnalysis = serde_json::from_str(r#"{"score": 50}"#).unwrap();
        assert!(parsed.feedback.is_empty());
        assert!(parsed.into_outcome().is_err());
    }
}
