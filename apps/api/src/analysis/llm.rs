use async_trait::async_trait;
use bytes::Bytes;
use tracing::{debug, info};

use super::prompts::{build_review_prompt, review_system_prompt};
use super::{AnalysisEngine, AnalysisError, AnalysisOutcome, AnalysisRequest, RawAnalysis};
use crate::documents::models::DocumentKind;
use crate::llm_client::LlmClient;

/// Below this many characters of extracted text the PDF is treated as a scan
/// with no text layer.
const MIN_TEXT_CHARS: usize = 40;

/// Resume review via Claude. Only PDFs carry a text layer we can extract
/// in-process; DOC/DOCX are reported as unsupported.
pub struct LlmAnalysisEngine {
    llm: LlmClient,
}

impl LlmAnalysisEngine {
    pub fn new(llm: LlmClient) -> Self {
        Self { llm }
    }
}

#[async_trait]
impl AnalysisEngine for LlmAnalysisEngine {
    fn name(&self) -> &'static str {
        "llm"
    }

    async fn analyze(&self, request: &AnalysisRequest) -> Result<AnalysisOutcome, AnalysisError> {
        let text = extract_text(request.kind, request.bytes.clone()).await?;
        debug!(
            "Extracted {} chars from {}",
            text.chars().count(),
            request.document_id
        );

        let prompt = build_review_prompt(&request.filename, &text);
        let raw: RawAnalysis = self
            .llm
            .call_json(&prompt, &review_system_prompt())
            .await
            .map_err(|e| AnalysisError::Engine(format!("LLM review failed: {e}")))?;

        let outcome = raw.into_outcome()?;
        info!(
            "LLM review of {} scored {}",
            request.document_id, outcome.score
        );
        Ok(outcome)
    }
}

/// PDF parsing is CPU-bound, so it runs on the blocking pool.
async fn extract_text(kind: DocumentKind, bytes: Bytes) -> Result<String, AnalysisError> {
    if kind != DocumentKind::Pdf {
        return Err(AnalysisError::UnsupportedFormat(kind));
    }

    let text = tokio::task::spawn_blocking(move || pdf_extract::extract_text_from_mem(&bytes))
        .await
        .map_err(|e| AnalysisError::Extraction(format!("extraction task failed: {e}")))?
        .map_err(|e| AnalysisError::Extraction(e.to_string()))?;

    let text = normalize_whitespace(&text);
    if text.chars().count() < MIN_TEXT_CHARS {
        return Err(AnalysisError::Extraction(
            "no readable text layer (scanned document?)".to_string(),
        ));
    }
    Ok(text)
}

/// Collapses runs of blank lines and trailing spaces left by PDF layout.
fn normalize_whitespace(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut blank_run = 0;
    for line in text.lines().map(str::trim_end) {
        if line.trim().is_empty() {
            blank_run += 1;
            if blank_run > 1 {
                continue;
            }
        } else {
            blank_run = 0;
        }
        out.push_str(line);
        out.push('\n');
    }
    out.trim().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_whitespace() {
        let text = "Jane Doe   \n\n\n\nExperience\n  Acme  \n\n";
        assert_eq!(normalize_whitespace(text), "Jane Doe\n\nExperience\n  Acme");
    }

    #[tokio::test]
    async fn test_word_documents_are_unsupported() {
        for kind in [DocumentKind::Doc, DocumentKind::Docx] {
            let err = extract_text(kind, Bytes::from_static(b"PK\x03\x04"))
                .await
                .unwrap_err();
            assert!(matches!(err, AnalysisError::UnsupportedFormat(k) if k == kind));
        }
    }

    #[tokio::test]
    async fn test_garbage_pdf_fails_extraction() {
        let err = extract_text(DocumentKind::Pdf, Bytes::from_static(b"not a pdf"))
            .await
            .unwrap_err();
        assert!(matches!(err, AnalysisError::Extraction(_)));
    }
}
