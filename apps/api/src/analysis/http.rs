use async_trait::async_trait;
use reqwest::Client;
use tracing::debug;

use super::{AnalysisEngine, AnalysisError, AnalysisOutcome, AnalysisRequest, RawAnalysis};

/// Forwards raw document bytes to a remote analysis service.
///
/// Wire contract: `POST <url>` with the document as the body and its MIME
/// type as `content-type`; the service answers
/// `{"score": 0-100, "feedback": [..], "suggestions": [..]}`.
/// Timeouts are enforced by the worker, not here.
#[derive(Clone)]
pub struct HttpAnalysisEngine {
    client: Client,
    url: String,
}

impl HttpAnalysisEngine {
    pub fn new(url: String) -> Self {
        Self {
            client: Client::new(),
            url,
        }
    }
}

#[async_trait]
impl AnalysisEngine for HttpAnalysisEngine {
    fn name(&self) -> &'static str {
        "http"
    }

    async fn analyze(&self, request: &AnalysisRequest) -> Result<AnalysisOutcome, AnalysisError> {
        let response = self
            .client
            .post(&self.url)
            .header("content-type", request.kind.mime_type())
            .header("x-document-id", request.document_id.to_string())
            .header("x-document-filename", &request.filename)
            .body(request.bytes.clone())
            .send()
            .await
            .map_err(|e| AnalysisError::Engine(e.to_string()))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| AnalysisError::Engine(e.to_string()))?;

        if !status.is_success() {
            return Err(AnalysisError::Engine(format!(
                "engine returned {status}: {}",
                truncate(&body, 200)
            )));
        }

        debug!(
            "Analysis engine answered for {} ({} bytes)",
            request.document_id,
            body.len()
        );
        parse_engine_response(&body)
    }
}

pub(crate) fn parse_engine_response(body: &str) -> Result<AnalysisOutcome, AnalysisError> {
    let raw: RawAnalysis = serde_json::from_str(body)
        .map_err(|e| AnalysisError::InvalidResponse(format!("malformed JSON: {e}")))?;
    raw.into_outcome()
}

fn truncate(text: &str, max_chars: usize) -> &str {
    match text.char_indices().nth(max_chars) {
        Some((idx, _)) => &text[..idx],
        None => text,
    }
}
