// Prompt templates for the LLM-backed resume review.
// The JSON-only system fragment lives in llm_client::prompts.

use crate::llm_client::prompts::JSON_ONLY_SYSTEM;

/// Longest resume excerpt sent to the model, in characters.
pub const MAX_RESUME_CHARS: usize = 24_000;

pub const RESUME_REVIEW_ROLE: &str = "\
You are a senior technical recruiter reviewing a candidate's resume. \
Judge clarity, structure, quantified impact, relevance of skills and formatting. \
Be specific and constructive; never invent facts about the candidate.";

/// Review prompt. Replace `{filename}` and `{resume_text}` before sending.
pub const RESUME_REVIEW_PROMPT: &str = r#"Review the resume below and score it.

FILE: {filename}

RESUME TEXT:
{resume_text}

Return a JSON object with this EXACT schema (no extra fields):
{
  "score": 0-100 integer,
  "feedback": ["observation about what the resume does well or poorly", "..."],
  "suggestions": ["concrete, actionable change the candidate should make", "..."]
}

Rules:
- score: 90+ outstanding, 75-89 good, 60-74 fair, below 60 needs significant work.
- feedback: 3 to 6 items, most important first.
- suggestions: 3 to 6 items, each one a single actionable sentence.
- If the text is unreadable or is clearly not a resume, score below 20 and say so in feedback."#;

pub fn review_system_prompt() -> String {
    format!("{RESUME_REVIEW_ROLE} {JSON_ONLY_SYSTEM}")
}

/// Fills the review template, cutting the resume text to `MAX_RESUME_CHARS`.
pub fn build_review_prompt(filename: &str, resume_text: &str) -> String {
    let excerpt = match resume_text.char_indices().nth(MAX_RESUME_CHARS) {
        Some((idx, _)) => &resume_text[..idx],
        None => resume_text,
    };
    RESUME_REVIEW_PROMPT
        .replace("{filename}", filename)
        .replace("{resume_text}", excerpt.trim())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_build_review_prompt_fills_placeholders() {
        let prompt = build_review_prompt("resume.pdf", "  Jane Doe\nRust engineer  ");
        assert!(prompt.contains("FILE: resume.pdf"));
        assert!(prompt.contains("Jane Doe\nRust engineer"));
        assert!(!prompt.contains("{resume_text}"));
    }

    #[test]
    fn test_build_review_prompt_truncates_long_text() {
        let long = "x".repeat(MAX_RESUME_CHARS + 500);
        let prompt = build_review_prompt("cv.pdf", &long);
        assert!(prompt.len() < RESUME_REVIEW_PROMPT.len() + MAX_RESUME_CHARS + 20);
    }

    #[test]
    fn test_system_prompt_demands_json() {
        assert!(review_system_prompt().contains("valid JSON only"));
    }
}
