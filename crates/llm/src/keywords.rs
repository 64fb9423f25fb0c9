//! Keyword-extraction post-processing of completion text.
//!
//! Keyword prompts ask the model for a JSON object, but models often wrap it
//! in prose or code fences. This is pure text processing; no I/O.

use serde::{Deserialize, Serialize};

/// Returns the substring from the first `{` to the last `}`, inclusive.
///
/// `None` if the text contains no such span.
pub fn locate_json_body(text: &str) -> Option<&str> {
    let start = text.find('{')?;
    let end = text.rfind('}')?;
    (end > start).then(|| &text[start..=end])
}

/// Applies keyword-extraction post-processing to a finished completion.
///
/// Falls back to the unmodified text when no JSON body is present; callers
/// must validate the result.
pub fn extract_json_or_raw(text: String) -> String {
    if let Some(body) = locate_json_body(&text) {
        return body.to_string();
    }
    tracing::warn!(
        chars = text.chars().count(),
        "keyword extraction found no JSON body, returning raw completion"
    );
    text
}

/// Structured keywords requested from the model by a RAG query.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeywordExtraction {
    /// Broad themes of the query.
    #[serde(default)]
    pub high_level_keywords: Vec<String>,
    /// Specific entities and terms in the query.
    #[serde(default)]
    pub low_level_keywords: Vec<String>,
}

impl KeywordExtraction {
    /// Locates and parses the keyword object inside `text`.
    pub fn from_completion(text: &str) -> Option<Self> {
        let body = locate_json_body(text)?;
        match serde_json::from_str(body) {
            Ok(keywords) => Some(keywords),
            Err(err) => {
                tracing::debug!(error = %err, "keyword body is not valid JSON");
                None
            }
        }
    }
}
