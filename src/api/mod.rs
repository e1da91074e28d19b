//! Wire types for the Gemini generateContent API, plus formatting for the
//! error bodies it returns.

use base64::Engine;
use serde::{Deserialize, Serialize};
use serde_json::Value;

pub const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com";

/// One conversation turn on the wire: `role` is `"user"` or `"model"`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Content {
    #[serde(default)]
    pub role: String,
    pub parts: Vec<Part>,
}

impl Content {
    pub fn user(parts: Vec<Part>) -> Self {
        Self {
            role: "user".to_string(),
            parts,
        }
    }

    pub fn model(parts: Vec<Part>) -> Self {
        Self {
            role: "model".to_string(),
            parts,
        }
    }

    /// Concatenated text of all text parts.
    pub fn text(&self) -> String {
        self.parts
            .iter()
            .filter_map(|p| match p {
                Part::Text { text } => Some(text.as_str()),
                Part::InlineData { .. } => None,
            })
            .collect()
    }
}

/// A content part: either text or an inline binary blob. The generateContent
/// JSON shape is `{"text": ...}` or `{"inline_data": {...}}`, hence untagged.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Part {
    Text {
        text: String,
    },
    InlineData {
        inline_data: Blob,
    },
}

impl Part {
    pub fn text(text: impl Into<String>) -> Self {
        Part::Text { text: text.into() }
    }

    pub fn inline(mime_type: impl Into<String>, data: &[u8]) -> Self {
        Part::InlineData {
            inline_data: Blob {
                mime_type: mime_type.into(),
                data: base64::engine::general_purpose::STANDARD.encode(data),
            },
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Blob {
    pub mime_type: String,
    /// Base64-encoded payload.
    pub data: String,
}

#[derive(Debug, Serialize)]
pub struct GenerateContentRequest {
    pub contents: Vec<Content>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tools: Option<Vec<Tool>>,
}

/// The only tool this client configures: Google Search grounding.
#[derive(Debug, Clone, Serialize)]
pub struct Tool {
    pub google_search_retrieval: Value,
}

impl Tool {
    pub fn google_search_retrieval() -> Self {
        Self {
            google_search_retrieval: Value::Object(Default::default()),
        }
    }
}

/// One SSE chunk of a streamed response. Only the candidate text is consumed;
/// an `error` member means the stream failed mid-flight.
#[derive(Debug, Deserialize)]
pub struct GenerateContentChunk {
    #[serde(default)]
    pub candidates: Vec<Candidate>,
    #[serde(default)]
    pub error: Option<Value>,
}

#[derive(Debug, Deserialize)]
pub struct Candidate {
    pub content: Option<Content>,
}

impl GenerateContentChunk {
    /// Text carried by this chunk, if any.
    pub fn text(&self) -> Option<String> {
        let content = self.candidates.first()?.content.as_ref()?;
        let text = content.text();
        if text.is_empty() {
            None
        } else {
            Some(text)
        }
    }
}

/// Streaming endpoint for a model id that already carries its `models/`
/// prefix.
pub fn stream_url(base_url: &str, model_id: &str) -> String {
    format!(
        "{}/v1beta/{}:streamGenerateContent?alt=sse",
        base_url.trim_end_matches('/'),
        model_id
    )
}

fn extract_error_summary(value: &Value) -> Option<String> {
    let summary = value
        .pointer("/error/message")
        .and_then(|v| v.as_str())
        .map(str::to_owned)
        .or_else(|| {
            value.get("error").and_then(|v| match v {
                Value::String(s) => Some(s.to_string()),
                Value::Object(map) => map
                    .get("message")
                    .and_then(|message| message.as_str().map(str::to_owned)),
                _ => None,
            })
        })
        .or_else(|| value.get("message").and_then(|v| v.as_str().map(str::to_owned)));

    summary.map(|text| text.split_whitespace().collect::<Vec<_>>().join(" "))
}

/// Render an API error body as the inline string shown (and recorded) as the
/// assistant's turn. JSON bodies are summarized from their `error.message`.
pub fn format_api_error(error_text: &str) -> String {
    let trimmed = error_text.trim();

    if trimmed.is_empty() {
        return "An error occurred: <empty response>".to_string();
    }

    if let Ok(json_value) = serde_json::from_str::<Value>(trimmed) {
        if let Some(summary) = extract_error_summary(&json_value) {
            if !summary.is_empty() {
                return format!("An error occurred: {summary}");
            }
        }
    }

    format!("An error occurred: {trimmed}")
}
