//! Chat sessions against the Gemini streaming endpoint.
//!
//! [`ChatSession`] owns the replayable turn history for one conversation,
//! seeded so the gem's prompt conditions every turn without ever appearing as
//! a visible message. [`ChatStreamService`] performs the actual SSE call and
//! fans text chunks into an mpsc channel that the UI drains between frames.

use futures_util::StreamExt;
use memchr::memchr;
use tokio::sync::mpsc;
use tracing::debug;

use crate::api::{
    format_api_error, stream_url, Content, GenerateContentChunk, GenerateContentRequest, Part, Tool,
};
use crate::core::models;
use crate::core::transcript::{HistoryTurn, Transcript};
use crate::core::uploads::Attachment;

/// Synthetic acknowledgment injected as the first model turn so the persona
/// prompt reads as an answered instruction rather than a dangling message.
pub const SEED_ACK: &str = "Understood. I'm ready.";

#[derive(Clone, Debug)]
pub enum StreamMessage {
    Chunk(String),
    Error(String),
    End,
}

/// In-memory handle for one conversation's API history.
pub struct ChatSession {
    model_name: String,
    grounding_enabled: bool,
    history: Vec<Content>,
}

impl ChatSession {
    /// Start a fresh session. The requested grounding flag is clamped by the
    /// model's capability: asking for grounding on an unsupported model
    /// yields an effective `false`.
    pub fn new(model_id: impl Into<String>, requested_grounding: bool, gem_prompt: &str) -> Self {
        let model_name = model_id.into();
        let grounding_enabled = models::effective_grounding(&model_name, requested_grounding);
        let history = vec![
            Content::user(vec![Part::text(gem_prompt)]),
            Content::model(vec![Part::text(SEED_ACK)]),
        ];
        Self {
            model_name,
            grounding_enabled,
            history,
        }
    }

    /// Rebuild a session from a persisted transcript's API history. The seed
    /// pair is part of that history, so nothing is re-injected.
    pub fn resume(transcript: &Transcript) -> Self {
        let history = transcript
            .api_history
            .iter()
            .map(|turn| Content {
                role: turn.role.clone(),
                parts: turn.parts.iter().map(|text| Part::text(text.clone())).collect(),
            })
            .collect();
        Self {
            model_name: transcript.model_name.clone(),
            grounding_enabled: transcript.grounding_enabled,
            history,
        }
    }

    pub fn model_name(&self) -> &str {
        &self.model_name
    }

    pub fn grounding_enabled(&self) -> bool {
        self.grounding_enabled
    }

    /// Append the user's turn (attachments first, then the prompt text) and
    /// return the full contents for the outbound request.
    pub fn push_user_turn(&mut self, prompt: &str, attachments: &[Attachment]) -> Vec<Content> {
        let mut parts: Vec<Part> = attachments
            .iter()
            .map(|a| Part::inline(a.mime_type.clone(), &a.data))
            .collect();
        parts.push(Part::text(prompt));
        self.history.push(Content::user(parts));
        self.history.clone()
    }

    /// Record the completed (or error-substituted) model response.
    pub fn push_model_turn(&mut self, text: &str) {
        self.history.push(Content::model(vec![Part::text(text)]));
    }

    /// The canonical serializable history: `{role, parts:[text,...]}` turns.
    /// Inline attachment parts are replaced with a placeholder so the history
    /// remains a pure-text record that can seed a resumed session.
    pub fn export_history(&self) -> Vec<HistoryTurn> {
        self.history
            .iter()
            .map(|content| HistoryTurn {
                role: content.role.clone(),
                parts: content
                    .parts
                    .iter()
                    .map(|part| match part {
                        Part::Text { text } => text.clone(),
                        Part::InlineData { inline_data } => {
                            format!("[attachment: {}]", inline_data.mime_type)
                        }
                    })
                    .collect(),
            })
            .collect()
    }
}

pub struct StreamParams {
    pub client: reqwest::Client,
    pub base_url: String,
    pub api_key: String,
    pub model: String,
    pub contents: Vec<Content>,
    pub grounding_enabled: bool,
    pub stream_id: u64,
}

/// Fans streamed response chunks into a channel keyed by stream id. Every
/// stream terminates with exactly one `End`, preceded by an `Error` when the
/// call failed. A started stream is always drained: there is no cancellation.
#[derive(Clone)]
pub struct ChatStreamService {
    tx: mpsc::UnboundedSender<(StreamMessage, u64)>,
}

impl ChatStreamService {
    pub fn new() -> (Self, mpsc::UnboundedReceiver<(StreamMessage, u64)>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }

    pub fn spawn_stream(&self, params: StreamParams) {
        let tx = self.tx.clone();
        tokio::spawn(async move {
            let StreamParams {
                client,
                base_url,
                api_key,
                model,
                contents,
                grounding_enabled,
                stream_id,
            } = params;

            let request = GenerateContentRequest {
                contents,
                tools: grounding_enabled.then(|| vec![Tool::google_search_retrieval()]),
            };

            debug!(%model, stream_id, grounding_enabled, "starting generate stream");

            let response = client
                .post(stream_url(&base_url, &model))
                .header("Content-Type", "application/json")
                .header("x-goog-api-key", &api_key)
                .json(&request)
                .send()
                .await;

            let response = match response {
                Ok(response) => response,
                Err(e) => {
                    let _ = tx.send((StreamMessage::Error(format_api_error(&e.to_string())), stream_id));
                    let _ = tx.send((StreamMessage::End, stream_id));
                    return;
                }
            };

            if !response.status().is_success() {
                let body = response
                    .text()
                    .await
                    .unwrap_or_else(|_| "<no body>".to_string());
                let _ = tx.send((StreamMessage::Error(format_api_error(&body)), stream_id));
                let _ = tx.send((StreamMessage::End, stream_id));
                return;
            }

            let mut stream = response.bytes_stream();
            let mut buffer: Vec<u8> = Vec::new();

            while let Some(chunk) = stream.next().await {
                let chunk_bytes = match chunk {
                    Ok(bytes) => bytes,
                    Err(e) => {
                        let _ = tx.send((
                            StreamMessage::Error(format_api_error(&e.to_string())),
                            stream_id,
                        ));
                        let _ = tx.send((StreamMessage::End, stream_id));
                        return;
                    }
                };
                buffer.extend_from_slice(&chunk_bytes);

                while let Some(newline_pos) = memchr(b'\n', &buffer) {
                    let line = match std::str::from_utf8(&buffer[..newline_pos]) {
                        Ok(s) => s.trim().to_string(),
                        Err(_) => {
                            buffer.drain(..=newline_pos);
                            continue;
                        }
                    };
                    buffer.drain(..=newline_pos);

                    if process_sse_line(&line, &tx, stream_id) {
                        return;
                    }
                }
            }

            let _ = tx.send((StreamMessage::End, stream_id));
        });
    }

    #[cfg(test)]
    pub fn send_for_test(&self, message: StreamMessage, stream_id: u64) {
        let _ = self.tx.send((message, stream_id));
    }
}

/// Handle one SSE line. Returns true when the stream should stop.
fn process_sse_line(
    line: &str,
    tx: &mpsc::UnboundedSender<(StreamMessage, u64)>,
    stream_id: u64,
) -> bool {
    let Some(payload) = line.strip_prefix("data:").map(str::trim_start) else {
        return false;
    };
    if payload.is_empty() {
        return false;
    }

    match serde_json::from_str::<GenerateContentChunk>(payload) {
        Ok(chunk) => {
            if chunk.error.is_some() {
                let _ = tx.send((StreamMessage::Error(format_api_error(payload)), stream_id));
                let _ = tx.send((StreamMessage::End, stream_id));
                return true;
            }
            if let Some(text) = chunk.text() {
                let _ = tx.send((StreamMessage::Chunk(text), stream_id));
            }
            false
        }
        Err(_) => {
            // Anything undecodable mid-stream is an error body.
            let _ = tx.send((StreamMessage::Error(format_api_error(payload)), stream_id));
            let _ = tx.send((StreamMessage::End, stream_id));
            true
        }
    }
}
