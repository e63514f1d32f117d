//! OpenRouter chat-completion client
//!
//! Speaks the OpenAI-style completions wire format: a JSON body for buffered
//! calls, and `data: {...}` SSE lines terminated by `data: [DONE]` when
//! streaming.

use async_trait::async_trait;
use futures_util::StreamExt;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;

use crate::config::LlmConfig;
use crate::error::{Error, Result};
use crate::types::ChatMessage;

use super::{ChatProvider, ChatRequest, ChunkStream, ModelInfo};

/// OpenRouter API client
pub struct OpenRouterClient {
    client: Client,
    config: LlmConfig,
}

#[derive(Serialize)]
struct CompletionBody {
    model: String,
    messages: Vec<ChatMessage>,
    max_tokens: u32,
    temperature: f32,
    stream: bool,
}

#[derive(Deserialize)]
struct CompletionResponse {
    choices: Vec<CompletionChoice>,
}

#[derive(Deserialize)]
struct CompletionChoice {
    message: CompletionMessage,
}

#[derive(Deserialize)]
struct CompletionMessage {
    content: Option<String>,
}

#[derive(Deserialize)]
struct StreamChunk {
    choices: Vec<StreamChoice>,
}

#[derive(Deserialize)]
struct StreamChoice {
    delta: StreamDelta,
}

#[derive(Deserialize)]
struct StreamDelta {
    content: Option<String>,
}

#[derive(Deserialize)]
struct ModelListResponse {
    data: Vec<ModelInfo>,
}

impl OpenRouterClient {
    pub fn new(config: &LlmConfig) -> Self {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .pool_max_idle_per_host(5)
            .build()
            .expect("Failed to create HTTP client");

        Self {
            client,
            config: config.clone(),
        }
    }

    fn require_api_key(&self) -> Result<&str> {
        if self.config.api_key.is_empty() {
            return Err(Error::Config("Completion API key is not configured".to_string()));
        }
        Ok(&self.config.api_key)
    }

    fn completion_body(&self, request: &ChatRequest, stream: bool) -> CompletionBody {
        let mut messages = Vec::with_capacity(request.messages.len() + 1);
        messages.push(ChatMessage {
            role: crate::types::MessageRole::System,
            content: request.system_prompt.clone(),
        });
        messages.extend(request.messages.iter().cloned());

        CompletionBody {
            model: request.model.clone(),
            messages,
            max_tokens: self.config.max_tokens,
            temperature: self.config.temperature,
            stream,
        }
    }

    async fn send_completion(&self, request: &ChatRequest, stream: bool) -> Result<reqwest::Response> {
        let api_key = self.require_api_key()?;
        let url = format!("{}/chat/completions", self.config.base_url);
        let body = self.completion_body(request, stream);

        let response = self
            .client
            .post(&url)
            .bearer_auth(api_key)
            .header("HTTP-Referer", &self.config.referer)
            .header("X-Title", &self.config.app_title)
            .json(&body)
            .send()
            .await
            .map_err(|e| Error::Llm(format!("Completion request failed: {}", e)))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(Error::Llm(format!(
                "Completion failed: HTTP {} - {}",
                status, body
            )));
        }

        Ok(response)
    }

    async fn fetch_models(&self) -> Result<Vec<ModelInfo>> {
        let url = format!("{}/models", self.config.base_url);

        let response = self
            .client
            .get(&url)
            .bearer_auth(&self.config.api_key)
            .send()
            .await
            .map_err(|e| Error::Llm(format!("Model list request failed: {}", e)))?;

        if !response.status().is_success() {
            return Err(Error::Llm(format!(
                "Model list failed: HTTP {}",
                response.status()
            )));
        }

        let list: ModelListResponse = response
            .json()
            .await
            .map_err(|e| Error::Llm(format!("Failed to parse model list: {}", e)))?;

        Ok(list.data.into_iter().take(20).collect())
    }
}

#[async_trait]
impl ChatProvider for OpenRouterClient {
    async fn complete(&self, request: &ChatRequest) -> Result<String> {
        tracing::info!("Running completion with model {}", request.model);

        let response = self.send_completion(request, false).await?;

        let completion: CompletionResponse = response
            .json()
            .await
            .map_err(|e| Error::Llm(format!("Failed to parse completion response: {}", e)))?;

        completion
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .filter(|content| !content.is_empty())
            .ok_or_else(|| Error::Llm("Upstream returned no completion content".to_string()))
    }

    async fn complete_stream(&self, request: &ChatRequest) -> Result<ChunkStream> {
        tracing::info!("Streaming completion with model {}", request.model);

        let response = self.send_completion(request, true).await?;

        let (tx, rx) = mpsc::channel::<Result<String>>(32);
        let mut bytes = response.bytes_stream();

        tokio::spawn(async move {
            let mut lines = LineBuffer::default();

            'upstream: while let Some(chunk) = bytes.next().await {
                let chunk = match chunk {
                    Ok(chunk) => chunk,
                    Err(e) => {
                        let _ = tx.send(Err(Error::Llm(format!("Stream error: {}", e)))).await;
                        return;
                    }
                };

                for line in lines.push(&String::from_utf8_lossy(&chunk)) {
                    match parse_stream_line(&line) {
                        StreamFrame::Delta(content) => {
                            if tx.send(Ok(content)).await.is_err() {
                                // Receiver gone; stop relaying.
                                return;
                            }
                        }
                        StreamFrame::Done => break 'upstream,
                        StreamFrame::Skip => {}
                    }
                }
            }
        });

        Ok(ReceiverStream::new(rx))
    }

    async fn list_models(&self) -> Result<Vec<ModelInfo>> {
        if self.config.api_key.is_empty() {
            return Ok(fallback_models());
        }

        match self.fetch_models().await {
            Ok(models) => Ok(models),
            Err(e) => {
                tracing::warn!("Falling back to the static model list: {}", e);
                Ok(fallback_models())
            }
        }
    }

    async fn health_check(&self) -> Result<bool> {
        let url = format!("{}/models", self.config.base_url);
        match self.client.get(&url).send().await {
            Ok(response) => Ok(response.status().is_success()),
            Err(_) => Ok(false),
        }
    }

    fn name(&self) -> &'static str {
        "openrouter"
    }
}

/// Models offered when the upstream list is unavailable
fn fallback_models() -> Vec<ModelInfo> {
    [
        ("openai/gpt-3.5-turbo", "GPT-3.5 Turbo"),
        ("openai/gpt-4", "GPT-4"),
        ("anthropic/claude-2", "Claude 2"),
        ("google/gemini-pro", "Gemini Pro"),
    ]
    .into_iter()
    .map(|(id, name)| ModelInfo {
        id: id.to_string(),
        name: name.to_string(),
    })
    .collect()
}

/// Accumulates raw stream bytes and yields complete lines; a line split
/// across two chunks is held back until its terminator arrives.
#[derive(Default)]
struct LineBuffer {
    pending: String,
}

impl LineBuffer {
    fn push(&mut self, chunk: &str) -> Vec<String> {
        self.pending.push_str(chunk);

        let mut lines = Vec::new();
        while let Some(pos) = self.pending.find('\n') {
            let line = self.pending[..pos].trim_end_matches('\r').to_string();
            self.pending.drain(..=pos);
            lines.push(line);
        }
        lines
    }
}

/// One parsed line of the upstream SSE body
enum StreamFrame {
    /// A text delta to forward
    Delta(String),
    /// The `[DONE]` terminator
    Done,
    /// Anything else: empty lines, comments, unparseable payloads
    Skip,
}

fn parse_stream_line(line: &str) -> StreamFrame {
    let Some(data) = line.strip_prefix("data:") else {
        return StreamFrame::Skip;
    };
    let data = data.trim();

    if data == "[DONE]" {
        return StreamFrame::Done;
    }

    match serde_json::from_str::<StreamChunk>(data) {
        Ok(chunk) => chunk
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.delta.content)
            .filter(|content| !content.is_empty())
            .map(StreamFrame::Delta)
            .unwrap_or(StreamFrame::Skip),
        // Skip invalid JSON rather than aborting the stream
        Err(_) => StreamFrame::Skip,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn delta_line(content: &str) -> String {
        format!(
            "data: {}",
            serde_json::json!({"choices": [{"delta": {"content": content}}]})
        )
    }

    #[test]
    fn parses_a_delta_line() {
        match parse_stream_line(&delta_line("Hel")) {
            StreamFrame::Delta(content) => assert_eq!(content, "Hel"),
            _ => panic!("expected a delta"),
        }
    }

    #[test]
    fn recognizes_the_done_terminator() {
        assert!(matches!(parse_stream_line("data: [DONE]"), StreamFrame::Done));
    }

    #[test]
    fn skips_blank_and_malformed_lines() {
        assert!(matches!(parse_stream_line(""), StreamFrame::Skip));
        assert!(matches!(parse_stream_line(": keep-alive"), StreamFrame::Skip));
        assert!(matches!(parse_stream_line("data: {not json"), StreamFrame::Skip));
        assert!(matches!(
            parse_stream_line(r#"data: {"choices":[{"delta":{}}]}"#),
            StreamFrame::Skip
        ));
    }

    #[test]
    fn line_buffer_handles_lines_split_across_chunks() {
        let mut buffer = LineBuffer::default();

        let full = format!("{}\n\n{}", delta_line("Hello"), delta_line(" wor"));
        let (first, second) = full.split_at(full.len() / 2);

        let mut lines = buffer.push(first);
        lines.extend(buffer.push(second));
        lines.extend(buffer.push("\ndata: [DONE]\n"));

        let mut collected = String::new();
        let mut done = false;
        for line in &lines {
            match parse_stream_line(line) {
                StreamFrame::Delta(content) => collected.push_str(&content),
                StreamFrame::Done => done = true,
                StreamFrame::Skip => {}
            }
        }

        assert_eq!(collected, "Hello wor");
        assert!(done);
    }

    #[test]
    fn crlf_terminators_are_stripped() {
        let mut buffer = LineBuffer::default();
        let lines = buffer.push("data: [DONE]\r\n");
        assert_eq!(lines, vec!["data: [DONE]".to_string()]);
    }
}
