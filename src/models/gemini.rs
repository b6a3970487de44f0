use async_trait::async_trait;
use futures::StreamExt;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, warn};

use super::traits::{ChatBackend, ModelSession};
use super::types::{GenerationConfig, ModelError, ModelResponse, StreamCallback, TokenUsage};
use crate::constants::GEMINI_API_KEY_HEADER;

/// Google Gemini backend talking to the `generateContent` REST API
pub struct GeminiBackend {
    client: Client,
    base_url: String,
    model_name: String,
    generation: GenerationConfig,
}

impl GeminiBackend {
    /// Create a new backend. Without `timeout` requests wait as long as the
    /// HTTP client allows.
    pub fn new(
        base_url: impl Into<String>,
        model_name: impl Into<String>,
        generation: GenerationConfig,
        timeout: Option<Duration>,
    ) -> Result<Self, ModelError> {
        let mut builder = Client::builder();
        if let Some(timeout) = timeout {
            builder = builder.timeout(timeout);
        }

        Ok(Self {
            client: builder.build()?,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            model_name: model_name.into(),
            generation,
        })
    }
}

#[async_trait]
impl ChatBackend for GeminiBackend {
    async fn open_session(&self, api_key: &str) -> Result<Box<dyn ModelSession>, ModelError> {
        if api_key.trim().is_empty() {
            return Err(ModelError::Auth("API key is empty".to_string()));
        }

        debug!(model = %self.model_name, "opening Gemini chat session");

        Ok(Box::new(GeminiSession {
            client: self.client.clone(),
            base_url: self.base_url.clone(),
            model_name: self.model_name.clone(),
            api_key: api_key.to_string(),
            generation: self.generation.clone(),
            history: Vec::new(),
        }))
    }

    fn name(&self) -> &str {
        &self.model_name
    }
}

/// One multi-turn Gemini conversation. The full history is resent with every
/// turn, as the REST API is stateless.
pub struct GeminiSession {
    client: Client,
    base_url: String,
    model_name: String,
    api_key: String,
    generation: GenerationConfig,
    history: Vec<Content>,
}

impl GeminiSession {
    fn endpoint(&self, streaming: bool) -> String {
        if streaming {
            format!(
                "{}/models/{}:streamGenerateContent?alt=sse",
                self.base_url, self.model_name
            )
        } else {
            format!("{}/models/{}:generateContent", self.base_url, self.model_name)
        }
    }

    async fn post(
        &self,
        body: &GenerateContentRequest,
        streaming: bool,
    ) -> Result<reqwest::Response, ModelError> {
        let url = self.endpoint(streaming);
        debug!(%url, turns = body.contents.len(), "sending Gemini request");

        let response = self
            .client
            .post(&url)
            .header(GEMINI_API_KEY_HEADER, &self.api_key)
            .json(body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            warn!(status = status.as_u16(), "Gemini API returned an error");
            return Err(ModelError::from_status(
                status.as_u16(),
                api_error_message(&error_text),
            ));
        }

        Ok(response)
    }

    async fn generate(&self, body: &GenerateContentRequest) -> Result<ModelResponse, ModelError> {
        let response = self.post(body, false).await?;
        let text = response.text().await?;
        let parsed: GenerateContentResponse = serde_json::from_str(&text)
            .map_err(|e| ModelError::InvalidResponse(e.to_string()))?;

        let usage = parsed.usage();
        let content = reply_text(&parsed)?;
        log_usage(usage.as_ref());

        Ok(ModelResponse {
            content,
            usage,
            model_name: self.model_name.clone(),
        })
    }

    async fn stream(
        &self,
        body: &GenerateContentRequest,
        callback: StreamCallback,
    ) -> Result<ModelResponse, ModelError> {
        let response = self.post(body, true).await?;
        let mut stream = response.bytes_stream();
        let mut lines = SseLineBuffer::default();
        let mut reply = StreamedReply::default();

        while let Some(chunk) = stream.next().await {
            let chunk = chunk?;
            for line in lines.push(&chunk) {
                reply.accept_line(&line, &callback)?;
            }
        }
        if let Some(line) = lines.finish() {
            reply.accept_line(&line, &callback)?;
        }

        log_usage(reply.usage.as_ref());
        reply.into_response(self.model_name.clone())
    }
}

#[async_trait]
impl ModelSession for GeminiSession {
    async fn send_message(
        &mut self,
        text: &str,
        stream_callback: Option<StreamCallback>,
    ) -> Result<ModelResponse, ModelError> {
        let mut contents = self.history.clone();
        contents.push(Content::user(text));
        let body = GenerateContentRequest::new(contents, &self.generation);

        let response = match stream_callback {
            Some(callback) => self.stream(&body, callback).await?,
            None => self.generate(&body).await?,
        };

        self.history.push(Content::user(text));
        self.history.push(Content::model(&response.content));

        Ok(response)
    }

    fn history_len(&self) -> usize {
        self.history.len()
    }
}

fn log_usage(usage: Option<&TokenUsage>) {
    if let Some(usage) = usage {
        debug!(
            prompt = usage.prompt_tokens,
            completion = usage.completion_tokens,
            total = usage.total_tokens,
            "Gemini token usage"
        );
    }
}

/// Pull the human-readable message out of a Gemini error body
fn api_error_message(body: &str) -> String {
    match serde_json::from_str::<ErrorEnvelope>(body) {
        Ok(envelope) => envelope.error.message,
        Err(_) if body.trim().is_empty() => "no error details returned".to_string(),
        Err(_) => body.trim().to_string(),
    }
}

/// Text of the first candidate of a complete (non-streamed) response
fn reply_text(response: &GenerateContentResponse) -> Result<String, ModelError> {
    if let Some(reason) = response.block_reason() {
        return Err(ModelError::Blocked(reason.to_string()));
    }

    let candidate = response
        .candidates
        .first()
        .ok_or_else(|| ModelError::InvalidResponse("no candidates in response".to_string()))?;

    let text = candidate.text();
    if text.is_empty() {
        return Err(empty_reply_error(candidate.finish_reason.as_deref()));
    }

    Ok(text)
}

fn empty_reply_error(finish_reason: Option<&str>) -> ModelError {
    match finish_reason {
        Some(reason) if reason != "STOP" => {
            ModelError::Blocked(format!("finish reason {}", reason))
        }
        _ => ModelError::InvalidResponse("response contained no text".to_string()),
    }
}

/// Splits an SSE byte stream into complete lines, across chunk boundaries
#[derive(Debug, Default)]
struct SseLineBuffer {
    pending: Vec<u8>,
}

impl SseLineBuffer {
    fn push(&mut self, bytes: &[u8]) -> Vec<String> {
        self.pending.extend_from_slice(bytes);
        let mut lines = Vec::new();

        while let Some(pos) = self.pending.iter().position(|b| *b == b'\n') {
            let line: Vec<u8> = self.pending.drain(..=pos).collect();
            let line = String::from_utf8_lossy(&line);
            lines.push(line.trim_end_matches(['\r', '\n']).to_string());
        }

        lines
    }

    fn finish(&mut self) -> Option<String> {
        if self.pending.is_empty() {
            return None;
        }
        let line = String::from_utf8_lossy(&self.pending).trim_end().to_string();
        self.pending.clear();
        Some(line)
    }
}

/// Accumulates the deltas of a streamed reply
#[derive(Debug, Default)]
struct StreamedReply {
    text: String,
    usage: Option<TokenUsage>,
    finish_reason: Option<String>,
}

impl StreamedReply {
    fn accept_line(&mut self, line: &str, callback: &StreamCallback) -> Result<(), ModelError> {
        let Some(data) = line.strip_prefix("data:") else {
            return Ok(());
        };
        let data = data.trim();
        if data.is_empty() || data == "[DONE]" {
            return Ok(());
        }

        let chunk: GenerateContentResponse = serde_json::from_str(data)
            .map_err(|e| ModelError::InvalidResponse(e.to_string()))?;

        if let Some(reason) = chunk.block_reason() {
            return Err(ModelError::Blocked(reason.to_string()));
        }
        if let Some(usage) = chunk.usage() {
            self.usage = Some(usage);
        }
        if let Some(candidate) = chunk.candidates.first() {
            let delta = candidate.text();
            if !delta.is_empty() {
                callback(&delta);
                self.text.push_str(&delta);
            }
            if candidate.finish_reason.is_some() {
                self.finish_reason = candidate.finish_reason.clone();
            }
        }

        Ok(())
    }

    fn into_response(self, model_name: String) -> Result<ModelResponse, ModelError> {
        if self.text.is_empty() {
            return Err(empty_reply_error(self.finish_reason.as_deref()));
        }
        Ok(ModelResponse {
            content: self.text,
            usage: self.usage,
            model_name,
        })
    }
}

// Wire structures for the Gemini REST API

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateContentRequest {
    contents: Vec<Content>,
    #[serde(skip_serializing_if = "Option::is_none")]
    generation_config: Option<GenerationParams>,
}

impl GenerateContentRequest {
    fn new(contents: Vec<Content>, generation: &GenerationConfig) -> Self {
        let generation_config = (!generation.is_empty()).then(|| GenerationParams {
            temperature: generation.temperature,
            max_output_tokens: generation.max_output_tokens,
            top_p: generation.top_p,
        });
        Self {
            contents,
            generation_config,
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerationParams {
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_output_tokens: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    top_p: Option<f32>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct Content {
    #[serde(default)]
    role: String,
    #[serde(default)]
    parts: Vec<Part>,
}

impl Content {
    fn user(text: &str) -> Self {
        Self {
            role: "user".to_string(),
            parts: vec![Part {
                text: Some(text.to_string()),
            }],
        }
    }

    fn model(text: &str) -> Self {
        Self {
            role: "model".to_string(),
            parts: vec![Part {
                text: Some(text.to_string()),
            }],
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct Part {
    #[serde(skip_serializing_if = "Option::is_none")]
    text: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GenerateContentResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
    #[serde(default)]
    prompt_feedback: Option<PromptFeedback>,
    #[serde(default)]
    usage_metadata: Option<UsageMetadata>,
}

impl GenerateContentResponse {
    fn block_reason(&self) -> Option<&str> {
        self.prompt_feedback
            .as_ref()
            .and_then(|f| f.block_reason.as_deref())
    }

    fn usage(&self) -> Option<TokenUsage> {
        self.usage_metadata.as_ref().map(|u| TokenUsage {
            prompt_tokens: u.prompt_token_count.unwrap_or(0),
            completion_tokens: u.candidates_token_count.unwrap_or(0),
            total_tokens: u.total_token_count.unwrap_or(0),
        })
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Candidate {
    #[serde(default)]
    content: Option<Content>,
    #[serde(default)]
    finish_reason: Option<String>,
}

impl Candidate {
    fn text(&self) -> String {
        self.content
            .as_ref()
            .map(|c| {
                c.parts
                    .iter()
                    .filter_map(|p| p.text.as_deref())
                    .collect::<String>()
            })
            .unwrap_or_default()
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PromptFeedback {
    #[serde(default)]
    block_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct UsageMetadata {
    #[serde(default)]
    prompt_token_count: Option<u32>,
    #[serde(default)]
    candidates_token_count: Option<u32>,
    #[serde(default)]
    total_token_count: Option<u32>,
}

#[derive(Debug, Deserialize)]
struct ErrorEnvelope {
    error: ApiErrorBody,
}

#[derive(Debug, Deserialize)]
struct ApiErrorBody {
    message: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::sync::{Arc, Mutex};
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::{TcpListener, TcpStream};
    use tokio::task::JoinHandle;

    fn parse(value: serde_json::Value) -> GenerateContentResponse {
        serde_json::from_value(value).unwrap()
    }

    #[test]
    fn test_request_body_shape() {
        let generation = GenerationConfig {
            temperature: Some(0.5),
            max_output_tokens: Some(256),
            top_p: None,
        };
        let body = GenerateContentRequest::new(
            vec![Content::user("prime"), Content::model("ok"), Content::user("Hello")],
            &generation,
        );

        let value = serde_json::to_value(&body).unwrap();
        assert_eq!(
            value,
            json!({
                "contents": [
                    {"role": "user", "parts": [{"text": "prime"}]},
                    {"role": "model", "parts": [{"text": "ok"}]},
                    {"role": "user", "parts": [{"text": "Hello"}]}
                ],
                "generationConfig": {"temperature": 0.5, "maxOutputTokens": 256}
            })
        );
    }

    #[test]
    fn test_request_omits_empty_generation_config() {
        let body = GenerateContentRequest::new(vec![Content::user("hi")], &GenerationConfig::default());
        let value = serde_json::to_value(&body).unwrap();
        assert!(value.get("generationConfig").is_none());
    }

    #[test]
    fn test_reply_text_joins_parts() {
        let response = parse(json!({
            "candidates": [{
                "content": {"role": "model", "parts": [{"text": "Hello, "}, {"text": "world"}]},
                "finishReason": "STOP"
            }],
            "usageMetadata": {"promptTokenCount": 3, "candidatesTokenCount": 2, "totalTokenCount": 5}
        }));

        assert_eq!(reply_text(&response).unwrap(), "Hello, world");
        assert_eq!(
            response.usage(),
            Some(TokenUsage {
                prompt_tokens: 3,
                completion_tokens: 2,
                total_tokens: 5
            })
        );
    }

    #[test]
    fn test_reply_text_reports_block() {
        let response = parse(json!({"promptFeedback": {"blockReason": "SAFETY"}}));
        assert_eq!(
            reply_text(&response),
            Err(ModelError::Blocked("SAFETY".to_string()))
        );

        let response = parse(json!({
            "candidates": [{"content": {"parts": []}, "finishReason": "RECITATION"}]
        }));
        assert!(matches!(reply_text(&response), Err(ModelError::Blocked(_))));
    }

    #[test]
    fn test_reply_text_without_candidates() {
        let response = parse(json!({}));
        assert!(matches!(
            reply_text(&response),
            Err(ModelError::InvalidResponse(_))
        ));
    }

    #[test]
    fn test_api_error_message() {
        let body = r#"{"error": {"code": 400, "message": "API key not valid.", "status": "INVALID_ARGUMENT"}}"#;
        assert_eq!(api_error_message(body), "API key not valid.");
        assert_eq!(api_error_message("plain failure"), "plain failure");
        assert_eq!(api_error_message(""), "no error details returned");
    }

    #[test]
    fn test_sse_buffer_handles_split_lines() {
        let mut buffer = SseLineBuffer::default();
        assert!(buffer.push(b"data: {\"a\"").is_empty());
        let lines = buffer.push(b": 1}\r\n\r\ndata: tail");
        assert_eq!(lines, vec!["data: {\"a\": 1}".to_string(), String::new()]);
        assert_eq!(buffer.finish(), Some("data: tail".to_string()));
        assert_eq!(buffer.finish(), None);
    }

    #[test]
    fn test_streamed_reply_accumulates_deltas() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = seen.clone();
        let callback: StreamCallback = Arc::new(move |delta: &str| {
            sink.lock().unwrap().push(delta.to_string());
        });

        let mut reply = StreamedReply::default();
        reply
            .accept_line(
                r#"data: {"candidates": [{"content": {"role": "model", "parts": [{"text": "Hel"}]}}]}"#,
                &callback,
            )
            .unwrap();
        reply.accept_line("", &callback).unwrap();
        reply
            .accept_line(
                r#"data: {"candidates": [{"content": {"role": "model", "parts": [{"text": "lo"}]}, "finishReason": "STOP"}], "usageMetadata": {"totalTokenCount": 7}}"#,
                &callback,
            )
            .unwrap();

        assert_eq!(*seen.lock().unwrap(), vec!["Hel".to_string(), "lo".to_string()]);
        let response = reply.into_response("gemini-1.5-pro".to_string()).unwrap();
        assert_eq!(response.content, "Hello");
        assert_eq!(response.usage.map(|u| u.total_tokens), Some(7));
    }

    #[test]
    fn test_streamed_reply_rejects_garbage() {
        let callback: StreamCallback = Arc::new(|_: &str| {});
        let mut reply = StreamedReply::default();
        assert!(matches!(
            reply.accept_line("data: not json", &callback),
            Err(ModelError::InvalidResponse(_))
        ));
    }

    /// One canned HTTP reply; body pieces are written separately
    struct CannedReply {
        status: &'static str,
        content_type: &'static str,
        body: Vec<&'static str>,
    }

    async fn read_request(stream: &mut TcpStream) -> String {
        let mut buf = Vec::new();
        let mut chunk = [0u8; 4096];
        loop {
            let n = stream.read(&mut chunk).await.unwrap();
            if n == 0 {
                break;
            }
            buf.extend_from_slice(&chunk[..n]);
            if let Some(end) = buf.windows(4).position(|w| w == b"\r\n\r\n") {
                let head = String::from_utf8_lossy(&buf[..end]).to_lowercase();
                let body_len = head
                    .lines()
                    .find_map(|l| l.strip_prefix("content-length:"))
                    .and_then(|v| v.trim().parse::<usize>().ok())
                    .unwrap_or(0);
                if buf.len() >= end + 4 + body_len {
                    break;
                }
            }
        }
        String::from_utf8_lossy(&buf).into_owned()
    }

    /// Serve `replies` one connection each; the handle yields the raw requests
    async fn serve(replies: Vec<CannedReply>) -> (String, JoinHandle<Vec<String>>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let base_url = format!("http://{}/v1beta", listener.local_addr().unwrap());

        let handle = tokio::spawn(async move {
            let mut requests = Vec::new();
            for reply in replies {
                let (mut stream, _) = listener.accept().await.unwrap();
                requests.push(read_request(&mut stream).await);

                let head = format!(
                    "HTTP/1.1 {}\r\ncontent-type: {}\r\nconnection: close\r\n\r\n",
                    reply.status, reply.content_type
                );
                stream.write_all(head.as_bytes()).await.unwrap();
                for piece in reply.body {
                    stream.write_all(piece.as_bytes()).await.unwrap();
                    stream.flush().await.unwrap();
                    tokio::time::sleep(Duration::from_millis(10)).await;
                }
                stream.shutdown().await.unwrap();
            }
            requests
        });

        (base_url, handle)
    }

    fn backend_at(base_url: &str) -> GeminiBackend {
        GeminiBackend::new(
            base_url,
            "gemini-test",
            GenerationConfig::default(),
            Some(Duration::from_secs(10)),
        )
        .unwrap()
    }

    #[tokio::test]
    async fn test_failed_turn_is_not_kept_in_history() {
        let (base_url, server) = serve(vec![
            CannedReply {
                status: "429 Too Many Requests",
                content_type: "application/json",
                body: vec![r#"{"error": {"code": 429, "message": "quota gone", "status": "RESOURCE_EXHAUSTED"}}"#],
            },
            CannedReply {
                status: "200 OK",
                content_type: "application/json",
                body: vec![r#"{"candidates": [{"content": {"role": "model", "parts": [{"text": "hi"}]}, "finishReason": "STOP"}]}"#],
            },
        ])
        .await;

        let mut session = backend_at(&base_url).open_session("ABC123").await.unwrap();

        let err = session.send_message("first", None).await.unwrap_err();
        assert_eq!(err, ModelError::Quota("quota gone".to_string()));
        assert_eq!(session.history_len(), 0);

        let response = session.send_message("second", None).await.unwrap();
        assert_eq!(response.content, "hi");
        assert_eq!(session.history_len(), 2);

        let requests = server.await.unwrap();
        assert!(requests[0].starts_with("POST /v1beta/models/gemini-test:generateContent "));
        assert!(requests[0].to_lowercase().contains("x-goog-api-key: abc123"));
        // The failed turn is not resent
        assert!(!requests[1].contains("first"));
        assert!(requests[1].contains("second"));
    }

    #[tokio::test]
    async fn test_streamed_turn_reports_each_delta() {
        let (base_url, server) = serve(vec![CannedReply {
            status: "200 OK",
            content_type: "text/event-stream",
            body: vec![
                "data: {\"candidates\": [{\"content\": {\"role\": \"model\", \"parts\": [{\"text\": \"Hel\"}]}}]}\r\n\r\ndata: {\"candidates\": [{\"content\": {\"role\": \"model\", \"pa",
                "rts\": [{\"text\": \"lo\"}]}, \"finishReason\": \"STOP\"}]}\r\n\r\n",
            ],
        }])
        .await;

        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = seen.clone();
        let callback: StreamCallback = Arc::new(move |delta: &str| {
            sink.lock().unwrap().push(delta.to_string());
        });

        let mut session = backend_at(&base_url).open_session("ABC123").await.unwrap();
        let response = session.send_message("Hello", Some(callback)).await.unwrap();

        assert_eq!(response.content, "Hello");
        assert_eq!(*seen.lock().unwrap(), vec!["Hel".to_string(), "lo".to_string()]);
        assert_eq!(session.history_len(), 2);

        let requests = server.await.unwrap();
        assert!(requests[0]
            .starts_with("POST /v1beta/models/gemini-test:streamGenerateContent?alt=sse "));
    }

    #[tokio::test]
    async fn test_open_session_requires_key() {
        let backend = GeminiBackend::new(
            "https://example.invalid/v1beta/",
            "gemini-1.5-pro",
            GenerationConfig::default(),
            None,
        )
        .unwrap();

        assert_eq!(backend.name(), "gemini-1.5-pro");
        assert!(matches!(
            backend.open_session("  ").await,
            Err(ModelError::Auth(_))
        ));

        let session = backend.open_session("ABC123").await.unwrap();
        assert_eq!(session.history_len(), 0);
    }
}
