//! Completion backends: one prompt in, raw model text out.
//!
//! OpenAI, Azure and Groq share the chat-completions format. Anthropic uses
//! the Messages API.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use futures::StreamExt;
use parking_lot::Mutex;
use reqwest::{Client, Response};
use serde_json::json;
use tracing::debug;

use tendersift_core::{Error, Result};

use crate::types::{LLMProvider, ResolvedProvider};

/// Text-generation collaborator.
///
/// Implementations must be callable many times per document with no shared
/// mutable state between calls.
#[async_trait]
pub trait CompletionBackend: Send + Sync {
    async fn complete(&self, prompt: &str, max_tokens: u32, temperature: f32) -> Result<String>;

    /// Short label for logs and metadata.
    fn name(&self) -> String {
        "completion".into()
    }
}

/// Non-streaming HTTP client for the configured provider.
pub struct HttpCompletion {
    client: Client,
    provider: ResolvedProvider,
    max_response_bytes: usize,
}

impl HttpCompletion {
    pub fn new(provider: ResolvedProvider, timeout_secs: u64, max_response_bytes: usize) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .build()
            .map_err(|e| Error::Config(format!("HTTP client: {}", e)))?;
        Ok(Self {
            client,
            provider,
            max_response_bytes,
        })
    }

    /// Chat body shared by every provider. Azure addresses the deployment in
    /// the URL and ignores `model`.
    fn request_body(&self, prompt: &str, max_tokens: u32, temperature: f32) -> serde_json::Value {
        json!({
            "model": self.provider.model,
            "messages": [{"role": "user", "content": prompt}],
            "temperature": temperature,
            "max_tokens": max_tokens,
        })
    }
}

#[async_trait]
impl CompletionBackend for HttpCompletion {
    async fn complete(&self, prompt: &str, max_tokens: u32, temperature: f32) -> Result<String> {
        let body = self.request_body(prompt, max_tokens, temperature);
        let request = self.client.post(&self.provider.url).json(&body);
        let request = match self.provider.provider {
            LLMProvider::OpenAI | LLMProvider::Groq => request
                .header("Authorization", format!("Bearer {}", self.provider.api_key)),
            LLMProvider::Azure => request.header("api-key", &self.provider.api_key),
            LLMProvider::Anthropic => request
                .header("x-api-key", &self.provider.api_key)
                .header("anthropic-version", "2023-06-01"),
        };

        debug!("Completion via {} with model {}", self.provider.provider, self.provider.model);

        let response = request.send().await.map_err(|e| {
            if e.is_timeout() {
                Error::Completion(format!("request timed out: {}", e))
            } else {
                Error::Completion(format!("request failed: {}", e))
            }
        })?;

        let status = response.status();
        let bytes = read_capped(response, self.max_response_bytes).await?;
        if !status.is_success() {
            return Err(Error::Completion(format!(
                "API error {}: {}",
                status,
                String::from_utf8_lossy(&bytes)
            )));
        }

        let parsed: serde_json::Value = serde_json::from_slice(&bytes)?;
        let content = match self.provider.provider {
            LLMProvider::Anthropic => parsed["content"][0]["text"].as_str(),
            _ => parsed["choices"][0]["message"]["content"].as_str(),
        };
        content
            .map(|s| s.trim().to_string())
            .ok_or_else(|| Error::Completion("response carried no message content".into()))
    }

    fn name(&self) -> String {
        format!("{}:{}", self.provider.provider, self.provider.model)
    }
}

/// Read a response body, failing as soon as it grows past `max_bytes`.
async fn read_capped(response: Response, max_bytes: usize) -> Result<Vec<u8>> {
    let too_large = |n: u64| {
        Error::Completion(format!(
            "response of at least {} bytes exceeds limit of {}",
            n, max_bytes
        ))
    };
    if let Some(declared) = response.content_length() {
        if declared > max_bytes as u64 {
            return Err(too_large(declared));
        }
    }

    let mut body = Vec::new();
    let mut stream = response.bytes_stream();
    while let Some(chunk) = stream.next().await {
        let chunk = chunk.map_err(|e| Error::Completion(format!("response read error: {}", e)))?;
        if body.len() + chunk.len() > max_bytes {
            return Err(too_large((body.len() + chunk.len()) as u64));
        }
        body.extend_from_slice(&chunk);
    }
    Ok(body)
}

// ---------------------------------------------------------------
// Fakes
// ---------------------------------------------------------------

/// Replays canned responses. Rules are checked in order against the prompt;
/// the first rule whose needle occurs wins, else the default is returned.
#[derive(Default)]
pub struct StaticCompletion {
    rules: Vec<(String, String)>,
    default: String,
    queue: Mutex<VecDeque<String>>,
    prompts: Mutex<Vec<String>>,
    calls: AtomicUsize,
}

impl StaticCompletion {
    /// Always answer `response`.
    pub fn new(response: impl Into<String>) -> Self {
        Self {
            default: response.into(),
            ..Self::default()
        }
    }

    /// Answer `response` when the prompt contains `needle`.
    pub fn with_rule(mut self, needle: impl Into<String>, response: impl Into<String>) -> Self {
        self.rules.push((needle.into(), response.into()));
        self
    }

    /// Answer these responses first, one per call, before any rule applies.
    pub fn with_sequence<I, S>(self, responses: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.queue.lock().extend(responses.into_iter().map(Into::into));
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn prompts(&self) -> Vec<String> {
        self.prompts.lock().clone()
    }
}

#[async_trait]
impl CompletionBackend for StaticCompletion {
    async fn complete(&self, prompt: &str, _max_tokens: u32, _temperature: f32) -> Result<String> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.prompts.lock().push(prompt.to_string());
        if let Some(next) = self.queue.lock().pop_front() {
            return Ok(next);
        }
        let response = self
            .rules
            .iter()
            .find(|(needle, _)| prompt.contains(needle.as_str()))
            .map(|(_, response)| response.clone())
            .unwrap_or_else(|| self.default.clone());
        Ok(response)
    }

    fn name(&self) -> String {
        "static".into()
    }
}

/// Fails every call, as an unreachable provider would.
#[derive(Debug, Default)]
pub struct FailingCompletion {
    calls: AtomicUsize,
}

impl FailingCompletion {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl CompletionBackend for FailingCompletion {
    async fn complete(&self, _prompt: &str, _max_tokens: u32, _temperature: f32) -> Result<String> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Err(Error::Completion("provider unavailable".into()))
    }

    fn name(&self) -> String {
        "failing".into()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn provider(kind: LLMProvider) -> ResolvedProvider {
        ResolvedProvider {
            provider: kind,
            model: "m".into(),
            api_key: "k".into(),
            url: "http://127.0.0.1:9/none".into(),
        }
    }

    #[test]
    fn test_request_body_shape() {
        let http = HttpCompletion::new(provider(LLMProvider::Anthropic), 5, 1024).unwrap();
        let body = http.request_body("hello", 100, 0.0);
        assert_eq!(body["messages"][0]["content"], "hello");
        assert_eq!(body["max_tokens"], 100);
        assert_eq!(http.name(), "anthropic:m");
    }

    #[tokio::test]
    async fn test_unreachable_provider_is_an_error() {
        let http = HttpCompletion::new(provider(LLMProvider::OpenAI), 2, 1024).unwrap();
        let err = http.complete("hi", 10, 0.0).await.unwrap_err();
        assert!(matches!(err, Error::Completion(_)));
    }

    /// Serve one canned HTTP response on a local port and return its URL.
    async fn serve_once(response: Vec<u8>) -> String {
        use tokio::io::{AsyncReadExt, AsyncWriteExt};

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            // Drain the request so closing the socket does not reset it.
            let mut request = Vec::new();
            let mut buf = [0u8; 4096];
            loop {
                let n = socket.read(&mut buf).await.unwrap_or(0);
                if n == 0 {
                    break;
                }
                request.extend_from_slice(&buf[..n]);
                let text = String::from_utf8_lossy(&request).to_string();
                if let Some(end) = text.find("\r\n\r\n") {
                    let declared = text[..end]
                        .lines()
                        .find_map(|l| {
                            let (name, value) = l.split_once(':')?;
                            name.eq_ignore_ascii_case("content-length")
                                .then(|| value.trim().parse::<usize>().ok())
                                .flatten()
                        })
                        .unwrap_or(0);
                    if request.len() >= end + 4 + declared {
                        break;
                    }
                }
            }
            let _ = socket.write_all(&response).await;
            let _ = socket.shutdown().await;
        });
        format!("http://{}/v1/chat/completions", addr)
    }

    fn fixed_length(body: &str) -> Vec<u8> {
        format!(
            "HTTP/1.1 200 OK\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
            body.len(),
            body
        )
        .into_bytes()
    }

    fn local(url: String) -> ResolvedProvider {
        ResolvedProvider {
            url,
            ..provider(LLMProvider::OpenAI)
        }
    }

    const CHAT_BODY: &str = r#"{"choices": [{"message": {"content": " {\"emd\": \"Rs. 5,000\"} "}}]}"#;

    #[tokio::test]
    async fn test_reads_response_within_limit() {
        let url = serve_once(fixed_length(CHAT_BODY)).await;
        let http = HttpCompletion::new(local(url), 5, 1024).unwrap();
        let content = http.complete("hi", 10, 0.0).await.unwrap();
        assert_eq!(content, r#"{"emd": "Rs. 5,000"}"#);
    }

    #[tokio::test]
    async fn test_declared_length_over_limit_is_rejected() {
        let url = serve_once(fixed_length(CHAT_BODY)).await;
        let http = HttpCompletion::new(local(url), 5, 16).unwrap();
        let err = http.complete("hi", 10, 0.0).await.unwrap_err();
        assert!(err.to_string().contains("exceeds limit of 16"), "{}", err);
    }

    #[tokio::test]
    async fn test_chunked_body_over_limit_is_cut_off() {
        let mut response =
            b"HTTP/1.1 200 OK\r\nTransfer-Encoding: chunked\r\nConnection: close\r\n\r\n".to_vec();
        for _ in 0..8 {
            response.extend_from_slice(b"400\r\n");
            response.extend_from_slice(&[b'x'; 0x400]);
            response.extend_from_slice(b"\r\n");
        }
        response.extend_from_slice(b"0\r\n\r\n");

        let url = serve_once(response).await;
        let http = HttpCompletion::new(local(url), 5, 2048).unwrap();
        let err = http.complete("hi", 10, 0.0).await.unwrap_err();
        assert!(err.to_string().contains("exceeds limit of 2048"), "{}", err);
    }

    #[tokio::test]
    async fn test_static_rules_and_sequence() {
        let backend = StaticCompletion::new("{}")
            .with_rule("SCOPE", r#"{"scope_of_work": "Road works"}"#)
            .with_sequence(["first"]);
        assert_eq!(backend.complete("anything", 10, 0.0).await.unwrap(), "first");
        assert_eq!(
            backend.complete("has SCOPE inside", 10, 0.0).await.unwrap(),
            r#"{"scope_of_work": "Road works"}"#
        );
        assert_eq!(backend.complete("other", 10, 0.0).await.unwrap(), "{}");
        assert_eq!(backend.calls(), 3);
        assert_eq!(backend.prompts()[1], "has SCOPE inside");
    }

    #[tokio::test]
    async fn test_failing_backend() {
        let backend = FailingCompletion::new();
        assert!(backend.complete("x", 1, 0.0).await.is_err());
        assert_eq!(backend.calls(), 1);
    }
}
