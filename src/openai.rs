//! Hosted embedding and generation over an OpenAI-compatible HTTP API.
//!
//! Both providers share one blocking client with a bounded timeout. Any
//! transport, status, or decoding failure becomes [`Error::Embedding`] or
//! [`Error::Generation`]; callers recover with their local heuristics.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::embed::{check_batch, Embedder};
use crate::generate::Generator;
use crate::{Error, Result};

const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";

#[derive(Serialize)]
struct EmbeddingRequest<'a> {
    model: &'a str,
    input: &'a [&'a str],
}

#[derive(Deserialize)]
struct EmbeddingResponse {
    data: Vec<EmbeddingData>,
}

#[derive(Deserialize)]
struct EmbeddingData {
    embedding: Vec<f32>,
    #[serde(default)]
    index: usize,
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: [ChatMessage<'a>; 2],
    temperature: f32,
    max_tokens: u32,
}

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChatContent,
}

#[derive(Deserialize)]
struct ChatContent {
    #[serde(default)]
    content: Option<String>,
}

/// Shared HTTP client for the hosted providers.
#[derive(Debug, Clone)]
pub struct OpenAiClient {
    client: reqwest::blocking::Client,
    base_url: String,
    api_key: String,
}

impl OpenAiClient {
    /// Build a client.
    ///
    /// `base_url` defaults to the public OpenAI endpoint.
    pub fn new(api_key: impl Into<String>, base_url: Option<&str>, timeout: Duration) -> Result<Self> {
        let client = reqwest::blocking::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| Error::Config(format!("http client: {e}")))?;
        let base_url = base_url
            .unwrap_or(DEFAULT_BASE_URL)
            .trim_end_matches('/')
            .to_string();
        info!(base_url = %base_url, timeout_secs = timeout.as_secs(), "hosted provider client ready");
        Ok(Self {
            client,
            base_url,
            api_key: api_key.into(),
        })
    }

    fn post<Req: Serialize, Resp: for<'de> Deserialize<'de>>(
        &self,
        path: &str,
        body: &Req,
    ) -> std::result::Result<Resp, reqwest::Error> {
        self.client
            .post(format!("{}/{path}", self.base_url))
            .bearer_auth(&self.api_key)
            .json(body)
            .send()?
            .error_for_status()?
            .json::<Resp>()
    }
}

/// Embeddings from `/embeddings`.
#[derive(Debug, Clone)]
pub struct OpenAiEmbedder {
    client: OpenAiClient,
    model: String,
    id: String,
}

impl OpenAiEmbedder {
    /// Create an embedder for `model` (e.g. `text-embedding-3-small`).
    pub fn new(client: OpenAiClient, model: impl Into<String>) -> Self {
        let model = model.into();
        let id = format!("openai:{model}");
        Self { client, model, id }
    }
}

impl Embedder for OpenAiEmbedder {
    fn id(&self) -> &str {
        &self.id
    }

    fn embed(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }
        let request = EmbeddingRequest {
            model: &self.model,
            input: texts,
        };
        let mut response: EmbeddingResponse = self
            .client
            .post("embeddings", &request)
            .map_err(|e| Error::Embedding(e.to_string()))?;

        response.data.sort_by_key(|d| d.index);
        let vectors: Vec<Vec<f32>> = response.data.into_iter().map(|d| d.embedding).collect();
        check_batch(&vectors, texts.len())?;
        debug!(count = vectors.len(), model = %self.model, "hosted embeddings");
        Ok(vectors)
    }
}

/// Answers from `/chat/completions`.
#[derive(Debug, Clone)]
pub struct OpenAiGenerator {
    client: OpenAiClient,
    model: String,
    id: String,
}

impl OpenAiGenerator {
    /// Create a generator for `model` (e.g. `gpt-3.5-turbo`).
    pub fn new(client: OpenAiClient, model: impl Into<String>) -> Self {
        let model = model.into();
        let id = format!("openai:{model}");
        Self { client, model, id }
    }
}

impl Generator for OpenAiGenerator {
    fn id(&self) -> &str {
        &self.id
    }

    fn generate(&self, prompt: &str) -> Result<String> {
        let request = ChatRequest {
            model: &self.model,
            messages: [
                ChatMessage {
                    role: "system",
                    content: "Answer the question based only on the given context.",
                },
                ChatMessage {
                    role: "user",
                    content: prompt,
                },
            ],
            temperature: 0.3,
            max_tokens: 150,
        };
        let response: ChatResponse = self
            .client
            .post("chat/completions", &request)
            .map_err(|e| Error::Generation(e.to_string()))?;

        response
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .filter(|s| !s.trim().is_empty())
            .ok_or_else(|| Error::Generation("empty completion".into()))
    }
}
