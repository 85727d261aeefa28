//! Gemini REST plumbing and the hosted embedding backend.
//!
//! Only the small subset of the Generative Language API the store needs:
//! `models/{model}:batchEmbedContents` here and `models/{model}:generateContent`
//! for the assistant crate.

use std::time::Duration;

use reqwest::blocking::{Client, Response};
use serde::{Deserialize, Serialize};
use tracing::debug;

use lecturedb_core::config::{EmbeddingSettings, GeminiSettings};
use lecturedb_core::traits::Embedder;
use lecturedb_core::types::Embedding;
use lecturedb_core::{Error, Result};

/// The API accepts at most this many requests per batch call.
const MAX_BATCH: usize = 100;
const TASK_TYPE: &str = "RETRIEVAL_DOCUMENT";

/// Connection details shared by every Gemini endpoint.
#[derive(Clone)]
pub struct GeminiHttp {
    client: Client,
    base_url: String,
    api_key: String,
}

impl GeminiHttp {
    pub fn new(settings: &GeminiSettings) -> Result<Self> {
        let api_key = settings.require_api_key()?.to_string();
        let client = Client::builder()
            .timeout(Duration::from_secs(settings.timeout_secs))
            .build()
            .map_err(|e| Error::Configuration(format!("Failed to build HTTP client: {e}")))?;
        Ok(Self { client, base_url: settings.base_url.trim_end_matches('/').to_string(), api_key })
    }

    /// `POST {base}/models/{model}:{method}?key=...` with a JSON body.
    /// Transport failures and non-success statuses come back as the message
    /// the caller wraps into its own error variant.
    pub fn post<B: Serialize>(&self, model: &str, method: &str, body: &B) -> std::result::Result<Response, String> {
        let url = format!("{}/{}:{}", self.base_url, model_path(model), method);
        let response = self
            .client
            .post(&url)
            .query(&[("key", self.api_key.as_str())])
            .json(body)
            .send()
            .map_err(|e| format!("request to {method} failed: {}", e.without_url()))?;
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let body = response.text().unwrap_or_default();
        Err(format!("{method} returned {status}: {}", api_error_message(&body)))
    }
}

/// `text-embedding-004` and `models/text-embedding-004` both address the same model.
pub fn model_path(model: &str) -> String {
    if model.starts_with("models/") { model.to_string() } else { format!("models/{model}") }
}

/// Pulls `error.message` out of a Gemini error body, falling back to the raw body.
pub fn api_error_message(body: &str) -> String {
    #[derive(Deserialize)]
    struct Envelope {
        error: ApiError,
    }
    #[derive(Deserialize)]
    struct ApiError {
        message: String,
    }
    match serde_json::from_str::<Envelope>(body) {
        Ok(envelope) => envelope.error.message,
        Err(_) => body.trim().to_string(),
    }
}

#[derive(Debug, Serialize)]
pub struct Part<'a> {
    pub text: &'a str,
}

#[derive(Debug, Serialize)]
pub struct Content<'a> {
    pub parts: Vec<Part<'a>>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct EmbedRequest<'a> {
    pub model: &'a str,
    pub content: Content<'a>,
    pub task_type: &'a str,
    pub output_dimensionality: usize,
}

#[derive(Debug, Serialize)]
pub(crate) struct BatchEmbedRequest<'a> {
    pub requests: Vec<EmbedRequest<'a>>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct ContentEmbedding {
    #[serde(default)]
    pub values: Vec<f32>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct BatchEmbedResponse {
    #[serde(default)]
    pub embeddings: Vec<ContentEmbedding>,
}

pub(crate) fn build_batch_request<'a>(model: &'a str, dim: usize, texts: &'a [String]) -> BatchEmbedRequest<'a> {
    BatchEmbedRequest {
        requests: texts
            .iter()
            .map(|text| EmbedRequest {
                model,
                content: Content { parts: vec![Part { text: text.as_str() }] },
                task_type: TASK_TYPE,
                output_dimensionality: dim,
            })
            .collect(),
    }
}

/// Checks the response shape against what was asked for. A short or
/// wrongly sized answer is a service error, never padded.
pub(crate) fn into_vectors(response: BatchEmbedResponse, expected: usize, dim: usize) -> Result<Vec<Embedding>> {
    if response.embeddings.len() != expected {
        return Err(Error::EmbeddingService(format!(
            "expected {expected} embeddings, received {}",
            response.embeddings.len()
        )));
    }
    response
        .embeddings
        .into_iter()
        .map(|e| {
            if e.values.len() == dim {
                Ok(e.values)
            } else {
                Err(Error::EmbeddingService(format!(
                    "embedding has {} values, expected {dim}",
                    e.values.len()
                )))
            }
        })
        .collect()
}

pub struct GeminiEmbedder {
    http: GeminiHttp,
    model: String,
    dim: usize,
}

impl GeminiEmbedder {
    pub fn new(gemini: &GeminiSettings, embedding: &EmbeddingSettings) -> Result<Self> {
        let http = GeminiHttp::new(gemini)?;
        Ok(Self { http, model: model_path(&embedding.model), dim: embedding.dimension })
    }

    fn embed_chunk(&self, texts: &[String]) -> Result<Vec<Embedding>> {
        let body = build_batch_request(&self.model, self.dim, texts);
        let response: BatchEmbedResponse = self
            .http
            .post(&self.model, "batchEmbedContents", &body)
            .map_err(Error::EmbeddingService)?
            .json()
            .map_err(|e| Error::EmbeddingService(format!("malformed embedding response: {e}")))?;
        into_vectors(response, texts.len(), self.dim)
    }
}

impl Embedder for GeminiEmbedder {
    fn dim(&self) -> usize { self.dim }

    fn model_id(&self) -> &str { &self.model }

    fn embed_batch(&self, texts: &[String]) -> Result<Vec<Embedding>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }
        debug!(model = %self.model, count = texts.len(), "embedding batch");
        let mut out = Vec::with_capacity(texts.len());
        for batch in texts.chunks(MAX_BATCH) {
            out.extend(self.embed_chunk(batch)?);
        }
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn request_uses_retrieval_task_and_dimension() {
        let texts = vec!["first".to_string(), "second".to_string()];
        let body = serde_json::to_value(build_batch_request("models/text-embedding-004", 8, &texts)).unwrap();
        assert_eq!(
            body["requests"][1],
            serde_json::json!({
                "model": "models/text-embedding-004",
                "content": {"parts": [{"text": "second"}]},
                "taskType": "RETRIEVAL_DOCUMENT",
                "outputDimensionality": 8
            })
        );
    }

    #[test]
    fn response_shape_is_checked() {
        let parse = |json: &str| serde_json::from_str::<BatchEmbedResponse>(json).unwrap();

        let ok = into_vectors(parse(r#"{"embeddings":[{"values":[1,2]},{"values":[3,4]}]}"#), 2, 2).unwrap();
        assert_eq!(ok, vec![vec![1.0, 2.0], vec![3.0, 4.0]]);

        let short = into_vectors(parse(r#"{"embeddings":[{"values":[1,2]}]}"#), 2, 2);
        assert!(matches!(short, Err(Error::EmbeddingService(_))));

        let wrong_dim = into_vectors(parse(r#"{"embeddings":[{"values":[1,2,3]}]}"#), 1, 2);
        assert!(matches!(wrong_dim, Err(Error::EmbeddingService(_))));

        let missing = into_vectors(parse("{}"), 1, 2);
        assert!(matches!(missing, Err(Error::EmbeddingService(_))));
    }

    #[test]
    fn model_path_is_prefixed_once() {
        assert_eq!(model_path("text-embedding-004"), "models/text-embedding-004");
        assert_eq!(model_path("models/text-embedding-004"), "models/text-embedding-004");
    }

    #[test]
    fn error_message_is_extracted() {
        let body = r#"{"error":{"code":400,"message":"API key not valid.","status":"INVALID_ARGUMENT"}}"#;
        assert_eq!(api_error_message(body), "API key not valid.");
        assert_eq!(api_error_message("  upstream down \n"), "upstream down");
    }
}
