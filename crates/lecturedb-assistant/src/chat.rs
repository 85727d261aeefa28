use serde::{Deserialize, Serialize};
use tracing::debug;

use lecturedb_core::config::{ChatSettings, GeminiSettings};
use lecturedb_core::traits::ChatModel;
use lecturedb_core::{Error, Result};
use lecturedb_embed::gemini::{model_path, Content, GeminiHttp, Part};

#[derive(Debug, Serialize)]
struct GenerateRequest<'a> {
    contents: Vec<Content<'a>>,
}

#[derive(Debug, Deserialize)]
struct ReplyPart {
    #[serde(default)]
    text: String,
}

#[derive(Debug, Deserialize)]
struct ReplyContent {
    #[serde(default)]
    parts: Vec<ReplyPart>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    content: Option<ReplyContent>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PromptFeedback {
    block_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
    prompt_feedback: Option<PromptFeedback>,
}

/// Text of the first candidate, all parts concatenated.
fn reply_text(response: GenerateResponse) -> Result<String> {
    let blocked = response.prompt_feedback.and_then(|f| f.block_reason);
    let content = response.candidates.into_iter().next().and_then(|c| c.content);
    match (content, blocked) {
        (Some(content), _) => Ok(content.parts.into_iter().map(|p| p.text).collect()),
        (None, Some(reason)) => Err(Error::ChatService(format!("prompt blocked: {reason}"))),
        (None, None) => Err(Error::ChatService("response contained no candidates".into())),
    }
}

/// Hosted Gemini chat model behind [`ChatModel`].
pub struct GeminiChat {
    http: GeminiHttp,
    model: String,
}

impl GeminiChat {
    pub fn new(gemini: &GeminiSettings, chat: &ChatSettings) -> Result<Self> {
        Ok(Self { http: GeminiHttp::new(gemini)?, model: model_path(&chat.model) })
    }
}

impl ChatModel for GeminiChat {
    fn complete(&self, prompt: &str) -> Result<String> {
        debug!(model = %self.model, prompt_len = prompt.len(), "generating reply");
        let body = GenerateRequest { contents: vec![Content { parts: vec![Part { text: prompt }] }] };
        let response: GenerateResponse = self
            .http
            .post(&self.model, "generateContent", &body)
            .map_err(Error::ChatService)?
            .json()
            .map_err(|e| Error::ChatService(format!("malformed chat response: {e}")))?;
        reply_text(response)
    }
}
