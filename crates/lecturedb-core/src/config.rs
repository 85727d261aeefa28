//! Configuration loader and path helpers.
//!
//! Uses Figment to merge `config.toml` + `config.<env>.toml` + `APP_*` env vars,
//! then the bare `GEMINI_API_KEY`, `MODEL_CHAT` and `MODEL_EMBED` variables.
//! Nested keys in `APP_*` variables are separated by `__`
//! (`APP_EMBEDDING__DIMENSION=768`).
use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};
use std::env;
use std::path::PathBuf;

use crate::chunker::ChunkingConfig;
use crate::error::{Error, Result};

const PLACEHOLDER_API_KEY: &str = "your_gemini_api_key_here";

pub struct Config {
    figment: Figment,
}

impl Config {
    pub fn load() -> anyhow::Result<Self> {
        let env_name = env::var("RUST_ENV").unwrap_or_else(|_| "dev".to_string());

        let mut figment = Figment::from(Serialized::defaults(Settings::default()))
            .merge(Toml::file("config.toml"));
        match env_name.as_str() {
            "dev" | "development" => figment = figment.merge(Toml::file("config.dev.toml")),
            "prod" | "production" => figment = figment.merge(Toml::file("config.prod.toml")),
            "test" | "testing" => figment = figment.merge(Toml::file("config.test.toml")),
            _ => {}
        }
        figment = figment
            .merge(Env::prefixed("APP_").split("__"))
            .merge(legacy_env());

        let config = Self { figment };
        config.validate_for_env(&env_name)?;
        Ok(config)
    }

    /// Wraps an already assembled figment, mostly for tests and embedding
    /// the store in another application.
    pub fn from_figment(figment: Figment) -> Self {
        Self { figment: Figment::from(Serialized::defaults(Settings::default())).merge(figment) }
    }

    pub fn get<T>(&self, key: &str) -> anyhow::Result<T>
    where
        T: serde::de::DeserializeOwned,
    {
        self.figment
            .extract_inner(key)
            .map_err(|e| anyhow::anyhow!("Failed to get '{}': {}", key, e))
    }

    /// Typed view over the merged configuration.
    pub fn settings(&self) -> Result<Settings> {
        let settings: Settings = self
            .figment
            .extract()
            .map_err(|e| Error::Configuration(e.to_string()))?;
        settings.validate()?;
        Ok(settings)
    }

    fn validate_for_env(&self, env: &str) -> anyhow::Result<()> {
        match env {
            "prod" | "production" => {
                // Production never runs on the fake backend.
                let backend: EmbeddingBackend = self.get("embedding.backend")?;
                if backend == EmbeddingBackend::Fake {
                    anyhow::bail!("embedding.backend = \"fake\" is not allowed in production");
                }
            }
            "dev" | "development" | "test" | "testing" => {}
            _ => tracing::warn!(env, "unknown RUST_ENV, only config.toml is loaded"),
        }
        Ok(())
    }
}

/// The variable names the hosted-model setup documents, mapped onto their
/// nested keys.
fn legacy_env() -> Env {
    Env::raw()
        .only(&["GEMINI_API_KEY", "MODEL_CHAT", "MODEL_EMBED"])
        .map(|key| match key.as_str().to_ascii_uppercase().as_str() {
            "GEMINI_API_KEY" => "gemini.api_key".into(),
            "MODEL_CHAT" => "chat.model".into(),
            "MODEL_EMBED" => "embedding.model".into(),
            other => other.to_ascii_lowercase().into(),
        })
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub gemini: GeminiSettings,
    pub embedding: EmbeddingSettings,
    pub chat: ChatSettings,
    pub chunking: ChunkingConfig,
    pub retrieval: RetrievalSettings,
    pub assistant: AssistantSettings,
}

impl Settings {
    pub fn validate(&self) -> Result<()> {
        self.chunking.validate()?;
        if self.embedding.dimension == 0 {
            return Err(Error::Configuration("embedding.dimension must be positive".into()));
        }
        if self.retrieval.top_k == 0 {
            return Err(Error::Configuration("retrieval.top_k must be positive".into()));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GeminiSettings {
    pub api_key: Option<String>,
    pub base_url: String,
    pub timeout_secs: u64,
}

impl Default for GeminiSettings {
    fn default() -> Self {
        Self {
            api_key: None,
            base_url: "https://generativelanguage.googleapis.com/v1beta".to_string(),
            timeout_secs: 30,
        }
    }
}

impl GeminiSettings {
    /// The configured credential. Absent, blank and placeholder keys are all
    /// configuration errors.
    pub fn require_api_key(&self) -> Result<&str> {
        match self.api_key.as_deref().map(str::trim) {
            Some(key) if !key.is_empty() && key != PLACEHOLDER_API_KEY => Ok(key),
            _ => Err(Error::Configuration(
                "GEMINI_API_KEY not configured. Please add a valid API key to the environment or config.toml".into(),
            )),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EmbeddingBackend {
    #[default]
    Gemini,
    Fake,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EmbeddingSettings {
    pub backend: EmbeddingBackend,
    pub model: String,
    /// Sent as `outputDimensionality`, which can only shorten the model's
    /// native vectors. It must not exceed what `model` produces:
    /// `text-embedding-004` returns at most 768 values, so the 1536 default
    /// only works with a larger model or `dimension = 768`.
    pub dimension: usize,
}

impl Default for EmbeddingSettings {
    fn default() -> Self {
        Self { backend: EmbeddingBackend::Gemini, model: "text-embedding-004".to_string(), dimension: 1536 }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ChatSettings {
    pub model: String,
}

impl Default for ChatSettings {
    fn default() -> Self {
        Self { model: "gemini-1.5-flash".to_string() }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetrievalSettings {
    pub top_k: usize,
}

impl Default for RetrievalSettings {
    fn default() -> Self {
        Self { top_k: 4 }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AssistantSettings {
    /// Number of turns kept in the conversation history. `None` keeps all.
    pub max_history_turns: Option<usize>,
}

/// Expand a user-provided path string:
/// - Expands leading '~' to the user's home directory
/// - Expands ${VAR} and $VAR environment variables
/// - Returns a PathBuf without attempting to canonicalize
pub fn expand_path<S: AsRef<str>>(input: S) -> PathBuf {
    let s = input.as_ref();
    let expanded_env = shellexpand::env(s).unwrap_or(std::borrow::Cow::Borrowed(s));
    let expanded = shellexpand::tilde(&expanded_env);
    PathBuf::from(expanded.as_ref())
}
