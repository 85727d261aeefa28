use std::sync::{Arc, Mutex};

use serde::Serialize;
use tracing::info;

use lecturedb_core::config::Settings;
use lecturedb_core::traits::{ChatModel, Embedder};
use lecturedb_core::types::{ChunkMetadata, QueryResult};
use lecturedb_core::{Error, Result};
use lecturedb_embed::get_default_embedder;
use lecturedb_pdf::{validate_upload, Ingestor};
use lecturedb_vector::DocumentStore;

use crate::assistant::Assistant;
use crate::chat::GeminiChat;

/// Retrieved passages joined into one answer, plus where they came from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Answer {
    pub text: String,
    pub sources: Vec<ChunkMetadata>,
}

impl Answer {
    fn from_results(results: Vec<QueryResult>) -> Self {
        let text = results.iter().map(|r| r.text.as_str()).collect::<Vec<_>>().join("\n");
        let sources = results.into_iter().map(|r| r.metadata).collect();
        Self { text, sources }
    }
}

/// Process-wide handle bundling ingestion, retrieval and the assistant.
///
/// Construct it once at startup and share it by reference; every field is
/// safe to use from several threads.
pub struct RagService {
    store: Arc<DocumentStore>,
    ingestor: Ingestor,
    assistant: Mutex<Assistant>,
    top_k: usize,
}

impl RagService {
    pub fn new(
        embedder: Arc<dyn Embedder>,
        chat: Arc<dyn ChatModel>,
        ingestor: Ingestor,
        settings: &Settings,
    ) -> Result<Self> {
        let assistant = Assistant::new(chat).with_history_limit(settings.assistant.max_history_turns);
        Ok(Self {
            store: Arc::new(DocumentStore::new(embedder)?),
            ingestor,
            assistant: Mutex::new(assistant),
            top_k: settings.retrieval.top_k,
        })
    }

    /// Wires the configured embedding backend, the Gemini chat model and the
    /// PDF extractor. Fails fast on a missing credential.
    pub fn from_settings(settings: &Settings) -> Result<Self> {
        settings.validate()?;
        let embedder = get_default_embedder(settings)?;
        let chat = Arc::new(GeminiChat::new(&settings.gemini, &settings.chat)?);
        let ingestor = Ingestor::new(Arc::new(lecturedb_pdf::PdfExtractor::new()), settings.chunking)?;
        Self::new(embedder, chat, ingestor, settings)
    }

    pub fn store(&self) -> &Arc<DocumentStore> { &self.store }

    /// Validates, extracts, chunks, embeds and stores one PDF. Returns the
    /// number of chunks added.
    pub fn upload_pdf(&self, filename: &str, bytes: &[u8]) -> Result<usize> {
        validate_upload(filename, bytes)?;
        let chunks = self.ingestor.ingest(bytes, filename)?;
        if chunks.is_empty() {
            return Err(Error::Extraction("No text could be extracted from the PDF.".into()));
        }
        let added = self.store.add_chunks(chunks)?;
        info!(filename, added, "upload stored");
        Ok(added)
    }

    pub fn search(&self, query: &str, k: usize) -> Result<Vec<QueryResult>> {
        self.store.search(query, k)
    }

    /// The configured number of closest chunks, joined by newlines.
    pub fn query(&self, query: &str) -> Result<Answer> {
        Ok(Answer::from_results(self.store.search(query, self.top_k)?))
    }

    pub fn greet(&self) -> Result<String> {
        Ok(self.lock_assistant()?.greet().to_string())
    }

    pub fn chat(&self, input: &str) -> Result<String> {
        self.lock_assistant()?.chat(input)
    }

    fn lock_assistant(&self) -> Result<std::sync::MutexGuard<'_, Assistant>> {
        self.assistant
            .lock()
            .map_err(|_| Error::ChatService("assistant state poisoned".into()))
    }
}
