//! Domain types shared by the chunker, the index and the document store.

use serde::{Deserialize, Serialize};

pub type Embedding = Vec<f32>;

/// Where a chunk came from: the uploaded file name and the chunk's ordinal
/// position within that file.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ChunkMetadata {
    pub source: String,
    pub chunk: usize,
}

impl ChunkMetadata {
    pub fn new(source: impl Into<String>, chunk: usize) -> Self {
        Self { source: source.into(), chunk }
    }
}

/// A window of extracted document text that is embedded and indexed as one unit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Chunk {
    pub text: String,
    pub metadata: ChunkMetadata,
}

/// One retrieval hit. Results of a search are ordered most similar first.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueryResult {
    pub text: String,
    pub metadata: ChunkMetadata,
}

/// A row returned by a vector index together with its squared L2 distance
/// from the query. Lower is better.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Neighbor {
    pub row: usize,
    pub distance: f32,
}

/// Speaker of one conversation turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Turn {
    pub role: Role,
    pub content: String,
}

impl Turn {
    pub fn user(content: impl Into<String>) -> Self {
        Self { role: Role::User, content: content.into() }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self { role: Role::Assistant, content: content.into() }
    }

    /// Renders the turn as a single prompt line, e.g. `User: hello`.
    pub fn render(&self) -> String {
        match self.role {
            Role::User => format!("User: {}", self.content),
            Role::Assistant => format!("Assistant: {}", self.content),
        }
    }
}
