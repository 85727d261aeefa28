use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("Invalid configuration: {0}")]
    Configuration(String),

    #[error("PDF extraction failed: {0}")]
    Extraction(String),

    #[error("Embedding service error: {0}")]
    EmbeddingService(String),

    #[error("Chat service error: {0}")]
    ChatService(String),

    #[error("Dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    #[error("Arity mismatch: {texts} texts but {metadatas} metadatas")]
    ArityMismatch { texts: usize, metadatas: usize },

    #[error("Invalid chunk config: overlap {overlap} must be smaller than chunk_size {chunk_size}")]
    InvalidChunkConfig { chunk_size: usize, overlap: usize },

    #[error("Invalid upload: {0}")]
    InvalidUpload(String),

    #[error("Document store lock poisoned")]
    StorePoisoned,
}

pub type Result<T> = std::result::Result<T, Error>;
