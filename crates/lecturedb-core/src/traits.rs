use crate::error::Result;
use crate::types::{Embedding, Neighbor};

/// Text to fixed-dimension vector, one vector per input in input order.
pub trait Embedder: Send + Sync {
    fn dim(&self) -> usize;
    fn model_id(&self) -> &str;
    fn embed_batch(&self, texts: &[String]) -> Result<Vec<Embedding>>;
}

/// Prompt to free-text completion.
pub trait ChatModel: Send + Sync {
    fn complete(&self, prompt: &str) -> Result<String>;
}

/// Raw document bytes to plain text.
pub trait TextExtractor: Send + Sync {
    fn extract(&self, bytes: &[u8]) -> Result<String>;
}

/// Append-only nearest-neighbor index over fixed-dimension vectors.
///
/// `search` returns at most `k` rows ordered by ascending distance, ties
/// broken by the lower row index. An empty index yields no rows.
pub trait VectorIndex: Send + Sync {
    fn dim(&self) -> usize;
    fn len(&self) -> usize;
    fn is_empty(&self) -> bool {
        self.len() == 0
    }
    fn add(&mut self, vectors: &[Embedding]) -> Result<()>;
    fn search(&self, query: &[f32], k: usize) -> Result<Vec<Neighbor>>;
}
