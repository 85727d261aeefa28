use std::hash::{Hash, Hasher};
use std::sync::Arc;

use tracing::info;
use twox_hash::XxHash64;

use lecturedb_core::config::{EmbeddingBackend, Settings};
use lecturedb_core::traits::Embedder;
use lecturedb_core::types::Embedding;
use lecturedb_core::Result;

pub mod gemini;

pub use gemini::GeminiEmbedder;

/// Deterministic hashed bag-of-words vectors, L2-normalized.
///
/// Identical texts always map to identical vectors, which is all the
/// retrieval tests need. Empty text maps to the zero vector, and a zero
/// dimension to empty vectors.
pub struct FakeEmbedder {
    dim: usize,
}

impl FakeEmbedder {
    pub fn new(dim: usize) -> Self { Self { dim } }

    pub fn embed_text(&self, text: &str) -> Embedding {
        let mut v = vec![0f32; self.dim];
        if self.dim == 0 {
            return v;
        }
        for (i, token) in text.split_whitespace().enumerate() {
            let mut hasher = XxHash64::with_seed(0);
            token.hash(&mut hasher);
            let h = hasher.finish();
            let idx = (h as usize) % self.dim;
            let val = (((h >> 32) as u32) as f32) / (u32::MAX as f32);
            v[idx] += val + (i as f32 % 3.0) * 0.01;
        }
        let norm = (v.iter().map(|x| x * x).sum::<f32>()).sqrt().max(1e-6);
        for x in &mut v { *x /= norm; }
        v
    }
}

impl Embedder for FakeEmbedder {
    fn dim(&self) -> usize { self.dim }

    fn model_id(&self) -> &str { "fake:xxhash64" }

    fn embed_batch(&self, texts: &[String]) -> Result<Vec<Embedding>> {
        Ok(texts.iter().map(|t| self.embed_text(t)).collect())
    }
}

fn fake_forced() -> bool {
    std::env::var("APP_USE_FAKE_EMBEDDINGS")
        .ok()
        .map(|v| v == "1" || v.eq_ignore_ascii_case("true"))
        .unwrap_or(false)
}

/// Picks the embedding backend from settings. `APP_USE_FAKE_EMBEDDINGS=1`
/// forces the fake backend regardless of configuration.
pub fn get_default_embedder(settings: &Settings) -> Result<Arc<dyn Embedder>> {
    let dim = settings.embedding.dimension;
    if fake_forced() || settings.embedding.backend == EmbeddingBackend::Fake {
        info!(dim, "using fake embedder");
        return Ok(Arc::new(FakeEmbedder::new(dim)));
    }
    let embedder = GeminiEmbedder::new(&settings.gemini, &settings.embedding)?;
    info!(model = embedder.model_id(), dim, "using Gemini embedder");
    Ok(Arc::new(embedder))
}
