use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

use tracing::{debug, info};

use lecturedb_core::traits::{Embedder, VectorIndex};
use lecturedb_core::types::{Chunk, ChunkMetadata, QueryResult};
use lecturedb_core::{Error, Result};

use crate::index::FlatL2Index;

/// Row `i` of `index` belongs to `texts[i]` and `metadatas[i]`.
struct Entries<I> {
    texts: Vec<String>,
    metadatas: Vec<ChunkMetadata>,
    index: I,
}

/// Chunk texts, their metadata and their vectors, kept in lockstep.
///
/// The three sequences sit behind one lock and are only ever appended
/// together, so a concurrent `search` never sees a vector without its text or
/// the other way round. Embedding happens before the lock is taken: a failed
/// embedding call leaves the store exactly as it was.
pub struct DocumentStore<I: VectorIndex = FlatL2Index> {
    embedder: Arc<dyn Embedder>,
    entries: RwLock<Entries<I>>,
}

impl DocumentStore<FlatL2Index> {
    /// A store backed by the exact index, sized to the embedder's dimension.
    pub fn new(embedder: Arc<dyn Embedder>) -> Result<Self> {
        let index = FlatL2Index::new(embedder.dim())?;
        Self::with_index(embedder, index)
    }
}

impl<I: VectorIndex> DocumentStore<I> {
    /// Fails when either side has a zero dimension.
    pub fn with_index(embedder: Arc<dyn Embedder>, index: I) -> Result<Self> {
        if embedder.dim() == 0 || index.dim() == 0 {
            return Err(Error::Configuration(format!(
                "vector dimension must be positive (embedder {}, index {})",
                embedder.dim(),
                index.dim()
            )));
        }
        Ok(Self { embedder, entries: RwLock::new(Entries { texts: Vec::new(), metadatas: Vec::new(), index }) })
    }

    pub fn dim(&self) -> usize { self.embedder.dim() }

    pub fn len(&self) -> Result<usize> {
        Ok(self.read()?.texts.len())
    }

    pub fn is_empty(&self) -> Result<bool> {
        Ok(self.len()? == 0)
    }

    /// Embeds `texts` in one batch and appends them with their metadata.
    /// Returns the number of entries added.
    pub fn add(&self, texts: Vec<String>, metadatas: Vec<ChunkMetadata>) -> Result<usize> {
        if texts.len() != metadatas.len() {
            return Err(Error::ArityMismatch { texts: texts.len(), metadatas: metadatas.len() });
        }
        if texts.is_empty() {
            return Ok(0);
        }

        let vectors = self.embedder.embed_batch(&texts)?;
        if vectors.len() != texts.len() {
            return Err(Error::EmbeddingService(format!(
                "embedder returned {} vectors for {} texts",
                vectors.len(),
                texts.len()
            )));
        }

        let added = texts.len();
        let mut entries = self.write()?;
        // `add` validates every row before touching the index, so an error
        // here leaves all three sequences unchanged.
        entries.index.add(&vectors)?;
        entries.texts.extend(texts);
        entries.metadatas.extend(metadatas);
        info!(added, total = entries.texts.len(), "documents added");
        Ok(added)
    }

    pub fn add_chunks(&self, chunks: Vec<Chunk>) -> Result<usize> {
        let (texts, metadatas): (Vec<String>, Vec<ChunkMetadata>) =
            chunks.into_iter().map(|c| (c.text, c.metadata)).unzip();
        self.add(texts, metadatas)
    }

    /// The `k` stored chunks closest to `query`, most similar first. An empty
    /// store answers with no results and does not call the embedder.
    pub fn search(&self, query: &str, k: usize) -> Result<Vec<QueryResult>> {
        if self.is_empty()? || k == 0 {
            return Ok(Vec::new());
        }
        let query_vector = self
            .embedder
            .embed_batch(&[query.to_string()])?
            .into_iter()
            .next()
            .ok_or_else(|| Error::EmbeddingService("no embedding returned for query".into()))?;

        let entries = self.read()?;
        let neighbors = entries.index.search(&query_vector, k)?;
        debug!(k, hits = neighbors.len(), "vector search");
        Ok(neighbors
            .into_iter()
            .filter_map(|n| {
                let text = entries.texts.get(n.row)?;
                let metadata = entries.metadatas.get(n.row)?;
                Some(QueryResult { text: text.clone(), metadata: metadata.clone() })
            })
            .collect())
    }

    fn read(&self) -> Result<RwLockReadGuard<'_, Entries<I>>> {
        self.entries.read().map_err(|_| Error::StorePoisoned)
    }

    fn write(&self) -> Result<RwLockWriteGuard<'_, Entries<I>>> {
        self.entries.write().map_err(|_| Error::StorePoisoned)
    }
}
