use std::path::{Path, PathBuf};
use std::sync::Arc;

use tracing::{info, warn};

use lecturedb_core::chunker::ChunkingConfig;
use lecturedb_core::traits::TextExtractor;
use lecturedb_core::types::{Chunk, ChunkMetadata};
use lecturedb_core::{Error, Result};

use crate::extract::PdfExtractor;

/// Turns uploaded PDF bytes into chunks ready for the document store.
pub struct Ingestor {
    extractor: Arc<dyn TextExtractor>,
    chunking: ChunkingConfig,
}

impl Default for Ingestor {
    fn default() -> Self {
        Self { extractor: Arc::new(PdfExtractor::new()), chunking: ChunkingConfig::default() }
    }
}

impl Ingestor {
    pub fn new(extractor: Arc<dyn TextExtractor>, chunking: ChunkingConfig) -> Result<Self> {
        chunking.validate()?;
        Ok(Self { extractor, chunking })
    }

    /// Extracts, chunks and labels a document. Chunk `i` carries
    /// `{source: filename, chunk: i}`.
    pub fn ingest(&self, pdf_bytes: &[u8], filename: &str) -> Result<Vec<Chunk>> {
        let text = self.extractor.extract(pdf_bytes)?;
        let chunks: Vec<Chunk> = self
            .chunking
            .chunk(&text)?
            .into_iter()
            .enumerate()
            .map(|(i, text)| Chunk { text, metadata: ChunkMetadata::new(filename, i) })
            .collect();
        info!(filename, chunks = chunks.len(), "ingested document");
        Ok(chunks)
    }
}

/// Rejects uploads that are obviously not PDFs before any parsing.
pub fn validate_upload(filename: &str, bytes: &[u8]) -> Result<()> {
    if !filename.to_ascii_lowercase().ends_with(".pdf") {
        warn!(filename, "rejected non-PDF upload");
        return Err(Error::InvalidUpload("Only PDF files are allowed.".into()));
    }
    if bytes.is_empty() {
        warn!(filename, "rejected empty upload");
        return Err(Error::InvalidUpload("Uploaded file is empty.".into()));
    }
    Ok(())
}

/// All `.pdf` files under `root`, sorted by path. A file path is returned
/// as-is when it names a PDF.
pub fn list_pdf_files(root: &Path) -> Vec<PathBuf> {
    let mut pdf_files: Vec<PathBuf> = walkdir::WalkDir::new(root)
        .into_iter()
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().is_file())
        .map(|e| e.into_path())
        .filter(|p| p.extension().and_then(|s| s.to_str()).is_some_and(|ext| ext.eq_ignore_ascii_case("pdf")))
        .collect();
    pdf_files.sort();
    pdf_files
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn upload_validation() {
        assert!(validate_upload("notes.PDF", b"%PDF-1.4").is_ok());
        assert!(matches!(validate_upload("notes.txt", b"text"), Err(Error::InvalidUpload(_))));
        assert!(matches!(validate_upload("notes.pdf", b""), Err(Error::InvalidUpload(_))));
    }

    #[test]
    fn invalid_chunking_is_rejected_up_front() {
        let err = Ingestor::new(Arc::new(PdfExtractor::new()), ChunkingConfig { chunk_size: 10, overlap: 10 }).err();
        assert!(matches!(err, Some(Error::InvalidChunkConfig { chunk_size: 10, overlap: 10 })));
    }
}
