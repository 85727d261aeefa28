//! Fixed-size overlapping word windows.
//!
//! Text is split on whitespace and re-joined with single spaces, so the
//! original spacing and line breaks are not preserved. Windows do not respect
//! sentence or paragraph boundaries.

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ChunkingConfig {
    pub chunk_size: usize,
    pub overlap: usize,
}

impl Default for ChunkingConfig {
    fn default() -> Self {
        Self { chunk_size: 400, overlap: 50 }
    }
}

impl ChunkingConfig {
    pub fn new(chunk_size: usize, overlap: usize) -> Result<Self> {
        let config = Self { chunk_size, overlap };
        config.validate()?;
        Ok(config)
    }

    /// Number of tokens the window start advances per step.
    pub fn stride(&self) -> Result<usize> {
        if self.overlap >= self.chunk_size {
            return Err(Error::InvalidChunkConfig { chunk_size: self.chunk_size, overlap: self.overlap });
        }
        Ok(self.chunk_size - self.overlap)
    }

    pub fn validate(&self) -> Result<()> {
        self.stride().map(|_| ())
    }

    pub fn chunk(&self, text: &str) -> Result<Vec<String>> {
        chunk_text(text, self.chunk_size, self.overlap)
    }
}

/// Splits `text` into windows of `chunk_size` words whose starts are
/// `chunk_size - overlap` words apart. The last window may be shorter.
pub fn chunk_text(text: &str, chunk_size: usize, overlap: usize) -> Result<Vec<String>> {
    let stride = ChunkingConfig { chunk_size, overlap }.stride()?;
    let words: Vec<&str> = text.split_whitespace().collect();
    let mut chunks = Vec::with_capacity(words.len().div_ceil(stride));
    let mut start = 0;
    while start < words.len() {
        let end = (start + chunk_size).min(words.len());
        chunks.push(words[start..end].join(" "));
        start += stride;
    }
    Ok(chunks)
}
