use std::panic::{self, AssertUnwindSafe};

use tracing::debug;

use lecturedb_core::traits::TextExtractor;
use lecturedb_core::{Error, Result};

/// Pages are separated by one blank line in the extracted text.
pub const PAGE_SEPARATOR: &str = "\n\n";

/// Text layer extraction through `pdf-extract`. Scanned PDFs without a text
/// layer come back empty and are reported as extraction failures.
#[derive(Debug, Default, Clone, Copy)]
pub struct PdfExtractor;

impl PdfExtractor {
    pub fn new() -> Self { Self }

    pub fn extract_pages(&self, bytes: &[u8]) -> Result<Vec<String>> {
        // pdf-extract panics on some malformed files instead of returning an error.
        let outcome = panic::catch_unwind(AssertUnwindSafe(|| pdf_extract::extract_text_from_mem_by_pages(bytes)));
        match outcome {
            Ok(Ok(pages)) => Ok(pages),
            Ok(Err(e)) => Err(Error::Extraction(format!("Failed to parse PDF: {e}"))),
            Err(_) => Err(Error::Extraction("Failed to parse PDF: parser aborted on malformed input".into())),
        }
    }
}

impl TextExtractor for PdfExtractor {
    fn extract(&self, bytes: &[u8]) -> Result<String> {
        let pages = self.extract_pages(bytes)?;
        debug!(pages = pages.len(), "extracted PDF text layer");
        let text = pages.join(PAGE_SEPARATOR);
        if text.trim().is_empty() {
            return Err(Error::Extraction("No text could be extracted from the PDF.".into()));
        }
        Ok(text)
    }
}
