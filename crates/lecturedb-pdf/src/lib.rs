//! lecturedb-pdf
//!
//! PDF text extraction and the ingestion entry point: bytes in, labelled
//! chunks out.

pub mod extract;
pub mod ingest;

pub use extract::PdfExtractor;
pub use ingest::{list_pdf_files, validate_upload, Ingestor};
