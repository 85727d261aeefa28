//! In-memory retrieval: an exact L2 vector index and the document store that
//! keeps chunk texts, metadata and vectors aligned by insertion order.

pub mod index;
pub mod store;

pub use index::FlatL2Index;
pub use store::DocumentStore;
