//! lecturedb-assistant
//!
//! Chat on top of the retrieval pipeline: the Gemini chat client, the
//! conversational [`Assistant`], and [`RagService`], the single handle an
//! application front end holds for uploads, queries and chat.

pub mod assistant;
pub mod chat;
pub mod service;

pub use assistant::Assistant;
pub use chat::GeminiChat;
pub use service::{Answer, RagService};
