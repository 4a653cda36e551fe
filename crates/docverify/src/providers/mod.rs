//! Provider abstractions for the document-analysis LLM
//!
//! The pipeline only talks to [`DocumentLlm`]; `GeminiClient` is the
//! production implementation.

pub mod gemini;
pub mod llm;

pub use gemini::GeminiClient;
pub use llm::{await_ready, DocumentLlm, FileState, PollPolicy, RemoteFile};
