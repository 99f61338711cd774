//! Commit message generator library
//!
//! Turns a diff into a chat conversation, checks it against the model's
//! context window, and asks an OpenAI-compatible endpoint for the message.
pub mod api;
pub mod budget;
pub mod classify;
pub mod config;
pub mod error;
pub mod prompt;
pub mod request;
pub mod style;
pub mod tokens;
pub mod types;
pub mod version;

// Re-export commonly used types
pub use api::{CommitMessageGenerator, CompletionClient, CompletionOutcome, GenerationFailure};
pub use config::ModelConfig;
pub use error::{CommitGenError, FailureKind, Result};
pub use types::{ChatMessage, Role, resolve_model_name};
