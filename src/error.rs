use thiserror::Error;

/// Coarse classification of a failed generation, used to pick the
/// remediation text shown to the user.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
   /// Rejected locally before any request was sent.
   BudgetExceeded,
   /// Network fault or non-2xx response from the completion endpoint.
   Transport,
   /// The endpoint answered but produced nothing usable.
   EmptyResponse,
   /// Anything outside the completion pipeline (config, IO, clipboard).
   Other,
}

#[derive(Debug, Error)]
pub enum CommitGenError {
   #[error(
      "Request uses {request_tokens} tokens, over the {ceiling} token input budget of the model"
   )]
   BudgetExceeded {
      request_tokens:    usize,
      ceiling:           i64,
      context_window:    u32,
      max_output_tokens: u32,
   },

   #[error("API request failed (HTTP {status}): {body}")]
   ApiError { status: u16, body: String },

   #[error("Model returned an empty response")]
   EmptyResponse,

   #[error("Model response could not be decoded: {reason}")]
   InvalidResponse { reason: String, body: String },

   #[error("No changes found in {source_name}")]
   NoChanges { source_name: String },

   #[error("Invalid configuration: {0}")]
   Config(String),

   #[error("Failed to render prompt template: {0}")]
   Template(#[from] tera::Error),

   #[error("IO error: {0}")]
   IoError(#[from] std::io::Error),

   #[error("JSON error: {0}")]
   JsonError(#[from] serde_json::Error),

   #[error("HTTP error: {0}")]
   HttpError(#[from] reqwest::Error),

   #[error("Clipboard error: {0}")]
   ClipboardError(#[from] arboard::Error),

   #[error("{0}")]
   Other(String),
}

impl CommitGenError {
   pub const fn kind(&self) -> FailureKind {
      match self {
         Self::BudgetExceeded { .. } => FailureKind::BudgetExceeded,
         Self::ApiError { .. } | Self::HttpError(_) => FailureKind::Transport,
         Self::EmptyResponse | Self::InvalidResponse { .. } => FailureKind::EmptyResponse,
         _ => FailureKind::Other,
      }
   }

   /// HTTP status of a transport failure, when the server answered at all.
   pub fn status(&self) -> Option<u16> {
      match self {
         Self::ApiError { status, .. } => Some(*status),
         Self::HttpError(e) => e.status().map(|s| s.as_u16()),
         _ => None,
      }
   }
}

pub type Result<T> = std::result::Result<T, CommitGenError>;
