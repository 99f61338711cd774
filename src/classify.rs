//! Turn pipeline failures into remediation text for the user.

use std::fmt;

use serde::Deserialize;

use crate::{
   error::{CommitGenError, FailureKind},
   request::CompletionRequest,
};

pub const SETUP_DOCS_URL: &str = concat!(env!("CARGO_PKG_REPOSITORY"), "#setup");

/// User-facing explanation of a failure.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserMessage {
   pub kind:     FailureKind,
   /// One-line description of what went wrong
   pub headline: String,
   /// Diagnostic context: serialized request, remote error detail
   pub details:  Vec<String>,
   /// What the user can do about it
   pub help:     Option<String>,
}

impl fmt::Display for UserMessage {
   fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
      writeln!(f, "{}", self.headline)?;
      for detail in &self.details {
         writeln!(f, "{detail}")?;
      }
      if let Some(ref help) = self.help {
         writeln!(f, "{help}")?;
      }
      Ok(())
   }
}

#[derive(Deserialize)]
struct RemoteErrorBody {
   error: RemoteError,
}

#[derive(Deserialize)]
struct RemoteError {
   message: Option<String>,
}

/// Pull `error.message` out of an OpenAI-style error body.
pub fn remote_error_message(body: &str) -> Option<String> {
   serde_json::from_str::<RemoteErrorBody>(body)
      .ok()
      .and_then(|b| b.error.message)
      .filter(|m| !m.trim().is_empty())
}

/// Classify `error` and build the message shown to the user. The error itself
/// is left for the caller to propagate.
pub fn classify(error: &CommitGenError, request: Option<&CompletionRequest>) -> UserMessage {
   let request_detail = || request.map(|r| format!("Request: {}", r.to_json()));

   match error {
      CommitGenError::BudgetExceeded {
         request_tokens,
         ceiling,
         context_window,
         max_output_tokens,
      } if *ceiling <= 0 => UserMessage {
         kind:     FailureKind::BudgetExceeded,
         headline: format!(
            "max_output_tokens ({max_output_tokens}) leaves no room for input in the \
             {context_window}-token context window."
         ),
         details:  vec![
            format!("The request needs {request_tokens} input tokens."),
            "No API call was made.".to_string(),
         ],
         help:     Some(format!(
            "Set max_output_tokens below {context_window}, or raise context_window_limit."
         )),
      },

      CommitGenError::BudgetExceeded { request_tokens, ceiling, .. } => UserMessage {
         kind:     FailureKind::BudgetExceeded,
         headline: format!(
            "The request is too large for the model: {request_tokens} input tokens, but only \
             {ceiling} fit alongside the reserved output tokens."
         ),
         details:  vec!["No API call was made.".to_string()],
         help:     Some(
            "Stage fewer changes, or raise context_window_limit / lower max_output_tokens for a \
             larger model."
               .to_string(),
         ),
      },

      CommitGenError::ApiError { status: 401, body } => UserMessage {
         kind:     FailureKind::Transport,
         headline: "The API rejected the credentials (HTTP 401). The API key is missing or \
                    invalid."
            .to_string(),
         details:  remote_error_message(body).into_iter().collect(),
         help:     Some(format!(
            "Set api_key in the config file or GITSCRIBE_API_KEY. For help see {SETUP_DOCS_URL}"
         )),
      },

      CommitGenError::ApiError { status, body } => {
         let mut details: Vec<String> = request_detail().into_iter().collect();
         match remote_error_message(body) {
            Some(message) => details.push(format!("Remote error: {message}")),
            None if !body.trim().is_empty() => details.push(format!("Response body: {body}")),
            None => {},
         }
         UserMessage {
            kind: FailureKind::Transport,
            headline: format!("Commit message generation failed (HTTP {status})."),
            details,
            help: None,
         }
      },

      CommitGenError::HttpError(e) => UserMessage {
         kind:     FailureKind::Transport,
         headline: "Could not reach the completion endpoint.".to_string(),
         details:  request_detail()
            .into_iter()
            .chain(std::iter::once(format!("Cause: {e}")))
            .collect(),
         help:     Some("Check api_base_url and your network connection.".to_string()),
      },

      CommitGenError::EmptyResponse => UserMessage {
         kind:     FailureKind::EmptyResponse,
         headline: "The model returned no usable content.".to_string(),
         details:  request_detail().into_iter().collect(),
         help:     Some("Try again, or pick a different model with --model.".to_string()),
      },

      CommitGenError::InvalidResponse { reason, body } => {
         let mut details: Vec<String> = request_detail().into_iter().collect();
         details.push(format!("Could not decode the response: {reason}"));
         if !body.trim().is_empty() {
            details.push(format!("Response body: {body}"));
         }
         UserMessage {
            kind: FailureKind::EmptyResponse,
            headline: "The model returned no usable content.".to_string(),
            details,
            help: Some("Check that api_base_url points at an OpenAI-compatible API.".to_string()),
         }
      },

      other => UserMessage {
         kind:     other.kind(),
         headline: other.to_string(),
         details:  Vec::new(),
         help:     None,
      },
   }
}
