use std::{fmt, path::PathBuf};

use clap::Parser;
use serde::{Deserialize, Serialize};

// === Chat messages ===

/// Author of a chat turn
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
   System,
   User,
   Assistant,
}

impl Role {
   pub const fn as_str(self) -> &'static str {
      match self {
         Self::System => "system",
         Self::User => "user",
         Self::Assistant => "assistant",
      }
   }
}

impl fmt::Display for Role {
   fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
      f.write_str(self.as_str())
   }
}

/// One turn of the conversation sent to the model.
///
/// Fields are private so a message cannot change after construction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
   role:    Role,
   content: String,
}

impl ChatMessage {
   pub fn new(role: Role, content: impl Into<String>) -> Self {
      Self { role, content: content.into() }
   }

   pub fn system(content: impl Into<String>) -> Self {
      Self::new(Role::System, content)
   }

   pub fn user(content: impl Into<String>) -> Self {
      Self::new(Role::User, content)
   }

   pub fn assistant(content: impl Into<String>) -> Self {
      Self::new(Role::Assistant, content)
   }

   pub const fn role(&self) -> Role {
      self.role
   }

   pub fn content(&self) -> &str {
      &self.content
   }
}

// === CLI ===

#[derive(Parser, Debug, Default)]
#[command(author, version, about = "Generate a commit message for a diff", long_about = None)]
pub struct Args {
   /// Read the diff from this file instead of stdin
   #[arg(long, short = 'f')]
   pub diff_file: Option<PathBuf>,

   /// Model to use (default: gpt-3.5-turbo). Accepts short names like 4o or
   /// gpt4.
   #[arg(long, short = 'm')]
   pub model: Option<String>,

   /// Maximum tokens the model may generate
   #[arg(long)]
   pub max_tokens: Option<u32>,

   /// Path to config file (default: ~/.config/gitscribe/config.toml)
   #[arg(long)]
   pub config: Option<PathBuf>,

   /// Copy the message to clipboard
   #[arg(long)]
   pub copy: bool,

   /// Skip the check for a newer release
   #[arg(long)]
   pub no_version_check: bool,

   /// Additional context for the model (all trailing non-flag text)
   #[arg(trailing_var_arg = true)]
   pub context: Vec<String>,
}

/// Expand a short model alias into the full model id.
///
/// Unknown names are passed through unchanged.
pub fn resolve_model_name(name: &str) -> String {
   match name {
      "3.5" | "gpt3.5" | "turbo" => "gpt-3.5-turbo",
      "3.5-16k" => "gpt-3.5-turbo-16k",
      "4" | "gpt4" => "gpt-4",
      "4-32k" | "gpt4-32k" => "gpt-4-32k",
      "4t" | "gpt4-turbo" => "gpt-4-turbo",
      "4o" | "gpt4o" => "gpt-4o",
      "4o-mini" | "mini" => "gpt-4o-mini",
      "4.1" | "gpt4.1" => "gpt-4.1",
      _ => name,
   }
   .to_string()
}

#[cfg(test)]
mod tests {
   use super::*;

   #[test]
   fn test_role_serializes_lowercase() {
      let msg = ChatMessage::assistant("feat: add parser");
      let json = serde_json::to_value(&msg).unwrap();
      assert_eq!(json, serde_json::json!({ "role": "assistant", "content": "feat: add parser" }));
   }

   #[test]
   fn test_role_roundtrip_from_wire() {
      let msg: ChatMessage =
         serde_json::from_str(r#"{"role":"system","content":"be terse"}"#).unwrap();
      assert_eq!(msg.role(), Role::System);
      assert_eq!(msg.content(), "be terse");
   }

   #[test]
   fn test_resolve_model_name_aliases() {
      assert_eq!(resolve_model_name("4o"), "gpt-4o");
      assert_eq!(resolve_model_name("turbo"), "gpt-3.5-turbo");
      assert_eq!(resolve_model_name("gpt4"), "gpt-4");
   }

   #[test]
   fn test_resolve_model_name_passthrough() {
      assert_eq!(resolve_model_name("my-local-model"), "my-local-model");
      assert_eq!(resolve_model_name("gpt-4o-2024-08-06"), "gpt-4o-2024-08-06");
   }

   #[test]
   fn test_args_parse_trailing_context() {
      let args = Args::parse_from(["gitscribe", "-m", "4o", "fixes", "login", "bug"]);
      assert_eq!(args.model.as_deref(), Some("4o"));
      assert_eq!(args.context, vec!["fixes", "login", "bug"]);
      assert!(!args.copy);
   }
}
