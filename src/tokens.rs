//! Token counting with cascading fallback.
//!
//! Attempts token counting in order:
//! 1. tiktoken encoder registered for the model
//! 2. tiktoken `cl100k_base` (shared by the GPT-3.5/GPT-4 family)
//! 3. Character estimate (4 bytes ≈ 1 token, rounded up)

use std::fmt;

use tiktoken_rs::{CoreBPE, cl100k_base, get_bpe_from_model};

use crate::config::ModelConfig;

/// Create a `TokenCounter` for the configured model.
pub fn create_token_counter(config: &ModelConfig) -> TokenCounter {
   TokenCounter::for_model(&config.model)
}

/// Offline token estimator. Loading the BPE tables is the expensive part, so
/// build one per process and share it.
pub struct TokenCounter {
   model:    String,
   tiktoken: Option<CoreBPE>,
}

impl fmt::Debug for TokenCounter {
   fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
      f.debug_struct("TokenCounter")
         .field("model", &self.model)
         .field("has_tiktoken", &self.tiktoken.is_some())
         .finish_non_exhaustive()
   }
}

impl TokenCounter {
   pub fn for_model(model: &str) -> Self {
      let tiktoken = get_bpe_from_model(model).or_else(|_| cl100k_base()).ok();
      if tiktoken.is_none() {
         tracing::warn!(model, "no tokenizer available, falling back to character estimate");
      }
      Self { model: model.to_string(), tiktoken }
   }

   /// Counter that never loads BPE tables.
   pub fn estimate_only(model: &str) -> Self {
      Self { model: model.to_string(), tiktoken: None }
   }

   pub fn model(&self) -> &str {
      &self.model
   }

   /// Count tokens for a text string. Empty input is always 0.
   pub fn count(&self, text: &str) -> usize {
      if text.is_empty() {
         return 0;
      }
      if let Some(ref encoder) = self.tiktoken {
         encoder.encode_with_special_tokens(text).len()
      } else {
         text.len().div_ceil(4)
      }
   }
}

#[cfg(test)]
mod tests {
   use super::*;

   #[test]
   fn test_empty_is_zero() {
      assert_eq!(TokenCounter::for_model("gpt-3.5-turbo").count(""), 0);
      assert_eq!(TokenCounter::estimate_only("x").count(""), 0);
   }

   #[test]
   fn test_deterministic() {
      let counter = TokenCounter::for_model("gpt-4");
      let text = "diff --git a/src/lib.rs b/src/lib.rs\n+pub fn answer() -> u32 { 42 }\n";
      assert_eq!(counter.count(text), counter.count(text));
      assert!(counter.count(text) > 0);
   }

   #[test]
   fn test_concatenation_never_shrinks() {
      let counter = TokenCounter::for_model("gpt-3.5-turbo");
      let pairs = [
         ("hello world", " and goodbye"),
         ("fn main() {", "\n    println!(\"hi\");\n}"),
         ("- removed line\n", "+ added line\n"),
         ("a", "b"),
      ];
      for (a, b) in pairs {
         let joined = format!("{a}{b}");
         let total = counter.count(&joined);
         assert!(total >= counter.count(a), "{joined:?}");
         assert!(total >= counter.count(b), "{joined:?}");
      }
   }

   #[test]
   fn test_unknown_model_uses_cl100k() {
      let counter = TokenCounter::for_model("some-self-hosted-model");
      let reference = TokenCounter::for_model("gpt-4");
      let text = "Refactored the request builder.";
      assert_eq!(counter.count(text), reference.count(text));
   }

   #[test]
   fn test_char_estimate_rounds_up() {
      let counter = TokenCounter::estimate_only("offline");
      assert_eq!(counter.count("abc"), 1);
      assert_eq!(counter.count("abcd"), 1);
      assert_eq!(counter.count("abcde"), 2);
      assert_eq!(counter.count(&"x".repeat(4000)), 1000);
   }
}
