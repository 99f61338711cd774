//! Pre-flight context window check.
//!
//! Runs before any request is built so an oversized diff never costs a
//! network round-trip or comes back truncated.

use crate::{
   config::ModelConfig,
   error::{CommitGenError, Result},
   tokens::TokenCounter,
   types::ChatMessage,
};

/// Role and framing tokens the chat format adds around each message.
pub const MESSAGE_OVERHEAD: usize = 4;

/// Estimated prompt size of `messages`, including per-message overhead.
pub fn request_tokens(messages: &[ChatMessage], counter: &TokenCounter) -> usize {
   messages
      .iter()
      .map(|msg| counter.count(msg.content()) + MESSAGE_OVERHEAD)
      .sum()
}

/// Input tokens left once the output allowance is reserved. Negative when the
/// output allowance alone exceeds the window.
pub fn input_ceiling(config: &ModelConfig) -> i64 {
   i64::from(config.context_window_limit) - i64::from(config.effective_max_output_tokens())
}

/// Reject requests that would not leave room for the completion.
///
/// A request must stay strictly below the ceiling; reaching it is a failure.
pub fn check_budget(
   messages: &[ChatMessage],
   config: &ModelConfig,
   counter: &TokenCounter,
) -> Result<()> {
   let request_tokens = request_tokens(messages, counter);
   let ceiling = input_ceiling(config);

   tracing::debug!(request_tokens, ceiling, messages = messages.len(), "checked token budget");

   let tokens = i64::try_from(request_tokens).unwrap_or(i64::MAX);
   if tokens >= ceiling {
      return Err(CommitGenError::BudgetExceeded {
         request_tokens,
         ceiling,
         context_window: config.context_window_limit,
         max_output_tokens: config.effective_max_output_tokens(),
      });
   }
   Ok(())
}

#[cfg(test)]
mod tests {
   use super::*;

   fn limits(window: u32, max_out: Option<u32>) -> ModelConfig {
      ModelConfig {
         context_window_limit: window,
         max_output_tokens: max_out,
         ..Default::default()
      }
   }

   /// A user message whose estimate is exactly `tokens` with the char counter.
   fn message_of(tokens: usize) -> ChatMessage {
      ChatMessage::user("abcd".repeat(tokens))
   }

   fn counter() -> TokenCounter {
      TokenCounter::estimate_only("test")
   }

   #[test]
   fn test_request_tokens_adds_overhead() {
      let messages = vec![message_of(10), ChatMessage::system(""), message_of(5)];
      assert_eq!(request_tokens(&messages, &counter()), 15 + 3 * MESSAGE_OVERHEAD);
   }

   #[test]
   fn test_rejects_4000_tokens_in_4096_window() {
      let config = limits(4096, Some(500));
      let messages = vec![message_of(4000 - MESSAGE_OVERHEAD)];
      let err = check_budget(&messages, &config, &counter()).unwrap_err();
      match err {
         CommitGenError::BudgetExceeded {
            request_tokens,
            ceiling,
            context_window,
            max_output_tokens,
         } => {
            assert_eq!(request_tokens, 4000);
            assert_eq!(ceiling, 3596);
            assert_eq!(context_window, 4096);
            assert_eq!(max_output_tokens, 500);
         },
         other => panic!("unexpected error: {other}"),
      }
   }

   #[test]
   fn test_accepts_1000_tokens_in_4096_window() {
      let config = limits(4096, Some(500));
      let messages = vec![message_of(600 - MESSAGE_OVERHEAD), message_of(400 - MESSAGE_OVERHEAD)];
      assert_eq!(request_tokens(&messages, &counter()), 1000);
      assert!(check_budget(&messages, &config, &counter()).is_ok());
   }

   #[test]
   fn test_boundary_is_rejected() {
      let config = limits(4096, Some(500));
      let at_ceiling = vec![message_of(3596 - MESSAGE_OVERHEAD)];
      assert!(check_budget(&at_ceiling, &config, &counter()).is_err());

      let just_below = vec![message_of(3595 - MESSAGE_OVERHEAD)];
      assert!(check_budget(&just_below, &config, &counter()).is_ok());
   }

   #[test]
   fn test_unset_max_tokens_reserves_default() {
      let config = limits(1000, None);
      assert_eq!(input_ceiling(&config), 500);
      assert!(check_budget(&[message_of(495)], &config, &counter()).is_ok());
      assert!(check_budget(&[message_of(496)], &config, &counter()).is_err());
   }

   #[test]
   fn test_output_allowance_larger_than_window_rejects_everything() {
      let config = limits(256, Some(512));
      assert_eq!(input_ceiling(&config), -256);
      assert!(check_budget(&[], &config, &counter()).is_err());
      assert!(check_budget(&[ChatMessage::user("hi")], &config, &counter()).is_err());

      let equal = limits(512, Some(512));
      assert!(check_budget(&[], &equal, &counter()).is_err());
   }

   #[test]
   fn test_empty_messages_fit() {
      let config = limits(4096, Some(500));
      assert!(check_budget(&[], &config, &counter()).is_ok());
   }
}
