use serde::Serialize;

use crate::{config::ModelConfig, types::ChatMessage};

/// Sampling is pinned for reproducible, low-variance commit messages.
pub const TEMPERATURE: f32 = 0.0;
pub const TOP_P: f32 = 0.1;

/// Body of a `/chat/completions` call. Built once per call and never mutated.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CompletionRequest {
   model:       String,
   messages:    Vec<ChatMessage>,
   temperature: f32,
   top_p:       f32,
   max_tokens:  u32,
}

impl CompletionRequest {
   pub fn model(&self) -> &str {
      &self.model
   }

   pub fn messages(&self) -> &[ChatMessage] {
      &self.messages
   }

   pub const fn temperature(&self) -> f32 {
      self.temperature
   }

   pub const fn top_p(&self) -> f32 {
      self.top_p
   }

   pub const fn max_tokens(&self) -> u32 {
      self.max_tokens
   }

   /// Compact JSON used in failure reports.
   pub fn to_json(&self) -> String {
      serde_json::to_string(self).unwrap_or_else(|e| format!("<unserializable request: {e}>"))
   }
}

/// Assemble the request payload. Budget validation must already have passed.
pub fn build_request(messages: &[ChatMessage], config: &ModelConfig) -> CompletionRequest {
   if config.temperature != TEMPERATURE || config.top_p != TOP_P {
      tracing::debug!(
         temperature = config.temperature,
         top_p = config.top_p,
         "ignoring configured sampling parameters"
      );
   }

   CompletionRequest {
      model:       config.model.clone(),
      messages:    messages.to_vec(),
      temperature: TEMPERATURE,
      top_p:       TOP_P,
      max_tokens:  config.effective_max_output_tokens(),
   }
}
