use std::time::Duration;

use serde::Deserialize;

use crate::{
   budget::check_budget,
   classify::{UserMessage, classify},
   config::ModelConfig,
   error::{CommitGenError, Result},
   request::{CompletionRequest, build_request},
   tokens::{TokenCounter, create_token_counter},
   types::ChatMessage,
};

/// Result of one completion call: the message text, or the failure.
pub type CompletionOutcome = Result<String>;

/// A failed generation: the error to propagate and the report to show for it.
#[derive(Debug)]
pub struct GenerationFailure {
   pub error:  CommitGenError,
   pub report: UserMessage,
}

// Truncated or filtered choices may omit `message` entirely
#[derive(Debug, Deserialize)]
struct Choice {
   #[serde(default)]
   message: Option<ResponseMessage>,
}

#[derive(Debug, Deserialize)]
struct ResponseMessage {
   #[serde(default)]
   content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ApiResponse {
   #[serde(default)]
   choices: Vec<Choice>,
}

/// Handle to an OpenAI-compatible chat completion endpoint. Credentials and
/// base URL are fixed at construction.
pub struct CompletionClient {
   client:   reqwest::blocking::Client,
   base_url: String,
   api_key:  Option<String>,
}

impl std::fmt::Debug for CompletionClient {
   fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
      f.debug_struct("CompletionClient")
         .field("base_url", &self.base_url)
         .field("has_api_key", &self.api_key.is_some())
         .finish_non_exhaustive()
   }
}

impl CompletionClient {
   /// Build HTTP client with timeouts from config
   pub fn new(config: &ModelConfig) -> Result<Self> {
      let client = reqwest::blocking::Client::builder()
         .timeout(Duration::from_secs(config.request_timeout_secs))
         .connect_timeout(Duration::from_secs(config.connect_timeout_secs))
         .build()?;

      Ok(Self {
         client,
         base_url: config.api_base_url().to_string(),
         api_key: config.api_key.clone().filter(|k| !k.trim().is_empty()),
      })
   }

   pub fn endpoint(&self) -> String {
      format!("{}/chat/completions", self.base_url)
   }

   /// Send `request` once and return the first choice's text.
   pub fn complete(&self, request: &CompletionRequest) -> CompletionOutcome {
      let mut request_builder = self
         .client
         .post(self.endpoint())
         .header("content-type", "application/json");

      // Add Authorization header if API key is configured
      if let Some(ref api_key) = self.api_key {
         request_builder = request_builder.header("Authorization", format!("Bearer {api_key}"));
      }

      tracing::debug!(endpoint = %self.endpoint(), model = request.model(), "sending completion request");

      let response = request_builder.json(request).send()?;
      let status = response.status();

      if !status.is_success() {
         let error_text = response
            .text()
            .unwrap_or_else(|_| "Unknown error".to_string());
         return Err(CommitGenError::ApiError { status: status.as_u16(), body: error_text });
      }

      let body = response.text()?;
      let api_response: ApiResponse = match serde_json::from_str(&body) {
         Ok(parsed) => parsed,
         Err(e) => {
            return Err(CommitGenError::InvalidResponse { reason: e.to_string(), body });
         },
      };

      let content = api_response
         .choices
         .into_iter()
         .next()
         .and_then(|choice| choice.message)
         .and_then(|message| message.content)
         .map(|content| content.trim().to_string())
         .filter(|content| !content.is_empty())
         .ok_or(CommitGenError::EmptyResponse)?;

      Ok(content)
   }
}

/// Budget check, request assembly and completion in one call.
#[derive(Debug)]
pub struct CommitMessageGenerator {
   config:  ModelConfig,
   counter: TokenCounter,
   client:  CompletionClient,
}

impl CommitMessageGenerator {
   pub fn new(config: ModelConfig) -> Result<Self> {
      let counter = create_token_counter(&config);
      let client = CompletionClient::new(&config)?;
      Ok(Self { config, counter, client })
   }

   pub const fn config(&self) -> &ModelConfig {
      &self.config
   }

   /// Generate a commit message for `messages`.
   ///
   /// A failure comes back with its classified report attached; showing it is
   /// left to the caller so it can clear any progress output first.
   pub fn generate(
      &self,
      messages: &[ChatMessage],
   ) -> std::result::Result<String, GenerationFailure> {
      if let Err(error) = check_budget(messages, &self.config, &self.counter) {
         let report = classify(&error, None);
         return Err(GenerationFailure { error, report });
      }

      let request = build_request(messages, &self.config);
      self.client.complete(&request).map_err(|error| {
         tracing::debug!(kind = ?error.kind(), status = ?error.status(), "completion failed");
         let report = classify(&error, Some(&request));
         GenerationFailure { error, report }
      })
   }
}

#[cfg(test)]
mod tests {
   use wiremock::{
      Mock, MockServer, ResponseTemplate,
      matchers::{body_partial_json, header, method, path},
   };

   use super::*;
   use crate::{error::FailureKind, tokens::TokenCounter};

   fn config_for(server: &MockServer) -> ModelConfig {
      ModelConfig {
         api_base_url: Some(format!("{}/v1", server.uri())),
         api_key: Some("sk-test".to_string()),
         request_timeout_secs: 5,
         connect_timeout_secs: 5,
         ..Default::default()
      }
   }

   fn messages() -> Vec<ChatMessage> {
      vec![
         ChatMessage::system("Write a conventional commit message."),
         ChatMessage::user("+fn parse() {}"),
      ]
   }

   fn completion_body(content: &str) -> serde_json::Value {
      serde_json::json!({
         "id": "chatcmpl-1",
         "object": "chat.completion",
         "choices": [{
            "index": 0,
            "message": { "role": "assistant", "content": content },
            "finish_reason": "stop"
         }]
      })
   }

   /// Blocking reqwest owns its own runtime, so it has to live off the async
   /// test thread.
   async fn generate_blocking(
      config: ModelConfig,
   ) -> std::result::Result<String, GenerationFailure> {
      tokio::task::spawn_blocking(move || {
         let generator = CommitMessageGenerator {
            counter: TokenCounter::estimate_only(&config.model),
            client: CompletionClient::new(&config).unwrap(),
            config,
         };
         generator.generate(&messages())
      })
      .await
      .unwrap()
   }

   #[tokio::test]
   async fn test_success_returns_first_choice() {
      let server = MockServer::start().await;
      Mock::given(method("POST"))
         .and(path("/v1/chat/completions"))
         .and(header("authorization", "Bearer sk-test"))
         .and(body_partial_json(serde_json::json!({
            "model": "gpt-3.5-turbo",
            "temperature": 0.0,
            "max_tokens": 500,
            "messages": [
               { "role": "system", "content": "Write a conventional commit message." },
               { "role": "user", "content": "+fn parse() {}" }
            ]
         })))
         .respond_with(
            ResponseTemplate::new(200).set_body_json(completion_body("  feat: add parser\n")),
         )
         .expect(1)
         .mount(&server)
         .await;

      let text = generate_blocking(config_for(&server)).await.unwrap();
      assert_eq!(text, "feat: add parser");
   }

   #[tokio::test]
   async fn test_no_auth_header_without_key() {
      let server = MockServer::start().await;
      Mock::given(method("POST"))
         .and(path("/v1/chat/completions"))
         .and(header("authorization", "Bearer sk-test"))
         .respond_with(ResponseTemplate::new(500))
         .expect(0)
         .mount(&server)
         .await;
      Mock::given(method("POST"))
         .and(path("/v1/chat/completions"))
         .respond_with(ResponseTemplate::new(200).set_body_json(completion_body("fix: typo")))
         .expect(1)
         .mount(&server)
         .await;

      let config = ModelConfig { api_key: None, ..config_for(&server) };
      assert_eq!(generate_blocking(config).await.unwrap(), "fix: typo");
   }

   #[tokio::test]
   async fn test_budget_exceeded_never_reaches_server() {
      let server = MockServer::start().await;
      Mock::given(method("POST"))
         .respond_with(ResponseTemplate::new(200).set_body_json(completion_body("unused")))
         .expect(0)
         .mount(&server)
         .await;

      let config = ModelConfig {
         context_window_limit: 64,
         max_output_tokens: Some(60),
         ..config_for(&server)
      };
      let failure = generate_blocking(config).await.unwrap_err();
      assert_eq!(failure.error.kind(), FailureKind::BudgetExceeded);
      assert_eq!(failure.report.kind, FailureKind::BudgetExceeded);
      assert!(failure.report.details.iter().any(|d| d.contains("No API call")));
   }

   #[tokio::test]
   async fn test_unauthorized_propagates_api_error() {
      let server = MockServer::start().await;
      Mock::given(method("POST"))
         .and(path("/v1/chat/completions"))
         .respond_with(ResponseTemplate::new(401).set_body_json(serde_json::json!({
            "error": { "message": "Incorrect API key provided", "type": "invalid_request_error" }
         })))
         .expect(1)
         .mount(&server)
         .await;

      let failure = generate_blocking(config_for(&server)).await.unwrap_err();
      match &failure.error {
         CommitGenError::ApiError { status, body } => {
            assert_eq!(*status, 401);
            assert!(body.contains("Incorrect API key"));
         },
         other => panic!("unexpected error: {other}"),
      }
      assert_eq!(failure.report.details, vec!["Incorrect API key provided".to_string()]);
      assert!(failure.report.help.unwrap().contains(crate::classify::SETUP_DOCS_URL));
   }

   #[tokio::test]
   async fn test_server_error_is_not_retried() {
      let server = MockServer::start().await;
      Mock::given(method("POST"))
         .respond_with(ResponseTemplate::new(503).set_body_string("overloaded"))
         .expect(1)
         .mount(&server)
         .await;

      let failure = generate_blocking(config_for(&server)).await.unwrap_err();
      assert_eq!(failure.error.kind(), FailureKind::Transport);
      assert_eq!(failure.error.status(), Some(503));
      // The report carries the request that was sent
      assert!(failure.report.details.iter().any(|d| d.contains("\"max_tokens\":500")));
      assert!(failure.report.details.contains(&"Response body: overloaded".to_string()));
   }

   #[tokio::test]
   async fn test_empty_choices_is_failure() {
      let server = MockServer::start().await;
      Mock::given(method("POST"))
         .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({ "choices": [] })))
         .mount(&server)
         .await;

      let failure = generate_blocking(config_for(&server)).await.unwrap_err();
      assert!(matches!(failure.error, CommitGenError::EmptyResponse));
   }

   #[tokio::test]
   async fn test_choice_without_message_is_empty_response() {
      let server = MockServer::start().await;
      Mock::given(method("POST"))
         .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "choices": [{ "index": 0, "finish_reason": "length" }]
         })))
         .expect(1)
         .mount(&server)
         .await;

      let failure = generate_blocking(config_for(&server)).await.unwrap_err();
      assert!(matches!(failure.error, CommitGenError::EmptyResponse));
      assert_eq!(failure.report.kind, FailureKind::EmptyResponse);
   }

   #[tokio::test]
   async fn test_undecodable_success_body_is_not_transport() {
      let server = MockServer::start().await;
      Mock::given(method("POST"))
         .respond_with(ResponseTemplate::new(200).set_body_string("<html>gateway login</html>"))
         .expect(1)
         .mount(&server)
         .await;

      let failure = generate_blocking(config_for(&server)).await.unwrap_err();
      match &failure.error {
         CommitGenError::InvalidResponse { body, .. } => {
            assert_eq!(body, "<html>gateway login</html>");
         },
         other => panic!("unexpected error: {other}"),
      }
      assert_eq!(failure.error.kind(), FailureKind::EmptyResponse);
      assert_eq!(failure.report.kind, FailureKind::EmptyResponse);
      assert!(failure.report.details.iter().any(|d| d.contains("gateway login")));
   }

   #[tokio::test]
   async fn test_blank_or_null_content_is_failure() {
      let server = MockServer::start().await;
      Mock::given(method("POST"))
         .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "choices": [{ "message": { "role": "assistant", "content": null } }]
         })))
         .up_to_n_times(1)
         .mount(&server)
         .await;
      Mock::given(method("POST"))
         .respond_with(ResponseTemplate::new(200).set_body_json(completion_body("   \n")))
         .mount(&server)
         .await;

      let first = generate_blocking(config_for(&server)).await.unwrap_err();
      assert!(matches!(first.error, CommitGenError::EmptyResponse));
      let second = generate_blocking(config_for(&server)).await.unwrap_err();
      assert!(matches!(second.error, CommitGenError::EmptyResponse));
   }

   #[tokio::test]
   async fn test_connection_refused_is_transport() {
      // Bind then drop a listener so the port is closed
      let port = {
         let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
         listener.local_addr().unwrap().port()
      };
      let config = ModelConfig {
         api_base_url: Some(format!("http://127.0.0.1:{port}/v1")),
         request_timeout_secs: 2,
         connect_timeout_secs: 2,
         ..Default::default()
      };

      let failure = generate_blocking(config).await.unwrap_err();
      assert!(matches!(failure.error, CommitGenError::HttpError(_)));
      assert_eq!(failure.error.kind(), FailureKind::Transport);
      assert!(failure.report.headline.contains("Could not reach"));
   }
}
