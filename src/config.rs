use std::{
   fmt,
   path::{Path, PathBuf},
};

use serde::Deserialize;

use crate::error::{CommitGenError, Result};

/// Fallback output allowance when `max_output_tokens` is not configured.
pub const DEFAULT_MAX_OUTPUT_TOKENS: u32 = 500;

/// Context window assumed for the default model.
pub const DEFAULT_CONTEXT_WINDOW: u32 = 4096;

pub const DEFAULT_API_BASE_URL: &str = "https://api.openai.com/v1";

#[derive(Clone, Deserialize)]
#[serde(default)]
pub struct ModelConfig {
   /// Model id sent with every request
   pub model: String,

   /// Upper bound on generated tokens (falls back to 500 when unset)
   pub max_output_tokens: Option<u32>,

   /// Combined input+output token limit of the model
   pub context_window_limit: u32,

   /// Accepted for compatibility; requests always use 0.0
   pub temperature: f32,

   /// Accepted for compatibility; requests always use 0.1
   pub top_p: f32,

   /// Optional API key for authentication (overridden by `GITSCRIBE_API_KEY`
   /// env var)
   pub api_key: Option<String>,

   /// Custom endpoint, e.g. a proxy or Azure deployment (overridden by
   /// `GITSCRIBE_API_URL`)
   pub api_base_url: Option<String>,

   /// HTTP request timeout in seconds
   pub request_timeout_secs: u64,

   /// HTTP connection timeout in seconds
   pub connect_timeout_secs: u64,

   /// Ask for a GitMoji prefix instead of a conventional commit type
   pub emoji: bool,

   /// Ask for a short explanation below the subject line
   pub description: bool,

   /// Language of the generated message
   pub language: String,

   /// Look up the latest published release on startup
   pub version_check: bool,
}

impl Default for ModelConfig {
   fn default() -> Self {
      Self {
         model:                "gpt-3.5-turbo".to_string(),
         max_output_tokens:    None,
         context_window_limit: DEFAULT_CONTEXT_WINDOW,
         temperature:          0.0,
         top_p:                0.1,
         api_key:              None,
         api_base_url:         None,
         request_timeout_secs: 120,
         connect_timeout_secs: 30,
         emoji:                false,
         description:          false,
         language:             "en".to_string(),
         version_check:        true,
      }
   }
}

impl fmt::Debug for ModelConfig {
   fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
      f.debug_struct("ModelConfig")
         .field("model", &self.model)
         .field("max_output_tokens", &self.max_output_tokens)
         .field("context_window_limit", &self.context_window_limit)
         .field("api_key", &self.api_key.as_ref().map(|_| "<redacted>"))
         .field("api_base_url", &self.api_base_url)
         .finish_non_exhaustive()
   }
}

impl ModelConfig {
   /// Load config from default location (~/.config/gitscribe/config.toml)
   /// Falls back to Default if file doesn't exist or can't determine home
   /// directory. Environment variables override config file values:
   /// - `GITSCRIBE_API_URL` overrides `api_base_url`
   /// - `GITSCRIBE_API_KEY` overrides `api_key`
   /// - `GITSCRIBE_MODEL` overrides `model`
   /// - `GITSCRIBE_MAX_TOKENS` overrides `max_output_tokens`
   pub fn load() -> Result<Self> {
      let config_path = if let Ok(custom_path) = std::env::var("GITSCRIBE_CONFIG") {
         PathBuf::from(custom_path)
      } else {
         Self::default_config_path().unwrap_or_else(|_| PathBuf::new())
      };

      if config_path.exists() {
         Self::from_file(&config_path)
      } else {
         let mut config = Self::default();
         config.apply_env_overrides()?;
         config.validate()?;
         Ok(config)
      }
   }

   /// Load config from specific file
   pub fn from_file(path: &Path) -> Result<Self> {
      let contents = std::fs::read_to_string(path).map_err(|e| {
         CommitGenError::Config(format!("failed to read {}: {e}", path.display()))
      })?;
      let mut config: Self = toml::from_str(&contents).map_err(|e| {
         CommitGenError::Config(format!("failed to parse {}: {e}", path.display()))
      })?;

      config.apply_env_overrides()?;
      config.validate()?;
      tracing::debug!(path = %path.display(), model = %config.model, "loaded config");
      Ok(config)
   }

   /// Apply environment variable overrides to config
   fn apply_env_overrides(&mut self) -> Result<()> {
      if let Ok(api_url) = std::env::var("GITSCRIBE_API_URL") {
         self.api_base_url = Some(api_url);
      }

      if let Ok(api_key) = std::env::var("GITSCRIBE_API_KEY") {
         self.api_key = Some(api_key);
      }

      if let Ok(model) = std::env::var("GITSCRIBE_MODEL") {
         self.model = model;
      }

      if let Ok(max_tokens) = std::env::var("GITSCRIBE_MAX_TOKENS") {
         let parsed = max_tokens.trim().parse::<u32>().map_err(|e| {
            CommitGenError::Config(format!("GITSCRIBE_MAX_TOKENS={max_tokens:?} is not a count: {e}"))
         })?;
         self.max_output_tokens = Some(parsed);
      }

      Ok(())
   }

   fn validate(&self) -> Result<()> {
      if self.model.trim().is_empty() {
         return Err(CommitGenError::Config("model must not be empty".to_string()));
      }
      if self.context_window_limit == 0 {
         return Err(CommitGenError::Config("context_window_limit must be > 0".to_string()));
      }
      if self.max_output_tokens == Some(0) {
         return Err(CommitGenError::Config("max_output_tokens must be > 0".to_string()));
      }
      Ok(())
   }

   /// Output allowance actually requested from the model.
   pub fn effective_max_output_tokens(&self) -> u32 {
      self.max_output_tokens.unwrap_or(DEFAULT_MAX_OUTPUT_TOKENS)
   }

   /// Base URL without a trailing slash.
   pub fn api_base_url(&self) -> &str {
      self
         .api_base_url
         .as_deref()
         .filter(|url| !url.trim().is_empty())
         .unwrap_or(DEFAULT_API_BASE_URL)
         .trim_end_matches('/')
   }

   /// Get the config directory (platform-safe)
   /// Tries HOME (Unix/Linux/macOS) then USERPROFILE (Windows)
   pub fn config_dir() -> Result<PathBuf> {
      std::env::var("HOME")
         .or_else(|_| std::env::var("USERPROFILE"))
         .map(|home| PathBuf::from(home).join(".config").join("gitscribe"))
         .map_err(|_| {
            CommitGenError::Other("No home directory found (tried HOME and USERPROFILE)".to_string())
         })
   }

   pub fn default_config_path() -> Result<PathBuf> {
      Ok(Self::config_dir()?.join("config.toml"))
   }
}
