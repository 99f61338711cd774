//! Chat conversation sent to the model: instructions, one worked example, then
//! the real diff.

use std::path::PathBuf;

use rust_embed::RustEmbed;
use tera::{Context, Tera};

use crate::{
   config::ModelConfig,
   error::{CommitGenError, Result},
   types::ChatMessage,
};

/// Embedded prompts folder (compiled into binary)
#[derive(RustEmbed)]
#[folder = "prompts/"]
struct Prompts;

const SYSTEM_TEMPLATE: &str = "system.md";
const EXAMPLE_DIFF: &str = "example_diff.txt";

const EXAMPLE_SUBJECT: &str = "read listening port from PORT environment variable";
const EXAMPLE_REASON: &str =
   "The port was hardcoded, so two instances could not run side by side on one host.";

/// User override at ~/.config/gitscribe/prompts/system.md
fn user_template_path() -> Option<PathBuf> {
   ModelConfig::config_dir()
      .ok()
      .map(|dir| dir.join("prompts").join(SYSTEM_TEMPLATE))
}

fn embedded(name: &str) -> Result<String> {
   let file = Prompts::get(name)
      .ok_or_else(|| CommitGenError::Other(format!("Embedded prompt {name} is missing")))?;
   String::from_utf8(file.data.into_owned())
      .map_err(|e| CommitGenError::Other(format!("Embedded prompt {name} is not valid UTF-8: {e}")))
}

fn load_system_template() -> Result<String> {
   if let Some(path) = user_template_path().filter(|p| p.exists()) {
      tracing::debug!(path = %path.display(), "using user system prompt");
      return Ok(std::fs::read_to_string(&path)?);
   }
   embedded(SYSTEM_TEMPLATE)
}

/// Render the system instructions with the message style options.
pub fn render_system_prompt(template: &str, config: &ModelConfig) -> Result<String> {
   let mut context = Context::new();
   context.insert("emoji", &config.emoji);
   context.insert("description", &config.description);
   context.insert("language", &config.language);

   let rendered = Tera::one_off(template, &context, false)?;
   Ok(rendered.trim().to_string())
}

/// The assistant answer for the worked example, in the configured style.
fn example_answer(config: &ModelConfig) -> String {
   let subject = if config.emoji {
      format!("\u{2728} {EXAMPLE_SUBJECT}")
   } else {
      format!("feat(server): {EXAMPLE_SUBJECT}")
   };
   if config.description {
      format!("{subject}\n\n{EXAMPLE_REASON}")
   } else {
      subject
   }
}

/// Build the four-message conversation for `diff`.
pub fn build_messages(
   diff: &str,
   user_context: Option<&str>,
   config: &ModelConfig,
) -> Result<Vec<ChatMessage>> {
   let template = load_system_template()?;
   build_messages_with(&template, diff, user_context, config)
}

/// Same as [`build_messages`] with an explicit system template.
pub fn build_messages_with(
   template: &str,
   diff: &str,
   user_context: Option<&str>,
   config: &ModelConfig,
) -> Result<Vec<ChatMessage>> {
   let system = render_system_prompt(template, config)?;

   let diff_message = match user_context.map(str::trim).filter(|c| !c.is_empty()) {
      Some(ctx) => format!("ADDITIONAL CONTEXT FROM USER:\n{ctx}\n\n{diff}"),
      None => diff.to_string(),
   };

   Ok(vec![
      ChatMessage::system(system),
      ChatMessage::user(embedded(EXAMPLE_DIFF)?),
      ChatMessage::assistant(example_answer(config)),
      ChatMessage::user(diff_message),
   ])
}
