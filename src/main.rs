use std::{
   io::{self, IsTerminal, Read},
   process::ExitCode,
   time::Duration,
};

use arboard::Clipboard;
use clap::Parser;
use gitscribe::{
   CommitGenError, CommitMessageGenerator, FailureKind, ModelConfig, Result,
   classify::classify,
   prompt, style,
   types::{Args, resolve_model_name},
   version::VersionCheck,
};
use tracing_subscriber::EnvFilter;

/// How long to wait for the release lookup once the message is ready
const VERSION_GRACE: Duration = Duration::from_millis(300);

fn init_tracing() {
   let filter = EnvFilter::try_from_env("GITSCRIBE_LOG").unwrap_or_else(|_| EnvFilter::new("warn"));
   tracing_subscriber::fmt()
      .with_env_filter(filter)
      .with_writer(io::stderr)
      .with_target(false)
      .init();
}

/// Apply CLI overrides to config
fn apply_cli_overrides(config: &mut ModelConfig, args: &Args) {
   if let Some(ref model) = args.model {
      config.model = resolve_model_name(model);
   }
   if let Some(max_tokens) = args.max_tokens {
      if max_tokens > 0 {
         config.max_output_tokens = Some(max_tokens);
      } else {
         style::warn("--max-tokens must be positive, keeping configured value");
      }
   }
}

/// Load config from args or default
fn load_config_from_args(args: &Args) -> Result<ModelConfig> {
   if let Some(ref config_path) = args.config {
      ModelConfig::from_file(config_path)
   } else {
      ModelConfig::load()
   }
}

/// Read the diff from `--diff-file` or stdin.
fn read_diff(args: &Args) -> Result<String> {
   if let Some(ref path) = args.diff_file {
      return Ok(std::fs::read_to_string(path)?);
   }

   let mut stdin = io::stdin();
   if stdin.is_terminal() {
      return Err(CommitGenError::Other(
         "No diff given. Pipe one in (git diff --staged | gitscribe) or pass --diff-file"
            .to_string(),
      ));
   }
   let mut diff = String::new();
   stdin.read_to_string(&mut diff)?;
   Ok(diff)
}

/// Copy text to clipboard
fn copy_to_clipboard(text: &str) -> Result<()> {
   let mut clipboard = Clipboard::new()?;
   clipboard.set_text(text)?;
   Ok(())
}

fn run(args: &Args) -> Result<()> {
   let mut config = load_config_from_args(args)?;
   apply_cli_overrides(&mut config, args);

   let version_check = (config.version_check && !args.no_version_check)
      .then(|| VersionCheck::spawn(env!("CARGO_PKG_VERSION")));

   let diff = read_diff(args)?;
   if diff.trim().is_empty() {
      return Err(CommitGenError::NoChanges {
         source_name: args
            .diff_file
            .as_ref()
            .map_or_else(|| "stdin".to_string(), |p| p.display().to_string()),
      });
   }

   let context = (!args.context.is_empty()).then(|| args.context.join(" "));
   let messages = prompt::build_messages(&diff, context.as_deref(), &config)?;

   let generator = CommitMessageGenerator::new(config)?;
   style::notice(&format!("Using model: {}", style::model(&generator.config().model)));

   // The spinner has finished by the time the report is printed
   let message =
      style::with_spinner("Generating commit message...", || generator.generate(&messages))
         .map_err(|failure| {
            style::report_failure(&failure.report);
            failure.error
         })?;

   style::print_commit_message(&message);

   if args.copy {
      match copy_to_clipboard(&message) {
         Ok(()) => style::confirm("Copied to clipboard"),
         Err(e) => style::warn(&format!("Failed to copy to clipboard: {e}")),
      }
   }

   if let Some(latest) = version_check.and_then(|check| check.finish(VERSION_GRACE)) {
      style::notice(&format!(
         "gitscribe {latest} is available (running {}). Update with: cargo install gitscribe",
         env!("CARGO_PKG_VERSION")
      ));
   }

   Ok(())
}

fn main() -> ExitCode {
   dotenvy::dotenv().ok();
   init_tracing();
   let args = Args::parse();

   match run(&args) {
      Ok(()) => ExitCode::SUCCESS,
      Err(err) => {
         // Pipeline failures were already reported with full diagnostics
         if matches!(err.kind(), FailureKind::Other) {
            style::report_failure(&classify(&err, None));
         }
         ExitCode::FAILURE
      },
   }
}
