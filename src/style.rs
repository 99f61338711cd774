//! Terminal output for the CLI: notices, failure reports, the generation
//! spinner and the framed commit message.
//!
//! Everything except the commit message goes to stderr, so
//! `gitscribe > msg.txt` captures only the message. Color follows `NO_COLOR`
//! and the capabilities of stderr.

use std::{
   fmt::Write as _,
   io::{self, IsTerminal, Write},
   sync::{
      OnceLock,
      mpsc::{self, RecvTimeoutError, Sender},
   },
   thread::{self, JoinHandle},
   time::Duration,
};

use owo_colors::{OwoColorize, Style};

use crate::classify::UserMessage;

const MARK_OK: &str = "\u{2713}";
const MARK_FAILED: &str = "\u{2717}";
const MARK_WARN: &str = "\u{26A0}";
const MARK_INFO: &str = "\u{2139}";
const BULLET: &str = "\u{2022}";

const CLEAR_LINE: &str = "\r\x1b[K";

const FRAMES: [char; 10] = [
   '\u{280B}', '\u{2819}', '\u{2839}', '\u{2838}', '\u{283C}', '\u{2834}', '\u{2826}', '\u{2827}',
   '\u{2807}', '\u{280F}',
];
const FRAME_INTERVAL: Duration = Duration::from_millis(80);

/// Narrowest text column inside the commit message frame.
const MIN_TEXT_WIDTH: usize = 20;

#[derive(Clone, Copy)]
enum Tone {
   Ok,
   Failed,
   Warn,
   Info,
   Dim,
   Model,
}

impl Tone {
   fn style(self) -> Style {
      match self {
         Self::Ok => Style::new().green().bold(),
         Self::Failed => Style::new().red().bold(),
         Self::Warn => Style::new().yellow(),
         Self::Info => Style::new().cyan(),
         Self::Dim => Style::new().dimmed(),
         Self::Model => Style::new().magenta(),
      }
   }
}

fn colors_enabled() -> bool {
   static ENABLED: OnceLock<bool> = OnceLock::new();
   *ENABLED.get_or_init(|| {
      std::env::var_os("NO_COLOR").is_none()
         && supports_color::on(supports_color::Stream::Stderr).is_some_and(|level| level.has_basic)
   })
}

fn paint(text: &str, tone: Tone) -> String {
   if colors_enabled() {
      text.style(tone.style()).to_string()
   } else {
      text.to_string()
   }
}

/// Highlight a model name inside a notice.
pub fn model(name: &str) -> String {
   paint(name, Tone::Model)
}

pub fn notice(msg: &str) {
   eprintln!("{} {msg}", paint(MARK_INFO, Tone::Info));
}

pub fn confirm(msg: &str) {
   eprintln!("{} {msg}", paint(MARK_OK, Tone::Ok));
}

pub fn warn(msg: &str) {
   eprintln!("{} {}", paint(MARK_WARN, Tone::Warn), paint(msg, Tone::Warn));
}

/// Render a classified failure: headline, one bullet per detail, then the
/// remediation hint.
pub fn render_failure(msg: &UserMessage) -> String {
   let mut out =
      format!("{} {}\n", paint(MARK_FAILED, Tone::Failed), paint(&msg.headline, Tone::Failed));
   for detail in &msg.details {
      writeln!(out, "  {} {detail}", paint(BULLET, Tone::Dim)).ok();
   }
   if let Some(ref help) = msg.help {
      writeln!(out, "  {} {help}", paint(MARK_INFO, Tone::Info)).ok();
   }
   out
}

/// Print a classified failure to stderr. Callers stop any spinner first.
pub fn report_failure(msg: &UserMessage) {
   eprint!("{}", render_failure(msg));
}

/// Greedy word wrap. A word longer than `width` gets a line of its own, and an
/// empty input yields one empty line so paragraph breaks survive.
fn wrap(line: &str, width: usize) -> Vec<String> {
   let mut lines = vec![String::new()];
   for word in line.split_whitespace() {
      match lines.last_mut() {
         Some(current) if current.is_empty() => current.push_str(word),
         Some(current) if current.chars().count() + 1 + word.chars().count() <= width => {
            current.push(' ');
            current.push_str(word);
         },
         _ => lines.push(word.to_string()),
      }
   }
   lines
}

/// Frame `message` in a rounded box `width` columns wide, titled
/// "Commit message". Lines are wrapped, never truncated.
pub fn render_commit_message(message: &str, width: usize) -> String {
   const TITLE: &str = " Commit message ";
   let text_width = width.saturating_sub(4).max(MIN_TEXT_WIDTH);
   let rule = |n: usize| "\u{2500}".repeat(n);

   let fill = (text_width + 2).saturating_sub(TITLE.chars().count());
   let mut out = format!("\u{256D}{}{TITLE}{}\u{256E}\n", rule(fill / 2), rule(fill - fill / 2));
   for line in message.lines().flat_map(|l| wrap(l, text_width)) {
      let pad = text_width.saturating_sub(line.chars().count());
      writeln!(out, "\u{2502} {line}{} \u{2502}", " ".repeat(pad)).ok();
   }
   write!(out, "\u{2570}{}\u{256F}", rule(text_width + 2)).ok();
   out
}

/// Print the framed message on stdout, sized to the terminal (80 columns when
/// unknown, at most 100).
pub fn print_commit_message(message: &str) {
   let width = terminal_size::terminal_size().map_or(80, |(w, _)| usize::from(w.0)).min(100);
   println!("{}", render_commit_message(message, width));
}

struct Spinner {
   done:   Sender<bool>,
   handle: JoinHandle<()>,
}

impl Spinner {
   fn start(label: &str) -> Self {
      let (done, rx) = mpsc::channel::<bool>();
      let label = label.to_string();
      let handle = thread::spawn(move || {
         for frame in FRAMES.iter().cycle() {
            eprint!("\r{} {label}", paint(&frame.to_string(), Tone::Info));
            io::stderr().flush().ok();
            match rx.recv_timeout(FRAME_INTERVAL) {
               Err(RecvTimeoutError::Timeout) => {},
               Ok(succeeded) => {
                  let mark = if succeeded {
                     paint(MARK_OK, Tone::Ok)
                  } else {
                     paint(MARK_FAILED, Tone::Failed)
                  };
                  eprintln!("{CLEAR_LINE}{mark} {label}");
                  break;
               },
               Err(RecvTimeoutError::Disconnected) => {
                  eprint!("{CLEAR_LINE}");
                  break;
               },
            }
         }
      });
      Self { done, handle }
   }

   /// Replace the animation with a final mark and wait until the line is
   /// written.
   fn stop(self, succeeded: bool) {
      self.done.send(succeeded).ok();
      self.handle.join().ok();
   }
}

/// Run `f` behind a spinner labelled `label`. The spinner line is finished
/// before this returns, so the caller can report a failure on a clean line.
/// Without an interactive stderr the label is printed once instead.
pub fn with_spinner<T, E>(label: &str, f: impl FnOnce() -> Result<T, E>) -> Result<T, E> {
   if !io::stderr().is_terminal() || !colors_enabled() {
      eprintln!("{label}");
      return f();
   }

   let spinner = Spinner::start(label);
   let result = f();
   spinner.stop(result.is_ok());
   result
}
