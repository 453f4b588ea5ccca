use std::io::{self, Write};
use std::path::Path;
use std::sync::OnceLock;

use alice_core::context::percentage_used;
use alice_core::{ThinkingMarkers, UiWriter};
use alice_execution::ExecutionResult;
use crossterm::cursor::{MoveToColumn, MoveUp};
use crossterm::style::Stylize;
use crossterm::terminal::{self, Clear, ClearType};
use crossterm::QueueableCommand;
use regex::Regex;
use rustyline::DefaultEditor;
use tracing::debug;

use crate::tui::SimpleOutput;

pub const AGENT_PREFIX: &str = "Alice: ";

/// Console implementation of UiWriter that prints to stdout
pub struct ConsoleUiWriter {
    output: SimpleOutput,
}

impl ConsoleUiWriter {
    pub fn new() -> Self {
        Self {
            output: SimpleOutput::new(),
        }
    }

    fn erase_rows(&self, rows: u16) -> io::Result<()> {
        let mut stdout = io::stdout();
        stdout.queue(MoveToColumn(0))?;
        if rows > 0 {
            stdout.queue(MoveUp(rows))?;
        }
        stdout.queue(Clear(ClearType::FromCursorDown))?;
        stdout.flush()
    }
}

impl Default for ConsoleUiWriter {
    fn default() -> Self {
        Self::new()
    }
}

impl UiWriter for ConsoleUiWriter {
    fn println(&self, message: &str) {
        println!("{}", message);
    }

    fn print_agent_prompt(&self) {
        print!("{}", AGENT_PREFIX.bold().green());
        let _ = io::stdout().flush();
    }

    fn print_agent_response(&self, content: &str) {
        print!("{}", content);
        let _ = io::stdout().flush();
    }

    fn thinking_markers(&self) -> ThinkingMarkers {
        ThinkingMarkers {
            open: format!("{}", "[thinking: ".dark_grey().dim()),
            close: format!("{}", "]".dark_grey().dim()),
        }
    }

    fn retract_agent_response(&self, shown: &str) {
        let width = terminal::size().map(|(cols, _)| cols).unwrap_or(80);
        let rows = rendered_rows(&format!("{}{}", AGENT_PREFIX, shown), width);
        debug!("Retracting {} row(s) of streamed output", rows);
        if let Err(e) = self.erase_rows(rows) {
            debug!("Could not retract streamed output: {}", e);
        }
    }

    fn print_tool_call(&self, tool_name: &str, command_line: &str) {
        println!();
        println!("{} {}", "💻 Tool call:".bold().cyan(), tool_name);
        println!("   {} {}", "Command:".dark_grey(), command_line.bold());
    }

    fn print_safety_rejection(&self, reason: &str) {
        println!("{} {}", "🚫 Command rejected:".bold().red(), reason);
    }

    fn print_executing(&self) {
        println!("{}", "⚙️  Executing...".dark_grey());
    }

    fn print_command_result(&self, result: &ExecutionResult) {
        let stdout = result.stdout.trim_end();
        if !stdout.is_empty() {
            println!("{}", "📤 Output:".bold().green());
            println!("{}", stdout);
        }
        if !result.success {
            let detail = match (result.stderr.trim_end(), result.error.as_deref()) {
                ("", Some(error)) => error.to_string(),
                ("", None) => format!("exit code {}", result.exit_code),
                (stderr, _) => stderr.to_string(),
            };
            println!("{}", "❌ Error:".bold().red());
            println!("{}", detail);
        }
        println!();
    }

    fn print_cwd_change(&self, cwd: &Path) {
        println!("📁 Working directory: {}", cwd.display().to_string().cyan());
    }

    fn print_notice(&self, message: &str) {
        println!("{}", message.yellow());
    }

    fn print_error(&self, message: &str) {
        println!("{} {}", "❌".red(), message.red());
    }

    fn print_context_status(&self, used_tokens: u32, max_tokens: Option<u32>) {
        match max_tokens {
            Some(max) if max > 0 => {
                self.output
                    .print_context(used_tokens, max, percentage_used(used_tokens, max))
            }
            _ => self.output.print_context_estimate(used_tokens),
        }
    }

    fn confirm(&self, prompt: &str) -> bool {
        let question = format!("{} (y/n): ", prompt);
        let mut editor = match DefaultEditor::new() {
            Ok(editor) => editor,
            Err(e) => {
                debug!("No line editor for confirmation: {}", e);
                return false;
            }
        };
        match editor.readline(&format!("{}", question.bold().yellow())) {
            Ok(answer) => is_yes(&answer),
            Err(_) => false,
        }
    }

    fn flush(&self) {
        let _ = io::stdout().flush();
    }
}

fn is_yes(answer: &str) -> bool {
    matches!(answer.trim().to_lowercase().as_str(), "y" | "yes")
}

fn strip_ansi(text: &str) -> std::borrow::Cow<'_, str> {
    static ANSI: OnceLock<Regex> = OnceLock::new();
    ANSI.get_or_init(|| Regex::new(r"\x1b\[[0-9;?]*[A-Za-z]").expect("valid ANSI regex"))
        .replace_all(text, "")
}

/// Terminal rows `text` occupies when printed from column 0 at `width` columns.
fn rendered_rows(text: &str, width: u16) -> u16 {
    let width = usize::from(width.max(1));
    let plain = strip_ansi(text);
    let rows: usize = plain
        .split('\n')
        .map(|line| line.chars().count().max(1).div_ceil(width))
        .sum();
    u16::try_from(rows).unwrap_or(u16::MAX)
}
