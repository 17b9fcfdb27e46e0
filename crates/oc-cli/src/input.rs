//! Line input for the shell, pickers and the benchmark wizard.

use std::io::{self, BufRead, Write};
use std::path::PathBuf;

use async_trait::async_trait;
use oc_core::lifecycle::{RecoveryPrompt, MANUAL_RESTART_STEPS};
use rustyline::error::ReadlineError;
use rustyline::DefaultEditor;
use tracing::debug;

use crate::ansi::{paint, BOLD, CYAN, YELLOW};

fn history_path() -> Option<PathBuf> {
    dirs::data_dir().map(|d| d.join("ollama-consumer").join("history.txt"))
}

/// Line editor with persistent history. `None` from a read means the user
/// pressed Ctrl-C or Ctrl-D.
pub(crate) struct LineReader {
    editor: Option<DefaultEditor>,
    history: Option<PathBuf>,
}

impl LineReader {
    pub fn new() -> Self {
        let editor = match DefaultEditor::new() {
            Ok(mut editor) => {
                if let Some(path) = history_path() {
                    let _ = editor.load_history(&path);
                }
                Some(editor)
            }
            Err(e) => {
                debug!("Line editor unavailable, reading stdin: {}", e);
                None
            }
        };
        Self {
            editor,
            history: history_path(),
        }
    }

    /// Read one line without recording it in history.
    pub fn read(&mut self, prompt: &str) -> Option<String> {
        match &mut self.editor {
            Some(editor) => match editor.readline(prompt) {
                Ok(line) => Some(line),
                Err(ReadlineError::Interrupted) | Err(ReadlineError::Eof) => None,
                Err(e) => {
                    debug!("readline failed: {}", e);
                    None
                }
            },
            None => read_stdin(prompt),
        }
    }

    /// Read a shell command line and record it in history.
    pub fn read_command(&mut self, prompt: &str) -> Option<String> {
        let line = self.read(prompt)?;
        if let Some(editor) = &mut self.editor {
            if !line.trim().is_empty() {
                let _ = editor.add_history_entry(line.as_str());
            }
        }
        Some(line)
    }

    /// `y`/`yes` or `n`/`no`; Enter takes `default`. `None` on cancel.
    pub fn yes_no(&mut self, prompt: &str, default: bool) -> Option<bool> {
        let hint = if default { "y" } else { "n" };
        loop {
            let answer = self.read(&format!("{} [y/n] (default: {}): ", prompt, hint))?;
            match answer.trim().to_lowercase().as_str() {
                "" => return Some(default),
                "y" | "yes" => return Some(true),
                "n" | "no" => return Some(false),
                _ => println!("Please answer y or n."),
            }
        }
    }

    /// One of `choices` (case-insensitive); Enter takes `default`.
    pub fn choice(&mut self, prompt: &str, choices: &[&str], default: &str) -> Option<String> {
        loop {
            let answer = self.read(&format!(
                "{} [{}] (default: {}): ",
                prompt,
                choices.join("/"),
                default
            ))?;
            let answer = answer.trim().to_lowercase();
            if answer.is_empty() {
                return Some(default.to_string());
            }
            if choices.iter().any(|c| c.eq_ignore_ascii_case(&answer)) {
                return Some(answer);
            }
            println!("Invalid choice. Please select from: {}", choices.join(", "));
        }
    }

    /// A number in `1..=max`; Enter or `0` returns `Some(None)`.
    pub fn number(&mut self, prompt: &str, max: usize) -> Option<Option<usize>> {
        loop {
            let answer = self.read(prompt)?;
            let answer = answer.trim();
            if answer.is_empty() || answer == "0" {
                return Some(None);
            }
            match answer.parse::<usize>() {
                Ok(n) if (1..=max).contains(&n) => return Some(Some(n)),
                Ok(_) => println!("Please enter a number between 1 and {}", max),
                Err(_) => println!("Please enter a valid number"),
            }
        }
    }

    pub fn save_history(&mut self) {
        if let (Some(editor), Some(path)) = (&mut self.editor, &self.history) {
            if let Some(dir) = path.parent() {
                let _ = std::fs::create_dir_all(dir);
            }
            if let Err(e) = editor.save_history(path) {
                debug!("Could not save history: {}", e);
            }
        }
    }
}

fn read_stdin(prompt: &str) -> Option<String> {
    print!("{}", prompt);
    io::stdout().flush().ok();
    let mut line = String::new();
    match io::stdin().lock().read_line(&mut line) {
        Ok(0) | Err(_) => None,
        Ok(_) => Some(line.trim_end_matches(['\r', '\n']).to_string()),
    }
}

/// Prints manual restart steps and waits for Enter (`q` quits).
pub(crate) struct TerminalPrompt;

pub(crate) fn print_manual_steps() {
    println!("\n{}", "=".repeat(60));
    println!("{}", paint("MANUAL RESTART REQUIRED", BOLD));
    println!("{}", "=".repeat(60));
    println!("Automatic restart failed. Please try one of these commands:");
    for (i, (heading, commands)) in MANUAL_RESTART_STEPS.iter().enumerate() {
        println!("\n{}. {}:", i + 1, paint(heading, CYAN));
        for (j, command) in commands.iter().enumerate() {
            if j > 0 {
                println!("   # OR");
            }
            println!("   {}", command);
        }
    }
}

#[async_trait]
impl RecoveryPrompt for TerminalPrompt {
    async fn confirm_manual_restart(&self) -> bool {
        print_manual_steps();
        let answer = tokio::task::spawn_blocking(|| {
            read_stdin(&paint(
                "\nAfter restarting, press Enter to continue or 'q' to quit... ",
                YELLOW,
            ))
        })
        .await
        .ok()
        .flatten();
        matches!(answer, Some(a) if a.trim().to_lowercase() != "q")
    }
}
