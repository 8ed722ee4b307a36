//! Output modes shared by every subcommand.
//!
//! Precedence (highest wins):
//! 1. `--format` / hidden `--json` flag
//! 2. `FORMAT` env var, then the user config `output` key
//! 3. Default: [`OutputMode::Pretty`] on a TTY, [`OutputMode::Text`] when piped

use clap::ValueEnum;
use rewind_core::error::ErrorCode;
use serde::Serialize;
use std::io::{self, IsTerminal, Write};

pub const PRETTY_RULE_WIDTH: usize = 72;

pub fn pretty_rule(w: &mut dyn Write) -> io::Result<()> {
    writeln!(w, "{:-<width$}", "", width = PRETTY_RULE_WIDTH)
}

pub fn pretty_section(w: &mut dyn Write, heading: &str) -> io::Result<()> {
    writeln!(w, "{heading}")?;
    pretty_rule(w)
}

pub fn pretty_kv(w: &mut dyn Write, key: &str, value: impl AsRef<str>) -> io::Result<()> {
    writeln!(w, "{:<12} {}", format!("{key}:"), value.as_ref())
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputMode {
    /// Human-oriented sections and rules.
    Pretty,
    /// One record per line for pipes.
    Text,
    /// Machine-readable JSON.
    Json,
}

impl OutputMode {
    #[must_use]
    pub const fn is_json(self) -> bool {
        matches!(self, Self::Json)
    }
}

fn resolve_output_mode_inner(
    format_flag: Option<OutputMode>,
    json_flag: bool,
    configured: Option<&str>,
    is_tty: bool,
) -> OutputMode {
    if let Some(mode) = format_flag {
        return mode;
    }
    if json_flag {
        return OutputMode::Json;
    }
    if let Some(val) = configured {
        match val.to_lowercase().as_str() {
            "json" => return OutputMode::Json,
            "text" => return OutputMode::Text,
            "pretty" => return OutputMode::Pretty,
            _ => {}
        }
    }
    if is_tty {
        OutputMode::Pretty
    } else {
        OutputMode::Text
    }
}

/// Resolve the output mode. `configured` is the already-merged `FORMAT`
/// env / user config value.
pub fn resolve_output_mode(
    format_flag: Option<OutputMode>,
    json_flag: bool,
    configured: Option<&str>,
) -> OutputMode {
    resolve_output_mode_inner(format_flag, json_flag, configured, io::stdout().is_terminal())
}

/// Render a value: JSON as-is, otherwise through the given writers.
pub fn render_mode<T: Serialize>(
    mode: OutputMode,
    value: &T,
    text_fn: impl FnOnce(&T, &mut dyn Write) -> io::Result<()>,
    pretty_fn: impl FnOnce(&T, &mut dyn Write) -> io::Result<()>,
) -> anyhow::Result<()> {
    let stdout = io::stdout();
    let mut out = stdout.lock();
    match mode {
        OutputMode::Json => {
            serde_json::to_writer_pretty(&mut out, value)?;
            writeln!(out)?;
        }
        OutputMode::Text => text_fn(value, &mut out)?,
        OutputMode::Pretty => pretty_fn(value, &mut out)?,
    }
    Ok(())
}

/// A structured error with optional suggestion and error code.
#[derive(Debug, Serialize)]
pub struct CliError {
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub suggestion: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_code: Option<String>,
}

impl CliError {
    /// An error carrying `code`'s stable identifier and hint.
    pub fn from_code(code: ErrorCode, detail: impl Into<String>) -> Self {
        Self {
            message: detail.into(),
            suggestion: code.hint().map(str::to_string),
            error_code: Some(code.code().to_string()),
        }
    }
}

/// Render an error to stderr in the requested format.
pub fn render_error(mode: OutputMode, error: &CliError) -> anyhow::Result<()> {
    let stderr = io::stderr();
    let mut out = stderr.lock();
    match mode {
        OutputMode::Json => {
            serde_json::to_writer_pretty(&mut out, &serde_json::json!({ "error": error }))?;
            writeln!(out)?;
        }
        OutputMode::Pretty | OutputMode::Text => {
            match &error.error_code {
                Some(code) => writeln!(out, "error[{code}]: {}", error.message)?,
                None => writeln!(out, "error: {}", error.message)?,
            }
            if let Some(suggestion) = &error.suggestion {
                writeln!(out, "  hint: {suggestion}")?;
            }
        }
    }
    Ok(())
}
