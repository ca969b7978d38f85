// SPDX-License-Identifier: (MIT OR Apache-2.0)
//! Terminal styling for CLI output.
//!
//! `NO_COLOR` turns colors off and `FORCE_COLOR` turns them on even when
//! stdout is piped. Diagnostics carry their own colors from
//! `weft_diagnostics::formatter`.

use colored::{ColoredString, Colorize};

/// Apply the color environment overrides. Call once at startup.
pub fn init() {
    let force = if std::env::var_os("NO_COLOR").is_some() {
        Some(false)
    } else if std::env::var_os("FORCE_COLOR").is_some() {
        Some(true)
    } else {
        None
    };
    if let Some(force) = force {
        colored::control::set_override(force);
    }
}

pub fn error_label() -> ColoredString {
    "error".red().bold()
}

/// `=== lower OK ===` or `=== lower FAILED: 2 errors ===`.
fn banner(body: ColoredString) -> String {
    format!("{} {} {}", "===".dimmed(), body, "===".dimmed())
}

pub fn banner_ok(phase: &str) -> String {
    banner(format!("{} OK", phase).green().bold())
}

pub fn banner_fail(phase: &str, errors: usize) -> String {
    let plural = if errors == 1 { "" } else { "s" };
    banner(format!("{} FAILED: {} error{}", phase, errors, plural).red().bold())
}

pub fn section_header(text: &str) -> ColoredString {
    text.yellow().bold()
}

pub fn routine_name(name: &str) -> ColoredString {
    name.green().bold()
}

pub fn code(code: &str) -> ColoredString {
    code.red().bold()
}

pub fn dim(text: &str) -> ColoredString {
    text.dimmed()
}

pub fn file_path(path: &str) -> ColoredString {
    path.underline()
}
