// SPDX-License-Identifier: (MIT OR Apache-2.0)
//! Terminal formatter for diagnostics.
//!
//! ```text
//! error[E0910]: `c_call rand` under per-lane control cannot be masked
//!   --> noise.wf:4:13
//!    |
//!  4 |         r = c_call rand()
//!    |             ^^^^^^^^^^^^^ only some lanes reach this call
//!    |
//!    = note: foreign calls cannot be masked
//!    = help: move the call out of the per-lane branch
//! ```
//!
//! Modules read from JSON may carry no source text. Labels are then shown
//! as byte ranges under the file name.

use std::collections::BTreeMap;

use colored::Colorize;
use weft_ast::LineMap;

use crate::{Diagnostic, LabelStyle};

/// Formats diagnostics for terminal output.
pub struct DiagnosticFormatter<'a> {
    source: &'a str,
    file_name: Option<&'a str>,
    line_map: LineMap,
}

/// A source line with its labels.
struct AnnotatedLine {
    line_num: usize,
    text: String,
    annotations: Vec<Annotation>,
}

struct Annotation {
    col_start: usize,
    col_end: usize,
    style: LabelStyle,
    message: Option<String>,
}

const FOOTER_GUTTER: usize = 2;

impl<'a> DiagnosticFormatter<'a> {
    pub fn new(source: &'a str) -> Self {
        Self {
            source,
            file_name: None,
            line_map: LineMap::new(source),
        }
    }

    pub fn with_file_name(mut self, name: &'a str) -> Self {
        self.file_name = Some(name);
        self
    }

    pub fn format(&self, diagnostic: &Diagnostic) -> String {
        let mut out = String::new();
        self.format_header(&mut out, diagnostic);

        if self.source.is_empty() {
            self.format_spans(&mut out, diagnostic);
            self.format_footer(&mut out, diagnostic);
            return out;
        }

        let annotated = self.collect_annotated_lines(diagnostic);
        let Some(first) = annotated.first() else {
            self.format_footer(&mut out, diagnostic);
            return out;
        };

        let file = self.file_name.unwrap_or("<source>");
        let col = diagnostic
            .primary_span()
            .map(|span| self.offset_to_line_col(span.start).1)
            .unwrap_or(1);
        out.push_str(&format!(
            "  {} {}:{}:{}\n",
            "-->".blue(),
            file,
            first.line_num,
            col
        ));

        let max_line = annotated.last().map(|a| a.line_num).unwrap_or(1);
        let gutter_width = max_line.to_string().len().max(2);

        out.push_str(&format!("{} {}\n", " ".repeat(gutter_width + 1), "|".blue()));
        let mut prev_line_num: Option<usize> = None;
        for line in &annotated {
            if let Some(prev) = prev_line_num {
                if line.line_num > prev + 1 {
                    out.push_str(&format!("{} {}\n", " ".repeat(gutter_width), "...".blue()));
                }
            }
            out.push_str(&format!(
                "{:>width$} {} {}\n",
                line.line_num.to_string().blue().bold(),
                "|".blue(),
                line.text,
                width = gutter_width + 1,
            ));
            self.format_annotations(&mut out, line, gutter_width);
            prev_line_num = Some(line.line_num);
        }

        if !diagnostic.notes.is_empty() || diagnostic.help.is_some() {
            out.push_str(&format!("{} {}\n", " ".repeat(gutter_width + 1), "|".blue()));
        }
        self.format_footer(&mut out, diagnostic);
        out
    }

    /// Render many diagnostics, separated by blank lines.
    pub fn format_all(&self, diagnostics: &[Diagnostic]) -> String {
        diagnostics
            .iter()
            .map(|d| self.format(d))
            .collect::<Vec<_>>()
            .join("\n")
    }

    fn format_header(&self, out: &mut String, diagnostic: &Diagnostic) {
        let severity = "error".red().bold();

        match diagnostic.code {
            Some(ref code) => out.push_str(&format!(
                "{}[{}]: {}\n",
                severity,
                code.0.as_str().red().bold(),
                diagnostic.message.bold()
            )),
            None => out.push_str(&format!("{}: {}\n", severity, diagnostic.message.bold())),
        }
    }

    fn format_spans(&self, out: &mut String, diagnostic: &Diagnostic) {
        let file = self.file_name.unwrap_or("<input>");
        for label in &diagnostic.labels {
            let marker = match label.style {
                LabelStyle::Primary => "-->".blue(),
                LabelStyle::Secondary => "...".blue(),
            };
            let mut line = format!(
                "  {} {} @ {}..{}",
                marker, file, label.span.start, label.span.end
            );
            if let Some(ref msg) = label.message {
                line.push_str(&format!(": {}", msg));
            }
            out.push_str(&line);
            out.push('\n');
        }
    }

    fn format_footer(&self, out: &mut String, diagnostic: &Diagnostic) {
        for note in &diagnostic.notes {
            out.push_str(&format!(
                "{} {} {}: {}\n",
                " ".repeat(FOOTER_GUTTER + 1),
                "=".cyan(),
                "note".cyan().bold(),
                note
            ));
        }
        if let Some(ref help) = diagnostic.help {
            out.push_str(&format!(
                "{} {} {}: {}\n",
                " ".repeat(FOOTER_GUTTER + 1),
                "=".cyan(),
                "help".cyan().bold(),
                help.message
            ));
        }
    }

    fn collect_annotated_lines(&self, diagnostic: &Diagnostic) -> Vec<AnnotatedLine> {
        let mut lines: BTreeMap<usize, AnnotatedLine> = BTreeMap::new();

        for label in &diagnostic.labels {
            let (line_num, col_start) = self.offset_to_line_col(label.span.start);
            let (end_line, col_end) = self.offset_to_line_col(label.span.end);
            let text = self.get_line(line_num).unwrap_or("");

            // Multi-line spans underline the rest of their first line.
            let col_end = if end_line == line_num {
                col_end
            } else {
                text.len() + 1
            };

            let entry = lines.entry(line_num).or_insert_with(|| AnnotatedLine {
                line_num,
                text: text.to_string(),
                annotations: Vec::new(),
            });
            entry.annotations.push(Annotation {
                col_start,
                col_end: col_end.max(col_start + 1),
                style: label.style,
                message: label.message.clone(),
            });
        }

        lines.into_values().collect()
    }

    fn format_annotations(&self, out: &mut String, line: &AnnotatedLine, gutter_width: usize) {
        let mut sorted: Vec<&Annotation> = line.annotations.iter().collect();
        sorted.sort_by_key(|a| (a.style.priority(), a.col_start));

        let width = line
            .annotations
            .iter()
            .map(|a| a.col_end)
            .max()
            .unwrap_or(0)
            .max(line.text.len() + 1);
        let mut underline = vec![' '; width];
        let mut messages: Vec<(usize, LabelStyle, &str)> = Vec::new();

        for ann in &sorted {
            let ch = match ann.style {
                LabelStyle::Primary => '^',
                LabelStyle::Secondary => '-',
            };
            for slot in &mut underline[ann.col_start - 1..ann.col_end - 1] {
                if *slot == ' ' {
                    *slot = ch;
                }
            }
            if let Some(ref msg) = ann.message {
                messages.push((ann.col_start, ann.style, msg));
            }
        }

        let underline: String = underline.into_iter().collect();
        let underline = underline.trim_end();
        if underline.is_empty() {
            return;
        }
        let pad = " ".repeat(gutter_width + 1);
        let colored = color_underline(underline);

        match messages.as_slice() {
            [] => out.push_str(&format!("{} {} {}\n", pad, "|".blue(), colored)),
            [(_, style, msg)] => out.push_str(&format!(
                "{} {} {} {}\n",
                pad,
                "|".blue(),
                colored,
                style_message(*style, msg)
            )),
            _ => {
                out.push_str(&format!("{} {} {}\n", pad, "|".blue(), colored));
                for (col, style, msg) in messages.iter().rev() {
                    out.push_str(&format!(
                        "{} {} {}{} {}\n",
                        pad,
                        "|".blue(),
                        " ".repeat(col.saturating_sub(1)),
                        style_message(*style, "|"),
                        style_message(*style, msg),
                    ));
                }
            }
        }
    }

    /// Byte offset to (line, col), both 1-based.
    fn offset_to_line_col(&self, offset: usize) -> (usize, usize) {
        let (line, col) = self.line_map.offset_to_line_col(offset.min(self.source.len()));
        (line as usize, col as usize)
    }

    fn get_line(&self, line_num: usize) -> Option<&str> {
        self.line_map.line_text(self.source, line_num as u32)
    }
}

impl LabelStyle {
    fn priority(self) -> u8 {
        match self {
            LabelStyle::Primary => 0,
            LabelStyle::Secondary => 1,
        }
    }
}

fn style_message(style: LabelStyle, msg: &str) -> String {
    match style {
        LabelStyle::Primary => msg.red().bold().to_string(),
        LabelStyle::Secondary => msg.blue().to_string(),
    }
}

/// Color runs of `^` red and runs of `-` blue.
fn color_underline(s: &str) -> String {
    let mut result = String::new();
    let mut run = String::new();
    let mut current = None;

    for ch in s.chars() {
        let kind = matches!(ch, '^' | '-').then_some(ch);
        if kind != current && !run.is_empty() {
            result.push_str(&flush_run(&run, current));
            run.clear();
        }
        run.push(ch);
        current = kind;
    }
    if !run.is_empty() {
        result.push_str(&flush_run(&run, current));
    }
    result
}

fn flush_run(run: &str, kind: Option<char>) -> String {
    match kind {
        Some('^') => run.red().bold().to_string(),
        Some('-') => run.blue().to_string(),
        _ => run.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use weft_ast::Span;

    fn plain() {
        colored::control::set_override(false);
    }

    const SRC: &str = "simd routine f(x: int) -> (r: int)\n    if x > 0\n        r = c_call rand()\n    end\nend\n";

    #[test]
    fn renders_source_line_with_caret() {
        plain();
        let start = SRC.find("c_call").unwrap();
        let diag = Diagnostic::error("`c_call rand` under per-lane control cannot be masked")
            .with_code("E0910")
            .with_primary(Span::new(start, start + 13), "only some lanes reach this call")
            .with_help("move the call out of the per-lane branch");
        let out = DiagnosticFormatter::new(SRC)
            .with_file_name("f.wf")
            .format(&diag);

        assert!(out.starts_with("error[E0910]: `c_call rand`"));
        assert!(out.contains("--> f.wf:3:13"));
        assert!(out.contains(" 3 |         r = c_call rand()"));
        assert!(out.contains(&format!(
            "{}{} only some lanes reach this call",
            " ".repeat(12),
            "^".repeat(13)
        )));
        assert!(out.contains("= help: move the call out of the per-lane branch"));
    }

    #[test]
    fn two_labels_on_one_line_get_separate_messages() {
        plain();
        let x = SRC.find("x > 0").unwrap();
        let diag = Diagnostic::error("boom")
            .with_secondary(Span::new(x, x + 1), "per lane")
            .with_primary(Span::new(x + 4, x + 5), "uniform");
        let out = DiagnosticFormatter::new(SRC).format(&diag);
        assert!(out.contains("--> <source>:2:12"));
        assert!(out.contains("-   ^"));
        let uniform = out.find("| uniform").unwrap();
        let per_lane = out.find("| per lane").unwrap();
        assert!(per_lane < uniform);
    }

    #[test]
    fn without_source_labels_show_byte_ranges() {
        plain();
        let diag = Diagnostic::error("different simd lengths in one vector body: [2, 4]")
            .with_code("E0924")
            .with_primary(Span::new(40, 52), "here")
            .with_note("lane counts in use: 2, 4");
        let out = DiagnosticFormatter::new("")
            .with_file_name("mix.json")
            .format(&diag);
        assert!(out.contains("--> mix.json @ 40..52: here"));
        assert!(out.contains("= note: lane counts in use: 2, 4"));
    }

    #[test]
    fn labelless_diagnostic_is_header_and_footer() {
        plain();
        let diag = Diagnostic::error("lane width policy yields no lanes").with_code("E0927");
        let out = DiagnosticFormatter::new(SRC).format(&diag);
        assert_eq!(out, "error[E0927]: lane width policy yields no lanes\n");
    }
}
