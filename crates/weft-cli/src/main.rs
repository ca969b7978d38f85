// SPDX-License-Identifier: (MIT OR Apache-2.0)
//! Weft CLI: runs the SIMD lowering passes over a typed AST in JSON form.

mod commands;
mod config;
mod error;
mod logging;
mod output;

use std::path::PathBuf;
use std::process;
use std::time::Instant;

use clap::{Parser, Subcommand, ValueEnum};

use crate::config::ConfigArgs;
use crate::logging::{LogFormat, LogLevel};

#[derive(Parser)]
#[command(
    name = "weft",
    version,
    about = "Lower simd routines to masked vector IR"
)]
struct Cli {
    /// Diagnostic and report format
    #[arg(long, global = true, value_enum, default_value_t = Format::Human)]
    format: Format,
    /// Log event format (stderr)
    #[arg(long, global = true, value_enum, default_value_t = LogFormat::Text)]
    log_format: LogFormat,
    /// Log level; `RUST_LOG` overrides it
    #[arg(long, global = true, value_enum, default_value_t = LogLevel::Warn)]
    log_level: LogLevel,
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum Format {
    Human,
    Json,
}

#[derive(Subcommand)]
enum Command {
    /// Run the unifier, divergence analysis and width planner
    Check {
        /// Typed AST (JSON)
        input: PathBuf,
        #[command(flatten)]
        config: ConfigArgs,
    },
    /// Print per-variant shapes, divergence tags and lane widths
    Plan {
        /// Typed AST (JSON)
        input: PathBuf,
        /// Only this routine
        #[arg(long)]
        routine: Option<String>,
        #[command(flatten)]
        config: ConfigArgs,
    },
    /// Lower every routine and print the vector IR
    Lower {
        /// Typed AST (JSON)
        input: PathBuf,
        /// Only functions of this routine
        #[arg(long)]
        routine: Option<String>,
        /// Write the IR here instead of stdout
        #[arg(short, long, value_name = "PATH")]
        output: Option<PathBuf>,
        #[command(flatten)]
        config: ConfigArgs,
    },
    /// Explain an error code, or list all codes
    Explain {
        /// Code such as E0910
        code: Option<String>,
    },
}

impl Command {
    fn name(&self) -> &'static str {
        match self {
            Command::Check { .. } => "check",
            Command::Plan { .. } => "plan",
            Command::Lower { .. } => "lower",
            Command::Explain { .. } => "explain",
        }
    }
}

fn main() {
    let cli = Cli::parse();
    output::init();
    logging::init_logging(cli.log_format, cli.log_level);

    let command = cli.command.name();
    tracing::info!(
        target: "pipeline",
        stage = "cli.run.start",
        command,
        status = "start"
    );
    let start = Instant::now();

    let result = match cli.command {
        Command::Check { input, config } => commands::cmd_check(&input, &config, cli.format),
        Command::Plan {
            input,
            routine,
            config,
        } => commands::cmd_plan(&input, routine.as_deref(), &config, cli.format),
        Command::Lower {
            input,
            routine,
            output,
            config,
        } => commands::cmd_lower(
            &input,
            routine.as_deref(),
            output.as_deref(),
            &config,
            cli.format,
        ),
        Command::Explain { code } => commands::cmd_explain(code.as_deref()),
    };

    let elapsed_ms = start.elapsed().as_millis() as u64;
    match result {
        Ok(true) => {
            tracing::info!(target: "pipeline", stage = "cli.run.complete", command, status = "ok", elapsed_ms);
        }
        Ok(false) => {
            tracing::info!(target: "pipeline", stage = "cli.run.complete", command, status = "failed", elapsed_ms);
            process::exit(1);
        }
        Err(e) => {
            tracing::error!(target: "pipeline", stage = "cli.run.complete", command, status = "error", error = %e, elapsed_ms);
            eprintln!("{}: {}", output::error_label(), e);
            process::exit(2);
        }
    }
}
