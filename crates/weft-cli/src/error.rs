// SPDX-License-Identifier: (MIT OR Apache-2.0)
//! Errors that stop a command before any diagnostics can be produced.

use std::path::PathBuf;

#[derive(Debug, thiserror::Error)]
pub enum CliError {
    #[error("reading {}: {source}", path.display())]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("writing {}: {source}", path.display())]
    Write {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("{} is not a typed AST: {source}", path.display())]
    Module {
        path: PathBuf,
        source: serde_json::Error,
    },
    #[error("{} is not a lowering config: {source}", path.display())]
    Config {
        path: PathBuf,
        source: serde_json::Error,
    },
    #[error("no routine named `{0}`")]
    UnknownRoutine(String),
    #[error("unknown error code `{0}`")]
    UnknownCode(String),
}

pub type Result<T> = std::result::Result<T, CliError>;
