// SPDX-License-Identifier: (MIT OR Apache-2.0)
//! `weft explain`.

use colored::Colorize;
use weft_diagnostics::codes::ErrorCodeRegistry;

use crate::error::{CliError, Result};
use crate::output;

pub fn cmd_explain(code: Option<&str>) -> Result<bool> {
    let registry = ErrorCodeRegistry::default();

    let Some(code) = code else {
        for info in registry.all() {
            println!(
                "{}  {:<10} {}",
                output::code(info.code),
                info.category.to_string(),
                info.title
            );
        }
        return Ok(true);
    };

    let info = registry
        .get(&code.to_ascii_uppercase())
        .ok_or_else(|| CliError::UnknownCode(code.to_string()))?;
    println!(
        "{}[{}]: {}",
        "error".red().bold(),
        output::code(info.code),
        info.title.bold()
    );
    println!();
    println!("  Category: {}", info.category);
    println!();
    for line in info.description.lines() {
        println!("  {}", line);
    }
    Ok(true)
}
