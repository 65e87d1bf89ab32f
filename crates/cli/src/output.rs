// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Terminal output helpers.

use std::io::IsTerminal;

/// Bold + underline when stdout is a terminal, bare text otherwise.
pub fn header(text: &str) -> String {
    if std::io::stdout().is_terminal() {
        styled(text)
    } else {
        text.to_string()
    }
}

fn styled(text: &str) -> String {
    format!("\x1b[1m\x1b[4m{text}\x1b[0m")
}

/// Stderr logging for the CLI tools; `-v` raises the floor to debug.
pub fn init_logging(verbose: bool) {
    let default = if verbose { "debug" } else { "warn" };
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

#[cfg(test)]
#[path = "output_tests.rs"]
mod tests;
