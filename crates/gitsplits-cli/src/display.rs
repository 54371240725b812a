//! Display utilities for the CLI

use colored::*;
use std::io::Write;

/// Print a section header
pub fn section(title: &str) {
    println!();
    println!("{}", "━".repeat(60).bright_black());
    println!(" {}", title.bright_white().bold());
    println!("{}", "━".repeat(60).bright_black());
}

/// Print an info message
pub fn info(message: &str) {
    println!("  {} {}", "→".bright_blue(), message);
}

/// Input prompt, flushed so it shows before the read
pub fn prompt() {
    print!("{} ", ">".bright_cyan().bold());
    let _ = std::io::stdout().flush();
}

/// Print an agent response, tinted by outcome
pub fn response(text: &str) {
    let first = text.lines().next().unwrap_or_default();
    let colored = if first.starts_with('✅') {
        text.bright_green()
    } else if first.starts_with('🛑') || first.starts_with('❌') {
        text.bright_red()
    } else if first.contains("plan") {
        text.yellow()
    } else {
        text.normal()
    };
    println!("{}\n", colored);
}
