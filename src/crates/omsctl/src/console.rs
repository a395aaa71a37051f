//! Colored progress output
//!
//! Progress goes to stdout, errors to stderr. Structured diagnostics go
//! through `tracing` separately.

use colored::Colorize;
use std::fmt::Display;

pub fn header(title: impl Display) {
    let title = title.to_string();
    println!();
    println!("{}", title.bold());
    println!("{}", "=".repeat(title.chars().count()));
}

pub fn info(message: impl Display) {
    println!("{} {}", "==>".blue().bold(), message);
}

pub fn success(message: impl Display) {
    println!("{} {}", "✓".green().bold(), message);
}

pub fn warning(message: impl Display) {
    println!("{} {}", "⚠".yellow().bold(), message.to_string().yellow());
}

pub fn error(message: impl Display) {
    eprintln!("{} {}", "✗".red().bold(), message.to_string().red());
}
