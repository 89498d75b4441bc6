//! User-facing status lines.
//!
//! Diagnostics go through `tracing`; these helpers are for messages the user
//! is meant to read, and honour `no_color`.

use colored::Colorize;

/// Enable or disable ANSI colors for every helper in this module.
pub fn set_color(enabled: bool) {
    colored::control::set_override(enabled);
}

pub fn info(message: impl AsRef<str>) {
    eprintln!("{} {}", "•".cyan(), message.as_ref());
}

pub fn success(message: impl AsRef<str>) {
    eprintln!("{} {}", "✓".green().bold(), message.as_ref());
}

pub fn warning(message: impl AsRef<str>) {
    eprintln!("{} {}", "Warning:".yellow().bold(), message.as_ref());
}

pub fn error(message: impl AsRef<str>) {
    eprintln!("{} {}", "Error:".red().bold(), message.as_ref());
}

pub fn hint(message: impl AsRef<str>) {
    eprintln!("{} {}", "Hint:".cyan().bold(), message.as_ref());
}

/// Spinner shown while a slow runtime call is in flight. Hidden when
/// stderr is not a terminal.
pub fn spinner(message: impl Into<String>) -> indicatif::ProgressBar {
    let bar = indicatif::ProgressBar::new_spinner();
    bar.set_message(message.into());
    bar.enable_steady_tick(std::time::Duration::from_millis(100));
    bar
}
