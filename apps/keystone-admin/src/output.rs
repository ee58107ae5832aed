//! Terminal output helpers

use serde::Serialize;

use crate::error::CliResult;

/// Truncate a string for table display, handling Unicode safely.
///
/// If the string exceeds `max_len` characters, it is truncated with "..."
/// appended.
pub fn truncate(s: &str, max_len: usize) -> String {
    if s.chars().count() <= max_len {
        s.to_string()
    } else {
        let truncated: String = s.chars().take(max_len.saturating_sub(3)).collect();
        format!("{truncated}...")
    }
}

/// Pretty-print `value` as JSON on stdout.
pub fn print_json<T: Serialize>(value: &T) -> CliResult<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

/// Print a table rule sized to `width`.
pub fn print_rule(width: usize) {
    println!("{}", "-".repeat(width));
}
