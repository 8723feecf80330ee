//! Command handlers for the cadtrail CLI.
//!
//! Every command works on stored history; none needs the CAD host running.

pub mod history;
pub mod logging;
pub mod maintenance;

pub use history::*;
pub use logging::*;
pub use maintenance::*;

use serde::Serialize;

/// Print a value as pretty JSON.
pub fn print_json<T: Serialize>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

/// Shorten text to fit a table column.
pub fn truncate(text: &str, width: usize) -> String {
    if text.chars().count() > width {
        let kept: String = text.chars().take(width.saturating_sub(3)).collect();
        format!("{kept}...")
    } else {
        text.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn truncate_keeps_short_text() {
        assert_eq!(truncate("Initial", 10), "Initial");
        assert_eq!(truncate("Before rollback to v12", 12), "Before ro...");
    }
}
