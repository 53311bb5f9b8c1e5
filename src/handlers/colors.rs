//! IRC formatting control codes.

/// Switches the foreground color to green.
pub const GREEN: &str = "\u{3}03";

/// Switches the foreground color to red.
pub const RED: &str = "\u{3}04";

/// Resets all formatting.
pub const NORMAL: &str = "\u{f}";
