//! Small helpers shared by the CLI and the server.

/// Shorten `s` to at most `max_chars` characters, ending in `...` when cut.
///
/// Counts characters, not bytes, so multi-byte text is never split.
pub fn truncate_string(s: &str, max_chars: usize) -> String {
    if s.chars().count() <= max_chars {
        return s.to_string();
    }

    let keep_chars = max_chars.saturating_sub(3);
    let truncated: String = s.chars().take(keep_chars).collect();
    format!("{}...", truncated)
}
