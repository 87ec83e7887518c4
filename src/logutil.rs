//! Logging helpers that keep player-authored subjects and bodies on a single log line.

use std::fmt::Write;

/// Longest preview emitted for a single field.
pub const MAX_PREVIEW: usize = 120;

/// Escape a string for single-line logging:
/// - `\n` => `\\n`
/// - `\r` => `\\r`
/// - `\t` => `\\t`
/// - backslash => `\\\\`
///
/// Other control characters become `\xNN`. Output is capped at [`MAX_PREVIEW`]
/// characters with a trailing ellipsis.
pub fn escape_log(s: &str) -> String {
    escape_log_capped(s, MAX_PREVIEW)
}

/// Same as [`escape_log`] with an explicit character cap.
pub fn escape_log_capped(s: &str, max_chars: usize) -> String {
    let mut out = String::with_capacity(s.len().min(max_chars) + 8);
    for (count, ch) in s.chars().enumerate() {
        if count >= max_chars {
            out.push('…');
            break;
        }
        match ch {
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            c if c.is_control() => {
                let _ = write!(&mut out, "\\x{:02X}", c as u32);
            }
            c => out.push(c),
        }
    }
    out
}

/// One-line preview of a multi-line email body.
pub fn preview_lines(lines: &[String]) -> String {
    escape_log(&lines.join("\n"))
}
