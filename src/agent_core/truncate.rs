//! UTF-8 safe truncation of text headed for the model or the logs.

/// Truncate a string to at most `max_bytes` bytes on a valid UTF-8 char boundary.
///
/// If the byte at `max_bytes` is inside a multi-byte character, the slice is
/// shortened to the preceding character boundary.
pub(crate) fn truncate_utf8(s: &str, max_bytes: usize) -> &str {
    if s.len() <= max_bytes {
        return s;
    }
    // Walk backward to find a valid char boundary
    let mut end = max_bytes;
    while end > 0 && !s.is_char_boundary(end) {
        end -= 1;
    }
    &s[..end]
}

/// Cap a serialized tool payload before it is appended to the conversation.
///
/// Oversized payloads are cut and suffixed with a notice so the model knows
/// the data is incomplete. A `max_bytes` of 0 disables the cap.
pub fn cap_tool_result(content: String, max_bytes: usize) -> String {
    if max_bytes == 0 || content.len() <= max_bytes {
        return content;
    }
    let kept = truncate_utf8(&content, max_bytes);
    format!(
        "{kept}\n[truncated: result was {} bytes, showing the first {}]",
        content.len(),
        kept.len()
    )
}
