//! Conversation title derivation.

/// Titles longer than this many characters are truncated.
pub const TITLE_MAX_CHARS: usize = 30;

const ELLIPSIS: &str = "...";

/// Title for a conversation, taken from its first user message.
///
/// Counts characters, not bytes, so a multi-byte character is never split.
pub fn derive_title(first_message: &str) -> String {
    let mut chars = first_message.char_indices();
    match chars.nth(TITLE_MAX_CHARS) {
        Some((cut, _)) => format!("{}{ELLIPSIS}", &first_message[..cut]),
        None => first_message.to_string(),
    }
}
