/// Telegram's limit on message text, in bytes of UTF-8.
pub const TELEGRAM_MAX_MESSAGE_LEN: usize = 4096;

/// Split `text` into pieces of at most `max_len` bytes.
///
/// Prefers breaking at the last newline, then the last space, inside the
/// window; never splits a UTF-8 character.
pub fn chunk_message(text: &str, max_len: usize) -> Vec<String> {
    if max_len == 0 {
        return Vec::new();
    }
    if text.len() <= max_len {
        return vec![text.to_string()];
    }

    let mut chunks = Vec::new();
    let mut remaining = text;

    while !remaining.is_empty() {
        if remaining.len() <= max_len {
            chunks.push(remaining.to_string());
            break;
        }

        let mut window = max_len;
        while window > 0 && !remaining.is_char_boundary(window) {
            window -= 1;
        }
        if window == 0 {
            window = remaining
                .chars()
                .next()
                .map(char::len_utf8)
                .unwrap_or(remaining.len());
        }

        let slice = &remaining[..window];
        let split_at = match slice.rfind('\n').or_else(|| slice.rfind(' ')) {
            Some(0) | None => window,
            Some(at) => at,
        };

        chunks.push(remaining[..split_at].to_string());
        remaining = remaining[split_at..].trim_start_matches('\n');
        if let Some(rest) = remaining.strip_prefix(' ') {
            remaining = rest;
        }
    }

    chunks
}
