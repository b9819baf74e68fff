/// Longest message text Telegram accepts, in bytes.
pub const TELEGRAM_MESSAGE_LIMIT: usize = 4096;

/// Split text into chunks that each fit within `max_len` bytes.
///
/// Prefers breaking between paragraphs (two newlines), then between lines,
/// then between words, and only falls back to cutting at an arbitrary
/// character boundary when a single word is longer than the limit.
///
/// # Panics
/// Panics if `max_len` is less than 4, since a single character can be
/// up to 4 bytes long.
pub fn split_to_fit(text: &str, max_len: usize) -> Vec<&str> {
    assert!(max_len >= 4, "Max length is too small");

    let mut chunks = Vec::new();
    let mut rest = text.trim();

    while !rest.is_empty() {
        if rest.len() <= max_len {
            chunks.push(rest);
            break;
        }

        let cut = split_point(rest, max_len);
        let (head, tail) = rest.split_at(cut);
        let head = head.trim_end();
        if !head.is_empty() {
            chunks.push(head);
        }
        rest = tail.trim_start();
    }

    chunks
}

/// Find the best byte offset to cut `text` at, no further than `max_len`.
fn split_point(text: &str, max_len: usize) -> usize {
    // Clamp the search window to a character boundary first.
    let mut window_end = max_len;
    while !text.is_char_boundary(window_end) {
        window_end -= 1;
    }
    let window = &text[..window_end];

    for separator in ["\n\n", "\n", " "] {
        if let Some(position) = window.rfind(separator) {
            if position > 0 {
                return position;
            }
        }
    }

    window_end
}

#[cfg(test)]
mod tests {
    use super::split_to_fit;

    #[test]
    fn short_text_is_untouched() {
        let data = "hi hello hi   HELLO!!!";
        assert_eq!(split_to_fit(data, 4096), vec![data]);
    }

    #[test]
    fn splits_between_blocks_first() {
        let data = "block one\nstill one\n\nblock two\n\nblock three";
        let chunks = split_to_fit(data, 32);
        assert_eq!(chunks, vec!["block one\nstill one\n\nblock two", "block three"]);
    }

    #[test]
    fn falls_back_to_words_and_chars() {
        let chunks = split_to_fit("12345 123456 1234567", 6);
        assert_eq!(chunks, vec!["12345", "123456", "123456", "7"]);
    }

    #[test]
    fn respects_multibyte_boundaries() {
        // Each phone emoji is 4 bytes; a cut must never land inside one.
        let data = "📞📞📞📞📞";
        let chunks = split_to_fit(data, 8);
        assert_eq!(chunks, vec!["📞📞", "📞📞", "📞"]);
        for chunk in chunks {
            assert!(chunk.len() <= 8);
        }
    }
}
