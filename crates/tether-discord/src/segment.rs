/// Split `text` into non-empty chunks of at most `max_len` characters,
/// preferring to cut after the last newline inside the window so
/// line-oriented content (headings, code fences) is not split mid-line.
///
/// The newline at a cut point is consumed; a single line longer than
/// `max_len` is hard-cut at the limit. Counts characters, not bytes, and
/// every cut lands on a `char` boundary.
pub fn segment(text: &str, max_len: usize) -> Vec<String> {
    debug_assert!(max_len > 0);

    let mut parts = Vec::new();
    let mut rest = text;

    while !rest.is_empty() {
        let window_end = byte_of_char(rest, max_len);
        if window_end == rest.len() {
            parts.push(rest.to_string());
            break;
        }

        let window = &rest[..window_end];
        match window.rfind('\n') {
            Some(cut) => {
                // A newline at the head of the window would yield an empty
                // element; consume it and continue.
                if cut > 0 {
                    parts.push(window[..cut].to_string());
                }
                rest = &rest[cut + 1..];
            }
            None => {
                parts.push(window.to_string());
                rest = &rest[window_end..];
            }
        }
    }

    parts
}

/// Byte offset of the `n`-th character, or `text.len()` when `text` has
/// `n` or fewer characters.
fn byte_of_char(text: &str, n: usize) -> usize {
    text.char_indices().nth(n).map_or(text.len(), |(i, _)| i)
}
