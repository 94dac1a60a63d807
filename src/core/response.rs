//! Message splitting for the transport's content limit
//!
//! Search results for a busy conversation can outgrow a single Discord message,
//! so long replies are split on line boundaries before delivery.

/// Discord message content limit
pub const MESSAGE_LIMIT: usize = 2000;

/// Split text into pieces of at most `max_size` bytes (UTF-8 safe, line-aware)
///
/// Lines are kept whole whenever they fit; a single line longer than the limit
/// is cut on character boundaries.
pub fn chunk_text(text: &str, max_size: usize) -> Vec<String> {
    if text.len() <= max_size {
        return vec![text.to_string()];
    }

    let mut chunks = Vec::new();
    let mut current = String::new();

    for line in text.lines() {
        // +1 for the newline that joins it to the previous line
        let needed = if current.is_empty() { line.len() } else { line.len() + 1 };
        if current.len() + needed > max_size && !current.is_empty() {
            chunks.push(std::mem::take(&mut current));
        }

        if line.len() > max_size {
            let mut pieces = split_line(line, max_size);
            if let Some(last) = pieces.pop() {
                chunks.extend(pieces);
                current = last;
            }
            continue;
        }

        if !current.is_empty() {
            current.push('\n');
        }
        current.push_str(line);
    }

    if !current.is_empty() {
        chunks.push(current);
    }
    chunks
}

fn split_line(line: &str, max_size: usize) -> Vec<String> {
    let mut pieces = Vec::new();
    let mut current = String::new();

    for ch in line.chars() {
        if current.len() + ch.len_utf8() > max_size && !current.is_empty() {
            pieces.push(std::mem::take(&mut current));
        }
        current.push(ch);
    }
    if !current.is_empty() {
        pieces.push(current);
    }
    pieces
}

/// Chunk text for message content (2000 byte limit)
pub fn chunk_for_message(text: &str) -> Vec<String> {
    chunk_text(text, MESSAGE_LIMIT)
}
