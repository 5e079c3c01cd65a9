//! Miscellaneus utilities.

/// Render an error and its chain of sources, one per line, each source
/// indented further than the error it caused.
pub fn aggregate_error_tree(error: &(dyn std::error::Error + 'static), indent_step: usize) -> String {
    let mut next: Option<&(dyn std::error::Error + 'static)> = Some(error);
    let mut generation: usize = 0;
    let mut aggregated: String = String::new();
    while let Some(node) = next {
        aggregated.push_str(&" ".repeat(generation * indent_step));
        aggregated.push_str(&node.to_string());
        aggregated.push('\n');
        next = node.source();
        generation = generation + 1;
    }
    return aggregated;
}

/// Split a message into chunks of at most `max` characters each. Chunks
/// end at line breaks where possible; a single line longer than `max` is
/// broken in the middle.
pub fn split_message(message: &str, max: usize) -> Vec<&str> {
    let mut chunks: Vec<&str> = Vec::new();
    if max == 0 {
        return chunks;
    }

    let mut rest: &str = message;
    while let Some((limit, _)) = rest.char_indices().nth(max) {
        let window: &str = &rest[..limit];
        let (chunk, next): (&str, &str) = if rest[limit..].starts_with('\n') {
            (window, &rest[limit + 1..])
        } else if let Some(newline) = window.rfind('\n') {
            (&rest[..newline], &rest[newline + 1..])
        } else {
            (window, &rest[limit..])
        };
        if !chunk.is_empty() {
            chunks.push(chunk);
        }
        rest = next;
    }
    if !rest.is_empty() {
        chunks.push(rest);
    }
    return chunks;
}
