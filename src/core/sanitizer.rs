/// Reduce raw model output to a single JSDoc block, or reject it.
///
/// A wrapping Markdown fence is dropped first. The first `/**` and the nearest `*/`
/// after it bound the accepted block. Output without markers is only salvaged when it
/// starts with a bare `*` continuation line, in which case it is wrapped.
pub fn sanitize_block(text: &str) -> Option<String> {
    let text = strip_fence(text.trim());
    if text.is_empty() {
        return None;
    }

    if let Some(start) = text.find("/**") {
        if let Some(end) = text[start + 3..].find("*/").map(|i| i + start + 3) {
            return Some(text[start..end + 2].trim().to_string());
        }
    }

    if text.starts_with('*') {
        let close = if text.ends_with("*/") { "" } else { "\n*/" };
        return Some(format!("/**\n{}{}", text, close));
    }

    None
}

fn strip_fence(text: &str) -> &str {
    let mut text = text;
    if let Some(rest) = text.strip_prefix("```") {
        let rest = rest.trim_start_matches(|c: char| c.is_ascii_alphabetic());
        text = rest.strip_prefix('\n').unwrap_or(rest);
    }
    if let Some(rest) = text.strip_suffix("```") {
        text = rest;
    }
    text.trim()
}
