//! Recognises JSDoc blocks already sitting above a unit, and reshapes blocks to fit
//! the indentation of the code they document.

use std::ops::Range;

/// Offset of the first byte of the line containing `pos`
pub fn line_start(source: &str, pos: usize) -> usize {
    source[..pos].rfind('\n').map(|i| i + 1).unwrap_or(0)
}

/// Find a `/** ... */` block that ends right before `position`.
///
/// Only whitespace with at most one line break may separate the block from `position`;
/// a blank line means the comment belongs to something else (a file header, say). The
/// returned range starts at the block's line start when only indentation precedes it,
/// and ends at `position`, so replacing the range swaps the block out cleanly.
pub fn find_preceding_block(source: &str, position: usize) -> Option<Range<usize>> {
    let before = source.get(..position)?;
    let trimmed = before.trim_end();
    let gap = &before[trimmed.len()..];

    if gap.matches('\n').count() > 1 || !trimmed.ends_with("*/") {
        return None;
    }

    // A comment runs from its opener to the first `*/`, so the block closing at the end
    // opens at the first `/*` after the previous `*/`; `/*` inside its text is just text.
    let body = &trimmed[..trimmed.len() - 2];
    let after_previous = body.rfind("*/").map(|i| i + 2).unwrap_or(0);
    let open = after_previous + body[after_previous..].find("/*")?;
    if !trimmed[open..].starts_with("/**") || &trimmed[open..] == "/**/" {
        return None;
    }

    let start = line_start(source, open);
    let start = if source[start..open].trim().is_empty() { start } else { open };
    Some(start..position)
}

/// Like [`find_preceding_block`], but extends the range over up to `max_blocks`
/// adjacent blocks stacked above `position`.
pub fn find_preceding_run(source: &str, position: usize, max_blocks: usize) -> Option<Range<usize>> {
    let mut run = find_preceding_block(source, position)?;
    for _ in 1..max_blocks {
        match find_preceding_block(source, run.start) {
            Some(earlier) => run.start = earlier.start,
            None => break,
        }
    }
    Some(run)
}

/// Re-indent a comment block so every line sits at `indent`.
///
/// Lines are normalised to `/**`, ` * text` and ` */`; text lines missing a leading
/// `*` get one.
pub fn reindent(block: &str, indent: &str) -> String {
    block.lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(|line| {
            if line.starts_with("/**") {
                format!("{}{}", indent, line)
            } else if line.starts_with('*') {
                format!("{} {}", indent, line)
            } else {
                format!("{} * {}", indent, line)
            }
        })
        .collect::<Vec<_>>()
        .join("\n")
}
