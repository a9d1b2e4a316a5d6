use regex::Regex;

use super::doc_blocks::line_start;
use super::unit::{DocumentableUnit, UnitKind};

/// A block scheduled for insertion, in original-buffer coordinates
#[derive(Debug, Clone, PartialEq)]
pub struct PlannedEdit {
    /// Name of the documented unit, for the change summary
    pub unit_name: String,

    /// Where the block is placed
    pub insertion_point: usize,

    /// Start of the text the block replaces; equal to `insertion_point` for a pure insertion
    pub replace_from: usize,

    /// Rendered block, without the trailing newline
    pub block: String,
}

impl PlannedEdit {
    pub fn insert(unit_name: impl Into<String>, insertion_point: usize, block: impl Into<String>) -> Self {
        Self {
            unit_name: unit_name.into(),
            insertion_point,
            replace_from: insertion_point,
            block: block.into(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct RewriteOutput {
    /// Complete new buffer
    pub text: String,

    /// One line per applied edit
    pub change_summary: String,

    pub applied: usize,
}

/// Splices documentation blocks into a source buffer
pub struct Rewriter {
    /// `const name`, `let name`, `var name` anywhere before an arrow on its line
    declaration_regex: Regex,

    /// Indentation plus declaration modifiers only
    modifier_prefix_regex: Regex,
}

impl Rewriter {
    pub fn new() -> Self {
        Self {
            declaration_regex: Regex::new(r"\b(?:const|let|var)\s+[A-Za-z_$][\w$]*")
                .expect("Invalid declaration regex"),
            modifier_prefix_regex: Regex::new(
                r"^[ \t]*(?:(?:export|default|declare|async|static|public|private|protected|abstract|override|readonly)\s+)*$",
            )
            .expect("Invalid modifier prefix regex"),
        }
    }

    /// Position in the original source where the unit's block belongs.
    ///
    /// Arrow units move to the start of their line when the line declares a variable
    /// before them; other units move there when only indentation and modifier keywords
    /// precede them. Anything else is documented in place at the span start.
    pub fn insertion_point(&self, source: &str, unit: &DocumentableUnit) -> usize {
        let start = unit.span.start;
        let line = line_start(source, start);
        let prefix = &source[line..start];

        let hoist = match unit.kind {
            UnitKind::ArrowFunction => self.declaration_regex.is_match(prefix),
            UnitKind::Function | UnitKind::ClassMethod => self.modifier_prefix_regex.is_match(prefix),
        };

        if hoist { line } else { start }
    }

    /// Indentation a block placed at `point` should carry: the line's leading
    /// whitespace at a line start, nothing mid-line
    pub fn indentation_at<'a>(&self, source: &'a str, point: usize) -> &'a str {
        if line_start(source, point) != point {
            return "";
        }
        let rest = &source[point..];
        let width = rest.len() - rest.trim_start_matches([' ', '\t']).len();
        &rest[..width]
    }

    /// Apply all edits to `source` and return the full new buffer.
    ///
    /// Edits run in ascending insertion order (extraction order on ties, so blocks for
    /// units sharing a line stack in order). A running offset maps original positions
    /// into the growing buffer; each edit shifts it by the inserted length plus one
    /// newline, minus whatever it replaced.
    pub fn apply(&self, source: &str, mut edits: Vec<PlannedEdit>) -> RewriteOutput {
        edits.sort_by_key(|e| e.insertion_point);

        let mut text = source.to_string();
        let mut offset: isize = 0;
        let mut last_end = 0usize;
        let mut summary_lines = Vec::with_capacity(edits.len());

        for edit in &edits {
            let end = edit.insertion_point;
            let start = edit.replace_from.clamp(last_end, end);
            let insertion = format!("{}\n", edit.block);

            text.replace_range(shift(start, offset)..shift(end, offset), &insertion);
            offset += insertion.len() as isize - (end - start) as isize;
            last_end = end;

            let line = source[..end].matches('\n').count() + 1;
            let verb = if start < end { "Replace" } else { "Add" };
            summary_lines.push(format!("{} comment for {} at line {}", verb, edit.unit_name, line));
        }

        RewriteOutput {
            text,
            change_summary: summary_lines.join("\n"),
            applied: edits.len(),
        }
    }
}

impl Default for Rewriter {
    fn default() -> Self {
        Self::new()
    }
}

fn shift(pos: usize, offset: isize) -> usize {
    (pos as isize + offset) as usize
}
