use serde::{Deserialize, Serialize};
use std::ops::Range;

/// Name used when a unit has no usable identifier
pub const ANONYMOUS: &str = "anonymous";

/// Callee names kept per unit
pub const MAX_CALLED_IDENTIFIERS: usize = 8;

/// Shape of a documentable unit
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum UnitKind {
    /// `function name() {}` (including generators)
    Function,

    /// A method declared inside a class body
    ClassMethod,

    /// `const name = () => {}`
    ArrowFunction,
}

impl UnitKind {
    pub fn label(&self) -> &'static str {
        match self {
            UnitKind::Function => "function",
            UnitKind::ClassMethod => "method",
            UnitKind::ArrowFunction => "arrow function",
        }
    }
}

/// One parameter of a unit, identified by position only
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParamInfo {
    /// Identifier, `{...}`/`[...]` for destructuring, `...name` for rest parameters
    pub name: String,

    /// Declared type annotation, without the leading colon
    pub type_annotation: Option<String>,

    /// Source text of the default value
    pub default_value: Option<String>,
}

impl ParamInfo {
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            type_annotation: None,
            default_value: None,
        }
    }
}

/// A function-like construct that can receive a documentation block
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DocumentableUnit {
    pub name: String,
    pub kind: UnitKind,
    pub parameters: Vec<ParamInfo>,

    /// Declared return type, without the leading colon
    pub return_type: Option<String>,

    /// Byte range in the original, unmodified source
    pub span: Range<usize>,

    pub is_async: bool,

    /// Callees seen in the body; a heuristic signal, not a complete list
    pub called_identifiers: Vec<String>,

    /// One-line description, empty until synthesized
    pub summary: String,
}

impl DocumentableUnit {
    /// Source text covered by this unit
    pub fn source_text<'a>(&self, source: &'a str) -> &'a str {
        source.get(self.span.clone()).unwrap_or_default()
    }

    pub fn param_names(&self) -> Vec<String> {
        self.parameters.iter().map(|p| p.name.clone()).collect()
    }
}
