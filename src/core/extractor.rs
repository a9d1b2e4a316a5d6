//! Locates documentable units in JavaScript/TypeScript sources using Tree-sitter
//!
//! Three shapes are recognised: function declarations, methods in a class body and
//! arrow functions that directly initialise a plainly named variable. The body of an
//! extracted unit is never searched for further units, so spans never overlap and come
//! out in ascending source order.

use std::path::Path;
use tracing::debug;
use tree_sitter::{Language, Node, Parser};

use crate::error::{AnnotatorError, Result};
use super::unit::{DocumentableUnit, ParamInfo, UnitKind, ANONYMOUS, MAX_CALLED_IDENTIFIERS};

/// File extensions the extractor understands
pub const SUPPORTED_EXTENSIONS: [&str; 4] = ["js", "ts", "jsx", "tsx"];

/// Grammar flavour used to parse a source file
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceDialect {
    JavaScript,
    TypeScript,
    Tsx,
}

impl SourceDialect {
    /// Accepts extensions with or without the leading dot
    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext.trim_start_matches('.') {
            "js" | "jsx" => Some(SourceDialect::JavaScript),
            "ts" => Some(SourceDialect::TypeScript),
            "tsx" => Some(SourceDialect::Tsx),
            _ => None,
        }
    }

    pub fn from_path(path: &Path) -> Option<Self> {
        path.extension()
            .and_then(|ext| ext.to_str())
            .and_then(Self::from_extension)
    }

    fn language(&self) -> Language {
        match self {
            SourceDialect::JavaScript => tree_sitter_javascript::language(),
            SourceDialect::TypeScript => tree_sitter_typescript::language_typescript(),
            SourceDialect::Tsx => tree_sitter_typescript::language_tsx(),
        }
    }
}

/// Extract units using the TSX grammar, which accepts typed and JSX-bearing sources alike
pub fn extract(source: &str) -> Result<Vec<DocumentableUnit>> {
    UnitExtractor::new(SourceDialect::Tsx)?.extract(source)
}

/// Tree-sitter backed unit extractor for one dialect
pub struct UnitExtractor {
    parser: Parser,
    dialect: SourceDialect,
}

impl UnitExtractor {
    pub fn new(dialect: SourceDialect) -> Result<Self> {
        let mut parser = Parser::new();
        parser.set_language(&dialect.language())
            .map_err(|e| AnnotatorError::Parse(format!("Failed to set {:?} language: {}", dialect, e)))?;

        Ok(Self { parser, dialect })
    }

    pub fn dialect(&self) -> SourceDialect {
        self.dialect
    }

    /// Parse `source` and return its units in ascending span order.
    ///
    /// JavaScript sources the plain grammar rejects get a second parse with the TSX
    /// grammar, so type annotations in `.js`/`.jsx` files are accepted.
    pub fn extract(&mut self, source: &str) -> Result<Vec<DocumentableUnit>> {
        let tree = self.parser.parse(source, None)
            .ok_or_else(|| AnnotatorError::Parse(format!("Failed to parse {:?} code", self.dialect)))?;

        let tree = if tree.root_node().has_error() && self.dialect == SourceDialect::JavaScript {
            debug!("JavaScript grammar rejected the source; retrying with TSX");
            let mut fallback = UnitExtractor::new(SourceDialect::Tsx)?;
            match fallback.parser.parse(source, None) {
                Some(typed) if !typed.root_node().has_error() => typed,
                _ => tree,
            }
        } else {
            tree
        };

        let root = tree.root_node();
        if root.has_error() {
            let line = first_error_line(root).unwrap_or(0) + 1;
            return Err(AnnotatorError::Parse(format!(
                "Syntax error near line {} ({:?} grammar)",
                line, self.dialect
            )));
        }

        let mut units = Vec::new();
        self.collect_units(root, source, &mut units);
        Ok(units)
    }

    /// Walk the AST, stopping at the boundary of every extracted unit
    fn collect_units(&self, node: Node, source: &str, units: &mut Vec<DocumentableUnit>) {
        let mut cursor = node.walk();

        for child in node.named_children(&mut cursor) {
            match child.kind() {
                "function_declaration" | "generator_function_declaration" => {
                    let name = child.child_by_field_name("name")
                        .map(|n| node_text(n, source).to_string())
                        .unwrap_or_else(|| ANONYMOUS.to_string());
                    units.push(self.build_unit(child, name, UnitKind::Function, source));
                    continue;
                }
                "method_definition" if node.kind() == "class_body" => {
                    let name = child.child_by_field_name("name")
                        .filter(|n| n.kind() == "property_identifier")
                        .map(|n| node_text(n, source).to_string())
                        .unwrap_or_else(|| ANONYMOUS.to_string());
                    units.push(self.build_unit(child, name, UnitKind::ClassMethod, source));
                    continue;
                }
                "variable_declarator" => {
                    let name = child.child_by_field_name("name");
                    let value = child.child_by_field_name("value");
                    if let (Some(name), Some(value)) = (name, value) {
                        if name.kind() == "identifier" && value.kind() == "arrow_function" {
                            let name = node_text(name, source).to_string();
                            units.push(self.build_unit(value, name, UnitKind::ArrowFunction, source));
                            continue;
                        }
                    }
                }
                _ => {}
            }

            self.collect_units(child, source, units);
        }
    }

    fn build_unit(&self, node: Node, name: String, kind: UnitKind, source: &str) -> DocumentableUnit {
        let parameters = self.extract_parameters(node, source);
        let return_type = node.child_by_field_name("return_type")
            .map(|t| type_text(t, source));

        let mut called_identifiers = Vec::new();
        if let Some(body) = node.child_by_field_name("body") {
            collect_calls(body, source, &mut called_identifiers);
        }
        called_identifiers.truncate(MAX_CALLED_IDENTIFIERS);

        DocumentableUnit {
            name,
            kind,
            parameters,
            return_type,
            span: node.start_byte()..node.end_byte(),
            is_async: has_token(node, "async"),
            called_identifiers,
            summary: String::new(),
        }
    }

    fn extract_parameters(&self, node: Node, source: &str) -> Vec<ParamInfo> {
        if let Some(params) = node.child_by_field_name("parameters") {
            let mut cursor = params.walk();
            params.named_children(&mut cursor)
                .filter(|p| p.kind() != "comment")
                .map(|p| self.param_info(p, source))
                .collect()
        } else if let Some(single) = node.child_by_field_name("parameter") {
            // `x => ...`
            vec![self.param_info(single, source)]
        } else {
            Vec::new()
        }
    }

    /// Normalise one parameter node into the closed set of parameter shapes
    fn param_info(&self, param: Node, source: &str) -> ParamInfo {
        match param.kind() {
            "identifier" => ParamInfo::named(node_text(param, source)),
            "object_pattern" => ParamInfo::named("{...}"),
            "array_pattern" => ParamInfo::named("[...]"),
            "rest_pattern" => {
                let target = param.named_child(0)
                    .filter(|t| t.kind() == "identifier")
                    .map(|t| format!("...{}", node_text(t, source)))
                    .unwrap_or_else(|| "...args".to_string());
                ParamInfo::named(target)
            }
            "assignment_pattern" => {
                let mut info = match param.child_by_field_name("left") {
                    Some(left) => self.param_info(left, source),
                    None => ParamInfo::named(node_text(param, source)),
                };
                info.default_value = param.child_by_field_name("right")
                    .map(|right| node_text(right, source).to_string());
                info
            }
            // TypeScript wraps every parameter: pattern, optional type, optional default
            "required_parameter" | "optional_parameter" => {
                let mut info = match param.child_by_field_name("pattern") {
                    Some(pattern) => self.param_info(pattern, source),
                    None => ParamInfo::named(node_text(param, source)),
                };
                info.type_annotation = param.child_by_field_name("type")
                    .map(|t| type_text(t, source));
                if let Some(value) = param.child_by_field_name("value") {
                    info.default_value = Some(node_text(value, source).to_string());
                }
                info
            }
            _ => ParamInfo::named(node_text(param, source)),
        }
    }
}

/// Extract text content of a node
fn node_text<'a>(node: Node, source: &'a str) -> &'a str {
    source.get(node.byte_range()).unwrap_or_default()
}

/// Type annotation text without the leading `:`
fn type_text(node: Node, source: &str) -> String {
    let text = node_text(node, source).trim();
    text.strip_prefix(':').unwrap_or(text).trim().to_string()
}

/// Whether an anonymous keyword token such as `async` is a direct child
fn has_token(node: Node, token: &str) -> bool {
    let mut cursor = node.walk();
    let found = node.children(&mut cursor).any(|c| !c.is_named() && c.kind() == token);
    found
}

/// Collect callee names in pre-order: `name`, `object.prop`, `this.prop`, or `obj.prop`
fn collect_calls(node: Node, source: &str, calls: &mut Vec<String>) {
    if node.kind() == "call_expression" {
        if let Some(callee) = node.child_by_field_name("function") {
            if let Some(name) = callee_name(callee, source) {
                if !calls.contains(&name) {
                    calls.push(name);
                }
            }
        }
    }

    let mut cursor = node.walk();
    for child in node.named_children(&mut cursor) {
        collect_calls(child, source, calls);
    }
}

fn callee_name(callee: Node, source: &str) -> Option<String> {
    match callee.kind() {
        "identifier" => Some(node_text(callee, source).to_string()),
        "member_expression" => {
            let object = match callee.child_by_field_name("object") {
                Some(o) if o.kind() == "identifier" => node_text(o, source),
                Some(o) if o.kind() == "this" => "this",
                _ => "obj",
            };
            let property = match callee.child_by_field_name("property") {
                Some(p) if p.kind() == "property_identifier" => node_text(p, source),
                _ => "call",
            };
            Some(format!("{}.{}", object, property))
        }
        _ => None,
    }
}

fn first_error_line(node: Node) -> Option<usize> {
    if node.is_error() || node.is_missing() {
        return Some(node.start_position().row);
    }

    let mut cursor = node.walk();
    let children: Vec<Node> = node.children(&mut cursor).collect();
    children.into_iter()
        .filter(|c| c.has_error())
        .find_map(first_error_line)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn extract_with(dialect: SourceDialect, source: &str) -> Vec<DocumentableUnit> {
        UnitExtractor::new(dialect).unwrap().extract(source).unwrap()
    }

    fn names(units: &[DocumentableUnit]) -> Vec<&str> {
        units.iter().map(|u| u.name.as_str()).collect()
    }

    #[test]
    fn test_function_with_network_call() {
        let source = "function getUserData(id) { return fetch(id); }";
        let units = extract_with(SourceDialect::JavaScript, source);

        assert_eq!(units.len(), 1);
        let unit = &units[0];
        assert_eq!(unit.name, "getUserData");
        assert_eq!(unit.kind, UnitKind::Function);
        assert_eq!(unit.param_names(), vec!["id"]);
        assert!(unit.called_identifiers.contains(&"fetch".to_string()));
        assert!(!unit.is_async);
        assert_eq!(unit.span, 0..source.len());
    }

    #[test]
    fn test_class_methods() {
        let source = r#"class Api {
  async loadUser(id) {
    console.log(id);
    return this.client.get(id);
  }

  static create(config = {}) {
    return this.build(config);
  }
}
"#;
        let units = extract_with(SourceDialect::JavaScript, source);

        assert_eq!(names(&units), vec!["loadUser", "create"]);
        assert!(units.iter().all(|u| u.kind == UnitKind::ClassMethod));
        assert!(units[0].is_async);
        assert_eq!(units[0].called_identifiers, vec!["console.log", "obj.get"]);
        assert!(!units[1].is_async);
        assert_eq!(units[1].called_identifiers, vec!["this.build"]);
        assert_eq!(units[1].parameters[0].name, "config");
        assert_eq!(units[1].parameters[0].default_value.as_deref(), Some("{}"));
        assert!(source[units[1].span.clone()].starts_with("static create"));
    }

    #[test]
    fn test_only_variable_bound_arrows() {
        let source = r#"const add = (a, b) => a + b;
items.map((x) => x * 2);
const handlers = { run: () => 1 };
let double = x => x * 2;
const { pick } = helpers;
"#;
        let units = extract_with(SourceDialect::JavaScript, source);

        assert_eq!(names(&units), vec!["add", "double"]);
        assert!(units.iter().all(|u| u.kind == UnitKind::ArrowFunction));
        assert_eq!(units[1].param_names(), vec!["x"]);
        assert!(source[units[0].span.clone()].starts_with("(a, b) =>"));
    }

    #[test]
    fn test_parameter_shapes() {
        let source = "function f({ a, b }, [c], ...rest) {}\nfunction g(...[x, y]) {}\n";
        let units = extract_with(SourceDialect::JavaScript, source);

        assert_eq!(units[0].param_names(), vec!["{...}", "[...]", "...rest"]);
        assert_eq!(units[1].param_names(), vec!["...args"]);
    }

    #[test]
    fn test_typescript_annotations() {
        let source = r#"export async function load(url: string, retries: number = 3, { verbose }: Options): Promise<string> {
  const res = await fetch(url);
  return res.text();
}
"#;
        let units = extract_with(SourceDialect::TypeScript, source);

        assert_eq!(units.len(), 1);
        let unit = &units[0];
        assert!(unit.is_async);
        assert_eq!(unit.return_type.as_deref(), Some("Promise<string>"));
        assert_eq!(unit.parameters[0], ParamInfo {
            name: "url".to_string(),
            type_annotation: Some("string".to_string()),
            default_value: None,
        });
        assert_eq!(unit.parameters[1].type_annotation.as_deref(), Some("number"));
        assert_eq!(unit.parameters[1].default_value.as_deref(), Some("3"));
        assert_eq!(unit.parameters[2].name, "{...}");
        assert_eq!(unit.parameters[2].type_annotation.as_deref(), Some("Options"));
        assert_eq!(unit.called_identifiers, vec!["fetch", "res.text"]);
    }

    #[test]
    fn test_typed_arrow_and_jsx() {
        let source = "const App = (props: Props): JSX.Element => <div onClick={() => go()}>hi</div>;\n";
        let units = extract_with(SourceDialect::Tsx, source);

        assert_eq!(names(&units), vec!["App"]);
        assert_eq!(units[0].parameters[0].type_annotation.as_deref(), Some("Props"));
        assert_eq!(units[0].return_type.as_deref(), Some("JSX.Element"));
        assert_eq!(units[0].called_identifiers, vec!["go"]);
    }

    #[test]
    fn test_units_do_not_nest() {
        let source = r#"function outer() {
  function inner() {}
  const local = () => inner();
}

describe("suite", () => {
  function helper() {}
});
"#;
        let units = extract_with(SourceDialect::JavaScript, source);

        assert_eq!(names(&units), vec!["outer", "helper"]);
        assert!(units[0].span.end <= units[1].span.start);
    }

    #[test]
    fn test_called_identifiers_are_bounded() {
        let source = "function busy() { a(); b(); c(); d(); e(); f(); g(); h(); i(); a(); }";
        let units = extract_with(SourceDialect::JavaScript, source);

        assert_eq!(units[0].called_identifiers.len(), MAX_CALLED_IDENTIFIERS);
        assert_eq!(units[0].called_identifiers[0], "a");
        assert!(!units[0].called_identifiers.contains(&"i".to_string()));
    }

    #[test]
    fn test_empty_and_invalid_sources() {
        assert!(extract_with(SourceDialect::JavaScript, "const x = 1;\n").is_empty());

        let err = UnitExtractor::new(SourceDialect::JavaScript).unwrap()
            .extract("function broken( {")
            .unwrap_err();
        assert!(matches!(err, AnnotatorError::Parse(_)));
    }

    #[test]
    fn test_typed_javascript_falls_back_to_tsx() {
        let source = "export function greet(name: string): string {\n  return format(name);\n}\nconst View = () => <b>{greet(\"x\")}</b>;\n";
        let units = extract_with(SourceDialect::JavaScript, source);

        assert_eq!(names(&units), vec!["greet", "View"]);
        assert_eq!(units[0].parameters[0].type_annotation.as_deref(), Some("string"));
        assert_eq!(units[0].return_type.as_deref(), Some("string"));
        assert_eq!(units[0].called_identifiers, vec!["format"]);

        let err = UnitExtractor::new(SourceDialect::JavaScript).unwrap()
            .extract("function typed(x: number {")
            .unwrap_err();
        assert!(matches!(err, AnnotatorError::Parse(ref msg) if msg.contains("JavaScript")));
    }

    #[test]
    fn test_extraction_is_deterministic() {
        let source = "const a = async () => axios.get('/x');\nclass K { m() {} }\n";
        assert_eq!(extract(source).unwrap(), extract(source).unwrap());
    }

    #[test]
    fn test_dialect_from_extension() {
        assert_eq!(SourceDialect::from_extension(".jsx"), Some(SourceDialect::JavaScript));
        assert_eq!(SourceDialect::from_extension("ts"), Some(SourceDialect::TypeScript));
        assert_eq!(SourceDialect::from_path(Path::new("a/b.tsx")), Some(SourceDialect::Tsx));
        assert_eq!(SourceDialect::from_extension("py"), None);
    }
}
