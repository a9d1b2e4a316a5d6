use std::sync::Arc;
use regex::Regex;
use tracing::{debug, warn};

use super::doc_blocks::reindent;
use super::llm::{build_user_payload, TextGenerator, SYSTEM_INSTRUCTION};
use super::sanitizer::sanitize_block;
use super::unit::DocumentableUnit;

const FALLBACK_SUMMARY: &str = "TODO: Add description";
const PARAM_PLACEHOLDER: &str = "TODO: describe.";
const CONFIG_PARAM_DESCRIPTION: &str = "Configuration options.";

/// Leading name word -> third person verb used in the summary
const VERBS: [(&str, &str); 15] = [
    ("get", "gets"),
    ("set", "sets"),
    ("compute", "computes"),
    ("calculate", "calculates"),
    ("fetch", "fetches"),
    ("load", "loads"),
    ("render", "renders"),
    ("handle", "handles"),
    ("parse", "parses"),
    ("format", "formats"),
    ("validate", "validates"),
    ("transform", "transforms"),
    ("build", "builds"),
    ("update", "updates"),
    ("create", "creates"),
];

/// Produces summaries and documentation blocks for units.
///
/// The heuristic path is always available. When a generator is attached, each block is
/// first requested from it; anything unusable falls back to the heuristic block.
pub struct DescriptionSynthesizer {
    generator: Option<Arc<dyn TextGenerator>>,
    camel_boundary: Regex,
    separators: Regex,
}

impl DescriptionSynthesizer {
    pub fn heuristic() -> Self {
        Self {
            generator: None,
            camel_boundary: Regex::new(r"([a-z0-9])([A-Z])").expect("Invalid camel boundary regex"),
            separators: Regex::new(r"[_\-]+").expect("Invalid separator regex"),
        }
    }

    pub fn with_generator(generator: Arc<dyn TextGenerator>) -> Self {
        Self {
            generator: Some(generator),
            ..Self::heuristic()
        }
    }

    pub fn uses_external(&self) -> bool {
        self.generator.is_some()
    }

    /// Lowercase words of an identifier, split on camel case and `_`/`-`
    pub fn words_from_name(&self, name: &str) -> Vec<String> {
        let spaced = self.camel_boundary.replace_all(name, "$1 $2");
        let spaced = self.separators.replace_all(&spaced, " ");
        spaced.split_whitespace().map(str::to_lowercase).collect()
    }

    /// Best-effort one-line label derived from the unit's name and callees
    pub fn summarize(&self, unit: &DocumentableUnit) -> String {
        let words = self.words_from_name(&unit.name);
        let first = words.first().map(String::as_str).unwrap_or_default();
        let verb = VERBS.iter().find(|(word, _)| *word == first).map(|(_, verb)| *verb);

        let sentence = match (verb, words.len()) {
            (Some(verb), 1) => verb.to_string(),
            (Some(verb), _) => format!("{} {}", verb, words[1..].join(" ")),
            (None, 0) => return String::new(),
            (None, 1) => format!("performs {}", words[0]),
            (None, _) => format!("performs {}", words[1..].join(" ")),
        };

        if unit.is_async || calls_network(&unit.called_identifiers) {
            format!("Asynchronously {}", sentence)
        } else {
            capitalize(&sentence)
        }
    }

    /// Block built purely from the unit's metadata
    pub fn render_block(&self, unit: &DocumentableUnit, indent: &str) -> String {
        let summary = if unit.summary.trim().is_empty() {
            FALLBACK_SUMMARY
        } else {
            unit.summary.as_str()
        };

        let mut lines = vec!["/**".to_string(), format!(" * {}", summary)];
        if unit.is_async {
            lines.push(" * @async".to_string());
        }
        for param in &unit.parameters {
            let type_part = param.type_annotation.as_ref()
                .map(|t| format!("{{{}}} ", t))
                .unwrap_or_default();
            let name_part = match &param.default_value {
                Some(default) => format!("[{}={}]", param.name, default),
                None => param.name.clone(),
            };
            let description = match param.name.as_str() {
                "options" | "config" => CONFIG_PARAM_DESCRIPTION,
                _ => PARAM_PLACEHOLDER,
            };
            lines.push(format!(" * @param {}{} - {}", type_part, name_part, description));
        }
        if let Some(return_type) = &unit.return_type {
            lines.push(format!(" * @returns {{{}}}", return_type));
        }
        lines.push(" */".to_string());

        lines.into_iter()
            .map(|line| format!("{}{}", indent, line))
            .collect::<Vec<_>>()
            .join("\n")
    }

    /// Ask the attached generator for a block; `None` on any failure or unusable answer
    pub async fn synthesize_external(
        &self,
        unit_source: &str,
        name: &str,
        params: &[String],
        extension: &str,
    ) -> Option<String> {
        let generator = self.generator.as_ref()?;
        let user = build_user_payload(extension, name, params, unit_source);

        match generator.generate(SYSTEM_INSTRUCTION, &user).await {
            Ok(Some(text)) => {
                let block = sanitize_block(&text);
                if block.is_none() {
                    debug!("Discarded unusable {} output for {}", generator.provider_name(), name);
                }
                block
            }
            Ok(None) => {
                debug!("{} returned no content for {}", generator.provider_name(), name);
                None
            }
            Err(e) => {
                warn!("External synthesis failed for {}: {}", name, e);
                None
            }
        }
    }

    /// Final block for a unit, indented for its insertion point
    pub async fn synthesize_block(
        &self,
        unit: &DocumentableUnit,
        source: &str,
        extension: &str,
        indent: &str,
    ) -> String {
        if self.generator.is_some() {
            let external = self
                .synthesize_external(unit.source_text(source), &unit.name, &unit.param_names(), extension)
                .await;
            if let Some(block) = external {
                return reindent(&block, indent);
            }
        }

        self.render_block(unit, indent)
    }
}

impl Default for DescriptionSynthesizer {
    fn default() -> Self {
        Self::heuristic()
    }
}

fn calls_network(calls: &[String]) -> bool {
    calls.iter().any(|c| c.starts_with("fetch") || c.starts_with("axios") || c.contains("http"))
}

fn capitalize(text: &str) -> String {
    let mut chars = text.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}
