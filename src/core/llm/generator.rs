use async_trait::async_trait;

use crate::error::Result;

/// Fixed instruction sent with every documentation request
pub const SYSTEM_INSTRUCTION: &str = "\
You are an expert code documenter who writes precise, concise JSDoc for JavaScript and TypeScript.
- Output EXACTLY ONE JSDoc block, starting with /** and ending with */.
- Keep the summary to 1-2 lines, in active voice and present tense.
- Describe what the function does, not how. Mention notable side effects and thrown errors.
- Include one @param per parameter with an inferred type and a short description.
- Mention default values in the parameter description when relevant.
- Include @returns with an inferred type and brief description unless the function returns nothing.
- Prefer domain terminology suggested by names and calls (fetch, parse, render, ...).
- Do NOT include code, examples, markdown fences, or any commentary outside the block.";

/// Build the user message describing one unit
pub fn build_user_payload(extension: &str, name: &str, params: &[String], unit_source: &str) -> String {
    let params = if params.is_empty() {
        "none".to_string()
    } else {
        params.join(", ")
    };

    format!(
        "File extension: .{}\nFunction name: {}\nParameters: {}\n\nFunction code:\n{}\n\nGenerate the JSDoc for this function.",
        extension.trim_start_matches('.'),
        name,
        params,
        unit_source
    )
}

/// A text-generation service able to answer one system + user prompt pair
#[async_trait]
pub trait TextGenerator: Send + Sync {
    /// Send a single request; `Ok(None)` means the service answered without usable content
    async fn generate(&self, system: &str, user: &str) -> Result<Option<String>>;

    /// Get the provider name (e.g., "Groq", "Ollama")
    fn provider_name(&self) -> &str;

    /// Get the model name being used
    fn model_name(&self) -> &str;
}
